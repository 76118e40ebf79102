//! Integration tests for the collective backend.

use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::ai::SimulatedAssistant;
use crate::auth::AUTH_TOKEN_HEADER;
use crate::config::{Config, LogFormat};
use crate::db::{init_database, Repository};
use crate::models::Role;
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    repo: Arc<Repository>,
    _temp_dir: TempDir,
}

/// A registered account and its credential.
struct Account {
    id: String,
    token: String,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_environment("development").await
    }

    async fn with_environment(environment: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        // Create config
        let config = Config {
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            log_format: LogFormat::Text,
            jwt_secret: "test-secret".to_string(),
            jwt_secret_is_default: false,
            token_ttl_days: 30,
            contribution_weight: 0.1,
            environment: environment.to_string(),
            ai_latency_factor: 0.0,
        };

        let state = AppState {
            repo: repo.clone(),
            ai: Arc::new(SimulatedAssistant::new(config.ai_latency_factor)),
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            repo,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder, account: &Account) -> RequestBuilder {
        builder.header(AUTH_TOKEN_HEADER, &account.token)
    }

    async fn get(&self, path: &str) -> Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    async fn get_as(&self, path: &str, account: &Account) -> Response {
        self.authed(self.client.get(self.url(path)), account)
            .send()
            .await
            .unwrap()
    }

    async fn post_as(&self, path: &str, account: &Account, body: Value) -> Response {
        self.authed(self.client.post(self.url(path)), account)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn put_as(&self, path: &str, account: &Account, body: Value) -> Response {
        self.authed(self.client.put(self.url(path)), account)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn delete_as(&self, path: &str, account: &Account) -> Response {
        self.authed(self.client.delete(self.url(path)), account)
            .send()
            .await
            .unwrap()
    }

    async fn register(&self, username: &str) -> Account {
        let resp = self
            .client
            .post(self.url("/api/users/register"))
            .json(&json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": "secret123"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        Account {
            id: body["data"]["user"]["id"].as_str().unwrap().to_string(),
            token: body["data"]["token"].as_str().unwrap().to_string(),
        }
    }

    async fn register_admin(&self, username: &str) -> Account {
        let account = self.register(username).await;
        self.repo.set_role(&account.id, Role::Admin).await.unwrap();
        account
    }

    async fn create_design(&self, account: &Account, name: &str) -> String {
        let resp = self
            .post_as(
                "/api/designs",
                account,
                json!({
                    "name": name,
                    "description": "A test design",
                    "imageUrl": "https://example.com/design.png",
                    "designData": {"layers": [], "color": "red"}
                }),
            )
            .await;
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn evaluate(&self, account: &Account, design_id: &str, extra: Value) -> Response {
        let mut body = json!({ "designId": design_id });
        if let (Some(target), Some(fields)) = (body.as_object_mut(), extra.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        self.post_as("/api/evaluations", account, body).await
    }

    async fn design_json(&self, design_id: &str) -> Value {
        let resp = self.get(&format!("/api/designs/{}", design_id)).await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    async fn user_json(&self, user_id: &str) -> Value {
        let resp = self.get(&format!("/api/users/{}", user_id)).await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }
}

fn contributor_ids(design: &Value) -> Vec<String> {
    design["contributors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["user"]["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture.get("/health").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_welcome() {
    let fixture = TestFixture::new().await;

    let resp = fixture.get("/api").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
}

// ========== Authentication ==========

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/designs"))
        .json(&json!({"name": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "No token, authorization denied");
}

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let fixture = TestFixture::new().await;
    let forged = Account {
        id: "nobody".to_string(),
        token: "not.a.token".to_string(),
    };

    let resp = fixture.get_as("/api/users/profile", &forged).await;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Token is not valid");
}

#[tokio::test]
async fn test_token_for_unknown_user_is_unauthorized() {
    let fixture = TestFixture::new().await;
    let issued =
        crate::auth::token::issue_token("test-secret", "ghost", Role::Regular, 30).unwrap();
    let ghost = Account {
        id: "ghost".to_string(),
        token: issued.token,
    };

    let resp = fixture.get_as("/api/users/profile", &ghost).await;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "User not found, authorization denied");

    let resp = fixture
        .post_as("/api/designs", &ghost, json!({"name": "x"}))
        .await;
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_bearer_token_fallback() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;

    let resp = fixture
        .client
        .get(fixture.url("/api/users/profile"))
        .bearer_auth(&alice.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["id"], alice.id);
}

#[tokio::test]
async fn test_register_validation_and_duplicates() {
    let fixture = TestFixture::new().await;
    fixture.register("alice").await;

    let cases = [
        json!({"username": "al", "email": "al@example.com", "password": "secret123"}),
        json!({"username": "albert", "email": "not-an-email", "password": "secret123"}),
        json!({"username": "albert", "email": "albert@example.com", "password": "123"}),
        json!({"username": "alice", "email": "other@example.com", "password": "secret123"}),
        json!({"username": "alicia", "email": "ALICE@example.com", "password": "secret123"}),
    ];
    for case in cases {
        let resp = fixture
            .client
            .post(fixture.url("/api/users/register"))
            .json(&case)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "case {case} should be rejected");
    }
}

#[tokio::test]
async fn test_login() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/users/login"))
        .json(&json!({"email": "Alice@Example.com", "password": "secret123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["user"]["id"], alice.id);
    assert!(body["data"]["user"]["lastLoginAt"].is_string());
    assert!(body["data"]["user"].get("passwordHash").is_none());

    for (email, password) in [
        ("alice@example.com", "wrong-password"),
        ("nobody@example.com", "secret123"),
    ] {
        let resp = fixture
            .client
            .post(fixture.url("/api/users/login"))
            .json(&json!({"email": email, "password": password}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Invalid credentials");
    }
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;

    let resp = fixture
        .authed(fixture.client.post(fixture.url("/api/evaluations")), &alice)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
}

// ========== Profiles & administration ==========

#[tokio::test]
async fn test_profile_update() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    fixture.register("bob").await;

    let resp = fixture
        .put_as(
            "/api/users/profile",
            &alice,
            json!({
                "bio": "Knitwear",
                "walletAddress": "0xabc",
                "preferences": {"designPreferences": {"colors": ["red"]}},
                "role": "admin"
            }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["bio"], "Knitwear");
    assert_eq!(body["data"]["walletAddress"], "0xabc");
    assert_eq!(
        body["data"]["preferences"]["designPreferences"]["colors"],
        json!(["red"])
    );
    assert_eq!(body["data"]["preferences"]["notificationSettings"]["email"], true);
    assert_eq!(body["data"]["role"], "user");

    // Taken username
    let resp = fixture
        .put_as("/api/users/profile", &alice, json!({"username": "bob"}))
        .await;
    assert_eq!(resp.status(), 400);

    // Password change takes effect
    let resp = fixture
        .put_as("/api/users/profile", &alice, json!({"password": "new-secret"}))
        .await;
    assert_eq!(resp.status(), 200);
    let resp = fixture
        .client
        .post(fixture.url("/api/users/login"))
        .json(&json!({"email": "alice@example.com", "password": "new-secret"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_admin_routes() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let admin = fixture.register_admin("root").await;

    let resp = fixture.get_as("/api/users", &alice).await;
    assert_eq!(resp.status(), 403);

    let resp = fixture.get_as("/api/users", &admin).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 2);

    let resp = fixture
        .put_as(
            &format!("/api/users/{}/role", alice.id),
            &alice,
            json!({"role": "admin"}),
        )
        .await;
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .put_as(
            &format!("/api/users/{}/role", alice.id),
            &admin,
            json!({"role": "overlord"}),
        )
        .await;
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .put_as(
            &format!("/api/users/{}/role", alice.id),
            &admin,
            json!({"role": "designer"}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "designer");

    let resp = fixture
        .put_as("/api/users/missing/role", &admin, json!({"role": "designer"}))
        .await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_role_change_applies_to_existing_token() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;

    fixture.repo.set_role(&alice.id, Role::Admin).await.unwrap();

    let resp = fixture.get_as("/api/users", &alice).await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_get_user_is_public() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;

    let user = fixture.user_json(&alice.id).await;
    assert_eq!(user["username"], "alice");
    assert_eq!(user["email"], "alice@example.com");

    let resp = fixture.get("/api/users/does-not-exist").await;
    assert_eq!(resp.status(), 404);
}

// ========== Designs ==========

#[tokio::test]
async fn test_design_crud() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;

    let resp = fixture
        .post_as("/api/designs", &alice, json!({"name": "Coat", "description": "d", "imageUrl": "u"}))
        .await;
    assert_eq!(resp.status(), 400);

    let id = fixture.create_design(&alice, "Red Jacket").await;

    let design = fixture.design_json(&id).await;
    assert_eq!(design["name"], "Red Jacket");
    assert_eq!(design["creator"]["id"], alice.id);
    assert_eq!(design["status"], "draft");
    assert_eq!(design["version"], 1);
    assert_eq!(design["isAIGenerated"], false);

    let resp = fixture
        .put_as(
            &format!("/api/designs/{}", id),
            &alice,
            json!({"status": "in_review", "tags": ["outerwear"]}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "in_review");
    assert_eq!(body["data"]["tags"], json!(["outerwear"]));
    assert_eq!(body["data"]["name"], "Red Jacket");

    let resp = fixture.get("/api/designs/missing").await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Design not found");

    let user = fixture.user_json(&alice.id).await;
    assert_eq!(user["designs"], json!([id]));
}

#[tokio::test]
async fn test_design_listings() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let bob = fixture.register("bob").await;

    let first = fixture.create_design(&alice, "First").await;
    let second = fixture.create_design(&bob, "Second").await;

    let resp = fixture
        .post_as(
            "/api/designs",
            &bob,
            json!({
                "name": "Generated",
                "description": "From the model",
                "imageUrl": "https://example.com/g.png",
                "designData": {"seed": 7},
                "isAIGenerated": true
            }),
        )
        .await;
    assert_eq!(resp.status(), 201);

    let resp = fixture.get("/api/designs").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 3);
    assert_eq!(body["data"][0]["name"], "Generated");
    assert_eq!(body["data"][2]["id"], first);

    let resp = fixture
        .evaluate(&alice, &second, json!({"modifiedImageUrl": "a"}))
        .await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let evaluation_id = body["data"]["id"].clone();
    let resp = fixture.evaluate(&bob, &first, json!({"rating": 5})).await;
    assert_eq!(resp.status(), 201);

    let resp = fixture.get("/api/designs").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"][1]["id"], second);
    assert_eq!(contributor_ids(&body["data"][1]), vec![alice.id.clone()]);
    assert_eq!(body["data"][1]["evaluations"], json!([evaluation_id]));
    assert!(contributor_ids(&body["data"][2]).is_empty());
    assert_eq!(body["data"][2]["evaluations"].as_array().unwrap().len(), 1);
    assert!(body["data"][0]["evaluations"].as_array().unwrap().is_empty());

    let resp = fixture.get("/api/designs/ai/generated").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["name"], "Generated");

    let resp = fixture.get(&format!("/api/designs/user/{}", bob.id)).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 2);
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .any(|d| d["id"] == second));
}

#[tokio::test]
async fn test_remix_lineage() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;

    let parent = fixture.create_design(&alice, "Original").await;

    let remix = |parent: &str| {
        json!({
            "name": "Remix",
            "description": "Shorter sleeves",
            "imageUrl": "https://example.com/r.png",
            "designData": {},
            "parentDesign": parent,
            "version": 2
        })
    };

    let resp = fixture.post_as("/api/designs", &alice, remix("missing")).await;
    assert_eq!(resp.status(), 400);

    let resp = fixture.post_as("/api/designs", &alice, remix(&parent)).await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let child = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["parentDesign"], parent);
    assert_eq!(body["data"]["version"], 2);

    let resp = fixture
        .delete_as(&format!("/api/designs/{}", parent), &alice)
        .await;
    assert_eq!(resp.status(), 200);

    let design = fixture.design_json(&child).await;
    assert!(design.get("parentDesign").is_none());
}

#[tokio::test]
async fn test_design_mutation_requires_owner_or_admin() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let bob = fixture.register("bob").await;
    let admin = fixture.register_admin("root").await;

    let id = fixture.create_design(&alice, "Red Jacket").await;

    let resp = fixture
        .put_as(&format!("/api/designs/{}", id), &bob, json!({"name": "Stolen"}))
        .await;
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Not authorized to update this design");

    let resp = fixture
        .delete_as(&format!("/api/designs/{}", id), &bob)
        .await;
    assert_eq!(resp.status(), 403);

    // No mutation happened
    let design = fixture.design_json(&id).await;
    assert_eq!(design["name"], "Red Jacket");

    let resp = fixture
        .put_as(&format!("/api/designs/{}", id), &admin, json!({"status": "completed"}))
        .await;
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .delete_as(&format!("/api/designs/{}", id), &admin)
        .await;
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .delete_as(&format!("/api/designs/{}", id), &admin)
        .await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_design_delete_cascades() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let bob = fixture.register("bob").await;
    let carol = fixture.register("carol").await;

    let id = fixture.create_design(&alice, "Red Jacket").await;
    let other = fixture.create_design(&alice, "Blue Scarf").await;

    let mut evaluation_ids = Vec::new();
    for (account, extra) in [
        (&bob, json!({"rating": 4, "modifiedImageUrl": "x"})),
        (&carol, json!({"rating": 2})),
    ] {
        let resp = fixture.evaluate(account, &id, extra).await;
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        evaluation_ids.push(body["data"]["id"].as_str().unwrap().to_string());
    }
    let resp = fixture
        .evaluate(&bob, &other, json!({"modifications": {"sleeve": "short"}}))
        .await;
    assert_eq!(resp.status(), 201);

    let resp = fixture
        .delete_as(&format!("/api/designs/{}", id), &alice)
        .await;
    assert_eq!(resp.status(), 200);

    for evaluation_id in &evaluation_ids {
        let resp = fixture
            .get(&format!("/api/evaluations/{}", evaluation_id))
            .await;
        assert_eq!(resp.status(), 404);
    }

    let creator = fixture.user_json(&alice.id).await;
    assert_eq!(creator["designs"], json!([other]));

    let bob_json = fixture.user_json(&bob.id).await;
    assert_eq!(bob_json["evaluations"].as_array().unwrap().len(), 1);
    assert_eq!(
        bob_json["contributions"],
        json!([{"design": other, "contributionWeight": 0.1}])
    );

    let resp = fixture.get(&format!("/api/evaluations/design/{}", id)).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 0);
}

// ========== Evaluations & the contribution ledger ==========

#[tokio::test]
async fn test_modification_creates_and_delete_reverses_contribution() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let bob = fixture.register("bob").await;

    let design_id = fixture.create_design(&alice, "Red Jacket").await;

    let resp = fixture
        .evaluate(&bob, &design_id, json!({"rating": 4, "modifiedImageUrl": "x"}))
        .await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let evaluation_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["status"], "pending");

    let design = fixture.design_json(&design_id).await;
    assert_eq!(contributor_ids(&design), vec![bob.id.clone()]);
    assert_eq!(design["contributors"][0]["contributionWeight"], 0.1);
    assert_eq!(design["evaluations"][0]["id"], evaluation_id);

    let user = fixture.user_json(&bob.id).await;
    assert_eq!(
        user["contributions"],
        json!([{"design": design_id, "contributionWeight": 0.1}])
    );
    assert_eq!(user["evaluations"], json!([evaluation_id]));

    let resp = fixture
        .delete_as(&format!("/api/evaluations/{}", evaluation_id), &bob)
        .await;
    assert_eq!(resp.status(), 200);

    let design = fixture.design_json(&design_id).await;
    assert!(design["contributors"].as_array().unwrap().is_empty());
    assert!(design["evaluations"].as_array().unwrap().is_empty());

    let user = fixture.user_json(&bob.id).await;
    assert!(user["contributions"].as_array().unwrap().is_empty());
    assert!(user["evaluations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_rating_only_evaluation_adds_no_contributor() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;

    let design_id = fixture.create_design(&alice, "Red Jacket").await;

    let resp = fixture
        .evaluate(&alice, &design_id, json!({"rating": 5}))
        .await;
    assert_eq!(resp.status(), 201);

    let design = fixture.design_json(&design_id).await;
    assert_eq!(design["evaluations"].as_array().unwrap().len(), 1);
    assert!(design["contributors"].as_array().unwrap().is_empty());

    let user = fixture.user_json(&alice.id).await;
    assert!(user["contributions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_modification_fields_do_not_count() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let bob = fixture.register("bob").await;

    let design_id = fixture.create_design(&alice, "Red Jacket").await;

    let resp = fixture
        .evaluate(
            &bob,
            &design_id,
            json!({"modifications": {}, "modifiedImageUrl": "", "modifiedDesignData": null}),
        )
        .await;
    assert_eq!(resp.status(), 201);

    let design = fixture.design_json(&design_id).await;
    assert!(design["contributors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_evaluation_is_rejected_without_side_effects() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let bob = fixture.register("bob").await;

    let design_id = fixture.create_design(&alice, "Red Jacket").await;

    let resp = fixture
        .evaluate(&bob, &design_id, json!({"rating": 3, "modifiedImageUrl": "x"}))
        .await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let first_id = body["data"]["id"].as_str().unwrap().to_string();

    let resp = fixture
        .evaluate(&bob, &design_id, json!({"rating": 1, "modifications": {"hem": "raw"}}))
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "You have already evaluated this design");

    let resp = fixture.get(&format!("/api/evaluations/{}", first_id)).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["rating"], 3);

    let design = fixture.design_json(&design_id).await;
    assert_eq!(design["evaluations"].as_array().unwrap().len(), 1);
    assert_eq!(contributor_ids(&design), vec![bob.id.clone()]);

    let user = fixture.user_json(&bob.id).await;
    assert_eq!(user["contributions"].as_array().unwrap().len(), 1);
}

/// Check that the design's ledger agrees with the stored evaluation.
async fn assert_ledger_matches(
    fixture: &TestFixture,
    design_id: &str,
    evaluation_id: &str,
    evaluator: &Account,
) {
    let resp = fixture
        .get(&format!("/api/evaluations/{}", evaluation_id))
        .await;
    let design = fixture.design_json(design_id).await;
    let contributors = contributor_ids(&design);

    if resp.status() == 404 {
        assert!(contributors.is_empty());
        return;
    }
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let evaluation = &body["data"];
    let modified = crate::models::carries_modifications(
        evaluation.get("modifications"),
        evaluation["modifiedImageUrl"].as_str(),
        evaluation.get("modifiedDesignData"),
    );
    if modified {
        assert_eq!(contributors, vec![evaluator.id.clone()]);
    } else {
        assert!(contributors.is_empty());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_evaluations() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let bob = fixture.register("bob").await;

    for round in 0..10 {
        let design_id = fixture
            .create_design(&alice, &format!("Jacket {}", round))
            .await;
        let extra = json!({"rating": 4, "modifications": {"hem": "raw"}});

        let (first, second) = tokio::join!(
            fixture.evaluate(&bob, &design_id, extra.clone()),
            fixture.evaluate(&bob, &design_id, extra.clone()),
        );
        let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
        statuses.sort();
        assert_eq!(statuses, vec![201, 400]);

        let design = fixture.design_json(&design_id).await;
        assert_eq!(design["evaluations"].as_array().unwrap().len(), 1);
        assert_eq!(contributor_ids(&design), vec![bob.id.clone()]);
    }

    let user = fixture.user_json(&bob.id).await;
    assert_eq!(user["contributions"].as_array().unwrap().len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_keep_ledger_in_step() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let bob = fixture.register("bob").await;

    for round in 0..20 {
        let design_id = fixture
            .create_design(&alice, &format!("Jacket {}", round))
            .await;
        let resp = fixture
            .evaluate(&bob, &design_id, json!({"modifiedImageUrl": "x"}))
            .await;
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        let evaluation_id = body["data"]["id"].as_str().unwrap().to_string();
        let path = format!("/api/evaluations/{}", evaluation_id);

        // One side clears the image, the other adds structured modifications
        let (cleared, added) = tokio::join!(
            fixture.put_as(&path, &bob, json!({"modifiedImageUrl": ""})),
            fixture.put_as(&path, &bob, json!({"modifications": {"hem": "raw"}})),
        );
        assert_eq!(cleared.status(), 200);
        assert_eq!(added.status(), 200);

        assert_ledger_matches(&fixture, &design_id, &evaluation_id, &bob).await;

        // Clearing and adding the same field races toward either end state
        let (cleared, added) = tokio::join!(
            fixture.put_as(&path, &bob, json!({"modifications": {}})),
            fixture.put_as(&path, &bob, json!({"modifications": {"collar": "wide"}})),
        );
        assert_eq!(cleared.status(), 200);
        assert_eq!(added.status(), 200);

        assert_ledger_matches(&fixture, &design_id, &evaluation_id, &bob).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_update_and_delete() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let bob = fixture.register("bob").await;

    for round in 0..20 {
        let design_id = fixture
            .create_design(&alice, &format!("Jacket {}", round))
            .await;
        let resp = fixture.evaluate(&bob, &design_id, json!({"rating": 3})).await;
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        let evaluation_id = body["data"]["id"].as_str().unwrap().to_string();
        let path = format!("/api/evaluations/{}", evaluation_id);

        let (updated, deleted) = tokio::join!(
            fixture.put_as(&path, &bob, json!({"modifications": {"hem": "raw"}})),
            fixture.delete_as(&path, &bob),
        );
        assert_eq!(deleted.status(), 200);
        assert!(
            [200, 404].contains(&updated.status().as_u16()),
            "unexpected update status {}",
            updated.status()
        );

        let resp = fixture.get(&path).await;
        assert_eq!(resp.status(), 404);
        assert_ledger_matches(&fixture, &design_id, &evaluation_id, &bob).await;
    }

    let user = fixture.user_json(&bob.id).await;
    assert!(user["contributions"].as_array().unwrap().is_empty());
    assert!(user["evaluations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_contributors_track_current_evaluations() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let bob = fixture.register("bob").await;
    let carol = fixture.register("carol").await;
    let dave = fixture.register("dave").await;

    let design_id = fixture.create_design(&alice, "Red Jacket").await;

    let mut ids = Vec::new();
    for (account, extra) in [
        (&bob, json!({"modifiedImageUrl": "b"})),
        (&carol, json!({"modifiedDesignData": {"collar": "wide"}})),
        (&dave, json!({"rating": 4})),
    ] {
        let resp = fixture.evaluate(account, &design_id, extra).await;
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        ids.push(body["data"]["id"].as_str().unwrap().to_string());
    }

    let design = fixture.design_json(&design_id).await;
    let mut contributors = contributor_ids(&design);
    contributors.sort();
    let mut expected = vec![bob.id.clone(), carol.id.clone()];
    expected.sort();
    assert_eq!(contributors, expected);

    // Removing bob leaves carol's entry untouched
    let resp = fixture
        .delete_as(&format!("/api/evaluations/{}", ids[0]), &bob)
        .await;
    assert_eq!(resp.status(), 200);
    let design = fixture.design_json(&design_id).await;
    assert_eq!(contributor_ids(&design), vec![carol.id.clone()]);

    // Dave gains modification data through an update
    let resp = fixture
        .put_as(
            &format!("/api/evaluations/{}", ids[2]),
            &dave,
            json!({"modifications": {"pocket": "patch"}}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let design = fixture.design_json(&design_id).await;
    let mut contributors = contributor_ids(&design);
    contributors.sort();
    let mut expected = vec![carol.id.clone(), dave.id.clone()];
    expected.sort();
    assert_eq!(contributors, expected);

    // Carol clears hers
    let resp = fixture
        .put_as(
            &format!("/api/evaluations/{}", ids[1]),
            &carol,
            json!({"modifiedDesignData": {}}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let design = fixture.design_json(&design_id).await;
    assert_eq!(contributor_ids(&design), vec![dave.id.clone()]);

    let carol_json = fixture.user_json(&carol.id).await;
    assert!(carol_json["contributions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_evaluation_validation() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let bob = fixture.register("bob").await;

    let design_id = fixture.create_design(&alice, "Red Jacket").await;

    let resp = fixture.evaluate(&bob, &design_id, json!({"rating": 6})).await;
    assert_eq!(resp.status(), 400);

    let resp = fixture.evaluate(&bob, "missing", json!({"rating": 3})).await;
    assert_eq!(resp.status(), 404);

    let resp = fixture.evaluate(&bob, &design_id, json!({"rating": 3})).await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();

    for invalid in [json!({"rating": 0}), json!({"aiScore": 101.0}), json!({"status": "lost"})] {
        let resp = fixture
            .put_as(&format!("/api/evaluations/{}", id), &bob, invalid)
            .await;
        assert_eq!(resp.status(), 400);
    }

    let resp = fixture
        .put_as(
            &format!("/api/evaluations/{}", id),
            &bob,
            json!({"status": "approved", "aiScore": 87.5, "comment": "Nice drape"}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "approved");
    assert_eq!(body["data"]["aiScore"], 87.5);
    assert_eq!(body["data"]["rating"], 3);
}

#[tokio::test]
async fn test_evaluation_mutation_requires_owner_or_admin() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let bob = fixture.register("bob").await;
    let admin = fixture.register_admin("root").await;

    let design_id = fixture.create_design(&alice, "Red Jacket").await;
    let resp = fixture
        .evaluate(&bob, &design_id, json!({"rating": 4, "modifiedImageUrl": "x"}))
        .await;
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // The design owner is not the evaluation owner
    let resp = fixture
        .put_as(&format!("/api/evaluations/{}", id), &alice, json!({"rating": 1}))
        .await;
    assert_eq!(resp.status(), 403);
    let resp = fixture
        .delete_as(&format!("/api/evaluations/{}", id), &alice)
        .await;
    assert_eq!(resp.status(), 403);

    let design = fixture.design_json(&design_id).await;
    assert_eq!(contributor_ids(&design), vec![bob.id.clone()]);
    assert_eq!(design["evaluations"][0]["rating"], 4);

    let resp = fixture
        .delete_as(&format!("/api/evaluations/{}", id), &admin)
        .await;
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .delete_as(&format!("/api/evaluations/{}", id), &admin)
        .await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_evaluation_listings() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let bob = fixture.register("bob").await;

    let first = fixture.create_design(&alice, "First").await;
    let second = fixture.create_design(&alice, "Second").await;

    fixture.evaluate(&bob, &first, json!({"rating": 2})).await;
    fixture.evaluate(&bob, &second, json!({"rating": 5})).await;
    fixture.evaluate(&alice, &second, json!({"rating": 4})).await;

    let resp = fixture.get("/api/evaluations").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 3);
    assert_eq!(body["data"][0]["evaluator"]["username"], "alice");
    assert_eq!(body["data"][0]["designSummary"]["name"], "Second");

    let resp = fixture.get(&format!("/api/evaluations/design/{}", second)).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 2);

    let resp = fixture.get(&format!("/api/evaluations/user/{}", bob.id)).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 2);
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .all(|e| e["user"] == bob.id));
}

// ========== AI tools ==========

#[tokio::test]
async fn test_ai_tools_require_auth() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/ai-tools/render-texture"))
        .json(&json!({"objectId": 1, "textureId": 2}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_detect_objects() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;

    let part = reqwest::multipart::Part::bytes(vec![0x89, b'P', b'N', b'G'])
        .file_name("look.png")
        .mime_str("image/png")
        .unwrap();
    let form = reqwest::multipart::Form::new().part("image", part);
    let resp = fixture
        .authed(
            fixture.client.post(fixture.url("/api/ai-tools/detect-objects")),
            &alice,
        )
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["objects"].as_array().unwrap().len(), 2);
    assert!(body["data"]["objects"][0]["bbox"]["width"].is_number());

    let form = reqwest::multipart::Form::new().text("note", "no image here");
    let resp = fixture
        .authed(
            fixture.client.post(fixture.url("/api/ai-tools/detect-objects")),
            &alice,
        )
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_ai_tool_pipeline() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;

    let resp = fixture
        .post_as(
            "/api/ai-tools/render-texture",
            &alice,
            json!({"objectId": 1, "textureId": "denim", "settings": {"scale": 1.5}}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["objectId"], 1);
    assert!(body["data"]["renderedImageUrl"].is_string());

    let resp = fixture
        .post_as(
            "/api/ai-tools/apply-to-model",
            &alice,
            json!({"objectId": 1, "textureId": "denim", "modelType": "female", "poseType": "walking"}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["poseType"], "walking");
    assert!(body["data"]["previewUrl"].is_string());

    let resp = fixture
        .post_as(
            "/api/ai-tools/extract-pattern",
            &alice,
            json!({"modeledObjectId": 1, "fabricType": "cotton", "patternSize": "M"}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["objectId"], 1);
    assert_eq!(body["data"]["fabricType"], "cotton");
    assert!(!body["data"]["patternPieces"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_ai_update_design() {
    let fixture = TestFixture::new().await;
    let alice = fixture.register("alice").await;
    let design_id = fixture.create_design(&alice, "Red Jacket").await;

    let resp = fixture
        .post_as(
            "/api/ai-tools/update-design",
            &alice,
            json!({"designId": design_id, "evaluations": []}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let previous = body["data"]["previousProgress"].as_u64().unwrap();
    let next = body["data"]["newProgress"].as_u64().unwrap();
    assert_eq!(next, (previous + 15).min(100));

    let resp = fixture
        .post_as(
            "/api/ai-tools/update-design",
            &alice,
            json!({"designId": "missing"}),
        )
        .await;
    assert_eq!(resp.status(), 404);
}

// ========== Error disclosure ==========

#[tokio::test]
async fn test_client_errors_are_not_masked_in_production() {
    let fixture = TestFixture::with_environment("production").await;

    let resp = fixture.get("/api/designs/missing").await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Design not found");
}
