//! Data models for the collective design platform.
//!
//! Field names serialize in camelCase to match the SPA's JSON contract.

mod ai;
mod design;
mod evaluation;
mod user;

pub use ai::*;
pub use design::*;
pub use evaluation::*;
pub use user::*;
