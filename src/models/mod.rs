//! Core data models for the parcel logistics backend.
//!
//! These entities map to database tables via `sqlx::FromRow` and serialize
//! as JSON via `serde`. Request payloads (`New*`, `*Patch`) live beside the
//! row type they produce.

pub mod package;
pub mod package_history;
pub mod package_rate;
pub mod storage_block;
