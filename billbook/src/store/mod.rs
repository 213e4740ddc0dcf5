//! Entity store module
//!
//! This module provides the in-memory data layer:
//! - Model definitions (the persisted JSON shape)
//! - The shared `Store` handle with atomic mutations and commit notification

pub mod models;
pub mod repository;

pub use models::*;
pub use repository::{CommitListener, Store};
