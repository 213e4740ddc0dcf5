//! Billbook library
//!
//! Invoicing and light bookkeeping engine: document math, numbering and
//! recurrence, an in-memory entity store, and persistence to a local JSON
//! cache with debounced sync to a remote file store.

pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod services;
pub mod store;

pub use app::AppContext;
pub use config::EngineOptions;
pub use error::{AppError, Result, SyncError};
