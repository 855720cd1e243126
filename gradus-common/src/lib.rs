//! # Gradus Common Library
//!
//! Shared code for the Gradus project-tracking services including:
//! - Domain models (phase templates, instances, revisions, tasks)
//! - Phase status enum and current-status derivation
//! - Event types (GradusEvent enum) and EventBus
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod status;

pub use error::{Error, Result};
pub use status::{current_status, PhaseStatus};
