//! Database module: insert/view models and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: insert and view models passed to and from repositories.
//! - `repo`: SQL-only functions that map rows into domain entities.
//!
//! External modules should import from `brandcast::db`; the repository API
//! and the insert models are re-exported here.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{NewInvoice, NewScheduledPost};
