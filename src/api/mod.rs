//! Remote API calls: project listing and entity operations.
//!
//! Everything here is implemented on [`Session`](crate::Session).

mod entities;
mod projects;
pub mod types;

pub use types::{Project, Tag, User, parse_project_listing};
