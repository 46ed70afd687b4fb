//! `jobwatch-core`: domain types shared by every pipeline stage.
//!
//! This crate contains **pure domain** primitives (no I/O, no runtime).

pub mod error;
pub mod id;
pub mod listing;
pub mod posting;
pub mod rating;

pub use error::{DomainError, DomainResult};
pub use id::{DeliveryId, JobUrl};
pub use listing::JobListing;
pub use posting::JobPosting;
pub use rating::{MatchRating, rating_score};
