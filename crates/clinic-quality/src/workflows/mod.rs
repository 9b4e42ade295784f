//! Quality and program metrics engine plus research-enrollment rules.

pub mod quality;
pub mod research;
mod store;
mod validation;

pub use store::RepositoryError;
pub use validation::ValidationError;
