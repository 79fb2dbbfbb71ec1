//! Model catalogue: parsing `opencode models` output and running the command.

pub mod catalog;
pub mod lister;

pub use catalog::{group_by_provider, parse_model_catalog, ModelCatalogEntry};
pub use lister::{list_catalog, CommandCandidate, ModelListing, ModelLister, ModelSource};
