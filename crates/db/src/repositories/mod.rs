//! Repository structs with static async methods over `&PgPool`, plus the
//! port adapters built on them.

pub mod catalog_repo;
pub mod journey_repo;
pub mod pg_store;

pub use catalog_repo::{QuestionRepo, StageCatalogRepo};
pub use journey_repo::JourneyRepo;
pub use pg_store::{PgCatalog, PgJourneyStore};
