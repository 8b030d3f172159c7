//! In-memory game catalog: models, the shared store, random generation and seeding.

pub mod generator;
pub mod models;
pub mod seed;
pub mod store;

pub use generator::{GameGenerator, GenerationError};
pub use models::{Company, Game};
pub use store::CatalogStore;
