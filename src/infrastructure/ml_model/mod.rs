//! MLModel infrastructure module

mod postgres_repository;
mod repository;

pub use postgres_repository::PostgresMlModelRepository;
pub use repository::InMemoryMlModelRepository;
