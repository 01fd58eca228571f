//! Feedback infrastructure module

mod postgres_repository;
mod repository;
mod service;

pub use postgres_repository::PostgresFeedbackRepository;
pub use repository::InMemoryFeedbackRepository;
pub use service::FeedbackService;
