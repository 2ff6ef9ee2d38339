pub mod checkpoint_repository;
pub mod database;
pub mod token_repository;

pub use checkpoint_repository::{Checkpoint, CheckpointRepository};
pub use database::Database;
pub use token_repository::TokenRepository;
