pub mod consumption_repository;
pub mod error;
pub mod models;
pub mod pool;

pub use consumption_repository::ConsumptionRepository;
pub use error::DbError;
pub use models::*;
pub use pool::connect;
