pub mod aggregate;
pub mod model;
pub mod repository;
pub mod repository_sqlx;
pub mod scheduler;
