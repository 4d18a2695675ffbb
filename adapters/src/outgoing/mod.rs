pub mod http_identity;
pub mod http_storage;
pub mod postgres_sqlx;
pub mod providers;
