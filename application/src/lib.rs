#[cfg(any(
    feature = "adapters",
    feature = "axum",
    feature = "sqlx",
    feature = "reqwest"
))]
compile_error!("application must not depend on adapters/framework crates");

pub mod billing;
pub mod config;
pub mod contracts;
pub mod error;
pub mod generation;
pub mod infrastructure_config;
pub mod ports;
