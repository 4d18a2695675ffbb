pub mod auth;
pub mod credits;
pub mod error;
pub mod job;
pub mod preset;
pub mod pricing;
pub mod provider;
