pub mod billing;
pub mod generation;
