pub mod job_store_postgres;
pub mod ledger_store_postgres;
pub(crate) mod utils;
