pub mod identity;
pub mod job_store;
pub mod ledger_store;
pub mod object_store;
pub mod provider_gateway;
