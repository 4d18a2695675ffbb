pub mod identity_client;
