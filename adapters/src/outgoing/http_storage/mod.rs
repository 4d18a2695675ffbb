pub mod object_store_http;
