pub mod body_decoder;
pub mod image_fetcher;
pub mod intake_service;
pub mod object_store;
pub mod table_store;
