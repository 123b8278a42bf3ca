pub mod exchange_client;
pub mod executor;
pub mod image_extractor;
pub mod notifier;
pub mod stores;
