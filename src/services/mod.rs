pub mod chat;
pub mod classifier;
pub mod display;
pub mod links;
pub mod markdown;
