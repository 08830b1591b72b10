pub mod assistant;
pub mod catalog;
pub mod chat;
pub mod context;
pub mod transcript;
pub mod voice;
