pub mod config;
pub mod http;
pub mod image_modifier;
pub mod image_processing;
