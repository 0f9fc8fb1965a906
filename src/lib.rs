pub mod config;
pub mod node;
pub mod services;
pub mod url;
