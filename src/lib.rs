pub mod clients;
pub mod config;
pub mod error;
pub mod fm;
pub mod paths;
pub mod reindex;
pub mod security;
pub mod server;
