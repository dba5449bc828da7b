pub mod assets;
pub mod config;
pub mod credentials;
pub mod database;
pub mod errors;
pub mod maintenance;
pub mod metrics;
pub mod models;
pub mod repositories;
pub mod services;
pub mod sources;
pub mod utils;
