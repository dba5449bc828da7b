//! Services built on top of the repositories and the upstream source

pub mod gateway;
pub mod synthetic;
pub mod thumbnail;

pub use gateway::Gateway;
pub use synthetic::generate_synthetic_results;
pub use thumbnail::ThumbnailService;
