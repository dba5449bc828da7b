pub mod search_result;
pub mod usage;

pub use search_result::*;
pub use usage::*;
