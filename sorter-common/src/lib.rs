pub mod interface;
pub mod utils;

pub use utils::{format_size, percentage};
