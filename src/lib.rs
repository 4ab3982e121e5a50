pub mod app;
pub mod backend;
pub mod config;
pub mod guard;
pub mod poller;
pub mod stats;
pub mod ui;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_utils;

pub use sorter_common::interface;
