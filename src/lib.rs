//! amil keeps the books of a village zakat and infaq collection: income transactions, contributors
//! and recipients live in a hosted backend, and this crate reads and writes them, rolls income up
//! per sub-region, exports documents and watches tables for changes.

pub mod api;
pub mod args;
pub mod collate;
pub mod commands;
mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod report;
pub mod session;
mod utils;

#[cfg(test)]
mod test;

pub use api::Mode;
pub use config::{Config, Settings};
pub use error::Error;
pub use error::Result;
