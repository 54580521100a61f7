// region:    --- Modules
pub mod agent;
pub mod cli;
pub mod config;
pub mod consumer;
pub mod decoder;
mod error;
pub mod event;
pub mod publisher;
pub mod sampler;
pub mod scheduler;
pub mod supervisor;
pub mod trx;
pub mod workers;
// endregion: --- Modules

pub use self::error::{Error, Result};
