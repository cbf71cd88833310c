//! Root command wiring of crunchy-cli.
//!
//! The binary only calls [`dispatcher::execute`], everything else is exposed for
//! integration tests.

pub mod client;
pub mod commands;
pub mod context;
pub mod dispatcher;
pub mod downloader;
pub mod error;
pub mod logger;
pub mod progress;
pub mod session;
pub mod utils;

#[doc(hidden)]
pub use commands::Args;
pub use reqwest;
