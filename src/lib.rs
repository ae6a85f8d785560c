// Library surface for the binary, headless runs and integration tests.
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod controller;
pub mod error;
pub mod games;
pub mod metrics;
pub mod runtime;
pub mod session;
pub mod sound;
pub mod stats;
pub mod timers;
pub mod ui;
pub mod words;

pub use error::{Error, Result};
