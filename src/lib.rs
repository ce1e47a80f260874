pub mod config;
pub mod error;
pub mod exercise;
pub mod geometry;
pub mod landmark;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod session;
pub mod source;
