//! Process-wide logging setup shared by binaries and services.

pub mod logging;

pub use logging::{LogFormat, init, init_with};
