pub mod config;
pub mod log;
pub mod response;
pub mod state;

pub use config::*;
pub use log::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use response::*;
pub use state::*;
