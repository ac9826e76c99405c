pub mod error;
pub mod types;
pub mod config;
pub mod logging;

pub use config::{BufferConfig, DocConfig, JsonConfig, LogConfig};
pub use error::{TronError, TronResult};
pub use logging::init_logging;
pub use types::RootKind;
