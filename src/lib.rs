pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod session;
pub mod shell;

pub use config::AppConfig;
pub use core::{Analysis, SyncConfig, SyncDirection, SyncEngine, SyncReport, SyncRequest, SyncRoots};
pub use error::{CopyError, SyncError};
pub use session::Session;
pub use shell::Shell;

/// 默认配置目录: <平台配置目录>/dirsync
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::config_dir()
        .map(|p| p.join("dirsync"))
        .unwrap_or_else(|| std::path::PathBuf::from(".dirsync"))
}
