//! apkforge Core - shared configuration and error types
//!
//! Everything the toolchain resolver and the build engine need to agree on
//! before a build starts: where the SDK lives, what the app looks like on disk,
//! and how to sign and deploy it.

pub mod config;
pub mod error;

pub use config::{AndroidConfig, AppLayout, BuildSettings, DeployConfig, ForgeConfig, SigningConfig};
pub use error::{ForgeError, Result};

/// apkforge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "apkforge";

/// Name of the project-local configuration file
pub const CONFIG_FILE_NAME: &str = "apkforge.toml";
