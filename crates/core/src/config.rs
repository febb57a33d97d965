//! Build Configuration
//!
//! Loads `apkforge.toml` and manages:
//! - Android SDK/NDK locations and version overrides
//! - The on-disk layout of the app being packaged
//! - Signing and deployment settings

use std::env;
use std::path::{Path, PathBuf};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ForgeError, Result};

/// Default minimum API level the app is built for
pub const DEFAULT_MIN_SDK: u32 = 26;

/// Default timeout for a single build step
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 600;

/// Android SDK configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AndroidConfig {
    /// Path to Android SDK
    pub sdk_path: Option<PathBuf>,
    /// Path to Android NDK
    pub ndk_path: Option<PathBuf>,
    /// Explicit build-tools version, e.g. "35.0.0"
    pub build_tools: Option<String>,
    /// Explicit target API level
    pub api_level: Option<u32>,
    /// Minimum SDK version
    pub min_sdk: Option<u32>,
}

impl AndroidConfig {
    /// Get Android SDK path: configured value, then environment, then common locations
    pub fn sdk_root(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.sdk_path {
            return Some(path.clone());
        }

        for var in ["ANDROID_HOME", "ANDROID_SDK_ROOT"] {
            if let Some(path) = env_path(var) {
                debug!("Using SDK from ${}", var);
                return Some(path);
            }
        }

        let candidates = if cfg!(windows) {
            vec![dirs::data_local_dir().map(|d| d.join("Android").join("Sdk"))]
        } else {
            vec![
                dirs::home_dir().map(|h| h.join("Android").join("Sdk")),
                dirs::home_dir().map(|h| h.join("Library").join("Android").join("sdk")),
                Some(PathBuf::from("/opt/android-sdk")),
            ]
        };

        candidates.into_iter().flatten().find(|p| p.is_dir())
    }

    /// Get Android NDK path from configuration or environment.
    ///
    /// Returns `None` when neither is set; the caller then falls back to the
    /// NDKs installed inside the SDK.
    pub fn ndk_root(&self) -> Option<PathBuf> {
        self.ndk_path
            .clone()
            .or_else(|| env_path("ANDROID_NDK_HOME"))
            .or_else(|| env_path("NDK_ROOT"))
    }

    /// Effective minimum SDK policy
    pub fn min_sdk(&self) -> u32 {
        self.min_sdk.unwrap_or(DEFAULT_MIN_SDK)
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(|v| absolute(PathBuf::from(v)))
}

/// Anchor a relative path given on the command line or in the environment at
/// the working directory
pub fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() || path.as_os_str().is_empty() {
        return path;
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(e) => {
            debug!("Cannot read working directory: {}", e);
            path
        }
    }
}

/// On-disk layout of the application being packaged
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppLayout {
    /// Artifact base name (`<name>.apk`)
    pub name: String,
    /// Java package of the entry point, e.g. "com.example.app"
    pub package: Option<String>,
    /// AndroidManifest.xml
    pub manifest: PathBuf,
    /// Java sources of the entry-point activity
    pub java_dir: PathBuf,
    /// Android resources (optional)
    pub res_dir: Option<PathBuf>,
    /// Raw assets (optional)
    pub assets_dir: Option<PathBuf>,
    /// The compiled native library to ship, e.g. `target/aarch64-linux-android/release/libmain.so`
    pub native_lib: PathBuf,
}

impl Default for AppLayout {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            package: None,
            manifest: PathBuf::from("AndroidManifest.xml"),
            java_dir: PathBuf::from("java"),
            res_dir: None,
            assets_dir: None,
            native_lib: PathBuf::from("libmain.so"),
        }
    }
}

/// Build settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildSettings {
    /// Build directory for intermediates and the final APK
    pub output_dir: PathBuf,
    /// Upper bound for a single external tool invocation
    pub step_timeout_secs: u64,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("build"),
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
        }
    }
}

/// Signing settings. Defaults to the Android debug keystore.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SigningConfig {
    pub keystore: PathBuf,
    pub alias: String,
    pub store_password: String,
    /// Key password (if different from keystore password)
    pub key_password: Option<String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            keystore: debug_keystore(),
            alias: "androiddebugkey".to_string(),
            store_password: "android".to_string(),
            key_password: None,
        }
    }
}

impl SigningConfig {
    /// Get the effective key password
    pub fn effective_key_password(&self) -> &str {
        self.key_password.as_deref().unwrap_or(&self.store_password)
    }
}

/// Location of the debug keystore created by the Android tooling
pub fn debug_keystore() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".android")
        .join("debug.keystore")
}

/// Deployment settings
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeployConfig {
    /// Target device serial; the only attached device when unset
    pub device_serial: Option<String>,
}

/// Main project configuration (`apkforge.toml`)
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForgeConfig {
    pub android: AndroidConfig,
    pub app: AppLayout,
    pub build: BuildSettings,
    pub signing: SigningConfig,
    pub deploy: DeployConfig,
}

impl ForgeConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from file. A missing file yields the defaults.
    ///
    /// Relative paths in the file are taken relative to the file's directory.
    pub async fn load(path: &Path) -> Result<Self> {
        let cwd = env::current_dir()?;
        let base = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => cwd.join(parent),
            _ => cwd,
        };

        let config = if path.exists() {
            debug!("Loading config from {:?}", path);
            let contents = tokio::fs::read_to_string(path).await?;
            Self::from_toml(&contents)?
        } else {
            info!("{:?} not found, using defaults", path);
            Self::default()
        };

        Ok(config.anchored_at(&base))
    }

    /// Make every relative path absolute against `base`
    pub fn anchored_at(mut self, base: &Path) -> Self {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() && !p.as_os_str().is_empty() {
                *p = base.join(&*p);
            }
        };

        if let Some(p) = self.android.sdk_path.as_mut() {
            anchor(p);
        }
        if let Some(p) = self.android.ndk_path.as_mut() {
            anchor(p);
        }
        anchor(&mut self.app.manifest);
        anchor(&mut self.app.java_dir);
        if let Some(p) = self.app.res_dir.as_mut() {
            anchor(p);
        }
        if let Some(p) = self.app.assets_dir.as_mut() {
            anchor(p);
        }
        anchor(&mut self.app.native_lib);
        anchor(&mut self.build.output_dir);
        anchor(&mut self.signing.keystore);
        self
    }

    /// Check the fields that no amount of SDK discovery can fill in
    pub fn validate(&self) -> Result<()> {
        if self.app.name.trim().is_empty() {
            return Err(ForgeError::Config("app.name must not be empty".into()));
        }
        if self.build.step_timeout_secs == 0 {
            return Err(ForgeError::Config("build.step_timeout_secs must be positive".into()));
        }
        if let Some(level) = self.android.api_level {
            if level > u8::MAX as u32 {
                return Err(ForgeError::Config(format!(
                    "android.api_level {} is out of range",
                    level
                )));
            }
        }
        if self.android.min_sdk() > u8::MAX as u32 {
            return Err(ForgeError::Config(format!(
                "android.min_sdk {} is out of range",
                self.android.min_sdk()
            )));
        }
        Ok(())
    }
}
