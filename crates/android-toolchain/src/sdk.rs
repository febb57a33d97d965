//! SDK Layout
//!
//! Paths inside an Android SDK installation and the build tools apkforge
//! drives from it.

use std::fmt;
use std::path::{Path, PathBuf};
use serde::Serialize;

use crate::version::VersionNumber;

/// Executables required from a build-tools directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuildTool {
    Aapt2,
    D8,
    Zipalign,
    Apksigner,
}

impl BuildTool {
    /// Every tool the pipeline needs, in the order they are checked
    pub const ALL: [BuildTool; 4] = [
        BuildTool::Aapt2,
        BuildTool::D8,
        BuildTool::Zipalign,
        BuildTool::Apksigner,
    ];

    /// Tool name without platform suffix
    pub fn name(&self) -> &'static str {
        match self {
            BuildTool::Aapt2 => "aapt2",
            BuildTool::D8 => "d8",
            BuildTool::Zipalign => "zipalign",
            BuildTool::Apksigner => "apksigner",
        }
    }

    /// File name inside `build-tools/<version>/` on the current host.
    /// `d8` and `apksigner` are batch wrappers on Windows.
    pub fn file_name(&self) -> String {
        if cfg!(windows) {
            match self {
                BuildTool::Aapt2 | BuildTool::Zipalign => format!("{}.exe", self.name()),
                BuildTool::D8 | BuildTool::Apksigner => format!("{}.bat", self.name()),
            }
        } else {
            self.name().to_string()
        }
    }

    /// `<sdk>/build-tools/<version>/<tool>`
    pub fn path(&self, sdk_root: &Path, build_tools_version: &str) -> PathBuf {
        build_tools_dir(sdk_root, build_tools_version).join(self.file_name())
    }
}

impl fmt::Display for BuildTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `<sdk>/platforms`
pub fn platforms_root(sdk_root: &Path) -> PathBuf {
    sdk_root.join("platforms")
}

/// `<sdk>/platforms/android-<api>`
pub fn platform_dir(sdk_root: &Path, api_level: VersionNumber) -> PathBuf {
    platforms_root(sdk_root).join(format!("android-{}", api_level))
}

/// `<sdk>/platforms/android-<api>/android.jar`
pub fn android_jar(sdk_root: &Path, api_level: VersionNumber) -> PathBuf {
    platform_dir(sdk_root, api_level).join("android.jar")
}

/// `<sdk>/build-tools`
pub fn build_tools_root(sdk_root: &Path) -> PathBuf {
    sdk_root.join("build-tools")
}

/// `<sdk>/build-tools/<version>`
pub fn build_tools_dir(sdk_root: &Path, version: &str) -> PathBuf {
    build_tools_root(sdk_root).join(version)
}

/// `<sdk>/platform-tools/adb`
pub fn adb(sdk_root: &Path) -> PathBuf {
    sdk_root
        .join("platform-tools")
        .join(if cfg!(windows) { "adb.exe" } else { "adb" })
}

/// `sdkmanager` package names, used to phrase install suggestions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkPackage {
    Platform(VersionNumber),
    BuildTools(String),
    Ndk(String),
}

impl SdkPackage {
    /// Get the SDK manager package name
    pub fn package_name(&self) -> String {
        match self {
            SdkPackage::Platform(api) => format!("platforms;android-{}", api),
            SdkPackage::BuildTools(version) => format!("build-tools;{}", version),
            SdkPackage::Ndk(version) => format!("ndk;{}", version),
        }
    }

    /// Shell command that installs this package
    pub fn install_hint(&self) -> String {
        format!("sdkmanager \"{}\"", self.package_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_paths() {
        let sdk = Path::new("/sdk");
        let path = BuildTool::Aapt2.path(sdk, "35.0.0");
        assert!(path.starts_with("/sdk/build-tools/35.0.0"));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("aapt2"));
        assert_eq!(BuildTool::ALL.len(), 4);
        assert_eq!(BuildTool::Apksigner.to_string(), "apksigner");
    }

    #[test]
    fn test_platform_paths() {
        let sdk = Path::new("/sdk");
        assert_eq!(platform_dir(sdk, 35), PathBuf::from("/sdk/platforms/android-35"));
        assert_eq!(android_jar(sdk, 30), PathBuf::from("/sdk/platforms/android-30/android.jar"));
    }

    #[test]
    fn test_install_hint() {
        assert_eq!(SdkPackage::Platform(34).install_hint(), "sdkmanager \"platforms;android-34\"");
        assert_eq!(SdkPackage::BuildTools("35.0.0".into()).package_name(), "build-tools;35.0.0");
        assert_eq!(SdkPackage::Ndk("27.0.12077973".into()).package_name(), "ndk;27.0.12077973");
    }
}
