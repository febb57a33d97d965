//! NDK Layout
//!
//! Paths inside an Android NDK installation and the record describing one
//! discovered NDK.

use std::path::{Path, PathBuf};
use serde::Serialize;
use tracing::debug;

use crate::inventory::{file_exists, find_highest_ndk_api_level};
use crate::version::{parse_ndk_version, VersionNumber};

/// Target ABI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Abi {
    Arm64V8a,
    ArmeabiV7a,
    X86,
    X86_64,
}

impl Abi {
    /// Get the NDK triple for this ABI, as used under `sysroot/usr/lib`
    pub fn ndk_triple(&self) -> &'static str {
        match self {
            Abi::Arm64V8a => "aarch64-linux-android",
            Abi::ArmeabiV7a => "arm-linux-androideabi",
            Abi::X86 => "i686-linux-android",
            Abi::X86_64 => "x86_64-linux-android",
        }
    }

    /// Get the ABI name as used in APK lib directory
    pub fn abi_name(&self) -> &'static str {
        match self {
            Abi::Arm64V8a => "arm64-v8a",
            Abi::ArmeabiV7a => "armeabi-v7a",
            Abi::X86 => "x86",
            Abi::X86_64 => "x86_64",
        }
    }
}

/// The single architecture apkforge builds native code for
pub const TARGET_ABI: Abi = Abi::Arm64V8a;

/// Detect the host platform tag of the NDK's prebuilt LLVM toolchain.
///
/// The NDK only ships x86_64 host binaries; Apple Silicon runs them under Rosetta.
pub fn host_tag() -> &'static str {
    if cfg!(windows) {
        "windows-x86_64"
    } else if cfg!(target_os = "macos") {
        "darwin-x86_64"
    } else {
        "linux-x86_64"
    }
}

/// `<ndk>/source.properties`
pub fn source_properties(ndk_root: &Path) -> PathBuf {
    ndk_root.join("source.properties")
}

/// `<ndk>/toolchains/llvm/prebuilt/<host>/sysroot`
pub fn sysroot(ndk_root: &Path) -> PathBuf {
    ndk_root
        .join("toolchains")
        .join("llvm")
        .join("prebuilt")
        .join(host_tag())
        .join("sysroot")
}

/// `<sysroot>/usr/include/jni.h`
pub fn jni_header(ndk_root: &Path) -> PathBuf {
    sysroot(ndk_root).join("usr").join("include").join("jni.h")
}

/// `<sysroot>/usr/lib/<triple>`, whose numbered children are the supported API levels
pub fn target_lib_dir(ndk_root: &Path) -> PathBuf {
    sysroot(ndk_root)
        .join("usr")
        .join("lib")
        .join(TARGET_ABI.ndk_triple())
}

/// `<sysroot>/usr/lib/<triple>/<api>`
pub fn api_lib_dir(ndk_root: &Path, api_level: VersionNumber) -> PathBuf {
    target_lib_dir(ndk_root).join(api_level.to_string())
}

/// Read the declared NDK major version from `source.properties`
pub fn read_ndk_version(ndk_root: &Path) -> Option<VersionNumber> {
    let props = source_properties(ndk_root);
    if !file_exists(&props) {
        return None;
    }
    match std::fs::read_to_string(&props) {
        Ok(content) => parse_ndk_version(&content),
        Err(e) => {
            debug!("Cannot read {:?}: {}", props, e);
            None
        }
    }
}

/// One discovered NDK installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NdkRecord {
    pub path: PathBuf,
    /// Declared major version, if `source.properties` could be parsed
    pub version: Option<VersionNumber>,
    /// Highest API level with libraries for [`TARGET_ABI`]; `None` means the
    /// installation cannot link for the target architecture at all
    pub max_api: Option<VersionNumber>,
}

impl NdkRecord {
    /// Inspect an NDK directory
    pub fn inspect(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            version: read_ndk_version(path),
            max_api: find_highest_ndk_api_level(path),
        }
    }

    /// Whether the installation has any libraries for the target architecture
    pub fn is_usable(&self) -> bool {
        self.max_api.is_some()
    }
}

/// Pick the best NDK: highest declared version among the usable ones, ties
/// broken by the higher max API. Unknown versions rank below any known one.
pub fn best_ndk(records: &[NdkRecord]) -> Option<&NdkRecord> {
    records
        .iter()
        .filter(|r| r.is_usable())
        .max_by_key(|r| (r.version, r.max_api))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, version: Option<u8>, max_api: Option<u8>) -> NdkRecord {
        NdkRecord {
            path: PathBuf::from(path),
            version,
            max_api,
        }
    }

    #[test]
    fn test_abi_names() {
        assert_eq!(Abi::Arm64V8a.ndk_triple(), "aarch64-linux-android");
        assert_eq!(Abi::ArmeabiV7a.abi_name(), "armeabi-v7a");
        assert_eq!(TARGET_ABI.abi_name(), "arm64-v8a");
    }

    #[test]
    fn test_layout_paths() {
        let ndk = Path::new("/sdk/ndk/27.0.12077973");
        let lib = api_lib_dir(ndk, 35);
        assert!(lib.ends_with(Path::new("sysroot/usr/lib/aarch64-linux-android/35")));
        assert!(jni_header(ndk).ends_with(Path::new("sysroot/usr/include/jni.h")));
        assert!(sysroot(ndk).to_string_lossy().contains(host_tag()));
    }

    #[test]
    fn test_best_ndk_prefers_version_over_scan_order() {
        let records = vec![
            record("/sdk/ndk/25.2", Some(25), Some(33)),
            record("/sdk/ndk/broken", Some(28), None),
            record("/sdk/ndk/27.0", Some(27), Some(35)),
            record("/sdk/ndk-bundle", None, Some(30)),
        ];
        let best = best_ndk(&records).unwrap();
        assert_eq!(best.path, PathBuf::from("/sdk/ndk/27.0"));
    }

    #[test]
    fn test_best_ndk_none_usable() {
        let records = vec![record("/sdk/ndk/26", Some(26), None)];
        assert!(best_ndk(&records).is_none());
        assert!(best_ndk(&[]).is_none());
    }

    #[test]
    fn test_inspect_missing_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let rec = NdkRecord::inspect(&dir.path().join("nope"));
        assert_eq!(rec.version, None);
        assert_eq!(rec.max_api, None);
        assert!(!rec.is_usable());
    }
}
