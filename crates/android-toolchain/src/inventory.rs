//! Inventory Scanning
//!
//! Enumerates installed SDK platforms, build tools and NDKs by listing the
//! immediate subdirectories of well-known roots. A missing directory is never
//! an error here: it simply means nothing was found. Whether that matters is
//! the resolver's call.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::ndk::{self, NdkRecord};
use crate::sdk;
use crate::version::{parse_api_level, parse_major_version, VersionNumber};

/// Whether `path` names an existing file or directory.
///
/// Empty and relative paths are rejected without touching the filesystem so a
/// blank setting never silently resolves against the working directory.
pub fn path_exists(path: &Path) -> bool {
    is_anchored(path) && path.exists()
}

/// Whether `path` names an existing regular file (same rules as [`path_exists`])
pub fn file_exists(path: &Path) -> bool {
    is_anchored(path) && path.is_file()
}

fn is_anchored(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.is_absolute()
}

/// Names and paths of the immediate subdirectories of `root`, in directory
/// iteration order. Unreadable or missing roots yield nothing.
pub fn subdirectories(root: &Path) -> Vec<(String, PathBuf)> {
    if !path_exists(root) {
        return Vec::new();
    }

    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {:?}: {}", root, e);
            return Vec::new();
        }
    };

    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            Some((name, e.path()))
        })
        .collect()
}

/// Highest value `parser` yields over the subdirectory names of `root`
pub fn find_highest_version<F>(root: &Path, parser: F) -> Option<VersionNumber>
where
    F: Fn(&str) -> Option<VersionNumber>,
{
    subdirectories(root)
        .iter()
        .filter_map(|(name, _)| parser(name))
        .max()
}

/// Directory name of the highest installed build-tools version, e.g. `"35.0.0"`.
///
/// The full name is kept because tool paths are built from it. Versions are
/// ordered by major first, then by the remaining numeric components so that
/// `35.0.1` beats `35.0.0` independently of iteration order.
pub fn find_highest_build_tools(sdk_root: &Path) -> Option<String> {
    subdirectories(&sdk::build_tools_root(sdk_root))
        .into_iter()
        .filter_map(|(name, _)| {
            let major = parse_major_version(&name)?;
            let rest: Vec<u32> = name
                .split(|c: char| c == '.' || c == '-')
                .skip(1)
                .map(|part| part.parse().unwrap_or(0))
                .collect();
            Some(((major, rest), name))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, name)| name)
}

/// Highest API level under `<sdk>/platforms`
pub fn find_highest_api_level(sdk_root: &Path) -> Option<VersionNumber> {
    find_highest_version(&sdk::platforms_root(sdk_root), parse_api_level)
}

/// Highest API level the NDK has target-architecture libraries for.
///
/// Children of the library directory are plain numbers, so the generic parser applies.
pub fn find_highest_ndk_api_level(ndk_root: &Path) -> Option<VersionNumber> {
    find_highest_version(&ndk::target_lib_dir(ndk_root), parse_major_version)
}

/// Every NDK under `<sdk>/ndk/*` plus the legacy `<sdk>/ndk-bundle`.
///
/// The result follows directory iteration order and is NOT sorted; use
/// [`ndk::best_ndk`] to pick one.
pub fn discover_ndks(sdk_root: &Path) -> Vec<NdkRecord> {
    let mut records: Vec<NdkRecord> = subdirectories(&sdk_root.join("ndk"))
        .into_iter()
        .map(|(_, path)| NdkRecord::inspect(&path))
        .collect();

    let bundle = sdk_root.join("ndk-bundle");
    if path_exists(&bundle) && bundle.is_dir() {
        records.push(NdkRecord::inspect(&bundle));
    }

    for record in &records {
        info!(
            "Found Android NDK {} at {:?} (max API {})",
            record.version.map_or("?".to_string(), |v| v.to_string()),
            record.path,
            record.max_api.map_or("none".to_string(), |v| v.to_string()),
        );
    }

    records
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;

    /// Create a fake SDK layout. Shared with the resolver tests.
    pub(crate) fn make_sdk(root: &Path, platforms: &[u8], build_tools: &[&str]) {
        for api in platforms {
            fs::create_dir_all(sdk::platform_dir(root, *api)).unwrap();
        }
        for version in build_tools {
            let dir = sdk::build_tools_dir(root, version);
            fs::create_dir_all(&dir).unwrap();
            for tool in sdk::BuildTool::ALL {
                fs::write(dir.join(tool.file_name()), b"").unwrap();
            }
        }
    }

    /// Create a fake NDK with `source.properties`, `jni.h` and library levels
    pub(crate) fn make_ndk(root: &Path, revision: &str, api_levels: &[u8]) {
        fs::create_dir_all(root).unwrap();
        fs::write(
            ndk::source_properties(root),
            format!("Pkg.Desc = Android NDK\nPkg.Revision = {}\n", revision),
        )
        .unwrap();
        let header = ndk::jni_header(root);
        fs::create_dir_all(header.parent().unwrap()).unwrap();
        fs::write(header, b"").unwrap();
        for api in api_levels {
            fs::create_dir_all(ndk::api_lib_dir(root, *api)).unwrap();
        }
    }

    #[test]
    fn test_path_predicates() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, b"x").unwrap();

        assert!(!path_exists(Path::new("")));
        assert!(!file_exists(Path::new("")));
        assert!(!path_exists(Path::new("relative/dir")));
        assert!(!path_exists(Path::new(".")));
        assert!(!file_exists(Path::new("Cargo.toml")));
        assert!(!path_exists(&dir.path().join("missing")));

        assert!(path_exists(dir.path()));
        assert!(path_exists(&file));
        assert!(file_exists(&file));
        assert!(!file_exists(dir.path()));
    }

    #[test]
    fn test_highest_version_ignores_files_and_junk() {
        let dir = tempfile::TempDir::new().unwrap();
        for name in ["21", "35", "28", "junk"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("40"), b"not a dir").unwrap();

        assert_eq!(find_highest_version(dir.path(), parse_major_version), Some(35));
        assert_eq!(find_highest_version(dir.path(), parse_api_level), None);
        assert_eq!(find_highest_version(&dir.path().join("none"), parse_major_version), None);
    }

    #[test]
    fn test_highest_api_level() {
        let dir = tempfile::TempDir::new().unwrap();
        make_sdk(dir.path(), &[30, 35, 33], &[]);
        let preview = dir.path().join("platforms").join("android-TiramisuPrivacySandbox");
        fs::create_dir_all(preview).unwrap();
        assert_eq!(find_highest_api_level(dir.path()), Some(35));
    }

    #[test]
    fn test_highest_build_tools_keeps_full_name() {
        let dir = tempfile::TempDir::new().unwrap();
        make_sdk(dir.path(), &[], &["30.0.3", "35.0.0", "34.0.0", "35.0.1"]);
        assert_eq!(find_highest_build_tools(dir.path()), Some("35.0.1".to_string()));
    }

    #[test]
    fn test_highest_build_tools_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(find_highest_build_tools(dir.path()), None);
    }

    #[test]
    fn test_ndk_api_level() {
        let dir = tempfile::TempDir::new().unwrap();
        let ndk_root = dir.path().join("ndk");
        make_ndk(&ndk_root, "27.0.12077973", &[21, 28, 35]);
        assert_eq!(find_highest_ndk_api_level(&ndk_root), Some(35));
    }

    #[test]
    fn test_discover_ndks() {
        let dir = tempfile::TempDir::new().unwrap();
        let sdk_root = dir.path();
        make_ndk(&sdk_root.join("ndk").join("26.1.10909125"), "26.1.10909125", &[34]);
        make_ndk(&sdk_root.join("ndk").join("27.0.12077973"), "27.0.12077973", &[35]);
        fs::create_dir_all(sdk_root.join("ndk-bundle")).unwrap();

        let mut records = discover_ndks(sdk_root);
        assert_eq!(records.len(), 3);

        records.sort_by_key(|r| r.version);
        assert_eq!(records[0].version, None);
        assert_eq!(records[0].max_api, None);
        assert!(records[0].path.ends_with("ndk-bundle"));
        assert_eq!(records[1].version, Some(26));
        assert_eq!(records[2].version, Some(27));
        assert_eq!(records[2].max_api, Some(35));
    }

    #[test]
    fn test_discover_ndks_missing_sdk() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(discover_ndks(&dir.path().join("no-sdk")).is_empty());
        assert!(discover_ndks(Path::new("")).is_empty());
    }
}
