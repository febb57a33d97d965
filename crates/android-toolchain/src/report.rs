//! Diagnostics Report
//!
//! Human-readable and JSON renderings of a resolution and the NDK inventory.

use std::fmt::Write;
use std::path::Path;
use serde::Serialize;

use crate::ndk::{best_ndk, NdkRecord};
use crate::resolver::ResolvedConfiguration;

/// Everything shown to the operator about the environment
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub resolved: &'a ResolvedConfiguration,
    pub ndks: &'a [NdkRecord],
    /// Set when the configured NDK is not one of the discovered ones
    pub alternative_ndk: Option<&'a NdkRecord>,
    pub ready: bool,
}

impl<'a> Report<'a> {
    pub fn new(resolved: &'a ResolvedConfiguration, ndks: &'a [NdkRecord]) -> Self {
        let configured_known = ndks.iter().any(|r| same_path(&r.path, &resolved.ndk_root));
        let alternative_ndk = if configured_known { None } else { best_ndk(ndks) };

        Self {
            resolved,
            ndks,
            alternative_ndk,
            ready: resolved.is_valid(),
        }
    }

    /// Render as plain text
    pub fn render(&self) -> String {
        let r = self.resolved;
        let mut out = String::new();

        let _ = writeln!(out, "Android environment");
        let _ = writeln!(out, "  SDK:          {}", path_or_unset(&r.sdk_root));
        let _ = writeln!(out, "  NDK:          {}", path_or_unset(&r.ndk_root));
        let build_tools = r.build_tools.as_deref().unwrap_or("(unresolved)");
        let _ = writeln!(out, "  Build tools:  {}", build_tools);
        let _ = writeln!(
            out,
            "  API level:    {} (minimum {})",
            r.api_level.map_or("(unresolved)".to_string(), |v| v.to_string()),
            r.min_api
        );

        let _ = writeln!(out);
        if self.ndks.is_empty() {
            let _ = writeln!(
                out,
                "Installed NDKs: none found under {}",
                path_or_unset(&r.sdk_root)
            );
        } else {
            let _ = writeln!(out, "Installed NDKs:");
            for ndk in self.ndks {
                let _ = writeln!(
                    out,
                    "  r{:<4} max API {:<6} {}",
                    ndk.version.map_or("?".to_string(), |v| v.to_string()),
                    ndk.max_api.map_or("none".to_string(), |v| v.to_string()),
                    ndk.path.display()
                );
            }
        }

        if !r.errors.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Problems ({}):", r.errors.len());
            for (i, error) in r.errors.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {}. [{}] {}",
                    i + 1,
                    error.component(),
                    error.message()
                );
                let _ = writeln!(out, "     hint: {}", error.suggestion());
            }
        }

        if let Some(alt) = self.alternative_ndk {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "The configured NDK is not one of the installed ones. Best installed NDK: {} (r{}, max API {})",
                alt.path.display(),
                alt.version.map_or("?".to_string(), |v| v.to_string()),
                alt.max_api.map_or("none".to_string(), |v| v.to_string()),
            );
            let _ = writeln!(out, "  use it with: --ndk {}", alt.path.display());
        }

        let _ = writeln!(out);
        let verdict = if self.ready { "Ready to build." } else { "Not ready to build." };
        let _ = writeln!(out, "{}", verdict);
        out
    }

    /// Render as pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn path_or_unset(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        "(unset)".to_string()
    } else {
        path.display().to_string()
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{Component, ValidationError};
    use std::path::PathBuf;

    fn resolved(ndk_root: &str, errors: Vec<ValidationError>) -> ResolvedConfiguration {
        ResolvedConfiguration {
            sdk_root: PathBuf::from("/sdk"),
            ndk_root: PathBuf::from(ndk_root),
            build_tools: Some("35.0.0".into()),
            api_level: Some(28),
            min_api: 26,
            errors,
        }
    }

    fn ndks() -> Vec<NdkRecord> {
        vec![
            NdkRecord {
                path: PathBuf::from("/sdk/ndk/26.1"),
                version: Some(26),
                max_api: Some(34),
            },
            NdkRecord {
                path: PathBuf::from("/sdk/ndk/27.0"),
                version: Some(27),
                max_api: Some(35),
            },
        ]
    }

    #[test]
    fn test_ready_report() {
        let r = resolved("/sdk/ndk/27.0", Vec::new());
        let ndks = ndks();
        let report = Report::new(&r, &ndks);
        let text = report.render();

        assert!(report.ready);
        assert!(report.alternative_ndk.is_none());
        assert!(text.contains("Build tools:  35.0.0"));
        assert!(text.contains("API level:    28 (minimum 26)"));
        assert!(text.contains("/sdk/ndk/26.1"));
        assert!(text.contains("Ready to build."));
        assert!(!text.contains("Problems"));
    }

    #[test]
    fn test_errors_and_alternative() {
        let r = resolved(
            "/opt/old-ndk",
            vec![
                ValidationError::new(
                    Component::Ndk,
                    "NDK version 21 is too old (minimum 23)",
                    "Install NDK r23 or newer",
                ),
                ValidationError::new(
                    Component::Platform,
                    "Platform android-35 is not installed",
                    "sdkmanager \"platforms;android-35\"",
                ),
            ],
        );
        let ndks = ndks();
        let report = Report::new(&r, &ndks);
        let text = report.render();

        assert!(!report.ready);
        assert_eq!(report.alternative_ndk.unwrap().path, PathBuf::from("/sdk/ndk/27.0"));
        assert!(text.contains("Problems (2):"));
        assert!(text.contains("1. [Android NDK] NDK version 21 is too old"));
        assert!(text.contains("hint: sdkmanager"));
        assert!(text.contains("--ndk /sdk/ndk/27.0"));
        assert!(text.contains("Not ready to build."));
    }

    #[test]
    fn test_no_ndks_found() {
        let missing =
            ValidationError::new(Component::Ndk, "Android NDK not found at <unset>", "install");
        let r = resolved("", vec![missing]);
        let report = Report::new(&r, &[]);
        let text = report.render();
        assert!(report.alternative_ndk.is_none());
        assert!(text.contains("NDK:          (unset)"));
        assert!(text.contains("Installed NDKs: none found"));
    }

    #[test]
    fn test_json() {
        let r = resolved("/sdk/ndk/27.0", Vec::new());
        let ndks = ndks();
        let json = Report::new(&r, &ndks).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["ready"], true);
        assert_eq!(value["resolved"]["api_level"], 28);
        assert_eq!(value["ndks"][1]["version"], 27);
    }
}
