//! Version Parsing
//!
//! Turns directory names and `source.properties` contents into comparable
//! major versions. Malformed input is an expected outcome and yields `None`.

/// A major version or API level. Android API levels and NDK majors both fit
/// comfortably; anything wider is treated as malformed.
pub type VersionNumber = u8;

/// Parse the major component of a dotted version string.
///
/// `"35.0.0"` → 35, `"27"` → 27, `""`/`"abc"`/`".0.0"`/`"300"` → `None`.
pub fn parse_major_version(s: &str) -> Option<VersionNumber> {
    let major = s.split('.').next().unwrap_or(s);
    if major.is_empty() || !major.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    major.parse().ok()
}

/// Extract the NDK major version from the text of `source.properties`.
///
/// Only the first `Pkg.Revision` line is considered.
pub fn parse_ndk_version(properties: &str) -> Option<VersionNumber> {
    let line = properties
        .lines()
        .find(|line| line.trim_start().starts_with("Pkg.Revision"))?;
    let (_, value) = line.split_once('=')?;
    parse_major_version(value.trim_matches(|c| c == ' ' || c == '\t' || c == '\r'))
}

/// Parse a platform directory name of the exact form `android-<digits>`.
pub fn parse_api_level(dir_name: &str) -> Option<VersionNumber> {
    let digits = dir_name.strip_prefix("android-")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
