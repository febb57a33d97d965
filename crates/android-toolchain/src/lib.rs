//! Android Toolchain Resolution
//!
//! Handles discovery and reconciliation of:
//! - Android SDK platforms and build tools
//! - Android NDK installations
//! - The effective API level a build can target

pub mod version;
pub mod sdk;
pub mod ndk;
pub mod inventory;
pub mod resolver;
pub mod report;

pub use version::{parse_api_level, parse_major_version, parse_ndk_version, VersionNumber};
pub use sdk::BuildTool;
pub use ndk::{best_ndk, Abi, NdkRecord, TARGET_ABI};
pub use inventory::{discover_ndks, file_exists, path_exists};
pub use resolver::{
    resolve, Component, ResolvedConfiguration, ResolverInput, ValidConfiguration, ValidationError,
    MIN_BUILD_TOOLS_VERSION, MIN_NDK_VERSION,
};
pub use report::Report;
