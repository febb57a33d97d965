//! apkforge - Android APKs from native code, without Gradle
//!
//! Works out whether the installed Android SDK and NDK can build an app,
//! explains exactly what is missing when they cannot, and otherwise drives
//! the SDK tools through a fixed pipeline to a signed APK.
//!
//! ## Architecture
//!
//! - `apkforge-core`: configuration (`apkforge.toml`) and shared errors
//! - `apkforge-android-toolchain`: SDK/NDK inventory, resolution and diagnostics
//! - `apkforge-build-engine`: pipeline graph, tool invocation and the step runner

#![warn(clippy::all)]

pub mod commands;

// Re-export main components for library usage
pub use apkforge_core as core;
pub use apkforge_android_toolchain as toolchain;
pub use apkforge_build_engine as build;

/// Prelude module for convenient imports
pub mod prelude {
    pub use apkforge_core::ForgeConfig;
    pub use apkforge_android_toolchain::{resolve, Report, ResolvedConfiguration, ResolverInput};
    pub use apkforge_build_engine::{BuildRunner, PipelineGraph, ProcessInvoker, StepId};
    pub use crate::commands::{Environment, Overrides};
}
