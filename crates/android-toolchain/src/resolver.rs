//! Capability Resolution
//!
//! Reconciles the independently versioned SDK platforms, build tools and NDK
//! into one effective configuration. Every problem found is collected so a
//! single run reports all of them; only a missing SDK stops resolution early.

use std::fmt;
use std::path::{Path, PathBuf};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::inventory::{
    file_exists, find_highest_api_level, find_highest_build_tools, find_highest_ndk_api_level,
    path_exists, subdirectories,
};
use crate::ndk::{self, TARGET_ABI};
use crate::sdk::{self, BuildTool, SdkPackage};
use crate::version::{parse_major_version, VersionNumber};

/// Oldest NDK major release that is supported
pub const MIN_NDK_VERSION: VersionNumber = 23;

/// Oldest build-tools major release that is supported
pub const MIN_BUILD_TOOLS_VERSION: VersionNumber = 30;

/// The installed component a diagnostic is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Component {
    Sdk,
    Ndk,
    BuildTools,
    Platform,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Component::Sdk => "Android SDK",
            Component::Ndk => "Android NDK",
            Component::BuildTools => "Build tools",
            Component::Platform => "Platform",
        })
    }
}

/// One problem with the environment, with a hint on how to fix it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    component: Component,
    message: String,
    suggestion: String,
}

impl ValidationError {
    pub fn new(
        component: Component,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            component,
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn component(&self) -> Component {
        self.component
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn suggestion(&self) -> &str {
        &self.suggestion
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.component, self.message)
    }
}

/// What the resolver works from
#[derive(Debug, Clone)]
pub struct ResolverInput {
    pub sdk_root: PathBuf,
    pub ndk_root: PathBuf,
    /// Explicit build-tools version; the highest installed one otherwise
    pub build_tools: Option<String>,
    /// Explicit API level; the effective level otherwise
    pub api_level: Option<VersionNumber>,
    /// Minimum API level policy
    pub min_api: VersionNumber,
}

/// Outcome of one resolution pass.
///
/// Values are best effort and exist for display; a configuration with errors
/// can only become a [`ValidConfiguration`] through [`into_valid`](Self::into_valid),
/// which refuses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedConfiguration {
    pub sdk_root: PathBuf,
    pub ndk_root: PathBuf,
    pub build_tools: Option<String>,
    pub api_level: Option<VersionNumber>,
    pub min_api: VersionNumber,
    pub errors: Vec<ValidationError>,
}

impl ResolvedConfiguration {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Convert into a configuration that can drive a build, or the full error list
    pub fn into_valid(self) -> Result<ValidConfiguration, Vec<ValidationError>> {
        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        match (self.build_tools, self.api_level) {
            (Some(build_tools), Some(api_level)) => Ok(ValidConfiguration {
                sdk_root: self.sdk_root,
                ndk_root: self.ndk_root,
                build_tools,
                api_level,
                min_api: self.min_api,
            }),
            (build_tools, _) => {
                let component = if build_tools.is_none() {
                    Component::BuildTools
                } else {
                    Component::Platform
                };
                Err(vec![ValidationError::new(
                    component,
                    "Resolution finished without a value",
                    "Re-run with an explicit --build-tools and --api-level",
                )])
            }
        }
    }
}

/// A fully resolved, error-free configuration.
///
/// Only [`ResolvedConfiguration::into_valid`] creates one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidConfiguration {
    sdk_root: PathBuf,
    ndk_root: PathBuf,
    build_tools: String,
    api_level: VersionNumber,
    min_api: VersionNumber,
}

impl ValidConfiguration {
    pub fn sdk_root(&self) -> &Path {
        &self.sdk_root
    }

    pub fn ndk_root(&self) -> &Path {
        &self.ndk_root
    }

    /// Build-tools directory name, e.g. "35.0.0"
    pub fn build_tools(&self) -> &str {
        &self.build_tools
    }

    pub fn api_level(&self) -> VersionNumber {
        self.api_level
    }

    pub fn min_api(&self) -> VersionNumber {
        self.min_api
    }

    /// Absolute path of a required build tool
    pub fn tool(&self, tool: BuildTool) -> PathBuf {
        tool.path(&self.sdk_root, &self.build_tools)
    }

    /// `android.jar` of the resolved platform
    pub fn android_jar(&self) -> PathBuf {
        sdk::android_jar(&self.sdk_root, self.api_level)
    }

    pub fn adb(&self) -> PathBuf {
        sdk::adb(&self.sdk_root)
    }
}

/// Resolve the environment described by `input`
pub fn resolve(input: &ResolverInput) -> ResolvedConfiguration {
    Resolver::new(input).run()
}

struct Resolver<'a> {
    input: &'a ResolverInput,
    ndk_present: bool,
}

impl<'a> Resolver<'a> {
    fn new(input: &'a ResolverInput) -> Self {
        Self {
            input,
            ndk_present: path_exists(&input.ndk_root),
        }
    }

    fn run(self) -> ResolvedConfiguration {
        let input = self.input;
        info!("Resolving Android environment (SDK {:?}, NDK {:?})", input.sdk_root, input.ndk_root);

        let mut resolved = ResolvedConfiguration {
            sdk_root: input.sdk_root.clone(),
            ndk_root: input.ndk_root.clone(),
            build_tools: None,
            api_level: None,
            min_api: input.min_api,
            errors: Vec::new(),
        };

        if !path_exists(&input.sdk_root) {
            push(
                &mut resolved.errors,
                Component::Sdk,
                format!("Android SDK not found at {}", display(&input.sdk_root)),
                "Install the Android SDK and point ANDROID_HOME or --sdk at it",
            );
            return resolved;
        }

        let errors = &mut resolved.errors;
        self.check_ndk(errors);
        resolved.build_tools = self.resolve_build_tools(errors);
        resolved.api_level = self.resolve_api_level(errors);

        if let Some(api) = resolved.api_level.filter(|api| *api > 0) {
            if self.ndk_present {
                self.check_ndk_supports(api, errors);
            }
        }
        if let Some(ref version) = resolved.build_tools {
            self.check_build_tool_executables(version, errors);
        }

        if resolved.errors.is_empty() {
            info!(
                "Resolved build-tools {} and API level {}",
                resolved.build_tools.as_deref().unwrap_or("?"),
                resolved.api_level.unwrap_or(0),
            );
        } else {
            warn!("Environment has {} problem(s)", resolved.errors.len());
        }
        resolved
    }

    fn check_ndk(&self, errors: &mut Vec<ValidationError>) {
        let ndk_root = &self.input.ndk_root;
        if !self.ndk_present {
            push(
                errors,
                Component::Ndk,
                format!("Android NDK not found at {}", display(ndk_root)),
                format!(
                    "Install an NDK with {} or set ANDROID_NDK_HOME / --ndk",
                    SdkPackage::Ndk("<version>".into()).install_hint()
                ),
            );
            return;
        }

        match ndk::read_ndk_version(ndk_root) {
            Some(version) if version >= MIN_NDK_VERSION => {
                debug!("NDK version {} is supported", version);
            }
            Some(version) => push(
                errors,
                Component::Ndk,
                format!("NDK version {} is too old (minimum {})", version, MIN_NDK_VERSION),
                format!("Install NDK r{} or newer", MIN_NDK_VERSION),
            ),
            None => push(
                errors,
                Component::Ndk,
                format!(
                    "Cannot determine NDK version from {}",
                    display(&ndk::source_properties(ndk_root))
                ),
                "Point --ndk at the root of an NDK installation (the directory containing source.properties)",
            ),
        }
    }

    fn resolve_build_tools(&self, errors: &mut Vec<ValidationError>) -> Option<String> {
        let sdk_root = &self.input.sdk_root;

        if let Some(ref requested) = self.input.build_tools {
            if path_exists(&sdk::build_tools_dir(sdk_root, requested)) {
                return Some(requested.clone());
            }
            let installed: Vec<String> = subdirectories(&sdk::build_tools_root(sdk_root))
                .into_iter()
                .map(|(name, _)| name)
                .collect();
            let suggestion = if installed.is_empty() {
                SdkPackage::BuildTools(requested.clone()).install_hint()
            } else {
                format!(
                    "Installed versions: {}; or run {}",
                    installed.join(", "),
                    SdkPackage::BuildTools(requested.clone()).install_hint()
                )
            };
            push(
                errors,
                Component::BuildTools,
                format!(
                    "Build tools {} not found in {}",
                    requested,
                    display(&sdk::build_tools_root(sdk_root))
                ),
                suggestion,
            );
            return None;
        }

        let Some(highest) = find_highest_build_tools(sdk_root) else {
            push(
                errors,
                Component::BuildTools,
                format!(
                    "No build tools installed in {}",
                    display(&sdk::build_tools_root(sdk_root))
                ),
                SdkPackage::BuildTools(format!("{}.0.0", MIN_BUILD_TOOLS_VERSION)).install_hint(),
            );
            return None;
        };

        if let Some(major) = parse_major_version(&highest) {
            if major < MIN_BUILD_TOOLS_VERSION {
                push(
                    errors,
                    Component::BuildTools,
                    format!(
                        "Build tools {} are too old (minimum {})",
                        highest, MIN_BUILD_TOOLS_VERSION
                    ),
                    SdkPackage::BuildTools(format!("{}.0.0", MIN_BUILD_TOOLS_VERSION))
                        .install_hint(),
                );
            }
        }
        debug!("Using highest installed build tools {}", highest);
        Some(highest)
    }

    fn resolve_api_level(&self, errors: &mut Vec<ValidationError>) -> Option<VersionNumber> {
        let sdk_root = &self.input.sdk_root;
        let ndk_root = &self.input.ndk_root;

        if let Some(requested) = self.input.api_level {
            if !path_exists(&sdk::platform_dir(sdk_root, requested)) {
                push(
                    errors,
                    Component::Platform,
                    format!("Platform android-{} is not installed", requested),
                    SdkPackage::Platform(requested).install_hint(),
                );
            }
            return Some(requested);
        }

        let sdk_highest = find_highest_api_level(sdk_root);
        let ndk_highest = if self.ndk_present {
            find_highest_ndk_api_level(ndk_root)
        } else {
            None
        };
        debug!("Highest API: SDK {:?}, NDK {:?}", sdk_highest, ndk_highest);

        let Some(sdk_api) = sdk_highest else {
            push(
                errors,
                Component::Platform,
                format!("No platforms installed in {}", display(&sdk::platforms_root(sdk_root))),
                SdkPackage::Platform(self.input.min_api).install_hint(),
            );
            return None;
        };

        // The effective level needs both sides; check_ndk has already reported the NDK
        if !self.ndk_present {
            return None;
        }

        let Some(ndk_api) = ndk_highest else {
            push(
                errors,
                Component::Ndk,
                format!(
                    "NDK has no {} libraries in {}",
                    TARGET_ABI.abi_name(),
                    display(&ndk::target_lib_dir(ndk_root))
                ),
                "Reinstall the NDK or select a different one with --ndk",
            );
            // Display only: into_valid refuses a configuration carrying this error
            return Some(sdk_api);
        };

        let effective = sdk_api.min(ndk_api);
        if effective < self.input.min_api {
            push(
                errors,
                Component::Platform,
                format!(
                    "Effective API level {} (SDK highest {}, NDK highest {}) is below the minimum {}",
                    effective, sdk_api, ndk_api, self.input.min_api
                ),
                if sdk_api <= ndk_api {
                    SdkPackage::Platform(self.input.min_api).install_hint()
                } else {
                    "Install a newer NDK".to_string()
                },
            );
        }
        Some(effective)
    }

    fn check_ndk_supports(&self, api: VersionNumber, errors: &mut Vec<ValidationError>) {
        let ndk_root = &self.input.ndk_root;

        let header = ndk::jni_header(ndk_root);
        if !file_exists(&header) {
            push(
                errors,
                Component::Ndk,
                format!("NDK headers missing: {}", display(&header)),
                format!(
                    "The NDK prebuilt toolchain for {} is incomplete; reinstall the NDK",
                    ndk::host_tag()
                ),
            );
        }

        let lib_dir = ndk::api_lib_dir(ndk_root, api);
        if !path_exists(&lib_dir) {
            push(
                errors,
                Component::Ndk,
                format!("NDK has no {} libraries for API level {}", TARGET_ABI.abi_name(), api),
                match find_highest_ndk_api_level(ndk_root) {
                    Some(max) => {
                        format!("Choose --api-level {} or lower, or install a newer NDK", max)
                    }
                    None => "Install a newer NDK".to_string(),
                },
            );
        }
    }

    fn check_build_tool_executables(&self, version: &str, errors: &mut Vec<ValidationError>) {
        for tool in BuildTool::ALL {
            let path = tool.path(&self.input.sdk_root, version);
            if !file_exists(&path) {
                push(
                    errors,
                    Component::BuildTools,
                    format!("{} missing from build tools {}", tool, version),
                    SdkPackage::BuildTools(version.to_string()).install_hint(),
                );
            }
        }
    }
}

fn push(
    errors: &mut Vec<ValidationError>,
    component: Component,
    message: impl Into<String>,
    suggestion: impl Into<String>,
) {
    let error = ValidationError::new(component, message, suggestion);
    debug!("{}", error);
    errors.push(error);
}

fn display(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        "<unset>".to_string()
    } else {
        path.display().to_string()
    }
}
