//! APK Build Engine
//!
//! Turns a resolved Android environment into the fixed build pipeline
//! (compile, link resources, dex, package, sign, verify, deploy) and runs it.

pub mod config;
pub mod pipeline;
pub mod invoker;
pub mod package;
pub mod signing;
pub mod runner;

pub use config::BuildPaths;
pub use pipeline::{PipelineGraph, PipelineStep, StepContext, StepId, StepStatus};
pub use invoker::{ProcessInvoker, ToolInvoker, ToolOutput};
pub use runner::{BuildOutput, BuildProgress, BuildRunner};

use apkforge_android_toolchain::ValidationError;

/// Build errors
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Environment is not buildable: {} problem(s) found", .0.len())]
    Unresolved(Vec<ValidationError>),
    #[error("Step {step} failed:\n{diagnostics}")]
    StepFailed { step: StepId, diagnostics: String },
    #[error("Step {step} timed out after {secs}s")]
    Timeout { step: StepId, secs: u64 },
    #[error("Missing input: {0}")]
    MissingInput(String),
    #[error("Unknown step: {0}")]
    UnknownStep(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}
