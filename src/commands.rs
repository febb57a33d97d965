//! CLI commands for apkforge
//!
//! Each command loads the project environment once, then reports on it or
//! builds from it.

use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use apkforge_android_toolchain::{
    best_ndk, discover_ndks, resolve, NdkRecord, Report, ResolvedConfiguration, ResolverInput,
};
use apkforge_build_engine::{
    BuildError, BuildOutput, BuildProgress, BuildRunner, PipelineGraph, ProcessInvoker, StepId,
};
use apkforge_core::{ForgeConfig, ForgeError};

/// Settings given on the command line; they take precedence over `apkforge.toml`
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub sdk: Option<PathBuf>,
    pub ndk: Option<PathBuf>,
    pub build_tools: Option<String>,
    pub api_level: Option<u32>,
    pub min_sdk: Option<u32>,
}

impl Overrides {
    /// Apply over `config`; relative paths are taken from `base`, the working directory
    pub fn apply(&self, config: &mut ForgeConfig, base: &Path) {
        let android = &mut config.android;
        if let Some(ref sdk) = self.sdk {
            android.sdk_path = Some(base.join(sdk));
        }
        if let Some(ref ndk) = self.ndk {
            android.ndk_path = Some(base.join(ndk));
        }
        if let Some(ref version) = self.build_tools {
            android.build_tools = Some(version.clone());
        }
        if self.api_level.is_some() {
            android.api_level = self.api_level;
        }
        if self.min_sdk.is_some() {
            android.min_sdk = self.min_sdk;
        }
    }
}

/// A project configuration together with what was found on disk for it
pub struct Environment {
    pub config: ForgeConfig,
    pub ndks: Vec<NdkRecord>,
    pub resolved: ResolvedConfiguration,
}

impl Environment {
    /// Load `apkforge.toml`, apply command-line overrides and resolve
    pub async fn load(config_path: &Path, overrides: &Overrides) -> Result<Self> {
        let cwd = std::env::current_dir().context("Cannot read the working directory")?;
        let mut config = ForgeConfig::load(config_path)
            .await
            .with_context(|| format!("Failed to load {}", config_path.display()))?;
        overrides.apply(&mut config, &cwd);
        config.validate().context("Invalid configuration")?;
        Ok(Self::resolve(config))
    }

    /// Resolve the toolchain for a configuration
    pub fn resolve(config: ForgeConfig) -> Self {
        let sdk_root = config.android.sdk_root().unwrap_or_default();
        let ndks = if sdk_root.as_os_str().is_empty() {
            Vec::new()
        } else {
            discover_ndks(&sdk_root)
        };
        let ndk_root = default_ndk_root(config.android.ndk_root(), &sdk_root, &ndks);

        let input = ResolverInput {
            sdk_root,
            ndk_root,
            build_tools: config.android.build_tools.clone(),
            api_level: config.android.api_level.and_then(|v| u8::try_from(v).ok()),
            min_api: u8::try_from(config.android.min_sdk()).unwrap_or(u8::MAX),
        };
        let resolved = resolve(&input);

        Self { config, ndks, resolved }
    }

    pub fn report(&self) -> Report<'_> {
        Report::new(&self.resolved, &self.ndks)
    }

    /// The build pipeline; an unbuildable environment prints its report and fails
    pub fn pipeline(&self) -> Result<PipelineGraph> {
        match PipelineGraph::build(self.resolved.clone(), &self.config) {
            Ok(graph) => Ok(graph),
            Err(BuildError::Unresolved(errors)) => {
                eprint!("{}", self.report().render());
                bail!("Environment is not buildable: {} problem(s) found", errors.len())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// The NDK to resolve against: the configured one, else the best NDK installed
/// in the SDK, else the legacy `<sdk>/ndk-bundle`
pub fn default_ndk_root(
    configured: Option<PathBuf>,
    sdk_root: &Path,
    ndks: &[NdkRecord],
) -> PathBuf {
    if let Some(path) = configured {
        return path;
    }
    match best_ndk(ndks) {
        Some(record) => {
            debug!("Defaulting to NDK {:?}", record.path);
            record.path.clone()
        }
        None if sdk_root.as_os_str().is_empty() => PathBuf::new(),
        None => sdk_root.join("ndk-bundle"),
    }
}

/// One-line description of a failed command. Configuration problems get the
/// friendlier wording of [`ForgeError::user_message`].
pub fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ForgeError>() {
        Some(forge) => forge.user_message(),
        None => format!("{:#}", err),
    }
}

/// Render steps as a numbered list with their prerequisites
pub fn render_plan(graph: &PipelineGraph, steps: &[StepId]) -> String {
    let mut out = String::new();
    for (i, step) in steps.iter().enumerate() {
        let mut preds = graph.predecessors(*step);
        preds.sort();
        if preds.is_empty() {
            let _ = writeln!(out, "{:>2}. {}", i + 1, step);
        } else {
            let after: Vec<&str> = preds.iter().map(|p| p.as_str()).collect();
            let _ = writeln!(out, "{:>2}. {:<24} after {}", i + 1, step, after.join(", "));
        }
    }
    out
}

/// Environment report command
pub struct DoctorCommand {
    pub json: bool,
}

impl DoctorCommand {
    /// Print the report; returns whether the environment can build
    pub fn execute(&self, env: &Environment) -> Result<bool> {
        let report = env.report();
        if self.json {
            println!("{}", report.to_json().context("Failed to serialize report")?);
        } else {
            print!("{}", report.render());
        }
        Ok(report.ready)
    }
}

/// Dry-run command
pub struct PlanCommand {
    pub until: Option<StepId>,
}

impl PlanCommand {
    pub fn execute(&self, env: &Environment) -> Result<()> {
        let graph = env.pipeline()?;
        let steps = match self.until {
            Some(target) => graph.plan_until(target),
            None => graph.execution_order(),
        };
        print!("{}", render_plan(&graph, &steps));
        Ok(())
    }
}

/// Build command, stopping after verification unless told otherwise
pub struct BuildCommand {
    pub until: Option<StepId>,
}

impl BuildCommand {
    pub async fn execute(&self, env: &Environment) -> Result<BuildOutput> {
        let target = self.until.unwrap_or(StepId::VerifyArtifact);
        let mut graph = env.pipeline()?;
        let output = run_pipeline(env, &mut graph, Some(target)).await?;

        if let Some(ref apk) = output.artifact {
            info!("APK: {}", apk.display());
        }
        Ok(output)
    }
}

/// Build, verify and install on a device
pub struct DeployCommand;

impl DeployCommand {
    pub async fn execute(&self, env: &Environment) -> Result<BuildOutput> {
        let mut graph = env.pipeline()?;
        let output = run_pipeline(env, &mut graph, None).await?;
        info!(
            "Installed on {}",
            env.config.deploy.device_serial.as_deref().unwrap_or("the attached device")
        );
        Ok(output)
    }
}

async fn run_pipeline(
    env: &Environment,
    graph: &mut PipelineGraph,
    until: Option<StepId>,
) -> Result<BuildOutput> {
    let (tx, mut rx) = mpsc::channel::<BuildProgress>(32);

    // Step lines go to stdout, tool output stays in the log
    let printer = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            match progress {
                BuildProgress::StepStarted { step, index, total } => {
                    println!("[{}/{}] {}", index + 1, total, step);
                }
                BuildProgress::Completed { output } => {
                    println!(
                        "Finished {} step(s) in {:.2}s",
                        output.steps_run.len(),
                        output.duration_secs
                    );
                }
                BuildProgress::Failed { step, .. } => println!("Step {} failed", step),
                _ => {}
            }
        }
    });

    let timeout = Duration::from_secs(env.config.build.step_timeout_secs);
    let runner = BuildRunner::new(ProcessInvoker::from_env(), timeout).with_progress(tx);
    let result = match until {
        Some(target) => runner.run_until(graph, target).await,
        None => runner.run(graph).await,
    };
    drop(runner);
    let _ = printer.await;

    result.context("Build failed")
}
