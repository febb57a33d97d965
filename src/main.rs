//! apkforge - build signed Android APKs from native code
//!
//! Command-line entry point.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use apkforge::commands::{
    describe_error, BuildCommand, DeployCommand, DoctorCommand, Environment, Overrides, PlanCommand,
};
use apkforge::core::{APP_NAME, CONFIG_FILE_NAME, VERSION};
use apkforge::build::StepId;

/// Resolve the Android SDK/NDK and build an APK without Gradle
#[derive(Parser)]
#[command(name = "apkforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Android SDK root
    #[arg(long, global = true)]
    sdk: Option<PathBuf>,

    /// Android NDK root
    #[arg(long, global = true)]
    ndk: Option<PathBuf>,

    /// Build-tools version, e.g. 35.0.0
    #[arg(long, global = true)]
    build_tools: Option<String>,

    /// Target API level
    #[arg(long, global = true)]
    api_level: Option<u32>,

    /// Minimum API level
    #[arg(long, global = true)]
    min_sdk: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report the Android environment and what is missing
    Doctor {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the build steps in execution order (dry-run)
    Plan {
        /// Only the steps needed for this one
        #[arg(long)]
        until: Option<StepId>,
    },

    /// Build and verify the APK
    Build {
        /// Stop after this step
        #[arg(long)]
        until: Option<StepId>,
    },

    /// Build the APK and install it with adb
    Deploy,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            sdk: self.sdk.clone(),
            ndk: self.ndk.clone(),
            build_tools: self.build_tools.clone(),
            api_level: self.api_level,
            min_sdk: self.min_sdk,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    info!("{} v{}", APP_NAME, VERSION);

    let env = match Environment::load(&cli.config, &cli.overrides()).await {
        Ok(env) => env,
        Err(e) => {
            error!("{}", describe_error(&e));
            std::process::exit(2);
        }
    };

    match cli.command {
        Commands::Doctor { json } => {
            let ready = DoctorCommand { json }.execute(&env)?;
            if !ready {
                std::process::exit(1);
            }
        }
        Commands::Plan { until } => PlanCommand { until }.execute(&env)?,
        Commands::Build { until } => {
            BuildCommand { until }.execute(&env).await?;
        }
        Commands::Deploy => {
            DeployCommand.execute(&env).await?;
        }
    }

    Ok(())
}
