//! Tool Invocation
//!
//! Maps each pipeline step to the external commands it runs. The runner only
//! looks at whether a step succeeded; tool output is kept for the operator.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

use apkforge_android_toolchain::BuildTool;

use crate::pipeline::{StepContext, StepId};
use crate::{package, signing, BuildError};

/// Result of running one step's tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    /// Captured stdout/stderr of the tools, for display only
    pub diagnostics: String,
}

impl ToolOutput {
    pub fn ok(diagnostics: impl Into<String>) -> Self {
        Self { success: true, diagnostics: diagnostics.into() }
    }

    pub fn failed(diagnostics: impl Into<String>) -> Self {
        Self { success: false, diagnostics: diagnostics.into() }
    }
}

/// Runs the external work behind a pipeline step
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, step: StepId, context: &StepContext) -> Result<ToolOutput, BuildError>;
}

/// Invoker that spawns the SDK tools as child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessInvoker {
    java_home: Option<PathBuf>,
}

impl ProcessInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `$JAVA_HOME` when it is set
    pub fn from_env() -> Self {
        match std::env::var_os("JAVA_HOME").filter(|v| !v.is_empty()) {
            Some(home) => Self::new().with_java_home(PathBuf::from(home)),
            None => Self::new(),
        }
    }

    /// Set JAVA_HOME; `javac` is looked up on PATH otherwise
    pub fn with_java_home(mut self, path: PathBuf) -> Self {
        self.java_home = Some(path);
        self
    }

    fn javac(&self) -> PathBuf {
        let exe = if cfg!(windows) { "javac.exe" } else { "javac" };
        match self.java_home {
            Some(ref home) => home.join("bin").join(exe),
            None => PathBuf::from(exe),
        }
    }

    async fn compile_entry_point(&self, ctx: &StepContext) -> Result<ToolOutput, BuildError> {
        let sources = files_with_extension(&ctx.app.java_dir, "java");
        if sources.is_empty() {
            return Err(BuildError::MissingInput(format!(
                "no .java sources in {}",
                ctx.app.java_dir.display()
            )));
        }

        let classes = ctx.paths.classes_dir();
        recreate_dir(&classes).await?;

        let mut args: Vec<OsString> = vec![
            "-source".into(),
            "8".into(),
            "-target".into(),
            "8".into(),
            "-bootclasspath".into(),
            ctx.toolchain.android_jar().into_os_string(),
            "-d".into(),
            classes.into_os_string(),
        ];
        args.extend(sources.into_iter().map(PathBuf::into_os_string));
        run_tool(&self.javac(), &args).await
    }

    async fn dex_convert(&self, ctx: &StepContext) -> Result<ToolOutput, BuildError> {
        let classes = files_with_extension(&ctx.paths.classes_dir(), "class");
        if classes.is_empty() {
            return Err(BuildError::MissingInput(format!(
                "no .class files in {}",
                ctx.paths.classes_dir().display()
            )));
        }

        let dex_dir = ctx.paths.dex_dir();
        recreate_dir(&dex_dir).await?;

        let mut args: Vec<OsString> = vec![
            "--release".into(),
            "--lib".into(),
            ctx.toolchain.android_jar().into_os_string(),
            "--min-api".into(),
            ctx.toolchain.min_api().to_string().into(),
            "--output".into(),
            dex_dir.into_os_string(),
        ];
        args.extend(classes.into_iter().map(PathBuf::into_os_string));
        run_tool(&ctx.toolchain.tool(BuildTool::D8), &args).await
    }

    async fn compile_resources(&self, ctx: &StepContext) -> Result<ToolOutput, BuildError> {
        if !ctx.app.manifest.is_file() {
            return Err(BuildError::MissingInput(format!(
                "manifest {} does not exist",
                ctx.app.manifest.display()
            )));
        }
        tokio::fs::create_dir_all(&ctx.paths.output_dir).await?;

        let aapt2 = ctx.toolchain.tool(BuildTool::Aapt2);
        let mut diagnostics = String::new();

        let compiled = ctx.paths.compiled_resources();
        let res_dir = ctx.app.res_dir.as_ref().filter(|dir| dir.is_dir());
        if let Some(res_dir) = res_dir {
            let args: Vec<OsString> = vec![
                "compile".into(),
                "--dir".into(),
                res_dir.clone().into_os_string(),
                "-o".into(),
                compiled.clone().into_os_string(),
            ];
            let output = run_tool(&aapt2, &args).await?;
            diagnostics.push_str(&output.diagnostics);
            if !output.success {
                return Ok(ToolOutput::failed(diagnostics));
            }
        }

        let mut args: Vec<OsString> = vec![
            "link".into(),
            "-o".into(),
            ctx.paths.base_apk().into_os_string(),
            "--manifest".into(),
            ctx.app.manifest.clone().into_os_string(),
            "-I".into(),
            ctx.toolchain.android_jar().into_os_string(),
            "--min-sdk-version".into(),
            ctx.toolchain.min_api().to_string().into(),
            "--target-sdk-version".into(),
            ctx.toolchain.api_level().to_string().into(),
            "--auto-add-overlay".into(),
        ];
        if let Some(ref package) = ctx.app.package {
            args.push("--rename-manifest-package".into());
            args.push(package.into());
        }
        if let Some(assets) = ctx.app.assets_dir.as_ref().filter(|dir| dir.is_dir()) {
            args.push("-A".into());
            args.push(assets.clone().into_os_string());
        }
        if res_dir.is_some() {
            args.push("-R".into());
            args.push(compiled.into_os_string());
        }

        let output = run_tool(&aapt2, &args).await?;
        diagnostics.push_str(&output.diagnostics);
        Ok(ToolOutput { success: output.success, diagnostics })
    }

    async fn install_native_library(&self, ctx: &StepContext) -> Result<ToolOutput, BuildError> {
        let lib = &ctx.app.native_lib;
        if !lib.is_file() {
            return Err(BuildError::MissingInput(format!(
                "native library {} does not exist",
                lib.display()
            )));
        }
        let Some(file_name) = lib.file_name() else {
            return Err(BuildError::MissingInput(format!("{} is not a file path", lib.display())));
        };

        recreate_dir(&ctx.paths.native_dir()).await?;
        let abi_dir = ctx.paths.native_abi_dir();
        tokio::fs::create_dir_all(&abi_dir).await?;
        let dest = abi_dir.join(file_name);
        let bytes = tokio::fs::copy(lib, &dest).await?;

        Ok(ToolOutput::ok(format!(
            "copied {} ({} bytes) to {}",
            lib.display(),
            bytes,
            dest.display()
        )))
    }

    async fn package_artifact(&self, ctx: &StepContext) -> Result<ToolOutput, BuildError> {
        let paths = &ctx.paths;
        let added = package::assemble_apk(
            &paths.base_apk(),
            &paths.dex_dir(),
            &paths.native_dir(),
            &paths.unaligned_apk(),
        )?;
        debug!("Added {} entries to {:?}", added, paths.unaligned_apk());

        let args = signing::zipalign_args(&paths.unaligned_apk(), &paths.aligned_apk());
        run_tool(&ctx.toolchain.tool(BuildTool::Zipalign), &args).await
    }

    async fn sign_artifact(&self, ctx: &StepContext) -> Result<ToolOutput, BuildError> {
        signing::check_keystore(&ctx.signing)?;
        let args = signing::sign_args(
            &ctx.signing,
            ctx.toolchain.min_api(),
            &ctx.paths.aligned_apk(),
            &ctx.paths.signed_apk(),
        );
        run_tool(&ctx.toolchain.tool(BuildTool::Apksigner), &args).await
    }

    async fn verify_artifact(&self, ctx: &StepContext) -> Result<ToolOutput, BuildError> {
        let apk = ctx.paths.signed_apk();

        let problems = package::inspect_apk(&apk)?.problems();
        if !problems.is_empty() {
            return Ok(ToolOutput::failed(problems.join("\n")));
        }

        let apksigner = ctx.toolchain.tool(BuildTool::Apksigner);
        let verify = run_tool(&apksigner, &signing::verify_args(&apk)).await?;
        if !verify.success {
            return Ok(verify);
        }

        let aligned = run_tool(
            &ctx.toolchain.tool(BuildTool::Zipalign),
            &signing::zipalign_check_args(&apk),
        )
        .await?;
        Ok(ToolOutput {
            success: aligned.success,
            diagnostics: format!("{}{}", verify.diagnostics, aligned.diagnostics),
        })
    }

    async fn deploy_artifact(&self, ctx: &StepContext) -> Result<ToolOutput, BuildError> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(ref serial) = ctx.deploy.device_serial {
            args.push("-s".into());
            args.push(serial.into());
        }
        args.push("install".into());
        args.push("-r".into());
        args.push(ctx.paths.signed_apk().into_os_string());

        run_tool(&ctx.toolchain.adb(), &args).await
    }
}

#[async_trait]
impl ToolInvoker for ProcessInvoker {
    async fn invoke(&self, step: StepId, context: &StepContext) -> Result<ToolOutput, BuildError> {
        match step {
            StepId::CompileEntryPoint => self.compile_entry_point(context).await,
            StepId::DexConvert => self.dex_convert(context).await,
            StepId::CompileResources => self.compile_resources(context).await,
            StepId::InstallNativeLibrary => self.install_native_library(context).await,
            StepId::PackageArtifact => self.package_artifact(context).await,
            StepId::SignArtifact => self.sign_artifact(context).await,
            StepId::VerifyArtifact => self.verify_artifact(context).await,
            StepId::DeployArtifact => self.deploy_artifact(context).await,
        }
    }
}

/// Run one tool to completion, capturing its output
async fn run_tool(program: &Path, args: &[OsString]) -> Result<ToolOutput, BuildError> {
    info!("Running {}", program.file_name().unwrap_or(program.as_os_str()).to_string_lossy());
    debug!("{} {}", program.display(), signing::redact(args));

    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            BuildError::Io(std::io::Error::new(e.kind(), format!("{}: {}", program.display(), e)))
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let diagnostics = format!("{}{}", stdout, stderr);

    Ok(ToolOutput {
        success: output.status.success(),
        diagnostics,
    })
}

/// All files below `dir` with the given extension, sorted for stable command lines
fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension() == Some(OsStr::new(ext)))
        .collect();
    files.sort();
    files
}

async fn recreate_dir(dir: &Path) -> Result<(), BuildError> {
    if dir.exists() {
        tokio::fs::remove_dir_all(dir).await?;
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::valid_toolchain;
    use apkforge_core::ForgeConfig;
    use std::fs;
    use tempfile::TempDir;

    fn context(dir: &Path) -> StepContext {
        let mut config = ForgeConfig::default().anchored_at(dir);
        config.app.name = "demo".to_string();
        StepContext::new(valid_toolchain(), &config)
    }

    #[test]
    fn test_files_with_extension() {
        let dir = TempDir::new().unwrap();
        let pkg = dir.path().join("com").join("example");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("MainActivity.java"), b"class A {}").unwrap();
        fs::write(pkg.join("Helper.java"), b"class B {}").unwrap();
        fs::write(pkg.join("notes.txt"), b"").unwrap();

        let files = files_with_extension(dir.path(), "java");
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("Helper.java"));
        assert!(files_with_extension(&dir.path().join("missing"), "java").is_empty());
    }

    #[tokio::test]
    async fn test_missing_java_sources() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let result = ProcessInvoker::new().invoke(StepId::CompileEntryPoint, &ctx).await;
        assert!(matches!(result, Err(BuildError::MissingInput(_))));
    }

    #[tokio::test]
    async fn test_install_native_library() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        fs::write(&ctx.app.native_lib, b"\x7fELF").unwrap();

        let output = ProcessInvoker::new()
            .invoke(StepId::InstallNativeLibrary, &ctx)
            .await
            .unwrap();
        assert!(output.success);
        assert!(ctx.paths.native_abi_dir().join("libmain.so").is_file());
    }

    #[tokio::test]
    async fn test_missing_manifest() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let result = ProcessInvoker::new().invoke(StepId::CompileResources, &ctx).await;
        assert!(matches!(result, Err(BuildError::MissingInput(_))));
    }

    #[tokio::test]
    async fn test_missing_tool_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = run_tool(&dir.path().join("no-such-tool"), &[]).await;
        assert!(matches!(result, Err(BuildError::Io(_))));
    }
}
