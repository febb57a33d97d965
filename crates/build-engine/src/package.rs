//! APK Assembly and Inspection
//!
//! Merges the resource-linked base APK with the dex output and the native
//! libraries, and checks the result before it is signed or shipped.

use std::fs::File;
use std::io;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use apkforge_android_toolchain::TARGET_ABI;

use crate::BuildError;

/// Write `output` as `base_apk` plus every `*.dex` in `dex_dir` (at the
/// archive root) and every file under `native_dir` (keeping its relative path,
/// e.g. `lib/arm64-v8a/libmain.so`). Returns the number of entries added.
///
/// Native libraries are stored uncompressed so they can be page-aligned and
/// mapped directly.
pub fn assemble_apk(
    base_apk: &Path,
    dex_dir: &Path,
    native_dir: &Path,
    output: &Path,
) -> Result<usize, BuildError> {
    let mut base = ZipArchive::new(File::open(base_apk)?)?;
    let mut writer = ZipWriter::new(File::create(output)?);

    for i in 0..base.len() {
        let entry = base.by_index_raw(i)?;
        let name = entry.name().to_string();
        if is_dex(&name) || name.starts_with("lib/") {
            debug!("Dropping stale {} from base APK", name);
            continue;
        }
        writer.raw_copy_file(entry)?;
    }

    let mut added = 0;

    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut dex_files: Vec<_> = std::fs::read_dir(dex_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.file_name().map_or(false, |n| is_dex(&n.to_string_lossy())))
        .collect();
    dex_files.sort();
    if dex_files.is_empty() {
        return Err(BuildError::MissingInput(format!("no .dex files in {}", dex_dir.display())));
    }
    for path in dex_files {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        writer.start_file(name, deflated)?;
        io::copy(&mut File::open(&path)?, &mut writer)?;
        added += 1;
    }

    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    for entry in WalkDir::new(native_dir).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(native_dir) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        writer.start_file(name, stored)?;
        io::copy(&mut File::open(entry.path())?, &mut writer)?;
        added += 1;
    }

    writer.finish()?;
    Ok(added)
}

fn is_dex(name: &str) -> bool {
    name.starts_with("classes") && name.ends_with(".dex") && !name.contains('/')
}

/// What a packaged APK contains
#[derive(Debug, Clone, Default)]
pub struct ApkContents {
    pub entries: Vec<String>,
    pub has_manifest: bool,
    pub has_dex: bool,
    /// Native libraries for the target ABI
    pub native_libs: Vec<String>,
    /// Native libraries that were compressed (they must be stored)
    pub compressed_libs: Vec<String>,
}

impl ApkContents {
    /// Problems that make the APK unusable on a device
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.has_manifest {
            problems.push("AndroidManifest.xml is missing".to_string());
        }
        if !self.has_dex {
            problems.push("classes.dex is missing".to_string());
        }
        if self.native_libs.is_empty() {
            problems.push(format!("no native library for {}", TARGET_ABI.abi_name()));
        }
        for lib in &self.compressed_libs {
            problems.push(format!("{} is compressed", lib));
        }
        problems
    }
}

/// List the entries of an APK that matter for a health check
pub fn inspect_apk(path: &Path) -> Result<ApkContents, BuildError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let lib_prefix = format!("lib/{}/", TARGET_ABI.abi_name());
    let mut contents = ApkContents::default();

    for i in 0..archive.len() {
        let file = archive.by_index_raw(i)?;
        let name = file.name().to_string();

        if name == "AndroidManifest.xml" {
            contents.has_manifest = true;
        }
        if is_dex(&name) {
            contents.has_dex = true;
        }
        if name.starts_with(&lib_prefix) && name.ends_with(".so") {
            if file.compression() != CompressionMethod::Stored {
                contents.compressed_libs.push(name.clone());
            }
            contents.native_libs.push(name.clone());
        }
        contents.entries.push(name);
    }

    Ok(contents)
}
