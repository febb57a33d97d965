//! Build Paths
//!
//! Where each step writes its intermediates inside the build directory.

use std::path::PathBuf;
use apkforge_android_toolchain::TARGET_ABI;

/// Layout of the build directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPaths {
    /// Build directory root
    pub output_dir: PathBuf,
    /// Artifact base name
    pub name: String,
}

impl BuildPaths {
    pub fn new(output_dir: PathBuf, name: impl Into<String>) -> Self {
        Self {
            output_dir,
            name: name.into(),
        }
    }

    /// Compiled `.class` files of the entry point
    pub fn classes_dir(&self) -> PathBuf {
        self.output_dir.join("obj")
    }

    /// Output of d8
    pub fn dex_dir(&self) -> PathBuf {
        self.output_dir.join("dex")
    }

    /// Output of `aapt2 compile`
    pub fn compiled_resources(&self) -> PathBuf {
        self.output_dir.join("resources.zip")
    }

    /// Output of `aapt2 link`: manifest, resource table and assets only
    pub fn base_apk(&self) -> PathBuf {
        self.output_dir.join(format!("{}.base.apk", self.name))
    }

    /// Staging root mirroring the APK's `lib/` tree
    pub fn native_dir(&self) -> PathBuf {
        self.output_dir.join("native")
    }

    /// `native/lib/<abi>`
    pub fn native_abi_dir(&self) -> PathBuf {
        self.native_dir().join("lib").join(TARGET_ABI.abi_name())
    }

    /// Complete but unaligned APK
    pub fn unaligned_apk(&self) -> PathBuf {
        self.output_dir.join(format!("{}.unaligned.apk", self.name))
    }

    /// Aligned, unsigned APK
    pub fn aligned_apk(&self) -> PathBuf {
        self.output_dir.join(format!("{}.aligned.apk", self.name))
    }

    /// Final signed APK
    pub fn signed_apk(&self) -> PathBuf {
        self.output_dir.join(format!("{}.apk", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_paths() {
        let paths = BuildPaths::new(PathBuf::from("/proj/build"), "hello");
        assert_eq!(paths.signed_apk(), PathBuf::from("/proj/build/hello.apk"));
        assert_eq!(paths.aligned_apk(), PathBuf::from("/proj/build/hello.aligned.apk"));
        assert!(paths.native_abi_dir().ends_with(Path::new("native/lib/arm64-v8a")));
        assert_ne!(paths.base_apk(), paths.unaligned_apk());
    }
}
