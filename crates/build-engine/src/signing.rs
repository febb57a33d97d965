//! APK Signing
//!
//! Command lines for `apksigner` and `zipalign`.

use std::ffi::OsString;
use std::path::Path;

use apkforge_core::SigningConfig;

use crate::BuildError;

/// Page alignment for uncompressed native libraries
pub const ZIP_ALIGNMENT: &str = "4";

/// Make sure the keystore exists; creating one is left to `keytool`
pub fn check_keystore(signing: &SigningConfig) -> Result<(), BuildError> {
    if signing.keystore.is_file() {
        return Ok(());
    }
    Err(BuildError::MissingInput(format!(
        "keystore {} does not exist (create one with: keytool -genkeypair -keystore {} -alias {} -keyalg RSA -keysize 2048 -validity 10000)",
        signing.keystore.display(),
        signing.keystore.display(),
        signing.alias,
    )))
}

/// `apksigner sign` arguments
pub fn sign_args(
    signing: &SigningConfig,
    min_sdk: u8,
    input: &Path,
    output: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "sign".into(),
        "--ks".into(),
        signing.keystore.clone().into_os_string(),
        "--ks-pass".into(),
        format!("pass:{}", signing.store_password).into(),
        "--ks-key-alias".into(),
        signing.alias.clone().into(),
        "--key-pass".into(),
        format!("pass:{}", signing.effective_key_password()).into(),
        "--min-sdk-version".into(),
        min_sdk.to_string().into(),
    ];

    args.push("--out".into());
    args.push(output.as_os_str().to_owned());
    args.push(input.as_os_str().to_owned());
    args
}

/// `apksigner verify` arguments
pub fn verify_args(apk: &Path) -> Vec<OsString> {
    vec!["verify".into(), "--verbose".into(), apk.as_os_str().to_owned()]
}

/// `zipalign` arguments to align `input` into `output`
pub fn zipalign_args(input: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-f".into(),
        "-p".into(),
        ZIP_ALIGNMENT.into(),
        input.as_os_str().to_owned(),
        output.as_os_str().to_owned(),
    ]
}

/// `zipalign` arguments to check the alignment of `apk`
pub fn zipalign_check_args(apk: &Path) -> Vec<OsString> {
    vec!["-c".into(), "-p".into(), ZIP_ALIGNMENT.into(), apk.as_os_str().to_owned()]
}

/// Render arguments for logging with passwords masked
pub fn redact(args: &[OsString]) -> String {
    args.iter()
        .map(|a| {
            let a = a.to_string_lossy();
            if a.starts_with("pass:") { "pass:****".to_string() } else { a.into_owned() }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
