use std::path::Path;
use std::process::Command;

use crate::build_python_macos::cargo_args;
use crate::build_python_macos::commands;
use crate::build_python_macos::rustup_args;

pub struct CargoBuilder {
    command: Command,
}

impl CargoBuilder {
    pub fn new() -> Self {
        Self {
            command: Command::new(commands::CARGO),
        }
    }

    /// Host-architecture release build used for binding generation; this is
    /// the only build that enables the configured features.
    pub fn build_host_library(mut self, manifest_path: &Path, features: &[String]) -> Self {
        self.command
            .args([cargo_args::BUILD, cargo_args::LIB, cargo_args::RELEASE]);
        if !features.is_empty() {
            self.command
                .arg(cargo_args::FEATURES)
                .arg(features.join(","));
        }
        self.command
            .arg(cargo_args::MANIFEST_PATH)
            .arg(manifest_path);
        self
    }

    /// Size-optimized build of a single target architecture.
    pub fn build_release_target(
        mut self,
        manifest_path: &Path,
        target: &str,
        profile: &str,
    ) -> Self {
        self.command
            .args([cargo_args::BUILD, cargo_args::LIB, cargo_args::PROFILE, profile]);
        self.command
            .arg(cargo_args::MANIFEST_PATH)
            .arg(manifest_path);
        self.command.arg(cargo_args::TARGET).arg(target);
        self
    }

    pub fn execute(mut self) -> Result<(), Box<dyn std::error::Error>> {
        let output = self.command.output()?;

        if !output.status.success() {
            return Err(format!(
                "Cargo command failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )
            .into());
        }

        Ok(())
    }
}

pub struct RustupTargetInstaller {
    command: Command,
}

impl RustupTargetInstaller {
    pub fn new() -> Self {
        let mut command = Command::new(commands::RUSTUP);
        command.args([rustup_args::TARGET, rustup_args::ADD]);
        Self { command }
    }

    pub fn targets(mut self, triples: &[&str]) -> Self {
        self.command.args(triples);
        self
    }

    pub fn execute(mut self) -> Result<(), Box<dyn std::error::Error>> {
        let output = self.command.output()?;

        if !output.status.success() {
            return Err(format!(
                "Rustup command failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args_of(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn host_library_build_enables_features() {
        let builder = CargoBuilder::new().build_host_library(
            Path::new("/repo/payjoin-ffi/Cargo.toml"),
            &["_test-utils".to_string()],
        );

        assert_eq!(
            args_of(&builder.command),
            vec![
                "build",
                "--lib",
                "--release",
                "--features",
                "_test-utils",
                "--manifest-path",
                "/repo/payjoin-ffi/Cargo.toml",
            ]
        );
    }

    #[test]
    fn host_library_build_omits_empty_feature_flag() {
        let builder =
            CargoBuilder::new().build_host_library(Path::new("/repo/payjoin-ffi/Cargo.toml"), &[]);

        assert_eq!(
            args_of(&builder.command),
            vec![
                "build",
                "--lib",
                "--release",
                "--manifest-path",
                "/repo/payjoin-ffi/Cargo.toml",
            ]
        );
    }

    #[test]
    fn release_target_build_selects_profile_and_target() {
        let builder = CargoBuilder::new().build_release_target(
            Path::new("/repo/payjoin-ffi/Cargo.toml"),
            "aarch64-apple-darwin",
            "release-smaller",
        );

        assert_eq!(
            args_of(&builder.command),
            vec![
                "build",
                "--lib",
                "--profile",
                "release-smaller",
                "--manifest-path",
                "/repo/payjoin-ffi/Cargo.toml",
                "--target",
                "aarch64-apple-darwin",
            ]
        );
    }

    #[test]
    fn rustup_installer_adds_all_requested_targets() {
        let installer = RustupTargetInstaller::new()
            .targets(&["aarch64-apple-darwin", "x86_64-apple-darwin"]);

        assert_eq!(
            args_of(&installer.command),
            vec![
                "target",
                "add",
                "aarch64-apple-darwin",
                "x86_64-apple-darwin",
            ]
        );
    }
}
