use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;

use crate::build_python_macos::{
    commands, default_package_root, env_vars, extensions, features, generate_python_bindings,
    messages, paths,
};
use crate::cargo_utils::{CargoBuilder, RustupTargetInstaller};
use crate::python_env;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LinuxTarget {
    #[value(alias = "x86_64")]
    X86_64,
    #[value(alias = "aarch64")]
    Aarch64,
}

impl LinuxTarget {
    fn triple(&self) -> &'static str {
        match self {
            LinuxTarget::X86_64 => "x86_64-unknown-linux-gnu",
            LinuxTarget::Aarch64 => "aarch64-unknown-linux-gnu",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinuxBuildSettings {
    pub python_sources_dir: String,
    pub python_package_dir: Option<String>,
    pub interpreter: String,
    pub skip_install: bool,
    pub features: Vec<String>,
    pub targets: Vec<LinuxTarget>,
}

impl LinuxBuildSettings {
    pub fn new(python_sources_dir: impl Into<String>) -> Self {
        Self {
            python_sources_dir: python_sources_dir.into(),
            python_package_dir: None,
            interpreter: commands::DEFAULT_PYTHON.to_string(),
            skip_install: false,
            features: vec![features::TEST_UTILS.to_string()],
            targets: vec![LinuxTarget::X86_64],
        }
    }

    pub fn python_package_dir(mut self, dir: impl Into<String>) -> Self {
        self.python_package_dir = Some(dir.into());
        self
    }

    pub fn interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn skip_install(mut self, skip: bool) -> Self {
        self.skip_install = skip;
        self
    }

    pub fn features(mut self, features: Vec<String>) -> Self {
        self.features = features;
        self
    }

    pub fn targets(mut self, targets: Vec<LinuxTarget>) -> Self {
        self.targets = targets;
        self
    }
}

#[derive(Debug, Clone)]
pub struct LinuxBuildOutcome {
    pub python_file_path: PathBuf,
    pub shared_lib_paths: Vec<PathBuf>,
    pub path_to_crate: PathBuf,
}

pub fn build_python_linux(
    settings: LinuxBuildSettings,
) -> Result<LinuxBuildOutcome, Box<dyn std::error::Error>> {
    let package_name = std::env::var(env_vars::CARGO_PKG_NAME)
        .map_err(|_| "CARGO_PKG_NAME env var should be set")?;
    let path_to_crate: PathBuf = std::env::var(env_vars::CARGO_MANIFEST_DIR)
        .map_err(|_| "CARGO_MANIFEST_DIR env var should be set")?
        .into();

    println!(
        "{} payjoin_ffi_build::build_python_linux - settings {:?}",
        messages::LINUX_BUILD,
        settings
    );

    check_environment(&path_to_crate, &settings)?;

    let cargo_toml = path_to_crate.join(paths::CARGO_TOML);
    CargoBuilder::new()
        .build_host_library(&cargo_toml, &settings.features)
        .execute()
        .map_err(|e| format!("Failed to build host library for bindgen: {}", e))?;

    let host_lib = shared_lib_path(&path_to_crate, paths::RELEASE_SUBDIR, &package_name);

    let sources_dir = resolve_relative_dir(&path_to_crate, &settings.python_sources_dir)?;
    fs::create_dir_all(&sources_dir)?;

    let python_file_path = generate_python_bindings(&host_lib, &sources_dir)?;

    let triples: Vec<&str> = settings.targets.iter().map(LinuxTarget::triple).collect();
    RustupTargetInstaller::new()
        .targets(&triples)
        .execute()
        .map_err(|e| format!("Failed to provision Linux targets: {}", e))?;

    let mut shared_lib_paths = Vec::new();
    for target in &settings.targets {
        let triple = target.triple();
        CargoBuilder::new()
            .build_release_target(&cargo_toml, triple, paths::RELEASE_SMALLER_SUBDIR)
            .execute()
            .map_err(|e| format!("Failed to build target {}: {}", triple, e))?;

        let artifact = shared_lib_path(
            &path_to_crate,
            &format!("{}/{}", triple, paths::RELEASE_SMALLER_SUBDIR),
            &package_name,
        );
        let dest = sources_dir.join(
            artifact
                .file_name()
                .ok_or("Failed to derive artifact file name")?,
        );
        fs::copy(&artifact, &dest).map_err(|error| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!(
                    "Failed to copy {:?} to {:?}. Ensure the {} toolchain is installed. {}",
                    artifact, dest, triple, error
                ),
            )
        })?;
        println!("{} Built {} for {}", messages::SUCCESS, package_name, triple);
        shared_lib_paths.push(dest);
    }

    println!("{} Linux build completed", messages::SUCCESS);

    Ok(LinuxBuildOutcome {
        python_file_path,
        shared_lib_paths,
        path_to_crate,
    })
}

fn check_environment(
    path_to_crate: &Path,
    settings: &LinuxBuildSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    let version = python_env::check_interpreter(&settings.interpreter)?;
    println!("{} Using {}", messages::PYTHON_ENV, version);

    if settings.skip_install {
        println!(
            "{} Skipping dependency install as requested",
            messages::PYTHON_ENV
        );
        return Ok(());
    }

    let package_root = settings
        .python_package_dir
        .clone()
        .unwrap_or_else(|| default_package_root(&settings.python_sources_dir));
    let requirements = resolve_relative_dir(path_to_crate, &package_root)?
        .join(paths::REQUIREMENTS_TXT);
    if requirements.exists() {
        python_env::install_requirements(&settings.interpreter, &requirements)?;
        println!(
            "{} Installed dependencies from {:?}",
            messages::PYTHON_ENV,
            requirements
        );
    } else {
        println!(
            "{} No requirements file at {:?}, nothing to install",
            messages::PYTHON_ENV,
            requirements
        );
    }

    Ok(())
}

fn shared_lib_path(crate_path: &Path, profile_dir: &str, package: &str) -> PathBuf {
    crate_path.join(paths::RUST_BUILD_DIR).join(format!(
        "{}/lib{}.{}",
        profile_dir,
        package,
        extensions::SHARED_LIB
    ))
}

fn resolve_relative_dir(
    crate_path: &Path,
    relative: &str,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let parent = crate_path
        .parent()
        .ok_or("Cannot find parent directory of crate")?;
    Ok(parent.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn triples_match_their_targets() {
        assert_eq!(LinuxTarget::X86_64.triple(), "x86_64-unknown-linux-gnu");
        assert_eq!(LinuxTarget::Aarch64.triple(), "aarch64-unknown-linux-gnu");
    }

    #[test]
    fn settings_default_to_a_single_host_target() {
        let settings = LinuxBuildSettings::new("payjoin-python/src/payjoin");
        assert_eq!(settings.targets.len(), 1);
        assert_eq!(settings.targets[0].triple(), "x86_64-unknown-linux-gnu");
    }

    #[test]
    fn shared_lib_paths_follow_cargo_layout() {
        let crate_path = Path::new("/repo/payjoin-ffi");
        assert_eq!(
            shared_lib_path(crate_path, "release", "payjoin_ffi"),
            PathBuf::from("/repo/payjoin-ffi/target/release/libpayjoin_ffi.so")
        );
        assert_eq!(
            shared_lib_path(
                crate_path,
                "x86_64-unknown-linux-gnu/release-smaller",
                "payjoin_ffi"
            ),
            PathBuf::from(
                "/repo/payjoin-ffi/target/x86_64-unknown-linux-gnu/release-smaller/libpayjoin_ffi.so"
            )
        );
    }

    #[test]
    fn relative_dirs_resolve_against_the_crate_parent() {
        let resolved = resolve_relative_dir(Path::new("/repo/payjoin-ffi"), "payjoin-python")
            .expect("parent dir exists");
        assert_eq!(resolved, PathBuf::from("/repo/payjoin-python"));
    }
}
