use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use camino::Utf8PathBuf;
use uniffi_bindgen::bindings::PythonBindingGenerator;

use crate::cargo_utils::{CargoBuilder, RustupTargetInstaller};
use crate::python_env;

// ==================== CONSTANTS ====================

/// macOS target architectures fused into the fat library
pub(crate) mod targets {
    /// macOS (Apple Silicon)
    pub const MACOS_ARM: &str = "aarch64-apple-darwin";
    /// macOS (Intel)
    pub const MACOS_X86: &str = "x86_64-apple-darwin";
    /// Both architectures, in fusion order
    pub const ALL: [&str; 2] = [MACOS_ARM, MACOS_X86];
}

/// Build-related directory and file names
pub(crate) mod paths {
    /// Rust/Cargo build output directory name
    pub const RUST_BUILD_DIR: &str = "target";
    /// Profile directory for the host bindgen build
    pub const RELEASE_SUBDIR: &str = "release";
    /// Size-optimized profile directory used for shipped binaries
    pub const RELEASE_SMALLER_SUBDIR: &str = "release-smaller";
    /// Cargo.toml file name
    pub const CARGO_TOML: &str = "Cargo.toml";
    /// Declared Python dependencies file name
    pub const REQUIREMENTS_TXT: &str = "requirements.txt";
    /// Python package metadata file name
    pub const PYPROJECT_TOML: &str = "pyproject.toml";
}

/// File extensions
pub(crate) mod extensions {
    /// Dynamic library extension on macOS
    pub const DYNAMIC_LIB: &str = "dylib";
    /// Shared object extension on Linux
    pub const SHARED_LIB: &str = "so";
    /// Python source file extension
    pub const PYTHON: &str = "py";
}

/// Cargo command arguments
pub(crate) mod cargo_args {
    /// Build command
    pub const BUILD: &str = "build";
    /// Library target type
    pub const LIB: &str = "--lib";
    /// Release mode
    pub const RELEASE: &str = "--release";
    /// Feature selection flag
    pub const FEATURES: &str = "--features";
    /// Profile selection flag
    pub const PROFILE: &str = "--profile";
    /// Manifest path flag
    pub const MANIFEST_PATH: &str = "--manifest-path";
    /// Target flag
    pub const TARGET: &str = "--target";
}

/// Rustup command arguments
pub(crate) mod rustup_args {
    /// Target subcommand
    pub const TARGET: &str = "target";
    /// Add subcommand
    pub const ADD: &str = "add";
}

/// Lipo arguments
mod lipo_args {
    /// Create flag
    pub const CREATE: &str = "-create";
    /// Output flag
    pub const OUTPUT: &str = "-output";
}

/// Python interpreter and pip arguments
pub(crate) mod python_args {
    /// Version flag
    pub const VERSION: &str = "--version";
    /// Run-module flag
    pub const MODULE: &str = "-m";
    /// Pip module name
    pub const PIP: &str = "pip";
    /// Install subcommand
    pub const INSTALL: &str = "install";
    /// Requirements file flag
    pub const REQUIREMENT: &str = "-r";
}

/// Build status messages
pub(crate) mod messages {
    /// Build start emoji
    pub const BUILD_START: &str = "🧱";
    /// Package build emoji
    pub const PACKAGE_BUILD: &str = "📦";
    /// FFI generation emoji
    pub const FFI_GEN: &str = "🔮";
    /// Python environment emoji
    pub const PYTHON_ENV: &str = "🐍";
    /// Linux build emoji
    pub const LINUX_BUILD: &str = "🐧";
    /// Success emoji
    pub const SUCCESS: &str = "✅";
}

/// Environment variable names
pub(crate) mod env_vars {
    /// Cargo package name
    pub const CARGO_PKG_NAME: &str = "CARGO_PKG_NAME";
    /// Cargo manifest directory
    pub const CARGO_MANIFEST_DIR: &str = "CARGO_MANIFEST_DIR";
}

/// Command names
pub(crate) mod commands {
    /// Cargo command
    pub const CARGO: &str = "cargo";
    /// Rustup command
    pub const RUSTUP: &str = "rustup";
    /// Lipo command
    pub const LIPO: &str = "lipo";
    /// Default Python interpreter
    pub const DEFAULT_PYTHON: &str = "python3";
}

/// Cargo feature names
pub(crate) mod features {
    /// Test utilities needed by the generated bindings' test suite.
    /// N.B. only the host bindgen build enables this; the shipped
    /// per-architecture binaries are built without it.
    pub const TEST_UTILS: &str = "_test-utils";
}

// ==================== TYPES ====================

/// Build configuration settings
#[derive(Clone, Debug)]
pub struct PythonBuildSettings {
    /// Path to the Python package source directory, relative to the crate's
    /// parent directory (e.g., "payjoin-python/src/payjoin")
    pub python_sources_dir: String,
    /// Python package root directory; defaults to the first component of
    /// `python_sources_dir`
    pub python_package_dir: Option<String>,
    /// Python interpreter to check and install dependencies with
    pub interpreter: String,
    /// Skip `pip install` of declared dependencies
    pub skip_install: bool,
    /// Cargo features enabled for the host bindgen build
    pub features: Vec<String>,
    /// Version to stamp into pyproject.toml (if provided, enables release mode)
    pub release_version: Option<String>,
}

impl PythonBuildSettings {
    /// Create new settings with the required python_sources_dir
    pub fn new(python_sources_dir: impl Into<String>) -> Self {
        Self {
            python_sources_dir: python_sources_dir.into(),
            python_package_dir: None,
            interpreter: commands::DEFAULT_PYTHON.to_string(),
            skip_install: false,
            features: vec![features::TEST_UTILS.to_string()],
            release_version: None,
        }
    }

    /// Set the Python package root directory (chainable)
    pub fn python_package_dir(mut self, dir: impl Into<String>) -> Self {
        self.python_package_dir = Some(dir.into());
        self
    }

    /// Set the interpreter (chainable)
    pub fn interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Set the skip_install flag (chainable)
    pub fn skip_install(mut self, skip: bool) -> Self {
        self.skip_install = skip;
        self
    }

    /// Set the bindgen build features (chainable)
    pub fn features(mut self, features: Vec<String>) -> Self {
        self.features = features;
        self
    }

    /// Set the release version (chainable)
    pub fn release_version(mut self, version: impl Into<String>) -> Self {
        self.release_version = Some(version.into());
        self
    }
}

/// Internal build configuration
#[derive(Clone, Debug)]
struct BuildConfig {
    package_name: String,
    path_to_crate: PathBuf,
    settings: PythonBuildSettings,
}

impl BuildConfig {
    /// Python package root, configured or derived from the sources dir
    fn package_root(&self) -> String {
        self.settings
            .python_package_dir
            .clone()
            .unwrap_or_else(|| default_package_root(&self.settings.python_sources_dir))
    }

    /// Fat library file name
    fn fat_lib_name(&self) -> String {
        format!("lib{}.{}", self.package_name, extensions::DYNAMIC_LIB)
    }
}

/// First path component of the sources dir, used when no package root is configured
pub(crate) fn default_package_root(python_sources_dir: &str) -> String {
    Path::new(python_sources_dir)
        .components()
        .next()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Path builder helper for consistent path construction
struct PathBuilder<'a> {
    crate_path: &'a Path,
}

impl<'a> PathBuilder<'a> {
    fn new(crate_path: &'a Path) -> Self {
        Self { crate_path }
    }

    /// Get path to Cargo.toml
    fn cargo_toml(&self) -> PathBuf {
        self.crate_path.join(paths::CARGO_TOML)
    }

    /// Get rust build directory path
    fn rust_build_dir(&self) -> PathBuf {
        self.crate_path.join(paths::RUST_BUILD_DIR)
    }

    /// Get the host dylib path produced by the bindgen build
    fn host_dylib(&self, package: &str) -> PathBuf {
        self.rust_build_dir().join(format!(
            "{}/lib{}.{}",
            paths::RELEASE_SUBDIR,
            package,
            extensions::DYNAMIC_LIB
        ))
    }

    /// Get the size-optimized dylib path for given target architecture
    fn target_dylib(&self, target: &str, package: &str) -> PathBuf {
        self.rust_build_dir().join(format!(
            "{}/{}/lib{}.{}",
            target,
            paths::RELEASE_SMALLER_SUBDIR,
            package,
            extensions::DYNAMIC_LIB
        ))
    }

    /// Get Python sources directory using provided path from settings
    fn python_sources(
        &self,
        python_sources_dir: &str,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Ok(self.parent_dir()?.join(python_sources_dir))
    }

    /// Get requirements.txt path inside the Python package root
    fn requirements_txt(&self, package_root: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Ok(self
            .parent_dir()?
            .join(package_root)
            .join(paths::REQUIREMENTS_TXT))
    }

    /// Get pyproject.toml path inside the Python package root
    fn pyproject_toml(&self, package_root: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Ok(self
            .parent_dir()?
            .join(package_root)
            .join(paths::PYPROJECT_TOML))
    }

    fn parent_dir(&self) -> Result<&Path, Box<dyn std::error::Error>> {
        self.crate_path
            .parent()
            .ok_or_else(|| "Cannot find parent directory of crate".into())
    }
}

// ==================== PUBLIC API ====================

pub struct PythonBuildOutcome {
    pub python_file_path: PathBuf,
    pub fat_lib_path: PathBuf,
    pub path_to_crate: PathBuf,
}

/// Main entry point for building macOS Python bindings
///
/// This function orchestrates the complete provisioning pipeline:
/// 1. Checks the Python environment and installs declared dependencies
/// 2. Builds the host library and generates Python bindings using UniFFI
/// 3. Provisions both macOS compilation targets via rustup
/// 4. Builds a size-optimized library per architecture
/// 5. Fuses the two dylibs into one fat binary with lipo
pub fn build_python_macos(
    settings: PythonBuildSettings,
) -> Result<PythonBuildOutcome, Box<dyn std::error::Error>> {
    // Get package information from environment
    let package_name = std::env::var(env_vars::CARGO_PKG_NAME)
        .map_err(|_| "CARGO_PKG_NAME env var should be set")?;
    let path_to_crate: PathBuf = std::env::var(env_vars::CARGO_MANIFEST_DIR)
        .map_err(|_| "CARGO_MANIFEST_DIR env var should be set")?
        .into();

    let config = BuildConfig {
        package_name,
        path_to_crate,
        settings,
    };

    println!(
        "{} payjoin_ffi_build::build_python_macos - config {:?}",
        messages::BUILD_START,
        config
    );

    let outcome = build_with_config(&config)?;

    println!(
        "{} {} All done! Python bindings at {:?}, fat library at {:?}",
        messages::PACKAGE_BUILD,
        messages::SUCCESS,
        outcome.python_file_path,
        outcome.fat_lib_path
    );

    Ok(outcome)
}

// ==================== INTERNAL IMPLEMENTATION ====================

/// Core build orchestration function
///
/// Executes the five pipeline phases strictly in sequence; the first
/// failing phase aborts the whole run.
fn build_with_config(
    config: &BuildConfig,
) -> Result<PythonBuildOutcome, Box<dyn std::error::Error>> {
    // Phase 1: Python environment check and dependency install
    EnvironmentChecker::new(config).check()?;

    // Phase 2: Host build plus UniFFI Python binding generation
    let python_file_path = FfiBindingGenerator::new(config).generate()?;

    // Phase 3 and 4: provision both macOS targets, then build each
    let builder = ReleaseTargetBuilder::new(config);
    builder.provision_targets()?;
    builder.build_all_targets()?;

    // Phase 5: fuse architecture slices into the fat library
    let fat_lib_path = FatLibraryBuilder::new(config).fuse()?;

    if let Some(version) = &config.settings.release_version {
        PyprojectUpdater::new(config).update(version)?;
    }

    Ok(PythonBuildOutcome {
        python_file_path,
        fat_lib_path,
        path_to_crate: config.path_to_crate.clone(),
    })
}

/// Python environment checker - verifies the interpreter and installs
/// declared dependencies
struct EnvironmentChecker<'a> {
    config: &'a BuildConfig,
    paths: PathBuilder<'a>,
}

impl<'a> EnvironmentChecker<'a> {
    fn new(config: &'a BuildConfig) -> Self {
        Self {
            config,
            paths: PathBuilder::new(&config.path_to_crate),
        }
    }

    fn check(&self) -> Result<(), Box<dyn std::error::Error>> {
        let interpreter = &self.config.settings.interpreter;
        let version = python_env::check_interpreter(interpreter)?;
        println!("{} Using {}", messages::PYTHON_ENV, version);

        if self.config.settings.skip_install {
            println!(
                "{} Skipping dependency install as requested",
                messages::PYTHON_ENV
            );
            return Ok(());
        }

        let requirements = self.paths.requirements_txt(&self.config.package_root())?;
        if requirements.exists() {
            python_env::install_requirements(interpreter, &requirements)?;
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
}

/// FFI binding generator - handles UniFFI Python binding generation
struct FfiBindingGenerator<'a> {
    config: &'a BuildConfig,
    paths: PathBuilder<'a>,
}

impl<'a> FfiBindingGenerator<'a> {
    fn new(config: &'a BuildConfig) -> Self {
        Self {
            config,
            paths: PathBuilder::new(&config.path_to_crate),
        }
    }

    /// Build the host library and generate Python bindings from it
    fn generate(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        println!(
            "{} Generating Python bindings for {}",
            messages::FFI_GEN,
            self.config.package_name
        );

        CargoBuilder::new()
            .build_host_library(&self.paths.cargo_toml(), &self.config.settings.features)
            .execute()
            .map_err(|e| format!("Failed to build host library for bindgen: {}", e))?;

        let dylib_path = self.paths.host_dylib(&self.config.package_name);
        let out_dir = self
            .paths
            .python_sources(&self.config.settings.python_sources_dir)?;
        fs::create_dir_all(&out_dir)?;

        let python_file_path = generate_python_bindings(&dylib_path, &out_dir)?;

        println!("{} generate finished", messages::SUCCESS);
        Ok(python_file_path)
    }
}

/// Call UniFFI to generate Python bindings from a compiled library
pub(crate) fn generate_python_bindings(
    library_path: &Path,
    out_dir: &Path,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let config_supplier = uniffi_bindgen::EmptyCrateConfigSupplier;

    let library_utf8 = Utf8PathBuf::from_path_buf(library_path.to_path_buf()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Non UTF-8 path for compiled library: {:?}", library_path),
        )
    })?;
    let out_dir_utf8 = Utf8PathBuf::from_path_buf(out_dir.to_path_buf()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Non UTF-8 path for Python output directory: {:?}", out_dir),
        )
    })?;

    let components = uniffi_bindgen::library_mode::generate_bindings(
        &library_utf8,
        None,
        &PythonBindingGenerator,
        &config_supplier,
        None,
        &out_dir_utf8,
        false,
    )?;

    let component = components
        .first()
        .ok_or("No UniFFI components discovered when generating Python bindings")?;
    let python_file = out_dir.join(format!(
        "{}.{}",
        component.ci.namespace(),
        extensions::PYTHON
    ));

    if !python_file.exists() {
        return Err(format!(
            "Expected Python bindings at {:?} but file was not generated",
            python_file
        )
        .into());
    }

    println!("{} Generated Python bindings", messages::FFI_GEN);

    Ok(python_file)
}

/// Release target builder - provisions and compiles both macOS architectures
struct ReleaseTargetBuilder<'a> {
    config: &'a BuildConfig,
    paths: PathBuilder<'a>,
}

impl<'a> ReleaseTargetBuilder<'a> {
    fn new(config: &'a BuildConfig) -> Self {
        Self {
            config,
            paths: PathBuilder::new(&config.path_to_crate),
        }
    }

    /// Ensure both macOS compilation targets are installed
    fn provision_targets(&self) -> Result<(), Box<dyn std::error::Error>> {
        RustupTargetInstaller::new()
            .targets(&targets::ALL)
            .execute()
            .map_err(|e| format!("Failed to provision macOS targets: {}", e))?;

        println!(
            "{} Provisioned targets {:?}",
            messages::SUCCESS,
            targets::ALL
        );
        Ok(())
    }

    /// Build the size-optimized library for each architecture, in sequence
    fn build_all_targets(&self) -> Result<(), Box<dyn std::error::Error>> {
        println!(
            "{} Building native binaries for package: {}",
            messages::PACKAGE_BUILD,
            self.config.package_name
        );

        for target in targets::ALL {
            self.build_target(target)?;
        }

        Ok(())
    }

    /// Build a single target architecture
    fn build_target(&self, target: &str) -> Result<(), Box<dyn std::error::Error>> {
        CargoBuilder::new()
            .build_release_target(
                &self.paths.cargo_toml(),
                target,
                paths::RELEASE_SMALLER_SUBDIR,
            )
            .execute()
            .map_err(|e| format!("Failed to build target {}: {}", target, e))?;

        println!(
            "{} Built {} for {}",
            messages::SUCCESS,
            self.config.package_name,
            target
        );
        Ok(())
    }
}

/// Fat library builder - fuses the per-architecture dylibs with lipo
struct FatLibraryBuilder<'a> {
    config: &'a BuildConfig,
    paths: PathBuilder<'a>,
}

impl<'a> FatLibraryBuilder<'a> {
    fn new(config: &'a BuildConfig) -> Self {
        Self {
            config,
            paths: PathBuilder::new(&config.path_to_crate),
        }
    }

    /// Fuse both architecture slices into a single fat binary, overwriting
    /// any prior output at the same path
    fn fuse(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        println!(
            "{} Building macOS fat library for {}",
            messages::PACKAGE_BUILD,
            self.config.package_name
        );

        let slices: Vec<PathBuf> = targets::ALL
            .iter()
            .map(|target| self.paths.target_dylib(target, &self.config.package_name))
            .collect();

        for slice in &slices {
            if !slice.exists() {
                return Err(format!(
                    "Missing architecture slice at {:?}, cannot create fat library",
                    slice
                )
                .into());
            }
        }

        let out_dir = self
            .paths
            .python_sources(&self.config.settings.python_sources_dir)?;
        let fat_lib_path = out_dir.join(self.config.fat_lib_name());

        let output = Command::new(commands::LIPO)
            .args(&slices)
            .arg(lipo_args::CREATE)
            .arg(lipo_args::OUTPUT)
            .arg(&fat_lib_path)
            .output()?;

        if !output.status.success() {
            return Err(format!(
                "lipo failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )
            .into());
        }

        println!(
            "{} Done building fat library at {:?}",
            messages::SUCCESS,
            fat_lib_path
        );

        Ok(fat_lib_path)
    }
}

/// Pyproject updater - stamps the release version into the Python package metadata
struct PyprojectUpdater<'a> {
    config: &'a BuildConfig,
    paths: PathBuilder<'a>,
}

impl<'a> PyprojectUpdater<'a> {
    fn new(config: &'a BuildConfig) -> Self {
        Self {
            config,
            paths: PathBuilder::new(&config.path_to_crate),
        }
    }

    /// Rewrite the version field of pyproject.toml
    fn update(&self, version: &str) -> Result<(), Box<dyn std::error::Error>> {
        let pyproject_path = self.paths.pyproject_toml(&self.config.package_root())?;

        let content = fs::read_to_string(&pyproject_path)?;
        let updated = stamp_version(&content, version)?;
        fs::write(&pyproject_path, updated)?;

        println!(
            "{} Updated {:?} with version: {}",
            messages::SUCCESS,
            pyproject_path,
            version
        );

        Ok(())
    }
}

/// Replace the version field in pyproject.toml content
pub(crate) fn stamp_version(
    content: &str,
    version: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let version_regex = regex::Regex::new(r#"(?m)^(version = ")[^"]+(")"#)?;
    Ok(version_regex
        .replace(content, format!("${{1}}{}${{2}}", version))
        .into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn settings_default_to_the_script_behavior() {
        let settings = PythonBuildSettings::new("payjoin-python/src/payjoin");
        assert_eq!(settings.interpreter, "python3");
        assert_eq!(settings.features, vec!["_test-utils".to_string()]);
        assert!(!settings.skip_install);
        assert!(settings.release_version.is_none());
    }

    #[test]
    fn package_root_defaults_to_first_sources_component() {
        assert_eq!(
            default_package_root("payjoin-python/src/payjoin"),
            "payjoin-python"
        );
        assert_eq!(default_package_root("pkg"), "pkg");
    }

    #[test]
    fn package_root_prefers_explicit_setting() {
        let config = BuildConfig {
            package_name: "payjoin_ffi".to_string(),
            path_to_crate: PathBuf::from("/repo/payjoin-ffi"),
            settings: PythonBuildSettings::new("bindings/src/payjoin")
                .python_package_dir("payjoin-python"),
        };
        assert_eq!(config.package_root(), "payjoin-python");
    }

    #[test]
    fn path_builder_places_artifacts_under_target() {
        let crate_path = Path::new("/repo/payjoin-ffi");
        let paths = PathBuilder::new(crate_path);

        assert_eq!(
            paths.host_dylib("payjoin_ffi"),
            PathBuf::from("/repo/payjoin-ffi/target/release/libpayjoin_ffi.dylib")
        );
        assert_eq!(
            paths.target_dylib(targets::MACOS_ARM, "payjoin_ffi"),
            PathBuf::from(
                "/repo/payjoin-ffi/target/aarch64-apple-darwin/release-smaller/libpayjoin_ffi.dylib"
            )
        );
    }

    #[test]
    fn path_builder_resolves_python_paths_against_parent() {
        let crate_path = Path::new("/repo/payjoin-ffi");
        let paths = PathBuilder::new(crate_path);

        assert_eq!(
            paths
                .python_sources("payjoin-python/src/payjoin")
                .expect("parent dir exists"),
            PathBuf::from("/repo/payjoin-python/src/payjoin")
        );
        assert_eq!(
            paths
                .requirements_txt("payjoin-python")
                .expect("parent dir exists"),
            PathBuf::from("/repo/payjoin-python/requirements.txt")
        );
    }

    #[test]
    fn fat_lib_name_carries_the_package_name() {
        let config = BuildConfig {
            package_name: "payjoin_ffi".to_string(),
            path_to_crate: PathBuf::from("/repo/payjoin-ffi"),
            settings: PythonBuildSettings::new("payjoin-python/src/payjoin"),
        };
        assert_eq!(config.fat_lib_name(), "libpayjoin_ffi.dylib");
    }

    #[test]
    fn fusion_fails_without_both_architecture_slices() {
        // Scratch crate path with no target/ tree: neither slice exists, so
        // fusion must error out before ever spawning lipo.
        let config = BuildConfig {
            package_name: "payjoin_ffi".to_string(),
            path_to_crate: std::env::temp_dir().join("payjoin-ffi-without-slices"),
            settings: PythonBuildSettings::new("payjoin-python/src/payjoin"),
        };

        let error = FatLibraryBuilder::new(&config)
            .fuse()
            .expect_err("no architecture slices were built")
            .to_string();
        assert!(error.contains("Missing architecture slice"));
    }

    #[test]
    fn stamp_version_rewrites_only_the_version_field() {
        let content = "[project]\nname = \"payjoin\"\nversion = \"0.1.0\"\n";
        let updated = stamp_version(content, "0.2.0").expect("valid regex");
        assert_eq!(updated, "[project]\nname = \"payjoin\"\nversion = \"0.2.0\"\n");
    }
}
