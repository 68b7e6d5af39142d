use clap::Parser;

use crate::build_python_macos::PythonBuildSettings;

#[derive(Parser, Debug)]
#[command(name = "python-macos-build")]
#[command(about = "Payjoin FFI build for macOS Python bindings")]
pub struct CliPythonMacos {
    /// Path to the Python package source directory
    #[arg(long, default_value = "payjoin-python/src/payjoin")]
    pub python_sources_dir: String,

    /// Python package root directory (defaults to the first component of the sources dir)
    #[arg(long)]
    pub python_package_dir: Option<String>,

    /// Python interpreter used for the environment check and dependency install
    #[arg(long)]
    pub interpreter: Option<String>,

    /// Skip installing declared Python dependencies
    #[arg(long)]
    pub skip_install: bool,

    /// Cargo features enabled for the bindgen build (defaults to the test-utilities feature)
    #[arg(long)]
    pub features: Vec<String>,

    /// Version to stamp into pyproject.toml
    #[arg(long)]
    pub release_version: Option<String>,
}

impl From<CliPythonMacos> for PythonBuildSettings {
    fn from(cli: CliPythonMacos) -> Self {
        let mut settings =
            PythonBuildSettings::new(cli.python_sources_dir).skip_install(cli.skip_install);

        if let Some(dir) = cli.python_package_dir {
            settings = settings.python_package_dir(dir);
        }

        if let Some(interpreter) = cli.interpreter {
            settings = settings.interpreter(interpreter);
        }

        if !cli.features.is_empty() {
            settings = settings.features(cli.features);
        }

        if let Some(version) = cli.release_version {
            settings = settings.release_version(version);
        }

        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_invocation_reproduces_script_defaults() {
        let cli =
            CliPythonMacos::try_parse_from(["python-macos-build"]).expect("no flags are required");

        let settings = PythonBuildSettings::from(cli);
        assert_eq!(settings.python_sources_dir, "payjoin-python/src/payjoin");
        assert_eq!(settings.interpreter, "python3");
        assert_eq!(settings.features, vec!["_test-utils".to_string()]);
        assert!(!settings.skip_install);
        assert!(settings.release_version.is_none());
    }

    #[test]
    fn flags_override_the_defaults() {
        let cli = CliPythonMacos::try_parse_from([
            "python-macos-build",
            "--python-sources-dir",
            "payjoin-python/src/payjoin",
            "--interpreter",
            "python3.12",
            "--skip-install",
            "--features",
            "_danger-local-https",
            "--release-version",
            "0.2.0",
        ])
        .expect("valid arguments");

        let settings = PythonBuildSettings::from(cli);
        assert_eq!(settings.interpreter, "python3.12");
        assert!(settings.skip_install);
        assert_eq!(settings.features, vec!["_danger-local-https".to_string()]);
        assert_eq!(settings.release_version.as_deref(), Some("0.2.0"));
    }

    #[test]
    fn sources_dir_can_be_overridden() {
        let cli = CliPythonMacos::try_parse_from([
            "python-macos-build",
            "--python-sources-dir",
            "bindings/src/payjoin",
        ])
        .expect("valid arguments");

        let settings = PythonBuildSettings::from(cli);
        assert_eq!(settings.python_sources_dir, "bindings/src/payjoin");
    }
}
