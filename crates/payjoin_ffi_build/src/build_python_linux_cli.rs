use clap::Parser;

use crate::build_python_linux::{LinuxBuildSettings, LinuxTarget};

#[derive(Parser, Debug)]
#[command(name = "python-linux-build")]
#[command(about = "Payjoin FFI build for Linux Python bindings")]
pub struct CliPythonLinux {
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

    /// Targets to build shared libraries for (defaults to x86_64)
    #[arg(long, value_enum)]
    pub targets: Vec<LinuxTarget>,
}

impl From<CliPythonLinux> for LinuxBuildSettings {
    fn from(value: CliPythonLinux) -> Self {
        let CliPythonLinux {
            python_sources_dir,
            python_package_dir,
            interpreter,
            skip_install,
            features,
            targets,
        } = value;

        let mut settings = LinuxBuildSettings::new(python_sources_dir).skip_install(skip_install);

        if let Some(dir) = python_package_dir {
            settings = settings.python_package_dir(dir);
        }

        if let Some(interpreter) = interpreter {
            settings = settings.interpreter(interpreter);
        }

        if !features.is_empty() {
            settings = settings.features(features);
        }

        if !targets.is_empty() {
            settings = settings.targets(targets);
        }

        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn targets_parse_by_alias() {
        let cli = CliPythonLinux::try_parse_from([
            "python-linux-build",
            "--python-sources-dir",
            "payjoin-python/src/payjoin",
            "--targets",
            "x86_64",
            "--targets",
            "aarch64",
        ])
        .expect("valid arguments");

        let settings = LinuxBuildSettings::from(cli);
        let triples: Vec<&str> = settings
            .targets
            .iter()
            .map(|target| match target {
                LinuxTarget::X86_64 => "x86_64-unknown-linux-gnu",
                LinuxTarget::Aarch64 => "aarch64-unknown-linux-gnu",
            })
            .collect();
        assert_eq!(
            triples,
            vec!["x86_64-unknown-linux-gnu", "aarch64-unknown-linux-gnu"]
        );
    }

    #[test]
    fn empty_target_list_keeps_the_default() {
        let cli =
            CliPythonLinux::try_parse_from(["python-linux-build"]).expect("no flags are required");

        let settings = LinuxBuildSettings::from(cli);
        assert_eq!(settings.python_sources_dir, "payjoin-python/src/payjoin");
        assert_eq!(settings.targets.len(), 1);
    }
}
