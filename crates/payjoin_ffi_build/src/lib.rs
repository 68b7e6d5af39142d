mod build_python_linux;
mod build_python_linux_cli;
mod build_python_macos;
mod build_python_macos_cli;
mod cargo_utils;
mod python_env;

pub mod prelude {
    pub use crate::build_python_linux::{
        LinuxBuildOutcome, LinuxBuildSettings, LinuxTarget, build_python_linux,
    };
    pub use crate::build_python_linux_cli::CliPythonLinux;
    pub use crate::build_python_macos::{
        PythonBuildOutcome, PythonBuildSettings, build_python_macos,
    };
    pub use crate::build_python_macos_cli::CliPythonMacos;
}

pub use prelude::*;
