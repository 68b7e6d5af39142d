use clap::Parser;
use payjoin_ffi_build::CliPythonMacos;
use payjoin_ffi_build::PythonBuildSettings;

fn main() {
    let cli = CliPythonMacos::parse();
    payjoin_ffi_build::build_python_macos(PythonBuildSettings::from(cli))
        .expect("Failed to build macOS Python bindings");
}
