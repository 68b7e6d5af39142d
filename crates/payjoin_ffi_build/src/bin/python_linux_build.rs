use clap::Parser;
use payjoin_ffi_build::CliPythonLinux;

fn main() {
    let cli = CliPythonLinux::parse();
    payjoin_ffi_build::build_python_linux(cli.into()).expect("Failed to build Linux Python bindings");
}
