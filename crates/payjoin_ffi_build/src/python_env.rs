use std::path::Path;
use std::process::Command;

use crate::build_python_macos::python_args;

/// Verify the interpreter is runnable and return its reported version line.
pub(crate) fn check_interpreter(interpreter: &str) -> Result<String, Box<dyn std::error::Error>> {
    let output = Command::new(interpreter)
        .arg(python_args::VERSION)
        .output()
        .map_err(|e| {
            format!(
                "Failed to run {}: {}. Ensure a Python interpreter is installed.",
                interpreter, e
            )
        })?;

    if !output.status.success() {
        return Err(format!(
            "{} {} failed: {}",
            interpreter,
            python_args::VERSION,
            String::from_utf8_lossy(&output.stderr)
        )
        .into());
    }

    // Older interpreters report their version on stderr
    let raw = if output.stdout.is_empty() {
        output.stderr
    } else {
        output.stdout
    };
    Ok(String::from_utf8_lossy(&raw).trim().to_string())
}

/// Install declared dependencies from a requirements file via pip.
pub(crate) fn install_requirements(
    interpreter: &str,
    requirements: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = Command::new(interpreter)
        .args([
            python_args::MODULE,
            python_args::PIP,
            python_args::INSTALL,
            python_args::REQUIREMENT,
        ])
        .arg(requirements)
        .output()?;

    if !output.status.success() {
        return Err(format!(
            "pip install failed for {:?}: {}",
            requirements,
            String::from_utf8_lossy(&output.stderr)
        )
        .into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_interpreter_is_reported() {
        let result = check_interpreter("definitely-not-a-python-interpreter");
        let message = result.expect_err("interpreter does not exist").to_string();
        assert!(message.contains("definitely-not-a-python-interpreter"));
    }

    #[test]
    fn missing_interpreter_fails_install() {
        let result = install_requirements(
            "definitely-not-a-python-interpreter",
            Path::new("/nonexistent/requirements.txt"),
        );
        assert!(result.is_err());
    }
}
