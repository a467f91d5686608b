/// Shared shell command execution utility.
///
/// Used by the command-backed haptics and keep-awake drivers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to spawn '{cmd}': {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{cmd}' exited with {status}: {stderr}")]
    Failed {
        cmd: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Run a command line through the platform shell (`sh -c` / `cmd /C`).
/// Returns stdout on success.
pub fn run_shell(cmd: &str) -> Result<String, ShellError> {
    let (shell, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
    let output = std::process::Command::new(shell)
        .args([flag, cmd])
        .output()
        .map_err(|source| ShellError::Spawn { cmd: cmd.to_string(), source })?;

    if !output.status.success() {
        return Err(ShellError::Failed {
            cmd: cmd.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
