//! Launching the desktop's default application for a file.

use crate::error::{BrwsError, Result};
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::thread::{self, JoinHandle};

/// Program and arguments that open `path` on `os` (a `std::env::consts::OS` value).
pub fn launcher_command(os: &str, path: &Path) -> Result<(String, Vec<String>)> {
    let target = path.to_string_lossy().into_owned();
    match os {
        "macos" => Ok(("open".to_string(), vec![target])),
        "windows" => Ok((
            "cmd".to_string(),
            vec![
                "/C".to_string(),
                "start".to_string(),
                String::new(),
                target,
            ],
        )),
        "linux" | "freebsd" | "openbsd" | "netbsd" | "dragonfly" => {
            Ok(("xdg-open".to_string(), vec![target]))
        }
        other => Err(BrwsError::UnsupportedPlatform(other.to_string())),
    }
}

/// Starts the launcher without blocking the caller.
pub fn open_path(path: &Path) -> Result<()> {
    let (program, args) = launcher_command(std::env::consts::OS, path)?;
    log::debug!("Running {} {:?}", program, args);
    let mut command = Command::new(&program);
    command.args(&args);
    spawn_reaped(command, path)?;
    Ok(())
}

/// Spawns `command` and waits for it on a background thread, so the launcher
/// never lingers as a zombie. The handle yields its exit status.
fn spawn_reaped(mut command: Command, path: &Path) -> Result<JoinHandle<Option<ExitStatus>>> {
    let mut child = command.spawn().map_err(|e| BrwsError::io(path, e))?;
    let target = path.display().to_string();
    Ok(thread::spawn(move || match child.wait() {
        Ok(status) => {
            if !status.success() {
                log::warn!("Launcher for {} exited with {}", target, status);
            }
            Some(status)
        }
        Err(e) => {
            log::warn!("Could not wait for the launcher of {}: {}", target, e);
            None
        }
    }))
}
