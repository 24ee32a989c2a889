// src/hooks/runparts.rs

//! External hook programs
//!
//! Hooks for an event live in `<bin_dir>/<event>.d/`. Every executable
//! regular file there whose name is made only of ASCII letters, digits,
//! `_` and `-` is run, in lexical order, as `hook <pkgdir> <name> <version>`.
//! Other files (`README`, `foo.disabled`, editor backups) are ignored.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// Programs in `dir` eligible to run, sorted by name
///
/// A missing directory yields no programs.
pub fn list_hooks(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        debug!("No hook directory at {}", dir.display());
        return Ok(Vec::new());
    }

    let mut hooks = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_valid_name(name) {
            continue;
        }

        let path = entry.path();
        let meta = fs::metadata(&path)?;
        if meta.is_file() && is_executable(&meta) {
            hooks.push(path);
        }
    }

    hooks.sort();
    Ok(hooks)
}

/// Run every hook in `dir` with `args`, stopping at the first failure
pub fn run_parts(dir: &Path, args: &[&str], timeout: Option<Duration>) -> Result<()> {
    for hook in list_hooks(dir)? {
        run_hook(&hook, args, timeout)?;
    }
    Ok(())
}

fn run_hook(hook: &Path, args: &[&str], timeout: Option<Duration>) -> Result<()> {
    let label = hook
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    debug!("Running hook {} {:?}", hook.display(), args);

    let mut child = Command::new(hook)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::HookError(format!("failed to spawn {}: {}", hook.display(), e)))?;

    let output = match timeout {
        Some(limit) => match child.wait_timeout(limit)? {
            Some(_) => child.wait_with_output()?,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::HookError(format!(
                    "{} timed out after {} seconds",
                    hook.display(),
                    limit.as_secs()
                )));
            }
        },
        None => child.wait_with_output()?,
    };

    let status = output.status;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stdout.lines() {
        info!("[{}] {}", label, line);
    }
    for line in stderr.lines() {
        warn!("[{}] {}", label, line);
    }

    if !status.success() {
        return Err(Error::HookError(format!(
            "{} exited with code {}: {}",
            hook.display(),
            status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }

    Ok(())
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    true
}
