//! External tiling program invocation.
//!
//! An existing output directory is moved to a backup location before the
//! program runs. On failure the backup is moved back; on every exit path a
//! leftover backup is removed when [`OutputBackup`] is dropped.

use crate::domain::model::ExecutionProfile;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{Result, TourError};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct TileGenerator {
    system_command: String,
    interpreter: String,
    generate_script: String,
    nona: String,
    backup_root: PathBuf,
    timeout: Option<Duration>,
    profile: ExecutionProfile,
}

impl TileGenerator {
    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self {
            system_command: config.system_command().trim().to_string(),
            interpreter: config.interpreter().trim().to_string(),
            generate_script: config.generate_script().to_string(),
            nona: config.nona().to_string(),
            backup_root: config.backup_location().to_path_buf(),
            timeout: config.tile_timeout(),
            profile: config.execution_profile(),
        }
    }

    /// `<system> <interpreter> <script> -o <output> -n <nona> <source>`, paths quoted in production.
    pub fn command_line(&self, source: &Path, output: &Path) -> String {
        let quote = |value: &str| match self.profile {
            ExecutionProfile::Development => value.to_string(),
            ExecutionProfile::Production => format!("\"{}\"", value),
        };

        let mut parts = Vec::new();
        if !self.system_command.is_empty() {
            parts.push(self.system_command.clone());
        }
        if !self.interpreter.is_empty() {
            parts.push(self.interpreter.clone());
        }
        parts.push(quote(&self.generate_script));
        parts.push("-o".to_string());
        parts.push(quote(&output.to_string_lossy()));
        parts.push("-n".to_string());
        parts.push(quote(&self.nona));
        parts.push(quote(&source.to_string_lossy()));
        parts.join(" ")
    }

    /// Runs the tiling program for `source`, leaving `output` either fully
    /// regenerated or restored to its previous state.
    pub async fn generate(&self, source: &Path, output: &Path) -> Result<()> {
        let mut backup =
            OutputBackup::acquire(output, &self.backup_root).map_err(|source| {
                TourError::BackupFailed {
                    path: output.to_path_buf(),
                    source,
                }
            })?;

        let command = self.command_line(source, output);
        tracing::info!("Generating tiles: {}", command);

        match self.execute(&command).await {
            Ok(result) if result.status.success() => {
                tracing::debug!("Tiles written to {}", output.display());
                Ok(())
            }
            Ok(result) => {
                let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
                if !stderr.is_empty() {
                    tracing::error!("Command error:\t\"{}\"", stderr);
                }

                if let Err(restore_error) = backup.restore() {
                    return Err(TourError::RestoreFailed {
                        path: output.to_path_buf(),
                        backup: backup.preserve(),
                        restore_error: restore_error.to_string(),
                        source: io::Error::other(format!(
                            "command exited with {}",
                            result.status
                        )),
                    });
                }

                Err(TourError::ExternalCommand { command, stderr })
            }
            Err(cause) => {
                if let Err(restore_error) = backup.restore() {
                    return Err(TourError::RestoreFailed {
                        path: output.to_path_buf(),
                        backup: backup.preserve(),
                        restore_error: restore_error.to_string(),
                        source: cause,
                    });
                }

                Err(TourError::CommandIo {
                    command,
                    source: cause,
                })
            }
        }
    }

    async fn execute(&self, command: &str) -> io::Result<Output> {
        let args = split_command_line(command);
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;

        let child = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let finished = child.wait_with_output();
        match self.timeout {
            // the child is killed when the timed-out future is dropped
            Some(limit) => tokio::time::timeout(limit, finished).await.map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("tiling did not finish within {:?}", limit),
                )
            })?,
            None => finished.await,
        }
    }
}

/// Splits a command line on whitespace; double quotes group a single argument.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}

/// Scoped backup of a pre-existing output directory.
pub struct OutputBackup {
    output: PathBuf,
    backup: Option<PathBuf>,
}

impl OutputBackup {
    /// Moves `output` under `backup_root` if it exists.
    pub fn acquire(output: &Path, backup_root: &Path) -> io::Result<Self> {
        let backup = if output.exists() {
            std::fs::create_dir_all(backup_root)?;
            let target = backup_root.join(format!("pano-tour-{}", uuid::Uuid::new_v4()));
            move_dir(output, &target)?;
            tracing::debug!(
                "Moved existing output {} to {}",
                output.display(),
                target.display()
            );
            Some(target)
        } else {
            None
        };

        Ok(Self {
            output: output.to_path_buf(),
            backup,
        })
    }

    pub fn backup_path(&self) -> Option<&Path> {
        self.backup.as_deref()
    }

    /// Puts the output location back the way it was before [`acquire`](Self::acquire).
    pub fn restore(&mut self) -> io::Result<()> {
        if self.output.exists() {
            std::fs::remove_dir_all(&self.output)?;
        }
        if let Some(backup) = &self.backup {
            move_dir(backup, &self.output)?;
            tracing::info!("Restored previous output {}", self.output.display());
        }
        self.backup = None;
        Ok(())
    }

    /// Releases the backup from cleanup and returns where it lives.
    pub fn preserve(&mut self) -> Option<PathBuf> {
        let backup = self.backup.take();
        if let Some(path) = &backup {
            tracing::warn!("Keeping previous output at {}", path.display());
        }
        backup
    }
}

impl Drop for OutputBackup {
    fn drop(&mut self) {
        if let Some(backup) = self.backup.take() {
            if backup.exists() {
                if let Err(e) = std::fs::remove_dir_all(&backup) {
                    tracing::warn!("Failed to delete backup {}: {}", backup.display(), e);
                }
            }
        }
    }
}

/// Renames `from` to `to`, copying then deleting when the rename crosses filesystems.
pub fn move_dir(from: &Path, to: &Path) -> io::Result<()> {
    if to.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        ));
    }

    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_error) => {
            tracing::debug!(
                "Rename {} -> {} failed ({}), copying instead",
                from.display(),
                to.display(),
                rename_error
            );
            if let Err(e) = copy_dir(from, to) {
                let _ = std::fs::remove_dir_all(to);
                return Err(e);
            }
            std::fs::remove_dir_all(from)
        }
    }
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
