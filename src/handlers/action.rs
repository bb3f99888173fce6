// src/handlers/action.rs

//! The two built-in build actions: plain copy and external command.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, anyhow};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::Result;

/// How a handler produces its outputs.
#[derive(Debug, Clone)]
pub enum BuildAction {
    /// Copy the input over every output file.
    Copy,
    /// Run an external command with `{input}`, `{output}` (first output) and
    /// `{outputs}` (all, space separated) substituted, through the platform
    /// shell.
    Command(String),
}

impl BuildAction {
    pub async fn run(&self, input: &Path, outputs: &[PathBuf]) -> Result<()> {
        match self {
            BuildAction::Copy => {
                for output in outputs {
                    tokio::fs::copy(input, output).await.with_context(|| {
                        format!("copying {} to {}", input.display(), output.display())
                    })?;
                }
                Ok(())
            }
            BuildAction::Command(template) => run_command(template, input, outputs).await,
        }
    }
}

/// Substitute the placeholder tokens into a command template.
pub fn substitute(template: &str, input: &Path, outputs: &[PathBuf]) -> String {
    let all = outputs
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let first = outputs
        .first()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    template
        .replace("{input}", &input.display().to_string())
        .replace("{output}", &first)
        .replace("{outputs}", &all)
}

async fn run_command(template: &str, input: &Path, outputs: &[PathBuf]) -> Result<()> {
    let cmdline = substitute(template, input, outputs);
    debug!(cmd = %cmdline, "running build command");

    // Shell dispatch appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&cmdline);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&cmdline);
        c
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning build command '{cmdline}'"))?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("stdout: {}", line);
            }
        });
    }
    // Always consume stderr so buffers don't fill.
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!("stderr: {}", line);
            }
        });
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for build command '{cmdline}'"))?;

    if !status.success() {
        return Err(anyhow!("build command '{cmdline}' exited with {status}").into());
    }
    Ok(())
}
