//! Runs the external encoder and handles its files.
//!
//! Each call is `Built -> Launched -> Succeeded | Failed`; failures are returned
//! as-is, nothing is retried.

use crate::command::{self, EncoderInvocation};
use crate::error::{Result, SlicerError};
use crate::models::ExportRequest;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Lines of encoder stderr kept in an error.
const DIAGNOSTIC_TAIL_LINES: usize = 20;

#[async_trait]
pub trait EncoderRunner: Send + Sync {
    /// Runs the encoder to completion with `args`.
    async fn run(&self, args: &[String]) -> Result<()>;
}

/// Spawns the encoder as a child process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, args: &[String]) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        // No console window flash for the child on Windows.
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);
        cmd
    }
}

#[async_trait]
impl EncoderRunner for ProcessRunner {
    async fn run(&self, args: &[String]) -> Result<()> {
        let program = self.program.display().to_string();
        debug!(program = %program, ?args, "launching encoder");
        let started = Instant::now();
        let output = self
            .command(args)
            .output()
            .await
            .map_err(|e| SlicerError::ExternalTool {
                status: "launch failed".into(),
                diagnostics: format!("{program}: {e}"),
            })?;

        if output.status.success() {
            debug!(program = %program, elapsed_ms = started.elapsed().as_millis() as u64, "encoder finished");
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(SlicerError::ExternalTool {
            status: output.status.to_string(),
            diagnostics: tail_lines(&stderr, DIAGNOSTIC_TAIL_LINES),
        })
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Export and thumbnail jobs on top of an [`EncoderRunner`].
#[derive(Clone)]
pub struct Orchestrator {
    runner: Arc<dyn EncoderRunner>,
}

impl Orchestrator {
    pub fn new(runner: Arc<dyn EncoderRunner>) -> Self {
        Self { runner }
    }

    /// Encodes `request` into `save_dir`, creating the directory if needed.
    pub async fn export(&self, request: &ExportRequest, save_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(save_dir)
            .await
            .map_err(|e| SlicerError::io_at("creating save directory", save_dir, e))?;
        let invocation = command::export_invocation(request, save_dir);
        let output = self.execute(&invocation, "export").await?;
        if tokio::fs::metadata(&output).await.is_err() {
            return Err(SlicerError::ExternalTool {
                status: "exit 0".into(),
                diagnostics: format!("encoder produced no file at {}", output.display()),
            });
        }
        Ok(output)
    }

    /// Grabs one frame of `source` as JPEG bytes. The scratch directory is removed
    /// on every exit path.
    pub async fn thumbnail(&self, source: &Path) -> Result<Bytes> {
        let work = tempfile::Builder::new()
            .prefix("thumbnails")
            .tempdir()
            .map_err(|e| SlicerError::io("creating thumbnail directory", e))?;
        let invocation = command::thumbnail_invocation(source, work.path());
        let output = self.execute(&invocation, "thumbnail").await?;
        let data = tokio::fs::read(&output)
            .await
            .map_err(|e| SlicerError::io_at("reading thumbnail", &output, e))?;
        Ok(Bytes::from(data))
    }

    async fn execute(&self, invocation: &EncoderInvocation, job: &'static str) -> Result<PathBuf> {
        debug!(job, output = %invocation.output.display(), "invocation built");
        info!(job, output = %invocation.output.display(), "encoder launched");
        match self.runner.run(&invocation.args).await {
            Ok(()) => {
                info!(job, output = %invocation.output.display(), "encoder succeeded");
                Ok(invocation.output.clone())
            }
            Err(e) => {
                warn!(job, error = %e, "encoder failed");
                Err(e)
            }
        }
    }
}
