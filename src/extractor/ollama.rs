use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Failure modes of a single generation round trip
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The worker exceeded its wall-clock budget and was killed
    #[error("worker timed out")]
    Timeout,
    /// The worker process could not be run
    #[error("worker failed: {0}")]
    Worker(String),
}

/// Opaque text-generation capability: a full prompt in, free-form text out.
///
/// The pipeline makes no assumption about the output format; repair happens
/// downstream. Implementations own their timeout and must kill whatever
/// backs an expired call.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// Generator backed by a local Ollama model invoked as a subprocess.
///
/// The whole prompt is piped to the worker's stdin; stdout is read to
/// completion. The worker is killed if the round trip exceeds the budget.
pub struct OllamaGenerator {
    argv: Vec<String>,
    timeout: Duration,
}

impl OllamaGenerator {
    pub fn new(model: &str, timeout: Duration) -> Self {
        Self {
            argv: vec!["ollama".to_string(), "run".to_string(), model.to_string()],
            timeout,
        }
    }

    /// Run an arbitrary worker command line instead of `ollama run <model>`.
    /// Any process that reads a prompt on stdin and writes text to stdout
    /// can stand in for the model.
    pub fn from_command(argv: Vec<String>, timeout: Duration) -> Self {
        Self { argv, timeout }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| GenerateError::Worker("empty worker command".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| GenerateError::Worker(format!("failed to spawn {program}: {err}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| GenerateError::Worker("worker stdin unavailable".to_string()))?;

        let round_trip = async {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|err| GenerateError::Worker(format!("failed to write prompt: {err}")))?;
            // Close stdin so the worker sees EOF and starts responding
            drop(stdin);

            let output = child
                .wait_with_output()
                .await
                .map_err(|err| GenerateError::Worker(format!("failed to read output: {err}")))?;

            debug!(bytes = output.stdout.len(), "Worker output collected");

            // Bad bytes in the output must not crash the unit
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        };

        // kill_on_drop reaps the child when the timeout drops the future
        match tokio::time::timeout(self.timeout, round_trip).await {
            Ok(result) => result,
            Err(_) => Err(GenerateError::Timeout),
        }
    }
}
