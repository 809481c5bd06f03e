//! Subprocess-backed LLM worker.
//!
//! Spawns the configured command, writes the prompt to its stdin, and
//! reads markdown from its stdout, enforcing a deadline. The command is
//! killed when the deadline passes. Exit code other than zero and empty
//! stdout are both invocation failures.

use super::LlmWorker;
use crate::config::LlmConfig;
use crate::{Error, Result};
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// LLM worker backed by an external process.
pub struct SubprocessWorker {
    command: Vec<String>,
    model: Option<String>,
    timeout: Duration,
}

impl SubprocessWorker {
    /// Creates a worker from the LLM configuration.
    #[must_use]
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            command: config.command.clone(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Overrides the model selection string.
    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    fn build_command(&self) -> Result<Command> {
        let program = self.command.first().ok_or_else(|| {
            Error::LlmUnavailable("llm worker command is empty".to_string())
        })?;
        let mut command = Command::new(program);
        command.args(&self.command[1..]);
        if let Some(model) = &self.model {
            command.arg("--model").arg(model);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Ok(command)
    }
}

impl LlmWorker for SubprocessWorker {
    fn name(&self) -> &'static str {
        "subprocess"
    }

    fn invoke(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let mut child = self.build_command()?.spawn().map_err(|e| {
            Error::LlmUnavailable(format!(
                "failed to spawn '{}': {e}",
                self.command.first().map_or("", String::as_str)
            ))
        })?;

        // Write the prompt and close stdin so the worker sees EOF
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .map_err(|e| Error::LlmUnavailable(format!("failed to write prompt: {e}")))?;
        }

        // Drain stdout/stderr on helper threads so a chatty worker
        // cannot fill the pipe and deadlock against our wait loop
        let stdout_rx = spawn_reader(child.stdout.take());
        let stderr_rx = spawn_reader(child.stderr.take());

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() >= self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        metrics::counter!("llm_timeouts_total").increment(1);
                        return Err(Error::LlmTimeout {
                            timeout_secs: self.timeout.as_secs(),
                        });
                    }
                    std::thread::sleep(Duration::from_millis(50));
                },
                Err(e) => {
                    return Err(Error::LlmUnavailable(format!("wait failed: {e}")));
                },
            }
        };

        let stdout = stdout_rx.recv().unwrap_or_default();
        let stderr = stderr_rx.recv().unwrap_or_default();
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        if !status.success() {
            let code = status.code().map_or_else(|| "signal".to_string(), |c| c.to_string());
            tracing::error!(code = %code, stderr = %stderr.trim(), "LLM worker failed");
            return Err(Error::LlmUnavailable(format!(
                "worker exited {code}: {}",
                stderr.trim()
            )));
        }

        let output = stdout.trim().to_string();
        if output.is_empty() {
            return Err(Error::LlmUnavailable("worker produced empty output".to_string()));
        }

        tracing::debug!(elapsed_ms, bytes = output.len(), "LLM worker completed");
        #[allow(clippy::cast_precision_loss)]
        metrics::histogram!("llm_invocation_duration_ms").record(elapsed_ms as f64);
        Ok(output)
    }
}

/// Reads a pipe to completion on a helper thread.
fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(mut source) = source {
            let _ = source.read_to_string(&mut buffer);
        }
        let _ = tx.send(buffer);
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(command: &[&str], timeout_secs: u64) -> SubprocessWorker {
        SubprocessWorker::new(&LlmConfig {
            command: command.iter().map(ToString::to_string).collect(),
            model: None,
            timeout_secs,
            max_retries: 0,
            retry_backoff_secs: 0,
        })
    }

    #[test]
    fn test_echoes_stdin() {
        let worker = worker(&["cat"], 10);
        let output = worker.invoke("hello prompt").unwrap();
        assert_eq!(output, "hello prompt");
    }

    #[test]
    fn test_nonzero_exit_is_unavailable() {
        let worker = worker(&["false"], 10);
        let err = worker.invoke("prompt").unwrap_err();
        assert!(matches!(err, Error::LlmUnavailable(_)));
    }

    #[test]
    fn test_empty_output_is_failure() {
        let worker = worker(&["true"], 10);
        let err = worker.invoke("prompt").unwrap_err();
        assert!(matches!(err, Error::LlmUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_timeout_kills_worker() {
        let worker = worker(&["sleep", "30"], 1);
        let start = Instant::now();
        let err = worker.invoke("prompt").unwrap_err();
        assert!(matches!(err, Error::LlmTimeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let worker = worker(&["distill-no-such-binary"], 5);
        let err = worker.invoke("prompt").unwrap_err();
        assert!(matches!(err, Error::LlmUnavailable(_)));
    }
}
