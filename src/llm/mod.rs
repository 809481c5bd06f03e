//! LLM worker abstraction.
//!
//! The synthesizers never assume a particular backing: the worker is a
//! boxed trait object that takes a text prompt and returns markdown. The
//! default implementation shells out to an external CLI; tests use
//! scripted fakes.

mod pool;
mod resilience;
mod subprocess;

pub use pool::WorkerPool;
pub use resilience::{RetryPolicy, RetryingWorker};
pub use subprocess::SubprocessWorker;

use crate::Result;

/// Capability set of an LLM worker.
pub trait LlmWorker: Send + Sync {
    /// The worker name, for logs and metrics.
    fn name(&self) -> &'static str;

    /// Generates markdown for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LlmTimeout`] when the worker exceeds its
    /// deadline and [`crate::Error::LlmUnavailable`] for every other
    /// invocation failure. Empty output is a failure, not a result.
    fn invoke(&self, prompt: &str) -> Result<String>;
}

/// Strips markdown code fences around a JSON payload, a habit of LLM
/// output that otherwise breaks parsing.
#[must_use]
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json)
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
