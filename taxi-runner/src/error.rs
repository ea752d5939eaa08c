use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use taxi_etl::error::EtlError;
use thiserror::Error;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Captured backtrace wrapper, kept out of `thiserror`'s backtrace detection.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type of the runner binary.
///
/// Wraps [`EtlError`] for pipeline errors and adds the failures of the process around it.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// A pipeline operation failed outright.
    #[error(transparent)]
    Etl(#[from] EtlError),
    /// A stage finished, but some sources or files still failed after retries.
    #[error("{stage} run finished with {failures} failure(s)")]
    RunFailed {
        stage: &'static str,
        failures: usize,
        #[source]
        error: EtlError,
    },
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[source] Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// Local I/O failed, for example while building the runtime.
    #[error("i/o error: {0}")]
    Io(#[source] std::io::Error, CapturedBacktrace),
}

impl RunnerError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            RunnerError::Etl(_) => "pipeline error",
            RunnerError::RunFailed { .. } => "run failure",
            RunnerError::Config(_, _) => "configuration error",
            RunnerError::Io(_, _) => "i/o error",
        }
    }

    /// Returns the backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            RunnerError::Etl(err) => err.backtrace(),
            RunnerError::RunFailed { error, .. } => error.backtrace(),
            RunnerError::Config(_, cb) => Some(&cb.0),
            RunnerError::Io(_, cb) => Some(&cb.0),
        }
    }

    /// Creates a configuration error from any error.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        RunnerError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("taxi-runner failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        let mut source = Error::source(self);
        let mut idx = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {idx}: {err}\n"));
            // Aggregated errors already list every member in their display.
            if matches!(err.downcast_ref::<EtlError>(), Some(etl) if etl.errors().is_some()) {
                break;
            }
            source = err.source();
            idx += 1;
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl From<std::io::Error> for RunnerError {
    fn from(err: std::io::Error) -> Self {
        RunnerError::Io(err, CapturedBacktrace::capture())
    }
}
