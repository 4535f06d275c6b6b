use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;
use datadiff::error::DiffError;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for the command-line front end.
pub type CliResult<T> = Result<T, CliError>;

/// Captured backtrace, rendered only when `RUST_BACKTRACE` asks for it.
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

/// Error type of the `datadiff` binary.
#[derive(Debug)]
pub enum CliError {
    /// Failure of a source or of the reconciliation itself.
    Diff(DiffError),
    /// Invalid flags, files or configuration values.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// I/O error outside of the reconciliation, such as starting the runtime.
    Io(std::io::Error, CapturedBacktrace),
    /// The run was cancelled with Ctrl+C.
    Interrupted,
}

impl CliError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            CliError::Diff(err) if err.is_source_error() => "data source error",
            CliError::Diff(_) => "reconciliation error",
            CliError::Config(_, _) => "configuration error",
            CliError::Io(_, _) => "i/o error",
            CliError::Interrupted => "interrupted",
        }
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            CliError::Config(_, cb) | CliError::Io(_, cb) => Some(&cb.0),
            CliError::Diff(_) | CliError::Interrupted => None,
        }
    }

    /// Creates a configuration error from any error.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        CliError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Exit status of the process for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Interrupted => 130,
            _ => 1,
        }
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("datadiff failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        if let CliError::Diff(err) = self {
            let location = err.location();
            out.push_str(&format!(
                "raised at: {}:{}\n",
                location.file(),
                location.line()
            ));
        }

        let mut source = Error::source(self);
        let mut idx = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {idx}: {err}\n"));
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

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Diff(err) => write!(f, "{err}"),
            CliError::Config(source, _) => write!(f, "configuration error: {source}"),
            CliError::Io(source, _) => write!(f, "i/o error: {source}"),
            CliError::Interrupted => write!(f, "reconciliation cancelled"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CliError::Diff(err) => err.source(),
            CliError::Config(source, _) => Some(source.as_ref()),
            CliError::Io(source, _) => Some(source),
            CliError::Interrupted => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<DiffError> for CliError {
    fn from(err: DiffError) -> Self {
        CliError::Diff(err)
    }
}

#[cfg(test)]
mod tests {
    use datadiff::diff_error;
    use datadiff::error::ErrorKind;

    use super::*;

    #[test]
    fn report_names_category_and_error() {
        let err = CliError::from(diff_error!(
            ErrorKind::SourceTimeout,
            "Source did not answer in time",
            "mysql `fetch_id_range` exceeded 10ms"
        ));

        let report = err.render_report();

        assert!(report.starts_with("datadiff failed\ncategory: data source error\n"));
        assert!(report.contains("exceeded 10ms"));
        assert!(report.contains("raised at: "));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn interrupted_run_has_its_own_exit_code() {
        assert_eq!(CliError::Interrupted.exit_code(), 130);
        assert_eq!(CliError::Interrupted.category(), "interrupted");
    }
}
