use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// The class of a failure that is reported to the user. Every failure is scoped to the single
/// command that triggered it, and the retryable classes tell the user to run it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// The data service was unreachable or rejected a query.
    Fetch,
    /// The image host rejected an upload or could not be reached.
    Upload,
    /// A document could not be generated or written.
    Export,
    /// Credentials were wrong or no session exists.
    Auth,
    /// The configuration directory or file is missing or invalid.
    Config,
    /// The user supplied arguments that cannot be used.
    Request,
}

serde_plain::derive_display_from_serialize!(ErrorType);

impl ErrorType {
    fn retryable(self) -> bool {
        matches!(self, ErrorType::Fetch | ErrorType::Upload | ErrorType::Export)
    }

    /// Finds the `ErrorType` that was attached to `error` with `pub_result`, if any.
    pub fn of(error: &Error) -> Option<ErrorType> {
        error.downcast_ref::<Classified>().map(|c| c.0)
    }
}

/// The context value attached by `pub_result`. It is found again by `ErrorType::of`.
#[derive(Debug, Clone, Copy)]
struct Classified(ErrorType);

impl Display for Classified {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.retryable() {
            write!(f, "{} error, run the command again to retry", self.0)
        } else {
            write!(f, "{} error", self.0)
        }
    }
}

impl std::error::Error for Classified {}

/// Converts an internal result into one that is classified for the user.
pub trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| e.into().context(Classified(error_type)))
    }
}
