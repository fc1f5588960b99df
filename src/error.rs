use thiserror::Error;

/// Failure categories surfaced by synthesis, fitting and the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// A distribution or option parameter is missing or out of range.
    #[error("invalid parameter")]
    InvalidParameter,
    /// Data handed to the fitter lies outside what the family can describe.
    #[error("degenerate input")]
    DegenerateInput,
    /// An iterative estimator ran out of iterations or numerical headroom.
    #[error("non-convergence")]
    NonConvergence,
    /// Bad command-line combination.
    #[error("usage error")]
    Usage,
}

impl ErrorKind {
    /// Process exit code used by the `glmsim` binary.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Usage | ErrorKind::InvalidParameter => 2,
            ErrorKind::DegenerateInput => 3,
            ErrorKind::NonConvergence => 4,
        }
    }
}

#[derive(Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParameter, message)
    }

    pub fn degenerate_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DegenerateInput, message)
    }

    pub fn non_convergence(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NonConvergence, message)
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Usage, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("exit_code", &self.exit_code())
            .field("message", &self.message)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = AppError::degenerate_input("response contains -1");
        assert_eq!(err.to_string(), "degenerate input: response contains -1");
        assert_eq!(err.kind(), ErrorKind::DegenerateInput);
    }

    #[test]
    fn exit_codes_follow_kind() {
        assert_eq!(AppError::usage("x").exit_code(), 2);
        assert_eq!(AppError::invalid_parameter("x").exit_code(), 2);
        assert_eq!(AppError::degenerate_input("x").exit_code(), 3);
        assert_eq!(AppError::non_convergence("x").exit_code(), 4);
    }
}
