use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Connection,
    Compilation,
    DiffComputation,
    Application,
    Reconciliation,
    Unsupported,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Config => "ConfigurationError",
            ErrorKind::Connection => "ConnectionError",
            ErrorKind::Compilation => "CompilationError",
            ErrorKind::DiffComputation => "DiffComputationError",
            ErrorKind::Application => "ApplicationError",
            ErrorKind::Reconciliation => "ReconciliationError",
            ErrorKind::Unsupported => "UnsupportedFeature",
            ErrorKind::Internal => "Internal",
        }
    }
}

/// The single error type every pipeline stage surfaces.
///
/// `message` is the underlying cause verbatim; `kind` only classifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn compilation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Compilation, message)
    }

    pub fn diff(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DiffComputation, message)
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Application, message)
    }

    pub fn reconciliation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Reconciliation, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }

    /// Re-tag an error raised by a shared helper with the kind of the stage it failed in.
    /// Connection failures keep their kind.
    pub fn in_stage(self, kind: ErrorKind) -> Self {
        if self.kind == ErrorKind::Connection {
            return self;
        }
        Self { kind, ..self }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

pub fn classify_error(err: &anyhow::Error) -> ErrorKind {
    if let Some(app) = err.downcast_ref::<AppError>() {
        return app.kind;
    }
    ErrorKind::Internal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_wrapped_app_error() {
        let err: anyhow::Error = AppError::diff("migra: command not found").into();
        assert_eq!(classify_error(&err), ErrorKind::DiffComputation);
        assert_eq!(err.to_string(), "migra: command not found");
    }

    #[test]
    fn unknown_errors_are_internal() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(classify_error(&err), ErrorKind::Internal);
    }

    #[test]
    fn in_stage_keeps_connection_kind() {
        let err = AppError::connection("refused").in_stage(ErrorKind::Application);
        assert_eq!(err.kind, ErrorKind::Connection);
        let err = AppError::new(ErrorKind::Internal, "x").in_stage(ErrorKind::Reconciliation);
        assert_eq!(err.kind, ErrorKind::Reconciliation);
    }
}
