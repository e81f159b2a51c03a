use linkedcare_core::model::{Bundle, OperationOutcome};

/// What became of a remote operation that produced an answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The server returned the expected resource.
    Accepted(T),
    /// The server explained why it refused.
    Rejected(OperationOutcome),
    /// A bundle submission answered `400` with a per-entry result bundle.
    PartiallyRejected(T),
    /// Neither the expected resource nor an outcome report could be parsed.
    Unparseable { status: u16 },
}

impl<T> Outcome<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn accepted(&self) -> Option<&T> {
        match self {
            Self::Accepted(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_accepted(self) -> Option<T> {
        match self {
            Self::Accepted(value) => Some(value),
            _ => None,
        }
    }

    /// The server's explanation, if it gave one.
    pub fn report(&self) -> Option<&OperationOutcome> {
        match self {
            Self::Rejected(report) => Some(report),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Accepted(value) => Outcome::Accepted(f(value)),
            Self::PartiallyRejected(value) => Outcome::PartiallyRejected(f(value)),
            Self::Rejected(report) => Outcome::Rejected(report),
            Self::Unparseable { status } => Outcome::Unparseable { status },
        }
    }
}

/// Result of a delete.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteOutcome {
    pub deleted: bool,
    /// Outcome report sent with the answer, regardless of status.
    pub report: Option<OperationOutcome>,
}

/// Logs every issue of a rejection so none is silently dropped.
pub fn log_rejection<T>(operation: &str, outcome: &Outcome<T>) {
    match outcome {
        Outcome::Accepted(_) | Outcome::PartiallyRejected(_) => {}
        Outcome::Rejected(report) => log_issues(operation, report),
        Outcome::Unparseable { status } => {
            tracing::warn!(operation, status, "Server answer could not be understood");
        }
    }
}

pub fn log_issues(operation: &str, report: &OperationOutcome) {
    if report.issue.is_empty() {
        tracing::warn!(operation, "Rejected without issues");
    }
    for issue in report.issues() {
        tracing::warn!(
            operation,
            severity = %issue.severity,
            code = %issue.code,
            text = %issue.text,
            "Rejected"
        );
    }
}

/// Logs the entries a transaction response marks as failed.
pub fn log_failed_entries(operation: &str, bundle: &Bundle) {
    for entry in bundle.failed_entries() {
        let Some(response) = &entry.response else {
            continue;
        };
        tracing::warn!(
            operation,
            entry = entry.locator(),
            status = %response.status,
            "Bundle entry failed"
        );
        let report = response
            .outcome
            .clone()
            .and_then(|value| linkedcare_core::model::from_value::<OperationOutcome>(value).ok());
        if let Some(report) = report {
            log_issues(operation, &report);
        }
    }
}
