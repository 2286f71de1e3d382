use thiserror::Error;

/// Error taxonomy for the irrigation control core.
///
/// Kinds, not exception types: each variant is a distinct propagation
/// policy (see spec §7), not merely a distinct cause. Validation and Fatal
/// errors abort the call; Feasibility, Convergence and Safety findings are
/// normally carried as warnings on a successful result rather than raised
/// here — this type exists for the cases callers cannot proceed past.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed input, unknown id, conflicting time window. Local to the
    /// call; never mutates state.
    #[error("validation error: {0}")]
    Validation(String),

    /// A hard hydraulic or scheduling infeasibility that the caller asked
    /// to be treated as fatal rather than surfaced as a warning list.
    #[error("infeasible: {0}")]
    Infeasible(String),

    /// The solver exhausted its iteration budget without converging and
    /// the caller required a converged result.
    #[error("solver did not converge after {iterations} iterations (max Δh {max_delta:.6} m)")]
    Convergence { iterations: u32, max_delta: f64 },

    /// An outbound collaborator (SCADA, field-ops, sensor store, GIS,
    /// weather, service registry) failed after retries.
    #[error("external collaborator '{service}' failed: {detail}")]
    External { service: String, detail: String },

    /// A safety pre-check produced a blocking warning; dispatch withheld.
    #[error("safety check blocked command: {0}")]
    Safety(String),

    /// Reconciliation discrepancy exceeded the hard dispute bound.
    #[error("reconciliation discrepancy disputed: {0}")]
    Consistency(String),

    /// Persistent store unavailable or a snapshot failed checksum
    /// verification. Halts the specific operation.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// A non-fatal observation accumulated during a solve or optimization pass.
///
/// Warnings never cause a `Result::Err`; they ride along on a successful
/// value so the caller can decide whether "usable but degraded" is
/// acceptable for their purpose.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Warning {
    pub code: String,
    pub message: String,
}

impl Warning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// A tagged outcome carrying both a value and accumulated warnings, the
/// shape spec §9 asks for in place of exceptions-for-control-flow: `{ok,
/// value}` / `{err, kind, detail, warnings}` collapsed into one type since
/// the warnings are meaningful on both paths.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    pub fn warn(mut self, warning: Warning) -> Self {
        self.warnings.push(warning);
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}
