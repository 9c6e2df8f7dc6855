use std::fmt;
use thiserror::Error;

/// Failures of a catalog refresh. The live snapshot is never touched when one of
/// these is returned.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog response is malformed: {reason}")]
    Malformed { reason: String },

    #[error("Catalog refresh failed: {0}")]
    TransportFailure(#[from] TransportError),
}

impl CatalogError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        CatalogError::Malformed {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompatibilityError {
    #[error("Unknown or inactive service '{service}'")]
    UnknownService { service: String },

    #[error("Service '{service}' is not a basic service")]
    NotBasic { service: String },

    #[error("Unknown or inactive option '{option}'")]
    UnknownOption { option: String },

    #[error("Option '{option}' is not available with service '{service}'")]
    Incompatible { service: String, option: String },

    #[error("Options {options:?} belong to the same exclusivity group '{group}'")]
    ConflictingOptions { group: String, options: Vec<String> },

    #[error("Service '{service}' does not belong to service group '{group}'")]
    WrongGroup { service: String, group: String },
}

impl CompatibilityError {
    /// The catalog identifier the operator has to fix.
    pub fn offending_identifier(&self) -> &str {
        match self {
            CompatibilityError::UnknownService { service }
            | CompatibilityError::NotBasic { service }
            | CompatibilityError::WrongGroup { service, .. } => service,
            CompatibilityError::UnknownOption { option }
            | CompatibilityError::Incompatible { option, .. } => option,
            CompatibilityError::ConflictingOptions { group, .. } => group,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Sender,
    Recipient,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Sender => f.write_str("sender"),
            Party::Recipient => f.write_str("recipient"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Missing {party} address field '{field}'")]
    MissingAddress { party: Party, field: &'static str },

    #[error("Invalid parcel: {reason}")]
    InvalidParcel { reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {message}")]
    Network { message: String, retryable: bool },

    #[error("Credentials rejected by the webservice: {message}")]
    AuthRejected { message: String },

    #[error("Webservice fault {code}: {message}")]
    ServerFault { code: String, message: String },

    #[error("Response rejected as too complex: {reason}")]
    ResponseTooComplex { reason: String },

    #[error("Malformed webservice response: {reason}")]
    MalformedResponse { reason: String },

    #[error("Request could not be sent: {reason}")]
    InvalidRequest { reason: String },
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Network { retryable: true, .. })
    }
}

/// Why a carrier method could not be saved.
#[derive(Error, Debug)]
pub enum ConfigureError {
    #[error(transparent)]
    Incompatible(#[from] CompatibilityError),

    #[error("Could not save carrier method: {0}")]
    Host(#[from] HostError),
}

/// Failures of the host collaborators (shipment provider, method store,
/// attachment store, catalog cache).
#[derive(Error, Debug)]
pub enum HostError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Identifier '{id}' cannot be stored")]
    InvalidId { id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing configuration field '{field}'")]
    Missing { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("TOML parsing error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Steps of a label run, used to tag pipeline failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    Building,
    Requesting,
    Parsing,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStep::Building => f.write_str("building"),
            PipelineStep::Requesting => f.write_str("requesting"),
            PipelineStep::Parsing => f.write_str("parsing"),
        }
    }
}

#[derive(Error, Debug)]
pub enum FailureCause {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Unexpected label response: {reason}")]
    InvalidResponse { reason: String },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Carrier method '{carrier_method}' is stale against the current catalog: {cause}")]
    StaleConfiguration {
        carrier_method: String,
        #[source]
        cause: CompatibilityError,
    },

    #[error("Label generation failed while {step}: {cause}")]
    Failed {
        step: PipelineStep,
        #[source]
        cause: FailureCause,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PipelineError {
    pub fn failed(step: PipelineStep, cause: impl Into<FailureCause>) -> Self {
        PipelineError::Failed {
            step,
            cause: cause.into(),
        }
    }

    pub fn step(&self) -> PipelineStep {
        match self {
            PipelineError::StaleConfiguration { .. } => PipelineStep::Building,
            PipelineError::Failed { step, .. } => *step,
        }
    }

    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            PipelineError::Failed {
                cause: FailureCause::Transport(err),
                ..
            } => Some(err),
            _ => None,
        }
    }

    /// Only network failures are worth another attempt; everything else is a
    /// configuration or data defect.
    pub fn is_retryable(&self) -> bool {
        self.transport_error()
            .is_some_and(TransportError::is_retryable)
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PipelineError::StaleConfiguration { .. } => ErrorSeverity::High,
            PipelineError::Failed { cause, .. } => match cause {
                FailureCause::Transport(TransportError::Network { .. }) => ErrorSeverity::Medium,
                FailureCause::Transport(TransportError::AuthRejected { .. }) => {
                    ErrorSeverity::Critical
                }
                FailureCause::Host(HostError::Io(_)) => ErrorSeverity::Critical,
                _ => ErrorSeverity::High,
            },
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PipelineError::StaleConfiguration { .. } => {
                "Refresh the catalog and reconfigure the carrier method"
            }
            PipelineError::Failed { cause, .. } => match cause {
                FailureCause::Host(HostError::NotFound { .. }) => {
                    "Check the shipment and carrier method identifiers"
                }
                FailureCause::Host(_) => "Check the data directory permissions and contents",
                FailureCause::Build(BuildError::MissingAddress { .. }) => {
                    "Complete the sender and recipient addresses"
                }
                FailureCause::Build(BuildError::InvalidParcel { .. }) => {
                    "Fix the parcel weight/dimensions or choose another service"
                }
                FailureCause::Transport(TransportError::Network { .. }) => {
                    "Retry later; the webservice could not be reached in time"
                }
                FailureCause::Transport(TransportError::AuthRejected { .. }) => {
                    "Check the webservice login and password"
                }
                FailureCause::Transport(TransportError::ServerFault { .. }) => {
                    "Read the carrier's fault message and correct the shipment data"
                }
                FailureCause::Transport(TransportError::InvalidRequest { .. }) => {
                    "Check the webservice endpoint in the configuration"
                }
                FailureCause::Transport(_) | FailureCause::InvalidResponse { .. } => {
                    "Contact the carrier; the webservice answered with an unusable response"
                }
            },
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
