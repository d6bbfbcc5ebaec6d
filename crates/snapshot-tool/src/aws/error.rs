//! AWS error classification and handling
//!
//! SDK errors are classified by their `.code()` as soon as a call returns, so
//! the rest of the tool can ask "was this a not-found?" without knowing which
//! operation produced it.

use aws_sdk_rds::error::{DisplayErrorContext, ProvideErrorMetadata};
use thiserror::Error;

/// AWS error categories used by the executor and for log wording
#[derive(Debug, Clone, Error)]
pub enum AwsError {
    /// Snapshot or cluster does not exist (deletes treat this as done)
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// Target identifier is already taken (copies treat this as done)
    #[error("Resource already exists: {message}")]
    AlreadyExists { message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    Throttled,

    /// Snapshot or cluster is not in a state that allows the operation
    #[error("Invalid resource state: {message}")]
    InvalidState { message: String },

    /// KMS key is missing, disabled, or not usable by this account
    #[error("KMS key not accessible: {message}")]
    KmsAccess { message: String },

    /// Account snapshot quota reached
    #[error("Snapshot quota exceeded: {message}")]
    QuotaExceeded { message: String },

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Classify a raw SDK error.
    ///
    /// Works for any `SdkError<E, R>` whose operation error exposes metadata,
    /// which is every RDS, KMS and STS operation.
    pub fn from_sdk<E>(err: E) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error,
    {
        let message = err
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
        classify_aws_error(err.code(), Some(&message))
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    /// Check if this is an "already exists" error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, AwsError::AlreadyExists { .. })
    }

    /// Errors that usually clear up by the next scheduled pass
    pub fn is_transient(&self) -> bool {
        matches!(self, AwsError::Throttled | AwsError::InvalidState { .. })
    }

    /// Get a user-friendly suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            AwsError::KmsAccess { .. } => Some(
                "Check that the KMS key exists, is enabled, and that its key policy grants this account access.",
            ),
            AwsError::QuotaExceeded { .. } => Some(
                "Lower the retention period or request a snapshot quota increase via Service Quotas.",
            ),
            AwsError::Throttled => {
                Some("RDS API rate limit hit. Lower --max-in-flight; the next pass will pick up the work.")
            }
            _ => None,
        }
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "DBClusterSnapshotNotFoundFault",
    "DBClusterNotFoundFault",
    "DBSnapshotNotFound",
    "NotFoundException",
];

/// Known AWS error codes for "already exists" conditions
const ALREADY_EXISTS_CODES: &[&str] = &[
    "DBClusterSnapshotAlreadyExistsFault",
    "DBSnapshotAlreadyExists",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &["Throttling", "ThrottlingException", "RequestLimitExceeded"];

/// Known AWS error codes for invalid state
const INVALID_STATE_CODES: &[&str] = &[
    "InvalidDBClusterSnapshotStateFault",
    "InvalidDBClusterStateFault",
];

/// Known AWS error codes for KMS key problems
const KMS_CODES: &[&str] = &[
    "KMSKeyNotAccessibleFault",
    "DisabledException",
    "KMSInvalidStateException",
    "AccessDeniedException",
];

/// Known AWS error codes for quota limits
const QUOTA_CODES: &[&str] = &[
    "SnapshotQuotaExceeded",
    "SharedSnapshotQuotaExceeded",
];

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        Some(c) if ALREADY_EXISTS_CODES.contains(&c) => AwsError::AlreadyExists { message },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        Some(c) if INVALID_STATE_CODES.contains(&c) => AwsError::InvalidState { message },
        Some(c) if KMS_CODES.contains(&c) => AwsError::KmsAccess { message },
        Some(c) if QUOTA_CODES.contains(&c) => AwsError::QuotaExceeded { message },
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Find the classified AWS error in an anyhow error chain, if any.
pub fn find_aws_error(error: &anyhow::Error) -> Option<&AwsError> {
    error.chain().find_map(|cause| cause.downcast_ref::<AwsError>())
}

/// Classify an error from an anyhow::Error.
///
/// Errors that never reached AWS (or were not produced by the AWS layer) come
/// back as `AwsError::Sdk` with no code.
pub fn classify_anyhow_error(error: &anyhow::Error) -> AwsError {
    find_aws_error(error).cloned().unwrap_or_else(|| AwsError::Sdk {
        code: None,
        message: format!("{error:#}"),
    })
}

/// Turn a not-found error into `Ok(false)`; `Ok(true)` means the call went through.
pub fn ignore_not_found(result: anyhow::Result<()>) -> anyhow::Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if classify_anyhow_error(&e).is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}
