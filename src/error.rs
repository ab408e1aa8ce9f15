//! Error types for the Instana provider.

use serde_json::Value;
use thiserror::Error;

use crate::restapi::ApiError;
use crate::schema::Diagnostic;
use crate::tagfilter::TagFilterError;

/// Summary reported when an operation runs before Configure.
pub const NOT_CONFIGURED_SUMMARY: &str = "Provider not configured";

/// Detail reported when an operation runs before Configure.
pub const NOT_CONFIGURED_DETAIL: &str = "The provider hasn't been configured before apply, likely because it depends on an unknown value from another resource.";

/// Errors that can occur while serving the provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A validation error scoped to a single attribute.
    #[error("Invalid value for attribute '{attribute}': {message}")]
    AttributeValidation {
        /// Dotted path of the offending attribute.
        attribute: String,
        /// What is wrong with the value.
        message: String,
    },

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation ran before the provider was configured.
    #[error("Provider not configured")]
    NotConfigured,

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The Instana REST API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A tag filter expression could not be processed.
    #[error("Invalid tag filter: {0}")]
    TagFilter(#[from] TagFilterError),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// A contract between the engine and a resource handle was violated.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Several diagnostics collected by a handler.
    #[error("{} diagnostic(s) reported", .0.len())]
    Diagnostics(Vec<Diagnostic>),

    /// The operation failed after a state the host must persist was produced.
    #[error("{source}")]
    PartialState {
        /// State to hand back to the host alongside the error.
        state: Value,
        /// The underlying failure.
        source: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Shorthand for an attribute scoped validation error.
    pub fn attribute(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AttributeValidation {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// The attribute path of an attribute scoped error.
    pub fn attribute_path(&self) -> Option<&str> {
        match self {
            Self::AttributeValidation { attribute, .. } => Some(attribute),
            Self::PartialState { source, .. } => source.attribute_path(),
            _ => None,
        }
    }

    /// Get the error message as a string.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::Unimplemented(msg)
            | Self::Internal(msg) => msg.clone(),
            Self::AttributeValidation { message, .. } => message.clone(),
            Self::NotConfigured => NOT_CONFIGURED_DETAIL.to_string(),
            Self::Serialization(err) => err.to_string(),
            Self::Transport(err) => err.to_string(),
            Self::Api(err) => err.to_string(),
            Self::TagFilter(err) => err.to_string(),
            Self::Diagnostics(diags) => diags
                .iter()
                .map(|d| d.summary.as_str())
                .collect::<Vec<_>>()
                .join("; "),
            Self::PartialState { source, .. } => source.message(),
        }
    }

    /// Whether this error reports a missing remote entity.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api(err) => err.is_not_found(),
            Self::PartialState { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Convert the error into protocol diagnostics.
    pub fn to_diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            Self::Diagnostics(diags) => diags.clone(),
            Self::PartialState { source, .. } => source.to_diagnostics(),
            Self::NotConfigured => {
                vec![Diagnostic::error(NOT_CONFIGURED_SUMMARY).with_detail(NOT_CONFIGURED_DETAIL)]
            },
            Self::AttributeValidation { attribute, message } => vec![Diagnostic::error(
                format!("Invalid value for attribute '{}'", attribute),
            )
            .with_detail(message.clone())
            .with_attribute(attribute.clone())],
            Self::Api(err) => vec![Diagnostic::error("Instana API request failed")
                .with_detail(err.to_string())],
            Self::TagFilter(err) => {
                vec![Diagnostic::error("Invalid tag filter expression").with_detail(err.to_string())]
            },
            other => vec![Diagnostic::error(other.to_string())],
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::AttributeValidation { .. } | ProviderError::TagFilter(_) => {
                tonic::Status::invalid_argument(err.to_string())
            },
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::NotConfigured => {
                tonic::Status::failed_precondition(NOT_CONFIGURED_DETAIL)
            },
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            },
            ProviderError::Api(err) => api_error_to_status(err),
            ProviderError::Unimplemented(msg) => tonic::Status::unimplemented(msg),
            ProviderError::Internal(msg) => tonic::Status::internal(msg),
            ProviderError::Diagnostics(_) => tonic::Status::invalid_argument(err.message()),
            ProviderError::PartialState { source, .. } => (*source).into(),
        }
    }
}

fn api_error_to_status(err: ApiError) -> tonic::Status {
    let msg = err.to_string();
    match err {
        ApiError::NotFound { .. } => tonic::Status::not_found(msg),
        ApiError::Conflict { .. } => tonic::Status::already_exists(msg),
        ApiError::Client { status, .. } if status == 401 || status == 403 => {
            tonic::Status::permission_denied(msg)
        },
        ApiError::Client { status: 429, .. } => tonic::Status::resource_exhausted(msg),
        ApiError::Client { .. } | ApiError::Decode(_) => tonic::Status::invalid_argument(msg),
        ApiError::Server { .. } | ApiError::Transport(_) => tonic::Status::unavailable(msg),
        ApiError::Cancelled => tonic::Status::cancelled(msg),
        ApiError::Unsupported(_) => tonic::Status::unimplemented(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;
    use crate::tagfilter::TagFilterErrorKind;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: resource-123");

        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::UnknownResource("instana_custom".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: instana_custom");

        assert_eq!(
            ProviderError::NotConfigured.to_string(),
            "Provider not configured"
        );
    }

    #[test]
    fn test_error_to_status() {
        let status: tonic::Status = ProviderError::NotFound("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::NotFound);

        let status: tonic::Status = ProviderError::Validation("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: tonic::Status = ProviderError::Configuration("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);

        let status: tonic::Status = ProviderError::NotConfigured.into();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);

        let status: tonic::Status = ProviderError::Internal("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::Internal);
    }

    #[test]
    fn test_api_error_to_status() {
        let status: tonic::Status = ProviderError::from(ApiError::Conflict {
            path: "/api/x".to_string(),
            body: String::new(),
        })
        .into();
        assert_eq!(status.code(), tonic::Code::AlreadyExists);

        let status: tonic::Status = ProviderError::from(ApiError::Client {
            status: 403,
            path: "/api/x".to_string(),
            body: String::new(),
        })
        .into();
        assert_eq!(status.code(), tonic::Code::PermissionDenied);

        let status: tonic::Status = ProviderError::from(ApiError::Cancelled).into();
        assert_eq!(status.code(), tonic::Code::Cancelled);
    }

    #[test]
    fn test_not_configured_diagnostic() {
        let diags = ProviderError::NotConfigured.to_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Provider not configured");
        assert_eq!(diags[0].detail.as_deref(), Some(NOT_CONFIGURED_DETAIL));
    }

    #[test]
    fn test_attribute_validation_diagnostic() {
        let diags = ProviderError::attribute("rules.0.threshold", "must be positive").to_diagnostics();
        assert_eq!(diags[0].severity, DiagnosticSeverity::Error);
        assert_eq!(diags[0].attribute.as_deref(), Some("rules.0.threshold"));
        assert_eq!(diags[0].detail.as_deref(), Some("must be positive"));
    }

    #[test]
    fn test_partial_state_keeps_source() {
        let err = ProviderError::PartialState {
            state: serde_json::json!({"id": "abc"}),
            source: Box::new(ProviderError::from(ApiError::NotFound {
                path: "/api/x/abc".to_string(),
            })),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_diagnostics().len(), 1);
    }

    #[test]
    fn test_tag_filter_error_is_validation() {
        let err: ProviderError = TagFilterError::new(TagFilterErrorKind::Parse, 4, "boom").into();
        let status: tonic::Status = err.into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[test]
    fn test_diagnostics_message() {
        let err = ProviderError::Diagnostics(vec![
            Diagnostic::error("first"),
            Diagnostic::error("second"),
        ]);
        assert_eq!(err.message(), "first; second");
        assert_eq!(err.to_diagnostics().len(), 2);
    }
}
