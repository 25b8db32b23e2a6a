//! Reconciliation errors and the session-error classifier.
//!
//! OS2mo reports some domain conditions as GraphQL errors whose message is an
//! error-code string. Matching on those strings happens only in
//! [`classify_session_error`].

use thiserror::Error;

use crate::domain::ports::GraphqlSessionError;

/// Error code OS2mo returns while the root organisation is not yet created.
pub const ORG_UNCONFIGURED_CODE: &str = "ErrorCodes.E_ORG_UNCONFIGURED";

/// Failures that abort a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The configuration asks for a change OS2mo does not support.
    #[error(
        "root organisation has municipality code {existing:?} but {desired:?} is configured; \
         changing the municipality code is not supported by OS2mo"
    )]
    ConfigurationConflict {
        /// Municipality code held by OS2mo.
        existing: Option<i64>,
        /// Municipality code in the configuration.
        desired: Option<i64>,
    },
    /// A class references an IT system that does not exist.
    #[error(
        "class {class_user_key} in facet {facet_user_key} references unknown IT system \
         {it_system_user_key}"
    )]
    DanglingReference {
        /// Facet owning the class.
        facet_user_key: String,
        /// Offending class.
        class_user_key: String,
        /// IT system user key that could not be resolved.
        it_system_user_key: String,
    },
    /// Classes were requested for a facet OS2mo does not have.
    #[error("facet {facet_user_key} does not exist; facets must be ensured before classes")]
    MissingFacet {
        /// Facet user key from the configuration.
        facet_user_key: String,
    },
    /// Response data did not have the shape the operation promises.
    #[error("unexpected {operation} response: {message}")]
    UnexpectedResponse {
        /// Operation whose response failed to parse.
        operation: &'static str,
        /// What was wrong with it.
        message: String,
    },
    /// The session failed; propagated unchanged.
    #[error(transparent)]
    Session(#[from] GraphqlSessionError),
}

impl ReconcileError {
    /// Convenience constructor for [`ReconcileError::UnexpectedResponse`].
    pub fn unexpected_response(operation: &'static str, message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            operation,
            message: message.into(),
        }
    }
}

/// Classification of a session error for callers that expect specific codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// OS2mo has no root organisation yet.
    NotConfigured,
    /// Anything else.
    Unknown,
}

/// Classify a session error.
///
/// Only a query failure carrying exactly one error whose message is
/// [`ORG_UNCONFIGURED_CODE`] counts as [`SessionErrorKind::NotConfigured`].
///
/// # Examples
/// ```
/// use mo_init::domain::ports::GraphqlSessionError;
/// use mo_init::domain::{SessionErrorKind, classify_session_error};
///
/// let error = GraphqlSessionError::query(vec!["ErrorCodes.E_ORG_UNCONFIGURED".to_owned()]);
/// assert_eq!(classify_session_error(&error), SessionErrorKind::NotConfigured);
/// ```
pub fn classify_session_error(error: &GraphqlSessionError) -> SessionErrorKind {
    match error {
        GraphqlSessionError::Query { messages } => match messages.as_slice() {
            [only] if only == ORG_UNCONFIGURED_CODE => SessionErrorKind::NotConfigured,
            _ => SessionErrorKind::Unknown,
        },
        _ => SessionErrorKind::Unknown,
    }
}
