//! Driven port for executing GraphQL operations against OS2mo.
//!
//! Reconcilers own the operation documents and the shape of their variables;
//! the adapter behind this port owns transport, authentication and timeouts.

use async_trait::async_trait;
use serde_json::Value;

use super::define_port_error;

/// A named GraphQL document.
///
/// The name doubles as the GraphQL `operationName`, so it must match the
/// operation declared inside `document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphqlOperation {
    /// Operation name declared in the document.
    pub name: &'static str,
    /// Query or mutation text.
    pub document: &'static str,
}

define_port_error! {
    /// Errors surfaced while executing a GraphQL operation.
    pub enum GraphqlSessionError {
        /// The request never produced a response.
        Transport { message: String } =>
            "graphql transport failed: {message}",
        /// The request exceeded the per-request timeout.
        Timeout { message: String } =>
            "graphql request timed out: {message}",
        /// Credentials were missing, expired or rejected.
        Unauthorized { message: String } =>
            "graphql request unauthorised: {message}",
        /// The response body was not a GraphQL response.
        Decode { message: String } =>
            "graphql response decode failed: {message}",
        /// The service answered with an `errors` array.
        Query { messages: Vec<String> } =>
            "graphql operation returned errors: {messages:?}",
    }
}

/// Port for an authenticated GraphQL session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphqlSession: Send + Sync {
    /// Execute `operation` with `variables` and return the `data` member of the
    /// response.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use mo_init::domain::ports::{GraphqlOperation, GraphqlSession};
    /// use serde_json::json;
    ///
    /// const ORG: GraphqlOperation = GraphqlOperation {
    ///     name: "RootOrgQuery",
    ///     document: "query RootOrgQuery { org { uuid } }",
    /// };
    ///
    /// let data = session.execute(&ORG, json!({})).await?;
    /// assert!(data.get("org").is_some());
    /// # Ok::<(), mo_init::domain::ports::GraphqlSessionError>(())
    /// ```
    async fn execute(
        &self,
        operation: &GraphqlOperation,
        variables: Value,
    ) -> Result<Value, GraphqlSessionError>;
}
