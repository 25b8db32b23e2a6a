//! Wire DTOs for GraphQL over HTTP.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub(super) struct GraphqlRequestDto<'a> {
    pub(super) query: &'a str,
    #[serde(rename = "operationName")]
    pub(super) operation_name: &'a str,
    pub(super) variables: &'a Value,
}

#[derive(Debug, Deserialize)]
pub(super) struct GraphqlResponseDto {
    #[serde(default)]
    pub(super) data: Option<Value>,
    #[serde(default)]
    pub(super) errors: Option<Vec<GraphqlErrorDto>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GraphqlErrorDto {
    pub(super) message: String,
}

/// What a decoded response body amounts to.
#[derive(Debug, PartialEq)]
pub(super) enum GraphqlOutcome {
    Data(Value),
    Errors(Vec<String>),
    Empty,
}

impl GraphqlResponseDto {
    /// Errors win over data: a response carrying both is a failed operation.
    pub(super) fn into_outcome(self) -> GraphqlOutcome {
        match (self.errors, self.data) {
            (Some(errors), _) if !errors.is_empty() => {
                GraphqlOutcome::Errors(errors.into_iter().map(|error| error.message).collect())
            }
            (_, Some(data)) if !data.is_null() => GraphqlOutcome::Data(data),
            _ => GraphqlOutcome::Empty,
        }
    }
}
