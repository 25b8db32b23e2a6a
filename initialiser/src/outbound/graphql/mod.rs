//! GraphQL outbound adapter.
//!
//! Provides the HTTP implementation of the `GraphqlSession` port.

mod dto;
mod http_session;

pub use http_session::{HttpGraphqlSession, MAX_IN_FLIGHT_REQUESTS};
