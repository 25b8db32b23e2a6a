//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod graphql_session;

#[cfg(test)]
pub use graphql_session::MockGraphqlSession;
pub use graphql_session::{GraphqlOperation, GraphqlSession, GraphqlSessionError};
