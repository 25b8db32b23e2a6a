//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **graphql**: OS2mo GraphQL over HTTP
//! - **keycloak**: client-credentials access tokens for the GraphQL adapter
//!
//! Adapters are thin translators between domain types and wire formats. They
//! contain no reconciliation logic.

pub mod graphql;
mod http_body;
pub mod keycloak;
