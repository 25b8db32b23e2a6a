//! Keycloak authentication for outbound requests.

mod token_source;

pub use token_source::{
    AccessTokenProvider, KeycloakCredentials, KeycloakTokenSource, TokenError,
};
