//! Declarative initialisation of an OS2mo instance.
//!
//! The crate reads a desired-state document (root organisation, facets with
//! their classes, IT systems) and reconciles OS2mo towards it over GraphQL.
//! Runs are idempotent: a second run with the same document mutates nothing.

pub mod domain;
pub mod inbound;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
