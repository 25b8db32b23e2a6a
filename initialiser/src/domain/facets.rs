//! Facet reconciler.
//!
//! Facets carry no managed attributes, so only existence is ensured.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::domain::ReconcileError;
use crate::domain::ports::{GraphqlOperation, GraphqlSession};
use crate::domain::response::current_objects;

/// Lists the user keys of every facet.
pub const FACETS_QUERY: GraphqlOperation = GraphqlOperation {
    name: "FacetsQuery",
    document: r"
query FacetsQuery {
  facets {
    objects {
      current {
        user_key
      }
    }
  }
}
",
};

/// Creates a facet.
pub const CREATE_FACET: GraphqlOperation = GraphqlOperation {
    name: "CreateFacet",
    document: r"
mutation CreateFacet($user_key: String!) {
  facet_create(input: {user_key: $user_key}) {
    uuid
  }
}
",
};

#[derive(Debug, Deserialize)]
struct FacetKeyDto {
    user_key: String,
}

/// Fetch the user keys of all existing facets.
///
/// # Errors
///
/// Propagates session failures and malformed responses.
pub async fn get_facets(session: &dyn GraphqlSession) -> Result<HashSet<String>, ReconcileError> {
    info!("getting facets");
    let data = session.execute(&FACETS_QUERY, json!({})).await?;
    let facets: Vec<FacetKeyDto> = current_objects(FACETS_QUERY.name, data, "facets")?;
    Ok(facets.into_iter().map(|facet| facet.user_key).collect())
}

/// Ensure every facet in `desired_user_keys` exists.
///
/// Missing facets are created one at a time in input order; repeated keys are
/// created once.
///
/// # Errors
///
/// Propagates the first failing read or mutation.
pub async fn ensure_facets(
    session: &dyn GraphqlSession,
    desired_user_keys: &[String],
) -> Result<(), ReconcileError> {
    info!(facets = ?desired_user_keys, "ensuring facets");
    let existing = get_facets(session).await?;
    debug!(existing = ?existing, "existing facets");

    for user_key in missing_facets(desired_user_keys, &existing) {
        info!(user_key = %user_key, "creating facet");
        session
            .execute(&CREATE_FACET, json!({ "user_key": user_key }))
            .await?;
    }
    Ok(())
}

fn missing_facets<'a>(desired: &'a [String], existing: &HashSet<String>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    desired
        .iter()
        .map(String::as_str)
        .filter(|user_key| !existing.contains(*user_key) && seen.insert(*user_key))
        .collect()
}
