//! IT system reconciler.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::ports::{GraphqlOperation, GraphqlSession};
use crate::domain::response::current_objects;
use crate::domain::{DesiredItSystem, ItSystem, ReconcileError};

/// Lists every IT system.
pub const IT_SYSTEMS_QUERY: GraphqlOperation = GraphqlOperation {
    name: "ITSystemsQuery",
    document: r"
query ITSystemsQuery {
  itsystems {
    objects {
      current {
        uuid
        user_key
        name
      }
    }
  }
}
",
};

/// Registers a new IT system.
pub const CREATE_IT_SYSTEM: GraphqlOperation = GraphqlOperation {
    name: "CreateITSystem",
    document: r"
mutation CreateITSystem($user_key: String!, $name: String!) {
  itsystem_create(input: {user_key: $user_key, name: $name}) {
    uuid
  }
}
",
};

/// Renames an existing IT system in place.
pub const UPDATE_IT_SYSTEM: GraphqlOperation = GraphqlOperation {
    name: "UpdateITSystem",
    document: r"
mutation UpdateITSystem($uuid: UUID!, $user_key: String!, $name: String!) {
  itsystem_update(uuid: $uuid, input: {user_key: $user_key, name: $name}) {
    uuid
  }
}
",
};

#[derive(Debug, Deserialize)]
struct ItSystemDto {
    uuid: Uuid,
    user_key: String,
    name: String,
}

/// Fetch all IT systems keyed by user key.
///
/// # Errors
///
/// Propagates session failures and malformed responses.
pub async fn get_it_systems(
    session: &dyn GraphqlSession,
) -> Result<HashMap<String, ItSystem>, ReconcileError> {
    info!("getting IT systems");
    let data = session.execute(&IT_SYSTEMS_QUERY, json!({})).await?;
    let it_systems: Vec<ItSystemDto> = current_objects(IT_SYSTEMS_QUERY.name, data, "itsystems")?;
    Ok(it_systems
        .into_iter()
        .map(|dto| {
            (
                dto.user_key.clone(),
                ItSystem {
                    uuid: dto.uuid,
                    user_key: dto.user_key,
                    name: dto.name,
                },
            )
        })
        .collect())
}

/// Ensure the desired IT systems exist with the desired names.
///
/// Missing systems are created and renamed systems are updated in place, in
/// input order.
///
/// # Errors
///
/// Propagates the first failing read or mutation; earlier mutations stay
/// applied.
pub async fn ensure_it_systems(
    session: &dyn GraphqlSession,
    desired: &[DesiredItSystem],
) -> Result<(), ReconcileError> {
    info!(count = desired.len(), "ensuring IT systems");
    let existing = get_it_systems(session).await?;
    debug!(existing = ?existing, "existing IT systems");

    for it_system in desired {
        match existing.get(&it_system.user_key) {
            None => {
                info!(user_key = %it_system.user_key, "creating IT system");
                session
                    .execute(
                        &CREATE_IT_SYSTEM,
                        json!({
                            "user_key": it_system.user_key,
                            "name": it_system.name,
                        }),
                    )
                    .await?;
            }
            Some(current) if current.name != it_system.name => {
                info!(user_key = %it_system.user_key, "updating IT system");
                session
                    .execute(
                        &UPDATE_IT_SYSTEM,
                        json!({
                            "uuid": current.uuid,
                            "user_key": it_system.user_key,
                            "name": it_system.name,
                        }),
                    )
                    .await?;
            }
            Some(_) => {}
        }
    }
    Ok(())
}
