//! Class reconciler.
//!
//! Classes are identified by `(facet user key, class user key)`. References to
//! IT systems are given by user key and resolved to UUIDs before any class is
//! mutated: a pass either resolves every reference or mutates nothing.

use std::collections::HashMap;

use futures_util::future::try_join;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::it_systems::get_it_systems;
use crate::domain::ports::{GraphqlOperation, GraphqlSession};
use crate::domain::response::current_objects;
use crate::domain::{Class, DesiredClass, DesiredFacet, Facet, ReconcileError};

/// Lists every facet with its classes and their IT system links.
pub const FACET_CLASSES_QUERY: GraphqlOperation = GraphqlOperation {
    name: "FacetClassesQuery",
    document: r"
query FacetClassesQuery {
  facets {
    objects {
      current {
        uuid
        user_key
        classes {
          uuid
          user_key
          name
          scope
          it_system {
            uuid
          }
        }
      }
    }
  }
}
",
};

/// Creates a class inside a facet.
pub const CREATE_CLASS: GraphqlOperation = GraphqlOperation {
    name: "CreateClass",
    document: r"
mutation CreateClass(
  $facet_uuid: UUID!,
  $user_key: String!,
  $name: String!,
  $scope: String,
  $it_system_uuid: UUID
) {
  class_create(
    input: {
      facet_uuid: $facet_uuid,
      user_key: $user_key,
      name: $name,
      scope: $scope,
      it_system_uuid: $it_system_uuid
    }
  ) {
    uuid
  }
}
",
};

/// Overwrites a class in place.
pub const UPDATE_CLASS: GraphqlOperation = GraphqlOperation {
    name: "UpdateClass",
    document: r"
mutation UpdateClass(
  $uuid: UUID!,
  $facet_uuid: UUID!,
  $user_key: String!,
  $name: String!,
  $scope: String,
  $it_system_uuid: UUID
) {
  class_update(
    uuid: $uuid
    input: {
      facet_uuid: $facet_uuid,
      user_key: $user_key,
      name: $name,
      scope: $scope,
      it_system_uuid: $it_system_uuid
    }
  ) {
    uuid
  }
}
",
};

#[derive(Debug, Deserialize)]
struct FacetDto {
    uuid: Uuid,
    user_key: String,
    #[serde(default)]
    classes: Vec<ClassDto>,
}

#[derive(Debug, Deserialize)]
struct ClassDto {
    uuid: Uuid,
    user_key: String,
    name: String,
    scope: Option<String>,
    #[serde(default)]
    it_system: Option<ItSystemRefDto>,
}

#[derive(Debug, Deserialize)]
struct ItSystemRefDto {
    uuid: Uuid,
}

impl From<FacetDto> for Facet {
    fn from(dto: FacetDto) -> Self {
        Self {
            uuid: dto.uuid,
            user_key: dto.user_key,
            classes: dto.classes.into_iter().map(Class::from).collect(),
        }
    }
}

impl From<ClassDto> for Class {
    fn from(dto: ClassDto) -> Self {
        Self {
            uuid: dto.uuid,
            user_key: dto.user_key,
            name: dto.name,
            scope: dto.scope,
            it_system_uuid: dto.it_system.map(|it_system| it_system.uuid),
        }
    }
}

/// Fetch every facet together with its classes.
///
/// # Errors
///
/// Propagates session failures and malformed responses.
pub async fn get_classes(session: &dyn GraphqlSession) -> Result<Vec<Facet>, ReconcileError> {
    info!("getting classes");
    let data = session.execute(&FACET_CLASSES_QUERY, json!({})).await?;
    let facets: Vec<FacetDto> = current_objects(FACET_CLASSES_QUERY.name, data, "facets")?;
    Ok(facets.into_iter().map(Facet::from).collect())
}

/// Ensure every desired class exists in its facet with the desired attributes.
///
/// Facets must already exist; this reconciler never creates them.
///
/// # Errors
///
/// - [`ReconcileError::MissingFacet`] when a desired facet does not exist.
/// - [`ReconcileError::DanglingReference`] when a class names an unknown IT
///   system.
///
/// Both are detected before the first mutation. Session errors propagate.
pub async fn ensure_classes(
    session: &dyn GraphqlSession,
    desired: &[DesiredFacet],
) -> Result<(), ReconcileError> {
    info!(facets = desired.len(), "ensuring classes");
    let (facets, it_systems) = try_join(get_classes(session), get_it_systems(session)).await?;
    debug!(existing = ?facets, "existing classes");

    let existing = ExistingClasses::new(facets);
    let it_system_uuids = it_systems
        .into_values()
        .map(|it_system| (it_system.user_key, it_system.uuid))
        .collect::<HashMap<_, _>>();
    let plan = plan_changes(desired, &existing, &it_system_uuids)?;

    for change in plan {
        change.apply(session).await?;
    }
    Ok(())
}

/// Existing classes indexed by facet and class user key.
struct ExistingClasses {
    facet_uuids: HashMap<String, Uuid>,
    classes: HashMap<String, HashMap<String, Class>>,
}

impl ExistingClasses {
    fn new(facets: Vec<Facet>) -> Self {
        let mut facet_uuids = HashMap::with_capacity(facets.len());
        let mut classes = HashMap::with_capacity(facets.len());
        for facet in facets {
            facet_uuids.insert(facet.user_key.clone(), facet.uuid);
            let by_key = facet
                .classes
                .into_iter()
                .map(|class| (class.user_key.clone(), class))
                .collect::<HashMap<_, _>>();
            classes.insert(facet.user_key, by_key);
        }
        Self {
            facet_uuids,
            classes,
        }
    }

    fn find(&self, facet_user_key: &str, class_user_key: &str) -> Option<&Class> {
        self.classes.get(facet_user_key)?.get(class_user_key)
    }
}

/// A resolved mutation for one desired class.
#[derive(Debug, PartialEq)]
enum ClassChange<'a> {
    Create {
        facet_uuid: Uuid,
        class: &'a DesiredClass,
        it_system_uuid: Option<Uuid>,
    },
    Update {
        uuid: Uuid,
        facet_uuid: Uuid,
        class: &'a DesiredClass,
        it_system_uuid: Option<Uuid>,
    },
}

impl ClassChange<'_> {
    async fn apply(&self, session: &dyn GraphqlSession) -> Result<(), ReconcileError> {
        match self {
            Self::Create {
                facet_uuid,
                class,
                it_system_uuid,
            } => {
                info!(user_key = %class.user_key, facet_uuid = %facet_uuid, "creating class");
                session
                    .execute(
                        &CREATE_CLASS,
                        class_variables(*facet_uuid, class, *it_system_uuid),
                    )
                    .await?;
            }
            Self::Update {
                uuid,
                facet_uuid,
                class,
                it_system_uuid,
            } => {
                info!(user_key = %class.user_key, uuid = %uuid, "updating class");
                let mut variables = class_variables(*facet_uuid, class, *it_system_uuid);
                variables["uuid"] = json!(uuid);
                session.execute(&UPDATE_CLASS, variables).await?;
            }
        }
        Ok(())
    }
}

fn class_variables(facet_uuid: Uuid, class: &DesiredClass, it_system_uuid: Option<Uuid>) -> Value {
    json!({
        "facet_uuid": facet_uuid,
        "user_key": class.user_key,
        "name": class.title,
        "scope": class.scope,
        "it_system_uuid": it_system_uuid,
    })
}

/// Resolve references and diff every desired class, in input order.
fn plan_changes<'a>(
    desired: &'a [DesiredFacet],
    existing: &ExistingClasses,
    it_system_uuids: &HashMap<String, Uuid>,
) -> Result<Vec<ClassChange<'a>>, ReconcileError> {
    let mut changes = Vec::new();
    for facet in desired {
        for class in &facet.classes {
            let it_system_uuid = resolve_it_system(facet, class, it_system_uuids)?;
            let facet_uuid = *existing.facet_uuids.get(&facet.user_key).ok_or_else(|| {
                ReconcileError::MissingFacet {
                    facet_user_key: facet.user_key.clone(),
                }
            })?;

            match existing.find(&facet.user_key, &class.user_key) {
                None => changes.push(ClassChange::Create {
                    facet_uuid,
                    class,
                    it_system_uuid,
                }),
                Some(current) if has_drifted(current, class, it_system_uuid) => {
                    changes.push(ClassChange::Update {
                        uuid: current.uuid,
                        facet_uuid,
                        class,
                        it_system_uuid,
                    });
                }
                Some(_) => {}
            }
        }
    }
    Ok(changes)
}

fn resolve_it_system(
    facet: &DesiredFacet,
    class: &DesiredClass,
    it_system_uuids: &HashMap<String, Uuid>,
) -> Result<Option<Uuid>, ReconcileError> {
    let Some(user_key) = class.it_system.as_ref() else {
        return Ok(None);
    };
    it_system_uuids
        .get(user_key)
        .copied()
        .map(Some)
        .ok_or_else(|| ReconcileError::DanglingReference {
            facet_user_key: facet.user_key.clone(),
            class_user_key: class.user_key.clone(),
            it_system_user_key: user_key.clone(),
        })
}

fn has_drifted(current: &Class, desired: &DesiredClass, it_system_uuid: Option<Uuid>) -> bool {
    current.name != desired.title
        || current.scope != desired.scope
        || current.it_system_uuid != it_system_uuid
}

#[cfg(test)]
#[path = "classes_tests.rs"]
mod tests;
