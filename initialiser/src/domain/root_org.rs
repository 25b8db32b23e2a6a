//! Root organisation reconciler.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::ports::{GraphqlOperation, GraphqlSession};
use crate::domain::response::single_object;
use crate::domain::{
    DesiredRootOrganisation, ReconcileError, RootOrganisation, SessionErrorKind,
    classify_session_error,
};

/// Reads the root organisation.
pub const ROOT_ORG_QUERY: GraphqlOperation = GraphqlOperation {
    name: "RootOrgQuery",
    document: r"
query RootOrgQuery {
  org {
    uuid
    municipality_code
  }
}
",
};

/// Creates the root organisation.
pub const ROOT_ORG_CREATE: GraphqlOperation = GraphqlOperation {
    name: "RootOrgCreate",
    document: r"
mutation RootOrgCreate($municipality_code: Int) {
  org_create(input: {municipality_code: $municipality_code}) {
    uuid
  }
}
",
};

#[derive(Debug, Deserialize)]
struct RootOrgDto {
    uuid: Uuid,
    municipality_code: Option<i64>,
}

/// Fetch the root organisation, or `None` when OS2mo reports it unconfigured.
///
/// # Errors
///
/// Any session failure other than the "not configured" signal is returned
/// unchanged.
pub async fn get_root_org(
    session: &dyn GraphqlSession,
) -> Result<Option<RootOrganisation>, ReconcileError> {
    debug!("getting root org");
    let data = match session.execute(&ROOT_ORG_QUERY, json!({})).await {
        Ok(data) => data,
        Err(error) => {
            debug!(error = %error, "error getting root org");
            return match classify_session_error(&error) {
                SessionErrorKind::NotConfigured => Ok(None),
                SessionErrorKind::Unknown => Err(error.into()),
            };
        }
    };
    let org: RootOrgDto = single_object(ROOT_ORG_QUERY.name, data, "org")?;
    Ok(Some(RootOrganisation {
        uuid: org.uuid,
        municipality_code: org.municipality_code,
    }))
}

/// Ensure the root organisation exists with the desired municipality code.
///
/// # Errors
///
/// Returns [`ReconcileError::ConfigurationConflict`] when the organisation
/// exists with a different municipality code, and propagates session errors.
pub async fn ensure_root_organisation(
    session: &dyn GraphqlSession,
    desired: &DesiredRootOrganisation,
) -> Result<(), ReconcileError> {
    info!(municipality_code = ?desired.municipality_code, "ensuring root org");
    let existing = get_root_org(session).await?;
    debug!(existing = ?existing, "existing root org");

    if let Some(root_org) = existing {
        if root_org.municipality_code != desired.municipality_code {
            return Err(ReconcileError::ConfigurationConflict {
                existing: root_org.municipality_code,
                desired: desired.municipality_code,
            });
        }
        info!(uuid = %root_org.uuid, "root org already configured");
        return Ok(());
    }

    info!("creating root org");
    session
        .execute(
            &ROOT_ORG_CREATE,
            json!({ "municipality_code": desired.municipality_code }),
        )
        .await?;
    Ok(())
}
