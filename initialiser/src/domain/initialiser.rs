//! Top-level reconciliation run.
//!
//! Runs the reconcilers in dependency order:
//! - root organisation;
//! - IT systems, which classes may reference;
//! - facets, which own classes;
//! - classes.
//!
//! Absent configuration sections skip their reconciler. The first error aborts
//! the run.

use std::sync::Arc;

use tracing::info;

use crate::domain::ports::GraphqlSession;
use crate::domain::{
    InitialisationConfig, ReconcileError, ensure_classes, ensure_facets, ensure_it_systems,
    ensure_root_organisation,
};

/// Drives one reconciliation pass against a GraphQL session.
#[derive(Clone)]
pub struct Initialiser<S> {
    session: Arc<S>,
}

impl<S> Initialiser<S>
where
    S: GraphqlSession,
{
    /// Create an initialiser over `session`.
    pub fn new(session: Arc<S>) -> Self {
        Self { session }
    }

    /// Bring OS2mo in line with `config`.
    ///
    /// Running twice with the same configuration performs no mutations on the
    /// second run.
    ///
    /// # Errors
    ///
    /// Returns the first [`ReconcileError`] raised by a reconciler. Mutations
    /// made before the failure are not rolled back.
    pub async fn run(&self, config: &InitialisationConfig) -> Result<(), ReconcileError> {
        let session: &dyn GraphqlSession = self.session.as_ref();

        if let Some(root_organisation) = &config.root_organisation {
            ensure_root_organisation(session, root_organisation).await?;
        }
        if let Some(it_systems) = &config.it_systems {
            ensure_it_systems(session, it_systems).await?;
        }
        if let Some(facets) = &config.facets {
            ensure_facets(session, &config.facet_user_keys()).await?;
            ensure_classes(session, facets).await?;
        }

        info!("initialisation complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Ordering and section-skipping coverage for the initialiser.

    use super::*;
    use crate::domain::ports::{GraphqlSessionError, MockGraphqlSession};
    use crate::domain::{
        CREATE_IT_SYSTEM, DesiredFacet, DesiredItSystem, DesiredRootOrganisation,
        FACET_CLASSES_QUERY, FACETS_QUERY, IT_SYSTEMS_QUERY, ROOT_ORG_CREATE, ROOT_ORG_QUERY,
    };
    use mockall::Sequence;
    use rstest::rstest;
    use serde_json::json;

    fn no_it_systems() -> serde_json::Value {
        json!({"itsystems": {"objects": []}})
    }

    #[rstest]
    #[tokio::test]
    async fn run_skips_every_absent_section() {
        let session = Arc::new(MockGraphqlSession::new());

        Initialiser::new(session)
            .run(&InitialisationConfig::default())
            .await
            .expect("empty configuration should succeed without calls");
    }

    #[rstest]
    #[tokio::test]
    async fn run_reconciles_root_org_before_it_systems() {
        let mut session = MockGraphqlSession::new();
        let mut sequence = Sequence::new();
        session
            .expect_execute()
            .withf(|operation, _| operation.name == ROOT_ORG_QUERY.name)
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| {
                Err(GraphqlSessionError::query(vec![
                    "ErrorCodes.E_ORG_UNCONFIGURED".to_owned(),
                ]))
            });
        session
            .expect_execute()
            .withf(|operation, _| operation.name == ROOT_ORG_CREATE.name)
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(json!({})));
        session
            .expect_execute()
            .withf(|operation, _| operation.name == IT_SYSTEMS_QUERY.name)
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(no_it_systems()));
        session
            .expect_execute()
            .withf(|operation, _| operation.name == CREATE_IT_SYSTEM.name)
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(json!({})));

        let config = InitialisationConfig {
            root_organisation: Some(DesiredRootOrganisation {
                municipality_code: Some(123),
            }),
            it_systems: Some(vec![DesiredItSystem {
                user_key: "AD".to_owned(),
                name: "Active Directory".to_owned(),
            }]),
            facets: None,
        };

        Initialiser::new(Arc::new(session))
            .run(&config)
            .await
            .expect("run should succeed");
    }

    #[rstest]
    #[tokio::test]
    async fn run_stops_after_first_failing_reconciler() {
        let mut session = MockGraphqlSession::new();
        session
            .expect_execute()
            .withf(|operation, _| operation.name == ROOT_ORG_QUERY.name)
            .times(1)
            .returning(|_, _| {
                Ok(json!({
                    "org": {
                        "uuid": "67bae43a-2b92-484a-9476-95135633aaf4",
                        "municipality_code": 100
                    }
                }))
            });

        let config = InitialisationConfig {
            root_organisation: Some(DesiredRootOrganisation {
                municipality_code: Some(200),
            }),
            it_systems: Some(Vec::new()),
            facets: Some(Vec::new()),
        };

        let error = Initialiser::new(Arc::new(session))
            .run(&config)
            .await
            .expect_err("conflict should abort the run");

        assert!(matches!(error, ReconcileError::ConfigurationConflict { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn run_reconciles_facets_then_their_classes() {
        let mut session = MockGraphqlSession::new();
        session
            .expect_execute()
            .withf(|operation, _| operation.name == FACETS_QUERY.name)
            .times(1)
            .returning(|_, _| {
                Ok(json!({
                    "facets": {"objects": [{"current": {"user_key": "visibility"}}]}
                }))
            });
        session
            .expect_execute()
            .withf(|operation, _| operation.name == FACET_CLASSES_QUERY.name)
            .times(1)
            .returning(|_, _| {
                Ok(json!({
                    "facets": {"objects": [{"current": {
                        "uuid": "0f8b4b5c-ef3e-4a43-9f4b-0a5fd1c8d7e2",
                        "user_key": "visibility",
                        "classes": []
                    }}]}
                }))
            });
        session
            .expect_execute()
            .withf(|operation, _| operation.name == IT_SYSTEMS_QUERY.name)
            .times(1)
            .returning(|_, _| Ok(no_it_systems()));

        let config = InitialisationConfig {
            facets: Some(vec![DesiredFacet {
                user_key: "visibility".to_owned(),
                classes: Vec::new(),
            }]),
            ..InitialisationConfig::default()
        };

        Initialiser::new(Arc::new(session))
            .run(&config)
            .await
            .expect("run should succeed");
    }
}
