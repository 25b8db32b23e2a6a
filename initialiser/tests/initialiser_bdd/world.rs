//! Scenario-world methods for initialiser BDD tests.

use std::sync::Arc;

use mo_init::domain::ports::GraphqlSession;
use mo_init::domain::{InitialisationConfig, Initialiser, UPDATE_CLASS};
use mo_init::inbound::parse_config;
use mo_init::test_support::InMemoryDirectory;
use serde_json::json;
use tokio::runtime::{Builder, Runtime};

use crate::InitialiserWorld;

pub const SAMPLE_DOCUMENT: &str = r#"
root_organisation:
  municipality_code: 123
it_systems:
  AD: "Active Directory"
  SAP: "SAP"
facets:
  org_unit_address_type:
    PhoneUnit:
      title: "Telefon"
      scope: "PHONE"
    EmailUnit:
      title: "Email"
      scope: "EMAIL"
      it_system: "SAP"
  engagement_type:
    Ansat:
      title: "Ansat"
"#;

fn runtime() -> Runtime {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("create runtime")
}

impl InitialiserWorld {
    pub fn use_directory(&self, directory: InMemoryDirectory) {
        self.directory.set(Arc::new(directory));
    }

    pub fn use_document(&self, document: &str) {
        let config = parse_config(document).expect("document should parse");
        self.config.set(config);
    }

    pub fn directory(&self) -> Arc<InMemoryDirectory> {
        self.directory.get().expect("directory should be set")
    }

    fn config(&self) -> InitialisationConfig {
        self.config.get().expect("document should be set")
    }

    /// Run the initialiser, recording only the mutations of this run.
    pub fn run(&self) {
        let directory = self.directory();
        directory.clear_mutations();
        let config = self.config();
        let result = runtime().block_on(async {
            Initialiser::new(Arc::clone(&directory)).run(&config).await
        });
        self.last_result.set(result);
    }

    /// Reconcile the sample document once and forget its mutations.
    pub fn initialise_from_sample(&self) {
        self.use_document(SAMPLE_DOCUMENT);
        self.run();
        self.last_result
            .get()
            .expect("result should be set")
            .expect("initial run should succeed");
        self.directory().clear_mutations();
    }

    pub fn drift_scope(&self, facet_user_key: &str, class_user_key: &str, scope: &str) {
        let directory = self.directory();
        let facet = directory
            .facets()
            .into_iter()
            .find(|facet| facet.user_key == facet_user_key)
            .expect("facet should exist");
        let class = directory
            .class(facet_user_key, class_user_key)
            .expect("class should exist");
        runtime()
            .block_on(directory.execute(
                &UPDATE_CLASS,
                json!({
                    "uuid": class.uuid,
                    "facet_uuid": facet.uuid,
                    "user_key": class.user_key,
                    "name": class.name,
                    "scope": scope,
                    "it_system_uuid": class.it_system_uuid,
                }),
            ))
            .expect("drift should apply");
        directory.clear_mutations();
    }
}
