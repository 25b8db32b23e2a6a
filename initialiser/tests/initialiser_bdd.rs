//! Behaviour-driven tests for end-to-end initialisation runs.

use std::sync::Arc;

use mo_init::domain::{InitialisationConfig, ReconcileError};
use mo_init::test_support::InMemoryDirectory;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::{ScenarioState, given, scenario, then, when};

#[path = "initialiser_bdd/world.rs"]
mod initialiser_world;

use initialiser_world::SAMPLE_DOCUMENT;

const DANGLING_DOCUMENT: &str = r#"
it_systems:
  SAP: "SAP"
facets:
  engagement_type:
    Ansat:
      title: "Ansat"
  org_unit_address_type:
    EmailUnit:
      title: "Email"
      scope: "EMAIL"
      it_system: "SAP2"
"#;

#[derive(Default, ScenarioState)]
struct InitialiserWorld {
    directory: Slot<Arc<InMemoryDirectory>>,
    config: Slot<InitialisationConfig>,
    last_result: Slot<Result<(), ReconcileError>>,
}

impl InitialiserWorld {
    fn result(&self) -> Result<(), ReconcileError> {
        self.last_result.get().expect("result should be set")
    }
}

#[fixture]
fn world() -> InitialiserWorld {
    InitialiserWorld::default()
}

#[given("an unconfigured OS2mo")]
fn an_unconfigured_os2mo(world: &InitialiserWorld) {
    world.use_directory(InMemoryDirectory::new());
}

#[given("an OS2mo whose root organisation has municipality code {code}")]
fn an_os2mo_whose_root_organisation_has_municipality_code(world: &InitialiserWorld, code: i64) {
    world.use_directory(InMemoryDirectory::new().with_root_organisation(Some(code)));
}

#[given("an OS2mo initialised from the sample document")]
fn an_os2mo_initialised_from_the_sample_document(world: &InitialiserWorld) {
    world.use_directory(InMemoryDirectory::new());
    world.initialise_from_sample();
}

#[given("the sample initialisation document")]
fn the_sample_initialisation_document(world: &InitialiserWorld) {
    world.use_document(SAMPLE_DOCUMENT);
}

#[given("a document whose class references IT system SAP2")]
fn a_document_whose_class_references_it_system_sap2(world: &InitialiserWorld) {
    world.use_document(DANGLING_DOCUMENT);
}

#[given("class {class_key} in facet {facet_key} has drifted to scope {scope}")]
fn class_has_drifted_to_scope(
    world: &InitialiserWorld,
    class_key: String,
    facet_key: String,
    scope: String,
) {
    world.drift_scope(&facet_key, &class_key, &scope);
}

#[when("the initialiser runs")]
fn the_initialiser_runs(world: &InitialiserWorld) {
    world.run();
}

#[when("the initialiser runs again")]
fn the_initialiser_runs_again(world: &InitialiserWorld) {
    world.run();
}

#[then("the run succeeds")]
fn the_run_succeeds(world: &InitialiserWorld) {
    world.result().expect("run should succeed");
}

#[then("the root organisation has municipality code {code}")]
fn the_root_organisation_has_municipality_code(world: &InitialiserWorld, code: i64) {
    let root = world
        .directory()
        .root_organisation()
        .expect("root organisation should exist");
    assert_eq!(root.municipality_code, Some(code));
}

#[then("the mutations were {names}")]
fn the_mutations_were(world: &InitialiserWorld, names: String) {
    let expected = names.split(',').map(str::trim).collect::<Vec<_>>();
    assert_eq!(world.directory().mutation_names(), expected);
}

#[then("no mutations were issued")]
fn no_mutations_were_issued(world: &InitialiserWorld) {
    assert!(
        world.directory().mutations().is_empty(),
        "expected no mutations, got {:?}",
        world.directory().mutation_names()
    );
}

#[then("no class mutations were issued")]
fn no_class_mutations_were_issued(world: &InitialiserWorld) {
    let names = world.directory().mutation_names();
    assert!(
        names.iter().all(|name| !name.ends_with("Class")),
        "expected no class mutations, got {names:?}"
    );
}

#[then("class {class_key} in facet {facet_key} has scope {scope}")]
fn class_has_scope(world: &InitialiserWorld, class_key: String, facet_key: String, scope: String) {
    let class = world
        .directory()
        .class(&facet_key, &class_key)
        .expect("class should exist");
    assert_eq!(class.scope.as_deref(), Some(scope.as_str()));
}

#[then("class {class_key} in facet {facet_key} links IT system {it_system_key}")]
fn class_links_it_system(
    world: &InitialiserWorld,
    class_key: String,
    facet_key: String,
    it_system_key: String,
) {
    let directory = world.directory();
    let it_system = directory
        .it_systems()
        .into_iter()
        .find(|it_system| it_system.user_key == it_system_key)
        .expect("IT system should exist");
    let class = directory
        .class(&facet_key, &class_key)
        .expect("class should exist");
    assert_eq!(class.it_system_uuid, Some(it_system.uuid));
}

#[then("the run fails with a dangling reference to {it_system_key}")]
fn the_run_fails_with_a_dangling_reference(world: &InitialiserWorld, it_system_key: String) {
    let error = world.result().expect_err("run should fail");
    assert!(
        matches!(
            &error,
            ReconcileError::DanglingReference { it_system_user_key, .. }
                if *it_system_user_key == it_system_key
        ),
        "unexpected error: {error:?}"
    );
}

#[then("the run fails with a configuration conflict")]
fn the_run_fails_with_a_configuration_conflict(world: &InitialiserWorld) {
    let error = world.result().expect_err("run should fail");
    assert_eq!(
        error,
        ReconcileError::ConfigurationConflict {
            existing: Some(100),
            desired: Some(123),
        }
    );
}

#[scenario(
    path = "tests/features/initialiser.feature",
    name = "An unconfigured OS2mo is initialised in dependency order"
)]
fn an_unconfigured_os2mo_is_initialised_in_dependency_order(world: InitialiserWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/initialiser.feature",
    name = "A second run with the same document changes nothing"
)]
fn a_second_run_with_the_same_document_changes_nothing(world: InitialiserWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/initialiser.feature",
    name = "Drifted class scope is repaired in place"
)]
fn drifted_class_scope_is_repaired_in_place(world: InitialiserWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/initialiser.feature",
    name = "A class referencing an unknown IT system mutates no classes"
)]
fn a_class_referencing_an_unknown_it_system_mutates_no_classes(world: InitialiserWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/initialiser.feature",
    name = "Changing the municipality code is refused"
)]
fn changing_the_municipality_code_is_refused(world: InitialiserWorld) {
    drop(world);
}
