//! Test doubles shared by unit, integration and behaviour tests.
//!
//! [`InMemoryDirectory`] answers the reconcilers' GraphQL operations from an
//! in-memory model of OS2mo and records every mutation it receives.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::domain::ports::{GraphqlOperation, GraphqlSession, GraphqlSessionError};
use crate::domain::{
    CREATE_CLASS, CREATE_FACET, CREATE_IT_SYSTEM, Class, FACET_CLASSES_QUERY, FACETS_QUERY, Facet,
    IT_SYSTEMS_QUERY, ItSystem, ORG_UNCONFIGURED_CODE, ROOT_ORG_CREATE, ROOT_ORG_QUERY,
    RootOrganisation, UPDATE_CLASS, UPDATE_IT_SYSTEM,
};
use crate::outbound::keycloak::{AccessTokenProvider, TokenError};

/// One mutation received by [`InMemoryDirectory`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMutation {
    /// Operation name, e.g. `CreateClass`.
    pub operation: String,
    /// Variables exactly as sent.
    pub variables: Value,
}

#[derive(Debug, Default)]
struct DirectoryState {
    root_organisation: Option<RootOrganisation>,
    it_systems: Vec<ItSystem>,
    facets: Vec<Facet>,
    mutations: Vec<RecordedMutation>,
    failures: HashMap<String, GraphqlSessionError>,
}

/// In-memory OS2mo fake implementing [`GraphqlSession`].
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: Mutex<DirectoryState>,
}

impl InMemoryDirectory {
    /// An unconfigured OS2mo with no objects.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the root organisation.
    pub fn with_root_organisation(self, municipality_code: Option<i64>) -> Self {
        self.lock().root_organisation = Some(RootOrganisation {
            uuid: Uuid::new_v4(),
            municipality_code,
        });
        self
    }

    /// Seed an IT system and return its UUID.
    pub fn add_it_system(&self, user_key: &str, name: &str) -> Uuid {
        let uuid = Uuid::new_v4();
        self.lock().it_systems.push(ItSystem {
            uuid,
            user_key: user_key.to_owned(),
            name: name.to_owned(),
        });
        uuid
    }

    /// Seed an empty facet and return its UUID.
    pub fn add_facet(&self, user_key: &str) -> Uuid {
        let uuid = Uuid::new_v4();
        self.lock().facets.push(Facet {
            uuid,
            user_key: user_key.to_owned(),
            classes: Vec::new(),
        });
        uuid
    }

    /// Seed a class inside an existing facet. Returns `None` when the facet is
    /// unknown.
    pub fn add_class(
        &self,
        facet_user_key: &str,
        user_key: &str,
        name: &str,
        scope: Option<&str>,
        it_system_uuid: Option<Uuid>,
    ) -> Option<Uuid> {
        let uuid = Uuid::new_v4();
        let mut state = self.lock();
        let facet = state
            .facets
            .iter_mut()
            .find(|facet| facet.user_key == facet_user_key)?;
        facet.classes.push(Class {
            uuid,
            user_key: user_key.to_owned(),
            name: name.to_owned(),
            scope: scope.map(str::to_owned),
            it_system_uuid,
        });
        Some(uuid)
    }

    /// Make every call to `operation_name` fail with `error`.
    pub fn fail_on(&self, operation_name: &str, error: GraphqlSessionError) {
        self.lock().failures.insert(operation_name.to_owned(), error);
    }

    /// Mutations received so far, in call order.
    pub fn mutations(&self) -> Vec<RecordedMutation> {
        self.lock().mutations.clone()
    }

    /// Names of the mutations received so far, in call order.
    pub fn mutation_names(&self) -> Vec<String> {
        self.lock()
            .mutations
            .iter()
            .map(|mutation| mutation.operation.clone())
            .collect()
    }

    /// Forget recorded mutations, keeping the directory contents.
    pub fn clear_mutations(&self) {
        self.lock().mutations.clear();
    }

    /// Current root organisation.
    pub fn root_organisation(&self) -> Option<RootOrganisation> {
        self.lock().root_organisation.clone()
    }

    /// Current IT systems in creation order.
    pub fn it_systems(&self) -> Vec<ItSystem> {
        self.lock().it_systems.clone()
    }

    /// Current facets with their classes, in creation order.
    pub fn facets(&self) -> Vec<Facet> {
        self.lock().facets.clone()
    }

    /// Look up a class by facet and class user key.
    pub fn class(&self, facet_user_key: &str, user_key: &str) -> Option<Class> {
        self.lock()
            .facets
            .iter()
            .find(|facet| facet.user_key == facet_user_key)?
            .classes
            .iter()
            .find(|class| class.user_key == user_key)
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl GraphqlSession for InMemoryDirectory {
    async fn execute(
        &self,
        operation: &GraphqlOperation,
        variables: Value,
    ) -> Result<Value, GraphqlSessionError> {
        let mut state = self.lock();
        if let Some(error) = state.failures.get(operation.name) {
            return Err(error.clone());
        }
        if operation.document.trim_start().starts_with("mutation") {
            state.mutations.push(RecordedMutation {
                operation: operation.name.to_owned(),
                variables: variables.clone(),
            });
        }
        state.apply(operation, &variables)
    }
}

impl DirectoryState {
    fn apply(
        &mut self,
        operation: &GraphqlOperation,
        variables: &Value,
    ) -> Result<Value, GraphqlSessionError> {
        match operation.name {
            name if name == ROOT_ORG_QUERY.name => self.root_org_query(),
            name if name == ROOT_ORG_CREATE.name => self.root_org_create(variables),
            name if name == IT_SYSTEMS_QUERY.name => Ok(self.it_systems_query()),
            name if name == CREATE_IT_SYSTEM.name => self.create_it_system(variables),
            name if name == UPDATE_IT_SYSTEM.name => self.update_it_system(variables),
            name if name == FACETS_QUERY.name => Ok(self.facets_query()),
            name if name == CREATE_FACET.name => self.create_facet(variables),
            name if name == FACET_CLASSES_QUERY.name => Ok(self.facet_classes_query()),
            name if name == CREATE_CLASS.name => self.create_class(variables),
            name if name == UPDATE_CLASS.name => self.update_class(variables),
            other => Err(GraphqlSessionError::query(vec![format!(
                "unknown operation {other}"
            )])),
        }
    }

    fn root_org_query(&self) -> Result<Value, GraphqlSessionError> {
        let root = self
            .root_organisation
            .as_ref()
            .ok_or_else(|| GraphqlSessionError::query(vec![ORG_UNCONFIGURED_CODE.to_owned()]))?;
        Ok(json!({
            "org": {"uuid": root.uuid, "municipality_code": root.municipality_code}
        }))
    }

    fn root_org_create(&mut self, variables: &Value) -> Result<Value, GraphqlSessionError> {
        if self.root_organisation.is_some() {
            return Err(GraphqlSessionError::query(vec![
                "root organisation already exists".to_owned(),
            ]));
        }
        let municipality_code = variables.get("municipality_code").and_then(Value::as_i64);
        let uuid = Uuid::new_v4();
        self.root_organisation = Some(RootOrganisation {
            uuid,
            municipality_code,
        });
        Ok(json!({"org_create": {"uuid": uuid}}))
    }

    fn it_systems_query(&self) -> Value {
        let objects = self
            .it_systems
            .iter()
            .map(|it_system| {
                json!({"current": {
                    "uuid": it_system.uuid,
                    "user_key": it_system.user_key,
                    "name": it_system.name,
                }})
            })
            .collect::<Vec<_>>();
        json!({"itsystems": {"objects": objects}})
    }

    fn create_it_system(&mut self, variables: &Value) -> Result<Value, GraphqlSessionError> {
        let uuid = Uuid::new_v4();
        self.it_systems.push(ItSystem {
            uuid,
            user_key: string_variable(variables, "user_key")?,
            name: string_variable(variables, "name")?,
        });
        Ok(json!({"itsystem_create": {"uuid": uuid}}))
    }

    fn update_it_system(&mut self, variables: &Value) -> Result<Value, GraphqlSessionError> {
        let uuid = uuid_variable(variables, "uuid")?;
        let it_system = self
            .it_systems
            .iter_mut()
            .find(|it_system| it_system.uuid == uuid)
            .ok_or_else(|| not_found("IT system", uuid))?;
        it_system.user_key = string_variable(variables, "user_key")?;
        it_system.name = string_variable(variables, "name")?;
        Ok(json!({"itsystem_update": {"uuid": uuid}}))
    }

    fn facets_query(&self) -> Value {
        let objects = self
            .facets
            .iter()
            .map(|facet| json!({"current": {"user_key": facet.user_key}}))
            .collect::<Vec<_>>();
        json!({"facets": {"objects": objects}})
    }

    fn create_facet(&mut self, variables: &Value) -> Result<Value, GraphqlSessionError> {
        let uuid = Uuid::new_v4();
        self.facets.push(Facet {
            uuid,
            user_key: string_variable(variables, "user_key")?,
            classes: Vec::new(),
        });
        Ok(json!({"facet_create": {"uuid": uuid}}))
    }

    fn facet_classes_query(&self) -> Value {
        let objects = self
            .facets
            .iter()
            .map(|facet| {
                let classes = facet
                    .classes
                    .iter()
                    .map(|class| {
                        json!({
                            "uuid": class.uuid,
                            "user_key": class.user_key,
                            "name": class.name,
                            "scope": class.scope,
                            "it_system": class.it_system_uuid.map(|uuid| json!({"uuid": uuid})),
                        })
                    })
                    .collect::<Vec<_>>();
                json!({"current": {
                    "uuid": facet.uuid,
                    "user_key": facet.user_key,
                    "classes": classes,
                }})
            })
            .collect::<Vec<_>>();
        json!({"facets": {"objects": objects}})
    }

    fn create_class(&mut self, variables: &Value) -> Result<Value, GraphqlSessionError> {
        let facet_uuid = uuid_variable(variables, "facet_uuid")?;
        let class = Class {
            uuid: Uuid::new_v4(),
            user_key: string_variable(variables, "user_key")?,
            name: string_variable(variables, "name")?,
            scope: optional_string_variable(variables, "scope"),
            it_system_uuid: optional_uuid_variable(variables, "it_system_uuid")?,
        };
        let uuid = class.uuid;
        self.facets
            .iter_mut()
            .find(|facet| facet.uuid == facet_uuid)
            .ok_or_else(|| not_found("facet", facet_uuid))?
            .classes
            .push(class);
        Ok(json!({"class_create": {"uuid": uuid}}))
    }

    fn update_class(&mut self, variables: &Value) -> Result<Value, GraphqlSessionError> {
        let uuid = uuid_variable(variables, "uuid")?;
        let class = self
            .facets
            .iter_mut()
            .flat_map(|facet| facet.classes.iter_mut())
            .find(|class| class.uuid == uuid)
            .ok_or_else(|| not_found("class", uuid))?;
        class.user_key = string_variable(variables, "user_key")?;
        class.name = string_variable(variables, "name")?;
        class.scope = optional_string_variable(variables, "scope");
        class.it_system_uuid = optional_uuid_variable(variables, "it_system_uuid")?;
        Ok(json!({"class_update": {"uuid": uuid}}))
    }
}

fn string_variable(variables: &Value, name: &str) -> Result<String, GraphqlSessionError> {
    optional_string_variable(variables, name)
        .ok_or_else(|| GraphqlSessionError::query(vec![format!("missing variable ${name}")]))
}

fn optional_string_variable(variables: &Value, name: &str) -> Option<String> {
    variables.get(name).and_then(Value::as_str).map(str::to_owned)
}

fn uuid_variable(variables: &Value, name: &str) -> Result<Uuid, GraphqlSessionError> {
    optional_uuid_variable(variables, name)?
        .ok_or_else(|| GraphqlSessionError::query(vec![format!("missing variable ${name}")]))
}

fn optional_uuid_variable(variables: &Value, name: &str) -> Result<Option<Uuid>, GraphqlSessionError> {
    match variables.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|error| GraphqlSessionError::query(vec![format!("invalid ${name}: {error}")])),
    }
}

fn not_found(kind: &str, uuid: Uuid) -> GraphqlSessionError {
    GraphqlSessionError::query(vec![format!("{kind} {uuid} not found")])
}

/// Token provider handing out a fixed token and counting invalidations.
#[derive(Debug)]
pub struct StaticTokenProvider {
    token: String,
    invalidations: Mutex<usize>,
}

impl StaticTokenProvider {
    /// Provider that always returns `token`.
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_owned(),
            invalidations: Mutex::new(0),
        }
    }

    /// How often [`AccessTokenProvider::invalidate`] was called.
    pub fn invalidations(&self) -> usize {
        *self
            .invalidations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String, TokenError> {
        Ok(self.token.clone())
    }

    async fn invalidate(&self) {
        *self
            .invalidations
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += 1;
    }
}

/// Clock whose time only moves when told to.
#[derive(Debug)]
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// Clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move the clock forward.
    pub fn advance_seconds(&self, seconds: i64) {
        *self.lock_clock() += TimeDelta::seconds(seconds);
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

#[cfg(test)]
mod tests {
    //! Self-checks for the in-memory directory fake.

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn unconfigured_directory_reports_error_code() {
        let directory = InMemoryDirectory::new();

        let error = directory
            .execute(&ROOT_ORG_QUERY, json!({}))
            .await
            .expect_err("root org should be unconfigured");

        assert_eq!(
            error,
            GraphqlSessionError::query(vec![ORG_UNCONFIGURED_CODE.to_owned()])
        );
    }

    #[rstest]
    #[tokio::test]
    async fn records_only_mutations() {
        let directory = InMemoryDirectory::new();

        directory
            .execute(&FACETS_QUERY, json!({}))
            .await
            .expect("query should succeed");
        directory
            .execute(&CREATE_FACET, json!({"user_key": "visibility"}))
            .await
            .expect("mutation should succeed");

        assert_eq!(directory.mutation_names(), vec!["CreateFacet"]);
        assert_eq!(directory.facets()[0].user_key, "visibility");
    }

    #[rstest]
    #[tokio::test]
    async fn injected_failures_take_precedence() {
        let directory = InMemoryDirectory::new();
        directory.fail_on(FACETS_QUERY.name, GraphqlSessionError::timeout("slow"));

        let error = directory
            .execute(&FACETS_QUERY, json!({}))
            .await
            .expect_err("injected failure should surface");

        assert_eq!(error, GraphqlSessionError::timeout("slow"));
    }
}
