//! Reconciliation domain.
//!
//! Purpose: compare the desired directory state against what OS2mo holds and
//! issue the minimal set of GraphQL mutations to close the gap. All remote
//! access goes through the [`ports::GraphqlSession`] port.
//!
//! Public surface:
//! - [`Initialiser`]: runs every reconciler in dependency order.
//! - `ensure_*` functions: one reconciler per object kind.
//! - [`ReconcileError`] and [`classify_session_error`]: failure reporting.

pub mod ports;

mod classes;
mod desired_state;
mod error;
mod facets;
mod initialiser;
mod it_systems;
mod model;
mod response;
mod root_org;

pub use self::classes::{
    CREATE_CLASS, FACET_CLASSES_QUERY, UPDATE_CLASS, ensure_classes, get_classes,
};
pub use self::desired_state::{
    DesiredClass, DesiredFacet, DesiredItSystem, DesiredRootOrganisation, InitialisationConfig,
};
pub use self::error::{
    ORG_UNCONFIGURED_CODE, ReconcileError, SessionErrorKind, classify_session_error,
};
pub use self::facets::{CREATE_FACET, FACETS_QUERY, ensure_facets, get_facets};
pub use self::initialiser::Initialiser;
pub use self::it_systems::{
    CREATE_IT_SYSTEM, IT_SYSTEMS_QUERY, UPDATE_IT_SYSTEM, ensure_it_systems, get_it_systems,
};
pub use self::model::{Class, Facet, ItSystem, RootOrganisation};
pub use self::root_org::{ROOT_ORG_CREATE, ROOT_ORG_QUERY, ensure_root_organisation, get_root_org};
