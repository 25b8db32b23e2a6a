//! Directory objects as seen by the reconcilers.
//!
//! These are read models of what OS2mo currently holds. UUIDs are always
//! assigned by OS2mo; nothing in this crate generates one.

use uuid::Uuid;

/// The singleton top-level organisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootOrganisation {
    /// Remote-assigned identifier.
    pub uuid: Uuid,
    /// Municipality code, fixed once the organisation exists.
    pub municipality_code: Option<i64>,
}

/// A registered IT system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItSystem {
    /// Remote-assigned identifier.
    pub uuid: Uuid,
    /// Reconciliation identity.
    pub user_key: String,
    /// Display name.
    pub name: String,
}

/// A class as stored inside its facet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    /// Remote-assigned identifier.
    pub uuid: Uuid,
    /// Identity within the owning facet.
    pub user_key: String,
    /// Display name (the configured title).
    pub name: String,
    /// Optional scope tag such as `TEXT` or `PHONE`.
    pub scope: Option<String>,
    /// UUID of the linked IT system, if any.
    pub it_system_uuid: Option<Uuid>,
}

/// A facet together with the classes it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facet {
    /// Remote-assigned identifier.
    pub uuid: Uuid,
    /// Reconciliation identity.
    pub user_key: String,
    /// Classes belonging to this facet.
    pub classes: Vec<Class>,
}
