//! Desired directory state, as parsed from the initialisation document.
//!
//! Every collection is a `Vec` in document order. Reconcilers iterate in that
//! order so mutation order is reproducible.

/// The full desired state. Each section is optional; a missing section skips
/// the matching reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitialisationConfig {
    /// Root organisation settings.
    pub root_organisation: Option<DesiredRootOrganisation>,
    /// Facets and the classes they should contain.
    pub facets: Option<Vec<DesiredFacet>>,
    /// IT systems keyed by user key.
    pub it_systems: Option<Vec<DesiredItSystem>>,
}

/// Desired root organisation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredRootOrganisation {
    /// Municipality code; `None` creates the organisation without one.
    pub municipality_code: Option<i64>,
}

/// Desired facet and its classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredFacet {
    /// Facet user key.
    pub user_key: String,
    /// Classes in document order.
    pub classes: Vec<DesiredClass>,
}

/// Desired class within a facet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredClass {
    /// Class user key, unique within the facet.
    pub user_key: String,
    /// Title, stored remotely as the class name.
    pub title: String,
    /// Optional scope tag.
    pub scope: Option<String>,
    /// User key of a linked IT system.
    pub it_system: Option<String>,
}

/// Desired IT system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredItSystem {
    /// IT system user key.
    pub user_key: String,
    /// Display name.
    pub name: String,
}

impl InitialisationConfig {
    /// User keys of every configured facet, in document order.
    pub fn facet_user_keys(&self) -> Vec<String> {
        self.facets
            .iter()
            .flatten()
            .map(|facet| facet.user_key.clone())
            .collect()
    }
}
