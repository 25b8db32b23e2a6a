//! Desired-state document loader.
//!
//! The document is YAML:
//!
//! ```yaml
//! root_organisation:
//!   municipality_code: 123
//! facets:
//!   org_unit_address_type:
//!     PhoneUnit:
//!       title: "Telefon"
//!       scope: "PHONE"
//! it_systems:
//!   AD: "Active Directory"
//! ```
//!
//! Mapping order is kept because it decides creation order. Duplicate keys are
//! rejected rather than silently collapsed.

use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use cap_std::{ambient_authority, fs::Dir};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, de};
use thiserror::Error;

use crate::domain::{
    DesiredClass, DesiredFacet, DesiredItSystem, DesiredRootOrganisation, InitialisationConfig,
};

/// Errors raised while loading the desired-state document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigFileError {
    /// The file could not be opened or read.
    #[error("failed to read {path}: {message}")]
    Read {
        /// Path as given.
        path: String,
        /// Underlying I/O error.
        message: String,
    },
    /// The YAML is malformed or has the wrong shape.
    #[error("invalid initialisation document: {message}")]
    Parse {
        /// Parser message, including the location when known.
        message: String,
    },
}

/// Read and parse the document at `path`.
///
/// # Errors
///
/// Returns [`ConfigFileError::Read`] when the file cannot be read and
/// [`ConfigFileError::Parse`] when its contents are invalid.
pub fn load_config(path: &Path) -> Result<InitialisationConfig, ConfigFileError> {
    let read_error = |message: String| ConfigFileError::Read {
        path: path.display().to_string(),
        message,
    };
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| read_error("path does not name a file".to_owned()))?;
    let directory = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|error| read_error(error.to_string()))?;
    let contents = directory
        .read_to_string(file_name)
        .map_err(|error| read_error(error.to_string()))?;
    parse_config(&contents)
}

/// Parse a desired-state document.
///
/// An empty document is valid and yields a configuration with every section
/// absent.
///
/// # Errors
///
/// Returns [`ConfigFileError::Parse`] for malformed YAML, unexpected value
/// types and duplicate mapping keys.
///
/// # Examples
/// ```
/// use mo_init::inbound::parse_config;
///
/// let config = parse_config("it_systems:\n  AD: Active Directory\n").unwrap();
/// let it_systems = config.it_systems.unwrap();
/// assert_eq!(it_systems[0].user_key, "AD");
/// assert!(config.facets.is_none());
/// ```
pub fn parse_config(contents: &str) -> Result<InitialisationConfig, ConfigFileError> {
    if contents.trim().is_empty() {
        return Ok(InitialisationConfig::default());
    }
    let document: Option<DocumentDto> =
        serde_yaml::from_str(contents).map_err(|error| ConfigFileError::Parse {
            message: error.to_string(),
        })?;
    Ok(document.map(InitialisationConfig::from).unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct DocumentDto {
    #[serde(default)]
    root_organisation: Option<RootOrganisationDto>,
    #[serde(default)]
    facets: Option<OrderedMap<Option<OrderedMap<ClassDto>>>>,
    #[serde(default)]
    it_systems: Option<OrderedMap<String>>,
}

/// `name` and `user_key` are still accepted for older documents but ignored.
#[derive(Debug, Deserialize)]
struct RootOrganisationDto {
    #[serde(default)]
    municipality_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ClassDto {
    title: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    it_system: Option<String>,
}

impl From<DocumentDto> for InitialisationConfig {
    fn from(document: DocumentDto) -> Self {
        Self {
            root_organisation: document.root_organisation.map(|root| DesiredRootOrganisation {
                municipality_code: root.municipality_code,
            }),
            facets: document.facets.map(|facets| {
                facets
                    .0
                    .into_iter()
                    .map(|(user_key, classes)| DesiredFacet {
                        user_key,
                        classes: classes
                            .map(|classes| classes.0)
                            .unwrap_or_default()
                            .into_iter()
                            .map(|(user_key, class)| DesiredClass {
                                user_key,
                                title: class.title,
                                scope: class.scope,
                                it_system: class.it_system,
                            })
                            .collect(),
                    })
                    .collect()
            }),
            it_systems: document.it_systems.map(|it_systems| {
                it_systems
                    .0
                    .into_iter()
                    .map(|(user_key, name)| DesiredItSystem { user_key, name })
                    .collect()
            }),
        }
    }
}

/// A string-keyed mapping that keeps document order and rejects duplicates.
#[derive(Debug)]
struct OrderedMap<V>(Vec<(String, V)>);

impl<'de, V> Deserialize<'de> for OrderedMap<V>
where
    V: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V> Visitor<'de> for OrderedMapVisitor<V>
where
    V: Deserialize<'de>,
{
    type Value = OrderedMap<V>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a mapping with string keys")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries: Vec<(String, V)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(key) = access.next_key::<String>()? {
            if entries.iter().any(|(existing, _)| *existing == key) {
                return Err(de::Error::custom(format!("duplicate key `{key}`")));
            }
            let value = access.next_value()?;
            entries.push((key, value));
        }
        Ok(OrderedMap(entries))
    }
}
