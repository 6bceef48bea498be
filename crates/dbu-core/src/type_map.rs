//! Generic column type mapping.
//!
//! Task declarations name column types with portable tokens such as `STRING`
//! or `LONG`. A [`TypeMap`] translates a token into the SQL type name for the
//! connected vendor and into the [`ValueKind`] used to bind literal values.
//! The built-in table is embedded from `type_map.yml`; an operator may supply
//! a replacement file of the same shape.

use crate::error::{CoreError, CoreResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const BUILTIN_TYPE_MAP: &str = include_str!("type_map.yml");

/// How values of a generic type are bound as statement parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Double,
    Decimal,
    Text,
    Timestamp,
    Binary,
}

/// One generic type token and its vendor-specific SQL types.
#[derive(Debug, Clone, Deserialize)]
pub struct TypeMapping {
    /// Portable type token (matched case-insensitively)
    pub generic: String,

    /// Parameter binding class
    pub kind: ValueKind,

    /// SQL type used when the vendor has no explicit entry
    #[serde(default)]
    pub default: Option<String>,

    /// Vendor name (case-insensitive) to SQL type
    #[serde(default)]
    pub vendors: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct TypeMapFile {
    types: Vec<TypeMapping>,
}

/// Lookup table from generic type tokens to vendor SQL types.
#[derive(Debug, Clone)]
pub struct TypeMap {
    mappings: HashMap<String, TypeMapping>,
}

impl TypeMap {
    /// The built-in mapping shipped with dbupgrade.
    pub fn builtin() -> CoreResult<Self> {
        Self::from_yaml_str(BUILTIN_TYPE_MAP)
    }

    /// Load a mapping file, replacing the built-in table entirely.
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let map = Self::from_yaml_str(&content)?;
        log::debug!(
            "Loaded {} generic type mappings from {}",
            map.len(),
            path.display()
        );
        Ok(map)
    }

    /// Load the override file when given, otherwise the built-in table.
    pub fn load_or_builtin(path: Option<&Path>) -> CoreResult<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Self::builtin(),
        }
    }

    /// Parse a mapping document.
    pub fn from_yaml_str(yaml: &str) -> CoreResult<Self> {
        let file: TypeMapFile = serde_yaml::from_str(yaml)?;
        let mut mappings = HashMap::with_capacity(file.types.len());
        for mut mapping in file.types {
            let key = mapping.generic.trim().to_ascii_uppercase();
            if key.is_empty() {
                return Err(CoreError::ConfigInvalid {
                    message: "type map entry has an empty generic type".to_string(),
                });
            }
            mapping.vendors = mapping
                .vendors
                .into_iter()
                .map(|(vendor, sql)| (vendor.to_ascii_lowercase(), sql))
                .collect();
            if mappings.insert(key.clone(), mapping).is_some() {
                return Err(CoreError::ConfigInvalid {
                    message: format!("generic type '{key}' is mapped more than once"),
                });
            }
        }
        Ok(Self { mappings })
    }

    /// Number of generic types known to this map.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Whether `generic` is a known token.
    pub fn contains(&self, generic: &str) -> bool {
        self.mappings.contains_key(&generic.trim().to_ascii_uppercase())
    }

    fn mapping(&self, generic: &str) -> CoreResult<&TypeMapping> {
        self.mappings
            .get(&generic.trim().to_ascii_uppercase())
            .ok_or_else(|| CoreError::UnknownGenericType {
                generic: generic.to_string(),
            })
    }

    /// SQL type name for `generic` on `vendor`.
    pub fn sql_type(&self, generic: &str, vendor: &str) -> CoreResult<&str> {
        let mapping = self.mapping(generic)?;
        mapping
            .vendors
            .get(&vendor.to_ascii_lowercase())
            .or(mapping.default.as_ref())
            .map(String::as_str)
            .ok_or_else(|| CoreError::UnmappedVendorType {
                generic: generic.to_string(),
                vendor: vendor.to_string(),
            })
    }

    /// Binding class for `generic`.
    pub fn value_kind(&self, generic: &str) -> CoreResult<ValueKind> {
        Ok(self.mapping(generic)?.kind)
    }
}

#[cfg(test)]
#[path = "type_map_test.rs"]
mod tests;
