//! Field mapping from source documents to target rows
//!
//! The mapping is reviewed and versioned as `config/mapping.yml`; the
//! built-in default is identical to that file.
//!
//! Example format:
//! ```yaml
//! promoted:
//!   identifier: _id
//!   reference: categoryId
//!   flag: isActive
//!   discriminator: _class
//! dropped: []
//! record_types:
//!   TypeA: TYPE_A
//! on_unknown_discriminator: fail
//! ```

use eyre::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::LazyLock;

static RECORD_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("valid record type pattern"));

/// Source field names promoted to typed target columns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PromotedFields {
    /// Source field that becomes `id`
    pub identifier: String,
    /// Source field that becomes `category_id`
    pub reference: String,
    /// Source field that becomes `is_active`
    pub flag: String,
    /// Source field resolved through `record_types` into `record_type`
    pub discriminator: String,
}

impl PromotedFields {
    pub fn names(&self) -> [&str; 4] {
        [
            self.identifier.as_str(),
            self.reference.as_str(),
            self.flag.as_str(),
            self.discriminator.as_str(),
        ]
    }
}

impl Default for PromotedFields {
    fn default() -> Self {
        Self {
            identifier: "_id".to_string(),
            reference: "categoryId".to_string(),
            flag: "isActive".to_string(),
            discriminator: "_class".to_string(),
        }
    }
}

/// What to do with a record whose discriminator has no mapping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownDiscriminatorPolicy {
    /// Abort the whole transform run
    #[default]
    Fail,
    /// Set the record aside in the quarantine file and continue
    Quarantine,
}

impl std::fmt::Display for UnknownDiscriminatorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fail => write!(f, "fail"),
            Self::Quarantine => write!(f, "quarantine"),
        }
    }
}

/// Complete source-to-target mapping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FieldMapping {
    /// Allow-list: fields promoted to columns
    pub promoted: PromotedFields,
    /// Deny-list: fields discarded entirely
    #[serde(default)]
    pub dropped: Vec<String>,
    /// Discriminator value -> record type
    pub record_types: BTreeMap<String, String>,
    #[serde(default)]
    pub on_unknown_discriminator: UnknownDiscriminatorPolicy,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            promoted: PromotedFields::default(),
            dropped: Vec::new(),
            record_types: BTreeMap::from([
                ("TypeA".to_string(), "TYPE_A".to_string()),
                ("TypeB".to_string(), "TYPE_B".to_string()),
            ]),
            on_unknown_discriminator: UnknownDiscriminatorPolicy::default(),
        }
    }
}

impl FieldMapping {
    /// Parse and validate a mapping from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mapping: Self =
            serde_yaml::from_str(content).with_context(|| "Failed to parse field mapping YAML")?;
        mapping.validate()?;
        Ok(mapping)
    }

    /// Read and validate a mapping file
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read field mapping: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid field mapping: {}", path.display()))
    }

    /// Override the unknown discriminator policy
    pub fn with_policy(mut self, policy: UnknownDiscriminatorPolicy) -> Self {
        self.on_unknown_discriminator = policy;
        self
    }

    /// Check the mapping is internally consistent
    ///
    /// # Errors
    /// - a promoted field name is blank or used twice
    /// - a field is both promoted and dropped
    /// - `record_types` is empty or has a member that is not SCREAMING_SNAKE_CASE
    pub fn validate(&self) -> Result<()> {
        let mut promoted = BTreeSet::new();
        for name in self.promoted.names() {
            if name.trim().is_empty() {
                eyre::bail!("Promoted field names must not be blank");
            }
            if !promoted.insert(name) {
                eyre::bail!("Field '{}' is promoted more than once", name);
            }
        }

        for name in &self.dropped {
            if promoted.contains(name.as_str()) {
                eyre::bail!("Field '{}' is both promoted and dropped", name);
            }
        }

        if self.record_types.is_empty() {
            eyre::bail!("record_types must map at least one discriminator value");
        }

        for (discriminator, record_type) in &self.record_types {
            if !RECORD_TYPE.is_match(record_type) {
                eyre::bail!(
                    "Record type '{}' for discriminator '{}' must be SCREAMING_SNAKE_CASE",
                    record_type,
                    discriminator
                );
            }
        }

        Ok(())
    }

    /// Resolve a discriminator value to its record type
    pub fn record_type(&self, discriminator: &str) -> Option<&str> {
        self.record_types.get(discriminator).map(String::as_str)
    }

    /// True when a source field belongs in the catch-all payload
    pub fn is_passthrough(&self, field: &str) -> bool {
        !self.promoted.names().contains(&field) && !self.dropped.iter().any(|d| d == field)
    }
}
