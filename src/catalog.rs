//! Case catalog
//!
//! Cases and their item pools are content, not code: they live in a versioned
//! TOML file. The bundled `data/catalog.toml` is compiled in and used unless
//! `catalog.path` points somewhere else.

use crate::{
    errors::{CaseboxResult, ConfigurationError},
    games::types::Case,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path};

const BUNDLED_CATALOG: &str = include_str!("../data/catalog.toml");

/// Highest catalog format this build understands
pub const CATALOG_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub version: u32,
    pub cases: Vec<Case>,
}

impl Catalog {
    pub fn bundled() -> CaseboxResult<Self> {
        Self::parse(BUNDLED_CATALOG)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> CaseboxResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to read catalog {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Bundled catalog, or the file at `path` when given
    pub fn from_config(path: Option<&str>) -> CaseboxResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::bundled(),
        }
    }

    pub fn parse(content: &str) -> CaseboxResult<Self> {
        let catalog: Catalog = toml::from_str(content).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to parse catalog: {}", e))
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> CaseboxResult<()> {
        if self.version == 0 || self.version > CATALOG_FORMAT_VERSION {
            return Err(invalid("version", self.version.to_string(), "unsupported catalog version"));
        }

        let mut seen = HashSet::new();
        for case in &self.cases {
            if !seen.insert(case.id.as_str()) {
                return Err(invalid("cases.id", case.id.clone(), "duplicate case id"));
            }
            if case.price <= 0 {
                return Err(invalid("cases.price", case.price.to_string(), "case price must be positive"));
            }
            if case.items.is_empty() {
                return Err(invalid("cases.items", case.id.clone(), "case has no items"));
            }
            if let Some(item) = case.items.iter().find(|item| item.price < 0) {
                return Err(invalid("cases.items.price", item.name.clone(), "item price cannot be negative"));
            }
        }

        Ok(())
    }

    pub fn get(&self, case_id: &str) -> Option<&Case> {
        self.cases.iter().find(|case| case.id == case_id)
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }
}

fn invalid(field: &str, value: String, reason: &str) -> crate::errors::CaseboxError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    }
    .into()
}
