//! Category/subcategory catalog backing the subcategory listing endpoint.

use std::{collections::HashSet, fs, path::Path};

use anyhow::Context;
use serde::Deserialize;
use shared::{
    domain::{Category, CategoryId, Subcategory, SubcategoryId},
    error::ApiException,
    protocol::SubcategoryRecord,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("{kind} name must not be empty (id {id})")]
    EmptyName { kind: &'static str, id: i64 },
    #[error("duplicate category id {id}")]
    DuplicateCategoryId { id: CategoryId },
    #[error("duplicate category name '{name}'")]
    DuplicateCategoryName { name: String },
    #[error("duplicate subcategory id {id}")]
    DuplicateSubcategoryId { id: SubcategoryId },
    #[error("subcategory '{name}' is listed twice under category {category_id}")]
    DuplicateSubcategoryName {
        name: String,
        category_id: CategoryId,
    },
    #[error("subcategory {id} references unknown category {category_id}")]
    UnknownCategory {
        id: SubcategoryId,
        category_id: CategoryId,
    },
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    categories: Vec<CategoryEntry>,
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    id: i64,
    name: String,
    #[serde(default)]
    subcategories: Vec<SubcategoryEntry>,
}

#[derive(Debug, Deserialize)]
struct SubcategoryEntry {
    id: i64,
    name: String,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    categories: Vec<Category>,
    subcategories: Vec<Subcategory>,
}

impl Catalog {
    pub fn new(
        categories: Vec<Category>,
        subcategories: Vec<Subcategory>,
    ) -> Result<Self, CatalogError> {
        let mut category_ids = HashSet::new();
        let mut category_names = HashSet::new();
        for category in &categories {
            if category.name.trim().is_empty() {
                return Err(CatalogError::EmptyName {
                    kind: "category",
                    id: category.id.0,
                });
            }
            if !category_ids.insert(category.id) {
                return Err(CatalogError::DuplicateCategoryId { id: category.id });
            }
            if !category_names.insert(category.name.as_str()) {
                return Err(CatalogError::DuplicateCategoryName {
                    name: category.name.clone(),
                });
            }
        }

        let mut subcategory_ids = HashSet::new();
        let mut scoped_names = HashSet::new();
        for subcategory in &subcategories {
            if subcategory.name.trim().is_empty() {
                return Err(CatalogError::EmptyName {
                    kind: "subcategory",
                    id: subcategory.id.0,
                });
            }
            if !category_ids.contains(&subcategory.category_id) {
                return Err(CatalogError::UnknownCategory {
                    id: subcategory.id,
                    category_id: subcategory.category_id,
                });
            }
            if !subcategory_ids.insert(subcategory.id) {
                return Err(CatalogError::DuplicateSubcategoryId { id: subcategory.id });
            }
            if !scoped_names.insert((subcategory.category_id, subcategory.name.as_str())) {
                return Err(CatalogError::DuplicateSubcategoryName {
                    name: subcategory.name.clone(),
                    category_id: subcategory.category_id,
                });
            }
        }

        Ok(Self {
            categories,
            subcategories,
        })
    }

    /// Parses the nested TOML layout:
    ///
    /// ```toml
    /// [[categories]]
    /// id = 1
    /// name = "Infrastructure"
    /// subcategories = [{ id = 10, name = "VPS" }]
    /// ```
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let file: CatalogFile = toml::from_str(raw).context("failed to parse catalog TOML")?;

        let mut categories = Vec::with_capacity(file.categories.len());
        let mut subcategories = Vec::new();
        for entry in file.categories {
            let category_id = CategoryId(entry.id);
            categories.push(Category {
                id: category_id,
                name: entry.name,
            });
            subcategories.extend(entry.subcategories.into_iter().map(|sub| Subcategory {
                id: SubcategoryId(sub.id),
                name: sub.name,
                category_id,
            }));
        }

        Ok(Self::new(categories, subcategories)?)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog file '{}'", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("invalid catalog file '{}'", path.display()))
    }

    /// Small built-in catalog for local development.
    pub fn sample() -> Self {
        let category = |id, name: &str| Category {
            id: CategoryId(id),
            name: name.to_string(),
        };
        let subcategory = |id, name: &str, category_id| Subcategory {
            id: SubcategoryId(id),
            name: name.to_string(),
            category_id: CategoryId(category_id),
        };

        Self {
            categories: vec![category(1, "Infrastructure"), category(2, "Marketing")],
            subcategories: vec![
                subcategory(1, "VPS", 1),
                subcategory(2, "Proxy", 1),
                subcategory(3, "Farpost", 2),
                subcategory(4, "Avito", 2),
            ],
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Subcategories of `category_id` in catalog order. Unknown categories
    /// yield an empty list.
    pub fn subcategories_for(&self, category_id: CategoryId) -> Vec<SubcategoryRecord> {
        self.subcategories
            .iter()
            .filter(|sub| sub.category_id == category_id)
            .map(SubcategoryRecord::from)
            .collect()
    }

    /// Answers a raw `category_id` query value the way the listing endpoint
    /// does: a missing or blank value lists nothing, a non-numeric value is a
    /// validation error.
    pub fn list_subcategories(
        &self,
        raw_category_id: Option<&str>,
    ) -> Result<Vec<SubcategoryRecord>, ApiException> {
        let Some(raw) = raw_category_id.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Ok(Vec::new());
        };

        let category_id = raw.parse::<i64>().map(CategoryId).map_err(|_| {
            ApiException::validation(format!("category_id must be an integer, got '{raw}'"))
        })?;
        let records = self.subcategories_for(category_id);
        debug!(%category_id, count = records.len(), "listed subcategories");
        Ok(records)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
