use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{Subcategory, SubcategoryId};

/// Query parameter carrying the selected category on the listing endpoint.
pub const CATEGORY_QUERY_PARAM: &str = "category_id";

/// Path of the subcategory listing endpoint for an admin `domain`,
/// e.g. `/admin/dds/api/subcategories/`.
pub fn subcategory_listing_path(domain: &str) -> String {
    format!("/admin/{}/api/subcategories/", domain.trim_matches('/'))
}

/// Opaque record identifier: a JSON number or string, rendered verbatim as
/// the option value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Integer(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<SubcategoryId> for RecordId {
    fn from(value: SubcategoryId) -> Self {
        Self::Integer(value.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One entry of the listing endpoint's JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcategoryRecord {
    pub id: RecordId,
    pub name: String,
}

impl From<&Subcategory> for SubcategoryRecord {
    fn from(value: &Subcategory) -> Self {
        Self {
            id: value.id.into(),
            name: value.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubcategoryQuery {
    #[serde(default)]
    pub category_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_path_tolerates_slashes_in_domain() {
        assert_eq!(subcategory_listing_path("dds"), "/admin/dds/api/subcategories/");
        assert_eq!(subcategory_listing_path("/dds/"), "/admin/dds/api/subcategories/");
    }

    #[test]
    fn record_ids_serialize_as_plain_numbers() {
        let record = SubcategoryRecord {
            id: SubcategoryId(3).into(),
            name: "Fuel".into(),
        };
        let json = serde_json::to_string(&record).expect("serialize");
        assert_eq!(json, r#"{"id":3,"name":"Fuel"}"#);
    }

    #[test]
    fn record_ids_accept_numbers_and_strings() {
        let records: Vec<SubcategoryRecord> =
            serde_json::from_str(r#"[{"id":7,"name":"A"},{"id":"a1","name":"B"}]"#)
                .expect("deserialize");
        assert_eq!(records[0].id, RecordId::Integer(7));
        assert_eq!(records[1].id, RecordId::from("a1"));
        assert_eq!(records[0].id.to_string(), "7");
        assert_eq!(records[1].id.to_string(), "a1");
    }
}
