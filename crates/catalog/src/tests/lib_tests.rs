use super::*;
use shared::error::ErrorCode;

const CATALOG_TOML: &str = r#"
[[categories]]
id = 1
name = "Infrastructure"
subcategories = [{ id = 10, name = "VPS" }, { id = 11, name = "Proxy" }]

[[categories]]
id = 2
name = "Marketing"
subcategories = [{ id = 20, name = "Avito" }]

[[categories]]
id = 3
name = "Taxes"
"#;

fn names(records: &[SubcategoryRecord]) -> Vec<&str> {
    records.iter().map(|r| r.name.as_str()).collect()
}

#[test]
fn parses_nested_toml_layout() {
    let catalog = Catalog::from_toml_str(CATALOG_TOML).expect("catalog");
    assert_eq!(catalog.categories().len(), 3);
    assert_eq!(
        names(&catalog.subcategories_for(CategoryId(1))),
        vec!["VPS", "Proxy"]
    );
    assert!(catalog.subcategories_for(CategoryId(3)).is_empty());
}

#[test]
fn blank_or_missing_category_lists_nothing() {
    let catalog = Catalog::sample();
    assert!(catalog.list_subcategories(None).expect("none").is_empty());
    assert!(catalog.list_subcategories(Some("")).expect("empty").is_empty());
    assert!(catalog.list_subcategories(Some("  ")).expect("blank").is_empty());
}

#[test]
fn unknown_category_lists_nothing() {
    let catalog = Catalog::sample();
    assert!(catalog
        .list_subcategories(Some("404"))
        .expect("unknown")
        .is_empty());
}

#[test]
fn non_numeric_category_is_a_validation_error() {
    let err = Catalog::sample()
        .list_subcategories(Some("abc"))
        .expect_err("must reject");
    assert_eq!(err.code, ErrorCode::Validation);
    assert!(err.message.contains("abc"));
}

#[test]
fn listing_preserves_catalog_order() {
    let records = Catalog::sample()
        .list_subcategories(Some("2"))
        .expect("list");
    assert_eq!(
        records,
        vec![
            SubcategoryRecord {
                id: SubcategoryId(3).into(),
                name: "Farpost".into()
            },
            SubcategoryRecord {
                id: SubcategoryId(4).into(),
                name: "Avito".into()
            },
        ]
    );
}

#[test]
fn rejects_duplicate_category_names() {
    let err = Catalog::new(
        vec![
            Category {
                id: CategoryId(1),
                name: "Ops".into(),
            },
            Category {
                id: CategoryId(2),
                name: "Ops".into(),
            },
        ],
        Vec::new(),
    )
    .expect_err("duplicate");
    assert_eq!(
        err,
        CatalogError::DuplicateCategoryName { name: "Ops".into() }
    );
}

#[test]
fn same_subcategory_name_is_allowed_under_different_categories() {
    let raw = r#"
[[categories]]
id = 1
name = "A"
subcategories = [{ id = 1, name = "Other" }]

[[categories]]
id = 2
name = "B"
subcategories = [{ id = 2, name = "Other" }]
"#;
    Catalog::from_toml_str(raw).expect("scoped names");
}

#[test]
fn rejects_duplicate_subcategory_name_within_category() {
    let raw = r#"
[[categories]]
id = 1
name = "A"
subcategories = [{ id = 1, name = "Other" }, { id = 2, name = "Other" }]
"#;
    let err = Catalog::from_toml_str(raw).expect_err("duplicate");
    assert!(format!("{err:#}").contains("listed twice"));
}

#[test]
fn rejects_subcategory_with_unknown_category() {
    let err = Catalog::new(
        vec![Category {
            id: CategoryId(1),
            name: "A".into(),
        }],
        vec![Subcategory {
            id: SubcategoryId(5),
            name: "X".into(),
            category_id: CategoryId(9),
        }],
    )
    .expect_err("unknown category");
    assert_eq!(
        err,
        CatalogError::UnknownCategory {
            id: SubcategoryId(5),
            category_id: CategoryId(9)
        }
    );
}

#[test]
fn load_reports_missing_file_path() {
    let err = Catalog::load("/definitely/not/here/catalog.toml").expect_err("missing");
    assert!(err.to_string().contains("/definitely/not/here/catalog.toml"));
}
