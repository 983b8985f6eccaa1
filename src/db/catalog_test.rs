use super::*;

// =============================================================================
// loading
// =============================================================================

#[test]
fn embedded_catalog_parses() {
    let catalog = QueryCatalog::embedded().unwrap();
    assert!(!catalog.is_empty());
}

#[test]
fn embedded_catalog_has_every_route_query() {
    let catalog = QueryCatalog::embedded().unwrap();
    for name in [
        "members",
        "member",
        "me_profile",
        "dogs",
        "chipped_dogs",
        "member_dogs",
        "dog",
        "dog_events",
        "dog_programs",
        "dog_service_history",
        "events",
        "education_events",
        "event",
        "event_dogs",
        "event_members",
        "programs",
        "program",
        "program_dogs",
        "service_types",
        "dog_services_by_member",
        "dog_service",
    ] {
        assert!(catalog.get(name).is_ok(), "missing query {name}");
    }
}

#[test]
fn embedded_queries_have_no_trailing_semicolons() {
    let catalog = QueryCatalog::embedded().unwrap();
    for sql in catalog.commands.values() {
        assert!(!sql.trim_end().ends_with(';'), "{sql}");
    }
}

#[test]
fn invalid_json_is_parse_error() {
    let err = QueryCatalog::from_json("{not json").unwrap_err();
    assert!(matches!(err, CatalogError::Parse(_)));
}

#[test]
fn non_string_entry_is_rejected() {
    let err = QueryCatalog::from_json(r#"{"a": "SELECT 1", "b": 5}"#).unwrap_err();
    assert_eq!(err, CatalogError::NotAString("b".into()));
}

#[test]
fn missing_file_is_io_error() {
    let err = QueryCatalog::load(Some("/definitely/not/here/queries.json")).unwrap_err();
    assert!(matches!(err, CatalogError::Io(_)));
}

// =============================================================================
// get / render
// =============================================================================

#[test]
fn get_unknown_command() {
    let catalog = QueryCatalog::from_json(r#"{"a": "SELECT 1"}"#).unwrap();
    assert_eq!(catalog.get("b").unwrap_err(), CatalogError::UnknownCommand("b".into()));
    assert_eq!(catalog.get("a").unwrap(), "SELECT 1");
}

#[test]
fn render_substitutes_identifier() {
    let catalog = QueryCatalog::from_json(r#"{"dogs": "SELECT * FROM dog d ORDER BY $$order$$, d.id"}"#).unwrap();
    let sql = catalog.render("dogs", &[("order", "d.name")]).unwrap();
    assert_eq!(sql, "SELECT * FROM dog d ORDER BY d.name, d.id");
}

#[test]
fn render_rejects_injection() {
    let catalog = QueryCatalog::from_json(r#"{"dogs": "SELECT * FROM dog ORDER BY $$order$$"}"#).unwrap();
    let err = catalog
        .render("dogs", &[("order", "name; DROP TABLE dog")])
        .unwrap_err();
    assert!(matches!(err, CatalogError::UnsafeSubstitution { .. }));
}

#[test]
fn render_rejects_empty_value() {
    let catalog = QueryCatalog::from_json(r#"{"dogs": "SELECT * FROM dog ORDER BY $$order$$"}"#).unwrap();
    assert!(catalog.render("dogs", &[("order", "")]).is_err());
}

#[test]
fn render_reports_unfilled_placeholder() {
    let catalog = QueryCatalog::from_json(r#"{"dogs": "SELECT * FROM dog ORDER BY $$order$$"}"#).unwrap();
    let err = catalog.render("dogs", &[]).unwrap_err();
    assert_eq!(err, CatalogError::MissingSubstitution { name: "dogs".into(), key: "order".into() });
}

#[test]
fn render_without_placeholders_is_identity() {
    let catalog = QueryCatalog::from_json(r#"{"a": "SELECT id FROM member WHERE id = $1"}"#).unwrap();
    assert_eq!(catalog.render("a", &[]).unwrap(), "SELECT id FROM member WHERE id = $1");
}
