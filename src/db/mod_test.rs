use serde_json::json;

use super::*;

// =============================================================================
// to_camel_case
// =============================================================================

#[test]
fn camel_case_simple() {
    assert_eq!(to_camel_case("member_id"), "memberId");
    assert_eq!(to_camel_case("membership_end_date"), "membershipEndDate");
}

#[test]
fn camel_case_already_camel() {
    assert_eq!(to_camel_case("dogName"), "dogName");
    assert_eq!(to_camel_case("id"), "id");
}

#[test]
fn camel_case_doubled_and_trailing_underscores() {
    assert_eq!(to_camel_case("owner__city"), "ownerCity");
    assert_eq!(to_camel_case("price_"), "price");
}

#[test]
fn camel_case_keeps_leading_underscore() {
    assert_eq!(to_camel_case("_row_num"), "_rowNum");
}

// =============================================================================
// camelize_keys
// =============================================================================

#[test]
fn camelize_renames_nested_objects_but_not_values() {
    let value = json!([
        {"dog_id": 1, "owner_full_name": "Ann", "dog_tags": ["snake_case_value"], "meta": {"chip_number": null}}
    ]);
    let out = camelize_keys(value);
    assert_eq!(
        out,
        json!([
            {"dogId": 1, "ownerFullName": "Ann", "dogTags": ["snake_case_value"], "meta": {"chipNumber": null}}
        ])
    );
}

#[test]
fn camelize_scalars_untouched() {
    assert_eq!(camelize_keys(json!(42)), json!(42));
    assert_eq!(camelize_keys(json!("a_b")), json!("a_b"));
}

// =============================================================================
// wrap_json_agg
// =============================================================================

#[test]
fn wrap_strips_trailing_semicolon() {
    let wrapped = wrap_json_agg("SELECT id FROM dog;  ");
    assert_eq!(
        wrapped,
        "SELECT COALESCE(json_agg(row_to_json(q)), '[]'::json) FROM (SELECT id FROM dog) AS q"
    );
}

#[test]
fn wrap_defaults_to_empty_array() {
    assert!(wrap_json_agg("SELECT 1").contains("'[]'::json"));
}

// =============================================================================
// SqlParam / first_row
// =============================================================================

#[test]
fn sql_param_conversions() {
    assert_eq!(SqlParam::from(5_i64), SqlParam::Int(5));
    assert_eq!(SqlParam::from(None::<i64>), SqlParam::NullInt);
    assert_eq!(SqlParam::from(Some(7_i64)), SqlParam::Int(7));
    assert_eq!(SqlParam::from("x"), SqlParam::Text("x".into()));
}

#[test]
fn first_row_of_array() {
    assert_eq!(first_row(json!([{"a": 1}, {"a": 2}])), Some(json!({"a": 1})));
    assert_eq!(first_row(json!([])), None);
    assert_eq!(first_row(json!({"a": 1})), None);
}
