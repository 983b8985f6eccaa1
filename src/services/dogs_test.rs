use super::*;
use serde_json::json;
use time::Month;

fn body(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn request() -> DogRequest {
    DogRequest {
        name: Some("Rex".into()),
        breed: Some("Beagle".into()),
        sex: Some("m".into()),
        birth_date: Some("2021-04-09".into()),
        chip_number: Some("  ".into()),
        photo: None,
        tags: Some(vec![" calm ".into(), String::new()]),
        bio: None,
    }
}

// =============================================================================
// sort_column
// =============================================================================

#[test]
fn sort_defaults_to_name() {
    assert_eq!(sort_column(None).unwrap(), "d.name");
    assert_eq!(sort_column(Some("  ")).unwrap(), "d.name");
}

#[test]
fn sort_keys_map_to_columns() {
    assert_eq!(sort_column(Some("breed")).unwrap(), "d.breed");
    assert_eq!(sort_column(Some("BIRTH_DATE")).unwrap(), "d.birth_date");
    assert_eq!(sort_column(Some("birthDate")).unwrap(), "d.birth_date");
    assert_eq!(sort_column(Some("owner")).unwrap(), "m.full_name");
}

#[test]
fn unknown_sort_is_rejected() {
    assert!(matches!(sort_column(Some("id; DROP TABLE dog")), Err(DogError::InvalidInput(_))));
}

// =============================================================================
// create validation
// =============================================================================

#[test]
fn request_validates_and_normalises() {
    let dog = request().validate().unwrap();
    assert_eq!(dog.sex, "M");
    assert_eq!(dog.birth_date, Some(Date::from_calendar_date(2021, Month::April, 9).unwrap()));
    assert_eq!(dog.chip_number, None);
    assert_eq!(dog.tags, Some(vec!["calm".to_owned()]));
}

#[test]
fn request_requires_name_breed_sex() {
    let clears: [fn(&mut DogRequest); 3] = [
        |r| r.name = None,
        |r| r.breed = Some(" ".into()),
        |r| r.sex = None,
    ];
    for clear in clears {
        let mut r = request();
        clear(&mut r);
        assert!(matches!(r.validate(), Err(DogError::InvalidInput(_))));
    }
}

#[test]
fn request_rejects_bad_sex_and_date() {
    let mut bad_sex = request();
    bad_sex.sex = Some("X".into());
    assert!(bad_sex.validate().is_err());

    let mut bad_date = request();
    bad_date.birth_date = Some("09.04.2021".into());
    assert!(bad_date.validate().is_err());

    let mut impossible = request();
    impossible.birth_date = Some("2021-02-30".into());
    assert!(impossible.validate().is_err());
}

// =============================================================================
// dog_changes
// =============================================================================

#[test]
fn changes_collect_allowed_keys() {
    let changes = dog_changes(&body(json!({
        "Name": "Max",
        "chipNumber": null,
        "tags": ["a", " b "],
        "ownerId": 99
    })))
    .unwrap();
    assert!(changes.contains(&DogChange::Text("name", Some("Max".into()))));
    assert!(changes.contains(&DogChange::Text("chip_number", None)));
    assert!(changes.contains(&DogChange::Tags(Some(vec!["a".into(), "b".into()]))));
    assert_eq!(changes.len(), 3);
}

#[test]
fn changes_parse_birth_date_and_sex() {
    let changes = dog_changes(&body(json!({"birthDate": "2020-01-31", "sex": "f"}))).unwrap();
    assert!(changes.contains(&DogChange::BirthDate(Some(
        Date::from_calendar_date(2020, Month::January, 31).unwrap()
    ))));
    assert!(changes.contains(&DogChange::Text("sex", Some("F".into()))));
}

#[test]
fn changes_reject_empty_required_and_bad_tags() {
    assert!(dog_changes(&body(json!({"name": ""}))).is_err());
    assert!(dog_changes(&body(json!({"sex": null}))).is_err());
    assert!(dog_changes(&body(json!({"tags": "calm"}))).is_err());
    assert!(dog_changes(&body(json!({"tags": [1, 2]}))).is_err());
}

#[test]
fn changes_without_allowed_keys_is_invalid() {
    assert!(matches!(dog_changes(&body(json!({"memberId": 5}))), Err(DogError::InvalidInput(_))));
}

// =============================================================================
// database (requires Postgres)
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn create_update_delete_with_ownership() {
    use crate::services::access::Role;
    use crate::state::test_helpers::{live_pool, seed_member};

    let pool = live_pool().await;
    let owner = seed_member(&pool, "owner@example.com", "member").await;
    let stranger = seed_member(&pool, "stranger@example.com", "member").await;
    let admin = seed_member(&pool, "admin@example.com", "admin").await;

    let mut with_chip = request();
    with_chip.chip_number = Some("643094100000001".into());
    let id = create(&pool, owner, &with_chip.clone().validate().unwrap()).await.unwrap();
    assert_eq!(owner_of(&pool, id).await.unwrap(), owner);

    let dup = create(&pool, owner, &with_chip.validate().unwrap()).await.unwrap_err();
    assert!(matches!(dup, DogError::ChipTaken));

    let stranger = Actor::new(stranger, Role::Member);
    let err = update(&pool, &stranger, id, &body(json!({"name": "Nope"}))).await.unwrap_err();
    assert!(matches!(err, DogError::Forbidden));

    let admin = Actor::new(admin, Role::Admin);
    update(&pool, &admin, id, &body(json!({"bio": "good boy"}))).await.unwrap();

    assert_eq!(set_photo(&pool, id, "https://cdn/p.jpg").await.unwrap(), None);

    delete(&pool, &Actor::new(owner, Role::Member), id).await.unwrap();
    assert!(matches!(owner_of(&pool, id).await, Err(DogError::NotFound)));
}
