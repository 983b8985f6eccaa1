//! Dog records: creation, ownership checks, partial updates.
//!
//! Listing and detail reads go through the query catalog; this module owns
//! every write and the owner-or-admin rule that guards them.

use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::Date;
use time::macros::format_description;

use super::access::Actor;
use crate::db;

#[derive(Debug, thiserror::Error)]
pub enum DogError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("dog not found")]
    NotFound,
    #[error("only the owner or an admin can change this dog")]
    Forbidden,
    #[error("a dog with this chip number already exists")]
    ChipTaken,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

fn map_write_error(err: sqlx::Error) -> DogError {
    if db::is_unique_violation(&err) { DogError::ChipTaken } else { DogError::Database(err) }
}

// =============================================================================
// INPUT PARSING
// =============================================================================

/// `ORDER BY` expression for `GET /dogs?sort=`. Missing or blank sorts by name.
///
/// # Errors
///
/// Returns [`DogError::InvalidInput`] for an unknown sort key.
pub fn sort_column(sort: Option<&str>) -> Result<&'static str, DogError> {
    match sort.map(str::trim).unwrap_or_default().to_ascii_lowercase().as_str() {
        "" | "name" => Ok("d.name"),
        "breed" => Ok("d.breed"),
        "birth_date" | "birthdate" => Ok("d.birth_date"),
        "owner" => Ok("m.full_name"),
        other => Err(DogError::InvalidInput(format!(
            "unknown sort '{other}'; use name, breed, birth_date or owner"
        ))),
    }
}

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`DogError::InvalidInput`] when the value is not a calendar date.
pub fn parse_birth_date(raw: &str) -> Result<Date, DogError> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| DogError::InvalidInput(format!("birthDate must be YYYY-MM-DD, got '{raw}'")))
}

/// Normalise `sex` to `M` or `F`.
///
/// # Errors
///
/// Returns [`DogError::InvalidInput`] for anything else.
pub fn parse_sex(raw: &str) -> Result<&'static str, DogError> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "M" => Ok("M"),
        "F" => Ok("F"),
        _ => Err(DogError::InvalidInput("sex must be M or F".into())),
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Body of `POST /dogs`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DogRequest {
    pub name: Option<String>,
    pub breed: Option<String>,
    pub sex: Option<String>,
    pub birth_date: Option<String>,
    pub chip_number: Option<String>,
    pub photo: Option<String>,
    pub tags: Option<Vec<String>>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDog {
    pub name: String,
    pub breed: String,
    pub sex: &'static str,
    pub birth_date: Option<Date>,
    pub chip_number: Option<String>,
    pub photo: Option<String>,
    pub tags: Option<Vec<String>>,
    pub bio: Option<String>,
}

impl DogRequest {
    /// # Errors
    ///
    /// Returns [`DogError::InvalidInput`] when `name`, `breed` or `sex` is
    /// missing, or a value is malformed.
    pub fn validate(self) -> Result<NewDog, DogError> {
        let name = optional_text(self.name).ok_or_else(|| DogError::InvalidInput("name is required".into()))?;
        let breed = optional_text(self.breed).ok_or_else(|| DogError::InvalidInput("breed is required".into()))?;
        let sex = optional_text(self.sex).ok_or_else(|| DogError::InvalidInput("sex is required".into()))?;
        let birth_date = optional_text(self.birth_date)
            .map(|raw| parse_birth_date(&raw))
            .transpose()?;

        Ok(NewDog {
            name,
            breed,
            sex: parse_sex(&sex)?,
            birth_date,
            chip_number: optional_text(self.chip_number),
            photo: optional_text(self.photo),
            tags: self.tags.map(clean_tags),
            bio: optional_text(self.bio),
        })
    }
}

/// One column assignment of a dog update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DogChange {
    Text(&'static str, Option<String>),
    BirthDate(Option<Date>),
    Tags(Option<Vec<String>>),
}

impl DogChange {
    fn column(&self) -> &'static str {
        match self {
            Self::Text(column, _) => *column,
            Self::BirthDate(_) => "birth_date",
            Self::Tags(_) => "tags",
        }
    }
}

fn text_value(key: &str, value: &Value) -> Result<Option<String>, DogError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.trim().to_owned()).filter(|s| !s.is_empty())),
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(DogError::InvalidInput(format!("{key} must be a string"))),
    }
}

fn required_text(key: &str, value: &Value) -> Result<String, DogError> {
    text_value(key, value)?.ok_or_else(|| DogError::InvalidInput(format!("{key} cannot be empty")))
}

/// Collect column assignments from a `PUT /dogs/{id}` body. Keys match
/// case-insensitively; unknown keys are ignored.
///
/// # Errors
///
/// Returns [`DogError::InvalidInput`] when nothing updatable is present or a
/// value is malformed.
pub fn dog_changes(body: &Map<String, Value>) -> Result<Vec<DogChange>, DogError> {
    let mut changes: Vec<DogChange> = Vec::new();

    for (key, value) in body {
        let change = match key.to_ascii_lowercase().as_str() {
            "name" => DogChange::Text("name", Some(required_text(key, value)?)),
            "breed" => DogChange::Text("breed", Some(required_text(key, value)?)),
            "sex" => DogChange::Text("sex", Some(parse_sex(&required_text(key, value)?)?.to_owned())),
            "birthdate" | "birth_date" => {
                let raw = text_value(key, value)?;
                DogChange::BirthDate(raw.map(|raw| parse_birth_date(&raw)).transpose()?)
            }
            "chipnumber" | "chip_number" => DogChange::Text("chip_number", text_value(key, value)?),
            "photo" => DogChange::Text("photo", text_value(key, value)?),
            "bio" => DogChange::Text("bio", text_value(key, value)?),
            "tags" => match value {
                Value::Null => DogChange::Tags(None),
                Value::Array(items) => {
                    let tags = items
                        .iter()
                        .map(|item| item.as_str().map(str::to_owned))
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| DogError::InvalidInput("tags must be an array of strings".into()))?;
                    DogChange::Tags(Some(clean_tags(tags)))
                }
                _ => return Err(DogError::InvalidInput("tags must be an array of strings".into())),
            },
            _ => continue,
        };

        match changes.iter_mut().find(|c| c.column() == change.column()) {
            Some(existing) => *existing = change,
            None => changes.push(change),
        }
    }

    if changes.is_empty() {
        return Err(DogError::InvalidInput(
            "no updatable fields; allowed: name, breed, sex, birthDate, chipNumber, photo, tags, bio".into(),
        ));
    }
    Ok(changes)
}

// =============================================================================
// WRITES
// =============================================================================

/// Insert a dog owned by `owner_id`, returning its id.
///
/// # Errors
///
/// Returns [`DogError::ChipTaken`] on a duplicate chip number.
pub async fn create(pool: &PgPool, owner_id: i64, dog: &NewDog) -> Result<i64, DogError> {
    sqlx::query_scalar(
        "INSERT INTO dog (member_id, name, breed, sex, birth_date, chip_number, photo, tags, bio) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
    )
    .bind(owner_id)
    .bind(&dog.name)
    .bind(&dog.breed)
    .bind(dog.sex)
    .bind(dog.birth_date)
    .bind(&dog.chip_number)
    .bind(&dog.photo)
    .bind(&dog.tags)
    .bind(&dog.bio)
    .fetch_one(pool)
    .await
    .map_err(map_write_error)
}

/// Owner of a dog.
///
/// # Errors
///
/// Returns [`DogError::NotFound`] when the dog does not exist.
pub async fn owner_of(pool: &PgPool, dog_id: i64) -> Result<i64, DogError> {
    sqlx::query_scalar("SELECT member_id FROM dog WHERE id = $1")
        .bind(dog_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DogError::NotFound)
}

/// Ensure `actor` owns the dog or is an admin.
///
/// # Errors
///
/// Returns [`DogError::NotFound`] or [`DogError::Forbidden`].
pub async fn authorize(pool: &PgPool, actor: &Actor, dog_id: i64) -> Result<(), DogError> {
    let owner = owner_of(pool, dog_id).await?;
    if actor.can_act_for(owner) { Ok(()) } else { Err(DogError::Forbidden) }
}

/// Apply a partial update.
///
/// # Errors
///
/// See [`dog_changes`] and [`authorize`]; duplicate chip numbers are
/// [`DogError::ChipTaken`].
pub async fn update(pool: &PgPool, actor: &Actor, dog_id: i64, body: &Map<String, Value>) -> Result<(), DogError> {
    let changes = dog_changes(body)?;
    authorize(pool, actor, dog_id).await?;

    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE dog SET ");
    let mut fields = builder.separated(", ");
    for change in changes {
        fields.push(change.column());
        fields.push_unseparated(" = ");
        match change {
            DogChange::Text(_, value) => fields.push_bind_unseparated(value),
            DogChange::BirthDate(value) => fields.push_bind_unseparated(value),
            DogChange::Tags(value) => fields.push_bind_unseparated(value),
        };
    }
    builder.push(" WHERE id = ");
    builder.push_bind(dog_id);

    let result = builder.build().execute(pool).await.map_err(map_write_error)?;
    if result.rows_affected() == 0 {
        return Err(DogError::NotFound);
    }
    Ok(())
}

/// Delete a dog together with its registrations and bookings.
///
/// # Errors
///
/// Returns [`DogError::NotFound`] or [`DogError::Forbidden`].
pub async fn delete(pool: &PgPool, actor: &Actor, dog_id: i64) -> Result<(), DogError> {
    authorize(pool, actor, dog_id).await?;
    let result = sqlx::query("DELETE FROM dog WHERE id = $1").bind(dog_id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(DogError::NotFound);
    }
    Ok(())
}

/// Store a new photo URL, returning the previous one.
///
/// # Errors
///
/// Returns [`DogError::NotFound`] when the dog is gone.
pub async fn set_photo(pool: &PgPool, dog_id: i64, photo_url: &str) -> Result<Option<String>, DogError> {
    let previous: Option<Option<String>> = sqlx::query_scalar(
        "UPDATE dog d SET photo = $2 \
         FROM (SELECT photo FROM dog WHERE id = $1) old \
         WHERE d.id = $1 RETURNING old.photo",
    )
    .bind(dog_id)
    .bind(photo_url)
    .fetch_optional(pool)
    .await?;
    previous.ok_or(DogError::NotFound)
}

#[cfg(test)]
#[path = "dogs_test.rs"]
mod tests;
