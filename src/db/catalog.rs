//! Named SQL command catalog.
//!
//! DESIGN
//! ======
//! Read-only queries live in `queries.json` (a flat `name -> SQL` object)
//! instead of being scattered through handlers. The file is embedded at
//! compile time; `QUERIES_PATH` can point at an external copy to tweak SQL
//! without a rebuild. `$$key$$` placeholders cover the few spots where a
//! bind parameter cannot go (ORDER BY columns), and only accept plain
//! identifiers.

use std::collections::HashMap;

const EMBEDDED_QUERIES: &str = include_str!("queries.json");

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("sql catalog is not valid json: {0}")]
    Parse(String),
    #[error("sql catalog entry '{0}' is not a string")]
    NotAString(String),
    #[error("sql command '{0}' not found")]
    UnknownCommand(String),
    #[error("unsafe substitution for '{key}': {value}")]
    UnsafeSubstitution { key: String, value: String },
    #[error("sql command '{name}' has no value for placeholder '{key}'")]
    MissingSubstitution { name: String, key: String },
    #[error("failed to read sql catalog: {0}")]
    Io(String),
}

#[derive(Debug, Clone)]
pub struct QueryCatalog {
    commands: HashMap<String, String>,
}

impl QueryCatalog {
    /// Load the catalog compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded JSON is malformed.
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_json(EMBEDDED_QUERIES)
    }

    /// Load from `path` when given, otherwise the embedded catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&str>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| CatalogError::Io(format!("{path}: {e}")))?;
                Self::from_json(&text)
            }
            None => Self::embedded(),
        }
    }

    /// Parse a JSON object of `name -> SQL` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON object of strings.
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let raw: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(text).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let mut commands = HashMap::with_capacity(raw.len());
        for (name, value) in raw {
            let serde_json::Value::String(sql) = value else {
                return Err(CatalogError::NotAString(name));
            };
            commands.insert(name, sql);
        }
        Ok(Self { commands })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Look up a command by name.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownCommand`] for unknown names.
    pub fn get(&self, name: &str) -> Result<&str, CatalogError> {
        self.commands
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| CatalogError::UnknownCommand(name.to_owned()))
    }

    /// Look up a command and fill its `$$key$$` placeholders.
    ///
    /// # Errors
    ///
    /// Fails for unknown commands, non-identifier values, or placeholders
    /// left without a value.
    pub fn render(&self, name: &str, substitutions: &[(&str, &str)]) -> Result<String, CatalogError> {
        let mut sql = self.get(name)?.to_owned();
        for (key, value) in substitutions {
            if !is_safe_identifier(value) {
                return Err(CatalogError::UnsafeSubstitution { key: (*key).to_owned(), value: (*value).to_owned() });
            }
            sql = sql.replace(&format!("$${key}$$"), value);
        }
        if let Some(key) = first_placeholder(&sql) {
            return Err(CatalogError::MissingSubstitution { name: name.to_owned(), key });
        }
        Ok(sql)
    }
}

fn is_safe_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn first_placeholder(sql: &str) -> Option<String> {
    let start = sql.find("$$")? + 2;
    let rest = &sql[start..];
    let end = rest.find("$$")?;
    Some(rest[..end].to_owned())
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
