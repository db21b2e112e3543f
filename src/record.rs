use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Static description of a table the generic CRUD layer can operate on.
///
/// `columns` lists the writable columns in the order drafts and patches are
/// mapped onto; `id`, `created_at` and `updated_at` are managed by the store.
#[derive(Debug)]
pub struct Table {
    pub name: &'static str,
    pub label: &'static str,
    pub columns: &'static [&'static str],
    pub search: &'static [&'static str],
    pub has_status: bool,
    pub newest_first: bool,
}

/// A row type served through the generic CRUD routes.
///
/// Rows travel through the store as JSON objects keyed by column name, so the
/// serde shape of the record, its draft and its patch must match the column
/// names in [`Table::columns`].
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static Table;

    /// Full body accepted by `POST` and `PUT`.
    type Draft: Serialize + DeserializeOwned + Send + 'static;
    /// Partial body accepted by `PATCH`; absent fields are left untouched.
    type Patch: Serialize + DeserializeOwned + Send + Sync + 'static;

    fn id(&self) -> i32;

    fn check(_draft: &Self::Draft) -> Result<(), Error> {
        Ok(())
    }

    /// Rows a draft points at, which must exist when it is written.
    fn references(_draft: &Self::Draft) -> Vec<(&'static Table, i32)> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: i64,
    pub limit: Option<i64>,
    pub status: Option<String>,
}

impl ListQuery {
    pub const DEFAULT_LIMIT: i64 = 100;

    pub fn all() -> Self {
        Self {
            skip: 0,
            limit: None,
            status: None,
        }
    }

    pub fn with_status<S: Into<String>>(status: S) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::all()
        }
    }

    /// Limit applied to HTTP listings, which are always paged.
    pub fn paged(mut self) -> Self {
        self.skip = self.skip.max(0);
        self.limit = Some(
            self.limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(0, 10 * Self::DEFAULT_LIMIT),
        );
        self
    }
}

/// Serializes a draft or patch into the JSON object handed to the store.
pub fn fields<T: Serialize>(value: &T) -> Result<serde_json::Value, Error> {
    let value = serde_json::to_value(value)?;
    if !value.is_object() {
        return Err(Error::invalid("Request body must be a JSON object"));
    }
    Ok(value)
}

/// Rejects blank strings for required fields.
pub fn require(field: &str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        Err(Error::invalid(format!("`{}` must not be empty", field)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paged_listing_defaults_and_clamps() {
        let query = ListQuery::default().paged();
        assert_eq!((query.skip, query.limit), (0, Some(100)));

        let query = ListQuery {
            skip: -5,
            limit: Some(1_000_000),
            status: None,
        }
        .paged();
        assert_eq!((query.skip, query.limit), (0, Some(1000)));
    }

    #[test]
    fn blank_required_fields_are_rejected() {
        assert!(require("phone", "  ").is_err());
        assert!(require("phone", "+998901234567").is_ok());
    }
}
