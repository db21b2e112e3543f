use axum::extract::Path;
use axum::http::StatusCode;
use axum::Extension;
use serde_json::Value;

use crate::record::{fields, ListQuery, Record, Table};
use crate::routes::{Body, Params};
use crate::store::{SharedStore, Store};
use crate::{created, proceeds, Created, Error, Payload};

/// Fails with a ValidationFailure naming the first reference that does not
/// resolve.
pub async fn ensure_references(
    store: &dyn Store,
    references: Vec<(&'static Table, i32)>,
) -> Result<(), Error> {
    for (table, id) in references {
        if store.find_row(table, id).await?.is_none() {
            return Err(Error::invalid(format!(
                "{} with id `{}` does not exist!",
                table.label, id
            )));
        }
    }
    Ok(())
}

/// Lays `patch` over the stored row and validates the result as a full draft.
/// Returns the fields to write.
pub async fn checked_patch<R: Record>(
    store: &dyn Store,
    id: i32,
    patch: &R::Patch,
) -> Result<Value, Error> {
    let changes = fields(patch)?;
    let mut merged = store
        .find_row(R::TABLE, id)
        .await?
        .ok_or_else(|| Error::not_found(R::TABLE.label, id))?;
    if let (Some(merged), Some(changes)) = (merged.as_object_mut(), changes.as_object()) {
        for (column, value) in changes {
            merged.insert(column.clone(), value.clone());
        }
    }
    let draft: R::Draft = serde_json::from_value(merged)
        .map_err(|err| Error::invalid(format!("Invalid {}: {}", R::TABLE.label, err)))?;
    R::check(&draft)?;
    ensure_references(store, R::references(&draft)).await?;
    Ok(changes)
}

pub async fn list<R: Record>(
    Extension(store): Extension<SharedStore>,
    Params(query): Params<ListQuery>,
) -> Payload<Vec<R>> {
    proceeds(store.list::<R>(&query.paged()).await?)
}

pub async fn read<R: Record>(
    Path(id): Path<i32>,
    Extension(store): Extension<SharedStore>,
) -> Payload<R> {
    proceeds(store.fetch::<R>(id).await?)
}

pub async fn create<R: Record>(
    Extension(store): Extension<SharedStore>,
    Body(draft): Body<R::Draft>,
) -> Created<R> {
    R::check(&draft)?;
    ensure_references(store.as_ref(), R::references(&draft)).await?;
    let record = store.insert::<R>(fields(&draft)?).await?;
    log::debug!("Created {} {}", R::TABLE.label, record.id());
    created(record)
}

pub async fn replace<R: Record>(
    Path(id): Path<i32>,
    Extension(store): Extension<SharedStore>,
    Body(draft): Body<R::Draft>,
) -> Payload<R> {
    R::check(&draft)?;
    ensure_references(store.as_ref(), R::references(&draft)).await?;
    proceeds(store.update::<R>(id, fields(&draft)?).await?)
}

pub async fn patch<R: Record>(
    Path(id): Path<i32>,
    Extension(store): Extension<SharedStore>,
    Body(patch): Body<R::Patch>,
) -> Payload<R> {
    let changes = checked_patch::<R>(store.as_ref(), id, &patch).await?;
    proceeds(store.update::<R>(id, changes).await?)
}

pub async fn remove<R: Record>(
    Path(id): Path<i32>,
    Extension(store): Extension<SharedStore>,
) -> Result<StatusCode, Error> {
    store.delete::<R>(id).await?;
    log::debug!("Deleted {} {}", R::TABLE.label, id);
    Ok(StatusCode::NO_CONTENT)
}
