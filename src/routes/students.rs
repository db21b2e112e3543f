use axum::extract::Path;
use axum::http::StatusCode;
use axum::Extension;
use chrono::Utc;
use rand::thread_rng;
use serde::Deserialize;

use crate::enrollment::custom_id;
use crate::models::people::{NewStudent, StudentDraft, StudentPatch};
use crate::models::{Contract, ContractStatus, Student, StudentStatus};
use crate::record::{fields, Record};
use crate::routes::crud::ensure_references;
use crate::routes::{Body, Params};
use crate::store::SharedStore;
use crate::{created, proceeds, Created, Error, Payload};

/// Staff-created student; the display id is assigned here.
pub async fn create(
    Extension(store): Extension<SharedStore>,
    Body(draft): Body<StudentDraft>,
) -> Created<Student> {
    Student::check(&draft)?;
    ensure_references(store.as_ref(), Student::references(&draft)).await?;
    let row = NewStudent {
        draft,
        custom_id: custom_id(&mut thread_rng()),
        application_id: None,
        joined_date: Utc::now().naive_utc().date(),
    };
    let student = store.insert::<Student>(fields(&row)?).await?;
    log::info!("Created student {} ({})", student.id, student.custom_id);
    created(student)
}

/// Students are never hard-deleted; removal marks them dropped.
pub async fn remove(
    Path(id): Path<i32>,
    Extension(store): Extension<SharedStore>,
) -> Result<StatusCode, Error> {
    let patch = StudentPatch {
        status: Some(StudentStatus::Dropped),
        ..StudentPatch::default()
    };
    store.update::<Student>(id, fields(&patch)?).await?;
    log::info!("Student {} dropped", id);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractQuery {
    pub student_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractChange {
    pub status: ContractStatus,
}

pub async fn contracts(
    Extension(store): Extension<SharedStore>,
    Params(query): Params<ContractQuery>,
) -> Payload<Vec<Contract>> {
    proceeds(store.contracts(query.student_id).await?)
}

pub async fn update_contract(
    Path(id): Path<String>,
    Extension(store): Extension<SharedStore>,
    Body(change): Body<ContractChange>,
) -> Payload<Contract> {
    match store.set_contract_status(&id, change.status).await? {
        Some(contract) => proceeds(contract),
        None => Err(Error::not_found("Contract", id)),
    }
}

pub async fn delete_contract(
    Path(id): Path<String>,
    Extension(store): Extension<SharedStore>,
) -> Result<StatusCode, Error> {
    if store.delete_contract(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::not_found("Contract", id))
    }
}
