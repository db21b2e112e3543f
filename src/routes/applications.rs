use axum::extract::Path;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::enrollment;
use crate::models::people::{
    ApplicationDraft, ApplicationPatch, NewVacancyApplication, VacancyApplicationDraft,
    VacancyApplicationPatch,
};
use crate::models::{Application, Contract, Course, ReviewStatus, Student, Vacancy, VacancyApplication};
use crate::record::{fields, Record};
use crate::routes::crud::{checked_patch, ensure_references};
use crate::routes::Body;
use crate::store::{SharedStore, Store};
use crate::{created, proceeds, Created, Error, Payload};

#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
    pub status: ReviewStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct Confirmed {
    pub application: Application,
    pub student: Option<Student>,
    pub contract: Option<Contract>,
}

/// Maps a shortcut verb onto the status it sets.
pub fn shortcut(action: &str) -> Option<ReviewStatus> {
    match action {
        "approve" => Some(ReviewStatus::Active),
        "reject" => Some(ReviewStatus::Rejected),
        "pending" => Some(ReviewStatus::Pending),
        _ => None,
    }
}

fn unknown_action(action: &str) -> Error {
    Error::NotFound {
        message: format!("Unknown action `{}`", action),
    }
}

/// Public intake form. The course must exist; its name is filled in when the
/// form leaves it blank.
pub async fn intake(
    Extension(store): Extension<SharedStore>,
    Body(mut draft): Body<ApplicationDraft>,
) -> Created<Application> {
    Application::check(&draft)?;
    ensure_references(store.as_ref(), Application::references(&draft)).await?;
    if draft.course_name.trim().is_empty() {
        if let Some(course) = store.get::<Course>(draft.course_id).await? {
            draft.course_name = course.name;
        }
    }
    let application = store.insert::<Application>(fields(&draft)?).await?;
    log::info!("New application {} from {}", application.id, application.full_name);
    created(application)
}

pub async fn replace(
    Path(id): Path<i32>,
    Extension(store): Extension<SharedStore>,
    Body(draft): Body<ApplicationDraft>,
) -> Payload<Application> {
    Application::check(&draft)?;
    ensure_references(store.as_ref(), Application::references(&draft)).await?;
    proceeds(store.update::<Application>(id, fields(&draft)?).await?)
}

/// Applies a patch. Setting `status` to `active` goes through confirmation
/// after the remaining fields are written.
pub async fn patch(
    Path(id): Path<i32>,
    Extension(store): Extension<SharedStore>,
    Body(mut patch): Body<ApplicationPatch>,
) -> Payload<Application> {
    let confirm = patch.status == Some(ReviewStatus::Active);
    if confirm {
        patch.status = None;
    }
    let changes = checked_patch::<Application>(store.as_ref(), id, &patch).await?;
    let application = store.update::<Application>(id, changes).await?;
    if !confirm {
        return proceeds(application);
    }
    proceeds(confirm_or_current(store.as_ref(), id).await?.application)
}

async fn confirm_or_current(store: &dyn Store, id: i32) -> Result<Confirmed, Error> {
    if let Some(done) = enrollment::confirm(store, id).await? {
        return Ok(Confirmed {
            application: done.application,
            student: Some(done.student),
            contract: done.contract,
        });
    }
    let application = store.fetch::<Application>(id).await?;
    let student = store
        .related::<Student>("application_id", id)
        .await?
        .into_iter()
        .next();
    Ok(Confirmed {
        application,
        student,
        contract: None,
    })
}

async fn set_status(store: &dyn Store, id: i32, status: ReviewStatus) -> Result<Application, Error> {
    if status == ReviewStatus::Active {
        return Ok(confirm_or_current(store, id).await?.application);
    }
    let patch = ApplicationPatch {
        status: Some(status),
        ..ApplicationPatch::default()
    };
    store.update::<Application>(id, fields(&patch)?).await
}

/// `POST /applications/:id/confirm` and the `approve`, `reject` and
/// `pending` shortcuts.
pub async fn action(
    Path((id, action)): Path<(i32, String)>,
    Extension(store): Extension<SharedStore>,
) -> Result<Response, Error> {
    if action == "confirm" {
        return Ok(Json(confirm_or_current(store.as_ref(), id).await?).into_response());
    }
    let status = shortcut(&action).ok_or_else(|| unknown_action(&action))?;
    Ok(Json(set_status(store.as_ref(), id, status).await?).into_response())
}

/// `PATCH /applications/:id/status`.
pub async fn status(
    Path((id, action)): Path<(i32, String)>,
    Extension(store): Extension<SharedStore>,
    Body(change): Body<StatusChange>,
) -> Payload<Application> {
    if action != "status" {
        return Err(unknown_action(&action));
    }
    proceeds(set_status(store.as_ref(), id, change.status).await?)
}

pub async fn apply_for_vacancy(
    Extension(store): Extension<SharedStore>,
    Body(draft): Body<VacancyApplicationDraft>,
) -> Created<VacancyApplication> {
    VacancyApplication::check(&draft)?;
    let vacancy = store
        .get::<Vacancy>(draft.vacancy_id)
        .await?
        .ok_or_else(|| {
            Error::invalid(format!(
                "{} with id `{}` does not exist!",
                Vacancy::TABLE.label,
                draft.vacancy_id
            ))
        })?;
    let row = NewVacancyApplication {
        draft,
        vacancy_title: vacancy.title,
    };
    created(store.insert::<VacancyApplication>(fields(&row)?).await?)
}

async fn set_vacancy_status(
    store: &dyn Store,
    id: i32,
    status: ReviewStatus,
) -> Result<VacancyApplication, Error> {
    let patch = VacancyApplicationPatch {
        status: Some(status),
        ..VacancyApplicationPatch::default()
    };
    store.update::<VacancyApplication>(id, fields(&patch)?).await
}

/// Vacancy applications only ever change status; no records are created.
pub async fn vacancy_action(
    Path((id, action)): Path<(i32, String)>,
    Extension(store): Extension<SharedStore>,
) -> Payload<VacancyApplication> {
    let status = shortcut(&action).ok_or_else(|| unknown_action(&action))?;
    proceeds(set_vacancy_status(store.as_ref(), id, status).await?)
}

pub async fn vacancy_status(
    Path((id, action)): Path<(i32, String)>,
    Extension(store): Extension<SharedStore>,
    Body(change): Body<StatusChange>,
) -> Payload<VacancyApplication> {
    if action != "status" {
        return Err(unknown_action(&action));
    }
    proceeds(set_vacancy_status(store.as_ref(), id, change.status).await?)
}
