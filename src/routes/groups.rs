use axum::extract::Path;
use axum::http::StatusCode;
use axum::Extension;

use crate::models::catalog::GroupStudentDraft;
use crate::models::{Group, GroupStudent, Student};
use crate::record::ListQuery;
use crate::routes::{Body, Params};
use crate::store::{Membership, SharedStore, Store};
use crate::{created, proceeds, Created, Error, Payload};

async fn join(store: &dyn Store, group_id: i32, student_id: i32) -> Result<GroupStudent, Error> {
    store.fetch::<Group>(group_id).await?;
    store.fetch::<Student>(student_id).await?;
    let relation = store.join_group(group_id, student_id).await?;
    log::info!("Student {} is in group {}", student_id, group_id);
    Ok(relation)
}

async fn leave(store: &dyn Store, membership: Membership) -> Result<StatusCode, Error> {
    if store.leave_group(membership).await? {
        return Ok(StatusCode::NO_CONTENT);
    }
    Err(match membership {
        Membership::Relation(id) => Error::not_found("Group-student relation", id),
        Membership::Pair {
            group_id,
            student_id,
        } => Error::NotFound {
            message: format!("Student {} is not in group {}", student_id, group_id),
        },
    })
}

pub async fn members(
    Path(id): Path<i32>,
    Extension(store): Extension<SharedStore>,
) -> Payload<Vec<Student>> {
    store.fetch::<Group>(id).await?;
    proceeds(store.group_members(id).await?)
}

/// `POST /groups/:id/students/:student_id`
pub async fn add_member(
    Path((group_id, student_id)): Path<(i32, i32)>,
    Extension(store): Extension<SharedStore>,
) -> Created<GroupStudent> {
    created(join(store.as_ref(), group_id, student_id).await?)
}

/// `DELETE /groups/:id/students/:student_id`
pub async fn remove_member(
    Path((group_id, student_id)): Path<(i32, i32)>,
    Extension(store): Extension<SharedStore>,
) -> Result<StatusCode, Error> {
    leave(
        store.as_ref(),
        Membership::Pair {
            group_id,
            student_id,
        },
    )
    .await
}

pub async fn relations(
    Extension(store): Extension<SharedStore>,
    Params(query): Params<ListQuery>,
) -> Payload<Vec<GroupStudent>> {
    proceeds(store.list::<GroupStudent>(&query.paged()).await?)
}

pub async fn add_relation(
    Extension(store): Extension<SharedStore>,
    Body(draft): Body<GroupStudentDraft>,
) -> Created<GroupStudent> {
    created(join(store.as_ref(), draft.group_id, draft.student_id).await?)
}

/// `GET /group-students/:id`
pub async fn relation(
    Path(id): Path<i32>,
    Extension(store): Extension<SharedStore>,
) -> Payload<GroupStudent> {
    proceeds(store.fetch::<GroupStudent>(id).await?)
}

/// `DELETE /group-students/:id`
pub async fn remove_relation(
    Path(id): Path<i32>,
    Extension(store): Extension<SharedStore>,
) -> Result<StatusCode, Error> {
    leave(store.as_ref(), Membership::Relation(id)).await
}

/// `GET /group-students/group/:id` and `GET /group-students/student/:id`
pub async fn relations_by(
    Path((scope, id)): Path<(String, i32)>,
    Extension(store): Extension<SharedStore>,
) -> Payload<Vec<GroupStudent>> {
    let column = match scope.as_str() {
        "group" => "group_id",
        "student" => "student_id",
        _ => {
            return Err(Error::NotFound {
                message: format!("Invalid path: /group-students/{}/{}", scope, id),
            })
        }
    };
    proceeds(store.related::<GroupStudent>(column, id).await?)
}

/// `DELETE /group-students/group/:gid/student/:sid`
pub async fn remove_pair(
    Path((scope, group_id, kind, student_id)): Path<(String, i32, String, i32)>,
    Extension(store): Extension<SharedStore>,
) -> Result<StatusCode, Error> {
    if scope != "group" || kind != "student" {
        return Err(Error::NotFound {
            message: format!(
                "Invalid path: /group-students/{}/{}/{}/{}",
                scope, group_id, kind, student_id
            ),
        });
    }
    leave(
        store.as_ref(),
        Membership::Pair {
            group_id,
            student_id,
        },
    )
    .await
}
