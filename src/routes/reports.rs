use axum::extract::Path;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Extension;
use chrono::Utc;
use serde::Deserialize;

use crate::auth::AdminSession;
use crate::reports::{self, CourseStats, DashboardStats, MonthlyRow, SearchResults};
use crate::routes::Params;
use crate::store::SharedStore;
use crate::{proceeds, Error, Payload};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

pub async fn stats(Extension(store): Extension<SharedStore>) -> Payload<DashboardStats> {
    proceeds(reports::dashboard(store.as_ref()).await?)
}

pub async fn monthly(
    Extension(store): Extension<SharedStore>,
    Params(query): Params<YearQuery>,
) -> Payload<Vec<MonthlyRow>> {
    proceeds(reports::monthly_report(store.as_ref(), query.year).await?)
}

pub async fn courses(Extension(store): Extension<SharedStore>) -> Payload<Vec<CourseStats>> {
    proceeds(reports::course_report(store.as_ref()).await?)
}

pub async fn search(
    Extension(store): Extension<SharedStore>,
    Params(query): Params<SearchQuery>,
) -> Payload<SearchResults> {
    proceeds(reports::search(store.as_ref(), &query.q).await?)
}

/// `GET /export/:kind/?format=excel|csv` as a CSV attachment.
pub async fn export(
    admin: AdminSession,
    Path(kind): Path<String>,
    Extension(store): Extension<SharedStore>,
    Params(query): Params<ExportQuery>,
) -> Result<impl IntoResponse, Error> {
    reports::check_format(query.format.as_deref())?;
    let table = reports::export_table(&kind).ok_or_else(|| Error::NotFound {
        message: format!("Nothing to export under `{}`", kind),
    })?;
    let csv = reports::export(store.as_ref(), table).await?;
    log::info!("User `{}` exported {}", admin.user.username, kind);
    let disposition = format!(
        "attachment; filename={}_{}.csv",
        kind,
        Utc::now().format("%Y-%m-%d")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}
