use axum::extract::{FromRequest, Path, RequestParts};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::{self, CourseLedger, MonthSummary};
use crate::models::billing::PaymentFilter;
use crate::models::{Course, Payment, PaymentDraft, PaymentStatus, Student};
use crate::month::BillingMonth;
use crate::routes::{Body, Params};
use crate::store::{SharedStore, Store};
use crate::{created, proceeds, Created, Error, Payload};

pub const IDEMPOTENCY_KEY: &str = "idempotency-key";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentQuery {
    pub student_id: Option<i32>,
    pub course_id: Option<i32>,
    pub month: Option<BillingMonth>,
    pub status: Option<PaymentStatus>,
}

impl From<PaymentQuery> for PaymentFilter {
    fn from(query: PaymentQuery) -> Self {
        PaymentFilter {
            student_id: query.student_id,
            course_id: query.course_id,
            month: query.month,
            status: query.status,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonthQuery {
    pub month: Option<BillingMonth>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentSummary {
    pub student_id: i32,
    pub month: BillingMonth,
    pub courses: Vec<MonthSummary>,
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<Uuid>, Error> {
    match headers.get(IDEMPOTENCY_KEY) {
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| Error::invalid("Invalid Idempotency-Key header"))?;
            Ok(Some(Uuid::parse_str(value.trim())?))
        }
        None => Ok(None),
    }
}

/// Optional `Idempotency-Key` request header.
pub struct IdempotencyKey(pub Option<Uuid>);

#[axum::async_trait]
impl<B: Send> FromRequest<B> for IdempotencyKey {
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        idempotency_key(req.headers()).map(IdempotencyKey)
    }
}

pub async fn list(
    Extension(store): Extension<SharedStore>,
    Params(query): Params<PaymentQuery>,
) -> Payload<Vec<Payment>> {
    proceeds(store.payments(&query.into()).await?)
}

pub async fn read(
    Path(id): Path<i32>,
    Extension(store): Extension<SharedStore>,
) -> Payload<Payment> {
    proceeds(store.payment(id).await?)
}

/// Appends a payment after checking that the course is one the student
/// takes. A repeated `Idempotency-Key` answers with the first recorded row.
pub async fn record(
    Extension(store): Extension<SharedStore>,
    IdempotencyKey(key): IdempotencyKey,
    Body(draft): Body<PaymentDraft>,
) -> Created<Payment> {
    draft.check()?;
    let student = store.fetch::<Student>(draft.student_id).await?;
    store.fetch::<Course>(draft.course_id).await?;
    let courses = ledger::student_courses(store.as_ref(), &student).await?;
    if !courses.iter().any(|course| course.course_id == draft.course_id) {
        return Err(Error::invalid(format!(
            "Student {} does not take course {}",
            draft.student_id, draft.course_id
        )));
    }
    let payment = store.append_payment(&draft, key).await?;
    log::info!(
        "Recorded payment {} of {} for student {} course {} ({})",
        payment.id,
        payment.amount,
        payment.student_id,
        payment.course_id,
        payment.month
    );
    created(payment)
}

async fn courses_of(store: &dyn Store, student_id: i32) -> Result<Vec<CourseLedger>, Error> {
    let student = store.fetch::<Student>(student_id).await?;
    ledger::course_ledgers(store, &student, BillingMonth::current()).await
}

async fn summary_of(
    store: &dyn Store,
    student_id: i32,
    month: Option<BillingMonth>,
) -> Result<StudentSummary, Error> {
    let student = store.fetch::<Student>(student_id).await?;
    let month = month.unwrap_or_else(BillingMonth::current);
    Ok(StudentSummary {
        student_id,
        month,
        courses: ledger::month_summary(store, &student, month).await?,
    })
}

/// `GET /payments/student/:id/courses` and
/// `GET /payments/student/:id/summary?month=YYYY-MM`.
pub async fn student_view(
    Path((scope, student_id, view)): Path<(String, i32, String)>,
    Extension(store): Extension<SharedStore>,
    Params(query): Params<MonthQuery>,
) -> Result<Response, Error> {
    match (scope.as_str(), view.as_str()) {
        ("student", "courses") => Ok(Json(courses_of(store.as_ref(), student_id).await?).into_response()),
        ("student", "summary") => {
            Ok(Json(summary_of(store.as_ref(), student_id, query.month).await?).into_response())
        }
        _ => Err(Error::NotFound {
            message: format!("Invalid path: /payments/{}/{}/{}", scope, student_id, view),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn idempotency_keys_must_be_uuids() {
        let mut headers = HeaderMap::new();
        assert_eq!(idempotency_key(&headers).unwrap(), None);
        headers.insert(IDEMPOTENCY_KEY, HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(
            idempotency_key(&headers),
            Err(Error::ValidationFailure { .. })
        ));
        headers.insert(
            IDEMPOTENCY_KEY,
            HeaderValue::from_static("6f1c1d2e-8a53-4bb9-9a53-2a8f8c1e0b7d"),
        );
        assert!(idempotency_key(&headers).unwrap().is_some());
    }
}
