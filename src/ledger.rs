use std::collections::HashSet;

use serde::Serialize;

use crate::models::billing::PaymentFilter;
use crate::models::catalog::CohortStatus;
use crate::models::{Course, Enrollment, Group, GroupStudent, Payment, PaymentStatus, Student, MISSING};
use crate::month::BillingMonth;
use crate::store::Store;
use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthStatus {
    pub month: BillingMonth,
    pub total_paid: i64,
    pub remaining: i64,
    pub is_complete: bool,
}

/// Folds the payments of one student and course into the status of `month`.
///
/// Only `paid` rows of that month count. Overpayment is allowed and leaves
/// `remaining` at zero.
pub fn month_status<'a, I>(price: i64, payments: I, month: BillingMonth) -> MonthStatus
where
    I: IntoIterator<Item = &'a Payment>,
{
    let total_paid = payments
        .into_iter()
        .filter(|payment| payment.status == PaymentStatus::Paid && payment.month == month)
        .map(|payment| payment.amount)
        .fold(0, i64::saturating_add);
    MonthStatus {
        month,
        total_paid,
        remaining: price.saturating_sub(total_paid).max(0),
        is_complete: total_paid >= price,
    }
}

/// A course a student is billed for, with how the student came to take it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentCourse {
    pub course_id: i32,
    pub course_name: String,
    pub course_price: i64,
    pub enrollment_id: Option<i32>,
    pub enrollment_status: CohortStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseLedger {
    #[serde(flatten)]
    pub course: StudentCourse,
    pub payments: Vec<Payment>,
    /// Status of the current month; `remaining` is the suggested next amount.
    pub current_month: MonthStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSummary {
    pub course_id: i32,
    pub course_name: String,
    pub course_price: i64,
    #[serde(flatten)]
    pub status: MonthStatus,
    pub payments: Vec<Payment>,
}

/// Courses of a student: the one applied for, then enrollments, then the
/// courses of the student's groups, without repeats. Unresolvable courses are
/// kept with a placeholder name and a zero price.
pub async fn student_courses(store: &dyn Store, student: &Student) -> Result<Vec<StudentCourse>, Error> {
    let mut picked: Vec<(i32, Option<i32>, CohortStatus)> = Vec::new();
    if let Some(course_id) = student.course_id {
        picked.push((course_id, None, CohortStatus::Active));
    }
    for enrollment in store.related::<Enrollment>("student_id", student.id).await? {
        picked.push((enrollment.course_id, Some(enrollment.id), enrollment.status));
    }
    for relation in store.related::<GroupStudent>("student_id", student.id).await? {
        if let Some(group) = store.get::<Group>(relation.group_id).await? {
            picked.push((group.course_id, Some(relation.id), CohortStatus::Active));
        }
    }

    let mut seen = HashSet::new();
    let mut courses = Vec::new();
    for (course_id, enrollment_id, enrollment_status) in picked {
        if !seen.insert(course_id) {
            continue;
        }
        let course = store.get::<Course>(course_id).await?;
        courses.push(StudentCourse {
            course_id,
            course_name: course
                .as_ref()
                .map_or_else(|| MISSING.to_string(), |course| course.name.clone()),
            course_price: course.as_ref().map_or(0, |course| course.price),
            enrollment_id,
            enrollment_status,
        });
    }
    Ok(courses)
}

pub async fn course_ledgers(
    store: &dyn Store,
    student: &Student,
    month: BillingMonth,
) -> Result<Vec<CourseLedger>, Error> {
    let payments = store
        .payments(&PaymentFilter {
            student_id: Some(student.id),
            ..PaymentFilter::default()
        })
        .await?;
    let ledgers = student_courses(store, student)
        .await?
        .into_iter()
        .map(|course| {
            let payments: Vec<Payment> = payments
                .iter()
                .filter(|payment| payment.course_id == course.course_id)
                .cloned()
                .collect();
            let current_month = month_status(course.course_price, &payments, month);
            CourseLedger {
                course,
                payments,
                current_month,
            }
        })
        .collect();
    Ok(ledgers)
}

pub async fn month_summary(
    store: &dyn Store,
    student: &Student,
    month: BillingMonth,
) -> Result<Vec<MonthSummary>, Error> {
    Ok(course_ledgers(store, student, month)
        .await?
        .into_iter()
        .map(|ledger| MonthSummary {
            course_id: ledger.course.course_id,
            course_name: ledger.course.course_name,
            course_price: ledger.course.course_price,
            status: ledger.current_month,
            payments: ledger
                .payments
                .into_iter()
                .filter(|payment| payment.month == month)
                .collect(),
        })
        .collect())
}
