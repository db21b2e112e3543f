use chrono::{DateTime, NaiveDate, Utc};
use rand::{thread_rng, Rng};

use crate::models::people::{NewStudent, StudentDraft};
use crate::models::{Application, Contract, ContractStatus, Course, Student, StudentStatus, MISSING};
use crate::store::{Confirmation, Store};
use crate::Error;

/// Placeholder stamped until contract documents are generated.
pub const CONTRACT_URL: &str = "#";

/// `FL` followed by four digits drawn uniformly from `1000..=9999`.
///
/// Existing ids are not consulted; the value is a human-friendly label, not
/// a key.
pub fn custom_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("FL{}", rng.gen_range(1000..=9999))
}

pub fn student_from(application: &Application, custom_id: String, today: NaiveDate) -> NewStudent {
    NewStudent {
        draft: StudentDraft {
            full_name: application.full_name.clone(),
            phone: application.phone.clone(),
            email: application.email.clone(),
            address: application.address.clone(),
            school: application.school.clone(),
            grade: application.grade.clone(),
            birth_date: application.birth_date.clone(),
            parent_name: application.parent_name.clone(),
            parent_phone: application.parent_phone.clone(),
            course_id: application.course_id,
            course_name: application.course_name.clone(),
            status: StudentStatus::Active,
            notes: application.comment.clone(),
        },
        custom_id,
        application_id: Some(application.id),
        joined_date: today,
    }
}

/// A dangling course reference yields a zero amount instead of failing.
pub fn contract_for(student: &Student, course: Option<&Course>, now: DateTime<Utc>) -> Contract {
    Contract {
        id: Contract::id_at(now),
        student_id: student.id,
        student_name: student.full_name.clone(),
        course_name: student
            .course_name
            .clone()
            .or_else(|| course.map(|course| course.name.clone()))
            .unwrap_or_else(|| MISSING.to_string()),
        amount: course.map_or(0, |course| course.price),
        status: ContractStatus::Active,
        file_url: CONTRACT_URL.to_string(),
        created_at: now,
    }
}

/// Confirms an application. Missing or already active applications are a
/// silent no-op, so repeated calls are safe.
pub async fn confirm(store: &dyn Store, id: i32) -> Result<Option<Confirmation>, Error> {
    let custom_id = custom_id(&mut thread_rng());
    let confirmation = store.confirm_application(id, custom_id).await?;
    match &confirmation {
        Some(done) => log::info!(
            "Confirmed application {} as student {} ({})",
            id,
            done.student.id,
            done.student.custom_id
        ),
        None => log::debug!("Application {} needs no confirmation", id),
    }
    Ok(confirmation)
}
