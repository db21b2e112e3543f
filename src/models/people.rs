use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Course, Vacancy};
use crate::record::{require, Record, Table};
use crate::Error;

/// Review state shared by course applications and vacancy applications.
///
/// The three states are fully connected; `confirmed` and `approved` are
/// accepted as legacy spellings of `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    #[serde(alias = "confirmed", alias = "approved")]
    Active,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Active => "active",
            ReviewStatus::Rejected => "rejected",
        }
    }
}

/// `inactive` is the REST client's word for a dropped student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    #[default]
    Active,
    Graduated,
    #[serde(alias = "inactive")]
    Dropped,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Graduated => "graduated",
            StudentStatus::Dropped => "dropped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: i32,
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub school: Option<String>,
    pub grade: Option<String>,
    pub birth_date: Option<String>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    pub course_id: Option<i32>,
    pub course_name: Option<String>,
    pub comment: Option<String>,
    pub notes: Option<String>,
    pub status: ReviewStatus,
    pub contract_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public intake form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationDraft {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub school: String,
    pub grade: String,
    pub course_id: i32,
    #[serde(default)]
    pub course_name: String,
    pub comment: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<String>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReviewStatus>,
}

impl Record for Application {
    const TABLE: &'static Table = &Table {
        name: "applications",
        label: "Application",
        columns: &[
            "full_name",
            "phone",
            "email",
            "address",
            "school",
            "grade",
            "birth_date",
            "parent_name",
            "parent_phone",
            "course_id",
            "course_name",
            "comment",
            "notes",
            "status",
            "contract_url",
        ],
        search: &["full_name", "phone", "course_name"],
        has_status: true,
        newest_first: true,
    };

    type Draft = ApplicationDraft;
    type Patch = ApplicationPatch;

    fn id(&self) -> i32 {
        self.id
    }

    fn check(draft: &ApplicationDraft) -> Result<(), Error> {
        require("full_name", &draft.full_name)?;
        require("phone", &draft.phone)?;
        require("address", &draft.address)?;
        require("school", &draft.school)?;
        require("grade", &draft.grade)
    }

    fn references(draft: &ApplicationDraft) -> Vec<(&'static Table, i32)> {
        vec![(Course::TABLE, draft.course_id)]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: i32,
    pub custom_id: String,
    pub application_id: Option<i32>,
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub school: Option<String>,
    pub grade: Option<String>,
    pub birth_date: Option<String>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    pub course_id: Option<i32>,
    pub course_name: Option<String>,
    pub status: StudentStatus,
    pub joined_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Staff-editable student fields. The display id and the application link
/// are assigned by the server and never taken from a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentDraft {
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub school: Option<String>,
    pub grade: Option<String>,
    pub birth_date: Option<String>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    pub course_id: Option<i32>,
    pub course_name: Option<String>,
    #[serde(default)]
    pub status: StudentStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StudentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Insert shape for a student, either staff-created or born from an
/// application.
#[derive(Debug, Clone, Serialize)]
pub struct NewStudent {
    #[serde(flatten)]
    pub draft: StudentDraft,
    pub custom_id: String,
    pub application_id: Option<i32>,
    pub joined_date: NaiveDate,
}

impl Record for Student {
    const TABLE: &'static Table = &Table {
        name: "students",
        label: "Student",
        columns: &[
            "custom_id",
            "application_id",
            "full_name",
            "phone",
            "email",
            "address",
            "school",
            "grade",
            "birth_date",
            "parent_name",
            "parent_phone",
            "course_id",
            "course_name",
            "status",
            "joined_date",
            "notes",
        ],
        search: &["full_name", "phone", "custom_id"],
        has_status: true,
        newest_first: false,
    };

    type Draft = StudentDraft;
    type Patch = StudentPatch;

    fn id(&self) -> i32 {
        self.id
    }

    fn check(draft: &StudentDraft) -> Result<(), Error> {
        require("full_name", &draft.full_name)?;
        require("phone", &draft.phone)
    }

    fn references(draft: &StudentDraft) -> Vec<(&'static Table, i32)> {
        draft
            .course_id
            .map(|course_id| (Course::TABLE, course_id))
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VacancyApplication {
    pub id: i32,
    pub vacancy_id: i32,
    pub vacancy_title: Option<String>,
    pub full_name: String,
    pub phone: String,
    pub education: String,
    pub certificates: Vec<String>,
    pub certificate_level: Option<String>,
    pub notes: Option<String>,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacancyApplicationDraft {
    pub vacancy_id: i32,
    pub full_name: String,
    pub phone: String,
    #[serde(default)]
    pub education: String,
    #[serde(default)]
    pub certificates: Vec<String>,
    pub certificate_level: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub status: ReviewStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VacancyApplicationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificates: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReviewStatus>,
}

/// Vacancy applications keep the vacancy title they were filed under.
#[derive(Debug, Clone, Serialize)]
pub struct NewVacancyApplication {
    #[serde(flatten)]
    pub draft: VacancyApplicationDraft,
    pub vacancy_title: String,
}

impl Record for VacancyApplication {
    const TABLE: &'static Table = &Table {
        name: "vacancy_applications",
        label: "Vacancy application",
        columns: &[
            "vacancy_id",
            "vacancy_title",
            "full_name",
            "phone",
            "education",
            "certificates",
            "certificate_level",
            "notes",
            "status",
        ],
        search: &["full_name", "phone", "vacancy_title"],
        has_status: true,
        newest_first: true,
    };

    type Draft = VacancyApplicationDraft;
    type Patch = VacancyApplicationPatch;

    fn id(&self) -> i32 {
        self.id
    }

    fn check(draft: &VacancyApplicationDraft) -> Result<(), Error> {
        require("full_name", &draft.full_name)?;
        require("phone", &draft.phone)
    }

    fn references(draft: &VacancyApplicationDraft) -> Vec<(&'static Table, i32)> {
        vec![(Vacancy::TABLE, draft.vacancy_id)]
    }
}
