pub mod account;
pub mod billing;
pub mod catalog;
pub mod people;

pub use account::{Session, User};
pub use billing::{Contract, ContractStatus, Payment, PaymentDraft, PaymentStatus};
pub use catalog::{Blog, Course, Enrollment, Group, GroupStudent, Teacher, Vacancy};
pub use people::{Application, ReviewStatus, Student, StudentStatus, VacancyApplication};

/// Placeholder shown wherever a referenced record no longer resolves.
pub const MISSING: &str = "—";
