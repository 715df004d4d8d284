//! Admin forms: raw text input in, cleaned write payloads out.
//!
//! Each form mirrors what an admin change page submits. `clean` collects every
//! field error before giving up, so the caller can show them all at once.

use crate::core::tables::Tables;
use crate::domain::model::*;
use crate::domain::services::enrollment_conflict_exists;
use crate::utils::error::{AdminError, Result};
use crate::utils::validation::is_valid_email;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

pub const NON_FIELD_ERRORS: &str = "__all__";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const REQUIRED: &str = "This field is required.";
const INVALID_EMAIL: &str = "Enter a valid email address.";
const INVALID_DATE: &str = "Enter a valid date.";
const INVALID_INTEGER: &str = "Enter a whole number.";
const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";
const DUPLICATE_ENROLLMENT: &str = "This student is already enrolled in this course.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Prefixes every field with `prefix`, as inline formsets do (`form-0-student`).
    pub fn merge_prefixed(&mut self, prefix: &str, other: FormErrors) {
        for (field, messages) in other.fields {
            let key = format!("{}-{}", prefix, field);
            self.fields.entry(key).or_default().extend(messages);
        }
    }

    fn into_result<T>(self, value: Option<T>) -> Result<T> {
        match value {
            Some(value) if self.is_empty() => Ok(value),
            _ => Err(AdminError::ValidationError(self)),
        }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                first = false;
                if field == NON_FIELD_ERRORS {
                    write!(f, "{}", message)?;
                } else {
                    write!(f, "{}: {}", field, message)?;
                }
            }
        }
        Ok(())
    }
}

pub trait ModelForm {
    type Cleaned;

    fn clean(&self, tables: &Tables) -> Result<Self::Cleaned>;
}

// ---- field cleaners ----

fn clean_text(errors: &mut FormErrors, field: &str, raw: &str, max: usize) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    let length = value.chars().count();
    if length > max {
        errors.add(
            field,
            format!(
                "Ensure this value has at most {} characters (it has {}).",
                max, length
            ),
        );
        return None;
    }
    Some(value.to_string())
}

fn clean_optional_text(
    errors: &mut FormErrors,
    field: &str,
    raw: &str,
    max: usize,
) -> Option<Option<String>> {
    if raw.trim().is_empty() {
        return Some(None);
    }
    clean_text(errors, field, raw, max).map(Some)
}

fn clean_email(errors: &mut FormErrors, field: &str, raw: &str) -> Option<String> {
    let value = clean_text(errors, field, raw, EMAIL_MAX_LENGTH)?;
    if !is_valid_email(&value) {
        errors.add(field, INVALID_EMAIL);
        return None;
    }
    Some(value)
}

fn clean_date(errors: &mut FormErrors, field: &str, raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    match NaiveDate::parse_from_str(value, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            errors.add(field, INVALID_DATE);
            None
        }
    }
}

fn clean_credits(errors: &mut FormErrors, field: &str, raw: &str) -> Option<u16> {
    let value = raw.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    let number: i64 = match value.parse() {
        Ok(n) => n,
        Err(_) => {
            errors.add(field, INVALID_INTEGER);
            return None;
        }
    };
    if number < 0 {
        errors.add(field, "Ensure this value is greater than or equal to 0.");
        return None;
    }
    if number > i64::from(CREDITS_MAX) {
        errors.add(
            field,
            format!("Ensure this value is less than or equal to {}.", CREDITS_MAX),
        );
        return None;
    }
    u16::try_from(number).ok()
}

/// Parses a foreign-key id and checks the referenced row exists.
fn clean_reference(
    errors: &mut FormErrors,
    field: &str,
    raw: &str,
    exists: impl Fn(u64) -> bool,
) -> Option<u64> {
    let value = raw.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    match value.parse::<u64>() {
        Ok(id) if exists(id) => Some(id),
        _ => {
            errors.add(field, INVALID_CHOICE);
            None
        }
    }
}

fn unique_message(model: &str, field: &str) -> String {
    format!("{} with this {} already exists.", model, field)
}

// ---- Student ----

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentForm {
    /// The student being edited, if any.
    pub instance: Option<StudentId>,
    pub name: String,
    pub email: String,
    pub department: String,
    pub enrollment_date: String,
}

impl StudentForm {
    pub fn from_record(student: &Student) -> Self {
        Self {
            instance: Some(student.id),
            name: student.name.clone(),
            email: student.email.clone(),
            department: student.department.clone(),
            enrollment_date: student.enrollment_date.format(DATE_FORMAT).to_string(),
        }
    }
}

impl ModelForm for StudentForm {
    type Cleaned = NewStudent;

    fn clean(&self, tables: &Tables) -> Result<NewStudent> {
        let mut errors = FormErrors::new();
        let name = clean_text(&mut errors, "name", &self.name, NAME_MAX_LENGTH);
        let email = clean_email(&mut errors, "email", &self.email);
        let department = clean_text(
            &mut errors,
            "department",
            &self.department,
            DEPARTMENT_MAX_LENGTH,
        );
        let enrollment_date = clean_date(&mut errors, "enrollment_date", &self.enrollment_date);

        if let Some(email) = &email {
            if let Some(existing) = tables.student_by_email(email) {
                if Some(existing.id) != self.instance {
                    errors.add("email", unique_message("Student", "Email"));
                }
            }
        }

        let cleaned = match (name, email, department, enrollment_date) {
            (Some(name), Some(email), Some(department), Some(enrollment_date)) => {
                Some(NewStudent {
                    name,
                    email,
                    department,
                    enrollment_date,
                })
            }
            _ => None,
        };
        errors.into_result(cleaned)
    }
}

// ---- Instructor ----

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstructorForm {
    pub instance: Option<InstructorId>,
    pub name: String,
    pub email: String,
    pub department: String,
    pub hire_date: String,
}

impl InstructorForm {
    pub fn from_record(instructor: &Instructor) -> Self {
        Self {
            instance: Some(instructor.id),
            name: instructor.name.clone(),
            email: instructor.email.clone(),
            department: instructor.department.clone(),
            hire_date: instructor.hire_date.format(DATE_FORMAT).to_string(),
        }
    }
}

impl ModelForm for InstructorForm {
    type Cleaned = NewInstructor;

    fn clean(&self, tables: &Tables) -> Result<NewInstructor> {
        let mut errors = FormErrors::new();
        let name = clean_text(&mut errors, "name", &self.name, NAME_MAX_LENGTH);
        let email = clean_email(&mut errors, "email", &self.email);
        let department = clean_text(
            &mut errors,
            "department",
            &self.department,
            DEPARTMENT_MAX_LENGTH,
        );
        let hire_date = clean_date(&mut errors, "hire_date", &self.hire_date);

        if let Some(email) = &email {
            if let Some(existing) = tables.instructor_by_email(email) {
                if Some(existing.id) != self.instance {
                    errors.add("email", unique_message("Instructor", "Email"));
                }
            }
        }

        let cleaned = match (name, email, department, hire_date) {
            (Some(name), Some(email), Some(department), Some(hire_date)) => Some(NewInstructor {
                name,
                email,
                department,
                hire_date,
            }),
            _ => None,
        };
        errors.into_result(cleaned)
    }
}

// ---- Course ----

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseForm {
    pub instance: Option<CourseId>,
    pub code: String,
    pub title: String,
    pub credits: String,
    /// Instructor id; blank means no instructor.
    pub instructor: String,
}

impl CourseForm {
    pub fn from_record(course: &Course) -> Self {
        Self {
            instance: Some(course.id),
            code: course.code.clone(),
            title: course.title.clone(),
            credits: course.credits.to_string(),
            instructor: course
                .instructor
                .map(|id| id.to_string())
                .unwrap_or_default(),
        }
    }
}

impl ModelForm for CourseForm {
    type Cleaned = NewCourse;

    fn clean(&self, tables: &Tables) -> Result<NewCourse> {
        let mut errors = FormErrors::new();
        let code = clean_text(&mut errors, "code", &self.code, COURSE_CODE_MAX_LENGTH);
        let title = clean_text(&mut errors, "title", &self.title, COURSE_TITLE_MAX_LENGTH);
        let credits = clean_credits(&mut errors, "credits", &self.credits);
        let instructor = if self.instructor.trim().is_empty() {
            Some(None)
        } else {
            clean_reference(&mut errors, "instructor", &self.instructor, |id| {
                tables.instructor(InstructorId(id)).is_some()
            })
            .map(|id| Some(InstructorId(id)))
        };

        if let Some(code) = &code {
            if let Some(existing) = tables.course_by_code(code) {
                if Some(existing.id) != self.instance {
                    errors.add("code", unique_message("Course", "Code"));
                }
            }
        }

        let cleaned = match (code, title, credits, instructor) {
            (Some(code), Some(title), Some(credits), Some(instructor)) => Some(NewCourse {
                code,
                title,
                credits,
                instructor,
            }),
            _ => None,
        };
        errors.into_result(cleaned)
    }
}

// ---- Enrollment ----

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrollmentForm {
    pub instance: Option<EnrollmentId>,
    pub student: String,
    pub course: String,
    pub enrollment_date: String,
    pub grade: String,
}

impl EnrollmentForm {
    pub fn from_record(enrollment: &Enrollment) -> Self {
        Self {
            instance: Some(enrollment.id),
            student: enrollment.student.to_string(),
            course: enrollment.course.to_string(),
            enrollment_date: enrollment.enrollment_date.format(DATE_FORMAT).to_string(),
            grade: enrollment.grade.clone().unwrap_or_default(),
        }
    }
}

impl ModelForm for EnrollmentForm {
    type Cleaned = NewEnrollment;

    /// Besides field checks, rejects a (student, course) pair that another
    /// enrollment already holds. With no other errors this surfaces as
    /// [`AdminError::DuplicateEnrollment`]; otherwise it is listed with them.
    fn clean(&self, tables: &Tables) -> Result<NewEnrollment> {
        let mut errors = FormErrors::new();
        let student = clean_reference(&mut errors, "student", &self.student, |id| {
            tables.student(StudentId(id)).is_some()
        })
        .map(StudentId);
        let course = clean_reference(&mut errors, "course", &self.course, |id| {
            tables.course(CourseId(id)).is_some()
        })
        .map(CourseId);
        let enrollment_date = clean_date(&mut errors, "enrollment_date", &self.enrollment_date);
        let grade = clean_optional_text(&mut errors, "grade", &self.grade, GRADE_MAX_LENGTH);

        if let (Some(student), Some(course)) = (student, course) {
            if enrollment_conflict_exists(tables, student, course, self.instance) {
                if errors.is_empty() {
                    return Err(AdminError::DuplicateEnrollment { student, course });
                }
                errors.add(NON_FIELD_ERRORS, DUPLICATE_ENROLLMENT);
            }
        }

        let cleaned = match (student, course, enrollment_date, grade) {
            (Some(student), Some(course), Some(enrollment_date), Some(grade)) => {
                Some(NewEnrollment {
                    student,
                    course,
                    enrollment_date,
                    grade,
                })
            }
            _ => None,
        };
        errors.into_result(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables_with_alice() -> (Tables, StudentId, CourseId) {
        let mut tables = Tables::new();
        let alice = StudentForm {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            department: "CS".to_string(),
            enrollment_date: "2023-09-01".to_string(),
            ..Default::default()
        }
        .clean(&tables)
        .unwrap();
        let s = tables.insert_student(alice).unwrap();
        let c = tables
            .insert_course(NewCourse {
                code: "CS101".to_string(),
                title: "Intro".to_string(),
                credits: 3,
                instructor: None,
            })
            .unwrap();
        (tables, s, c)
    }

    fn validation_errors(result: Result<impl fmt::Debug>) -> FormErrors {
        match result {
            Err(AdminError::ValidationError(errors)) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_student_form_trims_and_cleans() {
        let cleaned = StudentForm {
            name: "  Bob ".to_string(),
            email: "bob@example.com".to_string(),
            department: "Math".to_string(),
            enrollment_date: "2024-02-29".to_string(),
            ..Default::default()
        }
        .clean(&Tables::new())
        .unwrap();
        assert_eq!(cleaned.name, "Bob");
        assert_eq!(
            cleaned.enrollment_date,
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn test_student_form_collects_all_errors() {
        let errors = validation_errors(StudentForm::default().clean(&Tables::new()));
        for field in ["name", "email", "department", "enrollment_date"] {
            assert_eq!(errors.get(field), [REQUIRED.to_string()]);
        }
    }

    #[test]
    fn test_student_form_rejects_bad_email_and_date() {
        let errors = validation_errors(
            StudentForm {
                name: "Bob".to_string(),
                email: "not-an-email".to_string(),
                department: "Math".to_string(),
                enrollment_date: "2024-13-01".to_string(),
                ..Default::default()
            }
            .clean(&Tables::new()),
        );
        assert_eq!(errors.get("email"), [INVALID_EMAIL.to_string()]);
        assert_eq!(errors.get("enrollment_date"), [INVALID_DATE.to_string()]);
    }

    #[test]
    fn test_student_form_duplicate_email() {
        let (tables, alice, _) = tables_with_alice();
        let mut form = StudentForm::from_record(tables.student(alice).unwrap());
        form.instance = None;
        let errors = validation_errors(form.clean(&tables));
        assert_eq!(
            errors.get("email"),
            ["Student with this Email already exists.".to_string()]
        );

        // editing Alice herself keeps her email
        let form = StudentForm::from_record(tables.student(alice).unwrap());
        assert!(form.clean(&tables).is_ok());
    }

    #[test]
    fn test_max_length() {
        let errors = validation_errors(
            CourseForm {
                code: "X".repeat(21),
                title: "T".to_string(),
                credits: "3".to_string(),
                ..Default::default()
            }
            .clean(&Tables::new()),
        );
        assert_eq!(
            errors.get("code"),
            ["Ensure this value has at most 20 characters (it has 21).".to_string()]
        );
    }

    #[test]
    fn test_course_credits_range() {
        let form = |credits: &str| CourseForm {
            code: "CS1".to_string(),
            title: "T".to_string(),
            credits: credits.to_string(),
            ..Default::default()
        };
        let tables = Tables::new();
        assert!(form("0").clean(&tables).is_ok());
        assert!(form("32767").clean(&tables).is_ok());
        assert!(validation_errors(form("32768").clean(&tables)).has("credits"));
        assert!(validation_errors(form("-1").clean(&tables)).has("credits"));
        assert!(validation_errors(form("three").clean(&tables)).has("credits"));
    }

    #[test]
    fn test_course_unknown_instructor() {
        let errors = validation_errors(
            CourseForm {
                code: "CS1".to_string(),
                title: "T".to_string(),
                credits: "3".to_string(),
                instructor: "9".to_string(),
                ..Default::default()
            }
            .clean(&Tables::new()),
        );
        assert_eq!(errors.get("instructor"), [INVALID_CHOICE.to_string()]);
    }

    #[test]
    fn test_enrollment_form_duplicate() {
        let (mut tables, s, c) = tables_with_alice();
        let form = EnrollmentForm {
            student: s.to_string(),
            course: c.to_string(),
            enrollment_date: "2024-01-10".to_string(),
            ..Default::default()
        };
        let new = form.clean(&tables).unwrap();
        assert_eq!(new.grade, None);
        let id = tables.insert_enrollment(new).unwrap();

        let err = form.clean(&tables).unwrap_err();
        assert!(matches!(err, AdminError::DuplicateEnrollment { .. }));

        // 編輯自己不算重複
        let mut edit = EnrollmentForm::from_record(tables.enrollment(id).unwrap());
        edit.grade = "A".to_string();
        assert_eq!(edit.clean(&tables).unwrap().grade.as_deref(), Some("A"));
    }

    #[test]
    fn test_enrollment_duplicate_listed_with_other_errors() {
        let (mut tables, s, c) = tables_with_alice();
        tables
            .insert_enrollment(NewEnrollment {
                student: s,
                course: c,
                enrollment_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                grade: None,
            })
            .unwrap();

        let errors = validation_errors(
            EnrollmentForm {
                student: s.to_string(),
                course: c.to_string(),
                enrollment_date: "2024-02-01".to_string(),
                grade: "A++++".to_string(),
                ..Default::default()
            }
            .clean(&tables),
        );
        assert!(errors.has("grade"));
        assert_eq!(errors.get(NON_FIELD_ERRORS), [DUPLICATE_ENROLLMENT.to_string()]);
    }

    #[test]
    fn test_form_errors_display() {
        let mut errors = FormErrors::new();
        errors.add("email", INVALID_EMAIL);
        errors.add(NON_FIELD_ERRORS, DUPLICATE_ENROLLMENT);
        assert_eq!(
            errors.to_string(),
            "This student is already enrolled in this course.; email: Enter a valid email address."
        );
    }
}
