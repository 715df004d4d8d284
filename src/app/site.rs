use crate::app::forms::{
    CourseForm, EnrollmentForm, FormErrors, InstructorForm, ModelForm, StudentForm,
    NON_FIELD_ERRORS,
};
use crate::app::views::{
    change_list, course_detail, ChangeList, CourseAdmin, CourseDetail, EnrollmentAdmin,
    InstructorAdmin, ListQuery, StudentAdmin,
};
use crate::core::{Database, Storage};
use crate::domain::model::*;
use crate::utils::error::{AdminError, Result};
use std::collections::BTreeSet;

/// The admin entry point: every create, edit, delete and listing goes through here.
///
/// Writes are cleaned by the model's form first, so users see field errors
/// and the duplicate-enrollment message instead of raw constraint failures.
pub struct AdminSite<S: Storage> {
    db: Database<S>,
}

fn log_rejected(action: &str, err: &AdminError) {
    tracing::warn!("❌ {} rejected: {}", action, err);
}

impl<S: Storage> AdminSite<S> {
    pub fn new(db: Database<S>) -> Self {
        Self { db }
    }

    pub async fn open(storage: S, file_name: impl Into<String>) -> Result<Self> {
        Ok(Self::new(Database::open(storage, file_name).await?))
    }

    pub fn database(&self) -> &Database<S> {
        &self.db
    }

    pub fn database_mut(&mut self) -> &mut Database<S> {
        &mut self.db
    }

    // ---- students ----

    pub fn student(&self, id: StudentId) -> Result<&Student> {
        self.db.tables().student(id).ok_or(AdminError::NotFound {
            model: "Student",
            id: id.get(),
        })
    }

    pub async fn add_student(&mut self, form: StudentForm) -> Result<StudentId> {
        let form = StudentForm {
            instance: None,
            ..form
        };
        let result = match form.clean(self.db.tables()) {
            Ok(new) => self.db.create_student(new).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(id) => tracing::info!("✅ Added student {}", self.student(*id)?),
            Err(e) => log_rejected("Add student", e),
        }
        result
    }

    pub async fn change_student(&mut self, id: StudentId, form: StudentForm) -> Result<()> {
        self.student(id)?;
        let form = StudentForm {
            instance: Some(id),
            ..form
        };
        let result = match form.clean(self.db.tables()) {
            Ok(new) => self.db.update_student(id, new).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(()) => tracing::info!("✅ Changed student {}", self.student(id)?),
            Err(e) => log_rejected("Change student", e),
        }
        result
    }

    /// Deletes the student together with their enrollments.
    pub async fn delete_student(&mut self, id: StudentId) -> Result<Vec<EnrollmentId>> {
        let label = self.student(id)?.to_string();
        let cascaded = self.db.delete_student(id).await?;
        tracing::info!(
            "🗑️ Deleted student {} and {} enrollment(s)",
            label,
            cascaded.len()
        );
        Ok(cascaded)
    }

    pub fn list_students(&self, query: &ListQuery) -> Result<ChangeList> {
        change_list(&StudentAdmin, self.db.tables(), query)
    }

    // ---- instructors ----

    pub fn instructor(&self, id: InstructorId) -> Result<&Instructor> {
        self.db.tables().instructor(id).ok_or(AdminError::NotFound {
            model: "Instructor",
            id: id.get(),
        })
    }

    pub async fn add_instructor(&mut self, form: InstructorForm) -> Result<InstructorId> {
        let form = InstructorForm {
            instance: None,
            ..form
        };
        let result = match form.clean(self.db.tables()) {
            Ok(new) => self.db.create_instructor(new).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(id) => tracing::info!("✅ Added instructor {}", self.instructor(*id)?),
            Err(e) => log_rejected("Add instructor", e),
        }
        result
    }

    pub async fn change_instructor(&mut self, id: InstructorId, form: InstructorForm) -> Result<()> {
        self.instructor(id)?;
        let form = InstructorForm {
            instance: Some(id),
            ..form
        };
        let result = match form.clean(self.db.tables()) {
            Ok(new) => self.db.update_instructor(id, new).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(()) => tracing::info!("✅ Changed instructor {}", self.instructor(id)?),
            Err(e) => log_rejected("Change instructor", e),
        }
        result
    }

    /// Deletes the instructor; their courses stay, with no instructor.
    pub async fn delete_instructor(&mut self, id: InstructorId) -> Result<Vec<CourseId>> {
        let label = self.instructor(id)?.to_string();
        let cleared = self.db.delete_instructor(id).await?;
        tracing::info!(
            "🗑️ Deleted instructor {}; {} course(s) left without instructor",
            label,
            cleared.len()
        );
        Ok(cleared)
    }

    pub fn list_instructors(&self, query: &ListQuery) -> Result<ChangeList> {
        change_list(&InstructorAdmin, self.db.tables(), query)
    }

    // ---- courses ----

    pub fn course(&self, id: CourseId) -> Result<&Course> {
        self.db.tables().course(id).ok_or(AdminError::NotFound {
            model: "Course",
            id: id.get(),
        })
    }

    pub async fn add_course(&mut self, form: CourseForm) -> Result<CourseId> {
        let form = CourseForm {
            instance: None,
            ..form
        };
        let result = match form.clean(self.db.tables()) {
            Ok(new) => self.db.create_course(new).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(id) => tracing::info!("✅ Added course {}", self.course(*id)?),
            Err(e) => log_rejected("Add course", e),
        }
        result
    }

    pub async fn change_course(&mut self, id: CourseId, form: CourseForm) -> Result<()> {
        self.course(id)?;
        let form = CourseForm {
            instance: Some(id),
            ..form
        };
        let result = match form.clean(self.db.tables()) {
            Ok(new) => self.db.update_course(id, new).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(()) => tracing::info!("✅ Changed course {}", self.course(id)?),
            Err(e) => log_rejected("Change course", e),
        }
        result
    }

    /// Deletes the course together with its enrollments.
    pub async fn delete_course(&mut self, id: CourseId) -> Result<Vec<EnrollmentId>> {
        let label = self.course(id)?.to_string();
        let cascaded = self.db.delete_course(id).await?;
        tracing::info!(
            "🗑️ Deleted course {} and {} enrollment(s)",
            label,
            cascaded.len()
        );
        Ok(cascaded)
    }

    pub fn list_courses(&self, query: &ListQuery) -> Result<ChangeList> {
        change_list(&CourseAdmin, self.db.tables(), query)
    }

    pub fn course_detail(&self, id: CourseId) -> Result<CourseDetail> {
        course_detail(self.db.tables(), id)
    }

    // ---- enrollments ----

    pub fn enrollment(&self, id: EnrollmentId) -> Result<&Enrollment> {
        self.db.tables().enrollment(id).ok_or(AdminError::NotFound {
            model: "Enrollment",
            id: id.get(),
        })
    }

    fn enrollment_label(&self, id: EnrollmentId) -> String {
        let tables = self.db.tables();
        match tables.enrollment(id) {
            Some(e) => {
                let student = tables
                    .student(e.student)
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                let course = tables
                    .course(e.course)
                    .map(|c| c.to_string())
                    .unwrap_or_default();
                format!("{} -> {}", student, course)
            }
            None => format!("enrollment {}", id),
        }
    }

    pub async fn add_enrollment(&mut self, form: EnrollmentForm) -> Result<EnrollmentId> {
        let form = EnrollmentForm {
            instance: None,
            ..form
        };
        let result = match form.clean(self.db.tables()) {
            Ok(new) => self.db.create_enrollment(new).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(id) => tracing::info!("✅ Added enrollment {}", self.enrollment_label(*id)),
            Err(e) => log_rejected("Add enrollment", e),
        }
        result
    }

    pub async fn change_enrollment(&mut self, id: EnrollmentId, form: EnrollmentForm) -> Result<()> {
        self.enrollment(id)?;
        let form = EnrollmentForm {
            instance: Some(id),
            ..form
        };
        let result = match form.clean(self.db.tables()) {
            Ok(new) => self.db.update_enrollment(id, new).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(()) => tracing::info!("✅ Changed enrollment {}", self.enrollment_label(id)),
            Err(e) => log_rejected("Change enrollment", e),
        }
        result
    }

    pub async fn delete_enrollment(&mut self, id: EnrollmentId) -> Result<()> {
        self.enrollment(id)?;
        let label = self.enrollment_label(id);
        self.db.delete_enrollment(id).await?;
        tracing::info!("🗑️ Deleted enrollment {}", label);
        Ok(())
    }

    pub fn list_enrollments(&self, query: &ListQuery) -> Result<ChangeList> {
        change_list(&EnrollmentAdmin, self.db.tables(), query)
    }

    /// Saves the inline enrollment rows of a course page.
    ///
    /// The rows are cleaned one by one, checked against each other for a
    /// repeated student, and then saved together or not at all. A duplicate
    /// alone is reported as [`AdminError::DuplicateEnrollment`]; next to other
    /// row errors it is listed as `form-<i>-__all__`.
    pub async fn add_inline_enrollments(
        &mut self,
        course: CourseId,
        forms: Vec<EnrollmentForm>,
    ) -> Result<Vec<EnrollmentId>> {
        self.course(course)?;
        let tables = self.db.tables();

        let mut errors = FormErrors::new();
        let mut duplicates = Vec::new();
        let mut batch = Vec::with_capacity(forms.len());
        let mut seen = BTreeSet::new();
        for (i, form) in forms.into_iter().enumerate() {
            let form = EnrollmentForm {
                instance: None,
                course: course.to_string(),
                ..form
            };
            match form.clean(tables) {
                Ok(new) if !seen.insert(new.student) => duplicates.push((i, new.student)),
                Ok(new) => batch.push(new),
                Err(AdminError::DuplicateEnrollment { student, .. }) => {
                    duplicates.push((i, student))
                }
                Err(AdminError::ValidationError(form_errors)) => {
                    errors.merge_prefixed(&format!("form-{}", i), form_errors);
                }
                Err(e) => {
                    log_rejected("Inline enrollments", &e);
                    return Err(e);
                }
            }
        }

        if let Some(&(_, student)) = duplicates.first() {
            if errors.is_empty() {
                let err = AdminError::DuplicateEnrollment { student, course };
                log_rejected("Inline enrollments", &err);
                return Err(err);
            }
            for (i, student) in duplicates {
                let message = AdminError::DuplicateEnrollment { student, course }.to_string();
                errors.add(&format!("form-{}-{}", i, NON_FIELD_ERRORS), message);
            }
        }
        if !errors.is_empty() {
            let err = AdminError::ValidationError(errors);
            log_rejected("Inline enrollments", &err);
            return Err(err);
        }

        let ids = self.db.create_enrollments(batch).await?;
        tracing::info!(
            "✅ Added {} enrollment(s) to {}",
            ids.len(),
            self.course(course)?
        );
        Ok(ids)
    }
}
