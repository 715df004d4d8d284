use crate::domain::model::{CourseId, EnrollmentId, StudentId};
use crate::domain::ports::EnrollmentLookup;
use crate::utils::error::{AdminError, Result};

/// Whether an enrollment other than `exclude` already exists for `(student, course)`.
///
/// `exclude` is the record being edited, so that saving an enrollment without
/// changing its pair does not flag it against itself.
pub fn enrollment_conflict_exists<L: EnrollmentLookup + ?Sized>(
    lookup: &L,
    student: StudentId,
    course: CourseId,
    exclude: Option<EnrollmentId>,
) -> bool {
    match lookup.find_enrollment(student, course) {
        Some(existing) => Some(existing) != exclude,
        None => false,
    }
}

/// Rejects a write that would enroll a student in the same course twice.
///
/// Runs from the enrollment form and again on the database write path; the
/// unique index in the storage engine stays the final authority.
pub fn check_enrollment_unique<L: EnrollmentLookup + ?Sized>(
    lookup: &L,
    student: StudentId,
    course: CourseId,
    exclude: Option<EnrollmentId>,
) -> Result<()> {
    if enrollment_conflict_exists(lookup, student, course, exclude) {
        tracing::debug!(
            student = student.get(),
            course = course.get(),
            "duplicate enrollment rejected"
        );
        return Err(AdminError::DuplicateEnrollment { student, course });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeLookup(HashMap<(StudentId, CourseId), EnrollmentId>);

    impl EnrollmentLookup for FakeLookup {
        fn find_enrollment(&self, student: StudentId, course: CourseId) -> Option<EnrollmentId> {
            self.0.get(&(student, course)).copied()
        }
    }

    fn lookup() -> FakeLookup {
        let mut map = HashMap::new();
        map.insert((StudentId(1), CourseId(1)), EnrollmentId(10));
        FakeLookup(map)
    }

    #[test]
    fn test_conflict_on_existing_pair() {
        let lookup = lookup();
        assert!(enrollment_conflict_exists(&lookup, StudentId(1), CourseId(1), None));
        assert!(enrollment_conflict_exists(
            &lookup,
            StudentId(1),
            CourseId(1),
            Some(EnrollmentId(11))
        ));
    }

    #[test]
    fn test_record_does_not_conflict_with_itself() {
        let lookup = lookup();
        assert!(!enrollment_conflict_exists(
            &lookup,
            StudentId(1),
            CourseId(1),
            Some(EnrollmentId(10))
        ));
    }

    #[test]
    fn test_other_pairs_are_free() {
        let lookup = lookup();
        assert!(!enrollment_conflict_exists(&lookup, StudentId(1), CourseId(2), None));
        assert!(!enrollment_conflict_exists(&lookup, StudentId(2), CourseId(1), None));
    }

    #[test]
    fn test_check_reports_friendly_message() {
        let err = check_enrollment_unique(&lookup(), StudentId(1), CourseId(1), None).unwrap_err();
        assert!(matches!(err, AdminError::DuplicateEnrollment { .. }));
        assert_eq!(err.to_string(), "This student is already enrolled in this course.");
    }
}
