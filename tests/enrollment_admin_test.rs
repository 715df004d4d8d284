use course_admin::app::{
    AdminSite, CourseForm, EnrollmentForm, InstructorForm, ListQuery, StudentForm,
};
use course_admin::core::tables::UNIQUE_ENROLLMENT;
use course_admin::core::{NewEnrollment, StorageError};
use course_admin::domain::model::{CourseId, InstructorId, StudentId};
use course_admin::{AdminError, MemoryStorage};

const DUPLICATE_MESSAGE: &str = "This student is already enrolled in this course.";

async fn empty_site() -> AdminSite<MemoryStorage> {
    AdminSite::open(MemoryStorage::new(), "school.json")
        .await
        .unwrap()
}

async fn add_student(site: &mut AdminSite<MemoryStorage>, name: &str, email: &str) -> StudentId {
    site.add_student(StudentForm {
        name: name.to_string(),
        email: email.to_string(),
        department: "Computer Science".to_string(),
        enrollment_date: "2024-09-01".to_string(),
        ..Default::default()
    })
    .await
    .unwrap()
}

async fn add_instructor(site: &mut AdminSite<MemoryStorage>, name: &str, email: &str) -> InstructorId {
    site.add_instructor(InstructorForm {
        name: name.to_string(),
        email: email.to_string(),
        department: "Computer Science".to_string(),
        hire_date: "2015-08-15".to_string(),
        ..Default::default()
    })
    .await
    .unwrap()
}

async fn add_course(
    site: &mut AdminSite<MemoryStorage>,
    code: &str,
    title: &str,
    instructor: Option<InstructorId>,
) -> CourseId {
    site.add_course(CourseForm {
        code: code.to_string(),
        title: title.to_string(),
        credits: "3".to_string(),
        instructor: instructor.map(|i| i.to_string()).unwrap_or_default(),
        ..Default::default()
    })
    .await
    .unwrap()
}

fn enrollment(student: StudentId, course: CourseId, grade: &str) -> EnrollmentForm {
    EnrollmentForm {
        student: student.to_string(),
        course: course.to_string(),
        enrollment_date: "2024-09-02".to_string(),
        grade: grade.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_student_enrolls_in_two_courses_once_each() {
    let mut site = empty_site().await;
    let alice = add_student(&mut site, "Alice", "alice@example.com").await;
    let cs101 = add_course(&mut site, "CS101", "Intro to Programming", None).await;
    let cs102 = add_course(&mut site, "CS102", "Data Structures", None).await;

    site.add_enrollment(enrollment(alice, cs101, "")).await.unwrap();
    site.add_enrollment(enrollment(alice, cs102, "")).await.unwrap();

    let err = site
        .add_enrollment(enrollment(alice, cs101, "A"))
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::DuplicateEnrollment { .. }));
    assert_eq!(err.to_string(), DUPLICATE_MESSAGE);
    assert_eq!(err.user_friendly_message(), DUPLICATE_MESSAGE);

    // 被拒絕的寫入不會留下任何資料
    assert_eq!(site.database().tables().enrollments().count(), 2);
    assert_eq!(site.database().tables().enrollment_count(cs101), 1);
}

#[tokio::test]
async fn test_storage_rejects_duplicate_when_form_check_is_bypassed() {
    let mut site = empty_site().await;
    let alice = add_student(&mut site, "Alice", "alice@example.com").await;
    let cs101 = add_course(&mut site, "CS101", "Intro to Programming", None).await;
    site.add_enrollment(enrollment(alice, cs101, "")).await.unwrap();

    let date = chrono::NaiveDate::from_ymd_opt(2024, 9, 3).unwrap();
    let raw = NewEnrollment {
        student: alice,
        course: cs101,
        enrollment_date: date,
        grade: None,
    };

    // Database write path re-runs the uniqueness check.
    let err = site
        .database_mut()
        .create_enrollment(raw.clone())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), DUPLICATE_MESSAGE);

    // Straight into the tables: the unique index still refuses it.
    let err = site
        .database_mut()
        .transaction(|t| Ok(t.insert_enrollment(raw)?))
        .await
        .unwrap_err();
    match err {
        AdminError::StorageError(StorageError::UniqueViolation { constraint, .. }) => {
            assert_eq!(constraint, UNIQUE_ENROLLMENT)
        }
        other => panic!("expected unique violation, got {:?}", other),
    }
    assert_eq!(site.database().tables().enrollments().count(), 1);
}

#[tokio::test]
async fn test_editing_grade_keeps_the_same_pair() {
    let mut site = empty_site().await;
    let alice = add_student(&mut site, "Alice", "alice@example.com").await;
    let cs101 = add_course(&mut site, "CS101", "Intro to Programming", None).await;
    let id = site.add_enrollment(enrollment(alice, cs101, "")).await.unwrap();

    let mut form = EnrollmentForm::from_record(site.enrollment(id).unwrap());
    form.grade = "B+".to_string();
    site.change_enrollment(id, form).await.unwrap();

    let saved = site.enrollment(id).unwrap();
    assert_eq!(saved.grade.as_deref(), Some("B+"));
    assert_eq!((saved.student, saved.course), (alice, cs101));
}

#[tokio::test]
async fn test_moving_enrollment_onto_an_existing_pair_is_rejected() {
    let mut site = empty_site().await;
    let alice = add_student(&mut site, "Alice", "alice@example.com").await;
    let cs101 = add_course(&mut site, "CS101", "Intro to Programming", None).await;
    let cs102 = add_course(&mut site, "CS102", "Data Structures", None).await;
    site.add_enrollment(enrollment(alice, cs101, "")).await.unwrap();
    let second = site.add_enrollment(enrollment(alice, cs102, "")).await.unwrap();

    let mut form = EnrollmentForm::from_record(site.enrollment(second).unwrap());
    form.course = cs101.to_string();
    let err = site.change_enrollment(second, form).await.unwrap_err();
    assert_eq!(err.to_string(), DUPLICATE_MESSAGE);
    assert_eq!(site.enrollment(second).unwrap().course, cs102);
}

#[tokio::test]
async fn test_duplicate_listed_with_other_field_errors() {
    let mut site = empty_site().await;
    let alice = add_student(&mut site, "Alice", "alice@example.com").await;
    let cs101 = add_course(&mut site, "CS101", "Intro to Programming", None).await;
    site.add_enrollment(enrollment(alice, cs101, "")).await.unwrap();

    let mut form = enrollment(alice, cs101, "");
    form.enrollment_date = "not-a-date".to_string();
    match site.add_enrollment(form).await.unwrap_err() {
        AdminError::ValidationError(errors) => {
            assert!(errors.has("enrollment_date"));
            assert_eq!(errors.get("__all__"), &[DUPLICATE_MESSAGE.to_string()]);
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_deleting_course_cascades_to_enrollments() {
    let mut site = empty_site().await;
    let alice = add_student(&mut site, "Alice", "alice@example.com").await;
    let bob = add_student(&mut site, "Bob", "bob@example.com").await;
    let cs101 = add_course(&mut site, "CS101", "Intro to Programming", None).await;
    let cs102 = add_course(&mut site, "CS102", "Data Structures", None).await;
    site.add_enrollment(enrollment(alice, cs101, "")).await.unwrap();
    site.add_enrollment(enrollment(bob, cs101, "")).await.unwrap();
    site.add_enrollment(enrollment(alice, cs102, "")).await.unwrap();

    let removed = site.delete_course(cs101).await.unwrap();
    assert_eq!(removed.len(), 2);

    let tables = site.database().tables();
    assert!(tables.course(cs101).is_none());
    assert_eq!(tables.enrollments().count(), 1);
    assert!(tables.enrollments().all(|e| e.course == cs102));
    // Students survive the cascade.
    assert!(tables.student(alice).is_some());
    assert!(tables.student(bob).is_some());
}

#[tokio::test]
async fn test_deleting_student_cascades_to_enrollments() {
    let mut site = empty_site().await;
    let alice = add_student(&mut site, "Alice", "alice@example.com").await;
    let cs101 = add_course(&mut site, "CS101", "Intro to Programming", None).await;
    let cs102 = add_course(&mut site, "CS102", "Data Structures", None).await;
    site.add_enrollment(enrollment(alice, cs101, "")).await.unwrap();
    site.add_enrollment(enrollment(alice, cs102, "")).await.unwrap();
    assert_eq!(site.database().tables().enrollments_for_student(alice).len(), 2);

    let removed = site.delete_student(alice).await.unwrap();
    assert_eq!(removed.len(), 2);
    assert!(site.database().tables().enrollments_for_student(alice).is_empty());
    assert_eq!(site.database().tables().enrollments().count(), 0);
    assert_eq!(site.database().tables().courses().count(), 2);
}

#[tokio::test]
async fn test_deleting_instructor_leaves_courses_without_instructor() {
    let mut site = empty_site().await;
    let smith = add_instructor(&mut site, "Dr. Smith", "smith@example.com").await;
    let cs101 = add_course(&mut site, "CS101", "Intro to Programming", Some(smith)).await;
    let cs102 = add_course(&mut site, "CS102", "Data Structures", Some(smith)).await;

    let cleared = site.delete_instructor(smith).await.unwrap();
    assert_eq!(cleared, vec![cs101, cs102]);

    assert_eq!(site.course(cs101).unwrap().instructor, None);
    assert_eq!(site.course(cs102).unwrap().instructor, None);
    let detail = site.course_detail(cs101).unwrap();
    assert!(detail.instructor.is_none());
    assert!(detail.to_string().contains("Instructor: -"));
}

#[tokio::test]
async fn test_unique_emails_and_course_codes() {
    let mut site = empty_site().await;
    add_student(&mut site, "Alice", "alice@example.com").await;
    add_instructor(&mut site, "Dr. Smith", "smith@example.com").await;
    add_course(&mut site, "CS101", "Intro to Programming", None).await;

    let err = site
        .add_student(StudentForm {
            name: "Alice Again".to_string(),
            email: "alice@example.com".to_string(),
            department: "Math".to_string(),
            enrollment_date: "2024-09-01".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    match err {
        AdminError::ValidationError(errors) => assert_eq!(
            errors.get("email"),
            &["Student with this Email already exists.".to_string()]
        ),
        other => panic!("expected validation error, got {:?}", other),
    }

    // Instructor emails are checked only against instructors.
    add_instructor(&mut site, "Alice", "alice@example.com").await;

    let err = site
        .add_course(CourseForm {
            code: "CS101".to_string(),
            title: "Another Intro".to_string(),
            credits: "4".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    match err {
        AdminError::ValidationError(errors) => assert_eq!(
            errors.get("code"),
            &["Course with this Code already exists.".to_string()]
        ),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(site.database().tables().courses().count(), 1);
}

#[tokio::test]
async fn test_inline_enrollments_are_saved_together_or_not_at_all() {
    let mut site = empty_site().await;
    let alice = add_student(&mut site, "Alice", "alice@example.com").await;
    let bob = add_student(&mut site, "Bob", "bob@example.com").await;
    let cs101 = add_course(&mut site, "CS101", "Intro to Programming", None).await;
    let cs102 = add_course(&mut site, "CS102", "Data Structures", None).await;
    site.add_enrollment(enrollment(alice, cs102, "")).await.unwrap();

    // The same student twice in one batch.
    let err = site
        .add_inline_enrollments(
            cs101,
            vec![enrollment(alice, cs101, ""), enrollment(alice, cs101, "A")],
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), DUPLICATE_MESSAGE);
    assert_eq!(site.database().tables().enrollment_count(cs101), 0);

    // One bad row blocks the whole batch; errors are keyed by row.
    let mut bad = enrollment(bob, cs101, "");
    bad.enrollment_date = String::new();
    match site
        .add_inline_enrollments(cs101, vec![enrollment(alice, cs101, ""), bad])
        .await
        .unwrap_err()
    {
        AdminError::ValidationError(errors) => assert!(errors.has("form-1-enrollment_date")),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(site.database().tables().enrollment_count(cs101), 0);

    // The course on each row is forced to the page's course.
    let ids = site
        .add_inline_enrollments(cs101, vec![enrollment(alice, cs102, ""), enrollment(bob, cs101, "")])
        .await
        .unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(site.database().tables().enrollment_count(cs101), 2);

    let detail = site.course_detail(cs101).unwrap();
    assert_eq!(detail.enrollments.len(), 2);
}

#[tokio::test]
async fn test_inline_duplicate_reported_with_other_row_errors() {
    let mut site = empty_site().await;
    let alice = add_student(&mut site, "Alice", "alice@example.com").await;
    let bob = add_student(&mut site, "Bob", "bob@example.com").await;
    let carol = add_student(&mut site, "Carol", "carol@example.com").await;
    let cs101 = add_course(&mut site, "CS101", "Intro to Programming", None).await;
    site.add_enrollment(enrollment(alice, cs101, "")).await.unwrap();

    // Row 0 is already enrolled, row 1 has a bad date, row 3 repeats row 2's student.
    let mut bad_date = enrollment(bob, cs101, "");
    bad_date.enrollment_date = "2024-13-01".to_string();
    let rows = vec![
        enrollment(alice, cs101, ""),
        bad_date,
        enrollment(carol, cs101, ""),
        enrollment(carol, cs101, "B"),
    ];
    match site.add_inline_enrollments(cs101, rows).await.unwrap_err() {
        AdminError::ValidationError(errors) => {
            assert_eq!(errors.get("form-0-__all__"), &[DUPLICATE_MESSAGE.to_string()]);
            assert!(errors.has("form-1-enrollment_date"));
            assert!(!errors.has("form-2-__all__"));
            assert_eq!(errors.get("form-3-__all__"), &[DUPLICATE_MESSAGE.to_string()]);
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(site.database().tables().enrollment_count(cs101), 1);
}

#[tokio::test]
async fn test_enrollment_list_filters_by_course() {
    let mut site = empty_site().await;
    let alice = add_student(&mut site, "Alice", "alice@example.com").await;
    let bob = add_student(&mut site, "Bob", "bob@example.com").await;
    let cs101 = add_course(&mut site, "CS101", "Intro to Programming", None).await;
    let cs102 = add_course(&mut site, "CS102", "Data Structures", None).await;
    site.add_enrollment(enrollment(alice, cs101, "A")).await.unwrap();
    site.add_enrollment(enrollment(bob, cs101, "")).await.unwrap();
    site.add_enrollment(enrollment(alice, cs102, "")).await.unwrap();

    let list = site
        .list_enrollments(&ListQuery::new().with_filter("course", cs101.to_string()))
        .unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list.column_values("grade"), vec!["-", "A"]);

    let list = site
        .list_enrollments(&ListQuery::new().with_search("data bob"))
        .unwrap();
    assert!(list.is_empty());

    let err = site
        .list_enrollments(&ListQuery::new().with_filter("grade", "A"))
        .unwrap_err();
    assert!(matches!(err, AdminError::InvalidLookup { .. }));
}
