use crate::domain::model::{
    Course, CourseId, Enrollment, EnrollmentId, Instructor, InstructorId, NewCourse,
    NewEnrollment, NewInstructor, NewStudent, Student, StudentId,
};
use crate::domain::ports::EnrollmentLookup;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const UNIQUE_STUDENT_EMAIL: &str = "unique_student_email";
pub const UNIQUE_INSTRUCTOR_EMAIL: &str = "unique_instructor_email";
pub const UNIQUE_COURSE_CODE: &str = "unique_course_code";
pub const UNIQUE_ENROLLMENT: &str = "unique_enrollment";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("unique constraint '{constraint}' failed on {table}: {key}")]
    UniqueViolation {
        table: &'static str,
        constraint: &'static str,
        key: String,
    },

    #[error("foreign key constraint failed on {table}: {key}")]
    ForeignKeyViolation { table: &'static str, key: String },

    #[error("{table} row {id} not found")]
    RowNotFound { table: &'static str, id: u64 },

    #[error("no ids left in {table}")]
    IdExhausted { table: &'static str },
}

/// Rows of every table as persisted on disk. Indexes are rebuilt on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TablesSnapshot {
    pub next_ids: NextIds,
    pub students: Vec<Student>,
    pub instructors: Vec<Instructor>,
    pub courses: Vec<Course>,
    pub enrollments: Vec<Enrollment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextIds {
    pub student: u64,
    pub instructor: u64,
    pub course: u64,
    pub enrollment: u64,
}

impl Default for NextIds {
    fn default() -> Self {
        Self {
            student: 1,
            instructor: 1,
            course: 1,
            enrollment: 1,
        }
    }
}

/// In-memory relational store for the four admin tables.
///
/// Every write goes through the unique indexes and foreign-key checks below,
/// so the invariants hold no matter which layer issued the write.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    students: BTreeMap<StudentId, Student>,
    instructors: BTreeMap<InstructorId, Instructor>,
    courses: BTreeMap<CourseId, Course>,
    enrollments: BTreeMap<EnrollmentId, Enrollment>,

    student_email_index: BTreeMap<String, StudentId>,
    instructor_email_index: BTreeMap<String, InstructorId>,
    course_code_index: BTreeMap<String, CourseId>,
    // unique_enrollment: (student, course) -> enrollment
    enrollment_pair_index: BTreeMap<(StudentId, CourseId), EnrollmentId>,

    next_ids: NextIds,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- students ----

    pub fn student(&self, id: StudentId) -> Option<&Student> {
        self.students.get(&id)
    }

    pub fn students(&self) -> impl Iterator<Item = &Student> {
        self.students.values()
    }

    pub fn student_by_email(&self, email: &str) -> Option<&Student> {
        self.student_email_index
            .get(email)
            .and_then(|id| self.students.get(id))
    }

    pub fn insert_student(&mut self, new: NewStudent) -> Result<StudentId, StorageError> {
        let id = StudentId(self.next_ids.student);
        let following = id_after(id.get(), "students")?;
        self.put_student(new.into_record(id))?;
        self.next_ids.student = following;
        Ok(id)
    }

    pub fn update_student(&mut self, id: StudentId, new: NewStudent) -> Result<(), StorageError> {
        let old_email = self
            .students
            .get(&id)
            .map(|s| s.email.clone())
            .ok_or(StorageError::RowNotFound {
                table: "students",
                id: id.get(),
            })?;
        check_unique(
            &self.student_email_index,
            &new.email,
            id,
            "students",
            UNIQUE_STUDENT_EMAIL,
        )?;
        self.student_email_index.remove(&old_email);
        self.student_email_index.insert(new.email.clone(), id);
        self.students.insert(id, new.into_record(id));
        Ok(())
    }

    /// Deletes the student and, by cascade, all of their enrollments.
    pub fn delete_student(&mut self, id: StudentId) -> Result<Vec<EnrollmentId>, StorageError> {
        let student = self.students.remove(&id).ok_or(StorageError::RowNotFound {
            table: "students",
            id: id.get(),
        })?;
        self.student_email_index.remove(&student.email);

        let cascaded: Vec<EnrollmentId> = self
            .enrollments
            .values()
            .filter(|e| e.student == id)
            .map(|e| e.id)
            .collect();
        for enrollment_id in &cascaded {
            self.remove_enrollment_row(*enrollment_id);
        }
        Ok(cascaded)
    }

    fn put_student(&mut self, record: Student) -> Result<(), StorageError> {
        check_unique(
            &self.student_email_index,
            &record.email,
            record.id,
            "students",
            UNIQUE_STUDENT_EMAIL,
        )?;
        self.student_email_index
            .insert(record.email.clone(), record.id);
        self.students.insert(record.id, record);
        Ok(())
    }

    // ---- instructors ----

    pub fn instructor(&self, id: InstructorId) -> Option<&Instructor> {
        self.instructors.get(&id)
    }

    pub fn instructors(&self) -> impl Iterator<Item = &Instructor> {
        self.instructors.values()
    }

    pub fn instructor_by_email(&self, email: &str) -> Option<&Instructor> {
        self.instructor_email_index
            .get(email)
            .and_then(|id| self.instructors.get(id))
    }

    pub fn insert_instructor(&mut self, new: NewInstructor) -> Result<InstructorId, StorageError> {
        let id = InstructorId(self.next_ids.instructor);
        let following = id_after(id.get(), "instructors")?;
        self.put_instructor(new.into_record(id))?;
        self.next_ids.instructor = following;
        Ok(id)
    }

    pub fn update_instructor(
        &mut self,
        id: InstructorId,
        new: NewInstructor,
    ) -> Result<(), StorageError> {
        let old_email = self
            .instructors
            .get(&id)
            .map(|i| i.email.clone())
            .ok_or(StorageError::RowNotFound {
                table: "instructors",
                id: id.get(),
            })?;
        check_unique(
            &self.instructor_email_index,
            &new.email,
            id,
            "instructors",
            UNIQUE_INSTRUCTOR_EMAIL,
        )?;
        self.instructor_email_index.remove(&old_email);
        self.instructor_email_index.insert(new.email.clone(), id);
        self.instructors.insert(id, new.into_record(id));
        Ok(())
    }

    /// Deletes the instructor and clears the instructor reference on their courses.
    pub fn delete_instructor(&mut self, id: InstructorId) -> Result<Vec<CourseId>, StorageError> {
        let instructor = self
            .instructors
            .remove(&id)
            .ok_or(StorageError::RowNotFound {
                table: "instructors",
                id: id.get(),
            })?;
        self.instructor_email_index.remove(&instructor.email);

        let mut cleared = Vec::new();
        for course in self.courses.values_mut() {
            if course.instructor == Some(id) {
                course.instructor = None;
                cleared.push(course.id);
            }
        }
        Ok(cleared)
    }

    fn put_instructor(&mut self, record: Instructor) -> Result<(), StorageError> {
        check_unique(
            &self.instructor_email_index,
            &record.email,
            record.id,
            "instructors",
            UNIQUE_INSTRUCTOR_EMAIL,
        )?;
        self.instructor_email_index
            .insert(record.email.clone(), record.id);
        self.instructors.insert(record.id, record);
        Ok(())
    }

    // ---- courses ----

    pub fn course(&self, id: CourseId) -> Option<&Course> {
        self.courses.get(&id)
    }

    pub fn courses(&self) -> impl Iterator<Item = &Course> {
        self.courses.values()
    }

    pub fn course_by_code(&self, code: &str) -> Option<&Course> {
        self.course_code_index
            .get(code)
            .and_then(|id| self.courses.get(id))
    }

    pub fn insert_course(&mut self, new: NewCourse) -> Result<CourseId, StorageError> {
        let id = CourseId(self.next_ids.course);
        let following = id_after(id.get(), "courses")?;
        self.put_course(new.into_record(id))?;
        self.next_ids.course = following;
        Ok(id)
    }

    pub fn update_course(&mut self, id: CourseId, new: NewCourse) -> Result<(), StorageError> {
        let old_code = self
            .courses
            .get(&id)
            .map(|c| c.code.clone())
            .ok_or(StorageError::RowNotFound {
                table: "courses",
                id: id.get(),
            })?;
        self.check_instructor_exists(new.instructor)?;
        check_unique(
            &self.course_code_index,
            &new.code,
            id,
            "courses",
            UNIQUE_COURSE_CODE,
        )?;
        self.course_code_index.remove(&old_code);
        self.course_code_index.insert(new.code.clone(), id);
        self.courses.insert(id, new.into_record(id));
        Ok(())
    }

    /// Deletes the course and, by cascade, every enrollment in it.
    pub fn delete_course(&mut self, id: CourseId) -> Result<Vec<EnrollmentId>, StorageError> {
        let course = self.courses.remove(&id).ok_or(StorageError::RowNotFound {
            table: "courses",
            id: id.get(),
        })?;
        self.course_code_index.remove(&course.code);

        let cascaded: Vec<EnrollmentId> = self
            .enrollments
            .values()
            .filter(|e| e.course == id)
            .map(|e| e.id)
            .collect();
        for enrollment_id in &cascaded {
            self.remove_enrollment_row(*enrollment_id);
        }
        Ok(cascaded)
    }

    /// Number of courses taught by `instructor`.
    pub fn course_count(&self, instructor: InstructorId) -> usize {
        self.courses
            .values()
            .filter(|c| c.instructor == Some(instructor))
            .count()
    }

    fn put_course(&mut self, record: Course) -> Result<(), StorageError> {
        self.check_instructor_exists(record.instructor)?;
        check_unique(
            &self.course_code_index,
            &record.code,
            record.id,
            "courses",
            UNIQUE_COURSE_CODE,
        )?;
        self.course_code_index
            .insert(record.code.clone(), record.id);
        self.courses.insert(record.id, record);
        Ok(())
    }

    fn check_instructor_exists(&self, instructor: Option<InstructorId>) -> Result<(), StorageError> {
        match instructor {
            Some(id) if !self.instructors.contains_key(&id) => {
                Err(StorageError::ForeignKeyViolation {
                    table: "courses.instructor",
                    key: id.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    // ---- enrollments ----

    pub fn enrollment(&self, id: EnrollmentId) -> Option<&Enrollment> {
        self.enrollments.get(&id)
    }

    pub fn enrollments(&self) -> impl Iterator<Item = &Enrollment> {
        self.enrollments.values()
    }

    pub fn enrollments_for_course(&self, course: CourseId) -> Vec<&Enrollment> {
        self.enrollments
            .values()
            .filter(|e| e.course == course)
            .collect()
    }

    pub fn enrollments_for_student(&self, student: StudentId) -> Vec<&Enrollment> {
        self.enrollments
            .values()
            .filter(|e| e.student == student)
            .collect()
    }

    /// Number of students enrolled in `course`.
    pub fn enrollment_count(&self, course: CourseId) -> usize {
        self.enrollment_pair_index
            .keys()
            .filter(|(_, c)| *c == course)
            .count()
    }

    pub fn insert_enrollment(&mut self, new: NewEnrollment) -> Result<EnrollmentId, StorageError> {
        let id = EnrollmentId(self.next_ids.enrollment);
        let following = id_after(id.get(), "enrollments")?;
        self.put_enrollment(new.into_record(id))?;
        self.next_ids.enrollment = following;
        Ok(id)
    }

    pub fn update_enrollment(
        &mut self,
        id: EnrollmentId,
        new: NewEnrollment,
    ) -> Result<(), StorageError> {
        let old_pair = self
            .enrollments
            .get(&id)
            .map(|e| (e.student, e.course))
            .ok_or(StorageError::RowNotFound {
                table: "enrollments",
                id: id.get(),
            })?;
        self.check_enrollment_refs(new.student, new.course)?;
        check_unique(
            &self.enrollment_pair_index,
            &(new.student, new.course),
            id,
            "enrollments",
            UNIQUE_ENROLLMENT,
        )?;
        self.enrollment_pair_index.remove(&old_pair);
        self.enrollment_pair_index
            .insert((new.student, new.course), id);
        self.enrollments.insert(id, new.into_record(id));
        Ok(())
    }

    pub fn delete_enrollment(&mut self, id: EnrollmentId) -> Result<(), StorageError> {
        if self.remove_enrollment_row(id).is_none() {
            return Err(StorageError::RowNotFound {
                table: "enrollments",
                id: id.get(),
            });
        }
        Ok(())
    }

    fn put_enrollment(&mut self, record: Enrollment) -> Result<(), StorageError> {
        self.check_enrollment_refs(record.student, record.course)?;
        check_unique(
            &self.enrollment_pair_index,
            &(record.student, record.course),
            record.id,
            "enrollments",
            UNIQUE_ENROLLMENT,
        )?;
        self.enrollment_pair_index
            .insert((record.student, record.course), record.id);
        self.enrollments.insert(record.id, record);
        Ok(())
    }

    fn remove_enrollment_row(&mut self, id: EnrollmentId) -> Option<Enrollment> {
        let removed = self.enrollments.remove(&id)?;
        self.enrollment_pair_index
            .remove(&(removed.student, removed.course));
        Some(removed)
    }

    fn check_enrollment_refs(&self, student: StudentId, course: CourseId) -> Result<(), StorageError> {
        if !self.students.contains_key(&student) {
            return Err(StorageError::ForeignKeyViolation {
                table: "enrollments.student",
                key: student.to_string(),
            });
        }
        if !self.courses.contains_key(&course) {
            return Err(StorageError::ForeignKeyViolation {
                table: "enrollments.course",
                key: course.to_string(),
            });
        }
        Ok(())
    }

    // ---- snapshot ----

    pub fn snapshot(&self) -> TablesSnapshot {
        TablesSnapshot {
            next_ids: self.next_ids,
            students: self.students.values().cloned().collect(),
            instructors: self.instructors.values().cloned().collect(),
            courses: self.courses.values().cloned().collect(),
            enrollments: self.enrollments.values().cloned().collect(),
        }
    }

    /// Rebuilds the tables and their indexes, re-checking every constraint.
    ///
    /// Parents are restored before children so foreign keys resolve.
    pub fn from_snapshot(snapshot: TablesSnapshot) -> Result<Self, StorageError> {
        let mut tables = Tables::new();

        for record in snapshot.instructors {
            reject_duplicate_id(&tables.instructors, record.id, "instructors")?;
            tables.put_instructor(record)?;
        }
        for record in snapshot.students {
            reject_duplicate_id(&tables.students, record.id, "students")?;
            tables.put_student(record)?;
        }
        for record in snapshot.courses {
            reject_duplicate_id(&tables.courses, record.id, "courses")?;
            tables.put_course(record)?;
        }
        for record in snapshot.enrollments {
            reject_duplicate_id(&tables.enrollments, record.id, "enrollments")?;
            tables.put_enrollment(record)?;
        }

        // ids are never reused, even if the file under-reports them
        tables.next_ids = NextIds {
            student: next_after(&tables.students, snapshot.next_ids.student, "students", |id| {
                id.get()
            })?,
            instructor: next_after(
                &tables.instructors,
                snapshot.next_ids.instructor,
                "instructors",
                |id| id.get(),
            )?,
            course: next_after(&tables.courses, snapshot.next_ids.course, "courses", |id| {
                id.get()
            })?,
            enrollment: next_after(
                &tables.enrollments,
                snapshot.next_ids.enrollment,
                "enrollments",
                |id| id.get(),
            )?,
        };
        Ok(tables)
    }
}

impl EnrollmentLookup for Tables {
    fn find_enrollment(&self, student: StudentId, course: CourseId) -> Option<EnrollmentId> {
        self.enrollment_pair_index.get(&(student, course)).copied()
    }
}

fn check_unique<K, I>(
    index: &BTreeMap<K, I>,
    key: &K,
    owner: I,
    table: &'static str,
    constraint: &'static str,
) -> Result<(), StorageError>
where
    K: Ord + std::fmt::Debug,
    I: PartialEq + Copy,
{
    match index.get(key) {
        Some(existing) if *existing != owner => Err(StorageError::UniqueViolation {
            table,
            constraint,
            key: format!("{:?}", key),
        }),
        _ => Ok(()),
    }
}

fn reject_duplicate_id<K: Ord + Copy + Into<u64>, V>(
    rows: &BTreeMap<K, V>,
    id: K,
    table: &'static str,
) -> Result<(), StorageError> {
    if rows.contains_key(&id) {
        return Err(StorageError::UniqueViolation {
            table,
            constraint: "primary_key",
            key: id.into().to_string(),
        });
    }
    Ok(())
}

/// The id handed out after `id`. `u64::MAX` is never assigned.
fn id_after(id: u64, table: &'static str) -> Result<u64, StorageError> {
    id.checked_add(1).ok_or(StorageError::IdExhausted { table })
}

fn next_after<K, V>(
    rows: &BTreeMap<K, V>,
    recorded: u64,
    table: &'static str,
    raw: impl Fn(&K) -> u64,
) -> Result<u64, StorageError> {
    let following = match rows.keys().next_back() {
        Some(max_id) => id_after(raw(max_id), table)?,
        None => 1,
    };
    Ok(recorded.max(following))
}
