use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const NAME_MAX_LENGTH: usize = 100;
pub const DEPARTMENT_MAX_LENGTH: usize = 100;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const COURSE_CODE_MAX_LENGTH: usize = 20;
pub const COURSE_TITLE_MAX_LENGTH: usize = 200;
pub const GRADE_MAX_LENGTH: usize = 4;
pub const CREDITS_MAX: u16 = 32767;

macro_rules! record_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(StudentId);
record_id!(InstructorId);
record_id!(CourseId);
record_id!(EnrollmentId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub email: String,
    pub department: String,
    pub enrollment_date: NaiveDate,
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructor {
    pub id: InstructorId,
    pub name: String,
    pub email: String,
    pub department: String,
    pub hire_date: NaiveDate,
}

impl fmt::Display for Instructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub code: String,
    pub title: String,
    pub credits: u16,
    /// Cleared, not cascaded, when the instructor is deleted.
    pub instructor: Option<InstructorId>,
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code, self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student: StudentId,
    pub course: CourseId,
    pub enrollment_date: NaiveDate,
    pub grade: Option<String>,
}

// 已清理過的寫入資料 (表單 clean 之後的結果)

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub name: String,
    pub email: String,
    pub department: String,
    pub enrollment_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstructor {
    pub name: String,
    pub email: String,
    pub department: String,
    pub hire_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCourse {
    pub code: String,
    pub title: String,
    pub credits: u16,
    pub instructor: Option<InstructorId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollment {
    pub student: StudentId,
    pub course: CourseId,
    pub enrollment_date: NaiveDate,
    pub grade: Option<String>,
}

impl NewStudent {
    pub fn into_record(self, id: StudentId) -> Student {
        Student {
            id,
            name: self.name,
            email: self.email,
            department: self.department,
            enrollment_date: self.enrollment_date,
        }
    }
}

impl NewInstructor {
    pub fn into_record(self, id: InstructorId) -> Instructor {
        Instructor {
            id,
            name: self.name,
            email: self.email,
            department: self.department,
            hire_date: self.hire_date,
        }
    }
}

impl NewCourse {
    pub fn into_record(self, id: CourseId) -> Course {
        Course {
            id,
            code: self.code,
            title: self.title,
            credits: self.credits,
            instructor: self.instructor,
        }
    }
}

impl NewEnrollment {
    pub fn into_record(self, id: EnrollmentId) -> Enrollment {
        Enrollment {
            id,
            student: self.student,
            course: self.course,
            enrollment_date: self.enrollment_date,
            grade: self.grade,
        }
    }
}
