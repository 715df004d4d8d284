pub mod forms;
pub mod site;
pub mod views;

pub use forms::{CourseForm, EnrollmentForm, FormErrors, InstructorForm, ModelForm, StudentForm};
pub use site::AdminSite;
pub use views::{ChangeList, CourseDetail, ListQuery};
