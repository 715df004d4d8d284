use crate::domain::model::{CourseId, EnrollmentId, StudentId};
use crate::utils::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
}

/// Read access to existing enrollments, keyed by their (student, course) pair.
pub trait EnrollmentLookup {
    fn find_enrollment(&self, student: StudentId, course: CourseId) -> Option<EnrollmentId>;
}

pub trait ConfigProvider: Send + Sync {
    fn data_dir(&self) -> &str;
    fn database_file(&self) -> &str;
}
