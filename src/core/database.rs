use crate::core::tables::{Tables, TablesSnapshot};
use crate::domain::model::{
    CourseId, EnrollmentId, InstructorId, NewCourse, NewEnrollment, NewInstructor, NewStudent,
    StudentId,
};
use crate::domain::ports::Storage;
use crate::domain::services::check_enrollment_unique;
use crate::utils::error::{AdminError, Result};
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_VERSION: u32 = 1;
pub const DEFAULT_DATABASE_FILE: &str = "course_admin.json";

#[derive(Debug, Serialize, Deserialize)]
struct DatabaseFile {
    version: u32,
    #[serde(flatten)]
    tables: TablesSnapshot,
}

/// The admin database: the storage engine plus a persisted JSON snapshot.
///
/// Each write runs as one transaction against a working copy of the tables.
/// The copy replaces the live tables only after it has been written to storage.
pub struct Database<S: Storage> {
    storage: S,
    file_name: String,
    tables: Tables,
}

impl<S: Storage> Database<S> {
    /// Opens the database file, starting empty when it does not exist yet.
    pub async fn open(storage: S, file_name: impl Into<String>) -> Result<Self> {
        let file_name = file_name.into();
        let tables = match storage.read_file(&file_name).await {
            Ok(bytes) => {
                let file: DatabaseFile = serde_json::from_slice(&bytes)?;
                if file.version > SNAPSHOT_VERSION {
                    return Err(AdminError::ConfigError {
                        message: format!(
                            "data file '{}' has version {}, newest supported is {}",
                            file_name, file.version, SNAPSHOT_VERSION
                        ),
                    });
                }
                let tables = Tables::from_snapshot(file.tables).map_err(|source| {
                    AdminError::CorruptDataFile {
                        file: file_name.clone(),
                        source,
                    }
                })?;
                tracing::debug!(
                    "Loaded {} students, {} instructors, {} courses, {} enrollments from {}",
                    tables.students().count(),
                    tables.instructors().count(),
                    tables.courses().count(),
                    tables.enrollments().count(),
                    file_name
                );
                tables
            }
            Err(AdminError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No data file at {}, starting with an empty database", file_name);
                Tables::new()
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            storage,
            file_name,
            tables,
        })
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Runs `f` as a single transaction.
    ///
    /// Nothing is visible, in memory or on disk, unless `f` succeeds and the
    /// snapshot is written.
    pub async fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Tables) -> Result<T>,
    {
        let mut working = self.tables.clone();
        let value = f(&mut working)?;
        self.persist(&working).await?;
        self.tables = working;
        Ok(value)
    }

    async fn persist(&self, tables: &Tables) -> Result<()> {
        let file = DatabaseFile {
            version: SNAPSHOT_VERSION,
            tables: tables.snapshot(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        self.storage.write_file(&self.file_name, &bytes).await
    }

    pub async fn create_student(&mut self, new: NewStudent) -> Result<StudentId> {
        self.transaction(|t| Ok(t.insert_student(new)?)).await
    }

    pub async fn update_student(&mut self, id: StudentId, new: NewStudent) -> Result<()> {
        self.transaction(|t| Ok(t.update_student(id, new)?)).await
    }

    pub async fn delete_student(&mut self, id: StudentId) -> Result<Vec<EnrollmentId>> {
        self.transaction(|t| Ok(t.delete_student(id)?)).await
    }

    pub async fn create_instructor(&mut self, new: NewInstructor) -> Result<InstructorId> {
        self.transaction(|t| Ok(t.insert_instructor(new)?)).await
    }

    pub async fn update_instructor(&mut self, id: InstructorId, new: NewInstructor) -> Result<()> {
        self.transaction(|t| Ok(t.update_instructor(id, new)?)).await
    }

    pub async fn delete_instructor(&mut self, id: InstructorId) -> Result<Vec<CourseId>> {
        self.transaction(|t| Ok(t.delete_instructor(id)?)).await
    }

    pub async fn create_course(&mut self, new: NewCourse) -> Result<CourseId> {
        self.transaction(|t| Ok(t.insert_course(new)?)).await
    }

    pub async fn update_course(&mut self, id: CourseId, new: NewCourse) -> Result<()> {
        self.transaction(|t| Ok(t.update_course(id, new)?)).await
    }

    pub async fn delete_course(&mut self, id: CourseId) -> Result<Vec<EnrollmentId>> {
        self.transaction(|t| Ok(t.delete_course(id)?)).await
    }

    /// Re-checks the (student, course) pair inside the write transaction, so
    /// the check and the insert see the same state.
    pub async fn create_enrollment(&mut self, new: NewEnrollment) -> Result<EnrollmentId> {
        self.transaction(|t| {
            check_enrollment_unique(t, new.student, new.course, None)?;
            Ok(t.insert_enrollment(new)?)
        })
        .await
    }

    /// Inserts all enrollments or none of them.
    pub async fn create_enrollments(
        &mut self,
        batch: Vec<NewEnrollment>,
    ) -> Result<Vec<EnrollmentId>> {
        self.transaction(|t| {
            let mut ids = Vec::with_capacity(batch.len());
            for new in batch {
                check_enrollment_unique(t, new.student, new.course, None)?;
                ids.push(t.insert_enrollment(new)?);
            }
            Ok(ids)
        })
        .await
    }

    pub async fn update_enrollment(&mut self, id: EnrollmentId, new: NewEnrollment) -> Result<()> {
        self.transaction(|t| {
            check_enrollment_unique(t, new.student, new.course, Some(id))?;
            Ok(t.update_enrollment(id, new)?)
        })
        .await
    }

    pub async fn delete_enrollment(&mut self, id: EnrollmentId) -> Result<()> {
        self.transaction(|t| Ok(t.delete_enrollment(id)?)).await
    }
}
