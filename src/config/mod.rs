pub mod cli;
pub mod memory;
pub mod toml_config;

use crate::app::AdminSite;
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_file_extension, validate_one_of, validate_path, Validate,
};
use cli::LocalStorage;
use serde::{Deserialize, Serialize};
use toml_config::{TomlConfig, LOG_FORMATS, LOG_LEVELS};

#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
}

/// Effective settings: the TOML file (if any) with command-line overrides applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_dir: String,
    pub database_file: String,
    pub log_level: Option<String>,
    pub log_format: String,
    pub default_format: OutputFormat,
    pub verbose: bool,
}

impl Settings {
    pub fn resolve(file: Option<&TomlConfig>, data_dir: Option<&str>, verbose: bool) -> Self {
        let base = file.cloned().unwrap_or_default();
        Self {
            data_dir: data_dir.unwrap_or(base.data_dir()).to_string(),
            database_file: base.database_file().to_string(),
            log_level: base.log_level().map(str::to_string),
            log_format: base.log_format().to_string(),
            default_format: base.default_format(),
            verbose,
        }
    }

    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }
}

impl ConfigProvider for Settings {
    fn data_dir(&self) -> &str {
        &self.data_dir
    }

    fn database_file(&self) -> &str {
        &self.database_file
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_path("data_dir", &self.data_dir)?;
        validate_file_extension("database.file_name", &self.database_file, &["json"])?;
        if let Some(level) = &self.log_level {
            validate_one_of("logging.level", level, LOG_LEVELS)?;
        }
        validate_one_of("logging.format", &self.log_format, LOG_FORMATS)?;
        Ok(())
    }
}

/// Opens the admin site over the database file under `config.data_dir()`.
pub async fn open_local_site<C: ConfigProvider>(config: &C) -> Result<AdminSite<LocalStorage>> {
    let storage = LocalStorage::new(config.data_dir());
    tracing::debug!(
        "📂 Data file: {}",
        storage.base_path().join(config.database_file()).display()
    );
    AdminSite::open(storage, config.database_file()).await
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "course-admin")]
#[command(about = "Administer students, instructors, courses and enrollments")]
pub struct CliConfig {
    /// Path to the TOML configuration file (optional)
    #[arg(short, long, default_value = "course-admin.toml")]
    pub config: String,

    /// Directory holding the database file; overrides the config file
    #[arg(long)]
    pub data_dir: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    #[command(subcommand)]
    Student(StudentCommand),
    #[command(subcommand)]
    Instructor(InstructorCommand),
    #[command(subcommand)]
    Course(CourseCommand),
    #[command(subcommand)]
    Enrollment(EnrollmentCommand),
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Search terms; every term must match one of the search fields
    #[arg(long)]
    pub search: Option<String>,

    /// Exact-match filter as field=value (repeatable)
    #[arg(long = "filter")]
    pub filters: Vec<String>,

    /// Column to order by; prefix with '-' for descending
    #[arg(long, allow_hyphen_values = true)]
    pub order_by: Option<String>,

    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct StudentArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub department: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub enrollment_date: Option<String>,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum StudentCommand {
    Add(StudentArgs),
    Edit {
        id: u64,
        #[command(flatten)]
        fields: StudentArgs,
    },
    Delete {
        id: u64,
    },
    List(ListArgs),
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct InstructorArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub department: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub hire_date: Option<String>,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum InstructorCommand {
    Add(InstructorArgs),
    Edit {
        id: u64,
        #[command(flatten)]
        fields: InstructorArgs,
    },
    Delete {
        id: u64,
    },
    List(ListArgs),
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct CourseArgs {
    #[arg(long)]
    pub code: Option<String>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub credits: Option<String>,
    /// Instructor id
    #[arg(long, conflicts_with = "no_instructor")]
    pub instructor: Option<String>,
    /// Remove the instructor from the course
    #[arg(long)]
    pub no_instructor: bool,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum CourseCommand {
    Add(CourseArgs),
    Edit {
        id: u64,
        #[command(flatten)]
        fields: CourseArgs,
    },
    Delete {
        id: u64,
    },
    List(ListArgs),
    /// Show a course with its enrolled students
    Show {
        id: u64,
    },
    /// Enroll several students in a course at once
    Enroll {
        id: u64,
        #[arg(long = "student", required = true)]
        students: Vec<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,
        #[arg(long)]
        grade: Option<String>,
    },
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct EnrollmentArgs {
    /// Student id
    #[arg(long)]
    pub student: Option<String>,
    /// Course id
    #[arg(long)]
    pub course: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long, conflicts_with = "clear_grade")]
    pub grade: Option<String>,
    #[arg(long)]
    pub clear_grade: bool,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum EnrollmentCommand {
    Add(EnrollmentArgs),
    Edit {
        id: u64,
        #[command(flatten)]
        fields: EnrollmentArgs,
    },
    Delete {
        id: u64,
    },
    List(ListArgs),
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Loads the config file named by `--config` and applies the flag overrides.
    pub fn settings(&self) -> Result<Settings> {
        let file = TomlConfig::from_optional_file(&self.config)?;
        if let Some(file) = &file {
            file.validate()?;
        }
        Ok(Settings::resolve(
            file.as_ref(),
            self.data_dir.as_deref(),
            self.verbose,
        ))
    }
}
