//! Change lists: the list pages of the admin, built explicitly per model.

use crate::core::tables::Tables;
use crate::domain::model::*;
use crate::utils::error::{AdminError, Result};
use chrono::NaiveDate;
use std::fmt;

/// One displayed value. Ordering follows the variant order, then the value,
/// so counts sort numerically and dates chronologically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Cell {
    Empty,
    Int(i64),
    Date(NaiveDate),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => write!(f, "-"),
            Cell::Int(n) => write!(f, "{}", n),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        value.map(Cell::Text).unwrap_or(Cell::Empty)
    }
}

fn count(n: usize) -> Cell {
    Cell::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub header: &'static str,
}

const fn column(name: &'static str, header: &'static str) -> Column {
    Column { name, header }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub search: Option<String>,
    pub filters: Vec<(String, String)>,
    /// A list_display column name, `-` prefixed for descending order.
    pub order_by: Option<String>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn ordered_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    /// Parses a `field=value` filter argument.
    pub fn parse_filter(raw: &str) -> Result<(String, String)> {
        match raw.split_once('=') {
            Some((field, value)) if !field.trim().is_empty() => {
                Ok((field.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(AdminError::InvalidConfigValueError {
                field: "filter".to_string(),
                value: raw.to_string(),
                reason: "Expected field=value".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u64,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeList {
    pub model: &'static str,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl ChangeList {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.rows.iter().map(|r| r.id).collect()
    }

    /// The displayed values of `column`, top to bottom.
    pub fn column_values(&self, column: &str) -> Vec<String> {
        match self.columns.iter().position(|c| c.name == column) {
            Some(i) => self.rows.iter().map(|r| r.cells[i].to_string()).collect(),
            None => Vec::new(),
        }
    }

    pub fn render_table(&self) -> String {
        let mut headers = vec!["ID".to_string()];
        headers.extend(self.columns.iter().map(|c| c.header.to_string()));
        let body: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                let mut line = vec![row.id.to_string()];
                line.extend(row.cells.iter().map(Cell::to_string));
                line
            })
            .collect();

        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for line in &body {
            for (i, value) in line.iter().enumerate() {
                widths[i] = widths[i].max(value.chars().count());
            }
        }

        let format_line = |values: &[String]| -> String {
            values
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{:<width$}", v, width = *w))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = String::new();
        out.push_str(&format_line(&headers));
        out.push('\n');
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&format_line(&rule));
        out.push('\n');
        for line in &body {
            out.push_str(&format_line(line));
            out.push('\n');
        }
        out.push_str(&format!("{} {}", self.rows.len(), pluralize(self.model, self.rows.len())));
        out.push('\n');
        out
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut headers = vec!["id"];
        headers.extend(self.columns.iter().map(|c| c.name));
        writer.write_record(&headers)?;
        for row in &self.rows {
            let mut record = vec![row.id.to_string()];
            record.extend(row.cells.iter().map(|cell| match cell {
                Cell::Empty => String::new(),
                other => other.to_string(),
            }));
            writer.write_record(&record)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| AdminError::IoError(std::io::Error::new(e.error().kind(), e.to_string())))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn pluralize(model: &str, n: usize) -> String {
    let lower = model.to_lowercase();
    if n == 1 {
        lower
    } else {
        format!("{}s", lower)
    }
}

/// Per-model list configuration: what to show, what to search, what to filter.
pub trait ModelAdmin {
    type Record;

    fn model_name(&self) -> &'static str;
    fn records<'a>(&self, tables: &'a Tables) -> Vec<&'a Self::Record>;
    fn record_id(&self, record: &Self::Record) -> u64;
    fn list_display(&self) -> &'static [Column];
    fn cell(&self, column: &str, record: &Self::Record, tables: &Tables) -> Cell;
    /// Values matched by the search box.
    fn search_values(&self, record: &Self::Record, tables: &Tables) -> Vec<String>;

    fn list_filter(&self) -> &'static [&'static str] {
        &[]
    }

    fn filter_value(&self, _field: &str, _record: &Self::Record, _tables: &Tables) -> String {
        String::new()
    }

    /// Newest record first when no order is given; also the tie-breaker for `order_by`.
    fn newest_first(&self) -> bool {
        true
    }
}

/// Builds the change list for `admin`: filter, search, then order.
pub fn change_list<A: ModelAdmin>(
    admin: &A,
    tables: &Tables,
    query: &ListQuery,
) -> Result<ChangeList> {
    for (field, _) in &query.filters {
        if !admin.list_filter().contains(&field.as_str()) {
            return Err(AdminError::InvalidLookup {
                field: field.clone(),
            });
        }
    }

    let order = match &query.order_by {
        Some(raw) => {
            let (name, descending) = match raw.strip_prefix('-') {
                Some(name) => (name, true),
                None => (raw.as_str(), false),
            };
            let index = admin
                .list_display()
                .iter()
                .position(|c| c.name == name)
                .ok_or_else(|| AdminError::InvalidLookup {
                    field: raw.clone(),
                })?;
            Some((index, descending))
        }
        None => None,
    };

    let terms: Vec<String> = query
        .search
        .as_deref()
        .unwrap_or("")
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();

    let mut rows: Vec<Row> = admin
        .records(tables)
        .into_iter()
        .filter(|record| {
            query
                .filters
                .iter()
                .all(|(field, value)| admin.filter_value(field, record, tables) == *value)
        })
        .filter(|record| {
            if terms.is_empty() {
                return true;
            }
            let haystack: Vec<String> = admin
                .search_values(record, tables)
                .iter()
                .map(|v| v.to_lowercase())
                .collect();
            terms
                .iter()
                .all(|term| haystack.iter().any(|v| v.contains(term.as_str())))
        })
        .map(|record| Row {
            id: admin.record_id(record),
            cells: admin
                .list_display()
                .iter()
                .map(|c| admin.cell(c.name, record, tables))
                .collect(),
        })
        .collect();

    if admin.newest_first() {
        rows.reverse();
    }
    if let Some((index, descending)) = order {
        // 穩定排序：相同值時維持上面的 id 順序
        rows.sort_by(|a, b| {
            let ord = a.cells[index].cmp(&b.cells[index]);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
    }

    tracing::debug!(
        "{} change list: {} rows (search={:?}, filters={:?})",
        admin.model_name(),
        rows.len(),
        query.search,
        query.filters
    );

    Ok(ChangeList {
        model: admin.model_name(),
        columns: admin.list_display().to_vec(),
        rows,
    })
}

// ---- model admins ----

pub struct StudentAdmin;

impl ModelAdmin for StudentAdmin {
    type Record = Student;

    fn model_name(&self) -> &'static str {
        "Student"
    }

    fn records<'a>(&self, tables: &'a Tables) -> Vec<&'a Student> {
        tables.students().collect()
    }

    fn record_id(&self, record: &Student) -> u64 {
        record.id.get()
    }

    fn list_display(&self) -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            column("name", "Name"),
            column("email", "Email"),
            column("department", "Department"),
            column("enrollment_date", "Enrollment date"),
        ];
        COLUMNS
    }

    fn cell(&self, column: &str, record: &Student, _tables: &Tables) -> Cell {
        match column {
            "name" => Cell::Text(record.name.clone()),
            "email" => Cell::Text(record.email.clone()),
            "department" => Cell::Text(record.department.clone()),
            "enrollment_date" => Cell::Date(record.enrollment_date),
            _ => Cell::Empty,
        }
    }

    fn search_values(&self, record: &Student, _tables: &Tables) -> Vec<String> {
        vec![record.name.clone(), record.email.clone()]
    }

    fn list_filter(&self) -> &'static [&'static str] {
        &["department"]
    }

    fn filter_value(&self, field: &str, record: &Student, _tables: &Tables) -> String {
        match field {
            "department" => record.department.clone(),
            _ => String::new(),
        }
    }
}

pub struct InstructorAdmin;

impl ModelAdmin for InstructorAdmin {
    type Record = Instructor;

    fn model_name(&self) -> &'static str {
        "Instructor"
    }

    fn records<'a>(&self, tables: &'a Tables) -> Vec<&'a Instructor> {
        tables.instructors().collect()
    }

    fn record_id(&self, record: &Instructor) -> u64 {
        record.id.get()
    }

    fn list_display(&self) -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            column("name", "Name"),
            column("email", "Email"),
            column("department", "Department"),
            column("hire_date", "Hire date"),
            column("course_count", "Number of courses"),
        ];
        COLUMNS
    }

    fn cell(&self, column: &str, record: &Instructor, tables: &Tables) -> Cell {
        match column {
            "name" => Cell::Text(record.name.clone()),
            "email" => Cell::Text(record.email.clone()),
            "department" => Cell::Text(record.department.clone()),
            "hire_date" => Cell::Date(record.hire_date),
            "course_count" => count(tables.course_count(record.id)),
            _ => Cell::Empty,
        }
    }

    fn search_values(&self, record: &Instructor, _tables: &Tables) -> Vec<String> {
        vec![record.name.clone(), record.email.clone()]
    }
}

pub struct CourseAdmin;

impl ModelAdmin for CourseAdmin {
    type Record = Course;

    fn model_name(&self) -> &'static str {
        "Course"
    }

    fn records<'a>(&self, tables: &'a Tables) -> Vec<&'a Course> {
        tables.courses().collect()
    }

    fn record_id(&self, record: &Course) -> u64 {
        record.id.get()
    }

    fn list_display(&self) -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            column("code", "Code"),
            column("title", "Title"),
            column("instructor", "Instructor"),
            column("enrolled_count", "Enrolled students"),
        ];
        COLUMNS
    }

    fn cell(&self, column: &str, record: &Course, tables: &Tables) -> Cell {
        match column {
            "code" => Cell::Text(record.code.clone()),
            "title" => Cell::Text(record.title.clone()),
            "instructor" => record
                .instructor
                .and_then(|id| tables.instructor(id))
                .map(|i| i.to_string())
                .into(),
            "enrolled_count" => count(tables.enrollment_count(record.id)),
            _ => Cell::Empty,
        }
    }

    fn search_values(&self, record: &Course, _tables: &Tables) -> Vec<String> {
        vec![record.code.clone(), record.title.clone()]
    }
}

pub struct EnrollmentAdmin;

fn student_label(tables: &Tables, id: StudentId) -> Cell {
    tables.student(id).map(|s| s.to_string()).into()
}

fn course_label(tables: &Tables, id: CourseId) -> Cell {
    tables.course(id).map(|c| c.to_string()).into()
}

fn enrollment_cell(column: &str, record: &Enrollment, tables: &Tables) -> Cell {
    match column {
        "student" => student_label(tables, record.student),
        "course" => course_label(tables, record.course),
        "enrollment_date" => Cell::Date(record.enrollment_date),
        "grade" => record.grade.clone().into(),
        _ => Cell::Empty,
    }
}

impl ModelAdmin for EnrollmentAdmin {
    type Record = Enrollment;

    fn model_name(&self) -> &'static str {
        "Enrollment"
    }

    fn records<'a>(&self, tables: &'a Tables) -> Vec<&'a Enrollment> {
        tables.enrollments().collect()
    }

    fn record_id(&self, record: &Enrollment) -> u64 {
        record.id.get()
    }

    fn list_display(&self) -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            column("student", "Student"),
            column("course", "Course"),
            column("enrollment_date", "Enrollment date"),
            column("grade", "Grade"),
        ];
        COLUMNS
    }

    fn cell(&self, column: &str, record: &Enrollment, tables: &Tables) -> Cell {
        enrollment_cell(column, record, tables)
    }

    fn search_values(&self, record: &Enrollment, tables: &Tables) -> Vec<String> {
        let mut values = Vec::with_capacity(4);
        if let Some(student) = tables.student(record.student) {
            values.push(student.name.clone());
            values.push(student.email.clone());
        }
        if let Some(course) = tables.course(record.course) {
            values.push(course.code.clone());
            values.push(course.title.clone());
        }
        values
    }

    fn list_filter(&self) -> &'static [&'static str] {
        &["course"]
    }

    fn filter_value(&self, field: &str, record: &Enrollment, _tables: &Tables) -> String {
        match field {
            "course" => record.course.to_string(),
            _ => String::new(),
        }
    }
}

/// The enrollment rows shown inline on a course page.
pub struct EnrollmentInline {
    pub course: CourseId,
}

impl ModelAdmin for EnrollmentInline {
    type Record = Enrollment;

    fn model_name(&self) -> &'static str {
        "Enrollment"
    }

    fn records<'a>(&self, tables: &'a Tables) -> Vec<&'a Enrollment> {
        tables.enrollments_for_course(self.course)
    }

    fn record_id(&self, record: &Enrollment) -> u64 {
        record.id.get()
    }

    fn list_display(&self) -> &'static [Column] {
        const COLUMNS: &[Column] = &[
            column("student", "Student"),
            column("enrollment_date", "Enrollment date"),
            column("grade", "Grade"),
        ];
        COLUMNS
    }

    fn cell(&self, column: &str, record: &Enrollment, tables: &Tables) -> Cell {
        enrollment_cell(column, record, tables)
    }

    fn search_values(&self, record: &Enrollment, tables: &Tables) -> Vec<String> {
        tables
            .student(record.student)
            .map(|s| vec![s.name.clone(), s.email.clone()])
            .unwrap_or_default()
    }

    // inline rows keep the order they were added in
    fn newest_first(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseDetail {
    pub course: Course,
    pub instructor: Option<Instructor>,
    pub enrollments: ChangeList,
}

impl fmt::Display for CourseDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.course)?;
        writeln!(f, "  Credits:    {}", self.course.credits)?;
        match &self.instructor {
            Some(instructor) => writeln!(f, "  Instructor: {}", instructor)?,
            None => writeln!(f, "  Instructor: -")?,
        }
        writeln!(f, "  Enrolled students: {}", self.enrollments.len())?;
        writeln!(f)?;
        write!(f, "{}", self.enrollments.render_table())
    }
}

pub fn course_detail(tables: &Tables, id: CourseId) -> Result<CourseDetail> {
    let course = tables.course(id).cloned().ok_or(AdminError::NotFound {
        model: "Course",
        id: id.get(),
    })?;
    let instructor = course
        .instructor
        .and_then(|i| tables.instructor(i))
        .cloned();
    let enrollments = change_list(&EnrollmentInline { course: id }, tables, &ListQuery::new())?;
    Ok(CourseDetail {
        course,
        instructor,
        enrollments,
    })
}
