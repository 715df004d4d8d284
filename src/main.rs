use clap::Parser;
use course_admin::app::views::ChangeList;
use course_admin::app::{
    AdminSite, CourseForm, EnrollmentForm, InstructorForm, ListQuery, StudentForm,
};
use course_admin::config::{
    open_local_site, CliConfig, Command, CourseArgs, CourseCommand, EnrollmentArgs,
    EnrollmentCommand, InstructorArgs, InstructorCommand, ListArgs, OutputFormat, Settings,
    StudentArgs, StudentCommand,
};
use course_admin::core::Storage;
use course_admin::domain::model::{CourseId, EnrollmentId, InstructorId, StudentId};
use course_admin::utils::error::AdminError;
use course_admin::utils::{logger, validation::Validate};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    let settings = match cli.settings().and_then(|s| s.validate().map(|_| s)) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Failed to load config '{}': {}", cli.config, e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    };

    // 初始化日誌
    if settings.json_logs() {
        logger::init_json_logger(settings.verbose, settings.log_level.as_deref());
    } else {
        logger::init_cli_logger(settings.verbose, settings.log_level.as_deref());
    }
    tracing::debug!("Settings: {:?}", settings);

    let mut site = match open_local_site(&settings).await {
        Ok(site) => site,
        Err(e) => fail(&format!("Opening database in {}", settings.data_dir), &e),
    };

    if let Err(e) = run(&mut site, &settings, cli.command).await {
        fail("Command", &e);
    }
}

fn fail(action: &str, e: &AdminError) -> ! {
    tracing::error!(
        "❌ {} failed: {} (Category: {:?}, Severity: {:?})",
        action,
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

async fn run<S: Storage>(
    site: &mut AdminSite<S>,
    settings: &Settings,
    command: Command,
) -> course_admin::Result<()> {
    match command {
        Command::Student(cmd) => match cmd {
            StudentCommand::Add(fields) => {
                let id = site.add_student(student_form(StudentForm::default(), fields)).await?;
                println!("✅ Added student {}: {}", id, site.student(id)?);
            }
            StudentCommand::Edit { id, fields } => {
                let id = StudentId(id);
                let form = student_form(StudentForm::from_record(site.student(id)?), fields);
                site.change_student(id, form).await?;
                println!("✅ Changed student {}: {}", id, site.student(id)?);
            }
            StudentCommand::Delete { id } => {
                let cascaded = site.delete_student(StudentId(id)).await?;
                println!(
                    "🗑️ Deleted student {} ({} enrollment(s) removed)",
                    id,
                    cascaded.len()
                );
            }
            StudentCommand::List(args) => {
                let list = site.list_students(&list_query(&args)?)?;
                print_list(&list, args.format.unwrap_or(settings.default_format))?;
            }
        },
        Command::Instructor(cmd) => match cmd {
            InstructorCommand::Add(fields) => {
                let id = site
                    .add_instructor(instructor_form(InstructorForm::default(), fields))
                    .await?;
                println!("✅ Added instructor {}: {}", id, site.instructor(id)?);
            }
            InstructorCommand::Edit { id, fields } => {
                let id = InstructorId(id);
                let form =
                    instructor_form(InstructorForm::from_record(site.instructor(id)?), fields);
                site.change_instructor(id, form).await?;
                println!("✅ Changed instructor {}: {}", id, site.instructor(id)?);
            }
            InstructorCommand::Delete { id } => {
                let cleared = site.delete_instructor(InstructorId(id)).await?;
                println!(
                    "🗑️ Deleted instructor {} ({} course(s) now have no instructor)",
                    id,
                    cleared.len()
                );
            }
            InstructorCommand::List(args) => {
                let list = site.list_instructors(&list_query(&args)?)?;
                print_list(&list, args.format.unwrap_or(settings.default_format))?;
            }
        },
        Command::Course(cmd) => match cmd {
            CourseCommand::Add(fields) => {
                let id = site.add_course(course_form(CourseForm::default(), fields)).await?;
                println!("✅ Added course {}: {}", id, site.course(id)?);
            }
            CourseCommand::Edit { id, fields } => {
                let id = CourseId(id);
                let form = course_form(CourseForm::from_record(site.course(id)?), fields);
                site.change_course(id, form).await?;
                println!("✅ Changed course {}: {}", id, site.course(id)?);
            }
            CourseCommand::Delete { id } => {
                let cascaded = site.delete_course(CourseId(id)).await?;
                println!(
                    "🗑️ Deleted course {} ({} enrollment(s) removed)",
                    id,
                    cascaded.len()
                );
            }
            CourseCommand::List(args) => {
                let list = site.list_courses(&list_query(&args)?)?;
                print_list(&list, args.format.unwrap_or(settings.default_format))?;
            }
            CourseCommand::Show { id } => {
                print!("{}", site.course_detail(CourseId(id))?);
            }
            CourseCommand::Enroll {
                id,
                students,
                date,
                grade,
            } => {
                let forms = students
                    .into_iter()
                    .map(|student| EnrollmentForm {
                        student,
                        enrollment_date: date.clone(),
                        grade: grade.clone().unwrap_or_default(),
                        ..Default::default()
                    })
                    .collect();
                let ids = site.add_inline_enrollments(CourseId(id), forms).await?;
                println!("✅ Added {} enrollment(s) to {}", ids.len(), site.course(CourseId(id))?);
            }
        },
        Command::Enrollment(cmd) => match cmd {
            EnrollmentCommand::Add(fields) => {
                let id = site
                    .add_enrollment(enrollment_form(EnrollmentForm::default(), fields))
                    .await?;
                println!("✅ Added enrollment {}", id);
            }
            EnrollmentCommand::Edit { id, fields } => {
                let id = EnrollmentId(id);
                let form = enrollment_form(EnrollmentForm::from_record(site.enrollment(id)?), fields);
                site.change_enrollment(id, form).await?;
                println!("✅ Changed enrollment {}", id);
            }
            EnrollmentCommand::Delete { id } => {
                site.delete_enrollment(EnrollmentId(id)).await?;
                println!("🗑️ Deleted enrollment {}", id);
            }
            EnrollmentCommand::List(args) => {
                let list = site.list_enrollments(&list_query(&args)?)?;
                print_list(&list, args.format.unwrap_or(settings.default_format))?;
            }
        },
    }
    Ok(())
}

fn list_query(args: &ListArgs) -> course_admin::Result<ListQuery> {
    let mut query = ListQuery::new();
    query.search = args.search.clone();
    query.order_by = args.order_by.clone();
    for raw in &args.filters {
        query.filters.push(ListQuery::parse_filter(raw)?);
    }
    Ok(query)
}

fn print_list(list: &ChangeList, format: OutputFormat) -> course_admin::Result<()> {
    match format {
        OutputFormat::Table => print!("{}", list.render_table()),
        OutputFormat::Csv => print!("{}", list.to_csv()?),
    }
    Ok(())
}

// 命令列參數覆蓋表單欄位：未提供的欄位保留原值 (新增時為空白)

fn student_form(mut form: StudentForm, fields: StudentArgs) -> StudentForm {
    if let Some(v) = fields.name {
        form.name = v;
    }
    if let Some(v) = fields.email {
        form.email = v;
    }
    if let Some(v) = fields.department {
        form.department = v;
    }
    if let Some(v) = fields.enrollment_date {
        form.enrollment_date = v;
    }
    form
}

fn instructor_form(mut form: InstructorForm, fields: InstructorArgs) -> InstructorForm {
    if let Some(v) = fields.name {
        form.name = v;
    }
    if let Some(v) = fields.email {
        form.email = v;
    }
    if let Some(v) = fields.department {
        form.department = v;
    }
    if let Some(v) = fields.hire_date {
        form.hire_date = v;
    }
    form
}

fn course_form(mut form: CourseForm, fields: CourseArgs) -> CourseForm {
    if let Some(v) = fields.code {
        form.code = v;
    }
    if let Some(v) = fields.title {
        form.title = v;
    }
    if let Some(v) = fields.credits {
        form.credits = v;
    }
    if let Some(v) = fields.instructor {
        form.instructor = v;
    }
    if fields.no_instructor {
        form.instructor.clear();
    }
    form
}

fn enrollment_form(mut form: EnrollmentForm, fields: EnrollmentArgs) -> EnrollmentForm {
    if let Some(v) = fields.student {
        form.student = v;
    }
    if let Some(v) = fields.course {
        form.course = v;
    }
    if let Some(v) = fields.date {
        form.enrollment_date = v;
    }
    if let Some(v) = fields.grade {
        form.grade = v;
    }
    if fields.clear_grade {
        form.grade.clear();
    }
    form
}
