//! gradebook: a terminal gradebook for students, courses and grades
//!
//! Runs a keyboard-driven dashboard by default. `setup`, `summary`, `gpa`,
//! `course-stats` and `history` work without the terminal UI and can emit JSON.

mod analytics;
mod app;
mod cli;
mod config;
mod data;
mod error;
mod ui;

use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use analytics::{Analytics, CohortMetrics, OverallSummary, Standing};
use cli::{AppConfig, Cli, Commands};
use data::{CourseId, SeedOutcome, Storage, StudentId};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();
    let command = cli.command();
    let config = AppConfig::from_cli(&cli).context("Invalid configuration")?;

    init_logging(cli.verbose, &config, command == Commands::Show)?;
    tracing::debug!(?config, "resolved configuration");

    let storage = Storage::open(&config.db, &config.data_dir, config.delete_policy)
        .context("Failed to open database")?;

    match command {
        Commands::Show => app::run(config, storage)?,
        Commands::Setup { seed, reset } => setup(&storage, seed, reset)?,
        Commands::Summary { json } => summary(&storage, json)?,
        Commands::Gpa { student_id, json } => gpa(&storage, StudentId(student_id), json)?,
        Commands::CourseStats { course, json } => course_stats(&storage, &course, json)?,
        Commands::History {
            student_id,
            course,
            json,
        } => history(&storage, StudentId(student_id), &course, json)?,
    }

    Ok(())
}

/// Logs go to a file under the data directory while the dashboard owns the
/// terminal, and to stderr otherwise.
fn init_logging(verbose: bool, config: &AppConfig, interactive: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if interactive {
        fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("Failed to create data directory {}", config.data_dir.display())
        })?;
        let log_path = config.log_file();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn require_schema(storage: &Storage) -> Result<()> {
    if !storage.schema_exists()? {
        bail!("Database schema is missing; run `gradebook setup` first");
    }
    Ok(())
}

fn setup(storage: &Storage, seed: bool, reset: bool) -> Result<()> {
    if reset {
        storage.reset_schema().context("Failed to reset database")?;
        println!("Dropped all tables");
    }
    storage.ensure_schema().context("Failed to create schema")?;
    match storage.path() {
        Some(path) => println!("Schema ready in {}", path.display()),
        None => println!("Schema ready (in memory)"),
    }

    if seed {
        match storage.seed_sample_data().context("Failed to load sample data")? {
            SeedOutcome::Seeded {
                students,
                courses,
                grades,
            } => println!("Loaded {students} students, {courses} courses and {grades} grades"),
            SeedOutcome::Skipped => println!("Database already holds data; sample data not loaded"),
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct SummaryReport {
    #[serde(flatten)]
    summary: OverallSummary,
    cohort: CohortMetrics,
}

fn summary(storage: &Storage, json: bool) -> Result<()> {
    require_schema(storage)?;
    let analytics = Analytics::new(storage);
    let report = SummaryReport {
        summary: analytics.overall_summary()?,
        cohort: CohortMetrics::from_standings(&analytics.student_report()?),
    };

    if json {
        return print_json(&report);
    }

    let SummaryReport { summary, cohort } = report;
    let mean = summary
        .overall_mean
        .map_or_else(|| "n/a".to_string(), |m| format!("{m:.2}"));
    let gpa = cohort
        .average_gpa
        .map_or_else(|| "n/a".to_string(), |g| format!("{g:.2}"));
    println!("Students:        {}", summary.student_count);
    println!("Courses:         {}", summary.course_count);
    println!(
        "Grades:          {} ({} recorded)",
        summary.grade_count, summary.recorded_grade_count
    );
    println!("Average score:   {mean}");
    println!("Average GPA:     {gpa}");
    println!("Pass rate:       {:.1}%", cohort.pass_rate);
    println!("Honor rate:      {:.1}%", cohort.honor_rate);
    println!("At risk:         {}", cohort.at_risk);
    if cohort.graded_students > 0 {
        println!("Standing:");
        for standing in Standing::ALL {
            println!("  {:<22}{}", standing.label(), cohort.count(standing));
        }
    }
    Ok(())
}

fn gpa(storage: &Storage, student_id: StudentId, json: bool) -> Result<()> {
    require_schema(storage)?;
    let student = storage.get_student(student_id)?;
    let gpa = Analytics::new(storage).student_gpa(student_id)?;

    if json {
        return print_json(&serde_json::json!({ "student": student, "gpa": gpa }));
    }

    println!("{} <{}>", student.name, student.email);
    match gpa {
        Some(gpa) => {
            println!("  GPA:            {:.2}", gpa.gpa);
            println!("  Weighted score: {:.2}", gpa.weighted_score);
            println!("  Credits:        {} in {} course(s)", gpa.credits, gpa.courses);
        }
        None => println!("  No grades recorded"),
    }
    Ok(())
}

/// Accept a course code or a numeric course ID. Codes win, since a code may
/// be all digits.
fn resolve_course(storage: &Storage, course: &str) -> Result<CourseId> {
    let course = course.trim();
    if let Some(found) = storage.course_by_code(course)? {
        return Ok(found.id);
    }
    match course.parse::<i64>() {
        Ok(id) => Ok(storage.get_course(CourseId(id))?.id),
        Err(_) => bail!("No course with code '{course}'"),
    }
}

fn course_stats(storage: &Storage, course: &str, json: bool) -> Result<()> {
    require_schema(storage)?;
    let course_id = resolve_course(storage, course)?;
    let stats = Analytics::new(storage).course_statistics(course_id)?;

    if json {
        return print_json(&stats);
    }

    println!(
        "{} {} ({} credits)",
        stats.course.code, stats.course.name, stats.course.credits
    );
    let (Some(mean), Some(min), Some(max)) = (stats.mean, stats.min, stats.max) else {
        println!("  No grades recorded");
        return Ok(());
    };
    println!("  Graded: {}", stats.count);
    println!("  Mean:   {mean:.2}");
    println!("  Range:  {min:.1} - {max:.1}");
    let bands: Vec<String> = stats
        .distribution
        .iter()
        .map(|(letter, count)| format!("{letter}:{count}"))
        .collect();
    println!("  Bands:  {}", bands.join(" "));
    for (rank, top) in stats.top_students.iter().enumerate() {
        println!("  {}. {} {:.1} ({})", rank + 1, top.name, top.score, top.letter);
    }
    Ok(())
}

fn history(storage: &Storage, student_id: StudentId, course: &str, json: bool) -> Result<()> {
    require_schema(storage)?;
    let student = storage.get_student(student_id)?;
    let course = storage.get_course(resolve_course(storage, course)?)?;
    let grades = storage.grade_history(student.id, course.id)?;
    let effective = storage.latest_grade(student.id, course.id)?;

    if json {
        return print_json(&serde_json::json!({
            "student": student,
            "course": course,
            "history": grades,
            "effective": effective,
        }));
    }

    println!("{} in {} {}", student.name, course.code, course.name);
    if grades.is_empty() {
        println!("  No grades recorded");
    }
    for grade in &grades {
        let marker = if effective.as_ref().is_some_and(|e| e.id == grade.id) {
            "*"
        } else {
            " "
        };
        println!(
            "  {marker} #{:<5} {:>5.1} {}  {}",
            grade.id.to_string(),
            grade.score,
            grade.letter(),
            grade.recorded_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
