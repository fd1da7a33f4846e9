#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use classroom_grader::classroom::{CourseId, TracingCallSink, UserId};
use classroom_grader::credentials::ACCESS_TOKEN_ENV;
use classroom_grader::{
    CancelFlag, CellOutcome, EnvCredentials, GradeSyncError, Grader, GraderConfig, GradingView,
    WriteMode,
};

#[derive(Parser)]
#[command(name = "classroom-grader", version, about = "Bulk grade editing for one course")]
struct Cli {
    /// API root (overrides CLASSROOM_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// User the access token belongs to
    #[arg(long, global = true, env = "CLASSROOM_USER", default_value = "me")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the active courses you teach
    Courses,
    /// Fetch the grade grid of a course as JSON
    Show {
        #[arg(long)]
        course: String,
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write an edited grade grid (as produced by `show`) back to the course
    Apply {
        /// Course the grid belongs to; must match the grid's `course_id`
        #[arg(long)]
        course: String,
        #[arg(long)]
        grades: PathBuf,
        /// Only patch cells whose grade differs from the live grade
        #[arg(long)]
        only_changed: bool,
        /// Write the per-cell report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn explain(err: GradeSyncError) -> Box<dyn std::error::Error> {
    if err.requires_reauthorization() {
        format!("{err}; obtain a fresh access token and set {ACCESS_TOKEN_ENV}").into()
    } else {
        err.into()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = GraderConfig::from_env();
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    let grader =
        Grader::http(Arc::new(EnvCredentials), config).with_call_sink(Arc::new(TracingCallSink));
    let user = UserId::new(cli.user);

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Courses => {
            let selection = grader.select_course(&user, &cancel).await.map_err(explain)?;
            eprintln!("courses taught by {}", selection.teacher_name);
            for course in selection.courses {
                println!("{}\t{}", course.id, course.name);
            }
        }
        Commands::Show { course, out } => {
            let view = grader
                .open_course(&user, &CourseId::new(course), &cancel)
                .await
                .map_err(explain)?;
            match out {
                Some(path) => {
                    let file = File::create(path)?;
                    serde_json::to_writer_pretty(file, &view)?;
                }
                None => {
                    let mut stdout = io::stdout().lock();
                    serde_json::to_writer_pretty(&mut stdout, &view)?;
                    writeln!(stdout)?;
                }
            }
        }
        Commands::Apply {
            course,
            grades,
            only_changed,
            report: report_path,
        } => {
            let view: GradingView = serde_json::from_reader(BufReader::new(File::open(grades)?))?;
            if view.course_id.as_str() != course {
                return Err(format!(
                    "grid belongs to course {}, not {course}",
                    view.course_id
                )
                .into());
            }
            let mode = if only_changed {
                WriteMode::ChangedOnly
            } else {
                WriteMode::All
            };
            let report = grader
                .save(&user, &view, mode, &cancel)
                .await
                .map_err(explain)?;

            if let Some(path) = report_path {
                serde_json::to_writer_pretty(File::create(path)?, &report)?;
            }

            println!(
                "updated {} / skipped {} / failed {}",
                report.updated(),
                report.skipped(),
                report.failed_cells().len()
            );
            for cell in report.failures() {
                if let CellOutcome::Failed { failure } = &cell.outcome {
                    println!(
                        "failed\t{}\t{}\t{}",
                        cell.assignment_id, cell.student_id, failure.message
                    );
                }
            }
            if !report.is_complete_success() {
                return Err(format!("{} cells failed", report.failed_cells().len()).into());
            }
        }
    }

    Ok(())
}
