use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod aggregate;
mod comments;
mod config;
mod db;
mod error;
#[cfg(test)]
mod fixtures;
mod models;
mod nps;
mod parser;
mod pipeline;
mod report;
mod static_inputs;
mod summary;

use config::{Settings, SummarySettings};
use report::{ClassScope, RunInfo, TeacherScope};

#[derive(Parser)]
#[command(name = "course-evaluation-tracker")]
#[command(about = "Teacher and class follow-up reports from course evaluation surveys", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the years, teachers and classes available for reports
    List,
    /// Generate a markdown report for one teacher
    TeacherReport {
        #[arg(long)]
        name: String,
        #[arg(long = "year")]
        years: Vec<i32>,
        #[arg(long)]
        class: Option<String>,
        #[arg(long, default_value_t = 20.0)]
        min_response_rate: f64,
        /// Ask the text-generation service for a comment summary
        #[arg(long)]
        summarize: bool,
        #[arg(long, default_value = "teacher-report.md")]
        out: PathBuf,
    },
    /// Generate a markdown report for one class
    ClassReport {
        #[arg(long)]
        class: String,
        #[arg(long)]
        teacher: Option<String>,
        #[arg(long = "year")]
        years: Vec<i32>,
        #[arg(long, default_value_t = 30.0)]
        min_response_rate: f64,
        #[arg(long)]
        summarize: bool,
        #[arg(long, default_value = "class-report.md")]
        out: PathBuf,
    },
    /// Write every derived table as JSON
    Export {
        #[arg(long, default_value = "evaluations.json")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let run_info = RunInfo::now();
    let span = info_span!("report_run", run_id = %run_info.run_id);
    run(cli, run_info).instrument(span).await
}

async fn run(cli: Cli, run_info: RunInfo) -> anyhow::Result<()> {
    let settings = cli.settings;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let snapshot = db::fetch_snapshot(&pool, &settings.fetch_filter())
        .await
        .context("failed to fetch evaluation data")?;
    pool.close().await;

    let (lesson_plans, legacy) = settings
        .load_static_inputs()
        .context("failed to load static inputs")?;
    let options = settings.pipeline_options();
    let data = pipeline::build_report_data(&snapshot, &options, lesson_plans, legacy)
        .context("failed to build report data")?;

    match cli.command {
        Commands::List => {
            if data.overview.is_empty() {
                println!("No evaluations found for {}.", options.program_marker);
                return Ok(());
            }

            let years: Vec<String> = report::available_years(&data.overview)
                .iter()
                .map(|y| y.to_string())
                .collect();
            println!("Years: {}", years.join(", "));
            println!("Teachers:");
            for name in report::teacher_names(&data.overview) {
                println!("- {name}");
            }
            println!("Classes:");
            for class in report::class_labels(&data.overview) {
                println!("- {class}");
            }
        }
        Commands::TeacherReport {
            name,
            years,
            class,
            min_response_rate,
            summarize,
            out,
        } => {
            let scope = TeacherScope {
                full_name: &name,
                years: &years,
                class_section: class.as_deref(),
                min_response_rate,
            };
            let view = report::teacher_view(&data, &scope);

            let summary = if summarize {
                let input = summary::summary_input(view.bundles.iter().copied());
                summarize_comments(&settings.summary, &settings.summary.teacher_prompt, &input)
                    .await
            } else {
                None
            };

            let report = report::build_teacher_report(
                &run_info,
                &scope,
                &view,
                &data.lesson_plans,
                &options.overall_category,
                summary.as_deref(),
            );
            std::fs::write(&out, report)?;
            info!(records = view.records.len(), "teacher report written");
            println!("Report written to {}.", out.display());
        }
        Commands::ClassReport {
            class,
            teacher,
            years,
            min_response_rate,
            summarize,
            out,
        } => {
            let scope = ClassScope {
                class_section: &class,
                years: &years,
                teacher: teacher.as_deref(),
                min_response_rate,
            };
            let view = report::class_view(&data, &scope);

            let summary = if summarize {
                let input = summary::summary_input(view.bundles.iter().copied());
                summarize_comments(&settings.summary, &settings.summary.class_prompt, &input).await
            } else {
                None
            };

            let report = report::build_class_report(
                &run_info,
                &scope,
                &view,
                &data.lesson_plans,
                &options.overall_category,
                summary.as_deref(),
            );
            std::fs::write(&out, report)?;
            info!(records = view.records.len(), "class report written");
            println!("Report written to {}.", out.display());
        }
        Commands::Export { out } => {
            let json = report::export_json(&run_info, &data)?;
            std::fs::write(&out, json)?;
            println!("Export written to {}.", out.display());
        }
    }

    Ok(())
}

async fn summarize_comments(
    settings: &SummarySettings,
    instruction: &str,
    input: &str,
) -> Option<String> {
    let client = match settings.client() {
        Ok(client) => client,
        Err(err) => {
            warn!(error = %err, "could not build summary client");
            None
        }
    };
    summary::summarize_best_effort(client.as_ref(), instruction, input).await
}
