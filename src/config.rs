use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use tracing::info;

use crate::db::FetchFilter;
use crate::error::ReportError;
use crate::models::LegacyResult;
use crate::pipeline::PipelineOptions;
use crate::static_inputs::{self, LessonPlans};
use crate::summary::{SummaryClient, DEFAULT_CLASS_PROMPT, DEFAULT_TEACHER_PROMPT};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Postgres connection string for the evaluation schema
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Survey-name substring that marks the program's surveys
    #[arg(long, env = "PROGRAM_MARKER", default_value = "PGLS")]
    pub program_marker: String,

    /// Question category holding the recommendation question used for NPS
    #[arg(long, env = "OVERALL_CATEGORY", default_value = "Avaliação Geral")]
    pub overall_category: String,

    /// Departments whose faculty are skipped, comma separated
    #[arg(long, env = "EXCLUDED_DEPARTMENTS", value_delimiter = ',')]
    pub excluded_departments: Vec<String>,

    /// CSV of lesson-plan links keyed by class code
    #[arg(long, env = "LESSON_PLANS_CSV")]
    pub lesson_plans: Option<PathBuf>,

    /// Legacy survey CSVs, comma separated
    #[arg(long = "legacy-csv", env = "LEGACY_CSV", value_delimiter = ',')]
    pub legacy_csv: Vec<PathBuf>,

    #[command(flatten)]
    pub summary: SummarySettings,
}

#[derive(Debug, Clone, Args)]
pub struct SummarySettings {
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    pub openai_base_url: String,

    #[arg(long, env = "SUMMARY_MODEL", default_value = "gpt-4o-mini")]
    pub summary_model: String,

    /// Instruction sent with a teacher's comments
    #[arg(long, env = "TEACHER_PROMPT", default_value = DEFAULT_TEACHER_PROMPT)]
    pub teacher_prompt: String,

    /// Instruction sent with a class's comments
    #[arg(long, env = "CLASS_PROMPT", default_value = DEFAULT_CLASS_PROMPT)]
    pub class_prompt: String,

    #[arg(long, env = "SUMMARY_TIMEOUT_SECS", default_value_t = 30)]
    pub summary_timeout_secs: u64,
}

impl Settings {
    pub fn fetch_filter(&self) -> FetchFilter {
        FetchFilter {
            excluded_departments: self
                .excluded_departments
                .iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            program_marker: self.program_marker.clone(),
            overall_category: self.overall_category.clone(),
        }
    }

    /// Loads the configured CSV inputs. Unset paths yield empty tables.
    pub fn load_static_inputs(&self) -> Result<(LessonPlans, Vec<LegacyResult>), ReportError> {
        let plans = match &self.lesson_plans {
            Some(path) => LessonPlans::load(path)?,
            None => LessonPlans::default(),
        };

        let mut legacy = Vec::new();
        for path in &self.legacy_csv {
            legacy.extend(static_inputs::load_legacy_results(path)?);
        }

        info!(legacy = legacy.len(), "loaded static inputs");
        Ok((plans, legacy))
    }
}

impl SummarySettings {
    /// `None` when neither an API key nor a custom endpoint is configured.
    pub fn client(&self) -> Result<Option<SummaryClient>, ReportError> {
        if self.openai_api_key.is_none() && self.openai_base_url == DEFAULT_OPENAI_BASE_URL {
            return Ok(None);
        }

        SummaryClient::new(
            self.openai_base_url.as_str(),
            self.summary_model.as_str(),
            self.openai_api_key.clone(),
            Duration::from_secs(self.summary_timeout_secs),
        )
        .map(Some)
    }
}
