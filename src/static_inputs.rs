use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::ReportError;
use crate::models::{LegacyResult, LessonPlan};

/// Placeholder for class codes with no static data.
pub const NOT_AVAILABLE: &str = "Not available";

/// Lesson-plan links keyed by class code.
#[derive(Debug, Clone, Default)]
pub struct LessonPlans {
    by_class: HashMap<String, LessonPlan>,
}

impl LessonPlans {
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        #[derive(Deserialize)]
        struct CsvRow {
            codigo_turma: String,
            link: Option<String>,
            professores: Option<String>,
        }

        let mut reader = csv::Reader::from_path(path)?;
        let mut plans = Vec::new();

        for result in reader.deserialize::<CsvRow>() {
            let row = result?;
            plans.push(LessonPlan {
                class_code: row.codigo_turma.trim().to_string(),
                link: non_empty(row.link),
                teachers: non_empty(row.professores),
            });
        }

        debug!(path = %path.display(), plans = plans.len(), "loaded lesson plans");
        Ok(Self::from_plans(plans))
    }

    /// First plan per class code wins.
    pub fn from_plans(plans: Vec<LessonPlan>) -> Self {
        let mut by_class = HashMap::with_capacity(plans.len());
        for plan in plans {
            by_class.entry(plan.class_code.clone()).or_insert(plan);
        }
        Self { by_class }
    }

    pub fn get(&self, class_code: &str) -> Option<&LessonPlan> {
        self.by_class.get(class_code)
    }

    pub fn link_for(&self, class_code: &str) -> &str {
        self.get(class_code)
            .and_then(|plan| plan.link.as_deref())
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn teachers_for(&self, class_code: &str) -> &str {
        self.get(class_code)
            .and_then(|plan| plan.teachers.as_deref())
            .unwrap_or(NOT_AVAILABLE)
    }
}

/// Reads a legacy survey export. The `professor`, `turma` and `ano` columns
/// are required; every other column is carried through in order.
pub fn load_legacy_results(path: &Path) -> Result<Vec<LegacyResult>, ReportError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let column = |name: &'static str| {
        headers
            .iter()
            .position(|header| header.trim() == name)
            .ok_or_else(|| ReportError::MissingColumn {
                path: path.display().to_string(),
                column: name,
            })
    };
    let teacher_idx = column("professor")?;
    let class_idx = column("turma")?;
    let year_idx = column("ano")?;

    let mut results = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or_default().trim().to_string();

        let fields = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| ![teacher_idx, class_idx, year_idx].contains(idx))
            .map(|(idx, header)| (header.to_string(), field(idx)))
            .collect();

        results.push(LegacyResult {
            teacher: field(teacher_idx).to_uppercase(),
            class_section: field(class_idx),
            year: field(year_idx),
            fields,
        });
    }

    debug!(path = %path.display(), rows = results.len(), "loaded legacy results");
    Ok(results)
}

pub fn legacy_for_teacher<'a>(
    results: &'a [LegacyResult],
    full_name: &str,
) -> Vec<&'a LegacyResult> {
    let full_name = full_name.to_uppercase();
    results
        .iter()
        .filter(|result| result.teacher == full_name)
        .collect()
}

pub fn legacy_for_class<'a>(
    results: &'a [LegacyResult],
    class_section: &str,
) -> Vec<&'a LegacyResult> {
    results
        .iter()
        .filter(|result| result.class_section == class_section)
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
