use tracing::info;

use crate::aggregate::{self, StatsPolicy};
use crate::comments;
use crate::error::ReportError;
use crate::models::{AggregatedRecord, CommentBundle, LegacyResult, NpsRecord, Snapshot};
use crate::nps;
use crate::static_inputs::LessonPlans;

/// Names the program and the overall-evaluation category.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub program_marker: String,
    pub overall_category: String,
}

/// Every derived table of one report run.
#[derive(Debug, Clone, Default)]
pub struct ReportData {
    /// Teacher/class view: assessment statistics joined and grouped on.
    pub records: Vec<AggregatedRecord>,
    /// Overview: assessment statistics left out of the join.
    pub overview: Vec<AggregatedRecord>,
    pub nps: Vec<NpsRecord>,
    pub bundles: Vec<CommentBundle>,
    pub lesson_plans: LessonPlans,
    pub legacy: Vec<LegacyResult>,
}

pub fn build_report_data(
    snapshot: &Snapshot,
    options: &PipelineOptions,
    lesson_plans: LessonPlans,
    legacy: Vec<LegacyResult>,
) -> Result<ReportData, ReportError> {
    let joined = aggregate::join_responses(snapshot, &options.program_marker, StatsPolicy::Join)?;
    let records = aggregate::group_responses(&joined);
    let nps = nps::compute_nps(&joined, &options.overall_category);

    let overview_rows =
        aggregate::join_responses(snapshot, &options.program_marker, StatsPolicy::Skip)?;
    let overview = aggregate::group_responses(&overview_rows);

    let bundles =
        comments::reshape_comments(&snapshot.comments, &aggregate::course_codes(&records));

    info!(
        records = records.len(),
        overview = overview.len(),
        nps = nps.len(),
        bundles = bundles.len(),
        "derived report tables"
    );

    Ok(ReportData {
        records,
        overview,
        nps,
        bundles,
        lesson_plans,
        legacy,
    })
}
