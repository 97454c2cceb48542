use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::comments::PromptKey;
use crate::models::{
    AggregatedRecord, CategoryScore, CommentBundle, LegacyResult, NpsRecord, SurveyStats,
};
use crate::pipeline::ReportData;
use crate::static_inputs::{self, LessonPlans};

/// Run metadata printed in every report header.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RunInfo {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
}

impl RunInfo {
    pub fn now() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
        }
    }
}

/// Years present in the aggregate, newest first.
pub fn available_years(records: &[AggregatedRecord]) -> Vec<i32> {
    let years: BTreeSet<i32> = records.iter().map(|r| r.year).collect();
    years.into_iter().rev().collect()
}

pub fn teacher_names(records: &[AggregatedRecord]) -> Vec<String> {
    let names: BTreeSet<String> = records.iter().map(|r| r.full_name.to_uppercase()).collect();
    names.into_iter().collect()
}

pub fn class_labels(records: &[AggregatedRecord]) -> Vec<String> {
    let labels: BTreeSet<String> = records.iter().map(|r| r.class_section.clone()).collect();
    labels.into_iter().collect()
}

/// Short label for the long bilingual question categories.
pub fn category_label(category: &str) -> &str {
    match category {
        "Questões relacionadas ao feedback / Feedback:" => "feedback",
        "Questões relacionadas ao planejamento: / Course Planning and Structure:" => "planejamento",
        "Questões relacionadas à avaliação / Assessment:" => "avaliacao",
        "Questões relacionadas à dinâmica: / Classroom Dynamics:" => "dinamica",
        other => other,
    }
}

/// Mean rating per category, period and class for classes whose response
/// rate is above `min_response_rate`. The overall-evaluation category is
/// reported through NPS instead and is left out.
pub fn category_scores(
    records: &[&AggregatedRecord],
    min_response_rate: f64,
    overall_category: &str,
) -> Vec<CategoryScore> {
    type Key = (String, i32, String, String, String, String, String, (i64, i64, u64));
    let mut groups: BTreeMap<Key, (SurveyStats, f64, usize)> = BTreeMap::new();

    for record in records {
        let Some(stats) = record.stats else {
            continue;
        };
        if stats.response_rate <= min_response_rate
            || record.question_sub_category == overall_category
        {
            continue;
        }

        let key = (
            category_label(&record.question_sub_category).to_string(),
            record.year,
            record.period.clone(),
            record.response_scale.clone(),
            record.class_code.clone(),
            record.class_section.clone(),
            record.course_name.clone(),
            stats.key(),
        );
        let entry = groups.entry(key).or_insert((stats, 0.0, 0));
        entry.1 += record.mean_value;
        entry.2 += 1;
    }

    groups
        .into_iter()
        .map(|(key, (stats, sum, count))| {
            let (
                category,
                year,
                period,
                response_scale,
                class_code,
                class_section,
                course_name,
                _,
            ) = key;
            CategoryScore {
                category,
                year,
                period,
                response_scale,
                class_code,
                class_section,
                course_name,
                stats: Some(stats),
                mean_value: sum / count as f64,
            }
        })
        .collect()
}

/// One course offering with its lesson plan left-joined by class code.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseRow {
    pub class_code: String,
    pub class_section: String,
    pub course_name: String,
    pub year: i32,
    pub period: String,
    pub lesson_plan: String,
    pub teachers: String,
}

pub fn course_rows(records: &[&AggregatedRecord], plans: &LessonPlans) -> Vec<CourseRow> {
    let mut seen = BTreeSet::new();
    records
        .iter()
        .filter(|record| seen.insert(record.class_code.clone()))
        .map(|record| CourseRow {
            class_code: record.class_code.clone(),
            class_section: record.class_section.clone(),
            course_name: record.course_name.clone(),
            year: record.year,
            period: record.period.clone(),
            lesson_plan: plans.link_for(&record.class_code).to_string(),
            teachers: plans.teachers_for(&record.class_code).to_string(),
        })
        .collect()
}

/// Highest assessment figures per class code and course name.
fn response_stats(scores: &[CategoryScore]) -> BTreeMap<(String, String), SurveyStats> {
    let mut stats: BTreeMap<(String, String), SurveyStats> = BTreeMap::new();
    for score in scores {
        let Some(current) = score.stats else {
            continue;
        };
        stats
            .entry((score.class_code.clone(), score.course_name.clone()))
            .and_modify(|best| {
                best.total_expected = best.total_expected.max(current.total_expected);
                best.total_taken = best.total_taken.max(current.total_taken);
                best.response_rate = best.response_rate.max(current.response_rate);
            })
            .or_insert(current);
    }
    stats
}

#[derive(Debug, Clone)]
pub struct TeacherScope<'a> {
    pub full_name: &'a str,
    pub years: &'a [i32],
    pub class_section: Option<&'a str>,
    pub min_response_rate: f64,
}

#[derive(Debug, Clone)]
pub struct ClassScope<'a> {
    pub class_section: &'a str,
    pub years: &'a [i32],
    pub teacher: Option<&'a str>,
    pub min_response_rate: f64,
}

/// The slice of a [`ReportData`] a single report renders.
#[derive(Debug, Clone, Default)]
pub struct ReportView<'a> {
    pub records: Vec<&'a AggregatedRecord>,
    pub nps: Vec<&'a NpsRecord>,
    pub bundles: Vec<&'a CommentBundle>,
    pub legacy: Vec<&'a LegacyResult>,
}

fn in_years(years: &[i32], year: i32) -> bool {
    years.is_empty() || years.contains(&year)
}

/// Survey and period pairs behind the year-filtered records. NPS rows and
/// comment bundles carry no year, so they are scoped through these.
fn survey_periods<'a>(records: &[&'a AggregatedRecord]) -> BTreeSet<(&'a str, &'a str)> {
    records
        .iter()
        .map(|r| (r.survey.as_str(), r.period.as_str()))
        .collect()
}

pub fn teacher_view<'a>(data: &'a ReportData, scope: &TeacherScope<'_>) -> ReportView<'a> {
    let full_name = scope.full_name.to_uppercase();

    let records: Vec<&AggregatedRecord> = data
        .records
        .iter()
        .filter(|r| r.full_name == full_name && in_years(scope.years, r.year))
        .filter(|r| scope.class_section.map_or(true, |c| r.class_section == c))
        .collect();

    let usernames: BTreeSet<&str> = records.iter().map(|r| r.teacher.as_str()).collect();
    let class_codes: BTreeSet<&str> = records.iter().map(|r| r.class_code.as_str()).collect();
    let survey_periods = survey_periods(&records);
    let surveys: BTreeSet<&str> = survey_periods.iter().map(|(survey, _)| *survey).collect();

    ReportView {
        nps: data
            .nps
            .iter()
            .filter(|n| n.full_name == full_name && class_codes.contains(n.class_code.as_str()))
            .filter(|n| survey_periods.contains(&(n.survey.as_str(), n.period.as_str())))
            .collect(),
        bundles: data
            .bundles
            .iter()
            .filter(|b| usernames.contains(b.username.as_str()))
            .filter(|b| surveys.contains(b.survey.as_str()))
            .filter(|b| scope.class_section.map_or(true, |c| b.class_section == c))
            .collect(),
        legacy: static_inputs::legacy_for_teacher(&data.legacy, &full_name),
        records,
    }
}

pub fn class_view<'a>(data: &'a ReportData, scope: &ClassScope<'_>) -> ReportView<'a> {
    let teacher = scope.teacher.map(str::to_uppercase);

    let records: Vec<&AggregatedRecord> = data
        .records
        .iter()
        .filter(|r| r.class_section == scope.class_section && in_years(scope.years, r.year))
        .filter(|r| teacher.as_deref().map_or(true, |t| r.full_name == t))
        .collect();

    let usernames: BTreeSet<&str> = records.iter().map(|r| r.teacher.as_str()).collect();
    let class_codes: BTreeSet<&str> = records.iter().map(|r| r.class_code.as_str()).collect();
    let survey_periods = survey_periods(&records);
    let surveys: BTreeSet<&str> = survey_periods.iter().map(|(survey, _)| *survey).collect();

    ReportView {
        nps: data
            .nps
            .iter()
            .filter(|n| class_codes.contains(n.class_code.as_str()))
            .filter(|n| teacher.as_deref().map_or(true, |t| n.full_name == t))
            .filter(|n| survey_periods.contains(&(n.survey.as_str(), n.period.as_str())))
            .collect(),
        bundles: data
            .bundles
            .iter()
            .filter(|b| b.class_section == scope.class_section)
            .filter(|b| surveys.contains(b.survey.as_str()))
            .filter(|b| teacher.is_none() || usernames.contains(b.username.as_str()))
            .collect(),
        legacy: static_inputs::legacy_for_class(&data.legacy, scope.class_section),
        records,
    }
}

pub fn build_teacher_report(
    run: &RunInfo,
    scope: &TeacherScope<'_>,
    view: &ReportView<'_>,
    plans: &LessonPlans,
    overall_category: &str,
    summary: Option<&str>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Teacher Evaluation Report");
    let _ = writeln!(
        output,
        "Generated for {} ({}) at {} (run {})",
        scope.full_name.to_uppercase(),
        years_label(scope.years),
        run.generated_at.format("%Y-%m-%d %H:%M UTC"),
        run.run_id
    );

    if view.records.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "No evaluations recorded for this teacher.");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Courses Taught");
    write_courses(&mut output, &course_rows(&view.records, plans), false);

    let scores = category_scores(&view.records, scope.min_response_rate, overall_category);
    write_category_scores(&mut output, &scores, scope.min_response_rate);
    write_response_stats(&mut output, &scores, &view.nps);
    write_legacy(&mut output, &view.legacy);
    write_summary(&mut output, summary);
    write_comments(&mut output, &view.bundles, false);

    output
}

pub fn build_class_report(
    run: &RunInfo,
    scope: &ClassScope<'_>,
    view: &ReportView<'_>,
    plans: &LessonPlans,
    overall_category: &str,
    summary: Option<&str>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Class Evaluation Report");
    let _ = writeln!(
        output,
        "Generated for class {}{} ({}) at {} (run {})",
        scope.class_section,
        scope
            .teacher
            .map(|t| format!(", teacher {}", t.to_uppercase()))
            .unwrap_or_default(),
        years_label(scope.years),
        run.generated_at.format("%Y-%m-%d %H:%M UTC"),
        run.run_id
    );

    if view.records.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "No evaluations recorded for this class.");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Courses Taken");
    write_courses(&mut output, &course_rows(&view.records, plans), true);

    let teachers: BTreeSet<&str> = view.records.iter().map(|r| r.full_name.as_str()).collect();
    if !teachers.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Teachers");
        for teacher in teachers {
            let _ = writeln!(output, "- {}", teacher);
        }
    }

    let scores = category_scores(&view.records, scope.min_response_rate, overall_category);
    write_category_scores(&mut output, &scores, scope.min_response_rate);
    write_response_stats(&mut output, &scores, &view.nps);
    write_legacy(&mut output, &view.legacy);
    write_summary(&mut output, summary);
    write_comments(&mut output, &view.bundles, true);

    output
}

fn years_label(years: &[i32]) -> String {
    if years.is_empty() {
        return "all years".to_string();
    }
    let years: Vec<String> = years.iter().map(|y| y.to_string()).collect();
    format!("years {}", years.join(", "))
}

fn write_courses(output: &mut String, rows: &[CourseRow], with_teachers: bool) {
    if rows.is_empty() {
        let _ = writeln!(output, "No courses found.");
        return;
    }

    for row in rows {
        let _ = writeln!(
            output,
            "- {} ({}): year {}, period {}, lesson plan: {}",
            row.course_name, row.class_section, row.year, row.period, row.lesson_plan
        );
        if with_teachers {
            let _ = writeln!(output, "  - teachers on record: {}", row.teachers);
        }
    }
}

fn write_category_scores(output: &mut String, scores: &[CategoryScore], min_response_rate: f64) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## Ratings by Category");

    if scores.is_empty() {
        let _ = writeln!(
            output,
            "No classes above a {:.0}% response rate.",
            min_response_rate
        );
        return;
    }

    for score in scores {
        let _ = writeln!(
            output,
            "- {} {}.{} {}: {:.2} (scale {})",
            score.class_code,
            score.year,
            score.period,
            score.category,
            score.mean_value,
            score.response_scale
        );
    }
}

fn write_response_stats(output: &mut String, scores: &[CategoryScore], nps: &[&NpsRecord]) {
    let stats = response_stats(scores);
    if stats.is_empty() {
        return;
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Response Statistics");

    for ((class_code, course_name), stats) in stats {
        let _ = writeln!(output, "### {} ({})", course_name, class_code);
        let _ = writeln!(
            output,
            "- expected responses: {}, received: {}, response rate: {}%",
            stats.total_expected, stats.total_taken, stats.response_rate
        );

        let class_nps: Vec<&&NpsRecord> =
            nps.iter().filter(|n| n.class_code == class_code).collect();
        if class_nps.is_empty() {
            let _ = writeln!(output, "- NPS: {}", static_inputs::NOT_AVAILABLE);
        }
        for record in class_nps {
            let _ = writeln!(
                output,
                "- {}: promoters {}, detractors {}, total {}, NPS {}",
                record.survey,
                record.promoters,
                record.detractors,
                record.total,
                format_nps(record.nps)
            );
        }
    }
}

pub fn format_nps(nps: Option<f64>) -> String {
    match nps {
        Some(value) => format!("{:.1}", value),
        None => "n/a".to_string(),
    }
}

fn write_legacy(output: &mut String, legacy: &[&LegacyResult]) {
    if legacy.is_empty() {
        return;
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Legacy Survey Results");
    for result in legacy {
        let fields: Vec<String> = result
            .fields
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        let _ = writeln!(
            output,
            "- {} {} ({}): {}",
            result.teacher,
            result.class_section,
            result.year,
            fields.join(", ")
        );
    }
}

fn write_summary(output: &mut String, summary: Option<&str>) {
    let Some(summary) = summary else {
        return;
    };

    let _ = writeln!(output);
    let _ = writeln!(output, "## Comment Summary");
    let _ = writeln!(output, "{}", summary.trim());
}

fn write_comments(output: &mut String, bundles: &[&CommentBundle], show_username: bool) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## Comments");

    if bundles.is_empty() {
        let _ = writeln!(output, "No comments recorded.");
        return;
    }

    for bundle in bundles {
        let _ = writeln!(output);
        if show_username {
            let _ = writeln!(
                output,
                "### {} / {} ({})",
                bundle.class_section, bundle.username, bundle.survey
            );
        } else {
            let _ = writeln!(output, "### {} ({})", bundle.class_section, bundle.survey);
        }

        for key in PromptKey::ALL {
            let _ = writeln!(output, "{}:", key.heading());
            for comment in bundle.comments(key) {
                let _ = writeln!(output, "- {}", comment);
            }
        }
    }
}

#[derive(Serialize)]
struct Export<'a> {
    #[serde(flatten)]
    run: &'a RunInfo,
    records: &'a [AggregatedRecord],
    overview: &'a [AggregatedRecord],
    nps: &'a [NpsRecord],
    comments: &'a [CommentBundle],
    legacy: &'a [LegacyResult],
}

/// Serializes every derived table of a run as one JSON document.
pub fn export_json(run: &RunInfo, data: &ReportData) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&Export {
        run,
        records: &data.records,
        overview: &data.overview,
        nps: &data.nps,
        comments: &data.bundles,
        legacy: &data.legacy,
    })
}
