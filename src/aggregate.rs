use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

use tracing::debug;

use crate::error::ReportError;
use crate::models::{
    AggregatedRecord, AssessmentStat, Course, JoinedResponse, Period, Question, Response,
    ResponseScale, Snapshot, Survey, SurveyStats, Teacher,
};
use crate::parser;

/// Whether the survey assessment statistics take part in the join.
///
/// Teacher and class reports join them and carry them in the grouping key;
/// the overview leaves them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsPolicy {
    Join,
    Skip,
}

/// Inner-joins every response against its dimensions and keeps the rows
/// whose survey belongs to the program.
///
/// A response with an unknown or null key on any side is dropped. A period
/// year that is not an integer aborts the whole join.
pub fn join_responses(
    snapshot: &Snapshot,
    program_marker: &str,
    stats_policy: StatsPolicy,
) -> Result<Vec<JoinedResponse>, ReportError> {
    let dimensions = Dimensions::new(snapshot);
    let mut joined = Vec::new();

    for response in &snapshot.responses {
        let Some(row) = dimensions.resolve(response, stats_policy) else {
            continue;
        };

        if !row.survey.contains(program_marker) {
            continue;
        }

        let year = parse_year(row.year)?;
        joined.push(row.into_joined(year));
    }

    debug!(
        responses = snapshot.responses.len(),
        joined = joined.len(),
        "joined responses"
    );

    Ok(joined)
}

pub fn parse_year(value: &str) -> Result<i32, ReportError> {
    value
        .trim()
        .parse::<i32>()
        .map_err(|_| ReportError::Integrity {
            field: "periodYear",
            value: value.to_string(),
        })
}

/// Mean raw and zero-based values over the full dimension tuple, sorted by
/// year, course code and teacher username.
pub fn group_responses(rows: &[JoinedResponse]) -> Vec<AggregatedRecord> {
    let mut groups: BTreeMap<RecordKey, Accumulator> = BTreeMap::new();

    for row in rows {
        let entry = groups.entry(RecordKey::from(row)).or_insert(Accumulator {
            stats: row.stats,
            ..Accumulator::default()
        });
        entry.value_sum += row.response_value as f64;
        entry.count += 1;
        if let Some(zero) = row.response_zero_value {
            entry.zero_sum += zero as f64;
            entry.zero_count += 1;
        }
    }

    let mut records: Vec<AggregatedRecord> = groups
        .into_iter()
        .map(|(key, acc)| AggregatedRecord {
            department: key.department,
            class_code: key.class_code,
            class_section: key.class_section,
            full_name: key.full_name,
            last_name_first: key.last_name_first,
            teacher: key.teacher,
            email: key.email,
            survey: key.survey,
            question: key.question,
            question_sub_category: key.question_sub_category,
            response_scale: key.response_scale,
            response_legend: key.response_legend,
            period: key.period,
            year: key.year,
            course_name: key.course_name,
            course_number: key.course_number,
            school_course_code: key.school_course_code,
            stats: acc.stats,
            mean_value: acc.value_sum / acc.count as f64,
            mean_zero_value: if acc.zero_count == 0 {
                None
            } else {
                Some(acc.zero_sum / acc.zero_count as f64)
            },
            response_count: acc.count,
        })
        .collect();

    records.sort_by(|a, b| {
        (a.year, &a.school_course_code, &a.teacher).cmp(&(
            b.year,
            &b.school_course_code,
            &b.teacher,
        ))
    });
    records
}

/// School course codes present in an aggregate.
pub fn course_codes(records: &[AggregatedRecord]) -> HashSet<String> {
    records
        .iter()
        .map(|record| record.school_course_code.clone())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RecordKey {
    department: String,
    class_code: String,
    class_section: String,
    full_name: String,
    last_name_first: String,
    teacher: String,
    email: String,
    survey: String,
    question: String,
    question_sub_category: String,
    response_scale: String,
    response_legend: String,
    period: String,
    year: i32,
    course_name: String,
    course_number: String,
    school_course_code: String,
    stats: Option<(i64, i64, u64)>,
}

impl From<&JoinedResponse> for RecordKey {
    fn from(row: &JoinedResponse) -> Self {
        Self {
            department: row.department.clone(),
            class_code: row.class_code.clone(),
            class_section: row.class_section.clone(),
            full_name: row.full_name.clone(),
            last_name_first: row.last_name_first.clone(),
            teacher: row.teacher.clone(),
            email: row.email.clone(),
            survey: row.survey.clone(),
            question: row.question.clone(),
            question_sub_category: row.question_sub_category.clone(),
            response_scale: row.response_scale.clone(),
            response_legend: row.response_legend.clone(),
            period: row.period.clone(),
            year: row.year,
            course_name: row.course_name.clone(),
            course_number: row.course_number.clone(),
            school_course_code: row.school_course_code.clone(),
            stats: row.stats.as_ref().map(SurveyStats::key),
        }
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    stats: Option<SurveyStats>,
    value_sum: f64,
    count: usize,
    zero_sum: f64,
    zero_count: usize,
}

/// Dimension tables indexed by their keys. Duplicate keys keep the first row.
struct Dimensions<'a> {
    teachers: HashMap<i64, &'a Teacher>,
    surveys: HashMap<i64, &'a Survey>,
    stats: HashMap<i64, &'a AssessmentStat>,
    questions: HashMap<i64, &'a Question>,
    scales: HashMap<(i64, i32), &'a ResponseScale>,
    periods: HashMap<i64, &'a Period>,
    courses: HashMap<i64, &'a Course>,
}

fn index_by<T, K: Eq + Hash>(rows: &[T], key: impl Fn(&T) -> K) -> HashMap<K, &T> {
    let mut index = HashMap::with_capacity(rows.len());
    for row in rows {
        index.entry(key(row)).or_insert(row);
    }
    index
}

impl<'a> Dimensions<'a> {
    fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            teachers: index_by(&snapshot.teachers, |t| t.person_id),
            surveys: index_by(&snapshot.surveys, |s| s.survey_id),
            stats: index_by(&snapshot.assessment_stats, |s| s.survey_assessment_id),
            questions: index_by(&snapshot.questions, |q| q.question_id),
            scales: index_by(&snapshot.response_scales, |s| {
                (s.response_set_id, s.response_value)
            }),
            periods: index_by(&snapshot.periods, |p| p.period_id),
            courses: index_by(&snapshot.courses, |c| c.course_id),
        }
    }

    fn resolve(&self, response: &Response, stats_policy: StatsPolicy) -> Option<Resolved<'a>> {
        let value = response.response_value?;
        let teacher = self.teachers.get(&response.assessee_id?).copied()?;
        let survey = self.surveys.get(&response.survey_id?).copied()?;
        let stats = match stats_policy {
            StatsPolicy::Join => {
                let stat = self.stats.get(&response.survey_assessment_id?).copied()?;
                Some(SurveyStats {
                    total_expected: stat.total_expected?,
                    total_taken: stat.total_taken?,
                    response_rate: stat.response_rate?,
                })
            }
            StatsPolicy::Skip => None,
        };
        let question = self.questions.get(&response.question_id?).copied()?;
        let scale = self.scales.get(&(response.response_set_id?, value)).copied()?;
        let period = self.periods.get(&response.period_id?).copied()?;
        let course = self.courses.get(&response.course_id?).copied()?;

        Some(Resolved {
            value,
            zero_value: response.response_zero_value,
            department: teacher.department.as_deref()?,
            full_name: teacher.full_name.as_deref()?,
            last_name_first: teacher.last_name_first.as_deref()?,
            teacher: teacher.username.as_deref()?,
            email: teacher.email.as_deref()?,
            survey: survey.name.as_deref()?,
            stats,
            question: question.text.as_deref()?,
            question_sub_category: question.sub_category.as_deref()?,
            response_scale: scale.scale.as_deref()?,
            response_legend: scale.legend.as_deref()?,
            period: period.name.as_deref()?,
            year: period.year.as_deref()?,
            course_name: course.name.as_deref()?,
            course_number: course.number.as_deref()?,
            school_course_code: course.school_course_code.as_deref()?,
        })
    }
}

struct Resolved<'a> {
    value: i32,
    zero_value: Option<i32>,
    department: &'a str,
    full_name: &'a str,
    last_name_first: &'a str,
    teacher: &'a str,
    email: &'a str,
    survey: &'a str,
    stats: Option<SurveyStats>,
    question: &'a str,
    question_sub_category: &'a str,
    response_scale: &'a str,
    response_legend: &'a str,
    period: &'a str,
    year: &'a str,
    course_name: &'a str,
    course_number: &'a str,
    school_course_code: &'a str,
}

impl Resolved<'_> {
    fn into_joined(self, year: i32) -> JoinedResponse {
        let class_code = parser::class_segment(self.school_course_code).to_string();
        let class_section = parser::extract_class_and_subdivision(&class_code);

        JoinedResponse {
            response_value: self.value,
            response_zero_value: self.zero_value,
            department: self.department.to_string(),
            full_name: self.full_name.to_uppercase(),
            last_name_first: self.last_name_first.to_string(),
            teacher: self.teacher.to_string(),
            email: self.email.to_string(),
            survey: self.survey.to_string(),
            stats: self.stats,
            question: self.question.to_string(),
            question_sub_category: self.question_sub_category.to_string(),
            response_scale: self.response_scale.to_string(),
            response_legend: self.response_legend.to_string(),
            period: self.period.to_string(),
            year,
            course_name: self.course_name.to_string(),
            course_number: self.course_number.to_string(),
            school_course_code: self.school_course_code.to_string(),
            class_code,
            class_section,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, OVERALL, PLANNING};

    #[test]
    fn joins_and_derives_class_fields() {
        let mut snapshot = fixtures::snapshot();
        snapshot.responses = vec![fixtures::response(9, 1, 10, 100)];

        let rows = join_responses(&snapshot, "PGLS", StatsPolicy::Join).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.full_name, "ANA SOUZA");
        assert_eq!(row.teacher, "asouza");
        assert_eq!(row.class_code, "ADM1010_A");
        assert_eq!(row.class_section, "ADM1010_A");
        assert_eq!(row.year, 2024);
        assert_eq!(row.question_sub_category, OVERALL);
        assert_eq!(row.stats.map(|s| s.total_taken), Some(10));
    }

    #[test]
    fn unknown_question_is_dropped_not_an_error() {
        let mut snapshot = fixtures::snapshot();
        snapshot.responses = vec![
            fixtures::response(9, 1, 10, 100),
            fixtures::response(7, 1, 999, 100),
        ];

        let rows = join_responses(&snapshot, "PGLS", StatsPolicy::Join).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].response_value, 9);
    }

    #[test]
    fn scale_join_uses_set_and_value() {
        let mut snapshot = fixtures::snapshot();
        snapshot.response_scales.retain(|s| s.response_value != 4);
        snapshot.responses = vec![
            fixtures::response(4, 1, 11, 100),
            fixtures::response(5, 1, 11, 100),
        ];

        let rows = join_responses(&snapshot, "PGLS", StatsPolicy::Join).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].response_legend, "5");
    }

    #[test]
    fn missing_assessment_stats_only_matter_when_joined() {
        let mut snapshot = fixtures::snapshot();
        snapshot.assessment_stats.clear();
        snapshot.responses = vec![fixtures::response(9, 1, 10, 100)];

        assert!(join_responses(&snapshot, "PGLS", StatsPolicy::Join)
            .unwrap()
            .is_empty());
        let rows = join_responses(&snapshot, "PGLS", StatsPolicy::Skip).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].stats.is_none());
    }

    #[test]
    fn null_key_column_drops_the_row() {
        let mut snapshot = fixtures::snapshot();
        snapshot.teachers[0].email = None;
        snapshot.responses = vec![fixtures::response(9, 1, 10, 100)];

        assert!(join_responses(&snapshot, "PGLS", StatsPolicy::Join)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn surveys_outside_the_program_are_filtered() {
        let mut snapshot = fixtures::snapshot();
        snapshot.surveys[0].name = Some("MBA 2024 Final".to_string());
        snapshot.responses = vec![fixtures::response(9, 1, 10, 100)];

        assert!(join_responses(&snapshot, "PGLS", StatsPolicy::Join)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn non_numeric_year_is_fatal() {
        let mut snapshot = fixtures::snapshot();
        snapshot.periods[0].year = Some("twenty".to_string());
        snapshot.responses = vec![fixtures::response(9, 1, 10, 100)];

        let err = join_responses(&snapshot, "PGLS", StatsPolicy::Join).unwrap_err();
        assert!(matches!(err, ReportError::Integrity { field: "periodYear", .. }));
    }

    #[test]
    fn non_numeric_year_outside_the_program_is_ignored() {
        let mut snapshot = fixtures::snapshot();
        snapshot.periods[0].year = Some("twenty".to_string());
        snapshot.surveys[0].name = Some("MBA 2024 Final".to_string());
        snapshot.responses = vec![fixtures::response(9, 1, 10, 100)];

        assert!(join_responses(&snapshot, "PGLS", StatsPolicy::Join).is_ok());
    }

    #[test]
    fn groups_average_over_identical_dimensions() {
        let mut snapshot = fixtures::snapshot();
        snapshot.responses = vec![
            fixtures::response(8, 1, 11, 100),
            fixtures::response(6, 1, 11, 100),
            fixtures::response(10, 1, 10, 100),
        ];
        // Responses with different raw values carry different legends, so
        // collapse the legend to exercise the mean.
        for scale in &mut snapshot.response_scales {
            scale.legend = Some("Likert".to_string());
        }
        snapshot.responses[1].response_zero_value = None;

        let rows = join_responses(&snapshot, "PGLS", StatsPolicy::Join).unwrap();
        let records = group_responses(&rows);
        assert_eq!(records.len(), 2);

        let planning = records
            .iter()
            .find(|r| r.question_sub_category == PLANNING)
            .unwrap();
        assert_eq!(planning.response_count, 2);
        assert!((planning.mean_value - 7.0).abs() < 1e-9);
        assert_eq!(planning.mean_zero_value, Some(8.0));
    }

    #[test]
    fn records_sort_by_year_course_code_and_teacher() {
        let mut snapshot = fixtures::snapshot();
        snapshot.teachers.push(fixtures::teacher(2, "Bruno Lima", "blima"));
        snapshot
            .courses
            .push(fixtures::course(101, "Finance", "PGLS.2023.FIN2020"));
        snapshot.periods.push(Period {
            period_id: 2,
            name: Some("2".to_string()),
            year: Some("2023".to_string()),
        });
        let mut older = fixtures::response(9, 2, 10, 101);
        older.period_id = Some(2);
        snapshot.responses = vec![
            fixtures::response(9, 2, 10, 100),
            fixtures::response(9, 1, 10, 100),
            older,
        ];

        let rows = join_responses(&snapshot, "PGLS", StatsPolicy::Join).unwrap();
        let records = group_responses(&rows);
        let order: Vec<(i32, &str)> = records
            .iter()
            .map(|r| (r.year, r.teacher.as_str()))
            .collect();
        assert_eq!(order, vec![(2023, "blima"), (2024, "asouza"), (2024, "blima")]);
    }

    #[test]
    fn empty_snapshot_yields_empty_aggregate() {
        let snapshot = Snapshot::default();
        let rows = join_responses(&snapshot, "PGLS", StatsPolicy::Join).unwrap();
        assert!(group_responses(&rows).is_empty());
    }

    #[test]
    fn course_codes_are_unique() {
        let mut snapshot = fixtures::snapshot();
        snapshot.responses = vec![
            fixtures::response(9, 1, 10, 100),
            fixtures::response(9, 1, 11, 100),
        ];
        let rows = join_responses(&snapshot, "PGLS", StatsPolicy::Join).unwrap();
        let codes = course_codes(&group_responses(&rows));
        assert_eq!(codes.len(), 1);
        assert!(codes.contains("PGLS.2024.ADM1010_A"));
    }
}
