use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Teacher {
    pub person_id: i64,
    pub department: Option<String>,
    pub full_name: Option<String>,
    pub last_name_first: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

/// One Likert answer from the response fact table.
#[derive(Debug, Clone)]
pub struct Response {
    pub response_value: Option<i32>,
    pub response_zero_value: Option<i32>,
    pub survey_id: Option<i64>,
    pub survey_assessment_id: Option<i64>,
    pub question_id: Option<i64>,
    pub response_set_id: Option<i64>,
    pub period_id: Option<i64>,
    pub course_id: Option<i64>,
    pub assessee_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Survey {
    pub survey_id: i64,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AssessmentStat {
    pub survey_assessment_id: i64,
    pub total_expected: Option<i64>,
    pub total_taken: Option<i64>,
    pub response_rate: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Question {
    pub question_id: i64,
    pub text: Option<String>,
    pub sub_category: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResponseScale {
    pub response_set_id: i64,
    pub response_value: i32,
    pub scale: Option<String>,
    pub legend: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Period {
    pub period_id: i64,
    pub name: Option<String>,
    /// Stored as text upstream.
    pub year: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Course {
    pub course_id: i64,
    pub name: Option<String>,
    pub number: Option<String>,
    pub school_course_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub course_code: String,
    pub username: String,
    pub survey: String,
    pub question: String,
    pub response: Option<String>,
}

/// Every table fetched for one report run.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub teachers: Vec<Teacher>,
    pub responses: Vec<Response>,
    pub surveys: Vec<Survey>,
    pub assessment_stats: Vec<AssessmentStat>,
    pub questions: Vec<Question>,
    pub response_scales: Vec<ResponseScale>,
    pub periods: Vec<Period>,
    pub courses: Vec<Course>,
    pub comments: Vec<Comment>,
}

/// Expected/received respondent counts for one survey assessment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurveyStats {
    pub total_expected: i64,
    pub total_taken: i64,
    pub response_rate: f64,
}

impl SurveyStats {
    /// Totally ordered form used inside grouping keys.
    pub fn key(&self) -> (i64, i64, u64) {
        (self.total_expected, self.total_taken, self.response_rate.to_bits())
    }
}

/// A response with every dimension resolved, before grouping.
#[derive(Debug, Clone)]
pub struct JoinedResponse {
    pub response_value: i32,
    pub response_zero_value: Option<i32>,
    pub department: String,
    pub full_name: String,
    pub last_name_first: String,
    pub teacher: String,
    pub email: String,
    pub survey: String,
    pub stats: Option<SurveyStats>,
    pub question: String,
    pub question_sub_category: String,
    pub response_scale: String,
    pub response_legend: String,
    pub period: String,
    pub year: i32,
    pub course_name: String,
    pub course_number: String,
    pub school_course_code: String,
    pub class_code: String,
    pub class_section: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregatedRecord {
    pub department: String,
    pub class_code: String,
    pub class_section: String,
    pub full_name: String,
    pub last_name_first: String,
    pub teacher: String,
    pub email: String,
    pub survey: String,
    pub question: String,
    pub question_sub_category: String,
    pub response_scale: String,
    pub response_legend: String,
    pub period: String,
    pub year: i32,
    pub course_name: String,
    pub course_number: String,
    pub school_course_code: String,
    pub stats: Option<SurveyStats>,
    pub mean_value: f64,
    pub mean_zero_value: Option<f64>,
    pub response_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NpsRecord {
    pub full_name: String,
    pub email: String,
    pub class_code: String,
    pub survey: String,
    pub period: String,
    pub stats: Option<SurveyStats>,
    pub promoters: usize,
    pub detractors: usize,
    pub total: usize,
    /// `None` when no response contributed.
    pub nps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentBundle {
    pub course_code: String,
    pub username: String,
    pub survey: String,
    pub class_section: String,
    pub continue_doing: Vec<String>,
    pub stop_doing: Vec<String>,
    pub start_doing: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LessonPlan {
    pub class_code: String,
    pub link: Option<String>,
    pub teachers: Option<String>,
}

/// One row of a legacy survey export.
#[derive(Debug, Clone, Serialize)]
pub struct LegacyResult {
    pub teacher: String,
    pub class_section: String,
    pub year: String,
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryScore {
    pub category: String,
    pub year: i32,
    pub period: String,
    pub response_scale: String,
    pub class_code: String,
    pub class_section: String,
    pub course_name: String,
    pub stats: Option<SurveyStats>,
    pub mean_value: f64,
}
