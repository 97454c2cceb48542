use std::collections::BTreeSet;

use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{PgExecutor, PgPool, Row};
use tracing::{debug, info};

use crate::error::ReportError;
use crate::models::{
    AssessmentStat, Comment, Course, Period, Question, Response, ResponseScale, Snapshot, Survey,
    Teacher,
};

const TEACHERS_SQL: &str = r#"
    SELECT "departmentName", "personId"::int8 AS "personId", "fullName", "lastNameFirst",
           "coursevalUserName", "email"
    FROM "tb_course_evaluation_personDim"
    WHERE "personStatus" = 'Active'
      AND "facultyYn" = 'Y'
      AND ("departmentName" IS NULL OR NOT ("departmentName" = ANY($1)))
"#;

const RESPONSES_SQL: &str = r#"
    SELECT "responseValue"::int4 AS "responseValue",
           "responseZeroValue"::int4 AS "responseZeroValue",
           "surveyId"::int8 AS "surveyId",
           "surveyAssessmentFactId"::int8 AS "surveyAssessmentFactId",
           "questionId"::int8 AS "questionId",
           "responseSetId"::int8 AS "responseSetId",
           "periodId"::int8 AS "periodId",
           "courseId"::int8 AS "courseId",
           "personAssesseeId"::int8 AS "personAssesseeId"
    FROM "tb_course_evaluation_responseLikertFact"
    WHERE "personAssesseeId" = ANY($1)
"#;

const SURVEYS_SQL: &str = r#"
    SELECT "surveyId"::int8 AS "surveyId", "surveyName"
    FROM "tb_course_evaluation_surveyDim"
    WHERE "surveyId" = ANY($1)
"#;

const ASSESSMENT_STATS_SQL: &str = r#"
    SELECT "surveyAssessmentFactId"::int8 AS "surveyAssessmentFactId",
           "totalExpectedSurveys"::int8 AS "totalExpectedSurveys",
           "totalSurveysTaken"::int8 AS "totalSurveysTaken",
           "responseRate"::float8 AS "responseRate"
    FROM "tb_course_evaluation_surveyAssessmentFact"
    WHERE "surveyAssessmentFactId" = ANY($1)
"#;

const QUESTIONS_SQL: &str = r#"
    SELECT "questionId"::int8 AS "questionId", "question", "questionSubCategory"
    FROM "tb_course_evaluation_questionDim"
    WHERE "questionId" = ANY($1)
"#;

const RESPONSE_SCALES_SQL: &str = r#"
    SELECT "responseScale", "responseSetId"::int8 AS "responseSetId",
           "responseValue"::int4 AS "responseValue", "responseLegend"
    FROM "tb_course_evaluation_responseSetDim"
    WHERE "responseSetId" = ANY($1)
"#;

const PERIODS_SQL: &str = r#"
    SELECT "periodId"::int8 AS "periodId", "periodName", "periodYear"::text AS "periodYear"
    FROM "tb_course_evaluation_periodDim"
    WHERE "periodId" = ANY($1)
"#;

const COURSES_SQL: &str = r#"
    SELECT "courseId"::int8 AS "courseId", "courseName", "courseNumber"::text AS "courseNumber",
           "schoolCourseCode"
    FROM "tb_course_evaluation_courseDim"
    WHERE "courseId" = ANY($1)
"#;

const COMMENTS_SQL: &str = r#"
    SELECT "crs_code", "eval_username", "question", "survey", "response"
    FROM "tb_course_evaluation_results_Comments"
    WHERE "crs_code" IS NOT NULL
      AND "eval_username" IS NOT NULL
      AND "question" IS NOT NULL
      AND "survey" IS NOT NULL
"#;

#[derive(Debug, Clone, Default)]
pub struct FetchFilter {
    /// Departments whose faculty are left out of the teacher query.
    pub excluded_departments: Vec<String>,
}

/// Runs the full query sequence on one pooled connection.
///
/// The connection goes back to the pool when this function returns, on the
/// error path as well as on success.
pub async fn fetch_snapshot(pool: &PgPool, filter: &FetchFilter) -> Result<Snapshot, ReportError> {
    let mut conn = pool.acquire().await?;
    let snapshot = fetch_tables(&mut conn, filter).await?;

    info!(
        teachers = snapshot.teachers.len(),
        responses = snapshot.responses.len(),
        comments = snapshot.comments.len(),
        "fetched evaluation snapshot"
    );

    Ok(snapshot)
}

async fn fetch_tables(
    conn: &mut PgConnection,
    filter: &FetchFilter,
) -> Result<Snapshot, ReportError> {
    let teachers = sqlx::query(TEACHERS_SQL)
        .bind(&filter.excluded_departments[..])
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(teacher_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    let teacher_ids = distinct_ids(&teachers, |t| Some(t.person_id));
    let responses = fetch_by_ids(
        &mut *conn,
        "responses",
        RESPONSES_SQL,
        &teacher_ids,
        response_from_row,
    )
    .await?;

    let surveys = fetch_by_ids(
        &mut *conn,
        "surveys",
        SURVEYS_SQL,
        &distinct_ids(&responses, |r| r.survey_id),
        survey_from_row,
    )
    .await?;

    let assessment_stats = fetch_by_ids(
        &mut *conn,
        "assessment_stats",
        ASSESSMENT_STATS_SQL,
        &distinct_ids(&responses, |r| r.survey_assessment_id),
        assessment_stat_from_row,
    )
    .await?;

    let questions = fetch_by_ids(
        &mut *conn,
        "questions",
        QUESTIONS_SQL,
        &distinct_ids(&responses, |r| r.question_id),
        question_from_row,
    )
    .await?;

    let response_scales = fetch_by_ids(
        &mut *conn,
        "response_scales",
        RESPONSE_SCALES_SQL,
        &distinct_ids(&responses, |r| r.response_set_id),
        response_scale_from_row,
    )
    .await?;

    let periods = fetch_by_ids(
        &mut *conn,
        "periods",
        PERIODS_SQL,
        &distinct_ids(&responses, |r| r.period_id),
        period_from_row,
    )
    .await?;

    let courses = fetch_by_ids(
        &mut *conn,
        "courses",
        COURSES_SQL,
        &distinct_ids(&responses, |r| r.course_id),
        course_from_row,
    )
    .await?;

    let comments = sqlx::query(COMMENTS_SQL)
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(comment_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Snapshot {
        teachers,
        responses,
        surveys,
        assessment_stats,
        questions,
        response_scales,
        periods,
        courses,
        comments,
    })
}

/// Runs `sql` with `ids` bound as `$1`. An empty id set yields an empty
/// table without touching the database.
async fn fetch_by_ids<'c, E, T>(
    executor: E,
    table: &'static str,
    sql: &'static str,
    ids: &[i64],
    map_row: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> Result<Vec<T>, ReportError>
where
    E: PgExecutor<'c>,
{
    if ids.is_empty() {
        debug!(table, "no ids to filter on, skipping query");
        return Ok(Vec::new());
    }

    let rows = sqlx::query(sql).bind(ids).fetch_all(executor).await?;
    let records = rows.iter().map(map_row).collect::<Result<Vec<_>, _>>()?;
    debug!(table, ids = ids.len(), rows = records.len(), "fetched table");
    Ok(records)
}

pub fn distinct_ids<T>(items: &[T], key: impl Fn(&T) -> Option<i64>) -> Vec<i64> {
    items
        .iter()
        .filter_map(key)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn teacher_from_row(row: &PgRow) -> Result<Teacher, sqlx::Error> {
    Ok(Teacher {
        person_id: row.try_get("personId")?,
        department: row.try_get("departmentName")?,
        full_name: row.try_get("fullName")?,
        last_name_first: row.try_get("lastNameFirst")?,
        username: row.try_get("coursevalUserName")?,
        email: row.try_get("email")?,
    })
}

fn response_from_row(row: &PgRow) -> Result<Response, sqlx::Error> {
    Ok(Response {
        response_value: row.try_get("responseValue")?,
        response_zero_value: row.try_get("responseZeroValue")?,
        survey_id: row.try_get("surveyId")?,
        survey_assessment_id: row.try_get("surveyAssessmentFactId")?,
        question_id: row.try_get("questionId")?,
        response_set_id: row.try_get("responseSetId")?,
        period_id: row.try_get("periodId")?,
        course_id: row.try_get("courseId")?,
        assessee_id: row.try_get("personAssesseeId")?,
    })
}

fn survey_from_row(row: &PgRow) -> Result<Survey, sqlx::Error> {
    Ok(Survey {
        survey_id: row.try_get("surveyId")?,
        name: row.try_get("surveyName")?,
    })
}

fn assessment_stat_from_row(row: &PgRow) -> Result<AssessmentStat, sqlx::Error> {
    Ok(AssessmentStat {
        survey_assessment_id: row.try_get("surveyAssessmentFactId")?,
        total_expected: row.try_get("totalExpectedSurveys")?,
        total_taken: row.try_get("totalSurveysTaken")?,
        response_rate: row.try_get("responseRate")?,
    })
}

fn question_from_row(row: &PgRow) -> Result<Question, sqlx::Error> {
    Ok(Question {
        question_id: row.try_get("questionId")?,
        text: row.try_get("question")?,
        sub_category: row.try_get("questionSubCategory")?,
    })
}

fn response_scale_from_row(row: &PgRow) -> Result<ResponseScale, sqlx::Error> {
    Ok(ResponseScale {
        response_set_id: row.try_get("responseSetId")?,
        response_value: row.try_get("responseValue")?,
        scale: row.try_get("responseScale")?,
        legend: row.try_get("responseLegend")?,
    })
}

fn period_from_row(row: &PgRow) -> Result<Period, sqlx::Error> {
    Ok(Period {
        period_id: row.try_get("periodId")?,
        name: row.try_get("periodName")?,
        year: row.try_get("periodYear")?,
    })
}

fn course_from_row(row: &PgRow) -> Result<Course, sqlx::Error> {
    Ok(Course {
        course_id: row.try_get("courseId")?,
        name: row.try_get("courseName")?,
        number: row.try_get("courseNumber")?,
        school_course_code: row.try_get("schoolCourseCode")?,
    })
}

fn comment_from_row(row: &PgRow) -> Result<Comment, sqlx::Error> {
    Ok(Comment {
        course_code: row.try_get("crs_code")?,
        username: row.try_get("eval_username")?,
        survey: row.try_get("survey")?,
        question: row.try_get("question")?,
        response: row.try_get("response")?,
    })
}
