//! Snapshot builders shared by the unit tests.

use crate::models::{
    AssessmentStat, Comment, Course, Period, Question, Response, ResponseScale, Snapshot, Survey,
    Teacher,
};

pub const OVERALL: &str = "Avaliação Geral";
pub const PLANNING: &str =
    "Questões relacionadas ao planejamento: / Course Planning and Structure:";
pub const CONTINUE_PROMPT: &str = "O professor continue a fazer em sala de aula. / What should the professor continue doing in this course?";
pub const STOP_PROMPT: &str = "O professor deixe de fazer em sala de aula. / What should the professor stop doing in the classroom?";
pub const START_PROMPT: &str = "O professor passe a fazer em sala de aula. / What should the professor start doing in the classroom?";

pub fn teacher(person_id: i64, full_name: &str, username: &str) -> Teacher {
    Teacher {
        person_id,
        department: Some("PGLS".to_string()),
        full_name: Some(full_name.to_string()),
        last_name_first: Some(full_name.to_string()),
        username: Some(username.to_string()),
        email: Some(format!("{username}@school.edu")),
    }
}

/// A response to survey 1 / assessment 1 / scale set 1 / period 1.
pub fn response(value: i32, assessee_id: i64, question_id: i64, course_id: i64) -> Response {
    Response {
        response_value: Some(value),
        response_zero_value: Some(value),
        survey_id: Some(1),
        survey_assessment_id: Some(1),
        question_id: Some(question_id),
        response_set_id: Some(1),
        period_id: Some(1),
        course_id: Some(course_id),
        assessee_id: Some(assessee_id),
    }
}

pub fn course(course_id: i64, name: &str, code: &str) -> Course {
    Course {
        course_id,
        name: Some(name.to_string()),
        number: Some(course_id.to_string()),
        school_course_code: Some(code.to_string()),
    }
}

pub fn comment(course_code: &str, username: &str, question: &str, body: Option<&str>) -> Comment {
    Comment {
        course_code: course_code.to_string(),
        username: username.to_string(),
        survey: "PGLS 2024 Final".to_string(),
        question: question.to_string(),
        response: body.map(str::to_string),
    }
}

/// One teacher, one program survey, a 0-10 scale and two questions; no
/// responses yet.
pub fn snapshot() -> Snapshot {
    Snapshot {
        teachers: vec![teacher(1, "Ana Souza", "asouza")],
        responses: Vec::new(),
        surveys: vec![Survey {
            survey_id: 1,
            name: Some("PGLS 2024 Final".to_string()),
        }],
        assessment_stats: vec![AssessmentStat {
            survey_assessment_id: 1,
            total_expected: Some(20),
            total_taken: Some(10),
            response_rate: Some(50.0),
        }],
        questions: vec![
            Question {
                question_id: 10,
                text: Some("How likely are you to recommend this course?".to_string()),
                sub_category: Some(OVERALL.to_string()),
            },
            Question {
                question_id: 11,
                text: Some("The course plan was clear.".to_string()),
                sub_category: Some(PLANNING.to_string()),
            },
        ],
        response_scales: (0..=10)
            .map(|value| ResponseScale {
                response_set_id: 1,
                response_value: value,
                scale: Some("0-10".to_string()),
                legend: Some(value.to_string()),
            })
            .collect(),
        periods: vec![Period {
            period_id: 1,
            name: Some("1".to_string()),
            year: Some("2024".to_string()),
        }],
        courses: vec![course(100, "Strategy", "PGLS.2024.ADM1010_A")],
        comments: Vec::new(),
    }
}
