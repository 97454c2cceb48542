use std::collections::{BTreeMap, HashSet};

use crate::models::{Comment, CommentBundle};
use crate::parser;

/// Comments this short are placeholders ("-", "nada", "ok").
pub const NOISE_MAX_CHARS: usize = 5;

const CONTINUE_DOING: &str = "O professor continue a fazer em sala de aula. / What should the professor continue doing in this course?";
const STOP_DOING: &str = "O professor deixe de fazer em sala de aula. / What should the professor stop doing in the classroom?";
const START_DOING: &str = "O professor passe a fazer em sala de aula. / What should the professor start doing in the classroom?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PromptKey {
    ContinueDoing,
    StopDoing,
    StartDoing,
}

impl PromptKey {
    pub const ALL: [PromptKey; 3] = [Self::ContinueDoing, Self::StopDoing, Self::StartDoing];

    pub fn from_prompt(prompt: &str) -> Option<Self> {
        match prompt {
            CONTINUE_DOING => Some(Self::ContinueDoing),
            STOP_DOING => Some(Self::StopDoing),
            START_DOING => Some(Self::StartDoing),
            _ => None,
        }
    }

    /// Heading used when a bundle is rendered.
    pub fn heading(&self) -> &'static str {
        match self {
            Self::ContinueDoing => "Continue doing",
            Self::StopDoing => "Stop doing",
            Self::StartDoing => "Start doing",
        }
    }
}

impl CommentBundle {
    pub fn comments(&self, key: PromptKey) -> &[String] {
        match key {
            PromptKey::ContinueDoing => &self.continue_doing,
            PromptKey::StopDoing => &self.stop_doing,
            PromptKey::StartDoing => &self.start_doing,
        }
    }
}

/// Pivots the three known prompts into one bundle per course code,
/// username and survey.
///
/// Comments for other prompts or for course codes outside `course_codes`
/// are discarded; a prompt with no comments becomes an empty list.
pub fn reshape_comments(
    comments: &[Comment],
    course_codes: &HashSet<String>,
) -> Vec<CommentBundle> {
    let mut bundles: BTreeMap<(String, String, String), CommentBundle> = BTreeMap::new();

    for comment in comments {
        let Some(key) = PromptKey::from_prompt(&comment.question) else {
            continue;
        };
        if !course_codes.contains(&comment.course_code) {
            continue;
        }

        let bundle = bundles
            .entry((
                comment.course_code.clone(),
                comment.username.clone(),
                comment.survey.clone(),
            ))
            .or_insert_with(|| CommentBundle {
                course_code: comment.course_code.clone(),
                username: comment.username.clone(),
                survey: comment.survey.clone(),
                class_section: parser::derive_class(&comment.course_code),
                continue_doing: Vec::new(),
                stop_doing: Vec::new(),
                start_doing: Vec::new(),
            });

        if let Some(body) = &comment.response {
            let list = match key {
                PromptKey::ContinueDoing => &mut bundle.continue_doing,
                PromptKey::StopDoing => &mut bundle.stop_doing,
                PromptKey::StartDoing => &mut bundle.start_doing,
            };
            list.push(body.clone());
        }
    }

    bundles
        .into_values()
        .map(|mut bundle| {
            bundle.continue_doing = clear_comments(&bundle.continue_doing);
            bundle.stop_doing = clear_comments(&bundle.stop_doing);
            bundle.start_doing = clear_comments(&bundle.start_doing);
            bundle
        })
        .collect()
}

/// Keeps comments longer than [`NOISE_MAX_CHARS`] characters.
pub fn clear_comments(comments: &[String]) -> Vec<String> {
    comments
        .iter()
        .filter(|comment| comment.chars().count() > NOISE_MAX_CHARS)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{comment, CONTINUE_PROMPT, START_PROMPT, STOP_PROMPT};

    const CODE: &str = "PGLS.2024.ADM1010_A";

    fn codes() -> HashSet<String> {
        HashSet::from([CODE.to_string()])
    }

    #[test]
    fn short_comments_are_noise() {
        let comments = vec![
            comment(CODE, "asouza", CONTINUE_PROMPT, Some("Ótimo!")),
            comment(CODE, "asouza", CONTINUE_PROMPT, Some("Bom")),
        ];

        let bundles = reshape_comments(&comments, &codes());
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].continue_doing, vec!["Ótimo!".to_string()]);
    }

    #[test]
    fn noise_filter_is_idempotent() {
        let raw: Vec<String> = ["ok", "Great pacing", "Bom", "Ótimo!", "12345"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let once = clear_comments(&raw);
        assert_eq!(clear_comments(&once), once);
        assert_eq!(once, vec!["Great pacing".to_string(), "Ótimo!".to_string()]);
    }

    #[test]
    fn pivots_prompts_into_named_lists() {
        let comments = vec![
            comment(CODE, "asouza", CONTINUE_PROMPT, Some("Keep the case studies")),
            comment(CODE, "asouza", STOP_PROMPT, Some("Stop running late")),
            comment(CODE, "asouza", CONTINUE_PROMPT, None),
        ];

        let bundles = reshape_comments(&comments, &codes());
        assert_eq!(bundles.len(), 1);
        let bundle = &bundles[0];
        assert_eq!(bundle.class_section, "ADM1010_A");
        assert_eq!(bundle.continue_doing, vec!["Keep the case studies".to_string()]);
        assert_eq!(bundle.stop_doing, vec!["Stop running late".to_string()]);
        assert!(bundle.start_doing.is_empty());
    }

    #[test]
    fn unknown_prompts_and_foreign_courses_are_discarded() {
        let comments = vec![
            comment(CODE, "asouza", "Any other remarks?", Some("Nothing else to add")),
            comment("MBA.2024.FIN100", "asouza", START_PROMPT, Some("Use more examples")),
        ];

        assert!(reshape_comments(&comments, &codes()).is_empty());
    }

    #[test]
    fn bundles_split_by_username_and_survey() {
        let mut other_survey = comment(CODE, "asouza", START_PROMPT, Some("Share slides early"));
        other_survey.survey = "PGLS 2024 Parcial".to_string();
        let comments = vec![
            comment(CODE, "asouza", START_PROMPT, Some("Share slides early")),
            comment(CODE, "blima", START_PROMPT, Some("Share slides early")),
            other_survey,
        ];

        assert_eq!(reshape_comments(&comments, &codes()).len(), 3);
    }

    #[test]
    fn prompt_keys_select_bundle_lists() {
        let comments = vec![comment(CODE, "asouza", STOP_PROMPT, Some("Stop running late"))];
        let bundles = reshape_comments(&comments, &codes());

        let key = PromptKey::from_prompt(STOP_PROMPT).unwrap();
        assert_eq!(key.heading(), "Stop doing");
        assert_eq!(bundles[0].comments(key), ["Stop running late".to_string()]);
        assert!(bundles[0].comments(PromptKey::ContinueDoing).is_empty());
        assert_eq!(
            PromptKey::from_prompt(CONTINUE_PROMPT),
            Some(PromptKey::ContinueDoing)
        );
        assert_eq!(PromptKey::from_prompt(STOP_PROMPT), Some(PromptKey::StopDoing));
        assert_eq!(PromptKey::from_prompt(START_PROMPT), Some(PromptKey::StartDoing));
    }
}
