use once_cell::sync::Lazy;
use regex::Regex;

static CLASS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]+\d+").expect("class pattern is valid"));
static SUBDIVISION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_(\w+)$").expect("subdivision pattern is valid"));

/// Returns the segment after the last `.` of a school course code.
pub fn class_segment(code: &str) -> &str {
    code.rsplit('.').next().unwrap_or(code)
}

/// Splits a class segment into its class code and optional subdivision and
/// joins them back as `<class>_<subdivision>`.
///
/// Segments without a leading letter+digit run are returned whole, so the
/// function never fails and is safe to re-run on its own output.
pub fn extract_class_and_subdivision(segment: &str) -> String {
    let class_code = CLASS_PATTERN
        .find(segment)
        .map(|m| m.as_str())
        .unwrap_or(segment);

    match SUBDIVISION_PATTERN
        .captures(segment)
        .and_then(|caps| caps.get(1))
    {
        Some(subdivision) => format!("{}_{}", class_code, subdivision.as_str()),
        None => class_code.to_string(),
    }
}

pub fn derive_class(school_course_code: &str) -> String {
    extract_class_and_subdivision(class_segment(school_course_code))
}
