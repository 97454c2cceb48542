use std::collections::BTreeMap;

use crate::models::{JoinedResponse, NpsRecord, SurveyStats};

pub const PROMOTER_MIN: i32 = 9;
pub const DETRACTOR_MAX: i32 = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NpsCounts {
    pub promoters: usize,
    pub detractors: usize,
    pub total: usize,
}

/// Counts promoters (>= 9) and detractors (<= 7). An 8 only adds to the total.
pub fn classify(values: &[i32]) -> NpsCounts {
    values.iter().fold(NpsCounts::default(), |mut counts, &value| {
        if value >= PROMOTER_MIN {
            counts.promoters += 1;
        } else if value <= DETRACTOR_MAX {
            counts.detractors += 1;
        }
        counts.total += 1;
        counts
    })
}

/// `(promoters - detractors) / total * 100`, or `None` for an empty group.
pub fn nps_score(counts: NpsCounts) -> Option<f64> {
    if counts.total == 0 {
        return None;
    }
    let net = counts.promoters as f64 - counts.detractors as f64;
    Some(net / counts.total as f64 * 100.0)
}

/// NPS per teacher, class, survey, period and assessment over the
/// overall-evaluation responses.
pub fn compute_nps(rows: &[JoinedResponse], overall_category: &str) -> Vec<NpsRecord> {
    let mut groups: BTreeMap<NpsKey, (Option<SurveyStats>, Vec<i32>)> = BTreeMap::new();

    for row in rows
        .iter()
        .filter(|row| row.question_sub_category == overall_category)
    {
        let key = NpsKey {
            full_name: row.full_name.clone(),
            email: row.email.clone(),
            class_code: row.class_code.clone(),
            survey: row.survey.clone(),
            period: row.period.clone(),
            stats: row.stats.as_ref().map(SurveyStats::key),
        };
        groups
            .entry(key)
            .or_insert_with(|| (row.stats, Vec::new()))
            .1
            .push(row.response_value);
    }

    groups
        .into_iter()
        .map(|(key, (stats, values))| {
            let counts = classify(&values);
            NpsRecord {
                full_name: key.full_name,
                email: key.email,
                class_code: key.class_code,
                survey: key.survey,
                period: key.period,
                stats,
                promoters: counts.promoters,
                detractors: counts.detractors,
                total: counts.total,
                nps: nps_score(counts),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct NpsKey {
    full_name: String,
    email: String,
    class_code: String,
    survey: String,
    period: String,
    stats: Option<(i64, i64, u64)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{join_responses, StatsPolicy};
    use crate::fixtures::{self, OVERALL};

    #[test]
    fn nine_and_six_cancel_out() {
        let mut snapshot = fixtures::snapshot();
        snapshot.responses = vec![
            fixtures::response(9, 1, 10, 100),
            fixtures::response(6, 1, 10, 100),
        ];
        let rows = join_responses(&snapshot, "PGLS", StatsPolicy::Join).unwrap();

        let records = compute_nps(&rows, OVERALL);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.full_name, "ANA SOUZA");
        assert_eq!(record.class_code, "ADM1010_A");
        assert_eq!(record.promoters, 1);
        assert_eq!(record.detractors, 1);
        assert_eq!(record.total, 2);
        assert_eq!(record.nps, Some(0.0));
    }

    #[test]
    fn only_overall_category_contributes() {
        let mut snapshot = fixtures::snapshot();
        snapshot.responses = vec![
            fixtures::response(10, 1, 10, 100),
            fixtures::response(2, 1, 11, 100),
        ];
        let rows = join_responses(&snapshot, "PGLS", StatsPolicy::Join).unwrap();

        let records = compute_nps(&rows, OVERALL);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].total, 1);
        assert_eq!(records[0].nps, Some(100.0));
    }

    #[test]
    fn eights_are_neutral() {
        let counts = classify(&[8, 8, 9, 3]);
        assert_eq!(
            counts,
            NpsCounts {
                promoters: 1,
                detractors: 1,
                total: 4
            }
        );
        assert_eq!(nps_score(counts), Some(0.0));
    }

    #[test]
    fn empty_group_has_no_score() {
        let counts = classify(&[]);
        assert_eq!(counts.total, 0);
        assert_eq!(nps_score(counts), None);
    }

    #[test]
    fn buckets_never_exceed_total() {
        for low in 0..=10 {
            for high in low..=10 {
                let values: Vec<i32> = (low..=high).collect();
                let counts = classify(&values);
                assert!(counts.promoters + counts.detractors <= counts.total);
                let has_eight = values.contains(&8);
                assert_eq!(
                    counts.promoters + counts.detractors == counts.total,
                    !has_eight
                );
            }
        }
    }

    #[test]
    fn no_rows_means_no_records() {
        assert!(compute_nps(&[], OVERALL).is_empty());
    }
}
