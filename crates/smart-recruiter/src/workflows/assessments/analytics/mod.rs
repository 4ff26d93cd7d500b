pub mod views;

pub use views::{
    GenderComposition, MonthlyPerformance, QualificationEntry, QualificationReport,
    QualificationStatus,
};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{AssessmentId, Gender, Role};
use super::error::WorkflowError;
use super::repository::{RecordStore, SubmissionFilter};
use super::scoring::average_score;

pub const DEFAULT_QUALIFICATION_THRESHOLD: f64 = 50.0;

/// Thresholds and title markers used by the read-side reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Inclusive lower bound for `Qualified`.
    pub qualification_threshold: f64,
    pub trial_marker: String,
    pub real_marker: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            qualification_threshold: DEFAULT_QUALIFICATION_THRESHOLD,
            trial_marker: "trial".to_string(),
            real_marker: "real".to_string(),
        }
    }
}

/// Read-only statistics over the record store.
pub struct AnalyticsAggregator<S> {
    store: Arc<S>,
    config: AnalyticsConfig,
}

impl<S> AnalyticsAggregator<S>
where
    S: RecordStore,
{
    pub fn new(store: Arc<S>, config: AnalyticsConfig) -> Self {
        Self { store, config }
    }

    pub fn qualification_report(&self) -> Result<QualificationReport, WorkflowError> {
        let mut interviewees = self.store.users_with_role(Role::Interviewee)?;
        interviewees.sort_by_key(|user| user.id);

        let mut entries = Vec::with_capacity(interviewees.len());
        for interviewee in interviewees {
            let average = average_score(self.store.as_ref(), interviewee.id)?;
            let status = if average >= self.config.qualification_threshold {
                QualificationStatus::Qualified
            } else {
                QualificationStatus::NotQualified
            };
            entries.push(QualificationEntry {
                id: interviewee.id,
                name: interviewee.display_name(),
                average_score: average,
                status,
            });
        }

        debug!(interviewees = entries.len(), "qualification report built");
        Ok(QualificationReport { entries })
    }

    pub fn gender_composition(&self) -> Result<GenderComposition, WorkflowError> {
        let composition = self
            .store
            .users_with_role(Role::Interviewee)?
            .iter()
            .fold(GenderComposition::default(), |mut acc, user| {
                match user.gender {
                    Gender::Male => acc.male += 1,
                    Gender::Female => acc.female += 1,
                    Gender::Other => acc.other += 1,
                }
                acc
            });
        Ok(composition)
    }

    /// Score totals per calendar month of `submitted_at`, split by assessment title marker.
    /// Every month with a submission is reported, with 0 for an empty category.
    pub fn monthly_performance(&self) -> Result<Vec<MonthlyPerformance>, WorkflowError> {
        let trial_marker = self.config.trial_marker.to_lowercase();
        let real_marker = self.config.real_marker.to_lowercase();

        let mut titles: HashMap<AssessmentId, String> = HashMap::new();
        let mut months: BTreeMap<(i32, u32), (f64, f64)> = BTreeMap::new();

        for submission in self.store.find_submissions(SubmissionFilter::default())? {
            let Some(submitted_at) = submission.submitted_at else {
                continue;
            };

            if !titles.contains_key(&submission.assessment_id) {
                let title = self
                    .store
                    .fetch_assessment(submission.assessment_id)?
                    .map(|assessment| assessment.title.to_lowercase())
                    .unwrap_or_default();
                titles.insert(submission.assessment_id, title);
            }
            let title = titles
                .get(&submission.assessment_id)
                .map(String::as_str)
                .unwrap_or_default();

            let score = submission.score.unwrap_or(0.0);
            let totals = months
                .entry((submitted_at.year(), submitted_at.month()))
                .or_insert((0.0, 0.0));
            if title.contains(&trial_marker) {
                totals.0 += score;
            }
            if title.contains(&real_marker) {
                totals.1 += score;
            }
        }

        Ok(months
            .into_iter()
            .map(|((year, month), (trial, real))| MonthlyPerformance {
                year,
                month,
                trial,
                real,
            })
            .collect())
    }
}
