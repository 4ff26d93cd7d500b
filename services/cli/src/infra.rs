use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use smart_recruiter::error::AppError;
use smart_recruiter::workflows::assessments::{
    AddQuestionRequest, AnswerDraft, AssessmentDetail, AssessmentWorkflowService, Clock,
    CreateAssessmentRequest, FeedbackRequest, InMemoryNotifications, InMemoryRecordStore,
    NewUser, Principal, Question, SubmitAssessmentRequest, User, WorkflowConfig, WorkflowError,
};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const DEFAULT_SEED: &str = include_str!("../fixtures/seed.json");

pub(crate) type CliService = AssessmentWorkflowService<InMemoryRecordStore, InMemoryNotifications>;

/// Clock the CLI moves by hand so seeded submissions land in their own months.
#[derive(Debug)]
pub(crate) struct ReplayClock {
    now: Mutex<DateTime<Utc>>,
}

impl ReplayClock {
    pub(crate) fn starting_at(instant: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(instant),
        }
    }

    pub(crate) fn set(&self, instant: DateTime<Utc>) {
        match self.now.lock() {
            Ok(mut guard) => *guard = instant,
            Err(poisoned) => *poisoned.into_inner() = instant,
        }
    }

    pub(crate) fn set_date(&self, date: NaiveDate) {
        self.set(start_of_day(date));
    }
}

impl Clock for ReplayClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SeedFixture {
    pub(crate) recruiter: NewUser,
    #[serde(default)]
    pub(crate) interviewees: Vec<NewUser>,
    #[serde(default)]
    pub(crate) assessments: Vec<SeedAssessment>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SeedAssessment {
    #[serde(flatten)]
    pub(crate) details: CreateAssessmentRequest,
    #[serde(default)]
    pub(crate) questions: Vec<AddQuestionRequest>,
    #[serde(default)]
    pub(crate) submissions: Vec<SeedSubmission>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SeedSubmission {
    /// Username of a seeded interviewee.
    pub(crate) interviewee: String,
    #[serde(deserialize_with = "deserialize_date")]
    pub(crate) submitted_on: NaiveDate,
    pub(crate) answers: Vec<SeedAnswer>,
    #[serde(default)]
    pub(crate) feedback: Vec<SeedFeedback>,
}

/// Questions are referenced by position within their assessment.
#[derive(Debug, Deserialize)]
pub(crate) struct SeedAnswer {
    pub(crate) question: usize,
    pub(crate) text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SeedFeedback {
    #[serde(default)]
    pub(crate) question: Option<usize>,
    #[serde(default)]
    pub(crate) score: Option<f64>,
    pub(crate) text: String,
}

impl SeedFixture {
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, AppError> {
        match path {
            Some(path) => {
                let reader = BufReader::new(File::open(path)?);
                Ok(serde_json::from_reader(reader)?)
            }
            None => Ok(serde_json::from_str(DEFAULT_SEED)?),
        }
    }
}

/// In-memory service plus everything the seed created in it.
pub(crate) struct SeededWorkspace {
    pub(crate) service: Arc<CliService>,
    pub(crate) notifications: Arc<InMemoryNotifications>,
    pub(crate) clock: Arc<ReplayClock>,
    pub(crate) recruiter: User,
    pub(crate) interviewees: Vec<User>,
    pub(crate) assessments: Vec<AssessmentDetail>,
    pub(crate) submissions: usize,
}

impl SeededWorkspace {
    pub(crate) fn build(fixture: SeedFixture, config: WorkflowConfig) -> Result<Self, AppError> {
        let store = Arc::new(InMemoryRecordStore::new());
        let notifications = Arc::new(InMemoryNotifications::default());
        let clock = Arc::new(ReplayClock::starting_at(Utc::now()));
        let service = Arc::new(AssessmentWorkflowService::with_clock(
            store,
            notifications.clone(),
            config,
            clock.clone(),
        ));

        let recruiter = service.register_user(fixture.recruiter)?;
        let interviewees = fixture
            .interviewees
            .into_iter()
            .map(|profile| service.register_user(profile))
            .collect::<Result<Vec<_>, _>>()?;

        let mut workspace = Self {
            service,
            notifications,
            clock,
            recruiter,
            interviewees,
            assessments: Vec::new(),
            submissions: 0,
        };
        for assessment in fixture.assessments {
            workspace.seed_assessment(assessment)?;
        }

        info!(
            interviewees = workspace.interviewees.len(),
            assessments = workspace.assessments.len(),
            submissions = workspace.submissions,
            "seed workspace ready"
        );
        Ok(workspace)
    }

    pub(crate) fn recruiter_principal(&self) -> Principal {
        principal(&self.recruiter)
    }

    pub(crate) fn interviewee(&self, username: &str) -> Result<&User, WorkflowError> {
        self.interviewees
            .iter()
            .find(|user| user.username == username)
            .ok_or_else(|| {
                WorkflowError::NotFound(format!("interviewee '{username}' is not seeded"))
            })
    }

    fn seed_assessment(&mut self, seed: SeedAssessment) -> Result<(), AppError> {
        let owner = self.recruiter_principal();
        let assessment = self
            .service
            .create_assessment(Some(&owner), seed.details)?;
        let questions = seed
            .questions
            .into_iter()
            .map(|request| {
                self.service
                    .add_question(Some(&owner), assessment.id, request)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let detail = AssessmentDetail {
            assessment,
            questions,
        };

        for submission in seed.submissions {
            self.seed_submission(&detail, submission)?;
        }
        self.assessments.push(detail);
        Ok(())
    }

    fn seed_submission(
        &mut self,
        detail: &AssessmentDetail,
        seed: SeedSubmission,
    ) -> Result<(), AppError> {
        let owner = self.recruiter_principal();
        let candidate = principal(self.interviewee(&seed.interviewee)?);
        self.clock.set_date(seed.submitted_on);

        let invitation = self.service.issue_invitation(
            Some(&owner),
            detail.assessment.id,
            candidate.id,
            None,
        )?;
        self.service
            .accept_invitation(Some(&candidate), invitation.id)?;

        let answers = seed
            .answers
            .iter()
            .map(|answer| {
                question_at(detail, answer.question)
                    .map(|question| AnswerDraft::new(question.id, answer.text.as_str()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let receipt = self.service.submit(
            Some(&candidate),
            SubmitAssessmentRequest {
                assessment_id: detail.assessment.id,
                answers,
            },
        )?;

        for feedback in &seed.feedback {
            let question_id = feedback
                .question
                .map(|index| question_at(detail, index).map(|question| question.id))
                .transpose()?;
            self.service.add_feedback(
                Some(&owner),
                FeedbackRequest {
                    submission_id: receipt.submission.id,
                    question_id,
                    text: feedback.text.clone(),
                    score: feedback.score,
                },
            )?;
        }
        let scored = self
            .service
            .recompute_score(Some(&owner), receipt.submission.id)?;
        debug!(
            submission = %scored.id,
            score = ?scored.score,
            status = scored.status.label(),
            "seeded submission scored"
        );

        self.submissions += 1;
        Ok(())
    }
}

fn question_at(detail: &AssessmentDetail, index: usize) -> Result<&Question, WorkflowError> {
    detail.questions.get(index).ok_or_else(|| {
        WorkflowError::Validation(format!(
            "assessment '{}' has no question at position {index}",
            detail.assessment.title
        ))
    })
}

pub(crate) fn principal(user: &User) -> Principal {
    Principal {
        id: user.id,
        role: user.role,
    }
}

pub(crate) fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(serde::de::Error::custom)
}
