use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use super::domain::{
    Assessment, AssessmentDetail, AssessmentId, InvitationStatus, NewAssessment, NewQuestion,
    NewUser, Question, QuestionId, QuestionKind, Role, User, UserId,
};
use super::error::WorkflowError;
use super::repository::{InvitationFilter, RecordStore, RepositoryError};

/// Accounts, assessments and questions: validated before they reach the store.
pub struct AssessmentCatalog<S> {
    store: Arc<S>,
}

impl<S> AssessmentCatalog<S>
where
    S: RecordStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn register_user(&self, user: NewUser) -> Result<User, WorkflowError> {
        validate_new_user(&user)?;

        let user = self.store.insert_user(user).map_err(|error| match error {
            RepositoryError::Conflict(_) => {
                WorkflowError::conflict("username or email already exists")
            }
            other => other.into(),
        })?;

        info!(user = %user.id, role = user.role.label(), "user registered");
        Ok(user)
    }

    pub fn create_assessment(&self, assessment: NewAssessment) -> Result<Assessment, WorkflowError> {
        if assessment.title.trim().is_empty() {
            return Err(WorkflowError::validation("title is required"));
        }
        if assessment.time_limit == 0 {
            return Err(WorkflowError::validation(
                "time limit must be a positive number of minutes",
            ));
        }
        self.require_recruiter(assessment.recruiter_id)?;

        let assessment = self.store.insert_assessment(NewAssessment {
            title: assessment.title.trim().to_string(),
            ..assessment
        })?;

        info!(
            assessment = %assessment.id,
            recruiter = %assessment.recruiter_id,
            "assessment created"
        );
        Ok(assessment)
    }

    pub fn set_published(
        &self,
        assessment_id: AssessmentId,
        recruiter_id: UserId,
        published: bool,
    ) -> Result<Assessment, WorkflowError> {
        let mut assessment = self.owned_assessment(assessment_id, recruiter_id)?;
        assessment.published = published;
        self.store.update_assessment(assessment.clone())?;

        info!(assessment = %assessment_id, published, "assessment publish flag changed");
        Ok(assessment)
    }

    pub fn add_question(
        &self,
        recruiter_id: UserId,
        question: NewQuestion,
    ) -> Result<Question, WorkflowError> {
        self.owned_assessment(question.assessment_id, recruiter_id)?;
        validate_question(&question)?;

        let question = self.store.insert_question(NewQuestion {
            prompt: question.prompt.trim().to_string(),
            ..question
        })?;

        info!(
            question = %question.id,
            assessment = %question.assessment_id,
            kind = question.kind.label(),
            "question added"
        );
        Ok(question)
    }

    pub fn assessment_detail(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<AssessmentDetail, WorkflowError> {
        let assessment = self
            .store
            .fetch_assessment(assessment_id)?
            .ok_or_else(|| WorkflowError::not_found(format!("assessment {assessment_id}")))?;
        let questions = self.store.questions_for(assessment_id)?;
        Ok(AssessmentDetail {
            assessment,
            questions,
        })
    }

    /// Assessments the interviewee currently holds an accepted invitation for.
    pub fn assessments_for(&self, interviewee_id: UserId) -> Result<Vec<Assessment>, WorkflowError> {
        let invitations = self.store.find_invitations(InvitationFilter {
            interviewee: Some(interviewee_id),
            status: Some(InvitationStatus::Accepted),
            ..InvitationFilter::default()
        })?;

        let mut assessments = Vec::with_capacity(invitations.len());
        for invitation in invitations {
            if let Some(assessment) = self.store.fetch_assessment(invitation.assessment_id)? {
                assessments.push(assessment);
            }
        }
        Ok(assessments)
    }

    /// Interviewees holding an accepted invitation for the assessment.
    pub fn accepted_interviewees(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Vec<User>, WorkflowError> {
        let invitations = self.store.find_invitations(InvitationFilter {
            assessment: Some(assessment_id),
            status: Some(InvitationStatus::Accepted),
            ..InvitationFilter::default()
        })?;

        let mut users = Vec::with_capacity(invitations.len());
        for invitation in invitations {
            if let Some(user) = self.store.fetch_user(invitation.interviewee_id)? {
                users.push(user);
            }
        }
        Ok(users)
    }

    fn require_recruiter(&self, recruiter_id: UserId) -> Result<User, WorkflowError> {
        match self.store.fetch_user(recruiter_id)? {
            Some(user) if user.role == Role::Recruiter => Ok(user),
            Some(_) => Err(WorkflowError::forbidden(
                "only recruiters can manage assessments",
            )),
            None => Err(WorkflowError::not_found(format!("user {recruiter_id}"))),
        }
    }

    fn owned_assessment(
        &self,
        assessment_id: AssessmentId,
        recruiter_id: UserId,
    ) -> Result<Assessment, WorkflowError> {
        let assessment = self
            .store
            .fetch_assessment(assessment_id)?
            .ok_or_else(|| WorkflowError::not_found(format!("assessment {assessment_id}")))?;
        if assessment.recruiter_id != recruiter_id {
            return Err(WorkflowError::forbidden(format!(
                "assessment {assessment_id} belongs to another recruiter"
            )));
        }
        Ok(assessment)
    }
}

/// Practice assessment offered to every interviewee; never persisted.
pub fn trial_assessment() -> AssessmentDetail {
    let assessment_id = AssessmentId(0);
    let mut choices = BTreeMap::new();
    choices.insert("A".to_string(), "3".to_string());
    choices.insert("B".to_string(), "4".to_string());
    choices.insert("C".to_string(), "5".to_string());

    AssessmentDetail {
        assessment: Assessment {
            id: assessment_id,
            title: "Trial Assessment".to_string(),
            description: Some("Practice round; answers are not recorded.".to_string()),
            recruiter_id: UserId(0),
            time_limit: 15,
            published: true,
        },
        questions: vec![
            Question {
                id: QuestionId(1),
                assessment_id,
                prompt: "What is 2 + 2?".to_string(),
                kind: QuestionKind::MultipleChoice {
                    choices,
                    correct_answer: "B".to_string(),
                },
                weight: None,
            },
            Question {
                id: QuestionId(2),
                assessment_id,
                prompt: "Explain the concept of recursion.".to_string(),
                kind: QuestionKind::Subjective,
                weight: None,
            },
        ],
    }
}

fn validate_new_user(user: &NewUser) -> Result<(), WorkflowError> {
    let required = [
        ("username", &user.username),
        ("first_name", &user.first_name),
        ("last_name", &user.last_name),
        ("email", &user.email),
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(WorkflowError::validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }

    let has_company = user
        .company_name
        .as_deref()
        .map(|name| !name.trim().is_empty())
        .unwrap_or(false);
    match user.role {
        Role::Recruiter => {
            if !has_company {
                return Err(WorkflowError::validation(
                    "company name is required for the recruiter role",
                ));
            }
            if user.consent.is_some() {
                return Err(WorkflowError::validation(
                    "consent only applies to the interviewee role",
                ));
            }
        }
        Role::Interviewee => {
            if user.consent.is_none() {
                return Err(WorkflowError::validation(
                    "consent is required for the interviewee role",
                ));
            }
            if has_company {
                return Err(WorkflowError::validation(
                    "company name only applies to the recruiter role",
                ));
            }
        }
    }
    Ok(())
}

fn validate_question(question: &NewQuestion) -> Result<(), WorkflowError> {
    if question.prompt.trim().is_empty() {
        return Err(WorkflowError::validation("question text is required"));
    }
    if let Some(weight) = question.weight {
        if !weight.is_finite() || weight <= 0.0 {
            return Err(WorkflowError::validation(
                "question weight must be a positive number",
            ));
        }
    }

    if let QuestionKind::MultipleChoice {
        choices,
        correct_answer,
    } = &question.kind
    {
        if choices.len() < 2 {
            return Err(WorkflowError::validation(
                "multiple choice questions need at least two choices",
            ));
        }
        if !choices.contains_key(correct_answer) {
            return Err(WorkflowError::validation(format!(
                "correct answer '{correct_answer}' is not one of the choice labels"
            )));
        }
    }
    Ok(())
}
