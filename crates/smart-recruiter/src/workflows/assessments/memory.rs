use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::domain::{
    Answer, AnswerId, Assessment, AssessmentId, Feedback, FeedbackId, Invitation, InvitationId,
    InvitationStatus, NewAssessment, NewFeedback, NewInvitation, NewQuestion, NewSubmission,
    NewUser, Notification, Question, QuestionId, Role, Submission, SubmissionId, SubmissionStatus,
    User, UserId,
};
use super::repository::{
    InvitationFilter, NotificationError, NotificationPublisher, RecordStore, RepositoryError,
    ScoreUpdate, SubmissionFilter,
};

/// Record store kept in process memory.
///
/// A single mutex guards every table, so each trait call is serializable with respect to
/// every other call and the uniqueness checks cannot interleave with the writes they guard.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    sequence: i64,
    users: BTreeMap<UserId, User>,
    assessments: BTreeMap<AssessmentId, Assessment>,
    questions: BTreeMap<QuestionId, Question>,
    invitations: BTreeMap<InvitationId, Invitation>,
    submissions: BTreeMap<SubmissionId, Submission>,
    answers: BTreeMap<AnswerId, Answer>,
    feedback: BTreeMap<FeedbackId, Feedback>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.sequence += 1;
        self.sequence
    }
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl RecordStore for InMemoryRecordStore {
    fn insert_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables()?;
        let duplicate = tables.users.values().any(|existing| {
            existing.username == user.username || existing.email.eq_ignore_ascii_case(&user.email)
        });
        if duplicate {
            return Err(RepositoryError::Conflict(
                "username or email already exists".to_string(),
            ));
        }

        let id = UserId(tables.next_id());
        let record = User {
            id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            role: user.role,
            gender: user.gender,
            credential_hash: user.credential_hash,
            company_name: user.company_name,
            consent: user.consent,
        };
        tables.users.insert(id, record.clone());
        Ok(record)
    }

    fn fetch_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.tables()?.users.get(&id).cloned())
    }

    fn users_with_role(&self, role: Role) -> Result<Vec<User>, RepositoryError> {
        Ok(self
            .tables()?
            .users
            .values()
            .filter(|user| user.role == role)
            .cloned()
            .collect())
    }

    fn insert_assessment(&self, assessment: NewAssessment) -> Result<Assessment, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.users.contains_key(&assessment.recruiter_id) {
            return Err(RepositoryError::NotFound(format!(
                "user {}",
                assessment.recruiter_id
            )));
        }

        let id = AssessmentId(tables.next_id());
        let record = Assessment {
            id,
            title: assessment.title,
            description: assessment.description,
            recruiter_id: assessment.recruiter_id,
            time_limit: assessment.time_limit,
            published: assessment.published,
        };
        tables.assessments.insert(id, record.clone());
        Ok(record)
    }

    fn fetch_assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, RepositoryError> {
        Ok(self.tables()?.assessments.get(&id).cloned())
    }

    fn update_assessment(&self, assessment: Assessment) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        match tables.assessments.get_mut(&assessment.id) {
            Some(slot) => {
                *slot = assessment;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!(
                "assessment {}",
                assessment.id
            ))),
        }
    }

    fn insert_question(&self, question: NewQuestion) -> Result<Question, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.assessments.contains_key(&question.assessment_id) {
            return Err(RepositoryError::NotFound(format!(
                "assessment {}",
                question.assessment_id
            )));
        }

        let id = QuestionId(tables.next_id());
        let record = Question {
            id,
            assessment_id: question.assessment_id,
            prompt: question.prompt,
            kind: question.kind,
            weight: question.weight,
        };
        tables.questions.insert(id, record.clone());
        Ok(record)
    }

    fn questions_for(&self, assessment: AssessmentId) -> Result<Vec<Question>, RepositoryError> {
        Ok(self
            .tables()?
            .questions
            .values()
            .filter(|question| question.assessment_id == assessment)
            .cloned()
            .collect())
    }

    fn insert_invitation(
        &self,
        invitation: NewInvitation,
    ) -> Result<Invitation, RepositoryError> {
        let mut tables = self.tables()?;
        let occupied = invitation.status.is_active()
            && tables.invitations.values().any(|existing| {
                existing.assessment_id == invitation.assessment_id
                    && existing.interviewee_id == invitation.interviewee_id
                    && existing.status.is_active()
            });
        if occupied {
            return Err(RepositoryError::Conflict(format!(
                "interviewee {} already holds an active invitation for assessment {}",
                invitation.interviewee_id, invitation.assessment_id
            )));
        }

        let id = InvitationId(tables.next_id());
        let record = Invitation {
            id,
            assessment_id: invitation.assessment_id,
            interviewee_id: invitation.interviewee_id,
            status: invitation.status,
            expiry_date: invitation.expiry_date,
        };
        tables.invitations.insert(id, record.clone());
        Ok(record)
    }

    fn fetch_invitation(&self, id: InvitationId) -> Result<Option<Invitation>, RepositoryError> {
        Ok(self.tables()?.invitations.get(&id).cloned())
    }

    fn transition_invitation(
        &self,
        id: InvitationId,
        from: InvitationStatus,
        to: InvitationStatus,
    ) -> Result<Invitation, RepositoryError> {
        let mut tables = self.tables()?;
        match tables.invitations.get_mut(&id) {
            Some(invitation) if invitation.status == from => {
                invitation.status = to;
                Ok(invitation.clone())
            }
            _ => Err(RepositoryError::NotFound(format!(
                "no {} invitation {id}",
                from.label()
            ))),
        }
    }

    fn find_invitations(
        &self,
        filter: InvitationFilter,
    ) -> Result<Vec<Invitation>, RepositoryError> {
        Ok(self
            .tables()?
            .invitations
            .values()
            .filter(|invitation| filter.matches(invitation))
            .cloned()
            .collect())
    }

    fn insert_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<(Submission, Vec<Answer>), RepositoryError> {
        let mut tables = self.tables()?;
        let pair = SubmissionFilter::pair(submission.assessment_id, submission.interviewee_id);
        if tables.submissions.values().any(|existing| pair.matches(existing)) {
            return Err(RepositoryError::Conflict(format!(
                "interviewee {} already submitted assessment {}",
                submission.interviewee_id, submission.assessment_id
            )));
        }

        // Validate every answer before touching any table.
        for answer in &submission.answers {
            if !tables.questions.contains_key(&answer.question_id) {
                return Err(RepositoryError::NotFound(format!(
                    "question {}",
                    answer.question_id
                )));
            }
        }

        let id = SubmissionId(tables.next_id());
        let record = Submission {
            id,
            assessment_id: submission.assessment_id,
            interviewee_id: submission.interviewee_id,
            status: submission.status,
            score: submission.score,
            submitted_at: submission.submitted_at,
        };

        let mut answers = Vec::with_capacity(submission.answers.len());
        for answer in submission.answers {
            let answer_id = AnswerId(tables.next_id());
            answers.push(Answer {
                id: answer_id,
                submission_id: id,
                question_id: answer.question_id,
                answer_text: answer.answer_text,
                is_correct: answer.is_correct,
                score: answer.score,
            });
        }

        tables.submissions.insert(id, record.clone());
        for answer in &answers {
            tables.answers.insert(answer.id, answer.clone());
        }
        Ok((record, answers))
    }

    fn fetch_submission(&self, id: SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        Ok(self.tables()?.submissions.get(&id).cloned())
    }

    fn find_submissions(
        &self,
        filter: SubmissionFilter,
    ) -> Result<Vec<Submission>, RepositoryError> {
        Ok(self
            .tables()?
            .submissions
            .values()
            .filter(|submission| filter.matches(submission))
            .cloned()
            .collect())
    }

    fn answers_for(&self, submission: SubmissionId) -> Result<Vec<Answer>, RepositoryError> {
        Ok(self
            .tables()?
            .answers
            .values()
            .filter(|answer| answer.submission_id == submission)
            .cloned()
            .collect())
    }

    fn commit_scores(&self, update: ScoreUpdate) -> Result<Submission, RepositoryError> {
        let mut tables = self.tables()?;
        let stored = tables
            .submissions
            .get(&update.submission_id)
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("submission {}", update.submission_id))
            })?;
        if stored.status != update.observed.status || stored.score != update.observed.aggregate
        {
            return Err(RepositoryError::Conflict(format!(
                "submission {} changed since it was scored",
                update.submission_id
            )));
        }
        if stored.status == SubmissionStatus::Graded && update.status != SubmissionStatus::Graded {
            return Err(RepositoryError::Conflict(format!(
                "submission {} is already graded",
                update.submission_id
            )));
        }
        let answers_moved = update
            .observed
            .answer_scores
            .iter()
            .any(|(answer_id, score)| {
                tables.answers.get(answer_id).map(|answer| answer.score) != Some(*score)
            });
        if answers_moved {
            return Err(RepositoryError::Conflict(format!(
                "answers of submission {} changed since they were scored",
                update.submission_id
            )));
        }
        for (answer_id, _) in &update.answer_scores {
            let owned = tables
                .answers
                .get(answer_id)
                .map(|answer| answer.submission_id == update.submission_id)
                .unwrap_or(false);
            if !owned {
                return Err(RepositoryError::NotFound(format!("answer {answer_id}")));
            }
        }
        if let Some(invitation_id) = update.complete_invitation {
            let accepted = tables
                .invitations
                .get(&invitation_id)
                .map(|invitation| invitation.status == InvitationStatus::Accepted)
                .unwrap_or(false);
            if !accepted {
                return Err(RepositoryError::NotFound(format!(
                    "no accepted invitation {invitation_id}"
                )));
            }
        }

        for (answer_id, score) in &update.answer_scores {
            if let Some(answer) = tables.answers.get_mut(answer_id) {
                answer.score = Some(*score);
            }
        }
        if let Some(invitation_id) = update.complete_invitation {
            if let Some(invitation) = tables.invitations.get_mut(&invitation_id) {
                invitation.status = InvitationStatus::Completed;
            }
        }

        let submission = tables
            .submissions
            .get_mut(&update.submission_id)
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("submission {}", update.submission_id))
            })?;
        submission.score = update.aggregate;
        submission.status = update.status;
        Ok(submission.clone())
    }

    fn insert_feedback(&self, feedback: NewFeedback) -> Result<Feedback, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.submissions.contains_key(&feedback.submission_id) {
            return Err(RepositoryError::NotFound(format!(
                "submission {}",
                feedback.submission_id
            )));
        }

        let id = FeedbackId(tables.next_id());
        let record = Feedback {
            id,
            submission_id: feedback.submission_id,
            question_id: feedback.question_id,
            recruiter_id: feedback.recruiter_id,
            text: feedback.text,
            score: feedback.score,
        };
        tables.feedback.insert(id, record.clone());
        Ok(record)
    }

    fn feedback_for(&self, submission: SubmissionId) -> Result<Vec<Feedback>, RepositoryError> {
        Ok(self
            .tables()?
            .feedback
            .values()
            .filter(|feedback| feedback.submission_id == submission)
            .cloned()
            .collect())
    }
}

/// Inbox that keeps every published notification.
#[derive(Debug, Default)]
pub struct InMemoryNotifications {
    events: Mutex<Vec<Notification>>,
}

impl InMemoryNotifications {
    pub fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn for_user(&self, user: UserId) -> Vec<Notification> {
        self.events()
            .into_iter()
            .filter(|notification| notification.user_id == user)
            .collect()
    }
}

impl NotificationPublisher for InMemoryNotifications {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .map_err(|_| NotificationError::Transport("inbox mutex poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}
