use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::clock::Clock;
use super::domain::{
    Assessment, AssessmentId, Invitation, InvitationId, InvitationStatus, NewInvitation,
    Notification, NotificationKind, Role, UserId,
};
use super::error::{ErrorView, WorkflowError};
use super::repository::{
    deliver, InvitationFilter, NotificationPublisher, RecordStore, RepositoryError,
};

/// Owns the pending -> accepted -> completed / expired state machine.
pub struct InvitationLifecycle<S, N> {
    store: Arc<S>,
    notifications: Arc<N>,
    clock: Arc<dyn Clock>,
}

/// Per-interviewee result of a bulk issue.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueOutcome {
    pub interviewee_id: UserId,
    pub result: Result<Invitation, WorkflowError>,
}

impl IssueOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn view(&self) -> IssueOutcomeView {
        let (invitation, error) = match &self.result {
            Ok(invitation) => (Some(invitation.clone()), None),
            Err(error) => (None, Some(error.view())),
        };
        IssueOutcomeView {
            interviewee_id: self.interviewee_id,
            invitation,
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueOutcomeView {
    pub interviewee_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation: Option<Invitation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorView>,
}

impl<S, N> InvitationLifecycle<S, N>
where
    S: RecordStore,
    N: NotificationPublisher,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            notifications,
            clock,
        }
    }

    /// Issue a single pending invitation.
    pub fn issue(
        &self,
        assessment_id: AssessmentId,
        interviewee_id: UserId,
        expiry_date: Option<DateTime<Utc>>,
    ) -> Result<Invitation, WorkflowError> {
        let now = self.clock.now();
        let assessment = self.issuable_assessment(assessment_id, expiry_date, now)?;
        self.issue_one(&assessment, interviewee_id, expiry_date, now)
    }

    /// Issue one invitation per interviewee. Request-level problems (unknown assessment,
    /// expiry in the past, empty list) fail the whole call; everything else is reported per
    /// interviewee and never aborts the others.
    pub fn issue_bulk(
        &self,
        assessment_id: AssessmentId,
        interviewee_ids: &[UserId],
        expiry_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<IssueOutcome>, WorkflowError> {
        if interviewee_ids.is_empty() {
            return Err(WorkflowError::validation(
                "at least one interviewee id is required",
            ));
        }

        let now = self.clock.now();
        let assessment = self.issuable_assessment(assessment_id, expiry_date, now)?;

        let outcomes: Vec<IssueOutcome> = interviewee_ids
            .iter()
            .map(|&interviewee_id| IssueOutcome {
                interviewee_id,
                result: self.issue_one(&assessment, interviewee_id, expiry_date, now),
            })
            .collect();

        let issued = outcomes.iter().filter(|outcome| outcome.is_success()).count();
        info!(
            assessment = %assessment_id,
            requested = outcomes.len(),
            issued,
            "bulk invitation issue finished"
        );
        Ok(outcomes)
    }

    /// `pending -> accepted` by the invited interviewee. An invitation past its expiry is
    /// moved to `expired` instead and the call fails, whoever the caller is.
    pub fn accept(
        &self,
        invitation_id: InvitationId,
        actor_id: UserId,
    ) -> Result<Invitation, WorkflowError> {
        let invitation = self
            .store
            .fetch_invitation(invitation_id)?
            .filter(|invitation| invitation.status == InvitationStatus::Pending)
            .ok_or_else(|| {
                WorkflowError::not_found(format!("no pending invitation {invitation_id}"))
            })?;

        let now = self.clock.now();
        if invitation.is_past_expiry(now) {
            if observe_expiry(self.store.as_ref(), &invitation)? {
                self.notify_expired(&invitation)?;
            }
            return Err(WorkflowError::Expired(
                "this invitation has expired".to_string(),
            ));
        }

        if invitation.interviewee_id != actor_id {
            warn!(
                invitation = %invitation_id,
                actor = %actor_id,
                "invitation accept attempted by another user"
            );
            return Err(WorkflowError::forbidden(
                "only the invited interviewee can accept this invitation",
            ));
        }

        let accepted = self
            .store
            .transition_invitation(
                invitation_id,
                InvitationStatus::Pending,
                InvitationStatus::Accepted,
            )
            .map_err(|error| match error {
                RepositoryError::NotFound(_) => WorkflowError::not_found(format!(
                    "no pending invitation {invitation_id}"
                )),
                other => other.into(),
            })?;

        info!(invitation = %invitation_id, interviewee = %actor_id, "invitation accepted");
        Ok(accepted)
    }

    /// `accepted -> completed`; normally driven by grading.
    pub fn complete(&self, invitation_id: InvitationId) -> Result<Invitation, WorkflowError> {
        let completed = self
            .store
            .transition_invitation(
                invitation_id,
                InvitationStatus::Accepted,
                InvitationStatus::Completed,
            )
            .map_err(|error| match error {
                RepositoryError::NotFound(_) => WorkflowError::not_found(format!(
                    "no accepted invitation {invitation_id}"
                )),
                other => other.into(),
            })?;

        info!(invitation = %invitation_id, "invitation completed");
        Ok(completed)
    }

    /// Invitations of an interviewee with their status as observed now.
    pub fn invitations_for(&self, interviewee_id: UserId) -> Result<Vec<Invitation>, WorkflowError> {
        let now = self.clock.now();
        let invitations = self.store.find_invitations(InvitationFilter {
            interviewee: Some(interviewee_id),
            ..InvitationFilter::default()
        })?;

        Ok(invitations
            .into_iter()
            .map(|mut invitation| {
                invitation.status = invitation.effective_status(now);
                invitation
            })
            .collect())
    }

    fn issuable_assessment(
        &self,
        assessment_id: AssessmentId,
        expiry_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Assessment, WorkflowError> {
        if let Some(expiry) = expiry_date {
            if expiry <= now {
                return Err(WorkflowError::validation(
                    "expiry date must be in the future",
                ));
            }
        }

        self.store
            .fetch_assessment(assessment_id)?
            .ok_or_else(|| WorkflowError::not_found(format!("assessment {assessment_id}")))
    }

    fn issue_one(
        &self,
        assessment: &Assessment,
        interviewee_id: UserId,
        expiry_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Invitation, WorkflowError> {
        let interviewee = self
            .store
            .fetch_user(interviewee_id)?
            .ok_or_else(|| WorkflowError::not_found(format!("user {interviewee_id}")))?;
        if interviewee.role != Role::Interviewee {
            return Err(WorkflowError::validation(format!(
                "user {interviewee_id} is not an interviewee"
            )));
        }

        // An active invitation whose window has closed no longer blocks the pair.
        let existing = self
            .store
            .find_invitations(InvitationFilter::pair(assessment.id, interviewee_id))?;
        for stale in existing
            .iter()
            .filter(|invitation| invitation.status.is_active() && invitation.is_past_expiry(now))
        {
            observe_expiry(self.store.as_ref(), stale)?;
        }

        let invitation = self
            .store
            .insert_invitation(NewInvitation {
                assessment_id: assessment.id,
                interviewee_id,
                status: InvitationStatus::Pending,
                expiry_date,
            })
            .map_err(|error| match error {
                RepositoryError::Conflict(_) => WorkflowError::conflict(format!(
                    "interviewee {interviewee_id} already has an active invitation for assessment {}",
                    assessment.id
                )),
                other => other.into(),
            })?;

        info!(
            invitation = %invitation.id,
            assessment = %assessment.id,
            interviewee = %interviewee_id,
            "invitation issued"
        );
        deliver(
            self.notifications.as_ref(),
            Notification {
                user_id: interviewee_id,
                kind: NotificationKind::Info,
                message: format!("You have been invited to take '{}'.", assessment.title),
            },
        );
        Ok(invitation)
    }

    fn notify_expired(&self, invitation: &Invitation) -> Result<(), WorkflowError> {
        let title = self
            .store
            .fetch_assessment(invitation.assessment_id)?
            .map(|assessment| assessment.title)
            .unwrap_or_else(|| format!("assessment {}", invitation.assessment_id));
        deliver(
            self.notifications.as_ref(),
            Notification {
                user_id: invitation.interviewee_id,
                kind: NotificationKind::Warning,
                message: format!("Your invitation to '{title}' has expired."),
            },
        );
        Ok(())
    }
}

/// Persist `expired` for an active invitation observed past its expiry. Returns whether
/// this call performed the transition; losing the race to another writer is not an error.
pub(crate) fn observe_expiry<S>(store: &S, invitation: &Invitation) -> Result<bool, WorkflowError>
where
    S: RecordStore + ?Sized,
{
    if !invitation.status.is_active() {
        return Ok(false);
    }

    match store.transition_invitation(invitation.id, invitation.status, InvitationStatus::Expired)
    {
        Ok(_) => {
            warn!(
                invitation = %invitation.id,
                interviewee = %invitation.interviewee_id,
                "invitation expired"
            );
            Ok(true)
        }
        Err(RepositoryError::NotFound(_)) => Ok(false),
        Err(other) => Err(other.into()),
    }
}
