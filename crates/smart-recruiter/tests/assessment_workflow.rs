//! End-to-end scenarios for the assessment workflow, driven through the public service facade
//! over the in-memory record store.

mod common {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};

    use smart_recruiter::workflows::assessments::{
        AddQuestionRequest, Assessment, AssessmentWorkflowService, CreateAssessmentRequest,
        FixedClock, Gender, InMemoryNotifications, InMemoryRecordStore, NewUser, Principal,
        Question, QuestionKind, Role, User, WorkflowConfig,
    };

    pub(super) type Service = AssessmentWorkflowService<InMemoryRecordStore, InMemoryNotifications>;

    pub(super) fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0)
            .single()
            .expect("valid instant")
    }

    pub(super) fn principal(user: &User) -> Principal {
        Principal {
            id: user.id,
            role: user.role,
        }
    }

    pub(super) struct World {
        pub(super) service: Arc<Service>,
        pub(super) store: Arc<InMemoryRecordStore>,
        pub(super) notifications: Arc<InMemoryNotifications>,
        pub(super) recruiter: User,
        pub(super) assessment: Assessment,
        pub(super) choice: Question,
        pub(super) coding: Question,
    }

    pub(super) fn world() -> World {
        let store = Arc::new(InMemoryRecordStore::new());
        let notifications = Arc::new(InMemoryNotifications::default());
        let service = Arc::new(AssessmentWorkflowService::with_clock(
            store.clone(),
            notifications.clone(),
            WorkflowConfig::default(),
            Arc::new(FixedClock(now())),
        ));

        let recruiter = service
            .register_user(NewUser {
                username: "recruiter1".to_string(),
                first_name: "Sarah".to_string(),
                last_name: "Mpengu".to_string(),
                email: "saram@techcorp.example".to_string(),
                role: Role::Recruiter,
                gender: Gender::Female,
                credential_hash: String::new(),
                company_name: Some("Tech Corp".to_string()),
                consent: None,
            })
            .expect("recruiter registers");
        let owner = principal(&recruiter);

        let assessment = service
            .create_assessment(
                Some(&owner),
                CreateAssessmentRequest {
                    title: "Real Backend Assessment".to_string(),
                    description: Some("Data structures and a short coding task".to_string()),
                    time_limit: 90,
                    published: true,
                },
            )
            .expect("assessment created");

        let mut choices = BTreeMap::new();
        choices.insert("A".to_string(), "Stack".to_string());
        choices.insert("B".to_string(), "Queue".to_string());
        let choice = service
            .add_question(
                Some(&owner),
                assessment.id,
                AddQuestionRequest {
                    prompt: "Which structure is FIFO?".to_string(),
                    kind: QuestionKind::MultipleChoice {
                        choices,
                        correct_answer: "B".to_string(),
                    },
                    weight: Some(100.0),
                },
            )
            .expect("choice question added");
        let coding = service
            .add_question(
                Some(&owner),
                assessment.id,
                AddQuestionRequest {
                    prompt: "Reverse a linked list.".to_string(),
                    kind: QuestionKind::Coding {
                        reference_solution: None,
                    },
                    weight: None,
                },
            )
            .expect("coding question added");

        World {
            service,
            store,
            notifications,
            recruiter,
            assessment,
            choice,
            coding,
        }
    }

    impl World {
        pub(super) fn owner(&self) -> Principal {
            principal(&self.recruiter)
        }

        pub(super) fn interviewee(&self, username: &str, gender: Gender) -> User {
            self.service
                .register_user(NewUser {
                    username: username.to_string(),
                    first_name: username.to_string(),
                    last_name: "Doe".to_string(),
                    email: format!("{username}@mail.example"),
                    role: Role::Interviewee,
                    gender,
                    credential_hash: String::new(),
                    company_name: None,
                    consent: Some(true),
                })
                .expect("interviewee registers")
        }
    }
}

use std::sync::Arc;
use std::thread;

use common::*;
use smart_recruiter::workflows::assessments::{
    AnswerDraft, ErrorKind, FeedbackRequest, Gender, InvitationFilter, InvitationStatus,
    IssueInvitationsRequest, QualificationStatus, RecordStore, SubmissionFilter, SubmissionStatus,
    SubmitAssessmentRequest, WorkflowError,
};

#[test]
fn invitation_to_qualification_end_to_end() {
    let world = world();
    let amara = world.interviewee("amara", Gender::Female);
    let bongani = world.interviewee("bongani", Gender::Male);
    let chidi = world.interviewee("chidi", Gender::Other);
    world
        .service
        .issue_invitation(Some(&world.owner()), world.assessment.id, bongani.id, None)
        .expect("early invitation");

    let outcomes = world
        .service
        .issue_invitations(
            Some(&world.owner()),
            IssueInvitationsRequest {
                assessment_id: world.assessment.id,
                interviewee_ids: vec![amara.id, bongani.id, chidi.id],
                expiry_date: Some(now() + chrono::Duration::days(14)),
            },
        )
        .expect("bulk issue");
    let failures: Vec<_> = outcomes
        .iter()
        .filter_map(|outcome| {
            outcome
                .result
                .as_ref()
                .err()
                .map(|error| (outcome.interviewee_id, error.kind()))
        })
        .collect();
    assert_eq!(failures, vec![(bongani.id, ErrorKind::Conflict)]);
    let all_invitations = world
        .store
        .find_invitations(InvitationFilter {
            assessment: Some(world.assessment.id),
            ..InvitationFilter::default()
        })
        .expect("query invitations");
    assert_eq!(all_invitations.len(), 3);

    let amara_invitation = outcomes[0]
        .result
        .clone()
        .expect("amara was invited");
    world
        .service
        .accept_invitation(Some(&principal(&amara)), amara_invitation.id)
        .expect("amara accepts");

    let receipt = world
        .service
        .submit(
            Some(&principal(&amara)),
            SubmitAssessmentRequest {
                assessment_id: world.assessment.id,
                answers: vec![
                    AnswerDraft::new(world.choice.id, "B"),
                    AnswerDraft::new(world.coding.id, "fn reverse(list) { .. }"),
                ],
            },
        )
        .expect("amara submits");
    assert_eq!(receipt.answers[0].score, Some(100.0));
    assert_eq!(receipt.answers[1].score, None);

    world
        .service
        .add_feedback(
            Some(&world.owner()),
            FeedbackRequest {
                submission_id: receipt.submission.id,
                question_id: Some(world.coding.id),
                text: "Works, but misses the empty list.".to_string(),
                score: Some(20.0),
            },
        )
        .expect("feedback recorded");
    let graded = world
        .service
        .recompute_score(Some(&world.owner()), receipt.submission.id)
        .expect("graded");
    assert_eq!(graded.status, SubmissionStatus::Graded);
    assert_eq!(graded.score, Some(60.0));

    let amara_after = world
        .service
        .my_invitations(Some(&principal(&amara)))
        .expect("amara's invitations");
    assert_eq!(amara_after[0].status, InvitationStatus::Completed);

    let report = world
        .service
        .qualification_report(Some(&world.owner()))
        .expect("report");
    let statuses: Vec<_> = report
        .entries
        .iter()
        .map(|entry| (entry.id, entry.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (amara.id, QualificationStatus::Qualified),
            (bongani.id, QualificationStatus::NotQualified),
            (chidi.id, QualificationStatus::NotQualified),
        ]
    );

    let months = world
        .service
        .monthly_performance(Some(&world.owner()))
        .expect("monthly performance");
    assert_eq!(months.len(), 1);
    assert_eq!((months[0].trial, months[0].real), (0.0, 60.0));

    assert!(!world.notifications.for_user(amara.id).is_empty());
}

#[test]
fn concurrent_issue_for_one_pair_yields_single_invitation() {
    let world = world();
    let candidate = world.interviewee("james", Gender::Male);
    let owner = world.owner();

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&world.service);
                let assessment_id = world.assessment.id;
                let candidate_id = candidate.id;
                scope.spawn(move || {
                    service.issue_invitation(Some(&owner), assessment_id, candidate_id, None)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("issuer thread panicked"))
            .collect()
    });

    let successes = results.iter().filter(|result| result.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|result| matches!(result, Err(WorkflowError::Conflict(_))))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);

    let active = world
        .store
        .find_invitations(InvitationFilter::pair(world.assessment.id, candidate.id))
        .expect("query invitations")
        .into_iter()
        .filter(|invitation| invitation.status.is_active())
        .count();
    assert_eq!(active, 1);
}

#[test]
fn concurrent_accept_moves_invitation_once() {
    let world = world();
    let candidate = world.interviewee("james", Gender::Male);
    let invitation = world
        .service
        .issue_invitation(Some(&world.owner()), world.assessment.id, candidate.id, None)
        .expect("invitation issued");
    let actor = principal(&candidate);

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let service = Arc::clone(&world.service);
                scope.spawn(move || service.accept_invitation(Some(&actor), invitation.id))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("accept thread panicked"))
            .collect()
    });

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|error| error.kind() == ErrorKind::NotFound));
}

#[test]
fn concurrent_submit_for_one_pair_keeps_single_submission() {
    let world = world();
    let candidate = world.interviewee("james", Gender::Male);
    let invitation = world
        .service
        .issue_invitation(Some(&world.owner()), world.assessment.id, candidate.id, None)
        .expect("invitation issued");
    world
        .service
        .accept_invitation(Some(&principal(&candidate)), invitation.id)
        .expect("invitation accepted");
    let actor = principal(&candidate);

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = ["A", "B", "A", "B", "B", "A"]
            .into_iter()
            .map(|choice| {
                let service = Arc::clone(&world.service);
                let request = SubmitAssessmentRequest {
                    assessment_id: world.assessment.id,
                    answers: vec![AnswerDraft::new(world.choice.id, choice)],
                };
                scope.spawn(move || service.submit(Some(&actor), request))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("submit thread panicked"))
            .collect()
    });

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|result| matches!(result, Err(WorkflowError::Conflict(_))))
            .count(),
        5
    );

    let stored = world
        .store
        .find_submissions(SubmissionFilter::pair(world.assessment.id, candidate.id))
        .expect("query submissions");
    assert_eq!(stored.len(), 1);
    let answers = world
        .store
        .answers_for(stored[0].id)
        .expect("query answers");
    assert_eq!(answers.len(), 1);
}
