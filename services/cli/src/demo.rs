use crate::infra::{principal, start_of_day, SeedFixture, SeededWorkspace};
use chrono::{Duration, Local, NaiveDate};
use clap::{Args, ValueEnum};
use serde::Serialize;
use smart_recruiter::error::AppError;
use smart_recruiter::workflows::assessments::{
    trial_assessment, AddQuestionRequest, AnswerDraft, AssessmentDetail, CreateAssessmentRequest,
    FeedbackRequest, Gender, GenderComposition, IssueInvitationsRequest, MonthlyPerformance,
    NewUser, QualificationReport, QuestionKind, Role, SubmitAssessmentRequest, UserId,
    WorkflowConfig,
};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// JSON seed file to load instead of the bundled fixture.
    #[arg(long)]
    pub(crate) seed: Option<PathBuf>,
    /// Day the live portion of the demo runs on (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Skip the analytics section printed after the live scenario.
    #[arg(long)]
    pub(crate) skip_reports: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    /// JSON seed file to load instead of the bundled fixture.
    #[arg(long)]
    pub(crate) seed: Option<PathBuf>,
    /// Output format for the analytics.
    #[arg(long, value_enum, default_value_t = ReportFormat::Table)]
    pub(crate) format: ReportFormat,
}

#[derive(Args, Debug, Default)]
pub(crate) struct TrialArgs {
    /// Print the trial assessment as JSON.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum ReportFormat {
    Table,
    Json,
    /// Qualification report only.
    Csv,
}

#[derive(Debug, Serialize)]
struct ReportBundle<'a> {
    qualification: &'a QualificationReport,
    gender_composition: &'a GenderComposition,
    monthly_performance: &'a [MonthlyPerformance],
}

struct Reports {
    qualification: QualificationReport,
    gender_composition: GenderComposition,
    monthly_performance: Vec<MonthlyPerformance>,
}

impl Reports {
    fn collect(workspace: &SeededWorkspace) -> Result<Self, AppError> {
        let recruiter = workspace.recruiter_principal();
        Ok(Self {
            qualification: workspace.service.qualification_report(Some(&recruiter))?,
            gender_composition: workspace.service.gender_composition(Some(&recruiter))?,
            monthly_performance: workspace.service.monthly_performance(Some(&recruiter))?,
        })
    }

    fn bundle(&self) -> ReportBundle<'_> {
        ReportBundle {
            qualification: &self.qualification,
            gender_composition: &self.gender_composition,
            monthly_performance: &self.monthly_performance,
        }
    }
}

pub(crate) fn run_report(args: ReportArgs, config: WorkflowConfig) -> Result<(), AppError> {
    let ReportArgs { seed, format } = args;
    let threshold = config.analytics.qualification_threshold;
    let workspace = SeededWorkspace::build(SeedFixture::load(seed.as_deref())?, config)?;
    let reports = Reports::collect(&workspace)?;

    match format {
        ReportFormat::Table => render_reports(&reports, threshold),
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(&reports.bundle())?;
            println!("{json}");
        }
        ReportFormat::Csv => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            reports.qualification.write_csv(&mut handle)?;
            handle.flush()?;
        }
    }

    Ok(())
}

pub(crate) fn run_trial(args: TrialArgs) -> Result<(), AppError> {
    let trial = trial_assessment();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&trial)?);
    } else {
        render_assessment(&trial);
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs, config: WorkflowConfig) -> Result<(), AppError> {
    let DemoArgs {
        seed,
        today,
        skip_reports,
    } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let threshold = config.analytics.qualification_threshold;

    println!("Smart recruiter assessment demo");
    let workspace = SeededWorkspace::build(SeedFixture::load(seed.as_deref())?, config)?;
    println!(
        "Seeded {} interviewees, {} assessments and {} historical submissions",
        workspace.interviewees.len(),
        workspace.assessments.len(),
        workspace.submissions
    );

    workspace.clock.set_date(today);
    let recruiter = workspace.recruiter_principal();
    let service = &workspace.service;

    let assessment = service.create_assessment(
        Some(&recruiter),
        CreateAssessmentRequest {
            title: "Real Systems Design Interview".to_string(),
            description: Some("Live scenario run by the demo".to_string()),
            time_limit: 45,
            published: true,
        },
    )?;
    let mut choices = BTreeMap::new();
    choices.insert("A".to_string(), "Round robin".to_string());
    choices.insert("B".to_string(), "Consistent hashing".to_string());
    choices.insert("C".to_string(), "Random placement".to_string());
    let choice = service.add_question(
        Some(&recruiter),
        assessment.id,
        AddQuestionRequest {
            prompt: "Which scheme limits key movement when a cache node joins?".to_string(),
            kind: QuestionKind::MultipleChoice {
                choices,
                correct_answer: "B".to_string(),
            },
            weight: Some(100.0),
        },
    )?;
    let essay = service.add_question(
        Some(&recruiter),
        assessment.id,
        AddQuestionRequest {
            prompt: "Describe how you would shard a user table.".to_string(),
            kind: QuestionKind::Subjective,
            weight: None,
        },
    )?;
    println!(
        "\nCreated '{}' ({} min): questions {} and {}",
        assessment.title, assessment.time_limit, choice.id, essay.id
    );

    let newcomer = service.register_user(NewUser {
        username: "zanele".to_string(),
        first_name: "Zanele".to_string(),
        last_name: "Dube".to_string(),
        email: "zanele.dube@mail.example".to_string(),
        role: Role::Interviewee,
        gender: Gender::Female,
        credential_hash: String::new(),
        company_name: None,
        consent: Some(true),
    })?;

    let mut invitees: Vec<UserId> = std::iter::once(newcomer.id)
        .chain(workspace.interviewees.iter().map(|user| user.id))
        .collect();
    // A repeated id and an unknown id show per-recipient failures.
    invitees.push(newcomer.id);
    invitees.push(UserId(9_999));
    let expiry = start_of_day(today + Duration::days(7));
    let outcomes = service.issue_invitations(
        Some(&recruiter),
        IssueInvitationsRequest {
            assessment_id: assessment.id,
            interviewee_ids: invitees,
            expiry_date: Some(expiry),
        },
    )?;
    println!("\nBulk invitation (expires {})", expiry.date_naive());
    for outcome in &outcomes {
        match &outcome.result {
            Ok(invitation) => println!(
                "- interviewee {} -> invitation {} ({})",
                outcome.interviewee_id,
                invitation.id,
                invitation.status.label()
            ),
            Err(err) => println!(
                "- interviewee {} -> rejected [{}] {}",
                outcome.interviewee_id,
                err.kind().label(),
                err.message()
            ),
        }
    }

    let candidate = principal(&newcomer);
    let invitation = service
        .my_invitations(Some(&candidate))?
        .into_iter()
        .find(|invitation| invitation.assessment_id == assessment.id);
    let Some(invitation) = invitation else {
        println!("  No invitation reached {}; stopping", newcomer.username);
        return Ok(());
    };
    let accepted = service.accept_invitation(Some(&candidate), invitation.id)?;
    println!(
        "\n{} accepted invitation {} -> {}",
        newcomer.display_name(),
        accepted.id,
        accepted.status.label()
    );

    let receipt = service.submit(
        Some(&candidate),
        SubmitAssessmentRequest {
            assessment_id: assessment.id,
            answers: vec![
                AnswerDraft::new(choice.id, "B"),
                AnswerDraft::new(essay.id, "Hash the user id into range partitions."),
            ],
        },
    )?;
    println!("Submission {} received", receipt.submission.id);
    for answer in &receipt.answers {
        println!(
            "  - question {}: {}",
            answer.question_id,
            answer
                .score
                .map(|score| format!("auto-graded {score:.1}"))
                .unwrap_or_else(|| "awaiting review".to_string())
        );
    }

    let resubmit = service.submit(
        Some(&candidate),
        SubmitAssessmentRequest {
            assessment_id: assessment.id,
            answers: vec![AnswerDraft::new(choice.id, "A")],
        },
    );
    if let Err(err) = resubmit {
        println!("  Second attempt rejected [{}] {}", err.kind().label(), err.message());
    }

    service.add_feedback(
        Some(&recruiter),
        FeedbackRequest {
            submission_id: receipt.submission.id,
            question_id: Some(essay.id),
            text: "Sound approach; hot partitions not discussed.".to_string(),
            score: Some(70.0),
        },
    )?;
    let graded = service.recompute_score(Some(&recruiter), receipt.submission.id)?;
    println!(
        "Reviewed submission {} -> {} (score {})",
        graded.id,
        graded.status.label(),
        graded
            .score
            .map(|score| format!("{score:.2}"))
            .unwrap_or_else(|| "n/a".to_string())
    );
    let average = service.average_score(Some(&candidate), newcomer.id)?;
    println!("{} average across submissions: {average:.2}", newcomer.username);

    workspace.clock.set_date(today + Duration::days(8));
    if let Some(late) = workspace.interviewees.first() {
        let late_principal = principal(late);
        let pending = service
            .my_invitations(Some(&late_principal))?
            .into_iter()
            .find(|invitation| invitation.assessment_id == assessment.id);
        if let Some(pending) = pending {
            println!(
                "\nEight days later {} sees invitation {} as {}",
                late.username,
                pending.id,
                pending.status.label()
            );
            if let Err(err) = service.accept_invitation(Some(&late_principal), pending.id) {
                println!("  Accept rejected [{}] {}", err.kind().label(), err.message());
            }
        }
    }

    let inbox = workspace.notifications.for_user(newcomer.id);
    println!("\nNotifications for {}", newcomer.username);
    for notification in &inbox {
        println!("- [{}] {}", notification.kind.label(), notification.message);
    }

    if skip_reports {
        return Ok(());
    }

    let reports = Reports::collect(&workspace)?;
    render_reports(&reports, threshold);
    Ok(())
}

fn render_reports(reports: &Reports, threshold: f64) {
    println!("\nQualification report (threshold {threshold:.2})");
    for entry in &reports.qualification.entries {
        println!(
            "- {:>3} {:<24} {:>7.2}  {}",
            entry.id,
            entry.name,
            entry.average_score,
            entry.status.label()
        );
    }
    println!(
        "{} of {} interviewees qualified",
        reports.qualification.qualified().count(),
        reports.qualification.entries.len()
    );

    let composition = &reports.gender_composition;
    println!("\nGender composition ({} interviewees)", composition.total());
    println!("- male: {}", composition.male);
    println!("- female: {}", composition.female);
    println!("- other: {}", composition.other);

    if reports.monthly_performance.is_empty() {
        println!("\nMonthly performance: no submissions yet");
    } else {
        println!("\nMonthly performance (trial | real)");
        for month in &reports.monthly_performance {
            println!(
                "- {}: {:>8.2} | {:>8.2}",
                month.label(),
                month.trial,
                month.real
            );
        }
    }
}

fn render_assessment(detail: &AssessmentDetail) {
    println!(
        "{} ({} min)",
        detail.assessment.title, detail.assessment.time_limit
    );
    if let Some(description) = &detail.assessment.description {
        println!("{description}");
    }
    for (position, question) in detail.questions.iter().enumerate() {
        println!("\n{}. {} [{}]", position + 1, question.prompt, question.kind.label());
        if let QuestionKind::MultipleChoice { choices, .. } = &question.kind {
            for (label, text) in choices {
                println!("   {label}) {text}");
            }
        }
    }
}
