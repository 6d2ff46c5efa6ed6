//! Gatekeeper command line
//!
//! Scores risk factors, prints the effective configuration and runs scripted
//! workflows against the in-memory adapters.

use anyhow::{Context, Result};
use chrono::Duration;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use gatekeeper_core::{NewComment, RiskFactors, User, WorkflowConfig};
use gatekeeper_workflow::{
    CommentRequest, CreateReviewRequest, InMemoryRuntime, LoggingNotifier, ManualClock,
    ResubmitRequest, ReviewActionRequest, ReviewSummary,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const MAX_HOURS: i64 = 24 * 366;

fn cli() -> Command {
    let factor_arg = |name: &'static str, help: &'static str| {
        Arg::new(name)
            .long(name)
            .default_value("0.0")
            .value_parser(value_parser!(f64))
            .help(help)
    };

    Command::new("gatekeeper")
        .version(gatekeeper_workflow::VERSION)
        .about("Code review workflow engine")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_name("PATH")
                .help("Workflow configuration (TOML)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("score")
                .about("Score a set of risk factors")
                .arg(factor_arg("complexity", "Structural complexity, 0..1"))
                .arg(factor_arg("security", "Security sensitivity, 0..1"))
                .arg(factor_arg("files", "Normalized files changed, 0..1"))
                .arg(factor_arg("coverage-gap", "Untested share of the change, 0..1"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("demo")
                .about("Run a scripted review workflow against in-memory adapters")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output summaries as JSON"),
                ),
        )
        .subcommand(
            Command::new("escalate")
                .about("Open one review per tier, let time pass and run an escalation tick")
                .arg(
                    Arg::new("hours")
                        .long("hours")
                        .default_value("30")
                        .value_parser(value_parser!(i64).range(0..=MAX_HOURS))
                        .help("Hours to advance the clock, at most one year"),
                ),
        )
        .subcommand(Command::new("config").about("Print the effective configuration"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<WorkflowConfig> {
    match matches.get_one::<String>("config") {
        Some(path) => WorkflowConfig::load(path).with_context(|| format!("loading {path}")),
        None => Ok(WorkflowConfig::default()),
    }
}

fn factor(args: &ArgMatches, name: &str) -> f64 {
    args.get_one::<f64>(name).copied().unwrap_or_default()
}

fn print_summary(summary: &ReviewSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(summary)?);
    } else {
        println!("{summary}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("score", args)) => score(&config, args),
        Some(("demo", args)) => demo(config, args.get_flag("json")).await,
        Some(("escalate", args)) => {
            let hours = args.get_one::<i64>("hours").copied().unwrap_or(30);
            escalate(config, hours).await
        }
        Some(("config", _)) => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn score(config: &WorkflowConfig, args: &ArgMatches) -> Result<()> {
    let factors = RiskFactors::new(
        factor(args, "complexity"),
        factor(args, "security"),
        factor(args, "files"),
        factor(args, "coverage-gap"),
    );
    let score = config.scorer()?.score(&factors)?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&score)?);
    } else {
        println!("Composite: {:.4}", score.composite);
        println!("Tier: {}", score.tier);
        println!("Approvals required: {}", config.quorum.required(score.tier));
        println!("SLA: {}h", config.sla.threshold(score.tier).num_hours());
    }
    Ok(())
}

async fn demo(config: WorkflowConfig, json: bool) -> Result<()> {
    let clock = Arc::new(ManualClock::default());
    let runtime = InMemoryRuntime::new(config, Arc::new(LoggingNotifier), clock.clone())?;
    let service = &runtime.service;

    let alice = User::author("alice");
    let bob = User::reviewer("bob");
    let carol = User::reviewer("carol");

    runtime
        .risk
        .set_factors("feature/auth", RiskFactors::new(0.8, 0.9, 0.5, 0.6));
    runtime
        .risk
        .set_factors("feature/auth-v2", RiskFactors::new(0.7, 0.8, 0.4, 0.5));

    let review = service
        .create_review(CreateReviewRequest::new(alice.clone(), "feature/auth"))
        .await?;
    let id = review.id();
    print_summary(&service.review_summary(id).await?, json)?;

    let question = service
        .add_comment(CommentRequest {
            review_id: id,
            author: bob.clone(),
            comment: NewComment::new("Why is the token TTL hard-coded?").at("src/auth.rs", 42),
        })
        .await?;
    service
        .add_comment(CommentRequest {
            review_id: id,
            author: alice.clone(),
            comment: NewComment::new("Moved it to config.").reply_to(question.id),
        })
        .await?;

    clock.advance(Duration::hours(2));
    service
        .request_changes(ReviewActionRequest::new(id, bob.clone()))
        .await?;
    service
        .resubmit_review(ResubmitRequest::with_diff(id, alice.clone(), "feature/auth-v2"))
        .await?;

    clock.advance(Duration::hours(3));
    service
        .approve_review(ReviewActionRequest::new(id, bob))
        .await?;
    print_summary(&service.review_summary(id).await?, json)?;

    if let Err(e) = service
        .merge_review(ReviewActionRequest::new(id, alice.clone()))
        .await
    {
        println!("Merge refused: {e}");
    }

    service
        .approve_review(ReviewActionRequest::new(id, carol))
        .await?;
    service
        .merge_review(ReviewActionRequest::new(id, alice))
        .await?;
    print_summary(&service.review_summary(id).await?, json)?;

    for comment in service.comments(id).await? {
        let indent = if comment.is_reply() { "    " } else { "  " };
        println!("{indent}{}", comment.body);
    }

    let trail = service.audit_trail();
    trail
        .verify_integrity()
        .context("audit trail failed verification")?;
    println!(
        "Audit: {} entries, head {}",
        trail.len(),
        trail.head().unwrap_or_default()
    );
    Ok(())
}

async fn escalate(config: WorkflowConfig, hours: i64) -> Result<()> {
    let clock = Arc::new(ManualClock::default());
    let runtime = InMemoryRuntime::new(config, Arc::new(LoggingNotifier), clock.clone())?;
    let service = &runtime.service;
    let author = User::author("alice");

    let presets = [
        ("low", 0.1),
        ("medium", 0.4),
        ("high", 0.7),
        ("critical", 0.9),
    ];
    for (diff, level) in presets {
        runtime
            .risk
            .set_factors(diff, RiskFactors::new(level, level, level, level));
        service
            .create_review(CreateReviewRequest::new(author.clone(), diff))
            .await?;
    }

    clock.advance(Duration::hours(hours));
    let report = service.run_escalation_tick().await?;

    println!("After {hours}h:");
    for event in &report.events {
        println!(
            "  escalated {} ({} risk, {}h in {})",
            event.review_id,
            event.tier,
            event.age.num_hours(),
            event.status
        );
    }
    let summary = report.summary;
    println!(
        "On track: {}, at risk: {}, breached: {}, escalated: {}",
        summary.on_track, summary.at_risk, summary.breached, summary.escalated
    );
    Ok(())
}
