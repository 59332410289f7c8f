//! RepCoach CLI - drive the coaching pipeline against demo data.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::Level;

use repcoach_agents::coach::{
    generate_trainee_digest, DetectInactiveUsers, OnAttemptScored, OnUserInactive, SendDailyDigest,
};
use repcoach_agents::dispatch::DispatchCoachNotification;
use repcoach_agents::manager::ManagerWeeklyAnalysis;
use repcoach_agents::notify::ConsoleNotifier;
use repcoach_core::{
    Attempt, CoachConfig, CoachEvent, OrgId, ScenarioId, UserId,
};
use repcoach_memory::{agent_context, generate_weakness_profile};
use repcoach_runtime::{EventBus, InvocationOutcome, MemoryJournal};
use repcoach_storage::{Member, MemStorage, NotificationPrefs, Role};

#[derive(Parser)]
#[command(name = "repcoach")]
#[command(about = "Coaching pipeline for sales-training attempts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole pipeline against seeded demo data
    Demo,
    /// Regenerate and print a trainee's weakness profile
    Profile {
        #[arg(long, default_value = "org-demo")]
        org: String,
        #[arg(long, default_value = "riley")]
        user: String,
    },
    /// Print a trainee's daily digest
    Digest {
        #[arg(long, default_value = "org-demo")]
        org: String,
        #[arg(long, default_value = "riley")]
        user: String,
    },
    /// Emit an attempt.scored event and drain the pipeline
    SimulateAttempt {
        #[arg(long, default_value = "org-demo")]
        org: String,
        #[arg(long, default_value = "riley")]
        user: String,
    },
    /// Emit a user.inactive event and drain the pipeline
    Inactive {
        #[arg(long, default_value = "org-demo")]
        org: String,
        #[arg(long, default_value = "jordan")]
        user: String,
        #[arg(long, default_value_t = 4)]
        days: i64,
    },
    /// Fire one registered cron handler by id
    Cron {
        /// Handler id, e.g. manager-weekly-analysis
        id: String,
    },
    /// List registered cron handlers and their schedules
    Crons,
}

/// Seed a demo tenant: three trainees with staggered histories, a manager,
/// and a couple of scenarios.
async fn seed_demo(storage: &MemStorage) {
    let org = OrgId::from("org-demo");
    storage.add_org(org.clone()).await;

    for scenario in ["cold-call-101", "pricing-pushback"] {
        storage.add_scenario(ScenarioId::from(scenario)).await;
    }

    for (user, role) in [
        ("riley", Role::Trainee),
        ("jordan", Role::Trainee),
        ("casey", Role::Trainee),
        ("alex", Role::Manager),
    ] {
        storage
            .add_member(
                org.clone(),
                Member {
                    user_id: UserId::from(user),
                    role,
                    name: Some(user.to_string()),
                    email: Some(format!("{user}@example.com")),
                },
            )
            .await;
    }
    storage
        .set_preference(
            org.clone(),
            UserId::from("alex"),
            NotificationPrefs {
                low_priority_alerts: true,
            },
        )
        .await;

    // Riley practices daily and is improving on objection handling.
    for (days_ago, oh, disc, score) in [
        (4i64, 52.0, 78.0, 64.0),
        (3, 55.0, 80.0, 66.0),
        (2, 61.0, 79.0, 70.0),
        (1, 66.0, 82.0, 74.0),
        (0, 72.0, 81.0, 77.0),
    ] {
        storage
            .insert_attempt(Attempt::completed(
                org.clone(),
                UserId::from("riley"),
                Some(score),
                serde_json::json!({"objection_handling": oh, "discovery": disc}),
                Utc::now() - Duration::days(days_ago) - Duration::hours(2),
            ))
            .await;
    }

    // Jordan went quiet days ago with a known clarity weakness.
    for days_ago in [6i64, 5] {
        storage
            .insert_attempt(Attempt::completed(
                org.clone(),
                UserId::from("jordan"),
                Some(58.0),
                serde_json::json!({"clarity": 54.0, "discovery": 62.0}),
                Utc::now() - Duration::days(days_ago),
            ))
            .await;
    }

    // Casey shares the clarity weakness.
    for days_ago in [2i64, 1] {
        storage
            .insert_attempt(Attempt::completed(
                org.clone(),
                UserId::from("casey"),
                Some(61.0),
                serde_json::json!({"clarity": 57.0, "empathy": 71.0}),
                Utc::now() - Duration::days(days_ago),
            ))
            .await;
    }
}

/// Register every handler on a fresh bus.
fn build_bus(storage: Arc<MemStorage>, config: &CoachConfig) -> EventBus {
    let notifier = Arc::new(ConsoleNotifier);
    let mut bus = EventBus::new(Arc::new(MemoryJournal::new()));

    bus.register(Arc::new(OnAttemptScored::new(storage.clone(), config.clone())));
    bus.register(Arc::new(OnUserInactive::new(storage.clone())));
    bus.register(Arc::new(DetectInactiveUsers::new(
        storage.clone(),
        config.clone(),
    )));
    bus.register(Arc::new(SendDailyDigest::new(storage.clone(), config.clone())));
    bus.register(Arc::new(DispatchCoachNotification::new(
        storage.clone(),
        notifier.clone(),
        config.clone(),
    )));
    bus.register(Arc::new(ManagerWeeklyAnalysis::new(
        storage,
        notifier,
        config.clone(),
    )));

    bus
}

fn print_outcomes(outcomes: &[InvocationOutcome]) {
    for outcome in outcomes {
        match (&outcome.output, &outcome.error) {
            (Some(output), _) => {
                println!("- {} ({} attempt(s)): {output}", outcome.handler, outcome.attempts)
            }
            (None, Some(error)) => println!(
                "- {} ({} attempt(s)): FAILED: {error}",
                outcome.handler, outcome.attempts
            ),
            (None, None) => println!("- {}: no output", outcome.handler),
        }
    }
}

async fn refresh_profiles(storage: &MemStorage, config: &CoachConfig, org: &OrgId) -> Result<()> {
    for user in ["riley", "jordan", "casey"] {
        generate_weakness_profile(storage, config, org, &UserId::from(user)).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();
    let config = CoachConfig::default();
    let storage = Arc::new(MemStorage::new());
    seed_demo(&storage).await;

    match cli.command {
        Commands::Demo => {
            let org = OrgId::from("org-demo");
            refresh_profiles(&storage, &config, &org).await?;
            let bus = build_bus(storage.clone(), &config);

            println!("== attempt.scored for riley ==");
            bus.emit(CoachEvent::AttemptScored {
                org_id: org.clone(),
                user_id: UserId::from("riley"),
                attempt_id: repcoach_core::AttemptId::from("demo-attempt"),
            })?;
            print_outcomes(&bus.drain().await);

            for cron in [
                "detect-inactive-users",
                "coach-send-daily-digest",
                "manager-weekly-analysis",
            ] {
                println!("== cron {cron} ==");
                let outcome = bus.run_cron(cron).await?;
                print_outcomes(&[outcome]);
                print_outcomes(&bus.drain().await);
            }

            let activities = storage.activities().await;
            println!("== {} activity log entries ==", activities.len());
            for activity in activities {
                println!(
                    "- [{}] {} {} ({})",
                    activity.agent_id,
                    activity.action,
                    activity.user_id.map(|u| u.to_string()).unwrap_or_default(),
                    activity.details
                );
            }
        }
        Commands::Profile { org, user } => {
            let org = OrgId::from(org.as_str());
            let user = UserId::from(user.as_str());
            let profile = generate_weakness_profile(storage.as_ref(), &config, &org, &user).await?;
            if profile.is_empty() {
                println!("No completed attempts for {user}.");
                return Ok(());
            }
            println!("Profile for {user} (weakest first):");
            for dim in &profile {
                println!(
                    "- {}: {:.0} ({}, {} attempt(s))",
                    dim.key, dim.score, dim.trend, dim.evidence_count
                );
            }
            let context = agent_context(storage.as_ref(), &org, &user).await?;
            for insight in context.insights {
                println!("  {insight}");
            }
        }
        Commands::Digest { org, user } => {
            let org = OrgId::from(org.as_str());
            let user = UserId::from(user.as_str());
            generate_weakness_profile(storage.as_ref(), &config, &org, &user).await?;
            let digest = generate_trainee_digest(storage.as_ref(), &config, &org, &user).await?;
            println!("{}", serde_json::to_string_pretty(&digest)?);
        }
        Commands::SimulateAttempt { org, user } => {
            let bus = build_bus(storage.clone(), &config);
            bus.emit(CoachEvent::AttemptScored {
                org_id: OrgId::from(org.as_str()),
                user_id: UserId::from(user.as_str()),
                attempt_id: repcoach_core::AttemptId::from("simulated"),
            })?;
            print_outcomes(&bus.drain().await);
        }
        Commands::Inactive { org, user, days } => {
            let org = OrgId::from(org.as_str());
            let user = UserId::from(user.as_str());
            generate_weakness_profile(storage.as_ref(), &config, &org, &user).await?;
            let bus = build_bus(storage.clone(), &config);
            bus.emit(CoachEvent::UserInactive {
                org_id: org,
                user_id: user,
                days_since_last_attempt: days,
            })?;
            print_outcomes(&bus.drain().await);
        }
        Commands::Cron { id } => {
            refresh_profiles(&storage, &config, &OrgId::from("org-demo")).await?;
            let bus = build_bus(storage.clone(), &config);
            let outcome = bus.run_cron(&id).await?;
            print_outcomes(&[outcome]);
            print_outcomes(&bus.drain().await);
        }
        Commands::Crons => {
            let bus = build_bus(storage, &config);
            for (id, schedule) in bus.cron_schedule() {
                println!("{id}: {schedule}");
            }
        }
    }

    Ok(())
}
