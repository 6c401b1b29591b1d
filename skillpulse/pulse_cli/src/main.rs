mod config;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use shared_event_bus::{EventPublisher, EventRecord, FileEventPublisher, MemoryEventBus};
use skillpulse_catalog::{
    insights::{filter_courses, filter_posts, group_by_progress, trending_posts, total_upvotes},
    Catalog, CatalogTelemetry, Course, LearnerProfile, Repository, ALL_CATEGORIES,
};
use skillpulse_planner::{
    DirStorage, ErrorKind, PlannerError, PlannerRuntime, PlannerTelemetry, Priority, TaskId,
    DURATION_CHOICES,
};
use tokio::runtime::Runtime;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "pulse", version, about = "SkillPulse planner and learning catalog")]
struct Cli {
    /// Configuration file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "skillpulse.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Daily time planner.
    Plan {
        /// Date to work on (YYYY-MM-DD); today when omitted.
        #[arg(long, global = true)]
        date: Option<NaiveDate>,
        #[command(subcommand)]
        action: PlanCommand,
    },
    /// Courses, dashboard and community forum.
    Catalog {
        #[command(subcommand)]
        action: CatalogCommand,
    },
}

#[derive(Subcommand, Debug)]
enum PlanCommand {
    /// Adds an unscheduled task.
    Add {
        title: String,
        /// Minutes; the app offers 15, 30, 60, 90 and 120.
        #[arg(long, default_value_t = 30)]
        duration: u32,
        #[arg(long, default_value_t = Priority::Medium)]
        priority: Priority,
    },
    /// Lists scheduled and unscheduled tasks.
    List,
    /// Shows the slot grid with occupancy.
    Slots,
    /// Places a task starting at a slot id such as `9-30`.
    Schedule { task_id: TaskId, slot_id: String },
    /// Deletes a task and frees its slots.
    Delete { task_id: TaskId },
    /// Toggles a task between done and pending.
    Toggle { task_id: TaskId },
    /// Shows productivity counters.
    Stats,
    /// Lists dates that have saved tasks.
    Days,
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Lists courses grouped by progress.
    Courses {
        #[arg(long, default_value = ALL_CATEGORIES)]
        category: String,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Shows the home dashboard.
    Dashboard,
    /// Lists forum posts, most upvoted first.
    Forum {
        #[arg(long, default_value = ALL_CATEGORIES)]
        category: String,
        #[arg(long, default_value = "")]
        search: String,
    },
}

/// Forwards every event to several publishers.
struct Fanout(Vec<Arc<dyn EventPublisher>>);

#[async_trait]
impl EventPublisher for Fanout {
    async fn publish(&self, event: EventRecord) -> Result<()> {
        for publisher in &self.0 {
            publisher.publish(event.clone()).await?;
        }
        Ok(())
    }
}

struct Sinks {
    bus: Arc<MemoryEventBus>,
    publisher: Arc<dyn EventPublisher>,
}

impl Sinks {
    fn new(config: &AppConfig) -> Result<Self> {
        let bus = Arc::new(MemoryEventBus::new(256));
        let mut publishers: Vec<Arc<dyn EventPublisher>> = vec![bus.clone() as Arc<dyn EventPublisher>];
        if let Some(path) = &config.telemetry.event_log {
            publishers.push(Arc::new(
                FileEventPublisher::new(path)
                    .with_context(|| format!("opening event log {}", path.display()))?,
            ));
        }
        Ok(Self {
            bus,
            publisher: Arc::new(Fanout(publishers)),
        })
    }

    fn print_notices(&self) {
        for notice in self.bus.drain().iter().filter_map(EventRecord::as_notice) {
            println!("[{}] {}", notice.level.as_str(), notice.message);
        }
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::load(&cli.config)?;
    let sinks = Sinks::new(&config)?;
    let succeeded = match cli.command {
        Commands::Plan { date, action } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            handle_plan(&config, &sinks, date, action)
        }
        Commands::Catalog { action } => handle_catalog(&config, &sinks, action),
    };
    sinks.print_notices();
    Ok(if succeeded? {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Rejections were already reported as notices; only storage failures abort.
fn settle<T>(result: Result<T, PlannerError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.kind() == ErrorKind::Storage => Err(err.into()),
        Err(_) => Ok(None),
    }
}

fn handle_plan(
    config: &AppConfig,
    sinks: &Sinks,
    date: NaiveDate,
    action: PlanCommand,
) -> Result<bool> {
    let mut telemetry = PlannerTelemetry::builder("planner")
        .event_publisher(sinks.publisher.clone())
        .min_level(config.min_level);
    if let Some(path) = &config.telemetry.log_path {
        telemetry = telemetry.log_path(path);
    }
    let storage = DirStorage::new(&config.planner.storage_dir);
    let mut runtime = PlannerRuntime::open(storage, date, Some(telemetry.build()?))
        .with_context(|| format!("loading tasks for {date}"))?;

    match action {
        PlanCommand::Add {
            title,
            duration,
            priority,
        } => {
            let added = settle(runtime.add_task(&title, duration, priority))?;
            if let Some(task) = &added {
                println!("#{} {} ({} min, {})", task.id, task.title, task.duration_minutes, task.priority);
                if !DURATION_CHOICES.contains(&duration) {
                    println!("note: the app usually offers {DURATION_CHOICES:?} minutes");
                }
            }
            Ok(added.is_some())
        }
        PlanCommand::List => {
            let store = runtime.store();
            println!("{date}");
            println!("Scheduled:");
            for task in store.scheduled_tasks() {
                let start = task
                    .assigned_slot_id
                    .as_deref()
                    .and_then(|id| store.grid().slot(id))
                    .map_or("?", |slot| slot.label.as_str());
                println!(
                    "  {start:>8}  #{} [{}] {} ({} min, {})",
                    task.id,
                    if task.completed { "x" } else { " " },
                    task.title,
                    task.duration_minutes,
                    task.priority.label()
                );
            }
            println!("Unscheduled:");
            for task in store.unscheduled_tasks() {
                println!(
                    "  #{} [{}] {} ({} min, {})",
                    task.id,
                    if task.completed { "x" } else { " " },
                    task.title,
                    task.duration_minutes,
                    task.priority.label()
                );
            }
            Ok(true)
        }
        PlanCommand::Slots => {
            let store = runtime.store();
            for slot in store.grid().slots() {
                let holder = slot
                    .occupying_task
                    .and_then(|id| store.task(id))
                    .map_or_else(|| "free".to_string(), |task| format!("#{} {}", task.id, task.title));
                println!("{:>8}  {:<6} {holder}", slot.label, slot.id);
            }
            Ok(true)
        }
        PlanCommand::Schedule { task_id, slot_id } => {
            Ok(settle(runtime.schedule(task_id, &slot_id))?.is_some())
        }
        PlanCommand::Delete { task_id } => Ok(settle(runtime.delete_task(task_id))?.is_some()),
        PlanCommand::Toggle { task_id } => {
            Ok(settle(runtime.toggle_complete(task_id))?.is_some())
        }
        PlanCommand::Stats => {
            println!("{}", serde_json::to_string_pretty(&runtime.stats())?);
            Ok(true)
        }
        PlanCommand::Days => {
            for day in runtime.store().saved_dates()? {
                println!("{day}");
            }
            Ok(true)
        }
    }
}

fn print_courses(title: &str, courses: &[&Course]) {
    if courses.is_empty() {
        return;
    }
    println!("{title}:");
    for course in courses {
        println!(
            "  #{} {} [{}] {} lessons, {} min, {}",
            course.id, course.title, course.category, course.total_lessons, course.duration, course.instructor
        );
    }
}

fn handle_catalog(config: &AppConfig, sinks: &Sinks, action: CatalogCommand) -> Result<bool> {
    let mut telemetry = CatalogTelemetry::builder("catalog")
        .event_publisher(sinks.publisher.clone())
        .min_level(config.min_level);
    if let Some(path) = &config.telemetry.log_path {
        telemetry = telemetry.log_path(path);
    }
    let catalog = Catalog::with_fixtures(config.catalog.latency())?.with_telemetry(telemetry.build()?);
    let profile = LearnerProfile::from(config.profile.clone());
    let runtime = Runtime::new().context("starting async runtime")?;

    runtime.block_on(async move {
        match action {
            CatalogCommand::Courses { category, search } => {
                let courses = catalog.courses().get_all().await?;
                let progress = catalog.progress().get_all().await;
                let filtered = filter_courses(&courses, &category, &search);
                let groups = group_by_progress(&filtered, &progress);
                print_courses("In progress", &groups.in_progress);
                print_courses("Not started", &groups.not_started);
                print_courses("Completed", &groups.completed);
            }
            CatalogCommand::Dashboard => {
                let dashboard = catalog.dashboard(Local::now().date_naive(), &profile).await?;
                println!("Welcome back, {}!", profile.name);
                println!("Overall progress: {}%", dashboard.overall_progress);
                println!("Tip of the day: {}", dashboard.daily_tip);
                print_courses("Continue learning", &dashboard.in_progress.iter().collect::<Vec<_>>());
                print_courses("Recommended", &dashboard.recommended.iter().collect::<Vec<_>>());
                println!(
                    "Lessons: {}/{}  Courses: {}/{}  Streak: {} days",
                    dashboard.stats.completed_lessons,
                    dashboard.stats.total_lessons,
                    dashboard.stats.completed_courses,
                    dashboard.stats.total_courses,
                    dashboard.stats.streak
                );
                for achievement in &dashboard.achievements {
                    println!("  * {}: {}", achievement.title, achievement.description);
                }
            }
            CatalogCommand::Forum { category, search } => {
                let posts = catalog.forum().get_all().await?;
                for post in filter_posts(&posts, &category, &search) {
                    println!(
                        "#{} [{}] {} ({} upvotes, {} replies) by {}",
                        post.id,
                        post.category,
                        post.title,
                        post.upvotes,
                        post.replies.len(),
                        post.user_id
                    );
                }
                let trending: Vec<String> = trending_posts(&posts)
                    .iter()
                    .map(|post| format!("#{}", post.id))
                    .collect();
                println!("Trending: {}", trending.join(", "));
                println!("Total upvotes: {}", total_upvotes(&posts));
            }
        }
        Ok::<_, anyhow::Error>(true)
    })
}
