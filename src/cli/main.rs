/**
 * Trainlog command line entry point
 *
 * Thin wrapper around the sync engine for inspecting and driving the local
 * store: resolve titles, record completions, run a sync pass.
 */
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use trainlog::resolver::Resolution;
use trainlog::shared::config::AppConfig;
use trainlog::sync::{CompletionRequest, SyncEngine, SyncStatus};

#[derive(Debug, Parser)]
#[command(name = "trainlog")]
#[command(version)]
#[command(about = "Offline training-log completion tracking and sync")]
struct Cli {
    #[arg(short, long, help = "TOML config file.")]
    config: Option<PathBuf>,

    #[arg(long, env = "TRAINLOG_DB_PATH", help = "Path to the local SQLite database.")]
    db: Option<PathBuf>,

    #[arg(long, env = "TRAINLOG_API_URL", help = "Base URL of the training server.")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Resolve a free-text exercise title against the library.")]
    Resolve { title: String },
    #[command(about = "Find the closest library exercise by edit distance.")]
    Closest { title: String },
    #[command(about = "Record a completed exercise locally.")]
    Record(RecordArgs),
    #[command(about = "Un-complete an exercise locally.")]
    Remove(RemoveArgs),
    #[command(about = "Show sync status for one plan or all plans.")]
    Status { plan: Option<String> },
    #[command(about = "Probe the server, then deliver every unsynced completion.")]
    Sync,
    #[command(about = "Check server connectivity.")]
    Probe,
    #[command(about = "Delete local data for plans not in the given list.")]
    Prune {
        #[arg(required = true)]
        plans: Vec<String>,
    },
}

#[derive(Debug, Args)]
struct RecordArgs {
    plan: String,
    session: String,
    title: String,
    #[arg(long, default_value = "")]
    notes: String,
    #[arg(long, help = "Exercise id, if already known.")]
    exercise_id: Option<String>,
}

#[derive(Debug, Args)]
struct RemoveArgs {
    plan: String,
    session: String,
    title: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    config.validate()?;

    let engine = SyncEngine::open(&config).await?;
    tracing::debug!(db = %config.database_path.display(), "engine ready");

    match cli.command {
        Commands::Resolve { title } => print_resolution(&title, engine.resolve(&title)),
        Commands::Closest { title } => print_resolution(&title, engine.find_closest_match(&title)),
        Commands::Record(args) => {
            let mut request =
                CompletionRequest::new(args.plan, args.session, args.title).with_notes(args.notes);
            if let Some(id) = args.exercise_id {
                request = request.with_exercise_id(id);
            }
            let record = engine.record_completion(request).await?;
            println!("recorded {} ({})", record.completion_key, record.id);
        }
        Commands::Remove(args) => {
            let removed = engine
                .remove_completion(&args.plan, &args.session, &args.title)
                .await?;
            println!("{}", if removed { "removed" } else { "not completed" });
        }
        Commands::Status { plan: Some(plan) } => {
            print_status(&plan, engine.get_sync_status(&plan).await);
            for record in engine.completions(&plan).await {
                println!(
                    "  {:?}  {}  {}{}",
                    record.state(),
                    record.session_id,
                    record.display_title,
                    record
                        .sync_error
                        .map(|e| format!("  ({})", e))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Status { plan: None } => {
            for plan in engine.store().plan_ids().await {
                print_status(&plan, engine.get_sync_status(&plan).await);
            }
            print_status("total", engine.overall_sync_status().await);
        }
        Commands::Sync => {
            let (_, message) = engine.test_server_connectivity().await;
            println!("{}", message);
            let report = engine.force_complete_sync().await;
            match report.skipped {
                Some(reason) => println!("skipped: {:?}", reason),
                None => {
                    println!(
                        "{} plan(s): {} synced, {} failed",
                        report.plans, report.synced, report.failed
                    );
                    for failure in &report.failures {
                        println!("  {}  {}", failure.completion_key, failure.error);
                    }
                }
            }
        }
        Commands::Probe => {
            let (online, message) = engine.test_server_connectivity().await;
            println!("{}", message);
            if !online {
                std::process::exit(2);
            }
        }
        Commands::Prune { plans } => {
            let stats = engine.prune_orphan_plan_data(plans).await?;
            println!(
                "removed {} plan(s), {} session(s), {} completion(s)",
                stats.plans_removed, stats.sessions_removed, stats.completions_removed
            );
        }
    }

    engine.save_all_data().await?;
    Ok(())
}

fn print_resolution(title: &str, resolution: Option<Resolution<'_>>) {
    match resolution {
        Some(hit) => println!(
            "{} -> {} [{}] via {:?}",
            title, hit.exercise.name, hit.category.name, hit.strategy
        ),
        None => println!("{} -> no match", title),
    }
}

fn print_status(label: &str, status: SyncStatus) {
    println!(
        "{}: {} synced, {} failed, {} pending",
        label, status.synced, status.failed, status.pending + status.syncing
    );
}
