use clap::Parser;
use services::{AppServices, Clock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod player;

use config::{Cli, Command, LearnerArgs, normalize_sqlite_url, prepare_sqlite_file};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "app=info,services=info,storage=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn list_lessons(
    services: &AppServices,
    learner: &LearnerArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let principal = learner.principal();
    let catalog = services.catalog();
    let overview = catalog.list_with_progress(principal.id).await?;
    if overview.is_empty() {
        println!("no published lessons yet (run the seed binary first)");
        return Ok(());
    }

    for item in &overview {
        let lock = if item.meta.is_premium && !principal.is_premium() {
            " [premium]"
        } else {
            ""
        };
        println!(
            "{:>3}. {:<24} {:<12} {:>3}%  ({}){lock}",
            item.meta.lesson_number,
            item.meta.title,
            item.status_label(),
            item.percentage(),
            item.meta.slug,
        );
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    let db_url = normalize_sqlite_url(&cli.db_url);
    prepare_sqlite_file(&db_url)?;
    let services = AppServices::new_sqlite(&db_url, Clock::system()).await?;
    tracing::info!(db = %db_url, "storage ready");

    match &cli.command {
        Command::Lessons(learner) => list_lessons(&services, learner).await,
        Command::Play { learner, .. } => {
            let Some(lesson_ref) = cli.command.lesson_ref() else {
                return Ok(());
            };
            let principal = learner.principal();
            let lesson_player = services.player();
            let mut session = lesson_player.open(&lesson_ref, &principal).await?;

            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            player::run_session(&lesson_player, &mut session, stdin).await?;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
