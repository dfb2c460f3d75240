use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use lesson_core::model::{LessonRef, Principal, PrincipalId, SubscriptionTier};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid database url: {raw}")]
    InvalidDbUrl { raw: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Guitar lessons in the terminal.
#[derive(Debug, Parser)]
#[command(name = "app", version)]
pub struct Cli {
    /// SQLite database URL or file path.
    #[arg(
        long = "db",
        env = "GUITAR_DB_URL",
        default_value = "sqlite://guitar.sqlite3",
        global = true
    )]
    pub db_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List published lessons with your progress.
    Lessons(LearnerArgs),
    /// Play a lesson by slug or id.
    Play {
        lesson: String,
        #[command(flatten)]
        learner: LearnerArgs,
    },
}

#[derive(Debug, Clone, Args)]
pub struct LearnerArgs {
    /// Learner id (UUID). A random one is used when missing.
    #[arg(long = "principal", env = "GUITAR_PRINCIPAL_ID")]
    pub principal: Option<PrincipalId>,

    /// Subscription tier: free or premium.
    #[arg(long = "tier", env = "GUITAR_TIER", default_value = "free")]
    pub tier: SubscriptionTier,
}

impl LearnerArgs {
    #[must_use]
    pub fn principal(&self) -> Principal {
        let id = self.principal.unwrap_or_else(|| {
            let id = PrincipalId::random();
            tracing::info!(principal = %id, "no principal given, using a fresh one");
            id
        });
        Principal::new(id, self.tier)
    }
}

impl Command {
    #[must_use]
    pub fn lesson_ref(&self) -> Option<LessonRef> {
        match self {
            Command::Lessons(_) => None,
            Command::Play { lesson, .. } => Some(LessonRef::parse(lesson)),
        }
    }
}

pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Creates the database file and its parent directories so sqlx can open it.
///
/// # Errors
///
/// Returns `ConfigError` for malformed URLs or filesystem failures.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), ConfigError> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ConfigError::InvalidDbUrl {
            raw: db_url.to_owned(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ConfigError::InvalidDbUrl {
            raw: db_url.to_owned(),
        });
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}
