#[macro_use]
extern crate diesel;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use anyhow::Context;
use config::ConfigError;
use cron::Schedule;
use lazy_static::lazy_static;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::database::PgStore;
use crate::database::Store;
use crate::discord::DiscordHub;
use crate::framework::notification::NotificationHub;
use crate::framework::reminder::ReminderScheduler;
use crate::framework::Services;
use crate::settings::LogSettings;
use crate::settings::Settings;

mod database;
mod discord;
mod error;
mod framework;
mod settings;

lazy_static! {
    static ref SETTINGS: Result<Settings, ConfigError> = Settings::new();
}

/// `RUST_LOG` takes precedence over the configured level. The returned
/// guard flushes buffered log lines when dropped.
fn init_logging(log: &LogSettings) -> anyhow::Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log.level))?;

    let (writer, guard) = match &log.directory {
        Some(directory) => tracing_appender::non_blocking(tracing_appender::rolling::daily(
            directory,
            "raidbot.log",
        )),
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    if log.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(writer))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(writer))
            .try_init()?;
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = SETTINGS
        .as_ref()
        .map_err(|e| anyhow!("Failed to load settings: {}", e))?;
    let _guard = init_logging(&settings.log)?;

    let pool =
        database::connect(&settings.database_url).context("Failed to connect to the database")?;
    database::run_migrations(&pool).context("Failed to run migrations")?;

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let hub: Arc<dyn NotificationHub> = Arc::new(DiscordHub::new(&settings.discord_token));

    let (services, changes) = Services::new(store.clone(), hub.clone());
    let services = Arc::new(services);

    let renderer = tokio::spawn(services.raids.clone().run_renderer(changes));

    let schedule =
        Schedule::from_str(&settings.reminder.schedule).context("Invalid reminder schedule")?;
    let reminders =
        ReminderScheduler::new((&settings.reminder).into()).spawn(schedule, store, hub);

    let result =
        discord::start_bot(settings.discord_token.clone(), settings.server_id, services).await;

    info!("Bot stopped, shutting down");
    reminders.stop().await;
    renderer.abort();

    Ok(result?)
}
