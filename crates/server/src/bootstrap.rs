use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use staffer_agent::agents::{
    AgentRegistry, AnalyticsAgent, ExportAgent, MessengerAgent, ResearchAgent, SchedulerAgent,
    TasksAgent,
};
use staffer_agent::context::NoopRetriever;
use staffer_agent::delivery::{
    CalendarDelivery, CalendarError, DisabledCalendar, DisabledMail, HttpCalendarDelivery,
    HttpMailDelivery, MailDelivery, MailError,
};
use staffer_agent::llm::{CompletionClient, HttpCompletionClient, LlmError};
use staffer_agent::router::Router;
use staffer_agent::workflow::WorkflowController;
use staffer_core::config::{AppConfig, ConfigError, LoadOptions};
use staffer_core::GateConfig;
use staffer_db::repositories::SqlMetadataRepository;
use staffer_db::{connect_with_settings, migrations, ConversationLocks, DbPool, MetadataRepository, PendingStore};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub controller: Arc<WorkflowController>,
    pub repository: Arc<dyn MetadataRepository>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client setup failed: {0}")]
    Llm(#[from] LlmError),
    #[error("calendar setup failed: {0}")]
    Calendar(#[from] CalendarError),
    #[error("mail setup failed: {0}")]
    Mail(#[from] MailError),
    #[error(transparent)]
    Timezone(#[from] staffer_core::DomainError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied");

    let repository: Arc<dyn MetadataRepository> =
        Arc::new(SqlMetadataRepository::new(db_pool.clone()));
    let store = PendingStore::new(repository.clone());
    let locks = ConversationLocks::new();

    let llm: Arc<dyn CompletionClient> =
        Arc::new(HttpCompletionClient::new(config.llm.clone())?);

    let timezone = staffer_core::parse_timezone(&config.calendar.timezone)?;

    let calendar: Arc<dyn CalendarDelivery> = if config.calendar.enabled {
        Arc::new(HttpCalendarDelivery::new(
            config.calendar.base_url.clone(),
            config.calendar.api_key.clone(),
            config.calendar.calendar_id.clone(),
            timezone,
        )?)
    } else {
        Arc::new(DisabledCalendar)
    };

    let mail: Arc<dyn MailDelivery> = if config.mail.enabled {
        Arc::new(HttpMailDelivery::new(
            config.mail.relay_url.clone(),
            config.mail.api_key.clone(),
            config.mail.from_address.clone(),
            config.mail.from_name.clone(),
        )?)
    } else {
        Arc::new(DisabledMail)
    };

    let gate = GateConfig { check_ttl_secs: config.workflow.check_ttl_secs };

    let mut registry = AgentRegistry::new();
    registry.register(Arc::new(SchedulerAgent::new(
        store.clone(),
        locks.clone(),
        calendar,
        timezone,
        gate,
    )));
    registry.register(Arc::new(MessengerAgent::new(
        store,
        locks,
        mail,
        llm.clone(),
    )));
    registry.register(Arc::new(ResearchAgent::new(llm.clone(), Arc::new(NoopRetriever))));
    registry.register(Arc::new(TasksAgent::new(llm.clone())));
    registry.register(Arc::new(AnalyticsAgent::new(llm.clone())));
    registry.register(Arc::new(ExportAgent::new(
        repository.clone(),
        config.server.public_base_url.clone(),
    )));

    let controller = Arc::new(WorkflowController::new(
        Router::new(llm.clone()),
        registry,
        llm,
        config.workflow.max_iterations,
    ));
    info!(event_name = "system.bootstrap.ready");

    Ok(Application { config, db_pool, controller, repository })
}

#[cfg(test)]
mod tests {
    use staffer_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_builds_the_runtime() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed with defaults");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name = 'conversation_metadata'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("metadata table should exist after bootstrap");
        assert_eq!(table_count, 1);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_rejects_invalid_workflow_bounds() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                max_iterations: Some(0),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("max_iterations"));
    }
}
