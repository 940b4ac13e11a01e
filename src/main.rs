use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use donation_capture::adapters::{
    PostgresFormRepository, PostgresPaymentRepository, PostgresSubmissionRepository,
};
use donation_capture::cli::{Cli, Commands, DbCommands, PaymentCommands};
use donation_capture::config::settings::SettingsCache;
use donation_capture::config::{Config, GatewayMode, LogFormat};
use donation_capture::gateway::cybersource::CybersourceClient;
use donation_capture::gateway::mock::MockGatewayClient;
use donation_capture::gateway::GatewayClient;
use donation_capture::middleware::request_logger::RequestLogSettings;
use donation_capture::{cli, create_app, db, startup, AppOptions, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Payment(command) => {
            let pool = db::create_pool(&config).await?;
            match command {
                PaymentCommands::Show { id } => cli::handle_payment_show(&pool, id).await,
                PaymentCommands::List { limit } => cli::handle_payment_list(&pool, limit).await,
                PaymentCommands::LinkRecurring { parent, child } => {
                    cli::handle_payment_link_recurring(&pool, parent, child).await
                }
            }
        }
        Commands::Config => {
            cli::handle_config_validate(&config)?;
            let pool = db::create_pool(&config).await?;
            let report = startup::validate_environment(&config, &pool).await?;
            report.print();
            if !report.is_valid() {
                anyhow::bail!("Startup validation failed");
            }
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let gateway: Arc<dyn GatewayClient> = match config.gateway.mode {
        GatewayMode::Mock => Arc::new(MockGatewayClient::from_behavior(
            config.gateway.mock_behavior.as_deref().unwrap_or_default(),
        )),
        GatewayMode::Cybersource => Arc::new(CybersourceClient::from_config(&config.gateway)),
    };
    if gateway.is_ready() {
        tracing::info!("Payment gateway '{}' initialized", gateway.name());
    } else {
        tracing::warn!(
            "Payment gateway '{}' is not ready; donation forms will be closed",
            gateway.name()
        );
    }

    let settings = SettingsCache::start(
        pool.clone(),
        Duration::from_secs(config.settings_refresh_secs.max(1)),
        config.default_environment.map(|env| env.as_str().to_string()),
    )
    .await;
    tracing::info!("Gateway settings loaded: {} keys", settings.snapshot().len());

    let app_state = AppState::new(
        Some(pool.clone()),
        gateway,
        settings,
        Arc::new(PostgresFormRepository::new(pool.clone())),
        Arc::new(PostgresPaymentRepository::new(pool.clone())),
        Arc::new(PostgresSubmissionRepository::new(pool)),
        config.gateway.timeout(),
    );

    let app = create_app(
        app_state,
        AppOptions {
            request_log: RequestLogSettings {
                log_body: config.log_request_body,
            },
            cors_allowed_origins: config.cors_allowed_origins.clone(),
        },
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
