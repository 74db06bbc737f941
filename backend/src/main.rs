use std::{future::IntoFuture, net::SocketAddr, sync::Arc};

use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use keyturn_backend::{
    config::{AppEnv, Config},
    db::{create_pool, run_migrations},
    handlers::ClientIpPolicy,
    repositories::{InMemorySessionStore, PgSessionStore, SessionStore},
    router::build_router,
    services::{AuthService, RotationSettings, WebhookNotifier},
    state::AppState,
    utils::{Argon2SecretHasher, TokenIssuer},
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

fn init_tracing(app_env: AppEnv) {
    let default_filter = match app_env {
        AppEnv::Prod => "keyturn_backend=info,tower_http=info",
        AppEnv::Local | AppEnv::Dev => "keyturn_backend=debug,tower_http=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    match app_env {
        AppEnv::Local => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        AppEnv::Dev | AppEnv::Prod => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn SessionStore>> {
    if config.uses_memory_store() {
        tracing::warn!("Using in-memory session store; sessions are lost on restart");
        return Ok(Arc::new(InMemorySessionStore::new()));
    }

    let pool = create_pool(&config.database_url, config.store_timeout()).await?;
    run_migrations(&pool).await?;
    tracing::info!("Migrations applied successfully");
    Ok(Arc::new(PgSessionStore::new(pool)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down server gracefully");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize tracing
    init_tracing(config.app_env);

    tracing::info!(
        app_env = %config.app_env,
        jwt_secret = %mask_secret(&config.jwt_secret),
        access_token_ttl_minutes = config.access_token_ttl.num_minutes(),
        refresh_token_ttl_hours = config.refresh_token_ttl.num_hours(),
        webhook_url = %config.webhook_url,
        store_timeout_secs = config.store_timeout_secs,
        request_timeout_secs = config.request_timeout_secs,
        trust_proxy_headers = config.trust_proxy_headers,
        "Loaded configuration from environment/.env"
    );

    let store = build_store(&config).await?;
    let notifier = WebhookNotifier::new(config.webhook_url.clone(), config.webhook_timeout())?;
    let auth = AuthService::new(
        store,
        Arc::new(notifier),
        Arc::new(Argon2SecretHasher::new()?),
        TokenIssuer::new(&config.jwt_secret, config.access_token_ttl),
        RotationSettings::from_config(&config),
    );

    let client_ip = ClientIpPolicy {
        trust_proxy_headers: config.trust_proxy_headers,
    };
    let app = build_router(AppState::new(auth, client_ip), config.request_timeout());

    // Start server
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server listening on {}", address);

    let grace = config.shutdown_grace();
    let (signal_tx, signal_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = signal_tx.send(());
    })
    .into_future();
    tokio::pin!(server);

    // In-flight requests get `grace` to finish once the signal arrives.
    let drain_deadline = async move {
        if signal_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = &mut server => result?,
        _ = drain_deadline => {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "Graceful shutdown timed out, dropping open connections"
            );
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}
