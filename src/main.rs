use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::info;

use storefront_api::auth::{AuthConfig, AuthService};
use storefront_api::config::{init_tracing, load_config};
use storefront_api::db::{bootstrap_schema, establish_connection_from_app_config};
use storefront_api::handlers::AppServices;
use storefront_api::services::payments::StripeGateway;
use storefront_api::services::shipping::ViaCepClient;
use storefront_api::{app, events, handlers, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(load_config()?);
    init_tracing(config.log_level(), config.log_json);
    handlers::health::init_start_time();

    let db = Arc::new(establish_connection_from_app_config(&config).await?);
    if config.auto_migrate {
        bootstrap_schema(&db).await?;
        info!("Database schema bootstrapped");
    }

    let (event_sender, event_receiver) = events::channel(1024);
    tokio::spawn(events::process_events(event_receiver));

    let auth_service = Arc::new(AuthService::new(
        AuthConfig::new(
            config.jwt_secret.clone(),
            Duration::from_secs(config.jwt_expiration),
        ),
        db.clone(),
    ));

    let postal_lookup = Arc::new(ViaCepClient::new(
        config.viacep_base_url.clone(),
        Duration::from_secs(config.shipping_lookup_timeout_secs),
    )?);

    let gateway = Arc::new(StripeGateway::new(
        config.stripe_secret_key.clone(),
        config.stripe_base_url.clone(),
        config.frontend_url.clone(),
    ));

    let services = AppServices::new(
        db.clone(),
        event_sender.clone(),
        auth_service,
        postal_lookup,
        gateway,
    );

    let state = AppState {
        db,
        config: config.clone(),
        event_sender,
        services,
    };

    let app = app(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("storefront-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
