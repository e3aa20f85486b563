mod db_core;
mod error;
mod model;
mod notify;
mod poller;
mod routes;
mod server_config;
mod settings;
mod testflight;

use std::{env, net::SocketAddr, path::Path, time::Duration};

use axum::{extract::FromRef, Router};
use mimalloc::MiMalloc;
use model::app_status::{AppStatusCtrl, SqlStatusStore};
use notify::discord::{ChangeMessages, DiscordApi, DiscordNotifier};
use poller::{scheduler::PollLoop, StatusPoller};
use routes::AppRouter;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use server_config::cfg;
use settings::RuntimeSettings;
use testflight::client::TestFlightClient;
use tokio::{signal, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub type HttpClient = reqwest::Client;

#[derive(Clone, FromRef)]
struct ServerState {
    conn: DatabaseConnection,
    settings: RuntimeSettings,
    tf_client: TestFlightClient,
    discord: DiscordApi,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    std::fs::create_dir_all(&cfg.storage.data_dir)?;
    let data_dir = Path::new(&cfg.storage.data_dir);
    let db_url = format!("sqlite://{}?mode=rwc", data_dir.join("state.db").display());
    let mut db_options = ConnectOptions::new(db_url);
    db_options.sqlx_logging(false);

    let conn = Database::connect(db_options)
        .await
        .expect("Database connection failed");

    let fresh_start = AppStatusCtrl::init_schema(&conn).await?;
    if fresh_start {
        tracing::info!("Created status table, the first cycle will not notify");
    }

    let http_client = reqwest::ClientBuilder::new()
        .use_rustls_tls()
        .timeout(Duration::from_secs(30))
        .build()?;

    let settings = RuntimeSettings::load_or_init(
        data_dir.join("settings.json"),
        cfg.settings.check_interval_hours,
    )?;

    let tf_client = TestFlightClient::new(http_client.clone());
    let discord = DiscordApi::new(http_client, cfg.discord.bot_token.clone());

    let state = ServerState {
        conn: conn.clone(),
        settings: settings.clone(),
        tf_client: tf_client.clone(),
        discord: discord.clone(),
    };
    let router = AppRouter::create(state);

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let poller = StatusPoller::new(
        tf_client,
        SqlStatusStore::new(conn.clone()),
        DiscordNotifier::new(
            discord,
            settings.clone(),
            ChangeMessages {
                filled: cfg.settings.filled_message.clone(),
                unfilled: cfg.settings.unfilled_message.clone(),
            },
        ),
        settings.clone(),
        fresh_start,
        cfg.settings.send_errors,
    );
    let poll_handle = tokio::spawn(PollLoop::new(poller, settings).run(shutdown.clone()));
    let server_handle = run_server(router, shutdown.clone());

    let mut exit_err: Option<anyhow::Error> = None;
    tokio::select! {
        _ = server_handle => {
            tracing::info!("Server shut down, exiting");
        }
        result = poll_handle => match result {
            Ok(Ok(())) => tracing::info!("Status poller ended"),
            Ok(Err(e)) => {
                tracing::error!("Storage error, shutting down: {e}");
                exit_err = Some(e.into());
            }
            Err(e) => {
                tracing::error!("Status poller panicked: {e}");
                exit_err = Some(e.into());
            }
        },
    }

    shutdown.cancel();
    conn.close().await?;

    match exit_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}

fn run_server(router: Router, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let port = env::var("PORT").unwrap_or("5006".to_string());
        tracing::info!("betawatch server running on http://0.0.0.0:{}", port);
        println!("{}", *cfg);

        let addr = SocketAddr::from(([0, 0, 0, 0], port.parse::<u16>().unwrap()));
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .unwrap();
    })
}
