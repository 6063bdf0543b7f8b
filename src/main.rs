// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc};

use roster_server::api::router;
use roster_server::auth::{BcryptHasher, OverridePolicy, PasswordHasher};
use roster_server::config::{LogFormat, Settings, DEFAULT_LOG_FILTER};
use roster_server::state::{seed_admin, AppState};
use roster_server::storage::{
    AccountRepository, FileAccountRepository, InMemoryAccountRepository, JsonFileStorage,
    StoragePaths,
};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() {
    let settings = Settings::from_env().expect("Invalid configuration");
    init_tracing(settings.log_format);
    tracing::debug!(?settings, "Loaded configuration");

    // Account storage: JSON files under DATA_DIR, otherwise in memory
    let accounts: Arc<dyn AccountRepository> = match &settings.data_dir {
        Some(dir) => {
            let mut storage = JsonFileStorage::new(StoragePaths::new(dir));
            storage
                .initialize()
                .expect("Failed to initialize account storage");
            tracing::info!(data_dir = %dir.display(), "Using file-backed account storage");
            Arc::new(FileAccountRepository::new(storage))
        }
        None => {
            tracing::warn!("DATA_DIR not set, accounts are kept in memory only");
            Arc::new(InMemoryAccountRepository::new())
        }
    };

    let overrides = match &settings.overrides_file {
        Some(path) => OverridePolicy::load(path).expect("Failed to load identity override table"),
        None => OverridePolicy::new(),
    };

    let hasher: Arc<dyn PasswordHasher> = Arc::new(BcryptHasher::default());

    if let Some(seed) = &settings.seed_admin {
        seed_admin(accounts.as_ref(), hasher.as_ref(), seed)
            .await
            .expect("Failed to seed admin account");
    }

    let state = AppState::from_settings(&settings, accounts, overrides, hasher)
        .expect("Failed to build authentication stack");
    let app = router(state);

    let addr: SocketAddr = settings
        .bind_address()
        .parse()
        .expect("Failed to parse bind address");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");

    tracing::info!(%addr, "Roster server listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server failed");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
