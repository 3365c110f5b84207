use std::sync::Arc;

use axum::http::Method;
use clap::Parser;
use tinymap::config::{Cli, Config, default_config_dir, default_config_path};
use tinymap::handler::{AppState, router};
use tinymap::repo::FeatureRepository;
use tinymap::store::LibsqlStore;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    // Determine config path and data directory.
    // If --config is provided, its parent directory holds the database
    // file; otherwise both live under ~/.tinymap/
    let (config_path, data_dir) = match args.config_path {
        Some(path) => {
            let path = std::path::PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("."));
            (path, dir)
        }
        None => {
            let dir = default_config_dir();
            (default_config_path(), dir)
        }
    };

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("failed to create data directory {:?}: {}", data_dir, e);
        std::process::exit(1);
    }

    tracing_subscriber::fmt().json().init();
    tracing::info!("tinymap.svc starting");

    let cfg = Config::new(config_path.to_str().unwrap()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });

    let db_path = data_dir.join(cfg.app.get_db());
    let store = LibsqlStore::new(&db_path).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup document store");
        std::process::exit(1);
    });
    let state = AppState {
        repo: FeatureRepository::new(Arc::new(store)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = router(state).layer(cors);

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    tracing::info!("tinymap.svc running on {}", &address);
    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "server exited with error");
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("ctrl+c signal received, shutting down");
        }
    }
}
