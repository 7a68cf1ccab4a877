use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower_http::{
    compression::CompressionLayer, decompression::RequestDecompressionLayer, trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    config::{Config, SecurityConfig, StorageConfig},
    durability::{self, DumpTask, BACKUP_TIMEOUT},
    handlers::{self, AppState},
    logging::mask_secret,
    metrics,
    middleware::{decrypt_body, verify_and_sign, MAX_BODY_BYTES},
    security::{Decrypter, Signer},
    service::MetricService,
    signals::spawn_shutdown_listener,
    storage::{FileBackedStore, Repository, SnapshotFile, SqlStore},
};

/// Integrity and confidentiality settings for the router
#[derive(Clone, Default)]
pub struct ServerSecurity {
    pub signer: Option<Signer>,
    pub decrypter: Option<Arc<Decrypter>>,
}

/// The selected persistence backend and the durability work around it
pub struct Backend {
    pub repository: Arc<dyn Repository>,
    /// Set for in-memory backends; target of the shutdown backup
    pub snapshot_path: Option<String>,
    pub dump_task: Option<DumpTask>,
}

/// Pick the backend once at startup.
///
/// - `database_url` set: SQL store, no snapshot file
/// - dump interval 0: in-memory store that dumps after every write
/// - otherwise: in-memory store plus a periodic dump task
pub async fn build_backend(storage: &StorageConfig, cancel: CancellationToken) -> Result<Backend> {
    if !storage.database_url.is_empty() {
        let store = SqlStore::connect(&storage.database_url, storage.max_connections, cancel)
            .await
            .context("Failed to open SQL storage")?;
        info!(max_connections = storage.max_connections, "Using SQL storage");
        return Ok(Backend {
            repository: Arc::new(store),
            snapshot_path: None,
            dump_task: None,
        });
    }

    let snapshot = SnapshotFile::new(&storage.snapshot_path, cancel);
    let store = durability::restore(&snapshot, storage.restore_on_start)
        .await
        .with_context(|| format!("Failed to restore snapshot {}", storage.snapshot_path))?;

    if storage.dump_interval_seconds == 0 {
        info!(path = %storage.snapshot_path, "Using in-memory storage with synchronous dumps");
        return Ok(Backend {
            repository: Arc::new(FileBackedStore::new(store, snapshot)),
            snapshot_path: Some(storage.snapshot_path.clone()),
            dump_task: None,
        });
    }

    info!(
        path = %storage.snapshot_path,
        interval_secs = storage.dump_interval_seconds,
        "Using in-memory storage with periodic dumps"
    );
    let repository: Arc<dyn Repository> = Arc::new(store);
    let dump_task = DumpTask::new(
        repository.clone(),
        snapshot,
        Duration::from_secs(storage.dump_interval_seconds),
    );
    Ok(Backend {
        repository,
        snapshot_path: Some(storage.snapshot_path.clone()),
        dump_task: Some(dump_task),
    })
}

/// Load the signing key and RSA private key. Unreadable key material is a
/// startup error.
pub fn load_security(security: &SecurityConfig) -> Result<ServerSecurity> {
    let signer = if security.signing_key.is_empty() {
        None
    } else {
        info!(key = %mask_secret(&security.signing_key), "Request signature verification enabled");
        Some(Signer::new(&security.signing_key))
    };

    let decrypter = if security.private_key_path.is_empty() {
        None
    } else {
        info!(path = %security.private_key_path, "Request decryption enabled");
        let decrypter = Decrypter::from_pem_file(Path::new(&security.private_key_path))
            .context("Failed to load RSA private key")?;
        Some(Arc::new(decrypter))
    };

    Ok(ServerSecurity { signer, decrypter })
}

/// Upper bound for in-flight requests to finish once shutdown begins
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

/// Start the metrics server
///
/// This function:
/// 1. Initializes self-metrics
/// 2. Installs the shutdown signal listener
/// 3. Selects the storage backend
/// 4. Serves requests until a shutdown signal, then writes the final backup
pub async fn start_server(config: Config) -> Result<()> {
    info!("Initializing Prometheus metrics...");
    let metrics_handle = metrics::init_metrics()?;

    let cancel = CancellationToken::new();
    let signal_handle = spawn_shutdown_listener(cancel.clone());

    let security = load_security(&config.security)?;
    let backend = build_backend(&config.storage, cancel.clone()).await?;

    let service = Arc::new(MetricService::new(backend.repository.clone()));
    let state = AppState::new(service).with_metrics(metrics_handle);
    let app = create_router(state, security);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!("Starting metrics server on {}", addr);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    serve_until_cancelled(listener, app, backend, cancel, SHUTDOWN_GRACE).await?;

    signal_handle.await?;
    info!("Server stopped gracefully");

    Ok(())
}

/// Serve `app` until `cancel` fires, then shut down within bounded time.
///
/// Connections still open after `grace` are dropped. The dump task is joined
/// and the final backup of an in-memory backend is written either way.
pub async fn serve_until_cancelled(
    listener: TcpListener,
    app: Router,
    backend: Backend,
    cancel: CancellationToken,
    grace: Duration,
) -> Result<()> {
    let dump_handle: Option<JoinHandle<()>> =
        backend.dump_task.map(|task| task.spawn(cancel.clone()));

    let shutdown = cancel.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
    });

    let served = tokio::select! {
        result = &mut server => Some(result),
        _ = cancel.cancelled() => None,
    };
    // Also stops the dump task when the server ended on its own
    cancel.cancel();

    let served = match served {
        Some(result) => Some(result),
        None => match tokio::time::timeout(grace, &mut server).await {
            Ok(result) => Some(result),
            Err(_) => {
                warn!(
                    grace_secs = grace.as_secs_f64(),
                    "In-flight requests did not finish in time, dropping connections"
                );
                server.abort();
                None
            }
        },
    };
    info!("Stopped accepting requests");

    if let Some(handle) = dump_handle {
        handle.await?;
    }

    if let Some(path) = backend.snapshot_path {
        // The process token has already fired; the backup gets its own so
        // its open retries still run.
        let snapshot = SnapshotFile::new(path, CancellationToken::new());
        durability::backup(backend.repository.as_ref(), &snapshot, BACKUP_TIMEOUT).await;
    }

    if let Some(result) = served {
        result.context("Server task failed")??;
    }
    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(state: AppState, security: ServerSecurity) -> Router {
    let mut app = Router::new()
        .route("/", get(handlers::values::list_all))
        .route("/ping", get(handlers::health::ping))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics_handler::metrics))
        .route("/value", post(handlers::values::value_json))
        .route("/value/:kind/:name", get(handlers::values::get_value))
        .route("/update", post(handlers::updates::update_json))
        .route(
            "/update/:kind/:name/:value",
            post(handlers::updates::update_from_path),
        )
        .route("/updates", post(handlers::updates::updates_json))
        .with_state(state);

    // Layers added later wrap the ones added earlier.
    if let Some(decrypter) = security.decrypter {
        app = app.layer(middleware::from_fn_with_state(decrypter, decrypt_body));
    }
    if let Some(signer) = security.signer {
        app = app.layer(middleware::from_fn_with_state(signer, verify_and_sign));
    }

    app.layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}
