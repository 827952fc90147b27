use mimalloc::MiMalloc;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = cims::config::CONFIG.clone();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        listen_addr = %cfg.basic.listen_addr,
        listen_port = cfg.basic.listen_port,
        loglevel = %cfg.basic.loglevel,
        upload_dir = %cfg.storage.upload_dir.display(),
        retention_days = cfg.storage.retention_days,
        llm_provider = %cfg.llm.provider,
        proxy = %cfg.llm.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        extract_tps = cfg.llm.extract_tps,
    );

    let db = cims::db::Db::connect(&cfg.basic.database_url).await?;
    db.seed_admin(&cfg.admin).await?;
    if cfg.admin.seed_locations {
        let seeded = db.seed_locations().await?;
        if seeded > 0 {
            info!(count = seeded, "Default locations seeded");
        }
    }
    if cfg.admin.seed_sample_inventory {
        db.seed_sample_inventory().await?;
    }

    tokio::fs::create_dir_all(cfg.storage.monitoring_dir()).await?;

    let llm: cims::llm::SharedLlm = Arc::new(cims::llm::HostedLlm::new(db.clone(), cfg.llm.clone())?);
    let extractor =
        cims::service::ExtractorHandle::spawn(db.clone(), llm.clone(), cfg.llm.extract_tps).await?;
    let _sweeper = cims::service::retention::spawn_retention_sweeper(db.clone(), &cfg.storage);

    if cfg.basic.insecure_cookie {
        warn!("Session cookie is sent without the Secure attribute");
    }

    let addr = SocketAddr::from((cfg.basic.listen_addr, cfg.basic.listen_port));
    let state = cims::server::router::CimsState::new(db, llm, extractor, cfg);
    let app = cims::server::router::cims_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server has shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
