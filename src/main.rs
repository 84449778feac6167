use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{info, warn};

use ruledash::api::routes::{create_router, AppState};
use ruledash::auth::{AllowAllAuthService, AuthService, StaticAuthService};
use ruledash::config::Config;
use ruledash::controller::RuleController;
use ruledash::domain::{
    AuthorityRuleEntity, DegradeRuleEntity, FlowRuleEntity, ParamFlowRuleEntity, RuleEntity,
    SystemRuleEntity,
};
use ruledash::observability::{init_tracing, MetricsRegistry};
use ruledash::storage::{
    FileRuleSource, InMemoryRuleRepository, MemoryRuleSource, RuleProvider, RulePublisher,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    init_tracing(&config.log_level, config.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting ruledash rule controller"
    );

    let auth: Arc<dyn AuthService> = match config.auth_users_path {
        Some(ref path) => {
            let service = StaticAuthService::load(path)?;
            info!(path = %path.display(), users = service.user_count(), "Loaded users file");
            Arc::new(service)
        }
        None => {
            warn!("No users file configured, every caller is a super user");
            Arc::new(AllowAllAuthService)
        }
    };

    let metrics = Arc::new(MetricsRegistry::new());

    // Create application state
    let state = match config.rule_source_dir {
        Some(ref dir) => {
            info!(dir = %dir.display(), "Using file rule source");
            let source = Arc::new(FileRuleSource::new(dir.clone(), config.source_timeout()));
            build_state(&source, &auth, &metrics)
        }
        None => {
            warn!("No rule source directory configured, rules are kept in memory only");
            let source = Arc::new(MemoryRuleSource::new());
            build_state(&source, &auth, &metrics)
        }
    };

    // Create router
    let app = create_router(state);

    // Parse listen address
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, "Starting HTTP server");

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run server with graceful shutdown
    if config.graceful_shutdown {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        shutdown_signal().await;
        let _ = stop_tx.send(());

        match tokio::time::timeout(config.shutdown_timeout(), server).await {
            Ok(joined) => joined??,
            Err(_) => warn!(
                timeout_secs = config.shutdown_timeout_secs,
                "In-flight requests did not drain before the shutdown timeout"
            ),
        }
    } else {
        axum::serve(listener, app).await?;
    }

    info!("Shutdown complete");
    Ok(())
}

/// One controller per rule kind, each with its own repository and id
/// sequence, all sharing the same rule source.
fn build_state<S>(
    source: &Arc<S>,
    auth: &Arc<dyn AuthService>,
    metrics: &Arc<MetricsRegistry>,
) -> Arc<AppState>
where
    S: RuleProvider<FlowRuleEntity>
        + RulePublisher<FlowRuleEntity>
        + RuleProvider<DegradeRuleEntity>
        + RulePublisher<DegradeRuleEntity>
        + RuleProvider<SystemRuleEntity>
        + RulePublisher<SystemRuleEntity>
        + RuleProvider<AuthorityRuleEntity>
        + RulePublisher<AuthorityRuleEntity>
        + RuleProvider<ParamFlowRuleEntity>
        + RulePublisher<ParamFlowRuleEntity>
        + 'static,
{
    Arc::new(AppState {
        flow: controller(source, auth, metrics),
        degrade: controller(source, auth, metrics),
        system: controller(source, auth, metrics),
        authority: controller(source, auth, metrics),
        param_flow: controller(source, auth, metrics),
        metrics: metrics.clone(),
        start_time: Instant::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn controller<T, S>(
    source: &Arc<S>,
    auth: &Arc<dyn AuthService>,
    metrics: &Arc<MetricsRegistry>,
) -> Arc<RuleController<T>>
where
    T: RuleEntity,
    S: RuleProvider<T> + RulePublisher<T> + 'static,
{
    Arc::new(RuleController::new(
        Arc::new(InMemoryRuleRepository::<T>::new()),
        source.clone(),
        source.clone(),
        auth.clone(),
        metrics.clone(),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Received shutdown signal");
}
