use pageanalytics::aggregate::{Aggregator, Subset, TopN, Views};
use pageanalytics::config::Config;
use pageanalytics::event::EvType;
use pageanalytics::http::{self, AppState};
use pageanalytics::ratelimit::RateLimiter;
use pageanalytics::runner::Runner;
use pageanalytics::writer;
use std::collections::HashMap;
use std::sync::Arc;

fn build_jobs() -> HashMap<String, Arc<dyn Aggregator>> {
    let mut jobs: HashMap<String, Arc<dyn Aggregator>> = HashMap::new();

    jobs.insert(
        "views".to_string(),
        Arc::new(Views {
            cutoff: 5,
            estimated_size: 4096,
            min_ev_time: 0,
        }),
    );
    jobs.insert(
        "top".to_string(),
        Arc::new(TopN {
            n: 10,
            min_ev_time: 0,
        }),
    );
    jobs.insert(
        "recent".to_string(),
        Arc::new(Subset {
            filter: Box::new(|e| e.ev_type == EvType::Load),
            limit: 1000,
        }),
    );

    jobs
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            log::error!(target: "pageanalytics", "bad configuration: {e}");
            std::process::exit(1);
        }
    };

    let writer_handle = writer::spawn(&config.events_file, config.block_size, config.block_size);

    let runner = Runner::new(
        std::path::PathBuf::from(&config.events_file),
        config.block_size,
        config.worker_pool_size,
        config.min_report_interval,
        build_jobs(),
        writer_handle.clone(),
    );
    runner.clone().spawn_run_loop();

    let state = Arc::new(AppState {
        writer: writer_handle,
        runner,
        rate_limiter: RateLimiter::new(config.rate_limit_rps, config.rate_limit_burst),
        started_at: std::time::Instant::now(),
    });
    let app = http::router(state);

    log::info!(target: "pageanalytics", "listening on {}", config.http_addr);

    let shutdown = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c().await.ok();
        };
        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
        log::info!(target: "pageanalytics", "shutdown signal received, draining");
    };

    if let Err(e) = axum::Server::bind(&config.http_addr)
        .serve(app.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await
    {
        log::error!(target: "pageanalytics", "server error: {e}");
        std::process::exit(1);
    }
}
