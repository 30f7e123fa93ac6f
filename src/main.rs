use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use linkvisor::cli::Cli;
use linkvisor::{
    AlertForwarder, LogWriter, Subscribe, Supervisor, WebhookNotifier, WsGateway,
    parse_credentials, wait_for_shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    let cli = Cli::parse();
    let cfg = cli.config();

    let credentials = parse_credentials(cli.tokens.as_deref(), cli.token.as_deref())
        .context("no usable account credentials configured (set TOKENS or TOKEN)")?;

    let notifier = WebhookNotifier::new(cli.webhook_url.clone(), cli.webhook_url_low.clone());
    if !notifier.is_configured(linkvisor::Channel::Critical) {
        warn!("WEBHOOK_URL not set, critical notifications are disabled");
    }
    let subs: Vec<Arc<dyn Subscribe>> = vec![
        Arc::new(LogWriter::new()),
        Arc::new(AlertForwarder::new(Arc::new(notifier))),
    ];

    info!(
        accounts = credentials.len(),
        mode = %cfg.mode,
        timeout_secs = cfg.connect_timeout.as_secs(),
        "starting supervisor"
    );
    let sup = Supervisor::builder(cfg)
        .with_gateway(Arc::new(WsGateway::new(cli.gateway_url.as_str())))
        .with_subscribers(subs)
        .initialize(credentials)?;

    sup.connect_all(true);

    let addr = cli.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind status server on {addr}"))?;

    let served = linkvisor::http::serve(listener, Arc::clone(&sup), async {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "failed to listen for shutdown signals");
            std::future::pending::<()>().await;
        }
    })
    .await;
    if let Err(e) = &served {
        error!(error = %e, "status server failed");
    }

    if let Err(e) = sup.shutdown().await {
        warn!(error = %e, label = e.as_label(), "shutdown incomplete");
    }
    info!("bye");

    served.context("status server failed")
}
