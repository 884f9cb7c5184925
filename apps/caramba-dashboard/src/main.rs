use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use caramba_dashboard::api::PanelApi;
use caramba_dashboard::config::{DashboardConfig, normalize_panel_url};
use caramba_dashboard::console;
use caramba_dashboard::surface::TerminalSurface;
use caramba_dashboard::transport::{HttpBackend, Transport};
use caramba_dashboard::{Dashboard, DashboardOptions};

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal dashboard for Caramba panel inbounds and clients", long_about = None)]
struct Args {
    /// Panel URL (e.g. https://panel.example.com)
    #[arg(short, long, env = "PANEL_URL")]
    panel_url: Option<String>,

    /// Panel API token
    #[arg(short, long, env = "PANEL_TOKEN")]
    token: Option<String>,

    /// Config path (default: /etc/caramba/dashboard.toml, then ./dashboard.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between live stats refreshes
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Origin for subscription links
    #[arg(long, env = "PUBLIC_ORIGIN")]
    public_origin: Option<String>,

    /// Also write logs to this file
    #[arg(long, env = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<DashboardConfig> {
    let mut config = match (DashboardConfig::load(args.config.as_deref()), &args.panel_url) {
        (Ok(config), _) => config,
        (Err(_), Some(url)) if args.config.is_none() => DashboardConfig::from_lookup(|key| match key {
            "PANEL_URL" => Some(url.clone()),
            other => std::env::var(other).ok(),
        })?,
        (Err(e), _) => return Err(e),
    };

    if let Some(url) = &args.panel_url {
        config.panel_url = normalize_panel_url(url);
    }
    if let Some(token) = &args.token {
        config.auth_token = Some(token.clone());
    }
    if let Some(secs) = args.poll_interval {
        config.poll_interval_secs = secs;
    }
    if let Some(origin) = &args.public_origin {
        config.public_origin = Some(origin.clone());
    }
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    // Initialize tracing
    let (file_layer, _guard) = match &args.log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path.file_name().context("log file path has no file name")?;
            let appender = tracing_appender::rolling::never(dir.unwrap_or(Path::new(".")), name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (
                Some(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caramba_dashboard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();

    let config = load_config(&args)?;
    tracing::info!("Dashboard starting...");
    tracing::info!("Panel URL: {}", config.panel_url);
    tracing::info!("Poll interval: {:?}", config.poll_interval());

    let backend = HttpBackend::new(
        config.panel_url.clone(),
        config.auth_token.clone(),
        config.request_timeout(),
    )
    .context("Failed to build HTTP client")?;
    let api = PanelApi::new(Transport::new(Arc::new(backend)));

    let input = console::spawn_stdin_pump();
    let surface = TerminalSurface::new(input.clone());
    let mut dashboard = Dashboard::new(
        api,
        surface,
        DashboardOptions {
            poll_period: config.poll_interval(),
            public_origin: config.origin(),
        },
    );

    console::run(&mut dashboard, input).await;
    tracing::info!("Dashboard stopped");
    Ok(())
}
