use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use hydrate_dashboard::{
    config::{Config, PROJECT_IDENTIFIER},
    dashboard::Dashboard,
    events::EventBus,
    http::HttpGateway,
    logging,
    tasks::{
        event_pump::event_pump_task,
        redraw::{redraw_task, Input, Output},
    },
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::info;

const TICK: Duration = Duration::from_secs(30);

/// Shows how much you drink, live from a running Hydrate app.
///
/// Type `n` to get a drink notification, `o` to connect Google Fit,
/// `g <name>` to say hi, `h` for your history and `q` to quit.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Config file, defaults to `config.json` in the app's config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base url of the app's command bridge
    #[arg(short, long)]
    gateway: Option<String>,

    /// Write the heatmap as SVG to this file on every repaint
    #[arg(long)]
    svg_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let path = match args.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let mut config = Config::load(&path)?;
    if let Some(gateway) = args.gateway {
        config.gateway_url = gateway;
    }
    if let Some(svg_out) = args.svg_out {
        config.heatmap.svg_path = Some(svg_out);
    }

    let _guard = logging::init(&config);
    info!("Starting {PROJECT_IDENTIFIER} with config {path:?}");

    let gateway = HttpGateway::new(config.gateway_url().context("Unable to start dashboard")?);
    let bus = EventBus::new();

    tokio::spawn(event_pump_task(gateway.clone(), bus.clone()));

    let dashboard = Dashboard::mount(Arc::new(gateway), Arc::new(bus), &config);

    let (sender, inputs) = mpsc::channel(8);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match Input::parse(&line) {
                Some(input) => {
                    if sender.send(input).await.is_err() {
                        break;
                    }
                }
                None => eprintln!("Unknown command: {}", line.trim()),
            }
        }
    });

    let mut output = Output::new(std::io::stdout(), config.heatmap.svg_path.clone());
    redraw_task(dashboard, inputs, &mut output, TICK).await;

    Ok(())
}
