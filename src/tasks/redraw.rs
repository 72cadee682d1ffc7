use std::{
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::Utc;
use tokio::{
    select,
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tracing::{error, info, instrument, trace};

use crate::{
    dashboard::Dashboard,
    heatmap::format_volume,
    structs::daily_volume::{group_by_day, DailyVolumeMap},
};

/// A line typed at the dashboard prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Notify,
    Oauth,
    Greet(String),
    History,
    Quit,
}

impl Input {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

        match command {
            "n" | "notify" => Some(Self::Notify),
            "o" | "oauth" => Some(Self::Oauth),
            "g" | "greet" if !rest.trim().is_empty() => Some(Self::Greet(rest.trim().to_owned())),
            "h" | "history" => Some(Self::History),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Where each redraw goes.
pub struct Output<W> {
    pub out: W,
    /// The heatmap is written here whenever it was repainted
    pub svg_path: Option<PathBuf>,
    written: Option<String>,
}

impl<W: Write> Output<W> {
    pub const fn new(out: W, svg_path: Option<PathBuf>) -> Self {
        Self {
            out,
            svg_path,
            written: None,
        }
    }

    fn print(&mut self, text: &str) {
        if let Err(err) = writeln!(self.out, "{text}").and_then(|()| self.out.flush()) {
            error!("Unable to write to output: {err}");
        }
    }

    fn write_svg(&mut self, svg: Option<&str>) {
        let Some(path) = self.svg_path.as_deref() else {
            return;
        };
        if svg == self.written.as_deref() {
            return;
        }

        match write_or_remove(path, svg) {
            Ok(()) => self.written = svg.map(str::to_owned),
            Err(err) => error!("Unable to write heatmap to {path:?}: {err}"),
        }
    }
}

fn write_or_remove(path: &Path, svg: Option<&str>) -> std::io::Result<()> {
    match svg {
        Some(svg) => std::fs::write(path, svg),
        None => match std::fs::remove_file(path) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        },
    }
}

fn redraw<W: Write>(dashboard: &mut Dashboard, output: &mut Output<W>) {
    let frame = dashboard.render(Utc::now());
    output.print(&frame.to_string());
    output.write_svg(dashboard.heatmap().svg());
}

fn history_lines(daily: &DailyVolumeMap) -> Vec<String> {
    let mut days: Vec<_> = daily.0.iter().collect();
    days.sort_by_key(|(day, _)| **day);

    days.into_iter()
        .map(|(day, volume)| format!("{day}: {}", format_volume(*volume)))
        .chain(std::iter::once(format!("Total: {}", format_volume(daily.total()))))
        .collect()
}

async fn handle<W: Write>(dashboard: &Dashboard, input: Input, output: &mut Output<W>) {
    trace!("Handling {input:?}");

    let result = match input {
        Input::Notify => dashboard.notify().await.map(|()| "Notification sent.".to_owned()),
        Input::Oauth => dashboard
            .start_oauth()
            .await
            .map(|()| "Continue signing in from your browser.".to_owned()),
        Input::Greet(name) => dashboard.greet(&name).await,
        // UTC days, the same ones the host groups the heatmap by
        Input::History => dashboard
            .history()
            .await
            .map(|history| history_lines(&group_by_day(&history, &Utc)).join("\n")),
        Input::Quit => return,
    };

    match result {
        Ok(text) => output.print(&text),
        Err(err) => {
            error!("{err}");
            output.print(&format!("Error: {err}"));
        }
    }
}

/// Redraws the dashboard whenever one of its resources changes, on every
/// `tick` so relative times stay fresh, and after each input. Returns once
/// `inputs` closes or a [`Input::Quit`] arrives, unmounting the dashboard.
#[instrument(skip_all)]
pub async fn redraw_task<W: Write>(
    mut dashboard: Dashboard,
    mut inputs: mpsc::Receiver<Input>,
    output: &mut Output<W>,
    tick: Duration,
) {
    let mut ticker = time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        redraw(&mut dashboard, output);

        select! {
            () = dashboard.changed() => {
                trace!("Dashboard state changed, redrawing");
            },
            _ = ticker.tick() => {},
            input = inputs.recv() => match input {
                None | Some(Input::Quit) => break,
                Some(input) => handle(&dashboard, input, output).await,
            },
        };
    }

    info!("Closing dashboard");
    dashboard.unmount();
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    use super::*;
    use crate::{
        commands::{self, CommandGateway},
        config::Config,
        error::GatewayError,
        events::EventBus,
    };

    struct Host;

    #[async_trait]
    impl CommandGateway for Host {
        async fn invoke(&self, command: &'static str, args: Value) -> Result<Value, GatewayError> {
            match command {
                commands::GREET => Ok(json!(format!("Hello, {}!", args["name"].as_str().unwrap()))),
                commands::CAN_SEND_NOTIFICATION => Ok(json!(true)),
                commands::LIST_DRINKS_GROUP_DAY => Ok(json!({})),
                // 2024-01-01T23:30:00Z, 2024-01-02T00:30:00Z
                commands::LIST_DRINKS => Ok(json!([
                    { "timestamp": 1_704_151_800, "amount": 200.0 },
                    { "timestamp": 1_704_155_400, "amount": 300.0 },
                ])),
                commands::CREATE_DRINK_NOTIFICATION => Err(GatewayError::Rejected {
                    command,
                    message: "notifications are disabled".to_owned(),
                }),
                _ => Ok(Value::Null),
            }
        }
    }

    #[test]
    fn parses_inputs() {
        assert_eq!(Input::parse("n"), Some(Input::Notify));
        assert_eq!(Input::parse(" history \n"), Some(Input::History));
        assert_eq!(Input::parse("g Angelo"), Some(Input::Greet("Angelo".to_owned())));
        assert_eq!(Input::parse("g"), None);
        assert_eq!(Input::parse("drink"), None);
    }

    #[test]
    fn history_is_listed_by_day() {
        let daily: DailyVolumeMap = [
            (NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), 250.0),
            (NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 1000.0),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            history_lines(&daily),
            ["2024-01-01: 1,000 mL", "2024-01-03: 250 mL", "Total: 1,250 mL"]
        );
    }

    #[tokio::test]
    async fn answers_inputs_until_quit() {
        let dashboard = Dashboard::mount(Arc::new(Host), Arc::new(EventBus::new()), &Config::default());
        let (sender, inputs) = mpsc::channel(4);
        sender.send(Input::Greet("Angelo".to_owned())).await.unwrap();
        sender.send(Input::Notify).await.unwrap();
        sender.send(Input::Quit).await.unwrap();

        let mut output = Output::new(Vec::new(), None);
        redraw_task(dashboard, inputs, &mut output, Duration::from_secs(60)).await;
        let printed = String::from_utf8(output.out).unwrap();

        assert!(printed.contains("🥛 Hydrate"));
        assert!(printed.contains("Hello, Angelo!"));
        assert!(printed.contains("Error: host rejected `create_drink_notification`"));
    }

    #[tokio::test]
    async fn history_uses_the_hosts_utc_days() {
        let dashboard = Dashboard::mount(Arc::new(Host), Arc::new(EventBus::new()), &Config::default());
        let (sender, inputs) = mpsc::channel(4);
        sender.send(Input::History).await.unwrap();
        sender.send(Input::Quit).await.unwrap();

        let mut output = Output::new(Vec::new(), None);
        redraw_task(dashboard, inputs, &mut output, Duration::from_secs(60)).await;
        let printed = String::from_utf8(output.out).unwrap();

        assert!(printed.contains("2024-01-01: 200 mL\n2024-01-02: 300 mL\nTotal: 500 mL"));
    }
}
