//! The settings window: notification warning, drink status and heatmap.
//!
//! Each panel owns its resources and its [`Mount`], so unmounting the
//! dashboard (dropping it) tears down every subscription it made.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{error, instrument, trace};

use crate::{
    commands::{self, CommandGateway},
    config::Config,
    error::{GatewayError, RenderError},
    events::{EventSource, DRINK},
    facts::DrinkStatus,
    heatmap::{to_heatmap_series, ColorScale, HeatmapDomain, HeatmapRenderer, Painted, SvgCalendar},
    resource::{Resource, ResourceState, Snapshot},
    structs::{
        daily_volume::DailyVolumeMap,
        drink_point::{DrinkHistory, DrinkPoint},
    },
    subscription::Mount,
};

/// What one panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    /// First load still running
    Loading,
    Lines(Vec<String>),
    /// A failed load or a render error, caught at the panel
    Fallback(String),
}

impl Section {
    fn fallback(what: &'static str, err: &RenderError) -> Self {
        error!("Unable to render {what}: {err}");
        Self::Fallback(format!("Error: {err}"))
    }
}

/// Turns a failed resource into the error its panel renders.
fn load_error<T>(what: &'static str, snapshot: &Snapshot<T>) -> Option<RenderError> {
    snapshot.error().map(|err| RenderError::Load {
        what,
        message: err.to_string(),
    })
}

fn query<T, F, Fut>(
    name: &'static str,
    gateway: &Arc<dyn CommandGateway>,
    call: F,
) -> Resource<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(Arc<dyn CommandGateway>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<T, GatewayError>> + Send + 'static,
{
    let gateway = gateway.clone();
    Resource::new(name, move || call(gateway.clone()))
}

/// Advisory banner shown when the host can't deliver notifications.
pub struct NotificationWarning {
    can_notify: Resource<bool>,
}

impl NotificationWarning {
    pub const TITLE: &'static str = "Unable to send notifs";
    pub const BODY: &'static str =
        "Your OS settings might be interfering with the app's ability to send notifications.";

    pub fn mount(gateway: &Arc<dyn CommandGateway>) -> Self {
        Self {
            can_notify: query("can_send_notification", gateway, |gateway| async move {
                commands::can_send_notification(gateway.as_ref()).await
            }),
        }
    }

    pub const fn can_notify(&self) -> &Resource<bool> {
        &self.can_notify
    }

    /// Only shown once the host answered `false`; a failed query shows nothing.
    pub fn render(&self) -> Option<Vec<String>> {
        let snapshot = self.can_notify.snapshot();
        (!snapshot.loading && snapshot.value() == Some(&false))
            .then(|| vec![Self::TITLE.to_owned(), Self::BODY.to_owned()])
    }
}

/// Time since the last drink and when the next reminder comes.
pub struct StatusPanel {
    latest_drink: Resource<Option<DrinkPoint>>,
    notify_interval_secs: i64,
    mount: Mount,
}

impl StatusPanel {
    pub fn mount(
        gateway: &Arc<dyn CommandGateway>,
        events: Arc<dyn EventSource>,
        notify_interval_secs: i64,
    ) -> Self {
        let latest_drink = query("latest_drink", gateway, |gateway| async move {
            commands::get_latest_drink(gateway.as_ref()).await
        });

        let mount = Mount::new(events);
        mount.bind_refetch(DRINK, &latest_drink);

        Self {
            latest_drink,
            notify_interval_secs,
            mount,
        }
    }

    pub const fn latest_drink(&self) -> &Resource<Option<DrinkPoint>> {
        &self.latest_drink
    }

    pub fn render(&self, now: DateTime<Utc>) -> Section {
        let snapshot = self.latest_drink.snapshot();
        if let Some(err) = load_error("latest drink", &snapshot) {
            return Section::fallback("latest drink", &err);
        }

        match snapshot.state {
            ResourceState::Ready { value, .. } => Section::Lines(
                DrinkStatus::new(value.as_ref(), now, self.notify_interval_secs).lines(),
            ),
            _ => Section::Loading,
        }
    }

    pub fn unmount(&self) {
        self.mount.unmount();
    }
}

/// Calendar of how much was drank each day; repaints whenever the daily
/// volumes are re-fetched.
pub struct HeatmapPanel {
    daily_volumes: Resource<DailyVolumeMap>,
    changes: watch::Receiver<Snapshot<DailyVolumeMap>>,
    renderer: HeatmapRenderer<SvgCalendar>,
    range_months: u32,
    scale: ColorScale,
    last: Option<Section>,
    mount: Mount,
}

impl HeatmapPanel {
    pub const EMPTY: &'static str = "No drinks logged yet.";

    pub fn mount(
        gateway: &Arc<dyn CommandGateway>,
        events: Arc<dyn EventSource>,
        range_months: u32,
        scale: ColorScale,
    ) -> Self {
        let daily_volumes = query("daily_volumes", gateway, |gateway| async move {
            commands::list_drinks_group_day(gateway.as_ref()).await
        });
        let changes = daily_volumes.subscribe();

        let mount = Mount::new(events);
        mount.bind_refetch(DRINK, &daily_volumes);

        Self {
            daily_volumes,
            changes,
            renderer: HeatmapRenderer::new(SvgCalendar::default()),
            range_months,
            scale,
            last: None,
            mount,
        }
    }

    pub const fn daily_volumes(&self) -> &Resource<DailyVolumeMap> {
        &self.daily_volumes
    }

    /// Repaints if the daily volumes changed since the last render.
    #[instrument(skip(self))]
    pub fn render(&mut self) -> Section {
        let changed = self.changes.has_changed().unwrap_or(false);
        if let (false, Some(last)) = (changed, &self.last) {
            return last.clone();
        }

        let snapshot = self.changes.borrow_and_update().clone();
        let section = self.paint(&snapshot);
        self.last = Some(section.clone());
        section
    }

    fn paint(&mut self, snapshot: &Snapshot<DailyVolumeMap>) -> Section {
        if let Some(err) = load_error("daily volumes", snapshot) {
            self.renderer.clear();
            return Section::fallback("heatmap", &err);
        }
        let Some(daily) = snapshot.value() else {
            return Section::Loading;
        };

        let series = to_heatmap_series(daily);
        let domain = HeatmapDomain::from_series(&series, self.range_months);
        trace!("Repainting heatmap with {} days", series.len());

        match self.renderer.paint(&series, &domain, &self.scale) {
            Ok(Painted::Skipped) => Section::Lines(vec![Self::EMPTY.to_owned()]),
            Ok(Painted::Cells(cells)) => Section::Lines(vec![format!(
                "{} days with drinks, {cells} days shown.",
                series.len()
            )]),
            Err(err) => Section::fallback("heatmap", &err),
        }
    }

    pub fn svg(&self) -> Option<&str> {
        self.renderer.painter().svg()
    }

    pub const fn paints(&self) -> u64 {
        self.renderer.paints()
    }

    pub fn unmount(&self) {
        self.mount.unmount();
    }
}

/// One rendered pass of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardFrame {
    pub warning: Option<Vec<String>>,
    pub status: Section,
    pub heatmap: Section,
}

impl fmt::Display for DashboardFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "🥛 Hydrate")?;

        if let Some(warning) = &self.warning {
            for line in warning {
                writeln!(f, "⚠ {line}")?;
            }
        }

        for section in [&self.status, &self.heatmap] {
            match section {
                Section::Loading => writeln!(f, "Loading...")?,
                Section::Lines(lines) => {
                    for line in lines {
                        writeln!(f, "{line}")?;
                    }
                }
                Section::Fallback(message) => writeln!(f, "{message}")?,
            }
        }

        Ok(())
    }
}

pub struct Dashboard {
    gateway: Arc<dyn CommandGateway>,
    warning: NotificationWarning,
    status: StatusPanel,
    heatmap: HeatmapPanel,
    changes: (
        watch::Receiver<Snapshot<bool>>,
        watch::Receiver<Snapshot<Option<DrinkPoint>>>,
        watch::Receiver<Snapshot<DailyVolumeMap>>,
    ),
}

impl Dashboard {
    /// Mounts every panel; must be called inside a Tokio runtime.
    pub fn mount(
        gateway: Arc<dyn CommandGateway>,
        events: Arc<dyn EventSource>,
        config: &Config,
    ) -> Self {
        let warning = NotificationWarning::mount(&gateway);
        let status = StatusPanel::mount(&gateway, events.clone(), config.notify_interval_secs);
        let heatmap = HeatmapPanel::mount(
            &gateway,
            events,
            config.heatmap.range_months,
            config.heatmap.color,
        );
        let changes = (
            warning.can_notify.subscribe(),
            status.latest_drink.subscribe(),
            heatmap.daily_volumes.subscribe(),
        );

        Self {
            gateway,
            warning,
            status,
            heatmap,
            changes,
        }
    }

    pub fn render(&mut self, now: DateTime<Utc>) -> DashboardFrame {
        DashboardFrame {
            warning: self.warning.render(),
            status: self.status.render(now),
            heatmap: self.heatmap.render(),
        }
    }

    pub const fn warning(&self) -> &NotificationWarning {
        &self.warning
    }

    pub const fn status(&self) -> &StatusPanel {
        &self.status
    }

    pub const fn heatmap(&self) -> &HeatmapPanel {
        &self.heatmap
    }

    /// Resolves on the next state change of any panel's resource that
    /// happened since the previous call.
    pub async fn changed(&mut self) {
        let (warning, status, heatmap) = &mut self.changes;

        tokio::select! {
            _ = warning.changed() => {},
            _ = status.changed() => {},
            _ = heatmap.changed() => {},
        }
    }

    /// Asks the host to show the "time to drink" notification right away.
    pub async fn notify(&self) -> Result<(), GatewayError> {
        commands::create_drink_notification(self.gateway.as_ref()).await
    }

    pub async fn start_oauth(&self) -> Result<(), GatewayError> {
        commands::start_oauth_authentication(self.gateway.as_ref()).await
    }

    pub async fn greet(&self, name: &str) -> Result<String, GatewayError> {
        commands::greet(self.gateway.as_ref(), name).await
    }

    pub async fn history(&self) -> Result<DrinkHistory, GatewayError> {
        commands::list_drinks(self.gateway.as_ref()).await
    }

    pub fn unmount(&self) {
        trace!("Unmounting dashboard");
        self.status.unmount();
        self.heatmap.unmount();
    }
}
