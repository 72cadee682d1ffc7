//! Calendar heatmap of daily water intake.
//!
//! [`series`] shapes a [`DailyVolumeMap`](crate::structs::daily_volume::DailyVolumeMap)
//! into an ordered point series and its time window, [`scale`] maps volumes
//! to colors, [`tooltip`] formats cell labels and [`render`] paints it all.

pub mod render;
pub mod scale;
pub mod series;
pub mod tooltip;

pub use render::{CalendarFrame, CalendarPainter, HeatmapRenderer, Painted, SvgCalendar};
pub use scale::{ColorScale, Palette, Rgb};
pub use series::{to_heatmap_series, HeatmapDomain, HeatmapPoint};
pub use tooltip::{format_tooltip, format_volume};
