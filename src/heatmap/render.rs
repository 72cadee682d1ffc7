use std::{collections::HashMap, fmt::Write};

use chrono::{Datelike, Months, NaiveDate};
use tracing::{instrument, trace};

use super::{
    scale::ColorScale,
    series::{HeatmapDomain, HeatmapPoint},
    tooltip::format_tooltip,
};
use crate::error::RenderError;

/// Everything a painter needs for one full repaint.
#[derive(Debug, Clone, Copy)]
pub struct CalendarFrame<'a> {
    pub series: &'a [HeatmapPoint],
    pub domain: &'a HeatmapDomain,
    pub scale: &'a ColorScale,
}

/// A calendar heatmap drawing primitive.
pub trait CalendarPainter {
    /// Draws `frame`, replacing whatever was painted before. On error the
    /// previous drawing is left untouched.
    fn paint(&mut self, frame: &CalendarFrame<'_>) -> Result<(), RenderError>;

    fn clear(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Painted {
    /// The domain had no start, the target was cleared
    Skipped,
    Cells(usize),
}

/// Owns the paint target of one mounted heatmap.
#[derive(Debug, Default)]
pub struct HeatmapRenderer<P> {
    painter: P,
    paints: u64,
}

impl<P: CalendarPainter> HeatmapRenderer<P> {
    pub const fn new(painter: P) -> Self {
        Self { painter, paints: 0 }
    }

    #[instrument(skip_all, fields(points = series.len(), start = ?domain.start))]
    pub fn paint(
        &mut self,
        series: &[HeatmapPoint],
        domain: &HeatmapDomain,
        scale: &ColorScale,
    ) -> Result<Painted, RenderError> {
        if domain.is_degenerate() {
            trace!("Nothing to paint, clearing heatmap");
            self.painter.clear();
            return Ok(Painted::Skipped);
        }

        self.painter.paint(&CalendarFrame {
            series,
            domain,
            scale,
        })?;
        self.paints += 1;

        let cells = domain.months().into_iter().map(days_in_month).sum();
        Ok(Painted::Cells(cells))
    }

    pub fn clear(&mut self) {
        self.painter.clear();
    }

    pub const fn painter(&self) -> &P {
        &self.painter
    }

    /// How many paints went through so far.
    pub const fn paints(&self) -> u64 {
        self.paints
    }
}

fn days_in_month(first: NaiveDate) -> usize {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .map_or(0, |last| last.day() as usize)
}

const CELL: usize = 10;
const GUTTER: usize = 2;
const LABEL_HEIGHT: usize = 14;
const MONTH_GAP: usize = 8;

/// Paints the calendar as an SVG document: one block per month, one column
/// per week and one row per weekday, Sunday first.
#[derive(Debug, Default, Clone)]
pub struct SvgCalendar {
    svg: Option<String>,
}

impl SvgCalendar {
    pub fn svg(&self) -> Option<&str> {
        self.svg.as_deref()
    }
}

impl CalendarPainter for SvgCalendar {
    fn paint(&mut self, frame: &CalendarFrame<'_>) -> Result<(), RenderError> {
        let volumes: HashMap<NaiveDate, f64> = frame
            .series
            .iter()
            .map(|point| (point.day, point.volume))
            .collect();

        let step = CELL + GUTTER;
        let mut body = String::new();
        let mut x_offset = 0;

        for month in frame.domain.months() {
            let lead = month.weekday().num_days_from_sunday() as usize;
            let days = days_in_month(month);

            writeln!(
                body,
                r#"<text x="{x_offset}" y="10" class="month-label">{}</text>"#,
                month.format("%b %Y")
            )?;

            for (index, date) in month.iter_days().take(days).enumerate() {
                let slot = lead + index;
                let x = x_offset + (slot / 7) * step;
                let y = LABEL_HEIGHT + (slot % 7) * step;
                let volume = volumes.get(&date).copied().unwrap_or(0.0);

                writeln!(
                    body,
                    r#"<rect x="{x}" y="{y}" width="{CELL}" height="{CELL}" rx="2" fill="{}" data-date="{date}" data-value="{volume}"><title>{}</title></rect>"#,
                    frame.scale.color(volume),
                    format_tooltip(date, volume),
                )?;
            }

            x_offset += (lead + days).div_ceil(7) * step + MONTH_GAP;
        }

        let mut svg = String::new();
        write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" class="cal-heatmap" width="{}" height="{}">"#,
            x_offset.saturating_sub(MONTH_GAP),
            LABEL_HEIGHT + 7 * step,
        )?;
        svg.push('\n');
        svg.push_str(&body);
        svg.push_str("</svg>\n");

        self.svg = Some(svg);
        Ok(())
    }

    fn clear(&mut self) {
        self.svg = None;
    }
}
