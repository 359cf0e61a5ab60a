//! ASCII price chart rendering.
//!
//! Closing prices are resampled onto `width` columns and scaled onto `height`
//! rows (min on the bottom row, max on the top row). Output is a pure function
//! of the series and the dimensions.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::{PriceSeries, UtcDateTime};

const POINT: char = '*';
const CONNECTOR: char = '|';
const FLAT: char = '-';
const BLANK: char = ' ';

/// Side annotation for a rendered grid; not part of the plotted rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartAxis {
    pub min_close: Decimal,
    pub max_close: Decimal,
    pub first_ts: UtcDateTime,
    pub last_ts: UtcDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedChart {
    /// Exactly `height` rows of exactly `width` characters, top row first.
    pub rows: Vec<String>,
    pub axis: ChartAxis,
    /// Set when the series was too short to plot a trend.
    pub warning: Option<String>,
}

impl RenderedChart {
    /// Grid with price labels on the right and the time axis underneath.
    pub fn framed_lines(&self, max_label: &str, min_label: &str) -> Vec<String> {
        let last = self.rows.len().saturating_sub(1);
        let mut lines: Vec<String> = self
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| match index {
                0 => format!("{row} {max_label}"),
                i if i == last => format!("{row} {min_label}"),
                _ => row.clone(),
            })
            .collect();

        let width = self.rows.first().map(|row| row.chars().count()).unwrap_or(0);
        let first = self.axis.first_ts.date().to_string();
        let last_date = self.axis.last_ts.date().to_string();
        let gap = width.saturating_sub(first.len() + last_date.len()).max(1);
        lines.push(format!("{first}{}{last_date}", " ".repeat(gap)));

        if let Some(warning) = &self.warning {
            lines.push(format!("! {warning}"));
        }
        lines
    }
}

/// Stateless renderer; dimensions are supplied per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartRenderer;

impl ChartRenderer {
    /// Renders `series` onto a `width` x `height` grid. Zero dimensions are
    /// clamped to one.
    pub fn render(&self, series: &PriceSeries, width: usize, height: usize) -> RenderedChart {
        let width = width.max(1);
        let height = height.max(1);

        let closes = series.closes();
        let columns = resample(&closes, width);

        let (min, max) = columns
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), value| {
                (lo.min(*value), hi.max(*value))
            });

        let mut grid = vec![vec![BLANK; width]; height];
        let warning = if closes.len() < 2 {
            Some(format!(
                "only {} data point(s) for {}; showing a flat line",
                closes.len(),
                series.symbol()
            ))
        } else {
            None
        };

        if warning.is_some() || max - min <= f64::EPSILON {
            let mid = (height - 1) / 2;
            grid[mid].fill(FLAT);
        } else {
            let span = max - min;
            let levels: Vec<usize> = columns
                .iter()
                .map(|value| (((value - min) / span) * (height - 1) as f64).round() as usize)
                .collect();

            for (col, level) in levels.iter().enumerate() {
                if col > 0 {
                    let previous = levels[col - 1];
                    let (low, high) = (previous.min(*level), previous.max(*level));
                    for between in (low + 1)..high {
                        grid[height - 1 - between][col] = CONNECTOR;
                    }
                }
                grid[height - 1 - level][col] = POINT;
            }
        }

        let (min_close, max_close) = series.bars().iter().fold(
            (series.first().close, series.first().close),
            |(lo, hi), bar| (lo.min(bar.close), hi.max(bar.close)),
        );

        RenderedChart {
            rows: grid.into_iter().map(|row| row.into_iter().collect()).collect(),
            axis: ChartAxis {
                min_close,
                max_close,
                first_ts: series.first().ts,
                last_ts: series.last().ts,
            },
            warning,
        }
    }
}

/// Evenly subsamples by index when longer than `width`; left-pads with the
/// first value when shorter.
fn resample(values: &[f64], width: usize) -> Vec<f64> {
    let len = values.len();
    if len == 0 {
        return vec![0.0; width];
    }

    if len < width {
        let mut padded = vec![values[0]; width - len];
        padded.extend_from_slice(values);
        return padded;
    }

    if width == 1 {
        return vec![values[len - 1]];
    }

    (0..width)
        .map(|col| values[col * (len - 1) / (width - 1)])
        .collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal::prelude::FromPrimitive;

    use super::*;
    use crate::{PriceBar, Symbol};

    fn series(closes: &[f64]) -> PriceSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(day, close)| {
                let close = Decimal::from_f64(*close).expect("finite close");
                PriceBar {
                    ts: UtcDateTime::from_unix_timestamp(1_704_067_200 + day as i64 * 86_400)
                        .expect("valid ts"),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 0,
                }
            })
            .collect();
        PriceSeries::new(Symbol::parse("TEST").expect("valid"), bars).expect("non-empty")
    }

    #[test]
    fn resample_subsamples_evenly_and_keeps_endpoints() {
        let values: Vec<f64> = (0..10).map(f64::from).collect();
        assert_eq!(resample(&values, 4), vec![0.0, 3.0, 6.0, 9.0]);
    }

    #[test]
    fn resample_left_pads_short_input() {
        assert_eq!(resample(&[5.0, 6.0], 4), vec![5.0, 5.0, 5.0, 6.0]);
    }

    #[test]
    fn rising_series_runs_bottom_left_to_top_right() {
        let chart = ChartRenderer.render(&series(&[1.0, 2.0, 3.0]), 3, 3);
        assert_eq!(chart.rows, vec!["  *", " * ", "*  "]);
        assert!(chart.warning.is_none());
    }

    #[test]
    fn steep_moves_are_joined_with_connectors() {
        let chart = ChartRenderer.render(&series(&[1.0, 5.0]), 2, 5);
        assert_eq!(chart.rows, vec![" *", " |", " |", " |", "* "]);
    }

    #[test]
    fn flat_series_renders_mid_line() {
        let chart = ChartRenderer.render(&series(&[7.0, 7.0, 7.0]), 4, 5);
        assert_eq!(chart.rows[2], "----");
        assert!(chart.rows.iter().enumerate().all(|(i, row)| i == 2 || row.trim().is_empty()));
        assert!(chart.warning.is_none());
    }

    #[test]
    fn single_point_renders_flat_line_with_warning() {
        let chart = ChartRenderer.render(&series(&[42.0]), 6, 4);
        assert_eq!(chart.rows.len(), 4);
        assert_eq!(chart.rows[1], "------");
        assert!(chart.warning.is_some());
    }

    #[test]
    fn zero_dimensions_are_clamped() {
        let chart = ChartRenderer.render(&series(&[1.0, 2.0]), 0, 0);
        assert_eq!(chart.rows.len(), 1);
        assert_eq!(chart.rows[0].chars().count(), 1);
    }

    #[test]
    fn framed_lines_attach_labels_and_dates() {
        let chart = ChartRenderer.render(&series(&[1.0, 2.0, 3.0]), 24, 3);
        let lines = chart.framed_lines("$3.00", "$1.00");
        assert!(lines[0].ends_with("$3.00"));
        assert!(lines[2].ends_with("$1.00"));
        assert!(lines[3].starts_with("2024-01-01"));
        assert!(lines[3].ends_with("2024-01-03"));
    }
}
