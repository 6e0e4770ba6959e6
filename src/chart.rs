//! Animated bar chart description, emitted as a plotly figure.
//!
//! Drawing happens in the browser. This module only decides what is drawn:
//! one frame per date, one bar per ticker, and a y axis that stays fixed
//! across every frame.

use crate::input::DATE_FORMAT;
use crate::table::PriceRow;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const DEFAULT_TITLE: &str = "Stock Value Progression Over Time";
pub const VALUE_LABEL: &str = "Stock Value (Adjusted Close)";

// plotly_white colorway
const COLORWAY: [&str; 10] = [
    "#636efa", "#EF553B", "#00cc96", "#ab63fa", "#FFA15A", "#19d3f3", "#FF6692", "#B6E880", "#FF97FF", "#FECB52",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartOptions {
    pub title: String,
    pub value_label: String,
    /// Multiplier applied to the largest value to get the axis top.
    pub headroom: f64,
    pub frame_duration_ms: u64,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            value_label: VALUE_LABEL.to_string(),
            headroom: 1.1,
            frame_duration_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub date: NaiveDate,
    /// One entry per ticker, in `ChartFigure::tickers` order.
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartFigure {
    pub title: String,
    pub value_label: String,
    pub tickers: Vec<String>,
    pub colors: Vec<String>,
    pub frames: Vec<Frame>,
    pub y_upper: f64,
    pub frame_duration_ms: u64,
}

impl ChartFigure {
    pub fn from_rows(rows: &[PriceRow], options: &ChartOptions) -> Self {
        let mut tickers: Vec<String> = Vec::new();
        for row in rows {
            if !tickers.contains(&row.ticker) {
                tickers.push(row.ticker.clone());
            }
        }

        let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
        for row in rows {
            let column = tickers.iter().position(|t| t == &row.ticker).unwrap_or_default();
            let values = by_date.entry(row.date).or_insert_with(|| vec![None; tickers.len()]);
            values[column] = Some(row.value);
        }

        let frames = by_date
            .into_iter()
            .map(|(date, values)| Frame { date, values })
            .collect();

        let colors = (0..tickers.len())
            .map(|i| COLORWAY[i % COLORWAY.len()].to_string())
            .collect();

        Self {
            title: options.title.clone(),
            value_label: options.value_label.clone(),
            tickers,
            colors,
            frames,
            y_upper: upper_bound(rows, options.headroom),
            frame_duration_ms: options.frame_duration_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn traces(&self, frame: Option<&Frame>) -> Vec<Value> {
        self.tickers
            .iter()
            .enumerate()
            .map(|(i, ticker)| {
                let value = frame.and_then(|f| f.values.get(i).copied().flatten());
                json!({
                    "type": "bar",
                    "name": ticker,
                    "legendgroup": ticker,
                    "x": [ticker],
                    "y": [value],
                    "marker": { "color": self.colors[i] },
                    "hovertemplate": "Ticker=%{x}<br>Value=%{y}<extra></extra>",
                })
            })
            .collect()
    }

    /// Figure JSON for `Plotly.newPlot`: `data`, `layout` and `frames`.
    pub fn to_plotly(&self) -> Value {
        let frame_names: Vec<String> = self
            .frames
            .iter()
            .map(|f| f.date.format(DATE_FORMAT).to_string())
            .collect();

        let frames: Vec<Value> = self
            .frames
            .iter()
            .zip(&frame_names)
            .map(|(frame, name)| json!({ "name": name, "data": self.traces(Some(frame)) }))
            .collect();

        let animate_args = |names: Value, duration: u64| {
            json!([names, {
                "mode": "immediate",
                "frame": { "duration": duration, "redraw": true },
                "transition": { "duration": 0 },
                "fromcurrent": true,
            }])
        };

        let steps: Vec<Value> = frame_names
            .iter()
            .map(|name| {
                json!({
                    "label": name,
                    "method": "animate",
                    "args": animate_args(json!([name]), 0),
                })
            })
            .collect();

        let layout = json!({
            "title": { "text": self.title },
            "template": "plotly_white",
            "paper_bgcolor": "white",
            "plot_bgcolor": "white",
            "barmode": "relative",
            "showlegend": true,
            "legend": { "title": { "text": "Ticker" } },
            "xaxis": {
                "title": { "text": "Ticker" },
                "categoryorder": "array",
                "categoryarray": self.tickers,
            },
            "yaxis": {
                "title": { "text": self.value_label },
                "range": [0.0, self.y_upper],
                "gridcolor": "#EBF0F8",
            },
            "updatemenus": [{
                "type": "buttons",
                "direction": "left",
                "showactive": false,
                "x": 0.1,
                "y": 0,
                "xanchor": "right",
                "yanchor": "top",
                "pad": { "r": 10, "t": 70 },
                "buttons": [
                    { "label": "&#9654;", "method": "animate", "args": animate_args(Value::Null, self.frame_duration_ms) },
                    { "label": "&#9724;", "method": "animate", "args": animate_args(json!([null]), 0) },
                ],
            }],
            "sliders": [{
                "active": 0,
                "x": 0.1,
                "len": 0.9,
                "y": 0,
                "yanchor": "top",
                "pad": { "b": 10, "t": 60 },
                "currentvalue": { "prefix": "Date=" },
                "steps": steps,
            }],
        });

        json!({
            "data": self.traces(self.frames.first()),
            "layout": layout,
            "frames": frames,
        })
    }
}

/// Fixed axis top for the whole animation: `headroom` times the largest
/// value over every frame, or zero with nothing to show.
pub fn upper_bound(rows: &[PriceRow], headroom: f64) -> f64 {
    let max = rows
        .iter()
        .map(|r| r.value)
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))));

    match max {
        Some(max) if max > 0.0 => max * headroom,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(d: u32, ticker: &str, value: f64) -> PriceRow {
        PriceRow {
            date: NaiveDate::from_ymd_opt(2020, 1, d).unwrap(),
            ticker: ticker.to_string(),
            value,
        }
    }

    fn sample_rows() -> Vec<PriceRow> {
        vec![
            row(2, "AAPL", 72.9),
            row(3, "AAPL", 72.2),
            row(2, "MSFT", 154.8),
            row(3, "MSFT", 160.0),
        ]
    }

    #[test]
    fn test_upper_bound_is_global_max_with_headroom() {
        let bound = upper_bound(&sample_rows(), 1.1);
        assert!((bound - 176.0).abs() < 1e-9);
    }

    #[test]
    fn test_upper_bound_empty_is_zero() {
        let bound = upper_bound(&[], 1.1);
        assert_eq!(bound, 0.0);
        assert!(!bound.is_nan());
    }

    #[test]
    fn test_one_frame_per_date() {
        let figure = ChartFigure::from_rows(&sample_rows(), &ChartOptions::default());

        assert_eq!(figure.tickers, vec!["AAPL".to_string(), "MSFT".to_string()]);
        assert_eq!(figure.frames.len(), 2);
        assert_eq!(figure.frames[0].values, vec![Some(72.9), Some(154.8)]);
        assert_eq!(figure.frames[1].values, vec![Some(72.2), Some(160.0)]);
        assert_eq!(figure.colors, vec!["#636efa".to_string(), "#EF553B".to_string()]);
    }

    #[test]
    fn test_plotly_figure_shape() {
        let figure = ChartFigure::from_rows(&sample_rows(), &ChartOptions::default());
        let plot = figure.to_plotly();

        assert_eq!(plot["data"].as_array().unwrap().len(), 2);
        assert_eq!(plot["frames"].as_array().unwrap().len(), 2);
        assert_eq!(plot["frames"][1]["name"], "2020-01-03");
        assert_eq!(plot["frames"][1]["data"][1]["y"][0], 160.0);
        assert_eq!(plot["layout"]["title"]["text"], DEFAULT_TITLE);
        assert_eq!(plot["layout"]["yaxis"]["title"]["text"], VALUE_LABEL);
        assert_eq!(plot["layout"]["yaxis"]["range"][0], 0.0);
        assert_eq!(plot["layout"]["sliders"][0]["steps"][0]["label"], "2020-01-02");
    }

    #[test]
    fn test_empty_figure() {
        let figure = ChartFigure::from_rows(&[], &ChartOptions::default());
        assert!(figure.is_empty());
        assert_eq!(figure.y_upper, 0.0);

        let plot = figure.to_plotly();
        assert!(plot["data"].as_array().unwrap().is_empty());
        assert_eq!(plot["layout"]["yaxis"]["range"][1], 0.0);
    }
}
