//! PNG charts of a run: forecast, residuals, decomposition and correlogram.
//!
//! Charts use the bar index as x coordinate, so session gaps do not leave
//! empty stretches; tick labels show the local bar time.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::info;

use crate::analysis::{Correlogram, Decomposition};
use crate::core::{Forecast, TimeSeries};
use crate::error::{AnalyzerError, Result};

type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;
type Panel<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

const WIDE: (u32, u32) = (1400, 700);
const TALL: (u32, u32) = (1200, 1000);
const HISTOGRAM_BINS: usize = 30;

/// Train and test values with the forecast and its interval band.
pub fn plot_forecast(
    path: &Path,
    train: &TimeSeries,
    test: &TimeSeries,
    forecast: &Forecast,
    title: &str,
) -> Result<()> {
    if train.is_empty() || forecast.is_empty() {
        return Err(AnalyzerError::EmptyData);
    }
    draw_forecast(path, train, test, forecast, title).map_err(plot_error)?;
    info!(path = %path.display(), "forecast chart saved");
    Ok(())
}

/// Residuals over time next to their histogram.
pub fn plot_residuals(path: &Path, residuals: &[f64], title: &str) -> Result<()> {
    if !residuals.iter().any(|r| r.is_finite()) {
        return Err(AnalyzerError::EmptyData);
    }
    draw_residuals(path, residuals, title).map_err(plot_error)?;
    info!(path = %path.display(), "residual chart saved");
    Ok(())
}

/// Observed, trend, seasonal and residual panels.
pub fn plot_decomposition(path: &Path, decomposition: &Decomposition, title: &str) -> Result<()> {
    if decomposition.observed.is_empty() {
        return Err(AnalyzerError::EmptyData);
    }
    draw_decomposition(path, decomposition, title).map_err(plot_error)?;
    info!(path = %path.display(), "decomposition chart saved");
    Ok(())
}

/// ACF and PACF stems with the confidence band.
pub fn plot_acf_pacf(path: &Path, correlogram: &Correlogram, title: &str) -> Result<()> {
    if correlogram.max_lag() == 0 {
        return Err(AnalyzerError::InsufficientData { needed: 2, got: 1 });
    }
    draw_acf_pacf(path, correlogram, title).map_err(plot_error)?;
    info!(path = %path.display(), "correlogram chart saved");
    Ok(())
}

fn plot_error(e: Box<dyn std::error::Error>) -> AnalyzerError {
    AnalyzerError::Plot(e.to_string())
}

/// Finite min and max of `values`, padded by 5%.
fn value_range<'a>(values: impl IntoIterator<Item = &'a f64>) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    let span = hi - lo;
    if span < 1e-12 {
        (lo - 1.0, hi + 1.0)
    } else {
        (lo - 0.05 * span, hi + 0.05 * span)
    }
}

fn indexed(values: &[f64], offset: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(move |(i, v)| (offset + i, *v))
}

fn draw_forecast(
    path: &Path,
    train: &TimeSeries,
    test: &TimeSeries,
    forecast: &Forecast,
    title: &str,
) -> DrawResult {
    let root = BitMapBackend::new(path, WIDE).into_drawing_area();
    root.fill(&WHITE)?;

    let n_train = train.len();
    let n = n_train + test.len().max(forecast.horizon());
    let labels: Vec<String> = train
        .local_timestamps()
        .iter()
        .chain(test.local_timestamps().iter())
        .map(|ts| ts.format("%m-%d %H:%M").to_string())
        .collect();
    let bounds = forecast
        .lower()
        .unwrap_or_default()
        .iter()
        .chain(forecast.upper().unwrap_or_default());
    let (lo, hi) = value_range(
        train
            .values()
            .iter()
            .chain(test.values())
            .chain(forecast.values())
            .chain(bounds),
    );

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0..n, lo..hi)?;
    chart
        .configure_mesh()
        .x_labels(8)
        .x_label_formatter(&|i| labels.get(*i).cloned().unwrap_or_default())
        .draw()?;

    if let (Some(lower), Some(upper)) = (forecast.lower(), forecast.upper()) {
        let band: Vec<(usize, f64)> = indexed(upper, n_train)
            .chain(indexed(lower, n_train).collect::<Vec<_>>().into_iter().rev())
            .collect();
        let level = forecast.level().unwrap_or(0.95) * 100.0;
        chart
            .draw_series(std::iter::once(Polygon::new(band, RED.mix(0.15))))?
            .label(format!("{:.0}% interval", level))
            .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], RED.mix(0.15).filled()));
    }
    chart
        .draw_series(LineSeries::new(indexed(train.values(), 0), &BLUE))?
        .label("Train")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
    chart
        .draw_series(LineSeries::new(indexed(test.values(), n_train), &GREEN))?
        .label("Test")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &GREEN));
    chart
        .draw_series(LineSeries::new(indexed(forecast.values(), n_train), &RED))?
        .label("Forecast")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

fn draw_residuals(path: &Path, residuals: &[f64], title: &str) -> DrawResult {
    let root = BitMapBackend::new(path, WIDE).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 24))?;
    let (left, right) = root.split_horizontally((WIDE.0 * 3 / 5) as i32);

    let (lo, hi) = value_range(residuals);
    let mut series = ChartBuilder::on(&left)
        .caption("Residuals", ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(0..residuals.len(), lo..hi)?;
    series.configure_mesh().draw()?;
    series.draw_series(LineSeries::new(indexed(residuals, 0), &BLUE))?;
    series.draw_series(LineSeries::new(
        [(0, 0.0), (residuals.len(), 0.0)],
        BLACK.mix(0.6),
    ))?;

    let counts = histogram(residuals, lo, hi, HISTOGRAM_BINS);
    let width = (hi - lo) / HISTOGRAM_BINS as f64;
    let top = counts.iter().copied().max().unwrap_or(1).max(1) as f64;
    let mut hist = ChartBuilder::on(&right)
        .caption("Distribution", ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(lo..hi, 0.0..top * 1.05)?;
    hist.configure_mesh().draw()?;
    hist.draw_series(counts.iter().enumerate().map(|(i, c)| {
        let x0 = lo + i as f64 * width;
        Rectangle::new([(x0, 0.0), (x0 + width, *c as f64)], BLUE.mix(0.6).filled())
    }))?;

    root.present()?;
    Ok(())
}

fn histogram(values: &[f64], lo: f64, hi: f64, bins: usize) -> Vec<usize> {
    let mut counts = vec![0; bins];
    let width = (hi - lo) / bins as f64;
    for v in values.iter().filter(|v| v.is_finite()) {
        let bin = (((v - lo) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    counts
}

fn draw_decomposition(path: &Path, decomposition: &Decomposition, title: &str) -> DrawResult {
    let root = BitMapBackend::new(path, TALL).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 24))?;
    let panels = root.split_evenly((4, 1));

    let parts: [(&str, &[f64], RGBColor); 4] = [
        ("Observed", &decomposition.observed, BLUE),
        ("Trend", &decomposition.trend, RED),
        ("Seasonal", &decomposition.seasonal, GREEN),
        ("Residual", &decomposition.resid, MAGENTA),
    ];
    for (panel, (name, values, color)) in panels.iter().zip(parts) {
        line_panel(panel, name, values, color)?;
    }
    root.present()?;
    Ok(())
}

fn line_panel(area: &Panel<'_>, caption: &str, values: &[f64], color: RGBColor) -> DrawResult {
    let (lo, hi) = value_range(values);
    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 16))
        .margin(5)
        .x_label_area_size(25)
        .y_label_area_size(60)
        .build_cartesian_2d(0..values.len().max(1), lo..hi)?;
    chart.configure_mesh().x_labels(10).y_labels(4).draw()?;
    chart.draw_series(LineSeries::new(indexed(values, 0), &color))?;
    Ok(())
}

fn draw_acf_pacf(path: &Path, correlogram: &Correlogram, title: &str) -> DrawResult {
    let root = BitMapBackend::new(path, TALL).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 24))?;
    let panels = root.split_evenly((2, 1));

    let parts = [
        ("Autocorrelation (ACF)", &correlogram.acf),
        ("Partial autocorrelation (PACF)", &correlogram.pacf),
    ];
    for (panel, (name, values)) in panels.iter().zip(parts) {
        stem_panel(panel, name, values, correlogram.confidence)?;
    }
    root.present()?;
    Ok(())
}

fn stem_panel(area: &Panel<'_>, caption: &str, values: &[f64], band: f64) -> DrawResult {
    let max_lag = values.len().saturating_sub(1) as f64;
    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5..max_lag + 0.5, -1.05..1.05)?;
    chart.configure_mesh().draw()?;

    if band.is_finite() {
        for level in [band, -band] {
            chart.draw_series(LineSeries::new(
                [(-0.5, level), (max_lag + 0.5, level)],
                RED.mix(0.5),
            ))?;
        }
    }
    chart.draw_series(
        values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(k, v)| PathElement::new(vec![(k as f64, 0.0), (k as f64, *v)], &BLUE)),
    )?;
    chart.draw_series(
        values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(k, v)| Circle::new((k as f64, *v), 3, BLUE.filled())),
    )?;
    Ok(())
}
