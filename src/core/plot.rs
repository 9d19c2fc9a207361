//! Pressure profile plots: shipboard cast as a line, platform samples as dots.

use crate::utils::error::{CtdError, Result};
use plotters::prelude::*;
use std::ops::Range;

const CAST_COLOR: RGBColor = RGBColor(0, 0, 255);
const PLATFORM_COLOR: RGBColor = RGBColor(255, 0, 0);
const TITLE_LINE_HEIGHT: u32 = 18;

#[derive(Debug, Clone, Default)]
pub struct ProfilePanel {
    pub label: String,
    pub units: String,
    /// (value, pressure) pairs
    pub cast: Vec<(f64, f64)>,
    pub platform: Vec<(f64, f64)>,
}

impl ProfilePanel {
    /// Pairs values with pressures by index; unequal lengths keep the common prefix.
    pub fn new(
        label: &str,
        units: &str,
        cast_values: &[f64],
        cast_pressure: &[f64],
        platform_values: &[f64],
        platform_pressure: &[f64],
    ) -> Self {
        Self {
            label: label.to_string(),
            units: units.to_string(),
            cast: pair(cast_values, cast_pressure),
            platform: pair(platform_values, platform_pressure),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfilePlot {
    pub title_lines: Vec<String>,
    pub pressure_units: String,
    pub cast_label: String,
    pub platform_label: String,
    pub panels: Vec<ProfilePanel>,
}

fn pair(values: &[f64], pressure: &[f64]) -> Vec<(f64, f64)> {
    values
        .iter()
        .zip(pressure)
        .filter(|(v, p)| v.is_finite() && p.is_finite())
        .map(|(v, p)| (*v, *p))
        .collect()
}

fn plot_err<E: std::fmt::Debug>(e: E) -> CtdError {
    CtdError::PlotError {
        message: format!("{:?}", e),
    }
}

/// Padded range over the given values; degenerate input still gives a drawable range.
fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    let pad = if max > min { (max - min) * 0.05 } else { 1.0 };
    (min - pad)..(max + pad)
}

/// Renders the plot as an SVG document. Pressure increases downwards.
pub fn render_svg(plot: &ProfilePlot, size: (u32, u32)) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;

        let title_height = TITLE_LINE_HEIGHT * (plot.title_lines.len() as u32 + 1);
        let (title_area, body) = root.split_vertically(title_height);
        let title_style = ("sans-serif", 14).into_font().color(&BLACK);
        for (i, line) in plot.title_lines.iter().enumerate() {
            title_area
                .draw_text(
                    line,
                    &title_style,
                    (10, (TITLE_LINE_HEIGHT as i32) * (i as i32) + 8),
                )
                .map_err(plot_err)?;
        }

        // shared pressure axis across panels
        let y_range = padded_range(
            plot.panels
                .iter()
                .flat_map(|p| p.cast.iter().chain(p.platform.iter()))
                .map(|(_, pressure)| -pressure),
        );

        let areas = body.split_evenly((1, plot.panels.len().max(1)));
        let last = plot.panels.len().saturating_sub(1);
        for (i, (panel, area)) in plot.panels.iter().zip(areas.iter()).enumerate() {
            let x_range = padded_range(
                panel
                    .cast
                    .iter()
                    .chain(panel.platform.iter())
                    .map(|(value, _)| *value),
            );

            let mut chart = ChartBuilder::on(area)
                .margin(12)
                .x_label_area_size(40)
                .y_label_area_size(if i == 0 { 60 } else { 30 })
                .build_cartesian_2d(x_range, y_range.clone())
                .map_err(plot_err)?;

            let x_desc = format!("{} ({})", panel.label, panel.units);
            let y_desc = format!("Pressure ({})", plot.pressure_units);
            let depth_label = |v: &f64| format!("{:.0}", -v);
            let mut mesh = chart.configure_mesh();
            mesh.x_desc(x_desc.as_str()).y_label_formatter(&depth_label);
            if i == 0 {
                mesh.y_desc(y_desc.as_str());
            }
            mesh.draw().map_err(plot_err)?;

            chart
                .draw_series(LineSeries::new(
                    panel.cast.iter().map(|(v, p)| (*v, -p)),
                    &CAST_COLOR,
                ))
                .map_err(plot_err)?
                .label(plot.cast_label.as_str())
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], CAST_COLOR));

            chart
                .draw_series(
                    panel
                        .platform
                        .iter()
                        .map(|(v, p)| Circle::new((*v, -p), 1, PLATFORM_COLOR.filled())),
                )
                .map_err(plot_err)?
                .label(plot.platform_label.as_str())
                .legend(|(x, y)| Circle::new((x + 10, y), 2, PLATFORM_COLOR.filled()));

            if i == last {
                chart
                    .configure_series_labels()
                    .background_style(WHITE.mix(0.8))
                    .border_style(BLACK)
                    .draw()
                    .map_err(plot_err)?;
            }
        }

        root.present().map_err(plot_err)?;
    }
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_drops_non_finite_and_extra_values() {
        let pairs = pair(&[1.0, f64::NAN, 3.0, 4.0], &[10.0, 20.0, 30.0]);
        assert_eq!(pairs, vec![(1.0, 10.0), (3.0, 30.0)]);
    }

    #[test]
    fn test_padded_range() {
        assert_eq!(padded_range(std::iter::empty()), 0.0..1.0);
        assert_eq!(padded_range([5.0].into_iter()), 4.0..6.0);
        let r = padded_range([0.0, 10.0].into_iter());
        assert_eq!(r, -0.5..10.5);
    }

    #[test]
    fn test_render_two_panels() {
        let plot = ProfilePlot {
            title_lines: vec!["CP02PMUO-WFP01-03-CTDPFK000 vs. Shipboard CTD".to_string()],
            pressure_units: "db".to_string(),
            cast_label: "Cruise CTD".to_string(),
            platform_label: "Profiler".to_string(),
            panels: vec![
                ProfilePanel::new("Conductivity", "S/m", &[3.5, 3.6], &[1.0, 2.0], &[3.55], &[1.5]),
                ProfilePanel::new("Temperature", "deg C", &[12.0, 11.0], &[1.0, 2.0], &[], &[]),
            ],
        };
        let svg = render_svg(&plot, (900, 600)).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Conductivity (S/m)"));
        assert!(svg.contains("Cruise CTD"));
    }
}
