//! Terminal rendering of aggregated results.
//!
//! Uses Ratatui widgets drawn onto an off-screen buffer, so the output can be
//! printed like any other text. Enable with the `visualization` feature flag
//! (on by default).
//!
//! Layout:
//! - Comparison table (last-iteration means per strategy)
//! - One sparkline per metric and strategy
//! - Trust separation line
//! - Final server load bar charts
//!
//! A disabled plotter renders only the table.

use crate::error::SimError;
use crate::runner::Comparison;

use tracing::info;

#[cfg(feature = "visualization")]
use trustiot_core::MetricKind;

#[cfg(feature = "visualization")]
use ratatui::{
    backend::TestBackend,
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{BarChart, Block, Borders, Paragraph, Row, Sparkline, Table},
    Frame, Terminal,
};

/// Column width for one strategy's sparkline (borders excluded).
#[cfg(feature = "visualization")]
const MIN_SPARK_WIDTH: usize = 30;

/// Rows taken by the load bar charts, borders and labels included.
#[cfg(feature = "visualization")]
const LOAD_CHART_HEIGHT: u16 = 10;

/// Renders a `Comparison` for the terminal.
pub struct TerminalPlotter {
    /// Whether trend plots are rendered
    enabled: bool,
}

impl TerminalPlotter {
    /// Creates a plotter with trend plots enabled.
    #[cfg(feature = "visualization")]
    pub fn new() -> Self {
        Self { enabled: true }
    }
    
    /// Plots are compiled out; falls back to the logged summary.
    #[cfg(not(feature = "visualization"))]
    pub fn new() -> Self {
        info!("Terminal plots not available (compile with --features visualization)");
        Self::disabled()
    }
    
    /// Creates a plotter that only renders the comparison table.
    pub fn disabled() -> Self {
        Self { enabled: false }
    }
    
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
    
    /// Logs last-iteration means of the summary metrics, one line per strategy.
    pub fn log_summary(&self, comparison: &Comparison) {
        for result in &comparison.results {
            let row = result.summary();
            info!(
                "{:<16} utility={:.4} load_std={:.4} completion={:.2}% adherence={:.2}% malicious={:.2}%",
                result.strategy.label(),
                row.avg_device_utility,
                row.server_load_std_dev,
                row.completion_ratio * 100.0,
                row.deadline_adherence * 100.0,
                row.malicious_acceptance * 100.0
            );
        }
    }
    
    /// Draws the table, and the trend and load plots when enabled.
    #[cfg(feature = "visualization")]
    pub fn render(&self, comparison: &Comparison) -> Result<String, SimError> {
        let width = frame_width(comparison);
        let height = frame_height(comparison, self.enabled);
        
        let mut terminal = Terminal::new(TestBackend::new(width, height)).map_err(render_error)?;
        terminal
            .draw(|f| self.ui(f, comparison))
            .map_err(render_error)?;
        
        Ok(buffer_text(terminal.backend().buffer()))
    }
    
    /// Nothing to draw without the `visualization` feature.
    #[cfg(not(feature = "visualization"))]
    pub fn render(&self, _comparison: &Comparison) -> Result<String, SimError> {
        Ok(String::new())
    }
    
    #[cfg(feature = "visualization")]
    fn ui(&self, f: &mut Frame, comparison: &Comparison) {
        let strategies = comparison.results.len();
        let metrics = MetricKind::all();
        
        let mut constraints = vec![Constraint::Length(table_height(comparison))];
        if self.enabled {
            constraints.extend(metrics.iter().map(|_| Constraint::Length(3)));
            constraints.push(Constraint::Length(3));
            constraints.push(Constraint::Length(LOAD_CHART_HEIGHT));
        }
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(f.area());
        
        f.render_widget(summary_table(comparison), chunks[0]);
        if !self.enabled || strategies == 0 {
            return;
        }
        
        // === METRIC TRENDS ===
        for (i, kind) in metrics.iter().enumerate() {
            let columns = split_columns(chunks[1 + i], strategies);
            for (result, area) in comparison.results.iter().zip(columns.iter()) {
                let means: Vec<f64> = result.series(*kind).iter().map(|s| s.mean).collect();
                let title = match (means.first(), means.last()) {
                    (Some(first), Some(last)) => {
                        format!("{} · {}: {:.3} → {:.3}", kind.name(), result.strategy.name(), first, last)
                    }
                    _ => format!("{} · {}", kind.name(), result.strategy.name()),
                };
                let data = spark_levels(&means);
                let sparkline = Sparkline::default()
                    .block(Block::default().title(title).borders(Borders::ALL))
                    .data(&data)
                    .max(SPARK_LEVELS)
                    .style(Style::default().fg(Color::Cyan));
                f.render_widget(sparkline, *area);
            }
        }
        
        // === TRUST SEPARATION ===
        let separation: Vec<String> = comparison
            .results
            .iter()
            .map(|result| {
                let row = result.summary();
                format!("{} {:+.3}", result.strategy.label(), row.avg_trust_honest - row.avg_trust_malicious)
            })
            .collect();
        let trust = Paragraph::new(separation.join("  |  ")).block(
            Block::default()
                .title("Trust separation (honest - malicious, last iteration)")
                .borders(Borders::ALL),
        );
        f.render_widget(trust, chunks[1 + metrics.len()]);
        
        // === FINAL SERVER LOAD ===
        let columns = split_columns(chunks[2 + metrics.len()], strategies);
        for (result, area) in comparison.results.iter().zip(columns.iter()) {
            let bars: Vec<(&str, u64)> = result
                .final_loads
                .iter()
                .map(|load| (load.server.as_str(), (load.mean_load.clamp(0.0, 1.0) * 100.0).round() as u64))
                .collect();
            let bar_width = result
                .final_loads
                .iter()
                .map(|load| load.server.as_str().chars().count())
                .max()
                .unwrap_or(4)
                .clamp(4, 12) as u16;
            let chart = BarChart::default()
                .block(
                    Block::default()
                        .title(format!("Final server load %: {}", result.strategy.label()))
                        .borders(Borders::ALL),
                )
                .data(bars.as_slice())
                .bar_width(bar_width)
                .bar_gap(1)
                .max(100)
                .bar_style(Style::default().fg(Color::Green));
            f.render_widget(chart, *area);
        }
    }
}

impl Default for TerminalPlotter {
    fn default() -> Self {
        Self::new()
    }
}

/// Sparkline heights run 1..=SPARK_LEVELS so the minimum stays visible.
#[cfg(feature = "visualization")]
const SPARK_LEVELS: u64 = 8;

/// Scales a series to its own min/max. A flat series sits mid-height.
#[cfg(feature = "visualization")]
fn spark_levels(values: &[f64]) -> Vec<u64> {
    let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let span = hi - lo;
    
    values
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                SPARK_LEVELS / 2
            } else {
                1 + ((v - lo) / span * (SPARK_LEVELS - 1) as f64).round() as u64
            }
        })
        .collect()
}

#[cfg(feature = "visualization")]
fn summary_table(comparison: &Comparison) -> Table<'static> {
    let columns = MetricKind::summary();
    
    let mut header_cells = vec![Span::styled("Strategy", Style::default().add_modifier(Modifier::BOLD))];
    header_cells.extend(
        columns
            .iter()
            .map(|kind| Span::styled(kind.label(), Style::default().add_modifier(Modifier::BOLD))),
    );
    let header = Row::new(header_cells).height(1);
    
    let rows: Vec<Row> = comparison
        .results
        .iter()
        .map(|result| {
            let row = result.summary();
            let mut cells = vec![result.strategy.label().to_string()];
            cells.extend(columns.iter().map(|kind| {
                let value = row.get(*kind);
                if kind.is_percentage() {
                    format!("{:.2}%", value * 100.0)
                } else {
                    format!("{:.4}", value)
                }
            }));
            Row::new(cells)
        })
        .collect();
    
    Table::new(rows, table_widths())
        .header(header)
        .block(Block::default().title("Final iteration (mean over runs)").borders(Borders::ALL))
}

#[cfg(feature = "visualization")]
fn table_widths() -> Vec<Constraint> {
    let mut widths = vec![Constraint::Length(16)];
    widths.extend(
        MetricKind::summary()
            .iter()
            .map(|kind| Constraint::Length(kind.label().chars().count() as u16)),
    );
    widths
}

#[cfg(feature = "visualization")]
fn table_height(comparison: &Comparison) -> u16 {
    // header + rows + borders
    comparison.results.len() as u16 + 3
}

#[cfg(feature = "visualization")]
fn frame_width(comparison: &Comparison) -> u16 {
    let table: usize = 16
        + MetricKind::summary()
            .iter()
            .map(|kind| kind.label().chars().count() + 1)
            .sum::<usize>()
        + 2;
    let spark = comparison.results.len() * (comparison.num_iterations.max(MIN_SPARK_WIDTH) + 2);
    table.max(spark).min(u16::MAX as usize) as u16
}

#[cfg(feature = "visualization")]
fn frame_height(comparison: &Comparison, enabled: bool) -> u16 {
    let mut height = table_height(comparison);
    if enabled {
        height += MetricKind::all().len() as u16 * 3 + 3 + LOAD_CHART_HEIGHT;
    }
    height
}

#[cfg(feature = "visualization")]
fn split_columns(area: Rect, count: usize) -> Vec<Rect> {
    let constraints: Vec<Constraint> = (0..count).map(|_| Constraint::Ratio(1, count as u32)).collect();
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area)
        .to_vec()
}

/// Buffer contents as text lines, trailing blanks trimmed.
#[cfg(feature = "visualization")]
fn buffer_text(buffer: &Buffer) -> String {
    let width = buffer.area.width.max(1) as usize;
    buffer
        .content
        .chunks(width)
        .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>().trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(feature = "visualization")]
fn render_error(e: std::io::Error) -> SimError {
    SimError::Render(e.to_string())
}
