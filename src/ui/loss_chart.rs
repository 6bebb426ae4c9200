use crate::error::{Error, Result};
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::{
    Frame,
    style::{Color, Style},
    symbols::Marker,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
};
use std::time::Duration;

// Plot the loss of every epoch in a full-screen line chart until a key is pressed.
pub fn show(losses: &[f64]) -> Result<()> {
    if losses.is_empty() {
        return Ok(());
    }
    let points = loss_points(losses);

    let (_guard, mut terminal) = super::open_terminal()?;
    loop {
        terminal
            .draw(|f| draw(f, &points))
            .map_err(Error::Terminal)?;
        if event::poll(Duration::from_millis(120)).map_err(Error::Terminal)? {
            if let Event::Key(key) = event::read().map_err(Error::Terminal)? {
                if key.kind == KeyEventKind::Press {
                    break;
                }
            }
        }
    }
    terminal.show_cursor().map_err(Error::Terminal)?;
    Ok(())
}

fn loss_points(losses: &[f64]) -> Vec<(f64, f64)> {
    losses
        .iter()
        .enumerate()
        .map(|(epoch, &loss)| (epoch as f64, loss))
        .collect()
}

// Axis ranges that enclose every point. A flat curve still gets a non-empty y range.
fn bounds(points: &[(f64, f64)]) -> ([f64; 2], [f64; 2]) {
    let last_epoch = points.last().map_or(0.0, |&(epoch, _)| epoch).max(1.0);
    let (low, high) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), &(_, loss)| {
            (low.min(loss), high.max(loss))
        });
    let padding = ((high - low) * 0.05).max(1e-3);
    ([0.0, last_epoch], [(low - padding).max(0.0), high + padding])
}

fn draw(f: &mut Frame, points: &[(f64, f64)]) {
    let (x_bounds, y_bounds) = bounds(points);
    let dataset = Dataset::default()
        .name("loss")
        .marker(Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(points);

    let chart = Chart::new(vec![dataset])
        .block(
            Block::default()
                .title("Training Loss (press any key)")
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .title("Epochs")
                .bounds(x_bounds)
                .labels(axis_labels(x_bounds, 0)),
        )
        .y_axis(
            Axis::default()
                .title("Loss")
                .bounds(y_bounds)
                .labels(axis_labels(y_bounds, 4)),
        );
    f.render_widget(chart, f.size());
}

fn axis_labels([low, high]: [f64; 2], precision: usize) -> Vec<Span<'static>> {
    [low, (low + high) / 2.0, high]
        .into_iter()
        .map(|value| Span::raw(format!("{value:.precision$}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{Terminal, backend::TestBackend};

    #[test]
    fn bounds_enclose_the_curve() {
        let points = loss_points(&[0.25, 0.1, 0.05]);
        let ([x_low, x_high], [y_low, y_high]) = bounds(&points);
        assert_eq!((x_low, x_high), (0.0, 2.0));
        assert!(y_low <= 0.05 && y_high >= 0.25);
    }

    #[test]
    fn flat_curve_still_has_a_y_range() {
        let points = loss_points(&[0.3]);
        let ([_, x_high], [y_low, y_high]) = bounds(&points);
        assert_eq!(x_high, 1.0);
        assert!(y_low < 0.3 && y_high > 0.3);
    }

    #[test]
    fn renders_title_and_axis_names() {
        let points = loss_points(&[0.3, 0.2, 0.15, 0.12]);
        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();

        terminal.draw(|f| draw(f, &points)).unwrap();

        let rendered = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>();
        assert!(rendered.contains("Training Loss"));
        assert!(rendered.contains("Epochs"));
        assert!(rendered.contains("Loss"));
    }
}
