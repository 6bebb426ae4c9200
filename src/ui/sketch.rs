use crate::canvas::{CANVAS_SIDE, Canvas};
use crate::error::{Error, Result};
use crate::mnist::shade;
use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};
use log::debug;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::Line,
    widgets::{Block, Borders, Paragraph},
};
use std::ops::Range;
use std::time::Duration;

#[derive(Debug, PartialEq)]
enum SketchAction {
    Continue,
    Submit,
    Abort,
}

// Open a full-screen canvas and let the user draw a digit with the left mouse button. Returns the
// canvas once the user presses Enter or q.
pub fn draw_digit() -> Result<Canvas> {
    let mut canvas = Canvas::new();
    let (_guard, mut terminal) = super::open_terminal()?;

    let mut drawing_area = Rect::default();
    loop {
        terminal
            .draw(|f| drawing_area = draw(f, &canvas))
            .map_err(Error::Terminal)?;
        if !event::poll(Duration::from_millis(50)).map_err(Error::Terminal)? {
            continue;
        }
        let event = event::read().map_err(Error::Terminal)?;
        match handle_event(event, drawing_area, &mut canvas) {
            SketchAction::Continue => {}
            SketchAction::Submit => break,
            SketchAction::Abort => return Err(Error::DrawingAborted),
        }
    }
    terminal.show_cursor().map_err(Error::Terminal)?;
    Ok(canvas)
}

fn handle_event(event: Event, drawing_area: Rect, canvas: &mut Canvas) -> SketchAction {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
            KeyCode::Enter | KeyCode::Char('q') => SketchAction::Submit,
            KeyCode::Esc => SketchAction::Abort,
            KeyCode::Char('c') => {
                canvas.clear();
                SketchAction::Continue
            }
            _ => SketchAction::Continue,
        },
        Event::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left) | MouseEventKind::Drag(MouseButton::Left),
            column,
            row,
            ..
        }) => {
            if let Some((x, y)) = cell_to_canvas(drawing_area, column, row) {
                debug!("painting at ({x}, {y})");
                canvas.paint(x, y);
            }
            SketchAction::Continue
        }
        _ => SketchAction::Continue,
    }
}

// Canvas coordinates under the centre of a terminal cell, or None outside the drawing area.
fn cell_to_canvas(area: Rect, column: u16, row: u16) -> Option<(usize, usize)> {
    if area.width == 0
        || area.height == 0
        || column < area.x
        || row < area.y
        || column >= area.x + area.width
        || row >= area.y + area.height
    {
        return None;
    }
    let centre = |offset: u16, extent: u16| {
        (2 * usize::from(offset) + 1) * CANVAS_SIDE / (2 * usize::from(extent))
    };
    Some((
        centre(column - area.x, area.width),
        centre(row - area.y, area.height),
    ))
}

// Canvas rows or columns covered by one terminal cell.
fn cell_span(offset: u16, extent: u16) -> Range<usize> {
    let extent = usize::from(extent);
    let offset = usize::from(offset);
    offset * CANVAS_SIDE / extent..((offset + 1) * CANVAS_SIDE).div_ceil(extent)
}

// Draws the canvas and the key help, and returns the screen area that maps onto the canvas.
fn draw(f: &mut Frame, canvas: &Canvas) -> Rect {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(f.size());

    // Terminal cells are about twice as tall as they are wide, so a square canvas is twice as many
    // columns as rows.
    let available = chunks[0];
    let height = available.height.min(available.width / 2);
    let outer = Rect::new(
        available.x + (available.width - height * 2) / 2,
        available.y + (available.height - height) / 2,
        height * 2,
        height,
    );
    let block = Block::default()
        .title("Draw a digit")
        .borders(Borders::ALL);
    let inner = block.inner(outer);

    let lines = (0..inner.height)
        .map(|row| {
            let rows = cell_span(row, inner.height);
            (0..inner.width)
                .map(|column| shade(canvas.peak(rows.clone(), cell_span(column, inner.width))))
                .collect::<String>()
        })
        .map(Line::from)
        .collect::<Vec<_>>();

    f.render_widget(Paragraph::new(lines).block(block), outer);
    f.render_widget(
        Paragraph::new("left mouse: draw   c: clear   enter/q: predict   esc: quit"),
        chunks[1],
    );
    inner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, KeyModifiers};
    use ratatui::{Terminal, backend::TestBackend};

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn cells_map_to_their_centres() {
        let area = Rect::new(10, 5, 28, 14);
        assert_eq!(cell_to_canvas(area, 10, 5), Some((5, 10)));
        assert_eq!(cell_to_canvas(area, 37, 18), Some((275, 270)));
        assert_eq!(cell_to_canvas(area, 9, 5), None);
        assert_eq!(cell_to_canvas(area, 38, 5), None);
        assert_eq!(cell_to_canvas(area, 10, 19), None);
        assert_eq!(cell_to_canvas(Rect::default(), 0, 0), None);
    }

    #[test]
    fn cell_spans_tile_the_canvas() {
        assert_eq!(cell_span(0, 28), 0..10);
        assert_eq!(cell_span(27, 28), 270..280);
        assert_eq!(cell_span(0, 3), 0..94);
        assert_eq!(cell_span(2, 3), 186..280);
    }

    #[test]
    fn dragging_paints_and_keys_control_the_session() {
        let area = Rect::new(0, 0, 28, 28);
        let mut canvas = Canvas::new();

        let action = handle_event(mouse(MouseEventKind::Moved, 14, 14), area, &mut canvas);
        assert_eq!(action, SketchAction::Continue);
        assert!(canvas.is_blank());

        handle_event(
            mouse(MouseEventKind::Drag(MouseButton::Left), 14, 14),
            area,
            &mut canvas,
        );
        assert_eq!(canvas.peak(145..146, 145..146), 1.0);

        handle_event(mouse(MouseEventKind::Down(MouseButton::Right), 3, 3), area, &mut canvas);
        assert_eq!(canvas.peak(35..36, 35..36), 0.0);

        assert_eq!(
            handle_event(key(KeyCode::Char('c')), area, &mut canvas),
            SketchAction::Continue
        );
        assert!(canvas.is_blank());
        assert_eq!(
            handle_event(key(KeyCode::Enter), area, &mut canvas),
            SketchAction::Submit
        );
        assert_eq!(
            handle_event(key(KeyCode::Esc), area, &mut canvas),
            SketchAction::Abort
        );
    }

    #[test]
    fn drawing_shows_ink_inside_the_returned_area() {
        let mut canvas = Canvas::new();
        canvas.paint(140, 140);
        let mut terminal = Terminal::new(TestBackend::new(40, 20)).unwrap();

        let mut area = Rect::default();
        terminal.draw(|f| area = draw(f, &canvas)).unwrap();

        assert!(area.width > 0 && area.height > 0);
        let buffer = terminal.backend().buffer();
        let inked = (area.y..area.y + area.height)
            .flat_map(|y| (area.x..area.x + area.width).map(move |x| (x, y)))
            .filter(|&(x, y)| buffer.get(x, y).symbol() == "█")
            .count();
        assert!(inked > 0);
    }
}
