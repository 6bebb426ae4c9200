use crate::mnist::IMAGE_SIDE;
use ndarray::{Array2, s};

pub const CANVAS_SIDE: usize = 280;
pub const BRUSH_RADIUS: usize = 5;
const INK: f64 = 255.0;

// A square drawing surface ten times the resolution of an MNIST digit. Values are greyscale
// intensities from 0 (background) to 255 (ink), indexed [y, x].
#[derive(Clone)]
pub struct Canvas {
    pixels: Array2<f64>,
}

impl Canvas {
    pub fn new() -> Canvas {
        Canvas {
            pixels: Array2::zeros((CANVAS_SIDE, CANVAS_SIDE)),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|&value| value == 0.0)
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0.0);
    }

    // Stamp a square brush centred on (x, y). The parts of the brush that fall off the canvas are
    // dropped, including when the centre itself is off the canvas.
    pub fn paint(&mut self, x: usize, y: usize) {
        let rows =
            y.saturating_sub(BRUSH_RADIUS)..y.saturating_add(BRUSH_RADIUS + 1).min(CANVAS_SIDE);
        let columns =
            x.saturating_sub(BRUSH_RADIUS)..x.saturating_add(BRUSH_RADIUS + 1).min(CANVAS_SIDE);
        for row in rows {
            for column in columns.clone() {
                self.pixels[(row, column)] = INK;
            }
        }
    }

    // Shrink the canvas to side x side by averaging equal square blocks, then flatten it row by row
    // into a [side^2 x 1] column scaled to [0, 1], which is what the network takes as input. The
    // side must divide the canvas evenly; every caller passes the MNIST image side.
    fn downsample(&self, side: usize) -> Array2<f64> {
        let block = CANVAS_SIDE / side;
        Array2::from_shape_fn((side * side, 1), |(index, _)| {
            let (row, column) = (index / side, index % side);
            self.pixels
                .slice(s![
                    row * block..(row + 1) * block,
                    column * block..(column + 1) * block
                ])
                .mean()
                .unwrap_or(0.0)
                / INK
        })
    }

    // The canvas as a 784-pixel network input.
    pub fn to_input(&self) -> Array2<f64> {
        self.downsample(IMAGE_SIDE)
    }

    // Largest intensity in the given block of rows and columns, used to shade a terminal cell.
    pub fn peak(&self, rows: std::ops::Range<usize>, columns: std::ops::Range<usize>) -> f64 {
        let rows = rows.start.min(CANVAS_SIDE)..rows.end.min(CANVAS_SIDE);
        let columns = columns.start.min(CANVAS_SIDE)..columns.end.min(CANVAS_SIDE);
        self.pixels
            .slice(s![rows, columns])
            .fold(0.0, |peak: f64, &value| peak.max(value))
            / INK
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Canvas::new()
    }
}
