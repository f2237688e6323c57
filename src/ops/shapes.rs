// ============================================================================
// SHAPE RASTERIZATION: grid-cell primitives for the line/rect/circle tools
// ============================================================================
//
// Everything here is pure integer/cell math: two grid points in, a finite
// sequence of cells out. Cells may fall outside the grid (a shape dragged to
// the edge); the raster buffer ignores those when painting.

/// A grid cell coordinate `(x, y)`.
pub type Cell = (i32, i32);

/// Zero-radius replacement for degenerate (one cell thick) ellipses.
const ELLIPSE_EPSILON: f64 = 1e-9;

/// Shape tools that rasterize from a start cell to an end cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Line,
    Rectangle,
    Ellipse,
}

impl ShapeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ShapeKind::Line => "line",
            ShapeKind::Rectangle => "rect",
            ShapeKind::Ellipse => "circle",
        }
    }

    /// Rasterize this shape between `p1` and `p2`.
    pub fn cells(&self, p1: Cell, p2: Cell) -> Vec<Cell> {
        match self {
            ShapeKind::Line => line(p1, p2),
            ShapeKind::Rectangle => rect(p1, p2).collect(),
            ShapeKind::Ellipse => ellipse(p1, p2),
        }
    }
}

// ============================================================================
// LINE
// ============================================================================

/// Raw Bresenham walk from `p0` to `p1`, both inclusive.
///
/// The cell set depends on direction when the error term ties; use [`line`]
/// for a direction-independent result.
pub struct Bresenham {
    x: i32,
    y: i32,
    x1: i32,
    y1: i32,
    dx: i32,
    dy: i32,
    sx: i32,
    sy: i32,
    err: i32,
    done: bool,
}

impl Bresenham {
    pub fn new(p0: Cell, p1: Cell) -> Self {
        let dx = (p1.0 - p0.0).abs();
        let dy = -(p1.1 - p0.1).abs();
        Self {
            x: p0.0,
            y: p0.1,
            x1: p1.0,
            y1: p1.1,
            dx,
            dy,
            sx: if p0.0 < p1.0 { 1 } else { -1 },
            sy: if p0.1 < p1.1 { 1 } else { -1 },
            err: dx + dy,
            done: false,
        }
    }
}

impl Iterator for Bresenham {
    type Item = Cell;

    fn next(&mut self) -> Option<Cell> {
        if self.done {
            return None;
        }
        let cell = (self.x, self.y);
        if self.x == self.x1 && self.y == self.y1 {
            self.done = true;
            return Some(cell);
        }
        let e2 = 2 * self.err;
        if e2 >= self.dy {
            self.err += self.dy;
            self.x += self.sx;
        }
        if e2 <= self.dx {
            self.err += self.dx;
            self.y += self.sy;
        }
        Some(cell)
    }
}

/// Bresenham line from `p1` to `p2` inclusive, starting at `p1`.
///
/// The walk always runs from the lexicographically smaller endpoint, so
/// `line(a, b)` and `line(b, a)` cover the same cells (in reverse order).
pub fn line(p1: Cell, p2: Cell) -> Vec<Cell> {
    if p1 <= p2 {
        Bresenham::new(p1, p2).collect()
    } else {
        let mut cells: Vec<Cell> = Bresenham::new(p2, p1).collect();
        cells.reverse();
        cells
    }
}

// ============================================================================
// RECTANGLE / ELLIPSE
// ============================================================================

/// Filled rectangle spanning the bounding box of `p1`, `p2` (corners inclusive),
/// row by row.
pub fn rect(p1: Cell, p2: Cell) -> impl Iterator<Item = Cell> {
    let (x0, x1) = (p1.0.min(p2.0), p1.0.max(p2.0));
    let (y0, y1) = (p1.1.min(p2.1), p1.1.max(p2.1));
    (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| (x, y)))
}

/// Filled ellipse inscribed in the bounding box of `p1`, `p2`.
///
/// A cell is inside when `((x-cx)/rx)² + ((y-cy)/ry)² <= 1` with the center at
/// the box midpoint and the radii at the half-extents.
pub fn ellipse(p1: Cell, p2: Cell) -> Vec<Cell> {
    let cx = (p1.0 as f64 + p2.0 as f64) / 2.0;
    let cy = (p1.1 as f64 + p2.1 as f64) / 2.0;
    let rx = (p2.0 - p1.0).abs() as f64 / 2.0;
    let ry = (p2.1 - p1.1).abs() as f64 / 2.0;
    let rx = if rx == 0.0 { ELLIPSE_EPSILON } else { rx };
    let ry = if ry == 0.0 { ELLIPSE_EPSILON } else { ry };

    rect(p1, p2)
        .filter(|&(x, y)| {
            let nx = (x as f64 - cx) / rx;
            let ny = (y as f64 - cy) / ry;
            nx * nx + ny * ny <= 1.0
        })
        .collect()
}

// ============================================================================
// BRUSH
// ============================================================================

/// Square brush footprint of `size` cells around `center`, inside a
/// `grid_w`×`grid_h` grid.
///
/// The square starts `floor((size-1)/2)` cells up-left of the center (even
/// sizes lean toward the lower-right). The start is clamped into the grid and
/// the extent truncated at the far edge, so a stamp at the border slides
/// inward instead of shrinking on the near side.
pub fn brush_stamp(center: Cell, size: u32, grid_w: u32, grid_h: u32) -> impl Iterator<Item = Cell> {
    let s = size.max(1) as i32;
    let (gw, gh) = (grid_w as i32, grid_h as i32);
    let offset = (s - 1) / 2;
    let start_x = (center.0 - offset).clamp(0, (gw - 1).max(0));
    let start_y = (center.1 - offset).clamp(0, (gh - 1).max(0));
    let w = s.min(gw - start_x);
    let h = s.min(gh - start_y);
    (start_y..start_y + h).flat_map(move |y| (start_x..start_x + w).map(move |x| (x, y)))
}

/// Cells covered by dragging a brush of `size` from `from` to `to`: a stamp at
/// every cell of the connecting line. May contain duplicates.
pub fn brush_stroke(from: Cell, to: Cell, size: u32, grid_w: u32, grid_h: u32) -> Vec<Cell> {
    line(from, to)
        .into_iter()
        .flat_map(|c| brush_stamp(c, size, grid_w, grid_h))
        .collect()
}
