// ============================================================================
// FLOOD FILL: 4-connected, exact-color region growth on the raster buffer
// ============================================================================

use image::Rgba;

use crate::canvas::CanvasState;
use crate::ops::shapes::Cell;

/// Cells of the 4-connected region around `start` whose color equals the
/// color at `start` exactly (all four RGBA channels).
///
/// `start` is clamped into the grid. Returns the region as a mask of
/// `width * height` booleans plus the number of cells set.
pub fn fill_region(canvas: &CanvasState, start: Cell) -> (Vec<bool>, usize) {
    let w = canvas.width() as usize;
    let h = canvas.height() as usize;
    let sx = start.0.clamp(0, w as i32 - 1) as usize;
    let sy = start.1.clamp(0, h as i32 - 1) as usize;

    let raw = canvas.pixels().as_raw();
    let pix = |idx: usize| -> [u8; 4] {
        let o = idx * 4;
        [raw[o], raw[o + 1], raw[o + 2], raw[o + 3]]
    };

    let seed = sy * w + sx;
    let target = pix(seed);

    // Seen doubles as the output mask; each cell is pushed at most once.
    let mut seen = vec![false; w * h];
    let mut count = 0usize;
    let mut stack: Vec<usize> = Vec::with_capacity(256);
    seen[seed] = true;
    stack.push(seed);

    while let Some(idx) = stack.pop() {
        count += 1;
        let x = idx % w;
        let y = idx / w;

        let mut visit = |ni: usize| {
            if !seen[ni] && pix(ni) == target {
                seen[ni] = true;
                stack.push(ni);
            }
        };
        if x > 0 {
            visit(idx - 1);
        }
        if x + 1 < w {
            visit(idx + 1);
        }
        if y > 0 {
            visit(idx - w);
        }
        if y + 1 < h {
            visit(idx + w);
        }
    }

    (seen, count)
}

/// Repaint the region around `start` with `color`.
///
/// Returns the number of cells painted; `0` means the start cell already had
/// `color` and nothing was touched.
pub fn flood_fill(canvas: &mut CanvasState, start: Cell, color: Rgba<u8>) -> usize {
    let w = canvas.width() as i32;
    let h = canvas.height() as i32;
    let start = (start.0.clamp(0, w - 1), start.1.clamp(0, h - 1));
    if canvas.get(start.0, start.1) == Some(color) {
        return 0;
    }

    let (mask, count) = fill_region(canvas, start);
    let cells = mask
        .iter()
        .enumerate()
        .filter(|(_, inside)| **inside)
        .map(|(i, _)| ((i as i32) % w, (i as i32) / w));
    canvas.paint_region(cells, color, false);
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::colors::TRANSPARENT;

    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const WALL: Rgba<u8> = Rgba([0, 0, 0, 255]);

    #[test]
    fn fills_uniform_grid_completely() {
        let mut canvas = CanvasState::new(10, 10).unwrap();
        assert_eq!(flood_fill(&mut canvas, (4, 7), BLUE), 100);
        assert!(canvas.pixels().pixels().all(|p| *p == BLUE));
        assert_eq!(flood_fill(&mut canvas, (0, 0), BLUE), 0);
    }

    #[test]
    fn stops_at_walls_and_ignores_diagonals() {
        let mut canvas = CanvasState::new(8, 8).unwrap();
        // vertical wall at x = 3
        for y in 0..8 {
            canvas.paint_cell(3, y, WALL);
        }
        assert_eq!(flood_fill(&mut canvas, (0, 0), BLUE), 24);
        assert_eq!(canvas.get(2, 7), Some(BLUE));
        assert_eq!(canvas.get(4, 0), Some(TRANSPARENT));
        assert_eq!(canvas.get(3, 0), Some(WALL));
    }

    #[test]
    fn diagonal_gap_does_not_leak() {
        let mut canvas = CanvasState::new(4, 4).unwrap();
        // diagonal line from (0,3) to (3,0)
        for i in 0..4 {
            canvas.paint_cell(i, 3 - i, WALL);
        }
        let painted = flood_fill(&mut canvas, (0, 0), BLUE);
        assert_eq!(painted, 6);
        assert_eq!(canvas.get(3, 3), Some(TRANSPARENT));
    }

    #[test]
    fn exact_match_only() {
        let mut canvas = CanvasState::new(4, 4).unwrap();
        canvas.paint_cell(1, 0, Rgba([0, 0, 0, 1]));
        flood_fill(&mut canvas, (0, 0), BLUE);
        assert_eq!(canvas.get(1, 0), Some(Rgba([0, 0, 0, 1])));
    }

    #[test]
    fn start_outside_grid_is_clamped() {
        let mut canvas = CanvasState::new(4, 4).unwrap();
        assert_eq!(flood_fill(&mut canvas, (-10, 99), BLUE), 16);
    }
}
