use eframe::egui;
use egui::{Pos2, Rect, Vec2};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::components::colors::TRANSPARENT;
use crate::error::{EditorError, Result};
use crate::ops::shapes::{self, Cell};

/// Smallest allowed grid side, in cells.
pub const MIN_DIM: u32 = 4;
/// Largest allowed grid side, in cells.
pub const MAX_DIM: u32 = 256;
/// Grid side used for a fresh or unrecoverable session.
pub const DEFAULT_DIM: u32 = 32;

/// Display pixels per cell at zoom 1.0.
pub const CELL_SIZE: f32 = 20.0;

pub const MIN_ZOOM: f32 = 0.2;
pub const MAX_ZOOM: f32 = 40.0;

/// Clamp a requested grid side into `[MIN_DIM, MAX_DIM]`.
pub fn clamp_dimension(value: i64) -> u32 {
    value.clamp(MIN_DIM as i64, MAX_DIM as i64) as u32
}

pub fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    let ok = |v: u32| (MIN_DIM..=MAX_DIM).contains(&v);
    if ok(width) && ok(height) {
        Ok(())
    } else {
        Err(EditorError::InvalidDimension { width, height })
    }
}

/// How existing artwork is carried over when the grid changes size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// Keep cells at the same coordinates; cut or pad at the right/bottom.
    #[default]
    Anchor,
    /// Nearest-neighbor rescale of the whole image into the new bounds.
    Scale,
}

impl ResizeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResizeMode::Anchor => "anchor",
            ResizeMode::Scale => "scale",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anchor" | "crop" => Some(ResizeMode::Anchor),
            "scale" => Some(ResizeMode::Scale),
            _ => None,
        }
    }
}

/// Nearest-neighbor resample of `src` to `width`×`height`.
pub fn resample_nearest(src: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (sw, sh) = src.dimensions();
    if (sw, sh) == (width, height) {
        return src.clone();
    }
    RgbaImage::from_fn(width, height, |x, y| {
        let sx = ((x as u64 * sw as u64) / width as u64) as u32;
        let sy = ((y as u64 * sh as u64) / height as u64) as u32;
        *src.get_pixel(sx.min(sw - 1), sy.min(sh - 1))
    })
}

// ============================================================================
// RASTER BUFFER
// ============================================================================

/// The artwork: one RGBA pixel per grid cell.
#[derive(Clone, Debug, PartialEq)]
pub struct CanvasState {
    pixels: RgbaImage,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            pixels: RgbaImage::new(DEFAULT_DIM, DEFAULT_DIM),
        }
    }
}

impl CanvasState {
    /// A fully transparent grid. Fails with `InvalidDimension` outside `[4, 256]`.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        validate_dimensions(width, height)?;
        Ok(Self {
            pixels: RgbaImage::new(width, height),
        })
    }

    /// Adopt an image whose dimensions already satisfy the grid limits.
    pub fn from_image(pixels: RgbaImage) -> Result<Self> {
        validate_dimensions(pixels.width(), pixels.height())?;
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height()
    }

    pub fn get(&self, x: i32, y: i32) -> Option<Rgba<u8>> {
        self.in_bounds(x, y)
            .then(|| *self.pixels.get_pixel(x as u32, y as u32))
    }

    /// Paint one cell. Out-of-range cells are ignored. Returns whether the
    /// cell changed.
    pub fn paint_cell(&mut self, x: i32, y: i32, color: Rgba<u8>) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let px = self.pixels.get_pixel_mut(x as u32, y as u32);
        if *px == color {
            return false;
        }
        *px = color;
        true
    }

    pub fn erase_cell(&mut self, x: i32, y: i32) -> bool {
        self.paint_cell(x, y, TRANSPARENT)
    }

    /// Paint (or erase) every cell in `cells`. Returns how many cells changed.
    pub fn paint_region<I>(&mut self, cells: I, color: Rgba<u8>, erase: bool) -> usize
    where
        I: IntoIterator<Item = Cell>,
    {
        let color = if erase { TRANSPARENT } else { color };
        cells
            .into_iter()
            .filter(|&(x, y)| self.paint_cell(x, y, color))
            .count()
    }

    /// Stamp a `size`-cell square brush centered on `center`.
    pub fn stamp(&mut self, center: Cell, size: u32, color: Rgba<u8>, erase: bool) -> usize {
        let stamp = shapes::brush_stamp(center, size, self.width(), self.height());
        self.paint_region(stamp, color, erase)
    }

    /// Erase every cell.
    pub fn clear(&mut self) {
        self.pixels
            .pixels_mut()
            .for_each(|p| *p = TRANSPARENT);
    }

    /// Whether every cell is transparent.
    pub fn is_blank(&self) -> bool {
        self.pixels.pixels().all(|p| p[3] == 0)
    }

    /// Reallocate to `width`×`height`, carrying existing content over
    /// according to `mode`. Cells with no source become transparent.
    pub fn set_size(&mut self, width: u32, height: u32, mode: ResizeMode) -> Result<()> {
        validate_dimensions(width, height)?;
        if (width, height) == self.pixels.dimensions() {
            return Ok(());
        }
        self.pixels = match mode {
            ResizeMode::Scale => resample_nearest(&self.pixels, width, height),
            ResizeMode::Anchor => {
                let mut next = RgbaImage::new(width, height);
                let w = width.min(self.width());
                let h = height.min(self.height());
                for y in 0..h {
                    for x in 0..w {
                        next.put_pixel(x, y, *self.pixels.get_pixel(x, y));
                    }
                }
                next
            }
        };
        Ok(())
    }

    /// Replace the whole buffer (history restore). Dimensions follow `pixels`.
    pub fn restore(&mut self, pixels: &RgbaImage) {
        self.pixels.clone_from(pixels);
    }

    /// Nearest-neighbor upscale by an integer `scale` (clamped to 1–64).
    ///
    /// Rows are produced in parallel; the buffer itself is only read.
    pub fn export_scaled(&self, scale: u32) -> RgbaImage {
        let scale = scale.clamp(1, 64);
        let (w, h) = self.pixels.dimensions();
        let out_w = w * scale;
        let out_h = h * scale;
        let row_bytes = out_w as usize * 4;
        let mut raw = vec![0u8; row_bytes * out_h as usize];

        raw.par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(row, out)| {
                let sy = row as u32 / scale;
                for (i, chunk) in out.chunks_exact_mut(4).enumerate() {
                    let sx = i as u32 / scale;
                    chunk.copy_from_slice(&self.pixels.get_pixel(sx, sy).0);
                }
            });

        // Buffer length is exactly out_w * out_h * 4 by construction.
        RgbaImage::from_raw(out_w, out_h, raw).unwrap_or_else(|| RgbaImage::new(out_w, out_h))
    }
}

// ============================================================================
// VIEWPORT
// ============================================================================

/// Zoom and pan of the stage. Screen coordinates are relative to the stage's
/// top-left corner; `pan` is where grid cell (0, 0)'s corner lands on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub zoom: f32,
    pub pan: Vec2,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
        }
    }
}

impl Viewport {
    pub fn new(zoom: f32, pan: Vec2) -> Self {
        Self {
            zoom: clamp_zoom(zoom),
            pan,
        }
    }

    /// Screen pixels covered by one cell at the current zoom.
    pub fn cell_extent(&self) -> f32 {
        CELL_SIZE * self.zoom
    }

    /// On-screen size of the whole grid.
    pub fn display_size(&self, grid_w: u32, grid_h: u32) -> Vec2 {
        Vec2::new(grid_w as f32, grid_h as f32) * self.cell_extent()
    }

    /// Map a screen point into unzoomed display space (grid origin at 0,0,
    /// `CELL_SIZE` units per cell).
    pub fn screen_to_world(&self, screen: Pos2) -> Pos2 {
        ((screen - self.pan).to_vec2() / self.zoom).to_pos2()
    }

    /// The cell under `screen`, or `None` when the point is off the grid.
    pub fn hit_cell(&self, screen: Pos2, grid_w: u32, grid_h: u32) -> Option<Cell> {
        let world = self.screen_to_world(screen);
        let x = (world.x / CELL_SIZE).floor();
        let y = (world.y / CELL_SIZE).floor();
        let inside = x >= 0.0 && y >= 0.0 && x < grid_w as f32 && y < grid_h as f32;
        inside.then_some((x as i32, y as i32))
    }

    /// The cell under `screen`, clamped into the grid.
    pub fn screen_to_cell(&self, screen: Pos2, grid_w: u32, grid_h: u32) -> Cell {
        let world = self.screen_to_world(screen);
        let x = (world.x / CELL_SIZE).floor();
        let y = (world.y / CELL_SIZE).floor();
        // f32 -> i32 saturates, so far-off points clamp cleanly.
        (
            (x as i32).clamp(0, grid_w as i32 - 1),
            (y as i32).clamp(0, grid_h as i32 - 1),
        )
    }

    /// Screen position of the center of `cell`.
    pub fn cell_to_screen(&self, cell: Cell) -> Pos2 {
        let ext = self.cell_extent();
        Pos2::new(
            self.pan.x + (cell.0 as f32 + 0.5) * ext,
            self.pan.y + (cell.1 as f32 + 0.5) * ext,
        )
    }

    /// Screen rectangle covered by `cell`.
    pub fn cell_rect(&self, cell: Cell) -> Rect {
        let ext = self.cell_extent();
        let min = Pos2::new(
            self.pan.x + cell.0 as f32 * ext,
            self.pan.y + cell.1 as f32 * ext,
        );
        Rect::from_min_size(min, Vec2::splat(ext))
    }

    /// Set zoom directly (clamped), leaving pan untouched.
    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = clamp_zoom(zoom);
    }

    /// Zoom by `factor` while keeping the point under `anchor` fixed on screen.
    pub fn zoom_at(&mut self, anchor: Pos2, factor: f32) {
        let new_zoom = clamp_zoom(self.zoom * factor);
        let world = self.screen_to_world(anchor);
        self.pan = anchor.to_vec2() - world.to_vec2() * new_zoom;
        self.zoom = new_zoom;
    }

    /// Center the grid inside a stage of `viewport_size`, keeping zoom.
    pub fn center_in(&mut self, viewport_size: Vec2, grid_w: u32, grid_h: u32) {
        let grid = self.display_size(grid_w, grid_h);
        self.pan = ((viewport_size - grid) / 2.0).floor();
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }
}

fn clamp_zoom(zoom: f32) -> f32 {
    if zoom.is_finite() {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn rejects_out_of_range_sizes() {
        assert!(matches!(
            CanvasState::new(3, 10),
            Err(EditorError::InvalidDimension { width: 3, height: 10 })
        ));
        assert!(CanvasState::new(4, 256).is_ok());
        let mut c = CanvasState::default();
        assert!(c.set_size(257, 32, ResizeMode::Anchor).is_err());
        assert_eq!(c.width(), 32);
    }

    #[test]
    fn clamp_dimension_bounds() {
        assert_eq!(clamp_dimension(-5), 4);
        assert_eq!(clamp_dimension(100), 100);
        assert_eq!(clamp_dimension(9000), 256);
    }

    #[test]
    fn out_of_range_paint_is_ignored() {
        let mut c = CanvasState::default();
        assert!(!c.paint_cell(-1, 0, RED));
        assert!(!c.paint_cell(0, 32, RED));
        assert!(c.is_blank());
        assert!(c.paint_cell(31, 31, RED));
        assert!(!c.paint_cell(31, 31, RED));
        assert_eq!(c.get(31, 31), Some(RED));
        assert!(c.erase_cell(31, 31));
        assert!(c.is_blank());
    }

    #[test]
    fn paint_region_counts_changes_once() {
        let mut c = CanvasState::default();
        let n = c.paint_region([(1, 1), (1, 1), (2, 1), (99, 99)], RED, false);
        assert_eq!(n, 2);
        let n = c.paint_region([(1, 1), (5, 5)], RED, true);
        assert_eq!(n, 1);
    }

    #[test]
    fn anchor_resize_roundtrip_keeps_top_left() {
        let mut c = CanvasState::default();
        for y in 0..32 {
            for x in 0..32 {
                c.paint_cell(x, y, Rgba([x as u8, y as u8, 7, 255]));
            }
        }
        let before = c.clone();
        c.set_size(16, 16, ResizeMode::Anchor).unwrap();
        c.set_size(32, 32, ResizeMode::Anchor).unwrap();
        for y in 0..32 {
            for x in 0..32 {
                if x < 16 && y < 16 {
                    assert_eq!(c.get(x, y), before.get(x, y));
                } else {
                    assert_eq!(c.get(x, y), Some(TRANSPARENT));
                }
            }
        }
    }

    #[test]
    fn scale_resize_doubles_cells() {
        let mut c = CanvasState::new(4, 4).unwrap();
        c.paint_cell(1, 0, RED);
        c.set_size(8, 8, ResizeMode::Scale).unwrap();
        for (x, y) in [(2, 0), (3, 0), (2, 1), (3, 1)] {
            assert_eq!(c.get(x, y), Some(RED));
        }
        assert_eq!(c.get(1, 0), Some(TRANSPARENT));
    }

    #[test]
    fn export_upscales_nearest() {
        let mut c = CanvasState::new(4, 4).unwrap();
        c.paint_cell(3, 3, RED);
        let img = c.export_scaled(3);
        assert_eq!(img.dimensions(), (12, 12));
        assert_eq!(*img.get_pixel(11, 11), RED);
        assert_eq!(*img.get_pixel(9, 9), RED);
        assert_eq!(*img.get_pixel(8, 9), TRANSPARENT);
        assert_eq!(c.export_scaled(0).dimensions(), (4, 4));
        assert_eq!(c.export_scaled(500).dimensions(), (256, 256));
    }

    #[test]
    fn screen_to_cell_clamps() {
        let v = Viewport::new(1.0, Vec2::new(10.0, 10.0));
        assert_eq!(v.screen_to_cell(Pos2::new(10.0, 10.0), 32, 32), (0, 0));
        assert_eq!(v.screen_to_cell(Pos2::new(49.9, 30.0), 32, 32), (1, 1));
        assert_eq!(v.screen_to_cell(Pos2::new(-500.0, 1e9), 32, 32), (0, 31));
        assert_eq!(v.hit_cell(Pos2::new(0.0, 0.0), 32, 32), None);
        assert_eq!(v.hit_cell(Pos2::new(30.0, 30.0), 32, 32), Some((1, 1)));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut v = Viewport::default();
        v.zoom_at(Pos2::ZERO, 1000.0);
        assert_eq!(v.zoom, MAX_ZOOM);
        v.zoom_at(Pos2::ZERO, 0.0001);
        assert_eq!(v.zoom, MIN_ZOOM);
    }

    #[test]
    fn centering_keeps_zoom() {
        let mut v = Viewport::new(2.0, Vec2::ZERO);
        v.center_in(Vec2::new(1000.0, 800.0), 16, 16);
        // 16 cells * 20px * 2.0 = 640
        assert_eq!(v.pan, Vec2::new(180.0, 80.0));
        assert_eq!(v.zoom, 2.0);
    }

    #[test]
    fn cell_to_screen_inverts() {
        let v = Viewport::new(3.5, Vec2::new(-40.0, 12.0));
        for cell in [(0, 0), (5, 9), (31, 31)] {
            assert_eq!(v.screen_to_cell(v.cell_to_screen(cell), 32, 32), cell);
        }
    }

    proptest! {
        #[test]
        fn zoom_at_keeps_anchor_cell(
            zoom in 0.2f32..40.0,
            px in -400f32..400.0,
            py in -400f32..400.0,
            ax in 0f32..1200.0,
            ay in 0f32..900.0,
            factor in 0.5f32..2.0,
        ) {
            let mut v = Viewport::new(zoom, Vec2::new(px, py));
            let anchor = Pos2::new(ax, ay);
            let before = v.screen_to_world(anchor);
            v.zoom_at(anchor, factor);
            let after = v.screen_to_world(anchor);
            let tol = 1e-2 * (1.0 + before.x.abs().max(before.y.abs()));
            prop_assert!((before.x - after.x).abs() <= tol);
            prop_assert!((before.y - after.y).abs() <= tol);
        }
    }
}
