use eframe::egui;
use egui::{Pos2, Vec2};
use image::{Rgba, RgbaImage};
use std::path::Path;
use std::time::Instant;

use crate::canvas::{CanvasState, ResizeMode, Viewport};
use crate::components::colors;
use crate::components::history::HistoryManager;
use crate::components::tools::{Gesture, PreviewOverlay, Tool, ToolSettings};
use crate::error::{EditorError, Result};
use crate::io::{self, PanRecord, SESSION_KEY, SaveScheduler, SessionRecord, SessionStore};
use crate::ops::{canvas_ops, fill, shapes};
use crate::settings::EditorSettings;
use crate::{log_err, log_info, log_warn};

/// Wheel zoom factor per notch toward the screen (zoom in).
pub const WHEEL_ZOOM_IN: f32 = 1.1;
/// Wheel zoom factor per notch away from the screen (zoom out).
pub const WHEEL_ZOOM_OUT: f32 = 0.9;
/// `+` / `-` key zoom step.
pub const KEY_ZOOM_STEP: f32 = 1.1;

// ============================================================================
// COMMANDS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// One discrete user action. Positions are stage-relative screen pixels.
#[derive(Clone, Debug, PartialEq)]
pub enum EditorCommand {
    PointerDown { pos: Pos2, button: PointerButton },
    PointerMove { pos: Pos2 },
    PointerUp { pos: Pos2 },
    /// `delta_y < 0` is a wheel turn away from the user (zoom in).
    Wheel { pos: Pos2, delta_y: f32 },
    SetTool(Tool),
    SetColor(Rgba<u8>),
    SetBrushSize(u32),
    Undo,
    Redo,
    ZoomIn,
    ZoomOut,
    /// Space held (`true`) or released (`false`).
    SetPanMode(bool),
    PanBy(Vec2),
    Resize { width: i64, height: i64 },
    Clear,
    NewCanvas,
    /// The stage was laid out at a new size.
    ViewportResized(Vec2),
    CenterView,
    /// Abort the in-progress stroke or shape without committing.
    Cancel,
}

/// Keys the editor reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Space,
    Escape,
}

/// Map a key event to a command.
///
/// `command` is Ctrl (Cmd on macOS). Only Space reacts to releases.
pub fn hotkey_command(key: KeyInput, pressed: bool, command: bool, shift: bool) -> Option<EditorCommand> {
    let c = match key {
        KeyInput::Space => return Some(EditorCommand::SetPanMode(pressed)),
        _ if !pressed => return None,
        KeyInput::Escape => return Some(EditorCommand::Cancel),
        KeyInput::Char(c) => c.to_ascii_lowercase(),
    };
    if command {
        return match c {
            'z' if shift => Some(EditorCommand::Redo),
            'z' => Some(EditorCommand::Undo),
            'y' => Some(EditorCommand::Redo),
            _ => None,
        };
    }
    match c {
        '+' | '=' => Some(EditorCommand::ZoomIn),
        '-' => Some(EditorCommand::ZoomOut),
        _ => Tool::from_hotkey(c).map(EditorCommand::SetTool),
    }
}

// ============================================================================
// EDITOR
// ============================================================================

/// The whole editing session: artwork, history, view, tool state and the
/// autosave hook. All mutation goes through [`Editor::dispatch`].
pub struct Editor {
    canvas: CanvasState,
    history: HistoryManager,
    viewport: Viewport,
    tools: ToolSettings,
    gesture: Gesture,
    pan_mode: bool,
    hover: Option<shapes::Cell>,
    viewport_size: Option<Vec2>,
    /// Recenter on the next stage size report.
    center_pending: bool,
    resize_mode: ResizeMode,
    autosave: bool,
    store: Box<dyn SessionStore>,
    saves: SaveScheduler,
    status: String,
    last_saved: Option<Instant>,
    save_failures: u64,
}

impl Editor {
    /// Blank session at the configured default size.
    pub fn new(store: Box<dyn SessionStore>, settings: &EditorSettings) -> Self {
        let canvas = CanvasState::new(settings.default_width, settings.default_height)
            .unwrap_or_default();
        let mut history = HistoryManager::new(settings.history_capacity);
        history.seed("New canvas", &canvas);
        Self {
            canvas,
            history,
            viewport: Viewport::default(),
            tools: ToolSettings::default(),
            gesture: Gesture::Idle,
            pan_mode: false,
            hover: None,
            viewport_size: None,
            center_pending: true,
            resize_mode: settings.resize_mode,
            autosave: settings.autosave,
            store,
            saves: SaveScheduler::default(),
            status: format!("Tool: {}", Tool::Brush),
            last_saved: None,
            save_failures: 0,
        }
    }

    /// Resume the session saved in `store`, or start blank when there is
    /// none or it cannot be read.
    pub fn restore(store: Box<dyn SessionStore>, settings: &EditorSettings) -> Self {
        let mut editor = Self::new(store, settings);
        match editor.try_restore() {
            Ok(true) => {
                log_info!(
                    "Restored {}×{} session",
                    editor.canvas.width(),
                    editor.canvas.height()
                );
            }
            Ok(false) => {
                log_info!("No saved session; starting blank");
            }
            Err(e) => {
                log_warn!("{}; starting blank", e);
            }
        }
        editor
    }

    /// Load the stored record into this editor. `Ok(false)` when nothing is
    /// stored. On error the editor is left untouched.
    pub fn try_restore(&mut self) -> Result<bool> {
        let raw = match self.store.read(SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(false),
            Err(e) => return Err(EditorError::RestoreFailed(e.to_string())),
        };
        let record = SessionRecord::from_json(&raw)?;
        let canvas = record.decode_canvas()?;

        self.canvas = canvas;
        self.history.seed("Restored session", &self.canvas);
        self.viewport = Viewport::new(record.zoom, Vec2::new(record.pan.x, record.pan.y));
        self.center_pending = false;
        self.gesture = Gesture::Idle;
        if let Some(color) = colors::parse_hex(&record.color) {
            self.tools.set_color(color);
        }
        self.tools.set_brush_size(record.brush);
        Ok(true)
    }

    // -- accessors -------------------------------------------------------

    pub fn canvas(&self) -> &CanvasState {
        &self.canvas
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn tools(&self) -> &ToolSettings {
        &self.tools
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn pan_mode(&self) -> bool {
        self.pan_mode
    }

    /// Cell under the pointer, if the pointer is over the grid.
    pub fn hover_cell(&self) -> Option<shapes::Cell> {
        self.hover
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn last_saved(&self) -> Option<Instant> {
        self.last_saved
    }

    pub fn save_pending(&self) -> bool {
        self.saves.is_pending()
    }

    pub fn save_failures(&self) -> u64 {
        self.save_failures
    }

    pub fn resize_mode(&self) -> ResizeMode {
        self.resize_mode
    }

    pub fn set_resize_mode(&mut self, mode: ResizeMode) {
        self.resize_mode = mode;
    }

    /// Shape being dragged, as the cells its commit would paint.
    pub fn preview(&self) -> Option<PreviewOverlay> {
        let Gesture::Shape { kind, start, current } = self.gesture else {
            return None;
        };
        let mut cells: Vec<shapes::Cell> = kind
            .cells(start, current)
            .into_iter()
            .flat_map(|c| {
                shapes::brush_stamp(
                    c,
                    self.tools.brush_size(),
                    self.canvas.width(),
                    self.canvas.height(),
                )
            })
            .collect();
        cells.sort_unstable();
        cells.dedup();
        Some(PreviewOverlay {
            cells,
            color: self.tools.color(),
        })
    }

    // -- command dispatch -------------------------------------------------

    pub fn dispatch(&mut self, command: EditorCommand) {
        match command {
            EditorCommand::PointerDown { pos, button } => self.pointer_down(pos, button),
            EditorCommand::PointerMove { pos } => self.pointer_move(pos),
            EditorCommand::PointerUp { pos } => self.pointer_up(pos),
            EditorCommand::Wheel { pos, delta_y } => {
                if delta_y != 0.0 {
                    let factor = if delta_y < 0.0 { WHEEL_ZOOM_IN } else { WHEEL_ZOOM_OUT };
                    self.viewport.zoom_at(pos, factor);
                }
            }
            EditorCommand::SetTool(tool) => {
                self.tools.tool = tool;
                self.status = format!("Tool: {}", tool);
            }
            EditorCommand::SetColor(color) => self.tools.set_color(color),
            EditorCommand::SetBrushSize(size) => self.tools.set_brush_size(size),
            EditorCommand::Undo => self.undo(),
            EditorCommand::Redo => self.redo(),
            EditorCommand::ZoomIn => self.zoom_centered(KEY_ZOOM_STEP),
            EditorCommand::ZoomOut => self.zoom_centered(1.0 / KEY_ZOOM_STEP),
            EditorCommand::SetPanMode(on) => self.pan_mode = on,
            EditorCommand::PanBy(delta) => self.viewport.pan_by(delta),
            EditorCommand::Resize { width, height } => self.resize(width, height),
            EditorCommand::Clear => {
                self.cancel_gesture();
                if canvas_ops::clear_canvas(&mut self.canvas, &mut self.history, "Clear") {
                    self.saves.schedule();
                }
                self.status = "Cleared".to_string();
            }
            EditorCommand::NewCanvas => {
                self.cancel_gesture();
                if canvas_ops::clear_canvas(&mut self.canvas, &mut self.history, "New canvas") {
                    self.saves.schedule();
                }
                self.viewport.set_zoom(1.0);
                self.recenter();
                self.status = "New canvas".to_string();
            }
            EditorCommand::ViewportResized(size) => {
                let changed = self.viewport_size != Some(size);
                let first = self.viewport_size.is_none();
                self.viewport_size = Some(size);
                if self.center_pending || (changed && !first) {
                    self.recenter();
                }
            }
            EditorCommand::CenterView => {
                self.center_pending = true;
                self.recenter();
            }
            EditorCommand::Cancel => {
                if self.gesture.is_active() {
                    self.cancel_gesture();
                    self.status = "Cancelled".to_string();
                }
            }
        }
    }

    pub fn dispatch_all(&mut self, commands: impl IntoIterator<Item = EditorCommand>) {
        for c in commands {
            self.dispatch(c);
        }
    }

    // -- pointer handling -------------------------------------------------

    fn pointer_down(&mut self, pos: Pos2, button: PointerButton) {
        if self.gesture.is_active() {
            return;
        }
        if button == PointerButton::Middle || (button == PointerButton::Primary && self.pan_mode) {
            self.gesture = Gesture::Pan { last: pos };
            return;
        }
        if button != PointerButton::Primary {
            return;
        }
        let (w, h) = (self.canvas.width(), self.canvas.height());
        let Some(cell) = self.viewport.hit_cell(pos, w, h) else {
            return;
        };
        self.hover = Some(cell);

        let tool = self.tools.tool;
        match tool {
            Tool::Brush | Tool::Eraser => {
                let erase = tool == Tool::Eraser;
                self.canvas
                    .stamp(cell, self.tools.brush_size(), self.tools.color(), erase);
                self.gesture = Gesture::Stroke { last: cell, erase };
            }
            Tool::Fill => {
                if fill::flood_fill(&mut self.canvas, cell, self.tools.color()) > 0 {
                    self.commit(tool.action_label());
                }
            }
            Tool::Line | Tool::Rect | Tool::Circle => {
                if let Some(kind) = tool.shape() {
                    self.gesture = Gesture::Shape {
                        kind,
                        start: cell,
                        current: cell,
                    };
                }
            }
        }
    }

    fn pointer_move(&mut self, pos: Pos2) {
        let (w, h) = (self.canvas.width(), self.canvas.height());
        self.hover = self.viewport.hit_cell(pos, w, h);
        let cell = self.viewport.screen_to_cell(pos, w, h);

        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Stroke { last, erase } => {
                let from = *last;
                let erase = *erase;
                *last = cell;
                let cells = shapes::brush_stroke(from, cell, self.tools.brush_size(), w, h);
                self.canvas.paint_region(cells, self.tools.color(), erase);
            }
            Gesture::Shape { current, .. } => *current = cell,
            Gesture::Pan { last } => {
                let delta = pos - *last;
                *last = pos;
                self.viewport.pan_by(delta);
            }
        }
    }

    fn pointer_up(&mut self, pos: Pos2) {
        if !self.gesture.is_active() {
            return;
        }
        self.pointer_move(pos);
        match std::mem::take(&mut self.gesture) {
            Gesture::Idle | Gesture::Pan { .. } => {}
            Gesture::Stroke { erase, .. } => {
                let label = if erase { Tool::Eraser } else { Tool::Brush }.action_label();
                self.commit(label);
            }
            Gesture::Shape { kind, start, current } => {
                let size = self.tools.brush_size();
                let color = self.tools.color();
                for cell in kind.cells(start, current) {
                    self.canvas.stamp(cell, size, color, false);
                }
                let label = match kind {
                    shapes::ShapeKind::Line => Tool::Line,
                    shapes::ShapeKind::Rectangle => Tool::Rect,
                    shapes::ShapeKind::Ellipse => Tool::Circle,
                }
                .action_label();
                self.commit(label);
            }
        }
    }

    /// Drop the current gesture, putting back any strokes already painted.
    fn cancel_gesture(&mut self) {
        if let Gesture::Stroke { .. } = self.gesture {
            self.history.revert(&mut self.canvas);
        }
        self.gesture = Gesture::Idle;
    }

    // -- history ------------------------------------------------------------

    /// Record one finished action. Actions that leave the canvas unchanged
    /// produce no entry and no save.
    fn commit(&mut self, description: &str) {
        if self.history.commit_if_changed(description, &self.canvas) {
            self.saves.schedule();
        }
    }

    fn undo(&mut self) {
        self.cancel_gesture();
        let dims = (self.canvas.width(), self.canvas.height());
        if self.history.undo(&mut self.canvas).is_some() {
            self.status = "Undo".to_string();
            self.after_restore(dims);
        }
    }

    fn redo(&mut self) {
        self.cancel_gesture();
        let dims = (self.canvas.width(), self.canvas.height());
        if self.history.redo(&mut self.canvas).is_some() {
            self.status = "Redo".to_string();
            self.after_restore(dims);
        }
    }

    fn after_restore(&mut self, old_dims: (u32, u32)) {
        if (self.canvas.width(), self.canvas.height()) != old_dims {
            self.recenter();
        }
        self.saves.schedule();
    }

    // -- canvas size / view ---------------------------------------------

    fn resize(&mut self, width: i64, height: i64) {
        self.cancel_gesture();
        if let Some((w, h)) = canvas_ops::resize_canvas(
            &mut self.canvas,
            &mut self.history,
            width,
            height,
            self.resize_mode,
        ) {
            self.status = format!("Resized to {}×{}", w, h);
            self.center_pending = true;
            self.recenter();
            self.saves.schedule();
        }
    }

    fn zoom_centered(&mut self, factor: f32) {
        let anchor = match self.viewport_size {
            Some(size) => (size / 2.0).to_pos2(),
            None => self.viewport.pan.to_pos2(),
        };
        self.viewport.zoom_at(anchor, factor);
    }

    fn recenter(&mut self) {
        if let Some(size) = self.viewport_size {
            self.viewport
                .center_in(size, self.canvas.width(), self.canvas.height());
            self.center_pending = false;
        }
    }

    // -- persistence / export -------------------------------------------

    /// Snapshot of the session for the key-value store.
    pub fn session_record(&self) -> Result<SessionRecord> {
        Ok(SessionRecord {
            width: self.canvas.width(),
            height: self.canvas.height(),
            image: io::encode_data_url(self.canvas.pixels())?,
            zoom: self.viewport.zoom,
            pan: PanRecord {
                x: self.viewport.pan.x,
                y: self.viewport.pan.y,
            },
            color: self.tools.color_hex(),
            brush: self.tools.brush_size(),
        })
    }

    /// Write the session record now.
    pub fn save_now(&mut self) -> Result<()> {
        let json = self.session_record()?.to_json()?;
        self.store.write(SESSION_KEY, &json)?;
        self.last_saved = Some(Instant::now());
        Ok(())
    }

    /// Once-per-frame hook: performs the coalesced autosave if one is due.
    ///
    /// Write failures are logged and otherwise ignored; the session keeps
    /// working in memory. Returns whether a write succeeded.
    pub fn tick_frame(&mut self) -> bool {
        if !self.saves.take_due() || !self.autosave {
            return false;
        }
        match self.save_now() {
            Ok(()) => true,
            Err(e) => {
                self.save_failures += 1;
                log_err!("Autosave failed: {}", e);
                false
            }
        }
    }

    /// Nearest-neighbor upscaled copy of the artwork.
    pub fn export(&self, scale: u32) -> RgbaImage {
        self.canvas.export_scaled(scale)
    }

    /// Export as PNG to `path`.
    pub fn export_png(&mut self, path: &Path, scale: u32) -> Result<()> {
        let scale = scale.clamp(1, 64);
        io::write_png(&self.export(scale), path)?;
        self.status = format!("Exported ×{}", scale);
        log_info!("Exported ×{} to {}", scale, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStore;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn editor() -> Editor {
        let mut e = Editor::new(Box::new(MemoryStore::new()), &EditorSettings::default());
        // zoom 1, pan 0: cell (x, y) spans screen [20x, 20x + 20)
        e.dispatch(EditorCommand::SetColor(RED));
        e
    }

    fn at(cell: (i32, i32)) -> Pos2 {
        Pos2::new(cell.0 as f32 * 20.0 + 10.0, cell.1 as f32 * 20.0 + 10.0)
    }

    fn click(e: &mut Editor, cell: (i32, i32)) {
        e.dispatch(EditorCommand::PointerDown {
            pos: at(cell),
            button: PointerButton::Primary,
        });
        e.dispatch(EditorCommand::PointerUp { pos: at(cell) });
    }

    fn drag(e: &mut Editor, from: (i32, i32), to: (i32, i32)) {
        e.dispatch(EditorCommand::PointerDown {
            pos: at(from),
            button: PointerButton::Primary,
        });
        e.dispatch(EditorCommand::PointerMove { pos: at(to) });
        e.dispatch(EditorCommand::PointerUp { pos: at(to) });
    }

    #[test]
    fn hotkeys_map_to_commands() {
        use KeyInput::*;
        assert_eq!(hotkey_command(Char('z'), true, true, false), Some(EditorCommand::Undo));
        assert_eq!(hotkey_command(Char('Z'), true, true, true), Some(EditorCommand::Redo));
        assert_eq!(hotkey_command(Char('y'), true, true, false), Some(EditorCommand::Redo));
        assert_eq!(hotkey_command(Char('b'), true, true, false), None);
        assert_eq!(
            hotkey_command(Char('c'), true, false, false),
            Some(EditorCommand::SetTool(Tool::Circle))
        );
        assert_eq!(hotkey_command(Char('+'), true, false, false), Some(EditorCommand::ZoomIn));
        assert_eq!(hotkey_command(Char('-'), true, false, false), Some(EditorCommand::ZoomOut));
        assert_eq!(hotkey_command(Space, false, false, false), Some(EditorCommand::SetPanMode(false)));
        assert_eq!(hotkey_command(Char('b'), false, false, false), None);
        assert_eq!(hotkey_command(Escape, true, false, false), Some(EditorCommand::Cancel));
    }

    #[test]
    fn stroke_is_one_history_step() {
        let mut e = editor();
        e.dispatch(EditorCommand::PointerDown {
            pos: at((0, 0)),
            button: PointerButton::Primary,
        });
        for x in 1..6 {
            e.dispatch(EditorCommand::PointerMove { pos: at((x * 2, 0)) });
        }
        e.dispatch(EditorCommand::PointerUp { pos: at((10, 0)) });

        assert_eq!(e.history().len(), 2);
        // interpolated: no gaps between sampled positions
        for x in 0..=10 {
            assert_eq!(e.canvas().get(x, 0), Some(RED));
        }
        e.dispatch(EditorCommand::Undo);
        assert!(e.canvas().is_blank());
    }

    #[test]
    fn shape_previews_then_commits_on_release() {
        let mut e = editor();
        e.dispatch(EditorCommand::SetTool(Tool::Rect));
        e.dispatch(EditorCommand::PointerDown {
            pos: at((1, 1)),
            button: PointerButton::Primary,
        });
        e.dispatch(EditorCommand::PointerMove { pos: at((3, 3)) });
        let preview = e.preview().unwrap();
        assert_eq!(preview.cells.len(), 9);
        assert!(e.canvas().is_blank(), "preview must not touch the raster");

        e.dispatch(EditorCommand::PointerUp { pos: at((3, 3)) });
        assert!(e.preview().is_none());
        assert_eq!(e.history().len(), 2);
        assert_eq!(e.history().current().unwrap().description(), "Rectangle");
        assert_eq!(e.canvas().get(2, 2), Some(RED));
        assert_eq!(e.canvas().get(4, 4), Some(crate::components::colors::TRANSPARENT));
    }

    #[test]
    fn shape_uses_brush_size() {
        let mut e = editor();
        e.dispatch(EditorCommand::SetTool(Tool::Line));
        e.dispatch(EditorCommand::SetBrushSize(3));
        drag(&mut e, (5, 5), (8, 5));
        assert_eq!(e.canvas().get(4, 4), Some(RED));
        assert_eq!(e.canvas().get(9, 6), Some(RED));
        assert_eq!(e.canvas().get(10, 5), Some(crate::components::colors::TRANSPARENT));
    }

    #[test]
    fn repeated_fill_commits_once() {
        let mut e = editor();
        e.dispatch(EditorCommand::SetTool(Tool::Fill));
        click(&mut e, (4, 4));
        assert_eq!(e.history().len(), 2);
        assert!(e.canvas().pixels().pixels().all(|p| *p == RED));
        click(&mut e, (9, 9));
        assert_eq!(e.history().len(), 2);
    }

    #[test]
    fn no_op_stroke_creates_no_entry() {
        let mut e = editor();
        click(&mut e, (2, 2));
        assert_eq!(e.history().len(), 2);
        click(&mut e, (2, 2));
        assert_eq!(e.history().len(), 2);
    }

    #[test]
    fn eraser_clears_cells() {
        let mut e = editor();
        click(&mut e, (2, 2));
        e.dispatch(EditorCommand::SetTool(Tool::Eraser));
        click(&mut e, (2, 2));
        assert!(e.canvas().is_blank());
        assert_eq!(e.history().current().unwrap().description(), "Eraser");
    }

    #[test]
    fn cancel_restores_committed_raster() {
        let mut e = editor();
        e.dispatch(EditorCommand::PointerDown {
            pos: at((0, 0)),
            button: PointerButton::Primary,
        });
        e.dispatch(EditorCommand::PointerMove { pos: at((5, 5)) });
        assert!(!e.canvas().is_blank());
        e.dispatch(EditorCommand::Cancel);
        assert!(e.canvas().is_blank());
        e.dispatch(EditorCommand::PointerUp { pos: at((5, 5)) });
        assert_eq!(e.history().len(), 1);
    }

    #[test]
    fn press_outside_grid_is_ignored() {
        let mut e = editor();
        e.dispatch(EditorCommand::PointerDown {
            pos: Pos2::new(-5.0, -5.0),
            button: PointerButton::Primary,
        });
        assert!(!e.gesture().is_active());
    }

    #[test]
    fn drag_past_edge_clamps() {
        let mut e = editor();
        e.dispatch(EditorCommand::SetTool(Tool::Line));
        e.dispatch(EditorCommand::PointerDown {
            pos: at((30, 0)),
            button: PointerButton::Primary,
        });
        e.dispatch(EditorCommand::PointerUp {
            pos: Pos2::new(5000.0, 10.0),
        });
        assert_eq!(e.canvas().get(31, 0), Some(RED));
    }

    #[test]
    fn pan_mode_drags_view() {
        let mut e = editor();
        e.dispatch(EditorCommand::SetPanMode(true));
        e.dispatch(EditorCommand::PointerDown {
            pos: Pos2::new(10.0, 10.0),
            button: PointerButton::Primary,
        });
        e.dispatch(EditorCommand::PointerMove {
            pos: Pos2::new(40.0, 25.0),
        });
        e.dispatch(EditorCommand::PointerUp {
            pos: Pos2::new(40.0, 25.0),
        });
        assert_eq!(e.viewport().pan, Vec2::new(30.0, 15.0));
        assert!(e.canvas().is_blank());
    }

    #[test]
    fn wheel_zoom_keeps_cell_under_pointer() {
        let mut e = editor();
        e.dispatch(EditorCommand::ViewportResized(Vec2::new(900.0, 700.0)));
        let p = Pos2::new(333.0, 211.0);
        let before = e.viewport().screen_to_cell(p, 32, 32);
        for _ in 0..5 {
            e.dispatch(EditorCommand::Wheel { pos: p, delta_y: -1.0 });
        }
        assert!(e.viewport().zoom > 1.5);
        assert_eq!(e.viewport().screen_to_cell(p, 32, 32), before);
        e.dispatch(EditorCommand::Wheel { pos: p, delta_y: 3.0 });
        assert_eq!(e.viewport().screen_to_cell(p, 32, 32), before);
    }

    #[test]
    fn first_layout_centers_grid() {
        let mut e = editor();
        e.dispatch(EditorCommand::ViewportResized(Vec2::new(1000.0, 800.0)));
        assert_eq!(e.viewport().pan, Vec2::new(180.0, 80.0));
    }

    #[test]
    fn resize_clamps_commits_and_recenters() {
        let mut e = editor();
        e.dispatch(EditorCommand::ViewportResized(Vec2::new(1000.0, 800.0)));
        e.dispatch(EditorCommand::Resize { width: 2, height: 16 });
        assert_eq!((e.canvas().width(), e.canvas().height()), (4, 16));
        assert_eq!(e.history().len(), 2);
        assert_eq!(e.viewport().pan, Vec2::new(460.0, 240.0));
        e.dispatch(EditorCommand::Undo);
        assert_eq!(e.canvas().width(), 32);
    }

    #[test]
    fn autosave_coalesces_to_one_write_per_frame() {
        let store = MemoryStore::new();
        let mut e = Editor::new(Box::new(store), &EditorSettings::default());
        click(&mut e, (1, 1));
        click(&mut e, (2, 1));
        e.dispatch(EditorCommand::Undo);
        assert!(e.save_pending());
        assert!(e.tick_frame());
        assert!(!e.tick_frame());
        assert!(e.last_saved().is_some());
    }

    #[test]
    fn write_failure_is_swallowed() {
        let mut e = Editor::new(Box::new(MemoryStore::with_quota(8)), &EditorSettings::default());
        click(&mut e, (1, 1));
        assert!(!e.tick_frame());
        assert_eq!(e.save_failures(), 1);
        click(&mut e, (3, 3));
        assert_eq!(e.history().len(), 3);
    }

    #[test]
    fn session_round_trips_through_store() {
        let mut e = editor();
        e.dispatch(EditorCommand::SetBrushSize(4));
        click(&mut e, (6, 7));
        e.dispatch(EditorCommand::PanBy(Vec2::new(11.0, -3.0)));
        let json = e.session_record().unwrap().to_json().unwrap();

        let mut store = MemoryStore::new();
        store.insert(SESSION_KEY, json);
        let restored = Editor::restore(Box::new(store), &EditorSettings::default());
        assert_eq!(restored.canvas(), e.canvas());
        assert_eq!(restored.tools().brush_size(), 4);
        assert_eq!(restored.tools().color(), RED);
        assert_eq!(restored.viewport().pan, Vec2::new(11.0, -3.0));
        assert_eq!(restored.history().len(), 1);
        assert!(!restored.history().can_undo());
    }

    #[test]
    fn corrupt_session_falls_back_to_blank() {
        let mut store = MemoryStore::new();
        store.insert(SESSION_KEY, "{\"width\": \"wide\"");
        let e = Editor::restore(Box::new(store), &EditorSettings::default());
        assert_eq!((e.canvas().width(), e.canvas().height()), (32, 32));
        assert!(e.canvas().is_blank());
    }

    #[test]
    fn export_writes_scaled_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(io::EXPORT_FILE_NAME);
        let mut e = editor();
        click(&mut e, (0, 0));
        e.export_png(&path, 2).unwrap();
        let img = io::decode_png(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(img.dimensions(), (64, 64));
        assert_eq!(*img.get_pixel(1, 1), RED);
        assert_eq!(e.status(), "Exported ×2");
    }
}
