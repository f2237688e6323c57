use eframe::egui;
use egui::{Color32, Pos2, Rect, Sense, Stroke};
use std::path::PathBuf;
use std::time::Duration;

use pastelpix::canvas::{MAX_DIM, MIN_DIM, ResizeMode};
use pastelpix::components::colors;
use pastelpix::components::tools::{MAX_BRUSH_SIZE, Tool};
use pastelpix::io::{EXPORT_FILE_NAME, FileStore};
use pastelpix::project::{Editor, EditorCommand, KeyInput, PointerButton, hotkey_command};
use pastelpix::settings::EditorSettings;
use pastelpix::{log_err, log_info};

/// How long the "Saved" indicator stays up after an autosave.
const SAVED_TOAST: Duration = Duration::from_millis(1500);

const STAGE_BG: Color32 = Color32::from_rgb(0xfd, 0xf2, 0xf8);
const CHECKER_LIGHT: Color32 = Color32::from_rgb(0xff, 0xff, 0xff);
const CHECKER_DARK: Color32 = Color32::from_rgb(0xf1, 0xe6, 0xee);
const PREVIEW_ALPHA: f32 = 0.85;

pub struct PastelPixApp {
    editor: Editor,
    settings: EditorSettings,
    /// Resize inputs; applied on "Resize".
    resize_w: i64,
    resize_h: i64,
    export_path: String,
    /// Canvas size the resize inputs were last filled from.
    synced_dims: (u32, u32),
    /// Last stage-relative pointer position sent to the editor.
    last_pointer: Option<Pos2>,
    /// "New" was pressed and awaits confirmation.
    confirm_new: bool,
}

impl PastelPixApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::light());

        let settings = EditorSettings::load();
        let store = FileStore::new(settings.resolved_storage_dir());
        log_info!("Session store: {}", store.dir().display());
        let editor = Editor::restore(Box::new(store), &settings);

        Self {
            resize_w: editor.canvas().width() as i64,
            resize_h: editor.canvas().height() as i64,
            synced_dims: (editor.canvas().width(), editor.canvas().height()),
            export_path: EXPORT_FILE_NAME.to_string(),
            last_pointer: None,
            confirm_new: false,
            editor,
            settings,
        }
    }

    // -- toolbar ------------------------------------------------------------

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            for tool in Tool::ALL {
                let selected = self.editor.tools().tool == tool;
                let label = ui
                    .selectable_label(selected, tool.action_label())
                    .on_hover_text(format!("{} ({})", tool.action_label(), tool.hotkey().to_ascii_uppercase()));
                if label.clicked() {
                    self.editor.dispatch(EditorCommand::SetTool(tool));
                }
            }
            ui.separator();

            let mut color = colors::to_color32(self.editor.tools().color());
            if egui::color_picker::color_edit_button_srgba(
                ui,
                &mut color,
                egui::color_picker::Alpha::OnlyBlend,
            )
            .changed()
            {
                self.editor
                    .dispatch(EditorCommand::SetColor(colors::from_color32(color)));
            }
            ui.label(self.editor.tools().color_hex());

            let mut brush = self.editor.tools().brush_size();
            if ui
                .add(egui::Slider::new(&mut brush, 1..=MAX_BRUSH_SIZE).text("Brush"))
                .changed()
            {
                self.editor.dispatch(EditorCommand::SetBrushSize(brush));
            }
            ui.separator();

            let history = self.editor.history();
            let (can_undo, can_redo) = (history.can_undo(), history.can_redo());
            let undo_tip = history.undo_description().map(|d| format!("Undo {}", d));
            let redo_tip = history.redo_description().map(|d| format!("Redo {}", d));
            let undo = ui.add_enabled(can_undo, egui::Button::new("Undo"));
            let undo = match undo_tip {
                Some(t) => undo.on_hover_text(t),
                None => undo,
            };
            if undo.clicked() {
                self.editor.dispatch(EditorCommand::Undo);
            }
            let redo = ui.add_enabled(can_redo, egui::Button::new("Redo"));
            let redo = match redo_tip {
                Some(t) => redo.on_hover_text(t),
                None => redo,
            };
            if redo.clicked() {
                self.editor.dispatch(EditorCommand::Redo);
            }
            if ui.button("Clear").clicked() {
                self.editor.dispatch(EditorCommand::Clear);
            }
            if ui.button("New").clicked() {
                self.confirm_new = true;
            }
        });

        ui.horizontal_wrapped(|ui| {
            let range = MIN_DIM as i64..=MAX_DIM as i64;
            ui.label("Size");
            ui.add(egui::DragValue::new(&mut self.resize_w).clamp_range(range.clone()));
            ui.label("×");
            ui.add(egui::DragValue::new(&mut self.resize_h).clamp_range(range));

            let mut mode = self.editor.resize_mode();
            egui::ComboBox::from_id_source("resize_mode")
                .selected_text(mode.as_str())
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut mode, ResizeMode::Anchor, "anchor");
                    ui.selectable_value(&mut mode, ResizeMode::Scale, "scale");
                });
            if mode != self.editor.resize_mode() {
                self.editor.set_resize_mode(mode);
                self.settings.resize_mode = mode;
                self.settings.save();
            }
            if ui.button("Resize").clicked() {
                self.editor.dispatch(EditorCommand::Resize {
                    width: self.resize_w,
                    height: self.resize_h,
                });
            }
            ui.separator();

            ui.label("Export ×");
            if ui
                .add(egui::DragValue::new(&mut self.settings.export_scale).clamp_range(1..=64))
                .changed()
            {
                self.settings.save();
            }
            ui.add(egui::TextEdit::singleline(&mut self.export_path).desired_width(160.0));
            if ui.button("Export PNG").clicked() {
                self.export();
            }
            ui.separator();

            let mut grid_changed = ui.checkbox(&mut self.settings.show_grid, "Grid").changed();
            if self.settings.show_grid {
                grid_changed |= ui
                    .add(egui::Slider::new(&mut self.settings.grid_alpha, 0.0..=1.0).text("α"))
                    .changed();
            }
            if grid_changed {
                self.settings.save();
            }
            if ui.button("Center").clicked() {
                self.editor.dispatch(EditorCommand::CenterView);
            }
        });
    }

    fn export(&mut self) {
        let path = PathBuf::from(self.export_path.trim());
        let path = if path.as_os_str().is_empty() {
            PathBuf::from(EXPORT_FILE_NAME)
        } else {
            path
        };
        if let Err(e) = self.editor.export_png(&path, self.settings.export_scale) {
            log_err!("Export to {} failed: {}", path.display(), e);
        }
    }

    // -- input --------------------------------------------------------------

    fn handle_keys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let commands: Vec<EditorCommand> = ctx.input(|i| {
            i.events
                .iter()
                .filter_map(|event| match event {
                    egui::Event::Key {
                        key,
                        pressed,
                        modifiers,
                        ..
                    } => key_input(*key).and_then(|k| {
                        hotkey_command(k, *pressed, modifiers.command, modifiers.shift)
                    }),
                    _ => None,
                })
                .collect()
        });
        self.editor.dispatch_all(commands);
    }

    fn handle_pointer(&mut self, ctx: &egui::Context, stage: Rect, hovered: bool) {
        let to_stage = |p: Pos2| (p - stage.min).to_pos2();
        let (pos, pressed, middle, released, scroll) = ctx.input(|i| {
            (
                i.pointer.latest_pos(),
                i.pointer.button_pressed(egui::PointerButton::Primary),
                i.pointer.button_pressed(egui::PointerButton::Middle),
                i.pointer.any_released(),
                i.scroll_delta,
            )
        });
        let Some(pos) = pos.map(to_stage) else {
            return;
        };

        if hovered && (pressed || middle) {
            let button = if pressed {
                PointerButton::Primary
            } else {
                PointerButton::Middle
            };
            self.editor
                .dispatch(EditorCommand::PointerDown { pos, button });
        }
        if self.last_pointer != Some(pos) && (hovered || self.editor.gesture().is_active()) {
            self.editor.dispatch(EditorCommand::PointerMove { pos });
            self.last_pointer = Some(pos);
        }
        if released {
            self.editor.dispatch(EditorCommand::PointerUp { pos });
        }
        if hovered && scroll.y != 0.0 {
            // egui reports wheel-up as positive; the editor expects the opposite.
            self.editor.dispatch(EditorCommand::Wheel {
                pos,
                delta_y: -scroll.y,
            });
        }
    }

    // -- rendering ----------------------------------------------------------

    fn paint_stage(&self, painter: &egui::Painter, stage: Rect) {
        painter.rect_filled(stage, 0.0, STAGE_BG);

        let canvas = self.editor.canvas();
        let view = self.editor.viewport();
        let (w, h) = (canvas.width(), canvas.height());
        let offset = stage.min.to_vec2();
        let cell_rect = |c: (i32, i32)| view.cell_rect(c).translate(offset);

        // Only the cells intersecting the stage are drawn.
        let first = view.screen_to_cell(Pos2::ZERO, w, h);
        let last = view.screen_to_cell(stage.size().to_pos2(), w, h);

        for y in first.1..=last.1 {
            for x in first.0..=last.0 {
                let rect = cell_rect((x, y));
                let checker = if (x + y) % 2 == 0 { CHECKER_LIGHT } else { CHECKER_DARK };
                painter.rect_filled(rect, 0.0, checker);
                if let Some(px) = canvas.get(x, y)
                    && px[3] > 0
                {
                    painter.rect_filled(rect, 0.0, colors::to_color32(px));
                }
            }
        }

        if let Some(preview) = self.editor.preview() {
            let [r, g, b, a] = preview.color.0;
            let color = Color32::from_rgba_unmultiplied(r, g, b, (a as f32 * PREVIEW_ALPHA) as u8);
            for cell in preview.cells {
                painter.rect_filled(cell_rect(cell), 0.0, color);
            }
        }

        let ext = view.cell_extent();
        if self.settings.show_grid && ext >= 4.0 {
            let alpha = (self.settings.grid_alpha * 255.0) as u8;
            let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(120, 90, 110, alpha));
            let grid = Rect::from_min_size(
                stage.min + view.pan,
                view.display_size(w, h),
            );
            for x in 0..=w {
                let sx = grid.min.x + x as f32 * ext;
                painter.line_segment([Pos2::new(sx, grid.min.y), Pos2::new(sx, grid.max.y)], stroke);
            }
            for y in 0..=h {
                let sy = grid.min.y + y as f32 * ext;
                painter.line_segment([Pos2::new(grid.min.x, sy), Pos2::new(grid.max.x, sy)], stroke);
            }
        }

        if let Some(cell) = self.editor.hover_cell() {
            painter.rect_stroke(cell_rect(cell), 0.0, Stroke::new(1.5, Color32::from_rgb(200, 80, 140)));
        }
    }

    fn confirm_new_dialog(&mut self, ctx: &egui::Context) {
        if !self.confirm_new {
            return;
        }
        let mut choice = None;
        egui::Window::new("New canvas?")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label("This clears the canvas. It can still be undone.");
                ui.horizontal(|ui| {
                    if ui.button("Yes").clicked() {
                        choice = Some(true);
                    }
                    if ui.button("No").clicked() {
                        choice = Some(false);
                    }
                });
            });
        if let Some(command) = resolve_new_prompt(&mut self.confirm_new, choice) {
            self.editor.dispatch(command);
        }
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(self.editor.status());
            ui.separator();
            ui.label(format!("{:.0}%", self.editor.viewport().zoom * 100.0));
            ui.separator();
            let canvas = self.editor.canvas();
            ui.label(format!("{}×{}", canvas.width(), canvas.height()));
            ui.separator();
            let history = self.editor.history();
            ui.label(format!(
                "History {}/{} ({:.1} MB)",
                history.len(),
                history.capacity(),
                history.memory_usage() as f64 / (1024.0 * 1024.0)
            ));
            if let Some((x, y)) = self.editor.hover_cell() {
                ui.separator();
                ui.label(format!("{}, {}", x, y));
            }
            if self.editor.pan_mode() {
                ui.separator();
                ui.label("Pan");
            }
            if let Some(t) = self.editor.last_saved()
                && t.elapsed() < SAVED_TOAST
            {
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.colored_label(Color32::from_rgb(90, 160, 110), "Saved");
                });
            }
        });
    }
}

impl eframe::App for PastelPixApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_keys(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.status_bar(ui));
        self.confirm_new_dialog(ctx);

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let (response, painter) =
                    ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
                let stage = response.rect;
                self.editor
                    .dispatch(EditorCommand::ViewportResized(stage.size()));
                self.handle_pointer(ctx, stage, response.hovered());
                self.paint_stage(&painter, stage);
            });

        // Keep the resize inputs in step with resizes, undo and restore.
        let dims = (self.editor.canvas().width(), self.editor.canvas().height());
        if dims != self.synced_dims {
            self.synced_dims = dims;
            self.resize_w = dims.0 as i64;
            self.resize_h = dims.1 as i64;
        }

        if self.editor.tick_frame() {
            ctx.request_repaint_after(SAVED_TOAST);
        }
    }
}

/// Close the "New canvas?" prompt once answered; only "Yes" yields a command.
fn resolve_new_prompt(open: &mut bool, choice: Option<bool>) -> Option<EditorCommand> {
    let yes = choice?;
    *open = false;
    yes.then_some(EditorCommand::NewCanvas)
}

fn key_input(key: egui::Key) -> Option<KeyInput> {
    use egui::Key;
    let c = match key {
        Key::Space => return Some(KeyInput::Space),
        Key::Escape => return Some(KeyInput::Escape),
        Key::PlusEquals => '+',
        Key::Minus => '-',
        Key::B => 'b',
        Key::E => 'e',
        Key::F => 'f',
        Key::L => 'l',
        Key::R => 'r',
        Key::C => 'c',
        Key::Y => 'y',
        Key::Z => 'z',
        _ => return None,
    };
    Some(KeyInput::Char(c))
}
