// ============================================================================
// EDIT SCRIPTS: line-oriented command files replayed by the CLI
// ============================================================================
//
//   # comment
//   tool brush          color #ff66a3        brush 3
//   down 1 1            move 8 1             up 8 1
//   fill 4 4            line 0 0 9 9         rect 1 1 6 4      circle 2 2 12 9
//   undo   redo   clear   new   cancel   resize 48 48   zoom in|out
//
// Coordinates are grid cells, clamped onto the current grid, so `rect -2 -2 3 3`
// starts at cell (0,0). They are converted to screen positions through the
// editor's current viewport, so replay goes through the same pointer path as
// interactive use. A stroke or shape still held at the end is cancelled.

use image::Rgba;

use crate::components::colors;
use crate::components::tools::Tool;
use crate::error::{EditorError, Result};
use crate::ops::shapes::Cell;
use crate::log_warn;
use crate::project::{Editor, EditorCommand, PointerButton};

#[derive(Clone, Debug, PartialEq)]
pub enum ScriptStep {
    Tool(Tool),
    Color(Rgba<u8>),
    Brush(u32),
    Down(Cell),
    Move(Cell),
    Up(Cell),
    Fill(Cell),
    /// Drag a shape tool from the first cell to the second.
    Shape { tool: Tool, from: Cell, to: Cell },
    Undo,
    Redo,
    Clear,
    New,
    Cancel,
    Resize { width: i64, height: i64 },
    ZoomIn,
    ZoomOut,
}

/// Parse a whole script. Line numbers in errors are 1-based.
pub fn parse_script(source: &str) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (i, raw) in source.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let step = parse_line(line).map_err(|message| EditorError::Script {
            line: i + 1,
            message,
        })?;
        steps.push(step);
    }
    Ok(steps)
}

/// Cut a `#` comment. A `#` directly followed by a non-space character after
/// the first word is a color (`color #abc`), not a comment.
fn strip_comment(raw: &str) -> &str {
    let line = raw.trim_start();
    if line.starts_with('#') {
        return "";
    }
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'#' && bytes.get(i + 1).is_none_or(|n| n.is_ascii_whitespace()) {
            return &line[..i];
        }
    }
    line
}

fn parse_line(line: &str) -> std::result::Result<ScriptStep, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let (cmd, args) = match words.split_first() {
        Some((cmd, args)) => (cmd.to_ascii_lowercase(), args),
        None => return Err("empty line".into()),
    };

    let arity = |n: usize| -> std::result::Result<(), String> {
        if args.len() == n {
            Ok(())
        } else {
            Err(format!("'{}' takes {} argument(s), got {}", cmd, n, args.len()))
        }
    };
    let int = |s: &str| -> std::result::Result<i64, String> {
        s.parse::<i64>()
            .map_err(|_| format!("'{}' is not an integer", s))
    };
    let cell = |x: &str, y: &str| -> std::result::Result<Cell, String> {
        let x = int(x)?.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        let y = int(y)?.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        Ok((x, y))
    };

    let step = match cmd.as_str() {
        "tool" => {
            arity(1)?;
            ScriptStep::Tool(args[0].parse()?)
        }
        "color" | "colour" => {
            arity(1)?;
            let c = colors::parse_hex(args[0])
                .ok_or_else(|| format!("'{}' is not a hex color", args[0]))?;
            ScriptStep::Color(c)
        }
        "brush" => {
            arity(1)?;
            let n = int(args[0])?;
            ScriptStep::Brush(n.clamp(0, u32::MAX as i64) as u32)
        }
        "down" | "move" | "up" | "fill" => {
            arity(2)?;
            let c = cell(args[0], args[1])?;
            match cmd.as_str() {
                "down" => ScriptStep::Down(c),
                "move" => ScriptStep::Move(c),
                "up" => ScriptStep::Up(c),
                _ => ScriptStep::Fill(c),
            }
        }
        "line" | "rect" | "circle" => {
            arity(4)?;
            ScriptStep::Shape {
                tool: cmd.parse()?,
                from: cell(args[0], args[1])?,
                to: cell(args[2], args[3])?,
            }
        }
        "resize" => {
            arity(2)?;
            ScriptStep::Resize {
                width: int(args[0])?,
                height: int(args[1])?,
            }
        }
        "zoom" => {
            arity(1)?;
            match args[0].to_ascii_lowercase().as_str() {
                "in" | "+" => ScriptStep::ZoomIn,
                "out" | "-" => ScriptStep::ZoomOut,
                other => return Err(format!("zoom expects 'in' or 'out', got '{}'", other)),
            }
        }
        "undo" | "redo" | "clear" | "new" | "cancel" => {
            arity(0)?;
            match cmd.as_str() {
                "undo" => ScriptStep::Undo,
                "redo" => ScriptStep::Redo,
                "clear" => ScriptStep::Clear,
                "new" => ScriptStep::New,
                _ => ScriptStep::Cancel,
            }
        }
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(step)
}

impl ScriptStep {
    /// Expand into editor commands using the editor's current view.
    ///
    /// `fill` and the shape steps switch to their tool for the duration of
    /// the click or drag and switch back afterwards.
    pub fn commands(&self, editor: &Editor) -> Vec<EditorCommand> {
        let (w, h) = (editor.canvas().width() as i32, editor.canvas().height() as i32);
        let at = |(x, y): Cell| {
            let cell = (x.clamp(0, w - 1), y.clamp(0, h - 1));
            editor.viewport().cell_to_screen(cell)
        };
        let press = |c: Cell| EditorCommand::PointerDown {
            pos: at(c),
            button: PointerButton::Primary,
        };
        let prev = editor.tools().tool;

        match *self {
            ScriptStep::Tool(t) => vec![EditorCommand::SetTool(t)],
            ScriptStep::Color(c) => vec![EditorCommand::SetColor(c)],
            ScriptStep::Brush(n) => vec![EditorCommand::SetBrushSize(n)],
            ScriptStep::Down(c) => vec![press(c)],
            ScriptStep::Move(c) => vec![EditorCommand::PointerMove { pos: at(c) }],
            ScriptStep::Up(c) => vec![EditorCommand::PointerUp { pos: at(c) }],
            ScriptStep::Fill(c) => vec![
                EditorCommand::SetTool(Tool::Fill),
                press(c),
                EditorCommand::PointerUp { pos: at(c) },
                EditorCommand::SetTool(prev),
            ],
            ScriptStep::Shape { tool, from, to } => vec![
                EditorCommand::SetTool(tool),
                press(from),
                EditorCommand::PointerMove { pos: at(to) },
                EditorCommand::PointerUp { pos: at(to) },
                EditorCommand::SetTool(prev),
            ],
            ScriptStep::Undo => vec![EditorCommand::Undo],
            ScriptStep::Redo => vec![EditorCommand::Redo],
            ScriptStep::Clear => vec![EditorCommand::Clear],
            ScriptStep::New => vec![EditorCommand::NewCanvas],
            ScriptStep::Cancel => vec![EditorCommand::Cancel],
            ScriptStep::Resize { width, height } => vec![EditorCommand::Resize { width, height }],
            ScriptStep::ZoomIn => vec![EditorCommand::ZoomIn],
            ScriptStep::ZoomOut => vec![EditorCommand::ZoomOut],
        }
    }
}

/// Replay `steps` against `editor`, running the frame hook after each step.
pub fn run_steps(editor: &mut Editor, steps: &[ScriptStep]) {
    for step in steps {
        let commands = step.commands(editor);
        editor.dispatch_all(commands);
        editor.tick_frame();
    }
    if editor.gesture().is_active() {
        log_warn!("Script ended with the pointer held; stroke cancelled");
        editor.dispatch(EditorCommand::Cancel);
        editor.tick_frame();
    }
}
