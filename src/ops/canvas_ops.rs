// ============================================================================
// CANVAS-LEVEL OPERATIONS: resize / clear, each one history step
// ============================================================================

use crate::canvas::{CanvasState, ResizeMode, clamp_dimension};
use crate::components::history::HistoryManager;
use crate::{log_info, log_warn};

/// Resize to the requested size, clamped into `[4, 256]` per side, and commit.
///
/// Returns the new `(width, height)`, or `None` when the clamped size equals
/// the current one (nothing happens and nothing is committed).
pub fn resize_canvas(
    state: &mut CanvasState,
    history: &mut HistoryManager,
    width: i64,
    height: i64,
    mode: ResizeMode,
) -> Option<(u32, u32)> {
    let w = clamp_dimension(width);
    let h = clamp_dimension(height);
    if (w as i64, h as i64) != (width, height) {
        log_info!("Resize {}×{} clamped to {}×{}", width, height, w, h);
    }
    if (w, h) == (state.width(), state.height()) {
        return None;
    }

    // Clamped above, so this cannot fail; keep the old buffer if it somehow does.
    if let Err(e) = state.set_size(w, h, mode) {
        log_warn!("Resize rejected: {}", e);
        return None;
    }
    history.commit(format!("Resize {}×{}", w, h), state);
    Some((w, h))
}

/// Erase every cell and commit. Returns false (no history entry) when the
/// canvas was already blank.
pub fn clear_canvas(state: &mut CanvasState, history: &mut HistoryManager, description: &str) -> bool {
    state.clear();
    history.commit_if_changed(description, state)
}
