//! Change-detected display state used to gate redraw requests.
//!
//! The terminal layer reports cursor and geometry updates through setters
//! that compare against the last observed value and request a redraw only
//! on an actual change. Re-reporting an unchanged value is common (cursor
//! position is pushed on every PTY read) and must not enqueue anything.

use parking_lot::Mutex;

/// Cursor glyph style, mirroring the DECSCUSR shapes the emulator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    /// Filled cell block.
    #[default]
    Block,
    /// Horizontal underline.
    Underline,
    /// Vertical bar.
    Bar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    cursor_position: (u16, u16),
    cursor_shape: CursorShape,
    cursor_visible: bool,
    window_size: (u16, u16),
    alt_screen: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            cursor_position: (0, 0),
            cursor_shape: CursorShape::default(),
            cursor_visible: true,
            window_size: (80, 24),
            alt_screen: false,
        }
    }
}

/// Last-observed display state, shared by all producer threads.
///
/// Each setter returns `true` when the stored value changed, which is the
/// caller's cue to request a redraw. The lock is dropped before any redraw
/// request is issued.
#[derive(Debug, Default)]
pub struct ViewState {
    state: Mutex<Snapshot>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cursor_position(&self, col: u16, row: u16) -> bool {
        let mut state = self.state.lock();
        let changed = state.cursor_position != (col, row);
        state.cursor_position = (col, row);
        changed
    }

    pub fn set_cursor_shape(&self, shape: CursorShape) -> bool {
        let mut state = self.state.lock();
        let changed = state.cursor_shape != shape;
        state.cursor_shape = shape;
        changed
    }

    pub fn set_cursor_visible(&self, visible: bool) -> bool {
        let mut state = self.state.lock();
        let changed = state.cursor_visible != visible;
        state.cursor_visible = visible;
        changed
    }

    pub fn set_window_size(&self, cols: u16, rows: u16) -> bool {
        let mut state = self.state.lock();
        let changed = state.window_size != (cols, rows);
        state.window_size = (cols, rows);
        changed
    }

    /// Record the alternate-screen flag.
    ///
    /// Unlike the other setters this reports no change decision: switching
    /// buffers always warrants an immediate repaint, even when the emulator
    /// re-enters the mode it was already in.
    pub fn set_alt_screen(&self, enabled: bool) {
        self.state.lock().alt_screen = enabled;
    }

    pub fn alt_screen(&self) -> bool {
        self.state.lock().alt_screen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_position_change_detection() {
        let view = ViewState::new();
        assert!(view.set_cursor_position(3, 4));
        assert!(!view.set_cursor_position(3, 4));
        assert!(view.set_cursor_position(3, 5));
    }

    #[test]
    fn test_initial_values_count_as_unchanged() {
        let view = ViewState::new();
        // Defaults: origin cursor, visible, block shape, 80x24.
        assert!(!view.set_cursor_position(0, 0));
        assert!(!view.set_cursor_visible(true));
        assert!(!view.set_cursor_shape(CursorShape::Block));
        assert!(!view.set_window_size(80, 24));
    }

    #[test]
    fn test_cursor_shape_and_visibility() {
        let view = ViewState::new();
        assert!(view.set_cursor_shape(CursorShape::Bar));
        assert!(!view.set_cursor_shape(CursorShape::Bar));
        assert!(view.set_cursor_visible(false));
        assert!(!view.set_cursor_visible(false));
    }

    #[test]
    fn test_window_size_change_detection() {
        let view = ViewState::new();
        assert!(view.set_window_size(120, 40));
        assert!(!view.set_window_size(120, 40));
    }

    #[test]
    fn test_alt_screen_is_recorded() {
        let view = ViewState::new();
        view.set_alt_screen(true);
        assert!(view.alt_screen());
        view.set_alt_screen(false);
        assert!(!view.alt_screen());
    }
}
