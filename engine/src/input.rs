use cgmath::Vector2;
use std::collections::HashSet;
use winit::event::{ElementState, VirtualKeyCode, WindowEvent};

/// Keyboard and cursor state for the current frame, owned by the
/// application loop and fed from window events. Passed to the game by
/// reference; there is no global input state.
pub struct Input {
    pressed: HashSet<VirtualKeyCode>,
    cursor: Vector2<f32>,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            pressed: HashSet::new(),
            cursor: Vector2::new(0.0, 0.0),
        }
    }
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pressed(&self, keycode: &VirtualKeyCode) -> bool {
        self.pressed.contains(keycode)
    }

    /// Cursor position in window pixel space.
    pub fn cursor(&self) -> Vector2<f32> {
        self.cursor
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { input, .. } => {
                if let Some(keycode) = input.virtual_keycode {
                    match input.state {
                        ElementState::Pressed => {
                            self.pressed.insert(keycode);
                        }
                        ElementState::Released => {
                            self.pressed.remove(&keycode);
                        }
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vector2::new(position.x as f32, position.y as f32);
            }
            _ => (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_pressed_and_released_keys() {
        let mut input = Input::new();
        assert!(!input.is_pressed(&VirtualKeyCode::Space));

        input.pressed.insert(VirtualKeyCode::Space);
        assert!(input.is_pressed(&VirtualKeyCode::Space));

        input.pressed.remove(&VirtualKeyCode::Space);
        assert!(!input.is_pressed(&VirtualKeyCode::Space));
    }
}
