use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Maximum pointer travel, in pixels, between press and release for a click.
pub const CLICK_SLOP: f32 = 4.0;

/// Viewer action bound to a keyboard key on native targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Activates the control button with this element id.
    PressButton(String),
    ClosePopup,
}

impl Command {
    /// Resolves a key name (`"1"` to `"4"`, `"Escape"`) to its command.
    pub fn from_key_name(name: &str) -> Option<Self> {
        match name {
            "Escape" | "Esc" => Some(Self::ClosePopup),
            "1" | "2" | "3" | "4" => Some(Self::PressButton(format!("button{name}"))),
            _ => None,
        }
    }
}

/// Splits primary-button pointer input into orbit drags and clicks.
#[derive(Debug, Clone, Default)]
pub struct PointerTracker {
    pressed_at: Option<Vec2>,
    position: Vec2,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed_at.is_some()
    }

    pub fn press(&mut self, position: Vec2) {
        self.position = position;
        self.pressed_at = Some(position);
    }

    /// Records a pointer move and returns the drag delta while pressed.
    pub fn move_to(&mut self, position: Vec2) -> Option<Vec2> {
        let delta = position - self.position;
        self.position = position;
        self.pressed_at.map(|_| delta)
    }

    /// Ends a press. Returns the click position when the pointer stayed
    /// within [`CLICK_SLOP`] of where it was pressed.
    pub fn release(&mut self, position: Vec2) -> Option<Vec2> {
        self.position = position;
        let pressed_at = self.pressed_at.take()?;
        (pressed_at.distance(position) <= CLICK_SLOP).then_some(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_press_is_a_click() {
        let mut pointer = PointerTracker::new();
        pointer.press(Vec2::new(100.0, 100.0));
        assert_eq!(pointer.move_to(Vec2::new(102.0, 101.0)), Some(Vec2::new(2.0, 1.0)));
        assert_eq!(
            pointer.release(Vec2::new(103.0, 101.0)),
            Some(Vec2::new(103.0, 101.0))
        );
        assert!(!pointer.is_pressed());
    }

    #[test]
    fn drag_is_not_a_click() {
        let mut pointer = PointerTracker::new();
        pointer.press(Vec2::ZERO);
        assert_eq!(pointer.move_to(Vec2::new(30.0, 0.0)), Some(Vec2::new(30.0, 0.0)));
        assert_eq!(pointer.release(Vec2::new(30.0, 0.0)), None);
    }

    #[test]
    fn hover_moves_do_not_drag() {
        let mut pointer = PointerTracker::new();
        assert_eq!(pointer.move_to(Vec2::new(5.0, 5.0)), None);
        assert_eq!(pointer.release(Vec2::new(5.0, 5.0)), None);
        assert_eq!(pointer.position(), Vec2::new(5.0, 5.0));
    }

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(
            Command::from_key_name("3"),
            Some(Command::PressButton("button3".into()))
        );
        assert_eq!(Command::from_key_name("Escape"), Some(Command::ClosePopup));
        assert_eq!(Command::from_key_name("5"), None);
    }
}
