use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

/// Pixel dimensions of the primary render surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Fixed on-screen control button with its declared offset from the
/// viewport center anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlButton {
    pub id: String,
    pub offset: Vec2,
}

impl ControlButton {
    /// Builds a button from its `data-offset-x` / `data-offset-y` attribute values.
    pub fn from_attributes(
        id: &str,
        offset_x: Option<&str>,
        offset_y: Option<&str>,
    ) -> Result<Self, LayoutError> {
        let x = parse_offset(id, "x", offset_x)?;
        let y = parse_offset(id, "y", offset_y)?;
        Ok(Self {
            id: id.to_string(),
            offset: Vec2::new(x, y),
        })
    }
}

fn parse_offset(id: &str, axis: &'static str, value: Option<&str>) -> Result<f32, LayoutError> {
    let value = value.ok_or_else(|| LayoutError::MissingOffset {
        id: id.to_string(),
        axis,
    })?;
    leading_float(value).ok_or_else(|| LayoutError::MalformedOffset {
        id: id.to_string(),
        axis,
        value: value.to_string(),
    })
}

/// Parses the longest numeric prefix, so `"120px"` reads as `120`.
fn leading_float(value: &str) -> Option<f32> {
    let trimmed = value.trim_start();
    let mut end = 0;
    for (index, ch) in trimmed.char_indices() {
        let candidate = &trimmed[..index + ch.len_utf8()];
        if candidate.parse::<f32>().is_ok() {
            end = index + ch.len_utf8();
        } else if !matches!(ch, '+' | '-' | '.' | 'e' | 'E' | '0'..='9') {
            break;
        }
    }
    trimmed[..end].parse::<f32>().ok().filter(|v| v.is_finite())
}

/// CSS transform centering an element on its anchor and shifting it by `offset`.
pub fn button_transform(offset: Vec2) -> String {
    format!(
        "translate(calc(-50% + {}px), calc(-50% + {}px))",
        offset.x, offset.y
    )
}

/// Scale applied to button offsets for the radial push-out effect.
///
/// `zoom_fraction` is 0 at the minimum orbit distance and 1 at the maximum;
/// the factor goes linearly from `push_factor` down to 1.
pub fn push_out_factor(push_factor: f32, zoom_fraction: f32) -> f32 {
    let t = zoom_fraction.clamp(0.0, 1.0);
    push_factor + (1.0 - push_factor) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_declared_offsets() {
        let button = ControlButton::from_attributes("button1", Some("-300"), Some("120px")).unwrap();
        assert_eq!(button.offset, Vec2::new(-300.0, 120.0));
        assert_eq!(
            button_transform(button.offset),
            "translate(calc(-50% + -300px), calc(-50% + 120px))"
        );
    }

    #[test]
    fn malformed_offsets_are_errors() {
        assert_eq!(
            ControlButton::from_attributes("button2", None, Some("1")).unwrap_err(),
            LayoutError::MissingOffset {
                id: "button2".into(),
                axis: "x"
            }
        );
        assert!(ControlButton::from_attributes("button2", Some("left"), Some("1")).is_err());
    }

    #[test]
    fn push_out_grows_when_zoomed_in() {
        assert_eq!(push_out_factor(1.5, 0.0), 1.5);
        assert_eq!(push_out_factor(1.5, 1.0), 1.0);
        assert!((push_out_factor(1.5, 0.5) - 1.25).abs() < 1e-6);
    }

    #[test]
    fn viewport_never_has_zero_area() {
        let viewport = Viewport::new(0, 0);
        assert_eq!(viewport.size(), (1, 1));
        assert_eq!(Viewport::new(1920, 1080).aspect(), 1920.0 / 1080.0);
    }
}
