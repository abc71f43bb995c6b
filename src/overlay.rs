use std::collections::BTreeMap;

use glam::Vec2;
use log::debug;
use serde::{Deserialize, Serialize};

/// Handle of a screen-space label owned by one landmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelId(pub usize);

/// Fixed placement of the info panel, expressed as CSS lengths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelPlacement {
    pub top: String,
    pub left: String,
    pub width: String,
    pub height: String,
}

impl PanelPlacement {
    /// CSS properties for the info panel. Without a placement every value is
    /// empty, which removes a previously set inline style.
    pub fn css(placement: Option<&Self>) -> [(&'static str, &str); 4] {
        match placement {
            Some(placement) => [
                ("top", placement.top.as_str()),
                ("left", placement.left.as_str()),
                ("width", placement.width.as_str()),
                ("height", placement.height.as_str()),
            ],
            None => [("top", ""), ("left", ""), ("width", ""), ("height", "")],
        }
    }
}

/// Screen-space surface drawn on top of the 3D view.
///
/// All calls happen on the UI thread, from bootstrap, the frame loop or an
/// input handler.
pub trait Overlay {
    /// Creates a hidden label element and returns its handle.
    fn create_label(&mut self, caption: &str) -> LabelId;
    /// Moves a label so its anchor sits at `position` pixels.
    fn place_label(&mut self, label: LabelId, position: Vec2);
    fn set_label_visible(&mut self, label: LabelId, visible: bool);
    /// Replaces the info panel content.
    fn show_info(&mut self, text: &str, placement: Option<&PanelPlacement>);
    /// Offsets a control button from its centered anchor by `offset` pixels.
    fn place_button(&mut self, id: &str, offset: Vec2);
    /// Shows the popup with the landmark description.
    fn open_popup(&mut self, info: &str);
    /// Removes all popup content and hides it. Must be harmless when nothing is open.
    fn clear_popup(&mut self);
    fn alert(&mut self, message: &str);
}

/// Recorded state of one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelState {
    pub caption: String,
    pub position: Vec2,
    pub visible: bool,
}

/// In-memory overlay used by the native binary and by tests.
#[derive(Debug, Default, Clone)]
pub struct HeadlessOverlay {
    labels: Vec<LabelState>,
    info: Option<String>,
    info_placement: Option<PanelPlacement>,
    popup: Option<String>,
    buttons: BTreeMap<String, Vec2>,
    alerts: Vec<String>,
}

impl HeadlessOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> &[LabelState] {
        &self.labels
    }

    pub fn label(&self, label: LabelId) -> Option<&LabelState> {
        self.labels.get(label.0)
    }

    pub fn info_text(&self) -> Option<&str> {
        self.info.as_deref()
    }

    pub fn info_placement(&self) -> Option<&PanelPlacement> {
        self.info_placement.as_ref()
    }

    pub fn popup_text(&self) -> Option<&str> {
        self.popup.as_deref()
    }

    pub fn button_offset(&self, id: &str) -> Option<Vec2> {
        self.buttons.get(id).copied()
    }

    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    /// Labels whose visibility differs from `seen`, which is then brought up
    /// to date. New labels start out as hidden in `seen`.
    pub fn visibility_changes(&self, seen: &mut Vec<bool>) -> Vec<&LabelState> {
        seen.resize(self.labels.len(), false);
        self.labels
            .iter()
            .zip(seen.iter_mut())
            .filter_map(|(label, was_visible)| {
                (label.visible != *was_visible).then(|| {
                    *was_visible = label.visible;
                    label
                })
            })
            .collect()
    }
}

impl Overlay for HeadlessOverlay {
    fn create_label(&mut self, caption: &str) -> LabelId {
        self.labels.push(LabelState {
            caption: caption.to_string(),
            position: Vec2::ZERO,
            visible: false,
        });
        LabelId(self.labels.len() - 1)
    }

    fn place_label(&mut self, label: LabelId, position: Vec2) {
        if let Some(state) = self.labels.get_mut(label.0) {
            state.position = position;
        }
    }

    fn set_label_visible(&mut self, label: LabelId, visible: bool) {
        if let Some(state) = self.labels.get_mut(label.0) {
            if state.visible != visible {
                debug!("label {:?} visible={visible}", state.caption);
            }
            state.visible = visible;
        }
    }

    fn show_info(&mut self, text: &str, placement: Option<&PanelPlacement>) {
        if self.info.as_deref() != Some(text) {
            debug!("info panel: {text}");
        }
        self.info = Some(text.to_string());
        self.info_placement = placement.cloned();
    }

    fn place_button(&mut self, id: &str, offset: Vec2) {
        self.buttons.insert(id.to_string(), offset);
    }

    fn open_popup(&mut self, info: &str) {
        self.popup = Some(info.to_string());
    }

    fn clear_popup(&mut self) {
        self.popup = None;
    }

    fn alert(&mut self, message: &str) {
        log::info!("{message}");
        self.alerts.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_without_placement_clears_every_property() {
        let placement = PanelPlacement {
            top: "10%".into(),
            left: "5%".into(),
            width: "30%".into(),
            height: "20%".into(),
        };
        assert_eq!(
            PanelPlacement::css(Some(&placement)),
            [("top", "10%"), ("left", "5%"), ("width", "30%"), ("height", "20%")]
        );
        assert!(PanelPlacement::css(None).iter().all(|(_, value)| value.is_empty()));
    }

    #[test]
    fn info_placement_is_dropped_by_unplaced_update() {
        let placement = PanelPlacement {
            top: "1px".into(),
            left: "2px".into(),
            width: "3px".into(),
            height: "4px".into(),
        };
        let mut overlay = HeadlessOverlay::new();
        overlay.show_info("Near", Some(&placement));
        assert_eq!(overlay.info_placement(), Some(&placement));
        overlay.show_info("Far", None);
        assert_eq!(overlay.info_text(), Some("Far"));
        assert_eq!(overlay.info_placement(), None);
    }

    #[test]
    fn visibility_changes_report_each_transition_once() {
        let mut overlay = HeadlessOverlay::new();
        let front = overlay.create_label("Front");
        let back = overlay.create_label("Back");
        let mut seen = Vec::new();
        assert!(overlay.visibility_changes(&mut seen).is_empty());
        assert_eq!(seen, [false, false]);

        overlay.set_label_visible(front, true);
        let changed: Vec<&str> = overlay
            .visibility_changes(&mut seen)
            .into_iter()
            .map(|label| label.caption.as_str())
            .collect();
        assert_eq!(changed, ["Front"]);
        assert!(overlay.visibility_changes(&mut seen).is_empty());

        overlay.set_label_visible(front, false);
        overlay.set_label_visible(back, true);
        let changed: Vec<(&str, bool)> = overlay
            .visibility_changes(&mut seen)
            .into_iter()
            .map(|label| (label.caption.as_str(), label.visible))
            .collect();
        assert_eq!(changed, [("Front", false), ("Back", true)]);
    }
}
