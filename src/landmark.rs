use glam::{Vec2, Vec3};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::overlay::{LabelId, Overlay, PanelPlacement};

/// Colored sphere drawn at a landmark position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub color: Vec3,
    pub scale: f32,
}

/// Short caption shown next to the marker, shifted by a pixel offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkLabel {
    pub caption: String,
    pub offset: Vec2,
}

/// Transform applied when the landmark model itself is placed on the globe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPlacement {
    pub scale: Vec3,
    /// Euler angles in degrees.
    pub rotation: Vec3,
}

impl Default for ModelPlacement {
    fn default() -> Self {
        Self {
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
        }
    }
}

/// Everything needed to register one landmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub position: Vec3,
    pub info: String,
    pub model_path: String,
    pub label: LandmarkLabel,
    #[serde(default)]
    pub placement: ModelPlacement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel: Option<PanelPlacement>,
}

/// A registered point of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmark {
    position: Vec3,
    info: String,
    model_path: String,
    label: LandmarkLabel,
    placement: ModelPlacement,
    panel: Option<PanelPlacement>,
    label_element: LabelId,
    pub marker: Marker,
}

impl Landmark {
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    pub fn label(&self) -> &LandmarkLabel {
        &self.label
    }

    pub fn placement(&self) -> &ModelPlacement {
        &self.placement
    }

    pub fn panel(&self) -> Option<&PanelPlacement> {
        self.panel.as_ref()
    }

    pub fn label_element(&self) -> LabelId {
        self.label_element
    }
}

/// Ordered list of landmarks in registration order. Entries are never removed.
#[derive(Debug, Default)]
pub struct LandmarkRegistry {
    landmarks: Vec<Landmark>,
    default_marker: Option<Marker>,
}

impl LandmarkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry whose new markers start with `marker`.
    pub fn with_marker(marker: Marker) -> Self {
        Self {
            landmarks: Vec::new(),
            default_marker: Some(marker),
        }
    }

    /// Registers a landmark and creates its hidden label element.
    ///
    /// Must be called on the UI thread; asset completion handlers reach this
    /// through the frame loop's event pump, never concurrently with a tick.
    pub fn register(
        &mut self,
        overlay: &mut dyn Overlay,
        registration: Registration,
    ) -> Result<&Landmark, RegistryError> {
        if !registration.position.is_finite() {
            return Err(RegistryError::NonFinitePosition);
        }
        if registration.label.caption.trim().is_empty() {
            return Err(RegistryError::EmptyCaption);
        }
        if registration.info.trim().is_empty() {
            return Err(RegistryError::EmptyInfo);
        }

        let label_element = overlay.create_label(&registration.label.caption);
        info!(
            "registered landmark {:?} at ({:.2}, {:.2}, {:.2})",
            registration.label.caption,
            registration.position.x,
            registration.position.y,
            registration.position.z
        );
        self.landmarks.push(Landmark {
            position: registration.position,
            info: registration.info,
            model_path: registration.model_path,
            label: registration.label,
            placement: registration.placement,
            panel: registration.panel,
            label_element,
            marker: self.default_marker.unwrap_or(Marker {
                color: Vec3::ONE,
                scale: 1.0,
            }),
        });
        let index = self.landmarks.len() - 1;
        Ok(&self.landmarks[index])
    }

    /// Changes the marker appearance of an existing entry.
    ///
    /// Returns `false` without touching anything when `index` is out of
    /// bounds, which happens when updates race ahead of registrations.
    pub fn update_appearance(&mut self, index: usize, color: Vec3, scale: f32) -> bool {
        match self.landmarks.get_mut(index) {
            Some(landmark) => {
                landmark.marker = Marker { color, scale };
                true
            }
            None => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.iter()
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::overlay::HeadlessOverlay;

    pub(crate) fn registration(caption: &str, position: Vec3) -> Registration {
        Registration {
            position,
            info: format!("{caption} description"),
            model_path: format!("model/{}.glb", caption.to_lowercase()),
            label: LandmarkLabel {
                caption: caption.to_string(),
                offset: Vec2::new(10.0, -20.0),
            },
            placement: ModelPlacement::default(),
            panel: None,
        }
    }

    #[test]
    fn register_creates_one_hidden_label() {
        let mut overlay = HeadlessOverlay::new();
        let mut registry = LandmarkRegistry::new();
        let label = registry
            .register(&mut overlay, registration("House", Vec3::new(5.0, 1.0, 0.0)))
            .unwrap()
            .label_element();
        assert_eq!(registry.len(), 1);
        assert_eq!(overlay.labels().len(), 1);
        let state = overlay.label(label).unwrap();
        assert_eq!(state.caption, "House");
        assert!(!state.visible);
    }

    #[test]
    fn rejects_invalid_registrations() {
        let mut overlay = HeadlessOverlay::new();
        let mut registry = LandmarkRegistry::new();
        let bad = registration("House", Vec3::new(f32::NAN, 0.0, 0.0));
        assert_eq!(
            registry.register(&mut overlay, bad).unwrap_err(),
            RegistryError::NonFinitePosition
        );
        let mut empty_info = registration("House", Vec3::X);
        empty_info.info = "  ".into();
        assert_eq!(
            registry.register(&mut overlay, empty_info).unwrap_err(),
            RegistryError::EmptyInfo
        );
        assert!(registry.is_empty());
        assert!(overlay.labels().is_empty());
    }

    #[test]
    fn update_appearance_ignores_unknown_index() {
        let mut overlay = HeadlessOverlay::new();
        let mut registry = LandmarkRegistry::new();
        assert!(!registry.update_appearance(0, Vec3::X, 2.0));
        registry
            .register(&mut overlay, registration("Hut", Vec3::Y * 5.0))
            .unwrap();
        assert!(registry.update_appearance(0, Vec3::X, 2.0));
        assert!(!registry.update_appearance(1, Vec3::X, 2.0));
        assert_eq!(registry.get(0).unwrap().marker.scale, 2.0);
    }

    #[test]
    fn keeps_registration_order() {
        let mut overlay = HeadlessOverlay::new();
        let mut registry = LandmarkRegistry::new();
        for caption in ["B", "A", "C"] {
            registry
                .register(&mut overlay, registration(caption, Vec3::Z * 5.0))
                .unwrap();
        }
        let order: Vec<_> = registry.iter().map(|l| l.label().caption.as_str()).collect();
        assert_eq!(order, ["B", "A", "C"]);
    }
}
