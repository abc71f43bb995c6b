use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::{ndc_to_pixels, Frustum, PerspectiveCamera};

/// Per-frame classification of a landmark against the camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibilityTest {
    /// Maximum absolute NDC coordinate on each axis (strict).
    pub ndc_threshold: Vec2,
    /// Center of the globe; outward normals start here.
    pub globe_center: Vec3,
}

impl Default for VisibilityTest {
    fn default() -> Self {
        Self {
            ndc_threshold: Vec2::new(0.5, 0.5),
            globe_center: Vec3::ZERO,
        }
    }
}

/// Result of the visibility test plus where the label should go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub visible: bool,
    pub ndc: Vec3,
    pub screen: Vec2,
}

impl VisibilityTest {
    /// Classifies `position` for the current camera state.
    ///
    /// A landmark is visible when it lies in the view frustum, its projection
    /// is strictly inside the NDC threshold box, and it faces the camera.
    pub fn classify(
        &self,
        camera: &PerspectiveCamera,
        frustum: &Frustum,
        position: Vec3,
        viewport: (u32, u32),
    ) -> Classification {
        let ndc = camera.project(position);
        let visible = frustum.contains_point(position)
            && ndc.x.abs() < self.ndc_threshold.x
            && ndc.y.abs() < self.ndc_threshold.y
            && self.faces_camera(position, camera.position);
        Classification {
            visible,
            ndc,
            screen: ndc_to_pixels(ndc.truncate(), viewport),
        }
    }

    /// True when the angle between the outward normal at `position` and the
    /// direction from `position` to the camera is strictly below 90 degrees.
    pub fn faces_camera(&self, position: Vec3, camera_position: Vec3) -> bool {
        let normal = position - self.globe_center;
        let to_camera = camera_position - position;
        normal.dot(to_camera) > 0.0
    }
}
