use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::PerspectiveCamera;

const POLE_EPSILON: f32 = 1e-6;

/// Tunables of the orbit controls as read from the scene document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitSettings {
    pub min_distance: f32,
    pub max_distance: f32,
    /// Polar range in radians, measured from the +Y axis.
    pub min_polar: f32,
    pub max_polar: f32,
    pub enable_zoom: bool,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            min_distance: 7.0,
            max_distance: 12.0,
            min_polar: 0.0,
            max_polar: PI,
            enable_zoom: true,
            enable_damping: true,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
        }
    }
}

/// Camera manipulation around a fixed target with damping and distance clamps.
///
/// Input only accumulates deltas; [`OrbitControls::update`] applies them to
/// the camera once per frame. Panning is not supported.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    settings: OrbitSettings,
    target: Vec3,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
}

impl OrbitControls {
    pub fn new(settings: OrbitSettings) -> Self {
        Self {
            settings,
            target: Vec3::ZERO,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
        }
    }

    pub fn settings(&self) -> &OrbitSettings {
        &self.settings
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Rotates by a pointer drag of `delta` pixels; a drag across the full
    /// viewport height turns the globe once.
    pub fn rotate_by_pixels(&mut self, delta: Vec2, viewport_height: u32) {
        let height = viewport_height.max(1) as f32;
        self.delta_theta -= TAU * delta.x / height * self.settings.rotate_speed;
        self.delta_phi -= TAU * delta.y / height * self.settings.rotate_speed;
    }

    /// Zooms by one wheel step. Negative `delta_y` moves the camera closer.
    pub fn zoom_by_wheel(&mut self, delta_y: f32) {
        if !self.settings.enable_zoom || delta_y == 0.0 {
            return;
        }
        let step = 0.95f32.powf(self.settings.zoom_speed);
        if delta_y < 0.0 {
            self.scale *= step;
        } else {
            self.scale /= step;
        }
    }

    /// Advances the damping integrator by one step and moves the camera.
    ///
    /// Returns `true` when the camera position changed.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.position - self.target;
        let mut radius = offset.length();
        let (mut theta, mut phi) = if radius > 0.0 {
            (
                offset.x.atan2(offset.z),
                (offset.y / radius).clamp(-1.0, 1.0).acos(),
            )
        } else {
            (0.0, 0.0)
        };

        if self.settings.enable_damping {
            theta += self.delta_theta * self.settings.damping_factor;
            phi += self.delta_phi * self.settings.damping_factor;
        } else {
            theta += self.delta_theta;
            phi += self.delta_phi;
        }

        phi = phi
            .clamp(self.settings.min_polar, self.settings.max_polar)
            .clamp(POLE_EPSILON, PI - POLE_EPSILON);
        radius = (radius * self.scale).clamp(self.settings.min_distance, self.settings.max_distance);

        let sin_phi = phi.sin();
        let new_offset = Vec3::new(
            radius * sin_phi * theta.sin(),
            radius * phi.cos(),
            radius * sin_phi * theta.cos(),
        );
        let previous = camera.position;
        camera.position = self.target + new_offset;
        camera.target = self.target;

        if self.settings.enable_damping {
            self.delta_theta *= 1.0 - self.settings.damping_factor;
            self.delta_phi *= 1.0 - self.settings.damping_factor;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
        }
        self.scale = 1.0;

        previous.distance_squared(camera.position) > 1e-12
    }

    /// Normalized position of `distance` between the zoom clamps (0 at the
    /// minimum distance, 1 at the maximum).
    pub fn zoom_fraction(&self, distance: f32) -> f32 {
        let span = self.settings.max_distance - self.settings.min_distance;
        if span <= f32::EPSILON {
            return 0.0;
        }
        ((distance - self.settings.min_distance) / span).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_update_keeps_camera_in_place() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::new(OrbitSettings::default());
        controls.update(&mut camera);
        assert!((camera.position - Vec3::new(0.0, 0.0, 12.0)).length() < 1e-4);
    }

    #[test]
    fn zoom_is_clamped_to_min_distance() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::new(OrbitSettings::default());
        for _ in 0..50 {
            controls.zoom_by_wheel(-1.0);
            controls.update(&mut camera);
        }
        assert!((camera.position.length() - 7.0).abs() < 1e-4);
        for _ in 0..50 {
            controls.zoom_by_wheel(1.0);
            controls.update(&mut camera);
        }
        assert!((camera.position.length() - 12.0).abs() < 1e-4);
    }

    #[test]
    fn damping_spreads_rotation_over_frames() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::new(OrbitSettings::default());
        controls.rotate_by_pixels(Vec2::new(-100.0, 0.0), 720);
        controls.update(&mut camera);
        let first = camera.position.x;
        assert!(first > 0.0);
        assert!(controls.update(&mut camera));
        assert!(camera.position.x > first);
        assert!((camera.position.length() - 12.0).abs() < 1e-3);
    }

    #[test]
    fn polar_angle_never_reaches_the_pole() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::new(OrbitSettings {
            enable_damping: false,
            ..OrbitSettings::default()
        });
        controls.rotate_by_pixels(Vec2::new(0.0, 5000.0), 720);
        controls.update(&mut camera);
        assert!(camera.position.y > 11.9);
        assert!(camera.position.x.is_finite() && camera.position.z.is_finite());
        assert!(camera.position.z.abs() < 1e-3);
        assert!((camera.position.length() - 12.0).abs() < 1e-3);
    }

    #[test]
    fn zoom_fraction_interpolates_between_clamps() {
        let controls = OrbitControls::new(OrbitSettings::default());
        assert_eq!(controls.zoom_fraction(7.0), 0.0);
        assert_eq!(controls.zoom_fraction(12.0), 1.0);
        assert!((controls.zoom_fraction(9.5) - 0.5).abs() < 1e-6);
        assert_eq!(controls.zoom_fraction(3.0), 0.0);
    }
}
