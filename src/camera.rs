use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Perspective camera looking at a target point.
///
/// Projection uses the wgpu clip-space convention (`0 <= z <= w`), which is
/// also what [`Frustum::from_view_proj`] expects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveCamera {
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
            position: Vec3::new(0.0, 0.0, 12.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }
}

impl PerspectiveCamera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect.max(0.01),
            self.near,
            self.far,
        )
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Updates the aspect ratio from viewport pixel dimensions.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    /// Projects a world position into normalized device coordinates.
    pub fn project(&self, world: Vec3) -> Vec3 {
        self.view_proj().project_point3(world)
    }

    /// Casts a ray from the camera through a point given in normalized device coordinates.
    pub fn ray_through(&self, ndc: Vec2) -> Ray {
        let inverse = self.view_proj().inverse();
        let point = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 0.5));
        Ray::new(self.position, point - self.position)
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_proj(self.view_proj())
    }

    pub fn distance_to_target(&self) -> f32 {
        self.position.distance(self.target)
    }
}

/// Maps normalized device coordinates to a pixel position (origin top-left).
pub fn ndc_to_pixels(ndc: Vec2, viewport: (u32, u32)) -> Vec2 {
    let (width, height) = (viewport.0 as f32, viewport.1 as f32);
    Vec2::new((ndc.x * 0.5 + 0.5) * width, (-ndc.y * 0.5 + 0.5) * height)
}

/// Maps a pixel position (origin top-left) to normalized device coordinates.
pub fn pixels_to_ndc(pixels: Vec2, viewport: (u32, u32)) -> Vec2 {
    let (width, height) = (viewport.0.max(1) as f32, viewport.1.max(1) as f32);
    Vec2::new(pixels.x / width * 2.0 - 1.0, -(pixels.y / height) * 2.0 + 1.0)
}

/// Half-line with a normalized direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Distance along the ray to the first intersection with a sphere.
    ///
    /// Returns the exit distance when the origin lies inside the sphere and
    /// `None` when the sphere is missed or entirely behind the origin.
    pub fn intersect_sphere(&self, center: Vec3, radius: f32) -> Option<f32> {
        if self.direction == Vec3::ZERO {
            return None;
        }
        let to_center = center - self.origin;
        let along = to_center.dot(self.direction);
        let closest_sq = to_center.length_squared() - along * along;
        let radius_sq = radius * radius;
        if closest_sq > radius_sq {
            return None;
        }
        let half_chord = (radius_sq - closest_sq).sqrt();
        let near = along - half_chord;
        let far = along + half_chord;
        if far < 0.0 {
            None
        } else if near < 0.0 {
            Some(far)
        } else {
            Some(near)
        }
    }
}

/// View frustum as six normalized planes `(n, d)` stored in a `Vec4`.
///
/// A point `p` is inside iff `n . p + d >= 0` for every plane, so points
/// lying exactly on a boundary plane count as inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extracts the planes from a view-projection matrix using the `0 <= z <= w` convention.
    pub fn from_view_proj(m: Mat4) -> Self {
        let (r0, r1, r2, r3) = (m.row(0), m.row(1), m.row(2), m.row(3));
        let planes = [
            r3 + r0, // left
            r3 - r0, // right
            r3 + r1, // bottom
            r3 - r1, // top
            r2,      // near
            r3 - r2, // far
        ]
        .map(normalize_plane);
        Self { planes }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        let p = point.extend(1.0);
        self.planes.iter().all(|plane| plane.dot(p) >= 0.0)
    }
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let length = plane.truncate().length();
    if length <= f32::EPSILON {
        plane
    } else {
        plane / length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> PerspectiveCamera {
        let mut camera = PerspectiveCamera::default();
        camera.set_viewport(1280, 720);
        camera
    }

    #[test]
    fn target_projects_to_screen_center() {
        let ndc = camera().project(Vec3::ZERO);
        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        let px = ndc_to_pixels(ndc.truncate(), (1280, 720));
        assert!((px - Vec2::new(640.0, 360.0)).length() < 1e-3);
    }

    #[test]
    fn pixel_mapping_round_trips_corners() {
        let ndc = pixels_to_ndc(Vec2::ZERO, (800, 600));
        assert_eq!(ndc, Vec2::new(-1.0, 1.0));
        let px = ndc_to_pixels(Vec2::new(1.0, -1.0), (800, 600));
        assert_eq!(px, Vec2::new(800.0, 600.0));
    }

    #[test]
    fn frustum_rejects_points_behind_camera() {
        let frustum = camera().frustum();
        assert!(frustum.contains_point(Vec3::ZERO));
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -5.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 20.0)));
        assert!(!frustum.contains_point(Vec3::new(500.0, 0.0, 0.0)));
    }

    #[test]
    fn center_ray_points_at_target() {
        let ray = camera().ray_through(Vec2::ZERO);
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-4);
        let hit = ray.intersect_sphere(Vec3::ZERO, 5.0).unwrap();
        assert!((hit - 7.0).abs() < 1e-3);
    }

    #[test]
    fn sphere_behind_origin_is_missed() {
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert!(ray.intersect_sphere(Vec3::new(0.0, 0.0, -3.0), 1.0).is_none());
        assert!(ray.intersect_sphere(Vec3::new(0.0, 3.0, 3.0), 1.0).is_none());
        assert_eq!(ray.intersect_sphere(Vec3::ZERO, 2.0), Some(2.0));
    }
}
