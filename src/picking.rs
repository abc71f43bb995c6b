use glam::Vec3;

use crate::camera::Ray;
use crate::landmark::LandmarkRegistry;

/// One ray intersection with a landmark's pickable geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub landmark: usize,
    pub distance: f32,
    pub point: Vec3,
}

/// Sphere that reacts to clicks for one landmark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickSphere {
    pub landmark: usize,
    pub center: Vec3,
    pub radius: f32,
}

/// Intersects `ray` with every pick sphere and returns the hits sorted by
/// distance. Equal distances keep input order.
pub fn intersect_all(ray: &Ray, spheres: &[PickSphere]) -> Vec<PickHit> {
    let mut hits: Vec<PickHit> = spheres
        .iter()
        .filter_map(|sphere| {
            ray.intersect_sphere(sphere.center, sphere.radius)
                .map(|distance| PickHit {
                    landmark: sphere.landmark,
                    distance,
                    point: ray.at(distance),
                })
        })
        .collect();
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits
}

/// Nearest landmark under the ray, if any.
pub fn pick_nearest(ray: &Ray, spheres: &[PickSphere]) -> Option<PickHit> {
    intersect_all(ray, spheres).into_iter().next()
}

/// Pick spheres for the markers of every registered landmark.
pub fn marker_spheres(registry: &LandmarkRegistry, marker_radius: f32) -> Vec<PickSphere> {
    registry
        .iter()
        .enumerate()
        .map(|(index, landmark)| PickSphere {
            landmark: index,
            center: landmark.position(),
            radius: marker_radius * landmark.marker.scale,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(landmark: usize, z: f32) -> PickSphere {
        PickSphere {
            landmark,
            center: Vec3::new(0.0, 0.0, z),
            radius: 0.5,
        }
    }

    #[test]
    fn nearest_hit_wins_regardless_of_order() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 12.0), Vec3::NEG_Z);
        let spheres = [sphere(0, -5.0), sphere(1, 5.0)];
        let hits = intersect_all(&ray, &spheres);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].landmark, 1);
        assert!((hits[0].distance - 6.5).abs() < 1e-4);
        assert_eq!(pick_nearest(&ray, &spheres).unwrap().landmark, 1);
    }

    #[test]
    fn miss_returns_none() {
        let ray = Ray::new(Vec3::new(0.0, 3.0, 12.0), Vec3::NEG_Z);
        assert!(pick_nearest(&ray, &[sphere(0, 5.0)]).is_none());
    }
}
