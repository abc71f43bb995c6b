use glam::Vec3;

use crate::landmark::{Landmark, LandmarkRegistry};

/// Default distance under which the nearest landmark is described.
pub const DEFAULT_PROXIMITY: f32 = 7.0;

/// Finds the landmark closest to `point`.
///
/// Uses a strict comparison, so on equal distances the earliest registered
/// landmark wins.
pub fn nearest_landmark(registry: &LandmarkRegistry, point: Vec3) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, landmark) in registry.iter().enumerate() {
        let distance = point.distance(landmark.position());
        if best.map_or(true, |(_, closest)| distance < closest) {
            best = Some((index, distance));
        }
    }
    best
}

/// Landmark whose info should fill the fixed panel, if any is close enough.
pub fn landmark_in_range(
    registry: &LandmarkRegistry,
    camera_position: Vec3,
    threshold: f32,
) -> Option<&Landmark> {
    nearest_landmark(registry, camera_position)
        .filter(|(_, distance)| *distance < threshold)
        .and_then(|(index, _)| registry.get(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::tests::registration;
    use crate::overlay::HeadlessOverlay;

    fn registry(positions: &[(&str, Vec3)]) -> LandmarkRegistry {
        let mut overlay = HeadlessOverlay::new();
        let mut registry = LandmarkRegistry::new();
        for (caption, position) in positions {
            registry
                .register(&mut overlay, registration(caption, *position))
                .unwrap();
        }
        registry
    }

    #[test]
    fn picks_minimum_distance() {
        let registry = registry(&[
            ("Far", Vec3::new(0.0, 0.0, -5.0)),
            ("Near", Vec3::new(0.0, 0.0, 5.0)),
            ("Side", Vec3::new(5.0, 0.0, 0.0)),
        ]);
        let (index, distance) = nearest_landmark(&registry, Vec3::new(0.0, 0.0, 12.0)).unwrap();
        assert_eq!(index, 1);
        assert!((distance - 7.0).abs() < 1e-5);
    }

    #[test]
    fn ties_resolve_to_earliest_registered() {
        let registry = registry(&[
            ("Left", Vec3::new(-5.0, 0.0, 0.0)),
            ("Right", Vec3::new(5.0, 0.0, 0.0)),
        ]);
        let (index, _) = nearest_landmark(&registry, Vec3::new(0.0, 0.0, 12.0)).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn nothing_in_range_from_default_camera() {
        let registry = registry(&[
            ("Forest House", Vec3::new(5.0, 1.0, 0.0)),
            ("Tiny House", Vec3::new(1.0, 5.0, 0.0)),
        ]);
        let camera = Vec3::new(0.0, 0.0, 12.0);
        assert!(landmark_in_range(&registry, camera, DEFAULT_PROXIMITY).is_none());
        let close = Vec3::new(5.0, 1.0, 6.0);
        let found = landmark_in_range(&registry, close, DEFAULT_PROXIMITY).unwrap();
        assert_eq!(found.label().caption, "Forest House");
    }

    #[test]
    fn empty_registry_has_no_nearest() {
        assert!(nearest_landmark(&LandmarkRegistry::new(), Vec3::ZERO).is_none());
    }
}
