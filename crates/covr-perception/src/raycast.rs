//! Ray casting against a flat set of axis-aligned colliders.
//!
//! # Key types
//!
//! | Type | Role |
//! |------|------|
//! | [`Collider`]    | An [`Aabb`] tagged with a caller-chosen key.              |
//! | [`RayHit`]      | The key, distance and point of the nearest intersection. |
//! | [`PhysicsWorld`]| Anything that can answer a nearest-hit ray query.        |
//! | [`ColliderSet`] | Linear-scan implementation of [`PhysicsWorld`].          |
//!
//! # Example
//!
//! ```rust
//! use covr_perception::raycast::{ColliderSet, PhysicsWorld};
//! use covr_types::{Aabb, Ray, Vec3};
//!
//! let mut world = ColliderSet::new();
//! world.insert("wall", Aabb::from_center(Vec3::new(0.0, 0.0, 2.0), Vec3::new(1.0, 1.0, 0.1)));
//! world.insert("lamp", Aabb::from_center(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.5, 0.5, 0.5)));
//!
//! let hit = world.raycast(&Ray::new(Vec3::ZERO, Vec3::FORWARD), 15.0).unwrap();
//! assert_eq!(hit.key, "wall");
//! ```

use covr_types::{Aabb, Ray, Vec3};

/// A collider: bounds plus the key reported on a hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider<K> {
    pub key: K,
    pub bounds: Aabb,
}

/// Nearest intersection along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit<K> {
    pub key: K,
    pub distance: f32,
    pub point: Vec3,
}

/// A queryable collision world.
pub trait PhysicsWorld<K> {
    /// Nearest collider hit by `ray` within `max_distance`, if any.
    fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<RayHit<K>>;
}

/// Flat list of colliders.
///
/// Queries are a linear scan; on equal distances the collider inserted first
/// wins.
#[derive(Debug, Clone)]
pub struct ColliderSet<K> {
    colliders: Vec<Collider<K>>,
}

impl<K> Default for ColliderSet<K> {
    fn default() -> Self {
        Self {
            colliders: Vec::new(),
        }
    }
}

impl<K> ColliderSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: K, bounds: Aabb) {
        self.colliders.push(Collider { key, bounds });
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Collider<K>> {
        self.colliders.iter()
    }
}

impl<K: PartialEq> ColliderSet<K> {
    /// Bounds of the first collider registered under `key`.
    pub fn get(&self, key: &K) -> Option<&Aabb> {
        self.colliders
            .iter()
            .find(|c| &c.key == key)
            .map(|c| &c.bounds)
    }
}

impl<K: Copy> PhysicsWorld<K> for ColliderSet<K> {
    fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<RayHit<K>> {
        let mut best: Option<RayHit<K>> = None;
        for collider in &self.colliders {
            let Some(t) = collider.bounds.intersect_ray(ray, max_distance) else {
                continue;
            };
            if best.as_ref().is_none_or(|b| t < b.distance) {
                best = Some(RayHit {
                    key: collider.key,
                    distance: t,
                    point: ray.at(t),
                });
            }
        }
        best
    }
}
