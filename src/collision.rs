use bevy::ecs::query::Has;
use bevy::prelude::*;
use bitflags::bitflags;

use crate::damage::Health;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct CollisionLayers: u32 {
        const WORLD = 1;
        const PLAYER = 1 << 1;
        const ENEMY = 1 << 2;
        const PROJECTILE = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColliderShape {
    Sphere { radius: f32 },
    /// Axis-aligned box.
    Cuboid { half_extents: Vec3 },
}

#[derive(Component, Clone, Copy, Debug)]
pub struct Collider {
    pub shape: ColliderShape,
    pub layers: CollisionLayers,
    /// Non-solid volume.
    pub is_trigger: bool,
}

impl Collider {
    pub fn sphere(radius: f32, layers: CollisionLayers) -> Self {
        Self {
            shape: ColliderShape::Sphere { radius },
            layers,
            is_trigger: false,
        }
    }

    pub fn cuboid(half_extents: Vec3, layers: CollisionLayers) -> Self {
        Self {
            shape: ColliderShape::Cuboid { half_extents },
            layers,
            is_trigger: false,
        }
    }

    pub fn trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }
}

/// Hits against this collider are never resolved by projectiles.
#[derive(Component, Clone, Copy, Default)]
pub struct IgnoreHitDetection;

/// Routes damage taken by this collider to another entity (e.g. a hitbox to its body).
#[derive(Component, Clone, Copy, Debug)]
pub struct DamageReceiver(pub Entity);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColliderEntry {
    pub entity: Entity,
    pub center: Vec3,
    pub shape: ColliderShape,
    pub layers: CollisionLayers,
    pub is_trigger: bool,
    pub ignore_hit_detection: bool,
    /// Entity that takes damage for this collider, if it is damageable at all.
    pub receiver: Option<Entity>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepHit {
    pub collider: Entity,
    pub receiver: Option<Entity>,
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub is_trigger: bool,
    pub ignore_hit_detection: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlapHit {
    pub collider: Entity,
    pub receiver: Option<Entity>,
    pub position: Vec3,
}

/// World collision queries consumed by projectiles, melee sweeps, dashes and perception.
pub trait CollisionQuery {
    /// Every collider touched by a sphere swept from `origin` along `direction`.
    /// Order is unspecified.
    fn sphere_cast_all(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        mask: CollisionLayers,
    ) -> Vec<SweepHit>;

    fn overlap_sphere(&self, center: Vec3, radius: f32, mask: CollisionLayers) -> Vec<OverlapHit>;

    /// Nearest solid hit along a ray.
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: CollisionLayers,
    ) -> Option<SweepHit> {
        self.sphere_cast_all(origin, 0.0, direction, max_distance, mask)
            .into_iter()
            .filter(|hit| !hit.is_trigger)
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

/// Snapshot of every collider, rebuilt once per fixed tick.
#[derive(Resource, Default)]
pub struct CollisionWorld {
    pub entries: Vec<ColliderEntry>,
}

impl CollisionWorld {
    pub fn insert(&mut self, entry: ColliderEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl CollisionQuery for CollisionWorld {
    fn sphere_cast_all(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        mask: CollisionLayers,
    ) -> Vec<SweepHit> {
        let len = direction.length();
        if len <= 0.0001 {
            return Vec::new();
        }
        let dir = direction / len;
        let radius = radius.max(0.0);
        let mut hits = Vec::new();
        for entry in &self.entries {
            if !entry.layers.intersects(mask) {
                continue;
            }
            let swept = match entry.shape {
                ColliderShape::Sphere { radius: r } => {
                    ray_sphere_distance(origin, dir, max_distance, entry.center, r + radius).map(
                        |distance| {
                            let moved = origin + dir * distance;
                            let normal = (moved - entry.center).normalize_or_zero();
                            let normal = if normal == Vec3::ZERO { -dir } else { normal };
                            (distance, entry.center + normal * r, normal)
                        },
                    )
                }
                ColliderShape::Cuboid { half_extents } => {
                    let grown = half_extents + Vec3::splat(radius);
                    ray_aabb_distance(
                        origin,
                        dir,
                        max_distance,
                        entry.center - grown,
                        entry.center + grown,
                    )
                    .map(|(distance, normal)| {
                        let normal = normal.unwrap_or(-dir);
                        let moved = origin + dir * distance;
                        (distance, moved - normal * radius, normal)
                    })
                }
            };
            if let Some((distance, point, normal)) = swept {
                hits.push(SweepHit {
                    collider: entry.entity,
                    receiver: entry.receiver,
                    distance,
                    point,
                    normal,
                    is_trigger: entry.is_trigger,
                    ignore_hit_detection: entry.ignore_hit_detection,
                });
            }
        }
        hits
    }

    fn overlap_sphere(&self, center: Vec3, radius: f32, mask: CollisionLayers) -> Vec<OverlapHit> {
        self.entries
            .iter()
            .filter(|entry| entry.layers.intersects(mask))
            .filter(|entry| match entry.shape {
                ColliderShape::Sphere { radius: r } => {
                    center.distance_squared(entry.center) <= (radius + r) * (radius + r)
                }
                ColliderShape::Cuboid { half_extents } => {
                    let closest =
                        center.clamp(entry.center - half_extents, entry.center + half_extents);
                    center.distance_squared(closest) <= radius * radius
                }
            })
            .map(|entry| OverlapHit {
                collider: entry.entity,
                receiver: entry.receiver,
                position: entry.center,
            })
            .collect()
    }
}

/// Distance along a normalized ray to a sphere, 0 when starting inside.
pub fn ray_sphere_distance(
    origin: Vec3,
    dir_normalized: Vec3,
    max_distance: f32,
    center: Vec3,
    radius: f32,
) -> Option<f32> {
    let m = origin - center;
    let c = m.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let b = m.dot(dir_normalized);
    if b > 0.0 {
        return None;
    }
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let t = -b - disc.sqrt();
    if t <= max_distance {
        Some(t.max(0.0))
    } else {
        None
    }
}

/// Slab test against an axis-aligned box. Returns the entry distance and the
/// face normal that was crossed (`None` when the ray starts inside).
pub fn ray_aabb_distance(
    origin: Vec3,
    dir_normalized: Vec3,
    max_distance: f32,
    min: Vec3,
    max: Vec3,
) -> Option<(f32, Option<Vec3>)> {
    let mut tmin = 0.0f32;
    let mut tmax = max_distance.max(0.0);
    let mut entry_normal = None;

    for axis in 0..3 {
        let (o, d, mn, mx) = (origin[axis], dir_normalized[axis], min[axis], max[axis]);
        if d.abs() < 1e-6 {
            if o < mn || o > mx {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t1 = (mn - o) * inv;
        let mut t2 = (mx - o) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        if t1 > tmin {
            tmin = t1;
            let mut normal = Vec3::ZERO;
            normal[axis] = -d.signum();
            entry_normal = Some(normal);
        }
        tmax = tmax.min(t2);
        if tmin > tmax {
            return None;
        }
    }

    if tmin <= max_distance {
        Some((tmin, entry_normal))
    } else {
        None
    }
}

type ColliderQueryItem<'a> = (
    Entity,
    &'a Transform,
    &'a Collider,
    Has<IgnoreHitDetection>,
    Has<Health>,
    Option<&'a DamageReceiver>,
);

pub(crate) fn rebuild_collision_world(
    mut world: ResMut<CollisionWorld>,
    colliders: Query<ColliderQueryItem<'_>>,
) {
    world.clear();
    for (entity, transform, collider, ignore, damageable, forward) in colliders.iter() {
        let receiver = if damageable {
            Some(entity)
        } else {
            forward.map(|r| r.0)
        };
        world.insert(ColliderEntry {
            entity,
            center: transform.translation,
            shape: collider.shape,
            layers: collider.layers,
            is_trigger: collider.is_trigger,
            ignore_hit_detection: ignore,
            receiver,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(id: u32, center: Vec3, radius: f32) -> ColliderEntry {
        ColliderEntry {
            entity: Entity::from_raw(id),
            center,
            shape: ColliderShape::Sphere { radius },
            layers: CollisionLayers::PLAYER,
            is_trigger: false,
            ignore_hit_detection: false,
            receiver: Some(Entity::from_raw(id)),
        }
    }

    #[test]
    fn sphere_cast_reports_contact_distance_and_normal() {
        let mut world = CollisionWorld::default();
        world.insert(sphere(1, Vec3::new(0.0, 0.0, 10.0), 1.0));
        let hits = world.sphere_cast_all(
            Vec3::ZERO,
            0.5,
            Vec3::Z,
            20.0,
            CollisionLayers::all(),
        );
        assert_eq!(hits.len(), 1);
        assert!((hits[0].distance - 8.5).abs() < 1e-4);
        assert!((hits[0].normal - Vec3::NEG_Z).length() < 1e-4);
        assert!((hits[0].point - Vec3::new(0.0, 0.0, 9.0)).length() < 1e-4);
    }

    #[test]
    fn sphere_cast_respects_layer_mask_and_range() {
        let mut world = CollisionWorld::default();
        world.insert(sphere(1, Vec3::new(0.0, 0.0, 10.0), 1.0));
        assert!(world
            .sphere_cast_all(Vec3::ZERO, 0.5, Vec3::Z, 20.0, CollisionLayers::WORLD)
            .is_empty());
        assert!(world
            .sphere_cast_all(Vec3::ZERO, 0.5, Vec3::Z, 5.0, CollisionLayers::all())
            .is_empty());
    }

    #[test]
    fn aabb_entry_normal_faces_the_ray() {
        let (distance, normal) = ray_aabb_distance(
            Vec3::ZERO,
            Vec3::X,
            100.0,
            Vec3::new(10.0, -1.0, -1.0),
            Vec3::new(12.0, 1.0, 1.0),
        )
        .expect("ray should hit the box");
        assert!((distance - 10.0).abs() < 1e-5);
        assert_eq!(normal, Some(Vec3::NEG_X));
    }

    #[test]
    fn raycast_skips_triggers_and_returns_nearest() {
        let mut world = CollisionWorld::default();
        let mut near_trigger = sphere(1, Vec3::new(0.0, 0.0, 3.0), 1.0);
        near_trigger.is_trigger = true;
        world.insert(near_trigger);
        world.insert(ColliderEntry {
            entity: Entity::from_raw(2),
            center: Vec3::new(0.0, 0.0, 12.0),
            shape: ColliderShape::Cuboid {
                half_extents: Vec3::ONE,
            },
            layers: CollisionLayers::WORLD,
            is_trigger: false,
            ignore_hit_detection: false,
            receiver: None,
        });
        world.insert(sphere(3, Vec3::new(0.0, 0.0, 8.0), 1.0));
        let hit = world
            .raycast(Vec3::ZERO, Vec3::Z, 50.0, CollisionLayers::all())
            .expect("solid hit");
        assert_eq!(hit.collider, Entity::from_raw(3));
        assert!((hit.distance - 7.0).abs() < 1e-4);
    }

    #[test]
    fn overlap_sphere_handles_both_shapes() {
        let mut world = CollisionWorld::default();
        world.insert(sphere(1, Vec3::new(2.5, 0.0, 0.0), 0.5));
        world.insert(ColliderEntry {
            entity: Entity::from_raw(2),
            center: Vec3::new(0.0, 0.0, 5.0),
            shape: ColliderShape::Cuboid {
                half_extents: Vec3::splat(1.0),
            },
            layers: CollisionLayers::PLAYER,
            is_trigger: false,
            ignore_hit_detection: false,
            receiver: None,
        });
        let hits = world.overlap_sphere(Vec3::ZERO, 3.0, CollisionLayers::PLAYER);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].collider, Entity::from_raw(1));
        let hits = world.overlap_sphere(Vec3::ZERO, 4.5, CollisionLayers::PLAYER);
        assert_eq!(hits.len(), 2);
    }
}
