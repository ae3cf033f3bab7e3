use std::collections::HashSet;

use bevy::prelude::*;
use rand::Rng;

use crate::collision::{CollisionLayers, CollisionQuery};
use crate::config::{vec3, WeaponConfig};
use crate::dispatch::Listeners;
use crate::error::CombatError;

/// Candidates exactly on the cone edge stay inside despite float noise.
const MELEE_ARC_TOLERANCE_DEG: f32 = 1e-3;

#[derive(Clone, Debug, PartialEq)]
pub enum WeaponNotification {
    FireCompleted { shots: usize },
    MeleeCompleted { target_position: Vec3, hits: usize },
}

/// One projectile to spawn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectileLaunch {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// Result of a fire request: where the muzzle was and what left it.
#[derive(Clone, Debug, PartialEq)]
pub struct Volley {
    pub muzzle: Vec3,
    pub facing: Vec3,
    pub launches: Vec<ProjectileLaunch>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeleeStrike {
    pub collider: Entity,
    pub receiver: Entity,
    pub angle: f32,
}

/// A weapon mount on its owner: ranged fire with spread, or a melee cone sweep.
pub struct WeaponExecutor {
    pub config: WeaponConfig,
    pub listeners: Listeners<WeaponNotification>,
}

impl WeaponExecutor {
    pub fn new(config: WeaponConfig) -> Self {
        Self {
            config,
            listeners: Listeners::default(),
        }
    }

    /// World-space muzzle position and forward axis for an owner pose.
    /// The offset is (right, up, forward) in the owner's frame.
    pub fn muzzle(&self, owner: &Transform) -> Result<(Vec3, Vec3), CombatError> {
        let offset = vec3(self.config.muzzle_offset.ok_or(CombatError::MissingMuzzle)?);
        let forward = owner.forward().as_vec3();
        let position = owner.translation
            + owner.right().as_vec3() * offset.x
            + owner.up().as_vec3() * offset.y
            + forward * offset.z;
        Ok((position, forward))
    }

    pub fn fire(
        &mut self,
        owner: &Transform,
        target: Option<Vec3>,
        rng: &mut impl Rng,
    ) -> Result<Volley, CombatError> {
        let (muzzle, forward) = self.muzzle(owner)?;
        let base = match target {
            Some(target) if self.config.aim_at_target => {
                (target - muzzle).try_normalize().unwrap_or(forward)
            }
            _ => forward,
        };
        let launches: Vec<ProjectileLaunch> = (0..self.config.projectiles_per_shot)
            .map(|_| ProjectileLaunch {
                origin: muzzle,
                direction: apply_spread(base, self.config.spread_angle, rng),
            })
            .collect();
        self.listeners.dispatch(&WeaponNotification::FireCompleted {
            shots: launches.len(),
        });
        Ok(Volley {
            muzzle,
            facing: base,
            launches,
        })
    }

    /// Damageable candidates inside the melee cone. `owner_parts` holds the
    /// owner and every collider it owns; none of them are ever struck.
    pub fn melee_sweep(
        &mut self,
        owner: &Transform,
        owner_parts: &HashSet<Entity>,
        target_position: Vec3,
        world: &impl CollisionQuery,
    ) -> Result<Vec<MeleeStrike>, CombatError> {
        if !self.config.is_melee {
            return Err(CombatError::NotMelee);
        }
        let (origin, forward) = self.muzzle(owner)?;
        let mut struck = HashSet::new();
        let mut strikes = Vec::new();
        for hit in world.overlap_sphere(origin, self.config.melee_range, CollisionLayers::PLAYER) {
            if owner_parts.contains(&hit.collider) {
                continue;
            }
            let Some(receiver) = hit.receiver else {
                continue;
            };
            if owner_parts.contains(&receiver) {
                continue;
            }
            let to_candidate = hit.position - origin;
            if !within_melee_arc(forward, to_candidate, self.config.melee_angle) {
                continue;
            }
            if struck.insert(receiver) {
                strikes.push(MeleeStrike {
                    collider: hit.collider,
                    receiver,
                    angle: angle_to(forward, to_candidate),
                });
            }
        }
        self.listeners.dispatch(&WeaponNotification::MeleeCompleted {
            target_position,
            hits: strikes.len(),
        });
        Ok(strikes)
    }
}

/// Slerps `base` toward a random direction by `spread_deg / 180`.
pub fn apply_spread(base: Vec3, spread_deg: f32, rng: &mut impl Rng) -> Vec3 {
    if spread_deg <= 0.0 {
        return base;
    }
    let ratio = (spread_deg / 180.0).min(1.0);
    let random = random_direction(rng);
    let arc = Quat::from_rotation_arc(base, random);
    (Quat::IDENTITY.slerp(arc, ratio) * base).normalize()
}

fn random_direction(rng: &mut impl Rng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        let len_sq = v.length_squared();
        if len_sq > 1e-4 && len_sq <= 1.0 {
            return v / len_sq.sqrt();
        }
    }
}

fn angle_to(forward: Vec3, to_candidate: Vec3) -> f32 {
    let dir = to_candidate.normalize_or_zero();
    if dir == Vec3::ZERO {
        return 0.0;
    }
    forward.angle_between(dir).to_degrees()
}

/// Inside the cone when the angle from `forward` is at most half of `melee_angle`.
pub fn within_melee_arc(forward: Vec3, to_candidate: Vec3, melee_angle: f32) -> bool {
    angle_to(forward, to_candidate) <= melee_angle * 0.5 + MELEE_ARC_TOLERANCE_DEG
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::sync::{Arc, Mutex};

    use crate::collision::{ColliderEntry, ColliderShape, CollisionWorld};

    fn player_at(id: u32, position: Vec3) -> ColliderEntry {
        ColliderEntry {
            entity: Entity::from_raw(id),
            center: position,
            shape: ColliderShape::Sphere { radius: 0.3 },
            layers: CollisionLayers::PLAYER,
            is_trigger: false,
            ignore_hit_detection: false,
            receiver: Some(Entity::from_raw(id)),
        }
    }

    fn melee_weapon() -> WeaponExecutor {
        WeaponExecutor::new(WeaponConfig {
            muzzle_offset: Some([0.0, 0.0, 0.0]),
            melee_range: 5.0,
            melee_angle: 90.0,
            ..WeaponConfig::melee()
        })
    }

    /// Owner at the origin facing +Z.
    fn owner_pose() -> Transform {
        Transform::from_translation(Vec3::ZERO).looking_to(Vec3::Z, Vec3::Y)
    }

    fn at_angle(deg: f32, distance: f32) -> Vec3 {
        let rad = deg.to_radians();
        Vec3::new(rad.sin(), 0.0, rad.cos()) * distance
    }

    #[test]
    fn melee_arc_includes_exact_half_angle_and_excludes_beyond() {
        assert!(within_melee_arc(Vec3::Z, at_angle(45.0, 2.0), 90.0));
        assert!(!within_melee_arc(Vec3::Z, at_angle(45.5, 2.0), 90.0));
        assert!(within_melee_arc(Vec3::Z, at_angle(-45.0, 2.0), 90.0));
    }

    #[test]
    fn melee_sweep_skips_owner_parts_and_out_of_cone_candidates() {
        let mut world = CollisionWorld::default();
        world.insert(player_at(1, at_angle(10.0, 2.0)));
        world.insert(player_at(2, at_angle(60.0, 2.0)));
        world.insert(player_at(3, at_angle(0.0, 1.0)));
        world.insert(player_at(4, at_angle(0.0, 9.0)));
        let owner_parts: HashSet<Entity> = [Entity::from_raw(3)].into_iter().collect();

        let mut weapon = melee_weapon();
        let strikes = weapon
            .melee_sweep(&owner_pose(), &owner_parts, Vec3::Z, &world)
            .expect("melee weapon");
        let receivers: Vec<Entity> = strikes.iter().map(|s| s.receiver).collect();
        assert_eq!(receivers, vec![Entity::from_raw(1)]);
    }

    #[test]
    fn melee_sweep_on_ranged_weapon_is_rejected() {
        let mut weapon = WeaponExecutor::new(WeaponConfig::default());
        let result = weapon.melee_sweep(
            &owner_pose(),
            &HashSet::new(),
            Vec3::Z,
            &CollisionWorld::default(),
        );
        assert_eq!(result, Err(CombatError::NotMelee));
    }

    #[test]
    fn fire_aims_at_target_and_notifies() {
        let mut weapon = WeaponExecutor::new(WeaponConfig {
            projectiles_per_shot: 3,
            ..WeaponConfig::default()
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            weapon
                .listeners
                .subscribe(move |n| seen.lock().unwrap().push(n.clone()));
        }
        let mut rng = SmallRng::seed_from_u64(3);
        let target = Vec3::new(10.0, 1.5, 1.0);
        let volley = weapon
            .fire(&owner_pose(), Some(target), &mut rng)
            .expect("muzzle present");
        assert_eq!(volley.launches.len(), 3);
        assert!((volley.muzzle - Vec3::new(0.0, 1.5, 1.0)).length() < 1e-5);
        for launch in &volley.launches {
            assert!((launch.direction - Vec3::X).length() < 1e-5);
        }
        assert_eq!(
            *seen.lock().unwrap(),
            vec![WeaponNotification::FireCompleted { shots: 3 }]
        );
    }

    #[test]
    fn fire_without_muzzle_is_a_configuration_gap() {
        let mut weapon = WeaponExecutor::new(WeaponConfig {
            muzzle_offset: None,
            ..WeaponConfig::default()
        });
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(
            weapon.fire(&owner_pose(), None, &mut rng),
            Err(CombatError::MissingMuzzle)
        );
        assert!(weapon.listeners.is_empty());
    }

    #[test]
    fn spread_stays_within_configured_angle() {
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..500 {
            let dir = apply_spread(Vec3::Z, 20.0, &mut rng);
            assert!((dir.length() - 1.0).abs() < 1e-4);
            // Slerp by 20/180 of an arc of at most 180 degrees.
            assert!(Vec3::Z.angle_between(dir).to_degrees() <= 20.0 + 1e-2);
        }
        assert_eq!(apply_spread(Vec3::Z, 0.0, &mut rng), Vec3::Z);
    }
}
