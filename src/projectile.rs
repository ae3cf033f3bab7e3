use std::collections::HashSet;

use bevy::prelude::*;

use crate::collision::{CollisionLayers, CollisionQuery, CollisionWorld, SweepHit};
use crate::config::ProjectileConfig;
use crate::damage::DamageEvent;
use crate::events::{CombatIo, EffectRequest, SoundRequest};

/// Impact effects are pushed off the surface by this much.
const IMPACT_SURFACE_OFFSET: f32 = 0.1;
/// Below this squared step length the projectile keeps its orientation.
const MIN_ORIENT_STEP_SQ: f32 = 0.0001;

#[derive(Clone, Debug)]
pub struct Homing {
    pub strength: f32,
    pub delay: f32,
    /// Degrees per second.
    pub max_turn_angle: f32,
    pub target: Option<Entity>,
}

#[derive(Component, Clone, Debug)]
pub struct Projectile {
    pub position: Vec3,
    pub direction: Vec3,
    pub speed: f32,
    pub damage: f32,
    pub radius: f32,
    pub homing: Option<Homing>,
    pub owner: Option<Entity>,
    /// Owner colliders; never hit.
    pub ignored: HashSet<Entity>,
    pub hittable: CollisionLayers,
    pub time_to_live: f32,
    pub age: f32,
    pub last_position: Vec3,
    pub impact_vfx: Option<String>,
    pub impact_sfx: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProjectileStep {
    Flying,
    Hit(SweepHit),
    Expired,
}

impl Projectile {
    pub fn launch(
        origin: Vec3,
        direction: Vec3,
        config: &ProjectileConfig,
        owner: Option<Entity>,
        ignored: HashSet<Entity>,
        target: Option<Entity>,
    ) -> Self {
        let direction = direction.try_normalize().unwrap_or(Vec3::Z);
        let homing = config.homing.enabled.then(|| Homing {
            strength: config.homing.strength,
            delay: config.homing.delay,
            max_turn_angle: config.homing.max_turn_angle,
            target,
        });
        Self {
            position: origin,
            direction,
            speed: config.speed,
            damage: config.damage,
            radius: config.radius,
            homing,
            owner,
            ignored,
            hittable: CollisionLayers::from_bits_truncate(config.hittable_layers),
            time_to_live: config.max_lifetime,
            age: 0.0,
            last_position: origin,
            impact_vfx: config.impact_vfx.clone(),
            impact_sfx: config.impact_sfx.clone(),
        }
    }

    pub fn homing_target(&self) -> Option<Entity> {
        self.homing.as_ref().and_then(|h| h.target)
    }

    /// Advances one tick. `target_position` is the homing target's current
    /// position, `None` when the target is gone.
    pub fn step(
        &mut self,
        dt: f32,
        target_position: Option<Vec3>,
        world: &impl CollisionQuery,
    ) -> ProjectileStep {
        self.age += dt;
        if self.age >= self.time_to_live {
            return ProjectileStep::Expired;
        }

        if let (Some(homing), Some(target)) = (&self.homing, target_position) {
            if self.age > homing.delay {
                let desired = (target - self.position).normalize_or_zero();
                if desired != Vec3::ZERO {
                    let angle = self.direction.angle_between(desired).to_degrees();
                    let factor =
                        homing_turn_factor(homing.strength, homing.max_turn_angle, angle, dt);
                    self.direction = steer_toward(self.direction, desired, factor);
                }
            }
        }

        self.position += self.direction * self.speed * dt;

        let displacement = self.position - self.last_position;
        let distance = displacement.length();
        if distance > f32::EPSILON {
            let hits = world.sphere_cast_all(
                self.last_position,
                self.radius,
                displacement / distance,
                distance,
                self.hittable,
            );
            if let Some(hit) = first_valid_hit(hits, &self.ignored) {
                return ProjectileStep::Hit(hit);
            }
        }

        self.last_position = self.position;
        ProjectileStep::Flying
    }
}

/// Fraction of the remaining angle to turn this tick: the homing strength
/// bound or the max-turn-rate bound, whichever is tighter.
pub fn homing_turn_factor(strength: f32, max_turn_angle: f32, angle_deg: f32, dt: f32) -> f32 {
    let turn_speed = strength * dt;
    let max_delta_angle = max_turn_angle * dt;
    turn_speed.min(max_delta_angle / angle_deg.max(0.1))
}

/// Spherical interpolation between two unit headings.
pub fn steer_toward(current: Vec3, desired: Vec3, factor: f32) -> Vec3 {
    let t = factor.clamp(0.0, 1.0);
    let arc = Quat::from_rotation_arc(current, desired);
    (Quat::IDENTITY.slerp(arc, t) * current).normalize()
}

pub fn is_valid_hit(hit: &SweepHit, ignored: &HashSet<Entity>) -> bool {
    if ignored.contains(&hit.collider) {
        return false;
    }
    if hit.ignore_hit_detection {
        return false;
    }
    if hit.is_trigger && hit.receiver.is_none() {
        return false;
    }
    true
}

/// Nearest hit that survives filtering; at most one hit resolves per tick.
pub fn first_valid_hit(mut hits: Vec<SweepHit>, ignored: &HashSet<Entity>) -> Option<SweepHit> {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits.into_iter().find(|hit| is_valid_hit(hit, ignored))
}

pub fn face_along(transform: &mut Transform, direction: Vec3) {
    let up = if direction.cross(Vec3::Y).length_squared() > 1e-6 {
        Vec3::Y
    } else {
        Vec3::Z
    };
    transform.look_to(direction, up);
}

pub(crate) fn simulate_projectiles(
    time: Res<Time<Fixed>>,
    world: Res<CollisionWorld>,
    mut io: CombatIo,
    mut projectiles: Query<(Entity, &mut Transform, &mut Projectile)>,
    targets: Query<&Transform, Without<Projectile>>,
) {
    let dt = time.delta_secs();
    for (entity, mut transform, mut projectile) in projectiles.iter_mut() {
        let target_position = projectile
            .homing_target()
            .and_then(|target| targets.get(target).ok())
            .map(|t| t.translation);
        let before = projectile.position;
        let outcome = projectile.step(dt, target_position, world.as_ref());
        transform.translation = projectile.position;
        if (projectile.position - before).length_squared() > MIN_ORIENT_STEP_SQ {
            face_along(&mut transform, projectile.direction);
        }

        match outcome {
            ProjectileStep::Flying => {}
            ProjectileStep::Expired => {
                io.events.emit(
                    "projectile_expired",
                    serde_json::json!({ "projectile": entity.to_bits(), "age": projectile.age }),
                    Some(entity),
                );
                io.commands.entity(entity).despawn();
            }
            ProjectileStep::Hit(hit) => {
                if let Some(receiver) = hit.receiver {
                    io.damage.send(DamageEvent {
                        target: receiver,
                        amount: projectile.damage,
                        instigator: projectile.owner,
                    });
                }
                let effect_at = hit.point + hit.normal * IMPACT_SURFACE_OFFSET;
                if let Some(vfx) = &projectile.impact_vfx {
                    io.effects.send(EffectRequest {
                        effect: vfx.clone(),
                        position: effect_at,
                        facing: Some(hit.normal),
                    });
                }
                if let Some(sfx) = &projectile.impact_sfx {
                    io.sounds.send(SoundRequest {
                        clip: sfx.clone(),
                        position: hit.point,
                    });
                }
                io.events.emit(
                    "projectile_hit",
                    serde_json::json!({
                        "projectile": entity.to_bits(),
                        "collider": hit.collider.to_bits(),
                        "target": hit.receiver.map(Entity::to_bits),
                        "damage": projectile.damage,
                        "distance": hit.distance,
                    }),
                    projectile.owner,
                );
                io.commands.entity(entity).despawn();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use bevy::ecs::system::RunSystemOnce;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use crate::collision::{ColliderEntry, ColliderShape, OverlapHit};
    use crate::events::{AnimationCue, GameEventBus};

    /// Returns canned hits regardless of the query.
    struct CannedWorld(Vec<SweepHit>);

    impl CollisionQuery for CannedWorld {
        fn sphere_cast_all(
            &self,
            _origin: Vec3,
            _radius: f32,
            _direction: Vec3,
            _max_distance: f32,
            _mask: CollisionLayers,
        ) -> Vec<SweepHit> {
            self.0.clone()
        }

        fn overlap_sphere(&self, _: Vec3, _: f32, _: CollisionLayers) -> Vec<OverlapHit> {
            Vec::new()
        }
    }

    fn hit(id: u32, distance: f32) -> SweepHit {
        SweepHit {
            collider: Entity::from_raw(id),
            receiver: Some(Entity::from_raw(id)),
            distance,
            point: Vec3::new(0.0, 0.0, distance),
            normal: Vec3::NEG_Z,
            is_trigger: false,
            ignore_hit_detection: false,
        }
    }

    fn straight_projectile(ttl: f32) -> Projectile {
        let config = ProjectileConfig {
            max_lifetime: ttl,
            ..ProjectileConfig::default()
        };
        Projectile::launch(Vec3::ZERO, Vec3::Z, &config, None, HashSet::new(), None)
    }

    #[test]
    fn nearest_valid_hit_wins_over_ignored_and_filtered_hits() {
        let owner_collider = 1;
        let mut marked = hit(2, 0.2);
        marked.ignore_hit_detection = true;
        let mut bare_trigger = hit(3, 0.3);
        bare_trigger.is_trigger = true;
        bare_trigger.receiver = None;
        let mut damageable_trigger = hit(4, 0.9);
        damageable_trigger.is_trigger = true;
        let hits = vec![
            hit(5, 1.5),
            damageable_trigger,
            bare_trigger,
            hit(owner_collider, 0.1),
            marked,
        ];
        let ignored: HashSet<Entity> = [Entity::from_raw(owner_collider)].into_iter().collect();
        let chosen = first_valid_hit(hits, &ignored).expect("a valid hit");
        assert_eq!(chosen.collider, Entity::from_raw(4));
    }

    #[test]
    fn owner_collider_is_ignored_even_when_nearest() {
        let mut projectile = straight_projectile(5.0);
        projectile.ignored.insert(Entity::from_raw(1));
        let world = CannedWorld(vec![hit(1, 0.0), hit(2, 0.4)]);
        match projectile.step(0.1, None, &world) {
            ProjectileStep::Hit(h) => assert_eq!(h.collider, Entity::from_raw(2)),
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn no_hit_keeps_flying_and_advances_sweep_origin() {
        let mut projectile = straight_projectile(5.0);
        let world = CannedWorld(Vec::new());
        assert_eq!(projectile.step(0.5, None, &world), ProjectileStep::Flying);
        assert!((projectile.position - Vec3::new(0.0, 0.0, 7.5)).length() < 1e-5);
        assert_eq!(projectile.last_position, projectile.position);
    }

    #[test]
    fn expires_exactly_at_time_to_live() {
        let mut projectile = straight_projectile(5.0);
        let world = CannedWorld(Vec::new());
        for tick in 1..20 {
            assert_eq!(
                projectile.step(0.25, None, &world),
                ProjectileStep::Flying,
                "expired early at tick {tick}"
            );
        }
        assert_eq!(projectile.step(0.25, None, &world), ProjectileStep::Expired);
        assert_eq!(projectile.age, 5.0);
    }

    #[test]
    fn homing_waits_for_activation_delay() {
        let mut config = ProjectileConfig::default();
        config.homing.enabled = true;
        config.homing.delay = 0.5;
        let mut projectile = Projectile::launch(
            Vec3::ZERO,
            Vec3::Z,
            &config,
            None,
            HashSet::new(),
            Some(Entity::from_raw(7)),
        );
        let world = CannedWorld(Vec::new());
        let target = Some(Vec3::new(50.0, 0.0, 0.0));
        projectile.step(0.25, target, &world);
        projectile.step(0.25, target, &world);
        assert_eq!(projectile.direction, Vec3::Z);
        projectile.step(0.25, target, &world);
        assert!(projectile.direction.x > 0.0);
        assert!((projectile.direction.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn homing_turn_never_exceeds_either_bound() {
        let mut rng = SmallRng::seed_from_u64(0xB055);
        for _ in 0..2000 {
            let current = random_unit(&mut rng);
            let desired = random_unit(&mut rng);
            let angle = current.angle_between(desired).to_degrees();
            if angle < 1.0 || angle > 179.0 {
                continue;
            }
            let dt = rng.gen_range(0.001..0.1f32);
            let strength = rng.gen_range(0.1..20.0f32);
            let max_turn = rng.gen_range(1.0..360.0f32);

            let factor = homing_turn_factor(strength, max_turn, angle, dt);
            assert!(factor <= strength * dt + 1e-6);
            assert!(factor <= max_turn * dt / angle.max(0.1) + 1e-6);

            let next = steer_toward(current, desired, factor);
            let turned = current
                .as_dvec3()
                .angle_between(next.as_dvec3())
                .to_degrees();
            let bound = f64::from(factor.min(1.0)) * f64::from(angle);
            assert!(
                turned <= bound + 1e-3,
                "turned {turned} > bound {bound} (angle {angle}, dt {dt})"
            );
            assert!(turned <= f64::from(max_turn * dt) + 1e-3);
        }
    }

    #[test]
    fn steer_handles_opposite_headings() {
        let next = steer_toward(Vec3::Z, Vec3::NEG_Z, 0.5);
        assert!((next.length() - 1.0).abs() < 1e-5);
        assert!(next.z.abs() < 1e-3);
    }

    fn combat_world() -> World {
        let mut world = World::new();
        world.init_resource::<CollisionWorld>();
        world.insert_resource(Time::<Fixed>::default());
        world.init_resource::<GameEventBus>();
        world.init_resource::<Events<DamageEvent>>();
        world.init_resource::<Events<EffectRequest>>();
        world.init_resource::<Events<SoundRequest>>();
        world.init_resource::<Events<AnimationCue>>();
        world
    }

    fn run_tick(world: &mut World) {
        world
            .resource_mut::<Time<Fixed>>()
            .advance_by(Duration::from_millis(250));
        world.run_system_once(simulate_projectiles).unwrap();
    }

    #[test]
    fn impact_damages_receiver_and_despawns_projectile() {
        let mut world = combat_world();
        let owner = world.spawn_empty().id();
        let victim = world.spawn_empty().id();
        world.resource_mut::<CollisionWorld>().insert(ColliderEntry {
            entity: victim,
            center: Vec3::new(0.0, 0.0, 5.0),
            shape: ColliderShape::Sphere { radius: 0.5 },
            layers: CollisionLayers::PLAYER,
            is_trigger: false,
            ignore_hit_detection: false,
            receiver: Some(victim),
        });
        let config = ProjectileConfig {
            impact_vfx: Some("spark".to_string()),
            ..ProjectileConfig::default()
        };
        let shot = world
            .spawn((
                Transform::default(),
                Projectile::launch(
                    Vec3::ZERO,
                    Vec3::Z,
                    &config,
                    Some(owner),
                    HashSet::from([owner]),
                    None,
                ),
            ))
            .id();

        // 15 u/s at 0.25 s per tick: contact happens during the second tick.
        run_tick(&mut world);
        assert!(world.get_entity(shot).is_ok());
        assert!(world.resource::<Events<DamageEvent>>().is_empty());
        run_tick(&mut world);
        assert!(world.get_entity(shot).is_err());

        let damage: Vec<DamageEvent> =
            world.resource_mut::<Events<DamageEvent>>().drain().collect();
        assert_eq!(
            damage,
            vec![DamageEvent {
                target: victim,
                amount: config.damage,
                instigator: Some(owner),
            }]
        );
        let effects: Vec<EffectRequest> =
            world.resource_mut::<Events<EffectRequest>>().drain().collect();
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].effect, "spark");
        assert!((effects[0].position - Vec3::new(0.0, 0.0, 4.4)).length() < 1e-4);
        assert_eq!(effects[0].facing, Some(Vec3::NEG_Z));
        assert_eq!(world.resource::<GameEventBus>().count("projectile_hit"), 1);
    }

    #[test]
    fn unobstructed_projectile_despawns_on_its_lifetime_tick() {
        let mut world = combat_world();
        let shot = world
            .spawn((Transform::default(), straight_projectile(1.0)))
            .id();
        for _ in 0..3 {
            run_tick(&mut world);
        }
        assert!(world.get_entity(shot).is_ok());
        assert_eq!(world.resource::<GameEventBus>().count("projectile_expired"), 0);
        run_tick(&mut world);
        assert!(world.get_entity(shot).is_err());
        assert_eq!(world.resource::<GameEventBus>().count("projectile_expired"), 1);
    }

    fn random_unit(rng: &mut SmallRng) -> Vec3 {
        loop {
            let v = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            if v.length_squared() > 0.01 && v.length_squared() <= 1.0 {
                return v.normalize();
            }
        }
    }
}
