use std::collections::HashSet;

use bevy::prelude::*;
use serde::Serialize;

use crate::collision::{Collider, ColliderShape, CollisionLayers, CollisionWorld, DamageReceiver};
use crate::components::{CombatRng, OwnedBy, PhysicsBody};
use crate::config::BossConfig;
use crate::damage::{DamageEvent, Health};
use crate::dash::{DashMotion, DashState};
use crate::error::CombatError;
use crate::events::{AnimationCue, CombatIo, EffectRequest, SoundRequest};
use crate::navigation::NavAgent;
use crate::orchestrator::{
    AttackKind, AttackOrchestrator, BossNotification, BossState, CombatCommand, TargetView,
    TickInput,
};
use crate::perception::Perception;
use crate::projectile::{face_along, Projectile};
use crate::registry::SpawnedEntityRegistry;
use crate::spawn::spawn_wave;
use crate::weapon::WeaponExecutor;

/// Hitbox size for a spawned boss body.
const BOSS_HALF_EXTENTS: Vec3 = Vec3::new(1.0, 2.0, 1.0);

/// Weapon mounts carried by a boss.
#[derive(Component)]
pub struct BossArsenal {
    pub melee: Option<WeaponExecutor>,
    /// Fired together; one or two mounts in practice.
    pub ranged: Vec<WeaponExecutor>,
}

impl BossArsenal {
    pub fn from_config(config: &BossConfig) -> Self {
        Self {
            melee: config.melee_weapon.clone().map(WeaponExecutor::new),
            ranged: config
                .ranged_weapons
                .iter()
                .cloned()
                .map(WeaponExecutor::new)
                .collect(),
        }
    }
}

/// Coarse behaviour label for animation and UI.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum BossPhase {
    #[default]
    Inactive,
    Patrol,
    Follow,
    MeleeAttack,
    RangedAttack,
    Spawning,
}

impl BossPhase {
    pub fn from_state(state: BossState, has_target: bool) -> Self {
        match state {
            BossState::Inactive => BossPhase::Inactive,
            BossState::ExecutingMelee(_) => BossPhase::MeleeAttack,
            BossState::ExecutingRanged(_) => BossPhase::RangedAttack,
            BossState::ExecutingSpawn { .. } => BossPhase::Spawning,
            BossState::Idle | BossState::SelectingAttack | BossState::Recovering { .. } => {
                if has_target {
                    BossPhase::Follow
                } else {
                    BossPhase::Patrol
                }
            }
        }
    }
}

/// Spawns a dormant boss plus its hitbox and returns the boss entity.
pub fn spawn_boss(
    commands: &mut Commands,
    config: &BossConfig,
    position: Vec3,
    facing: Vec3,
    health: f32,
) -> Entity {
    let mut transform = Transform::from_translation(position);
    if let Some(dir) = Vec3::new(facing.x, 0.0, facing.z).try_normalize() {
        transform.look_to(dir, Vec3::Y);
    }
    let mut agent = NavAgent::new(config.move_speed);
    agent.enabled = false;
    let mut perception = Perception::new(config.detection_range, config.melee_range);
    perception.require_line_of_sight = config.require_line_of_sight;

    let boss = commands
        .spawn((
            Name::new("boss"),
            transform,
            Health::new(health),
            PhysicsBody::default(),
            agent,
            perception,
            SpawnedEntityRegistry::new(config.spawn.max_spawned),
            BossArsenal::from_config(config),
            AttackOrchestrator::new(config.clone()),
            BossPhase::Inactive,
        ))
        .id();
    commands.spawn((
        Name::new("boss_hitbox"),
        Transform::from_translation(position + Vec3::Y * BOSS_HALF_EXTENTS.y),
        Collider::cuboid(BOSS_HALF_EXTENTS, CollisionLayers::ENEMY),
        DamageReceiver(boss),
        OwnedBy(boss),
    ));
    boss
}

/// Keeps owned parts centred above their owner.
pub(crate) fn follow_owners(
    owners: Query<&Transform, Without<OwnedBy>>,
    mut parts: Query<(&OwnedBy, &mut Transform, Option<&Collider>)>,
) {
    for (owned_by, mut transform, collider) in parts.iter_mut() {
        let Ok(owner) = owners.get(owned_by.0) else {
            continue;
        };
        let lift = match collider.map(|c| c.shape) {
            Some(ColliderShape::Cuboid { half_extents }) => half_extents.y,
            Some(ColliderShape::Sphere { radius }) => radius,
            None => 0.0,
        };
        transform.translation = owner.translation + Vec3::Y * lift;
        transform.rotation = owner.rotation;
    }
}

type BossQueryItem<'a> = (
    Entity,
    &'a mut Transform,
    &'a mut AttackOrchestrator,
    &'a mut Perception,
    &'a mut NavAgent,
    &'a mut SpawnedEntityRegistry,
    &'a mut BossArsenal,
    &'a mut BossPhase,
);

pub(crate) fn drive_orchestrators(
    time: Res<Time<Fixed>>,
    world: Res<CollisionWorld>,
    mut rng: ResMut<CombatRng>,
    mut io: CombatIo,
    mut bosses: Query<BossQueryItem<'_>>,
    parts: Query<(Entity, &OwnedBy)>,
) {
    let now = time.elapsed_secs();
    for (
        boss,
        mut transform,
        mut orch,
        mut perception,
        mut agent,
        mut registry,
        mut arsenal,
        mut phase,
    ) in bosses.iter_mut()
    {
        let target = perception
            .known_target
            .zip(perception.known_target_position)
            .map(|(entity, position)| TargetView {
                entity,
                position,
                in_attack_range: perception.is_target_in_attack_range(transform.translation),
            });
        let input = TickInput {
            position: transform.translation,
            forward: transform.forward().as_vec3(),
            target,
            spawned: registry.len(),
            spawn_capacity: registry.capacity(),
        };
        orch.tick(now, &input, &mut rng.0);

        for command in orch.drain_commands() {
            match command {
                CombatCommand::EnableNavigation => agent.enabled = true,
                CombatCommand::SetDestination(point) => agent.set_destination(point),
                CombatCommand::Halt => agent.stop(),
                CombatCommand::SetAttackRange(range) => perception.attack_range = range,
                CombatCommand::Face(point) => {
                    let flat = Vec3::new(
                        point.x - transform.translation.x,
                        0.0,
                        point.z - transform.translation.z,
                    );
                    if let Some(dir) = flat.try_normalize() {
                        face_along(&mut transform, dir);
                    }
                }
                CombatCommand::Cue(cue) => {
                    io.cues.send(AnimationCue { entity: boss, cue });
                }
                CombatCommand::ActivationEffects => {
                    let effects = &orch.config.effects;
                    play(
                        &mut io,
                        effects.activation_vfx.as_deref(),
                        effects.activation_sfx.as_deref(),
                        transform.translation,
                        None,
                    );
                }
                CombatCommand::SpawnEffects => {
                    let vfx = orch.config.effects.spawn_vfx.as_deref();
                    play(&mut io, vfx, None, transform.translation, None);
                }
                CombatCommand::MeleeSweep { target_position } => {
                    let owner_parts = owner_parts(boss, &parts);
                    let cues = orch.config.cues.weapon_melee.clone();
                    let melee_vfx = orch.config.effects.melee_vfx.clone();
                    let Some(weapon) = arsenal.melee.as_mut() else {
                        report_gap(
                            boss,
                            CombatError::MissingWeapon {
                                kind: AttackKind::Melee,
                            },
                        );
                        continue;
                    };
                    let swept =
                        weapon.melee_sweep(&transform, &owner_parts, target_position, world.as_ref());
                    match swept {
                        Ok(strikes) => {
                            io.cues.send(AnimationCue {
                                entity: boss,
                                cue: cues,
                            });
                            play(
                                &mut io,
                                melee_vfx.as_deref(),
                                weapon.config.melee_sfx.as_deref(),
                                transform.translation,
                                Some(transform.forward().as_vec3()),
                            );
                            for strike in &strikes {
                                debug!(
                                    "[Nemesis weapon] Melee hit {:?} for {}",
                                    strike.receiver, weapon.config.melee_damage
                                );
                                io.damage.send(DamageEvent {
                                    target: strike.receiver,
                                    amount: weapon.config.melee_damage,
                                    instigator: Some(boss),
                                });
                            }
                            io.events.emit(
                                "melee_hit",
                                serde_json::json!({
                                    "boss": boss.to_bits(),
                                    "targets": strikes.iter().map(|s| s.receiver.to_bits()).collect::<Vec<_>>(),
                                    "damage": weapon.config.melee_damage,
                                }),
                                Some(boss),
                            );
                        }
                        Err(err) => report_gap(boss, err),
                    }
                }
                CombatCommand::Fire {
                    target,
                    target_position,
                } => {
                    if arsenal.ranged.is_empty() {
                        report_gap(
                            boss,
                            CombatError::MissingWeapon {
                                kind: AttackKind::Ranged,
                            },
                        );
                        continue;
                    }
                    let ignored = owner_parts(boss, &parts);
                    let fire_cue = orch.config.cues.weapon_fire.clone();
                    let ranged_vfx = orch.config.effects.ranged_vfx.clone();
                    let mut shots = 0usize;
                    for weapon in arsenal.ranged.iter_mut() {
                        let volley = match weapon.fire(&transform, Some(target_position), &mut rng.0)
                        {
                            Ok(volley) => volley,
                            Err(err) => {
                                report_gap(boss, err);
                                continue;
                            }
                        };
                        io.cues.send(AnimationCue {
                            entity: boss,
                            cue: fire_cue.clone(),
                        });
                        let facing = Some(volley.facing);
                        play(
                            &mut io,
                            weapon.config.muzzle_flash.as_deref(),
                            weapon.config.fire_sfx.as_deref(),
                            volley.muzzle,
                            facing,
                        );
                        play(&mut io, ranged_vfx.as_deref(), None, volley.muzzle, facing);
                        for launch in &volley.launches {
                            let mut projectile_transform =
                                Transform::from_translation(launch.origin);
                            face_along(&mut projectile_transform, launch.direction);
                            io.commands.spawn((
                                Name::new("boss_projectile"),
                                projectile_transform,
                                Projectile::launch(
                                    launch.origin,
                                    launch.direction,
                                    &weapon.config.projectile,
                                    Some(boss),
                                    ignored.clone(),
                                    Some(target),
                                ),
                            ));
                            shots += 1;
                        }
                    }
                    io.events.emit(
                        "boss_fire",
                        serde_json::json!({
                            "boss": boss.to_bits(),
                            "target": target.to_bits(),
                            "shots": shots,
                        }),
                        Some(boss),
                    );
                }
                CombatCommand::Dash {
                    direction,
                    distance,
                    duration,
                } => {
                    let dash = &orch.config.dash;
                    let state = DashState::plan(
                        transform.translation,
                        direction,
                        distance,
                        duration,
                        dash.clearance,
                        world.as_ref(),
                    );
                    io.events.emit(
                        "boss_dash",
                        serde_json::json!({
                            "boss": boss.to_bits(),
                            "requested": state.requested_distance,
                            "distance": state.distance,
                        }),
                        Some(boss),
                    );
                    let motion = DashMotion::new(state, dash.step_snap_radius, dash.snap_radius);
                    io.commands.entity(boss).insert(motion);
                }
                CombatCommand::SpawnAdds { count } => {
                    let wave = spawn_wave(
                        &mut io.commands,
                        &mut rng.0,
                        &orch.config.spawn,
                        count,
                        boss,
                        &mut registry,
                    );
                    match wave {
                        Ok(adds) => {
                            info!(
                                "[Nemesis spawn] Boss {:?} spawned {} adds ({}/{})",
                                boss,
                                adds.len(),
                                registry.len(),
                                registry.capacity()
                            );
                            io.events.emit(
                                "adds_spawned",
                                serde_json::json!({
                                    "boss": boss.to_bits(),
                                    "adds": adds.iter().map(|e| e.to_bits()).collect::<Vec<_>>(),
                                    "alive": registry.len(),
                                }),
                                Some(boss),
                            );
                        }
                        Err(err) => report_gap(boss, err),
                    }
                }
                CombatCommand::Notify(notification) => {
                    record_notification(&mut io, boss, notification);
                }
            }
        }

        let next = BossPhase::from_state(orch.state(), target.is_some());
        if *phase != next {
            *phase = next;
        }
    }
}

fn owner_parts(owner: Entity, parts: &Query<(Entity, &OwnedBy)>) -> HashSet<Entity> {
    let mut set: HashSet<Entity> = parts
        .iter()
        .filter(|(_, owned_by)| owned_by.0 == owner)
        .map(|(entity, _)| entity)
        .collect();
    set.insert(owner);
    set
}

fn play(
    io: &mut CombatIo,
    vfx: Option<&str>,
    sfx: Option<&str>,
    position: Vec3,
    facing: Option<Vec3>,
) {
    if let Some(effect) = vfx {
        io.effects.send(EffectRequest {
            effect: effect.to_string(),
            position,
            facing,
        });
    }
    if let Some(clip) = sfx {
        io.sounds.send(SoundRequest {
            clip: clip.to_string(),
            position,
        });
    }
}

fn report_gap(boss: Entity, err: CombatError) {
    warn!("[Nemesis boss] {:?} skipped attack: {}", boss, err);
}

fn record_notification(io: &mut CombatIo, boss: Entity, notification: BossNotification) {
    let (name, data) = match notification {
        BossNotification::Activated => (
            "boss_activated",
            serde_json::json!({ "boss": boss.to_bits() }),
        ),
        BossNotification::AttackStarted(kind) => (
            "boss_attack",
            serde_json::json!({ "boss": boss.to_bits(), "kind": kind }),
        ),
        BossNotification::AttackAborted { kind, reason } => (
            "attack_aborted",
            serde_json::json!({ "boss": boss.to_bits(), "kind": kind, "reason": reason }),
        ),
        BossNotification::AttackFinished(kind) => (
            "attack_finished",
            serde_json::json!({ "boss": boss.to_bits(), "kind": kind }),
        ),
    };
    io.events.emit(name, data, Some(boss));
}
