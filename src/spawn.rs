use std::collections::VecDeque;

use bevy::prelude::*;
use rand::Rng;

use crate::collision::{Collider, CollisionLayers};
use crate::components::{PhysicsBody, Player, SpawnedBy};
use crate::config::{vec3, AddTemplate, SpawnConfig, SpawnerConfig};
use crate::damage::Health;
use crate::error::CombatError;
use crate::events::{CombatIo, EffectRequest};
use crate::navigation::NavAgent;
use crate::registry::SpawnedEntityRegistry;

/// Instantiate one add from a template, returns the Entity id
pub fn spawn_add(
    commands: &mut Commands,
    template: &AddTemplate,
    position: Vec3,
    owner: Option<Entity>,
) -> Entity {
    commands
        .spawn((
            Name::new(template.name.clone()),
            Transform::from_translation(position),
            Health::new(template.health),
            Collider::sphere(template.radius, CollisionLayers::ENEMY),
            PhysicsBody::default(),
            NavAgent::new(template.move_speed),
            SpawnedBy(owner),
        ))
        .id()
}

/// Spawns up to `count` adds at random spawn points from random templates,
/// registering each with the owner's registry. Stops when the registry fills.
pub fn spawn_wave(
    commands: &mut Commands,
    rng: &mut impl Rng,
    config: &SpawnConfig,
    count: usize,
    owner: Entity,
    registry: &mut SpawnedEntityRegistry,
) -> Result<Vec<Entity>, CombatError> {
    if config.points.is_empty() {
        return Err(CombatError::NoSpawnPoints);
    }
    if config.templates.is_empty() {
        return Err(CombatError::NoSpawnTemplates);
    }
    let mut spawned = Vec::new();
    for _ in 0..count.min(registry.remaining_capacity()) {
        let point = config.points[rng.gen_range(0..config.points.len())];
        let template = &config.templates[rng.gen_range(0..config.templates.len())];
        let entity = spawn_add(commands, template, vec3(point), Some(owner));
        if !registry.try_register(entity) {
            commands.entity(entity).despawn();
            break;
        }
        spawned.push(entity);
    }
    Ok(spawned)
}

/// Proximity-triggered spawner. Fires once, then triggers its linked
/// spawners one after another.
#[derive(Component, Clone, Debug)]
pub struct AddSpawner {
    pub trigger_radius: f32,
    pub spawn_delay: f32,
    pub linked: Vec<Entity>,
    pub linked_delay: f32,
    pub template: Option<AddTemplate>,
    pub effect: Option<String>,
    triggered: bool,
    spawn_at: Option<f32>,
    link_queue: VecDeque<Entity>,
    next_link_at: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpawnerPoll {
    pub spawn_now: bool,
    pub trigger_link: Option<Entity>,
}

impl AddSpawner {
    pub fn from_config(config: &SpawnerConfig, linked: Vec<Entity>) -> Self {
        Self {
            trigger_radius: config.trigger_radius,
            spawn_delay: config.spawn_delay,
            linked,
            linked_delay: config.linked_delay,
            template: config.template.clone(),
            effect: config.spawn_vfx.clone(),
            triggered: false,
            spawn_at: None,
            link_queue: VecDeque::new(),
            next_link_at: 0.0,
        }
    }

    pub fn has_triggered(&self) -> bool {
        self.triggered
    }

    pub fn trigger(&mut self, now: f32) -> bool {
        if self.triggered {
            return false;
        }
        self.triggered = true;
        self.spawn_at = Some(now + self.spawn_delay);
        self.link_queue = self.linked.iter().copied().collect();
        self.next_link_at = now + self.linked_delay;
        true
    }

    /// At most one linked spawner is released per poll.
    pub fn poll(&mut self, now: f32) -> SpawnerPoll {
        let mut out = SpawnerPoll::default();
        if self.spawn_at.is_some_and(|at| now >= at) {
            self.spawn_at = None;
            out.spawn_now = true;
        }
        if !self.link_queue.is_empty() && now >= self.next_link_at {
            out.trigger_link = self.link_queue.pop_front();
            self.next_link_at = now + self.linked_delay;
        }
        out
    }
}

/// Spawns one spawner entity per config, resolving link indices to entities.
pub fn spawn_add_spawners(commands: &mut Commands, configs: &[SpawnerConfig]) -> Vec<Entity> {
    let ids: Vec<Entity> = configs
        .iter()
        .map(|cfg| {
            commands
                .spawn((
                    Name::new("add_spawner"),
                    Transform::from_translation(vec3(cfg.position)),
                ))
                .id()
        })
        .collect();
    for (cfg, id) in configs.iter().zip(&ids) {
        let linked = cfg
            .linked
            .iter()
            .filter_map(|index| {
                let found = ids.get(*index).copied();
                if found.is_none() {
                    warn!("[Nemesis spawn] Spawner link index {} out of range", index);
                }
                found
            })
            .filter(|linked| linked != id)
            .collect();
        commands
            .entity(*id)
            .insert(AddSpawner::from_config(cfg, linked));
    }
    ids
}

pub(crate) fn run_add_spawners(
    time: Res<Time<Fixed>>,
    mut io: CombatIo,
    players: Query<&Transform, With<Player>>,
    mut spawners: Query<(Entity, &Transform, &mut AddSpawner), Without<Player>>,
) {
    let now = time.elapsed_secs();
    let mut linked_triggers = Vec::new();

    for (entity, transform, mut spawner) in spawners.iter_mut() {
        if !spawner.has_triggered() {
            let near = players.iter().any(|player| {
                player.translation.distance(transform.translation) <= spawner.trigger_radius
            });
            if near {
                fire_spawner(&mut io, entity, transform, &mut spawner, now);
            }
        }

        let poll = spawner.poll(now);
        if poll.spawn_now {
            match &spawner.template {
                Some(template) => {
                    let add = spawn_add(&mut io.commands, template, transform.translation, None);
                    io.events.emit(
                        "adds_spawned",
                        serde_json::json!({ "spawner": entity.to_bits(), "adds": [add.to_bits()] }),
                        Some(entity),
                    );
                }
                None => warn!("[Nemesis spawn] Spawner {:?} has no template", entity),
            }
        }
        if let Some(link) = poll.trigger_link {
            linked_triggers.push(link);
        }
    }

    for link in linked_triggers {
        if let Ok((entity, transform, mut spawner)) = spawners.get_mut(link) {
            fire_spawner(&mut io, entity, transform, &mut spawner, now);
        }
    }
}

fn fire_spawner(
    io: &mut CombatIo,
    entity: Entity,
    transform: &Transform,
    spawner: &mut AddSpawner,
    now: f32,
) {
    if !spawner.trigger(now) {
        return;
    }
    if let Some(effect) = &spawner.effect {
        io.effects.send(EffectRequest {
            effect: effect.clone(),
            position: transform.translation,
            facing: None,
        });
    }
    io.events.emit(
        "spawner_triggered",
        serde_json::json!({ "spawner": entity.to_bits() }),
        Some(entity),
    );
}
