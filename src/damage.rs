use bevy::ecs::query::Has;
use bevy::prelude::*;

use crate::components::OwnedBy;
use crate::events::GameEventBus;
use crate::orchestrator::AttackOrchestrator;

/// Anything that can take a hit.
pub trait DamageSink {
    fn inflict_damage(&mut self, amount: f32, instigator: Option<Entity>);
}

#[derive(Component, Clone, Copy, Debug)]
pub struct Health {
    pub current: f32,
    pub max: f32,
    pub last_instigator: Option<Entity>,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self {
            current: max,
            max,
            last_instigator: None,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0.0
    }
}

impl DamageSink for Health {
    fn inflict_damage(&mut self, amount: f32, instigator: Option<Entity>) {
        if self.is_dead() {
            return;
        }
        self.current = (self.current - amount.max(0.0)).max(0.0);
        self.last_instigator = instigator;
    }
}

#[derive(Event, Clone, Copy, Debug, PartialEq)]
pub struct DamageEvent {
    pub target: Entity,
    pub amount: f32,
    pub instigator: Option<Entity>,
}

/// Completes once any boss dies.
#[derive(Resource, Default, Clone, Copy, Debug)]
pub struct BossObjective {
    pub completed: bool,
}

pub struct DamagePlugin;

impl Plugin for DamagePlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<DamageEvent>()
            .insert_resource(BossObjective::default());
    }
}

pub(crate) fn apply_damage(
    mut reader: EventReader<DamageEvent>,
    mut sinks: Query<&mut Health>,
) {
    for event in reader.read() {
        let Ok(mut health) = sinks.get_mut(event.target) else {
            debug!("[Nemesis damage] Target {:?} has no health", event.target);
            continue;
        };
        health.inflict_damage(event.amount, event.instigator);
    }
}

pub(crate) fn death_system(
    mut commands: Commands,
    mut events: ResMut<GameEventBus>,
    mut objective: ResMut<BossObjective>,
    query: Query<(Entity, &Health, Has<AttackOrchestrator>)>,
    parts: Query<(Entity, &OwnedBy)>,
) {
    for (entity, health, is_boss) in query.iter() {
        if !health.is_dead() {
            continue;
        }
        events.emit(
            "entity_died",
            serde_json::json!({
                "entity": entity.to_bits(),
                "boss": is_boss,
                "instigator": health.last_instigator.map(Entity::to_bits),
            }),
            Some(entity),
        );
        if is_boss && !objective.completed {
            objective.completed = true;
            info!("[Nemesis objective] Boss eliminated");
            events.emit(
                "objective_completed",
                serde_json::json!({ "boss": entity.to_bits() }),
                Some(entity),
            );
        }
        for (part, owned_by) in parts.iter() {
            if owned_by.0 == entity {
                commands.entity(part).despawn();
            }
        }
        commands.entity(entity).despawn();
    }
}
