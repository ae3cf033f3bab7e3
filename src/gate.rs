use bevy::prelude::*;

use crate::components::Player;
use crate::events::GameEventBus;
use crate::orchestrator::AttackOrchestrator;

/// One-shot zone that arms a boss when a player walks in.
#[derive(Component, Clone, Debug)]
pub struct ActivationGate {
    pub boss: Entity,
    pub radius: f32,
    fired: bool,
}

impl ActivationGate {
    pub fn new(boss: Entity, radius: f32) -> Self {
        Self {
            boss,
            radius,
            fired: false,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// True exactly once: the first time a qualifying position is inside.
    pub fn try_fire(&mut self, center: Vec3, visitor: Vec3) -> bool {
        if self.fired || center.distance_squared(visitor) > self.radius * self.radius {
            return false;
        }
        self.fired = true;
        true
    }
}

pub(crate) fn check_activation_gates(
    mut commands: Commands,
    mut events: ResMut<GameEventBus>,
    mut gates: Query<(Entity, &Transform, &mut ActivationGate)>,
    players: Query<(Entity, &Transform), (With<Player>, Without<ActivationGate>)>,
    mut bosses: Query<&mut AttackOrchestrator>,
) {
    for (gate_entity, gate_transform, mut gate) in gates.iter_mut() {
        let Some((player, _)) = players
            .iter()
            .find(|(_, t)| gate.try_fire(gate_transform.translation, t.translation))
        else {
            continue;
        };
        events.emit(
            "gate_triggered",
            serde_json::json!({
                "gate": gate_entity.to_bits(),
                "actor": player.to_bits(),
                "boss": gate.boss.to_bits(),
            }),
            Some(gate_entity),
        );
        match bosses.get_mut(gate.boss) {
            Ok(mut orchestrator) => {
                if orchestrator.activate() {
                    info!("[Nemesis gate] Boss {:?} activated", gate.boss);
                }
            }
            Err(_) => warn!("[Nemesis gate] Gate {:?} points at a missing boss", gate_entity),
        }
        commands.entity(gate_entity).despawn();
    }
}
