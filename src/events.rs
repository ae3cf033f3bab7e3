use std::collections::VecDeque;

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use serde::Serialize;

use crate::damage::DamageEvent;

const MAX_EVENTS: usize = 500;

#[derive(Serialize, Clone, Debug)]
pub struct GameEvent {
    pub name: String,
    pub data: serde_json::Value,
    pub frame: u64,
    pub source_entity: Option<u64>,
}

/// Bounded log of combat happenings, newest last.
#[derive(Resource, Default)]
pub struct GameEventBus {
    pub recent: VecDeque<GameEvent>,
    pub frame: u64,
    /// Events pushed out of `recent` by newer ones.
    pub dropped_events: u64,
}

impl GameEventBus {
    pub fn emit(
        &mut self,
        name: impl Into<String>,
        data: serde_json::Value,
        source_entity: Option<Entity>,
    ) {
        if self.recent.len() == MAX_EVENTS {
            self.recent.pop_front();
            self.dropped_events += 1;
        }
        self.recent.push_back(GameEvent {
            name: name.into(),
            data,
            frame: self.frame,
            source_entity: source_entity.map(Entity::to_bits),
        });
    }

    pub fn count(&self, name: &str) -> usize {
        self.recent.iter().filter(|e| e.name == name).count()
    }
}

/// Named trigger for the animation director. Fire-and-forget.
#[derive(Event, Clone, Debug, PartialEq)]
pub struct AnimationCue {
    pub entity: Entity,
    pub cue: String,
}

/// One-shot clip played at a world position.
#[derive(Event, Clone, Debug, PartialEq)]
pub struct SoundRequest {
    pub clip: String,
    pub position: Vec3,
}

/// Visual effect instantiated at a pose.
#[derive(Event, Clone, Debug, PartialEq)]
pub struct EffectRequest {
    pub effect: String,
    pub position: Vec3,
    pub facing: Option<Vec3>,
}

/// Outputs shared by the combat systems.
#[derive(SystemParam)]
pub(crate) struct CombatIo<'w, 's> {
    pub commands: Commands<'w, 's>,
    pub events: ResMut<'w, GameEventBus>,
    pub damage: EventWriter<'w, DamageEvent>,
    pub effects: EventWriter<'w, EffectRequest>,
    pub sounds: EventWriter<'w, SoundRequest>,
    pub cues: EventWriter<'w, AnimationCue>,
}

pub struct GameEventsPlugin;

impl Plugin for GameEventsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(GameEventBus::default())
            .add_event::<AnimationCue>()
            .add_event::<SoundRequest>()
            .add_event::<EffectRequest>()
            .add_systems(FixedUpdate, tick_event_frame);
    }
}

fn tick_event_frame(mut bus: ResMut<GameEventBus>) {
    bus.frame = bus.frame.saturating_add(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_bus_tracks_dropped_events() {
        let mut bus = GameEventBus::default();
        for i in 0..(MAX_EVENTS + 25) {
            bus.emit("test", serde_json::json!({ "i": i }), None);
        }
        assert_eq!(bus.recent.len(), MAX_EVENTS);
        assert_eq!(bus.dropped_events, 25);
        assert_eq!(bus.recent[0].data["i"], 25);
    }

    #[test]
    fn count_filters_by_name() {
        let mut bus = GameEventBus::default();
        bus.emit("melee_hit", serde_json::json!({}), None);
        bus.emit("projectile_hit", serde_json::json!({}), Some(Entity::from_raw(3)));
        bus.emit("melee_hit", serde_json::json!({}), None);
        assert_eq!(bus.count("melee_hit"), 2);
        assert_eq!(bus.recent[1].source_entity, Some(Entity::from_raw(3).to_bits()));
    }
}
