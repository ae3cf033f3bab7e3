use bevy::prelude::*;

use crate::boss::spawn_boss;
use crate::collision::{Collider, CollisionLayers};
use crate::components::{CombatTarget, PhysicsBody, Player};
use crate::config::{vec3, ArenaConfig};
use crate::damage::Health;
use crate::gate::ActivationGate;
use crate::navigation::NavArea;
use crate::spawn::spawn_add_spawners;

const PLAYER_RADIUS: f32 = 0.5;

/// Entities created for an arena scene.
#[derive(Resource, Clone, Debug)]
pub struct ArenaHandles {
    pub boss: Entity,
    pub player: Entity,
    pub gate: Entity,
    pub spawners: Vec<Entity>,
}

/// Builds the whole scene described by `config`: walls, walkable area,
/// the dormant boss with its gate, the player and any add spawners.
pub fn spawn_arena(commands: &mut Commands, config: &ArenaConfig) -> ArenaHandles {
    for (index, wall) in config.obstacles.iter().enumerate() {
        commands.spawn((
            Name::new(format!("obstacle_{index}")),
            Transform::from_translation(vec3(wall.center)),
            Collider::cuboid(vec3(wall.half_extents), CollisionLayers::WORLD),
        ));
    }
    commands.insert_resource(NavArea::new(
        config.ground_height,
        config
            .nav_area
            .iter()
            .map(|r| (Vec2::from_array(r.min), Vec2::from_array(r.max)))
            .collect(),
    ));

    let boss_position = vec3(config.boss_position);
    let player_position = vec3(config.player_position);
    let boss = spawn_boss(
        commands,
        &config.boss,
        boss_position,
        player_position - boss_position,
        config.boss_health,
    );
    let player = commands
        .spawn((
            Name::new("player"),
            Player,
            CombatTarget,
            Transform::from_translation(player_position),
            Health::new(config.player_health),
            Collider::sphere(PLAYER_RADIUS, CollisionLayers::PLAYER),
            PhysicsBody::default(),
        ))
        .id();
    let gate = commands
        .spawn((
            Name::new("boss_gate"),
            Transform::from_translation(vec3(config.gate.center)),
            ActivationGate::new(boss, config.gate.radius),
        ))
        .id();
    let spawners = spawn_add_spawners(commands, &config.spawners);

    ArenaHandles {
        boss,
        player,
        gate,
        spawners,
    }
}
