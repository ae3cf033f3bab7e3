use bevy::prelude::*;

/// Marks the player entity. Only players open activation gates.
#[derive(Component, Clone, Copy, Default)]
pub struct Player;

/// Entities that perception may pick as a target.
#[derive(Component, Clone, Copy, Default)]
pub struct CombatTarget;

/// Collider (or other part) belonging to another entity, e.g. a boss hitbox.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct OwnedBy(pub Entity);

/// Entity created by a boss spawn attack or an add spawner.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnedBy(pub Option<Entity>);

/// Minimal rigid body: external velocity is ignored while kinematic.
#[derive(Component, Clone, Copy, Default)]
pub struct PhysicsBody {
    pub velocity: Vec3,
    pub kinematic: bool,
}

/// Seeded RNG shared by combat systems so runs are reproducible.
#[derive(Resource)]
pub struct CombatRng(pub rand::rngs::SmallRng);

impl CombatRng {
    pub fn seeded(seed: u64) -> Self {
        use rand::SeedableRng;
        Self(rand::rngs::SmallRng::seed_from_u64(seed))
    }
}

impl Default for CombatRng {
    fn default() -> Self {
        Self::seeded(0)
    }
}

/// Velocity integration for non-kinematic bodies.
pub(crate) fn integrate_bodies(
    time: Res<Time<Fixed>>,
    mut query: Query<(&mut Transform, &mut PhysicsBody)>,
) {
    let dt = time.delta_secs();
    for (mut transform, mut body) in query.iter_mut() {
        if body.kinematic {
            continue;
        }
        transform.translation += body.velocity * dt;
        // Ground friction.
        body.velocity *= (1.0 - 4.0 * dt).max(0.0);
        if body.velocity.length_squared() < 1e-4 {
            body.velocity = Vec3::ZERO;
        }
    }
}
