//! Boss combat core: attack orchestration, projectiles, weapons, dashes and
//! spawned adds, running as fixed-step bevy systems.

pub mod arena;
pub mod boss;
pub mod collision;
pub mod components;
pub mod config;
pub mod damage;
pub mod dash;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod gate;
pub mod navigation;
pub mod orchestrator;
pub mod perception;
pub mod projectile;
pub mod registry;
pub mod spawn;
pub mod weapon;

use bevy::prelude::*;

use collision::CollisionWorld;
use components::CombatRng;
use navigation::NavArea;

/// Registers every combat resource, event and system.
///
/// Colliders are snapshotted in `FixedPreUpdate`; everything else runs as
/// one ordered chain in `FixedUpdate`.
pub struct NemesisPlugin {
    pub seed: u64,
}

impl Default for NemesisPlugin {
    fn default() -> Self {
        Self { seed: 7 }
    }
}

impl Plugin for NemesisPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((events::GameEventsPlugin, damage::DamagePlugin))
            .insert_resource(CombatRng::seeded(self.seed))
            .init_resource::<CollisionWorld>()
            .init_resource::<NavArea>()
            .add_systems(FixedPreUpdate, collision::rebuild_collision_world)
            .add_systems(
                FixedUpdate,
                (
                    perception::update_perception,
                    gate::check_activation_gates,
                    spawn::run_add_spawners,
                    dash::advance_dashes,
                    navigation::follow_nav_destinations,
                    boss::drive_orchestrators,
                    boss::follow_owners,
                    projectile::simulate_projectiles,
                    components::integrate_bodies,
                    damage::apply_damage,
                    damage::death_system,
                    registry::prune_registries,
                )
                    .chain(),
            );
    }
}
