use bevy::prelude::*;

use crate::collision::{CollisionLayers, CollisionQuery, CollisionWorld};
use crate::components::CombatTarget;

/// What an agent currently knows about its target.
#[derive(Component, Clone, Debug)]
pub struct Perception {
    pub detection_range: f32,
    /// Mutated by the orchestrator when it switches engagement range.
    pub attack_range: f32,
    pub require_line_of_sight: bool,
    pub known_target: Option<Entity>,
    pub known_target_position: Option<Vec3>,
}

impl Perception {
    pub fn new(detection_range: f32, attack_range: f32) -> Self {
        Self {
            detection_range,
            attack_range,
            require_line_of_sight: false,
            known_target: None,
            known_target_position: None,
        }
    }

    pub fn is_target_in_attack_range(&self, from: Vec3) -> bool {
        self.known_target_position
            .is_some_and(|target| from.distance(target) <= self.attack_range)
    }

    pub fn forget(&mut self) {
        self.known_target = None;
        self.known_target_position = None;
    }
}

/// Nearest candidate within `radius`, skipping `self_entity` and anything `visible` rejects.
pub fn select_nearest_target(
    from: Vec3,
    self_entity: Entity,
    radius: f32,
    candidates: impl IntoIterator<Item = (Entity, Vec3)>,
    mut visible: impl FnMut(Vec3) -> bool,
) -> Option<(Entity, Vec3)> {
    let mut best: Option<(Entity, Vec3, f32)> = None;
    for (entity, pos) in candidates {
        if entity == self_entity {
            continue;
        }
        let dist = from.distance(pos);
        if dist > radius {
            continue;
        }
        if !visible(pos) {
            continue;
        }
        match best {
            Some((_, _, best_dist)) if dist >= best_dist => {}
            _ => best = Some((entity, pos, dist)),
        }
    }
    best.map(|(entity, pos, _)| (entity, pos))
}

/// Clear path between two points against world geometry.
pub fn has_line_of_sight(world: &impl CollisionQuery, from: Vec3, to: Vec3) -> bool {
    let delta = to - from;
    let dist = delta.length();
    if dist <= 0.001 {
        return true;
    }
    world
        .raycast(from, delta / dist, dist, CollisionLayers::WORLD)
        .is_none()
}

pub(crate) fn update_perception(
    world: Res<CollisionWorld>,
    mut observers: Query<(Entity, &Transform, &mut Perception)>,
    targets: Query<(Entity, &Transform), (With<CombatTarget>, Without<Perception>)>,
) {
    for (entity, transform, mut perception) in observers.iter_mut() {
        // Eye height so low walls don't block sight of the target's body.
        let eye = transform.translation + Vec3::Y;
        let los = perception.require_line_of_sight;
        let found = select_nearest_target(
            transform.translation,
            entity,
            perception.detection_range,
            targets.iter().map(|(e, t)| (e, t.translation)),
            |pos| !los || has_line_of_sight(world.as_ref(), eye, pos + Vec3::Y),
        );
        match found {
            Some((target, pos)) => {
                perception.known_target = Some(target);
                perception.known_target_position = Some(pos);
            }
            None => perception.forget(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{ColliderEntry, ColliderShape};

    #[test]
    fn nearest_target_within_radius_wins() {
        let me = Entity::from_raw(0);
        let found = select_nearest_target(
            Vec3::ZERO,
            me,
            10.0,
            [
                (me, Vec3::ZERO),
                (Entity::from_raw(1), Vec3::new(6.0, 0.0, 0.0)),
                (Entity::from_raw(2), Vec3::new(0.0, 0.0, 4.0)),
                (Entity::from_raw(3), Vec3::new(20.0, 0.0, 0.0)),
            ],
            |_| true,
        );
        assert_eq!(found.map(|(e, _)| e), Some(Entity::from_raw(2)));
    }

    #[test]
    fn wall_blocks_line_of_sight() {
        let mut world = CollisionWorld::default();
        world.insert(ColliderEntry {
            entity: Entity::from_raw(9),
            center: Vec3::new(0.0, 1.0, 5.0),
            shape: ColliderShape::Cuboid {
                half_extents: Vec3::new(3.0, 2.0, 0.5),
            },
            layers: CollisionLayers::WORLD,
            is_trigger: false,
            ignore_hit_detection: false,
            receiver: None,
        });
        assert!(!has_line_of_sight(&world, Vec3::Y, Vec3::new(0.0, 1.0, 10.0)));
        assert!(has_line_of_sight(&world, Vec3::Y, Vec3::new(10.0, 1.0, 0.0)));
    }

    #[test]
    fn attack_range_check_uses_current_range() {
        let mut perception = Perception::new(30.0, 3.0);
        perception.known_target = Some(Entity::from_raw(1));
        perception.known_target_position = Some(Vec3::new(5.0, 0.0, 0.0));
        assert!(!perception.is_target_in_attack_range(Vec3::ZERO));
        perception.attack_range = 15.0;
        assert!(perception.is_target_in_attack_range(Vec3::ZERO));
        perception.forget();
        assert!(!perception.is_target_in_attack_range(Vec3::ZERO));
    }
}
