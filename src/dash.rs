use bevy::prelude::*;

use crate::collision::{CollisionLayers, CollisionQuery};
use crate::components::PhysicsBody;
use crate::navigation::{NavAgent, NavArea, NavSurface};

/// Obstacle probe height above the agent's feet.
const PROBE_HEIGHT: f32 = 0.5;

/// One short repositioning move, clamped against obstacles.
#[derive(Clone, Debug, PartialEq)]
pub struct DashState {
    pub start: Vec3,
    pub direction: Vec3,
    pub requested_distance: f32,
    /// Distance after obstacle clamping.
    pub distance: f32,
    pub duration: f32,
    pub elapsed: f32,
}

impl DashState {
    pub fn plan(
        start: Vec3,
        direction: Vec3,
        requested_distance: f32,
        duration: f32,
        clearance: f32,
        world: &impl CollisionQuery,
    ) -> Self {
        let direction = direction.normalize_or_zero();
        let mut distance = requested_distance.max(0.0);
        if direction != Vec3::ZERO {
            if let Some(hit) = world.raycast(
                start + Vec3::Y * PROBE_HEIGHT,
                direction,
                distance,
                CollisionLayers::WORLD,
            ) {
                distance = (hit.distance - clearance).max(0.0);
            }
        } else {
            distance = 0.0;
        }
        Self {
            start,
            direction,
            requested_distance,
            distance,
            duration,
            elapsed: 0.0,
        }
    }

    pub fn destination(&self) -> Vec3 {
        self.start + self.direction * self.distance
    }

    pub fn fraction(&self) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    pub fn is_finished(&self) -> bool {
        self.fraction() >= 1.0
    }

    /// Moves the clock forward and returns this tick's position, kept on the
    /// navigable surface when one is within `snap_radius`.
    pub fn advance(&mut self, dt: f32, nav: &impl NavSurface, snap_radius: f32) -> Vec3 {
        self.elapsed += dt;
        let point = self.start.lerp(self.destination(), self.fraction());
        nav.sample_position(point, snap_radius).unwrap_or(point)
    }

    /// Final resting spot.
    pub fn landing(&self, nav: &impl NavSurface, snap_radius: f32) -> Vec3 {
        let end = self.destination();
        nav.sample_position(end, snap_radius).unwrap_or(end)
    }
}

#[derive(Clone, Copy, Debug)]
struct Suspended {
    nav_enabled: bool,
    kinematic: bool,
}

/// Attached while a dash is running; navigation and external forces are
/// suspended until it is removed.
#[derive(Component, Clone, Debug)]
pub struct DashMotion {
    pub state: DashState,
    pub step_snap_radius: f32,
    pub landing_snap_radius: f32,
    suspended: Option<Suspended>,
}

impl DashMotion {
    pub fn new(state: DashState, step_snap_radius: f32, landing_snap_radius: f32) -> Self {
        Self {
            state,
            step_snap_radius,
            landing_snap_radius,
            suspended: None,
        }
    }
}

pub(crate) fn advance_dashes(
    time: Res<Time<Fixed>>,
    area: Res<NavArea>,
    mut commands: Commands,
    mut dashers: Query<(
        Entity,
        &mut Transform,
        &mut DashMotion,
        Option<&mut NavAgent>,
        Option<&mut PhysicsBody>,
    )>,
) {
    let dt = time.delta_secs();
    for (entity, mut transform, mut motion, mut agent, mut body) in dashers.iter_mut() {
        if motion.suspended.is_none() {
            motion.suspended = Some(Suspended {
                nav_enabled: agent.as_ref().is_some_and(|a| a.enabled),
                kinematic: body.as_ref().is_some_and(|b| b.kinematic),
            });
            if let Some(agent) = agent.as_mut() {
                agent.enabled = false;
                agent.stop();
            }
            if let Some(body) = body.as_mut() {
                body.kinematic = true;
                body.velocity = Vec3::ZERO;
            }
        }

        let snap = motion.step_snap_radius;
        transform.translation = motion.state.advance(dt, area.as_ref(), snap);
        if !motion.state.is_finished() {
            continue;
        }

        transform.translation = motion
            .state
            .landing(area.as_ref(), motion.landing_snap_radius);
        if let Some(previous) = motion.suspended {
            if let Some(agent) = agent.as_mut() {
                agent.enabled = previous.nav_enabled;
            }
            if let Some(body) = body.as_mut() {
                body.kinematic = previous.kinematic;
            }
        }
        debug!(
            "[Nemesis dash] {:?} landed after {:.2} of {:.2} units",
            entity, motion.state.distance, motion.state.requested_distance
        );
        commands.entity(entity).remove::<DashMotion>();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bevy::ecs::system::RunSystemOnce;

    use super::*;
    use crate::collision::{ColliderEntry, ColliderShape, CollisionWorld};

    fn wall_at_x(x: f32) -> CollisionWorld {
        let mut world = CollisionWorld::default();
        world.insert(ColliderEntry {
            entity: Entity::from_raw(1),
            center: Vec3::new(x, 1.0, 0.0),
            shape: ColliderShape::Cuboid {
                half_extents: Vec3::new(0.5, 1.0, 5.0),
            },
            layers: CollisionLayers::WORLD,
            is_trigger: false,
            ignore_hit_detection: false,
            receiver: None,
        });
        world
    }

    #[test]
    fn blocked_dash_stops_short_of_the_obstacle() {
        let dash = DashState::plan(Vec3::ZERO, Vec3::X, 10.0, 0.5, 1.0, &wall_at_x(6.0));
        assert!((dash.distance - 4.5).abs() < 1e-4);
        assert_eq!(dash.requested_distance, 10.0);
    }

    #[test]
    fn obstacle_inside_clearance_floors_at_zero() {
        let dash = DashState::plan(Vec3::ZERO, Vec3::X, 10.0, 0.5, 1.0, &wall_at_x(1.0));
        assert_eq!(dash.distance, 0.0);
        assert_eq!(dash.destination(), Vec3::ZERO);
    }

    #[test]
    fn open_dash_uses_full_distance() {
        let dash = DashState::plan(
            Vec3::ZERO,
            Vec3::NEG_X,
            10.0,
            0.5,
            1.0,
            &wall_at_x(6.0),
        );
        assert_eq!(dash.distance, 10.0);
    }

    #[test]
    fn advance_interpolates_linearly_and_finishes_on_duration() {
        let mut dash = DashState::plan(
            Vec3::ZERO,
            Vec3::X,
            8.0,
            0.5,
            1.0,
            &CollisionWorld::default(),
        );
        let area = NavArea::default();
        let mid = dash.advance(0.25, &area, 1.0);
        assert!((mid - Vec3::new(4.0, 0.0, 0.0)).length() < 1e-5);
        assert!(!dash.is_finished());
        let end = dash.advance(0.25, &area, 1.0);
        assert!((end - Vec3::new(8.0, 0.0, 0.0)).length() < 1e-5);
        assert!(dash.is_finished());
    }

    #[test]
    fn landing_is_pulled_back_onto_the_nav_area() {
        let area = NavArea::new(0.0, vec![(Vec2::new(-5.0, -5.0), Vec2::new(5.0, 5.0))]);
        let dash = DashState::plan(
            Vec3::ZERO,
            Vec3::X,
            6.5,
            0.5,
            1.0,
            &CollisionWorld::default(),
        );
        let landing = dash.landing(&area, 2.0);
        assert!((landing - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-5);
    }

    fn tick(world: &mut World) {
        world
            .resource_mut::<Time<Fixed>>()
            .advance_by(Duration::from_millis(250));
        world.run_system_once(advance_dashes).unwrap();
    }

    #[test]
    fn dash_suspends_navigation_and_physics_then_restores_them() {
        let mut world = World::new();
        world.insert_resource(Time::<Fixed>::default());
        world.init_resource::<NavArea>();
        let mut agent = NavAgent::new(3.5);
        agent.set_destination(Vec3::new(0.0, 0.0, 9.0));
        let state = DashState::plan(
            Vec3::ZERO,
            Vec3::X,
            4.0,
            0.5,
            1.0,
            &CollisionWorld::default(),
        );
        let dasher = world
            .spawn((
                Transform::default(),
                agent,
                PhysicsBody {
                    velocity: Vec3::new(0.0, 0.0, 2.0),
                    kinematic: false,
                },
                DashMotion::new(state, 1.0, 2.0),
            ))
            .id();
        tick(&mut world);
        let entity = world.entity(dasher);
        assert!(entity.contains::<DashMotion>());
        assert!(!entity.get::<NavAgent>().unwrap().enabled);
        assert_eq!(entity.get::<NavAgent>().unwrap().destination, None);
        assert!(entity.get::<PhysicsBody>().unwrap().kinematic);
        assert_eq!(entity.get::<PhysicsBody>().unwrap().velocity, Vec3::ZERO);
        assert!((entity.get::<Transform>().unwrap().translation.x - 2.0).abs() < 1e-5);

        tick(&mut world);
        let entity = world.entity(dasher);
        assert!(!entity.contains::<DashMotion>());
        assert!(entity.get::<NavAgent>().unwrap().enabled);
        assert!(!entity.get::<PhysicsBody>().unwrap().kinematic);
        let end = entity.get::<Transform>().unwrap().translation;
        assert!((end - Vec3::new(4.0, 0.0, 0.0)).length() < 1e-5);
    }
}
