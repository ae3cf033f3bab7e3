use bevy::prelude::*;

use crate::dash::DashMotion;

/// "Nearest navigable point" queries.
pub trait NavSurface {
    fn sample_position(&self, point: Vec3, max_distance: f32) -> Option<Vec3>;
}

/// Walkable area made of axis-aligned rectangles on a flat ground plane.
/// An empty area treats the whole plane as walkable.
#[derive(Resource, Clone, Debug, Default)]
pub struct NavArea {
    pub ground_height: f32,
    /// (min, max) in XZ.
    pub rects: Vec<(Vec2, Vec2)>,
}

impl NavArea {
    pub fn new(ground_height: f32, rects: Vec<(Vec2, Vec2)>) -> Self {
        Self {
            ground_height,
            rects,
        }
    }
}

impl NavSurface for NavArea {
    fn sample_position(&self, point: Vec3, max_distance: f32) -> Option<Vec3> {
        let flat = Vec2::new(point.x, point.z);
        let vertical = (point.y - self.ground_height).abs();
        if self.rects.is_empty() {
            return (vertical <= max_distance)
                .then(|| Vec3::new(point.x, self.ground_height, point.z));
        }
        let mut best: Option<(Vec2, f32)> = None;
        for (min, max) in &self.rects {
            let clamped = flat.clamp(*min, *max);
            let d = clamped.distance(flat);
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((clamped, d)),
            }
        }
        let (nearest, horizontal) = best?;
        let total = (horizontal * horizontal + vertical * vertical).sqrt();
        (total <= max_distance).then(|| Vec3::new(nearest.x, self.ground_height, nearest.y))
    }
}

/// Destination-following agent. Path planning is not done here: agents walk
/// straight toward their destination and stay on the nav area.
#[derive(Component, Clone, Debug)]
pub struct NavAgent {
    pub destination: Option<Vec3>,
    pub speed: f32,
    pub stopping_distance: f32,
    pub enabled: bool,
}

impl NavAgent {
    pub fn new(speed: f32) -> Self {
        Self {
            destination: None,
            speed,
            stopping_distance: 0.1,
            enabled: true,
        }
    }

    pub fn set_destination(&mut self, point: Vec3) {
        self.destination = Some(point);
    }

    pub fn stop(&mut self) {
        self.destination = None;
    }
}

/// One straight-line step toward `destination`, never overshooting.
pub fn step_toward(
    from: Vec3,
    destination: Vec3,
    speed: f32,
    stopping_distance: f32,
    dt: f32,
) -> Vec3 {
    let mut delta = destination - from;
    delta.y = 0.0;
    let dist = delta.length();
    if dist <= stopping_distance.max(0.0001) {
        return from;
    }
    let step = (speed * dt).min(dist - stopping_distance.max(0.0));
    from + delta / dist * step.max(0.0)
}

pub(crate) fn follow_nav_destinations(
    time: Res<Time<Fixed>>,
    area: Res<NavArea>,
    mut query: Query<(&mut Transform, &NavAgent), Without<DashMotion>>,
) {
    let dt = time.delta_secs();
    for (mut transform, agent) in query.iter_mut() {
        if !agent.enabled {
            continue;
        }
        let Some(destination) = agent.destination else {
            continue;
        };
        let next = step_toward(
            transform.translation,
            destination,
            agent.speed,
            agent.stopping_distance,
            dt,
        );
        if next == transform.translation {
            continue;
        }
        let heading = Vec3::new(
            next.x - transform.translation.x,
            0.0,
            next.z - transform.translation.z,
        );
        transform.translation = area.sample_position(next, 1.0).unwrap_or(transform.translation);
        if heading.length_squared() > 1e-8 {
            transform.look_to(heading, Vec3::Y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> NavArea {
        NavArea::new(0.0, vec![(Vec2::new(-10.0, -10.0), Vec2::new(10.0, 10.0))])
    }

    #[test]
    fn sample_position_clamps_into_nearest_rect() {
        let area = arena();
        let p = area
            .sample_position(Vec3::new(11.0, 0.0, 0.0), 2.0)
            .expect("within search radius");
        assert!((p - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-5);
        assert!(area.sample_position(Vec3::new(15.0, 0.0, 0.0), 2.0).is_none());
    }

    #[test]
    fn sample_position_accounts_for_height() {
        let area = arena();
        assert!(area.sample_position(Vec3::new(0.0, 3.0, 0.0), 2.0).is_none());
        let p = area
            .sample_position(Vec3::new(0.0, 1.0, 0.0), 2.0)
            .expect("close enough to ground");
        assert_eq!(p.y, 0.0);
    }

    #[test]
    fn step_toward_never_overshoots() {
        let from = Vec3::ZERO;
        let to = Vec3::new(1.0, 0.0, 0.0);
        let next = step_toward(from, to, 100.0, 0.0, 1.0);
        assert!((next - to).length() < 1e-5);
        let next = step_toward(from, to, 0.5, 0.0, 1.0);
        assert!((next.x - 0.5).abs() < 1e-5);
        assert_eq!(step_toward(to, to, 1.0, 0.1, 1.0), to);
    }
}
