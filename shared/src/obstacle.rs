//! Static arena walls and the circle-vs-rectangle queries run against them.

use crate::geometry::{sample_segment, Vec2};
use crate::{Mode, ARENA_HEIGHT, ARENA_WIDTH};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Spawn draws give up on avoiding walls after this many attempts.
const MAX_SPAWN_ATTEMPTS: usize = 32;

///Represents an axis-aligned wall.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    ///Top-left corner of the wall.
    pub position: Vec2,
    pub width: f32,
    pub height: f32,
}

impl Obstacle {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Obstacle {
            position: Vec2::new(x, y),
            width,
            height,
        }
    }

    /// True if a circle of `radius` centred on `point` touches the wall.
    ///
    /// Approximated by growing the rectangle by `radius` on every side;
    /// edges count as contact.
    pub fn contains_expanded(&self, point: Vec2, radius: f32) -> bool {
        let left = self.position.x - radius;
        let top = self.position.y - radius;
        let right = self.position.x + self.width + radius;
        let bottom = self.position.y + self.height + radius;

        point.x >= left && point.x <= right && point.y >= top && point.y <= bottom
    }
}

/// Fixed wall layout every server instance starts with.
pub const ARENA_LAYOUT: [Obstacle; 10] = [
    // Center walls
    Obstacle::new(400.0, 300.0, 200.0, 20.0),
    Obstacle::new(400.0, 400.0, 20.0, 200.0),
    // Corner barriers
    Obstacle::new(100.0, 100.0, 150.0, 20.0),
    Obstacle::new(100.0, 100.0, 20.0, 150.0),
    Obstacle::new(730.0, 100.0, 150.0, 20.0),
    Obstacle::new(730.0, 100.0, 20.0, 150.0),
    Obstacle::new(100.0, 530.0, 150.0, 20.0),
    Obstacle::new(100.0, 400.0, 20.0, 150.0),
    Obstacle::new(730.0, 530.0, 150.0, 20.0),
    Obstacle::new(730.0, 400.0, 20.0, 150.0),
];

/// Read-only set of walls, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct ObstacleRegistry {
    obstacles: Vec<Obstacle>,
}

impl ObstacleRegistry {
    pub fn new(obstacles: Vec<Obstacle>) -> Self {
        Self { obstacles }
    }

    /// Registry holding [`ARENA_LAYOUT`].
    pub fn arena() -> Self {
        Self::new(ARENA_LAYOUT.to_vec())
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// True if a circle at `point` would overlap any wall.
    ///
    /// Always false for [`Mode::Wave`], which passes through walls.
    pub fn collides(&self, point: Vec2, radius: f32, mode: Mode) -> bool {
        if mode.passes_obstacles() {
            return false;
        }
        self.obstacles
            .iter()
            .any(|obstacle| obstacle.contains_expanded(point, radius))
    }

    /// True if any sampled point of the segment `from..=to` hits a wall.
    pub fn blocks_line(&self, from: Vec2, to: Vec2, steps: usize, probe_radius: f32) -> bool {
        sample_segment(from, to, steps).any(|point| self.collides(point, probe_radius, Mode::Particle))
    }

    /// Uniformly random point in the arena, redrawn while a circle of
    /// `radius` there would overlap a wall.
    pub fn find_spawn_point<R: Rng>(&self, rng: &mut R, radius: f32) -> Vec2 {
        let mut point = random_arena_point(rng);
        for _ in 0..MAX_SPAWN_ATTEMPTS {
            if !self.collides(point, radius, Mode::Particle) {
                break;
            }
            point = random_arena_point(rng);
        }
        point
    }
}

fn random_arena_point<R: Rng>(rng: &mut R) -> Vec2 {
    Vec2::new(rng.gen_range(0.0..ARENA_WIDTH), rng.gen_range(0.0..ARENA_HEIGHT))
}

/// Clamps a point into the arena rectangle.
pub fn clamp_to_arena(point: Vec2) -> Vec2 {
    Vec2::new(point.x.clamp(0.0, ARENA_WIDTH), point.y.clamp(0.0, ARENA_HEIGHT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OCCLUSION_PROBE_RADIUS, OCCLUSION_STEPS, PLAYER_RADIUS};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_expanded_contains() {
        let wall = Obstacle::new(100.0, 100.0, 50.0, 10.0);

        assert!(wall.contains_expanded(Vec2::new(120.0, 105.0), 0.0));
        assert!(wall.contains_expanded(Vec2::new(95.0, 105.0), 5.0));
        assert!(!wall.contains_expanded(Vec2::new(94.0, 105.0), 5.0));
        assert!(wall.contains_expanded(Vec2::new(150.0, 110.0), 0.0));
        assert!(!wall.contains_expanded(Vec2::new(120.0, 131.0), 20.0));
    }

    #[test]
    fn test_particle_collides_with_wall() {
        let registry = ObstacleRegistry::arena();
        // Just above the central horizontal wall
        let point = Vec2::new(500.0, 285.0);
        assert!(registry.collides(point, PLAYER_RADIUS, Mode::Particle));
        assert!(!registry.collides(Vec2::new(500.0, 250.0), PLAYER_RADIUS, Mode::Particle));
    }

    #[test]
    fn test_wave_never_collides() {
        let registry = ObstacleRegistry::arena();
        for obstacle in registry.obstacles() {
            let centre = Vec2::new(
                obstacle.position.x + obstacle.width / 2.0,
                obstacle.position.y + obstacle.height / 2.0,
            );
            assert!(registry.collides(centre, PLAYER_RADIUS, Mode::Particle));
            assert!(!registry.collides(centre, PLAYER_RADIUS, Mode::Wave));
        }
    }

    #[test]
    fn test_blocks_line_through_wall() {
        let registry = ObstacleRegistry::arena();
        let above = Vec2::new(500.0, 250.0);
        let below = Vec2::new(500.0, 380.0);
        assert!(registry.blocks_line(above, below, OCCLUSION_STEPS, OCCLUSION_PROBE_RADIUS));

        let left = Vec2::new(500.0, 700.0);
        let right = Vec2::new(600.0, 700.0);
        assert!(!registry.blocks_line(left, right, OCCLUSION_STEPS, OCCLUSION_PROBE_RADIUS));
    }

    #[test]
    fn test_spawn_points_avoid_walls() {
        let registry = ObstacleRegistry::arena();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..500 {
            let point = registry.find_spawn_point(&mut rng, PLAYER_RADIUS);
            assert!(point.x >= 0.0 && point.x < ARENA_WIDTH);
            assert!(point.y >= 0.0 && point.y < ARENA_HEIGHT);
            assert!(!registry.collides(point, PLAYER_RADIUS, Mode::Particle));
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = ObstacleRegistry::default();
        assert!(!registry.collides(Vec2::new(500.0, 300.0), PLAYER_RADIUS, Mode::Particle));
    }

    #[test]
    fn test_clamp_to_arena() {
        assert_eq!(clamp_to_arena(Vec2::new(-5.0, 1200.0)), Vec2::new(0.0, ARENA_HEIGHT));
        assert_eq!(clamp_to_arena(Vec2::new(10.0, 20.0)), Vec2::new(10.0, 20.0));
    }
}
