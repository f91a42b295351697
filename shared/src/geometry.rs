use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

///Represents a point or vector in arena space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    ///Value along the x-axis.
    pub x: f32,
    ///Value along the y-axis.
    /// Positive direction is down, as on screen.
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the normalized vector.
    pub fn normalize(&self) -> Vec2 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vec2::default()
        } else {
            self.scale(1.0 / mag)
        }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vec2 {
        Vec2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vec2) -> Vec2 {
        Vec2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    ///Returns the difference `self - other`.
    pub fn sub(&self, other: &Vec2) -> Vec2 {
        Vec2 {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    ///Returns the point a fraction `t` of the way from `self` to `other`.
    pub fn lerp(&self, other: &Vec2, t: f32) -> Vec2 {
        self.add(&other.sub(self).scale(t))
    }
}

/// Euclidean distance between two points.
pub fn distance(a: Vec2, b: Vec2) -> f32 {
    b.sub(&a).magnitude()
}

/// Angle of the vector from `a` to `b`, in radians.
pub fn angle_between(a: Vec2, b: Vec2) -> f32 {
    (b.y - a.y).atan2(b.x - a.x)
}

/// Normalizes an angle into `(-PI, PI]`.
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Moves from `from` toward `to` by at most `max_step`.
pub fn step_toward(from: Vec2, to: Vec2, max_step: f32) -> Vec2 {
    let delta = to.sub(&from);
    if delta.magnitude() <= max_step {
        to
    } else {
        from.add(&delta.normalize().scale(max_step))
    }
}

/// Evenly spaced points on the segment `a..=b`, both endpoints included.
///
/// The iterator is finite (`steps + 1` points) and holds no shared state, so
/// cloning it restarts the walk.
pub fn sample_segment(a: Vec2, b: Vec2, steps: usize) -> SegmentSamples {
    SegmentSamples {
        start: a,
        end: b,
        steps: steps.max(1),
        next: 0,
    }
}

#[derive(Debug, Clone)]
pub struct SegmentSamples {
    start: Vec2,
    end: Vec2,
    steps: usize,
    next: usize,
}

impl Iterator for SegmentSamples {
    type Item = Vec2;

    fn next(&mut self) -> Option<Vec2> {
        if self.next > self.steps {
            return None;
        }
        let t = self.next as f32 / self.steps as f32;
        self.next += 1;
        Some(self.start.lerp(&self.end, t))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.steps + 1).saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SegmentSamples {}
