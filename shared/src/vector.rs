use serde::{Deserialize, Serialize};
use std::ops::{AddAssign, Mul, Neg};

///Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2 {
    ///Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f32,
    ///Value along the y-axis.
    /// Positive direction is down, matching screen coordinates.
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Vector2 { x, y }
    }

    ///Returns the euclidean length of the vector.
    pub fn length(&self) -> f32 {
        self.x.hypot(self.y)
    }

    ///Returns the unit vector, or the zero vector when the length is zero.
    pub fn normalize(&self) -> Vector2 {
        let len = self.length();
        if len == 0.0 {
            Vector2::ZERO
        } else {
            Vector2 {
                x: self.x / len,
                y: self.y / len,
            }
        }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    ///Returns the difference of two vectors.
    pub fn sub(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    pub fn dot(&self, other: &Vector2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    ///Returns the vector unchanged if its length is at most `max`,
    /// otherwise the same direction rescaled to exactly `max`.
    pub fn clamp_length(&self, max: f32) -> Vector2 {
        if self.length() > max {
            self.normalize().scale(max)
        } else {
            *self
        }
    }

    pub fn add_assign(&mut self, other: &Vector2) {
        self.x += other.x;
        self.y += other.y;
    }

    pub fn scale_assign(&mut self, scalar: f32) {
        self.x *= scalar;
        self.y *= scalar;
    }

    pub fn normalize_mut(&mut self) {
        *self = self.normalize();
    }

    pub fn clamp_length_mut(&mut self, max: f32) {
        *self = self.clamp_length(max);
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

// Not imported: a `use std::ops::Add` would shadow the borrowing `add` above.
impl std::ops::Add for Vector2 {
    type Output = Vector2;

    fn add(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vector2 {
    type Output = Vector2;

    fn sub(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vector2 {
    type Output = Vector2;

    fn mul(self, rhs: f32) -> Vector2 {
        self.scale(rhs)
    }
}

impl AddAssign for Vector2 {
    fn add_assign(&mut self, rhs: Vector2) {
        Vector2::add_assign(self, &rhs);
    }
}

impl Neg for Vector2 {
    type Output = Vector2;

    fn neg(self) -> Vector2 {
        Vector2::new(-self.x, -self.y)
    }
}
