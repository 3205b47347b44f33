//! Grid positions and fixed-point geometry.
//!
//! Units stand on integer grid cells, so positions are [`GridPos`] and all
//! range checks compare squared integer distances. Direction math (centroids,
//! step-away vectors, angle tests) runs in fixed point so the same snapshot
//! always yields the same geometry. Scores are plain `f64` heuristics and use
//! [`saturate`] to stay bounded.

use std::f64::consts::PI;

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for geometry.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Integer grid cell.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct GridPos {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
}

impl GridPos {
    /// Create a new grid position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance.
    #[must_use]
    pub const fn dist2(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }

    /// Whether `other` lies inside the closed disc of squared radius `radius2`.
    #[must_use]
    pub const fn within(self, other: Self, radius2: i64) -> bool {
        self.dist2(other) <= radius2
    }

    /// Offset by a delta.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Whether the cell is inside a `size` x `size` map.
    #[must_use]
    pub const fn in_map(self, size: i32) -> bool {
        self.x >= 0 && self.y >= 0 && self.x < size && self.y < size
    }

    /// Convert to a fixed-point vector.
    #[must_use]
    pub fn to_fixed(self) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(self.x), Fixed::from_num(self.y))
    }
}

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Vec2Fixed {
    /// X coordinate.
    pub x: Fixed,
    /// Y coordinate.
    pub y: Fixed,
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Squared length.
    #[must_use]
    pub fn length_squared(self) -> Fixed {
        self.dot(self)
    }

    /// Length via fixed-point square root.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.length_squared())
    }

    /// Scale both components.
    #[must_use]
    pub fn scale(self, k: Fixed) -> Self {
        Self::new(self.x * k, self.y * k)
    }

    /// Whether both components are zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == Fixed::ZERO && self.y == Fixed::ZERO
    }

    /// Rescale to `len`, or zero if the vector has no direction.
    #[must_use]
    pub fn with_length(self, len: Fixed) -> Self {
        let current = self.length();
        if current == Fixed::ZERO {
            return Self::ZERO;
        }
        self.scale(len / current)
    }

    /// Cosine of the angle between two vectors.
    ///
    /// `None` when either vector is zero; every angle test then fails.
    #[must_use]
    pub fn cosine(self, other: Self) -> Option<Fixed> {
        let denom = self.length() * other.length();
        if denom == Fixed::ZERO {
            return None;
        }
        Some(self.dot(other) / denom)
    }

    /// Round to the nearest grid cell.
    #[must_use]
    pub fn round_to_grid(self) -> GridPos {
        GridPos::new(self.x.round().to_num(), self.y.round().to_num())
    }
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    for _ in 0..48 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

/// Square root of a squared engine distance (range, vision, speed).
#[must_use]
pub fn root(squared: i32) -> Fixed {
    fixed_sqrt(Fixed::from_num(squared.max(0)))
}

/// `cos(0.33π)`, the "ahead of the squad" cone.
#[must_use]
pub fn cos_ahead() -> Fixed {
    Fixed::from_num(0.509_041_415_750_371_f64)
}

/// `cos(0.66π)`, the "behind / off-axis" cone.
#[must_use]
pub fn cos_behind() -> Fixed {
    Fixed::from_num(-0.481_753_674_101_715_f64)
}

/// Squash a non-negative quantity into `[0, 1)`: `atan(2x) * 2 / π`.
#[must_use]
pub fn saturate(x: f64) -> f64 {
    (2.0 * x).atan() / PI * 2.0
}

/// Map NaN to zero, leave everything else alone.
#[must_use]
pub fn nan_to_zero(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_dist2() {
        let a = GridPos::new(3, 0);
        let b = GridPos::new(0, 4);
        assert_eq!(a.dist2(b), 25);
        assert!(a.within(b, 25));
        assert!(!a.within(b, 24));
    }

    #[test]
    fn test_fixed_sqrt() {
        let r = fixed_sqrt(Fixed::from_num(49));
        let epsilon = Fixed::ONE / Fixed::from_num(10000);
        assert!((r - Fixed::from_num(7)).abs() < epsilon);
        assert_eq!(fixed_sqrt(Fixed::from_num(-4)), Fixed::ZERO);
    }

    #[test]
    fn test_with_length() {
        let v = GridPos::new(3, 4).to_fixed();
        let scaled = v.with_length(Fixed::from_num(10));
        assert_eq!(scaled.round_to_grid(), GridPos::new(6, 8));
        assert_eq!(Vec2Fixed::ZERO.with_length(Fixed::ONE), Vec2Fixed::ZERO);
    }

    #[test]
    fn test_cosine() {
        let a = GridPos::new(1, 0).to_fixed();
        let b = GridPos::new(-1, 0).to_fixed();
        let c = GridPos::new(0, 5).to_fixed();
        let epsilon = Fixed::ONE / Fixed::from_num(1000);

        let opposite = a.cosine(b).unwrap();
        assert!((opposite + Fixed::ONE).abs() < epsilon);
        assert!(opposite < cos_behind());

        let right = a.cosine(c).unwrap();
        assert!(right.abs() < epsilon);
        assert!(right < cos_ahead());

        assert!(a.cosine(Vec2Fixed::ZERO).is_none());
    }

    #[test]
    fn test_saturate_bounds() {
        assert_eq!(saturate(0.0), 0.0);
        assert!(saturate(1e9) < 1.0);
        assert!(saturate(0.5) > saturate(0.25));
        assert!((saturate(f64::INFINITY) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_nan_to_zero() {
        assert_eq!(nan_to_zero(f64::NAN), 0.0);
        assert_eq!(nan_to_zero(f64::INFINITY), f64::INFINITY);
        assert_eq!(nan_to_zero(1.5), 1.5);
    }
}
