//! Easing curves and the position/rotation tween used for level handoffs.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::math::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Easing {
    /// Constant velocity.
    #[default]
    Linear,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
    SineInOut,
    /// Overshoot then settle.
    BackOut,
}

impl Easing {
    /// Map normalized time `t` (clamped to [0, 1]) to eased progress.
    #[inline]
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::QuadIn => t * t,
            Easing::QuadOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Easing::CubicIn => t * t * t,
            Easing::CubicOut => 1.0 - (1.0 - t).powi(3),
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::SineInOut => -((PI * t).cos() - 1.0) / 2.0,
            Easing::BackOut => {
                const C1: f32 = 1.70158;
                const C3: f32 = C1 + 1.0;
                1.0 + C3 * (t - 1.0).powi(3) + C1 * (t - 1.0).powi(2)
            }
        }
    }
}

/// Time-based interpolation of a position and a rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Tween {
    pub from: Vec2,
    pub to: Vec2,
    pub from_rotation: f32,
    pub to_rotation: f32,
    /// Duration in seconds.
    pub duration: f32,
    pub easing: Easing,
    elapsed: f32,
}

impl Tween {
    pub fn new(from: Vec2, to: Vec2, duration: f32, easing: Easing) -> Self {
        Self {
            from,
            to,
            from_rotation: 0.0,
            to_rotation: 0.0,
            duration,
            easing,
            elapsed: 0.0,
        }
    }

    #[must_use]
    pub fn with_rotation(mut self, from: f32, to: f32) -> Self {
        self.from_rotation = from;
        self.to_rotation = to;
        self
    }

    pub fn advance(&mut self, delta: f32) {
        if delta.is_finite() && delta > 0.0 {
            self.elapsed = (self.elapsed + delta).min(self.duration.max(0.0));
        }
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Normalized progress [0, 1]; a zero-length tween is already done.
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }

    pub fn position(&self) -> Vec2 {
        self.from.lerp(self.to, self.easing.apply(self.progress()))
    }

    pub fn rotation(&self) -> f32 {
        let k = self.easing.apply(self.progress());
        self.from_rotation + (self.to_rotation - self.from_rotation) * k
    }

    pub fn is_finished(&self) -> bool {
        self.progress() >= 1.0
    }
}
