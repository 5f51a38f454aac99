use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::math::Vec2;
use crate::tween::Easing;

/// Simulation-wide configuration.
///
/// Every field has a default, so a JSON override only needs to name the
/// values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed physics step in seconds.
    pub fixed_dt: f32,
    /// Render deltas are clamped to this before accumulating.
    pub max_frame_delta: f32,
    pub gravity: Vec2,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    /// Characters below this height fail the level.
    pub kill_plane: f32,
    /// Horizontal distance between consecutive levels during a handoff.
    pub level_spacing: f32,
    pub transition_duration: f32,
    pub transition_easing: Easing,
    /// Total rotation (radians) applied over a level handoff.
    pub transition_spin: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            max_frame_delta: 0.25,
            gravity: Vec2::new(0.0, -30.0),
            velocity_iterations: 6,
            position_iterations: 2,
            kill_plane: -40.0,
            level_spacing: 80.0,
            transition_duration: 1.2,
            transition_easing: Easing::CubicInOut,
            transition_spin: std::f32::consts::TAU,
        }
    }
}

impl SimConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid simulation config")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects timing values the fixed-step loop cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (field, value) in [
            ("fixed_dt", self.fixed_dt),
            ("max_frame_delta", self.max_frame_delta),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(CoreError::InvalidConfig { field, value });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn with_fixed_dt(mut self, fixed_dt: f32) -> Self {
        self.fixed_dt = fixed_dt;
        self
    }

    #[must_use]
    pub fn with_max_frame_delta(mut self, max: f32) -> Self {
        self.max_frame_delta = max;
        self
    }

    #[must_use]
    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    #[must_use]
    pub fn with_transition(mut self, duration: f32, easing: Easing) -> Self {
        self.transition_duration = duration;
        self.transition_easing = easing;
        self
    }
}

/// Numeric parameters shared by the character forms.
///
/// Tick counts are measured in update calls; speeds are velocity changes
/// in world units per second (impulses are scaled by body mass).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormTuning {
    /// Lateral force per unit mass while standing.
    pub run_accel: f32,
    /// Lateral force per unit mass while airborne.
    pub air_accel: f32,
    pub max_run_speed: f32,
    pub windup_ticks: u32,
    pub landing_ticks: u32,
    /// Update ticks after take-off before ground contact counts as landing.
    pub min_air_ticks: u32,
    pub jump_speed: f32,
    /// Fraction of `jump_speed` used when jump is released during windup.
    pub short_hop_factor: f32,
    /// Fraction of `jump_speed` used for the apex jump of the double hop.
    pub apex_jump_factor: f32,
    pub wall_slide_damping: f32,
    pub wall_jump_velocity: Vec2,
    pub wall_jump_ticks: u32,
    pub dash_speed: f32,
    pub dash_damping: f32,
    /// A dash ends once speed drops below this.
    pub dash_stop_speed: f32,
    pub phase_speed: f32,
    pub phase_range: f32,
    /// Distance past the far face of a wall where a phase ends.
    pub phase_exit_margin: f32,
    pub throw_charge_ticks: u32,
    pub throw_min_speed: f32,
    pub throw_max_speed: f32,
    pub base_damping: f32,
}

impl Default for FormTuning {
    fn default() -> Self {
        Self {
            run_accel: 60.0,
            air_accel: 25.0,
            max_run_speed: 8.0,
            windup_ticks: 4,
            landing_ticks: 5,
            min_air_ticks: 3,
            jump_speed: 14.0,
            short_hop_factor: 0.55,
            apex_jump_factor: 0.8,
            wall_slide_damping: 8.0,
            wall_jump_velocity: Vec2::new(8.0, 12.0),
            wall_jump_ticks: 8,
            dash_speed: 20.0,
            dash_damping: 6.0,
            dash_stop_speed: 0.75,
            phase_speed: 24.0,
            phase_range: 14.0,
            phase_exit_margin: 0.75,
            throw_charge_ticks: 40,
            throw_min_speed: 6.0,
            throw_max_speed: 22.0,
            base_damping: 0.0,
        }
    }
}

impl FormTuning {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid form tuning")
    }

    /// Take-off speed for a windup that ended with jump held (`full`) or released.
    pub fn hop_speed(&self, full: bool) -> f32 {
        if full {
            self.jump_speed
        } else {
            self.jump_speed * self.short_hop_factor
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = SimConfig::from_json(r#"{ "fixed_dt": 0.02, "transition_easing": "Linear" }"#)
            .unwrap();
        assert_eq!(cfg.fixed_dt, 0.02);
        assert_eq!(cfg.transition_easing, Easing::Linear);
        assert_eq!(cfg.max_frame_delta, 0.25);
        assert_eq!(cfg.velocity_iterations, 6);
        assert_eq!(cfg.position_iterations, 2);
    }

    #[rstest]
    #[case(r#"{ "fixed_dt": 0.0 }"#)]
    #[case(r#"{ "fixed_dt": -0.01 }"#)]
    #[case(r#"{ "max_frame_delta": 0.0 }"#)]
    fn non_positive_timing_is_rejected(#[case] json: &str) {
        let err = SimConfig::from_json(json).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn nan_step_fails_validation() {
        let cfg = SimConfig::default().with_fixed_dt(f32::NAN);
        assert!(matches!(
            cfg.validate(),
            Err(CoreError::InvalidConfig { field: "fixed_dt", .. })
        ));
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn short_hop_is_scaled() {
        let tuning = FormTuning::default();
        assert_eq!(tuning.hop_speed(true), tuning.jump_speed);
        assert!(tuning.hop_speed(false) < tuning.jump_speed);
    }

    #[test]
    fn malformed_tuning_is_an_error() {
        assert!(FormTuning::from_json("{ \"windup_ticks\": -1 }").is_err());
    }
}
