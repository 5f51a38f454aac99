use super::{BodyDriver, FormContext, FormState};
use crate::math::Vec2;
use crate::state::State;
use crate::tween::Tween;

/// Scripted level handoff. The body follows the tween and ignores gravity
/// and contacts while it runs.
#[derive(Clone, Debug, PartialEq)]
pub enum TransitState {
    Tweening(Tween),
    Arrived,
    Stopped,
}

impl State<FormContext<'_>> for TransitState {
    fn name(&self) -> &'static str {
        match self {
            TransitState::Tweening(_) => "tweening",
            TransitState::Arrived => "arrived",
            TransitState::Stopped => "stopped",
        }
    }

    fn start(&mut self, ctx: &mut FormContext<'_>) {
        match self {
            TransitState::Tweening(tween) => {
                ctx.set_gravity_enabled(false);
                ctx.set_velocity(Vec2::ZERO);
                ctx.set_position(tween.position());
                ctx.set_rotation(tween.rotation());
            }
            TransitState::Arrived => {
                ctx.set_velocity(Vec2::ZERO);
                ctx.set_rotation(0.0);
            }
            TransitState::Stopped => {}
        }
    }

    fn update(&mut self, ctx: &mut FormContext<'_>, delta: f32) {
        if let TransitState::Tweening(tween) = self {
            tween.advance(delta);
            ctx.set_position(tween.position());
            ctx.set_rotation(tween.rotation());
            ctx.set_velocity(Vec2::ZERO);
        }
    }

    fn step(&mut self, ctx: &mut FormContext<'_>, _fixed_delta: f32) {
        if !matches!(self, TransitState::Stopped) {
            ctx.set_velocity(Vec2::ZERO);
        }
    }

    fn next_state(&self, _ctx: &mut FormContext<'_>, _frames: u32) -> Option<Self> {
        match self {
            TransitState::Tweening(tween) if tween.is_finished() => Some(TransitState::Arrived),
            _ => None,
        }
    }

    fn destroy(&mut self, ctx: &mut FormContext<'_>) {
        if let TransitState::Tweening(_) = self {
            ctx.set_gravity_enabled(true);
        }
    }
}

impl FormState for TransitState {
    fn stopped() -> Self {
        TransitState::Stopped
    }

    fn is_stopped(&self) -> bool {
        matches!(self, TransitState::Stopped)
    }
}
