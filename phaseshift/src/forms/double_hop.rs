use super::{BodyDriver, FormContext, FormState, Move};
use crate::controls::Button;
use crate::math::Vec2;
use crate::state::State;

/// Jump, hang at the apex, jump again. The second jump is armed by
/// holding jump when upward speed runs out.
#[derive(Clone, Debug, PartialEq)]
pub enum DoubleHopState {
    Move(Move),
    /// Floating at the apex while winding up the second jump.
    ApexWindup,
    ApexJump { full: bool },
    /// Airborne with the second jump spent.
    Falling,
    Stopped,
}

impl State<FormContext<'_>> for DoubleHopState {
    fn name(&self) -> &'static str {
        match self {
            DoubleHopState::Move(m) => m.name(),
            DoubleHopState::ApexWindup => "apex-windup",
            DoubleHopState::ApexJump { .. } => "apex-jump",
            DoubleHopState::Falling => "falling",
            DoubleHopState::Stopped => "stopped",
        }
    }

    fn start(&mut self, ctx: &mut FormContext<'_>) {
        match self {
            DoubleHopState::Move(m) => m.start(ctx),
            DoubleHopState::ApexWindup => {
                ctx.set_gravity_enabled(false);
                ctx.set_velocity(Vec2::ZERO);
            }
            DoubleHopState::ApexJump { full } => {
                let speed = ctx.tuning.hop_speed(*full) * ctx.tuning.apex_jump_factor;
                ctx.launch(speed);
            }
            DoubleHopState::Falling | DoubleHopState::Stopped => {}
        }
    }

    fn step(&mut self, ctx: &mut FormContext<'_>, fixed_delta: f32) {
        match self {
            DoubleHopState::Move(m) => m.step(ctx, fixed_delta),
            DoubleHopState::ApexJump { .. } | DoubleHopState::Falling => {
                Move::Airborne.step(ctx, fixed_delta)
            }
            DoubleHopState::ApexWindup => ctx.set_velocity(Vec2::ZERO),
            DoubleHopState::Stopped => {}
        }
    }

    fn next_state(&self, ctx: &mut FormContext<'_>, frames: u32) -> Option<Self> {
        match self {
            DoubleHopState::Move(Move::Airborne) => {
                if Move::landed(ctx, frames) {
                    Some(DoubleHopState::Move(Move::Landing))
                } else if ctx.velocity().y <= 0.0 && ctx.controls.is_pressed(Button::Jump) {
                    Some(DoubleHopState::ApexWindup)
                } else {
                    None
                }
            }
            DoubleHopState::Move(m) => m.next(ctx, frames).map(DoubleHopState::Move),
            DoubleHopState::ApexWindup => (frames >= ctx.tuning.windup_ticks).then(|| {
                DoubleHopState::ApexJump {
                    full: ctx.controls.is_pressed(Button::Jump),
                }
            }),
            DoubleHopState::ApexJump { .. } => Some(DoubleHopState::Falling),
            DoubleHopState::Falling => {
                Move::landed(ctx, frames).then_some(DoubleHopState::Move(Move::Landing))
            }
            DoubleHopState::Stopped => None,
        }
    }

    fn destroy(&mut self, ctx: &mut FormContext<'_>) {
        if let DoubleHopState::ApexWindup = self {
            ctx.set_gravity_enabled(true);
        }
    }
}

impl FormState for DoubleHopState {
    fn stopped() -> Self {
        DoubleHopState::Stopped
    }

    fn is_stopped(&self) -> bool {
        matches!(self, DoubleHopState::Stopped)
    }
}
