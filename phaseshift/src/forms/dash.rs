use super::{BodyDriver, FormContext, FormState, Move};
use crate::controls::Button;
use crate::math::Vec2;
use crate::state::State;

/// One air dash per airtime, aimed at the pointer.
#[derive(Clone, Debug, PartialEq)]
pub enum DashState {
    Move(Move),
    Dashing { direction: Vec2 },
    /// Airborne after a dash; no second dash until landing.
    Drifting,
    Stopped,
}

fn dash_direction(ctx: &FormContext<'_>) -> Vec2 {
    ctx.aim().unwrap_or_else(|| {
        let axis = ctx.axis();
        Vec2::new(if axis == 0.0 { 1.0 } else { axis }, 0.0)
    })
}

impl State<FormContext<'_>> for DashState {
    fn name(&self) -> &'static str {
        match self {
            DashState::Move(m) => m.name(),
            DashState::Dashing { .. } => "dashing",
            DashState::Drifting => "drifting",
            DashState::Stopped => "stopped",
        }
    }

    fn start(&mut self, ctx: &mut FormContext<'_>) {
        match self {
            DashState::Move(m) => m.start(ctx),
            DashState::Dashing { direction } => {
                let (speed, damping) = (ctx.tuning.dash_speed, ctx.tuning.dash_damping);
                ctx.set_gravity_enabled(false);
                ctx.set_damping(damping);
                ctx.throw_along(*direction, speed);
            }
            DashState::Drifting | DashState::Stopped => {}
        }
    }

    fn step(&mut self, ctx: &mut FormContext<'_>, fixed_delta: f32) {
        match self {
            DashState::Move(m) => m.step(ctx, fixed_delta),
            DashState::Drifting => Move::Airborne.step(ctx, fixed_delta),
            DashState::Dashing { .. } | DashState::Stopped => {}
        }
    }

    fn next_state(&self, ctx: &mut FormContext<'_>, frames: u32) -> Option<Self> {
        match self {
            DashState::Move(Move::Airborne) => {
                if ctx.controls.is_pressed_unique(Button::Action) {
                    Some(DashState::Dashing {
                        direction: dash_direction(ctx),
                    })
                } else {
                    Move::Airborne.next(ctx, frames).map(DashState::Move)
                }
            }
            DashState::Move(m) => m.next(ctx, frames).map(DashState::Move),
            DashState::Dashing { .. } => {
                let slow = ctx.velocity().length() < ctx.tuning.dash_stop_speed;
                (frames >= 2 && slow).then_some(DashState::Drifting)
            }
            DashState::Drifting => {
                Move::landed(ctx, frames).then_some(DashState::Move(Move::Landing))
            }
            DashState::Stopped => None,
        }
    }

    fn destroy(&mut self, ctx: &mut FormContext<'_>) {
        if let DashState::Dashing { .. } = self {
            let damping = ctx.tuning.base_damping;
            ctx.set_gravity_enabled(true);
            ctx.set_damping(damping);
        }
    }
}

impl FormState for DashState {
    fn stopped() -> Self {
        DashState::Stopped
    }

    fn is_stopped(&self) -> bool {
        matches!(self, DashState::Stopped)
    }
}
