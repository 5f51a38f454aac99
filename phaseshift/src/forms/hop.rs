use super::{FormContext, FormState, Move};
use crate::state::State;

/// Single jump: the bare skeleton.
#[derive(Clone, Debug, PartialEq)]
pub enum HopState {
    Move(Move),
    Stopped,
}

impl State<FormContext<'_>> for HopState {
    fn name(&self) -> &'static str {
        match self {
            HopState::Move(m) => m.name(),
            HopState::Stopped => "stopped",
        }
    }

    fn start(&mut self, ctx: &mut FormContext<'_>) {
        if let HopState::Move(m) = self {
            m.start(ctx);
        }
    }

    fn step(&mut self, ctx: &mut FormContext<'_>, fixed_delta: f32) {
        if let HopState::Move(m) = self {
            m.step(ctx, fixed_delta);
        }
    }

    fn next_state(&self, ctx: &mut FormContext<'_>, frames: u32) -> Option<Self> {
        match self {
            HopState::Move(m) => m.next(ctx, frames).map(HopState::Move),
            HopState::Stopped => None,
        }
    }
}

impl FormState for HopState {
    fn stopped() -> Self {
        HopState::Stopped
    }

    fn is_stopped(&self) -> bool {
        matches!(self, HopState::Stopped)
    }
}
