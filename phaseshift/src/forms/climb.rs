use super::{BodyDriver, FormContext, FormState, Move};
use crate::controls::Button;
use crate::math::Vec2;
use crate::state::State;

/// Wall slide and wall jump on top of the skeleton.
///
/// `side` is +1 when the wall is to the right of the character.
#[derive(Clone, Debug, PartialEq)]
pub enum ClimbState {
    Move(Move),
    WallSlide { side: f32 },
    WallJump { side: f32 },
    Stopped,
}

impl State<FormContext<'_>> for ClimbState {
    fn name(&self) -> &'static str {
        match self {
            ClimbState::Move(m) => m.name(),
            ClimbState::WallSlide { .. } => "wall-slide",
            ClimbState::WallJump { .. } => "wall-jump",
            ClimbState::Stopped => "stopped",
        }
    }

    fn start(&mut self, ctx: &mut FormContext<'_>) {
        match self {
            ClimbState::Move(m) => m.start(ctx),
            ClimbState::WallSlide { .. } => {
                let damping = ctx.tuning.wall_slide_damping;
                ctx.set_damping(damping);
            }
            ClimbState::WallJump { side } => {
                let kick = ctx.tuning.wall_jump_velocity;
                ctx.set_velocity(Vec2::new(-*side * kick.x, kick.y));
            }
            ClimbState::Stopped => {}
        }
    }

    fn step(&mut self, ctx: &mut FormContext<'_>, fixed_delta: f32) {
        match self {
            ClimbState::Move(m) => m.step(ctx, fixed_delta),
            ClimbState::WallSlide { .. } => Move::Airborne.step(ctx, fixed_delta),
            ClimbState::WallJump { .. } | ClimbState::Stopped => {}
        }
    }

    fn next_state(&self, ctx: &mut FormContext<'_>, frames: u32) -> Option<Self> {
        match self {
            ClimbState::Move(Move::Airborne) => match ctx.wall_side() {
                Some(side) if !ctx.grounded() => Some(ClimbState::WallSlide { side }),
                _ => Move::Airborne.next(ctx, frames).map(ClimbState::Move),
            },
            ClimbState::Move(m) => m.next(ctx, frames).map(ClimbState::Move),
            ClimbState::WallSlide { side } => {
                if ctx.grounded() {
                    Some(ClimbState::Move(Move::Landing))
                } else if ctx.controls.is_pressed_unique(Button::Jump) {
                    Some(ClimbState::WallJump { side: *side })
                } else if ctx.wall_side().is_none() {
                    Some(ClimbState::Move(Move::Airborne))
                } else {
                    None
                }
            }
            ClimbState::WallJump { .. } => {
                (frames >= ctx.tuning.wall_jump_ticks).then_some(ClimbState::Move(Move::Airborne))
            }
            ClimbState::Stopped => None,
        }
    }

    fn destroy(&mut self, ctx: &mut FormContext<'_>) {
        if let ClimbState::WallSlide { .. } = self {
            let damping = ctx.tuning.base_damping;
            ctx.set_damping(damping);
        }
    }
}

impl FormState for ClimbState {
    fn stopped() -> Self {
        ClimbState::Stopped
    }

    fn is_stopped(&self) -> bool {
        matches!(self, ClimbState::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use crate::controls::Button;
    use crate::forms::testing::{block, Rig};
    use crate::forms::{ClimbState, Form, FormKind};
    use crate::math::Vec2;

    fn wall_rig() -> Rig {
        let mut rig = Rig::new(FormKind::Climb, 1.9);
        block(&mut rig.physics, Vec2::new(3.5, 5.0), Vec2::new(2.0, 10.0), false);
        rig.settle();
        rig
    }

    #[test]
    fn jumping_into_wall_slides_then_wall_jumps() {
        let mut rig = wall_rig();
        rig.controls.press(Button::Right);
        rig.ticks(20);
        assert_eq!(rig.form.state_name(), "standing");

        rig.controls.press(Button::Jump);
        assert!(rig.tick_until("wall-slide", 120));
        match &rig.form {
            Form::Climb(sm) => assert_eq!(*sm.active(), ClimbState::WallSlide { side: 1.0 }),
            _ => unreachable!(),
        }
        assert_eq!(rig.physics.linear_damping(rig.body), Some(rig.tuning.wall_slide_damping));

        rig.controls.release(Button::Jump);
        rig.controls.release(Button::Right);
        rig.tick();
        rig.controls.press(Button::Jump);
        rig.tick();
        assert_eq!(rig.form.state_name(), "wall-jump");
        assert!(rig.velocity().x < 0.0);
        assert_eq!(rig.physics.linear_damping(rig.body), Some(rig.tuning.base_damping));

        assert!(rig.tick_until("airborne", 20));
        assert!(rig.position().x < 1.9);
    }

    #[test]
    fn wall_slide_limits_fall_speed() {
        let mut rig = wall_rig();
        rig.controls.press(Button::Right);
        rig.ticks(20);
        rig.controls.press(Button::Jump);
        assert!(rig.tick_until("wall-slide", 120));
        rig.controls.release(Button::Jump);

        let mut slowest = 0.0f32;
        for _ in 0..60 {
            rig.tick();
            if rig.form.state_name() != "wall-slide" {
                break;
            }
            slowest = slowest.min(rig.velocity().y);
        }
        // free fall would reach -30 after one second
        assert!(slowest > -6.0, "slid at {slowest}");
    }
}
