use super::{BodyDriver, FormContext, FormState, Move};
use crate::controls::Button;
use crate::math::Vec2;
use crate::state::State;

/// Hold action on the ground to charge, release to fling the character
/// towards the pointer. Charge scales the launch speed.
#[derive(Clone, Debug, PartialEq)]
pub enum ThrowState {
    Move(Move),
    Charging,
    /// `charge` is in [0, 1].
    Throwing { charge: f32 },
    Stopped,
}

fn throw_direction(ctx: &FormContext<'_>) -> Vec2 {
    ctx.aim().unwrap_or_else(|| {
        let axis = ctx.axis();
        let x = if axis == 0.0 { 1.0 } else { axis };
        Vec2::new(x, 1.0).try_normalize().unwrap_or(Vec2::UP)
    })
}

impl State<FormContext<'_>> for ThrowState {
    fn name(&self) -> &'static str {
        match self {
            ThrowState::Move(m) => m.name(),
            ThrowState::Charging => "charging",
            ThrowState::Throwing { .. } => "throwing",
            ThrowState::Stopped => "stopped",
        }
    }

    fn start(&mut self, ctx: &mut FormContext<'_>) {
        match self {
            ThrowState::Move(m) => m.start(ctx),
            ThrowState::Throwing { charge } => {
                let tuning = ctx.tuning;
                let speed =
                    tuning.throw_min_speed + (tuning.throw_max_speed - tuning.throw_min_speed) * *charge;
                let direction = throw_direction(ctx);
                ctx.throw_along(direction, speed);
            }
            ThrowState::Charging | ThrowState::Stopped => {}
        }
    }

    fn step(&mut self, ctx: &mut FormContext<'_>, fixed_delta: f32) {
        match self {
            ThrowState::Move(m) => m.step(ctx, fixed_delta),
            ThrowState::Charging => Move::Landing.step(ctx, fixed_delta),
            ThrowState::Throwing { .. } => Move::Airborne.step(ctx, fixed_delta),
            ThrowState::Stopped => {}
        }
    }

    fn next_state(&self, ctx: &mut FormContext<'_>, frames: u32) -> Option<Self> {
        match self {
            ThrowState::Move(Move::Standing) => {
                if ctx.controls.is_pressed_unique(Button::Action) {
                    Some(ThrowState::Charging)
                } else {
                    Move::Standing.next(ctx, frames).map(ThrowState::Move)
                }
            }
            ThrowState::Move(m) => m.next(ctx, frames).map(ThrowState::Move),
            ThrowState::Charging => {
                if !ctx.grounded() {
                    Some(ThrowState::Move(Move::Airborne))
                } else if !ctx.controls.is_pressed(Button::Action) {
                    let full = ctx.tuning.throw_charge_ticks.max(1);
                    let charge = frames.min(full) as f32 / full as f32;
                    Some(ThrowState::Throwing { charge })
                } else {
                    None
                }
            }
            ThrowState::Throwing { .. } => Some(ThrowState::Move(Move::Airborne)),
            ThrowState::Stopped => None,
        }
    }
}

impl FormState for ThrowState {
    fn stopped() -> Self {
        ThrowState::Stopped
    }

    fn is_stopped(&self) -> bool {
        matches!(self, ThrowState::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use crate::controls::Button;
    use crate::forms::testing::Rig;
    use crate::forms::{Form, FormKind, ThrowState};
    use crate::math::Vec2;

    fn throw_after(hold: usize) -> Rig {
        let mut rig = Rig::new(FormKind::Throw, 0.0);
        rig.settle();
        rig.controls.press(Button::Action);
        rig.tick();
        assert_eq!(rig.form.state_name(), "charging");
        rig.ticks(hold);
        rig.controls.release(Button::Action);
        rig.tick();
        assert_eq!(rig.form.state_name(), "throwing");
        rig
    }

    #[test]
    fn full_charge_reaches_max_speed() {
        let rig = throw_after(45);
        match &rig.form {
            Form::Throw(sm) => assert_eq!(*sm.active(), ThrowState::Throwing { charge: 1.0 }),
            _ => unreachable!(),
        }
        let v = rig.velocity();
        assert!(v.length() > 20.0, "{v:?}");
        assert!(v.x > 0.0 && v.y > 0.0);
    }

    #[test]
    fn quick_release_is_a_weak_throw() {
        let rig = throw_after(0);
        assert!(rig.velocity().length() < 8.0);
    }

    #[test]
    fn throw_follows_pointer_and_lands() {
        let mut rig = Rig::new(FormKind::Throw, 0.0);
        rig.settle();
        let at = rig.position();
        rig.controls.set_pointer(Some(at + Vec2::new(-3.0, 4.0)));
        rig.controls.press(Button::Action);
        rig.ticks(20);
        rig.controls.release(Button::Action);
        rig.tick();
        assert!(rig.velocity().x < 0.0);
        assert!(rig.tick_until("standing", 300));
        assert!(rig.position().x < at.x - 1.0);
    }
}
