//! Character forms: one state graph per movement mode.
//!
//! Every form shares the grounded skeleton in [`Move`]
//! (`Standing -> Windup -> JumpStart -> Airborne -> Landing -> Standing`)
//! and adds its own branches in front of it. [`Form`] is the tagged variant
//! the character owns; it dispatches to the right [`StateMachine`].

mod climb;
mod dash;
mod double_hop;
mod hop;
mod phase;
mod throw;
mod transit;

pub use climb::ClimbState;
pub use dash::DashState;
pub use double_hop::DoubleHopState;
pub use hop::HopState;
pub use phase::{find_phase_target, PhaseState, PhaseTarget};
pub use throw::ThrowState;
pub use transit::TransitState;

use serde::{Deserialize, Serialize};

use crate::config::FormTuning;
use crate::contact::{FixtureId, Orientation};
use crate::controls::{Button, Controls};
use crate::math::Vec2;
use crate::physics::{BodyId, PhysicsWorld};
use crate::state::{State, StateMachine};
use crate::tween::Tween;

/// Vertical speed at or below which a grounded body counts as landed.
const LANDING_VY: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormKind {
    Hop,
    DoubleHop,
    Climb,
    Dash,
    Phase,
    Throw,
    /// Scripted level handoff; never selectable by the player.
    Transit,
}

impl FormKind {
    pub const PLAYABLE: [FormKind; 6] = [
        FormKind::Hop,
        FormKind::DoubleHop,
        FormKind::Climb,
        FormKind::Dash,
        FormKind::Phase,
        FormKind::Throw,
    ];

    /// Collision box of the hero fixture for this form.
    pub fn body_size(self) -> Vec2 {
        match self {
            FormKind::Hop | FormKind::DoubleHop => Vec2::new(0.8, 1.0),
            FormKind::Climb => Vec2::new(0.7, 1.1),
            FormKind::Dash => Vec2::new(0.9, 0.8),
            FormKind::Phase | FormKind::Transit => Vec2::new(0.8, 0.8),
            FormKind::Throw => Vec2::ONE,
        }
    }

    /// Transit passes through everything; every other form is solid.
    pub fn is_solid(self) -> bool {
        !matches!(self, FormKind::Transit)
    }
}

/// Fixtures owned by the character's current form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharacterFixtures {
    pub hero: FixtureId,
    pub foot: Option<FixtureId>,
    /// Every fixture of the set, hero and foot included.
    pub all: Vec<FixtureId>,
}

/// Everything a form state may touch during one hook call.
pub struct FormContext<'a> {
    pub body: BodyId,
    pub fixtures: &'a CharacterFixtures,
    pub physics: &'a mut PhysicsWorld,
    pub controls: &'a mut Controls,
    pub tuning: &'a FormTuning,
}

/// Physics helpers shared by all forms.
pub trait BodyDriver {
    fn position(&self) -> Vec2;
    fn set_position(&mut self, position: Vec2);
    fn velocity(&self) -> Vec2;
    fn set_velocity(&mut self, velocity: Vec2);
    fn mass(&self) -> f32;
    fn set_rotation(&mut self, angle: f32);
    /// Continuous force for the next physics step.
    fn push(&mut self, force: Vec2);
    /// Instantaneous impulse.
    fn kick(&mut self, impulse: Vec2);
    fn set_gravity_enabled(&mut self, enabled: bool);
    fn set_damping(&mut self, damping: f32);

    /// Accelerate towards `axis * max_speed` without overshooting. With no
    /// input, `brake` decides whether lateral speed bleeds off.
    fn drive(&mut self, axis: f32, accel: f32, max_speed: f32, fixed_delta: f32, brake: bool) {
        if axis == 0.0 && !brake {
            return;
        }
        let vx = self.velocity().x;
        let wanted = (axis * max_speed - vx) / fixed_delta.max(f32::EPSILON);
        let ax = wanted.clamp(-accel, accel);
        let mass = self.mass();
        self.push(Vec2::new(ax * mass, 0.0));
    }

    /// Replace vertical speed with `speed` via an impulse.
    fn launch(&mut self, speed: f32) {
        let vy = self.velocity().y;
        let mass = self.mass();
        self.kick(Vec2::new(0.0, (speed - vy) * mass));
    }

    /// Stop dead and impulse along `direction` at `speed`.
    fn throw_along(&mut self, direction: Vec2, speed: f32) {
        self.set_velocity(Vec2::ZERO);
        let mass = self.mass();
        self.kick(direction * (speed * mass));
    }
}

impl BodyDriver for FormContext<'_> {
    fn position(&self) -> Vec2 {
        self.physics.position(self.body).unwrap_or_default()
    }

    fn set_position(&mut self, position: Vec2) {
        self.physics.set_position(self.body, position);
    }

    fn velocity(&self) -> Vec2 {
        self.physics.velocity(self.body).unwrap_or_default()
    }

    fn set_velocity(&mut self, velocity: Vec2) {
        self.physics.set_velocity(self.body, velocity);
    }

    fn mass(&self) -> f32 {
        self.physics.mass(self.body).unwrap_or(0.0)
    }

    fn set_rotation(&mut self, angle: f32) {
        self.physics.set_rotation(self.body, angle);
    }

    fn push(&mut self, force: Vec2) {
        self.physics.apply_force(self.body, force);
    }

    fn kick(&mut self, impulse: Vec2) {
        self.physics.apply_impulse(self.body, impulse);
    }

    fn set_gravity_enabled(&mut self, enabled: bool) {
        self.physics
            .set_gravity_scale(self.body, if enabled { 1.0 } else { 0.0 });
    }

    fn set_damping(&mut self, damping: f32) {
        self.physics.set_linear_damping(self.body, damping);
    }
}

impl FormContext<'_> {
    /// Foot sensor rests on an upward-facing surface.
    pub fn grounded(&self) -> bool {
        self.fixtures
            .foot
            .map_or(false, |foot| {
                self.physics.contacts().orientation_contact(foot, Orientation::Top)
            })
    }

    /// +1 when a wall is to the right, -1 when to the left. A hero touching
    /// a wall's `Left` face has the wall on its right.
    pub fn wall_side(&self) -> Option<f32> {
        let graph = self.physics.contacts();
        if graph.orientation_contact(self.fixtures.hero, Orientation::Left) {
            Some(1.0)
        } else if graph.orientation_contact(self.fixtures.hero, Orientation::Right) {
            Some(-1.0)
        } else {
            None
        }
    }

    pub fn axis(&self) -> f32 {
        self.controls.horizontal()
    }

    /// Unit vector from the body towards the pointer, if there is one.
    pub fn aim(&self) -> Option<Vec2> {
        let pointer = self.controls.pointer()?;
        (pointer - self.position()).try_normalize()
    }
}

/// The grounded skeleton every form builds on.
#[derive(Clone, Debug, PartialEq)]
pub enum Move {
    Standing,
    Windup,
    JumpStart { full: bool },
    Airborne,
    Landing,
}

impl Move {
    pub fn name(&self) -> &'static str {
        match self {
            Move::Standing => "standing",
            Move::Windup => "windup",
            Move::JumpStart { .. } => "jump-start",
            Move::Airborne => "airborne",
            Move::Landing => "landing",
        }
    }

    pub fn start(&self, ctx: &mut FormContext<'_>) {
        match self {
            Move::JumpStart { full } => {
                let speed = ctx.tuning.hop_speed(*full);
                ctx.launch(speed);
            }
            Move::Landing => ctx.controls.require_unique_press(Button::Jump),
            _ => {}
        }
    }

    pub fn step(&self, ctx: &mut FormContext<'_>, fixed_delta: f32) {
        let axis = ctx.axis();
        let (run, air, max) = (
            ctx.tuning.run_accel,
            ctx.tuning.air_accel,
            ctx.tuning.max_run_speed,
        );
        match self {
            Move::Standing | Move::Windup => ctx.drive(axis, run, max, fixed_delta, true),
            Move::JumpStart { .. } | Move::Airborne => ctx.drive(axis, air, max, fixed_delta, false),
            Move::Landing => ctx.drive(0.0, run, max, fixed_delta, true),
        }
    }

    /// Skeleton transitions, in priority order per state.
    pub fn next(&self, ctx: &mut FormContext<'_>, frames: u32) -> Option<Move> {
        match self {
            Move::Standing => {
                if !ctx.grounded() {
                    Some(Move::Airborne)
                } else if ctx.controls.is_pressed_unique(Button::Jump) {
                    Some(Move::Windup)
                } else {
                    None
                }
            }
            Move::Windup => {
                if !ctx.grounded() {
                    Some(Move::Airborne)
                } else if frames >= ctx.tuning.windup_ticks {
                    Some(Move::JumpStart {
                        full: ctx.controls.is_pressed(Button::Jump),
                    })
                } else {
                    None
                }
            }
            Move::JumpStart { .. } => Some(Move::Airborne),
            Move::Airborne => Move::landed(ctx, frames).then_some(Move::Landing),
            Move::Landing => {
                if !ctx.grounded() {
                    Some(Move::Airborne)
                } else if frames >= ctx.tuning.landing_ticks {
                    Some(Move::Standing)
                } else {
                    None
                }
            }
        }
    }

    /// Airborne long enough, feet on the ground and not rising.
    pub fn landed(ctx: &FormContext<'_>, frames: u32) -> bool {
        frames >= ctx.tuning.min_air_ticks && ctx.grounded() && ctx.velocity().y <= LANDING_VY
    }
}

/// Extra hooks the [`Form`] wrapper needs from each form's state type.
pub trait FormState: for<'a> State<FormContext<'a>> {
    /// Terminal state: never transitions.
    fn stopped() -> Self;

    fn is_stopped(&self) -> bool;
}

macro_rules! each_form {
    ($form:expr, $sm:ident => $body:expr) => {
        match $form {
            Form::Hop($sm) => $body,
            Form::DoubleHop($sm) => $body,
            Form::Climb($sm) => $body,
            Form::Dash($sm) => $body,
            Form::Phase($sm) => $body,
            Form::Throw($sm) => $body,
            Form::Transit($sm) => $body,
        }
    };
}

/// A character's movement mode: a state machine per kind.
#[derive(Debug, Clone)]
pub enum Form {
    Hop(StateMachine<HopState>),
    DoubleHop(StateMachine<DoubleHopState>),
    Climb(StateMachine<ClimbState>),
    Dash(StateMachine<DashState>),
    Phase(StateMachine<PhaseState>),
    Throw(StateMachine<ThrowState>),
    Transit(StateMachine<TransitState>),
}

impl Form {
    /// A playable form starting in the air; it lands on its own if grounded.
    /// `Transit` starts already arrived; use [`Form::transit`] instead.
    pub fn new(kind: FormKind) -> Self {
        match kind {
            FormKind::Hop => Form::Hop(StateMachine::new(HopState::Move(Move::Airborne))),
            FormKind::DoubleHop => {
                Form::DoubleHop(StateMachine::new(DoubleHopState::Move(Move::Airborne)))
            }
            FormKind::Climb => Form::Climb(StateMachine::new(ClimbState::Move(Move::Airborne))),
            FormKind::Dash => Form::Dash(StateMachine::new(DashState::Move(Move::Airborne))),
            FormKind::Phase => Form::Phase(StateMachine::new(PhaseState::Move(Move::Airborne))),
            FormKind::Throw => Form::Throw(StateMachine::new(ThrowState::Move(Move::Airborne))),
            FormKind::Transit => Form::Transit(StateMachine::new(TransitState::Arrived)),
        }
    }

    pub fn transit(tween: Tween) -> Self {
        Form::Transit(StateMachine::new(TransitState::Tweening(tween)))
    }

    pub fn kind(&self) -> FormKind {
        match self {
            Form::Hop(_) => FormKind::Hop,
            Form::DoubleHop(_) => FormKind::DoubleHop,
            Form::Climb(_) => FormKind::Climb,
            Form::Dash(_) => FormKind::Dash,
            Form::Phase(_) => FormKind::Phase,
            Form::Throw(_) => FormKind::Throw,
            Form::Transit(_) => FormKind::Transit,
        }
    }

    pub fn state_name(&self) -> &'static str {
        each_form!(self, sm => sm.active().name())
    }

    pub fn frames(&self) -> u32 {
        each_form!(self, sm => sm.frames())
    }

    pub fn is_stopped(&self) -> bool {
        each_form!(self, sm => sm.active().is_stopped())
    }

    /// True once a transit tween has completed.
    pub fn is_arrived(&self) -> bool {
        matches!(self, Form::Transit(sm) if matches!(sm.active(), TransitState::Arrived))
    }

    /// Start the initial state now instead of on the first update.
    pub fn start(&mut self, ctx: &mut FormContext<'_>) {
        each_form!(self, sm => sm.start(ctx))
    }

    pub fn update(&mut self, ctx: &mut FormContext<'_>, delta: f32) {
        each_form!(self, sm => sm.update(ctx, delta))
    }

    pub fn step(&mut self, ctx: &mut FormContext<'_>, fixed_delta: f32) {
        each_form!(self, sm => sm.step(ctx, fixed_delta))
    }

    /// Force the terminal state, running the active state's cleanup.
    pub fn halt(&mut self, ctx: &mut FormContext<'_>) {
        if !self.is_stopped() {
            each_form!(self, sm => sm.transition(ctx, FormState::stopped()))
        }
    }

    /// Tear down the active state before the form is dropped.
    pub fn destroy(&mut self, ctx: &mut FormContext<'_>) {
        each_form!(self, sm => sm.destroy(ctx))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn starts_airborne_then_stands() {
        let mut rig = Rig::new(FormKind::Hop, 0.0);
        assert_eq!(rig.form.state_name(), "airborne");
        rig.settle();
        assert!(rig.position().y > 0.3);
    }

    #[test]
    fn standing_runs_and_brakes() {
        let mut rig = Rig::new(FormKind::Hop, 0.0);
        rig.settle();
        rig.controls.press(Button::Right);
        rig.ticks(60);
        let v = rig.velocity().x;
        assert!(v > 7.0 && v <= 8.1, "run speed {v}");

        rig.controls.release(Button::Right);
        rig.ticks(30);
        assert!(rig.velocity().x.abs() < 0.1);
    }

    #[test]
    fn losing_ground_beats_a_fresh_jump() {
        let mut rig = Rig::new(FormKind::Hop, 0.0);
        rig.settle();
        let lifted = rig.position() + Vec2::new(0.0, 5.0);
        rig.physics.set_position(rig.body, lifted);
        rig.physics.step();
        let foot = rig.fixtures.foot.unwrap();
        assert!(!rig.physics.contacts().any(foot));
        assert_eq!(rig.form.state_name(), "standing");

        rig.controls.press(Button::Jump);
        rig.tick();
        assert_eq!(rig.form.state_name(), "airborne");
        assert!(rig.controls.is_pressed_unique(Button::Jump));
    }

    #[test]
    fn halt_is_terminal() {
        let mut rig = Rig::new(FormKind::Hop, 0.0);
        rig.settle();
        let mut ctx = FormContext {
            body: rig.body,
            fixtures: &rig.fixtures,
            physics: &mut rig.physics,
            controls: &mut rig.controls,
            tuning: &rig.tuning,
        };
        rig.form.halt(&mut ctx);
        assert!(rig.form.is_stopped());
        rig.controls.press(Button::Jump);
        rig.ticks(10);
        assert_eq!(rig.form.state_name(), "stopped");
    }

    #[test]
    fn each_playable_form_settles() {
        for kind in FormKind::PLAYABLE {
            let mut rig = Rig::new(kind, 0.0);
            rig.settle();
            assert_eq!(rig.form.kind(), kind);
        }
    }
}
