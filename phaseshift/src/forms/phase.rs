use super::{BodyDriver, FormContext, FormState, Move};
use crate::controls::Button;
use crate::math::Vec2;
use crate::state::State;

/// Where a phase starts and ends.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseTarget {
    pub origin: Vec2,
    pub target: Vec2,
    pub direction: Vec2,
    pub distance: f32,
}

impl PhaseTarget {
    pub fn duration(&self, speed: f32) -> f32 {
        if speed <= 0.0 {
            0.0
        } else {
            self.distance / speed
        }
    }
}

/// Validate a phase towards the pointer.
///
/// The character must touch a phasing-target surface, and the ray towards
/// the pointer must cross at least two phaseable surfaces within range:
/// the near face of the wall and its far face. The phase ends just past
/// the second crossing.
pub fn find_phase_target(ctx: &FormContext<'_>) -> Option<PhaseTarget> {
    let graph = ctx.physics.contacts();
    graph.nearest_surface(ctx.fixtures.hero, |s| s.phasing_target)?;

    let origin = ctx.position();
    let direction = ctx.aim()?;
    let exit = ctx
        .physics
        .ray_cast_all(origin, direction, ctx.tuning.phase_range)
        .into_iter()
        .filter(|hit| {
            graph
                .tag(hit.fixture)
                .and_then(|tag| tag.surface())
                .map_or(false, |surface| surface.phaseable)
        })
        .nth(1)?;

    let target = exit.point + direction * ctx.tuning.phase_exit_margin;
    Some(PhaseTarget {
        origin,
        target,
        direction,
        distance: origin.distance(target),
    })
}

/// Teleport through phaseable walls at constant speed.
#[derive(Clone, Debug, PartialEq)]
pub enum PhaseState {
    Move(Move),
    Phasing { path: PhaseTarget, elapsed: f32 },
    Stopped,
}

impl PhaseState {
    /// Consume the action edge and try to start a phase.
    fn try_phase(ctx: &mut FormContext<'_>) -> Option<Self> {
        if !ctx.controls.is_pressed_unique(Button::Action) {
            return None;
        }
        let path = find_phase_target(ctx);
        if path.is_none() {
            log::debug!("phase rejected: no target past two phaseable surfaces");
        }
        path.map(|path| PhaseState::Phasing { path, elapsed: 0.0 })
    }
}

impl State<FormContext<'_>> for PhaseState {
    fn name(&self) -> &'static str {
        match self {
            PhaseState::Move(m) => m.name(),
            PhaseState::Phasing { .. } => "phasing",
            PhaseState::Stopped => "stopped",
        }
    }

    fn start(&mut self, ctx: &mut FormContext<'_>) {
        match self {
            PhaseState::Move(m) => m.start(ctx),
            PhaseState::Phasing { path, .. } => {
                let hero = ctx.fixtures.hero;
                ctx.physics.set_phasing(hero, true);
                ctx.set_gravity_enabled(false);
                let speed = ctx.tuning.phase_speed;
                ctx.set_velocity(path.direction * speed);
            }
            PhaseState::Stopped => {}
        }
    }

    fn update(&mut self, ctx: &mut FormContext<'_>, delta: f32) {
        if let PhaseState::Phasing { path, elapsed } = self {
            *elapsed += delta;
            if *elapsed >= path.duration(ctx.tuning.phase_speed) {
                ctx.set_position(path.target);
                ctx.set_velocity(Vec2::ZERO);
            }
        }
    }

    fn step(&mut self, ctx: &mut FormContext<'_>, fixed_delta: f32) {
        match self {
            PhaseState::Move(m) => m.step(ctx, fixed_delta),
            PhaseState::Phasing { path, .. } => {
                let speed = ctx.tuning.phase_speed;
                ctx.set_velocity(path.direction * speed);
            }
            PhaseState::Stopped => {}
        }
    }

    fn next_state(&self, ctx: &mut FormContext<'_>, frames: u32) -> Option<Self> {
        match self {
            PhaseState::Move(m @ (Move::Standing | Move::Airborne)) => {
                PhaseState::try_phase(ctx).or_else(|| m.next(ctx, frames).map(PhaseState::Move))
            }
            PhaseState::Move(m) => m.next(ctx, frames).map(PhaseState::Move),
            PhaseState::Phasing { path, elapsed } => (*elapsed
                >= path.duration(ctx.tuning.phase_speed))
            .then_some(PhaseState::Move(Move::Airborne)),
            PhaseState::Stopped => None,
        }
    }

    fn destroy(&mut self, ctx: &mut FormContext<'_>) {
        if let PhaseState::Phasing { .. } = self {
            let hero = ctx.fixtures.hero;
            ctx.physics.set_phasing(hero, false);
            ctx.set_gravity_enabled(true);
        }
    }
}

impl FormState for PhaseState {
    fn stopped() -> Self {
        PhaseState::Stopped
    }

    fn is_stopped(&self) -> bool {
        matches!(self, PhaseState::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use crate::contact::FixtureTag;
    use crate::controls::Button;
    use crate::forms::testing::{block, Rig};
    use crate::forms::FormKind;
    use crate::math::Vec2;

    /// Hero pressed against the left face of a 1-wide phasing wall.
    fn wall_rig(phasing_target: bool) -> Rig {
        let mut rig = Rig::new(FormKind::Phase, 1.1);
        block(&mut rig.physics, Vec2::new(2.0, 2.0), Vec2::new(1.0, 4.0), phasing_target);
        rig.settle();
        rig
    }

    fn hero_phasing(rig: &Rig) -> bool {
        matches!(
            rig.physics.contacts().tag(rig.fixtures.hero),
            Some(FixtureTag::Hero { phasing: true })
        )
    }

    #[test]
    fn phases_through_wall_towards_pointer() {
        let mut rig = wall_rig(true);
        let start = rig.position();
        rig.controls.set_pointer(Some(Vec2::new(8.0, start.y)));
        rig.controls.press(Button::Action);
        rig.tick();
        assert_eq!(rig.form.state_name(), "phasing");
        assert!(hero_phasing(&rig));
        assert_eq!(rig.physics.gravity_scale(rig.body), Some(0.0));

        assert!(rig.tick_until("airborne", 30));
        assert!(!hero_phasing(&rig));
        let end = rig.position();
        assert!(end.x > 2.8, "ended at {end:?}");
        assert!((end.y - start.y).abs() < 0.2);

        assert!(rig.tick_until("standing", 120));
        assert!(rig.position().x > 2.8);
    }

    #[test]
    fn phase_wins_over_a_jump_on_the_same_tick() {
        let mut rig = wall_rig(true);
        let start = rig.position();
        rig.controls.set_pointer(Some(Vec2::new(8.0, start.y)));
        rig.controls.press(Button::Action);
        rig.controls.press(Button::Jump);
        rig.tick();
        assert_eq!(rig.form.state_name(), "phasing");
        // the jump edge was never looked at
        assert!(rig.controls.is_pressed_unique(Button::Jump));
    }

    #[test]
    fn needs_two_phaseable_crossings() {
        let mut rig = wall_rig(true);
        let start = rig.position();
        // open space to the left: nothing to cross
        rig.controls.set_pointer(Some(Vec2::new(-8.0, start.y)));
        rig.controls.press(Button::Action);
        rig.tick();
        assert_eq!(rig.form.state_name(), "standing");

        // the press was consumed; a held button does not retry
        rig.controls.set_pointer(Some(Vec2::new(8.0, start.y)));
        rig.tick();
        assert_eq!(rig.form.state_name(), "standing");
    }

    #[test]
    fn needs_a_phasing_target_contact() {
        let mut rig = wall_rig(false);
        let start = rig.position();
        rig.controls.set_pointer(Some(Vec2::new(8.0, start.y)));
        rig.controls.press(Button::Action);
        rig.ticks(3);
        assert_eq!(rig.form.state_name(), "standing");
        assert!(rig.position().x < 1.5);
    }

    #[test]
    fn target_lies_past_the_far_face() {
        let mut rig = wall_rig(true);
        let start = rig.position();
        rig.controls.set_pointer(Some(Vec2::new(8.0, start.y)));
        let ctx = crate::forms::FormContext {
            body: rig.body,
            fixtures: &rig.fixtures,
            physics: &mut rig.physics,
            controls: &mut rig.controls,
            tuning: &rig.tuning,
        };
        let path = super::find_phase_target(&ctx).unwrap();
        assert!(path.target.x > 2.5 + 0.4);
        assert!(path.target.x < 2.5 + 1.0);
        assert!((path.direction.x - 1.0).abs() < 1e-4);
    }
}
