//! The player character: a body, the fixtures of its current form and the
//! form's state machine.

use anyhow::Result;

use crate::contact::FixtureTag;
use crate::controls::Button;
use crate::entity::SimContext;
use crate::events::{FailCause, GameEvent};
use crate::factory;
use crate::forms::{CharacterFixtures, Form, FormContext, FormKind};
use crate::level::LevelData;
use crate::math::Vec2;
use crate::physics::{BodyId, PhysicsWorld};
use crate::tween::Tween;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharacterStatus {
    Playing,
    /// Reached the goal; waiting for the level handoff.
    Finished,
    /// Hit a hazard or fell out; waiting for a respawn.
    Failed,
    /// Tweening to the next level.
    Transit,
}

#[derive(Debug)]
pub struct Character {
    body: BodyId,
    form: Form,
    fixtures: CharacterFixtures,
    allowed: Vec<FormKind>,
    /// Form restored once a transit completes.
    resume: FormKind,
    level: usize,
    spawn: Vec2,
    status: CharacterStatus,
}

fn form_context<'a>(
    body: BodyId,
    fixtures: &'a CharacterFixtures,
    sim: &'a mut SimContext<'_>,
) -> FormContext<'a> {
    FormContext {
        body,
        fixtures,
        physics: &mut *sim.physics,
        controls: &mut *sim.controls,
        tuning: sim.tuning,
    }
}

impl Character {
    /// Wrap an existing dynamic body. The form's fixtures are created here;
    /// its machine starts on the first update.
    pub fn new(
        physics: &mut PhysicsWorld,
        body: BodyId,
        kind: FormKind,
        allowed: Vec<FormKind>,
        level: usize,
        spawn: Vec2,
    ) -> Result<Self> {
        let fixtures = factory::form_fixtures(physics, body, kind)?;
        Ok(Self {
            body,
            form: Form::new(kind),
            fixtures,
            allowed,
            resume: kind,
            level,
            spawn,
            status: CharacterStatus::Playing,
        })
    }

    pub fn body(&self) -> BodyId {
        self.body
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn kind(&self) -> FormKind {
        self.form.kind()
    }

    pub fn state_name(&self) -> &'static str {
        self.form.state_name()
    }

    pub fn fixtures(&self) -> &CharacterFixtures {
        &self.fixtures
    }

    pub fn allowed_forms(&self) -> &[FormKind] {
        &self.allowed
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn spawn(&self) -> Vec2 {
        self.spawn
    }

    pub fn status(&self) -> CharacterStatus {
        self.status
    }

    pub fn position(&self, physics: &PhysicsWorld) -> Vec2 {
        physics.position(self.body).unwrap_or(self.spawn)
    }

    /// Next allowed form after the current one, if there is another.
    fn next_form(&self) -> Option<FormKind> {
        let current = self.form.kind();
        let next = match self.allowed.iter().position(|k| *k == current) {
            Some(i) => self.allowed[(i + 1) % self.allowed.len()],
            None => *self.allowed.first()?,
        };
        (next != current).then_some(next)
    }

    pub fn update(&mut self, sim: &mut SimContext<'_>, delta: f32) -> Result<()> {
        if self.status == CharacterStatus::Playing
            && sim.controls.is_pressed_unique(Button::SwitchForm)
        {
            if let Some(next) = self.next_form() {
                self.switch_form(sim, next)?;
            }
        }

        let mut ctx = form_context(self.body, &self.fixtures, sim);
        self.form.update(&mut ctx, delta);

        if self.status == CharacterStatus::Transit && self.form.is_arrived() {
            self.finish_transit(sim)?;
        }
        Ok(())
    }

    pub fn step(&mut self, sim: &mut SimContext<'_>, fixed_delta: f32) {
        let mut ctx = form_context(self.body, &self.fixtures, sim);
        self.form.step(&mut ctx, fixed_delta);
    }

    /// Hazard, kill plane and goal checks on post-physics state. Each
    /// outcome is reported once; the form is halted until the world reacts.
    pub fn late_update(&mut self, sim: &mut SimContext<'_>, _delta: f32) {
        if self.status != CharacterStatus::Playing {
            return;
        }
        let graph = sim.physics.contacts();
        let touching = |pred: fn(&FixtureTag) -> bool| {
            self.fixtures.all.iter().any(|f| graph.any_matching(*f, pred))
        };

        let outcome = if touching(FixtureTag::is_hazard) {
            Some(GameEvent::LevelFailed {
                level: self.level,
                cause: FailCause::Hazard,
            })
        } else if self.position(sim.physics).y < sim.config.kill_plane {
            Some(GameEvent::LevelFailed {
                level: self.level,
                cause: FailCause::OutOfBounds,
            })
        } else if touching(FixtureTag::is_goal) {
            Some(GameEvent::LevelFinished { level: self.level })
        } else {
            None
        };

        if let Some(event) = outcome {
            self.status = match event {
                GameEvent::LevelFinished { .. } => CharacterStatus::Finished,
                _ => CharacterStatus::Failed,
            };
            let mut ctx = form_context(self.body, &self.fixtures, sim);
            self.form.halt(&mut ctx);
            sim.events.post(event);
        }
    }

    /// Tear down the current form and its fixtures, then build and start
    /// `form` with fresh fixtures.
    fn replace_form(&mut self, sim: &mut SimContext<'_>, form: Form) -> Result<()> {
        {
            let mut ctx = form_context(self.body, &self.fixtures, sim);
            self.form.destroy(&mut ctx);
        }
        let mut failed = None;
        for fixture in std::mem::take(&mut self.fixtures.all) {
            if let Err(err) = sim.physics.destroy_fixture(fixture) {
                failed.get_or_insert(err);
            }
        }
        if let Some(err) = failed {
            return Err(err);
        }
        self.fixtures = factory::form_fixtures(sim.physics, self.body, form.kind())?;
        self.form = form;

        let mut ctx = form_context(self.body, &self.fixtures, sim);
        self.form.start(&mut ctx);
        Ok(())
    }

    pub fn switch_form(&mut self, sim: &mut SimContext<'_>, kind: FormKind) -> Result<()> {
        let from = self.form.kind();
        self.replace_form(sim, Form::new(kind))?;
        if kind != FormKind::Transit {
            self.resume = kind;
        }
        if from != kind {
            log::info!("form {from:?} -> {kind:?}");
            sim.events.post(GameEvent::FormChanged { from, to: kind });
        }
        Ok(())
    }

    /// Tween to `target` (world coordinates), the start of level `level`.
    /// The current form comes back on arrival if the new level allows it.
    pub fn begin_transit(
        &mut self,
        sim: &mut SimContext<'_>,
        level: usize,
        data: &LevelData,
        target: Vec2,
    ) -> Result<()> {
        let from = self.position(sim.physics);
        let tween = Tween::new(
            from,
            target,
            sim.config.transition_duration,
            sim.config.transition_easing,
        )
        .with_rotation(0.0, sim.config.transition_spin);

        self.allowed = data.allowed_forms();
        if !self.allowed.contains(&self.resume) {
            self.resume = data.initial_form();
        }
        self.replace_form(sim, Form::transit(tween))?;
        self.level = level;
        self.spawn = target;
        self.status = CharacterStatus::Transit;
        log::debug!("transit {from:?} -> {target:?} for level {level}");
        Ok(())
    }

    fn finish_transit(&mut self, sim: &mut SimContext<'_>) -> Result<()> {
        self.replace_form(sim, Form::new(self.resume))?;
        self.status = CharacterStatus::Playing;
        sim.events
            .post(GameEvent::TransitionFinished { level: self.level });
        Ok(())
    }

    /// Back to the spawn point with a fresh machine of the current form.
    pub fn respawn(&mut self, sim: &mut SimContext<'_>) -> Result<()> {
        sim.physics.set_position(self.body, self.spawn);
        sim.physics.set_velocity(self.body, Vec2::ZERO);
        sim.physics.set_rotation(self.body, 0.0);
        self.replace_form(sim, Form::new(self.resume))?;
        self.status = CharacterStatus::Playing;
        log::info!("respawned at {:?} in level {}", self.spawn, self.level);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::config::{FormTuning, SimConfig};
    use crate::contact::Orientation;
    use crate::controls::Controls;
    use crate::entity::ZoneKind;
    use crate::events::{EventBus, EventKind};
    use crate::level::LevelCatalog;
    use crate::physics::BodyKind;

    const DT: f32 = 1.0 / 60.0;

    struct Harness {
        physics: PhysicsWorld,
        controls: Controls,
        events: EventBus,
        config: SimConfig,
        tuning: FormTuning,
        seen: Rc<RefCell<Vec<GameEvent>>>,
    }

    impl Harness {
        /// Floor top at y = 0.
        fn new(config: SimConfig) -> Self {
            let mut physics = PhysicsWorld::new(&config);
            let floor = physics.create_body(BodyKind::Fixed, Vec2::new(0.0, -1.0));
            factory::block_fixtures(
                &mut physics,
                floor,
                Vec2::new(60.0, 2.0),
                &Orientation::ALL,
                false,
                false,
            )
            .unwrap();

            let mut events = EventBus::new();
            let seen = Rc::new(RefCell::new(Vec::new()));
            let sink = Rc::clone(&seen);
            events.subscribe_all(move |event, _| sink.borrow_mut().push(*event));

            Self {
                physics,
                controls: Controls::new(),
                events,
                config,
                tuning: FormTuning::default(),
                seen,
            }
        }

        fn sim(&mut self) -> SimContext<'_> {
            SimContext {
                physics: &mut self.physics,
                controls: &mut self.controls,
                events: &mut self.events,
                config: &self.config,
                tuning: &self.tuning,
            }
        }

        fn spawn(&mut self, kind: FormKind, allowed: &[FormKind], at: Vec2) -> Character {
            let body = self.physics.create_body(BodyKind::Dynamic, at);
            Character::new(&mut self.physics, body, kind, allowed.to_vec(), 0, at).unwrap()
        }

        fn frame(&mut self, character: &mut Character) {
            let mut sim = self.sim();
            character.update(&mut sim, DT).unwrap();
            character.step(&mut sim, DT);
            sim.physics.step();
            character.late_update(&mut sim, DT);
        }

        fn frames(&mut self, character: &mut Character, n: usize) {
            for _ in 0..n {
                self.frame(character);
            }
        }

        fn seen(&self) -> Vec<GameEvent> {
            self.seen.borrow().clone()
        }
    }

    fn settle(h: &mut Harness, character: &mut Character) {
        for _ in 0..240 {
            if character.state_name() == "standing" {
                return;
            }
            h.frame(character);
        }
        panic!("never stood up: {}", character.state_name());
    }

    #[test]
    fn switching_form_leaves_old_fixtures_without_contacts() {
        let mut h = Harness::new(SimConfig::default());
        let mut character = h.spawn(FormKind::Hop, &[FormKind::Hop, FormKind::Climb], Vec2::new(0.0, 0.5));
        settle(&mut h, &mut character);

        let old = character.fixtures().clone();
        let foot = old.foot.unwrap();
        assert!(h.physics.contacts().any(foot));

        let mut sim = h.sim();
        character.switch_form(&mut sim, FormKind::Climb).unwrap();

        for fixture in &old.all {
            assert!(h.physics.contacts().contacts(*fixture).is_empty());
            assert!(!h.physics.has_fixture(*fixture));
        }
        assert_eq!(character.kind(), FormKind::Climb);
        assert!(old.all.iter().all(|f| !character.fixtures().all.contains(f)));
        assert_eq!(h.physics.fixtures_of(character.body()), character.fixtures().all.as_slice());
        assert_eq!(
            h.seen(),
            vec![GameEvent::FormChanged {
                from: FormKind::Hop,
                to: FormKind::Climb
            }]
        );

        settle(&mut h, &mut character);
    }

    #[test]
    fn failed_teardown_still_releases_remaining_fixtures() {
        let mut h = Harness::new(SimConfig::default());
        let mut character = h.spawn(FormKind::Hop, &[FormKind::Hop, FormKind::Climb], Vec2::new(0.0, 0.5));
        settle(&mut h, &mut character);

        let old = character.fixtures().clone();
        let foot = old.foot.unwrap();
        h.physics.destroy_fixture(old.hero).unwrap();

        let mut sim = h.sim();
        assert!(character.switch_form(&mut sim, FormKind::Climb).is_err());
        assert!(!h.physics.has_fixture(foot));
        assert!(h.physics.contacts().contacts(foot).is_empty());
        assert!(h.physics.fixtures_of(character.body()).is_empty());
    }

    #[test]
    fn switch_button_cycles_allowed_forms() {
        let mut h = Harness::new(SimConfig::default());
        let mut character = h.spawn(FormKind::Hop, &[FormKind::Hop, FormKind::Dash], Vec2::new(0.0, 0.5));
        settle(&mut h, &mut character);

        h.controls.press(Button::SwitchForm);
        h.frames(&mut character, 10);
        assert_eq!(character.kind(), FormKind::Dash);

        h.controls.release(Button::SwitchForm);
        h.frame(&mut character);
        h.controls.press(Button::SwitchForm);
        h.frame(&mut character);
        assert_eq!(character.kind(), FormKind::Hop);
        assert_eq!(h.events.delivered(), 2);
    }

    #[test]
    fn single_allowed_form_never_switches() {
        let mut h = Harness::new(SimConfig::default());
        let mut character = h.spawn(FormKind::Hop, &[FormKind::Hop], Vec2::new(0.0, 0.5));
        h.controls.press(Button::SwitchForm);
        h.frames(&mut character, 3);
        assert_eq!(character.kind(), FormKind::Hop);
        assert!(h.seen().is_empty());
    }

    #[test]
    fn hazard_fails_once_and_respawn_resets() {
        let mut h = Harness::new(SimConfig::default());
        let zone = h.physics.create_body(BodyKind::Fixed, Vec2::new(6.0, 0.5));
        factory::zone_fixture(&mut h.physics, zone, Vec2::new(1.0, 1.0), ZoneKind::Hazard).unwrap();

        let mut character = h.spawn(FormKind::Hop, &[FormKind::Hop], Vec2::new(6.0, 3.0));
        h.frames(&mut character, 60);

        let failed = GameEvent::LevelFailed {
            level: 0,
            cause: FailCause::Hazard,
        };
        assert_eq!(h.seen(), vec![failed]);
        assert_eq!(character.status(), CharacterStatus::Failed);
        assert!(character.form().is_stopped());

        let mut sim = h.sim();
        character.respawn(&mut sim).unwrap();
        assert_eq!(character.status(), CharacterStatus::Playing);
        assert_eq!(h.physics.position(character.body()), Some(Vec2::new(6.0, 3.0)));
        assert_eq!(character.state_name(), "airborne");
    }

    #[test]
    fn falling_below_kill_plane_fails() {
        let mut config = SimConfig::default();
        config.kill_plane = 5.0;
        let mut h = Harness::new(config);
        let mut character = h.spawn(FormKind::Hop, &[FormKind::Hop], Vec2::new(0.0, 0.5));
        h.frame(&mut character);
        assert_eq!(
            h.seen(),
            vec![GameEvent::LevelFailed {
                level: 0,
                cause: FailCause::OutOfBounds
            }]
        );
        h.frames(&mut character, 5);
        assert_eq!(h.seen().len(), 1);
    }

    #[test]
    fn goal_finishes_the_level() {
        let mut h = Harness::new(SimConfig::default());
        let zone = h.physics.create_body(BodyKind::Fixed, Vec2::new(0.0, 0.5));
        factory::zone_fixture(&mut h.physics, zone, Vec2::new(2.0, 1.0), ZoneKind::Goal).unwrap();
        let mut character = h.spawn(FormKind::Hop, &[FormKind::Hop], Vec2::new(0.0, 0.5));
        h.frames(&mut character, 3);
        assert_eq!(h.seen(), vec![GameEvent::LevelFinished { level: 0 }]);
        assert_eq!(character.status(), CharacterStatus::Finished);
    }

    #[test]
    fn transit_arrives_and_restores_an_allowed_form() {
        let config = SimConfig::default().with_transition(0.5, crate::tween::Easing::Linear);
        let mut h = Harness::new(config);
        let mut character = h.spawn(FormKind::Hop, &[FormKind::Hop, FormKind::DoubleHop], Vec2::new(0.0, 0.5));
        settle(&mut h, &mut character);

        let catalog = LevelCatalog::sample();
        // allows Phase and Hop
        let next = catalog.get(1).unwrap();
        let target = Vec2::new(20.0, 2.0);
        let mut sim = h.sim();
        character.begin_transit(&mut sim, 1, next, target).unwrap();
        assert_eq!(character.status(), CharacterStatus::Transit);
        assert_eq!(character.kind(), FormKind::Transit);
        assert_eq!(character.fixtures().foot, None);

        let finished = Rc::new(RefCell::new(0));
        let count = Rc::clone(&finished);
        h.events.subscribe(EventKind::TransitionFinished, move |_, _| *count.borrow_mut() += 1);

        h.frames(&mut character, 40);
        assert_eq!(*finished.borrow(), 1);
        assert_eq!(character.status(), CharacterStatus::Playing);
        assert_eq!(character.kind(), FormKind::Hop);
        assert_eq!(character.level(), 1);
        assert_eq!(character.spawn(), target);
        assert_eq!(character.allowed_forms(), &[FormKind::Phase, FormKind::Hop]);
    }
}
