use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::Result;

use crate::character::Character;
use crate::config::{FormTuning, SimConfig};
use crate::controls::Controls;
use crate::entity::{EntityId, EntityTree, SimContext};
use crate::error::CoreError;
use crate::events::{EventBus, EventKind, FailCause, GameEvent};
use crate::factory::{self, Stage};
use crate::level::LevelCatalog;
use crate::math::Vec2;
use crate::physics::PhysicsWorld;
use crate::stepper::FixedStepper;

/// A level that currently exists in the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveLevel {
    pub index: usize,
    pub entity: EntityId,
}

#[derive(Clone, Copy, Debug)]
struct Placed {
    level: ActiveLevel,
    origin: Vec2,
}

#[derive(Clone, Copy, Debug)]
struct Running {
    stage: Stage,
    character: EntityId,
    current: Placed,
    /// Level being left behind during a handoff.
    outgoing: Option<Placed>,
}

/// Top-level owner: physics, entity tree, input, events and level flow.
///
/// Drive it with [`World::start`] once and then [`World::frame`] with each
/// render delta.
pub struct World {
    config: SimConfig,
    tuning: FormTuning,
    physics: PhysicsWorld,
    tree: EntityTree,
    controls: Controls,
    events: EventBus,
    stepper: FixedStepper,
    catalog: LevelCatalog,
    running: Option<Running>,
    /// Flow events picked off the bus, handled after each frame.
    inbox: Rc<RefCell<VecDeque<GameEvent>>>,
    complete: bool,
}

impl World {
    pub fn new(
        config: SimConfig,
        tuning: FormTuning,
        catalog: LevelCatalog,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let mut events = EventBus::new();
        let inbox = Rc::new(RefCell::new(VecDeque::new()));
        for kind in [
            EventKind::LevelFinished,
            EventKind::LevelFailed,
            EventKind::TransitionFinished,
        ] {
            let queue = Rc::clone(&inbox);
            events.subscribe(kind, move |event, _| queue.borrow_mut().push_back(*event));
        }

        Ok(Self {
            physics: PhysicsWorld::new(&config),
            stepper: FixedStepper::new(config.fixed_dt, config.max_frame_delta),
            tree: EntityTree::new(),
            controls: Controls::new(),
            events,
            catalog,
            running: None,
            inbox,
            complete: false,
            config,
            tuning,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn tuning(&self) -> &FormTuning {
        &self.tuning
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn tree(&self) -> &EntityTree {
        &self.tree
    }

    pub fn catalog(&self) -> &LevelCatalog {
        &self.catalog
    }

    pub fn stepper(&self) -> &FixedStepper {
        &self.stepper
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut Controls {
        &mut self.controls
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn is_started(&self) -> bool {
        self.running.is_some()
    }

    /// Every level of the catalog has been finished.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn current_level(&self) -> Option<ActiveLevel> {
        self.running.map(|r| r.current.level)
    }

    /// Level still in the tree while the character travels away from it.
    pub fn outgoing_level(&self) -> Option<ActiveLevel> {
        self.running.and_then(|r| r.outgoing).map(|p| p.level)
    }

    pub fn character_entity(&self) -> Option<EntityId> {
        self.running.map(|r| r.character)
    }

    pub fn character(&self) -> Result<&Character> {
        let running = self.running.ok_or(CoreError::NotStarted)?;
        Ok(self.tree.character(running.character)?)
    }

    pub fn character_position(&self) -> Result<Vec2> {
        Ok(self.character()?.position(&self.physics))
    }

    /// Build the stage, the first level and the character.
    pub fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            log::warn!("world already started");
            return Ok(());
        }
        if self.catalog.is_empty() {
            return Err(CoreError::EmptyCatalog.into());
        }

        let data = self.catalog.get(0)?;
        let stage = factory::build_stage(&mut self.tree)?;
        let level = factory::build_level(
            &mut self.tree,
            &mut self.physics,
            stage.levels,
            0,
            data,
            Vec2::ZERO,
        )?;
        let character = factory::build_character(
            &mut self.tree,
            &mut self.physics,
            stage.root,
            0,
            data,
            data.start,
        )?;
        self.physics.update_query_pipeline();

        self.running = Some(Running {
            stage,
            character,
            current: Placed {
                level: ActiveLevel {
                    index: 0,
                    entity: level,
                },
                origin: Vec2::ZERO,
            },
            outgoing: None,
        });
        log::info!("world started with {} levels", self.catalog.len());
        self.events.post(GameEvent::LevelStarted { level: 0 });
        Ok(())
    }

    /// Advance one render frame. Returns the number of fixed ticks run.
    pub fn frame(&mut self, delta: f32) -> Result<u32> {
        if self.running.is_none() {
            return Err(CoreError::NotStarted.into());
        }

        let mut sim = SimContext {
            physics: &mut self.physics,
            controls: &mut self.controls,
            events: &mut self.events,
            config: &self.config,
            tuning: &self.tuning,
        };
        self.tree.initialize(&mut sim);
        self.tree.update(&mut sim, delta)?;

        let tree = &mut self.tree;
        let ticks = self.stepper.advance(delta, |fixed| {
            tree.step(&mut sim, fixed);
            sim.physics.step();
        });

        self.tree.late_update(&mut sim, delta);
        self.process_flow()?;
        Ok(ticks)
    }

    fn process_flow(&mut self) -> Result<()> {
        loop {
            let next = self.inbox.borrow_mut().pop_front();
            let Some(event) = next else {
                return Ok(());
            };
            match event {
                GameEvent::LevelFinished { level } => self.on_level_finished(level)?,
                GameEvent::LevelFailed { level, cause } => self.on_level_failed(level, cause)?,
                GameEvent::TransitionFinished { level } => self.on_transition_finished(level)?,
                other => log::warn!("unexpected flow event {other:?}"),
            }
        }
    }

    fn on_level_finished(&mut self, level: usize) -> Result<()> {
        let mut running = self.running.ok_or(CoreError::NotStarted)?;
        if running.current.level.index != level {
            log::warn!("ignoring finish of level {level}, not current");
            return Ok(());
        }

        let next = level + 1;
        if next >= self.catalog.len() {
            log::info!("all {} levels finished", self.catalog.len());
            self.complete = true;
            return Ok(());
        }

        let data = self.catalog.get(next)?;
        let origin = running.current.origin + Vec2::new(self.config.level_spacing, 0.0);
        let entity = factory::build_level(
            &mut self.tree,
            &mut self.physics,
            running.stage.levels,
            next,
            data,
            origin,
        )?;
        self.physics.update_query_pipeline();

        let mut sim = SimContext {
            physics: &mut self.physics,
            controls: &mut self.controls,
            events: &mut self.events,
            config: &self.config,
            tuning: &self.tuning,
        };
        self.tree
            .character_mut(running.character)?
            .begin_transit(&mut sim, next, data, origin + data.start)?;

        running.outgoing = Some(running.current);
        running.current = Placed {
            level: ActiveLevel {
                index: next,
                entity,
            },
            origin,
        };
        self.running = Some(running);
        self.events.post(GameEvent::TransitionStarted {
            from: level,
            to: next,
        });
        Ok(())
    }

    fn on_level_failed(&mut self, level: usize, cause: FailCause) -> Result<()> {
        let running = self.running.ok_or(CoreError::NotStarted)?;
        log::info!("level {level} failed: {cause:?}");

        let mut sim = SimContext {
            physics: &mut self.physics,
            controls: &mut self.controls,
            events: &mut self.events,
            config: &self.config,
            tuning: &self.tuning,
        };
        self.tree.character_mut(running.character)?.respawn(&mut sim)?;
        self.events.post(GameEvent::LevelStarted {
            level: running.current.level.index,
        });
        Ok(())
    }

    fn on_transition_finished(&mut self, level: usize) -> Result<()> {
        let mut running = self.running.ok_or(CoreError::NotStarted)?;
        if let Some(old) = running.outgoing.take() {
            let removed = self.tree.destroy(old.level.entity, &mut self.physics)?;
            self.physics.update_query_pipeline();
            log::debug!("level {} torn down ({removed} entities)", old.level.index);
        }
        self.running = Some(running);
        self.events.post(GameEvent::LevelStarted { level });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_before_start_is_an_error() {
        let mut world = World::new(
            SimConfig::default(),
            FormTuning::default(),
            LevelCatalog::sample(),
        )
        .unwrap();
        let err = world.frame(1.0 / 60.0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::NotStarted)
        ));
        assert!(world.character().is_err());
    }

    #[test]
    fn empty_catalog_cannot_start() {
        let mut world = World::new(
            SimConfig::default(),
            FormTuning::default(),
            LevelCatalog::new(Vec::new()),
        )
        .unwrap();
        let err = world.start().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::EmptyCatalog)
        ));
        assert!(!world.is_started());
    }

    #[test]
    fn zero_step_is_refused() {
        let config = SimConfig::default().with_fixed_dt(0.0);
        let err = World::new(config, FormTuning::default(), LevelCatalog::sample()).err();
        assert!(matches!(
            err,
            Some(CoreError::InvalidConfig { field: "fixed_dt", .. })
        ));
    }

    #[test]
    fn start_builds_first_level_and_character() {
        let mut world = World::new(
            SimConfig::default(),
            FormTuning::default(),
            LevelCatalog::sample(),
        )
        .unwrap();
        world.start().unwrap();
        world.start().unwrap();

        let level = world.current_level().unwrap();
        assert_eq!(level.index, 0);
        let start = world.catalog().get(0).unwrap().start;
        assert_eq!(world.character_position().unwrap(), start);
        assert_eq!(world.character().unwrap().kind(), crate::forms::FormKind::Hop);

        let ticks = world.frame(0.105).unwrap();
        assert_eq!(ticks, 6);
        assert!(world.tree().get(level.entity).unwrap().is_initialized());
    }
}
