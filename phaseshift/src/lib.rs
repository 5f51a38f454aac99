//! Phaseshift - simulation core for a form-switching 2D platformer.
//!
//! A [`World`] owns the physics world, the entity tree and the level flow.
//! Feed it input through [`World::controls_mut`] and render deltas through
//! [`World::frame`]; everything else happens in fixed physics ticks.

pub mod character;
pub mod config;
pub mod contact;
pub mod controls;
pub mod entity;
pub mod error;
pub mod events;
pub mod factory;
pub mod forms;
pub mod level;
pub mod math;
pub mod physics;
pub mod state;
pub mod stepper;
pub mod tween;
pub mod world;

pub use crate::character::{Character, CharacterStatus};
pub use crate::config::{FormTuning, SimConfig};
pub use crate::contact::{ContactFilter, ContactGraph, ContactListener, FixtureId, FixtureTag, Orientation};
pub use crate::controls::{Button, Controls};
pub use crate::entity::{EntityId, EntityTree, Feature, SimContext};
pub use crate::error::CoreError;
pub use crate::events::{EventBus, EventKind, FailCause, GameEvent, SubscriptionId};
pub use crate::forms::{Form, FormKind};
pub use crate::level::{LevelCatalog, LevelData};
pub use crate::math::Vec2;
pub use crate::physics::{BodyId, BodyKind, PhysicsWorld};
pub use crate::state::{State, StateMachine};
pub use crate::stepper::FixedStepper;
pub use crate::tween::{Easing, Tween};
pub use crate::world::{ActiveLevel, World};
