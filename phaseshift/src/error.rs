//! Invariant violations raised by the simulation core.
//!
//! These are construction-time or logic bugs, never gameplay conditions:
//! callers propagate them with `?` up to the application, which halts.
//! Gameplay failures (hazards, falling out of a level) are
//! [`GameEvent`](crate::events::GameEvent)s instead.

use thiserror::Error;

use crate::contact::FixtureId;
use crate::entity::EntityId;
use crate::physics::BodyId;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("entity {0:?} does not exist")]
    UnknownEntity(EntityId),

    #[error("parent entity {0:?} is required but is not part of the tree")]
    MissingParent(EntityId),

    #[error("entity {0:?} has no physics body")]
    MissingBody(EntityId),

    #[error("physics body {0:?} does not exist")]
    UnknownBody(BodyId),

    #[error("fixture {0:?} does not exist")]
    MissingFixture(FixtureId),

    #[error("polygon with {0} points does not form a convex shape")]
    DegeneratePolygon(usize),

    #[error("entity {0:?} is not a character")]
    NotACharacter(EntityId),

    #[error("level {index} does not exist (catalog has {count} levels)")]
    UnknownLevel { index: usize, count: usize },

    #[error("level catalog is empty")]
    EmptyCatalog,

    #[error("world has not been started")]
    NotStarted,

    #[error("config value `{field}` must be positive and finite, got {value}")]
    InvalidConfig { field: &'static str, value: f32 },
}
