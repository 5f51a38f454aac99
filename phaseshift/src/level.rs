//! Level descriptors.
//!
//! Coordinates are local to the level origin; the world places each level
//! at its own offset when it is built.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::contact::Orientation;
use crate::error::CoreError;
use crate::forms::FormKind;
use crate::math::Vec2;

fn all_faces() -> Vec<Orientation> {
    Orientation::ALL.to_vec()
}

fn playable_forms() -> Vec<FormKind> {
    FormKind::PLAYABLE.to_vec()
}

/// A solid block; each listed face gets a surface strip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallData {
    pub center: Vec2,
    pub size: Vec2,
    #[serde(default = "all_faces")]
    pub faces: Vec<Orientation>,
    /// Phasing characters pass through it.
    #[serde(default)]
    pub phaseable: bool,
    /// Touching it lets a character start a phase.
    #[serde(default)]
    pub phasing_target: bool,
}

/// A one-way-looking ledge: solid, with only a top surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformData {
    pub center: Vec2,
    pub size: Vec2,
    #[serde(default)]
    pub phaseable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneData {
    pub center: Vec2,
    pub size: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelData {
    pub name: String,
    pub start: Vec2,
    #[serde(default)]
    pub walls: Vec<WallData>,
    #[serde(default)]
    pub platforms: Vec<PlatformData>,
    #[serde(default)]
    pub hazards: Vec<ZoneData>,
    pub goal: ZoneData,
    /// Forms the player may cycle through in this level.
    #[serde(default = "playable_forms")]
    pub forms: Vec<FormKind>,
    /// Form on arrival; defaults to the first allowed form.
    #[serde(default)]
    pub initial_form: Option<FormKind>,
}

impl LevelData {
    /// Allowed forms with `Transit` and duplicates removed, never empty.
    pub fn allowed_forms(&self) -> Vec<FormKind> {
        let mut forms: Vec<FormKind> = Vec::new();
        for kind in &self.forms {
            if *kind != FormKind::Transit && !forms.contains(kind) {
                forms.push(*kind);
            }
        }
        if forms.is_empty() {
            forms.push(FormKind::Hop);
        }
        forms
    }

    pub fn initial_form(&self) -> FormKind {
        let allowed = self.allowed_forms();
        match self.initial_form {
            Some(kind) if allowed.contains(&kind) => kind,
            _ => allowed[0],
        }
    }
}

/// Ordered list of levels played back to back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelCatalog {
    pub levels: Vec<LevelData>,
}

impl LevelCatalog {
    pub fn new(levels: Vec<LevelData>) -> Self {
        Self { levels }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid level catalog")
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&LevelData, CoreError> {
        self.levels.get(index).ok_or(CoreError::UnknownLevel {
            index,
            count: self.levels.len(),
        })
    }

    /// Three short levels: a run to the goal, a wall to phase through and
    /// a pit to cross.
    pub fn sample() -> Self {
        let floor = |center: Vec2, width: f32| WallData {
            center,
            size: Vec2::new(width, 2.0),
            faces: all_faces(),
            phaseable: false,
            phasing_target: false,
        };
        let goal = |center: Vec2| ZoneData {
            center,
            size: Vec2::new(1.0, 2.0),
        };

        Self::new(vec![
            LevelData {
                name: "first steps".into(),
                start: Vec2::new(-10.0, 1.0),
                walls: vec![floor(Vec2::new(0.0, -1.0), 30.0)],
                platforms: vec![PlatformData {
                    center: Vec2::new(2.0, 2.5),
                    size: Vec2::new(4.0, 0.5),
                    phaseable: false,
                }],
                hazards: Vec::new(),
                goal: goal(Vec2::new(12.0, 1.0)),
                forms: vec![FormKind::Hop, FormKind::DoubleHop],
                initial_form: None,
            },
            LevelData {
                name: "thin wall".into(),
                start: Vec2::new(-8.0, 1.0),
                walls: vec![
                    floor(Vec2::new(0.0, -1.0), 30.0),
                    WallData {
                        center: Vec2::new(0.0, 4.0),
                        size: Vec2::new(1.0, 8.0),
                        faces: all_faces(),
                        phaseable: true,
                        phasing_target: true,
                    },
                ],
                platforms: Vec::new(),
                hazards: Vec::new(),
                goal: goal(Vec2::new(8.0, 1.0)),
                forms: vec![FormKind::Phase, FormKind::Hop],
                initial_form: Some(FormKind::Phase),
            },
            LevelData {
                name: "the pit".into(),
                start: Vec2::new(-12.0, 1.0),
                walls: vec![
                    floor(Vec2::new(-8.0, -1.0), 16.0),
                    floor(Vec2::new(10.0, -1.0), 12.0),
                    WallData {
                        center: Vec2::new(15.5, 4.0),
                        size: Vec2::new(1.0, 10.0),
                        faces: vec![Orientation::Left],
                        phaseable: false,
                        phasing_target: false,
                    },
                ],
                platforms: Vec::new(),
                hazards: vec![ZoneData {
                    center: Vec2::new(1.0, -3.0),
                    size: Vec2::new(2.0, 1.0),
                }],
                goal: goal(Vec2::new(14.0, 1.0)),
                forms: vec![FormKind::Dash, FormKind::DoubleHop, FormKind::Climb, FormKind::Throw],
                initial_form: None,
            },
        ])
    }
}
