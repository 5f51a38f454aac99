//! Contact graph: which fixtures currently touch which.
//!
//! The physics wrapper feeds begin/end notifications through
//! [`ContactListener`] and consults [`ContactFilter`] from its pre-solve
//! hook. States query the graph to decide grounded/wall/phase conditions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identifier of a fixture created through [`PhysicsWorld`](crate::physics::PhysicsWorld).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixtureId(u32);

impl FixtureId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn to_u32(self) -> u32 {
        self.0
    }
}

/// Side of a solid that a surface faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Top,
    Bottom,
    Left,
    Right,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Top,
        Orientation::Bottom,
        Orientation::Left,
        Orientation::Right,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Surface {
    pub orientation: Orientation,
    /// A character touching this surface may start a phase.
    pub phasing_target: bool,
    /// Counts as a crossing when validating a phase ray.
    pub phaseable: bool,
}

/// Metadata carried by every fixture. Exactly one per fixture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixtureTag {
    Hero { phasing: bool },
    Foot,
    Surface(Surface),
    Obstruction { phaseable: bool },
    Hazard,
    Goal,
}

impl FixtureTag {
    pub fn surface(&self) -> Option<Surface> {
        match self {
            FixtureTag::Surface(surface) => Some(*surface),
            _ => None,
        }
    }

    pub fn is_hazard(&self) -> bool {
        matches!(self, FixtureTag::Hazard)
    }

    pub fn is_goal(&self) -> bool {
        matches!(self, FixtureTag::Goal)
    }
}

/// Phase-through rule: a phasing hero passes phaseable obstructions.
pub fn should_collide_tags(a: &FixtureTag, b: &FixtureTag) -> bool {
    let phases = |x: &FixtureTag, y: &FixtureTag| {
        matches!(x, FixtureTag::Obstruction { phaseable: true })
            && matches!(y, FixtureTag::Hero { phasing: true })
    };
    !(phases(a, b) || phases(b, a))
}

/// Begin/end/pre-solve/post-solve notifications from the physics engine.
pub trait ContactListener {
    fn begin_contact(&mut self, a: FixtureId, b: FixtureId);

    fn end_contact(&mut self, a: FixtureId, b: FixtureId);

    /// Called every tick for touching solid pairs. Clearing `enabled`
    /// disables the contact for this tick only.
    fn pre_solve(&self, _a: FixtureId, _b: FixtureId, _enabled: &mut bool) {}

    fn post_solve(&mut self, _a: FixtureId, _b: FixtureId, _impulse: f32) {}
}

/// Narrow-phase filter.
pub trait ContactFilter {
    fn should_collide(&self, a: FixtureId, b: FixtureId) -> bool;
}

/// Symmetric adjacency map plus the tag registry.
///
/// Contact lists keep insertion order so first-match queries are
/// deterministic.
#[derive(Debug, Default, Clone)]
pub struct ContactGraph {
    tags: HashMap<FixtureId, FixtureTag>,
    touching: HashMap<FixtureId, Vec<FixtureId>>,
}

impl ContactGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a tag to a fixture, replacing any previous one.
    pub fn register(&mut self, fixture: FixtureId, tag: FixtureTag) {
        self.tags.insert(fixture, tag);
    }

    pub fn tag(&self, fixture: FixtureId) -> Option<FixtureTag> {
        self.tags.get(&fixture).copied()
    }

    pub fn is_registered(&self, fixture: FixtureId) -> bool {
        self.tags.contains_key(&fixture)
    }

    /// Toggle the `phasing` flag of a hero fixture. Returns false if the
    /// fixture is unknown or not a hero.
    pub fn set_phasing(&mut self, fixture: FixtureId, phasing: bool) -> bool {
        match self.tags.get_mut(&fixture) {
            Some(FixtureTag::Hero { phasing: flag }) => {
                *flag = phasing;
                true
            }
            _ => false,
        }
    }

    /// Current contacts of `fixture`; empty for unknown or destroyed ids.
    pub fn contacts(&self, fixture: FixtureId) -> &[FixtureId] {
        self.touching.get(&fixture).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_touching(&self, a: FixtureId, b: FixtureId) -> bool {
        self.contacts(a).contains(&b)
    }

    pub fn any(&self, fixture: FixtureId) -> bool {
        !self.contacts(fixture).is_empty()
    }

    pub fn any_matching(&self, fixture: FixtureId, pred: impl Fn(&FixtureTag) -> bool) -> bool {
        self.contacts(fixture)
            .iter()
            .filter_map(|other| self.tags.get(other))
            .any(pred)
    }

    /// First touching surface (in contact order) accepted by `pred`.
    pub fn nearest_surface(
        &self,
        fixture: FixtureId,
        pred: impl Fn(&Surface) -> bool,
    ) -> Option<(FixtureId, Surface)> {
        self.contacts(fixture).iter().find_map(|other| {
            let surface = self.tags.get(other)?.surface()?;
            pred(&surface).then_some((*other, surface))
        })
    }

    pub fn orientation_contact(&self, fixture: FixtureId, orientation: Orientation) -> bool {
        self.nearest_surface(fixture, |s| s.orientation == orientation)
            .is_some()
    }

    /// Remove every trace of `fixture`: its tag, its own contact list and
    /// its membership in the lists of the fixtures it touched.
    pub fn purge(&mut self, fixture: FixtureId) {
        self.tags.remove(&fixture);
        if let Some(others) = self.touching.remove(&fixture) {
            for other in others {
                self.unlink(other, fixture);
            }
        }
    }

    /// Number of fixtures with at least one contact.
    pub fn touching_count(&self) -> usize {
        self.touching.len()
    }

    fn link(&mut self, from: FixtureId, to: FixtureId) {
        let list = self.touching.entry(from).or_default();
        if !list.contains(&to) {
            list.push(to);
        }
    }

    fn unlink(&mut self, from: FixtureId, to: FixtureId) {
        if let Some(list) = self.touching.get_mut(&from) {
            list.retain(|f| *f != to);
            if list.is_empty() {
                self.touching.remove(&from);
            }
        }
    }
}

impl ContactListener for ContactGraph {
    fn begin_contact(&mut self, a: FixtureId, b: FixtureId) {
        if a == b || !self.is_registered(a) || !self.is_registered(b) {
            log::trace!("ignoring begin_contact for {:?}/{:?}", a, b);
            return;
        }
        self.link(a, b);
        self.link(b, a);
    }

    fn end_contact(&mut self, a: FixtureId, b: FixtureId) {
        self.unlink(a, b);
        self.unlink(b, a);
    }

    fn pre_solve(&self, a: FixtureId, b: FixtureId, enabled: &mut bool) {
        if !self.should_collide(a, b) {
            *enabled = false;
        }
    }
}

impl ContactFilter for ContactGraph {
    fn should_collide(&self, a: FixtureId, b: FixtureId) -> bool {
        match (self.tags.get(&a), self.tags.get(&b)) {
            (Some(ta), Some(tb)) => should_collide_tags(ta, tb),
            _ => true,
        }
    }
}
