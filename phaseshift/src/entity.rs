//! Entity tree: ownership hierarchy and per-frame dispatch.
//!
//! Entities live in an arena keyed by [`EntityId`]. Each one stores only a
//! center relative to its parent; world positions are composed on demand.
//! Dispatch walks a cached depth-first order that follows declaration
//! order and is rebuilt after every insert or destroy.

use std::collections::HashMap;

use anyhow::Result;

use crate::character::Character;
use crate::config::{FormTuning, SimConfig};
use crate::controls::Controls;
use crate::error::CoreError;
use crate::events::EventBus;
use crate::math::Vec2;
use crate::physics::{BodyId, PhysicsWorld};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

/// Shared simulation state threaded through every dispatch phase.
pub struct SimContext<'a> {
    pub physics: &'a mut PhysicsWorld,
    pub controls: &'a mut Controls,
    pub events: &'a mut EventBus,
    pub config: &'a SimConfig,
    pub tuning: &'a FormTuning,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneKind {
    Hazard,
    Goal,
}

/// What an entity is.
#[derive(Debug)]
pub enum Feature {
    /// Pure grouping node.
    Group,
    Level { index: usize, start: Vec2 },
    /// Static geometry (wall or platform).
    Block,
    Zone(ZoneKind),
    Character(Box<Character>),
}

impl Feature {
    fn label(&self) -> &'static str {
        match self {
            Feature::Group => "group",
            Feature::Level { .. } => "level",
            Feature::Block => "block",
            Feature::Zone(_) => "zone",
            Feature::Character(_) => "character",
        }
    }
}

#[derive(Debug)]
pub struct Entity {
    pub center: Vec2,
    /// Zero for characters; their collision box follows the current form.
    pub size: Vec2,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    body: Option<BodyId>,
    pub feature: Feature,
    initialized: bool,
}

impl Entity {
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn body(&self) -> Option<BodyId> {
        self.body
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn update(&mut self, sim: &mut SimContext<'_>, delta: f32) -> Result<()> {
        match &mut self.feature {
            Feature::Character(character) => character.update(sim, delta),
            _ => Ok(()),
        }
    }

    fn step(&mut self, sim: &mut SimContext<'_>, fixed_delta: f32) {
        if let Feature::Character(character) = &mut self.feature {
            character.step(sim, fixed_delta);
        }
    }

    fn late_update(&mut self, sim: &mut SimContext<'_>, delta: f32) {
        if let Feature::Character(character) = &mut self.feature {
            character.late_update(sim, delta);
        }
    }
}

#[derive(Debug, Default)]
pub struct EntityTree {
    nodes: HashMap<EntityId, Entity>,
    roots: Vec<EntityId>,
    order: Vec<EntityId>,
    order_valid: bool,
    next_id: u32,
}

impl EntityTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.nodes.get_mut(&id)
    }

    pub fn children(&self, id: EntityId) -> &[EntityId] {
        self.nodes
            .get(&id)
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
    }

    /// Append a new entity under `parent` (or as a root).
    pub fn insert(
        &mut self,
        parent: Option<EntityId>,
        center: Vec2,
        size: Vec2,
        feature: Feature,
    ) -> Result<EntityId, CoreError> {
        let id = EntityId(self.next_id);
        match parent {
            Some(p) => self
                .nodes
                .get_mut(&p)
                .ok_or(CoreError::MissingParent(p))?
                .children
                .push(id),
            None => self.roots.push(id),
        }
        self.next_id += 1;
        log::trace!("insert {} {:?} under {:?}", feature.label(), id, parent);
        self.nodes.insert(
            id,
            Entity {
                center,
                size,
                parent,
                children: Vec::new(),
                body: None,
                feature,
                initialized: false,
            },
        );
        self.order_valid = false;
        Ok(id)
    }

    pub fn attach_body(&mut self, id: EntityId, body: BodyId) -> Result<(), CoreError> {
        let entity = self.nodes.get_mut(&id).ok_or(CoreError::UnknownEntity(id))?;
        entity.body = Some(body);
        Ok(())
    }

    pub fn body(&self, id: EntityId) -> Result<BodyId, CoreError> {
        let entity = self.nodes.get(&id).ok_or(CoreError::UnknownEntity(id))?;
        entity.body.ok_or(CoreError::MissingBody(id))
    }

    /// `v` composed with the entity's own center and every ancestor's.
    pub fn transform(&self, id: EntityId, v: Vec2) -> Result<Vec2, CoreError> {
        let mut out = v;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let entity = self
                .nodes
                .get(&current)
                .ok_or(CoreError::UnknownEntity(current))?;
            out += entity.center;
            cursor = entity.parent;
        }
        Ok(out)
    }

    pub fn world_center(&self, id: EntityId) -> Result<Vec2, CoreError> {
        self.transform(id, Vec2::ZERO)
    }

    /// Depth-first dispatch order, rebuilt if the tree changed.
    pub fn dispatch_order(&mut self) -> &[EntityId] {
        self.refresh_order();
        &self.order
    }

    pub fn character(&self, id: EntityId) -> Result<&Character, CoreError> {
        match self.nodes.get(&id).map(|e| &e.feature) {
            Some(Feature::Character(c)) => Ok(c),
            Some(_) => Err(CoreError::NotACharacter(id)),
            None => Err(CoreError::UnknownEntity(id)),
        }
    }

    pub fn character_mut(&mut self, id: EntityId) -> Result<&mut Character, CoreError> {
        match self.nodes.get_mut(&id).map(|e| &mut e.feature) {
            Some(Feature::Character(c)) => Ok(c),
            Some(_) => Err(CoreError::NotACharacter(id)),
            None => Err(CoreError::UnknownEntity(id)),
        }
    }

    /// Run `initialize` on entities that have not seen it yet, top-down.
    pub fn initialize(&mut self, _sim: &mut SimContext<'_>) {
        self.refresh_order();
        for id in &self.order {
            if let Some(entity) = self.nodes.get_mut(id) {
                if entity.initialized {
                    continue;
                }
                entity.initialized = true;
                if let Feature::Level { index, start } = entity.feature {
                    log::info!("level {index} ready, start at {start:?}");
                }
            }
        }
    }

    pub fn update(&mut self, sim: &mut SimContext<'_>, delta: f32) -> Result<()> {
        self.refresh_order();
        for id in &self.order {
            if let Some(entity) = self.nodes.get_mut(id) {
                entity.update(sim, delta)?;
            }
        }
        Ok(())
    }

    pub fn step(&mut self, sim: &mut SimContext<'_>, fixed_delta: f32) {
        self.refresh_order();
        for id in &self.order {
            if let Some(entity) = self.nodes.get_mut(id) {
                entity.step(sim, fixed_delta);
            }
        }
    }

    pub fn late_update(&mut self, sim: &mut SimContext<'_>, delta: f32) {
        self.refresh_order();
        for id in &self.order {
            if let Some(entity) = self.nodes.get_mut(id) {
                entity.late_update(sim, delta);
            }
        }
    }

    /// Remove `id` and its whole subtree, releasing their physics bodies.
    /// Returns the number of entities removed.
    pub fn destroy(&mut self, id: EntityId, physics: &mut PhysicsWorld) -> Result<usize, CoreError> {
        let parent = self
            .nodes
            .get(&id)
            .ok_or(CoreError::UnknownEntity(id))?
            .parent;
        match parent.and_then(|p| self.nodes.get_mut(&p)) {
            Some(p) => p.children.retain(|c| *c != id),
            None => self.roots.retain(|r| *r != id),
        }

        let mut doomed = Vec::new();
        self.collect_subtree(id, &mut doomed);
        // children before parents
        for victim in doomed.iter().rev() {
            if let Some(entity) = self.nodes.remove(victim) {
                if let Some(body) = entity.body {
                    physics.destroy_body(body);
                }
                log::trace!("destroyed {} {:?}", entity.feature.label(), victim);
            }
        }
        self.order_valid = false;
        Ok(doomed.len())
    }

    fn collect_subtree(&self, id: EntityId, out: &mut Vec<EntityId>) {
        out.push(id);
        for child in self.children(id) {
            self.collect_subtree(*child, out);
        }
    }

    fn refresh_order(&mut self) {
        if self.order_valid {
            return;
        }
        let mut order = Vec::with_capacity(self.nodes.len());
        for root in &self.roots {
            self.collect_subtree(*root, &mut order);
        }
        self.order = order;
        self.order_valid = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::BodyKind;
    use rstest::rstest;

    fn group(tree: &mut EntityTree, parent: Option<EntityId>, center: Vec2) -> EntityId {
        tree.insert(parent, center, Vec2::ONE, Feature::Group).unwrap()
    }

    #[rstest]
    #[case(Vec2::ZERO)]
    #[case(Vec2::new(1.5, -2.0))]
    #[case(Vec2::new(-100.0, 42.0))]
    fn transform_adds_every_ancestor_center(#[case] v: Vec2) {
        let mut tree = EntityTree::new();
        let a = group(&mut tree, None, Vec2::new(10.0, 0.0));
        let b = group(&mut tree, Some(a), Vec2::new(0.0, 5.0));
        let c = group(&mut tree, Some(b), Vec2::new(-1.0, -1.0));

        let expected = v + Vec2::new(10.0, 0.0) + Vec2::new(0.0, 5.0) + Vec2::new(-1.0, -1.0);
        assert_eq!(tree.transform(c, v).unwrap(), expected);
        assert_eq!(tree.world_center(b).unwrap(), Vec2::new(10.0, 5.0));
    }

    #[test]
    fn missing_parent_is_an_error() {
        let mut tree = EntityTree::new();
        let a = group(&mut tree, None, Vec2::ZERO);
        let mut physics = PhysicsWorld::new(&SimConfig::default());
        tree.destroy(a, &mut physics).unwrap();
        assert!(matches!(
            tree.insert(Some(a), Vec2::ZERO, Vec2::ONE, Feature::Block),
            Err(CoreError::MissingParent(id)) if id == a
        ));
        assert!(tree.transform(a, Vec2::ZERO).is_err());
    }

    #[test]
    fn dispatch_order_follows_declaration_and_is_rebuilt() {
        let mut tree = EntityTree::new();
        let root = group(&mut tree, None, Vec2::ZERO);
        let levels = group(&mut tree, Some(root), Vec2::ZERO);
        let hero = group(&mut tree, Some(root), Vec2::ZERO);
        let first = group(&mut tree, Some(levels), Vec2::ZERO);
        assert_eq!(tree.dispatch_order(), &[root, levels, first, hero]);

        let mut physics = PhysicsWorld::new(&SimConfig::default());
        let second = group(&mut tree, Some(levels), Vec2::ZERO);
        assert_eq!(tree.dispatch_order(), &[root, levels, first, second, hero]);

        tree.destroy(first, &mut physics).unwrap();
        assert_eq!(tree.dispatch_order(), &[root, levels, second, hero]);
        assert_eq!(tree.children(levels), &[second]);
    }

    #[test]
    fn destroy_releases_bodies_recursively() {
        let mut tree = EntityTree::new();
        let mut physics = PhysicsWorld::new(&SimConfig::default());
        let level = group(&mut tree, None, Vec2::ZERO);
        let wall = tree
            .insert(Some(level), Vec2::new(1.0, 0.0), Vec2::ONE, Feature::Block)
            .unwrap();
        let body = physics.create_body(BodyKind::Fixed, Vec2::new(1.0, 0.0));
        tree.attach_body(wall, body).unwrap();
        let nested = group(&mut tree, Some(wall), Vec2::ZERO);
        let keep = group(&mut tree, None, Vec2::ZERO);

        assert_eq!(tree.body(wall).unwrap(), body);
        assert!(matches!(tree.body(level), Err(CoreError::MissingBody(_))));

        assert_eq!(tree.destroy(level, &mut physics).unwrap(), 3);
        assert_eq!(physics.body_count(), 0);
        assert!(!tree.contains(nested));
        assert_eq!(tree.len(), 1);
        assert!(tree.contains(keep));
        assert!(tree.destroy(level, &mut physics).is_err());
    }

    #[test]
    fn character_lookup_checks_feature() {
        let mut tree = EntityTree::new();
        let a = group(&mut tree, None, Vec2::ZERO);
        assert!(matches!(tree.character(a), Err(CoreError::NotACharacter(_))));
    }
}
