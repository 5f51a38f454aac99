//! Entity construction.
//!
//! Every builder creates the entity together with the body and fixtures
//! backing it, so the tree never holds an entity whose physics is half
//! built. Bodies are placed at the entity's composed world center.

use anyhow::Result;

use crate::character::Character;
use crate::contact::{FixtureId, FixtureTag, Orientation, Surface};
use crate::entity::{EntityId, EntityTree, Feature, ZoneKind};
use crate::forms::{CharacterFixtures, FormKind};
use crate::level::{LevelData, WallData, ZoneData};
use crate::math::Vec2;
use crate::physics::{category, BodyId, BodyKind, FixtureDef, PhysicsWorld};

/// Thickness of the sensor strip laid over each exposed face.
pub const SURFACE_SKIN: f32 = 0.2;
/// Side strips stop this far short of the corners so a body resting on a
/// top face never also reads as touching a wall.
pub const SIDE_INSET: f32 = 0.15;

const FOOT_WIDTH: f32 = 0.8;
const FOOT_HEIGHT: f32 = 0.2;

/// Top-level grouping created once per world.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stage {
    pub root: EntityId,
    pub levels: EntityId,
}

/// Hero box plus, for solid forms, a foot sensor along the bottom edge.
pub fn form_fixtures(
    physics: &mut PhysicsWorld,
    body: BodyId,
    kind: FormKind,
) -> Result<CharacterFixtures> {
    let size = kind.body_size();
    let mask = category::LEVEL | category::ZONE;

    let mut hero_def = FixtureDef::boxed(size, FixtureTag::Hero { phasing: false })
        .material(1.0, 0.0, 0.0)
        .filter(category::CHARACTER, mask);
    if !kind.is_solid() {
        hero_def = hero_def.sensor();
    }
    let hero = physics.create_fixture(body, hero_def)?;

    let foot = if kind.is_solid() {
        let def = FixtureDef::boxed(Vec2::new(size.x * FOOT_WIDTH, FOOT_HEIGHT), FixtureTag::Foot)
            .offset(Vec2::new(0.0, -size.y * 0.5))
            .material(0.0, 0.0, 0.0)
            .sensor()
            .filter(category::CHARACTER, mask);
        Some(physics.create_fixture(body, def)?)
    } else {
        None
    };

    let mut all = vec![hero];
    all.extend(foot);
    Ok(CharacterFixtures { hero, foot, all })
}

fn face_strip(size: Vec2, orientation: Orientation) -> (Vec2, Vec2) {
    let half = size.half();
    let side = Vec2::new(SURFACE_SKIN, (size.y - 2.0 * SIDE_INSET).max(SURFACE_SKIN));
    match orientation {
        Orientation::Top => (Vec2::new(size.x, SURFACE_SKIN), Vec2::new(0.0, half.y)),
        Orientation::Bottom => (Vec2::new(size.x, SURFACE_SKIN), Vec2::new(0.0, -half.y)),
        Orientation::Left => (side, Vec2::new(-half.x, 0.0)),
        Orientation::Right => (side, Vec2::new(half.x, 0.0)),
    }
}

/// Solid obstruction plus one surface sensor per listed face.
pub fn block_fixtures(
    physics: &mut PhysicsWorld,
    body: BodyId,
    size: Vec2,
    faces: &[Orientation],
    phaseable: bool,
    phasing_target: bool,
) -> Result<Vec<FixtureId>> {
    let mut fixtures = Vec::with_capacity(faces.len() + 1);
    fixtures.push(physics.create_fixture(
        body,
        FixtureDef::boxed(size, FixtureTag::Obstruction { phaseable }),
    )?);

    for &orientation in faces {
        let (strip, offset) = face_strip(size, orientation);
        let tag = FixtureTag::Surface(Surface {
            orientation,
            phasing_target,
            phaseable,
        });
        let def = FixtureDef::boxed(strip, tag).offset(offset).sensor();
        fixtures.push(physics.create_fixture(body, def)?);
    }
    Ok(fixtures)
}

/// Sensor that only characters can touch.
pub fn zone_fixture(
    physics: &mut PhysicsWorld,
    body: BodyId,
    size: Vec2,
    kind: ZoneKind,
) -> Result<FixtureId> {
    let tag = match kind {
        ZoneKind::Hazard => FixtureTag::Hazard,
        ZoneKind::Goal => FixtureTag::Goal,
    };
    let def = FixtureDef::boxed(size, tag)
        .sensor()
        .filter(category::ZONE, category::CHARACTER);
    physics.create_fixture(body, def)
}

pub fn build_stage(tree: &mut EntityTree) -> Result<Stage> {
    let root = tree.insert(None, Vec2::ZERO, Vec2::ZERO, Feature::Group)?;
    let levels = tree.insert(Some(root), Vec2::ZERO, Vec2::ZERO, Feature::Group)?;
    Ok(Stage { root, levels })
}

fn build_block(
    tree: &mut EntityTree,
    physics: &mut PhysicsWorld,
    parent: EntityId,
    wall: &WallData,
) -> Result<EntityId> {
    let id = tree.insert(Some(parent), wall.center, wall.size, Feature::Block)?;
    let body = physics.create_body(BodyKind::Fixed, tree.world_center(id)?);
    tree.attach_body(id, body)?;
    block_fixtures(
        physics,
        body,
        wall.size,
        &wall.faces,
        wall.phaseable,
        wall.phasing_target,
    )?;
    Ok(id)
}

fn build_zone(
    tree: &mut EntityTree,
    physics: &mut PhysicsWorld,
    parent: EntityId,
    zone: &ZoneData,
    kind: ZoneKind,
) -> Result<EntityId> {
    let id = tree.insert(Some(parent), zone.center, zone.size, Feature::Zone(kind))?;
    let body = physics.create_body(BodyKind::Fixed, tree.world_center(id)?);
    tree.attach_body(id, body)?;
    zone_fixture(physics, body, zone.size, kind)?;
    Ok(id)
}

/// Build level `index` under `parent`, with its origin at `origin`
/// relative to the parent.
pub fn build_level(
    tree: &mut EntityTree,
    physics: &mut PhysicsWorld,
    parent: EntityId,
    index: usize,
    data: &LevelData,
    origin: Vec2,
) -> Result<EntityId> {
    let level = tree.insert(
        Some(parent),
        origin,
        Vec2::ZERO,
        Feature::Level {
            index,
            start: data.start,
        },
    )?;

    for wall in &data.walls {
        build_block(tree, physics, level, wall)?;
    }
    for platform in &data.platforms {
        let ledge = WallData {
            center: platform.center,
            size: platform.size,
            faces: vec![Orientation::Top],
            phaseable: platform.phaseable,
            phasing_target: false,
        };
        build_block(tree, physics, level, &ledge)?;
    }
    for hazard in &data.hazards {
        build_zone(tree, physics, level, hazard, ZoneKind::Hazard)?;
    }
    build_zone(tree, physics, level, &data.goal, ZoneKind::Goal)?;

    log::info!(
        "built level {index} '{}' at {:?} ({} entities)",
        data.name,
        tree.world_center(level)?,
        tree.children(level).len()
    );
    Ok(level)
}

/// Spawn the character at `spawn` (world coordinates) in the level's
/// initial form.
pub fn build_character(
    tree: &mut EntityTree,
    physics: &mut PhysicsWorld,
    parent: EntityId,
    level: usize,
    data: &LevelData,
    spawn: Vec2,
) -> Result<EntityId> {
    let parent_center = tree.world_center(parent)?;
    let kind = data.initial_form();
    let body = physics.create_body(BodyKind::Dynamic, spawn);
    let character = Character::new(physics, body, kind, data.allowed_forms(), level, spawn)?;
    let id = tree.insert(
        Some(parent),
        spawn - parent_center,
        Vec2::ZERO,
        Feature::Character(Box::new(character)),
    )?;
    tree.attach_body(id, body)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::level::LevelCatalog;

    #[test]
    fn solid_forms_get_a_foot() {
        let mut physics = PhysicsWorld::new(&SimConfig::default());
        let body = physics.create_body(BodyKind::Dynamic, Vec2::ZERO);
        let hop = form_fixtures(&mut physics, body, FormKind::Hop).unwrap();
        assert!(hop.foot.is_some());
        assert_eq!(hop.all.len(), 2);
        assert_eq!(
            physics.contacts().tag(hop.hero),
            Some(FixtureTag::Hero { phasing: false })
        );

        let other = physics.create_body(BodyKind::Dynamic, Vec2::new(5.0, 0.0));
        let transit = form_fixtures(&mut physics, other, FormKind::Transit).unwrap();
        assert_eq!(transit.foot, None);
        assert_eq!(transit.all, vec![transit.hero]);
    }

    #[test]
    fn block_gets_one_strip_per_face() {
        let mut physics = PhysicsWorld::new(&SimConfig::default());
        let body = physics.create_body(BodyKind::Fixed, Vec2::ZERO);
        let fixtures = block_fixtures(
            &mut physics,
            body,
            Vec2::new(4.0, 1.0),
            &[Orientation::Top, Orientation::Left],
            true,
            false,
        )
        .unwrap();
        assert_eq!(fixtures.len(), 3);
        assert_eq!(physics.fixtures_of(body), fixtures.as_slice());
        assert_eq!(
            physics.contacts().tag(fixtures[0]),
            Some(FixtureTag::Obstruction { phaseable: true })
        );
        let left = physics.contacts().tag(fixtures[2]).and_then(|t| t.surface());
        assert_eq!(left.map(|s| s.orientation), Some(Orientation::Left));
    }

    #[test]
    fn level_is_placed_at_its_origin() {
        let mut physics = PhysicsWorld::new(&SimConfig::default());
        let mut tree = EntityTree::new();
        let stage = build_stage(&mut tree).unwrap();
        let catalog = LevelCatalog::sample();
        let data = catalog.get(2).unwrap();
        let origin = Vec2::new(80.0, 0.0);
        let level = build_level(&mut tree, &mut physics, stage.levels, 2, data, origin).unwrap();

        // walls, hazard, goal
        let expected = data.walls.len() + data.platforms.len() + data.hazards.len() + 1;
        assert_eq!(tree.children(level).len(), expected);
        assert_eq!(physics.body_count(), expected);

        let hazard = tree.children(level)[data.walls.len()];
        assert_eq!(
            tree.world_center(hazard).unwrap(),
            origin + data.hazards[0].center
        );
        let body = tree.body(hazard).unwrap();
        assert_eq!(physics.position(body), Some(origin + data.hazards[0].center));
    }

    #[test]
    fn character_joins_the_tree() {
        let mut physics = PhysicsWorld::new(&SimConfig::default());
        let mut tree = EntityTree::new();
        let stage = build_stage(&mut tree).unwrap();
        let catalog = LevelCatalog::sample();
        let data = catalog.get(1).unwrap();
        let id = build_character(&mut tree, &mut physics, stage.root, 1, data, data.start).unwrap();

        let character = tree.character(id).unwrap();
        assert_eq!(character.kind(), FormKind::Phase);
        assert_eq!(character.level(), 1);
        assert_eq!(tree.world_center(id).unwrap(), data.start);
        assert_eq!(tree.get(id).unwrap().size, Vec2::ZERO);
        assert_eq!(tree.dispatch_order(), &[stage.root, stage.levels, id]);
    }
}
