use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};

use crate::config::SimConfig;
use crate::contact::{ContactFilter, ContactGraph, ContactListener, FixtureId, FixtureTag};
use crate::error::CoreError;
use crate::math::Vec2;

// Rapier is private implementation detail: do NOT re-export it.
use rapier2d::prelude::*;

/// Collision categories (16-bit filter bits).
pub mod category {
    pub const LEVEL: u16 = 0x0001;
    pub const CHARACTER: u16 = 0x0002;
    pub const ZONE: u16 = 0x0004;
    pub const ALL: u16 = 0xffff;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(u32);

impl BodyId {
    pub const fn to_u32(self) -> u32 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    Dynamic,
    Fixed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FixtureShape {
    /// Axis-aligned box with the given full size.
    Box { size: Vec2 },
    /// Convex polygon in body-local coordinates.
    Polygon(Vec<Vec2>),
}

/// Everything needed to attach one fixture to a body.
#[derive(Clone, Debug, PartialEq)]
pub struct FixtureDef {
    pub shape: FixtureShape,
    pub offset: Vec2,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    pub sensor: bool,
    pub category: u16,
    pub mask: u16,
    pub tag: FixtureTag,
}

impl FixtureDef {
    pub fn new(shape: FixtureShape, tag: FixtureTag) -> Self {
        Self {
            shape,
            offset: Vec2::ZERO,
            density: 1.0,
            friction: 0.5,
            restitution: 0.0,
            sensor: false,
            category: category::LEVEL,
            mask: category::ALL,
            tag,
        }
    }

    pub fn boxed(size: Vec2, tag: FixtureTag) -> Self {
        Self::new(FixtureShape::Box { size }, tag)
    }

    #[must_use]
    pub fn offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn material(mut self, density: f32, friction: f32, restitution: f32) -> Self {
        self.density = density;
        self.friction = friction;
        self.restitution = restitution;
        self
    }

    #[must_use]
    pub fn sensor(mut self) -> Self {
        self.sensor = true;
        self
    }

    #[must_use]
    pub fn filter(mut self, category: u16, mask: u16) -> Self {
        self.category = category;
        self.mask = mask;
        self
    }
}

/// One fixture crossed by a ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub fixture: FixtureId,
    pub point: Vec2,
    /// Distance along the (normalized) ray.
    pub toi: f32,
}

/// Routes rapier's contact hooks to a [`ContactFilter`].
struct FilterHooks<'a, F> {
    filter: &'a F,
}

impl<F: ContactFilter + ContactListener + Sync> PhysicsHooks for FilterHooks<'_, F> {
    fn filter_contact_pair(&self, context: &PairFilterContext) -> Option<SolverFlags> {
        let a = fixture_of(context.colliders, context.collider1)?;
        let b = fixture_of(context.colliders, context.collider2)?;
        if self.filter.should_collide(a, b) {
            Some(SolverFlags::COMPUTE_IMPULSES)
        } else {
            None
        }
    }

    fn modify_solver_contacts(&self, context: &mut ContactModificationContext) {
        let (Some(a), Some(b)) = (
            fixture_of(context.colliders, context.collider1),
            fixture_of(context.colliders, context.collider2),
        ) else {
            return;
        };
        let mut enabled = true;
        self.filter.pre_solve(a, b, &mut enabled);
        if !enabled {
            context.solver_contacts.clear();
        }
    }
}

fn fixture_of(colliders: &ColliderSet, handle: ColliderHandle) -> Option<FixtureId> {
    let collider = colliders.get(handle)?;
    u32::try_from(collider.user_data).ok().map(FixtureId::from_raw)
}

fn to_vector(v: Vec2) -> Vector<Real> {
    vector![v.x, v.y]
}

fn from_vector(v: &Vector<Real>) -> Vec2 {
    Vec2::new(v.x, v.y)
}

/// Owns the rapier world, the id maps and the contact graph.
///
/// The contact graph is the single contact listener and contact filter of
/// this world: rapier events are drained into it after every step and its
/// filter is consulted from the pre-solve hook.
pub struct PhysicsWorld {
    // --- rapier internals ---
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    rigid_bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,

    // Event channels
    event_recv_collision: crossbeam_channel::Receiver<CollisionEvent>,
    event_handler: ChannelEventCollector,

    // --- mappings (engine <-> rapier) ---
    bodies: HashMap<BodyId, RigidBodyHandle>,
    fixtures: HashMap<FixtureId, (BodyId, ColliderHandle)>,
    body_fixtures: HashMap<BodyId, Vec<FixtureId>>,
    forced: HashSet<RigidBodyHandle>,
    next_body: u32,
    next_fixture: u32,

    gravity: Vec2,
    graph: ContactGraph,
}

impl PhysicsWorld {
    pub fn new(config: &SimConfig) -> Self {
        let (send_col, recv_col) = crossbeam_channel::unbounded();
        // No collider requests force events, so nothing is ever sent here.
        let (send_force, _) = crossbeam_channel::unbounded();
        let event_handler = ChannelEventCollector::new(send_col, send_force);

        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = config.fixed_dt;
        integration_parameters.max_velocity_iterations = config.velocity_iterations;
        integration_parameters.max_stabilization_iterations = config.position_iterations;

        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            island_manager: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),

            event_recv_collision: recv_col,
            event_handler,

            bodies: HashMap::new(),
            fixtures: HashMap::new(),
            body_fixtures: HashMap::new(),
            forced: HashSet::new(),
            next_body: 0,
            next_fixture: 0,

            gravity: config.gravity,
            graph: ContactGraph::new(),
        }
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn contacts(&self) -> &ContactGraph {
        &self.graph
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn fixture_count(&self) -> usize {
        self.fixtures.len()
    }

    pub fn create_body(&mut self, kind: BodyKind, position: Vec2) -> BodyId {
        let rb_type = match kind {
            BodyKind::Dynamic => RigidBodyType::Dynamic,
            BodyKind::Fixed => RigidBodyType::Fixed,
        };

        let mut builder = RigidBodyBuilder::new(rb_type).translation(to_vector(position));

        // Characters never rotate from contacts.
        if matches!(kind, BodyKind::Dynamic) {
            builder = builder.lock_rotations();
        }

        let handle = self.rigid_bodies.insert(builder.build());
        let id = BodyId(self.next_body);
        self.next_body += 1;
        self.bodies.insert(id, handle);
        log::trace!("created {:?} body {:?} at {:?}", kind, id, position);
        id
    }

    /// Remove a body and all of its fixtures, purging them from the
    /// contact graph. Returns whether the body existed.
    pub fn destroy_body(&mut self, body: BodyId) -> bool {
        for fixture in self.body_fixtures.remove(&body).unwrap_or_default() {
            self.graph.purge(fixture);
            self.fixtures.remove(&fixture);
        }
        let Some(handle) = self.bodies.remove(&body) else {
            return false;
        };
        self.forced.remove(&handle);
        self.rigid_bodies.remove(
            handle,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        true
    }

    pub fn create_fixture(&mut self, body: BodyId, def: FixtureDef) -> Result<FixtureId> {
        let parent = self.body_handle(body)?;
        let id = FixtureId::from_raw(self.next_fixture);

        let builder = match &def.shape {
            FixtureShape::Box { size } => {
                let half = size.half();
                ColliderBuilder::cuboid(half.x, half.y)
            }
            FixtureShape::Polygon(points) => {
                let points: Vec<Point<Real>> = points.iter().map(|p| point![p.x, p.y]).collect();
                ColliderBuilder::convex_hull(&points)
                    .ok_or(CoreError::DegeneratePolygon(points.len()))?
            }
        };

        let collider = builder
            .translation(to_vector(def.offset))
            .density(def.density)
            .friction(def.friction)
            .restitution(def.restitution)
            .sensor(def.sensor)
            .collision_groups(InteractionGroups::new(
                u32::from(def.category),
                u32::from(def.mask),
            ))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .active_hooks(ActiveHooks::FILTER_CONTACT_PAIRS | ActiveHooks::MODIFY_SOLVER_CONTACTS)
            .user_data(u128::from(id.to_u32()))
            .build();

        let handle = self
            .colliders
            .insert_with_parent(collider, parent, &mut self.rigid_bodies);

        self.next_fixture += 1;
        self.fixtures.insert(id, (body, handle));
        self.body_fixtures.entry(body).or_default().push(id);
        self.graph.register(id, def.tag);
        Ok(id)
    }

    /// Remove one fixture and purge it from the contact graph. Rapier does
    /// not report the end of contacts for colliders removed mid-contact.
    pub fn destroy_fixture(&mut self, fixture: FixtureId) -> Result<()> {
        let (body, handle) = self
            .fixtures
            .remove(&fixture)
            .ok_or(CoreError::MissingFixture(fixture))?;
        self.graph.purge(fixture);
        if let Some(list) = self.body_fixtures.get_mut(&body) {
            list.retain(|f| *f != fixture);
        }
        self.colliders.remove(
            handle,
            &mut self.island_manager,
            &mut self.rigid_bodies,
            true,
        );
        Ok(())
    }

    pub fn fixtures_of(&self, body: BodyId) -> &[FixtureId] {
        self.body_fixtures
            .get(&body)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_fixture(&self, fixture: FixtureId) -> bool {
        self.fixtures.contains_key(&fixture)
    }

    pub fn set_phasing(&mut self, fixture: FixtureId, phasing: bool) {
        if !self.graph.set_phasing(fixture, phasing) {
            log::warn!("set_phasing on non-hero fixture {:?}", fixture);
        }
    }

    /// Advance the simulation by exactly one fixed step, then forward the
    /// collected contact events to the contact graph.
    pub fn step(&mut self) {
        let gravity = to_vector(self.gravity);
        let hooks = FilterHooks { filter: &self.graph };

        self.pipeline.step(
            &gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &hooks,
            &self.event_handler,
        );

        // Rapier keeps user forces until reset; ours last one step.
        for handle in self.forced.drain() {
            if let Some(b) = self.rigid_bodies.get_mut(handle) {
                b.reset_forces(false);
            }
        }

        self.query_pipeline
            .update(&self.island_manager, &self.rigid_bodies, &self.colliders);

        self.collect_events();
    }

    /// Update the query pipeline (call after adding/removing bodies/colliders).
    pub fn update_query_pipeline(&mut self) {
        self.query_pipeline
            .update(&self.island_manager, &self.rigid_bodies, &self.colliders);
    }

    // ------------------------------
    // Per-body queries/actions
    // ------------------------------

    pub fn position(&self, body: BodyId) -> Option<Vec2> {
        let b = self.rigid_bodies.get(*self.bodies.get(&body)?)?;
        Some(from_vector(b.translation()))
    }

    pub fn rotation(&self, body: BodyId) -> Option<f32> {
        let b = self.rigid_bodies.get(*self.bodies.get(&body)?)?;
        Some(b.rotation().angle())
    }

    pub fn velocity(&self, body: BodyId) -> Option<Vec2> {
        let b = self.rigid_bodies.get(*self.bodies.get(&body)?)?;
        Some(from_vector(b.linvel()))
    }

    pub fn mass(&self, body: BodyId) -> Option<f32> {
        let b = self.rigid_bodies.get(*self.bodies.get(&body)?)?;
        Some(b.mass())
    }

    pub fn gravity_scale(&self, body: BodyId) -> Option<f32> {
        let b = self.rigid_bodies.get(*self.bodies.get(&body)?)?;
        Some(b.gravity_scale())
    }

    pub fn linear_damping(&self, body: BodyId) -> Option<f32> {
        let b = self.rigid_bodies.get(*self.bodies.get(&body)?)?;
        Some(b.linear_damping())
    }

    pub fn set_position(&mut self, body: BodyId, pos: Vec2) {
        if let Some(b) = self.body_mut(body) {
            b.set_translation(to_vector(pos), true);
        }
    }

    pub fn set_rotation(&mut self, body: BodyId, angle: f32) {
        if let Some(b) = self.body_mut(body) {
            b.set_rotation(angle, true);
        }
    }

    pub fn set_velocity(&mut self, body: BodyId, vel: Vec2) {
        if let Some(b) = self.body_mut(body) {
            b.set_linvel(to_vector(vel), true);
        }
    }

    pub fn set_gravity_scale(&mut self, body: BodyId, scale: f32) {
        if let Some(b) = self.body_mut(body) {
            b.set_gravity_scale(scale, true);
        }
    }

    pub fn set_linear_damping(&mut self, body: BodyId, damping: f32) {
        if let Some(b) = self.body_mut(body) {
            b.set_linear_damping(damping);
        }
    }

    /// Instantaneous impulse at the center of mass.
    pub fn apply_impulse(&mut self, body: BodyId, impulse: Vec2) {
        if let Some(b) = self.body_mut(body) {
            b.apply_impulse(to_vector(impulse), true);
        }
    }

    /// Continuous force at the center of mass for the next step only.
    pub fn apply_force(&mut self, body: BodyId, force: Vec2) {
        let Some(handle) = self.bodies.get(&body).copied() else {
            return;
        };
        if let Some(b) = self.rigid_bodies.get_mut(handle) {
            b.add_force(to_vector(force), true);
            self.forced.insert(handle);
        }
    }

    // ------------------------------
    // Queries
    // ------------------------------

    /// Every fixture crossed by the segment from `origin` along `direction`
    /// up to `max_distance`, sorted by distance. Sensors are included.
    pub fn ray_cast_all(&self, origin: Vec2, direction: Vec2, max_distance: f32) -> Vec<RayHit> {
        let Some(dir) = direction.try_normalize() else {
            return Vec::new();
        };
        let ray = Ray::new(point![origin.x, origin.y], to_vector(dir));
        let mut hits = Vec::new();
        self.query_pipeline.intersections_with_ray(
            &self.rigid_bodies,
            &self.colliders,
            &ray,
            max_distance,
            true,
            QueryFilter::default(),
            |handle, intersection| {
                if let Some(fixture) = fixture_of(&self.colliders, handle) {
                    let p = ray.point_at(intersection.toi);
                    hits.push(RayHit {
                        fixture,
                        point: Vec2::new(p.x, p.y),
                        toi: intersection.toi,
                    });
                }
                true
            },
        );
        hits.sort_by(|a, b| a.toi.total_cmp(&b.toi));
        hits
    }

    // ------------------------------
    // Private helpers
    // ------------------------------

    fn body_handle(&self, body: BodyId) -> Result<RigidBodyHandle> {
        self.bodies
            .get(&body)
            .copied()
            .ok_or_else(|| anyhow!(CoreError::UnknownBody(body)))
    }

    fn body_mut(&mut self, body: BodyId) -> Option<&mut RigidBody> {
        let handle = *self.bodies.get(&body)?;
        self.rigid_bodies.get_mut(handle)
    }

    fn collect_events(&mut self) {
        while let Ok(ev) = self.event_recv_collision.try_recv() {
            let (c1, c2, started) = match ev {
                CollisionEvent::Started(c1, c2, _) => (c1, c2, true),
                CollisionEvent::Stopped(c1, c2, _) => (c1, c2, false),
            };
            // Removed colliders are already purged; their late events are no-ops.
            let (Some(a), Some(b)) = (
                fixture_of(&self.colliders, c1),
                fixture_of(&self.colliders, c2),
            ) else {
                log::trace!("dropping contact event for removed collider");
                continue;
            };
            if started {
                log::trace!("begin contact {:?} <-> {:?}", a, b);
                self.graph.begin_contact(a, b);
            } else {
                log::trace!("end contact {:?} <-> {:?}", a, b);
                self.graph.end_contact(a, b);
            }
        }
    }
}
