//! The 3D physics world (§4.1).
//!
//! One [`PhysicsWorld`] backs one running instance. Parts become tracked via
//! [`PhysicsWorld::add_part`] when the tick pipeline's sync step notices they
//! reached the Workspace; every setter on an untracked or stale id is a no-op,
//! matching §4.1's "operations on an unknown part id are silently ignored."

use std::collections::{HashMap, HashSet};

use rapier3d::prelude::*;
use tracing::{debug, trace};

use atrium_tree::prelude::{CFrame, NodeId, PartShape, Vec3};

use crate::convert::{cframe_to_isometry, isometry_to_cframe, vec3_from_nalgebra, vec3_to_nalgebra};
use crate::error::PhysicsError;
use crate::shape::build_shape;

/// A pair of nodes in contact, always stored with the numerically smaller
/// raw id first (§4.4 step 5's "lexicographic order of ids").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContactPair(pub NodeId, pub NodeId);

impl ContactPair {
    fn normalize(a: NodeId, b: NodeId) -> Self {
        if a.to_raw() <= b.to_raw() {
            ContactPair(a, b)
        } else {
            ContactPair(b, a)
        }
    }
}

/// Contact pairs that started or ended during the most recent [`PhysicsWorld::step`].
#[derive(Debug, Clone, Default)]
pub struct ContactDelta {
    pub started: Vec<ContactPair>,
    pub ended: Vec<ContactPair>,
}

/// A single raycast result.
#[derive(Debug, Clone, Copy)]
pub struct RaycastHit {
    pub node: NodeId,
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f64,
}

struct PartEntry {
    body: RigidBodyHandle,
    collider: ColliderHandle,
    anchored: bool,
}

pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,

    parts: HashMap<NodeId, PartEntry>,
    body_to_node: HashMap<RigidBodyHandle, NodeId>,
    collider_to_node: HashMap<ColliderHandle, NodeId>,
    active_contacts: HashSet<ContactPair>,
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self::with_gravity(Vec3::new(0.0, -9.81, 0.0))
    }

    pub fn with_gravity(gravity: Vec3) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vec3_to_nalgebra(gravity),
            integration_params: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            parts: HashMap::new(),
            body_to_node: HashMap::new(),
            collider_to_node: HashMap::new(),
            active_contacts: HashSet::new(),
        }
    }

    /// Register a part. No-op if `id` is already tracked.
    pub fn add_part(
        &mut self,
        id: NodeId,
        shape: PartShape,
        size: Vec3,
        cframe: CFrame,
        anchored: bool,
        can_collide: bool,
        velocity: Vec3,
    ) {
        if self.parts.contains_key(&id) {
            return;
        }
        let iso = cframe_to_isometry(&cframe);
        let rb = if anchored {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic().linvel(vec3_to_nalgebra(velocity))
        }
        .position(iso)
        .build();

        let body_handle = self.rigid_body_set.insert(rb);
        self.body_to_node.insert(body_handle, id);

        let collider = ColliderBuilder::new(build_shape(shape, size))
            .sensor(!can_collide)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        let collider_handle =
            self.collider_set
                .insert_with_parent(collider, body_handle, &mut self.rigid_body_set);
        self.collider_to_node.insert(collider_handle, id);

        self.parts.insert(
            id,
            PartEntry {
                body: body_handle,
                collider: collider_handle,
                anchored,
            },
        );
        debug!(node = %id, "part registered with physics world");
    }

    /// Remove a part. No-op if `id` isn't tracked.
    pub fn remove_part(&mut self, id: NodeId) {
        let Some(entry) = self.parts.remove(&id) else {
            return;
        };
        self.body_to_node.remove(&entry.body);
        self.collider_to_node.remove(&entry.collider);
        self.rigid_body_set.remove(
            entry.body,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        self.active_contacts.retain(|pair| pair.0 != id && pair.1 != id);
    }

    pub fn set_size(&mut self, id: NodeId, shape: PartShape, size: Vec3) {
        let Some(entry) = self.parts.get(&id) else { return };
        if let Some(collider) = self.collider_set.get_mut(entry.collider) {
            collider.set_shape(build_shape(shape, size));
        }
    }

    pub fn set_shape(&mut self, id: NodeId, shape: PartShape, size: Vec3) {
        self.set_size(id, shape, size);
    }

    pub fn set_anchored(&mut self, id: NodeId, anchored: bool) {
        let Some(entry) = self.parts.get_mut(&id) else { return };
        if let Some(body) = self.rigid_body_set.get_mut(entry.body) {
            body.set_body_type(
                if anchored { RigidBodyType::Fixed } else { RigidBodyType::Dynamic },
                true,
            );
        }
        entry.anchored = anchored;
    }

    pub fn set_can_collide(&mut self, id: NodeId, can_collide: bool) {
        let Some(entry) = self.parts.get(&id) else { return };
        if let Some(collider) = self.collider_set.get_mut(entry.collider) {
            collider.set_sensor(!can_collide);
        }
    }

    pub fn set_cframe(&mut self, id: NodeId, cframe: CFrame) {
        let Some(entry) = self.parts.get(&id) else { return };
        if let Some(body) = self.rigid_body_set.get_mut(entry.body) {
            body.set_position(cframe_to_isometry(&cframe), true);
        }
    }

    pub fn set_velocity(&mut self, id: NodeId, velocity: Vec3) {
        let Some(entry) = self.parts.get(&id) else { return };
        if let Some(body) = self.rigid_body_set.get_mut(entry.body) {
            body.set_linvel(vec3_to_nalgebra(velocity), true);
        }
    }

    pub fn is_tracked(&self, id: NodeId) -> bool {
        self.parts.contains_key(&id)
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Step the simulation, returning contact pairs that started/ended.
    pub fn step(&mut self, dt: f64) -> Result<ContactDelta, PhysicsError> {
        if dt <= 0.0 {
            return Err(PhysicsError::InvalidTimestep(dt));
        }
        self.integration_params.dt = dt as Real;

        let (collision_send, collision_recv) = crossbeam::channel::unbounded::<CollisionEvent>();
        let (force_send, _force_recv) = crossbeam::channel::unbounded::<ContactForceEvent>();
        let event_handler = ChannelEventCollector::new(collision_send, force_send);

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &event_handler,
        );

        let mut delta = ContactDelta::default();
        while let Ok(event) = collision_recv.try_recv() {
            let (h1, h2, started) = match event {
                CollisionEvent::Started(h1, h2, _) => (h1, h2, true),
                CollisionEvent::Stopped(h1, h2, _) => (h1, h2, false),
            };
            let (Some(&a), Some(&b)) = (
                self.collider_to_node.get(&h1),
                self.collider_to_node.get(&h2),
            ) else {
                continue;
            };
            let pair = ContactPair::normalize(a, b);
            if started {
                if self.active_contacts.insert(pair) {
                    delta.started.push(pair);
                }
            } else if self.active_contacts.remove(&pair) {
                delta.ended.push(pair);
            }
        }

        delta.started.sort_by_key(|p| (p.0.to_raw(), p.1.to_raw()));
        delta.ended.sort_by_key(|p| (p.0.to_raw(), p.1.to_raw()));
        trace!(started = delta.started.len(), ended = delta.ended.len(), "physics step complete");
        Ok(delta)
    }

    /// Currently active contact pairs, sorted lexicographically by id.
    pub fn contact_pairs(&self) -> Vec<ContactPair> {
        let mut pairs: Vec<_> = self.active_contacts.iter().copied().collect();
        pairs.sort_by_key(|p| (p.0.to_raw(), p.1.to_raw()));
        pairs
    }

    /// Ids currently touching `id`, sorted.
    pub fn touch_query(&self, id: NodeId) -> Vec<NodeId> {
        let mut others: Vec<NodeId> = self
            .active_contacts
            .iter()
            .filter_map(|pair| {
                if pair.0 == id {
                    Some(pair.1)
                } else if pair.1 == id {
                    Some(pair.0)
                } else {
                    None
                }
            })
            .collect();
        others.sort_by_key(|n| n.to_raw());
        others
    }

    /// Read back transforms and velocities for every dynamic (non-anchored)
    /// part, sorted by raw id for determinism.
    pub fn read_transforms(&self) -> Vec<(NodeId, CFrame, Vec3)> {
        let mut out = Vec::new();
        for (&id, entry) in &self.parts {
            if entry.anchored {
                continue;
            }
            if let Some(body) = self.rigid_body_set.get(entry.body) {
                let cframe = isometry_to_cframe(body.position());
                let velocity = vec3_from_nalgebra(body.linvel());
                out.push((id, cframe, velocity));
            }
        }
        out.sort_by_key(|(id, _, _)| id.to_raw());
        out
    }

    /// Cast a ray, excluding any id in `exclude`.
    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f64,
        exclude: &[NodeId],
    ) -> Option<RaycastHit> {
        let ray = Ray::new(
            Point::from(vec3_to_nalgebra(origin)),
            vec3_to_nalgebra(direction),
        );
        let filter = QueryFilter::default().predicate(&|handle, _collider| {
            self.collider_to_node
                .get(&handle)
                .map(|id| !exclude.contains(id))
                .unwrap_or(true)
        });

        self.query_pipeline
            .cast_ray_and_get_normal(&self.rigid_body_set, &self.collider_set, &ray, max_distance as Real, true, filter)
            .and_then(|(handle, intersection)| {
                let node = *self.collider_to_node.get(&handle)?;
                let point = ray.point_at(intersection.time_of_impact);
                Some(RaycastHit {
                    node,
                    point: vec3_from_nalgebra(&point.coords),
                    normal: vec3_from_nalgebra(&intersection.normal),
                    distance: intersection.time_of_impact as f64,
                })
            })
    }

    /// Raw access to the collider set, for [`crate::character::CharacterWorld`]
    /// to register and move capsules against the same broad/narrow phase.
    pub fn collider_set_mut(&mut self) -> &mut ColliderSet {
        &mut self.collider_set
    }

    pub fn rigid_body_set(&self) -> &RigidBodySet {
        &self.rigid_body_set
    }

    pub fn query_pipeline(&self) -> &QueryPipeline {
        &self.query_pipeline
    }

    /// Ids whose collider overlaps a box volume centered at `cframe` with
    /// the given full-extent `size`, excluding `exclude`.
    pub fn overlap_box(&self, cframe: CFrame, size: Vec3, exclude: &[NodeId]) -> Vec<NodeId> {
        let shape = build_shape(PartShape::Box, size);
        let iso = cframe_to_isometry(&cframe);
        let filter = QueryFilter::default();

        let mut hits = Vec::new();
        self.query_pipeline.intersections_with_shape(
            &self.rigid_body_set,
            &self.collider_set,
            &iso,
            shape.as_ref(),
            filter,
            |handle| {
                if let Some(&node) = self.collider_to_node.get(&handle) {
                    if !exclude.contains(&node) {
                        hits.push(node);
                    }
                }
                true
            },
        );
        hits.sort_by_key(|n| n.to_raw());
        hits.dedup();
        hits
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_tree::prelude::{NodeIdAllocator, Rotation};

    fn alloc() -> NodeIdAllocator {
        NodeIdAllocator::new()
    }

    #[test]
    fn add_part_is_idempotent() {
        let mut ids = alloc();
        let id = ids.allocate();
        let mut world = PhysicsWorld::new();
        world.add_part(id, PartShape::Box, Vec3::new(1.0, 1.0, 1.0), CFrame::default(), false, true, Vec3::ZERO);
        world.add_part(id, PartShape::Box, Vec3::new(1.0, 1.0, 1.0), CFrame::default(), false, true, Vec3::ZERO);
        assert_eq!(world.part_count(), 1);
    }

    #[test]
    fn setters_on_unknown_id_are_noops() {
        let mut ids = alloc();
        let stale = ids.allocate();
        let mut world = PhysicsWorld::new();
        // None of these should panic.
        world.set_anchored(stale, true);
        world.set_velocity(stale, Vec3::new(1.0, 0.0, 0.0));
        world.set_cframe(stale, CFrame::default());
        world.remove_part(stale);
        assert_eq!(world.part_count(), 0);
    }

    #[test]
    fn anchored_part_does_not_appear_in_transforms() {
        let mut ids = alloc();
        let id = ids.allocate();
        let mut world = PhysicsWorld::with_gravity(Vec3::ZERO);
        world.add_part(id, PartShape::Box, Vec3::new(4.0, 1.0, 4.0), CFrame::default(), true, true, Vec3::ZERO);
        world.step(1.0 / 60.0).unwrap();
        assert!(world.read_transforms().is_empty());
    }

    #[test]
    fn dynamic_part_falls_under_gravity() {
        let mut ids = alloc();
        let id = ids.allocate();
        let mut world = PhysicsWorld::new();
        world.add_part(
            id,
            PartShape::Ball,
            Vec3::new(1.0, 1.0, 1.0),
            CFrame::identity_at(Vec3::new(0.0, 10.0, 0.0)),
            false,
            true,
            Vec3::ZERO,
        );
        for _ in 0..30 {
            world.step(1.0 / 60.0).unwrap();
        }
        let transforms = world.read_transforms();
        assert_eq!(transforms.len(), 1);
        assert!(transforms[0].1.position.y < 10.0);
    }

    #[test]
    fn contact_pairs_are_sorted_and_deduplicated() {
        let mut ids = alloc();
        let a = ids.allocate();
        let b = ids.allocate();
        let mut world = PhysicsWorld::with_gravity(Vec3::ZERO);
        world.add_part(a, PartShape::Box, Vec3::new(2.0, 2.0, 2.0), CFrame::identity_at(Vec3::new(0.0, 0.0, 0.0)), true, true, Vec3::ZERO);
        world.add_part(b, PartShape::Box, Vec3::new(2.0, 2.0, 2.0), CFrame::identity_at(Vec3::new(1.0, 0.0, 0.0)), true, true, Vec3::ZERO);
        world.step(1.0 / 60.0).unwrap();
        let pairs = world.contact_pairs();
        assert!(pairs.iter().all(|p| p.0.to_raw() <= p.1.to_raw()));
    }

    #[test]
    fn step_rejects_non_positive_dt() {
        let mut world = PhysicsWorld::new();
        assert!(world.step(0.0).is_err());
        assert!(world.step(-1.0).is_err());
    }

    #[test]
    fn remove_part_untracks_and_clears_contacts() {
        let mut ids = alloc();
        let id = ids.allocate();
        let mut world = PhysicsWorld::new();
        world.add_part(id, PartShape::Box, Vec3::new(1.0, 1.0, 1.0), CFrame::default(), true, true, Vec3::ZERO);
        world.remove_part(id);
        assert!(!world.is_tracked(id));
        assert!(world.touch_query(id).is_empty());
    }
}
