//! The simulation world and its step pipeline.
//!
//! [`World`] owns the bodies, joints and springs and advances them with
//! [`World::step`]:
//!
//! 1. springs, gravity and damping;
//! 2. bounding boxes, broadphase and pair filtering, with shapes locked;
//! 3. narrowphase over every shape pair of each candidate body pair;
//! 4. contact wake-ups and contact events;
//! 5. joint equations, island split and solve;
//! 6. integration and sleep bookkeeping.
//!
//! Bodies are stored in a `Vec` and equations refer to them by index.
//! Joints and springs also refer to bodies by index, so
//! [`World::remove_body`] remaps them.

use std::fmt;

use tracing::{debug, trace};

use sim2d_constraint::{Constraint, Equation, GsSolver, GsSolverConfig, IslandSplitter, Islands};
use sim2d_types::{Body, BodyId, ContactMaterial, MaterialTable, SimError, Vec2};

use crate::broadphase::{Broadphase, BroadphaseConfig, BroadphaseDetector};
use crate::error::{CollisionError, Result};
use crate::narrowphase::{Narrowphase, NarrowphaseConfig, ShapeRef};
use crate::springs::{pair_mut, Spring};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How bodies are put to sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SleepMode {
    /// Bodies never sleep.
    #[default]
    NoSleeping,
    /// Each body sleeps on its own once it has been slow long enough.
    BodySleeping,
    /// An island sleeps once all of its bodies are ready to.
    IslandSleeping,
}

/// World configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorldConfig {
    /// Gravitational acceleration.
    pub gravity: Vec2,
    /// Solver settings.
    pub solver: GsSolverConfig,
    /// Narrowphase settings.
    pub narrowphase: NarrowphaseConfig,
    /// Broadphase selection.
    pub broadphase: BroadphaseConfig,
    /// Solve islands separately instead of all equations at once.
    pub islands: bool,
    /// Sleep policy.
    pub sleep_mode: SleepMode,
    /// If set, overrides the sleep speed limit of bodies as they are added.
    pub sleep_speed_limit: Option<f64>,
    /// If set, overrides the sleep time limit of bodies as they are added.
    pub sleep_time_limit: Option<f64>,
    /// Contact parameters for shapes without a registered material pair.
    pub default_contact_material: ContactMaterial,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -9.78),
            solver: GsSolverConfig::default(),
            narrowphase: NarrowphaseConfig::default(),
            broadphase: BroadphaseConfig::default(),
            islands: true,
            sleep_mode: SleepMode::NoSleeping,
            sleep_speed_limit: None,
            sleep_time_limit: None,
            default_contact_material: ContactMaterial::default(),
        }
    }
}

impl WorldConfig {
    /// No gravity.
    #[must_use]
    pub fn zero_gravity() -> Self {
        Self::default().with_gravity(Vec2::zeros())
    }

    /// Set gravity.
    #[must_use]
    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the sleep policy.
    #[must_use]
    pub fn with_sleep_mode(mut self, sleep_mode: SleepMode) -> Self {
        self.sleep_mode = sleep_mode;
        self
    }

    /// Set the broadphase.
    #[must_use]
    pub fn with_broadphase(mut self, broadphase: BroadphaseConfig) -> Self {
        self.broadphase = broadphase;
        self
    }

    /// Set the solver configuration.
    #[must_use]
    pub fn with_solver(mut self, solver: GsSolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Enable or disable island splitting.
    #[must_use]
    pub fn with_islands(mut self, islands: bool) -> Self {
        self.islands = islands;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for non-finite gravity, negative sleep limits, or an
    /// invalid solver, broadphase or contact material configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.gravity.x.is_finite() && self.gravity.y.is_finite()) {
            return Err(CollisionError::invalid_config("gravity must be finite"));
        }
        let negative = |limit: Option<f64>| limit.is_some_and(|l| !(l >= 0.0));
        if negative(self.sleep_speed_limit) || negative(self.sleep_time_limit) {
            return Err(CollisionError::invalid_config(
                "sleep limits cannot be negative",
            ));
        }
        self.solver.validate()?;
        self.broadphase.validate()?;
        self.default_contact_material.validate()?;
        Ok(())
    }
}

/// Begin and end of contact between two bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ContactEvent {
    /// The bodies touch this step and did not in the previous one.
    Begin {
        /// First body.
        body_a: BodyId,
        /// Second body.
        body_b: BodyId,
    },
    /// The bodies touched in the previous step and no longer do.
    End {
        /// First body.
        body_a: BodyId,
        /// Second body.
        body_b: BodyId,
    },
}

impl ContactEvent {
    /// The two bodies of the event.
    #[must_use]
    pub fn bodies(&self) -> (BodyId, BodyId) {
        match *self {
            Self::Begin { body_a, body_b } | Self::End { body_a, body_b } => (body_a, body_b),
        }
    }

    /// Whether this is a begin-contact event.
    #[must_use]
    pub fn is_begin(&self) -> bool {
        matches!(self, Self::Begin { .. })
    }
}

/// What one step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepReport {
    /// Body pairs that passed the broadphase and the pair filters.
    pub pairs: usize,
    /// Contact equations generated.
    pub contacts: usize,
    /// Friction equations generated.
    pub frictions: usize,
    /// Islands found, zero when islands are disabled.
    pub islands: usize,
    /// Islands (or global solves) that ran the solver.
    pub solved_islands: usize,
    /// Solver iterations summed over every solve.
    pub solver_iterations: usize,
}

type PairFilter = Box<dyn FnMut(&mut Body, &mut Body) -> bool + Send>;

/// A 2D rigid-body world.
pub struct World {
    config: WorldConfig,
    bodies: Vec<Body>,
    constraints: Vec<Constraint>,
    springs: Vec<Spring>,
    broadphase: BroadphaseDetector,
    narrowphase: Narrowphase,
    solver: GsSolver,
    splitter: IslandSplitter,
    materials: MaterialTable,
    equations: Vec<Equation>,
    events: Vec<ContactEvent>,
    pair_filter: Option<PairFilter>,
    time: f64,
    step_count: u64,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("config", &self.config)
            .field("bodies", &self.bodies.len())
            .field("constraints", &self.constraints.len())
            .field("springs", &self.springs.len())
            .field("broadphase", &self.broadphase.name())
            .field("pair_filter", &self.pair_filter.is_some())
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::with_broadphase(WorldConfig::default(), BroadphaseDetector::default())
    }
}

impl World {
    /// Create an empty world.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        let broadphase = BroadphaseDetector::new(config.broadphase)?;
        Ok(Self::with_broadphase(config, broadphase))
    }

    fn with_broadphase(config: WorldConfig, broadphase: BroadphaseDetector) -> Self {
        Self {
            config,
            bodies: Vec::new(),
            constraints: Vec::new(),
            springs: Vec::new(),
            broadphase,
            narrowphase: Narrowphase::new(config.narrowphase),
            solver: GsSolver::new(config.solver),
            splitter: IslandSplitter::new(),
            materials: MaterialTable::new(config.default_contact_material),
            equations: Vec::new(),
            events: Vec::new(),
            pair_filter: None,
            time: 0.0,
            step_count: 0,
        }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Simulated time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of completed steps.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Set gravity.
    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.config.gravity = gravity;
    }

    /// Change the sleep policy.
    pub fn set_sleep_mode(&mut self, sleep_mode: SleepMode) {
        self.config.sleep_mode = sleep_mode;
    }

    /// Add a body and return its id.
    pub fn add_body(&mut self, mut body: Body) -> BodyId {
        if let Some(limit) = self.config.sleep_speed_limit {
            body.sleep_speed_limit = limit;
        }
        if let Some(limit) = self.config.sleep_time_limit {
            body.sleep_time_limit = limit;
        }
        body.update_aabb();
        let id = body.id();
        self.bodies.push(body);
        id
    }

    /// Remove a body.
    ///
    /// Joints and springs attached to it are removed too. The remaining ones
    /// are pointed at the shifted body indices.
    pub fn remove_body(&mut self, id: BodyId) -> Option<Body> {
        let index = self.body_index(id)?;
        let body = self.bodies.remove(index);

        let shift = |i: usize| if i > index { i - 1 } else { i };
        self.constraints
            .retain(|c| c.body_a() != index && c.body_b() != index);
        for c in &mut self.constraints {
            let (a, b) = (shift(c.body_a()), shift(c.body_b()));
            c.set_bodies(a, b);
        }
        self.springs.retain(|s| {
            let (a, b) = s.bodies();
            a != index && b != index
        });
        for s in &mut self.springs {
            let (a, b) = s.bodies();
            s.set_bodies(shift(a), shift(b));
        }
        Some(body)
    }

    /// Index of a body in [`World::bodies`].
    #[must_use]
    pub fn body_index(&self, id: BodyId) -> Option<usize> {
        self.bodies.iter().position(|b| b.id() == id)
    }

    /// Look up a body.
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.iter().find(|b| b.id() == id)
    }

    /// Look up a body mutably.
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.iter_mut().find(|b| b.id() == id)
    }

    /// All bodies, in index order.
    #[must_use]
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// Number of bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Add a joint and return its index.
    pub fn add_constraint(&mut self, constraint: Constraint) -> usize {
        self.constraints.push(constraint);
        self.constraints.len() - 1
    }

    /// Remove a joint by index.
    pub fn remove_constraint(&mut self, index: usize) -> Option<Constraint> {
        (index < self.constraints.len()).then(|| self.constraints.remove(index))
    }

    /// All joints.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// All joints, mutably.
    pub fn constraints_mut(&mut self) -> &mut [Constraint] {
        &mut self.constraints
    }

    /// Add a spring and return its index.
    pub fn add_spring(&mut self, spring: impl Into<Spring>) -> usize {
        self.springs.push(spring.into());
        self.springs.len() - 1
    }

    /// All springs.
    #[must_use]
    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    /// The contact material table.
    #[must_use]
    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    /// The contact material table, mutably.
    pub fn materials_mut(&mut self) -> &mut MaterialTable {
        &mut self.materials
    }

    /// The narrowphase, for contact queries between steps.
    #[must_use]
    pub fn narrowphase(&self) -> &Narrowphase {
        &self.narrowphase
    }

    /// Equations solved in the last step: contacts, frictions, then joints.
    #[must_use]
    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    /// Install a filter run on every broadphase pair.
    ///
    /// Returning `false` drops the pair. Shapes are locked while the filter
    /// runs, so adding or removing shapes fails with
    /// [`SimError::ShapesLocked`].
    pub fn set_pair_filter(&mut self, filter: impl FnMut(&mut Body, &mut Body) -> bool + Send + 'static) {
        self.pair_filter = Some(Box::new(filter));
    }

    /// Remove the pair filter.
    pub fn clear_pair_filter(&mut self) {
        self.pair_filter = None;
    }

    /// Take the contact events of the steps since the last call.
    pub fn drain_events(&mut self) -> impl Iterator<Item = ContactEvent> + '_ {
        self.events.drain(..)
    }

    /// Bodies with a shape containing `point`, within `precision`.
    #[must_use]
    pub fn hit_test(&self, point: &Vec2, precision: f64) -> Vec<BodyId> {
        self.bodies
            .iter()
            .enumerate()
            .filter(|(i, body)| {
                body.shapes().iter().any(|shape| {
                    Narrowphase::shape_contains_point(&ShapeRef::new(*i, body, shape), point, precision)
                })
            })
            .map(|(_, body)| body.id())
            .collect()
    }

    /// Whether any shapes of two bodies overlap. `None` if no shape pair
    /// passes the filter.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::BodyNotFound`] for an unknown id.
    pub fn bodies_overlap(&self, a: BodyId, b: BodyId, filter: bool) -> Result<Option<bool>> {
        let body_a = self.body(a).ok_or(SimError::BodyNotFound(a.raw()))?;
        let body_b = self.body(b).ok_or(SimError::BodyNotFound(b.raw()))?;
        self.narrowphase.bodies_overlap(body_a, body_b, filter)
    }

    /// Advance the world by `dt` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTimestep`] for a non-positive or non-finite
    /// `dt`, and propagates dispatch errors from the narrowphase.
    pub fn step(&mut self, dt: f64) -> Result<StepReport> {
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(SimError::InvalidTimestep(dt).into());
        }
        let mut report = StepReport::default();

        self.apply_forces(dt);

        for body in &mut self.bodies {
            body.update_aabb();
            body.lock_shapes();
        }
        let detected = self.detect_contacts();
        for body in &mut self.bodies {
            body.unlock_shapes();
        }
        let pairs = detected?;
        report.pairs = pairs.len();
        report.contacts = self.narrowphase.contact_equations().len();
        report.frictions = self.narrowphase.friction_equations().len();

        self.wake_on_contact(&pairs);
        self.emit_events();

        self.equations.clear();
        self.narrowphase.drain_equations(&mut self.equations);
        let joints_start = self.equations.len();
        for constraint in &mut self.constraints {
            constraint.update(&self.bodies);
            self.equations.extend_from_slice(constraint.equations());
        }

        let islands = if self.config.islands || self.config.sleep_mode == SleepMode::IslandSleeping {
            Some(self.splitter.split(&self.bodies, &self.equations))
        } else {
            None
        };

        match islands.as_ref().filter(|_| self.config.islands) {
            Some(islands) => {
                report.islands = islands.num_islands();
                for island in islands.islands() {
                    if island.num_equations() == 0 || !island.has_awake_body(&self.bodies) {
                        continue;
                    }
                    let result = self
                        .solver
                        .solve_island(dt, &mut self.equations, island, &mut self.bodies);
                    report.solved_islands += 1;
                    report.solver_iterations += result.iterations_used;
                }
            }
            None => {
                let result = self.solver.solve(dt, &mut self.equations, &mut self.bodies);
                if !result.is_empty() {
                    report.solved_islands = 1;
                }
                report.solver_iterations = result.iterations_used;
            }
        }
        self.store_joint_multipliers(joints_start);

        for body in &mut self.bodies {
            body.integrate(dt);
            body.set_zero_force();
        }

        self.update_sleep(dt, islands.as_ref());

        self.time += dt;
        self.step_count += 1;
        debug!(
            "step {}: {} pairs, {} contacts, {} frictions, {} islands ({} solved), {} iterations",
            self.step_count,
            report.pairs,
            report.contacts,
            report.frictions,
            report.islands,
            report.solved_islands,
            report.solver_iterations
        );
        Ok(report)
    }

    fn apply_forces(&mut self, dt: f64) {
        for spring in &self.springs {
            spring.apply(&mut self.bodies);
        }
        let gravity = self.config.gravity;
        for body in &mut self.bodies {
            if body.is_dynamic() && !body.is_sleeping() {
                let weight = gravity * body.mass();
                body.force += weight;
            }
            body.apply_damping(dt);
        }
    }

    /// Broadphase, pair filtering and narrowphase. Returns the body pairs
    /// handed to the narrowphase.
    fn detect_contacts(&mut self) -> Result<Vec<(usize, usize)>> {
        let candidates = self.broadphase.collision_pairs(&self.bodies);

        let mut pairs = Vec::with_capacity(candidates.len());
        for (i, j) in candidates {
            if self
                .constraints
                .iter()
                .any(|c| !c.collide_connected && c.connects(i, j))
            {
                continue;
            }
            if let Some(filter) = self.pair_filter.as_mut() {
                let Some((a, b)) = pair_mut(&mut self.bodies, i, j) else {
                    continue;
                };
                if !filter(&mut *a, &mut *b) {
                    trace!("pair filter dropped bodies {} and {}", a.id(), b.id());
                    continue;
                }
            }
            pairs.push((i, j));
        }

        self.narrowphase.reset();
        for &(i, j) in &pairs {
            let (Some(a), Some(b)) = (self.bodies.get(i), self.bodies.get(j)) else {
                continue;
            };
            for sa in a.shapes() {
                for sb in b.shapes() {
                    if !sa.can_collide_with(sb) {
                        continue;
                    }
                    let material = self.materials.get(sa.material, sb.material);
                    self.narrowphase.test_shape_pair(
                        &ShapeRef::new(i, a, sa),
                        &ShapeRef::new(j, b, sb),
                        material,
                        false,
                    )?;
                }
            }
        }
        Ok(pairs)
    }

    /// A sleeping body hit by a fast awake body wakes up.
    fn wake_on_contact(&mut self, pairs: &[(usize, usize)]) {
        if self.config.sleep_mode == SleepMode::NoSleeping {
            return;
        }
        let mut wake = Vec::new();
        for &(i, j) in pairs {
            let (Some(a), Some(b)) = (self.bodies.get(i), self.bodies.get(j)) else {
                continue;
            };
            if !self.narrowphase.colliding(a.id(), b.id()) {
                continue;
            }
            for (sleeper, other, index) in [(a, b, i), (b, a, j)] {
                if sleeper.is_sleeping() && !other.is_sleeping() && !other.is_static() {
                    let speed_squared =
                        other.velocity.norm_squared() + other.angular_velocity * other.angular_velocity;
                    if speed_squared >= 2.0 * other.sleep_speed_limit * other.sleep_speed_limit {
                        wake.push(index);
                    }
                }
            }
        }
        for index in wake {
            if let Some(body) = self.bodies.get_mut(index) {
                trace!("body {} woken by contact", body.id());
                body.wake_up();
            }
        }
    }

    fn emit_events(&mut self) {
        let mut begun: Vec<_> = self.narrowphase.begun_contacts().collect();
        let mut ended: Vec<_> = self.narrowphase.ended_contacts().collect();
        begun.sort_unstable();
        ended.sort_unstable();
        self.events.extend(
            begun
                .into_iter()
                .map(|(body_a, body_b)| ContactEvent::Begin { body_a, body_b }),
        );
        self.events.extend(
            ended
                .into_iter()
                .map(|(body_a, body_b)| ContactEvent::End { body_a, body_b }),
        );
    }

    fn store_joint_multipliers(&mut self, start: usize) {
        let mut offset = start;
        for constraint in &mut self.constraints {
            let solved = self.equations.get(offset..).unwrap_or_default();
            let count = constraint.equations().len();
            for (dst, src) in constraint.equations_mut().iter_mut().zip(solved) {
                dst.multiplier = src.multiplier;
            }
            offset += count;
        }
    }

    fn update_sleep(&mut self, dt: f64, islands: Option<&Islands>) {
        match self.config.sleep_mode {
            SleepMode::NoSleeping => {}
            SleepMode::BodySleeping => {
                for body in &mut self.bodies {
                    body.sleep_tick(dt, false);
                }
            }
            SleepMode::IslandSleeping => {
                for body in &mut self.bodies {
                    body.sleep_tick(dt, true);
                }
                let Some(islands) = islands else {
                    return;
                };
                for island in islands.islands() {
                    if island.num_bodies() > 0 && island.wants_to_sleep(&self.bodies) {
                        trace!("island of {} bodies goes to sleep", island.num_bodies());
                        island.sleep(&mut self.bodies);
                    }
                }
            }
        }
    }
}
