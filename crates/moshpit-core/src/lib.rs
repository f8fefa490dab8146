//! Core mosh pit simulation: a fixed population of point moshers in a
//! bounded 2D arena, driven by short-range repulsion, local flock alignment,
//! speed damping, and thermal noise, with neighbor queries served by a
//! uniform bucket grid.
//!
//! The crate is deliberately host-agnostic: it exposes construction,
//! [`Simulation::advance`], [`Simulation::snapshot`], and
//! [`Simulation::reconfigure`], and reports diagnostics through returned
//! values rather than logging. Rendering, scheduling, and message routing
//! belong to the embedding host.

use moshpit_index::{BucketGrid, RebuildReport};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard upper bound on the configurable population.
pub const MAX_POPULATION: usize = 8192;

/// Pair separations below this are treated as coincident and skipped.
const SEPARATION_FLOOR: f64 = 1e-6;
/// Squared speeds below this leave the damping term inert.
const SPEED_FLOOR_SQ: f64 = 1e-6;
/// Summed neighbor velocities shorter than this produce no alignment force.
const ALIGNMENT_FLOOR: f64 = 1e-6;

/// Simulation clock (ticks processed since construction).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Plain 2D vector used for positions, velocities, and forces.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Construct a new vector.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean length.
    #[must_use]
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }
}

/// Behavioral class of a mosher, fixed at initialization.
///
/// `Follower` and `Leader` form the active subset: they self-propel, flock,
/// and receive thermal noise. `Passive` moshers are inert gas that repels
/// neighbors and resists motion but never drives itself.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum MosherKind {
    #[default]
    Passive,
    Follower,
    Leader,
}

impl MosherKind {
    /// Whether this kind participates in flocking, noise, and propulsion.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Follower | Self::Leader)
    }
}

/// Per-axis treatment of the arena boundary.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum BoundaryPolicy {
    /// Exiting coordinates mirror back across the edge and the velocity
    /// component flips sign.
    Reflective,
    /// Exiting coordinates wrap modulo the arena extent; velocity unchanged.
    #[default]
    Periodic,
}

impl BoundaryPolicy {
    /// Whether neighbor lookups wrap around this axis.
    #[must_use]
    pub const fn wraps(self) -> bool {
        matches!(self, Self::Periodic)
    }
}

/// Errors surfaced by simulation construction and reconfiguration.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Indicates a configuration value that cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The arena geometry could not host the neighbor grid.
    #[error("grid construction failed: {0}")]
    Grid(#[from] moshpit_index::GridError),
}

/// Static configuration for a mosh pit simulation.
///
/// Immutable after construction except for the live-tunable subset exposed
/// through [`Simulation::reconfigure`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoshpitConfig {
    /// Live mosher count; also pins the storage capacity at construction.
    pub population: usize,
    /// Fraction of the arena area whose central circle seeds the active set.
    pub active_fraction: f64,
    /// Collision radius of every mosher.
    pub radius: f64,
    /// Arena width in arena units.
    pub arena_width: f64,
    /// Arena height in arena units.
    pub arena_height: f64,
    /// Target speed active moshers are damped toward.
    pub happy_speed: f64,
    /// Damping gain applied to the deviation from the target speed.
    pub damping: f64,
    /// Soft-core repulsion scale (the `epsilon` of the pair force).
    pub repulsion_strength: f64,
    /// Magnitude of the normalized flock-alignment force.
    pub flock_strength: f64,
    /// Magnitude of the per-axis uniform thermal noise force.
    pub noise_strength: f64,
    /// Cutoff distance for flock alignment neighbor sums.
    pub flock_radius: f64,
    /// Integration timestep.
    pub dt: f64,
    /// Rebuild-force-integrate repetitions performed per `advance` call.
    pub sub_steps: u32,
    /// Host cadence hint in frames per second; not enforced by the core.
    pub tick_rate_hz: u32,
    /// Rendering hint carried through snapshots; unused by the dynamics.
    pub show_force_coloring: bool,
    /// Rendering hint carried through snapshots; unused by the dynamics.
    pub draw_enabled: bool,
    /// Boundary policy along the x axis.
    pub boundary_x: BoundaryPolicy,
    /// Boundary policy along the y axis.
    pub boundary_y: BoundaryPolicy,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for MoshpitConfig {
    fn default() -> Self {
        Self {
            population: 300,
            active_fraction: 0.15,
            radius: 1.0,
            arena_width: 50.0,
            arena_height: 50.0,
            happy_speed: 1.0,
            damping: 1.0,
            repulsion_strength: 25.0,
            flock_strength: 1.0,
            noise_strength: 3.0,
            flock_radius: 4.0,
            dt: 0.1,
            sub_steps: 2,
            tick_rate_hz: 30,
            show_force_coloring: false,
            draw_enabled: true,
            boundary_x: BoundaryPolicy::Periodic,
            boundary_y: BoundaryPolicy::Periodic,
            rng_seed: None,
        }
    }
}

impl MoshpitConfig {
    /// Validates the configuration.
    fn validate(&self) -> Result<(), SimulationError> {
        if self.population == 0 || self.population > MAX_POPULATION {
            return Err(SimulationError::InvalidConfig(
                "population must be between 1 and 8192",
            ));
        }
        if !(self.arena_width.is_finite() && self.arena_width > 0.0)
            || !(self.arena_height.is_finite() && self.arena_height > 0.0)
        {
            return Err(SimulationError::InvalidConfig(
                "arena extents must be positive and finite",
            ));
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(SimulationError::InvalidConfig("radius must be positive"));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(SimulationError::InvalidConfig("timestep must be positive"));
        }
        if !(0.0..=1.0).contains(&self.active_fraction) {
            return Err(SimulationError::InvalidConfig(
                "active_fraction must lie in [0, 1]",
            ));
        }
        if self.sub_steps == 0 {
            return Err(SimulationError::InvalidConfig(
                "sub_steps must be at least 1",
            ));
        }
        let scales = [
            self.happy_speed,
            self.damping,
            self.repulsion_strength,
            self.flock_strength,
            self.noise_strength,
            self.flock_radius,
        ];
        if scales.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(SimulationError::InvalidConfig(
                "force scales must be non-negative and finite",
            ));
        }
        Ok(())
    }

    /// Minimum cell side the neighbor grid needs so one 3x3 block covers
    /// every interaction cutoff.
    fn min_cell_extent(&self) -> f64 {
        (2.0 * self.radius).max(self.flock_radius)
    }

    /// Returns the configured RNG, drawing a seed from entropy if absent.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// Live-tunable subset of the configuration.
///
/// Fields left as `None` keep their current value. Validation happens before
/// any field is applied, so a rejected delta leaves the simulation in its
/// previous valid state.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Tuning {
    pub population: Option<usize>,
    pub noise_strength: Option<f64>,
    pub flock_strength: Option<f64>,
    pub repulsion_strength: Option<f64>,
}

/// Dense per-mosher columns for hot-path iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MosherColumns {
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    forces: Vec<Vec2>,
    radii: Vec<f64>,
    kinds: Vec<MosherKind>,
    collision_energy: Vec<f64>,
}

impl MosherColumns {
    /// Create a collection with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            velocities: Vec::with_capacity(capacity),
            forces: Vec::with_capacity(capacity),
            radii: Vec::with_capacity(capacity),
            kinds: Vec::with_capacity(capacity),
            collision_energy: Vec::with_capacity(capacity),
        }
    }

    /// Number of stored rows (live and dormant).
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Push a new resting passive mosher.
    fn push(&mut self, position: Vec2, radius: f64) {
        self.positions.push(position);
        self.velocities.push(Vec2::ZERO);
        self.forces.push(Vec2::ZERO);
        self.radii.push(radius);
        self.kinds.push(MosherKind::Passive);
        self.collision_energy.push(0.0);
        self.debug_assert_coherent();
    }

    /// Immutable access to positions.
    #[must_use]
    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    /// Mutable access to positions.
    #[must_use]
    pub fn positions_mut(&mut self) -> &mut [Vec2] {
        &mut self.positions
    }

    /// Immutable access to velocities.
    #[must_use]
    pub fn velocities(&self) -> &[Vec2] {
        &self.velocities
    }

    /// Mutable access to velocities.
    #[must_use]
    pub fn velocities_mut(&mut self) -> &mut [Vec2] {
        &mut self.velocities
    }

    /// Immutable access to the per-tick force accumulators.
    #[must_use]
    pub fn forces(&self) -> &[Vec2] {
        &self.forces
    }

    /// Immutable access to collision radii.
    #[must_use]
    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    /// Immutable access to mosher kinds.
    #[must_use]
    pub fn kinds(&self) -> &[MosherKind] {
        &self.kinds
    }

    /// Mutable access to mosher kinds.
    #[must_use]
    pub fn kinds_mut(&mut self) -> &mut [MosherKind] {
        &mut self.kinds
    }

    /// Immutable access to the last-step collision energies.
    #[must_use]
    pub fn collision_energy(&self) -> &[f64] {
        &self.collision_energy
    }

    /// Mutable access to the collision energies.
    #[must_use]
    pub fn collision_energy_mut(&mut self) -> &mut [f64] {
        &mut self.collision_energy
    }

    fn write_accumulators(&mut self, results: &[(Vec2, f64)]) {
        for (index, &(force, energy)) in results.iter().enumerate() {
            self.forces[index] = force;
            self.collision_energy[index] = energy;
        }
    }

    /// Split borrows used by the integration step.
    fn kinematics_mut(&mut self) -> (&mut [Vec2], &mut [Vec2], &[Vec2]) {
        (&mut self.positions, &mut self.velocities, &self.forces)
    }

    #[inline]
    fn debug_assert_coherent(&self) {
        debug_assert_eq!(self.positions.len(), self.velocities.len());
        debug_assert_eq!(self.positions.len(), self.forces.len());
        debug_assert_eq!(self.positions.len(), self.radii.len());
        debug_assert_eq!(self.positions.len(), self.kinds.len());
        debug_assert_eq!(self.positions.len(), self.collision_energy.len());
    }
}

/// Fixed-capacity mosher storage with a live-population bound.
///
/// Capacity is pinned at seeding time; the live population may shrink and
/// regrow within `[1, capacity]`. Dormant rows past the live bound keep
/// their state untouched until re-exposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MosherStore {
    columns: MosherColumns,
    population: usize,
    leader: usize,
}

impl MosherStore {
    /// Seed `config.population` moshers from the given RNG stream.
    ///
    /// Draw order is fixed: positions first (x then y, ascending index),
    /// then initial velocities of active moshers (x then y, ascending
    /// index). Kinds are assigned between the two passes without consuming
    /// randomness: every mosher inside the central circle whose area is
    /// `active_fraction` of the arena becomes active, the first one seen
    /// becoming the leader. An empty circle promotes the mosher nearest the
    /// arena center so exactly one leader always exists.
    fn seed(config: &MoshpitConfig, rng: &mut SmallRng) -> Self {
        let capacity = config.population;
        let mut columns = MosherColumns::with_capacity(capacity);
        for _ in 0..capacity {
            let x = rng.random_range(0.0..config.arena_width);
            let y = rng.random_range(0.0..config.arena_height);
            columns.push(Vec2::new(x, y), config.radius);
        }

        let center = Vec2::new(config.arena_width * 0.5, config.arena_height * 0.5);
        let active_radius_sq = config.active_fraction * config.arena_width * config.arena_height
            / std::f64::consts::PI;
        let mut leader = None;
        for index in 0..capacity {
            let position = columns.positions()[index];
            let dx = position.x - center.x;
            let dy = position.y - center.y;
            if dx * dx + dy * dy < active_radius_sq {
                columns.kinds_mut()[index] = if leader.is_none() {
                    leader = Some(index);
                    MosherKind::Leader
                } else {
                    MosherKind::Follower
                };
            }
        }
        let leader = leader.unwrap_or_else(|| {
            let mut nearest = 0;
            let mut nearest_dist = f64::INFINITY;
            for (index, position) in columns.positions().iter().enumerate() {
                let dx = position.x - center.x;
                let dy = position.y - center.y;
                let dist = dx * dx + dy * dy;
                if dist < nearest_dist {
                    nearest = index;
                    nearest_dist = dist;
                }
            }
            nearest
        });
        columns.kinds_mut()[leader] = MosherKind::Leader;

        for index in 0..capacity {
            if columns.kinds()[index].is_active() {
                let vx = rng.random_range(-0.5..0.5) * config.happy_speed;
                let vy = rng.random_range(-0.5..0.5) * config.happy_speed;
                columns.velocities_mut()[index] = Vec2::new(vx, vy);
            }
        }

        Self {
            columns,
            population: capacity,
            leader,
        }
    }

    /// Live mosher count.
    #[must_use]
    pub fn population(&self) -> usize {
        self.population
    }

    /// Storage capacity fixed at seeding time.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.columns.len()
    }

    /// Index assigned the leader role at seeding time.
    #[must_use]
    pub fn leader(&self) -> usize {
        self.leader
    }

    /// Borrow the underlying columns.
    #[must_use]
    pub fn columns(&self) -> &MosherColumns {
        &self.columns
    }

    /// Mutably borrow the underlying columns.
    #[must_use]
    pub fn columns_mut(&mut self) -> &mut MosherColumns {
        &mut self.columns
    }

    /// Zero the force and collision-energy accumulators of live moshers.
    pub fn reset_forces(&mut self) {
        let population = self.population;
        self.columns.forces[..population].fill(Vec2::ZERO);
        self.columns.collision_energy[..population].fill(0.0);
    }

    fn set_population(&mut self, population: usize) {
        debug_assert!(population >= 1 && population <= self.capacity());
        self.population = population;
    }
}

/// Host viewport dimensions used to scale snapshot coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    /// Construct a new viewport.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Per-mosher record emitted in a frame snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MosherSnapshot {
    pub index: usize,
    pub kind: MosherKind,
    pub x: f64,
    pub y: f64,
    /// Collision energy normalized against the frame maximum, in `[0, 100]`.
    pub collision_pct: f64,
}

/// Distinguished record for the current leader.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LeaderSnapshot {
    pub x: f64,
    pub y: f64,
    pub collision_pct: f64,
}

/// Read-only view of the particle state emitted after a tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameSnapshot {
    pub tick: Tick,
    pub moshers: Vec<MosherSnapshot>,
    pub leader: LeaderSnapshot,
    /// Rendering hint mirrored from the configuration.
    pub show_force: bool,
    /// Rendering hint mirrored from the configuration.
    pub draw_enabled: bool,
}

/// Diagnostics emitted by each `advance` call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TickEvents {
    pub tick: Tick,
    /// Moshers omitted from neighbor lists across this tick's sub-steps
    /// because their grid cell was full. Bounded degradation, never fatal.
    pub grid_dropped: u32,
}

/// Top-level simulation driver.
///
/// Owns the mosher store, the neighbor grid, and the single deterministic
/// RNG stream. `advance` runs to completion before returning and never
/// exposes partial state; callers observe results through [`snapshot`].
///
/// [`snapshot`]: Simulation::snapshot
#[derive(Debug, Clone)]
pub struct Simulation {
    config: MoshpitConfig,
    rng: SmallRng,
    store: MosherStore,
    grid: BucketGrid,
    tick: Tick,
}

impl Simulation {
    /// Validate `config`, seed the population, and build the neighbor grid.
    pub fn new(config: MoshpitConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let mut rng = config.seeded_rng();
        let store = MosherStore::seed(&config, &mut rng);
        let grid = BucketGrid::new(
            config.arena_width,
            config.arena_height,
            config.min_cell_extent(),
        )?;
        Ok(Self {
            config,
            rng,
            store,
            grid,
            tick: Tick::zero(),
        })
    }

    /// Execute one tick: `sub_steps` repetitions of reset, grid rebuild,
    /// force accumulation, and integration, each sub-step on freshly
    /// rebuilt neighbor lists.
    pub fn advance(&mut self) -> TickEvents {
        let mut dropped = 0u32;
        for _ in 0..self.config.sub_steps {
            self.store.reset_forces();
            dropped += self.stage_rebuild().dropped;
            self.stage_forces();
            self.stage_integrate();
        }
        self.tick = self.tick.next();
        TickEvents {
            tick: self.tick,
            grid_dropped: dropped,
        }
    }

    fn stage_rebuild(&mut self) -> RebuildReport {
        let population = self.store.population();
        let pairs: Vec<(f64, f64)> = self.store.columns().positions()[..population]
            .iter()
            .map(|p| (p.x, p.y))
            .collect();
        self.grid.rebuild(&pairs)
    }

    /// Accumulate repulsion, alignment, damping, and noise for every live
    /// mosher from the pre-integration state.
    fn stage_forces(&mut self) {
        let population = self.store.population();
        let config = &self.config;
        let grid = &self.grid;
        let rng = &mut self.rng;
        let columns = self.store.columns();
        let positions = columns.positions();
        let velocities = columns.velocities();
        let radii = columns.radii();
        let kinds = columns.kinds();

        let wrap_x = config.boundary_x.wraps();
        let wrap_y = config.boundary_y.wraps();
        let flock_radius_sq = config.flock_radius * config.flock_radius;
        let epsilon = config.repulsion_strength;

        let mut results: Vec<(Vec2, f64)> = Vec::with_capacity(population);
        for i in 0..population {
            let mut force = Vec2::ZERO;
            let mut energy = 0.0;
            let mut alignment_sum = Vec2::ZERO;
            let mut alignment_count = 0usize;
            let active = kinds[i].is_active();
            let cell = grid.cell_of(positions[i].x, positions[i].y);

            grid.visit_block(cell, wrap_x, wrap_y, &mut |j, shift_x, shift_y| {
                let j = j as usize;
                if j == i {
                    return;
                }
                let dx = positions[j].x + shift_x - positions[i].x;
                let dy = positions[j].y + shift_y - positions[i].y;
                let dist_sq = dx * dx + dy * dy;

                let reach = radii[i] + radii[j];
                if dist_sq < reach * reach {
                    let dist = dist_sq.sqrt();
                    if dist > SEPARATION_FLOOR {
                        let overlap = 1.0 - dist / reach;
                        let magnitude = -epsilon * overlap * overlap;
                        let fx = magnitude * dx / dist;
                        let fy = magnitude * dy / dist;
                        force.x += fx;
                        force.y += fy;
                        energy += fx * fx + fy * fy;
                    }
                }

                if active && kinds[j].is_active() && dist_sq < flock_radius_sq {
                    alignment_sum.x += velocities[j].x;
                    alignment_sum.y += velocities[j].y;
                    alignment_count += 1;
                }
            });

            // Normalized "follow the crowd" term: bounded no matter how
            // many neighbors align.
            if active && alignment_count > 0 {
                let norm = alignment_sum.length();
                if norm > ALIGNMENT_FLOOR {
                    force.x += config.flock_strength * alignment_sum.x / norm;
                    force.y += config.flock_strength * alignment_sum.y / norm;
                }
            }

            let target = if active { config.happy_speed } else { 0.0 };
            let speed_sq = velocities[i].length_squared();
            if speed_sq > SPEED_FLOOR_SQ {
                let speed = speed_sq.sqrt();
                let gain = config.damping * (target - speed) / speed;
                force.x += gain * velocities[i].x;
                force.y += gain * velocities[i].y;
            }

            if active {
                force.x += config.noise_strength * (rng.random::<f64>() - 0.5);
                force.y += config.noise_strength * (rng.random::<f64>() - 0.5);
            }

            results.push((force, energy));
        }

        self.store.columns_mut().write_accumulators(&results);
    }

    /// Semi-implicit Euler step with per-axis boundary policy.
    fn stage_integrate(&mut self) {
        let dt = self.config.dt;
        let width = self.config.arena_width;
        let height = self.config.arena_height;
        let boundary_x = self.config.boundary_x;
        let boundary_y = self.config.boundary_y;
        let population = self.store.population();
        let (positions, velocities, forces) = self.store.columns_mut().kinematics_mut();

        for i in 0..population {
            velocities[i].x += forces[i].x * dt;
            velocities[i].y += forces[i].y * dt;
            positions[i].x += velocities[i].x * dt;
            positions[i].y += velocities[i].y * dt;

            let (px, vx) = apply_boundary(positions[i].x, velocities[i].x, width, boundary_x);
            let (py, vy) = apply_boundary(positions[i].y, velocities[i].y, height, boundary_y);
            positions[i] = Vec2::new(px, py);
            velocities[i] = Vec2::new(vx, vy);
        }
    }

    /// Emit the current particle state scaled to `viewport`.
    ///
    /// Scaling is a presentation concern of the emitting step; nothing about
    /// the stored state changes. Collision percentages normalize against the
    /// frame maximum and are all zero for a contact-free frame.
    #[must_use]
    pub fn snapshot(&self, viewport: Viewport) -> FrameSnapshot {
        let population = self.store.population();
        let columns = self.store.columns();
        let positions = columns.positions();
        let kinds = columns.kinds();
        let energies = columns.collision_energy();

        let scale_x = viewport.width / self.config.arena_width;
        let scale_y = viewport.height / self.config.arena_height;
        let max_energy = energies[..population]
            .iter()
            .copied()
            .fold(0.0_f64, f64::max);
        let percent = |energy: f64| {
            if max_energy > 0.0 {
                100.0 * energy / max_energy
            } else {
                0.0
            }
        };

        let moshers = (0..population)
            .map(|index| MosherSnapshot {
                index,
                kind: kinds[index],
                x: positions[index].x * scale_x,
                y: positions[index].y * scale_y,
                collision_pct: percent(energies[index]),
            })
            .collect();

        let leader = self.leader_index();
        FrameSnapshot {
            tick: self.tick,
            moshers,
            leader: LeaderSnapshot {
                x: positions[leader].x * scale_x,
                y: positions[leader].y * scale_y,
                collision_pct: percent(energies[leader]),
            },
            show_force: self.config.show_force_coloring,
            draw_enabled: self.config.draw_enabled,
        }
    }

    /// Apply a live-tuning delta.
    ///
    /// The whole delta is validated before any field is applied; on error
    /// the simulation keeps its previous valid state.
    pub fn reconfigure(&mut self, tuning: Tuning) -> Result<(), SimulationError> {
        if let Some(population) = tuning.population
            && (population == 0 || population > self.store.capacity())
        {
            return Err(SimulationError::InvalidConfig(
                "population outside the seeded capacity",
            ));
        }
        let scales = [
            tuning.noise_strength,
            tuning.flock_strength,
            tuning.repulsion_strength,
        ];
        if scales
            .iter()
            .flatten()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(SimulationError::InvalidConfig(
                "force scales must be non-negative and finite",
            ));
        }

        if let Some(population) = tuning.population {
            self.store.set_population(population);
            self.config.population = population;
        }
        if let Some(noise) = tuning.noise_strength {
            self.config.noise_strength = noise;
        }
        if let Some(flock) = tuning.flock_strength {
            self.config.flock_strength = flock;
        }
        if let Some(repulsion) = tuning.repulsion_strength {
            self.config.repulsion_strength = repulsion;
        }
        Ok(())
    }

    /// Returns an immutable reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &MoshpitConfig {
        &self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Live mosher count.
    #[must_use]
    pub fn population(&self) -> usize {
        self.store.population()
    }

    /// Storage capacity fixed at construction.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Index of the mosher reported as leader.
    ///
    /// Falls back to the first live active mosher (then index 0) when the
    /// live population excludes the seeded leader.
    #[must_use]
    pub fn leader_index(&self) -> usize {
        let population = self.store.population();
        let leader = self.store.leader();
        if leader < population {
            return leader;
        }
        self.store.columns().kinds()[..population]
            .iter()
            .position(|kind| kind.is_active())
            .unwrap_or(0)
    }

    /// Read-only access to the mosher columns.
    #[must_use]
    pub fn moshers(&self) -> &MosherColumns {
        self.store.columns()
    }

    /// Mutable access to the mosher columns (state surgery for hosts and
    /// tests; the simulation itself maintains all invariants).
    #[must_use]
    pub fn moshers_mut(&mut self) -> &mut MosherColumns {
        self.store.columns_mut()
    }
}

/// Resolve one axis of the boundary policy after integration.
fn apply_boundary(position: f64, velocity: f64, extent: f64, policy: BoundaryPolicy) -> (f64, f64) {
    debug_assert!(position.is_finite());
    match policy {
        BoundaryPolicy::Periodic => {
            if (0.0..extent).contains(&position) {
                (position, velocity)
            } else {
                let wrapped = position.rem_euclid(extent);
                // rem_euclid can round up to the extent itself.
                (if wrapped >= extent { 0.0 } else { wrapped }, velocity)
            }
        }
        BoundaryPolicy::Reflective => {
            let mut p = position;
            let mut v = velocity;
            if p < 0.0 {
                p = -p;
                v = -v;
            } else if p >= extent {
                p = 2.0 * extent - p;
                v = -v;
            }
            if !(0.0..extent).contains(&p) {
                // One mirror cannot recover an overshoot beyond a full arena
                // length; fold the remainder.
                p = p.rem_euclid(extent);
            }
            (p, v)
        }
    }
}
