use std::{hash::Hash, ops::DerefMut};

use log::{debug, trace};
use rayon::prelude::*;

use super::{
    contact_solver_info::ContactSolverInfo, solver_body::SolverBodies,
    typed_constraint::TypedConstraint,
};
use crate::{
    collision::dispatch::simulation_island_manager::{Island, SimulationIslandManager},
    config::SolverConfig,
    dynamics::rigid_body::{BodyState, BodyStore},
    error::PhysicsError,
};

/// What one call to [`IslandSolver::solve`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    pub islands: usize,
    /// Islands with at least one constraint
    pub active_islands: usize,
    /// Constraints that were set up and iterated
    pub solved_constraints: usize,
    /// Constraints whose setup failed, or that touch no dynamic body
    pub skipped_constraints: usize,
}

/// One island's private solver state. Islands share nothing, so they can run on any thread.
struct IslandWork<'a, B, C> {
    bodies: SolverBodies<B>,
    constraints: Vec<&'a mut C>,
}

/// Sequential-impulse solver that runs each island separately, optionally in parallel.
pub struct IslandSolver<B> {
    config: SolverConfig,
    island_manager: SimulationIslandManager<B>,
    islands: Vec<Island<B>>,
}

impl<B: Copy + Eq + Hash> Default for IslandSolver<B> {
    fn default() -> Self {
        Self {
            config: SolverConfig::DEFAULT,
            island_manager: SimulationIslandManager::default(),
            islands: Vec::new(),
        }
    }
}

/// Sets up every constraint of the island, then iterates the ones that succeeded.
///
/// All constraints get `iterations` passes in the first round. Each later round drops the
/// constraints whose priority is below the round number, so a constraint with priority `p`
/// is iterated for `max(p, 1)` rounds. Returns the solved and skipped counts.
fn solve_island<B, C>(
    work: &mut IslandWork<'_, B, C>,
    info: &ContactSolverInfo,
    iterations: usize,
) -> (usize, usize)
where
    B: Copy + Eq + Hash,
    C: DerefMut,
    C::Target: TypedConstraint<B>,
{
    let mut active: Vec<&mut C> = Vec::with_capacity(work.constraints.len());
    let mut skipped = 0;

    for constraint in work.constraints.drain(..) {
        match constraint.setup(&work.bodies, info) {
            Ok(()) => active.push(constraint),
            Err(err) => {
                debug!("Skipping constraint for this step: {err}");
                skipped += 1;
            }
        }
    }

    let solved = active.len();
    let mut current_priority: i32 = 1;
    let mut end = active.len();

    while end > 0 {
        for _ in 0..iterations {
            for constraint in &mut active[..end] {
                constraint.solve(&mut work.bodies, info);
            }
        }

        let Some(next_priority) = current_priority.checked_add(1) else {
            break;
        };
        current_priority = next_priority;

        // sorted by descending priority, so the survivors are a prefix
        end = active[..end].partition_point(|constraint| constraint.priority() >= current_priority);
    }

    (solved, skipped)
}

impl<B: Copy + Eq + Hash + Send + Sync> IslandSolver<B> {
    pub fn new(config: SolverConfig) -> Result<Self, PhysicsError> {
        config.validate()?;

        Ok(Self {
            config,
            ..Default::default()
        })
    }

    #[inline]
    pub const fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Islands from the most recent `solve`.
    #[inline]
    pub fn islands(&self) -> &[Island<B>] {
        &self.islands
    }

    #[inline]
    pub const fn island_step(&self) -> u64 {
        self.island_manager.island_step()
    }

    /// Runs one step over `constraints`.
    ///
    /// Body states are read from `store` up front, and the resulting velocities of dynamic
    /// bodies are written back once every island is done. `extra_bodies` only matter for the
    /// island report; unconstrained bodies keep their velocities.
    pub fn solve<C, S>(
        &mut self,
        constraints: &mut [C],
        extra_bodies: &[B],
        store: &mut S,
        time_step: f32,
    ) -> Result<StepReport, PhysicsError>
    where
        C: DerefMut + Send,
        C::Target: TypedConstraint<B>,
        S: BodyStore<B>,
    {
        if !time_step.is_finite() || time_step <= 0.0 {
            return Err(PhysicsError::InvalidTimeStep(time_step));
        }

        let info = ContactSolverInfo::new(&self.config, time_step);
        let total = constraints.len();

        self.islands = self
            .island_manager
            .build_islands(constraints, extra_bodies, &*store);

        let state_of = |id: B| store.body(id).unwrap_or(BodyState::STATIC);
        let mut slots: Vec<Option<&mut C>> = constraints.iter_mut().map(Some).collect();
        let mut works = Vec::new();

        for island in self.islands.iter().filter(|island| island.is_active()) {
            let mut bodies = SolverBodies::new();
            for &body in &island.bodies {
                bodies.get_or_insert(body, &state_of(body));
            }

            let mut island_constraints = Vec::with_capacity(island.constraints.len());
            for &i in &island.constraints {
                let Some(constraint) = slots[i].take() else {
                    continue;
                };

                // static bodies join every island that references them
                for &body in constraint.bodies() {
                    bodies.get_or_insert(body, &state_of(body));
                }
                island_constraints.push(constraint);
            }

            works.push(IslandWork {
                bodies,
                constraints: island_constraints,
            });
        }

        let iterations = self.config.iterations;
        let results: Vec<(usize, usize)> = if self.config.parallel_islands {
            works
                .par_iter_mut()
                .map(|work| solve_island(work, &info, iterations))
                .collect()
        } else {
            works
                .iter_mut()
                .map(|work| solve_island(work, &info, iterations))
                .collect()
        };

        for work in &works {
            for (id, body) in work.bodies.iter() {
                if body.is_static() {
                    continue;
                }

                store.set_velocity(
                    id,
                    body.linear_velocity + body.delta_linear_velocity,
                    body.angular_velocity + body.delta_angular_velocity,
                );
            }
        }

        let solved_constraints: usize = results.iter().map(|&(solved, _)| solved).sum();
        let report = StepReport {
            islands: self.islands.len(),
            active_islands: works.len(),
            solved_constraints,
            skipped_constraints: total - solved_constraints,
        };

        trace!(
            "Island step {}: {} islands ({} active), {} constraints solved, {} skipped",
            self.island_manager.island_step(),
            report.islands,
            report.active_islands,
            report.solved_constraints,
            report.skipped_constraints
        );

        Ok(report)
    }
}
