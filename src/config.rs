use crate::error::PhysicsError;

#[derive(Clone, Debug, PartialEq)]
pub struct BroadphaseConfig {
    /// How far each dynamic leaf is grown past its tight box.
    /// Moves that stay inside the grown box never touch the tree structure.
    pub margin: f32,
    /// `SpatialIndex::update` checks tree quality every this many calls
    pub rebalance_interval: u32,
    /// The dynamic tree is rebuilt once its height exceeds `max_height_factor * log2(len)`
    pub max_height_factor: f32,
    /// Upper bound on live volumes, `create` fails past it
    pub max_volumes: usize,
}

impl Default for BroadphaseConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BroadphaseConfig {
    pub const DEFAULT: Self = Self {
        margin: 0.1,
        rebalance_interval: 64,
        max_height_factor: 2.0,
        max_volumes: u32::MAX as usize - 1,
    };

    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(PhysicsError::InvalidConfiguration(
                "margin must be finite and non-negative",
            ));
        }

        if self.rebalance_interval == 0 {
            return Err(PhysicsError::InvalidConfiguration(
                "rebalance_interval must be at least 1",
            ));
        }

        if self.max_height_factor.is_nan() || self.max_height_factor < 1.0 {
            return Err(PhysicsError::InvalidConfiguration(
                "max_height_factor must be at least 1",
            ));
        }

        if self.max_volumes == 0 || self.max_volumes >= u32::MAX as usize {
            return Err(PhysicsError::InvalidConfiguration(
                "max_volumes must be in 1..u32::MAX",
            ));
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SolverConfig {
    /// Sequential impulse passes per island and priority level
    pub iterations: usize,
    /// Successive over-relaxation factor applied to every row
    pub sor: f32,
    /// Fraction of positional error corrected per step
    pub erp: f32,
    /// Penetration depth tolerated before positional correction kicks in
    pub linear_slop: f32,
    /// Closing speeds below this bounce with zero restitution
    pub restitution_velocity_threshold: f32,
    /// Solve independent islands on the rayon thread pool
    pub parallel_islands: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl SolverConfig {
    pub const DEFAULT: Self = Self {
        iterations: 10,
        sor: 1.0,
        erp: 0.2,
        linear_slop: 0.0,
        restitution_velocity_threshold: 0.2,
        parallel_islands: true,
    };

    pub fn validate(&self) -> Result<(), PhysicsError> {
        if self.iterations == 0 {
            return Err(PhysicsError::InvalidConfiguration(
                "iterations must be at least 1",
            ));
        }

        if self.sor.is_nan() || self.sor <= 0.0 || self.sor > 2.0 {
            return Err(PhysicsError::InvalidConfiguration("sor must be in (0, 2]"));
        }

        if !(0.0..=1.0).contains(&self.erp) {
            return Err(PhysicsError::InvalidConfiguration("erp must be in [0, 1]"));
        }

        if !self.linear_slop.is_finite() || !self.restitution_velocity_threshold.is_finite() {
            return Err(PhysicsError::InvalidConfiguration(
                "linear_slop and restitution_velocity_threshold must be finite",
            ));
        }

        Ok(())
    }
}
