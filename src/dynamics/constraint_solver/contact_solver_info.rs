use crate::config::SolverConfig;

/// Per-step solver parameters handed to every constraint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactSolverInfo {
    pub time_step: f32,
    pub sor: f32,
    pub erp: f32,
    pub linear_slop: f32,
    pub restitution_velocity_threshold: f32,
}

impl Default for ContactSolverInfo {
    fn default() -> Self {
        Self::new(&SolverConfig::DEFAULT, Self::DEFAULT_TIME_STEP)
    }
}

impl ContactSolverInfo {
    pub const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;

    pub const fn new(config: &SolverConfig, time_step: f32) -> Self {
        Self {
            time_step,
            sor: config.sor,
            erp: config.erp,
            linear_slop: config.linear_slop,
            restitution_velocity_threshold: config.restitution_velocity_threshold,
        }
    }

    #[inline]
    pub fn inv_time_step(&self) -> f32 {
        1.0 / self.time_step
    }
}
