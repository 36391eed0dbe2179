pub mod constraint_solver;
pub mod discrete_dynamics_world;
pub mod rigid_body;
