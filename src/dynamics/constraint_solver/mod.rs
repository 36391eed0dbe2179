pub mod contact_constraint;
pub mod contact_solver_info;
pub mod point_to_point_constraint;
pub mod sequential_impulse_constraint_solver;
pub mod solver_body;
pub mod solver_constraint;
pub mod typed_constraint;
