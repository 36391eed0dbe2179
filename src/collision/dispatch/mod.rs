pub mod simulation_island_manager;
pub mod union_find;
