pub mod broadphase;
pub mod dispatch;
pub mod narrowphase;
