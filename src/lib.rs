//! 2.5D sector/portal engine: a fixed-timestep simulation of mobs moving
//! through convex-ish rooms, drawn by a portal-walking column renderer.

pub mod config;
pub mod defs;
pub mod logging;
pub mod math;
pub mod renderer;
pub mod sim;
pub mod world;
