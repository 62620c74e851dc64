pub mod animation;
pub mod collision;
pub mod components;
pub mod dynamic;
pub mod events;
mod game;
pub mod mob;
pub mod physics;
pub mod sectors;
pub mod systems;
mod tic;

pub use animation::{Animation, Coordinates, Lifetime};
pub use components::{Alive, Body, CollisionResponse, InputCmd, Light, Player, player_body};
pub use dynamic::{Dyn, DynamicStore, DynamicValue, Dynamics, Procedural};
pub use events::{Event, EventKind, EventQueue, Timers};
pub use game::{Game, Level};
pub use tic::{Clock, ManualClock, Simulation, SystemClock, TickHandler};
