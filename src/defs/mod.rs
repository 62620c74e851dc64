//! Engine-wide constants.
//!
//! Units: distances are map units, `UNITS_PER_METER` converts to metres for the
//! physics formulas (gravity, drag, friction), angles are degrees and time is
//! nanoseconds unless the name says otherwise.

pub mod flags;

pub use flags::BodyFlags;

/* ───────────────────────────── simulation ───────────────────────────── */

/// 128 Hz simulation.
pub const TICK_NS: u64 = 1_000_000_000 / 128;
pub const TICK_MS: f64 = TICK_NS as f64 / 1_000_000.0;
pub const TICK_S: f64 = TICK_NS as f64 / 1_000_000_000.0;
/// Longest frame fed into the tick loop (avoids the spiral of death).
pub const MIN_MILLIS_PER_FRAME: u64 = 100;
pub const MAX_FRAME_NS: u64 = MIN_MILLIS_PER_FRAME * 1_000_000;
/// Capacity of the simulation event ring buffer.
pub const MAX_EVENTS: usize = 1024;

/* ───────────────────────────── geometry ─────────────────────────────── */

pub const MAX_PORTALS: usize = 100;
pub const INTERSECT_EPSILON: f64 = 1e-10;
pub const VELOCITY_EPSILON: f64 = 1e-15;
pub const MATCH_EPSILON: f64 = 1e-4;
pub const SPLIT_EPSILON: f64 = 1e-6;

/* ───────────────────────────── rendering ────────────────────────────── */

pub const FIELD_OF_VIEW: f64 = 90.0;
pub const MAX_VIEW_DISTANCE: f64 = 10_000.0;
/// World units covered by one texture repeat when a surface is not stretched.
pub const TEXTURE_UNITS: f64 = 64.0;
pub const LIGHT_GRID: f64 = 5.0;
pub const LIGHT_SAFETY: usize = 2;
/// Frames a lightmap texel stays valid before it is recomputed.
pub const MAX_LIGHTMAP_AGE: u64 = 4;

/* ───────────────────────────── world physics ────────────────────────── */

pub const UNITS_PER_METER: f64 = 32.0;
pub const METERS_PER_UNIT: f64 = 1.0 / UNITS_PER_METER;
pub const GRAVITY: f64 = 9.8;
/// Downward velocity (m/s) added every tick while swimming.
pub const GRAVITY_SWIM: f64 = 0.1;
pub const AIR_DENSITY: f64 = 1.293;
pub const SPHERE_DRAG_COEFFICIENT: f64 = 0.47;
pub const SWIM_DAMPING: f64 = 2.0;
/// Longest distance (units) a mob may move between two collision checks.
pub const COLLISION_CHECK: f64 = 2.0;
pub const MAX_COLLISION_STEPS: usize = 10;
pub const DEFAULT_FLOOR_FRICTION: f64 = 0.85;

/* ───────────────────────────── sectors ──────────────────────────────── */

/// Door travel speed in units per second.
pub const DOOR_SPEED: f64 = 100.0;
/// Mobs closer than this to a door's centre keep it open.
pub const DOOR_TRIGGER_DISTANCE: f64 = 100.0;

/* ───────────────────────────── player ───────────────────────────────── */

pub const PLAYER_MASS: f64 = 80.0;
pub const PLAYER_BOUNDING_RADIUS: f64 = 10.0;
pub const PLAYER_HEIGHT: f64 = 40.0;
pub const PLAYER_CROUCH_HEIGHT: f64 = 16.0;
pub const PLAYER_MOUNT_HEIGHT: f64 = 15.0;
pub const PLAYER_WALK_FORCE: f64 = 10.0 * PLAYER_MASS * TICK_MS;
pub const PLAYER_JUMP_FORCE: f64 = 30.0 * PLAYER_MASS * TICK_MS;
pub const PLAYER_SWIM_STRENGTH: f64 = 20.0 * PLAYER_MASS * TICK_MS;
/// Degrees per second.
pub const PLAYER_TURN_SPEED: f64 = 180.0;
/// Ticks of invulnerability after taking damage.
pub const PLAYER_HURT_TIME: u32 = 30;
pub const PLAYER_MAX_HEALTH: f64 = 100.0;

/* ───────────────────────────── dynamics ─────────────────────────────── */

pub const DEFAULT_PROCEDURAL_FREQ: f64 = 4.58;
pub const DEFAULT_PROCEDURAL_DAMPING: f64 = 0.35;
pub const DEFAULT_PROCEDURAL_RESPONSE: f64 = -3.54;
pub const DEFAULT_ANIMATION_DURATION_MS: f64 = 1000.0;
