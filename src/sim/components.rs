use glam::{DVec3, DVec4};
use serde::{Deserialize, Serialize};

use super::dynamic::{Dyn, DynamicValue, Dynamics};
use crate::defs::{
    BodyFlags, PLAYER_BOUNDING_RADIUS, PLAYER_HEIGHT, PLAYER_MASS, PLAYER_MAX_HEALTH,
    PLAYER_MOUNT_HEIGHT,
};
use crate::world::{LightSource, SectorId};

/// What happens to velocity after a mob hits a wall.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionResponse {
    /// Drop the into-wall part of the velocity.
    #[default]
    Slide,
    /// Reflect velocity about the wall normal.
    Bounce,
    /// Zero horizontal velocity.
    Stop,
    /// Detach from the world and despawn.
    Remove,
}

/// Physical presence of a mob. Kinematic state lives in the simulation's
/// dynamic stores so it is snapshotted and interpolated with everything else.
#[derive(Clone, Debug)]
pub struct Body {
    pub pos: Dyn<DVec3>,
    /// Units per second.
    pub vel: Dyn<DVec3>,
    /// Heading in degrees.
    pub angle: Dyn<f64>,
    /// Newtons, cleared after every tick.
    pub force: DVec3,
    pub radius: f64,
    /// Kilograms; 0 makes the body kinematic.
    pub mass: f64,
    pub height: f64,
    /// Tallest step the body can climb.
    pub mount_height: f64,
    pub flags: BodyFlags,
    pub sector: Option<SectorId>,
    pub response: CollisionResponse,
    /// Overrides `response` when set.
    pub response_fn: Option<fn(&Body) -> CollisionResponse>,
}

impl Body {
    pub fn new(dyns: &mut Dynamics, pos: DVec3, angle: f64) -> Self {
        Self {
            pos: dyns.vec3s.spawn(pos),
            vel: dyns.vec3s.spawn(DVec3::ZERO),
            angle: dyns.scalars.insert(DynamicValue::new_angle(angle)),
            force: DVec3::ZERO,
            radius: PLAYER_BOUNDING_RADIUS,
            mass: 0.0,
            height: 0.0,
            mount_height: PLAYER_MOUNT_HEIGHT,
            flags: BodyFlags::ACTIVE,
            sector: None,
            response: CollisionResponse::Slide,
            response_fn: None,
        }
    }

    #[inline]
    pub fn is_kinematic(&self) -> bool {
        self.mass <= 0.0
    }

    #[inline]
    pub fn response(&self) -> CollisionResponse {
        self.response_fn.map_or(self.response, |f| f(self))
    }

    #[inline]
    pub fn on_ground(&self) -> bool {
        self.flags.contains(BodyFlags::ON_GROUND)
    }

    #[inline]
    pub fn removed(&self) -> bool {
        self.flags.contains(BodyFlags::REMOVED)
    }

    /// Return the dynamic slots to the stores.
    pub fn release(&self, dyns: &mut Dynamics) {
        dyns.vec3s.remove(self.pos);
        dyns.vec3s.remove(self.vel);
        dyns.scalars.remove(self.angle);
    }
}

/// Anything that can be hurt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Alive {
    pub health: f64,
    /// Ticks of invulnerability left.
    pub hurt_time: u32,
}

impl Alive {
    pub fn new(health: f64) -> Self {
        Self {
            health,
            hurt_time: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Player {
    /// View bob phase in degrees.
    pub bob: f64,
    pub crouching: bool,
    /// RGBA blended over the frame.
    pub frame_tint: DVec4,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            bob: 0.0,
            crouching: false,
            frame_tint: DVec4::ZERO,
        }
    }
}

/// Point light carried by a mob.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub diffuse: DVec3,
    pub strength: f64,
    pub range: f64,
}

impl Light {
    pub fn source(&self, pos: DVec3) -> LightSource {
        LightSource {
            pos,
            diffuse: self.diffuse,
            strength: self.strength,
            range: self.range,
        }
    }
}

/// Player intent for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InputCmd {
    pub forward: f64, // -1 … +1
    pub strafe: f64,  // -1 … +1  (left / right)
    pub turn: f64,    // -1 … +1  (right / left)
    pub jump: bool,
    pub crouch: bool,
}

/// Body set up with the player's proportions.
pub fn player_body(dyns: &mut Dynamics, pos: DVec3, angle: f64) -> (Body, Alive, Player) {
    let mut body = Body::new(dyns, pos, angle);
    body.mass = PLAYER_MASS;
    body.height = PLAYER_HEIGHT;
    body.radius = PLAYER_BOUNDING_RADIUS;
    body.mount_height = PLAYER_MOUNT_HEIGHT;
    (body, Alive::new(PLAYER_MAX_HEALTH), Player::default())
}
