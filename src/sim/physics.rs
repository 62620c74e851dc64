//! Force integration for mob bodies.
//!
//! Forces are Newtons, velocity is units per second. Formulas run in metres and
//! convert back with [`UNITS_PER_METER`].

use std::f64::consts::PI;

use glam::DVec3;
use hecs::Entity;

use super::collision::{Contacts, collide};
use super::components::Body;
use super::dynamic::Dynamics;
use super::events::EventKind;
use crate::defs::{
    AIR_DENSITY, BodyFlags, COLLISION_CHECK, GRAVITY, MAX_COLLISION_STEPS, METERS_PER_UNIT,
    SPHERE_DRAG_COEFFICIENT, TICK_S, UNITS_PER_METER, VELOCITY_EPSILON,
};
use crate::world::Map;

/// `-½ ρ A Cd |v| v` for a sphere of `radius` units moving at `vel_m` m/s.
pub fn drag(radius: f64, vel_m: DVec3) -> DVec3 {
    let r = radius * METERS_PER_UNIT;
    let area = PI * r * r;
    -0.5 * AIR_DENSITY * area * SPHERE_DRAG_COEFFICIENT * vel_m.length() * vel_m
}

/// Kinetic friction against a floor with normal `n`, opposing `vel_m`.
pub fn friction(mu: f64, n: DVec3, mass: f64, vel_m: DVec3) -> DVec3 {
    let weight = DVec3::new(0.0, 0.0, -GRAVITY * mass);
    -mu * n.dot(weight).abs() * vel_m
}

/// Number of position substeps so no single step moves further than
/// [`COLLISION_CHECK`].
pub fn substeps(vel: DVec3) -> usize {
    let dist = vel.length() * TICK_S;
    ((dist / COLLISION_CHECK).ceil() as usize).clamp(1, MAX_COLLISION_STEPS)
}

/// Apply forces, move the body in substeps and collide after each.
pub fn integrate(
    map: &mut Map,
    dyns: &mut Dynamics,
    e: Entity,
    body: &mut Body,
    events: &mut Vec<EventKind>,
) -> Contacts {
    let mut contacts = Contacts::new();
    if body.removed() || !body.flags.contains(BodyFlags::ACTIVE) {
        return contacts;
    }

    /* -- forces --------------------------------------------------- */
    if !body.is_kinematic() {
        let vel_m = dyns.vec3s[body.vel].now * METERS_PER_UNIT;
        if !body.flags.contains(BodyFlags::SWIMMING) {
            body.force.z -= GRAVITY * body.mass;
        }
        body.force += drag(body.radius, vel_m);
        if body.on_ground() {
            if let Some(s) = body.sector.and_then(|id| map.sector(id)) {
                body.force += friction(s.floor_friction, s.floor_normal, body.mass, vel_m);
            }
        }
        dyns.vec3s[body.vel].now += body.force * TICK_S / body.mass * UNITS_PER_METER;
    }
    body.force = DVec3::ZERO;

    /* -- move ----------------------------------------------------- */
    let vel = dyns.vec3s[body.vel].now;
    if vel.length_squared() <= VELOCITY_EPSILON {
        if body.sector.is_none() {
            contacts.extend(collide(map, dyns, e, body, events));
        }
        return contacts;
    }
    let steps = substeps(vel);
    let dt = TICK_S / steps as f64;
    for _ in 0..steps {
        let v = dyns.vec3s[body.vel].now;
        dyns.vec3s[body.pos].now += v * dt;
        contacts.extend(collide(map, dyns, e, body, events));
        if body.removed() {
            break;
        }
    }
    contacts
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
