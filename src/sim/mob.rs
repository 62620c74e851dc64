//! Mob lifecycle: spawn from map data, capture back, despawn.

use glam::DVec3;
use hecs::{Entity, World};

use super::collision::collide;
use super::components::{Alive, Body, Light, Player};
use super::dynamic::Dynamics;
use super::events::EventKind;
use crate::defs::{PLAYER_HEIGHT, PLAYER_MASS, PLAYER_MOUNT_HEIGHT};
use crate::world::serial::LightData;
use crate::world::{Map, MobData, MobKindData, SectorId};

/// Create the entity described by `data` and place it in the map.
pub fn spawn_mob(
    world: &mut World,
    map: &mut Map,
    dyns: &mut Dynamics,
    data: &MobData,
    events: &mut Vec<EventKind>,
) -> Entity {
    let mut body = Body::new(dyns, data.pos, data.angle);
    dyns.vec3s[body.vel].set_all(data.vel);
    body.radius = data.bounding_radius;
    body.mass = data.mass;
    body.height = data.height;
    body.mount_height = data.mount_height;
    body.response = data.collision_response;

    let e = match data.kind {
        MobKindData::Mob => world.spawn((body,)),
        MobKindData::AliveMob { health } => world.spawn((body, Alive::new(health))),
        MobKindData::Player { health } => {
            if body.mass <= 0.0 {
                body.mass = PLAYER_MASS;
            }
            if body.height <= 0.0 {
                body.height = PLAYER_HEIGHT;
            }
            if body.mount_height <= 0.0 {
                body.mount_height = PLAYER_MOUNT_HEIGHT;
            }
            world.spawn((body, Alive::new(health), Player::default()))
        }
    };
    if let Some(l) = data.light {
        let light = Light {
            diffuse: l.diffuse,
            strength: l.strength,
            range: l.range,
        };
        // the entity was just spawned
        let _ = world.insert_one(e, light);
    }

    if let Ok(body) = world.query_one_mut::<&mut Body>(e) {
        collide(map, dyns, e, body, events);
    }
    log::debug!("spawned {:?} as {e:?}", data.kind);
    e
}

/// Serialisable snapshot of a live mob.
pub fn capture_mob(world: &World, dyns: &Dynamics, e: Entity) -> Option<MobData> {
    let mut q = world
        .query_one::<(&Body, Option<&Alive>, Option<&Player>, Option<&Light>)>(e)
        .ok()?;
    let (body, alive, player, light) = q.get()?;
    let health = alive.map_or(0.0, |a| a.health);
    let kind = match (player, alive) {
        (Some(_), _) => MobKindData::Player { health },
        (None, Some(_)) => MobKindData::AliveMob { health },
        (None, None) => MobKindData::Mob,
    };
    Some(MobData {
        kind,
        pos: dyns.vec3s.get(body.pos)?.now,
        vel: dyns.vec3s.get(body.vel)?.now,
        angle: dyns.scalars.get(body.angle)?.now,
        bounding_radius: body.radius,
        mass: body.mass,
        height: body.height,
        mount_height: body.mount_height,
        collision_response: body.response,
        light: light.map(|l| LightData {
            diffuse: l.diffuse,
            strength: l.strength,
            range: l.range,
        }),
    })
}

/// Everything standing in `sector`, in entity order.
pub fn capture_sector_mobs(world: &World, map: &Map, dyns: &Dynamics, sector: SectorId) -> Vec<MobData> {
    map.sector(sector)
        .map(|s| {
            s.mobs
                .iter()
                .filter_map(|&e| capture_mob(world, dyns, e))
                .collect()
        })
        .unwrap_or_default()
}

/// Remove the entity and everything it owns in the map and dynamic stores.
pub fn despawn_mob(world: &mut World, map: &mut Map, dyns: &mut Dynamics, e: Entity) {
    if let Ok(body) = world.get::<&Body>(e) {
        if let Some(s) = body.sector.and_then(|id| map.sector_mut(id)) {
            s.mobs.remove(&e);
        }
        body.release(dyns);
    }
    if world.despawn(e).is_err() {
        log::warn!("despawn of unknown entity {e:?}");
    }
}

/// Position of `e`, if it is a live mob.
pub fn mob_pos(world: &World, dyns: &Dynamics, e: Entity) -> Option<DVec3> {
    let body = world.get::<&Body>(e).ok()?;
    dyns.vec3s.get(body.pos).map(|v| v.now)
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
