//! Per-sector behaviour: floors and ceilings, hazards, water and doors.

use glam::DVec3;
use hecs::Entity;

use super::collision::{enter, exit};
use super::components::{Alive, Body};
use super::dynamic::Dynamics;
use super::events::EventKind;
use crate::defs::{
    BodyFlags, DOOR_SPEED, DOOR_TRIGGER_DISTANCE, GRAVITY_SWIM, PLAYER_HURT_TIME,
    PLAYER_JUMP_FORCE, SWIM_DAMPING, TICK_S, UNITS_PER_METER,
};
use crate::world::{DoorState, Map, SectorId, SectorKind};

/* ───────────────────────── floors and ceilings ──────────────────────── */

/// Keep the body between floor and ceiling, or move it through a floor or
/// ceiling that leads to another sector.
pub fn floor_ceiling(
    map: &mut Map,
    dyns: &mut Dynamics,
    e: Entity,
    body: &mut Body,
    events: &mut Vec<EventKind>,
) {
    body.flags.remove(BodyFlags::ON_GROUND);
    let Some(id) = body.sector else {
        return;
    };
    let Some(sector) = map.sector(id) else {
        return;
    };
    let mut pos = dyns.vec3s[body.pos].now;
    let mut vel = dyns.vec3s[body.vel].now;
    let p = pos.truncate();
    let (floor, ceil) = sector.z_at(dyns, p);
    let (floor_target, ceil_target) = (sector.floor_target, sector.ceil_target);
    let (floor_n, ceil_n) = (sector.floor_normal, sector.ceil_normal);

    let mut moved_to: Option<SectorId> = None;

    // ceiling
    match ceil_target.and_then(|t| map.sector(t).map(|s| (t, s))) {
        Some((t, dest)) if pos.z > ceil => {
            let (dest_floor, _) = dest.z_at(dyns, p);
            pos.z = dest_floor + 1.0;
            moved_to = Some(t);
        }
        Some(_) => {}
        None if pos.z + body.height > ceil => {
            let push = ceil_n * (ceil_n.z * (ceil - body.height - pos.z));
            pos += push;
            vel.z = vel.z.min(0.0);
        }
        None => {}
    }

    // floor
    if moved_to.is_none() {
        match floor_target.and_then(|t| map.sector(t).map(|s| (t, s))) {
            Some((t, dest)) if pos.z + body.height < floor => {
                let (_, dest_ceil) = dest.z_at(dyns, p);
                pos.z = dest_ceil - body.height - 1.0;
                moved_to = Some(t);
            }
            // springy floor: launch anything pushing up from it
            Some(_) if pos.z <= floor && vel.z > 0.0 => {
                vel.z = PLAYER_JUMP_FORCE;
            }
            Some(_) => {}
            None if pos.z <= floor => {
                pos += floor_n * (floor_n.z * (floor - pos.z));
                let vn = vel.dot(floor_n);
                if vn < 0.0 {
                    vel -= floor_n * vn;
                }
                body.flags.insert(BodyFlags::ON_GROUND);
            }
            None => {}
        }
    }

    dyns.vec3s[body.pos].now = pos;
    dyns.vec3s[body.vel].now = vel;
    if let Some(t) = moved_to {
        exit(map, e, body, events);
        enter(map, e, body, t, events);
    }
}

/* ───────────────────────── water ────────────────────────────────────── */

/// Damp velocity and sink slowly. Runs before integration.
pub fn swim(dyns: &mut Dynamics, body: &Body) {
    if !body.flags.contains(BodyFlags::SWIMMING) {
        return;
    }
    let vel = &mut dyns.vec3s[body.vel].now;
    *vel *= 1.0 / SWIM_DAMPING;
    vel.z -= GRAVITY_SWIM * UNITS_PER_METER;
}

/* ───────────────────────── damage ───────────────────────────────────── */

/// Deal `amount` unless the mob is still invulnerable from the last hit.
pub fn hurt(e: Entity, alive: &mut Alive, amount: f64, events: &mut Vec<EventKind>) -> bool {
    if alive.hurt_time > 0 || amount <= 0.0 {
        return false;
    }
    alive.health -= amount;
    alive.hurt_time = PLAYER_HURT_TIME;
    log::debug!("{e:?} hurt for {amount}, health {}", alive.health);
    events.push(EventKind::Hurt { mob: e, amount });
    true
}

/// Toxic sectors and painful floor materials.
pub fn hazards(map: &Map, e: Entity, body: &Body, alive: &mut Alive, events: &mut Vec<EventKind>) {
    let Some(sector) = body.sector.and_then(|id| map.sector(id)) else {
        return;
    };
    if let SectorKind::Toxic { hurt: amount } = sector.kind {
        hurt(e, alive, amount, events);
    }
    if body.on_ground() {
        let pain = sector
            .floor
            .material
            .and_then(|m| map.material(m))
            .and_then(|m| m.hurt());
        if let Some(amount) = pain {
            hurt(e, alive, amount, events);
        }
    }
}

/* ───────────────────────── doors ────────────────────────────────────── */

/// Advance every vertical door by one tick. `pos_of` resolves a mob's
/// current position.
pub fn doors(
    map: &mut Map,
    dyns: &mut Dynamics,
    pos_of: impl Fn(Entity) -> Option<DVec3>,
    events: &mut Vec<EventKind>,
) {
    for id in map.sector_ids() {
        let Some(sector) = map.sector(id) else { continue };
        let SectorKind::VerticalDoor { mut state, mut vel_z } = sector.kind else {
            continue;
        };
        let center = sector.center.truncate();
        let triggered = sector
            .pvs_mob
            .iter()
            .chain(std::iter::once(&id))
            .filter_map(|&s| map.sector(s))
            .flat_map(|s| s.mobs.iter())
            .filter_map(|&m| pos_of(m))
            .any(|p| p.truncate().distance(center) <= DOOR_TRIGGER_DISTANCE);

        let before = state;
        if triggered && matches!(state, DoorState::Closed | DoorState::Closing) {
            state = DoorState::Opening;
            vel_z = DOOR_SPEED;
        } else if !triggered && state == DoorState::Open {
            state = DoorState::Closing;
            vel_z = -DOOR_SPEED;
        }
        if state != before {
            log::debug!("door {:?}: {before:?} -> {state:?}", sector.name);
            events.push(EventKind::DoorChanged {
                sector: id,
                opening: state == DoorState::Opening,
            });
        }

        let bottom = dyns.scalars[sector.bottom_z].now;
        let top = &mut dyns.scalars[sector.top_z];
        let old = top.now;
        if vel_z != 0.0 {
            // a raised bottom may sit above the spawn top
            top.now = (top.now + vel_z * TICK_S).min(top.spawn).max(bottom);
            if vel_z > 0.0 && top.now >= top.spawn {
                state = DoorState::Open;
                vel_z = 0.0;
            } else if vel_z < 0.0 && top.now <= bottom {
                state = DoorState::Closed;
                vel_z = 0.0;
            }
        }
        let changed = top.now != old;

        if let Some(sector) = map.sector_mut(id) {
            sector.kind = SectorKind::VerticalDoor { state, vel_z };
            if changed {
                sector.clear_lightmaps();
            }
        }
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::collision::collide;
    use crate::world::{
        Lit, LitSampled, MapBuilder, Material, MaterialKind, PainfulLitSampled, Sampled, Sampler,
        Solid,
    };
    use glam::DVec4;
    use approx::assert_relative_eq;

    fn room(dyns: &mut Dynamics, kind: SectorKind) -> Map {
        let mut b = MapBuilder::new("room", dyns);
        b.sector("a", 0.0, 100.0)
            .rect(0.0, 0.0, 100.0, 100.0)
            .kind(kind)
            .done();
        b.build()
    }

    fn placed(map: &mut Map, dyns: &mut Dynamics, pos: DVec3) -> (Entity, Body) {
        let mut body = Body::new(dyns, pos, 0.0);
        body.height = 20.0;
        let e = hecs::World::new().spawn(());
        collide(map, dyns, e, &mut body, &mut Vec::new());
        (e, body)
    }

    #[test]
    fn floor_stops_a_falling_body() {
        let mut dyns = Dynamics::default();
        let mut map = room(&mut dyns, SectorKind::Plain);
        let (e, mut body) = placed(&mut map, &mut dyns, DVec3::new(50.0, 50.0, 0.0));
        dyns.vec3s[body.pos].now.z = -3.0;
        dyns.vec3s[body.vel].now = DVec3::new(5.0, 0.0, -40.0);

        floor_ceiling(&mut map, &mut dyns, e, &mut body, &mut Vec::new());
        assert!(body.on_ground());
        assert_relative_eq!(dyns.vec3s[body.pos].now.z, 0.0);
        assert_eq!(dyns.vec3s[body.vel].now, DVec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn ceiling_caps_a_rising_body() {
        let mut dyns = Dynamics::default();
        let mut map = room(&mut dyns, SectorKind::Plain);
        let (e, mut body) = placed(&mut map, &mut dyns, DVec3::new(50.0, 50.0, 0.0));
        dyns.vec3s[body.pos].now.z = 90.0;
        dyns.vec3s[body.vel].now = DVec3::new(0.0, 0.0, 30.0);

        floor_ceiling(&mut map, &mut dyns, e, &mut body, &mut Vec::new());
        assert!(!body.on_ground());
        assert_relative_eq!(dyns.vec3s[body.pos].now.z, 80.0);
        assert_eq!(dyns.vec3s[body.vel].now.z, 0.0);
    }

    #[test]
    fn falls_through_an_open_floor() {
        let mut dyns = Dynamics::default();
        let mut b = MapBuilder::new("stack", &mut dyns);
        b.sector("top", 100.0, 200.0)
            .rect(0.0, 0.0, 100.0, 100.0)
            .floor_target("bottom")
            .done();
        b.sector("bottom", 0.0, 100.0)
            .rect(0.0, 0.0, 100.0, 100.0)
            .ceil_target("top")
            .done();
        let mut map = b.build();

        let mut body = Body::new(&mut dyns, DVec3::new(50.0, 50.0, 150.0), 0.0);
        body.height = 20.0;
        let e = hecs::World::new().spawn(());
        collide(&mut map, &mut dyns, e, &mut body, &mut Vec::new());
        assert_eq!(body.sector, Some(0));

        dyns.vec3s[body.pos].now.z = 70.0;
        let mut events = Vec::new();
        floor_ceiling(&mut map, &mut dyns, e, &mut body, &mut events);
        assert_eq!(body.sector, Some(1));
        assert_relative_eq!(dyns.vec3s[body.pos].now.z, 100.0 - 20.0 - 1.0);
        assert_eq!(events.len(), 2);

        dyns.vec3s[body.pos].now.z = 101.0;
        floor_ceiling(&mut map, &mut dyns, e, &mut body, &mut events);
        assert_eq!(body.sector, Some(0));
        assert_relative_eq!(dyns.vec3s[body.pos].now.z, 101.0);
    }

    #[test]
    fn springy_floor_launches_a_rising_body() {
        let mut dyns = Dynamics::default();
        let mut b = MapBuilder::new("stack", &mut dyns);
        b.sector("top", 100.0, 200.0)
            .rect(0.0, 0.0, 100.0, 100.0)
            .floor_target("bottom")
            .done();
        b.sector("bottom", 0.0, 100.0)
            .rect(0.0, 0.0, 100.0, 100.0)
            .ceil_target("top")
            .done();
        let mut map = b.build();
        let (e, mut body) = placed(&mut map, &mut dyns, DVec3::new(50.0, 50.0, 100.0));
        assert_eq!(body.sector, Some(0));

        dyns.vec3s[body.vel].now = DVec3::new(0.0, 0.0, 1.0);
        floor_ceiling(&mut map, &mut dyns, e, &mut body, &mut Vec::new());
        assert_eq!(dyns.vec3s[body.vel].now.z, PLAYER_JUMP_FORCE);
        assert_eq!(body.sector, Some(0));

        // falling onto it is not a bounce
        dyns.vec3s[body.vel].now = DVec3::new(0.0, 0.0, -1.0);
        floor_ceiling(&mut map, &mut dyns, e, &mut body, &mut Vec::new());
        assert_eq!(dyns.vec3s[body.vel].now.z, -1.0);
    }

    #[test]
    fn door_with_a_raised_bottom_stays_put() {
        let mut dyns = Dynamics::default();
        let mut map = room(
            &mut dyns,
            SectorKind::VerticalDoor {
                state: DoorState::Opening,
                vel_z: DOOR_SPEED,
            },
        );
        let (top, bottom) = (map.sectors[0].top_z, map.sectors[0].bottom_z);
        dyns.scalars[bottom].set_now(150.0);
        let pos_of = |_: Entity| Some(DVec3::new(50.0, 50.0, 0.0));

        doors(&mut map, &mut dyns, pos_of, &mut Vec::new());
        assert_eq!(dyns.scalars[top].now, 150.0);
        assert!(matches!(
            map.sectors[0].kind,
            SectorKind::VerticalDoor { state: DoorState::Open, .. }
        ));

        map.sectors[0].kind = SectorKind::VerticalDoor {
            state: DoorState::Closing,
            vel_z: -DOOR_SPEED,
        };
        doors(&mut map, &mut dyns, |_| None, &mut Vec::new());
        assert_eq!(dyns.scalars[top].now, 150.0);
        assert!(matches!(
            map.sectors[0].kind,
            SectorKind::VerticalDoor { state: DoorState::Closed, .. }
        ));
    }

    #[test]
    fn swimming_damps_and_sinks() {
        let mut dyns = Dynamics::default();
        let mut map = room(&mut dyns, SectorKind::Underwater);
        let (_, body) = placed(&mut map, &mut dyns, DVec3::new(50.0, 50.0, 10.0));
        assert!(body.flags.contains(BodyFlags::SWIMMING));
        dyns.vec3s[body.vel].now = DVec3::new(20.0, 0.0, 0.0);
        swim(&mut dyns, &body);
        let vel = dyns.vec3s[body.vel].now;
        assert_relative_eq!(vel.x, 10.0);
        assert_relative_eq!(vel.z, -GRAVITY_SWIM * UNITS_PER_METER);
    }

    #[test]
    fn toxic_damage_is_gated() {
        let mut dyns = Dynamics::default();
        let mut map = room(&mut dyns, SectorKind::Toxic { hurt: 5.0 });
        let (e, body) = placed(&mut map, &mut dyns, DVec3::new(50.0, 50.0, 0.0));
        let mut alive = Alive::new(100.0);
        let mut events = Vec::new();
        hazards(&map, e, &body, &mut alive, &mut events);
        hazards(&map, e, &body, &mut alive, &mut events);
        assert_eq!(alive.health, 95.0);
        assert_eq!(alive.hurt_time, PLAYER_HURT_TIME);
        assert_eq!(events, vec![EventKind::Hurt { mob: e, amount: 5.0 }]);
    }

    #[test]
    fn painful_floor_hurts_only_when_standing() {
        let mut dyns = Dynamics::default();
        let mut b = MapBuilder::new("lava", &mut dyns);
        let lava = b.material(Material::new(
            "lava",
            MaterialKind::PainfulLitSampled(PainfulLitSampled {
                lit_sampled: LitSampled {
                    lit: Lit::default(),
                    sampled: Sampled {
                        sampler: Sampler::Solid(Solid { color: DVec4::ONE }),
                        is_liquid: false,
                    },
                },
                hurt: 7.0,
            }),
        ));
        b.sector("a", 0.0, 100.0)
            .rect(0.0, 0.0, 100.0, 100.0)
            .floor_material(lava)
            .done();
        let mut map = b.build();
        let (e, mut body) = placed(&mut map, &mut dyns, DVec3::new(50.0, 50.0, 30.0));
        let mut alive = Alive::new(100.0);
        let mut events = Vec::new();

        hazards(&map, e, &body, &mut alive, &mut events);
        assert_eq!(alive.health, 100.0);

        body.flags.insert(BodyFlags::ON_GROUND);
        hazards(&map, e, &body, &mut alive, &mut events);
        assert_eq!(alive.health, 93.0);
    }

    #[test]
    fn door_cycle() {
        let mut dyns = Dynamics::default();
        let mut map = room(
            &mut dyns,
            SectorKind::VerticalDoor {
                state: DoorState::Closed,
                vel_z: 0.0,
            },
        );
        let top = map.sectors[0].top_z;
        dyns.scalars[top].spawn = 80.0;
        dyns.scalars[top].set_now(0.0);

        let (e, _) = placed(&mut map, &mut dyns, DVec3::new(50.0, 50.0, 0.0));
        let near = std::cell::Cell::new(true);
        let pos_of = |m: Entity| (m == e && near.get()).then_some(DVec3::new(50.0, 0.0, 0.0));
        let mut events = Vec::new();

        doors(&mut map, &mut dyns, &pos_of, &mut events);
        assert_eq!(
            map.sectors[0].kind,
            SectorKind::VerticalDoor {
                state: DoorState::Opening,
                vel_z: DOOR_SPEED
            }
        );
        assert_eq!(events, vec![EventKind::DoorChanged { sector: 0, opening: true }]);

        let mut ticks = 0;
        while dyns.scalars[top].now < 80.0 {
            doors(&mut map, &mut dyns, &pos_of, &mut events);
            ticks += 1;
            assert!(ticks < 200);
        }
        assert!(matches!(
            map.sectors[0].kind,
            SectorKind::VerticalDoor { state: DoorState::Open, .. }
        ));

        near.set(false);
        doors(&mut map, &mut dyns, &pos_of, &mut events);
        assert!(matches!(
            map.sectors[0].kind,
            SectorKind::VerticalDoor { state: DoorState::Closing, .. }
        ));
        while dyns.scalars[top].now > 0.0 {
            doors(&mut map, &mut dyns, &pos_of, &mut events);
        }
        assert_eq!(
            map.sectors[0].kind,
            SectorKind::VerticalDoor {
                state: DoorState::Closed,
                vel_z: 0.0
            }
        );
    }
}
