//! Wall collision and sector membership.
//!
//! [`collide`] runs after every position substep:
//!
//! 1. no sector yet: adopt the containing (or nearest) sector;
//! 2. push back from walls and from portals the body does not fit through;
//! 3. left the sector through a portal: move to the adjacent sector;
//! 4. left it any other way: adopt a sector that contains and fits the body,
//!    else push it back against the walls of every sector it fits in, else
//!    snap to the nearest sector centre.

use glam::{DVec2, DVec3};
use hecs::Entity;
use smallvec::SmallVec;

use super::components::{Body, CollisionResponse};
use super::dynamic::Dynamics;
use super::events::EventKind;
use crate::defs::{BodyFlags, INTERSECT_EPSILON};
use crate::math::with_xy;
use crate::world::{Map, Sector, SectorId, SectorKind, Segment};

/// One wall the body was pushed away from. `normal` points from the wall
/// towards the body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    pub sector: SectorId,
    pub segment: usize,
    pub normal: DVec2,
}

pub type Contacts = SmallVec<[Contact; 4]>;

/* ─────────────────────────  vertical fit  ───────────────────────────── */

/// Can a body at `pos` stand in `sector` at that spot? Steps up to
/// `mount_height` count as fitting.
pub fn fits(sector: &Sector, dyns: &Dynamics, body: &Body, pos: DVec3) -> bool {
    let (floor, ceil) = sector.z_at(dyns, pos.truncate());
    floor <= pos.z + body.mount_height && pos.z + body.height < ceil
}

/* ─────────────────────────  push back  ──────────────────────────────── */

/// Move `pos` to `radius` from `seg`, on the owning sector's side. Returns
/// the push direction, or `None` when the body does not touch the segment.
pub fn push_back(seg: &Segment, pos: &mut DVec3, radius: f64) -> Option<DVec2> {
    let p = pos.truncate();
    if seg.distance_to_point2(p) >= radius * radius {
        return None;
    }
    let closest = seg.closest_to_point(p);
    let delta = p - closest;
    let d = delta.length();
    let inward = if d <= INTERSECT_EPSILON {
        -seg.normal
    } else if seg.which_side(p) <= 0.0 {
        delta / d
    } else {
        -delta / d
    };
    *pos = with_xy(*pos, closest + inward * radius);
    Some(inward)
}

/* ─────────────────────────  membership  ─────────────────────────────── */

pub fn enter(map: &mut Map, e: Entity, body: &mut Body, id: SectorId, events: &mut Vec<EventKind>) {
    let Some(sector) = map.sector_mut(id) else {
        return;
    };
    sector.mobs.insert(e);
    body.sector = Some(id);
    if sector.kind == SectorKind::Underwater {
        body.flags.insert(BodyFlags::SWIMMING);
    }
    log::trace!("{e:?} entered {:?}", sector.name);
    events.push(EventKind::SectorEntered { mob: e, sector: id });
}

pub fn exit(map: &mut Map, e: Entity, body: &mut Body, events: &mut Vec<EventKind>) {
    let Some(id) = body.sector.take() else {
        return;
    };
    body.flags.remove(BodyFlags::SWIMMING);
    if let Some(sector) = map.sector_mut(id) {
        sector.mobs.remove(&e);
        log::trace!("{e:?} left {:?}", sector.name);
    }
    events.push(EventKind::SectorExited { mob: e, sector: id });
}

/// Detach from every sector and mark for despawn at the end of the tick.
pub fn remove(map: &mut Map, e: Entity, body: &mut Body, events: &mut Vec<EventKind>) {
    if body.removed() {
        return;
    }
    for s in &mut map.sectors {
        s.mobs.remove(&e);
    }
    body.sector = None;
    body.flags.insert(BodyFlags::REMOVED);
    body.flags.remove(BodyFlags::ACTIVE);
    events.push(EventKind::MobRemoved { mob: e });
}

/* ─────────────────────────  collide  ────────────────────────────────── */

/// Resolve walls and sector membership for the body's current position.
pub fn collide(
    map: &mut Map,
    dyns: &mut Dynamics,
    e: Entity,
    body: &mut Body,
    events: &mut Vec<EventKind>,
) -> Contacts {
    let mut contacts = Contacts::new();
    if body.removed() {
        return contacts;
    }
    let mut pos = dyns.vec3s[body.pos].now;

    // 1: not placed yet
    let Some(id) = body.sector.filter(|&id| map.sector(id).is_some()) else {
        if let Some(id) = map.nearest_sector(pos.truncate()) {
            let s = &map.sectors[id as usize];
            if !s.is_point_inside_2d(pos.truncate()) {
                pos = with_xy(pos, s.center.truncate());
            }
            let (floor, ceil) = s.z_at(dyns, pos.truncate());
            pos.z = pos.z.min(ceil - body.height).max(floor);
            dyns.vec3s[body.pos].now = pos;
            enter(map, e, body, id, events);
        }
        return contacts;
    };

    // 2: walls, and portals too small to pass
    for (i, seg) in map.sectors[id as usize].segments.iter().enumerate() {
        let passable = seg
            .adjacent_sector
            .and_then(|adj| map.sector(adj))
            .is_some_and(|adj| fits(adj, dyns, body, pos));
        if passable {
            continue;
        }
        if let Some(normal) = push_back(seg, &mut pos, body.radius) {
            contacts.push(Contact {
                sector: id,
                segment: i,
                normal,
            });
        }
    }
    dyns.vec3s[body.pos].now = pos;
    respond(map, dyns, e, body, &contacts, events);
    if body.removed() {
        return contacts;
    }

    let sector = &map.sectors[id as usize];
    let p = pos.truncate();
    if sector.is_point_inside_2d(p) {
        return contacts;
    }

    // 3: through a portal
    let through = sector.segments.iter().find_map(|seg| {
        let adj = seg.adjacent_sector?;
        let s = map.sector(adj)?;
        (s.is_point_inside_2d(p) && fits(s, dyns, body, pos)).then_some(adj)
    });
    if let Some(adj) = through {
        exit(map, e, body, events);
        enter(map, e, body, adj, events);
        return contacts;
    }

    // 4: lost
    let fallback = map
        .sectors
        .iter()
        .position(|s| s.is_point_inside_2d(p) && fits(s, dyns, body, pos))
        .map(|i| i as SectorId);
    if let Some(other) = fallback {
        log::debug!("{e:?} jumped from {:?} to {:?}", sector.name, map.sectors[other as usize].name);
        exit(map, e, body, events);
        enter(map, e, body, other, events);
        return contacts;
    }
    let start = pos;
    let before = contacts.len();
    for (i, s) in (0..).zip(&map.sectors) {
        if !fits(s, dyns, body, start) {
            continue;
        }
        for (j, seg) in s.segments.iter().enumerate() {
            if let Some(normal) = push_back(seg, &mut pos, body.radius) {
                contacts.push(Contact {
                    sector: i,
                    segment: j,
                    normal,
                });
            }
        }
    }
    dyns.vec3s[body.pos].now = pos;
    respond(map, dyns, e, body, &contacts[before..], events);
    if body.removed() {
        return contacts;
    }

    let p = pos.truncate();
    let settled = if map.sectors[id as usize].is_point_inside_2d(p) {
        Some(id)
    } else {
        map.sectors
            .iter()
            .position(|s| s.is_point_inside_2d(p) && fits(s, dyns, body, pos))
            .map(|i| i as SectorId)
    };
    if let Some(found) = settled {
        if found != id {
            exit(map, e, body, events);
            enter(map, e, body, found, events);
        }
        return contacts;
    }

    if !body.flags.contains(BodyFlags::LOST_WARNED) {
        body.flags.insert(BodyFlags::LOST_WARNED);
        log::warn!(
            "{e:?} escaped {:?} at {pos}, snapping to nearest sector",
            map.sectors[id as usize].name
        );
    }
    if let Some(near) = map.nearest_sector(p) {
        let center = map.sectors[near as usize].center;
        let (floor, _) = map.sectors[near as usize].z_at(dyns, center.truncate());
        dyns.vec3s[body.pos].now = center.truncate().extend(pos.z.max(floor));
        if near != id {
            exit(map, e, body, events);
            enter(map, e, body, near, events);
        }
    }
    contacts
}

/// Apply the body's collision response to its velocity.
fn respond(
    map: &mut Map,
    dyns: &mut Dynamics,
    e: Entity,
    body: &mut Body,
    contacts: &[Contact],
    events: &mut Vec<EventKind>,
) {
    if contacts.is_empty() {
        return;
    }
    let vel = &mut dyns.vec3s[body.vel].now;
    match body.response() {
        CollisionResponse::Slide => {
            for c in contacts {
                let vn = vel.truncate().dot(c.normal);
                if vn < 0.0 {
                    *vel -= (c.normal * vn).extend(0.0);
                }
            }
        }
        CollisionResponse::Bounce => {
            for c in contacts {
                let vn = vel.truncate().dot(c.normal);
                if vn < 0.0 {
                    *vel -= (c.normal * (2.0 * vn)).extend(0.0);
                }
            }
        }
        CollisionResponse::Stop => {
            vel.x = 0.0;
            vel.y = 0.0;
        }
        CollisionResponse::Remove => remove(map, e, body, events),
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
