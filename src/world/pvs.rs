//! Potentially visible sets.
//!
//! `pvs` bounds renderer recursion and lightmap refresh, `pvs_mob` bounds which
//! sectors' mobs are ticked, `pvl` lists the lights that can reach a sector.

use std::collections::BTreeSet;

use glam::DVec2;
use hecs::Entity;

use super::{Map, SectorId};

/// Rebuild `pvs` and `pvs_mob` for every sector.
pub fn rebuild(map: &mut Map) {
    for id in map.sector_ids() {
        let pvs = build_pvs(map, id);
        let mob = build_mob_pvs(map, id);
        if let Some(s) = map.sector_mut(id) {
            s.pvs = pvs;
            s.pvs_mob = mob;
        }
    }
}

/// Depth-first walk through portals whose vertical span overlaps `target`'s.
pub fn build_pvs(map: &Map, target: SectorId) -> BTreeSet<SectorId> {
    let mut visible = BTreeSet::new();
    if map.sector(target).is_some() {
        visit(map, target, target, &mut visible);
    }
    visible
}

fn visit(map: &Map, target: SectorId, visitor: SectorId, visible: &mut BTreeSet<SectorId>) {
    if visitor != target && map.pvs_occlusion && occluded_by(map, target, visitor) {
        return;
    }
    visible.insert(visitor);
    let (Some(t), Some(v)) = (map.sector(target), map.sector(visitor)) else {
        return;
    };
    for seg in &v.segments {
        let Some(adj_id) = seg.adjacent_sector else {
            continue;
        };
        if visible.contains(&adj_id) {
            continue;
        }
        let Some(adj) = map.sector(adj_id) else {
            continue;
        };
        if adj.min.z >= t.max.z || adj.max.z <= t.min.z {
            continue;
        }
        visit(map, target, adj_id, visible);
    }
}

/// `visitor` is hidden from `target` when, for every pair of their edges, some
/// solid wall of a third sector crosses both lines joining the edge endpoints.
pub fn occluded_by(map: &Map, target: SectorId, visitor: SectorId) -> bool {
    let (Some(t), Some(v)) = (map.sector(target), map.sector(visitor)) else {
        return false;
    };
    for vseg in &v.segments {
        for oseg in &t.segments {
            if oseg.matches(vseg) {
                continue;
            }
            let (l1a, l2a) = (oseg.p, oseg.end);
            let (mut l1b, mut l2b) = (vseg.p, vseg.end);
            if oseg.normal.dot(vseg.normal) < 0.0 {
                std::mem::swap(&mut l1b, &mut l2b);
            }
            if !blocked(map, target, visitor, (l1a, l1b), (l2a, l2b)) {
                return false;
            }
        }
    }
    true
}

fn blocked(
    map: &Map,
    target: SectorId,
    visitor: SectorId,
    l1: (DVec2, DVec2),
    l2: (DVec2, DVec2),
) -> bool {
    map.sectors
        .iter()
        .enumerate()
        .filter(|&(i, _)| i as SectorId != target && i as SectorId != visitor)
        .flat_map(|(_, s)| s.segments.iter())
        .filter(|seg| !seg.is_portal())
        .any(|seg| seg.intersect(l1.0, l1.1).is_some() && seg.intersect(l2.0, l2.1).is_some())
}

/// Flood fill through open portals, keeping to the side picked by the first hop.
pub fn build_mob_pvs(map: &Map, target: SectorId) -> BTreeSet<SectorId> {
    let mut set = BTreeSet::new();
    set.insert(target);
    mob_visit(map, target, None, &mut set);
    set
}

fn mob_visit(map: &Map, visitor: SectorId, dir: Option<DVec2>, set: &mut BTreeSet<SectorId>) {
    let Some(v) = map.sector(visitor) else {
        return;
    };
    for seg in &v.segments {
        let (Some(adj_id), Some(adj_seg)) = (seg.adjacent_sector, seg.adjacent_segment) else {
            continue;
        };
        let walled = map
            .sector(adj_id)
            .and_then(|a| a.segments.get(adj_seg))
            .is_none_or(|a| a.mid.material.is_some());
        if walled {
            continue;
        }
        let same_side = dir.is_none_or(|n| n.dot(seg.normal) >= 0.0);
        if !same_side || !set.insert(adj_id) {
            continue;
        }
        mob_visit(map, adj_id, Some(dir.unwrap_or(seg.normal)), set);
    }
}

/// Fill each sector's `pvl` with the light entities found in its PVS.
pub fn collect_lights(map: &mut Map, is_light: impl Fn(Entity) -> bool) {
    let lights: Vec<Vec<Entity>> = map
        .sectors
        .iter()
        .map(|s| s.mobs.iter().copied().filter(|&e| is_light(e)).collect())
        .collect();
    for s in &mut map.sectors {
        s.pvl = s
            .pvs
            .iter()
            .filter_map(|&id| lights.get(id as usize))
            .flatten()
            .copied()
            .collect();
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::dynamic::Dynamics;
    use crate::world::MapBuilder;

    /// Three rooms in a row plus a fourth stacked far above the third.
    fn corridor(dyns: &mut Dynamics) -> Map {
        let mut b = MapBuilder::new("corridor", dyns);
        b.sector("a", 0.0, 100.0)
            .rect(0.0, 0.0, 100.0, 100.0)
            .portal(1, "b")
            .done();
        b.sector("b", 0.0, 100.0)
            .rect(100.0, 0.0, 200.0, 100.0)
            .portal(3, "a")
            .portal(1, "c")
            .done();
        b.sector("c", 0.0, 100.0)
            .rect(200.0, 0.0, 300.0, 100.0)
            .portal(3, "b")
            .portal(1, "d")
            .done();
        b.sector("d", 500.0, 600.0)
            .rect(300.0, 0.0, 400.0, 100.0)
            .portal(3, "c")
            .done();
        b.build()
    }

    #[test]
    fn pvs_follows_portals_and_height_overlap() {
        let mut d = Dynamics::default();
        let map = corridor(&mut d);
        let a = &map.sectors[0];
        assert_eq!(a.pvs, BTreeSet::from([0, 1, 2]));
        assert!(map.sectors[3].pvs.contains(&3));
        assert!(!map.sectors[3].pvs.contains(&2));
    }

    #[test]
    fn mob_pvs_ignores_heights() {
        let mut d = Dynamics::default();
        let map = corridor(&mut d);
        assert_eq!(map.sectors[0].pvs_mob, BTreeSet::from([0, 1, 2, 3]));
        assert_eq!(map.sectors[3].pvs_mob, BTreeSet::from([0, 1, 2, 3]));
    }

    #[test]
    fn mid_textured_portals_stop_the_mob_flood() {
        let mut d = Dynamics::default();
        let mut map = corridor(&mut d);
        // b's west edge is the one a's portal lands on
        let k = map.sectors[0].segments[1].adjacent_segment.unwrap();
        map.sectors[1].segments[k].mid.material = Some(0);
        assert_eq!(build_mob_pvs(&map, 0), BTreeSet::from([0]));
    }

    #[test]
    fn lights_collected_from_visible_sectors() {
        let mut d = Dynamics::default();
        let mut map = corridor(&mut d);
        let mut world = hecs::World::new();
        let lamp = world.spawn(());
        let rock = world.spawn(());
        map.sectors[2].mobs.insert(lamp);
        map.sectors[2].mobs.insert(rock);
        collect_lights(&mut map, |e| e == lamp);
        assert_eq!(map.sectors[0].pvl, vec![lamp]);
        assert!(map.sectors[3].pvl.is_empty());
    }
}
