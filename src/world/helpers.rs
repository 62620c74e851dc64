use glam::DVec2;

use super::material::Material;
use super::{Map, MaterialId, Sector, SectorId, pvs};
use crate::sim::dynamic::Dynamics;

// ──────────────────────────────────────────────────────────────────────────
//                       Map – arena access
// ──────────────────────────────────────────────────────────────────────────
impl Map {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[inline]
    pub fn sector(&self, id: SectorId) -> Option<&Sector> {
        self.sectors.get(id as usize)
    }

    #[inline]
    pub fn sector_mut(&mut self, id: SectorId) -> Option<&mut Sector> {
        self.sectors.get_mut(id as usize)
    }

    pub fn sector_id(&self, name: &str) -> Option<SectorId> {
        self.sector_names.get(name).copied()
    }

    /// Drop the map and free the dynamic slots its sectors hold.
    pub fn release(self, dyns: &mut Dynamics) {
        for s in self.sectors {
            s.release(dyns);
        }
    }

    #[inline]
    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id as usize)
    }

    pub fn material_id(&self, name: &str) -> Option<MaterialId> {
        self.material_names.get(name).copied()
    }

    /// Append a sector and return its id. Call [`Map::recalculate`] afterwards.
    pub fn add_sector(&mut self, sector: Sector) -> SectorId {
        let id = self.sectors.len() as SectorId;
        self.sector_names.insert(sector.name.clone(), id);
        self.sectors.push(sector);
        id
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = self.materials.len() as MaterialId;
        self.material_names.insert(material.name.clone(), id);
        self.materials.push(material);
        id
    }

    pub fn sector_ids(&self) -> impl Iterator<Item = SectorId> + use<> {
        0..self.sectors.len() as SectorId
    }

    // ──────────────────────────────────────────────────────────────────────
    //                       topology
    // ──────────────────────────────────────────────────────────────────────

    /// Rebuild every derived field: per-sector geometry, adjacency and PVS.
    pub fn recalculate(&mut self, dyns: &Dynamics) {
        for s in &mut self.sectors {
            let (bottom, top) = s.heights(dyns);
            s.recalculate(bottom, top);
        }
        self.link_adjacency();
        for id in self.sector_ids() {
            for target in ["floor", "ceil"] {
                let Some(s) = self.sector(id) else { continue };
                let t = if target == "floor" { s.floor_target } else { s.ceil_target };
                if t.is_some_and(|t| self.sector(t).is_none()) {
                    log::warn!("sector {:?}: {target} target {t:?} does not exist", s.name);
                    if let Some(s) = self.sector_mut(id) {
                        if target == "floor" {
                            s.floor_target = None;
                        } else {
                            s.ceil_target = None;
                        }
                    }
                }
            }
        }
        pvs::rebuild(self);
    }

    /// Resolve `adjacent_segment` for every portal and make sure the pair links
    /// back. Portals without a matching edge become solid walls.
    pub fn link_adjacency(&mut self) {
        for id in self.sector_ids() {
            for i in 0..self.sectors[id as usize].segments.len() {
                let seg = &self.sectors[id as usize].segments[i];
                let Some(adj) = seg.adjacent_sector else {
                    continue;
                };
                let found = self.sector(adj).and_then(|other| {
                    let mut hits = other
                        .segments
                        .iter()
                        .enumerate()
                        .filter(|(_, s2)| s2.matches(seg))
                        .map(|(k, _)| k);
                    let first = hits.next();
                    if hits.next().is_some() { None } else { first }
                });
                match found {
                    Some(k) if adj != id => {
                        self.sectors[id as usize].segments[i].adjacent_segment = Some(k);
                        let back = &mut self.sectors[adj as usize].segments[k];
                        back.adjacent_sector = Some(id);
                        back.adjacent_segment = Some(i);
                    }
                    _ => {
                        let s = &mut self.sectors[id as usize];
                        log::warn!(
                            "sector {:?} segment {i}: no matching edge in sector {adj}, treating as wall",
                            s.name
                        );
                        s.segments[i].adjacent_sector = None;
                        s.segments[i].adjacent_segment = None;
                    }
                }
            }
        }
    }

    /// Link every pair of matching segments across different sectors as portals.
    pub fn auto_portal(&mut self) {
        for s in &mut self.sectors {
            for seg in &mut s.segments {
                seg.adjacent_sector = None;
                seg.adjacent_segment = None;
            }
        }
        let n = self.sectors.len();
        for a in 0..n {
            for b in (a + 1)..n {
                let (sa, sb) = (&self.sectors[a], &self.sectors[b]);
                if sa.max.x < sb.min.x
                    || sb.max.x < sa.min.x
                    || sa.max.y < sb.min.y
                    || sb.max.y < sa.min.y
                {
                    continue;
                }
                let mut pairs = Vec::new();
                for (i, s1) in sa.segments.iter().enumerate() {
                    if let Some(k) = sb.segments.iter().position(|s2| s2.matches(s1)) {
                        pairs.push((i, k));
                    }
                }
                for (i, k) in pairs {
                    let s1 = &mut self.sectors[a].segments[i];
                    s1.adjacent_sector = Some(b as SectorId);
                    s1.adjacent_segment = Some(k);
                    let s2 = &mut self.sectors[b].segments[k];
                    s2.adjacent_sector = Some(a as SectorId);
                    s2.adjacent_segment = Some(i);
                }
            }
        }
    }

    // ──────────────────────────────────────────────────────────────────────
    //                       point queries
    // ──────────────────────────────────────────────────────────────────────

    /// First sector whose polygon contains `p`.
    pub fn sector_containing(&self, p: DVec2) -> Option<SectorId> {
        self.sectors
            .iter()
            .position(|s| s.is_point_inside_2d(p))
            .map(|i| i as SectorId)
    }

    /// Sector containing `p`, or else the one whose centre is closest.
    pub fn nearest_sector(&self, p: DVec2) -> Option<SectorId> {
        self.sector_containing(p).or_else(|| {
            self.sectors
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    let da = a.center.truncate().distance_squared(p);
                    let db = b.center.truncate().distance_squared(p);
                    da.total_cmp(&db)
                })
                .map(|(i, _)| i as SectorId)
        })
    }

    pub fn clear_lightmaps(&mut self) {
        for s in &mut self.sectors {
            s.clear_lightmaps();
        }
    }
}

// ──────────────────────────────────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::MapBuilder;

    fn two_rooms() -> (Map, Dynamics) {
        let mut dyns = Dynamics::default();
        let mut b = MapBuilder::new("pair", &mut dyns);
        b.sector("a", 0.0, 100.0)
            .rect(0.0, 0.0, 100.0, 100.0)
            .portal(1, "b")
            .done();
        b.sector("b", 0.0, 100.0)
            .rect(100.0, 0.0, 200.0, 100.0)
            .portal(3, "a")
            .done();
        let map = b.build();
        (map, dyns)
    }

    #[test]
    fn portals_link_both_ways() {
        let (map, _) = two_rooms();
        let a = map.sector_id("a").unwrap();
        let b = map.sector_id("b").unwrap();
        for (id, other) in [(a, b), (b, a)] {
            let s = map.sector(id).unwrap();
            let portals: Vec<_> = s.segments.iter().filter(|seg| seg.is_portal()).collect();
            assert_eq!(portals.len(), 1);
            let seg = portals[0];
            assert_eq!(seg.adjacent_sector, Some(other));
            let back = &map.sector(other).unwrap().segments[seg.adjacent_segment.unwrap()];
            assert!(back.matches(seg));
            assert_eq!(back.adjacent_sector, Some(id));
        }
    }

    #[test]
    fn unmatched_portal_becomes_wall() {
        let (mut map, dyns) = two_rooms();
        map.sectors[0].segments[0].adjacent_sector = Some(1);
        map.recalculate(&dyns);
        assert!(!map.sectors[0].segments[0].is_portal());
        assert!(map.sectors[0].segments[1].is_portal());
    }

    #[test]
    fn auto_portal_finds_shared_edges() {
        let (mut map, dyns) = two_rooms();
        for s in &mut map.sectors {
            for seg in &mut s.segments {
                seg.adjacent_sector = None;
            }
        }
        map.auto_portal();
        map.recalculate(&dyns);
        assert_eq!(map.sectors[0].segments[1].adjacent_sector, Some(1));
        assert_eq!(map.sectors[1].segments[3].adjacent_sector, Some(0));
    }

    #[test]
    fn point_queries() {
        let (map, _) = two_rooms();
        assert_eq!(map.sector_containing(DVec2::new(150.0, 50.0)), Some(1));
        assert_eq!(map.sector_containing(DVec2::new(250.0, 50.0)), None);
        assert_eq!(map.nearest_sector(DVec2::new(250.0, 50.0)), Some(1));
    }
}
