//! Programmatic map construction for tests and the demo map tool.

use glam::{DVec2, DVec3};

use super::{Map, Material, MaterialId, Sector, SectorId, SectorKind, Segment};
use crate::sim::dynamic::Dynamics;

pub struct MapBuilder<'d> {
    dyns: &'d mut Dynamics,
    map: Map,
    /// (sector, segment, adjacent name)
    portals: Vec<(SectorId, usize, String)>,
    /// (sector, floor?, target name)
    targets: Vec<(SectorId, bool, String)>,
}

impl<'d> MapBuilder<'d> {
    pub fn new(name: impl Into<String>, dyns: &'d mut Dynamics) -> Self {
        Self {
            dyns,
            map: Map::new(name),
            portals: Vec::new(),
            targets: Vec::new(),
        }
    }

    pub fn material(&mut self, m: Material) -> MaterialId {
        self.map.add_material(m)
    }

    pub fn spawn(&mut self, pos: DVec3, angle: f64) -> &mut Self {
        self.map.spawn = pos;
        self.map.spawn_angle = angle;
        self
    }

    pub fn pvs_occlusion(&mut self, on: bool) -> &mut Self {
        self.map.pvs_occlusion = on;
        self
    }

    pub fn sector<'b>(&'b mut self, name: &str, bottom: f64, top: f64) -> SectorBuilder<'b, 'd> {
        let sector = Sector::new(name, self.dyns, bottom, top);
        SectorBuilder {
            owner: self,
            sector,
            portals: Vec::new(),
            walls: None,
            floor_target: None,
            ceil_target: None,
        }
    }

    /// Resolve portal names and recalculate everything.
    pub fn build(self) -> Map {
        let MapBuilder {
            dyns,
            mut map,
            portals,
            targets,
        } = self;
        for (id, seg, name) in portals {
            let adj = map.sector_id(&name);
            if adj.is_none() {
                log::warn!("builder: portal to unknown sector {name:?}");
            }
            if let Some(s) = map.sector_mut(id).and_then(|s| s.segments.get_mut(seg)) {
                s.adjacent_sector = adj;
            }
        }
        for (id, floor, name) in targets {
            let target = map.sector_id(&name);
            if let Some(s) = map.sector_mut(id) {
                if floor {
                    s.floor_target = target;
                } else {
                    s.ceil_target = target;
                }
            }
        }
        map.recalculate(dyns);
        map
    }
}

pub struct SectorBuilder<'b, 'd> {
    owner: &'b mut MapBuilder<'d>,
    sector: Sector,
    portals: Vec<(usize, String)>,
    walls: Option<MaterialId>,
    floor_target: Option<String>,
    ceil_target: Option<String>,
}

impl SectorBuilder<'_, '_> {
    /// Axis-aligned room, counter-clockwise from `(x0, y0)`:
    /// segment 0 is the south wall, 1 east, 2 north, 3 west.
    pub fn rect(self, x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        self.points(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
    }

    pub fn points(mut self, pts: &[(f64, f64)]) -> Self {
        self.sector.segments = pts
            .iter()
            .map(|&(x, y)| Segment::new(DVec2::new(x, y)))
            .collect();
        self
    }

    pub fn portal(mut self, segment: usize, to: &str) -> Self {
        self.portals.push((segment, to.to_owned()));
        self
    }

    pub fn kind(mut self, kind: SectorKind) -> Self {
        self.sector.kind = kind;
        self
    }

    pub fn slope(mut self, floor: f64, ceil: f64) -> Self {
        self.sector.floor_slope = floor;
        self.sector.ceil_slope = ceil;
        self
    }

    pub fn friction(mut self, f: f64) -> Self {
        self.sector.floor_friction = f;
        self
    }

    pub fn floor_material(mut self, m: MaterialId) -> Self {
        self.sector.floor.material = Some(m);
        self
    }

    pub fn ceil_material(mut self, m: MaterialId) -> Self {
        self.sector.ceil.material = Some(m);
        self
    }

    /// Mid texture on solid walls, upper/lower on portals.
    pub fn walls(mut self, m: MaterialId) -> Self {
        self.walls = Some(m);
        self
    }

    pub fn floor_target(mut self, name: &str) -> Self {
        self.floor_target = Some(name.to_owned());
        self
    }

    pub fn ceil_target(mut self, name: &str) -> Self {
        self.ceil_target = Some(name.to_owned());
        self
    }

    pub fn done(self) -> SectorId {
        let SectorBuilder {
            owner,
            mut sector,
            portals,
            walls,
            floor_target,
            ceil_target,
        } = self;
        if let Some(m) = walls {
            for (i, seg) in sector.segments.iter_mut().enumerate() {
                if portals.iter().any(|(k, _)| *k == i) {
                    seg.lo.material = Some(m);
                    seg.hi.material = Some(m);
                } else {
                    seg.mid.material = Some(m);
                }
            }
        }
        let id = owner.map.add_sector(sector);
        owner
            .portals
            .extend(portals.into_iter().map(|(seg, name)| (id, seg, name)));
        if let Some(t) = floor_target {
            owner.targets.push((id, true, t));
        }
        if let Some(t) = ceil_target {
            owner.targets.push((id, false, t));
        }
        id
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
