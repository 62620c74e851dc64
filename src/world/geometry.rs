use std::collections::{BTreeSet, HashMap};

use glam::{DVec2, DVec3};
use hecs::Entity;

use super::lightmap::Lightmap;
use super::material::Material;
use crate::defs::{DEFAULT_FLOOR_FRICTION, INTERSECT_EPSILON, MATCH_EPSILON, TEXTURE_UNITS};
use crate::math::cross2;
use crate::sim::dynamic::{Dyn, Dynamics};

pub type SectorId = u32;
pub type MaterialId = u16;

/// Runtime map: an arena of sectors and materials addressed by id.
#[derive(Clone, Debug)]
pub struct Map {
    pub name: String,
    pub sectors: Vec<Sector>,
    pub materials: Vec<Material>,
    pub spawn: DVec3,
    /// Degrees.
    pub spawn_angle: f64,
    /// Prune the PVS with the wall occlusion test (slow on big maps).
    pub pvs_occlusion: bool,
    pub(super) sector_names: HashMap<String, SectorId>,
    pub(super) material_names: HashMap<String, MaterialId>,
}

impl Default for Map {
    fn default() -> Self {
        Self {
            name: String::new(),
            sectors: Vec::new(),
            materials: Vec::new(),
            spawn: DVec3::ZERO,
            spawn_angle: 0.0,
            pvs_occlusion: true,
            sector_names: HashMap::new(),
            material_names: HashMap::new(),
        }
    }
}

/*------------------------- surfaces ---------------------------------*/

/// Floor or ceiling appearance. `scale` is the world size of one texture repeat.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Surface {
    pub material: Option<MaterialId>,
    pub scale: f64,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            material: None,
            scale: TEXTURE_UNITS,
        }
    }
}

/// How a wall texture is stretched over its slice.
///
/// `ScaleNone` tiles in world units both ways, `ScaleWidth` stretches one repeat
/// across the wall width, `ScaleHeight` across the wall height, `ScaleAll` both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ScaleMode {
    #[default]
    ScaleNone,
    ScaleWidth,
    ScaleHeight,
    ScaleAll,
}

impl ScaleMode {
    #[inline]
    pub fn tiles_u(self) -> bool {
        matches!(self, ScaleMode::ScaleNone | ScaleMode::ScaleHeight)
    }

    #[inline]
    pub fn tiles_v(self) -> bool {
        matches!(self, ScaleMode::ScaleNone | ScaleMode::ScaleWidth)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WallSurface {
    pub material: Option<MaterialId>,
    pub scale: ScaleMode,
}

/*------------------------- sector kinds -----------------------------*/

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DoorState {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum SectorKind {
    #[default]
    Plain,
    /// Damages every alive mob inside.
    Toxic { hurt: f64 },
    /// Damps velocity and swaps gravity for a slow sink.
    Underwater,
    /// Animates `top_z` between `bottom_z` and its spawn value.
    VerticalDoor { state: DoorState, vel_z: f64 },
}

/*------------------------- segments ---------------------------------*/

#[derive(Clone, Debug, Default)]
pub struct Segment {
    pub p: DVec2,
    /// Start of the next segment in the loop.
    pub end: DVec2,
    pub length: f64,
    /// Outward unit normal.
    pub normal: DVec2,
    pub lo: WallSurface,
    pub mid: WallSurface,
    pub hi: WallSurface,
    pub adjacent_sector: Option<SectorId>,
    pub adjacent_segment: Option<usize>,
    pub lightmap: Lightmap,
}

impl Segment {
    pub fn new(p: DVec2) -> Self {
        Self {
            p,
            ..Default::default()
        }
    }

    #[inline]
    pub fn is_portal(&self) -> bool {
        self.adjacent_sector.is_some()
    }

    /// Recompute `end`-derived data. `normal` is left-handed here and flipped
    /// by the owning sector when its winding requires it.
    pub fn recalculate(&mut self, end: DVec2) {
        self.end = end;
        let d = self.end - self.p;
        self.length = d.length();
        self.normal = if self.length > 0.0 {
            DVec2::new(d.y, -d.x) / self.length
        } else {
            DVec2::ZERO
        };
    }

    /// Parametric intersection with the segment `a→b`.
    ///
    /// Returns `(r, s)`: `r` along `self`, `s` along `a→b`, both clamped to `[0, 1]`.
    pub fn intersect(&self, a: DVec2, b: DVec2) -> Option<(f64, f64)> {
        let d1 = self.end - self.p;
        let d2 = b - a;
        let denom = d1.x * d2.y - d2.x * d1.y;
        if denom == 0.0 {
            return None;
        }
        let r = (self.p.y - a.y) * d2.x - (self.p.x - a.x) * d2.y;
        if (denom < 0.0 && r >= INTERSECT_EPSILON) || (denom > 0.0 && r < -INTERSECT_EPSILON) {
            return None;
        }
        let s = (self.p.y - a.y) * d1.x - (self.p.x - a.x) * d1.y;
        if (denom < 0.0 && s >= INTERSECT_EPSILON) || (denom > 0.0 && s < -INTERSECT_EPSILON) {
            return None;
        }
        let (r, s) = (r / denom, s / denom);
        if r > 1.0 + INTERSECT_EPSILON || s > 1.0 + INTERSECT_EPSILON {
            return None;
        }
        Some((r.clamp(0.0, 1.0), s.clamp(0.0, 1.0)))
    }

    pub fn intersect_2d(&self, a: DVec2, b: DVec2) -> Option<DVec2> {
        self.intersect(a, b)
            .map(|(r, _)| self.p + (self.end - self.p) * r)
    }

    /// Endpoint-wise equality up to [`MATCH_EPSILON`], either orientation.
    pub fn matches(&self, other: &Segment) -> bool {
        let close = |a: DVec2, b: DVec2| {
            (a.x - b.x).abs() < MATCH_EPSILON && (a.y - b.y).abs() < MATCH_EPSILON
        };
        (close(self.p, other.p) && close(self.end, other.end))
            || (close(self.p, other.end) && close(self.end, other.p))
    }

    pub fn closest_to_point(&self, p: DVec2) -> DVec2 {
        let delta = self.end - self.p;
        let len2 = delta.length_squared();
        if len2 == 0.0 {
            return self.p;
        }
        let t = (p - self.p).dot(delta) / len2;
        self.p + delta * t.clamp(0.0, 1.0)
    }

    pub fn distance_to_point2(&self, p: DVec2) -> f64 {
        p.distance_squared(self.closest_to_point(p))
    }

    #[inline]
    pub fn distance_to_point(&self, p: DVec2) -> f64 {
        self.distance_to_point2(p).sqrt()
    }

    /// Signed distance along the normal: negative inside the owning sector.
    #[inline]
    pub fn which_side(&self, p: DVec2) -> f64 {
        self.normal.dot(p - self.p)
    }

    /// Does the segment touch the axis-aligned box?
    pub fn aabb_intersect(&self, min: DVec2, max: DVec2) -> bool {
        let (mut lo_x, mut hi_x) = if self.p.x > self.end.x {
            (self.end.x, self.p.x)
        } else {
            (self.p.x, self.end.x)
        };
        hi_x = hi_x.min(max.x);
        lo_x = lo_x.max(min.x);
        if lo_x > hi_x {
            return false;
        }
        let (mut lo_y, mut hi_y) = (self.p.y, self.end.y);
        let dx = self.end.x - self.p.x;
        if dx.abs() > INTERSECT_EPSILON {
            let a = (self.end.y - self.p.y) / dx;
            let b = self.p.y - a * self.p.x;
            lo_y = a * lo_x + b;
            hi_y = a * hi_x + b;
        }
        if lo_y > hi_y {
            std::mem::swap(&mut lo_y, &mut hi_y);
        }
        hi_y.min(max.y) >= lo_y.max(min.y)
    }
}

/*------------------------- sectors ----------------------------------*/

#[derive(Clone, Debug)]
pub struct Sector {
    pub name: String,
    pub segments: Vec<Segment>,
    pub bottom_z: Dyn<f64>,
    pub top_z: Dyn<f64>,
    pub floor_slope: f64,
    pub ceil_slope: f64,
    pub floor: Surface,
    pub ceil: Surface,
    pub floor_target: Option<SectorId>,
    pub ceil_target: Option<SectorId>,
    pub floor_friction: f64,
    pub kind: SectorKind,

    // derived by `recalculate`
    pub winding: i8,
    pub center: DVec3,
    pub min: DVec3,
    pub max: DVec3,
    pub floor_normal: DVec3,
    pub ceil_normal: DVec3,
    pub floor_lightmap: Lightmap,
    pub ceil_lightmap: Lightmap,

    /// Sectors potentially visible from here (self included).
    pub pvs: BTreeSet<SectorId>,
    /// Light entities inside `pvs`.
    pub pvl: Vec<Entity>,
    /// Sectors whose mobs can influence this one.
    pub pvs_mob: BTreeSet<SectorId>,
    pub mobs: BTreeSet<Entity>,
}

impl Sector {
    /// Empty sector whose heights live in `dyns`.
    pub fn new(name: impl Into<String>, dyns: &mut Dynamics, bottom: f64, top: f64) -> Self {
        Self {
            name: name.into(),
            segments: Vec::new(),
            bottom_z: dyns.scalars.spawn(bottom),
            top_z: dyns.scalars.spawn(top),
            floor_slope: 0.0,
            ceil_slope: 0.0,
            floor: Surface::default(),
            ceil: Surface::default(),
            floor_target: None,
            ceil_target: None,
            floor_friction: DEFAULT_FLOOR_FRICTION,
            kind: SectorKind::Plain,
            winding: 0,
            center: DVec3::ZERO,
            min: DVec3::ZERO,
            max: DVec3::ZERO,
            floor_normal: DVec3::Z,
            ceil_normal: DVec3::NEG_Z,
            floor_lightmap: Lightmap::default(),
            ceil_lightmap: Lightmap::default(),
            pvs: BTreeSet::new(),
            pvl: Vec::new(),
            pvs_mob: BTreeSet::new(),
            mobs: BTreeSet::new(),
        }
    }

    /// Give the height slots back to `dyns`.
    pub fn release(self, dyns: &mut Dynamics) {
        dyns.scalars.remove(self.bottom_z);
        dyns.scalars.remove(self.top_z);
    }

    /// Current `(bottom, top)` from the simulation state.
    #[inline]
    pub fn heights(&self, dyns: &Dynamics) -> (f64, f64) {
        (dyns.scalars[self.bottom_z].now, dyns.scalars[self.top_z].now)
    }

    /// Interpolated `(bottom, top)` for drawing.
    #[inline]
    pub fn render_heights(&self, dyns: &Dynamics) -> (f64, f64) {
        (
            dyns.scalars[self.bottom_z].render,
            dyns.scalars[self.top_z].render,
        )
    }

    /// Floor and ceiling heights at `p` given the flat heights, honouring slopes.
    ///
    /// Slopes rise per unit of distance from the first segment's line into the room.
    pub fn plane_z(&self, p: DVec2, bottom: f64, top: f64) -> (f64, f64) {
        if self.segments.len() < 2 || (self.floor_slope == 0.0 && self.ceil_slope == 0.0) {
            return (bottom, top);
        }
        let s0 = &self.segments[0];
        let d = -s0.which_side(p);
        (bottom + self.floor_slope * d, top + self.ceil_slope * d)
    }

    /// [`Sector::plane_z`] using simulation heights.
    #[inline]
    pub fn z_at(&self, dyns: &Dynamics, p: DVec2) -> (f64, f64) {
        let (b, t) = self.heights(dyns);
        self.plane_z(p, b, t)
    }

    /// Parity test against the polygon, counting crossings of the row through `p`.
    pub fn is_point_inside_2d(&self, p: DVec2) -> bool {
        let Some(first) = self.segments.first() else {
            return false;
        };
        let mut inside = false;
        let mut above = p.y >= first.p.y;
        for seg in &self.segments {
            let next_above = p.y >= seg.end.y;
            if above != next_above {
                let lhs = (seg.end.y - p.y) * (seg.p.x - seg.end.x);
                let rhs = (seg.end.x - p.x) * (seg.p.y - seg.end.y);
                if (lhs >= rhs) == next_above {
                    inside = !inside;
                }
            }
            above = next_above;
        }
        inside
    }

    /// Restore derived data after any edit to the loop or heights.
    ///
    /// Adjacency is not touched here; see `Map::recalculate`.
    pub fn recalculate(&mut self, bottom: f64, top: f64) {
        let n = self.segments.len();
        if n == 0 {
            log::warn!("sector {:?} has no segments", self.name);
            return;
        }

        // drop segments that start where the previous kept one started
        let mut kept: Vec<Segment> = Vec::with_capacity(n);
        for seg in self.segments.drain(..) {
            if kept.last().is_some_and(|prev| prev.p == seg.p) {
                log::warn!("sector {:?}: dropping degenerate segment at {}", self.name, seg.p);
                continue;
            }
            kept.push(seg);
        }
        if kept.len() > 1 && kept.first().map(|s| s.p) == kept.last().map(|s| s.p) {
            log::warn!("sector {:?}: dropping closing duplicate vertex", self.name);
            kept.pop();
        }
        self.segments = kept;
        let n = self.segments.len();

        let sum: f64 = (0..n)
            .map(|i| {
                let cur = self.segments[i].p;
                let next = self.segments[(i + 1) % n].p;
                (next.x - cur.x) * (cur.y + next.y)
            })
            .sum();
        self.winding = if sum < 0.0 { 1 } else { -1 };

        for i in 0..n {
            let end = self.segments[(i + 1) % n].p;
            let seg = &mut self.segments[i];
            seg.recalculate(end);
            if self.winding < 0 {
                seg.normal = -seg.normal;
            }
        }

        let mut center = DVec2::ZERO;
        let mut min = DVec3::INFINITY;
        let mut max = DVec3::NEG_INFINITY;
        for seg in &self.segments {
            center += seg.p;
            min = min.min(seg.p.extend(f64::INFINITY));
            max = max.max(seg.p.extend(f64::NEG_INFINITY));
        }
        self.center = (center / n as f64).extend((bottom + top) * 0.5);

        self.floor_normal = DVec3::Z;
        self.ceil_normal = DVec3::NEG_Z;
        if n > 1 {
            let s0 = &self.segments[0];
            let edge = (s0.end - s0.p).extend(0.0);
            let inward = -s0.normal;
            let floor = edge.cross(inward.extend(self.floor_slope)).normalize_or_zero();
            self.floor_normal = if floor.z < 0.0 { -floor } else { floor };
            let ceil = edge.cross(inward.extend(self.ceil_slope)).normalize_or_zero();
            self.ceil_normal = if ceil.z > 0.0 { -ceil } else { ceil };
        }

        for seg in &self.segments {
            let (fz, cz) = self.plane_z(seg.p, bottom, top);
            min.z = min.z.min(fz).min(cz);
            max.z = max.z.max(fz).max(cz);
        }
        self.min = min;
        self.max = max;

        let size = max - min;
        self.floor_lightmap = Lightmap::for_extent(size.x, size.y);
        self.ceil_lightmap = Lightmap::for_extent(size.x, size.y);
        let height = top - bottom;
        for seg in &mut self.segments {
            seg.lightmap = Lightmap::for_extent(seg.length, height);
        }
    }

    pub fn clear_lightmaps(&mut self) {
        self.floor_lightmap.clear();
        self.ceil_lightmap.clear();
        for seg in &mut self.segments {
            seg.lightmap.clear();
        }
    }

    /// Outward normals and a polygon that is not self-intersecting.
    pub fn is_simple(&self) -> bool {
        let n = self.segments.len();
        if n < 3 {
            return false;
        }
        for i in 0..n {
            for j in (i + 2)..n {
                if i == 0 && j == n - 1 {
                    continue;
                }
                let (a, b) = (&self.segments[i], &self.segments[j]);
                if a.intersect(b.p, b.end).is_some() {
                    return false;
                }
            }
        }
        true
    }

    /// Signed area (positive when the stored loop is counter-clockwise).
    pub fn area(&self) -> f64 {
        self.segments
            .iter()
            .map(|s| cross2(s.p, s.end))
            .sum::<f64>()
            * 0.5
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn square(dyns: &mut Dynamics, pts: &[(f64, f64)]) -> Sector {
        let mut s = Sector::new("sq", dyns, 0.0, 100.0);
        s.segments = pts
            .iter()
            .map(|&(x, y)| Segment::new(DVec2::new(x, y)))
            .collect();
        s.recalculate(0.0, 100.0);
        s
    }

    const CCW: [(f64, f64); 4] = [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)];
    const CW: [(f64, f64); 4] = [(0.0, 0.0), (0.0, 100.0), (100.0, 100.0), (100.0, 0.0)];

    #[rstest]
    #[case(&CCW)]
    #[case(&CW)]
    fn normals_point_outward_for_either_winding(#[case] pts: &[(f64, f64)]) {
        let mut d = Dynamics::default();
        let s = square(&mut d, pts);
        let inside = DVec2::new(30.0, 60.0);
        for seg in &s.segments {
            assert!(seg.which_side(inside) < 0.0, "{:?}", seg.normal);
            assert_relative_eq!(seg.length, 100.0);
        }
        assert!(s.is_point_inside_2d(s.center.truncate()));
        assert_eq!(s.center, DVec3::new(50.0, 50.0, 50.0));
    }

    #[test]
    fn point_inside_rejects_outside() {
        let mut d = Dynamics::default();
        let s = square(&mut d, &CCW);
        assert!(s.is_point_inside_2d(DVec2::new(1.0, 99.0)));
        assert!(!s.is_point_inside_2d(DVec2::new(101.0, 50.0)));
        assert!(!s.is_point_inside_2d(DVec2::new(50.0, -0.5)));
    }

    #[test]
    fn degenerate_segments_are_dropped() {
        let mut d = Dynamics::default();
        let s = square(
            &mut d,
            &[(0.0, 0.0), (100.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)],
        );
        assert_eq!(s.segments.len(), 4);
        assert!(s.segments.iter().all(|seg| seg.length > 0.0));
    }

    #[test]
    fn intersection_and_parallel_lines() {
        let mut seg = Segment::new(DVec2::new(0.0, 0.0));
        seg.recalculate(DVec2::new(10.0, 0.0));
        let hit = seg.intersect_2d(DVec2::new(5.0, -5.0), DVec2::new(5.0, 5.0));
        assert_eq!(hit, Some(DVec2::new(5.0, 0.0)));
        assert_eq!(seg.intersect_2d(DVec2::new(0.0, 1.0), DVec2::new(10.0, 1.0)), None);
        assert_eq!(seg.intersect_2d(DVec2::new(11.0, -5.0), DVec2::new(11.0, 5.0)), None);
        assert_eq!(seg.intersect_2d(DVec2::new(5.0, 1.0), DVec2::new(5.0, 5.0)), None);
    }

    #[test]
    fn matches_either_orientation() {
        let mut a = Segment::new(DVec2::new(0.0, 0.0));
        a.recalculate(DVec2::new(10.0, 0.0));
        let mut b = Segment::new(DVec2::new(10.0, 0.00005));
        b.recalculate(DVec2::new(0.0, 0.0));
        assert!(a.matches(&b));
        b.recalculate(DVec2::new(0.0, 0.001));
        assert!(!a.matches(&b));
    }

    #[test]
    fn closest_point_clamps_to_endpoints() {
        let mut seg = Segment::new(DVec2::ZERO);
        seg.recalculate(DVec2::new(10.0, 0.0));
        assert_eq!(seg.closest_to_point(DVec2::new(-3.0, 4.0)), DVec2::ZERO);
        assert_eq!(seg.closest_to_point(DVec2::new(4.0, 4.0)), DVec2::new(4.0, 0.0));
        assert_relative_eq!(seg.distance_to_point(DVec2::new(13.0, 4.0)), 5.0);
        assert!(seg.aabb_intersect(DVec2::new(2.0, -1.0), DVec2::new(3.0, 1.0)));
        assert!(!seg.aabb_intersect(DVec2::new(2.0, 1.0), DVec2::new(3.0, 2.0)));
    }

    #[test]
    fn sloped_floor_normal_tilts_away_from_rise() {
        let mut d = Dynamics::default();
        let mut s = Sector::new("slope", &mut d, 0.0, 100.0);
        s.segments = CCW.iter().map(|&(x, y)| Segment::new(DVec2::new(x, y))).collect();
        s.floor_slope = 0.5;
        s.recalculate(0.0, 100.0);
        // seg0 runs along y=0, so the floor rises with y
        let (fz, _) = s.plane_z(DVec2::new(50.0, 20.0), 0.0, 100.0);
        assert_relative_eq!(fz, 10.0);
        let expect = DVec3::new(0.0, -0.5, 1.0).normalize();
        assert!(s.floor_normal.abs_diff_eq(expect, 1e-12), "{}", s.floor_normal);
        assert!(s.ceil_normal.abs_diff_eq(DVec3::NEG_Z, 1e-12));
        assert_relative_eq!(s.max.z, 100.0);
    }

    #[test]
    fn lightmaps_are_sized_and_dirty() {
        let mut d = Dynamics::default();
        let s = square(&mut d, &CCW);
        assert_eq!(s.floor_lightmap.width, 24);
        assert!(s.floor_lightmap.is_dirty());
        assert_eq!(s.segments[0].lightmap.height, 24);
    }
}
