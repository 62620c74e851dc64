//! Per-surface light grids.
//!
//! Every floor, ceiling and wall owns a [`Lightmap`]: a small grid of RGB light
//! values spaced [`LIGHT_GRID`] units apart with a [`LIGHT_SAFETY`] border so
//! bilinear lookups near the edges stay in range. Texels start out as
//! [`Lightmap::DIRTY`] and are filled in by [`refresh`] before rendering.

use glam::{DVec2, DVec3};
use hecs::Entity;

use super::{Map, Sector, SectorId, Segment};
use crate::defs::{LIGHT_GRID, LIGHT_SAFETY, MAX_LIGHTMAP_AGE};
use crate::sim::dynamic::Dynamics;

/// A point light as seen by the lightmapper.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightSource {
    pub pos: DVec3,
    pub diffuse: DVec3,
    pub strength: f64,
    /// Distance at which the light has dropped to a quarter of `strength`.
    pub range: f64,
}

impl LightSource {
    /// Contribution at `p` for a surface facing `normal`, ignoring occlusion.
    pub fn contribution(&self, p: DVec3, normal: DVec3) -> DVec3 {
        let to_light = self.pos - p;
        let dist = to_light.length();
        if dist <= f64::EPSILON {
            return self.diffuse * self.strength;
        }
        let lambert = normal.dot(to_light / dist);
        if lambert <= 0.0 {
            return DVec3::ZERO;
        }
        let falloff = 1.0 + dist / self.range.max(f64::EPSILON);
        self.diffuse * (self.strength * lambert / (falloff * falloff))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Lightmap {
    pub width: usize,
    pub height: usize,
    texels: Vec<DVec3>,
    /// Frame of the last refresh, `None` while dirty.
    stamp: Option<u64>,
}

impl Lightmap {
    pub const DIRTY: DVec3 = DVec3::splat(-1.0);

    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            texels: vec![Self::DIRTY; width * height],
            stamp: None,
        }
    }

    /// Grid big enough for a `w × h` world-unit surface.
    pub fn for_extent(w: f64, h: f64) -> Self {
        let cells = |d: f64| (d.max(0.0) / LIGHT_GRID).ceil() as usize + LIGHT_SAFETY * 2;
        Self::new(cells(w), cells(h))
    }

    pub fn clear(&mut self) {
        self.texels.fill(Self::DIRTY);
        self.stamp = None;
    }

    pub fn is_dirty(&self) -> bool {
        self.stamp.is_none()
    }

    pub fn needs_refresh(&self, frame: u64) -> bool {
        match self.stamp {
            None => !self.texels.is_empty(),
            Some(s) => frame.saturating_sub(s) > MAX_LIGHTMAP_AGE,
        }
    }

    #[inline]
    pub fn texel(&self, x: usize, y: usize) -> DVec3 {
        self.texels[y * self.width + x]
    }

    /// Bilinear lookup in texel coordinates; dirty texels read as darkness.
    pub fn sample(&self, tx: f64, ty: f64) -> DVec3 {
        if self.texels.is_empty() {
            return DVec3::ZERO;
        }
        let max_x = (self.width - 1) as f64;
        let max_y = (self.height - 1) as f64;
        let tx = tx.clamp(0.0, max_x);
        let ty = ty.clamp(0.0, max_y);
        let (x0, y0) = (tx.floor() as usize, ty.floor() as usize);
        let (x1, y1) = ((x0 + 1).min(self.width - 1), (y0 + 1).min(self.height - 1));
        let (fx, fy) = (tx - x0 as f64, ty - y0 as f64);
        let get = |x, y| self.texel(x, y).max(DVec3::ZERO);
        let top = get(x0, y0).lerp(get(x1, y0), fx);
        let bottom = get(x0, y1).lerp(get(x1, y1), fx);
        top.lerp(bottom, fy)
    }

    fn fill(&mut self, frame: u64, mut f: impl FnMut(usize, usize) -> DVec3) {
        for y in 0..self.height {
            for x in 0..self.width {
                self.texels[y * self.width + x] = f(x, y);
            }
        }
        self.stamp = Some(frame);
    }
}

/*──────────────────────────── addressing ─────────────────────────────*/

impl Sector {
    /// Floor/ceiling lightmap texel coordinates of a world point.
    #[inline]
    pub fn lightmap_coords(&self, p: DVec2) -> DVec2 {
        (p - self.min.truncate()) / LIGHT_GRID + DVec2::splat(LIGHT_SAFETY as f64)
    }

    /// World-space position of floor (or ceiling) lightmap texel `(x, y)`.
    pub fn lightmap_world(&self, x: usize, y: usize, floor: bool, bottom: f64, top: f64) -> DVec3 {
        let p = self.min.truncate()
            + DVec2::new(
                x as f64 - LIGHT_SAFETY as f64,
                y as f64 - LIGHT_SAFETY as f64,
            ) * LIGHT_GRID;
        let (fz, cz) = self.plane_z(p, bottom, top);
        p.extend(if floor { fz } else { cz })
    }
}

impl Segment {
    /// Wall lightmap texel coordinates for wall-space `u` (along) and `v`
    /// (0 at the top, 1 at the bottom).
    #[inline]
    pub fn lightmap_coords(&self, u: f64, v: f64) -> DVec2 {
        let s = LIGHT_SAFETY as f64;
        let inner_w = (self.lightmap.width as f64 - 2.0 * s).max(1.0);
        let inner_h = (self.lightmap.height as f64 - 2.0 * s).max(1.0);
        DVec2::new(u * inner_w + s, v * inner_h + s)
    }

    pub fn uv_to_world(&self, u: f64, v: f64, bottom: f64, top: f64) -> DVec3 {
        let along = self.p + (self.end - self.p) * u;
        along.extend(v * bottom + (1.0 - v) * top)
    }

    pub fn lightmap_world(&self, x: usize, y: usize, bottom: f64, top: f64) -> DVec3 {
        let s = LIGHT_SAFETY as f64;
        let inner_w = (self.lightmap.width as f64 - 2.0 * s).max(1.0);
        let inner_h = (self.lightmap.height as f64 - 2.0 * s).max(1.0);
        let u = ((x as f64 - s) / inner_w).clamp(0.0, 1.0);
        let v = ((y as f64 - s) / inner_h).clamp(0.0, 1.0);
        self.uv_to_world(u, v, bottom, top)
    }
}

/*──────────────────────────── lighting ───────────────────────────────*/

/// Is `light` visible from `p` inside `sector`? Only solid walls of the PVS
/// block light; the test is done in 2D.
fn unoccluded(map: &Map, sector: &Sector, p: DVec3, light: DVec3) -> bool {
    let (a, b) = (p.truncate(), light.truncate());
    sector.pvs.iter().all(|&id| {
        map.sector(id).is_none_or(|s| {
            s.segments
                .iter()
                .filter(|seg| seg.adjacent_sector.is_none())
                .all(|seg| seg.intersect_2d(a, b).is_none())
        })
    })
}

/// Total light arriving at `p` on a surface facing `normal`.
pub fn light_at(map: &Map, sector: &Sector, lights: &[LightSource], p: DVec3, normal: DVec3) -> DVec3 {
    // nudge off the surface so the owning wall does not shadow itself
    let probe = p + normal * 0.5;
    lights
        .iter()
        .filter(|l| unoccluded(map, sector, probe, l.pos))
        .map(|l| l.contribution(probe, normal))
        .sum()
}

/// Recompute stale lightmaps of every sector visible from `from`.
///
/// `light` resolves a light entity from a sector's `pvl` into a source; entities
/// that are not (or no longer) lights return `None`.
pub fn refresh(
    map: &mut Map,
    dyns: &Dynamics,
    from: SectorId,
    frame: u64,
    light: impl Fn(Entity) -> Option<LightSource>,
) {
    let Some(visible) = map.sector(from).map(|s| s.pvs.clone()) else {
        return;
    };
    for id in visible {
        let Some(sector) = map.sector(id) else {
            continue;
        };
        let stale = sector.floor_lightmap.needs_refresh(frame)
            || sector.ceil_lightmap.needs_refresh(frame)
            || sector.segments.iter().any(|s| s.lightmap.needs_refresh(frame));
        if !stale {
            continue;
        }
        let lights: Vec<LightSource> = sector.pvl.iter().filter_map(|&e| light(e)).collect();
        let (bottom, top) = sector.heights(dyns);

        let mut floor = sector.floor_lightmap.clone();
        let mut ceil = sector.ceil_lightmap.clone();
        if floor.needs_refresh(frame) {
            floor.fill(frame, |x, y| {
                let p = sector.lightmap_world(x, y, true, bottom, top);
                light_at(map, sector, &lights, p, sector.floor_normal)
            });
        }
        if ceil.needs_refresh(frame) {
            ceil.fill(frame, |x, y| {
                let p = sector.lightmap_world(x, y, false, bottom, top);
                light_at(map, sector, &lights, p, sector.ceil_normal)
            });
        }
        let walls: Vec<Option<Lightmap>> = sector
            .segments
            .iter()
            .map(|seg| {
                if !seg.lightmap.needs_refresh(frame) {
                    return None;
                }
                let mut lm = seg.lightmap.clone();
                let n = (-seg.normal).extend(0.0);
                lm.fill(frame, |x, y| {
                    let p = seg.lightmap_world(x, y, bottom, top);
                    light_at(map, sector, &lights, p, n)
                });
                Some(lm)
            })
            .collect();

        let Some(sector) = map.sector_mut(id) else {
            continue;
        };
        sector.floor_lightmap = floor;
        sector.ceil_lightmap = ceil;
        for (seg, lm) in sector.segments.iter_mut().zip(walls) {
            if let Some(lm) = lm {
                seg.lightmap = lm;
            }
        }
    }
}

/// Mark every lightmap visible from `from` dirty (a light moved there).
pub fn invalidate(map: &mut Map, from: SectorId) {
    let Some(visible) = map.sector(from).map(|s| s.pvs.clone()) else {
        return;
    };
    for id in visible {
        if let Some(s) = map.sector_mut(id) {
            s.clear_lightmaps();
        }
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
