use glam::DVec2;

use super::Strip;
use super::projection::Tables;
use crate::defs::{MATCH_EPSILON, MAX_PORTALS, TEXTURE_UNITS};
use crate::math::lerp;
use crate::renderer::View;
use crate::world::{Sector, SectorId, Segment, WallSurface};

/// Where a column's ray leaves the sector being walked.
pub(super) struct Hit<'m> {
    pub seg: &'m Segment,
    /// 2D distance from the eye.
    pub dist: f64,
    /// 0‥1 along the segment.
    pub u: f64,
    pub p: DVec2,
    /// Floor and ceiling of the sector at `p`.
    pub bottom: f64,
    pub top: f64,
}

/// Visible rows `[top, bottom)` still open in this column.
#[derive(Clone, Copy, Debug)]
pub(super) struct Band {
    pub top: i64,
    pub bottom: i64,
}

impl Band {
    #[inline]
    fn clamp(self, y: i64) -> i64 {
        y.clamp(self.top, self.bottom)
    }

    #[inline]
    fn is_empty(self) -> bool {
        self.top >= self.bottom
    }
}

/// One screen column being cast.
pub(super) struct Column<'a> {
    pub tables: &'a Tables,
    pub view: &'a View<'a>,
    /// Screen column.
    pub x: usize,
    /// Column inside the owning strip.
    pub col: usize,
    pub dir: DVec2,
    /// Ray angle in degrees.
    pub angle: f64,
    pub start: DVec2,
    pub end: DVec2,
    pub cam_z: f64,
    pub max_dist: f64,
}

impl<'a> Column<'a> {
    pub fn new(tables: &'a Tables, view: &'a View<'a>, x: usize, col: usize, max_dist: f64) -> Self {
        let cam = view.camera;
        let (dir, angle) = tables.ray(cam.angle(), x);
        let start = cam.pos().truncate();
        Self {
            tables,
            view,
            x,
            col,
            dir,
            angle,
            start,
            end: start + dir * max_dist,
            cam_z: cam.pos().z,
            max_dist,
        }
    }

    #[inline]
    pub fn screen_y(&self, z: f64, dist: f64) -> i64 {
        self.tables.screen_y(self.x, z - self.cam_z, dist)
    }

    pub fn walk(&self, strip: &mut Strip) {
        let band = Band {
            top: 0,
            bottom: self.tables.height as i64,
        };
        self.sector(strip, self.view.sector, band, 0, None, 0.0);
    }

    /// Closest segment of `sector` the ray crosses, ignoring the one it came in
    /// through and anything in front of the last portal.
    fn nearest<'m>(&self, sector: &'m Sector, back: Option<usize>, last: f64) -> Option<Hit<'m>> {
        let (bottom, top) = sector.render_heights(self.view.dyns);
        sector
            .segments
            .iter()
            .enumerate()
            .filter(|&(i, _)| Some(i) != back)
            .filter_map(|(_, seg)| {
                let (u, s) = seg.intersect(self.start, self.end)?;
                let dist = s * self.max_dist;
                (dist >= last - MATCH_EPSILON).then_some((seg, u, dist))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(seg, u, dist)| {
                let p = self.start + self.dir * dist;
                let (bottom, top) = sector.plane_z(p, bottom, top);
                Hit {
                    seg,
                    dist: dist.max(MATCH_EPSILON),
                    u,
                    p,
                    bottom,
                    top,
                }
            })
    }

    /// Draw what the ray sees of sector `id` inside `band`, then follow a portal.
    fn sector(
        &self,
        strip: &mut Strip,
        id: SectorId,
        band: Band,
        depth: usize,
        back: Option<usize>,
        last: f64,
    ) {
        let Some(sector) = self.view.map.sector(id) else {
            return;
        };
        let Some(hit) = self.nearest(sector, back, last) else {
            log::trace!("column {}: ray escaped sector {:?}", self.x, sector.name);
            return;
        };

        let wall_top = band.clamp(self.screen_y(hit.top, hit.dist));
        let wall_bottom = band.clamp(self.screen_y(hit.bottom, hit.dist));

        self.plane(strip, sector, false, band.top, wall_top, hit.dist);
        self.plane(strip, sector, true, wall_bottom, band.bottom, hit.dist);

        let seg = hit.seg;
        let Some(adj_id) = seg.adjacent_sector else {
            self.wall(strip, sector, &hit, &seg.mid, (hit.top, hit.bottom), (wall_top, wall_bottom));
            return;
        };
        let Some(adj) = self.view.map.sector(adj_id) else {
            return;
        };

        let (ab, at) = adj.render_heights(self.view.dyns);
        let (adj_bottom, adj_top) = adj.plane_z(hit.p, ab, at);
        let inner = Band {
            top: self.screen_y(adj_top, hit.dist).clamp(wall_top, wall_bottom),
            bottom: self.screen_y(adj_bottom, hit.dist).clamp(wall_top, wall_bottom),
        };

        if adj_top < hit.top {
            self.wall(strip, sector, &hit, &seg.hi, (hit.top, adj_top), (wall_top, inner.top));
        }
        if adj_bottom > hit.bottom {
            self.wall(
                strip,
                sector,
                &hit,
                &seg.lo,
                (adj_bottom, hit.bottom),
                (inner.bottom, wall_bottom),
            );
        }

        if inner.is_empty() {
            return;
        }
        if depth + 1 < MAX_PORTALS {
            self.sector(strip, adj_id, inner, depth + 1, seg.adjacent_segment, hit.dist);
        } else {
            log::trace!("column {}: portal depth limit at {:?}", self.x, sector.name);
        }
        if seg.mid.material.is_some() {
            let z = (adj_top.min(hit.top), adj_bottom.max(hit.bottom));
            self.wall(strip, sector, &hit, &seg.mid, z, (inner.top, inner.bottom));
        }
    }

    /// One vertical wall slice covering world heights `z.0` (top) to `z.1`
    /// (bottom), clipped to rows `[rows.0, rows.1)`.
    fn wall(
        &self,
        strip: &mut Strip,
        sector: &Sector,
        hit: &Hit<'_>,
        surface: &WallSurface,
        z: (f64, f64),
        rows: (i64, i64),
    ) {
        let Some(mat) = surface.material.and_then(|m| self.view.map.material(m)) else {
            return;
        };
        let (z_hi, z_lo) = z;
        if z_hi <= z_lo {
            return;
        }
        let sy_hi = self.screen_y(z_hi, hit.dist) as f64;
        let sy_lo = self.screen_y(z_lo, hit.dist) as f64;
        let span = (sy_lo - sy_hi).max(1.0);

        let seg = hit.seg;
        let u = if surface.scale.tiles_u() {
            hit.u * seg.length / TEXTURE_UNITS
        } else {
            hit.u
        };
        let repeat = if surface.scale.tiles_v() {
            TEXTURE_UNITS
        } else {
            z_hi - z_lo
        };
        let scale = mip_scale(mat.sampler().and_then(|s| s.height()), self.tables.project(self.x, repeat, hit.dist));

        // wall lightmaps span the flat sector height
        let (bottom, top) = sector.render_heights(self.view.dyns);
        let lm_h = (top - bottom).max(MATCH_EPSILON);

        let (y0, y1) = self.rows(rows);
        for y in y0..y1 {
            if hit.dist >= strip.depth_at(self.col, y) {
                continue;
            }
            let t = (y as f64 - sy_hi) / span;
            let wz = lerp(z_hi, z_lo, t);
            let c = if mat.is_sky() {
                self.sky(mat, y)
            } else {
                let v = if surface.scale.tiles_v() {
                    (hit.top - wz) / TEXTURE_UNITS
                } else {
                    t
                };
                let lv = ((top - wz) / lm_h).clamp(0.0, 1.0);
                let lc = seg.lightmap_coords(hit.u, lv);
                mat.shade(u, v, scale, seg.lightmap.sample(lc.x, lc.y))
            };
            strip.put(self.col, y, c, hit.dist);
        }
    }

    /// Clip a row range to the screen.
    #[inline]
    pub fn rows(&self, rows: (i64, i64)) -> (usize, usize) {
        let h = self.tables.height as i64;
        (rows.0.clamp(0, h) as usize, rows.1.clamp(0, h) as usize)
    }
}

/// Sampler scale for a texture of `height` texels repeated every `pixels` rows.
#[inline]
pub(super) fn mip_scale(height: Option<usize>, pixels: f64) -> f64 {
    match height {
        Some(h) if h > 0 => (pixels / h as f64).max(0.0),
        _ => 1.0,
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
