//! Floors, ceilings and sky.
//!
//! Each row of a floor or ceiling run is inverse-projected: the row defines a
//! ray through the eye, and intersecting it with the (possibly sloped) plane
//! gives the world point, its distance and its lightmap texel.

use glam::{DVec3, DVec4};

use super::Strip;
use super::walls::{Column, mip_scale};
use crate::world::{Material, MaterialKind, Sector};

impl Column<'_> {
    /// Fill rows `[from, to)` with the floor (or ceiling) of `sector`.
    /// No sample lands farther than `wall_dist`, where the ray leaves the sector.
    pub(super) fn plane(
        &self,
        strip: &mut Strip,
        sector: &Sector,
        floor: bool,
        from: i64,
        to: i64,
        wall_dist: f64,
    ) {
        let surface = if floor { sector.floor } else { sector.ceil };
        let Some(mat) = surface.material.and_then(|m| self.view.map.material(m)) else {
            return;
        };
        let Some(s0) = sector.segments.first() else {
            return;
        };
        let (bottom, top) = sector.render_heights(self.view.dyns);
        let (normal, lightmap) = if floor {
            (sector.floor_normal, &sector.floor_lightmap)
        } else {
            (sector.ceil_normal, &sector.ceil_lightmap)
        };

        // the plane passes through the first vertex at the flat height
        let anchor = s0.p.extend(if floor { bottom } else { top });
        let eye = self.start.extend(self.cam_z);
        let num = normal.dot(anchor - eye);
        let view_fix = self.tables.view_fix[self.x];
        let half_h = (self.tables.height / 2) as f64;
        let tex_h = mat.sampler().and_then(|s| s.height());
        let min = sector.min.truncate();

        let (y0, y1) = self.rows((from, to));
        for y in y0..y1 {
            let ray = DVec3::new(self.dir.x * view_fix, self.dir.y * view_fix, half_h - y as f64);
            let denom = normal.dot(ray);
            if denom == 0.0 {
                continue;
            }
            let t = num / denom;
            if t <= 0.0 {
                continue;
            }
            let dist = (t * view_fix).min(wall_dist);
            if dist >= strip.depth_at(self.col, y) {
                continue;
            }

            let c = if mat.is_sky() {
                self.sky(mat, y)
            } else {
                let p = self.start + self.dir * dist;
                let uv = (p - min) / surface.scale;
                let scale = mip_scale(tex_h, self.tables.project(self.x, surface.scale, dist));
                let lc = sector.lightmap_coords(p);
                mat.shade(uv.x, uv.y, scale, lightmap.sample(lc.x, lc.y))
            };
            strip.put(self.col, y, c, dist);
        }
    }

    /// Sky colour for row `y`: angle-space by default, screen-space when the
    /// material asks for a static background.
    pub(super) fn sky(&self, mat: &Material, y: usize) -> DVec4 {
        let MaterialKind::Sky(sky) = &mat.kind else {
            return DVec4::ZERO;
        };
        let u = if sky.static_background {
            self.x as f64 / self.tables.width as f64
        } else {
            1.0 - self.angle / 360.0
        };
        let v = y as f64 / self.tables.height.max(1) as f64;
        sky.sampler.sample(u, v, 1.0)
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::super::Strip;
    use super::super::projection::Tables;
    use super::*;
    use crate::renderer::View;
    use crate::sim::Dynamics;
    use crate::world::{Camera, MapBuilder, Sampled, Sampler, Solid};
    use approx::assert_relative_eq;

    #[test]
    fn flat_floor_distance_matches_projection() {
        let mut dyns = Dynamics::default();
        let mut b = MapBuilder::new("flat", &mut dyns);
        let m = b.material(Material::new(
            "white",
            MaterialKind::Sampled(Sampled {
                sampler: Sampler::Solid(Solid { color: DVec4::ONE }),
                is_liquid: false,
            }),
        ));
        b.sector("a", 0.0, 100.0)
            .rect(0.0, 0.0, 1000.0, 1000.0)
            .floor_material(m)
            .done();
        let map = b.build();

        let (w, h) = (64, 48);
        let tables = Tables::new(w, h, 90.0);
        let view = View {
            map: &map,
            dyns: &dyns,
            camera: Camera::new(DVec3::new(10.0, 500.0, 32.0), 0.0, 90.0),
            sector: 0,
            tint: DVec4::ZERO,
        };
        let mut strip = Strip::default();
        strip.layout(w / 2, 1, h);
        strip.depth.fill(1e9);
        let col = Column::new(&tables, &view, w / 2, 0, 10_000.0);
        col.plane(&mut strip, &map.sectors[0], true, (h / 2) as i64 + 1, h as i64, 1e9);

        // eye 32 above the floor, focal 32: row H/2 + k sits 32 * 32 / k away
        for k in [1usize, 4, 16] {
            assert_relative_eq!(strip.depth_at(0, h / 2 + k), 1024.0 / k as f64, epsilon = 1e-9);
        }
        assert_eq!(strip.color[strip.index(0, h - 1)], 0xFFFFFF);
    }
}
