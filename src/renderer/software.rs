//! ---------------------------------------------------------------------------
//! Portal-walking software (CPU) column renderer
//!
//! * Every screen column casts one ray from the eye and walks sector to sector
//!   through portals, front to back, narrowing the visible vertical band.
//! * Columns are split into vertical strips. Each strip owns its colour and
//!   depth buffers, so strips render in parallel on `rayon` without locks.
//! * The finished strips are composed into a row-major `0x00RRGGBB` buffer with
//!   the view's tint washed over it.
//! ---------------------------------------------------------------------------

use glam::DVec4;
use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::defs::MAX_VIEW_DISTANCE;
use crate::math::{blend_tint, pack_rgb, unpack_rgb};
use crate::renderer::{Renderer, Rgba, View};

mod planes;
mod projection;
mod walls;

use projection::Tables;
use walls::Column;

/*───────────────────────────────────────────────────────────────────────*/
/*                               Strips                                 */
/*───────────────────────────────────────────────────────────────────────*/

/// A run of adjacent columns with private buffers, stored column-major.
#[derive(Default)]
struct Strip {
    x0: usize,
    width: usize,
    height: usize,
    color: Vec<Rgba>,
    depth: Vec<f64>,
}

impl Strip {
    fn layout(&mut self, x0: usize, width: usize, height: usize) {
        self.x0 = x0;
        self.width = width;
        self.height = height;
        self.color.resize(width * height, 0);
        self.depth.resize(width * height, 0.0);
    }

    #[inline]
    fn index(&self, col: usize, y: usize) -> usize {
        col * self.height + y
    }

    #[inline]
    fn depth_at(&self, col: usize, y: usize) -> f64 {
        self.depth[self.index(col, y)]
    }

    /// Store `c` at `(col, y)`. Opaque texels claim the depth slot, partially
    /// transparent ones blend over what is already there.
    #[inline]
    fn put(&mut self, col: usize, y: usize, c: DVec4, dist: f64) {
        let i = self.index(col, y);
        let a = c.w;
        if a <= 0.0 {
            return;
        }
        if a >= 1.0 {
            self.color[i] = pack_rgb(c);
            self.depth[i] = dist;
            return;
        }
        let under = unpack_rgb(self.color[i]);
        self.color[i] = pack_rgb((c.truncate() * a + under.truncate() * (1.0 - a)).extend(1.0));
    }

    fn render(&mut self, tables: &Tables, view: &View<'_>, max_dist: f64) {
        self.color.fill(0);
        self.depth.fill(max_dist);
        for col in 0..self.width {
            Column::new(tables, view, self.x0 + col, col, max_dist).walk(self);
        }
    }
}

/*───────────────────────────────────────────────────────────────────────*/
/*                              Backend                                 */
/*───────────────────────────────────────────────────────────────────────*/

pub struct Software {
    scratch: Vec<Rgba>,
    strips: Vec<Strip>,
    tables: Tables,
    width: usize,
    height: usize,
    max_view_distance: f64,
    /// Strip count; 0 follows the rayon pool size.
    workers: usize,
    multithreaded: bool,
}

impl Default for Software {
    fn default() -> Self {
        Self::new(MAX_VIEW_DISTANCE, 0, true)
    }
}

impl Software {
    pub fn new(max_view_distance: f64, workers: usize, multithreaded: bool) -> Self {
        Self {
            scratch: Vec::new(),
            strips: Vec::new(),
            tables: Tables::default(),
            width: 0,
            height: 0,
            max_view_distance,
            workers,
            multithreaded,
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg.max_view_distance, cfg.render_workers, cfg.multithreaded)
    }

    /// Depth written at pixel `(x, y)` by the last frame.
    pub fn depth(&self, x: usize, y: usize) -> Option<f64> {
        if y >= self.height {
            return None;
        }
        let s = self
            .strips
            .iter()
            .find(|s| (s.x0..s.x0 + s.width).contains(&x))?;
        Some(s.depth_at(x - s.x0, y))
    }

    fn strip_count(&self) -> usize {
        let n = match (self.multithreaded, self.workers) {
            (false, _) => 1,
            (true, 0) => rayon::current_num_threads(),
            (true, n) => n,
        };
        n.clamp(1, self.width.max(1))
    }

    fn layout_strips(&mut self) {
        let count = self.strip_count();
        let per = self.width.div_ceil(count).max(1);
        self.strips.resize_with(count, Strip::default);
        for (i, strip) in self.strips.iter_mut().enumerate() {
            let x0 = (i * per).min(self.width);
            let w = per.min(self.width - x0);
            strip.layout(x0, w, self.height);
        }
        log::debug!("software renderer: {count} strips of {per} columns");
    }

    /// Row-major copy of the strips, tinted.
    fn compose(&mut self, tint: DVec4) {
        let strips = &self.strips;
        self.scratch
            .par_chunks_mut(self.width.max(1))
            .enumerate()
            .for_each(|(y, row)| {
                for s in strips {
                    for col in 0..s.width {
                        row[s.x0 + col] = blend_tint(s.color[s.index(col, y)], tint);
                    }
                }
            });
    }
}

/*──────────────────────── Renderer trait impl ────────────────────────*/
impl Renderer for Software {
    fn begin_frame(&mut self, w: usize, h: usize) {
        if w != self.width || h != self.height || self.strips.len() != self.strip_count() {
            self.width = w;
            self.height = h;
            self.scratch.resize(w * h, 0);
            self.layout_strips();
        }
        self.scratch.fill(0);
    }

    fn draw_view(&mut self, view: &View<'_>) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let fov = view.camera.fov();
        if !self.tables.matches(self.width, self.height, fov) {
            self.tables = Tables::new(self.width, self.height, fov);
        }

        let (tables, max_dist) = (&self.tables, self.max_view_distance);
        if self.multithreaded {
            self.strips
                .par_iter_mut()
                .for_each(|s| s.render(tables, view, max_dist));
        } else {
            for s in &mut self.strips {
                s.render(tables, view, max_dist);
            }
        }
        self.compose(view.tint);
    }

    fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&[Rgba], usize, usize),
    {
        submit(&self.scratch, self.width, self.height);
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RendererExt;
    use crate::sim::Dynamics;
    use crate::world::{
        Camera, Map, MapBuilder, Material, MaterialKind, Sampled, Sampler, Solid, Sky,
    };
    use glam::DVec3;

    const W: usize = 64;
    const H: usize = 48;

    fn solid(name: &str, c: DVec4) -> Material {
        Material::new(
            name,
            MaterialKind::Sampled(Sampled {
                sampler: Sampler::Solid(Solid { color: c }),
                is_liquid: false,
            }),
        )
    }

    /// Two rooms joined at x = 100, the far one with a raised floor.
    fn rooms(dyns: &mut Dynamics) -> Map {
        let mut b = MapBuilder::new("rooms", dyns);
        let wall = b.material(solid("wall", DVec4::new(1.0, 0.0, 0.0, 1.0)));
        let flat = b.material(solid("flat", DVec4::new(0.0, 1.0, 0.0, 1.0)));
        b.sector("a", 0.0, 100.0)
            .rect(0.0, 0.0, 100.0, 100.0)
            .portal(1, "b")
            .walls(wall)
            .floor_material(flat)
            .ceil_material(flat)
            .done();
        b.sector("b", 20.0, 100.0)
            .rect(100.0, 0.0, 200.0, 100.0)
            .portal(3, "a")
            .walls(wall)
            .floor_material(flat)
            .ceil_material(flat)
            .done();
        b.build()
    }

    fn render(sw: &mut Software, map: &Map, dyns: &Dynamics, cam: Camera) -> Vec<Rgba> {
        let view = View {
            map,
            dyns,
            camera: cam,
            sector: 0,
            tint: DVec4::ZERO,
        };
        let mut out = Vec::new();
        sw.draw_frame(W, H, &view, |fb, w, h| {
            assert_eq!((w, h), (W, H));
            out = fb.to_vec();
        });
        out
    }

    #[test]
    fn every_pixel_is_drawn_in_a_closed_room() {
        let mut dyns = Dynamics::default();
        let map = rooms(&mut dyns);
        let mut sw = Software::new(MAX_VIEW_DISTANCE, 3, true);
        let fb = render(&mut sw, &map, &dyns, Camera::new(DVec3::new(20.0, 50.0, 50.0), 0.0, 90.0));
        assert!(fb.iter().all(|&px| px == 0xFF0000 || px == 0x00FF00));
        // the middle row looks straight at a wall
        assert_eq!(fb[(H / 2) * W + W / 2], 0xFF0000);
    }

    #[test]
    fn depth_never_exceeds_first_wall() {
        let mut dyns = Dynamics::default();
        let map = rooms(&mut dyns);
        let mut sw = Software::new(MAX_VIEW_DISTANCE, 4, true);
        let cam = Camera::new(DVec3::new(20.0, 50.0, 50.0), 10.0, 90.0);
        render(&mut sw, &map, &dyns, cam);

        let tables = Tables::new(W, H, 90.0);
        let start = cam.pos().truncate();
        for x in 0..W {
            let (dir, _) = tables.ray(cam.angle(), x);
            let end = start + dir * MAX_VIEW_DISTANCE;
            // nearest solid wall along the ray, through the open portal
            let nearest = map
                .sectors
                .iter()
                .flat_map(|s| s.segments.iter())
                .filter(|seg| seg.adjacent_sector.is_none())
                .filter_map(|seg| seg.intersect(start, end))
                .map(|(_, s)| s * MAX_VIEW_DISTANCE)
                .fold(f64::INFINITY, f64::min);
            for y in 0..H {
                let d = sw.depth(x, y).unwrap();
                assert!(d <= nearest + 1e-6, "column {x} row {y}: {d} > {nearest}");
            }
        }
    }

    #[test]
    fn strips_match_single_threaded_output() {
        let mut dyns = Dynamics::default();
        let map = rooms(&mut dyns);
        let cam = Camera::new(DVec3::new(30.0, 40.0, 45.0), 25.0, 90.0);
        let a = render(&mut Software::new(MAX_VIEW_DISTANCE, 1, false), &map, &dyns, cam);
        let b = render(&mut Software::new(MAX_VIEW_DISTANCE, 5, true), &map, &dyns, cam);
        assert_eq!(a, b);
    }

    #[test]
    fn tint_is_washed_over_the_frame() {
        let mut dyns = Dynamics::default();
        let map = rooms(&mut dyns);
        let mut sw = Software::default();
        let view = View {
            map: &map,
            dyns: &dyns,
            camera: Camera::new(DVec3::new(20.0, 50.0, 50.0), 0.0, 90.0),
            sector: 0,
            tint: DVec4::new(0.0, 0.0, 1.0, 1.0),
        };
        sw.draw_frame(W, H, &view, |fb, _, _| {
            assert!(fb.iter().all(|&px| px == 0x0000FF));
        });
    }

    #[test]
    fn sky_ceiling_ignores_lighting() {
        let mut dyns = Dynamics::default();
        let mut b = MapBuilder::new("sky", &mut dyns);
        let wall = b.material(solid("wall", DVec4::new(1.0, 0.0, 0.0, 1.0)));
        let sky = b.material(Material::new(
            "sky",
            MaterialKind::Sky(Sky {
                sampler: Sampler::Solid(Solid {
                    color: DVec4::new(0.0, 0.0, 1.0, 1.0),
                }),
                static_background: false,
            }),
        ));
        b.sector("a", 0.0, 100.0)
            .rect(0.0, 0.0, 100.0, 100.0)
            .walls(wall)
            .ceil_material(sky)
            .done();
        let map = b.build();
        let fb = render(
            &mut Software::default(),
            &map,
            &dyns,
            Camera::new(DVec3::new(10.0, 50.0, 50.0), 0.0, 90.0),
        );
        // top row is ceiling: the east wall top lands on row 7
        assert_eq!(fb[W / 2], 0x0000FF);
        assert_eq!(fb[(H / 2) * W + W / 2], 0xFF0000);
    }
}
