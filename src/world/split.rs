//! Splitting a sector polygon by a line.
//!
//! Edges are walked counter-clockwise and classified against the line, crossing
//! points become extra vertices, and matching source/destination vertices on
//! the line are bridged so the loop falls apart into closed cycles, one per
//! resulting sector. Works for concave polygons.

use glam::DVec2;
use thiserror::Error;

use super::serial::{MapError, SectorData};
use super::{Map, SectorId, Segment};
use crate::defs::SPLIT_EPSILON;
use crate::sim::dynamic::Dynamics;

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("sector {0} does not exist")]
    NoSector(SectorId),
    #[error("split edge at {0} is not on the split line")]
    OffLine(DVec2),
    #[error("edge cycle starting at {0} does not close")]
    Cycle(DVec2),
    #[error("split produced a piece with {0} vertices")]
    Degenerate(usize),
    #[error("cloning sector: {0}")]
    Clone(#[from] MapError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Left,
    On,
    Right,
}

#[derive(Clone, Debug)]
struct Edge {
    /// Source segment the edge takes its surfaces from.
    source: usize,
    start: DVec2,
    side: Side,
    next: usize,
    prev: usize,
    dist: f64,
    visited: bool,
}

fn which_side(l1: DVec2, l2: DVec2, p: DVec2) -> Side {
    let ld = l2 - l1;
    let pd = p - l1;
    let d = pd.x * ld.y - pd.y * ld.x;
    if d > SPLIT_EPSILON {
        Side::Right
    } else if d < -SPLIT_EPSILON {
        Side::Left
    } else {
        Side::On
    }
}

struct Splitter {
    l1: DVec2,
    l2: DVec2,
    edges: Vec<Edge>,
    on_line: Vec<usize>,
}

impl Splitter {
    fn new(l1: DVec2, l2: DVec2, points: &[DVec2], winding: i8) -> Self {
        let mut sp = Self {
            l1,
            l2,
            edges: Vec::new(),
            on_line: Vec::new(),
        };
        let n = points.len();
        // (vertex, next vertex, segment owning that edge), counter-clockwise
        let walk: Vec<(usize, usize, usize)> = if winding >= 0 {
            (0..n).map(|i| (i, (i + 1) % n, i)).collect()
        } else {
            (0..n).rev().map(|i| (i, (i + n - 1) % n, (i + n - 1) % n)).collect()
        };
        for (i, j, source) in walk {
            let (a, b) = (points[i], points[j]);
            let start_side = which_side(l1, l2, a);
            let end_side = which_side(l1, l2, b);
            sp.push(source, a, start_side);
            if start_side == Side::On {
                sp.on_line.push(sp.edges.len() - 1);
            } else if start_side != end_side && end_side != Side::On {
                let mut seg = Segment::new(a);
                seg.recalculate(b);
                // the line may stop short of this edge
                let Some(hit) = seg.intersect_2d(l1, l2) else {
                    continue;
                };
                sp.push(source, hit, Side::On);
                sp.on_line.push(sp.edges.len() - 1);
            }
        }
        let len = sp.edges.len();
        for i in 0..len {
            let next = (i + 1) % len;
            sp.edges[i].next = next;
            sp.edges[next].prev = i;
        }
        sp
    }

    fn push(&mut self, source: usize, start: DVec2, side: Side) {
        self.edges.push(Edge {
            source,
            start,
            side,
            next: 0,
            prev: 0,
            dist: 0.0,
            visited: false,
        });
    }

    fn sort(&mut self) {
        let dir = self.l2 - self.l1;
        let l1 = self.l1;
        let edges = &self.edges;
        self.on_line
            .sort_by(|&a, &b| dir.dot(edges[a].start - l1).total_cmp(&dir.dot(edges[b].start - l1)));
        let Some(&first) = self.on_line.first() else {
            return;
        };
        let origin = self.edges[first].start;
        for &e in &self.on_line {
            self.edges[e].dist = self.edges[e].start.distance(origin);
        }
    }

    fn sides(&self, e: usize) -> Result<(Side, Side), SplitError> {
        let edge = &self.edges[e];
        if edge.side != Side::On {
            return Err(SplitError::OffLine(edge.start));
        }
        Ok((self.edges[edge.prev].side, self.edges[edge.next].side))
    }

    fn is_source(&self, e: usize) -> Result<bool, SplitError> {
        use Side::*;
        let (prev, next) = self.sides(e)?;
        let d = self.edges[e].dist;
        Ok(matches!((prev, next), (Left, Right))
            || (prev == Left && next == On && self.edges[self.edges[e].next].dist < d)
            || (prev == On && next == Right && self.edges[self.edges[e].prev].dist < d))
    }

    fn is_destination(&self, e: usize) -> Result<bool, SplitError> {
        use Side::*;
        let (prev, next) = self.sides(e)?;
        Ok(matches!(
            (prev, next),
            (Right, Left) | (On, Left) | (Right, On) | (Right, Right) | (Left, Left)
        ))
    }

    fn split(&mut self) -> Result<(), SplitError> {
        let n = self.on_line.len();
        let mut reuse: Option<usize> = None;
        let mut i = 0;
        while i < n {
            let mut src = reuse.take();
            while src.is_none() && i < n {
                let e = self.on_line[i];
                if self.is_source(e)? {
                    src = Some(e);
                }
                i += 1;
            }

            let mut dst = None;
            while dst.is_none() && i < n {
                let e = self.on_line[i];
                if self.is_destination(e)? {
                    dst = Some(e);
                } else {
                    i += 1;
                }
            }

            if let (Some(s), Some(d)) = (src, dst) {
                self.bridge(s, d);
                self.verify_cycles()?;
                let s_prev = self.edges[s].prev;
                if self.edges[self.edges[s_prev].prev].side == Side::Left {
                    reuse = Some(s_prev);
                } else if self.edges[self.edges[d].next].side == Side::Right {
                    reuse = Some(d);
                }
            }
            i += 1;
        }
        Ok(())
    }

    fn bridge(&mut self, s: usize, d: usize) {
        let s2 = self.edges.len();
        self.edges.push(self.edges[s].clone());
        let d2 = self.edges.len();
        self.edges.push(self.edges[d].clone());

        self.edges[s2].next = d;
        self.edges[s2].prev = self.edges[s].prev;
        self.edges[d2].next = s;
        self.edges[d2].prev = self.edges[d].prev;

        let sp = self.edges[s].prev;
        self.edges[sp].next = s2;
        self.edges[s].prev = d2;
        let dp = self.edges[d].prev;
        self.edges[dp].next = d2;
        self.edges[d].prev = s2;
    }

    fn verify_cycles(&self) -> Result<(), SplitError> {
        let len = self.edges.len();
        for start in 0..len {
            let mut e = start;
            let mut count = 0;
            loop {
                if count > len {
                    return Err(SplitError::Cycle(self.edges[start].start));
                }
                e = self.edges[e].next;
                count += 1;
                if e == start {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Each closed loop as `(vertex, source segment)` pairs.
    fn collect(&mut self) -> Vec<Vec<(DVec2, usize)>> {
        let mut cycles = Vec::new();
        for start in 0..self.edges.len() {
            if self.edges[start].visited {
                continue;
            }
            let mut cycle = Vec::new();
            let mut e = start;
            loop {
                self.edges[e].visited = true;
                cycle.push((self.edges[e].start, self.edges[e].source));
                e = self.edges[e].next;
                if e == start {
                    break;
                }
            }
            cycles.push(cycle);
        }
        cycles
    }
}

/// Split sector `id` along the line through `l1` and `l2`.
///
/// The first piece replaces the sector in place and keeps its mobs; the
/// others are appended as new sectors. Pieces are linked to each other and to
/// the old neighbours wherever edges still match. Returns `Ok(None)` when the
/// line does not split the sector, and leaves the map untouched on error.
pub fn split_sector(
    map: &mut Map,
    dyns: &mut Dynamics,
    id: SectorId,
    l1: DVec2,
    l2: DVec2,
) -> Result<Option<Vec<SectorId>>, SplitError> {
    let sector = map.sector(id).ok_or(SplitError::NoSector(id))?;
    let points: Vec<DVec2> = sector.segments.iter().map(|s| s.p).collect();
    let mut sp = Splitter::new(l1, l2, &points, sector.winding);
    if sp.on_line.is_empty() {
        return Ok(None);
    }
    sp.sort();
    sp.split()?;
    let cycles = sp.collect();
    if cycles.len() == 1 && cycles[0].len() == points.len() {
        return Ok(None);
    }
    if let Some(bad) = cycles.iter().find(|c| c.len() < 3) {
        return Err(SplitError::Degenerate(bad.len()));
    }

    // clone attributes before touching anything
    let data = SectorData::capture(map, sector, dyns);
    let originals = sector.segments.clone();
    let neighbours: Vec<SectorId> = originals.iter().filter_map(|s| s.adjacent_sector).collect();
    let (floor_target, ceil_target) = (sector.floor_target, sector.ceil_target);
    let mut clones: Vec<super::Sector> = Vec::with_capacity(cycles.len().saturating_sub(1));
    for k in 1..cycles.len() {
        let mut s = match data.to_sector(map, dyns) {
            Ok(s) => s,
            Err(err) => {
                for s in clones {
                    s.release(dyns);
                }
                return Err(err.into());
            }
        };
        s.name = unique_name(map, &data.name, k);
        s.floor_target = floor_target;
        s.ceil_target = ceil_target;
        clones.push(s);
    }

    let build_loop = |cycle: &[(DVec2, usize)]| -> Vec<Segment> {
        cycle
            .iter()
            .map(|&(p, source)| {
                let mut seg = originals.get(source).cloned().unwrap_or_default();
                seg.p = p;
                seg.adjacent_sector = None;
                seg.adjacent_segment = None;
                seg
            })
            .collect()
    };

    // neighbours forget the old edges; they are re-linked below
    for &n in &neighbours {
        if let Some(ns) = map.sector_mut(n) {
            for seg in &mut ns.segments {
                if seg.adjacent_sector == Some(id) {
                    seg.adjacent_sector = None;
                    seg.adjacent_segment = None;
                }
            }
        }
    }

    let mut pieces = vec![id];
    if let Some(s) = map.sector_mut(id) {
        s.segments = build_loop(&cycles[0]);
    }
    for (mut s, cycle) in clones.into_iter().zip(&cycles[1..]) {
        s.segments = build_loop(cycle);
        pieces.push(map.add_sector(s));
    }
    for &p in &pieces {
        if let Some(s) = map.sector_mut(p) {
            let (b, t) = s.heights(dyns);
            s.recalculate(b, t);
        }
    }

    link_pieces(map, &pieces, &neighbours);
    map.recalculate(dyns);
    log::debug!("split sector {id} into {pieces:?}");
    Ok(Some(pieces))
}

fn unique_name(map: &Map, base: &str, k: usize) -> String {
    let mut n = k;
    loop {
        let name = format!("{base}_{n}");
        if map.sector_id(&name).is_none() {
            return name;
        }
        n += 1;
    }
}

/// Portal every piece edge that matches an edge of another piece or of an old
/// neighbour. Edges between pieces are opened up (no mid surface).
fn link_pieces(map: &mut Map, pieces: &[SectorId], neighbours: &[SectorId]) {
    for (pi, &a) in pieces.iter().enumerate() {
        let candidates = pieces[pi + 1..].iter().chain(neighbours.iter());
        for &b in candidates {
            if a == b {
                continue;
            }
            let bridge = pieces.contains(&b);
            let n = map.sector(a).map_or(0, |s| s.segments.len());
            for i in 0..n {
                let Some(seg) = map.sector(a).and_then(|s| s.segments.get(i)).cloned() else {
                    continue;
                };
                if seg.is_portal() {
                    continue;
                }
                let Some(k) = map
                    .sector(b)
                    .and_then(|s| s.segments.iter().position(|o| !o.is_portal() && o.matches(&seg)))
                else {
                    continue;
                };
                if let Some(s) = map.sector_mut(a).and_then(|s| s.segments.get_mut(i)) {
                    s.adjacent_sector = Some(b);
                    s.adjacent_segment = Some(k);
                    if bridge {
                        s.mid.material = None;
                    }
                }
                if let Some(o) = map.sector_mut(b).and_then(|s| s.segments.get_mut(k)) {
                    o.adjacent_sector = Some(a);
                    o.adjacent_segment = Some(i);
                    if bridge {
                        o.mid.material = None;
                    }
                }
            }
        }
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
