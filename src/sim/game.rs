//! A loaded level driven by the fixed-step simulation.
//!
//! [`Game`] pairs the [`Simulation`] kernel with a [`Level`] (map, entities and
//! player). The level is the tick handler, so `sim.advance(ns, &mut level)`
//! borrows the two halves separately.

use std::collections::{BTreeSet, HashMap};

use glam::DVec3;
use hecs::{Entity, World};
use smallvec::SmallVec;

use super::components::{Alive, Body, InputCmd, Light, Player};
use super::events::{Event, EventKind};
use super::mob::{capture_sector_mobs, despawn_mob, spawn_mob};
use super::physics::integrate;
use super::sectors::{doors, floor_ceiling, hazards, swim};
use super::systems::{moving_lights, player_camera, player_input, player_view, tick_alive};
use super::tic::{Clock, Simulation, TickHandler};
use crate::defs::{PLAYER_MAX_HEALTH, TICK_NS};
use crate::world::{Camera, Map, MapData, MapError, MobData, MobKindData, lightmap, pvs};

/* ----------------------------------------------------------------- */
/*  Action queue – applied once the body borrows are released         */
/* ----------------------------------------------------------------- */
enum Action {
    Despawn(Entity),
}
type Actions = SmallVec<[Action; 4]>;

/// Everything the simulation mutates.
pub struct Level {
    pub map: Map,
    pub world: World,
    pub player: Option<Entity>,
    /// Input applied on every tick until replaced.
    pub input: InputCmd,
    /// Events delivered since the last frame started.
    pub recent: Vec<Event>,
    scratch: Vec<EventKind>,
}

impl Level {
    pub fn new(map: Map) -> Self {
        Self {
            map,
            world: World::new(),
            player: None,
            input: InputCmd::default(),
            recent: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Mobs simulated this tick: those in the player's mob-PVS, or all of them
    /// when there is no placed player.
    fn active(&self) -> Vec<Entity> {
        let around = self
            .player
            .and_then(|p| self.world.get::<&Body>(p).ok().and_then(|b| b.sector))
            .and_then(|id| self.map.sector(id));
        match around {
            Some(sector) => {
                let mut set: BTreeSet<Entity> = sector
                    .pvs_mob
                    .iter()
                    .filter_map(|&id| self.map.sector(id))
                    .flat_map(|s| s.mobs.iter().copied())
                    .collect();
                set.extend(self.player);
                set.into_iter().collect()
            }
            None => self
                .world
                .query::<&Body>()
                .iter()
                .map(|(e, _)| e)
                .collect(),
        }
    }

    fn positions(&self, sim: &Simulation) -> HashMap<Entity, DVec3> {
        self.world
            .query::<&Body>()
            .iter()
            .filter_map(|(e, b)| sim.dynamics.vec3s.get(b.pos).map(|v| (e, v.now)))
            .collect()
    }
}

impl TickHandler for Level {
    fn new_frame(&mut self, _sim: &mut Simulation) {
        self.recent.clear();
    }

    fn integrate(&mut self, sim: &mut Simulation) {
        let mut events = std::mem::take(&mut self.scratch);
        let dyns = &mut sim.dynamics;

        if let Some(p) = self.player {
            player_input(&mut self.world, dyns, p, self.input);
        }
        tick_alive(&mut self.world);

        let mut queue = Actions::new();
        for e in self.active() {
            let Ok((body, alive)) = self
                .world
                .query_one_mut::<(&mut Body, Option<&mut Alive>)>(e)
            else {
                continue;
            };
            swim(dyns, body);
            integrate(&mut self.map, dyns, e, body, &mut events);
            if !body.removed() {
                floor_ceiling(&mut self.map, dyns, e, body, &mut events);
            }
            if let Some(alive) = alive {
                hazards(&self.map, e, body, alive, &mut events);
            }
            if body.removed() {
                queue.push(Action::Despawn(e));
            }
        }

        let positions = self.positions(sim);
        let dyns = &mut sim.dynamics;
        doors(&mut self.map, dyns, |m| positions.get(&m).copied(), &mut events);
        moving_lights(&mut self.world, &mut self.map, dyns);

        // side-effect phase
        for act in queue {
            match act {
                Action::Despawn(e) => {
                    if self.player == Some(e) {
                        self.player = None;
                    }
                    despawn_mob(&mut self.world, &mut self.map, dyns, e);
                }
            }
        }
        player_view(&mut self.world, dyns);

        for kind in events.drain(..) {
            sim.push_event(kind);
        }
        self.scratch = events;
    }

    fn event(&mut self, _sim: &mut Simulation, ev: Event) {
        log::debug!("t={} {:?}", ev.timestamp, ev.kind);
        self.recent.push(ev);
    }
}

/// A running level.
pub struct Game {
    pub sim: Simulation,
    pub level: Level,
}

impl Game {
    pub fn new(sim: Simulation, map: Map) -> Self {
        Self {
            sim,
            level: Level::new(map),
        }
    }

    /// Build the map, spawn its mobs and make sure there is a player.
    pub fn from_data(data: MapData, clock: Box<dyn Clock>) -> Result<Self, MapError> {
        let mut sim = Simulation::with_clock(clock);
        let (map, mobs) = data.build(&mut sim.dynamics)?;
        let mut game = Self::new(sim, map);
        for (_, mob) in &mobs {
            game.spawn(mob);
        }
        if game.level.player.is_none() {
            game.spawn_player();
        }
        game.collect_lights();
        Ok(game)
    }

    /// Spawn a mob. The first player spawned becomes the controlled one.
    pub fn spawn(&mut self, data: &MobData) -> Entity {
        let mut events = Vec::new();
        let e = spawn_mob(
            &mut self.level.world,
            &mut self.level.map,
            &mut self.sim.dynamics,
            data,
            &mut events,
        );
        for kind in events {
            self.sim.push_event(kind);
        }
        if matches!(data.kind, MobKindData::Player { .. }) && self.level.player.is_none() {
            self.level.player = Some(e);
        }
        e
    }

    /// Player at the map's spawn point.
    pub fn spawn_player(&mut self) -> Entity {
        let mut data = MobData::new(
            MobKindData::Player {
                health: PLAYER_MAX_HEALTH,
            },
            self.level.map.spawn,
        );
        data.angle = self.level.map.spawn_angle;
        self.spawn(&data)
    }

    pub fn despawn(&mut self, e: Entity) {
        if self.level.player == Some(e) {
            self.level.player = None;
        }
        despawn_mob(
            &mut self.level.world,
            &mut self.level.map,
            &mut self.sim.dynamics,
            e,
        );
    }

    /// Run exactly `n` ticks, independent of the clock.
    pub fn tick(&mut self, n: usize) {
        for _ in 0..n {
            self.sim.advance(TICK_NS, &mut self.level);
        }
    }

    /// Advance by however much time the clock reports.
    pub fn step(&mut self) {
        self.sim.step(&mut self.level);
    }

    pub fn set_input(&mut self, cmd: InputCmd) {
        self.level.input = cmd;
    }

    pub fn camera(&self, fov: f64) -> Option<Camera> {
        let p = self.level.player?;
        player_camera(&self.level.world, &self.sim.dynamics, p, fov)
    }

    pub fn player_tint(&self) -> glam::DVec4 {
        self.level
            .player
            .and_then(|p| self.level.world.get::<&Player>(p).ok().map(|pl| pl.frame_tint))
            .unwrap_or(glam::DVec4::ZERO)
    }

    pub fn player_sector(&self) -> Option<crate::world::SectorId> {
        let p = self.level.player?;
        self.level.world.get::<&Body>(p).ok()?.sector
    }

    /// Rebuild every sector's list of visible lights.
    pub fn collect_lights(&mut self) {
        let world = &self.level.world;
        pvs::collect_lights(&mut self.level.map, |e| world.get::<&Light>(e).is_ok());
    }

    /// Bring the lightmaps around the player up to date for this frame.
    pub fn refresh_lights(&mut self) {
        let Some(from) = self.player_sector() else {
            return;
        };
        self.collect_lights();
        let world = &self.level.world;
        let dyns = &self.sim.dynamics;
        lightmap::refresh(&mut self.level.map, dyns, from, self.sim.frame, |e| {
            let mut q = world.query_one::<(&Body, &Light)>(e).ok()?;
            let (body, light) = q.get()?;
            let pos = dyns.vec3s.get(body.pos)?.now;
            Some(light.source(pos + DVec3::new(0.0, 0.0, body.height * 0.5)))
        });
    }

    /// Serialisable snapshot of the whole level, mobs included.
    pub fn save(&self) -> MapData {
        let world = &self.level.world;
        let map = &self.level.map;
        let dyns = &self.sim.dynamics;
        MapData::capture(map, dyns, |id| capture_sector_mobs(world, map, dyns, id))
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
