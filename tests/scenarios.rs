//! End-to-end behaviour of a running level: mobs, sector behaviours,
//! interpolation, serialization and a rendered frame.

use approx::assert_relative_eq;
use glam::{DVec2, DVec3, DVec4};
use proptest::prelude::*;

use yaportal_rs::defs::{DOOR_SPEED, MAX_VIEW_DISTANCE, PLAYER_HURT_TIME, TICK_NS};
use yaportal_rs::renderer::{RendererExt, Software, View};
use yaportal_rs::sim::{Alive, Body, CollisionResponse, Dynamics, Game, ManualClock, Simulation};
use yaportal_rs::world::{
    DoorState, Image, Map, MapBuilder, MapData, Material, MaterialKind, MobData, MobKindData,
    Sampled, Sampler, Sector, SectorKind, Segment, Solid, split_sector,
};

/*──────────────────────────── helpers ─────────────────────────────────*/

fn game_with(build: impl FnOnce(&mut MapBuilder)) -> Game {
    let mut sim = Simulation::with_clock(Box::new(ManualClock::default()));
    let mut b = MapBuilder::new("scenario", &mut sim.dynamics);
    build(&mut b);
    let map = b.build();
    Game::new(sim, map)
}

/// Two rooms side by side, joined along `x = 100`.
fn two_rooms(b: &mut MapBuilder, east_end: f64) {
    b.sector("s1", 0.0, 100.0)
        .rect(0.0, 0.0, 100.0, 100.0)
        .portal(1, "s2")
        .done();
    b.sector("s2", 0.0, 100.0)
        .rect(100.0, 0.0, east_end, 100.0)
        .portal(3, "s1")
        .done();
}

fn kinematic(pos: DVec3, vel: DVec3) -> MobData {
    let mut m = MobData::new(MobKindData::Mob, pos);
    m.vel = vel;
    m
}

fn body(game: &Game, e: hecs::Entity) -> Body {
    (*game.level.world.get::<&Body>(e).unwrap()).clone()
}

fn pos(game: &Game, e: hecs::Entity) -> DVec3 {
    game.sim.dynamics.vec3s[body(game, e).pos].now
}

fn vel(game: &Game, e: hecs::Entity) -> DVec3 {
    game.sim.dynamics.vec3s[body(game, e).vel].now
}

fn solid(name: &str, c: DVec4) -> Material {
    Material::new(
        name,
        MaterialKind::Sampled(Sampled {
            sampler: Sampler::Solid(Solid { color: c }),
            is_liquid: false,
        }),
    )
}

/*──────────────────────────── portal traversal ────────────────────────*/

#[test]
fn mob_crosses_into_the_next_room_and_stops_at_its_far_wall() {
    let mut game = game_with(|b| two_rooms(b, 200.0));
    let e = game.spawn(&kinematic(
        DVec3::new(90.0, 50.0, 10.0),
        DVec3::new(200.0, 0.0, 0.0),
    ));
    game.tick(128);

    assert_eq!(body(&game, e).sector, Some(1));
    let x = pos(&game, e).x;
    assert!((189.0..=190.0 + 1e-6).contains(&x), "x = {x}");
}

#[test]
fn mob_travels_a_full_second_through_a_portal() {
    let mut game = game_with(|b| two_rooms(b, 400.0));
    let e = game.spawn(&kinematic(
        DVec3::new(90.0, 50.0, 10.0),
        DVec3::new(200.0, 0.0, 0.0),
    ));
    game.tick(128);

    assert_eq!(body(&game, e).sector, Some(1));
    let x = pos(&game, e).x;
    assert!((285.0..=295.0).contains(&x), "x = {x}");
    assert!(game.level.map.sectors[1].mobs.contains(&e));
    assert!(game.level.map.sectors[0].mobs.is_empty());
}

/*──────────────────────────── sector behaviours ───────────────────────*/

#[test]
fn door_opens_for_a_nearby_mob_and_closes_behind_it() {
    let mut game = game_with(|b| {
        b.sector("door", 0.0, 80.0)
            .rect(0.0, 0.0, 40.0, 100.0)
            .portal(1, "hall")
            .kind(SectorKind::VerticalDoor {
                state: DoorState::Closed,
                vel_z: 0.0,
            })
            .done();
        b.sector("hall", 0.0, 100.0)
            .rect(40.0, 0.0, 400.0, 100.0)
            .portal(3, "door")
            .done();
    });
    let top = game.level.map.sectors[0].top_z;
    game.sim.dynamics.scalars[top].set_now(0.0);

    let e = game.spawn(&kinematic(DVec3::new(70.0, 50.0, 0.0), DVec3::ZERO));
    game.tick(1);
    assert_eq!(
        game.level.map.sectors[0].kind,
        SectorKind::VerticalDoor {
            state: DoorState::Opening,
            vel_z: DOOR_SPEED
        }
    );

    let mut ticks = 0;
    while game.sim.dynamics.scalars[top].now < 80.0 {
        game.tick(1);
        ticks += 1;
        assert!(ticks < 256, "door never opened");
    }
    assert!(matches!(
        game.level.map.sectors[0].kind,
        SectorKind::VerticalDoor { state: DoorState::Open, .. }
    ));

    let p = body(&game, e).pos;
    game.sim.dynamics.vec3s[p].set_now(DVec3::new(350.0, 50.0, 0.0));
    game.tick(1);
    assert!(matches!(
        game.level.map.sectors[0].kind,
        SectorKind::VerticalDoor { state: DoorState::Closing, .. }
    ));

    let mut ticks = 0;
    while game.sim.dynamics.scalars[top].now > 0.0 {
        game.tick(1);
        ticks += 1;
        assert!(ticks < 256, "door never closed");
    }
    assert_eq!(
        game.level.map.sectors[0].kind,
        SectorKind::VerticalDoor {
            state: DoorState::Closed,
            vel_z: 0.0
        }
    );
}

#[test]
fn toxic_sector_damage_waits_for_the_hurt_timer() {
    let mut game = game_with(|b| {
        b.sector("pool", 0.0, 100.0)
            .rect(0.0, 0.0, 100.0, 100.0)
            .kind(SectorKind::Toxic { hurt: 5.0 })
            .done();
    });
    let e = game.spawn(&MobData::new(
        MobKindData::AliveMob { health: 100.0 },
        DVec3::new(50.0, 50.0, 0.0),
    ));
    let alive = |g: &Game| *g.level.world.get::<&Alive>(e).unwrap();

    game.tick(1);
    assert_eq!(alive(&game).health, 95.0);
    assert_eq!(alive(&game).hurt_time, PLAYER_HURT_TIME);

    game.tick(1);
    assert_eq!(alive(&game).health, 95.0);

    game.tick(PLAYER_HURT_TIME as usize + 1);
    assert_eq!(alive(&game).health, 90.0);
}

#[test]
fn diagonal_mob_slides_along_a_wall() {
    let mut game = game_with(|b| {
        b.sector("room", 0.0, 100.0)
            .rect(0.0, 0.0, 100.0, 100.0)
            .done();
    });
    let mut data = kinematic(DVec3::new(80.0, 20.0, 0.0), DVec3::new(50.0, 50.0, 0.0));
    data.collision_response = CollisionResponse::Slide;
    let e = game.spawn(&data);
    game.tick(64);

    let v = vel(&game, e);
    assert!(v.x.abs() < 1e-9, "vel = {v}");
    assert_relative_eq!(v.y, 50.0, epsilon = 1e-9);
    let p = pos(&game, e);
    assert!(100.0 - p.x >= data.bounding_radius - 1e-6, "pos = {p}");
    assert!(p.y > 40.0);
}

/*──────────────────────────── textures ────────────────────────────────*/

#[test]
fn bilinear_sample_between_four_texels_is_their_mean() {
    let (r, g, b, w) = (
        [255, 0, 0, 255],
        [0, 255, 0, 255],
        [0, 0, 255, 255],
        [255, 255, 255, 255],
    );
    let mut img = Image::from_rgba(2, 2, vec![r, g, b, w]).unwrap();
    img.filter = true;
    let c = img.sample(0.5, 0.5, 1.0);
    assert!((c - DVec4::new(0.5, 0.5, 0.5, 1.0)).abs().max_element() < 1e-9, "{c}");
}

#[test]
fn small_scale_picks_the_matching_mip_level() {
    let img = Image::from_rgba(256, 256, vec![[10, 20, 30, 255]; 256 * 256]).unwrap();
    assert_eq!(img.select_mip(0.03).map(|m| m.h), Some(8));
    assert_eq!(img.select_mip(1.0).map(|m| m.h), Some(256));
}

/*──────────────────────────── topology ────────────────────────────────*/

#[test]
fn every_portal_has_one_matching_partner() {
    let mut dyns = Dynamics::default();
    let mut b = MapBuilder::new("linked", &mut dyns);
    b.sector("west", 0.0, 100.0)
        .points(&[
            (0.0, 0.0),
            (100.0, 0.0),
            (100.0, 40.0),
            (100.0, 60.0),
            (100.0, 100.0),
            (0.0, 100.0),
        ])
        .portal(2, "gap")
        .done();
    b.sector("gap", 0.0, 80.0)
        .rect(100.0, 40.0, 120.0, 60.0)
        .portal(1, "east")
        .portal(3, "west")
        .done();
    b.sector("east", 10.0, 100.0)
        .points(&[
            (120.0, 0.0),
            (220.0, 0.0),
            (220.0, 100.0),
            (120.0, 100.0),
            (120.0, 60.0),
            (120.0, 40.0),
        ])
        .portal(4, "gap")
        .done();
    let map = b.build();

    let mut portals = 0;
    for (id, sector) in map.sectors.iter().enumerate() {
        for seg in &sector.segments {
            let Some(adj) = seg.adjacent_sector else { continue };
            portals += 1;
            let other = map.sector(adj).unwrap();
            let partners: Vec<&Segment> = other.segments.iter().filter(|s| s.matches(seg)).collect();
            assert_eq!(partners.len(), 1, "{}: {:?}", sector.name, seg.p);
            assert_eq!(partners[0].adjacent_sector, Some(id as u32));
        }
    }
    assert_eq!(portals, 4);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn convex_polygons_face_outward_and_split_cleanly(
        angles in prop::collection::vec(0.0f64..360.0, 3..12),
        radius in 20.0f64..500.0,
        cx in -1000.0f64..1000.0,
        cy in -1000.0f64..1000.0,
        cut in -0.5f64..0.5,
    ) {
        let mut angles = angles;
        angles.sort_by(f64::total_cmp);
        angles.dedup_by(|a, b| (*a - *b).abs() < 5.0);
        if angles.len() > 1 && angles[0] + 360.0 - angles[angles.len() - 1] < 5.0 {
            angles.pop();
        }
        prop_assume!(angles.len() >= 3);

        let mut dyns = Dynamics::default();
        let mut sector = Sector::new("poly", &mut dyns, 0.0, 100.0);
        sector.segments = angles
            .iter()
            .map(|a| {
                let (s, c) = a.to_radians().sin_cos();
                Segment::new(DVec2::new(cx + radius * c, cy + radius * s))
            })
            .collect();
        sector.recalculate(0.0, 100.0);

        let center = sector.center.truncate();
        prop_assert!(sector.is_simple());
        prop_assert!(sector.is_point_inside_2d(center));
        for seg in &sector.segments {
            prop_assert!(seg.which_side(center) < 0.0, "normal {:?} at {:?}", seg.normal, seg.p);
        }

        let area = sector.area().abs();
        let mut map = Map::new("poly");
        let id = map.add_sector(sector);
        map.recalculate(&dyns);

        // a vertical line crossing the middle third of the polygon
        let x = center.x + cut * radius * 0.5;
        let pieces = split_sector(&mut map, &mut dyns, id, DVec2::new(x, cy - 2000.0), DVec2::new(x, cy + 2000.0));
        prop_assume!(matches!(pieces, Ok(Some(_))));
        let pieces = pieces.unwrap().unwrap();
        prop_assert_eq!(pieces.len(), 2);
        let total: f64 = pieces.iter().map(|&p| map.sector(p).unwrap().area().abs()).sum();
        prop_assert!((total - area).abs() < 1e-6 * area.max(1.0), "{} vs {}", total, area);
    }

    #[test]
    fn bouncing_mobs_stay_inside_their_sector(
        vx in -600.0f64..600.0,
        vy in -600.0f64..600.0,
        x in 20.0f64..180.0,
        y in 20.0f64..80.0,
    ) {
        let mut game = game_with(|b| two_rooms(b, 200.0));
        let mut data = kinematic(DVec3::new(x, y, 10.0), DVec3::new(vx, vy, 0.0));
        data.collision_response = CollisionResponse::Bounce;
        let e = game.spawn(&data);

        for _ in 0..128 {
            game.tick(1);
            let b = body(&game, e);
            let p = pos(&game, e).truncate();
            match b.sector {
                Some(id) => prop_assert!(game.level.map.sector(id).unwrap().is_point_inside_2d(p), "{:?} outside {}", p, id),
                None => prop_assert!(b.removed()),
            }
        }
    }
}

/*──────────────────────────── interpolation ───────────────────────────*/

#[test]
fn render_state_is_the_blend_of_prev_and_now() {
    let clock = ManualClock::default();
    let mut game = {
        let mut sim = Simulation::with_clock(Box::new(clock.clone()));
        let mut b = MapBuilder::new("blend", &mut sim.dynamics);
        b.spawn(DVec3::new(50.0, 50.0, 30.0), 0.0);
        two_rooms(&mut b, 400.0);
        let map = b.build();
        Game::new(sim, map)
    };
    game.spawn_player();
    game.spawn(&kinematic(
        DVec3::new(120.0, 50.0, 10.0),
        DVec3::new(150.0, 20.0, 0.0),
    ));

    clock.advance(TICK_NS * 5 + TICK_NS / 3);
    game.step();
    let alpha = game.sim.render_blend;
    assert!(alpha > 0.3 && alpha < 0.4, "alpha = {alpha}");

    for v in game.sim.dynamics.vec3s.iter() {
        if v.no_render_blend || v.on_render.is_some() {
            continue;
        }
        let expected = v.lerp(v.prev, v.now, alpha);
        assert!((v.render - expected).length() < 1e-9);
    }
    for v in game.sim.dynamics.scalars.iter() {
        if v.no_render_blend || v.on_render.is_some() {
            continue;
        }
        assert!((v.render - v.lerp(v.prev, v.now, alpha)).abs() < 1e-9);
    }
}

/*──────────────────────────── serialization ───────────────────────────*/

#[test]
fn saved_level_loads_back_unchanged() {
    let mut game = game_with(|b| {
        let wall = b.material(solid("wall", DVec4::new(0.5, 0.2, 0.1, 1.0)));
        b.spawn(DVec3::new(50.0, 50.0, 0.0), 90.0);
        b.sector("s1", 0.0, 100.0)
            .rect(0.0, 0.0, 100.0, 100.0)
            .portal(1, "s2")
            .walls(wall)
            .floor_material(wall)
            .done();
        b.sector("s2", 8.0, 120.0)
            .rect(100.0, 0.0, 200.0, 100.0)
            .portal(3, "s1")
            .slope(0.0, 0.05)
            .kind(SectorKind::Toxic { hurt: 3.0 })
            .ceil_material(wall)
            .done();
    });
    game.spawn_player();
    game.spawn(&MobData::new(
        MobKindData::AliveMob { health: 40.0 },
        DVec3::new(150.0, 50.0, 8.0),
    ));
    let saved = game.save();

    let json = saved.to_json().unwrap();
    let parsed = MapData::from_json(&json).unwrap();
    assert_eq!(parsed, saved);

    let reloaded = Game::from_data(parsed, Box::new(ManualClock::default())).unwrap();
    assert_eq!(reloaded.level.map.sectors.len(), 2);
    assert_eq!(reloaded.level.map.sectors[1].kind, SectorKind::Toxic { hurt: 3.0 });
    assert_eq!(reloaded.level.map.sectors[0].segments[1].adjacent_sector, Some(1));
    assert_eq!(reloaded.level.world.len(), 2);
    assert_eq!(reloaded.save().sectors, saved.sectors);
}

/*──────────────────────────── rendering ───────────────────────────────*/

#[test]
fn player_view_is_bounded_by_the_wall_ahead() {
    const W: usize = 48;
    const H: usize = 32;
    let mut game = game_with(|b| {
        let wall = b.material(solid("wall", DVec4::new(1.0, 0.0, 0.0, 1.0)));
        b.spawn(DVec3::new(50.0, 50.0, 0.0), 0.0);
        b.sector("room", 0.0, 100.0)
            .rect(0.0, 0.0, 100.0, 100.0)
            .walls(wall)
            .floor_material(wall)
            .ceil_material(wall)
            .done();
    });
    game.spawn_player();
    game.tick(16);

    let camera = game.camera(90.0).unwrap();
    let view = View {
        map: &game.level.map,
        dyns: &game.sim.dynamics,
        camera,
        sector: game.player_sector().unwrap(),
        tint: DVec4::ZERO,
    };
    let mut sw = Software::new(MAX_VIEW_DISTANCE, 2, true);
    let mut frame = Vec::new();
    sw.draw_frame(W, H, &view, |fb, _, _| frame = fb.to_vec());

    assert!(frame.iter().all(|&px| px == 0xFF0000));
    let ahead = 100.0 - camera.pos().x;
    for y in 0..H {
        let d = sw.depth(W / 2, y).unwrap();
        assert!(d > 0.0 && d <= ahead + 1e-6, "row {y}: {d}");
    }
}
