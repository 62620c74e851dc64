use glam::{DVec2, DVec3, DVec4};
use hecs::{Entity, World};

use super::components::{Alive, Body, InputCmd, Light, Player};
use super::dynamic::Dynamics;
use crate::defs::{
    BodyFlags, PLAYER_CROUCH_HEIGHT, PLAYER_HEIGHT, PLAYER_HURT_TIME, PLAYER_JUMP_FORCE,
    PLAYER_SWIM_STRENGTH, PLAYER_TURN_SPEED, PLAYER_WALK_FORCE, TICK_S,
};
use crate::math::normalize_angle;
use crate::world::{Camera, Map, lightmap};

/// Blue wash while the player is under water.
pub const UNDERWATER_TINT: DVec4 = DVec4::new(75.0 / 255.0, 147.0 / 255.0, 1.0, 90.0 / 255.0);
/// Red flash after taking damage, faded with the remaining hurt time.
pub const HURT_TINT: DVec4 = DVec4::new(1.0, 0.0, 0.0, 0.5);
/// Eye height as a fraction of body height.
const EYE_LEVEL: f64 = 0.9;
/// Units of vertical bob at full stride.
const BOB_AMPLITUDE: f64 = 2.0;

/* ── Player input ─────────────────────────────────────────────────── */

/// Turn, walk, jump, swim and crouch from one tick of input.
pub fn player_input(world: &mut World, dyns: &mut Dynamics, player: Entity, cmd: InputCmd) {
    let Ok((body, pl)) = world.query_one_mut::<(&mut Body, &mut Player)>(player) else {
        return;
    };

    /* 1. turn */
    if cmd.turn != 0.0 {
        let angle = &mut dyns.scalars[body.angle].now;
        *angle = normalize_angle(*angle + cmd.turn * PLAYER_TURN_SPEED * TICK_S);
    }

    let swimming = body.flags.contains(BodyFlags::SWIMMING);

    /* 2. walk: only with something to push against */
    if (cmd.forward != 0.0 || cmd.strafe != 0.0) && (body.on_ground() || swimming) {
        let (s, c) = dyns.scalars[body.angle].now.to_radians().sin_cos();
        let fwd = DVec2::new(c, s);
        let dir = (fwd * cmd.forward) - (fwd.perp() * cmd.strafe);
        body.force += (dir.normalize_or_zero() * PLAYER_WALK_FORCE).extend(0.0);
    }

    /* 3. up */
    if cmd.jump {
        if swimming {
            body.force.z += PLAYER_SWIM_STRENGTH;
        } else if body.on_ground() {
            body.force.z += PLAYER_JUMP_FORCE;
        }
    }

    /* 4. crouch */
    pl.crouching = cmd.crouch;
    body.height = if cmd.crouch {
        PLAYER_CROUCH_HEIGHT
    } else {
        PLAYER_HEIGHT
    };
}

/* ── Per-tick bookkeeping ─────────────────────────────────────────── */

/// Count down invulnerability.
pub fn tick_alive(world: &mut World) {
    for (_, alive) in world.query_mut::<&mut Alive>() {
        alive.hurt_time = alive.hurt_time.saturating_sub(1);
    }
}

/// View bob and frame tint for every player.
pub fn player_view(world: &mut World, dyns: &Dynamics) {
    for (_, (body, pl, alive)) in world.query_mut::<(&Body, &mut Player, Option<&Alive>)>() {
        let speed = dyns.vec3s[body.vel].now.truncate().length();
        if body.on_ground() && speed > 1.0 {
            pl.bob = normalize_angle(pl.bob + speed * TICK_S * 8.0);
        }
        pl.frame_tint = frame_tint(body.flags, alive.map_or(0, |a| a.hurt_time));
    }
}

/// Colour washed over the frame for a player in this state.
pub fn frame_tint(flags: BodyFlags, hurt_time: u32) -> DVec4 {
    if flags.contains(BodyFlags::SWIMMING) {
        UNDERWATER_TINT
    } else if hurt_time > 0 {
        let fade = hurt_time as f64 / PLAYER_HURT_TIME as f64;
        DVec4::new(HURT_TINT.x, HURT_TINT.y, HURT_TINT.z, HURT_TINT.w * fade)
    } else {
        DVec4::ZERO
    }
}

/// Dirty the lightmaps around every light that moved this tick.
pub fn moving_lights(world: &mut World, map: &mut Map, dyns: &Dynamics) {
    for (_, (body, _)) in world.query_mut::<(&Body, &Light)>() {
        let pos = &dyns.vec3s[body.pos];
        if pos.now == pos.prev {
            continue;
        }
        if let Some(id) = body.sector {
            lightmap::invalidate(map, id);
        }
    }
}

/* ── Camera ───────────────────────────────────────────────────────── */

/// Interpolated eye of `player`.
pub fn player_camera(world: &World, dyns: &Dynamics, player: Entity, fov: f64) -> Option<Camera> {
    let mut q = world.query_one::<(&Body, Option<&Player>)>(player).ok()?;
    let (body, pl) = q.get()?;
    let pos = dyns.vec3s[body.pos].render;
    let bob = pl.map_or(0.0, |p| p.bob.to_radians().sin() * BOB_AMPLITUDE);
    let eye = pos + DVec3::new(0.0, 0.0, body.height * EYE_LEVEL + bob);
    Some(Camera::new(eye, dyns.scalars[body.angle].render, fov))
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::components::player_body;
    use approx::assert_relative_eq;

    fn spawn_player(world: &mut World, dyns: &mut Dynamics) -> Entity {
        world.spawn(player_body(dyns, DVec3::ZERO, 0.0))
    }

    #[test]
    fn walking_needs_ground() {
        let mut world = World::new();
        let mut dyns = Dynamics::default();
        let p = spawn_player(&mut world, &mut dyns);
        let cmd = InputCmd {
            forward: 1.0,
            ..Default::default()
        };

        player_input(&mut world, &mut dyns, p, cmd);
        assert_eq!(world.get::<&Body>(p).unwrap().force, DVec3::ZERO);

        world.get::<&mut Body>(p).unwrap().flags.insert(BodyFlags::ON_GROUND);
        player_input(&mut world, &mut dyns, p, cmd);
        let f = world.get::<&Body>(p).unwrap().force;
        assert_relative_eq!(f.x, PLAYER_WALK_FORCE);
        assert_relative_eq!(f.y, 0.0);
    }

    #[test]
    fn strafe_right_is_clockwise_of_forward() {
        let mut world = World::new();
        let mut dyns = Dynamics::default();
        let p = spawn_player(&mut world, &mut dyns);
        world.get::<&mut Body>(p).unwrap().flags.insert(BodyFlags::ON_GROUND);
        let cmd = InputCmd {
            strafe: 1.0,
            ..Default::default()
        };
        player_input(&mut world, &mut dyns, p, cmd);
        // facing east, right is south
        let f = world.get::<&Body>(p).unwrap().force;
        assert!(f.y < 0.0);
        assert_relative_eq!(f.x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn turning_and_crouching() {
        let mut world = World::new();
        let mut dyns = Dynamics::default();
        let p = spawn_player(&mut world, &mut dyns);
        let cmd = InputCmd {
            turn: 1.0,
            crouch: true,
            ..Default::default()
        };
        player_input(&mut world, &mut dyns, p, cmd);
        let body = world.get::<&Body>(p).unwrap();
        assert_relative_eq!(dyns.scalars[body.angle].now, PLAYER_TURN_SPEED * TICK_S);
        assert_eq!(body.height, PLAYER_CROUCH_HEIGHT);
        assert!(world.get::<&Player>(p).unwrap().crouching);
    }

    #[test]
    fn jump_only_from_the_ground() {
        let mut world = World::new();
        let mut dyns = Dynamics::default();
        let p = spawn_player(&mut world, &mut dyns);
        let cmd = InputCmd {
            jump: true,
            ..Default::default()
        };
        player_input(&mut world, &mut dyns, p, cmd);
        assert_eq!(world.get::<&Body>(p).unwrap().force.z, 0.0);
        world.get::<&mut Body>(p).unwrap().flags.insert(BodyFlags::ON_GROUND);
        player_input(&mut world, &mut dyns, p, cmd);
        assert_relative_eq!(world.get::<&Body>(p).unwrap().force.z, PLAYER_JUMP_FORCE);
    }

    #[test]
    fn tint_prefers_water_then_fades_hurt() {
        assert_eq!(frame_tint(BodyFlags::SWIMMING, 10), UNDERWATER_TINT);
        assert_eq!(frame_tint(BodyFlags::empty(), 0), DVec4::ZERO);
        let half = frame_tint(BodyFlags::empty(), PLAYER_HURT_TIME / 2);
        assert_relative_eq!(half.w, HURT_TINT.w * 0.5);
    }

    #[test]
    fn hurt_time_counts_down() {
        let mut world = World::new();
        let e = world.spawn((Alive {
            health: 10.0,
            hurt_time: 2,
        },));
        tick_alive(&mut world);
        tick_alive(&mut world);
        tick_alive(&mut world);
        assert_eq!(world.get::<&Alive>(e).unwrap().hurt_time, 0);
    }

    #[test]
    fn camera_sits_at_eye_level() {
        let mut world = World::new();
        let mut dyns = Dynamics::default();
        let p = spawn_player(&mut world, &mut dyns);
        let cam = player_camera(&world, &dyns, p, 90.0).unwrap();
        assert_relative_eq!(cam.pos().z, PLAYER_HEIGHT * EYE_LEVEL);
    }
}
