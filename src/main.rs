//! Minimal top-down map viewer.
//!
//! ```bash
//! cargo run --release --bin yaportal_rs -- demo.json
//! ```
//!
//! Solid walls are white, portals grey, mobs are red crosses. The simulation
//! keeps running so doors and falling mobs can be watched from above.

use std::path::PathBuf;

use clap::Parser;
use glam::DVec2;
use minifb::{Key, Window, WindowOptions};

use yaportal_rs::logging;
use yaportal_rs::sim::{Body, Game, SystemClock};
use yaportal_rs::world::serial::load_map;

const WIDTH: usize = 1024;
const HEIGHT: usize = 768;

const WALL: u32 = 0x00_FFFFFF;
const PORTAL: u32 = 0x00_606060;
const MOB: u32 = 0x00_FF3030;
const PLAYER: u32 = 0x00_30FF30;

#[derive(Parser, Debug)]
#[command(author, version, about = "Top-down viewer for JSON maps")]
struct Opts {
    /// Map file written by `gen_map` or a save
    map: PathBuf,
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    logging::init(opts.verbose);

    // ─────────── load map & spawn mobs ───────
    let data = load_map(&opts.map)?;
    let mut game = Game::from_data(data, Box::new(SystemClock::default()))?;
    log::info!(
        "{}: {} sectors",
        game.level.map.name,
        game.level.map.sectors.len()
    );

    // ─────────── map-space → screen-space transform ────────────
    let (min, max) = game
        .level
        .map
        .sectors
        .iter()
        .flat_map(|s| s.segments.iter().map(|seg| seg.p))
        .fold((DVec2::INFINITY, DVec2::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p), hi.max(p))
        });
    let size = (max - min).max(DVec2::ONE);
    let scale = (WIDTH as f64 / size.x).min(HEIGHT as f64 / size.y) * 0.9; // 10 % margin
    let offset = (DVec2::new(WIDTH as f64, HEIGHT as f64) - size * scale) / 2.0;

    let to_screen = |p: DVec2| -> (i32, i32) {
        let s = (p - min) * scale + offset;
        (s.x as i32, HEIGHT as i32 - s.y as i32) // invert Y so north is up
    };

    // ─────────── show window ────────────
    let mut buffer = vec![0u32; WIDTH * HEIGHT];
    let mut window = Window::new("Portal map", WIDTH, HEIGHT, WindowOptions::default())?;
    window.set_target_fps(60);
    while window.is_open() && !window.is_key_down(Key::Escape) {
        game.step();

        buffer.fill(0);
        for sector in &game.level.map.sectors {
            for seg in &sector.segments {
                let colour = if seg.is_portal() { PORTAL } else { WALL };
                draw_line(&mut buffer, to_screen(seg.p), to_screen(seg.end), colour);
            }
        }

        let dyns = &game.sim.dynamics;
        for (e, body) in game.level.world.query::<&Body>().iter() {
            let Some(pos) = dyns.vec3s.get(body.pos) else {
                continue;
            };
            let (x, y) = to_screen(pos.render.truncate());
            let colour = if game.level.player == Some(e) { PLAYER } else { MOB };
            let r = ((body.radius * scale) as i32).max(2);
            draw_line(&mut buffer, (x - r, y), (x + r, y), colour);
            draw_line(&mut buffer, (x, y - r), (x, y + r), colour);
        }

        window.update_with_buffer(&buffer, WIDTH, HEIGHT)?;
    }
    Ok(())
}

/// Plot a line by stepping along its longer axis.
fn draw_line(buf: &mut [u32], a: (i32, i32), b: (i32, i32), colour: u32) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let steps = dx.abs().max(dy.abs()).max(1);
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let x = a.0 + (dx as f64 * t).round() as i32;
        let y = a.1 + (dy as f64 * t).round() as i32;
        if (0..WIDTH as i32).contains(&x) && (0..HEIGHT as i32).contains(&y) {
            buf[y as usize * WIDTH + x as usize] = colour;
        }
    }
}
