//! First-person software viewer.
//!
//! ```bash
//! cargo run --release --bin view_sw -- demo.json [--config engine.json]
//! ```
//!
//! Arrows / WASD walk and turn, Alt+arrows strafe, Space jumps (swims up),
//! Ctrl crouches, F5 writes the running level to `<map>.save.json`.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use yaportal_rs::config::EngineConfig;
use yaportal_rs::logging;
use yaportal_rs::renderer::{Renderer, Software, View};
use yaportal_rs::sim::{Game, InputCmd, SystemClock};
use yaportal_rs::world::serial::{load_map, save_map};

#[derive(Parser, Debug)]
#[command(author, version, about = "Software-rendered portal map viewer")]
struct Opts {
    /// Map file written by `gen_map` or a save
    map: PathBuf,
    /// Engine settings (JSON); defaults when absent
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Override the render strip count
    #[arg(long)]
    workers: Option<usize>,
    #[arg(short, long)]
    verbose: bool,
}

fn read_input(win: &Window) -> InputCmd {
    let mut cmd = InputCmd::default();

    /* movement --------------------------------------------------------- */
    if win.is_key_down(Key::Up) || win.is_key_down(Key::W) {
        cmd.forward += 1.0;
    }
    if win.is_key_down(Key::Down) || win.is_key_down(Key::S) {
        cmd.forward -= 1.0;
    }

    let alt = win.is_key_down(Key::LeftAlt) || win.is_key_down(Key::RightAlt);
    if alt {
        /* Alt + ←/→  = strafe */
        if win.is_key_down(Key::Left) {
            cmd.strafe -= 1.0;
        }
        if win.is_key_down(Key::Right) {
            cmd.strafe += 1.0;
        }
    } else {
        /* plain ←/→   = turn, positive is counter-clockwise */
        if win.is_key_down(Key::Left) {
            cmd.turn += 1.0;
        }
        if win.is_key_down(Key::Right) {
            cmd.turn -= 1.0;
        }
    }
    if win.is_key_down(Key::A) {
        cmd.strafe -= 1.0;
    }
    if win.is_key_down(Key::D) {
        cmd.strafe += 1.0;
    }

    /* vertical --------------------------------------------------------- */
    cmd.jump = win.is_key_down(Key::Space);
    cmd.crouch = win.is_key_down(Key::LeftCtrl) || win.is_key_down(Key::RightCtrl);
    cmd
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    logging::init(opts.verbose);

    let mut cfg = match &opts.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(n) = opts.workers {
        cfg.render_workers = n;
    }
    let (w, h) = (cfg.screen_width, cfg.screen_height);

    let data = load_map(&opts.map)?;
    let mut game = Game::from_data(data, Box::new(SystemClock::default()))?;
    if game.level.map.pvs_occlusion != cfg.pvs_occlusion {
        game.level.map.pvs_occlusion = cfg.pvs_occlusion;
        game.level.map.recalculate(&game.sim.dynamics);
    }
    log::info!(
        "map {:?}: {} sectors, {} materials",
        game.level.map.name,
        game.level.map.sectors.len(),
        game.level.map.materials.len()
    );

    let mut renderer = Software::from_config(&cfg);
    let mut win = Window::new("Portal software render", w, h, WindowOptions::default())?;
    win.set_target_fps(60);

    // ────────────────── benchmarking state ──────────────────────────────
    let mut acc_time = Duration::ZERO;
    let mut acc_frames = 0usize;
    let mut last_print = Instant::now();

    while win.is_open() && !win.is_key_down(Key::Escape) {
        game.set_input(read_input(&win));
        game.step();

        if win.is_key_pressed(Key::F5, KeyRepeat::No) {
            let out = opts.map.with_extension("save.json");
            match save_map(&out, &game.save()) {
                Ok(()) => log::info!("saved {}", out.display()),
                Err(e) => log::error!("save failed: {e}"),
            }
        }

        let (Some(camera), Some(sector)) = (game.camera(cfg.fov), game.player_sector()) else {
            log::warn!("no placed player; nothing to draw");
            win.update();
            continue;
        };

        let t0 = Instant::now();
        game.refresh_lights();
        let view = View {
            map: &game.level.map,
            dyns: &game.sim.dynamics,
            camera,
            sector,
            tint: game.player_tint(),
        };
        renderer.begin_frame(w, h);
        renderer.draw_view(&view);
        let mut shown = Ok(());
        renderer.end_frame(|fb, w, h| {
            acc_time += t0.elapsed();
            acc_frames += 1;
            shown = win.update_with_buffer(fb, w, h);
        });
        shown?;

        // ─────────── report every ~3 s ────────────────────
        if last_print.elapsed() >= Duration::from_secs(3) && acc_frames > 0 {
            let avg_ms = acc_time.as_secs_f64() * 1000.0 / acc_frames as f64;
            log::info!(
                "avg render: {avg_ms:.2} ms  ({:.1} FPS, sim {:.1} FPS)",
                1000.0 / avg_ms,
                game.sim.fps
            );
            acc_time = Duration::ZERO;
            acc_frames = 0;
            last_print = Instant::now();
        }
    }
    Ok(())
}
