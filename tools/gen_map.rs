//! gen_map.rs - write a small demo level exercising every sector kind.
//!
//! USAGE:
//! ```bash
//! cargo run --bin gen_map -- --out demo.json
//! cargo run --release --bin view_sw -- demo.json
//! ```

use std::path::PathBuf;

use clap::Parser;
use glam::{DVec3, DVec4};

use yaportal_rs::logging;
use yaportal_rs::sim::{CollisionResponse, Dynamics};
use yaportal_rs::world::serial::{LightData, save_map};
use yaportal_rs::world::{
    DoorState, Lit, LitSampled, MapBuilder, MapData, Material, MaterialKind, MobData, MobKindData,
    PainfulLitSampled, Sampled, Sampler, SectorKind, Sky, Solid,
};

/// CLI options handled via `clap` derive.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opts {
    /// File receiving the map
    #[arg(long, value_name = "FILE", default_value = "demo.json")]
    out: PathBuf,
    #[arg(short, long)]
    verbose: bool,
}

fn solid(r: f64, g: f64, b: f64) -> Sampler {
    Sampler::Solid(Solid {
        color: DVec4::new(r, g, b, 1.0),
    })
}

fn lit(name: &str, sampler: Sampler, is_liquid: bool) -> Material {
    Material::new(
        name,
        MaterialKind::LitSampled(LitSampled {
            lit: Lit::default(),
            sampled: Sampled { sampler, is_liquid },
        }),
    )
}

fn lamp(pos: DVec3, diffuse: DVec3, range: f64) -> MobData {
    let mut m = MobData::new(MobKindData::Mob, pos);
    m.mass = 0.0;
    m.height = 4.0;
    m.bounding_radius = 2.0;
    m.collision_response = CollisionResponse::Stop;
    m.light = Some(LightData {
        diffuse,
        strength: 1.0,
        range,
    });
    m
}

fn build() -> MapData {
    let mut dyns = Dynamics::default();
    let mut b = MapBuilder::new("demo", &mut dyns);
    b.spawn(DVec3::new(64.0, 128.0, 0.0), 0.0);

    let stone = b.material(lit("stone", solid(0.6, 0.6, 0.55), false));
    let brick = b.material(lit("brick", solid(0.6, 0.3, 0.2), false));
    let metal = b.material(lit("metal", solid(0.4, 0.45, 0.5), false));
    let water = b.material(lit("water", solid(0.2, 0.35, 0.6), true));
    let slime = b.material(Material::new(
        "slime",
        MaterialKind::PainfulLitSampled(PainfulLitSampled {
            lit_sampled: LitSampled {
                lit: Lit::default(),
                sampled: Sampled {
                    sampler: solid(0.2, 0.7, 0.1),
                    is_liquid: true,
                },
            },
            hurt: 2.0,
        }),
    ));
    let sky = b.material(Material::new(
        "sky",
        MaterialKind::Sky(Sky {
            sampler: solid(0.45, 0.6, 0.9),
            static_background: false,
        }),
    ));

    // open-air hall; its east wall is split around the door
    b.sector("hall", 0.0, 128.0)
        .points(&[
            (0.0, 0.0),
            (256.0, 0.0),
            (256.0, 96.0),
            (256.0, 160.0),
            (256.0, 256.0),
            (0.0, 256.0),
        ])
        .portal(2, "door")
        .portal(4, "tank")
        .walls(brick)
        .floor_material(stone)
        .ceil_material(sky)
        .done();

    b.sector("door", 0.0, 96.0)
        .rect(256.0, 96.0, 288.0, 160.0)
        .portal(1, "corridor")
        .portal(3, "hall")
        .kind(SectorKind::VerticalDoor {
            state: DoorState::Closed,
            vel_z: 0.0,
        })
        .walls(metal)
        .floor_material(metal)
        .ceil_material(metal)
        .done();

    // gentle ramp rising to the north
    b.sector("corridor", 0.0, 96.0)
        .rect(288.0, 96.0, 544.0, 160.0)
        .portal(1, "pool")
        .portal(3, "door")
        .slope(0.1, 0.0)
        .walls(stone)
        .floor_material(stone)
        .ceil_material(stone)
        .done();

    b.sector("pool", -16.0, 112.0)
        .points(&[
            (544.0, 64.0),
            (672.0, 64.0),
            (672.0, 192.0),
            (544.0, 192.0),
            (544.0, 160.0),
            (544.0, 96.0),
        ])
        .portal(4, "corridor")
        .kind(SectorKind::Toxic { hurt: 5.0 })
        .walls(brick)
        .floor_material(slime)
        .ceil_material(stone)
        .done();

    b.sector("tank", -64.0, 128.0)
        .rect(0.0, 256.0, 256.0, 384.0)
        .portal(0, "hall")
        .kind(SectorKind::Underwater)
        .walls(water)
        .floor_material(water)
        .ceil_material(water)
        .done();

    let map = b.build();
    let mut data = MapData::capture(&map, &dyns, |id| match map.sector(id).map(|s| s.name.as_str()) {
        Some("hall") => vec![
            MobData::new(MobKindData::Player { health: 100.0 }, map.spawn),
            lamp(DVec3::new(128.0, 128.0, 100.0), DVec3::new(1.0, 0.9, 0.7), 300.0),
        ],
        Some("corridor") => vec![lamp(DVec3::new(416.0, 128.0, 80.0), DVec3::new(0.6, 0.7, 1.0), 150.0)],
        Some("pool") => vec![MobData::new(
            MobKindData::AliveMob { health: 50.0 },
            DVec3::new(608.0, 128.0, -16.0),
        )],
        _ => Vec::new(),
    });

    // the door starts shut
    if let Some(door) = data.sectors.iter_mut().find(|s| s.name == "door") {
        door.current_top_z = Some(door.bottom_z);
    }
    data
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    logging::init(opts.verbose);

    let data = build();
    save_map(&opts.out, &data)?;
    log::info!(
        "wrote {} ({} sectors, {} materials)",
        opts.out.display(),
        data.sectors.len(),
        data.materials.len()
    );
    Ok(())
}
