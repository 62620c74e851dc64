//! JSON map format.
//!
//! Everything is addressed by name on disk: materials, adjacent sectors and
//! floor/ceiling targets. Variants carry a `"Type"` tag. Unknown fields are
//! ignored and missing ones take their defaults.

use std::fs;
use std::path::Path;

use glam::{DVec2, DVec3};
use serde::{Deserialize, Deserializer, Serialize, de};
use thiserror::Error;

use super::{Map, MaterialId, ScaleMode, Sector, SectorId, SectorKind, Segment, Surface, WallSurface};
use super::{DoorState, Material};
use crate::defs::{DEFAULT_FLOOR_FRICTION, TEXTURE_UNITS};
use crate::sim::components::CollisionResponse;
use crate::sim::dynamic::{DynamicValue, Dynamics};

#[derive(Debug, Error)]
pub enum MapError {
    #[error("map json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sector {sector:?} references unknown material {name:?}")]
    UnknownMaterial { sector: String, name: String },
    #[error("duplicate sector name {0:?}")]
    DuplicateSector(String),
}

/*------------------------- data model -------------------------------*/

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct MapData {
    pub name: String,
    pub spawn: DVec3,
    pub spawn_angle: f64,
    pub materials: Vec<Material>,
    pub sectors: Vec<SectorData>,
}

/// Sector variant, flattened into the sector object. A missing `"Type"`
/// reads as `sectors.Plain`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "Type")]
pub enum SectorKindData {
    #[default]
    #[serde(rename = "sectors.Plain")]
    Plain,
    #[serde(rename = "sectors.ToxicSector")]
    Toxic {
        #[serde(rename = "Hurt")]
        hurt: f64,
    },
    #[serde(rename = "sectors.Underwater")]
    Underwater,
    #[serde(rename = "sectors.VerticalDoor")]
    VerticalDoor {
        #[serde(rename = "State")]
        state: DoorState,
        #[serde(rename = "VelZ")]
        vel_z: f64,
    },
}

const SECTOR_TYPES: &[&str] = &[
    "sectors.Plain",
    "sectors.ToxicSector",
    "sectors.Underwater",
    "sectors.VerticalDoor",
];

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct RawSectorKind {
    #[serde(rename = "Type")]
    ty: Option<String>,
    hurt: f64,
    state: DoorState,
    vel_z: f64,
}

impl<'de> Deserialize<'de> for SectorKindData {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = RawSectorKind::deserialize(d)?;
        match raw.ty.as_deref() {
            None | Some("sectors.Plain") => Ok(SectorKindData::Plain),
            Some("sectors.ToxicSector") => Ok(SectorKindData::Toxic { hurt: raw.hurt }),
            Some("sectors.Underwater") => Ok(SectorKindData::Underwater),
            Some("sectors.VerticalDoor") => Ok(SectorKindData::VerticalDoor {
                state: raw.state,
                vel_z: raw.vel_z,
            }),
            Some(other) => Err(de::Error::unknown_variant(other, SECTOR_TYPES)),
        }
    }
}

impl From<SectorKind> for SectorKindData {
    fn from(k: SectorKind) -> Self {
        match k {
            SectorKind::Plain => SectorKindData::Plain,
            SectorKind::Toxic { hurt } => SectorKindData::Toxic { hurt },
            SectorKind::Underwater => SectorKindData::Underwater,
            SectorKind::VerticalDoor { state, vel_z } => SectorKindData::VerticalDoor { state, vel_z },
        }
    }
}

impl From<SectorKindData> for SectorKind {
    fn from(k: SectorKindData) -> Self {
        match k {
            SectorKindData::Plain => SectorKind::Plain,
            SectorKindData::Toxic { hurt } => SectorKind::Toxic { hurt },
            SectorKindData::Underwater => SectorKind::Underwater,
            SectorKindData::VerticalDoor { state, vel_z } => SectorKind::VerticalDoor { state, vel_z },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SectorData {
    pub name: String,
    #[serde(flatten)]
    pub kind: SectorKindData,
    pub bottom_z: f64,
    pub top_z: f64,
    /// Current heights when they differ from the spawn ones (doors mid-swing).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_bottom_z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_top_z: Option<f64>,
    pub floor_slope: f64,
    pub ceil_slope: f64,
    pub floor_scale: f64,
    pub ceil_scale: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ceil_material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ceil_target: Option<String>,
    pub floor_friction: f64,
    pub segments: Vec<SegmentData>,
    pub entities: Vec<MobData>,
}

impl Default for SectorData {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: SectorKindData::Plain,
            bottom_z: 0.0,
            top_z: 64.0,
            current_bottom_z: None,
            current_top_z: None,
            floor_slope: 0.0,
            ceil_slope: 0.0,
            floor_scale: TEXTURE_UNITS,
            ceil_scale: TEXTURE_UNITS,
            floor_material: None,
            ceil_material: None,
            floor_target: None,
            ceil_target: None,
            floor_friction: DEFAULT_FLOOR_FRICTION,
            segments: Vec::new(),
            entities: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SegmentData {
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjacent_sector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lo_material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mid_material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hi_material: Option<String>,
    pub lo_scale: ScaleMode,
    pub mid_scale: ScaleMode,
    pub hi_scale: ScaleMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum MobKindData {
    #[serde(rename = "mobs.Mob")]
    Mob,
    #[serde(rename = "mobs.AliveMob")]
    AliveMob {
        #[serde(rename = "Health")]
        health: f64,
    },
    #[serde(rename = "mobs.Player")]
    Player {
        #[serde(rename = "Health")]
        health: f64,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct LightData {
    pub diffuse: DVec3,
    pub strength: f64,
    pub range: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MobData {
    #[serde(flatten)]
    pub kind: MobKindData,
    #[serde(default)]
    pub pos: DVec3,
    #[serde(default)]
    pub vel: DVec3,
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "default_radius")]
    pub bounding_radius: f64,
    #[serde(default)]
    pub mass: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub mount_height: f64,
    #[serde(default)]
    pub collision_response: CollisionResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<LightData>,
}

fn default_radius() -> f64 {
    10.0
}

impl MobData {
    pub fn new(kind: MobKindData, pos: DVec3) -> Self {
        Self {
            kind,
            pos,
            vel: DVec3::ZERO,
            angle: 0.0,
            bounding_radius: default_radius(),
            mass: 0.0,
            height: 0.0,
            mount_height: 0.0,
            collision_response: CollisionResponse::default(),
            light: None,
        }
    }
}

/*------------------------- load -------------------------------------*/

impl MapData {
    pub fn from_json(s: &str) -> Result<Self, MapError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json(&self) -> Result<String, MapError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Instantiate a runtime map. Mobs are returned with the sector they were
    /// listed under, for the caller to spawn.
    pub fn build(self, dyns: &mut Dynamics) -> Result<(Map, Vec<(SectorId, MobData)>), MapError> {
        let mut map = Map::new(self.name);
        map.spawn = self.spawn;
        map.spawn_angle = self.spawn_angle;
        for mut m in self.materials {
            m.load();
            map.add_material(m);
        }

        for sd in &self.sectors {
            let sector = if map.sector_id(&sd.name).is_some() {
                Err(MapError::DuplicateSector(sd.name.clone()))
            } else {
                sd.to_sector(&map, dyns)
            };
            match sector {
                Ok(sector) => {
                    map.add_sector(sector);
                }
                Err(err) => {
                    map.release(dyns);
                    return Err(err);
                }
            }
        }

        let mut mobs = Vec::new();
        for (id, sd) in (0..).zip(self.sectors) {
            sd.link(&mut map, id);
            mobs.extend(sd.entities.into_iter().map(|m| (id, m)));
        }
        map.recalculate(dyns);
        log::info!(
            "map {:?}: {} sectors, {} materials, {} mobs",
            map.name,
            map.sectors.len(),
            map.materials.len(),
            mobs.len()
        );
        Ok((map, mobs))
    }

    /// Snapshot a runtime map. `mobs` supplies the entities listed under each sector.
    pub fn capture(map: &Map, dyns: &Dynamics, mut mobs: impl FnMut(SectorId) -> Vec<MobData>) -> Self {
        Self {
            name: map.name.clone(),
            spawn: map.spawn,
            spawn_angle: map.spawn_angle,
            materials: map.materials.clone(),
            sectors: map
                .sector_ids()
                .filter_map(|id| {
                    let s = map.sector(id)?;
                    let mut sd = SectorData::capture(map, s, dyns);
                    sd.entities = mobs(id);
                    Some(sd)
                })
                .collect(),
        }
    }
}

fn material_name(map: &Map, id: Option<MaterialId>) -> Option<String> {
    id.and_then(|id| map.material(id)).map(|m| m.name.clone())
}

fn sector_name(map: &Map, id: Option<SectorId>) -> Option<String> {
    id.and_then(|id| map.sector(id)).map(|s| s.name.clone())
}

impl SectorData {
    pub fn capture(map: &Map, s: &Sector, dyns: &Dynamics) -> Self {
        let bottom = &dyns.scalars[s.bottom_z];
        let top = &dyns.scalars[s.top_z];
        let changed = |v: &DynamicValue<f64>| (v.now != v.spawn).then_some(v.now);
        Self {
            name: s.name.clone(),
            kind: s.kind.into(),
            bottom_z: bottom.spawn,
            top_z: top.spawn,
            current_bottom_z: changed(bottom),
            current_top_z: changed(top),
            floor_slope: s.floor_slope,
            ceil_slope: s.ceil_slope,
            floor_scale: s.floor.scale,
            ceil_scale: s.ceil.scale,
            floor_material: material_name(map, s.floor.material),
            ceil_material: material_name(map, s.ceil.material),
            floor_target: sector_name(map, s.floor_target),
            ceil_target: sector_name(map, s.ceil_target),
            floor_friction: s.floor_friction,
            segments: s
                .segments
                .iter()
                .map(|seg| SegmentData {
                    x: seg.p.x,
                    y: seg.p.y,
                    adjacent_sector: sector_name(map, seg.adjacent_sector),
                    lo_material: material_name(map, seg.lo.material),
                    mid_material: material_name(map, seg.mid.material),
                    hi_material: material_name(map, seg.hi.material),
                    lo_scale: seg.lo.scale,
                    mid_scale: seg.mid.scale,
                    hi_scale: seg.hi.scale,
                })
                .collect(),
            entities: Vec::new(),
        }
    }

    /// Build the sector with materials resolved. Adjacency and targets are
    /// left empty; see [`SectorData::link`].
    pub fn to_sector(&self, map: &Map, dyns: &mut Dynamics) -> Result<Sector, MapError> {
        let material = |name: &Option<String>| -> Result<Option<MaterialId>, MapError> {
            name.as_deref()
                .map(|n| {
                    map.material_id(n).ok_or_else(|| MapError::UnknownMaterial {
                        sector: self.name.clone(),
                        name: n.to_owned(),
                    })
                })
                .transpose()
        };

        let floor = Surface {
            material: material(&self.floor_material)?,
            scale: self.floor_scale,
        };
        let ceil = Surface {
            material: material(&self.ceil_material)?,
            scale: self.ceil_scale,
        };
        let mut segments = Vec::with_capacity(self.segments.len());
        for sd in &self.segments {
            let mut seg = Segment::new(DVec2::new(sd.x, sd.y));
            seg.lo = WallSurface {
                material: material(&sd.lo_material)?,
                scale: sd.lo_scale,
            };
            seg.mid = WallSurface {
                material: material(&sd.mid_material)?,
                scale: sd.mid_scale,
            };
            seg.hi = WallSurface {
                material: material(&sd.hi_material)?,
                scale: sd.hi_scale,
            };
            segments.push(seg);
        }

        // every name resolved; only now take dynamic slots
        let mut s = Sector::new(self.name.clone(), dyns, self.bottom_z, self.top_z);
        if let Some(b) = self.current_bottom_z {
            dyns.scalars[s.bottom_z].set_now(b);
        }
        if let Some(t) = self.current_top_z {
            dyns.scalars[s.top_z].set_now(t);
        }
        s.kind = self.kind.clone().into();
        s.floor_slope = self.floor_slope;
        s.ceil_slope = self.ceil_slope;
        s.floor = floor;
        s.ceil = ceil;
        s.floor_friction = self.floor_friction;
        s.segments = segments;
        Ok(s)
    }

    /// Resolve sector names into ids on the already-added sector `id`. A
    /// name that matches no sector is dropped with a warning, leaving a solid
    /// wall or a closed floor/ceiling.
    pub fn link(&self, map: &mut Map, id: SectorId) {
        let resolve = |map: &Map, name: &Option<String>| -> Option<SectorId> {
            let name = name.as_deref()?;
            let found = map.sector_id(name);
            if found.is_none() {
                log::warn!("sector {:?} references unknown sector {name:?}", self.name);
            }
            found
        };
        let floor_target = resolve(map, &self.floor_target);
        let ceil_target = resolve(map, &self.ceil_target);
        let adjacent: Vec<_> = self
            .segments
            .iter()
            .map(|sd| resolve(map, &sd.adjacent_sector))
            .collect();
        if let Some(s) = map.sector_mut(id) {
            s.floor_target = floor_target;
            s.ceil_target = ceil_target;
            for (seg, adj) in s.segments.iter_mut().zip(adjacent) {
                seg.adjacent_sector = adj;
            }
        }
    }
}

/*------------------------- files ------------------------------------*/

pub fn load_map(path: impl AsRef<Path>) -> Result<MapData, MapError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| MapError::Io {
        path: path.display().to_string(),
        source,
    })?;
    MapData::from_json(&text)
}

pub fn save_map(path: impl AsRef<Path>, data: &MapData) -> Result<(), MapError> {
    let path = path.as_ref();
    fs::write(path, data.to_json()?).map_err(|source| MapError::Io {
        path: path.display().to_string(),
        source,
    })
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
