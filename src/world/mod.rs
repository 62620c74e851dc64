mod builder;
mod camera;
mod geometry;
mod helpers;
pub mod lightmap;
mod material;
pub mod pvs;
pub mod serial;
pub mod split;
mod texture;

pub use geometry::{
    DoorState, Map, MaterialId, ScaleMode, Sector, SectorId, SectorKind, Segment, Surface,
    WallSurface,
};

pub use builder::{MapBuilder, SectorBuilder};
pub use camera::Camera;
pub use lightmap::{LightSource, Lightmap};
pub use material::{Lit, LitSampled, Material, MaterialKind, PainfulLitSampled, Sampled, Sky};
pub use serial::{MapData, MapError, MobData, MobKindData};
pub use split::{SplitError, split_sector};
pub use texture::{Image, MipMap, OPAQUE_BLACK, Sampler, Solid, TextureError};
