//! Texture sources for materials: flat colours and mip-mapped images.
//! Samplers are filled at load time and read concurrently by the renderer.

use std::fmt;
use std::path::PathBuf;

use glam::DVec4;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

/// Things that can go wrong when loading an image.
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("cannot decode `{path}`: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Pixel buffer does not match the declared size.
    #[error("expected {expected} texels for {w}×{h}, got {got}")]
    Size {
        w: usize,
        h: usize,
        expected: usize,
        got: usize,
    },
}

/// Fully opaque black; what an unloaded image samples as.
pub const OPAQUE_BLACK: DVec4 = DVec4::new(0.0, 0.0, 0.0, 1.0);

/// Something a material can read colours from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum Sampler {
    #[serde(rename = "texture.Solid")]
    Solid(Solid),
    #[serde(rename = "texture.Image")]
    Image(Image),
}

impl Sampler {
    /// Colour at `(u, v)` for a surface drawn `scale` times its base height.
    #[inline]
    pub fn sample(&self, u: f64, v: f64, scale: f64) -> DVec4 {
        match self {
            Sampler::Solid(s) => s.color,
            Sampler::Image(img) => img.sample(u, v, scale),
        }
    }

    /// Base texel height, `None` for samplers without texels.
    pub fn height(&self) -> Option<usize> {
        match self {
            Sampler::Solid(_) => None,
            Sampler::Image(img) => img.size().map(|(_, h)| h),
        }
    }

    /// Load image data if this sampler needs any. Failures are logged and
    /// leave the image unloaded.
    pub fn load(&mut self) {
        if let Sampler::Image(img) = self {
            if let Err(e) = img.load() {
                log::error!("{e}");
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Solid {
    #[serde(rename = "Diffuse")]
    pub color: DVec4,
}

/*──────────────────────────── image ──────────────────────────────────*/

/// One level of the mip pyramid, RGBA8 row-major.
#[derive(Clone, PartialEq)]
pub struct MipMap {
    pub w: usize,
    pub h: usize,
    pub texels: Vec<[u8; 4]>,
}

impl MipMap {
    /// 2×2 box average; odd edges reuse the last row/column.
    fn downsample(&self) -> MipMap {
        let w = (self.w / 2).max(1);
        let h = (self.h / 2).max(1);
        let mut texels = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                let (x0, y0) = ((x * 2).min(self.w - 1), (y * 2).min(self.h - 1));
                let (x1, y1) = ((x0 + 1).min(self.w - 1), (y0 + 1).min(self.h - 1));
                let quad = [
                    self.texels[y0 * self.w + x0],
                    self.texels[y0 * self.w + x1],
                    self.texels[y1 * self.w + x0],
                    self.texels[y1 * self.w + x1],
                ];
                let mut out = [0u8; 4];
                for (c, o) in out.iter_mut().enumerate() {
                    *o = (quad.iter().map(|t| t[c] as u32).sum::<u32>() / 4) as u8;
                }
                texels.push(out);
            }
        }
        MipMap { w, h, texels }
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> [u8; 4] {
        self.texels[y * self.w + x]
    }

    fn nearest(&self, u: f64, v: f64) -> DVec4 {
        let x = ((u * self.w as f64) as usize).min(self.w - 1);
        let y = ((v * self.h as f64) as usize).min(self.h - 1);
        to_color(self.at(x, y))
    }

    /// Bilinear filter with texel centres at half-integers, wrapping at the edges.
    fn bilinear(&self, u: f64, v: f64) -> DVec4 {
        let tx = u * self.w as f64 - 0.5;
        let ty = v * self.h as f64 - 0.5;
        let (fx, fy) = (tx.floor(), ty.floor());
        let (wx, wy) = (tx - fx, ty - fy);
        let x0 = (fx as i64).rem_euclid(self.w as i64) as usize;
        let y0 = (fy as i64).rem_euclid(self.h as i64) as usize;
        let x1 = (x0 + 1) % self.w;
        let y1 = (y0 + 1) % self.h;
        let t00 = self.at(x0, y0);
        let t10 = self.at(x1, y0);
        let t11 = self.at(x1, y1);
        let t01 = self.at(x0, y1);

        let mut out = [0.0; 4];
        for (c, o) in out.iter_mut().enumerate() {
            let (c00, c10, c11, c01) = (t00[c], t10[c], t11[c], t01[c]);
            *o = if c00 == c10 && c10 == c11 && c11 == c01 {
                c00 as f64
            } else {
                c00 as f64 * (1.0 - wx) * (1.0 - wy)
                    + c10 as f64 * wx * (1.0 - wy)
                    + c11 as f64 * wx * wy
                    + c01 as f64 * (1.0 - wx) * wy
            };
        }
        DVec4::from_array(out) / 255.0
    }
}

#[inline]
fn to_color(t: [u8; 4]) -> DVec4 {
    DVec4::new(t[0] as f64, t[1] as f64, t[2] as f64, t[3] as f64) / 255.0
}

/// Image sampler. Pixels come from `source` (or [`Image::from_rgba`]) and are
/// never serialised.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Image {
    pub source: String,
    pub generate_mip_maps: bool,
    pub filter: bool,
    #[serde(skip)]
    base: Option<MipMap>,
    /// Pyramid from the base level down to 1×1, built on first use.
    #[serde(skip)]
    mips: OnceCell<Vec<MipMap>>,
}

impl Default for Image {
    fn default() -> Self {
        Self {
            source: String::new(),
            generate_mip_maps: true,
            filter: false,
            base: None,
            mips: OnceCell::new(),
        }
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("source", &self.source)
            .field("size", &self.size())
            .field("filter", &self.filter)
            .field("generate_mip_maps", &self.generate_mip_maps)
            .finish()
    }
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.generate_mip_maps == other.generate_mip_maps
            && self.filter == other.filter
            && self.base == other.base
    }
}

impl Image {
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn from_rgba(w: usize, h: usize, texels: Vec<[u8; 4]>) -> Result<Self, TextureError> {
        let mut img = Self::default();
        img.set_pixels(w, h, texels)?;
        Ok(img)
    }

    pub fn set_pixels(&mut self, w: usize, h: usize, texels: Vec<[u8; 4]>) -> Result<(), TextureError> {
        if w == 0 || h == 0 || texels.len() != w * h {
            return Err(TextureError::Size {
                w,
                h,
                expected: w * h,
                got: texels.len(),
            });
        }
        self.base = Some(MipMap { w, h, texels });
        self.mips = OnceCell::new();
        Ok(())
    }

    /// Decode `source` from disk. An empty source is not an error.
    pub fn load(&mut self) -> Result<(), TextureError> {
        if self.source.is_empty() {
            return Ok(());
        }
        let path = PathBuf::from(&self.source);
        let rgba = image::open(&path)
            .map_err(|source| TextureError::Decode { path, source })?
            .to_rgba8();
        let (w, h) = (rgba.width() as usize, rgba.height() as usize);
        let texels = rgba.pixels().map(|p| p.0).collect();
        self.set_pixels(w, h, texels)?;
        log::info!("loaded texture {} ({w}×{h})", self.source);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.base.is_some()
    }

    pub fn size(&self) -> Option<(usize, usize)> {
        self.base.as_ref().map(|b| (b.w, b.h))
    }

    /// Mip levels, largest first. Empty when unloaded.
    pub fn mip_maps(&self) -> &[MipMap] {
        let Some(base) = &self.base else {
            return &[];
        };
        self.mips.get_or_init(|| {
            let mut levels = vec![base.clone()];
            if self.generate_mip_maps {
                while let Some(last) = levels.last().filter(|m| m.w > 1 || m.h > 1) {
                    let next = last.downsample();
                    levels.push(next);
                }
            }
            levels
        })
    }

    /// Smallest level whose height still covers `base_height × scale`.
    pub fn select_mip(&self, scale: f64) -> Option<&MipMap> {
        let levels = self.mip_maps();
        let base = levels.first()?;
        let wanted = base.h as f64 * scale;
        if wanted <= 0.0 || !wanted.is_finite() {
            return Some(base);
        }
        levels
            .iter()
            .rev()
            .find(|m| m.h as f64 >= wanted)
            .or(Some(base))
    }

    pub fn sample(&self, u: f64, v: f64, scale: f64) -> DVec4 {
        let Some(mip) = self.select_mip(scale) else {
            return OPAQUE_BLACK;
        };
        let u = u.rem_euclid(1.0);
        let v = v.rem_euclid(1.0);
        if self.filter {
            mip.bilinear(u, v)
        } else {
            mip.nearest(u, v)
        }
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
