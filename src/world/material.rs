use glam::{DVec3, DVec4};
use serde::{Deserialize, Serialize};

use super::texture::Sampler;

/// Named surface material. Serialised as a flat object with a `"Type"` tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(flatten)]
    pub kind: MaterialKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum MaterialKind {
    #[serde(rename = "materials.Lit")]
    Lit(Lit),
    #[serde(rename = "materials.Sampled")]
    Sampled(Sampled),
    #[serde(rename = "materials.LitSampled")]
    LitSampled(LitSampled),
    #[serde(rename = "materials.PainfulLitSampled")]
    PainfulLitSampled(PainfulLitSampled),
    #[serde(rename = "materials.Sky")]
    Sky(Sky),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Lit {
    pub ambient: DVec3,
    pub diffuse: DVec3,
}

impl Default for Lit {
    fn default() -> Self {
        Self {
            ambient: DVec3::splat(0.1),
            diffuse: DVec3::ONE,
        }
    }
}

impl Lit {
    /// Colour multiplier for a surface receiving `light`.
    #[inline]
    pub fn apply(&self, light: DVec3) -> DVec3 {
        self.ambient + self.diffuse * light
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Sampled {
    #[serde(rename = "Texture")]
    pub sampler: Sampler,
    #[serde(default)]
    pub is_liquid: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LitSampled {
    #[serde(flatten)]
    pub lit: Lit,
    #[serde(flatten)]
    pub sampled: Sampled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PainfulLitSampled {
    #[serde(flatten)]
    pub lit_sampled: LitSampled,
    /// Damage dealt to a mob standing on it.
    #[serde(rename = "Hurt", default)]
    pub hurt: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Sky {
    #[serde(rename = "Texture")]
    pub sampler: Sampler,
    /// Map the image to the screen instead of the view angle.
    #[serde(default)]
    pub static_background: bool,
}

impl Material {
    pub fn new(name: impl Into<String>, kind: MaterialKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn sampler(&self) -> Option<&Sampler> {
        match &self.kind {
            MaterialKind::Lit(_) => None,
            MaterialKind::Sampled(s) => Some(&s.sampler),
            MaterialKind::LitSampled(ls) => Some(&ls.sampled.sampler),
            MaterialKind::PainfulLitSampled(p) => Some(&p.lit_sampled.sampled.sampler),
            MaterialKind::Sky(s) => Some(&s.sampler),
        }
    }

    fn sampler_mut(&mut self) -> Option<&mut Sampler> {
        match &mut self.kind {
            MaterialKind::Lit(_) => None,
            MaterialKind::Sampled(s) => Some(&mut s.sampler),
            MaterialKind::LitSampled(ls) => Some(&mut ls.sampled.sampler),
            MaterialKind::PainfulLitSampled(p) => Some(&mut p.lit_sampled.sampled.sampler),
            MaterialKind::Sky(s) => Some(&mut s.sampler),
        }
    }

    pub fn lit(&self) -> Option<&Lit> {
        match &self.kind {
            MaterialKind::Lit(l) => Some(l),
            MaterialKind::LitSampled(ls) => Some(&ls.lit),
            MaterialKind::PainfulLitSampled(p) => Some(&p.lit_sampled.lit),
            MaterialKind::Sampled(_) | MaterialKind::Sky(_) => None,
        }
    }

    /// Damage per contact, for painful materials.
    pub fn hurt(&self) -> Option<f64> {
        match &self.kind {
            MaterialKind::PainfulLitSampled(p) if p.hurt > 0.0 => Some(p.hurt),
            _ => None,
        }
    }

    pub fn is_sky(&self) -> bool {
        matches!(self.kind, MaterialKind::Sky(_))
    }

    /// Load any image data behind this material.
    pub fn load(&mut self) {
        if let Some(s) = self.sampler_mut() {
            s.load();
        }
    }

    /// Final colour at `(u, v)` given the light arriving at the surface.
    pub fn shade(&self, u: f64, v: f64, scale: f64, light: DVec3) -> DVec4 {
        let base = self
            .sampler()
            .map_or(DVec4::ONE, |s| s.sample(u, v, scale));
        match self.lit() {
            Some(lit) => (base.truncate() * lit.apply(light)).extend(base.w),
            None => base,
        }
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
