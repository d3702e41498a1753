//! Texture recipes: declarative descriptions of packed noise textures.
//!
//! A recipe names a grid and up to four channels. Each channel is a source
//! (a generator or a combination of nested channels) followed by a list of
//! post-processing steps. Recipes are plain serde structs so they can be
//! loaded from JSON; [`TextureRecipe::validate`] checks every parameter
//! before any generator runs, turning what would be a panic deeper down
//! into a [`NimbusError`].

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::cellular::{worley_fbm_field, worley_field, Normalization};
use crate::curl::curl_noise;
use crate::error::NimbusError;
use crate::field::{GridDims, ScalarField};
use crate::gradient::{perlin_field, CellVectors, PermutationTable};
use crate::pack::{self, MultiChannelBuffer};

/// Channels a packed texture can hold.
pub const MAX_CHANNELS: usize = 4;

/// Which gradient table a Perlin source uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientKind {
    /// Seeded 256-entry permutation with the 12 edge gradients.
    #[default]
    Permutation,
    /// One random unit vector per lattice point.
    CellVectors,
}

fn default_octaves() -> u32 {
    1
}

fn default_persistence() -> f64 {
    0.5
}

fn default_radius() -> f64 {
    1.0
}

/// Where a channel's bytes come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelSource {
    /// Tileable fbm gradient noise.
    Perlin {
        res: usize,
        #[serde(default = "default_octaves")]
        octaves: u32,
        #[serde(default = "default_persistence")]
        persistence: f64,
        #[serde(default)]
        gradient: GradientKind,
    },
    /// Cellular distance noise, feature points bright.
    Worley {
        res: usize,
        #[serde(default)]
        normalization: Normalization,
    },
    /// Fbm over cellular noise; `radius` is in lattice cells.
    WorleyFbm {
        res: usize,
        #[serde(default = "default_octaves")]
        octaves: u32,
        #[serde(default = "default_persistence")]
        persistence: f64,
        #[serde(default = "default_radius")]
        radius: f64,
    },
    /// Curl magnitude of fbm gradient noise.
    Curl {
        res: usize,
        #[serde(default = "default_octaves")]
        octaves: u32,
        #[serde(default = "default_persistence")]
        persistence: f64,
    },
    Constant { value: u8 },
    /// Truncated per-cell mean of the nested channels.
    Combine { sources: Vec<ChannelRecipe> },
    /// `(1 − t)·a + t·b`.
    Lerp {
        a: Box<ChannelRecipe>,
        b: Box<ChannelRecipe>,
        t: f32,
    },
    /// `base` remapped into `[floor, 1]`.
    FloorRemap {
        base: Box<ChannelRecipe>,
        floor: Box<ChannelRecipe>,
    },
}

/// A step applied to a channel after its source is generated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PostOp {
    /// Stretch observed min/max to the full byte range.
    Spread,
    Threshold { level: u8 },
    Invert,
    Scale { factor: f32 },
    Remap {
        src_min: f32,
        src_max: f32,
        dst_min: f32,
        dst_max: f32,
    },
}

/// One channel: a source plus post-processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecipe {
    pub source: ChannelSource,
    #[serde(default)]
    pub post: Vec<PostOp>,
}

impl ChannelRecipe {
    pub fn new(source: ChannelSource) -> Self {
        Self { source, post: Vec::new() }
    }

    pub fn then(mut self, op: PostOp) -> Self {
        self.post.push(op);
        self
    }

    fn validate(&self) -> Result<(), NimbusError> {
        self.source.validate()?;
        for op in &self.post {
            op.validate()?;
        }
        Ok(())
    }

    /// Generate this channel over `dims`.
    ///
    /// Nested channels draw their seeds from `seed` by position, so sibling
    /// sources never share a feature-point set or permutation.
    pub fn render(&self, dims: GridDims, seed: u64) -> ScalarField {
        let field = self.source.render(dims, seed);
        self.post.iter().fold(field, |f, op| op.apply(&f))
    }
}

fn check_res(res: usize) -> Result<(), NimbusError> {
    if res == 0 {
        return Err(NimbusError::ZeroResolution);
    }
    Ok(())
}

fn check_fbm(octaves: u32, persistence: f64) -> Result<(), NimbusError> {
    if octaves == 0 {
        return Err(NimbusError::ZeroOctaves);
    }
    if !(persistence.is_finite() && persistence >= 0.0) {
        return Err(NimbusError::InvalidPersistence(persistence));
    }
    Ok(())
}

fn check_radius(radius: f64) -> Result<(), NimbusError> {
    if radius > 0.0 && radius.is_finite() {
        Ok(())
    } else {
        Err(NimbusError::InvalidRadius(radius))
    }
}

/// Seed for the `salt`-th input of a node.
fn derive_seed(seed: u64, salt: u64) -> u64 {
    seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

impl ChannelSource {
    fn validate(&self) -> Result<(), NimbusError> {
        match self {
            Self::Perlin { res, octaves, persistence, .. } | Self::Curl { res, octaves, persistence } => {
                check_res(*res)?;
                check_fbm(*octaves, *persistence)
            }
            Self::Worley { res, normalization } => {
                check_res(*res)?;
                match normalization {
                    Normalization::Radius(r) => check_radius(f64::from(*r)),
                    Normalization::MaxDistance => Ok(()),
                }
            }
            Self::WorleyFbm { res, octaves, persistence, radius } => {
                check_res(*res)?;
                check_fbm(*octaves, *persistence)?;
                check_radius(*radius)
            }
            Self::Constant { .. } => Ok(()),
            Self::Combine { sources } => {
                if sources.is_empty() {
                    return Err(NimbusError::EmptyCombine);
                }
                sources.iter().try_for_each(ChannelRecipe::validate)
            }
            Self::Lerp { a, b, t } => {
                if !t.is_finite() {
                    return Err(NimbusError::InvalidWeight(*t));
                }
                a.validate()?;
                b.validate()
            }
            Self::FloorRemap { base, floor } => {
                base.validate()?;
                floor.validate()
            }
        }
    }

    fn render(&self, dims: GridDims, seed: u64) -> ScalarField {
        match self {
            Self::Perlin { res, octaves, persistence, gradient } => match gradient {
                GradientKind::Permutation => {
                    perlin_field(PermutationTable::seeded(seed), dims, *res, *octaves, *persistence)
                }
                GradientKind::CellVectors => {
                    perlin_field(CellVectors::for_dims(*res, dims, seed), dims, *res, *octaves, *persistence)
                }
            },
            Self::Worley { res, normalization } => worley_field(dims, *res, *normalization, seed),
            Self::WorleyFbm { res, octaves, persistence, radius } => {
                worley_fbm_field(dims, *res, *octaves, *persistence, *radius, seed)
            }
            Self::Curl { res, octaves, persistence } => curl_noise(dims, *res, *octaves, *persistence, seed),
            Self::Constant { value } => ScalarField::filled(dims, *value),
            Self::Combine { sources } => {
                let fields: Vec<ScalarField> = sources
                    .iter()
                    .enumerate()
                    .map(|(i, s)| s.render(dims, derive_seed(seed, i as u64 + 1)))
                    .collect();
                pack::combine(&fields)
            }
            Self::Lerp { a, b, t } => pack::lerp(
                &a.render(dims, derive_seed(seed, 1)),
                &b.render(dims, derive_seed(seed, 2)),
                *t,
            ),
            Self::FloorRemap { base, floor } => pack::remap_floor(
                &base.render(dims, derive_seed(seed, 1)),
                &floor.render(dims, derive_seed(seed, 2)),
            ),
        }
    }
}

impl PostOp {
    fn validate(&self) -> Result<(), NimbusError> {
        match *self {
            Self::Scale { factor } if !factor.is_finite() => Err(NimbusError::InvalidScale(factor)),
            Self::Remap { src_min, src_max, .. } if !(src_max > src_min) => {
                Err(NimbusError::EmptyRange { min: src_min, max: src_max })
            }
            _ => Ok(()),
        }
    }

    pub fn apply(&self, field: &ScalarField) -> ScalarField {
        match *self {
            Self::Spread => pack::spread(field),
            Self::Threshold { level } => pack::threshold(field, level),
            Self::Invert => pack::invert(field),
            Self::Scale { factor } => pack::scale(field, factor),
            Self::Remap { src_min, src_max, dst_min, dst_max } => {
                pack::remap(field, src_min, src_max, dst_min, dst_max)
            }
        }
    }
}

/// A packed texture: grid, channels, and a name used for output files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureRecipe {
    pub name: String,
    pub dims: GridDims,
    pub channels: Vec<ChannelRecipe>,
}

impl Default for TextureRecipe {
    fn default() -> Self {
        Self::cloud_base()
    }
}

impl TextureRecipe {
    /// Check every parameter of every channel.
    pub fn validate(&self) -> Result<(), NimbusError> {
        self.dims.validate()?;
        match self.channels.len() {
            0 => return Err(NimbusError::NoChannels(self.name.clone())),
            n if n > MAX_CHANNELS => {
                return Err(NimbusError::TooManyChannels { name: self.name.clone(), count: n })
            }
            _ => {}
        }
        for (channel, c) in self.channels.iter().enumerate() {
            c.validate().map_err(|e| NimbusError::Channel {
                recipe: self.name.clone(),
                channel,
                source: Box::new(e),
            })?;
        }
        Ok(())
    }

    /// Validate, then generate and interleave every channel.
    ///
    /// Channel `c` is generated from a seed derived from `seed` and `c`, so
    /// the same recipe and seed always give the same bytes.
    pub fn generate(&self, seed: u64) -> Result<MultiChannelBuffer, NimbusError> {
        self.validate()?;
        info!(
            "generating `{}` ({}x{}x{}, {} channels, seed {seed})",
            self.name,
            self.dims.width,
            self.dims.height,
            self.dims.depth,
            self.channels.len()
        );
        let fields: Vec<ScalarField> = self
            .channels
            .iter()
            .enumerate()
            .map(|(c, channel)| {
                let field = channel.render(self.dims, derive_seed(seed, c as u64 + 1));
                debug!(
                    "`{}` channel {c}: min {} max {}",
                    self.name,
                    field.min_value(),
                    field.max_value()
                );
                field
            })
            .collect();
        Ok(pack::interleave(&fields))
    }

    /// Parse one recipe or an array of recipes, validating each.
    pub fn from_json(json: &str) -> Result<Vec<TextureRecipe>, NimbusError> {
        // Pick the shape from the first token so field errors keep their
        // line and column.
        let recipes = if json.trim_start().starts_with('[') {
            serde_json::from_str::<Vec<TextureRecipe>>(json)?
        } else {
            vec![serde_json::from_str::<TextureRecipe>(json)?]
        };
        for r in &recipes {
            r.validate()?;
        }
        Ok(recipes)
    }

    // ── Built-in cloud textures ──

    /// 128³ base shape: Perlin-Worley in R, Worley fbm at rising
    /// frequencies in G, B and A.
    pub fn cloud_base() -> Self {
        let worley_fbm = |res| {
            ChannelRecipe::new(ChannelSource::WorleyFbm {
                res,
                octaves: 3,
                persistence: 0.5,
                radius: 1.0,
            })
        };
        let perlin_worley = ChannelSource::FloorRemap {
            base: Box::new(
                ChannelRecipe::new(ChannelSource::Perlin {
                    res: 4,
                    octaves: 5,
                    persistence: 0.5,
                    gradient: GradientKind::Permutation,
                })
                .then(PostOp::Spread),
            ),
            floor: Box::new(ChannelRecipe::new(ChannelSource::Worley {
                res: 4,
                normalization: Normalization::MaxDistance,
            })),
        };
        Self {
            name: "cloud-base".into(),
            dims: GridDims::new_3d(128, 128, 128),
            channels: vec![
                ChannelRecipe::new(perlin_worley),
                worley_fbm(8),
                worley_fbm(16),
                worley_fbm(32),
            ],
        }
    }

    /// 32³ erosion detail: Worley at 5, 6 and 7 cells per axis.
    pub fn cloud_detail() -> Self {
        let worley = |res| {
            ChannelRecipe::new(ChannelSource::Worley { res, normalization: Normalization::MaxDistance })
        };
        Self {
            name: "cloud-detail".into(),
            dims: GridDims::new_3d(32, 32, 32),
            channels: vec![worley(5), worley(6), worley(7)],
        }
    }

    /// 128² curl turbulence in three frequencies.
    pub fn cloud_turbulence() -> Self {
        let curl = |res| ChannelRecipe::new(ChannelSource::Curl { res, octaves: 4, persistence: 0.5 });
        Self {
            name: "cloud-turbulence".into(),
            dims: GridDims::new_2d(128, 128),
            channels: vec![curl(5), curl(6), curl(7)],
        }
    }

    /// 1024² weather map: coverage in R, cloud type in G, precipitation in B.
    pub fn weather_map() -> Self {
        let perlin = |res, octaves| {
            ChannelRecipe::new(ChannelSource::Perlin {
                res,
                octaves,
                persistence: 0.5,
                gradient: GradientKind::Permutation,
            })
        };
        let worley = |res| {
            ChannelRecipe::new(ChannelSource::Worley { res, normalization: Normalization::MaxDistance })
        };
        let cloud_type = ChannelSource::Combine {
            sources: vec![
                ChannelRecipe::new(ChannelSource::Combine {
                    sources: vec![perlin(16, 1), perlin(32, 1), perlin(64, 1)],
                }),
                ChannelRecipe::new(ChannelSource::Combine {
                    sources: vec![worley(16), worley(32), worley(64)],
                }),
            ],
        };
        Self {
            name: "weather-map".into(),
            dims: GridDims::new_2d(1024, 1024),
            channels: vec![
                perlin(4, 8).then(PostOp::Spread),
                ChannelRecipe::new(cloud_type).then(PostOp::Spread),
                perlin(8, 1).then(PostOp::Threshold { level: 160 }),
            ],
        }
    }

    /// All built-in recipes.
    pub fn builtin() -> Vec<TextureRecipe> {
        vec![Self::cloud_base(), Self::cloud_detail(), Self::cloud_turbulence(), Self::weather_map()]
    }
}
