//! Tileable procedural noise for volumetric cloud textures.
//!
//! Generators produce single-channel [`ScalarField`]s over 2D or 3D grids;
//! [`pack`] merges them into the interleaved byte buffer a texture upload
//! layer expects. Every generator takes an explicit seed, so the same
//! parameters always produce the same bytes.
//!
//! Degenerate parameters (zero-sized grids, `res == 0`, mismatched channel
//! sizes) are caller bugs and panic before any output is allocated. Recipes
//! loaded from configuration go through [`recipe::TextureRecipe::validate`]
//! instead, which reports the same problems as [`NimbusError`].

pub mod cellular;
pub mod curl;
pub mod error;
pub mod fbm;
pub mod field;
pub mod gradient;
pub mod pack;
pub mod recipe;

mod par;

pub use cellular::{worley_fbm_field, worley_field, CellularNoise, FeaturePointGrid, Normalization};
pub use curl::{curl, curl_noise};
pub use error::NimbusError;
pub use fbm::Fbm;
pub use field::{GridDims, ScalarField};
pub use gradient::{perlin_field, CellVectors, GradientNoise, GradientStrategy, PermutationTable};
pub use pack::MultiChannelBuffer;
pub use recipe::TextureRecipe;
