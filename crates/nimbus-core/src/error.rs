//! Configuration error types.

use thiserror::Error;

/// Errors reported while validating or loading texture recipes.
///
/// The numeric generators themselves panic on these conditions; recipes are
/// checked up front so a bad configuration never reaches them.
#[derive(Debug, Error)]
pub enum NimbusError {
    /// A grid axis has zero length.
    #[error("grid dimensions must be non-zero, got {width}x{height}x{depth}")]
    EmptyGrid {
        width: usize,
        height: usize,
        depth: usize,
    },

    /// Cell resolution below one.
    #[error("resolution must be at least 1")]
    ZeroResolution,

    /// Octave count below one.
    #[error("octave count must be at least 1")]
    ZeroOctaves,

    /// Persistence is negative, NaN or infinite.
    #[error("persistence must be finite and non-negative, got {0}")]
    InvalidPersistence(f64),

    /// Cellular normalization radius is not a positive finite number.
    #[error("radius must be positive and finite, got {0}")]
    InvalidRadius(f64),

    /// Scale factor is NaN or infinite.
    #[error("scale factor must be finite, got {0}")]
    InvalidScale(f32),

    /// Remap source range with `max <= min`.
    #[error("remap source range [{min}, {max}] is empty")]
    EmptyRange { min: f32, max: f32 },

    /// Lerp weight is NaN or infinite.
    #[error("lerp weight must be finite, got {0}")]
    InvalidWeight(f32),

    /// A combine source list is empty.
    #[error("combine needs at least one source")]
    EmptyCombine,

    /// Recipe with no channels.
    #[error("recipe `{0}` has no channels")]
    NoChannels(String),

    /// Recipe with more channels than a texture can hold.
    #[error("recipe `{name}` has {count} channels, at most 4 are supported")]
    TooManyChannels { name: String, count: usize },

    /// A channel of a recipe failed validation.
    #[error("recipe `{recipe}` channel {channel}: {source}")]
    Channel {
        recipe: String,
        channel: usize,
        #[source]
        source: Box<NimbusError>,
    },

    /// Malformed recipe JSON.
    #[error("invalid recipe JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
