//! Channel packing and per-cell field arithmetic.
//!
//! The packed output is the only thing the texture layer sees: a flat byte
//! buffer of `width × height × depth × channels` bytes, row-major with the
//! channel index fastest, one byte per channel.

use log::debug;

use crate::field::{map_range, GridDims, ScalarField};

/// Same-sized fields interleaved per cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiChannelBuffer {
    dims: GridDims,
    channels: usize,
    data: Vec<u8>,
}

impl MultiChannelBuffer {
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Bytes per cell.
    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Byte `c` of cell `p` sits at `p * channels + c`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// All channel bytes of cell `index`.
    pub fn cell(&self, index: usize) -> &[u8] {
        &self.data[index * self.channels..(index + 1) * self.channels]
    }

    /// De-interleave channel `c`.
    ///
    /// # Panics
    /// If `c >= channels`.
    pub fn channel(&self, c: usize) -> ScalarField {
        assert!(c < self.channels, "channel {c} out of range for {} channels", self.channels);
        let bytes = self.data.iter().skip(c).step_by(self.channels).copied().collect();
        ScalarField::from_bytes(self.dims, bytes)
    }
}

fn assert_same_dims(fields: &[&ScalarField]) -> GridDims {
    let dims = fields[0].dims();
    for (i, f) in fields.iter().enumerate().skip(1) {
        assert_eq!(
            f.dims(),
            dims,
            "field {i} is {}x{}x{}, expected {}x{}x{}",
            f.width(),
            f.height(),
            f.depth(),
            dims.width,
            dims.height,
            dims.depth
        );
    }
    dims
}

/// Interleave `fields` into one buffer, channel `c` taken from `fields[c]`.
///
/// # Panics
/// If `fields` is empty or the fields differ in size.
pub fn interleave(fields: &[ScalarField]) -> MultiChannelBuffer {
    assert!(!fields.is_empty(), "interleave needs at least one field");
    let refs: Vec<&ScalarField> = fields.iter().collect();
    let dims = assert_same_dims(&refs);
    let channels = fields.len();

    let mut data = vec![0u8; dims.cell_count() * channels];
    for (c, field) in fields.iter().enumerate() {
        for (p, &v) in field.as_bytes().iter().enumerate() {
            data[p * channels + c] = v;
        }
    }
    debug!("interleaved {channels} channels over {} cells", dims.cell_count());
    MultiChannelBuffer { dims, channels, data }
}

/// Per-cell mean of `fields`, truncated.
///
/// # Panics
/// If `fields` is empty or the fields differ in size.
pub fn combine(fields: &[ScalarField]) -> ScalarField {
    assert!(!fields.is_empty(), "combine needs at least one field");
    let refs: Vec<&ScalarField> = fields.iter().collect();
    let dims = assert_same_dims(&refs);
    let n = fields.len() as u32;

    let bytes = (0..dims.cell_count())
        .map(|i| {
            let sum: u32 = fields.iter().map(|f| f.as_bytes()[i] as u32).sum();
            (sum / n) as u8
        })
        .collect();
    ScalarField::from_bytes(dims, bytes)
}

/// `(1 − t)·a + t·b` per cell, rounded and clamped.
///
/// # Panics
/// If the fields differ in size or `t` is not finite.
pub fn lerp(a: &ScalarField, b: &ScalarField, t: f32) -> ScalarField {
    assert!(t.is_finite(), "lerp weight must be finite, got {t}");
    a.zip_map(b, |x, y| {
        ((1.0 - t) * x as f32 + t * y as f32).round().clamp(0.0, 255.0) as u8
    })
}

/// Affine remap of every byte from `[src_min, src_max]` to
/// `[dst_min, dst_max]`, clamped to `[0, 255]`.
///
/// # Panics
/// If `src_max <= src_min`.
pub fn remap(field: &ScalarField, src_min: f32, src_max: f32, dst_min: f32, dst_max: f32) -> ScalarField {
    assert!(src_max > src_min, "remap source range [{src_min}, {src_max}] is empty");
    field.map(|v| map_range(v as f32, src_min, src_max, dst_min, dst_max).clamp(0.0, 255.0) as u8)
}

/// Contrast stretch from the field's own min/max to `[0, 255]`.
pub fn spread(field: &ScalarField) -> ScalarField {
    field.renormalized()
}

/// Zero every byte below `t`; keep the rest.
pub fn threshold(field: &ScalarField, t: u8) -> ScalarField {
    field.map(|v| if v < t { 0 } else { v })
}

/// Multiply every byte by `factor`, clamped to `[0, 255]`.
///
/// # Panics
/// If `factor` is not finite.
pub fn scale(field: &ScalarField, factor: f32) -> ScalarField {
    assert!(factor.is_finite(), "scale factor must be finite, got {factor}");
    field.map(|v| (v as f32 * factor).clamp(0.0, 255.0) as u8)
}

/// `255 − v` per cell.
pub fn invert(field: &ScalarField) -> ScalarField {
    field.map(|v| 255 - v)
}

/// Remap `base` into `[floor, 1]` cell by cell.
///
/// Values of `base` under the local floor are first raised to it, so the
/// result never drops below `floor`; this carves the floor field's shapes
/// out of the base (a Perlin base with a Worley floor gives billowy cloud
/// shapes).
///
/// # Panics
/// If the fields differ in size.
pub fn remap_floor(base: &ScalarField, floor: &ScalarField) -> ScalarField {
    base.zip_map(floor, |b, f| {
        let (b, f) = (b as f32 / 255.0, f as f32 / 255.0);
        let v = map_range(b.clamp(f, 1.0), 0.0, 1.0, f, 1.0);
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(bytes: &[u8]) -> ScalarField {
        ScalarField::from_bytes(GridDims::new_2d(bytes.len(), 1), bytes.to_vec())
    }

    #[test]
    fn interleave_layout_is_channel_fastest() {
        let buf = interleave(&[field(&[1, 2, 3]), field(&[10, 20, 30]), field(&[7, 8, 9])]);
        assert_eq!(buf.channels(), 3);
        assert_eq!(buf.as_bytes(), &[1, 10, 7, 2, 20, 8, 3, 30, 9]);
        assert_eq!(buf.cell(1), &[2, 20, 8]);
        assert_eq!(buf.len(), 9);
    }

    #[test]
    fn interleave_round_trips_every_channel() {
        let dims = GridDims::new_3d(5, 3, 2);
        let fields: Vec<ScalarField> = (0..4u32)
            .map(|c| {
                let bytes = (0..dims.cell_count() as u32).map(|i| ((i * 7 + c * 61) % 256) as u8).collect();
                ScalarField::from_bytes(dims, bytes)
            })
            .collect();
        let buf = interleave(&fields);
        for (c, f) in fields.iter().enumerate() {
            assert_eq!(&buf.channel(c), f);
        }
    }

    #[test]
    #[should_panic(expected = "field 1 is")]
    fn interleave_rejects_mismatched_sizes() {
        interleave(&[field(&[1, 2, 3]), field(&[1, 2])]);
    }

    #[test]
    #[should_panic(expected = "at least one field")]
    fn combine_rejects_empty_input() {
        combine(&[]);
    }

    #[test]
    fn combine_with_itself_is_identity() {
        let a = field(&[0, 1, 127, 128, 254, 255]);
        assert_eq!(combine(&[a.clone(), a.clone()]), a);
    }

    #[test]
    fn combine_truncates_mean() {
        let out = combine(&[field(&[0, 10, 255]), field(&[1, 11, 254]), field(&[1, 10, 254])]);
        assert_eq!(out.as_bytes(), &[0, 10, 254]);
    }

    #[test]
    fn lerp_endpoints_and_midpoint() {
        let a = field(&[0, 100, 255]);
        let b = field(&[255, 200, 0]);
        assert_eq!(lerp(&a, &b, 0.0), a);
        assert_eq!(lerp(&a, &b, 1.0), b);
        assert_eq!(lerp(&a, &b, 0.5).as_bytes(), &[128, 150, 128]);
    }

    #[test]
    fn threshold_zeroes_below_level_only() {
        let bytes: Vec<u8> = (0..=255).collect();
        let out = threshold(&field(&bytes), 128);
        for (i, &v) in out.as_bytes().iter().enumerate() {
            if i < 128 {
                assert_eq!(v, 0);
            } else {
                assert_eq!(v, i as u8);
            }
        }
    }

    #[test]
    fn remap_and_spread_are_monotonic() {
        let bytes: Vec<u8> = (0..=255).collect();
        let input = field(&bytes);
        for out in [
            remap(&input, 30.0, 200.0, 10.0, 240.0),
            remap(&input, 0.0, 255.0, 0.0, 255.0),
            spread(&field(&bytes[40..90])),
        ] {
            assert!(out.as_bytes().windows(2).all(|w| w[0] <= w[1]));
        }
        let stretched = spread(&field(&[40, 60, 90]));
        assert_eq!(stretched.as_bytes()[0], 0);
        assert_eq!(stretched.as_bytes()[2], 255);
    }

    #[test]
    fn remap_clamps_outside_target() {
        let out = remap(&field(&[0, 128, 255]), 100.0, 150.0, 0.0, 255.0);
        assert_eq!(out.as_bytes()[0], 0);
        assert_eq!(out.as_bytes()[2], 255);
    }

    #[test]
    fn scale_and_invert() {
        let f = field(&[0, 100, 200]);
        assert_eq!(scale(&f, 1.5).as_bytes(), &[0, 150, 255]);
        assert_eq!(invert(&f).as_bytes(), &[255, 155, 55]);
    }

    #[test]
    fn remap_floor_never_drops_below_floor() {
        let base = field(&[0, 64, 128, 255]);
        let floor = field(&[100, 100, 0, 255]);
        let out = remap_floor(&base, &floor);
        for (o, f) in out.as_bytes().iter().zip(floor.as_bytes()) {
            assert!(o >= f, "{o} below floor {f}");
        }
        // A zero floor leaves the base untouched.
        assert_eq!(out.as_bytes()[2], 128);
    }
}
