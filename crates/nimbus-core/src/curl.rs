//! Curl magnitude of a scalar field.
//!
//! For a 2D potential `ψ` the curl is the rotated gradient `(∂ψ/∂y, −∂ψ/∂x)`.
//! Its magnitude adds swirling detail on top of a base gradient-noise field.
//! Derivatives are central differences with periodic wrap, so a tileable input
//! gives a tileable output.

use log::debug;

use crate::field::{map_range, GridDims, ScalarField};
use crate::gradient::{perlin_field, PermutationTable};
use crate::par::fill_chunks;

/// Curl magnitude of `field`, renormalized to `[0, 255]` by its maximum.
///
/// Volumes are treated slice by slice. A constant input has no curl and
/// yields an all-zero field.
pub fn curl(field: &ScalarField) -> ScalarField {
    let dims = field.dims();
    let (w, h) = (dims.width, dims.height);
    let mut magnitude = vec![0.0f32; dims.cell_count()];

    let max = fill_chunks(
        &mut magnitude,
        w,
        0.0f32,
        |row, out| {
            let (y, z) = (row % h, row / h);
            let (yp, yn) = ((y + 1) % h, (y + h - 1) % h);
            let mut row_max = 0.0f32;
            for (x, cell) in out.iter_mut().enumerate() {
                let (xp, xn) = ((x + 1) % w, (x + w - 1) % w);
                // Central differences in normalized units: Δbyte / 255 / 2.
                let dx = (field.get(xp, y, z) as f32 - field.get(xn, y, z) as f32) / 510.0;
                let dy = (field.get(x, yp, z) as f32 - field.get(x, yn, z) as f32) / 510.0;
                // |(dy, -dx)|
                let m = dy.hypot(-dx);
                *cell = m;
                row_max = row_max.max(m);
            }
            row_max
        },
        f32::max,
    );

    debug!("curl {}x{}x{} max magnitude {max:.4}", w, h, dims.depth);
    if max <= 0.0 {
        return ScalarField::filled(dims, 0);
    }
    let bytes = magnitude.iter().map(|&m| map_range(m, 0.0, max, 0.0, 255.0) as u8).collect();
    ScalarField::from_bytes(dims, bytes)
}

/// Curl of tileable fbm gradient noise.
///
/// The base field is `perlin_field` with a permutation shuffled from `seed`.
pub fn curl_noise(dims: GridDims, res: usize, octaves: u32, persistence: f64, seed: u64) -> ScalarField {
    let base = perlin_field(PermutationTable::seeded(seed), dims, res, octaves, persistence);
    curl(&base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_field_has_no_curl() {
        let field = ScalarField::filled(GridDims::new_2d(8, 8), 200);
        assert!(curl(&field).as_bytes().iter().all(|&v| v == 0));
    }

    #[test]
    fn horizontal_ramp_has_uniform_interior_curl() {
        // Periodic ramp in x: interior cells all see the same slope, the two
        // wrap columns see the drop and carry the maximum.
        let dims = GridDims::new_2d(8, 4);
        let bytes: Vec<u8> = (0..4).flat_map(|_| (0..8).map(|x| x as u8 * 10)).collect();
        let out = curl(&ScalarField::from_bytes(dims, bytes));
        for y in 0..4 {
            assert_eq!(out.get_2d(0, y), 255);
            assert_eq!(out.get_2d(7, y), 255);
            for x in 1..7 {
                assert_eq!(out.get_2d(x, y), out.get_2d(1, 0));
                assert!(out.get_2d(x, y) < 255);
            }
        }
    }

    #[test]
    fn vertical_derivative_is_used() {
        // Variation only along y must still produce curl.
        let dims = GridDims::new_2d(4, 4);
        let bytes: Vec<u8> = (0..4).flat_map(|y| std::iter::repeat(y as u8 * 60).take(4)).collect();
        let out = curl(&ScalarField::from_bytes(dims, bytes));
        assert_eq!(out.max_value(), 255);
        assert!(out.as_bytes().iter().all(|&v| v > 0));
    }

    #[test]
    fn curl_noise_spans_full_range() {
        let field = curl_noise(GridDims::new_2d(32, 32), 4, 2, 0.5, 7);
        assert_eq!(field.max_value(), 255);
        assert_eq!(field.len(), 32 * 32);
    }

    #[test]
    fn volume_is_processed_per_slice() {
        let dims = GridDims::new_3d(4, 4, 2);
        let mut bytes = vec![0u8; 16];
        bytes.extend((0..16).map(|i| (i % 4) as u8 * 50));
        let out = curl(&ScalarField::from_bytes(dims, bytes));
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(out.get(x, y, 0), 0, "flat slice must stay flat");
                assert!(out.get(x, y, 1) > 0);
            }
        }
    }
}
