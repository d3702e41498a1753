use noise::NoiseFn;
use serde::{Deserialize, Serialize};

use crate::error::NimbusError;
use crate::par::fill_chunks;

/// Grid extent in cells. 2D grids have `depth == 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDims {
    pub width: usize,
    pub height: usize,
    #[serde(default = "default_depth")]
    pub depth: usize,
}

fn default_depth() -> usize {
    1
}

impl GridDims {
    /// A `width × height` plane.
    ///
    /// # Panics
    /// If either axis is zero.
    pub fn new_2d(width: usize, height: usize) -> Self {
        Self::new_3d(width, height, 1)
    }

    /// A `width × height × depth` volume.
    ///
    /// # Panics
    /// If any axis is zero.
    pub fn new_3d(width: usize, height: usize, depth: usize) -> Self {
        let dims = Self { width, height, depth };
        dims.assert_valid();
        dims
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height * self.depth
    }

    /// Cells in one z-slice.
    pub fn slice_len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_volume(&self) -> bool {
        self.depth > 1
    }

    /// Row-major index: x fastest, then y, then z.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.height + y) * self.width + x
    }

    pub fn validate(&self) -> Result<(), NimbusError> {
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(NimbusError::EmptyGrid {
                width: self.width,
                height: self.height,
                depth: self.depth,
            });
        }
        Ok(())
    }

    pub(crate) fn assert_valid(&self) {
        assert!(
            self.width > 0 && self.height > 0 && self.depth > 0,
            "grid dimensions must be non-zero, got {}x{}x{}",
            self.width,
            self.height,
            self.depth
        );
    }
}

/// Affine map of `val` from `[smin, smax]` onto `[dmin, dmax]`.
#[inline]
pub fn map_range(val: f32, smin: f32, smax: f32, dmin: f32, dmax: f32) -> f32 {
    (val - smin) / (smax - smin) * (dmax - dmin) + dmin
}

/// Normalized float → byte, clamped, truncating like an integer cast.
#[inline]
pub fn unit_to_byte(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0) as u8
}

/// One normalized byte per grid cell, row-major (x fastest, then y, then z).
///
/// A byte `b` stands for the value `b / 255` in `[0, 1]`. Fields are built
/// once by a generator and read-only afterwards; every transform returns a
/// new field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarField {
    dims: GridDims,
    data: Vec<u8>,
}

impl ScalarField {
    /// Wrap an existing byte buffer.
    ///
    /// # Panics
    /// If `data.len()` differs from the grid's cell count.
    pub fn from_bytes(dims: GridDims, data: Vec<u8>) -> Self {
        dims.assert_valid();
        assert_eq!(
            data.len(),
            dims.cell_count(),
            "buffer of {} bytes does not fit a {}x{}x{} grid",
            data.len(),
            dims.width,
            dims.height,
            dims.depth
        );
        Self { dims, data }
    }

    /// Every cell set to `value`.
    pub fn filled(dims: GridDims, value: u8) -> Self {
        dims.assert_valid();
        Self { dims, data: vec![value; dims.cell_count()] }
    }

    /// Quantize normalized values (clamped to `[0, 1]`).
    pub fn from_unit_values(dims: GridDims, values: &[f64]) -> Self {
        Self::from_bytes(dims, values.iter().map(|&v| unit_to_byte(v)).collect())
    }

    /// Evaluate a `[0, 1]` point sampler at every cell centre.
    ///
    /// Cell `(x, y, z)` is sampled at `((x + 0.5) / width * res, …)`, so the
    /// grid spans exactly `res` lattice periods on every axis. 2D grids use
    /// the sampler's 2D form. Rows (2D) or z-slices (3D) are filled in
    /// parallel when the `threading` feature is on.
    pub fn sample_grid<S>(dims: GridDims, res: usize, sampler: &S) -> Self
    where
        S: NoiseFn<f64, 2> + NoiseFn<f64, 3> + Sync,
    {
        dims.assert_valid();
        assert!(res >= 1, "resolution must be at least 1");

        let sx = res as f64 / dims.width as f64;
        let sy = res as f64 / dims.height as f64;
        let sz = res as f64 / dims.depth as f64;
        let mut data = vec![0u8; dims.cell_count()];

        if dims.is_volume() {
            fill_chunks(
                &mut data,
                dims.slice_len(),
                (),
                |z, slice| {
                    let pz = (z as f64 + 0.5) * sz;
                    for y in 0..dims.height {
                        let py = (y as f64 + 0.5) * sy;
                        for x in 0..dims.width {
                            let px = (x as f64 + 0.5) * sx;
                            let v = NoiseFn::<f64, 3>::get(sampler, [px, py, pz]);
                            slice[y * dims.width + x] = unit_to_byte(v);
                        }
                    }
                },
                |_, _| (),
            );
        } else {
            fill_chunks(
                &mut data,
                dims.width,
                (),
                |y, row| {
                    let py = (y as f64 + 0.5) * sy;
                    for (x, cell) in row.iter_mut().enumerate() {
                        let px = (x as f64 + 0.5) * sx;
                        *cell = unit_to_byte(NoiseFn::<f64, 2>::get(sampler, [px, py]));
                    }
                },
                |_, _| (),
            );
        }

        Self { dims, data }
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn width(&self) -> usize {
        self.dims.width
    }

    pub fn height(&self) -> usize {
        self.dims.height
    }

    pub fn depth(&self) -> usize {
        self.dims.depth
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> u8 {
        self.data[self.dims.index(x, y, z)]
    }

    #[inline]
    pub fn get_2d(&self, x: usize, y: usize) -> u8 {
        self.get(x, y, 0)
    }

    /// Cell value as a float in `[0, 1]`.
    #[inline]
    pub fn get_unit(&self, x: usize, y: usize, z: usize) -> f32 {
        self.get(x, y, z) as f32 / 255.0
    }

    pub fn min_value(&self) -> u8 {
        self.data.iter().copied().min().unwrap_or(0)
    }

    pub fn max_value(&self) -> u8 {
        self.data.iter().copied().max().unwrap_or(0)
    }

    /// Apply `f` to every byte.
    pub fn map(&self, f: impl Fn(u8) -> u8) -> Self {
        Self { dims: self.dims, data: self.data.iter().map(|&v| f(v)).collect() }
    }

    /// Combine two same-sized fields cell by cell.
    ///
    /// # Panics
    /// If the grids differ.
    pub fn zip_map(&self, other: &Self, f: impl Fn(u8, u8) -> u8) -> Self {
        assert_eq!(
            self.dims, other.dims,
            "fields must share grid dimensions ({:?} vs {:?})",
            self.dims, other.dims
        );
        let data = self.data.iter().zip(&other.data).map(|(&a, &b)| f(a, b)).collect();
        Self { dims: self.dims, data }
    }

    /// Stretch the observed `[min, max]` onto `[0, 255]`.
    ///
    /// A constant field has no range to stretch and is returned unchanged.
    pub fn renormalized(&self) -> Self {
        let (lo, hi) = (self.min_value(), self.max_value());
        if lo == hi {
            return self.clone();
        }
        let (lo, hi) = (lo as f32, hi as f32);
        self.map(|v| map_range(v as f32, lo, hi, 0.0, 255.0) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ramp;

    impl NoiseFn<f64, 2> for Ramp {
        fn get(&self, point: [f64; 2]) -> f64 {
            point[0] / 4.0
        }
    }

    impl NoiseFn<f64, 3> for Ramp {
        fn get(&self, point: [f64; 3]) -> f64 {
            point[2] / 2.0
        }
    }

    #[test]
    fn index_is_x_fastest() {
        let dims = GridDims::new_3d(4, 3, 2);
        assert_eq!(dims.index(0, 0, 0), 0);
        assert_eq!(dims.index(1, 0, 0), 1);
        assert_eq!(dims.index(0, 1, 0), 4);
        assert_eq!(dims.index(0, 0, 1), 12);
        assert_eq!(dims.index(3, 2, 1), 23);
    }

    #[test]
    #[should_panic(expected = "grid dimensions must be non-zero")]
    fn zero_width_panics() {
        GridDims::new_2d(0, 8);
    }

    #[test]
    fn validate_reports_empty_axis() {
        let dims = GridDims { width: 4, height: 0, depth: 1 };
        assert!(matches!(dims.validate(), Err(NimbusError::EmptyGrid { height: 0, .. })));
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn from_bytes_rejects_wrong_length() {
        ScalarField::from_bytes(GridDims::new_2d(2, 2), vec![0; 5]);
    }

    #[test]
    fn renormalize_stretches_to_full_range() {
        let field = ScalarField::from_bytes(GridDims::new_2d(4, 1), vec![50, 100, 150, 200]);
        let out = field.renormalized();
        assert_eq!(out.as_bytes(), &[0, 85, 170, 255]);
    }

    #[test]
    fn renormalize_keeps_constant_field() {
        let field = ScalarField::filled(GridDims::new_2d(3, 3), 77);
        assert_eq!(field.renormalized(), field);
    }

    #[test]
    fn unit_to_byte_clamps() {
        assert_eq!(unit_to_byte(-0.5), 0);
        assert_eq!(unit_to_byte(0.0), 0);
        assert_eq!(unit_to_byte(1.0), 255);
        assert_eq!(unit_to_byte(3.0), 255);
    }

    #[test]
    fn sample_grid_uses_cell_centres() {
        // 2D: x spans res = 4 lattice units across 8 cells.
        let field = ScalarField::sample_grid(GridDims::new_2d(8, 2), 4, &Ramp);
        assert_eq!(field.get_2d(0, 0), unit_to_byte(0.25 / 4.0));
        assert_eq!(field.get_2d(7, 1), unit_to_byte(3.75 / 4.0));

        // 3D picks the volume form of the sampler.
        let vol = ScalarField::sample_grid(GridDims::new_3d(2, 2, 4), 2, &Ramp);
        assert_eq!(vol.get(0, 0, 0), unit_to_byte(0.25 / 2.0));
        assert_eq!(vol.get(1, 1, 3), unit_to_byte(1.75 / 2.0));
    }
}
