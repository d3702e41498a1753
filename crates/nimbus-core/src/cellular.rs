//! Tileable cellular (Worley) noise.
//!
//! The lattice is split into `res` cells per axis with one random feature
//! point in each. A sample finds the nearest feature point among the 3×3
//! (3×3×3) neighbouring cells. Neighbour indices wrap modulo `res` and the
//! wrapped point is shifted back by a whole lattice span, so distances across
//! the texture edge are the toroidal ones in 2D and 3D alike.

use log::debug;
use noise::NoiseFn;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::fbm::Fbm;
use crate::field::{map_range, GridDims, ScalarField};
use crate::par::fill_chunks;

/// How nearest-point distances become bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Stretch by the largest distance observed in the field.
    MaxDistance,
    /// Fixed ceiling in grid cells; farther cells clamp to black. Keeps the
    /// brightness comparable between point densities.
    Radius(f32),
}

impl Default for Normalization {
    fn default() -> Self {
        Self::MaxDistance
    }
}

/// One feature point per lattice cell, in lattice units.
///
/// Point `i` of cell `c` lies in `[c, c + 1)` on every axis. 2D grids keep
/// `z = 0`.
#[derive(Debug, Clone)]
pub struct FeaturePointGrid {
    res: usize,
    volume: bool,
    points: Vec<[f64; 3]>,
}

impl FeaturePointGrid {
    /// # Panics
    /// If `res == 0`.
    pub fn new_2d(res: usize, seed: u64) -> Self {
        Self::generate(res, false, seed)
    }

    /// # Panics
    /// If `res == 0`.
    pub fn new_3d(res: usize, seed: u64) -> Self {
        Self::generate(res, true, seed)
    }

    fn generate(res: usize, volume: bool, seed: u64) -> Self {
        assert!(res >= 1, "resolution must be at least 1");
        let mut rng = StdRng::seed_from_u64(seed ^ 0x3C0F_FEE5_C311_0003);
        let layers = if volume { res } else { 1 };
        let mut points = Vec::with_capacity(res * res * layers);
        for z in 0..layers {
            for y in 0..res {
                for x in 0..res {
                    let pz = if volume { z as f64 + rng.gen::<f64>() } else { 0.0 };
                    points.push([x as f64 + rng.gen::<f64>(), y as f64 + rng.gen::<f64>(), pz]);
                }
            }
        }
        Self { res, volume, points }
    }

    pub fn res(&self) -> usize {
        self.res
    }

    pub fn is_volume(&self) -> bool {
        self.volume
    }

    /// Feature point of cell `(x, y, z)` (`z` ignored in 2D).
    pub fn point(&self, x: usize, y: usize, z: usize) -> [f64; 3] {
        let z = if self.volume { z } else { 0 };
        self.points[(z * self.res + y) * self.res + x]
    }

    /// Distance from `pos` (lattice units) to the nearest feature point.
    ///
    /// Each axis of the difference is multiplied by `step` before the norm,
    /// which turns lattice units into grid cells when cells are not square.
    /// The search starts from the own cell's point and widens along every
    /// axis until no unvisited cell can hold a closer point, so the result
    /// is exact on anisotropic grids too. Square cells mostly stay within the
    /// 3×3 (3×3×3) block.
    pub fn nearest_distance(&self, pos: [f64; 3], step: [f64; 3]) -> f64 {
        let cell = [
            pos[0].floor() as i64,
            pos[1].floor() as i64,
            if self.volume { pos[2].floor() as i64 } else { 0 },
        ];
        let bound = self.distance_sq(cell, pos, step).sqrt();

        // A cell k steps away along an axis is at least (k - 1)·step from pos.
        let reach = |axis: usize| -> i64 {
            if axis == 2 && !self.volume {
                return 0;
            }
            let k = (bound / step[axis]).floor() as i64 + 1;
            k.min(self.res as i64)
        };
        let (rx, ry, rz) = (reach(0), reach(1), reach(2));

        let mut min_sq = f64::MAX;
        for dz in -rz..=rz {
            for dy in -ry..=ry {
                for dx in -rx..=rx {
                    let n = [cell[0] + dx, cell[1] + dy, cell[2] + dz];
                    min_sq = min_sq.min(self.distance_sq(n, pos, step));
                }
            }
        }
        min_sq.sqrt()
    }

    /// Squared scaled distance from `pos` to the point of the unwrapped
    /// lattice cell `n`.
    #[inline]
    fn distance_sq(&self, n: [i64; 3], pos: [f64; 3], step: [f64; 3]) -> f64 {
        let res = self.res as i64;
        let w = [n[0].rem_euclid(res), n[1].rem_euclid(res), n[2].rem_euclid(res)];
        let p = self.point(w[0] as usize, w[1] as usize, w[2] as usize);

        let mut dist_sq = 0.0;
        for axis in 0..3 {
            // Shift the wrapped point back next to the unwrapped neighbour.
            let shifted = p[axis] + (n[axis] - w[axis]) as f64;
            let d = (shifted - pos[axis]) * step[axis];
            dist_sq += d * d;
        }
        dist_sq
    }
}

/// Worley noise as a point sampler over a unit-cell lattice.
///
/// Returns `1 − min(d / radius, 1)` with `d` in lattice units, so feature
/// points are bright. The lattice repeats every `res` units.
#[derive(Debug, Clone)]
pub struct CellularNoise {
    grid: FeaturePointGrid,
    radius: f64,
}

impl CellularNoise {
    /// Default radius of one lattice cell.
    pub fn new(grid: FeaturePointGrid) -> Self {
        Self { grid, radius: 1.0 }
    }

    /// # Panics
    /// If `radius` is not positive and finite.
    pub fn with_radius(mut self, radius: f64) -> Self {
        assert!(radius > 0.0 && radius.is_finite(), "radius must be positive and finite, got {radius}");
        self.radius = radius;
        self
    }

    pub fn grid(&self) -> &FeaturePointGrid {
        &self.grid
    }

    #[inline]
    fn brightness(&self, pos: [f64; 3]) -> f64 {
        let d = self.grid.nearest_distance(pos, [1.0; 3]);
        1.0 - (d / self.radius).min(1.0)
    }
}

impl NoiseFn<f64, 2> for CellularNoise {
    fn get(&self, point: [f64; 2]) -> f64 {
        self.brightness([point[0], point[1], 0.0])
    }
}

impl NoiseFn<f64, 3> for CellularNoise {
    fn get(&self, point: [f64; 3]) -> f64 {
        let z = if self.grid.volume { point[2] } else { 0.0 };
        self.brightness([point[0], point[1], z])
    }
}

/// Map a nearest distance to a byte: 0 → 255, `ceiling` and beyond → 0.
#[inline]
pub fn distance_to_byte(dist: f32, ceiling: f32) -> u8 {
    if ceiling <= 0.0 {
        return 255;
    }
    map_range(dist.clamp(0.0, ceiling), 0.0, ceiling, 255.0, 0.0) as u8
}

/// `width × height` Worley noise with `res × res` cells.
pub fn worley_2d(width: usize, height: usize, res: usize, norm: Normalization, seed: u64) -> ScalarField {
    worley_field(GridDims::new_2d(width, height), res, norm, seed)
}

/// `width × height × depth` Worley noise with `res³` cells.
pub fn worley_3d(
    width: usize,
    height: usize,
    depth: usize,
    res: usize,
    norm: Normalization,
    seed: u64,
) -> ScalarField {
    worley_field(GridDims::new_3d(width, height, depth), res, norm, seed)
}

/// Worley noise over `dims`: 2D when `depth == 1`, volumetric otherwise.
///
/// Distances are measured between cell centres and feature points in grid
/// cells. The feature points are placed before any cell is evaluated; slices
/// are then filled in parallel and the largest distance is reduced across
/// slices.
///
/// # Panics
/// If the grid is empty, `res == 0`, or a radius is not positive and finite.
pub fn worley_field(dims: GridDims, res: usize, norm: Normalization, seed: u64) -> ScalarField {
    dims.assert_valid();
    assert!(res >= 1, "resolution must be at least 1");
    if let Normalization::Radius(r) = norm {
        assert!(r > 0.0 && r.is_finite(), "radius must be positive and finite, got {r}");
    }

    let volume = dims.is_volume();
    let grid = if volume {
        FeaturePointGrid::new_3d(res, seed)
    } else {
        FeaturePointGrid::new_2d(res, seed)
    };
    Worley::new(&grid, dims).render(norm)
}

/// Fbm of [`CellularNoise`] over `dims`, `radius` in lattice cells.
///
/// Every octave frequency is a power of two, so the result tiles like a
/// single Worley layer.
///
/// # Panics
/// If the grid is empty, `res == 0`, `octaves == 0`, or `radius` is not
/// positive and finite.
pub fn worley_fbm_field(
    dims: GridDims,
    res: usize,
    octaves: u32,
    persistence: f64,
    radius: f64,
    seed: u64,
) -> ScalarField {
    dims.assert_valid();
    let grid = if dims.is_volume() {
        FeaturePointGrid::new_3d(res, seed)
    } else {
        FeaturePointGrid::new_2d(res, seed)
    };
    debug!(
        "worley fbm {}x{}x{} res={res} octaves={octaves} radius={radius}",
        dims.width, dims.height, dims.depth
    );
    let fbm = Fbm::new(CellularNoise::new(grid).with_radius(radius), octaves, persistence);
    ScalarField::sample_grid(dims, res, &fbm)
}

/// Grid evaluation of a [`FeaturePointGrid`].
struct Worley<'a> {
    grid: &'a FeaturePointGrid,
    dims: GridDims,
    /// Grid cells per lattice cell on each axis.
    step: [f64; 3],
}

impl<'a> Worley<'a> {
    fn new(grid: &'a FeaturePointGrid, dims: GridDims) -> Self {
        let res = grid.res() as f64;
        let step = [
            dims.width as f64 / res,
            dims.height as f64 / res,
            if grid.is_volume() { dims.depth as f64 / res } else { 1.0 },
        ];
        Self { grid, dims, step }
    }

    /// Nearest distance (grid cells) for every cell, plus the largest one.
    fn distances(&self) -> (Vec<f32>, f32) {
        let dims = self.dims;
        let step = self.step;
        let mut dist = vec![0.0f32; dims.cell_count()];
        let max = fill_chunks(
            &mut dist,
            dims.slice_len(),
            0.0f32,
            |z, slice| {
                let pz = if self.grid.is_volume() { (z as f64 + 0.5) / step[2] } else { 0.0 };
                let mut slice_max = 0.0f32;
                for y in 0..dims.height {
                    let py = (y as f64 + 0.5) / step[1];
                    for x in 0..dims.width {
                        let px = (x as f64 + 0.5) / step[0];
                        let d = self.grid.nearest_distance([px, py, pz], step) as f32;
                        slice[y * dims.width + x] = d;
                        slice_max = slice_max.max(d);
                    }
                }
                slice_max
            },
            f32::max,
        );
        (dist, max)
    }

    fn render(&self, norm: Normalization) -> ScalarField {
        let (dist, max) = self.distances();
        let ceiling = match norm {
            Normalization::MaxDistance => max,
            Normalization::Radius(r) => r,
        };
        debug!(
            "worley {}x{}x{} res={} max_dist={max:.3} ceiling={ceiling:.3}",
            self.dims.width,
            self.dims.height,
            self.dims.depth,
            self.grid.res()
        );
        let bytes = dist.iter().map(|&d| distance_to_byte(d, ceiling)).collect();
        ScalarField::from_bytes(self.dims, bytes)
    }
}
