//! Tileable gradient (Perlin) noise.
//!
//! [`GradientNoise`] does the lattice walk, wrapping, fading and blending;
//! a [`GradientStrategy`] supplies the corner gradients. Two strategies are
//! provided:
//!
//! * [`PermutationTable`]: the classic hashed 256-entry permutation with
//!   twelve edge gradients.
//! * [`CellVectors`]: a `res`-periodic grid of random unit vectors.
//!
//! Both scale their interpolated value onto a nominal `[-1, 1]`, which
//! `GradientNoise` maps to `[0, 1]` with `(v + 1) / 2`, so the strategies are
//! interchangeable in every generator.

use log::debug;
use noise::NoiseFn;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::fbm;
use crate::field::{GridDims, ScalarField};

/// Ken Perlin's reference permutation.
pub const REFERENCE_PERMUTATION: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225, 140, 36, 103, 30, 69,
    142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148, 247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219,
    203, 117, 35, 11, 32, 57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122, 60, 211, 133, 230,
    220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54, 65, 25, 63, 161, 1, 216, 80, 73, 209, 76,
    132, 187, 208, 89, 18, 169, 200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173,
    186, 3, 64, 52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212, 207, 206,
    59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213, 119, 248, 152, 2, 44, 154, 163,
    70, 221, 153, 101, 155, 167, 43, 172, 9, 129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232,
    178, 185, 112, 104, 218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162,
    241, 81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157, 184, 84, 204,
    176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93, 222, 114, 67, 29, 24, 72, 243, 141,
    128, 195, 78, 66, 215, 61, 156, 180,
];

/// Source of lattice-corner gradients.
///
/// Corner coordinates arrive already wrapped when the noise repeats; a
/// strategy must still accept any integer (negative included).
pub trait GradientStrategy: Send + Sync {
    /// Dot product of the gradient at `corner` with `offset` (sample point
    /// minus corner).
    fn dot2(&self, corner: [i64; 2], offset: [f64; 2]) -> f64;

    fn dot3(&self, corner: [i64; 3], offset: [f64; 3]) -> f64;

    /// Largest magnitude the blended value can reach in `dims` dimensions.
    fn amplitude(&self, dims: usize) -> f64;
}

// ── Classic permutation table ────────────────────────────────────────────────

/// Hash-based corner gradients through a doubled 256-entry permutation.
#[derive(Debug, Clone)]
pub struct PermutationTable {
    perm: [u8; 512],
}

impl PermutationTable {
    /// The reference permutation; output is identical on every run.
    pub fn reference() -> Self {
        Self::from_permutation(&REFERENCE_PERMUTATION)
    }

    /// A fresh permutation of `0..=255` shuffled from `seed`.
    pub fn seeded(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed ^ 0x9E11_A5ED_0B5E_ED01);
        let mut base: Vec<u8> = (0..=255).collect();
        base.shuffle(&mut rng);
        let mut table = [0u8; 256];
        table.copy_from_slice(&base);
        Self::from_permutation(&table)
    }

    fn from_permutation(table: &[u8; 256]) -> Self {
        let mut perm = [0u8; 512];
        for (i, p) in perm.iter_mut().enumerate() {
            *p = table[i & 255];
        }
        Self { perm }
    }

    #[inline]
    fn p(&self, i: usize) -> usize {
        self.perm[i] as usize
    }

    #[inline]
    fn hash(&self, x: i64, y: i64, z: i64) -> usize {
        let (x, y, z) = ((x & 255) as usize, (y & 255) as usize, (z & 255) as usize);
        self.p(self.p(self.p(x) + y) + z)
    }
}

impl Default for PermutationTable {
    fn default() -> Self {
        Self::reference()
    }
}

/// One of the twelve cube-edge gradients (plus four repeats) dotted with
/// `(x, y, z)`, selected by the low four bits of `hash`.
#[inline]
fn edge_grad(hash: usize, x: f64, y: f64, z: f64) -> f64 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    let u = if h & 1 == 0 { u } else { -u };
    let v = if h & 2 == 0 { v } else { -v };
    u + v
}

impl GradientStrategy for PermutationTable {
    fn dot2(&self, corner: [i64; 2], offset: [f64; 2]) -> f64 {
        // The z = 0 plane of the volume gradients.
        edge_grad(self.hash(corner[0], corner[1], 0), offset[0], offset[1], 0.0)
    }

    fn dot3(&self, corner: [i64; 3], offset: [f64; 3]) -> f64 {
        edge_grad(self.hash(corner[0], corner[1], corner[2]), offset[0], offset[1], offset[2])
    }

    fn amplitude(&self, _dims: usize) -> f64 {
        1.0
    }
}

// ── Per-lattice-point unit vectors ───────────────────────────────────────────

/// Random unit gradients on a `res`-periodic lattice.
///
/// A planar table holds `res²` vectors and a volume table `res³`; only the
/// one the grid needs is built. Sampling the other dimensionality reuses the
/// existing table: a planar table lifts its vectors to `z = 0`, a volume
/// table serves 2D lookups from its `z = 0` layer.
#[derive(Debug, Clone)]
pub struct CellVectors {
    res: usize,
    planar: Vec<[f64; 2]>,
    spatial: Vec<[f64; 3]>,
}

impl CellVectors {
    /// `res²` unit vectors on the circle.
    ///
    /// # Panics
    /// If `res == 0`.
    pub fn new_2d(res: usize, seed: u64) -> Self {
        let mut rng = Self::rng(res, seed);
        let planar = (0..res * res)
            .map(|_| {
                let theta: f64 = rng.gen_range(0.0_f64..std::f64::consts::TAU);
                [theta.cos(), theta.sin()]
            })
            .collect();
        Self { res, planar, spatial: Vec::new() }
    }

    /// `res³` unit vectors on the sphere.
    ///
    /// # Panics
    /// If `res == 0`.
    pub fn new_3d(res: usize, seed: u64) -> Self {
        let mut rng = Self::rng(res, seed);
        let spatial = (0..res * res * res)
            .map(|_| {
                let z: f64 = rng.gen_range(-1.0_f64..=1.0_f64);
                let theta: f64 = rng.gen_range(0.0_f64..std::f64::consts::TAU);
                let r = (1.0_f64 - z * z).max(0.0).sqrt();
                [r * theta.cos(), r * theta.sin(), z]
            })
            .collect();
        Self { res, planar: Vec::new(), spatial }
    }

    /// The table `dims` needs: volume for `depth > 1`, planar otherwise.
    pub fn for_dims(res: usize, dims: GridDims, seed: u64) -> Self {
        if dims.is_volume() {
            Self::new_3d(res, seed)
        } else {
            Self::new_2d(res, seed)
        }
    }

    fn rng(res: usize, seed: u64) -> StdRng {
        assert!(res >= 1, "resolution must be at least 1");
        StdRng::seed_from_u64(seed ^ 0xCE11_7EC7_0A5D_0002)
    }

    pub fn res(&self) -> usize {
        self.res
    }

    pub fn is_volume(&self) -> bool {
        !self.spatial.is_empty()
    }

    #[inline]
    fn wrap(&self, i: i64) -> usize {
        i.rem_euclid(self.res as i64) as usize
    }
}

impl GradientStrategy for CellVectors {
    fn dot2(&self, corner: [i64; 2], offset: [f64; 2]) -> f64 {
        let (x, y) = (self.wrap(corner[0]), self.wrap(corner[1]));
        let g = if self.is_volume() {
            let g = self.spatial[y * self.res + x];
            [g[0], g[1]]
        } else {
            self.planar[y * self.res + x]
        };
        g[0] * offset[0] + g[1] * offset[1]
    }

    fn dot3(&self, corner: [i64; 3], offset: [f64; 3]) -> f64 {
        let (x, y, z) = (self.wrap(corner[0]), self.wrap(corner[1]), self.wrap(corner[2]));
        if !self.is_volume() {
            let g = self.planar[y * self.res + x];
            return g[0] * offset[0] + g[1] * offset[1];
        }
        let g = self.spatial[(z * self.res + y) * self.res + x];
        g[0] * offset[0] + g[1] * offset[1] + g[2] * offset[2]
    }

    /// Unit gradients peak at `√n / 2` in `n` dimensions.
    fn amplitude(&self, dims: usize) -> f64 {
        (dims as f64).sqrt() * 0.5
    }
}

// ── Sampler ──────────────────────────────────────────────────────────────────

/// Quintic fade `t³(t(6t − 15) + 10)`.
#[inline]
pub fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

/// Gradient noise in `[0, 1]`, periodic with `repeat` lattice units when set.
#[derive(Debug, Clone)]
pub struct GradientNoise<S = PermutationTable> {
    strategy: S,
    repeat: Option<u32>,
}

impl GradientNoise<PermutationTable> {
    /// Reference permutation, no wrap.
    pub fn classic() -> Self {
        Self::new(PermutationTable::reference(), None)
    }
}

impl<S: GradientStrategy> GradientNoise<S> {
    /// # Panics
    /// If `repeat == Some(0)`.
    pub fn new(strategy: S, repeat: Option<u32>) -> Self {
        assert!(repeat != Some(0), "repeat period must be at least 1");
        Self { strategy, repeat }
    }

    pub fn repeat(&self) -> Option<u32> {
        self.repeat
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    #[inline]
    fn wrap(&self, i: i64) -> i64 {
        match self.repeat {
            Some(r) => i.rem_euclid(r as i64),
            None => i,
        }
    }

    /// Lattice cell and in-cell offset for one coordinate.
    #[inline]
    fn split(&self, v: f64) -> (i64, i64, f64) {
        let floor = v.floor();
        let i = floor as i64;
        (self.wrap(i), self.wrap(i + 1), v - floor)
    }

    #[inline]
    fn to_unit(&self, blended: f64, dims: usize) -> f64 {
        let v = blended / self.strategy.amplitude(dims);
        ((v + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Single-octave sample at `pos`, in `[0, 1]`.
    pub fn sample2(&self, pos: [f64; 2]) -> f64 {
        let (x0, x1, xf) = self.split(pos[0]);
        let (y0, y1, yf) = self.split(pos[1]);
        let (u, v) = (fade(xf), fade(yf));
        let s = &self.strategy;

        let a = lerp(s.dot2([x0, y0], [xf, yf]), s.dot2([x1, y0], [xf - 1.0, yf]), u);
        let b = lerp(
            s.dot2([x0, y1], [xf, yf - 1.0]),
            s.dot2([x1, y1], [xf - 1.0, yf - 1.0]),
            u,
        );
        self.to_unit(lerp(a, b, v), 2)
    }

    /// Single-octave sample at `pos`, in `[0, 1]`.
    pub fn sample3(&self, pos: [f64; 3]) -> f64 {
        let (x0, x1, xf) = self.split(pos[0]);
        let (y0, y1, yf) = self.split(pos[1]);
        let (z0, z1, zf) = self.split(pos[2]);
        let (u, v, w) = (fade(xf), fade(yf), fade(zf));
        let s = &self.strategy;
        let (xg, yg, zg) = (xf - 1.0, yf - 1.0, zf - 1.0);

        let near = lerp(
            lerp(s.dot3([x0, y0, z0], [xf, yf, zf]), s.dot3([x1, y0, z0], [xg, yf, zf]), u),
            lerp(s.dot3([x0, y1, z0], [xf, yg, zf]), s.dot3([x1, y1, z0], [xg, yg, zf]), u),
            v,
        );
        let far = lerp(
            lerp(s.dot3([x0, y0, z1], [xf, yf, zg]), s.dot3([x1, y0, z1], [xg, yf, zg]), u),
            lerp(s.dot3([x0, y1, z1], [xf, yg, zg]), s.dot3([x1, y1, z1], [xg, yg, zg]), u),
            v,
        );
        self.to_unit(lerp(near, far, w), 3)
    }

    /// Fractal sum of `octaves` samples, normalized by the amplitude total.
    pub fn octave2(&self, pos: [f64; 2], octaves: u32, persistence: f64) -> f64 {
        fbm::accumulate(octaves, persistence, |f| self.sample2([pos[0] * f, pos[1] * f]))
    }

    pub fn octave3(&self, pos: [f64; 3], octaves: u32, persistence: f64) -> f64 {
        fbm::accumulate(octaves, persistence, |f| {
            self.sample3([pos[0] * f, pos[1] * f, pos[2] * f])
        })
    }
}

impl<S: GradientStrategy> NoiseFn<f64, 2> for GradientNoise<S> {
    fn get(&self, point: [f64; 2]) -> f64 {
        self.sample2(point)
    }
}

impl<S: GradientStrategy> NoiseFn<f64, 3> for GradientNoise<S> {
    fn get(&self, point: [f64; 3]) -> f64 {
        self.sample3(point)
    }
}

/// Tileable fbm gradient noise over a grid.
///
/// The grid spans `res` lattice cells per axis and the noise repeats every
/// `res` cells, so every octave wraps seamlessly across the texture edge.
pub fn perlin_field<S: GradientStrategy>(
    strategy: S,
    dims: GridDims,
    res: usize,
    octaves: u32,
    persistence: f64,
) -> ScalarField {
    dims.assert_valid();
    assert!(res >= 1, "resolution must be at least 1");
    debug!(
        "perlin field {}x{}x{} res={res} octaves={octaves} persistence={persistence}",
        dims.width, dims.height, dims.depth
    );
    let noise = GradientNoise::new(strategy, Some(res as u32));
    let fbm = fbm::Fbm::new(noise, octaves, persistence);
    ScalarField::sample_grid(dims, res, &fbm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_points() -> Vec<[f64; 3]> {
        (0..40)
            .map(|i| {
                let t = i as f64;
                [t * 0.173 + 0.01, t * 0.291 + 0.37, t * 0.057 + 0.73]
            })
            .collect()
    }

    #[test]
    fn fade_endpoints_and_midpoint() {
        assert_eq!(fade(0.0), 0.0);
        assert_eq!(fade(1.0), 1.0);
        assert!((fade(0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn permutation_tiles_along_every_axis() {
        let noise = GradientNoise::new(PermutationTable::reference(), Some(4));
        for p in probe_points() {
            let base = noise.sample3(p);
            for axis in 0..3 {
                let mut q = p;
                q[axis] += 4.0;
                let shifted = noise.sample3(q);
                assert!(
                    (base - shifted).abs() < 1e-9,
                    "axis {axis}: {base} vs {shifted} at {p:?}"
                );
            }
            let planar = noise.sample2([p[0], p[1]]);
            assert!((planar - noise.sample2([p[0] + 4.0, p[1]])).abs() < 1e-9);
            assert!((planar - noise.sample2([p[0], p[1] - 8.0])).abs() < 1e-9);
        }
    }

    #[test]
    fn cell_vectors_tile_along_every_axis() {
        let noise = GradientNoise::new(CellVectors::new_3d(3, 11), Some(3));
        for p in probe_points() {
            let base = noise.sample3(p);
            for axis in 0..3 {
                let mut q = p;
                q[axis] += 3.0;
                assert!((base - noise.sample3(q)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn samples_stay_in_unit_range() {
        let classic = GradientNoise::classic();
        let volume = GradientNoise::new(CellVectors::new_3d(5, 3), None);
        let planar = GradientNoise::new(CellVectors::new_2d(5, 3), None);
        for p in probe_points() {
            for v in [
                classic.sample3(p),
                classic.sample2([p[0], p[2]]),
                volume.sample3(p),
                volume.sample2([p[1], p[2]]),
                planar.sample2([p[1], p[2]]),
                planar.sample3(p),
            ] {
                assert!((0.0..=1.0).contains(&v), "sample {v} out of range at {p:?}");
            }
        }
    }

    #[test]
    fn planar_vectors_skip_the_volume_table() {
        let planar = CellVectors::for_dims(512, GridDims::new_2d(1024, 1024), 8);
        assert!(!planar.is_volume());
        assert_eq!(planar.planar.len(), 512 * 512);
        assert!(planar.spatial.is_empty());

        let volume = CellVectors::for_dims(6, GridDims::new_3d(12, 12, 12), 8);
        assert!(volume.is_volume());
        assert_eq!(volume.spatial.len(), 6 * 6 * 6);
        assert!(volume.planar.is_empty());
    }

    #[test]
    fn planar_vectors_tile_in_both_forms() {
        let noise = GradientNoise::new(CellVectors::new_2d(3, 4), Some(3));
        for p in probe_points() {
            let flat = noise.sample2([p[0], p[1]]);
            assert!((flat - noise.sample2([p[0] + 3.0, p[1] - 3.0])).abs() < 1e-9);
            let lifted = noise.sample3(p);
            assert!((lifted - noise.sample3([p[0], p[1], p[2] + 3.0])).abs() < 1e-9);
        }
    }

    #[test]
    fn lattice_points_sit_at_midpoint() {
        // Every corner offset is zero at an integer point, so the blend is 0.
        let noise = GradientNoise::new(CellVectors::new_3d(4, 9), None);
        assert_eq!(noise.sample3([2.0, 1.0, 3.0]), 0.5);
        assert_eq!(GradientNoise::classic().sample2([5.0, 7.0]), 0.5);
    }

    #[test]
    fn seeded_table_is_a_permutation_and_reproducible() {
        let a = PermutationTable::seeded(42);
        let b = PermutationTable::seeded(42);
        assert_eq!(a.perm[..], b.perm[..]);
        let mut seen = [false; 256];
        for &v in &a.perm[..256] {
            seen[v as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(a.perm[..256], a.perm[256..]);
    }

    #[test]
    fn octave_three_levels_without_repeat() {
        let noise = GradientNoise::classic();
        let v = noise.octave2([0.0, 0.0], 3, 0.5);
        assert!((0.0..=1.0).contains(&v));
        assert!((fbm::amplitude_sum(3, 0.5) - 1.75).abs() < 1e-12);

        let p = [0.3, 0.6];
        let manual = (noise.sample2(p)
            + 0.5 * noise.sample2([0.6, 1.2])
            + 0.25 * noise.sample2([1.2, 2.4]))
            / 1.75;
        assert!((noise.octave2(p, 3, 0.5) - manual).abs() < 1e-12);
    }

    #[test]
    fn single_octave_equals_raw_sample() {
        let noise = GradientNoise::new(CellVectors::new_3d(4, 1), Some(4));
        for p in probe_points() {
            assert_eq!(noise.octave3(p, 1, 0.5), noise.sample3(p));
        }
    }

    #[test]
    fn perlin_field_continues_across_edges() {
        use crate::field::unit_to_byte;

        let dims = GridDims::new_2d(32, 32);
        let field = perlin_field(PermutationTable::seeded(5), dims, 4, 3, 0.5);
        let fbm = fbm::Fbm::new(GradientNoise::new(PermutationTable::seeded(5), Some(4)), 3, 0.5);
        for y in 0..32 {
            let py = (y as f64 + 0.5) / 8.0;
            // One cell past the right edge is column 0, one before the left is column 31.
            assert_eq!(unit_to_byte(fbm.get([4.0625, py])), field.get_2d(0, y));
            assert_eq!(unit_to_byte(fbm.get([-0.0625, py])), field.get_2d(31, y));
        }
    }

    #[test]
    #[should_panic(expected = "repeat period")]
    fn zero_repeat_panics() {
        GradientNoise::new(PermutationTable::reference(), Some(0));
    }
}
