//! Smoothing kernels and the two edge policies used when applying them.
//!
//! - [`apply_blur`] gathers: taps past the edge read the centre cell instead
//!   (clamp-to-self), so a flat field stays flat and edges keep their height.
//! - [`add_blurred_value`] scatters: taps past the edge are dropped.
//!
//! The erosion models rely on each policy separately; they are not
//! interchangeable.

use crate::heightmap::HeightField;

/// Square `(2r+1)^2` weight table addressed by offset from its centre.
#[derive(Clone, Debug, PartialEq)]
pub struct Kernel {
    radius: usize,
    weights: Vec<f32>,
}

impl Kernel {
    /// Build a kernel from raw weights and rescale them to sum to 1.
    ///
    /// A kernel whose raw weights sum to zero collapses to a unit impulse
    /// at its centre.
    pub fn normalized(radius: usize, weight: impl Fn(isize, isize) -> f32) -> Self {
        let r = radius as isize;
        let mut weights = Vec::with_capacity((2 * radius + 1) * (2 * radius + 1));
        for dy in -r..=r {
            for dx in -r..=r {
                weights.push(weight(dx, dy));
            }
        }

        let total: f32 = weights.iter().sum();
        if total > 0.0 {
            for w in weights.iter_mut() {
                *w /= total;
            }
        } else {
            weights.fill(0.0);
            let center = weights.len() / 2;
            weights[center] = 1.0;
        }

        Self { radius, weights }
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Side length, always odd.
    pub fn size(&self) -> usize {
        2 * self.radius + 1
    }

    /// Weight at offset `(dx, dy)`; zero outside the kernel.
    pub fn weight(&self, dx: isize, dy: isize) -> f32 {
        let r = self.radius as isize;
        if dx.abs() > r || dy.abs() > r {
            return 0.0;
        }
        self.weights[((dy + r) as usize) * self.size() + (dx + r) as usize]
    }

    pub fn sum(&self) -> f32 {
        self.weights.iter().sum()
    }

    /// Kernel taps centred on `(cx, cy)` that land inside a `width x height`
    /// grid, as `(x, y, weight)`. Taps past the edge are skipped.
    pub fn taps(
        &self,
        cx: isize,
        cy: isize,
        width: usize,
        height: usize,
    ) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        let r = self.radius as isize;
        let size = self.size();
        self.weights.iter().enumerate().filter_map(move |(i, &w)| {
            let x = cx + (i % size) as isize - r;
            let y = cy + (i / size) as isize - r;
            if x < 0 || y < 0 || x as usize >= width || y as usize >= height {
                None
            } else {
                Some((x as usize, y as usize, w))
            }
        })
    }
}

/// Gaussian kernel with `sigma = max(radius / 2, 1)`, normalized to sum 1.
pub fn build_gaussian_kernel(radius: u32) -> Kernel {
    let sigma = (radius as f32 / 2.0).max(1.0);
    let two_sigma_sq = 2.0 * sigma * sigma;
    Kernel::normalized(radius as usize, |dx, dy| {
        let dist_sq = (dx * dx + dy * dy) as f32;
        (-dist_sq / two_sigma_sq).exp() / (std::f32::consts::PI * two_sigma_sq)
    })
}

/// Gaussian blur with the clamp-to-self edge policy. Returns a new field.
pub fn apply_blur(field: &HeightField, radius: u32) -> HeightField {
    convolve_clamped(field, &build_gaussian_kernel(radius))
}

/// Convolve `field` with `kernel`. A tap whose column (or row) falls outside
/// the grid reads the centre cell's column (or row) instead.
pub fn convolve_clamped(field: &HeightField, kernel: &Kernel) -> HeightField {
    let width = field.width;
    let height = field.height;
    let r = kernel.radius() as isize;
    let mut result = HeightField::new_with(width, height, 0.0);

    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            for ky in -r..=r {
                let sy = y as isize + ky;
                let sy = if sy < 0 || sy >= height as isize { y } else { sy as usize };
                for kx in -r..=r {
                    let sx = x as isize + kx;
                    let sx = if sx < 0 || sx >= width as isize { x } else { sx as usize };
                    sum += *field.get(sx, sy) * kernel.weight(kx, ky);
                }
            }
            result.set(x, y, sum);
        }
    }

    result
}

/// Scatter `amount * weight` into the cells around `(x, y)`.
/// Taps that fall outside the grid are dropped, not redirected.
pub fn add_blurred_value(map: &mut HeightField, kernel: &Kernel, amount: f32, x: isize, y: isize) {
    let (width, height) = (map.width, map.height);
    for (tx, ty, w) in kernel.taps(x, y, width, height) {
        *map.get_mut(tx, ty) += amount * w;
    }
}
