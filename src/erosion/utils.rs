//! Utility functions for erosion calculations
//!
//! Provides gradient sampling, cell lookup for continuous positions, and the
//! erosion mask used by the capacity model.

use crate::convolution::Kernel;
use crate::heightmap::HeightField;

/// Cell containing a continuous position. Callers guarantee the position is
/// non-negative.
#[inline]
pub fn cell_of(x: f32, y: f32) -> (usize, usize) {
    (x.floor() as usize, y.floor() as usize)
}

/// Whether a continuous position lies inside `[0, width) x [0, height)`.
#[inline]
pub fn is_inside(field: &HeightField, x: f32, y: f32) -> bool {
    x >= 0.0 && y >= 0.0 && x < field.width as f32 && y < field.height as f32
}

/// Height gradient at a continuous position, interpolated bilinearly from
/// the four surrounding corners. On the last row or column the missing
/// corner is replaced by the cell itself.
/// Returns (grad_x, grad_y) pointing in the direction of steepest ascent.
pub fn gradient_at(field: &HeightField, x: f32, y: f32) -> (f32, f32) {
    let (x0, y0) = cell_of(x, y);
    let u = x - x0 as f32;
    let v = y - y0 as f32;

    let x1 = if x0 + 1 >= field.width { x0 } else { x0 + 1 };
    let y1 = if y0 + 1 >= field.height { y0 } else { y0 + 1 };

    let h00 = *field.get(x0, y0);
    let h10 = *field.get(x1, y0);
    let h01 = *field.get(x0, y1);
    let h11 = *field.get(x1, y1);

    // dh/dx along the top and bottom edges, blended by v
    let grad_x = (h10 - h00) * (1.0 - v) + (h11 - h01) * v;
    // dh/dy along the left and right edges, blended by u
    let grad_y = (h01 - h00) * (1.0 - u) + (h11 - h10) * u;

    (grad_x, grad_y)
}

/// Height of the cell under a continuous position, including changes not
/// yet flushed into the field.
#[inline]
pub fn height_with_pending(field: &HeightField, pending: &HeightField, x: f32, y: f32) -> f32 {
    let (cx, cy) = cell_of(x, y);
    *field.get(cx, cy) + *pending.get(cx, cy)
}

/// Erosion mask of radius `r`: weight at offset `(dx, dy)` is
/// `(r - |dx|)^2 + (r - |dy|)^2`, normalized to sum 1.
///
/// Offsets that cannot fit in a `width x height` grid (|dx| >= width or
/// |dy| >= height) are left out before normalizing.
pub fn create_erosion_mask(radius: u32, width: usize, height: usize) -> Kernel {
    let r = radius as isize;
    Kernel::normalized(radius as usize, |dx, dy| {
        if dx.unsigned_abs() >= width || dy.unsigned_abs() >= height {
            return 0.0;
        }
        let dist_x = (r - dx.abs()) as f32;
        let dist_y = (r - dy.abs()) as f32;
        dist_x * dist_x + dist_y * dist_y
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_flat() {
        let field = HeightField::new_with(4, 4, 5.0);
        let (gx, gy) = gradient_at(&field, 1.5, 1.5);
        assert!(gx.abs() < 0.001);
        assert!(gy.abs() < 0.001);
    }

    #[test]
    fn test_gradient_points_uphill() {
        let mut field = HeightField::new_with(4, 4, 0.0);
        for (x, _, h) in field.iter_mut() {
            *h = x as f32;
        }
        let (gx, gy) = gradient_at(&field, 1.25, 2.5);
        assert!((gx - 1.0).abs() < 1e-6);
        assert!(gy.abs() < 1e-6);
    }

    #[test]
    fn test_gradient_at_last_column_uses_cell_itself() {
        let mut field = HeightField::new_with(3, 3, 0.0);
        for (x, _, h) in field.iter_mut() {
            *h = x as f32 * 2.0;
        }
        let (gx, _) = gradient_at(&field, 2.5, 1.0);
        assert_eq!(gx, 0.0);
    }

    #[test]
    fn test_height_with_pending() {
        let field = HeightField::new_with(3, 3, 1.0);
        let mut pending = HeightField::new_with(3, 3, 0.0);
        pending.set(1, 2, 0.25);
        assert_eq!(height_with_pending(&field, &pending, 1.9, 2.1), 1.25);
        assert_eq!(height_with_pending(&field, &pending, 0.5, 0.5), 1.0);
    }

    #[test]
    fn test_erosion_mask_normalized() {
        for radius in [1u32, 2, 3] {
            let mask = create_erosion_mask(radius, 64, 64);
            assert!((mask.sum() - 1.0).abs() < 1e-5);
            // Symmetric and heaviest at the centre
            assert_eq!(mask.weight(1, 0), mask.weight(-1, 0));
            assert_eq!(mask.weight(0, 1), mask.weight(0, -1));
            assert!(mask.weight(0, 0) > mask.weight(1, 1));
        }
    }

    #[test]
    fn test_erosion_mask_radius_one_weights() {
        // Raw weights: centre 2, edges 1, corners 0 -> total 6
        let mask = create_erosion_mask(1, 16, 16);
        assert!((mask.weight(0, 0) - 2.0 / 6.0).abs() < 1e-6);
        assert!((mask.weight(1, 0) - 1.0 / 6.0).abs() < 1e-6);
        assert_eq!(mask.weight(1, 1), 0.0);
    }

    #[test]
    fn test_erosion_mask_radius_zero_is_impulse() {
        let mask = create_erosion_mask(0, 8, 8);
        assert_eq!(mask.weight(0, 0), 1.0);
    }

    #[test]
    fn test_erosion_mask_clips_to_grid_axes() {
        // A single-row grid cannot hold vertical offsets, so only the
        // horizontal arm remains: centre 2, left/right 1 each.
        let mask = create_erosion_mask(1, 8, 1);
        assert_eq!(mask.weight(0, 1), 0.0);
        assert!((mask.weight(0, 0) - 0.5).abs() < 1e-6);
        assert!((mask.weight(-1, 0) - 0.25).abs() < 1e-6);
    }
}
