use serde::{Deserialize, Serialize};

use crate::error::{ErosionError, Result};

/// A bounded 2D grid stored row-major (`y * width + x`).
///
/// Indexing with [`Tilemap::get`] / [`Tilemap::set`] panics on coordinates
/// outside `[0, width) x [0, height)`; the `try_` variants report
/// [`ErosionError::OutOfBounds`] instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TilemapRepr<T>", bound(deserialize = "T: Deserialize<'de>"))]
pub struct Tilemap<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

#[derive(Deserialize)]
struct TilemapRepr<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T> TryFrom<TilemapRepr<T>> for Tilemap<T> {
    type Error = String;

    fn try_from(repr: TilemapRepr<T>) -> std::result::Result<Self, Self::Error> {
        if repr.data.len() != repr.width * repr.height {
            return Err(format!(
                "expected {} cells for a {}x{} grid, found {}",
                repr.width * repr.height,
                repr.width,
                repr.height,
                repr.data.len()
            ));
        }
        Ok(Self {
            width: repr.width,
            height: repr.height,
            data: repr.data,
        })
    }
}

impl<T: Clone + Default> Tilemap<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }
}

impl<T: Clone> Tilemap<T> {
    pub fn new_with(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Fill the entire map with a value.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T> Tilemap<T> {
    /// Wrap existing row-major data. Fails if the length does not match.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != width * height {
            return Err(ErosionError::InvalidSettings(format!(
                "expected {} cells for a {}x{} grid, found {}",
                width * height,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    /// Build a map from nested rows (`rows[y][x]`). All rows must share a length.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let data: Vec<T> = rows.into_iter().flatten().collect();
        Self::from_vec(width, height, data)
    }

    #[inline]
    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        assert!(
            self.in_bounds(x, y),
            "cell ({x}, {y}) is outside a {}x{} grid",
            self.width,
            self.height
        );
        y * self.width + x
    }

    fn checked_index(&self, x: usize, y: usize) -> Result<usize> {
        if self.in_bounds(x, y) {
            Ok(y * self.width + x)
        } else {
            Err(ErosionError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            })
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        let idx = self.index(x, y);
        &mut self.data[idx]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    pub fn try_get(&self, x: usize, y: usize) -> Result<&T> {
        let idx = self.checked_index(x, y)?;
        Ok(&self.data[idx])
    }

    pub fn try_set(&mut self, x: usize, y: usize, value: T) -> Result<()> {
        let idx = self.checked_index(x, y)?;
        self.data[idx] = value;
        Ok(())
    }

    /// 4-connected neighbours in east, south, west, north order.
    /// Cells beyond the edge are omitted.
    pub fn neighbors(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let mut result = Vec::with_capacity(4);

        if x + 1 < self.width {
            result.push((x + 1, y));
        }
        if y + 1 < self.height {
            result.push((x, y + 1));
        }
        if x > 0 {
            result.push((x - 1, y));
        }
        if y > 0 {
            result.push((x, y - 1));
        }

        result
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width;
        self.data.iter().enumerate().map(move |(idx, val)| {
            let x = idx % width;
            let y = idx / width;
            (x, y, val)
        })
    }

    /// Iterate mutably over all cells with their coordinates.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, usize, &mut T)> {
        let width = self.width;
        self.data.iter_mut().enumerate().map(move |(idx, val)| {
            let x = idx % width;
            let y = idx / width;
            (x, y, val)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_layout() {
        let mut map = Tilemap::new_with(3, 2, 0u8);
        map.set(2, 1, 7);
        assert_eq!(map.as_slice()[5], 7);
        assert_eq!(*map.get(2, 1), 7);
    }

    #[test]
    fn test_try_get_out_of_bounds() {
        let map = Tilemap::new_with(4, 2, 0.0f32);
        assert!(map.try_get(3, 1).is_ok());
        match map.try_get(4, 0) {
            Err(ErosionError::OutOfBounds { x, y, width, height }) => {
                assert_eq!((x, y, width, height), (4, 0, 4, 2));
            }
            other => panic!("expected OutOfBounds, got {:?}", other),
        }
        // y beyond height must not alias into a later row
        assert!(map.try_get(0, 2).is_err());
    }

    #[test]
    fn test_try_set_out_of_bounds_leaves_map_untouched() {
        let mut map = Tilemap::new_with(2, 2, 1.0f32);
        assert!(map.try_set(2, 0, 5.0).is_err());
        assert!(map.as_slice().iter().all(|&v| v == 1.0));
        map.try_set(1, 1, 5.0).unwrap();
        assert_eq!(*map.get(1, 1), 5.0);
    }

    #[test]
    #[should_panic(expected = "outside a 2x2 grid")]
    fn test_get_panics_out_of_bounds() {
        let map = Tilemap::new_with(2, 2, 0.0f32);
        map.get(2, 0);
    }

    #[test]
    fn test_neighbors_order_and_edges() {
        let map = Tilemap::new_with(3, 3, 0.0f32);
        assert_eq!(map.neighbors(1, 1), vec![(2, 1), (1, 2), (0, 1), (1, 0)]);
        assert_eq!(map.neighbors(0, 0), vec![(1, 0), (0, 1)]);
        assert_eq!(map.neighbors(2, 2), vec![(1, 2), (2, 1)]);
    }

    #[test]
    fn test_from_rows() {
        let map = Tilemap::from_rows(vec![vec![1.0f32, 0.0], vec![0.0, 0.0]]).unwrap();
        assert_eq!((map.width, map.height), (2, 2));
        assert_eq!(*map.get(0, 0), 1.0);
        assert!(Tilemap::from_rows(vec![vec![1.0f32, 0.0], vec![0.0]]).is_err());
    }

    #[test]
    fn test_json_rejects_mismatched_length() {
        let ok: Tilemap<f32> =
            serde_json::from_str(r#"{"width":2,"height":1,"data":[0.5,1.0]}"#).unwrap();
        assert_eq!(*ok.get(1, 0), 1.0);
        let bad = serde_json::from_str::<Tilemap<f32>>(r#"{"width":2,"height":2,"data":[0.5]}"#);
        assert!(bad.is_err());
    }
}
