/// A dense row-major 2D grid. The size is fixed at allocation.
#[derive(Clone, Debug, PartialEq)]
pub struct Tilemap<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

/// Height values, one per grid cell.
pub type HeightMap = Tilemap<f32>;

/// Biome ids, one per grid cell (or one per chunk).
pub type BiomeMap = Tilemap<i32>;

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

    /// Wrap an existing row-major buffer. Returns `None` if the length does not
    /// match `width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Option<Self> {
        if data.len() != width * height {
            return None;
        }
        Some(Self { width, height, data })
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y * self.width + x
    }

    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Panics when `(x, y)` is outside the grid.
    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    pub fn try_get(&self, x: usize, y: usize) -> Option<&T> {
        if self.in_bounds(x, y) {
            Some(&self.data[y * self.width + x])
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        let idx = self.index(x, y);
        &mut self.data[idx]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// Fill the entire map with a value.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
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

impl Tilemap<f32> {
    /// Minimum and maximum value, or `None` for an empty map.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        if self.data.is_empty() {
            return None;
        }
        let mut min_h = f32::MAX;
        let mut max_h = f32::MIN;
        for &h in &self.data {
            if h < min_h { min_h = h; }
            if h > max_h { max_h = h; }
        }
        Some((min_h, max_h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_layout() {
        let mut map = Tilemap::new_with(3, 2, 0i32);
        map.set(2, 1, 7);
        assert_eq!(map.as_slice()[5], 7);
        assert_eq!(*map.get(2, 1), 7);
    }

    #[test]
    fn test_try_get_out_of_bounds() {
        let map: Tilemap<f32> = Tilemap::new(4, 4);
        assert!(map.try_get(3, 3).is_some());
        assert!(map.try_get(4, 0).is_none());
        assert!(map.try_get(0, 4).is_none());
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        assert!(Tilemap::from_vec(2, 2, vec![0.0f32; 3]).is_none());
        let map = Tilemap::from_vec(2, 2, vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(*map.get(1, 1), 4.0);
        assert_eq!(map.into_vec(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_min_max() {
        let map = Tilemap::from_vec(2, 2, vec![-1.5f32, 2.0, 0.0, 4.5]).unwrap();
        assert_eq!(map.min_max(), Some((-1.5, 4.5)));
        let empty: Tilemap<f32> = Tilemap::new(0, 0);
        assert_eq!(empty.min_max(), None);
    }
}
