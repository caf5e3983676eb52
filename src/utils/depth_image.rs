use std::sync::atomic::{AtomicU32, Ordering};

/// Dense depth buffer in the zoomed image resolution. Zero means "no data".
///
/// Buffers are allocated once and rewritten in place every frame.
///
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl DepthImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, u: usize, v: usize) -> f32 {
        self.data[v * self.width + u]
    }

    pub fn set(&mut self, u: usize, v: usize, depth: f32) {
        self.data[v * self.width + u] = depth;
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Iterates `(u, v, depth)` for every pixel that carries data
    ///
    pub fn nonzero(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, d)| **d != 0.0)
            .map(|(i, d)| (i % self.width, i / self.width, *d))
    }

    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|d| **d != 0.0).count()
    }
}

/// Depth buffer that tolerates unsynchronized writes from many threads.
///
/// Cells hold `f32` bit patterns in relaxed atomics. Concurrent writers to one cell do not
/// coordinate: whichever value lands last survives, and [`raise`](Self::raise) may lose a
/// concurrent larger value. Consumers accept any of the competing values.
///
#[derive(Debug)]
pub struct SharedDepthImage {
    width: usize,
    height: usize,
    data: Vec<AtomicU32>,
}

impl SharedDepthImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: (0..width * height).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn load(&self, u: usize, v: usize) -> f32 {
        f32::from_bits(self.data[v * self.width + u].load(Ordering::Relaxed))
    }

    pub fn store(&self, u: usize, v: usize, depth: f32) {
        self.data[v * self.width + u].store(depth.to_bits(), Ordering::Relaxed);
    }

    /// Replaces the cell with `depth` if it is larger than the current value
    ///
    pub fn raise(&self, u: usize, v: usize, depth: f32) {
        let cell = &self.data[v * self.width + u];
        if depth > f32::from_bits(cell.load(Ordering::Relaxed)) {
            cell.store(depth.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn clear(&mut self) {
        for cell in self.data.iter_mut() {
            *cell.get_mut() = 0;
        }
    }

    /// Copies the current contents into a dense buffer of the same size
    ///
    pub fn copy_to(&mut self, target: &mut DepthImage) {
        assert_eq!(
            (self.width, self.height),
            (target.width, target.height),
            "Depth buffers must have the same dimensions"
        );
        for (dst, src) in target.data.iter_mut().zip(self.data.iter_mut()) {
            *dst = f32::from_bits(*src.get_mut());
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::utils::depth_image::{DepthImage, SharedDepthImage};
    use rayon::prelude::*;

    #[test]
    fn dense_access() {
        let mut img = DepthImage::new(4, 3);
        assert_eq!(img.count_nonzero(), 0);
        img.set(3, 2, 7.5);
        img.set(0, 1, 1.0);
        assert_eq!(img.get(3, 2), 7.5);
        let nz: Vec<_> = img.nonzero().collect();
        assert_eq!(nz, vec![(0, 1, 1.0), (3, 2, 7.5)]);
        img.clear();
        assert_eq!(img.count_nonzero(), 0);
    }

    #[test]
    fn shared_raise_keeps_maximum_when_serialized() {
        let mut shared = SharedDepthImage::new(2, 2);
        for d in [3.0, 9.0, 4.0] {
            shared.raise(1, 1, d);
        }
        assert_eq!(shared.load(1, 1), 9.0);
        shared.store(0, 0, 2.0);
        let mut dense = DepthImage::new(2, 2);
        shared.copy_to(&mut dense);
        assert_eq!(dense.get(0, 0), 2.0);
        assert_eq!(dense.get(1, 1), 9.0);
        shared.clear();
        assert_eq!(shared.load(1, 1), 0.0);
    }

    #[test]
    fn shared_parallel_writes_keep_one_of_written_values() {
        let shared = SharedDepthImage::new(8, 8);
        let values: Vec<f32> = (1..=1000).map(|i| i as f32).collect();
        values.par_iter().for_each(|d| {
            let u = (*d as usize) % 8;
            shared.store(u, 0, *d);
            shared.raise(u, 1, *d);
        });
        for u in 0..8 {
            let stored = shared.load(u, 0);
            assert!(values.contains(&stored));
            assert_eq!(stored as usize % 8, u);
            assert!(shared.load(u, 1) > 0.0);
        }
    }
}
