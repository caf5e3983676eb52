use crate::utils::depth_image::DepthImage;
use crate::utils::transform::CoordinateTransformer;
use itertools::iproduct;
use nalgebra::Point3;
use std::collections::{HashMap, VecDeque};

type Cell = (i64, i64, i64);

fn cell_of(p: &Point3<f32>, cell_size: f32) -> Cell {
    (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    )
}

/// Euclidean cluster extraction.
///
/// Two points belong to the same cluster when they are connected by a chain of points whose
/// consecutive distances are at most `tolerance`. Groups with a size outside
/// `[min_size, max_size]` are dropped. Neighbours are looked up in a uniform hash grid with the
/// cell size equal to `tolerance`, so only the 27 cells around a point are visited.
///
/// Clusters hold ascending point indices and are ordered by size, largest first; clusters of the
/// same size keep the order of their lowest index.
///
pub fn euclidean_clusters(
    points: &[Point3<f32>],
    tolerance: f32,
    min_size: usize,
    max_size: usize,
) -> Vec<Vec<usize>> {
    let mut grid: HashMap<Cell, Vec<usize>> = HashMap::new();
    for (i, p) in points.iter().enumerate() {
        grid.entry(cell_of(p, tolerance)).or_default().push(i);
    }

    let sq_tolerance = tolerance * tolerance;
    let mut visited = vec![false; points.len()];
    let mut clusters = Vec::new();
    let mut queue = VecDeque::new();

    for seed in 0..points.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        queue.push_back(seed);
        let mut members = Vec::new();

        while let Some(current) = queue.pop_front() {
            members.push(current);
            let p = &points[current];
            let (cx, cy, cz) = cell_of(p, tolerance);
            for (dx, dy, dz) in iproduct!(-1..=1, -1..=1, -1..=1) {
                let neighbours = match grid.get(&(cx + dx, cy + dy, cz + dz)) {
                    Some(n) => n,
                    None => continue,
                };
                for &n in neighbours {
                    if !visited[n] && (points[n] - p).norm_squared() <= sq_tolerance {
                        visited[n] = true;
                        queue.push_back(n);
                    }
                }
            }
        }

        if members.len() >= min_size && members.len() <= max_size {
            members.sort_unstable();
            clusters.push(members);
        }
    }

    clusters.sort_by(|a, b| b.len().cmp(&a.len()));
    clusters
}

/// Foreground cloud and the index maps between pixels, points and clusters.
///
/// Rebuilt from the diff image once per cluster cycle; the allocations are reused.
///
#[derive(Debug, Default)]
pub struct ClusterIndex {
    points: Vec<Point3<f32>>,
    pixel_to_index: HashMap<(usize, usize), usize>,
    clusters: Vec<Vec<usize>>,
    index_to_cluster: HashMap<usize, usize>,
}

impl ClusterIndex {
    pub(crate) fn rebuild(
        &mut self,
        diff: &DepthImage,
        transformer: &CoordinateTransformer,
        tolerance: f32,
        (min_size, max_size): (usize, usize),
    ) {
        self.points.clear();
        self.pixel_to_index.clear();
        self.index_to_cluster.clear();

        for (u, v, depth) in diff.nonzero() {
            let pixel_center = Point3::new(u as f32 + 0.5, v as f32 + 0.5, depth);
            self.pixel_to_index.insert((u, v), self.points.len());
            self.points.push(transformer.image_to_sensor(&pixel_center));
        }

        self.clusters = euclidean_clusters(&self.points, tolerance, min_size, max_size);
        for (cluster_id, cluster) in self.clusters.iter().enumerate() {
            for index in cluster {
                self.index_to_cluster.insert(*index, cluster_id);
            }
        }
        log::debug!(
            "Foreground cloud of {} points grouped into {} clusters",
            self.points.len(),
            self.clusters.len()
        );
    }

    /// Foreground points in the sensor frame
    ///
    pub fn points(&self) -> &[Point3<f32>] {
        &self.points
    }

    pub fn clusters(&self) -> &[Vec<usize>] {
        &self.clusters
    }

    pub fn index_of(&self, u: usize, v: usize) -> Option<usize> {
        self.pixel_to_index.get(&(u, v)).copied()
    }

    pub fn cluster_of(&self, index: usize) -> Option<usize> {
        self.index_to_cluster.get(&index).copied()
    }
}
