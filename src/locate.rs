use crate::locate::cluster::ClusterIndex;
use crate::locate::options::LocatorOptions;
use crate::locate::search::Clusters;
use crate::utils::depth_image::{DepthImage, SharedDepthImage};
use crate::utils::transform::CoordinateTransformer;
use crate::EPS;
use nalgebra::Point3;
use rayon::prelude::*;
use std::collections::VecDeque;

/// Euclidean clustering and the pixel/point/cluster index maps
pub mod cluster;
/// Locator configuration
pub mod options;
/// Detection box to cluster resolution
pub mod search;

/// Turns range sensor clouds and detection boxes into world positions.
///
/// Every [`update`](Self::update) projects the cloud into the zoomed camera image, raises the
/// background depth model and recomputes the foreground (diff) image from the last
/// `queue_size` frames. [`cluster`](Self::cluster) then groups the foreground and returns a
/// view used to resolve detection boxes.
///
#[derive(Debug)]
pub struct Locator {
    opts: LocatorOptions,
    transformer: CoordinateTransformer,
    width: usize,
    height: usize,
    depth: SharedDepthImage,
    background: SharedDepthImage,
    frames: VecDeque<DepthImage>,
    diff: DepthImage,
    index: ClusterIndex,
}

impl Locator {
    pub(crate) fn new(
        opts: LocatorOptions,
        transformer: CoordinateTransformer,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            frames: VecDeque::with_capacity(opts.get_queue_size()),
            opts,
            transformer,
            width,
            height,
            depth: SharedDepthImage::new(width, height),
            background: SharedDepthImage::new(width, height),
            diff: DepthImage::new(width, height),
            index: ClusterIndex::default(),
        }
    }

    /// Zoomed image size
    ///
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn transformer(&self) -> &CoordinateTransformer {
        &self.transformer
    }

    /// Per-pixel maximum depth seen so far
    ///
    pub fn background(&self) -> &SharedDepthImage {
        &self.background
    }

    /// Foreground depth of the queued frames
    ///
    pub fn diff(&self) -> &DepthImage {
        &self.diff
    }

    /// The number of queued frames
    ///
    pub fn queued(&self) -> usize {
        self.frames.len()
    }

    /// Processes one sensor cloud. An empty cloud leaves the locator untouched.
    ///
    pub fn update(&mut self, cloud: &[Point3<f32>]) {
        if cloud.is_empty() {
            log::warn!("Empty point cloud received, the frame is skipped");
            return;
        }
        self.depth.clear();
        self.project(cloud);
        self.push_frame();
        self.difference();
    }

    fn project(&self, cloud: &[Point3<f32>]) {
        let max_distance = self.opts.get_max_distance();
        let (width, height) = (self.width, self.height);
        let transformer = &self.transformer;
        let depth = &self.depth;
        let background = &self.background;

        let write = |p: &Point3<f32>| {
            let range = p.coords.norm();
            if range < EPS || range > max_distance {
                return;
            }
            let uvd = transformer.sensor_to_image(p);
            if !(uvd.z > 0.0 && uvd.x >= 0.0 && uvd.y >= 0.0) {
                return;
            }
            let (u, v) = (uvd.x as usize, uvd.y as usize);
            if u >= width || v >= height {
                return;
            }
            depth.store(u, v, uvd.z);
            background.raise(u, v, uvd.z);
        };

        if self.opts.is_deterministic() {
            cloud.iter().for_each(write);
        } else {
            cloud.par_iter().for_each(write);
        }
    }

    fn push_frame(&mut self) {
        let evicted = if self.frames.len() >= self.opts.get_queue_size() {
            self.frames.pop_front()
        } else {
            None
        };
        let mut frame = evicted.unwrap_or_else(|| DepthImage::new(self.width, self.height));
        self.depth.copy_to(&mut frame);
        self.frames.push_back(frame);
    }

    fn difference(&mut self) {
        let (min_diff, max_diff) = self.opts.get_depth_diff();
        let background = &self.background;
        let frames = &self.frames;

        self.diff
            .as_mut_slice()
            .par_chunks_mut(self.width)
            .enumerate()
            .for_each(|(v, row)| {
                row.fill(0.0);
                for frame in frames {
                    for (u, cell) in row.iter_mut().enumerate() {
                        let value = frame.get(u, v);
                        if value == 0.0 {
                            continue;
                        }
                        let diff = background.load(u, v) - value;
                        if diff >= min_diff && diff <= max_diff {
                            *cell = value;
                        }
                    }
                }
            });
        log::trace!(
            "Foreground image holds {} pixels",
            self.diff.count_nonzero()
        );
    }

    /// Groups the current foreground into clusters
    ///
    pub fn cluster(&mut self) -> Clusters<'_> {
        self.index.rebuild(
            &self.diff,
            &self.transformer,
            self.opts.get_cluster_tolerance(),
            self.opts.get_cluster_size(),
        );
        Clusters {
            index: &self.index,
            diff: &self.diff,
            transformer: &self.transformer,
        }
    }
}
