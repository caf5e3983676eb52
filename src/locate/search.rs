use crate::locate::cluster::ClusterIndex;
use crate::robot::Robot;
use crate::utils::depth_image::DepthImage;
use crate::utils::transform::CoordinateTransformer;
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Read-only view of one cluster cycle.
///
/// The view borrows the locator, so the foreground images and the index maps it reads cannot
/// be rebuilt while any region search is running.
///
#[derive(Debug, Clone, Copy)]
pub struct Clusters<'a> {
    pub(crate) index: &'a ClusterIndex,
    pub(crate) diff: &'a DepthImage,
    pub(crate) transformer: &'a CoordinateTransformer,
}

impl<'a> Clusters<'a> {
    pub fn len(&self) -> usize {
        self.index.clusters().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.clusters().is_empty()
    }

    pub fn index(&self) -> &'a ClusterIndex {
        self.index
    }

    /// World-frame centroid of a cluster
    ///
    pub fn centroid(&self, cluster: usize) -> Option<Point3<f32>> {
        self.index
            .clusters()
            .get(cluster)
            .and_then(|members| self.world_centroid(members))
    }

    fn world_centroid(&self, members: &[usize]) -> Option<Point3<f32>> {
        if members.is_empty() {
            return None;
        }
        let points = self.index.points();
        let sum = members
            .iter()
            .fold(Vector3::zeros(), |acc, i| acc + points[*i].coords);
        let centroid = Point3::from(sum / members.len() as f32);
        Some(self.transformer.sensor_to_world(&centroid))
    }

    /// Sets the world location of the robot from the dominant cluster inside its box.
    ///
    /// Foreground pixels that don't belong to any cluster compete as one group. When the box
    /// holds no foreground pixel the location stays unset.
    ///
    pub fn locate(&self, robot: &mut Robot) {
        let bbox = match robot.bbox() {
            Some(b) => *b,
            None => return,
        };
        let window = bbox.zoom(
            self.transformer.zoom_factor(),
            self.diff.width(),
            self.diff.height(),
        );

        let mut groups: BTreeMap<Option<usize>, Vec<usize>> = BTreeMap::new();
        for (u, v) in window.pixels() {
            if self.diff.get(u, v) == 0.0 {
                continue;
            }
            if let Some(index) = self.index.index_of(u, v) {
                groups
                    .entry(self.index.cluster_of(index))
                    .or_default()
                    .push(index);
            }
        }

        let mut dominant: Option<&Vec<usize>> = None;
        for members in groups.values() {
            if dominant.map_or(true, |d| members.len() > d.len()) {
                dominant = Some(members);
            }
        }

        match dominant.and_then(|members| self.world_centroid(members)) {
            Some(location) => robot.set_location(location),
            None => log::debug!("No foreground points inside {:?}", window),
        }
    }

    /// Locates every robot; the searches run in parallel
    ///
    pub fn search(&self, robots: &mut [Robot]) {
        robots.par_iter_mut().for_each(|r| self.locate(r));
    }
}
