use crate::locate::Locator;
use crate::utils::transform::CoordinateTransformer;
use crate::Errors;
use anyhow::Result;
use nalgebra::{Matrix3, Matrix4};

/// Class that is used to configure the point-cloud locator
///
/// Distances are expressed in the units of the sensor cloud (millimeters for the defaults).
///
#[derive(Debug, Clone)]
pub struct LocatorOptions {
    image_width: usize,
    image_height: usize,
    intrinsic: Matrix3<f32>,
    sensor_to_camera: Matrix4<f32>,
    world_to_camera: Matrix4<f32>,
    zoom_factor: f32,
    queue_size: usize,
    min_depth_diff: f32,
    max_depth_diff: f32,
    cluster_tolerance: f32,
    min_cluster_size: usize,
    max_cluster_size: usize,
    max_distance: f32,
    deterministic: bool,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            image_width: 1280,
            image_height: 1024,
            intrinsic: Matrix3::new(1000.0, 0.0, 640.0, 0.0, 1000.0, 512.0, 0.0, 0.0, 1.0),
            sensor_to_camera: Matrix4::identity(),
            world_to_camera: Matrix4::identity(),
            zoom_factor: 0.5,
            queue_size: 3,
            min_depth_diff: 500.0,
            max_depth_diff: 4000.0,
            cluster_tolerance: 200.0,
            min_cluster_size: 10,
            max_cluster_size: 5000,
            max_distance: 29300.0,
            deterministic: false,
        }
    }
}

impl LocatorOptions {
    /// Validates the options and creates the locator
    ///
    pub fn build(self) -> Result<Locator> {
        let transformer = CoordinateTransformer::new(
            self.intrinsic,
            self.sensor_to_camera,
            self.world_to_camera,
            self.zoom_factor,
        )?;
        let (width, height) = self.zoomed_size();
        if width == 0 || height == 0 {
            return Err(Errors::InvalidImageSize(width, height).into());
        }
        if self.queue_size == 0 {
            return Err(Errors::InvalidOption("queue_size", self.queue_size.to_string()).into());
        }
        if !(self.min_depth_diff >= 0.0 && self.min_depth_diff <= self.max_depth_diff) {
            return Err(Errors::InvalidDepthBand(self.min_depth_diff, self.max_depth_diff).into());
        }
        if self.min_cluster_size > self.max_cluster_size {
            return Err(
                Errors::InvalidClusterSize(self.min_cluster_size, self.max_cluster_size).into(),
            );
        }
        if !(self.cluster_tolerance > 0.0) {
            return Err(Errors::InvalidOption(
                "cluster_tolerance",
                self.cluster_tolerance.to_string(),
            )
            .into());
        }
        if !(self.max_distance > 0.0) {
            return Err(
                Errors::InvalidOption("max_distance", self.max_distance.to_string()).into(),
            );
        }
        Ok(Locator::new(self, transformer, width, height))
    }

    /// Working image size after zooming
    ///
    pub fn zoomed_size(&self) -> (usize, usize) {
        (
            (self.image_width as f32 * self.zoom_factor) as usize,
            (self.image_height as f32 * self.zoom_factor) as usize,
        )
    }

    /// Size of the camera image the detection boxes refer to
    ///
    pub fn image_size(mut self, width: usize, height: usize) -> Self {
        self.image_width = width;
        self.image_height = height;
        self
    }

    /// Pinhole camera matrix for the original image resolution
    ///
    pub fn intrinsic(mut self, intrinsic: Matrix3<f32>) -> Self {
        self.intrinsic = intrinsic;
        self
    }

    /// Rigid transform from the range sensor frame to the camera frame
    ///
    pub fn sensor_to_camera(mut self, transform: Matrix4<f32>) -> Self {
        self.sensor_to_camera = transform;
        self
    }

    /// Rigid transform from the world frame to the camera frame
    ///
    pub fn world_to_camera(mut self, transform: Matrix4<f32>) -> Self {
        self.world_to_camera = transform;
        self
    }

    /// Downscale ratio of the working depth images, `(0, 1]`.
    ///
    /// Smaller values make every stage cheaper and merge neighbouring points into one pixel.
    ///
    pub fn zoom_factor(mut self, zoom: f32) -> Self {
        self.zoom_factor = zoom;
        self
    }

    /// The number of recent frames differenced against the background
    ///
    pub fn queue_size(mut self, n: usize) -> Self {
        self.queue_size = n;
        self
    }

    /// The band `[min, max]` of `background - depth` accepted as foreground.
    ///
    /// Differences below the band are sensor noise on the background itself, differences above
    /// it are reflections or objects too close to the station to be robots on the field.
    ///
    pub fn depth_diff(mut self, min: f32, max: f32) -> Self {
        self.min_depth_diff = min;
        self.max_depth_diff = max;
        self
    }

    /// Neighbour radius of the euclidean clustering
    ///
    pub fn cluster_tolerance(mut self, tolerance: f32) -> Self {
        self.cluster_tolerance = tolerance;
        self
    }

    /// Inclusive bounds of the accepted cluster size, points
    ///
    pub fn cluster_size(mut self, min: usize, max: usize) -> Self {
        self.min_cluster_size = min;
        self.max_cluster_size = max;
        self
    }

    /// Points farther from the sensor are dropped
    ///
    pub fn max_distance(mut self, distance: f32) -> Self {
        self.max_distance = distance;
        self
    }

    /// Projects points sequentially, so that the last point of the cloud wins a contested pixel
    ///
    pub fn deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    pub(crate) fn get_queue_size(&self) -> usize {
        self.queue_size
    }

    pub(crate) fn get_depth_diff(&self) -> (f32, f32) {
        (self.min_depth_diff, self.max_depth_diff)
    }

    pub(crate) fn get_cluster_tolerance(&self) -> f32 {
        self.cluster_tolerance
    }

    pub(crate) fn get_cluster_size(&self) -> (usize, usize) {
        (self.min_cluster_size, self.max_cluster_size)
    }

    pub(crate) fn get_max_distance(&self) -> f32 {
        self.max_distance
    }

    pub(crate) fn is_deterministic(&self) -> bool {
        self.deterministic
    }
}
