use crate::Errors;
use anyhow::Result;
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

/// Fixed mappings between the range sensor frame, the (zoomed) camera image and the world frame.
///
/// The transformer is immutable once built. Image coordinates are expressed in the zoomed
/// resolution: `(u, v)` are pixel coordinates multiplied by the zoom factor, the third
/// component is the depth along the camera optical axis.
///
#[derive(Debug, Clone)]
pub struct CoordinateTransformer {
    intrinsic: Matrix3<f32>,
    intrinsic_inv: Matrix3<f32>,
    sensor_to_camera: Matrix4<f32>,
    camera_to_sensor: Matrix4<f32>,
    camera_to_world: Matrix4<f32>,
    world_to_camera: Matrix4<f32>,
    zoom_factor: f32,
}

impl CoordinateTransformer {
    /// Creates the transformer
    ///
    /// # Parameters
    /// * `intrinsic` - pinhole camera matrix of the original image resolution
    /// * `sensor_to_camera` - rigid transform from the range sensor to the camera frame
    /// * `world_to_camera` - rigid transform from the world to the camera frame
    /// * `zoom_factor` - working image downscale ratio, `(0, 1]`
    ///
    pub fn new(
        intrinsic: Matrix3<f32>,
        sensor_to_camera: Matrix4<f32>,
        world_to_camera: Matrix4<f32>,
        zoom_factor: f32,
    ) -> Result<Self> {
        if !(zoom_factor > 0.0 && zoom_factor <= 1.0) {
            return Err(Errors::InvalidZoomFactor(zoom_factor).into());
        }
        let intrinsic_inv = intrinsic
            .try_inverse()
            .ok_or(Errors::NonInvertibleIntrinsic)?;
        let camera_to_sensor = sensor_to_camera
            .try_inverse()
            .ok_or(Errors::NonInvertibleTransform("sensor_to_camera"))?;
        let camera_to_world = world_to_camera
            .try_inverse()
            .ok_or(Errors::NonInvertibleTransform("world_to_camera"))?;

        Ok(Self {
            intrinsic,
            intrinsic_inv,
            sensor_to_camera,
            camera_to_sensor,
            camera_to_world,
            world_to_camera,
            zoom_factor,
        })
    }

    pub fn zoom_factor(&self) -> f32 {
        self.zoom_factor
    }

    pub fn sensor_to_camera(&self, p: &Point3<f32>) -> Point3<f32> {
        self.sensor_to_camera.transform_point(p)
    }

    pub fn camera_to_world(&self, p: &Point3<f32>) -> Point3<f32> {
        self.camera_to_world.transform_point(p)
    }

    pub fn sensor_to_world(&self, p: &Point3<f32>) -> Point3<f32> {
        (self.camera_to_world * self.sensor_to_camera).transform_point(p)
    }

    pub fn world_to_sensor(&self, p: &Point3<f32>) -> Point3<f32> {
        (self.camera_to_sensor * self.world_to_camera).transform_point(p)
    }

    /// Projects a sensor point to the zoomed image. Returns `(u, v, depth)`.
    ///
    /// The result is meaningful only for a positive depth, callers must check it.
    ///
    pub fn sensor_to_image(&self, p: &Point3<f32>) -> Point3<f32> {
        let camera = self.sensor_to_camera(p);
        let projected = self.intrinsic * camera.coords;
        let depth = projected.z;
        Point3::new(
            projected.x * self.zoom_factor / depth,
            projected.y * self.zoom_factor / depth,
            depth,
        )
    }

    /// Backprojects a zoomed image point `(u, v, depth)` to the sensor frame.
    ///
    pub fn image_to_sensor(&self, uvd: &Point3<f32>) -> Point3<f32> {
        let ray = Vector3::new(uvd.x / self.zoom_factor, uvd.y / self.zoom_factor, 1.0);
        let camera = self.intrinsic_inv * ray * uvd.z;
        self.camera_to_sensor.transform_point(&Point3::from(camera))
    }
}
