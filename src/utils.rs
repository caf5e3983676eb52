/// Detection boxes and their mapping to the zoomed image
pub mod bbox;

/// Sensor, image and world frame transforms
pub mod transform;

/// Dense depth buffers
pub mod depth_image;

/// Kalman filter
pub mod kalman;

/// Auction and Kuhn-Munkres assignment solvers
pub mod linear_sum_assignment;
