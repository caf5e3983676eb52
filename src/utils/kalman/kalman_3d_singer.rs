use crate::utils::kalman::KalmanState;
use nalgebra::{Point3, SMatrix, SVector, Vector3};

pub const DIM_3D_POINT: usize = 3;
/// Position, velocity and acceleration per axis
pub const DIM_3D_SINGER: usize = DIM_3D_POINT * 3;

/// Below this `alpha * dt` the closed-form Singer noise terms lose precision and their
/// Taylor expansions are used instead.
const SERIES_THRESHOLD: f64 = 1e-3;

/// Kalman filter over `[x, y, z, vx, vy, vz, ax, ay, az]`.
///
/// Acceleration is modelled as a zero-mean first-order Markov process (Singer model) with
/// correlation time `tau` and variance `max_acceleration^2 / 3`. Only the position is observed.
///
#[derive(Debug, Clone)]
pub struct Singer3DKalmanFilter {
    max_acceleration: f32,
    correlation_time: f32,
    observation_noise: Vector3<f32>,
    update_matrix: SMatrix<f32, DIM_3D_POINT, DIM_3D_SINGER>,
}

/// Default initializer
impl Default for Singer3DKalmanFilter {
    fn default() -> Self {
        Singer3DKalmanFilter::new(5.0, 1.0, Vector3::new(0.2, 0.2, 0.2))
    }
}

impl Singer3DKalmanFilter {
    /// Creates the filter
    ///
    /// # Parameters
    /// * `max_acceleration` - maximum target acceleration
    /// * `correlation_time` - acceleration correlation time constant (tau), seconds
    /// * `observation_noise` - standard deviation of the position measurement per axis
    ///
    pub fn new(max_acceleration: f32, correlation_time: f32, observation_noise: Vector3<f32>) -> Self {
        Self {
            max_acceleration,
            correlation_time,
            observation_noise,
            update_matrix: SMatrix::identity(),
        }
    }

    fn acceleration_variance(&self) -> f32 {
        self.max_acceleration * self.max_acceleration / 3.0
    }

    /// Transition and process noise matrices for the elapsed time `dt`
    ///
    fn motion(
        &self,
        dt: f32,
    ) -> (
        SMatrix<f32, DIM_3D_SINGER, DIM_3D_SINGER>,
        SMatrix<f32, DIM_3D_SINGER, DIM_3D_SINGER>,
    ) {
        let alpha = 1.0 / self.correlation_time as f64;
        let t = dt as f64;
        let at = alpha * t;
        let e1 = (-at).exp();
        let e2 = (-2.0 * at).exp();

        let f01 = t;
        let f02 = (at - 1.0 + e1) / (alpha * alpha);
        let f12 = (1.0 - e1) / alpha;
        let f22 = e1;

        // Noise terms without the common `2 * alpha * sigma^2` factor.
        let (q11, q12, q13, q22, q23, q33) = if at < SERIES_THRESHOLD {
            (
                t.powi(5) / 20.0,
                t.powi(4) / 8.0,
                t.powi(3) / 6.0,
                t.powi(3) / 3.0,
                t * t / 2.0,
                t,
            )
        } else {
            (
                (1.0 - e2 + 2.0 * at + 2.0 * at.powi(3) / 3.0 - 2.0 * at * at - 4.0 * at * e1)
                    / (2.0 * alpha.powi(5)),
                (e2 + 1.0 - 2.0 * e1 + 2.0 * at * e1 - 2.0 * at + at * at) / (2.0 * alpha.powi(4)),
                (1.0 - e2 - 2.0 * at * e1) / (2.0 * alpha.powi(3)),
                (4.0 * e1 - 3.0 - e2 + 2.0 * at) / (2.0 * alpha.powi(3)),
                (e2 + 1.0 - 2.0 * e1) / (2.0 * alpha * alpha),
                (1.0 - e2) / (2.0 * alpha),
            )
        };
        let scale = 2.0 * alpha * self.acceleration_variance() as f64;

        let mut motion_matrix: SMatrix<f32, DIM_3D_SINGER, DIM_3D_SINGER> = SMatrix::identity();
        let mut motion_cov: SMatrix<f32, DIM_3D_SINGER, DIM_3D_SINGER> = SMatrix::zeros();

        for i in 0..DIM_3D_POINT {
            let (p, v, a) = (i, DIM_3D_POINT + i, 2 * DIM_3D_POINT + i);
            motion_matrix[(p, v)] = f01 as f32;
            motion_matrix[(p, a)] = f02 as f32;
            motion_matrix[(v, a)] = f12 as f32;
            motion_matrix[(a, a)] = f22 as f32;

            for (r, c, q) in [
                (p, p, q11),
                (p, v, q12),
                (p, a, q13),
                (v, v, q22),
                (v, a, q23),
                (a, a, q33),
            ] {
                let q = (scale * q) as f32;
                motion_cov[(r, c)] = q;
                motion_cov[(c, r)] = q;
            }
        }

        (motion_matrix, motion_cov)
    }

    fn observation_cov(&self) -> SMatrix<f32, DIM_3D_POINT, DIM_3D_POINT> {
        SMatrix::from_diagonal(&self.observation_noise.component_mul(&self.observation_noise))
    }

    /// Initialize the filter with the first observation
    ///
    pub fn initiate(&self, p: &Point3<f32>) -> KalmanState<DIM_3D_SINGER> {
        let mean: SVector<f32, DIM_3D_SINGER> =
            SVector::from_iterator(p.coords.iter().copied().chain([0.0; 6]));

        let velocity_var = (self.max_acceleration * self.correlation_time).powi(2);
        let acceleration_var = self.acceleration_variance();
        let position_var = self.observation_noise.component_mul(&self.observation_noise);

        let std: SVector<f32, DIM_3D_SINGER> = SVector::from_iterator(
            position_var
                .iter()
                .copied()
                .chain([velocity_var; DIM_3D_POINT])
                .chain([acceleration_var; DIM_3D_POINT]),
        );

        KalmanState {
            mean,
            covariance: SMatrix::from_diagonal(&std),
        }
    }

    /// Propagates the state by `dt` seconds. Non-positive `dt` leaves the state untouched.
    ///
    pub fn predict(
        &self,
        state: &KalmanState<DIM_3D_SINGER>,
        dt: f32,
    ) -> KalmanState<DIM_3D_SINGER> {
        if dt <= 0.0 {
            return *state;
        }
        let (motion_matrix, motion_cov) = self.motion(dt);
        let mean = motion_matrix * state.mean;
        let covariance = motion_matrix * state.covariance * motion_matrix.transpose() + motion_cov;
        KalmanState { mean, covariance }
    }

    /// Corrects the state with a position measurement
    ///
    pub fn update(
        &self,
        state: &KalmanState<DIM_3D_SINGER>,
        p: &Point3<f32>,
    ) -> KalmanState<DIM_3D_SINGER> {
        let (mean, covariance) = (state.mean, state.covariance);
        let cross_cov = covariance * self.update_matrix.transpose();
        let projected_cov = self.update_matrix * cross_cov + self.observation_cov();

        let choletsky = match projected_cov.cholesky() {
            Some(c) => c,
            None => {
                log::warn!("Innovation covariance is not positive definite, correction skipped");
                return *state;
            }
        };
        let kalman_gain = choletsky.solve(&cross_cov.transpose()).transpose();

        let innovation = p.coords - self.update_matrix * mean;

        let mean = mean + kalman_gain * innovation;
        let covariance = covariance - kalman_gain * projected_cov * kalman_gain.transpose();
        KalmanState { mean, covariance }
    }
}

impl From<KalmanState<{ DIM_3D_SINGER }>> for Point3<f32> {
    fn from(s: KalmanState<{ DIM_3D_SINGER }>) -> Self {
        Point3::new(s.mean[0], s.mean[1], s.mean[2])
    }
}
