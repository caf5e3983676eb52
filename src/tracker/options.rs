use crate::track::TrackOptions;
use crate::tracker::Tracker;
use crate::utils::kalman::kalman_3d_singer::Singer3DKalmanFilter;
use crate::utils::linear_sum_assignment::AssignmentMethod;
use crate::Errors;
use anyhow::Result;
use nalgebra::Vector3;

/// Class that is used to configure the tracker
///
/// Distances are expressed in the units of the world frame (millimeters for the defaults).
///
#[derive(Debug, Clone)]
pub struct TrackerOptions {
    class_num: usize,
    init_thresh: usize,
    miss_thresh: usize,
    max_acceleration: f32,
    acceleration_correlation_time: f32,
    observation_noise: Vector3<f32>,
    distance_weight: f32,
    feature_weight: f32,
    max_iter: usize,
    distance_thresh: f32,
    appearance_evidence_cap: f32,
    assignment_method: AssignmentMethod,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            class_num: 12,
            init_thresh: 2,
            miss_thresh: 5,
            max_acceleration: 5000.0,
            acceleration_correlation_time: 1.0,
            observation_noise: Vector3::new(200.0, 200.0, 200.0),
            distance_weight: 0.6,
            feature_weight: 0.4,
            max_iter: 100,
            distance_thresh: 1000.0,
            appearance_evidence_cap: 100.0,
            assignment_method: AssignmentMethod::default(),
        }
    }
}

impl TrackerOptions {
    /// Validates the options and creates the tracker
    ///
    pub fn build(self) -> Result<Tracker> {
        let positive = [
            ("max_acceleration", self.max_acceleration),
            (
                "acceleration_correlation_time",
                self.acceleration_correlation_time,
            ),
            ("distance_thresh", self.distance_thresh),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(Errors::InvalidOption(name, value.to_string()).into());
            }
        }
        if !self.observation_noise.iter().all(|n| *n > 0.0) {
            return Err(Errors::InvalidOption(
                "observation_noise",
                format!("{:?}", self.observation_noise),
            )
            .into());
        }
        for (name, value) in [
            ("distance_weight", self.distance_weight),
            ("feature_weight", self.feature_weight),
        ] {
            if !(value >= 0.0) {
                return Err(Errors::InvalidOption(name, value.to_string()).into());
            }
        }
        for (name, value) in [
            ("class_num", self.class_num),
            ("init_thresh", self.init_thresh),
            ("miss_thresh", self.miss_thresh),
        ] {
            if value == 0 {
                return Err(Errors::InvalidOption(name, value.to_string()).into());
            }
        }
        if !(self.appearance_evidence_cap >= 1.0) {
            return Err(Errors::InvalidOption(
                "appearance_evidence_cap",
                self.appearance_evidence_cap.to_string(),
            )
            .into());
        }
        Ok(Tracker::new(self))
    }

    pub(crate) fn track_options(&self) -> TrackOptions {
        TrackOptions {
            filter: Singer3DKalmanFilter::new(
                self.max_acceleration,
                self.acceleration_correlation_time,
                self.observation_noise,
            ),
            init_thresh: self.init_thresh,
            miss_thresh: self.miss_thresh,
            class_num: self.class_num,
            appearance_evidence_cap: self.appearance_evidence_cap,
        }
    }

    /// Length of appearance vectors, armor labels at or above it are ignored
    ///
    pub fn class_num(mut self, n: usize) -> Self {
        self.class_num = n;
        self
    }

    /// Hits required to confirm a track
    ///
    pub fn init_thresh(mut self, n: usize) -> Self {
        self.init_thresh = n;
        self
    }

    /// Consecutive misses after which a confirmed track is deleted
    ///
    pub fn miss_thresh(mut self, n: usize) -> Self {
        self.miss_thresh = n;
        self
    }

    /// Singer motion model parameters.
    ///
    /// `max_acceleration` bounds the expected acceleration of the robots, `correlation_time`
    /// (seconds) is how long an acceleration persists before it decays.
    ///
    pub fn motion(mut self, max_acceleration: f32, correlation_time: f32) -> Self {
        self.max_acceleration = max_acceleration;
        self.acceleration_correlation_time = correlation_time;
        self
    }

    /// Standard deviation of the located positions per axis
    ///
    pub fn observation_noise(mut self, noise: Vector3<f32>) -> Self {
        self.observation_noise = noise;
        self
    }

    /// Weights of the distance and the appearance scores in the matching cost
    ///
    pub fn weights(mut self, distance_weight: f32, feature_weight: f32) -> Self {
        self.distance_weight = distance_weight;
        self.feature_weight = feature_weight;
        self
    }

    /// Bidding rounds allowed to the auction solver
    ///
    pub fn max_iter(mut self, n: usize) -> Self {
        self.max_iter = n;
        self
    }

    /// The distance below which the distance score is maximal
    ///
    pub fn distance_thresh(mut self, distance: f32) -> Self {
        self.distance_thresh = distance;
        self
    }

    /// Upper bound of the evidence weight of the track appearance.
    ///
    /// After the cap is reached every new observation gets the weight `1 / (cap + 1)` and older
    /// observations fade out exponentially.
    ///
    pub fn appearance_evidence_cap(mut self, cap: f32) -> Self {
        self.appearance_evidence_cap = cap;
        self
    }

    pub fn assignment_method(mut self, method: AssignmentMethod) -> Self {
        self.assignment_method = method;
        self
    }

    pub(crate) fn get_class_num(&self) -> usize {
        self.class_num
    }

    pub(crate) fn get_weights(&self) -> (f32, f32) {
        (self.distance_weight, self.feature_weight)
    }

    pub(crate) fn get_distance_thresh(&self) -> f32 {
        self.distance_thresh
    }

    pub(crate) fn get_max_iter(&self) -> usize {
        self.max_iter
    }

    pub(crate) fn get_assignment_method(&self) -> AssignmentMethod {
        self.assignment_method
    }
}
