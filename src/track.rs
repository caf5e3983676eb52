use crate::utils::kalman::kalman_3d_singer::{Singer3DKalmanFilter, DIM_3D_SINGER};
use crate::utils::kalman::KalmanState;
use crate::EPS;
use nalgebra::{DVector, Point3, Vector3};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle of a track
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackState {
    /// Newly spawned, not yet trusted
    Tentative,
    /// Matched often enough to be reported as a stable identity
    Confirmed,
    /// Terminal, purged at the end of the tracker cycle
    Deleted,
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackState::Tentative => "Tentative",
            TrackState::Confirmed => "Confirmed",
            TrackState::Deleted => "Deleted",
        };
        f.write_str(s)
    }
}

/// Options shared by all tracks of one tracker
///
#[derive(Debug, Clone)]
pub struct TrackOptions {
    pub filter: Singer3DKalmanFilter,
    /// Hits required to turn a tentative track into a confirmed one
    pub init_thresh: usize,
    /// Consecutive misses after which a confirmed track is deleted
    pub miss_thresh: usize,
    /// Length of appearance vectors
    pub class_num: usize,
    /// Upper bound of the evidence weight kept by the appearance accumulator
    pub appearance_evidence_cap: f32,
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self {
            filter: Singer3DKalmanFilter::default(),
            init_thresh: 2,
            miss_thresh: 5,
            class_num: 12,
            appearance_evidence_cap: 100.0,
        }
    }
}

/// Running class distribution of a track.
///
/// Each folded observation is normalized and contributes one unit of evidence; the
/// distribution is the evidence-weighted average of the observations. Once the evidence
/// reaches the cap, new observations keep a constant weight and older ones fade out.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Appearance {
    distribution: DVector<f32>,
    evidence: f32,
    cap: f32,
}

impl Appearance {
    pub fn new(class_num: usize, cap: f32) -> Self {
        Self {
            distribution: DVector::zeros(class_num),
            evidence: 0.0,
            cap,
        }
    }

    /// Folds a class-confidence vector in. Vectors without evidence are ignored.
    ///
    pub fn fold(&mut self, observation: &DVector<f32>) {
        let len = self.distribution.len().min(observation.len());
        let observation = observation.rows(0, len);
        let sum = observation.sum();
        if sum < EPS {
            return;
        }
        let total = self.evidence + 1.0;
        let mut distribution = &self.distribution * self.evidence;
        distribution
            .rows_mut(0, len)
            .zip_apply(&observation, |acc, o| *acc += o / sum);
        self.distribution = distribution / total;
        self.evidence = total.min(self.cap);
    }

    /// Normalized distribution, all zero when no evidence was seen
    ///
    pub fn distribution(&self) -> &DVector<f32> {
        &self.distribution
    }

    pub fn evidence(&self) -> f32 {
        self.evidence
    }

    /// The most likely class
    ///
    pub fn label(&self) -> Option<usize> {
        if self.evidence <= 0.0 {
            return None;
        }
        let mut best: Option<(usize, f32)> = None;
        for (i, p) in self.distribution.iter().enumerate() {
            if best.map_or(true, |(_, b)| *p > b) {
                best = Some((i, *p));
            }
        }
        best.map(|(i, _)| i)
    }
}

/// Filtered kinematic state, appearance and lifecycle of one object
///
#[derive(Debug, Clone)]
pub struct Track {
    id: u64,
    kalman: KalmanState<DIM_3D_SINGER>,
    timestamp: Instant,
    age: usize,
    time_since_update: usize,
    hits: usize,
    misses: usize,
    appearance: Appearance,
    state: TrackState,
    opts: Arc<TrackOptions>,
}

impl Track {
    /// Spawns a tentative track from the first observation
    ///
    pub fn new(
        id: u64,
        location: &Point3<f32>,
        appearance: &DVector<f32>,
        timestamp: Instant,
        opts: Arc<TrackOptions>,
    ) -> Self {
        let mut accumulator = Appearance::new(opts.class_num, opts.appearance_evidence_cap);
        accumulator.fold(appearance);
        let mut track = Self {
            id,
            kalman: opts.filter.initiate(location),
            timestamp,
            age: 1,
            time_since_update: 0,
            hits: 1,
            misses: 0,
            appearance: accumulator,
            state: TrackState::Tentative,
            opts,
        };
        track.confirm_if_ready();
        track
    }

    fn confirm_if_ready(&mut self) {
        if self.state == TrackState::Tentative && self.hits >= self.opts.init_thresh {
            self.state = TrackState::Confirmed;
        }
    }

    /// Advances the filter to `timestamp`
    ///
    pub fn predict(&mut self, timestamp: Instant) {
        let dt = timestamp.saturating_duration_since(self.timestamp).as_secs_f32();
        self.kalman = self.opts.filter.predict(&self.kalman, dt);
        self.timestamp = self.timestamp.max(timestamp);
        self.age += 1;
        self.time_since_update += 1;
    }

    /// Corrects the filter with a measured location and folds the appearance in
    ///
    pub fn update(&mut self, location: &Point3<f32>, appearance: &DVector<f32>) {
        self.kalman = self.opts.filter.update(&self.kalman, location);
        self.appearance.fold(appearance);
        self.time_since_update = 0;
        self.hits += 1;
        self.misses = 0;
        self.confirm_if_ready();
    }

    /// Registers a cycle without a matching observation
    ///
    pub fn mark_missed(&mut self) {
        match self.state {
            TrackState::Tentative => self.state = TrackState::Deleted,
            TrackState::Confirmed => {
                self.misses += 1;
                if self.misses >= self.opts.miss_thresh {
                    self.state = TrackState::Deleted;
                }
            }
            TrackState::Deleted => {}
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn is_tentative(&self) -> bool {
        self.state == TrackState::Tentative
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    pub fn is_deleted(&self) -> bool {
        self.state == TrackState::Deleted
    }

    /// Filtered (or predicted, between updates) position
    ///
    pub fn location(&self) -> Point3<f32> {
        Point3::from(self.kalman)
    }

    pub fn velocity(&self) -> Vector3<f32> {
        Vector3::new(self.kalman.mean[3], self.kalman.mean[4], self.kalman.mean[5])
    }

    pub fn label(&self) -> Option<usize> {
        self.appearance.label()
    }

    pub fn appearance(&self) -> &Appearance {
        &self.appearance
    }

    pub fn kalman_state(&self) -> &KalmanState<DIM_3D_SINGER> {
        &self.kalman
    }

    pub fn age(&self) -> usize {
        self.age
    }

    pub fn time_since_update(&self) -> usize {
        self.time_since_update
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use crate::track::{Appearance, Track, TrackOptions, TrackState};
    use crate::EPS;
    use nalgebra::{DVector, Point3};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn opts(init_thresh: usize, miss_thresh: usize) -> Arc<TrackOptions> {
        Arc::new(TrackOptions {
            init_thresh,
            miss_thresh,
            class_num: 3,
            ..Default::default()
        })
    }

    fn one_hot(i: usize) -> DVector<f32> {
        let mut v = DVector::zeros(3);
        v[i] = 1.0;
        v
    }

    #[test]
    fn appearance_is_a_distribution() {
        let mut a = Appearance::new(3, 100.0);
        assert_eq!(a.label(), None);
        a.fold(&DVector::zeros(3));
        assert_eq!(a.evidence(), 0.0);
        assert!(a.distribution().iter().all(|v| *v == 0.0));

        a.fold(&DVector::from_vec(vec![2.0, 2.0, 0.0]));
        a.fold(&one_hot(1));
        assert!((a.distribution().sum() - 1.0).abs() < EPS);
        assert!((a.distribution()[0] - 0.25).abs() < EPS);
        assert!((a.distribution()[1] - 0.75).abs() < EPS);
        assert_eq!(a.label(), Some(1));
        assert_eq!(a.evidence(), 2.0);
    }

    #[test]
    fn appearance_evidence_is_capped() {
        let mut a = Appearance::new(3, 4.0);
        for _ in 0..10 {
            a.fold(&one_hot(0));
        }
        assert_eq!(a.evidence(), 4.0);
        for _ in 0..30 {
            a.fold(&one_hot(2));
        }
        assert_eq!(a.label(), Some(2));
        assert!(a.distribution()[0] < 0.01);
        assert!((a.distribution().sum() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn tentative_confirms_after_init_hits() {
        let t0 = Instant::now();
        let mut track = Track::new(1, &Point3::new(1.0, 2.0, 0.0), &one_hot(0), t0, opts(3, 5));
        assert_eq!(track.state(), TrackState::Tentative);
        assert_eq!(track.hits(), 1);

        track.predict(t0 + Duration::from_millis(100));
        track.update(&Point3::new(1.0, 2.0, 0.0), &one_hot(0));
        assert!(track.is_tentative());

        track.predict(t0 + Duration::from_millis(200));
        assert_eq!(track.time_since_update(), 1);
        track.update(&Point3::new(1.0, 2.0, 0.0), &one_hot(0));
        assert!(track.is_confirmed());
        assert_eq!(track.hits(), 3);
        assert_eq!(track.age(), 3);
        assert_eq!(track.time_since_update(), 0);
        assert_eq!(track.label(), Some(0));
    }

    #[test]
    fn tentative_miss_deletes() {
        let mut track = Track::new(1, &Point3::origin(), &one_hot(0), Instant::now(), opts(2, 5));
        track.mark_missed();
        assert_eq!(track.state(), TrackState::Deleted);
        track.update(&Point3::origin(), &one_hot(0));
        assert_eq!(track.state(), TrackState::Deleted);
    }

    #[test]
    fn confirmed_deleted_on_miss_thresh() {
        let mut track = Track::new(1, &Point3::origin(), &one_hot(0), Instant::now(), opts(1, 3));
        assert!(track.is_confirmed());
        track.mark_missed();
        track.mark_missed();
        assert!(track.is_confirmed());
        assert_eq!(track.misses(), 2);
        track.update(&Point3::origin(), &one_hot(0));
        assert_eq!(track.misses(), 0);
        track.mark_missed();
        track.mark_missed();
        assert!(track.is_confirmed());
        track.mark_missed();
        assert!(track.is_deleted());
    }

    #[test]
    fn predict_moves_along_velocity() {
        let t0 = Instant::now();
        let mut track = Track::new(7, &Point3::origin(), &one_hot(0), t0, opts(2, 5));
        for i in 1..=20 {
            let t = t0 + Duration::from_millis(100 * i);
            track.predict(t);
            track.update(&Point3::new(0.1 * i as f32, 0.0, 0.0), &one_hot(0));
        }
        assert!((track.velocity().x - 1.0).abs() < 0.3);
        let before = track.location();
        track.predict(t0 + Duration::from_millis(2100));
        assert!(track.location().x > before.x);
        // an older timestamp never moves the filter backwards
        let after = track.location();
        track.predict(t0);
        assert_eq!(track.location(), after);
    }
}
