use crate::distance::{cosine, euclidean};
use crate::robot::Robot;
use crate::track::{Track, TrackOptions};
use crate::tracker::options::TrackerOptions;
use crate::utils::linear_sum_assignment::{
    AssignmentMethod, AssignmentSolver, AuctionSolver, KuhnMunkresSolver,
};
use crate::EPS;
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;
use std::time::Instant;

/// Tracker configuration
pub mod options;

/// Similarity of an observed location to a predicted one, `(0, 1]`.
///
/// Flat within `thresh`, linear down to `0.5` at `2 * thresh`, exponential decay beyond.
///
pub fn distance_score(distance: f32, thresh: f32) -> f32 {
    if distance < thresh {
        1.0
    } else if distance < 2.0 * thresh {
        1.5 - distance / (2.0 * thresh)
    } else {
        0.5 * (2.0 - distance / thresh).exp()
    }
}

/// Cosine similarity rescaled to `[0, 1]`; `0.5` when either vector is zero
///
pub fn feature_score(f1: &DVector<f32>, f2: &DVector<f32>) -> f32 {
    (cosine(f1, f2) + 1.0) / 2.0
}

fn has_evidence(feature: &DVector<f32>) -> bool {
    feature.sum() > EPS
}

/// Multi-object tracker.
///
/// Every [`update`](Self::update) predicts the tracks to the frame timestamp, matches them with
/// the observed robots by maximizing the total matching cost and applies the lifecycle
/// transitions. Matched robots adopt the identity of their track.
///
#[derive(Debug)]
pub struct Tracker {
    opts: TrackerOptions,
    track_opts: Arc<TrackOptions>,
    tracks: Vec<Track>,
    next_id: u64,
}

impl Tracker {
    pub(crate) fn new(opts: TrackerOptions) -> Self {
        Self {
            track_opts: Arc::new(opts.track_options()),
            opts,
            tracks: Vec::new(),
            next_id: 0,
        }
    }

    /// Live (tentative and confirmed) tracks
    ///
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.opts
    }

    /// Matching cost of a track and a robot with the precomputed robot `feature`.
    ///
    /// A robot with neither a location nor appearance evidence (an all-zero `feature`) costs
    /// `0`; an unlocated robot gets no distance score.
    ///
    pub fn calculate_cost(&self, track: &Track, robot: &Robot, feature: &DVector<f32>) -> f32 {
        if !robot.is_located() && !has_evidence(feature) {
            return 0.0;
        }
        let (distance_weight, feature_weight) = self.opts.get_weights();
        let distance = robot.location().map_or(0.0, |location| {
            distance_score(
                euclidean(location, &track.location()),
                self.opts.get_distance_thresh(),
            )
        });
        let feature = feature_score(feature, track.appearance().distribution());
        distance_weight * distance + feature_weight * feature
    }

    fn assign(&self, cost: &DMatrix<f32>) -> Vec<Option<usize>> {
        match self.opts.get_assignment_method() {
            AssignmentMethod::Auction => AuctionSolver::new(self.opts.get_max_iter()).solve(cost),
            AssignmentMethod::KuhnMunkres => KuhnMunkresSolver.solve(cost),
        }
    }

    /// Processes the robots observed at `timestamp`.
    ///
    /// Armors labeled outside the class range are dropped from the robots first.
    ///
    pub fn update(&mut self, robots: &mut [Robot], timestamp: Instant) {
        for track in self.tracks.iter_mut() {
            track.predict(timestamp);
        }

        let class_num = self.opts.get_class_num();
        let features = robots
            .iter_mut()
            .map(|r| {
                r.retain_classes(class_num);
                r.feature(class_num)
            })
            .collect::<Vec<_>>();
        let cost = DMatrix::from_fn(self.tracks.len(), robots.len(), |t, r| {
            self.calculate_cost(&self.tracks[t], &robots[r], &features[r])
        });
        let assignment = self.assign(&cost);

        let mut matched = vec![false; robots.len()];
        for (t, track) in self.tracks.iter_mut().enumerate() {
            let pair = assignment[t].filter(|r| cost[(t, *r)] > 0.0);
            match pair {
                Some(r) => {
                    let robot = &mut robots[r];
                    if let Some(location) = robot.location().copied() {
                        track.update(&location, &features[r]);
                    }
                    robot.set_track(track);
                    matched[r] = true;
                }
                None => track.mark_missed(),
            }
        }

        for (r, robot) in robots.iter_mut().enumerate() {
            if matched[r] || !has_evidence(&features[r]) {
                continue;
            }
            let location = match robot.location() {
                Some(l) => *l,
                None => continue,
            };
            let track = Track::new(
                self.next_id,
                &location,
                &features[r],
                timestamp,
                self.track_opts.clone(),
            );
            log::debug!("Track {} spawned at {:?}", track.id(), location);
            self.next_id += 1;
            robot.set_track(&track);
            self.tracks.push(track);
        }

        self.tracks.retain(|t| {
            if t.is_deleted() {
                log::debug!("Track {} purged", t.id());
            }
            !t.is_deleted()
        });
    }
}
