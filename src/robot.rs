use crate::track::{Track, TrackState};
use crate::utils::bbox::BoundingBox;
use nalgebra::{DVector, Point3};
use std::collections::BTreeMap;
use std::fmt;

/// Output of the external detector: box, class label and confidence
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub label: usize,
    pub confidence: f32,
}

impl Detection {
    pub fn new(x: f32, y: f32, width: f32, height: f32, label: usize, confidence: f32) -> Self {
        Self {
            bbox: BoundingBox::new(x, y, width, height),
            label,
            confidence,
        }
    }
}

/// Per-frame observation of one physical robot.
///
/// Built from a whole-robot ("car") detection and the sub-detections ("armors") found inside
/// it. Armor boxes are given relative to the car box and stored in absolute coordinates.
/// The location is filled by the locator, the track fields by the tracker.
///
#[derive(Debug, Clone, Default)]
pub struct Robot {
    bbox: Option<BoundingBox>,
    label: Option<usize>,
    confidence: Option<f32>,
    armors: Option<Vec<Detection>>,
    location: Option<Point3<f32>>,
    track_id: Option<u64>,
    track_state: Option<TrackState>,
}

impl Robot {
    pub fn new(car: &Detection, armors: &[Detection]) -> Self {
        let mut robot = Self {
            bbox: Some(car.bbox),
            ..Default::default()
        };
        if armors.is_empty() {
            return robot;
        }

        robot.armors = Some(
            armors
                .iter()
                .map(|a| Detection {
                    bbox: a.bbox.offset(&car.bbox),
                    ..*a
                })
                .collect(),
        );
        robot.classify();
        robot
    }

    /// Picks the label with the largest summed armor confidence, the first one on ties
    ///
    fn classify(&mut self) {
        let armors = match &self.armors {
            Some(a) => a,
            None => {
                self.label = None;
                self.confidence = None;
                return;
            }
        };
        let mut scores: BTreeMap<usize, (f32, usize)> = BTreeMap::new();
        for armor in armors {
            let entry = scores.entry(armor.label).or_insert((0.0, 0));
            entry.0 += armor.confidence;
            entry.1 += 1;
        }
        let mut best: Option<(usize, f32, usize)> = None;
        for (label, (score, count)) in scores {
            if best.map_or(true, |(_, s, _)| score > s) {
                best = Some((label, score, count));
            }
        }
        self.label = best.map(|(label, _, _)| label);
        self.confidence = best.map(|(_, score, count)| score / count as f32);
    }

    /// Drops the armors labeled at or above `class_num` and re-picks the label.
    ///
    /// A robot left without armors is no longer detected.
    ///
    pub fn retain_classes(&mut self, class_num: usize) {
        let armors = match self.armors.take() {
            Some(a) => a,
            None => return,
        };
        let (kept, dropped): (Vec<_>, Vec<_>) =
            armors.into_iter().partition(|a| a.label < class_num);
        if dropped.is_empty() {
            self.armors = Some(kept);
            return;
        }
        for armor in dropped {
            log::warn!(
                "Armor label {} is out of the class range {}, ignored",
                armor.label,
                class_num
            );
        }
        self.armors = if kept.is_empty() { None } else { Some(kept) };
        self.classify();
    }

    pub fn bbox(&self) -> Option<&BoundingBox> {
        self.bbox.as_ref()
    }

    pub fn label(&self) -> Option<usize> {
        self.label
    }

    pub fn confidence(&self) -> Option<f32> {
        self.confidence
    }

    pub fn armors(&self) -> Option<&[Detection]> {
        self.armors.as_deref()
    }

    pub fn location(&self) -> Option<&Point3<f32>> {
        self.location.as_ref()
    }

    pub fn track_id(&self) -> Option<u64> {
        self.track_id
    }

    pub fn track_state(&self) -> Option<TrackState> {
        self.track_state
    }

    pub fn is_located(&self) -> bool {
        self.location.is_some()
    }

    /// The robot carries sub-detections
    ///
    pub fn is_detected(&self) -> bool {
        self.armors.is_some()
    }

    /// The armors give a non-zero appearance over `class_num` classes
    ///
    pub fn has_evidence(&self, class_num: usize) -> bool {
        self.feature(class_num).sum() > crate::EPS
    }

    pub fn set_location(&mut self, location: Point3<f32>) {
        self.location = Some(location);
    }

    /// Class-confidence vector of length `class_num`, normalized to sum to `1` or all zero.
    ///
    /// Armors labeled at or above `class_num` do not contribute.
    ///
    pub fn feature(&self, class_num: usize) -> DVector<f32> {
        let mut feature = DVector::zeros(class_num);
        let armors = match &self.armors {
            Some(a) => a,
            None => return feature,
        };
        for armor in armors.iter().filter(|a| a.label < class_num) {
            feature[armor.label] += armor.confidence;
        }
        let sum = feature.sum();
        if sum < crate::EPS {
            return feature;
        }
        feature / sum
    }

    /// Adopts the identity of the matched track.
    ///
    /// A confirmed track overrides the label and the location, a tentative one only fills
    /// what the observation is missing.
    ///
    pub fn set_track(&mut self, track: &Track) {
        self.track_id = Some(track.id());
        self.track_state = Some(track.state());
        if track.is_confirmed() {
            self.label = track.label().or(self.label);
            self.location = Some(track.location());
        } else {
            if self.label.is_none() {
                self.label = track.label();
            }
            if self.location.is_none() {
                self.location = Some(track.location());
            }
        }
    }
}

impl fmt::Display for Robot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Robot: {{ Id: ")?;
        match self.track_id {
            Some(id) => write!(f, "{}", id)?,
            None => write!(f, "None")?,
        }
        write!(f, ", Label: ")?;
        match self.label {
            Some(l) => write!(f, "{}", l)?,
            None => write!(f, "None")?,
        }
        write!(f, ", Rect: ")?;
        match &self.bbox {
            Some(b) => write!(f, "[{}, {}, {}, {}]", b.x, b.y, b.width, b.height)?,
            None => write!(f, "None")?,
        }
        write!(f, ", Confidence: ")?;
        match self.confidence {
            Some(c) => write!(f, "{}", c)?,
            None => write!(f, "None")?,
        }
        write!(f, ", State: ")?;
        match self.track_state {
            Some(s) => write!(f, "{}", s)?,
            None => write!(f, "None")?,
        }
        write!(f, ", Location: ")?;
        match &self.location {
            Some(p) => write!(f, "[{}, {}, {}]", p.x, p.y, p.z)?,
            None => write!(f, "None")?,
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use crate::robot::{Detection, Robot};
    use crate::track::{Track, TrackOptions, TrackState};
    use crate::utils::bbox::BoundingBox;
    use crate::EPS;
    use nalgebra::{DVector, Point3};
    use std::sync::Arc;
    use std::time::Instant;

    fn car() -> Detection {
        Detection::new(100.0, 200.0, 80.0, 60.0, 0, 0.9)
    }

    #[test]
    fn without_armors() {
        let robot = Robot::new(&car(), &[]);
        assert_eq!(robot.bbox(), Some(&BoundingBox::new(100.0, 200.0, 80.0, 60.0)));
        assert_eq!(robot.label(), None);
        assert_eq!(robot.confidence(), None);
        assert!(!robot.is_detected());
        assert!(robot.feature(4).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn dominant_label_and_confidence() {
        let armors = [
            Detection::new(1.0, 2.0, 10.0, 5.0, 3, 0.6),
            Detection::new(20.0, 2.0, 10.0, 5.0, 3, 0.8),
            Detection::new(40.0, 2.0, 10.0, 5.0, 1, 0.9),
        ];
        let robot = Robot::new(&car(), &armors);
        assert_eq!(robot.label(), Some(3));
        assert!((robot.confidence().unwrap() - 0.7).abs() < EPS);
        let absolute = robot.armors().unwrap();
        assert_eq!(absolute[0].bbox, BoundingBox::new(101.0, 202.0, 10.0, 5.0));

        let feature = robot.feature(4);
        assert!((feature.sum() - 1.0).abs() < EPS);
        assert!((feature[3] - 1.4 / 2.3).abs() < EPS);
        assert!((feature[1] - 0.9 / 2.3).abs() < EPS);
    }

    #[test]
    fn out_of_range_labels_are_skipped() {
        let armors = [
            Detection::new(0.0, 0.0, 1.0, 1.0, 9, 0.9),
            Detection::new(0.0, 0.0, 1.0, 1.0, 0, 0.5),
        ];
        let robot = Robot::new(&car(), &armors);
        let feature = robot.feature(2);
        assert_eq!(feature, DVector::from_vec(vec![1.0, 0.0]));

        let only_bad = Robot::new(&car(), &armors[..1]);
        assert!(only_bad.feature(2).iter().all(|v| *v == 0.0));
        assert!(only_bad.is_detected());
        assert!(!only_bad.has_evidence(2));
        assert!(robot.has_evidence(2));
    }

    #[test]
    fn retained_classes_pick_the_label() {
        let armors = [
            Detection::new(0.0, 0.0, 1.0, 1.0, 9, 0.9),
            Detection::new(0.0, 0.0, 1.0, 1.0, 9, 0.8),
            Detection::new(0.0, 0.0, 1.0, 1.0, 1, 0.5),
        ];
        let mut robot = Robot::new(&car(), &armors);
        assert_eq!(robot.label(), Some(9));
        robot.retain_classes(4);
        assert_eq!(robot.label(), Some(1));
        assert!((robot.confidence().unwrap() - 0.5).abs() < EPS);
        assert_eq!(robot.armors().unwrap().len(), 1);

        let mut out_of_range = Robot::new(&car(), &armors[..2]);
        out_of_range.retain_classes(4);
        assert!(!out_of_range.is_detected());
        assert_eq!(out_of_range.label(), None);
        assert_eq!(out_of_range.confidence(), None);

        let mut in_range = Robot::new(&car(), &armors[2..]);
        in_range.retain_classes(4);
        assert_eq!(in_range.label(), Some(1));
        assert_eq!(in_range.armors().unwrap().len(), 1);
    }

    #[test]
    fn adopts_track() {
        let opts = Arc::new(TrackOptions {
            class_num: 4,
            init_thresh: 1,
            ..Default::default()
        });
        let mut appearance = DVector::zeros(4);
        appearance[2] = 1.0;
        let confirmed = Track::new(5, &Point3::new(1.0, 2.0, 3.0), &appearance, Instant::now(), opts);

        let mut robot = Robot::new(&car(), &[Detection::new(0.0, 0.0, 1.0, 1.0, 1, 0.5)]);
        robot.set_location(Point3::new(1.1, 2.1, 3.1));
        robot.set_track(&confirmed);
        assert_eq!(robot.track_id(), Some(5));
        assert_eq!(robot.track_state(), Some(TrackState::Confirmed));
        assert_eq!(robot.label(), Some(2));
        assert_eq!(robot.location(), Some(&Point3::new(1.0, 2.0, 3.0)));

        let tentative_opts = Arc::new(TrackOptions {
            class_num: 4,
            ..Default::default()
        });
        let tentative = Track::new(
            6,
            &Point3::new(5.0, 5.0, 0.0),
            &appearance,
            Instant::now(),
            tentative_opts,
        );
        let mut located = Robot::new(&car(), &[Detection::new(0.0, 0.0, 1.0, 1.0, 1, 0.5)]);
        located.set_location(Point3::new(4.0, 4.0, 0.0));
        located.set_track(&tentative);
        assert_eq!(located.label(), Some(1));
        assert_eq!(located.location(), Some(&Point3::new(4.0, 4.0, 0.0)));

        let mut bare = Robot::new(&car(), &[]);
        bare.set_track(&tentative);
        assert_eq!(bare.label(), Some(2));
        assert_eq!(bare.location(), Some(&Point3::new(5.0, 5.0, 0.0)));
        assert!(bare.to_string().contains("Tentative"));
    }
}
