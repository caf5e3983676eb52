pub use crate::locate::options::LocatorOptions;
pub use crate::locate::search::Clusters;
pub use crate::locate::Locator;
pub use crate::robot::{Detection, Robot};
pub use crate::sink::{ChannelSink, RobotReport, RobotSink};
pub use crate::station::{DetectionGroup, Station};
pub use crate::track::{Track, TrackState};
pub use crate::tracker::options::TrackerOptions;
pub use crate::tracker::Tracker;
pub use crate::utils::bbox::BoundingBox;
pub use crate::utils::linear_sum_assignment::AssignmentMethod;
