use crate::locate::options::LocatorOptions;
use crate::locate::Locator;
use crate::robot::{Detection, Robot};
use crate::sink::{RobotReport, RobotSink};
use crate::tracker::options::TrackerOptions;
use crate::tracker::Tracker;
use anyhow::Result;
use nalgebra::Point3;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::time::Instant;

/// A car detection with the armor detections found inside it
pub type DetectionGroup = (Detection, Vec<Detection>);

/// Per-frame pipeline: locate the detected robots in the cloud, then track them.
///
/// Parallel stages run on the global `rayon` pool unless a dedicated pool is configured.
///
pub struct Station {
    locator: Locator,
    tracker: Tracker,
    pool: Option<ThreadPool>,
}

impl Station {
    pub fn new(locator: LocatorOptions, tracker: TrackerOptions) -> Result<Self> {
        Ok(Self {
            locator: locator.build()?,
            tracker: tracker.build()?,
            pool: None,
        })
    }

    /// Runs the parallel stages on a dedicated pool of `threads` workers
    ///
    pub fn with_threads(mut self, threads: usize) -> Result<Self> {
        self.pool = Some(ThreadPoolBuilder::new().num_threads(threads).build()?);
        Ok(self)
    }

    /// Dedicated pool with one worker per logical CPU
    ///
    pub fn with_cpu_threads(self) -> Result<Self> {
        self.with_threads(num_cpus::get())
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Processes one frame: the sensor cloud and the detections made at `timestamp`.
    ///
    /// Returns one robot per detection group, in the same order.
    ///
    pub fn process(
        &mut self,
        cloud: &[Point3<f32>],
        detections: &[DetectionGroup],
        timestamp: Instant,
    ) -> Vec<Robot> {
        let mut robots = detections
            .iter()
            .map(|(car, armors)| Robot::new(car, armors))
            .collect::<Vec<_>>();

        let Self {
            locator,
            tracker,
            pool,
        } = self;
        let mut run = || {
            locator.update(cloud);
            locator.cluster().search(&mut robots);
            tracker.update(&mut robots, timestamp);
        };
        match pool {
            Some(pool) => pool.install(run),
            None => run(),
        }

        log::debug!(
            "Frame processed: {} robots, {} located, {} tracks",
            robots.len(),
            robots.iter().filter(|r| r.is_located()).count(),
            self.tracker.tracks().len()
        );
        robots
    }

    /// Sends the reports of the tracked and located robots to the sink
    ///
    pub fn publish(&self, robots: &[Robot], sink: &mut dyn RobotSink) -> Result<()> {
        let reports = RobotReport::from_robots(robots);
        log::trace!("Publishing {} reports", reports.len());
        sink.send(&reports)
    }
}
