use crate::robot::Robot;
use crate::Errors;
use anyhow::Result;
use crossbeam::channel::{Receiver, Sender};
use nalgebra::Point3;

/// Position report of one tracked robot, as consumed by the communication component
///
#[derive(Debug, Clone, PartialEq)]
pub struct RobotReport {
    pub id: u64,
    pub label: Option<usize>,
    pub location: Point3<f32>,
}

impl RobotReport {
    /// Reports of the robots that have both a track and a location
    ///
    pub fn from_robots(robots: &[Robot]) -> Vec<RobotReport> {
        robots
            .iter()
            .filter_map(|r| {
                Some(RobotReport {
                    id: r.track_id()?,
                    label: r.label(),
                    location: *r.location()?,
                })
            })
            .collect()
    }
}

/// Receiver of per-frame reports
///
pub trait RobotSink {
    fn send(&mut self, reports: &[RobotReport]) -> Result<()>;
}

/// Sink forwarding every frame's reports as one message of a `crossbeam` channel
///
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<Vec<RobotReport>>,
}

impl ChannelSink {
    pub fn new(sender: Sender<Vec<RobotReport>>) -> Self {
        Self { sender }
    }

    /// Creates a sink with an unbounded channel and returns the receiving side
    ///
    pub fn unbounded() -> (Self, Receiver<Vec<RobotReport>>) {
        let (sender, receiver) = crossbeam::channel::unbounded();
        (Self::new(sender), receiver)
    }
}

impl RobotSink for ChannelSink {
    fn send(&mut self, reports: &[RobotReport]) -> Result<()> {
        self.sender
            .send(reports.to_vec())
            .map_err(|_| Errors::SinkDisconnected)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::robot::{Detection, Robot};
    use crate::sink::{ChannelSink, RobotReport, RobotSink};
    use crate::Errors;
    use nalgebra::Point3;

    #[test]
    fn reports_skip_untracked_robots() {
        let mut located = Robot::new(&Detection::new(0.0, 0.0, 10.0, 10.0, 0, 0.9), &[]);
        located.set_location(Point3::new(1.0, 2.0, 3.0));
        assert!(RobotReport::from_robots(&[located, Robot::default()]).is_empty());
    }

    #[test]
    fn channel_delivery_and_disconnect() {
        let (mut sink, receiver) = ChannelSink::unbounded();
        let report = RobotReport {
            id: 3,
            label: Some(1),
            location: Point3::new(1.0, 2.0, 0.0),
        };
        sink.send(&[report.clone()]).unwrap();
        assert_eq!(receiver.recv().unwrap(), vec![report]);

        drop(receiver);
        let err = sink.send(&[]).unwrap_err();
        assert_eq!(err.downcast::<Errors>().unwrap(), Errors::SinkDisconnected);
    }
}
