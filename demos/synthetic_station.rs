use anyhow::Result;
use nalgebra::{Point3, Vector3};
use radar::prelude::{ChannelSink, LocatorOptions, Station, TrackerOptions};
use radar::synthetic::{SceneGen, SyntheticRobot};
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    env_logger::init();

    let locator = LocatorOptions::default()
        .image_size(1280, 1024)
        .zoom_factor(0.5);
    let tracker = TrackerOptions::default().class_num(12);

    let mut station = Station::new(locator.clone(), tracker)?.with_cpu_threads()?;
    let mut scene = SceneGen::new(&locator.build()?, 12_000.0, 42)
        .depth_noise(30.0)
        .robot(SyntheticRobot {
            center: Point3::new(-2000.0, 500.0, 9000.0),
            size: Vector3::new(600.0, 450.0, 600.0),
            velocity: Vector3::new(800.0, 0.0, -200.0),
            label: 1,
        })
        .robot(SyntheticRobot {
            center: Point3::new(2500.0, 400.0, 10_000.0),
            size: Vector3::new(600.0, 450.0, 600.0),
            velocity: Vector3::new(-600.0, 0.0, 100.0),
            label: 7,
        });
    let (mut sink, receiver) = ChannelSink::unbounded();

    let t0 = Instant::now();
    station.process(&scene.backdrop(), &[], t0);

    for n in 1..=30u64 {
        let frame = scene.next().unwrap();
        let timestamp = t0 + Duration::from_millis(100 * n);
        let robots = station.process(&frame.cloud, &frame.detections, timestamp);
        station.publish(&robots, &mut sink)?;

        for (robot, expected) in robots.iter().zip(frame.expected.iter()) {
            let error = robot
                .location()
                .map(|l| (l - expected).norm())
                .unwrap_or(f32::NAN);
            eprintln!("Frame {:>2}: {}, error {:.1}", n, robot, error);
        }
    }

    let reports = receiver.try_iter().map(|r| r.len()).sum::<usize>();
    eprintln!("Reports sent: {}", reports);
    Ok(())
}
