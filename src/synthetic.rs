use crate::locate::Locator;
use crate::robot::Detection;
use crate::station::DetectionGroup;
use crate::utils::depth_image::DepthImage;
use crate::utils::transform::CoordinateTransformer;
use itertools::iproduct;
use nalgebra::{Point3, Vector3};
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Box-shaped robot moving with a constant world velocity
///
#[derive(Debug, Clone)]
pub struct SyntheticRobot {
    pub center: Point3<f32>,
    pub size: Vector3<f32>,
    pub velocity: Vector3<f32>,
    pub label: usize,
}

/// One generated frame
///
#[derive(Debug, Clone)]
pub struct SyntheticFrame {
    pub cloud: Vec<Point3<f32>>,
    pub detections: Vec<DetectionGroup>,
    /// World position the locator is expected to report for every visible robot
    pub expected: Vec<Point3<f32>>,
}

/// Scene generator: robots in front of a backdrop at a constant camera depth.
///
/// Every frame holds one sensor point per zoomed pixel, so the cloud lands exactly on the
/// locator image. Robots are rendered as their projected bounding rectangle at the depth of
/// their center, the detector output is that rectangle plus one armor carrying the label.
///
pub struct SceneGen {
    transformer: CoordinateTransformer,
    width: usize,
    height: usize,
    backdrop_depth: f32,
    frame_interval: f32,
    robots: Vec<SyntheticRobot>,
    gen: StdRng,
    depth_noise: Uniform<f32>,
    confidence: Uniform<f32>,
    image: DepthImage,
}

impl SceneGen {
    pub fn new(locator: &Locator, backdrop_depth: f32, seed: u64) -> Self {
        let (width, height) = locator.size();
        Self {
            transformer: locator.transformer().clone(),
            width,
            height,
            backdrop_depth,
            frame_interval: 0.1,
            robots: Vec::new(),
            gen: StdRng::seed_from_u64(seed),
            depth_noise: Uniform::new_inclusive(0.0, 0.0),
            confidence: Uniform::new_inclusive(0.7, 0.95),
            image: DepthImage::new(width, height),
        }
    }

    pub fn robot(mut self, robot: SyntheticRobot) -> Self {
        self.robots.push(robot);
        self
    }

    /// Uniform depth noise amplitude added to every point
    ///
    pub fn depth_noise(mut self, amplitude: f32) -> Self {
        self.depth_noise = Uniform::new_inclusive(-amplitude.abs(), amplitude.abs());
        self
    }

    /// Seconds between frames
    ///
    pub fn frame_interval(mut self, seconds: f32) -> Self {
        self.frame_interval = seconds;
        self
    }

    pub fn robots(&self) -> &[SyntheticRobot] {
        &self.robots
    }

    /// Cloud of the empty scene
    ///
    pub fn backdrop(&mut self) -> Vec<Point3<f32>> {
        self.image.as_mut_slice().fill(self.backdrop_depth);
        self.cloud()
    }

    fn cloud(&mut self) -> Vec<Point3<f32>> {
        let noise = &self.depth_noise;
        let gen = &mut self.gen;
        let transformer = &self.transformer;
        self.image
            .nonzero()
            .map(|(u, v, d)| {
                let uvd = Point3::new(u as f32 + 0.5, v as f32 + 0.5, d + gen.sample(noise));
                transformer.image_to_sensor(&uvd)
            })
            .collect()
    }

    /// Zoomed pixel ranges and depth covered by the robot, `None` when it is out of view
    ///
    fn render(&self, robot: &SyntheticRobot) -> Option<(usize, usize, usize, usize, f32)> {
        let half = robot.size / 2.0;
        let depth = self
            .transformer
            .sensor_to_image(&self.transformer.world_to_sensor(&robot.center))
            .z;
        if !(depth > 0.0) {
            return None;
        }
        let (mut u0, mut v0, mut u1, mut v1) = (f32::MAX, f32::MAX, f32::MIN, f32::MIN);
        for (sx, sy, sz) in iproduct!([-1.0, 1.0], [-1.0, 1.0], [-1.0, 1.0]) {
            let corner = robot.center + Vector3::new(sx * half.x, sy * half.y, sz * half.z);
            let uvd = self
                .transformer
                .sensor_to_image(&self.transformer.world_to_sensor(&corner));
            if !(uvd.z > 0.0) {
                return None;
            }
            u0 = u0.min(uvd.x);
            v0 = v0.min(uvd.y);
            u1 = u1.max(uvd.x);
            v1 = v1.max(uvd.y);
        }
        let clip = |x: f32, limit: usize| x.max(0.0).min(limit as f32) as usize;
        let (u0, u1) = (clip(u0.floor(), self.width), clip(u1.ceil(), self.width));
        let (v0, v1) = (clip(v0.floor(), self.height), clip(v1.ceil(), self.height));
        if u0 >= u1 || v0 >= v1 {
            return None;
        }
        Some((u0, u1, v0, v1, depth))
    }
}

impl Iterator for SceneGen {
    type Item = SyntheticFrame;

    fn next(&mut self) -> Option<Self::Item> {
        self.image.as_mut_slice().fill(self.backdrop_depth);
        let zoom = self.transformer.zoom_factor();
        let mut detections = Vec::with_capacity(self.robots.len());
        let mut expected = Vec::with_capacity(self.robots.len());

        for i in 0..self.robots.len() {
            let robot = self.robots[i].clone();
            if let Some((u0, u1, v0, v1, depth)) = self.render(&robot) {
                for (u, v) in iproduct!(u0..u1, v0..v1) {
                    self.image.set(u, v, depth);
                }
                let center = Point3::new((u0 + u1) as f32 / 2.0, (v0 + v1) as f32 / 2.0, depth);
                expected.push(
                    self.transformer
                        .sensor_to_world(&self.transformer.image_to_sensor(&center)),
                );

                let (w, h) = ((u1 - u0) as f32 / zoom, (v1 - v0) as f32 / zoom);
                let car = Detection::new(u0 as f32 / zoom, v0 as f32 / zoom, w, h, 0, 0.9);
                let armor = Detection::new(
                    w * 0.3,
                    h * 0.6,
                    w * 0.4,
                    h * 0.3,
                    robot.label,
                    self.gen.sample(&self.confidence),
                );
                detections.push((car, vec![armor]));
            }
            self.robots[i].center += robot.velocity * self.frame_interval;
        }

        Some(SyntheticFrame {
            cloud: self.cloud(),
            detections,
            expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::locate::options::LocatorOptions;
    use crate::station::Station;
    use crate::synthetic::{SceneGen, SyntheticRobot};
    use crate::tracker::options::TrackerOptions;
    use nalgebra::{Point3, Vector3};
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    fn locator_options() -> LocatorOptions {
        LocatorOptions::default()
            .image_size(1280, 1024)
            .zoom_factor(0.25)
    }

    fn scene(seed: u64) -> SceneGen {
        let locator = locator_options().build().unwrap();
        SceneGen::new(&locator, 10_000.0, seed)
            .depth_noise(20.0)
            .robot(SyntheticRobot {
                center: Point3::new(-1000.0, 0.0, 7000.0),
                size: Vector3::new(500.0, 400.0, 500.0),
                velocity: Vector3::new(500.0, 0.0, 0.0),
                label: 1,
            })
            .robot(SyntheticRobot {
                center: Point3::new(1500.0, 300.0, 7500.0),
                size: Vector3::new(500.0, 400.0, 500.0),
                velocity: Vector3::new(-300.0, 0.0, 200.0),
                label: 2,
            })
    }

    #[test]
    fn frames_cover_the_image() {
        let mut gen = scene(1);
        assert_eq!(gen.backdrop().len(), 320 * 256);
        let frame = gen.next().unwrap();
        assert_eq!(frame.cloud.len(), 320 * 256);
        assert_eq!(frame.detections.len(), 2);
        assert_eq!(frame.expected.len(), 2);
        assert_eq!(frame.detections[0].1[0].label, 1);
        assert!(gen.robots()[0].center.x > -1000.0);
    }

    #[test]
    fn same_seed_same_frames() {
        let a = scene(5).next().unwrap();
        let b = scene(5).next().unwrap();
        assert_eq!(a.cloud, b.cloud);
    }

    #[test]
    fn station_tracks_synthetic_robots() {
        let mut gen = scene(3);
        let mut station = Station::new(
            locator_options(),
            TrackerOptions::default().class_num(4),
        )
        .unwrap();
        let t0 = Instant::now();
        station.process(&gen.backdrop(), &[], t0);

        let mut ids: HashMap<usize, u64> = HashMap::new();
        for n in 1..=15 {
            let frame = gen.next().unwrap();
            let robots = station.process(
                &frame.cloud,
                &frame.detections,
                t0 + Duration::from_millis(100 * n),
            );
            for (robot, expected) in robots.iter().zip(frame.expected.iter()) {
                let label = robot.label().unwrap();
                let id = robot.track_id().unwrap();
                assert_eq!(*ids.entry(label).or_insert(id), id);
                if n > 5 {
                    let error = (robot.location().unwrap() - expected).norm();
                    assert!(error < 250.0, "frame {n}, label {label}: error {error}");
                }
            }
        }
        assert_eq!(ids.len(), 2);
        assert_eq!(station.tracker().tracks().len(), 2);
        assert!(station.tracker().tracks().iter().all(|t| t.is_confirmed()));
    }
}
