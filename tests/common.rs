#![allow(dead_code)]

use std::f64::consts::PI;
use std::process::Command;

use serde::Deserialize;
use voronota_contacts::Ball;

#[derive(Deserialize)]
pub struct Contact {
    pub id_a: usize,
    pub id_b: Option<usize>,
    pub area: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct ContactsOutput {
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub volumes: Vec<f64>,
    pub total_contact_area: f64,
    pub total_solvent_area: f64,
    pub total_volume: f64,
}

pub fn binary_command() -> Command {
    Command::new(env!("CARGO_BIN_EXE_voronota-contacts"))
}

pub fn parse_json(output: &str) -> ContactsOutput {
    serde_json::from_str(output).expect("failed to parse JSON output")
}

pub fn assert_approx(name: &str, actual: f64, expected: f64, tolerance: f64) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "{name}: expected {expected}, got {actual} (diff {diff} > {tolerance})"
    );
}

/// Deterministic xorshift64 generator
pub struct XorShift(u64);

impl XorShift {
    pub const fn new(seed: u64) -> Self {
        Self(if seed == 0 { 0x9e37_79b9_7f4a_7c15 } else { seed })
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform in `[lo, hi)`
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        let unit = (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        lo + (hi - lo) * unit
    }
}

/// `count` non-overlapping balls with radii in `[1.0, 1.8)` inside a cube of side `size`
pub fn random_packing(count: usize, size: f64, seed: u64) -> Vec<Ball> {
    let mut rng = XorShift::new(seed);
    let mut balls: Vec<Ball> = Vec::with_capacity(count);
    while balls.len() < count {
        let r = rng.uniform(1.0, 1.8);
        let candidate = Ball::new(
            rng.uniform(0.0, size),
            rng.uniform(0.0, size),
            rng.uniform(0.0, size),
            r,
        );
        let free = balls.iter().all(|b| {
            let (dx, dy, dz) = (b.x - candidate.x, b.y - candidate.y, b.z - candidate.z);
            let d = (dx * dx + dy * dy + dz * dz).sqrt();
            d > b.r + candidate.r
        });
        if free {
            balls.push(candidate);
        }
    }
    balls
}

/// Four mutually touching balls of radius 1
pub fn tetrahedral_cluster() -> Vec<Ball> {
    let h = 3.0_f64.sqrt();
    vec![
        Ball::new(0.0, 0.0, 0.0, 1.0),
        Ball::new(2.0, 0.0, 0.0, 1.0),
        Ball::new(1.0, h, 0.0, 1.0),
        Ball::new(1.0, h / 3.0, 2.0 * (2.0_f64 / 3.0).sqrt(), 1.0),
    ]
}

/// Solvent accessible area of ball `id` by sampling its probe-expanded
/// surface on a Fibonacci lattice.
pub fn sampled_accessible_area(balls: &[Ball], id: usize, probe: f64, samples: usize) -> f64 {
    let a = &balls[id];
    let big_r = a.r + probe;
    let golden = PI * (3.0 - 5.0_f64.sqrt());
    let mut free = 0usize;
    for i in 0..samples {
        let z = 1.0 - 2.0 * (i as f64 + 0.5) / samples as f64;
        let rho = (1.0 - z * z).sqrt();
        let phi = golden * i as f64;
        let p = [
            a.x + big_r * rho * phi.cos(),
            a.y + big_r * rho * phi.sin(),
            a.z + big_r * z,
        ];
        let covered = balls.iter().enumerate().any(|(j, b)| {
            j != id && {
                let d2 = (p[0] - b.x).powi(2) + (p[1] - b.y).powi(2) + (p[2] - b.z).powi(2);
                d2 < (b.r + probe).powi(2)
            }
        });
        if !covered {
            free += 1;
        }
    }
    4.0 * PI * big_r * big_r * free as f64 / samples as f64
}
