//! Deterministic random draws
//!
//! Each concern (weather, disasters, missions) reads from its own named
//! ChaCha stream, so reseeding with the same value replays a campaign and
//! extra draws in one stream never shift another. Stream positions are not
//! saved with a campaign: a process that resumes a stored snapshot starts
//! every stream again from its first draw.

use std::collections::{HashMap, VecDeque};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const WEATHER_STREAM: &str = "weather";
pub const DISASTER_STREAM: &str = "disaster";
pub const MISSION_STREAM: &str = "mission";

/// Source of uniform draws in `[0, 1)`.
pub trait DrawSource {
    fn draw(&mut self, stream: &str) -> f64;
}

/// Seeded named streams.
pub struct RngManager {
    master_seed: u64,
    streams: HashMap<String, ChaCha8Rng>,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self {
            master_seed: seed,
            streams: HashMap::new(),
        }
    }

    /// Seed from the system clock; used when no seed is configured.
    pub fn from_entropy() -> Self {
        Self::new(rand::thread_rng().gen())
    }

    pub fn seed(&self) -> u64 {
        self.master_seed
    }

    pub fn stream(&mut self, name: &str) -> &mut ChaCha8Rng {
        let seed = derive_seed(self.master_seed, name);
        self.streams
            .entry(name.to_string())
            .or_insert_with(|| ChaCha8Rng::seed_from_u64(seed))
    }
}

impl Default for RngManager {
    fn default() -> Self {
        Self::new(42)
    }
}

impl DrawSource for RngManager {
    fn draw(&mut self, stream: &str) -> f64 {
        self.stream(stream).gen::<f64>()
    }
}

/// Mix the master seed with the stream name.
fn derive_seed(master: u64, name: &str) -> u64 {
    let mut seed = master;
    for byte in name.bytes() {
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        seed ^= u64::from(byte).wrapping_mul(1103515245);
    }
    seed.wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407)
}

/// Pre-recorded draws, handed out in order regardless of stream. Once the
/// script runs dry every further draw returns `fallback`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDraws {
    queue: VecDeque<f64>,
    fallback: f64,
}

impl ScriptedDraws {
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self {
            queue: draws.into_iter().collect(),
            fallback: 0.0,
        }
    }

    pub fn constant(value: f64) -> Self {
        Self {
            queue: VecDeque::new(),
            fallback: value,
        }
    }

    pub fn push(&mut self, draw: f64) {
        self.queue.push_back(draw);
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl DrawSource for ScriptedDraws {
    fn draw(&mut self, _stream: &str) -> f64 {
        self.queue.pop_front().unwrap_or(self.fallback)
    }
}

impl<D: DrawSource + ?Sized> DrawSource for Box<D> {
    fn draw(&mut self, stream: &str) -> f64 {
        (**self).draw(stream)
    }
}
