use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::shared::frame::Frame;

/// Set `count` randomly chosen pixels to white on every channel.
///
/// The same `seed` always hits the same pixels. Positions may repeat.
pub fn add_salt_noise(frame: &mut Frame, count: usize, seed: u64) {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let channels = frame.channels() as usize;
    if width == 0 || height == 0 {
        return;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let data = frame.data_mut();
    for _ in 0..count {
        let x = rng.random_range(0..width);
        let y = rng.random_range(0..height);
        let offset = (y * width + x) * channels;
        data[offset..offset + channels].fill(255);
    }
}
