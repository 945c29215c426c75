//! Automatic gain control over band levels.

use super::bands::NUM_BANDS;

/// Levels at or below the floor render as zero height.
pub const AGC_FLOOR: f32 = 1_500.0;
/// Per-pass ceiling decay when the spectrum gets quieter.
pub const AGC_DECAY: f32 = 0.99;
/// The ceiling tracks the mean of this many loudest bands.
pub const AGC_TOP_N: usize = 5;

/// Tallest height a band can reach.
pub const MAX_HEIGHT: u8 = 15;

const HEIGHT_GAMMA: f32 = 0.9;

/// Running ceiling that snaps up to loud passes and decays on quiet ones.
///
/// `ceiling >= floor` holds after every update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgcState {
    ceiling: f32,
    floor: f32,
}

impl Default for AgcState {
    fn default() -> Self {
        Self::new(AGC_FLOOR)
    }
}

impl AgcState {
    pub fn new(floor: f32) -> Self {
        Self {
            ceiling: floor,
            floor,
        }
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    pub fn floor(&self) -> f32 {
        self.floor
    }

    /// Span used to normalize levels; never below 1.
    pub fn dynamic_range(&self) -> f32 {
        (self.ceiling - self.floor).max(1.0)
    }

    /// Fold one pass of band levels into the ceiling.
    pub fn update(&mut self, levels: &[f32; NUM_BANDS]) {
        let loudest = top_n_mean(levels, AGC_TOP_N);
        self.ceiling = if loudest > self.ceiling {
            loudest
        } else {
            self.ceiling * AGC_DECAY
        };
        self.ceiling = self.ceiling.max(self.floor);
    }

    /// Map a band level onto `0..=MAX_HEIGHT`.
    pub fn height(&self, level: f32) -> u8 {
        let normalized = ((level - self.floor) / self.dynamic_range()).max(0.0);
        let scaled = (normalized.powf(HEIGHT_GAMMA) * MAX_HEIGHT as f32).floor();
        if scaled.is_nan() {
            return 0;
        }
        scaled.clamp(0.0, MAX_HEIGHT as f32) as u8
    }
}

fn top_n_mean(levels: &[f32; NUM_BANDS], n: usize) -> f32 {
    let mut sorted = *levels;
    sorted.sort_unstable_by(|a, b| b.total_cmp(a));
    let n = n.clamp(1, NUM_BANDS);
    sorted[..n].iter().sum::<f32>() / n as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_floor() {
        let agc = AgcState::default();
        assert_eq!(agc.ceiling(), AGC_FLOOR);
        assert_eq!(agc.dynamic_range(), 1.0);
    }

    #[test]
    fn ceiling_snaps_to_top_five_mean() {
        let mut agc = AgcState::default();
        let mut levels = [0.0; NUM_BANDS];
        levels[..5].copy_from_slice(&[10_000.0, 20_000.0, 30_000.0, 40_000.0, 50_000.0]);
        levels[5] = 1.0;
        agc.update(&levels);
        assert_eq!(agc.ceiling(), 30_000.0);
    }

    #[test]
    fn quiet_pass_decays_by_one_percent() {
        let mut agc = AgcState::default();
        agc.update(&[100_000.0; NUM_BANDS]);
        agc.update(&[0.0; NUM_BANDS]);
        assert!((agc.ceiling() - 99_000.0).abs() < 0.01);
    }

    #[test]
    fn ceiling_never_drops_below_floor() {
        let mut agc = AgcState::default();
        agc.update(&[1_510.0; NUM_BANDS]);
        for _ in 0..10 {
            agc.update(&[0.0; NUM_BANDS]);
        }
        assert_eq!(agc.ceiling(), AGC_FLOOR);
    }

    #[test]
    fn heights_stay_in_range() {
        let mut agc = AgcState::default();
        agc.update(&[10_000.0; NUM_BANDS]);
        for level in [f32::MIN, -1.0, 0.0, AGC_FLOOR, 5_000.0, 10_000.0, 1e12, f32::MAX, f32::NAN] {
            assert!(agc.height(level) <= MAX_HEIGHT, "level {level}");
        }
        assert_eq!(agc.height(0.0), 0);
        assert_eq!(agc.height(10_000.0), MAX_HEIGHT);
        assert_eq!(agc.height(f32::NAN), 0);
    }

    #[test]
    fn height_curve_truncates() {
        let mut agc = AgcState::default();
        agc.update(&[11_500.0; NUM_BANDS]);
        // normalized 0.5 -> 0.5^0.9 * 15 = 8.04
        assert_eq!(agc.height(6_500.0), 8);
    }
}
