//! Fixed 32-band layout over the 256 one-sided bins of a 512-point FFT.

/// Bands published per analysis pass.
pub const NUM_BANDS: usize = 32;

/// Bin boundaries: band `i` averages bins `BAND_EDGES[i]..BAND_EDGES[i + 1]`.
///
/// Roughly logarithmic; DC (bin 0) is excluded and the last band ends at the
/// Nyquist bin.
pub const BAND_EDGES: [usize; NUM_BANDS + 1] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 22, 25, 29, 33, 38, 44, 50, 58, 67, 77, 89,
    102, 118, 136, 157, 181, 209, 256,
];

/// Static per-band gain, highest in the middle of the range.
pub const BAND_GAINS: [f32; NUM_BANDS] = [
    0.58, 0.60, 0.62, 0.65, 0.69, 0.73, 0.79, 0.86, 0.94, 1.02, 1.11, 1.19, 1.27, 1.33, 1.37, 1.40,
    1.40, 1.37, 1.33, 1.27, 1.19, 1.11, 1.02, 0.94, 0.86, 0.79, 0.73, 0.69, 0.65, 0.62, 0.60, 0.58,
];

/// Mean magnitude of each band's bins, scaled by its gain.
///
/// Bins past the end of `magnitudes` count as zero.
pub(crate) fn band_levels(magnitudes: &[f32], out: &mut [f32; NUM_BANDS]) {
    for (band, level) in out.iter_mut().enumerate() {
        let (lo, hi) = (BAND_EDGES[band], BAND_EDGES[band + 1]);
        let sum: f32 = magnitudes.iter().take(hi).skip(lo).sum();
        *level = sum / (hi - lo) as f32 * BAND_GAINS[band];
    }
}
