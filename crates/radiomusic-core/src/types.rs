//! Common types for RadioMusic
//!
//! Fundamental constants and the stereo frame type shared by the engine,
//! the controller and the host binary.

/// Maximum decoded size of one bank (2 GiB of f32 samples)
pub const MAX_BANK_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Maximum number of banks produced by a scan
pub const MAX_NUM_BANKS: usize = 16;

/// Maximum directory depth below the root that is scanned
pub const MAX_DIR_DEPTH: usize = 1;

/// Samples generated per engine block
pub const BLOCK_SIZE: usize = 16;

/// Output level of a full-scale sample (modular ±5V convention)
pub const OUTPUT_HEADROOM: f32 = 5.0;

/// Sample rate assumed for headerless raw PCM files
pub const RAW_SAMPLE_RATE: u32 = 44100;

/// Number of indicator lights (reset + 4 meter segments)
pub const NUM_LIGHTS: usize = 5;

/// Index of the reset light in [`ModuleOutputs::lights`](crate::ModuleOutputs)
pub const RESET_LIGHT: usize = 0;

/// Index of the first meter / bank-display light
pub const LED_0_LIGHT: usize = 1;

/// Audio sample type
pub type Sample = f32;

/// One output frame (left and right channel)
///
/// Uses `#[repr(C)]` so a slice of frames has the same layout as an
/// interleaved stereo `f32` buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoFrame {
    pub left: Sample,
    pub right: Sample,
}

impl StereoFrame {
    /// Create a new stereo frame
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent frame
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Create a mono frame (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Scale both channels by a factor
    #[inline]
    pub fn scale(&self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }

    /// Average of both channels
    #[inline]
    pub fn mid(&self) -> Sample {
        (self.left + self.right) * 0.5
    }
}

impl std::ops::Add for StereoFrame {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoFrame {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}
