//! Animated icon frame sets.

use std::sync::Arc;

use super::Image;

/// PAL field rate used for frame-count based delays.
pub const PAL_FPS: u16 = 50;

/// Display time of one sequence step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimDelay {
    /// Delay in `1 / denominator` second units.
    pub numerator: u16,
    pub denominator: u16,
    /// The same delay in milliseconds.
    pub ms: u32,
}

impl AnimDelay {
    /// Delay of `frames` PAL fields.
    pub fn pal_frames(frames: u16) -> Self {
        Self {
            numerator: frames,
            denominator: PAL_FPS,
            ms: frames as u32 * 1000 / PAL_FPS as u32,
        }
    }
}

/// Decoded frames of an animated icon plus its playback sequence.
#[derive(Debug, Clone, Default)]
pub struct IconAnimData {
    pub frames: Vec<Arc<Image>>,
    /// Frame index shown at each sequence step; loops at the end.
    pub seq_index: Vec<u8>,
    /// Delay for each sequence step.
    pub delays: Vec<AnimDelay>,
}

impl IconAnimData {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn seq_count(&self) -> usize {
        self.seq_index.len()
    }
}
