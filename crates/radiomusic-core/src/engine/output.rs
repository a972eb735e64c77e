//! Block resampling and the output frame queue
//!
//! The engine renders [`BLOCK_SIZE`] frames at the buffer's native rate.
//! This stage converts each block to the host rate and queues the result;
//! the host pulls one frame per tick and a new block is rendered only when
//! the queue has run dry.

use rtrb::{Consumer, Producer, RingBuffer};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::error::EngineError;
use crate::types::{StereoFrame, BLOCK_SIZE};

/// Capacity of the output queue in frames
const QUEUE_CAPACITY: usize = 1024;

/// Largest supported ratio between host and buffer rate (either direction)
const MAX_RATIO: f64 = 8.0;

pub struct OutputStage {
    resampler: FastFixedIn<f32>,
    ratio: f64,
    input: [Vec<f32>; 2],
    output: [Vec<f32>; 2],
    producer: Producer<StereoFrame>,
    consumer: Consumer<StereoFrame>,
}

impl OutputStage {
    /// Allocate the resampler and all buffers up front
    pub fn new() -> Result<Self, EngineError> {
        let resampler =
            FastFixedIn::<f32>::new(1.0, MAX_RATIO, PolynomialDegree::Linear, BLOCK_SIZE, 2)?;
        let out_len = resampler.output_frames_max();
        let (producer, consumer) = RingBuffer::new(QUEUE_CAPACITY);

        Ok(Self {
            resampler,
            ratio: 1.0,
            input: [vec![0.0; BLOCK_SIZE], vec![0.0; BLOCK_SIZE]],
            output: [vec![0.0; out_len], vec![0.0; out_len]],
            producer,
            consumer,
        })
    }

    /// Queue is empty and a new block should be rendered
    #[inline]
    pub fn needs_block(&self) -> bool {
        self.consumer.is_empty()
    }

    /// Resample a block from `source_rate` to `host_rate` and queue it
    pub fn push_block(&mut self, block: &[StereoFrame; BLOCK_SIZE], source_rate: u32, host_rate: f32) {
        let ratio = if source_rate == 0 {
            1.0
        } else {
            (host_rate as f64 / source_rate as f64).clamp(1.0 / MAX_RATIO, MAX_RATIO)
        };
        if (ratio - self.ratio).abs() > f64::EPSILON
            && self.resampler.set_resample_ratio(ratio, false).is_ok()
        {
            self.ratio = ratio;
        }

        for (i, frame) in block.iter().enumerate() {
            self.input[0][i] = frame.left;
            self.input[1][i] = frame.right;
        }

        let produced = match self
            .resampler
            .process_into_buffer(&self.input[..], &mut self.output[..], None)
        {
            Ok((_, produced)) => produced,
            Err(_) => return,
        };

        for i in 0..produced {
            let frame = StereoFrame::new(self.output[0][i], self.output[1][i]);
            if self.producer.push(frame).is_err() {
                break;
            }
        }
    }

    /// Next queued frame
    #[inline]
    pub fn pop(&mut self) -> Option<StereoFrame> {
        self.consumer.pop().ok()
    }

    /// Drop queued frames and resampler history
    pub fn clear(&mut self) {
        while self.consumer.pop().is_ok() {}
        self.resampler.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(stage: &mut OutputStage) -> Vec<StereoFrame> {
        std::iter::from_fn(|| stage.pop()).collect()
    }

    #[test]
    fn test_unity_ratio_settles_to_input() {
        let mut stage = OutputStage::new().unwrap();
        let block = [StereoFrame::new(0.5, -0.5); BLOCK_SIZE];

        let mut frames = Vec::new();
        for _ in 0..8 {
            stage.push_block(&block, 48000, 48000.0);
            frames.extend(drain(&mut stage));
        }

        assert!(frames.len() >= 6 * BLOCK_SIZE);
        let last = frames.last().unwrap();
        assert!((last.left - 0.5).abs() < 1e-4);
        assert!((last.right + 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_upsampling_produces_more_frames() {
        let mut stage = OutputStage::new().unwrap();
        let block = [StereoFrame::mono(0.1); BLOCK_SIZE];

        let mut count = 0;
        for _ in 0..32 {
            stage.push_block(&block, 22050, 44100.0);
            count += drain(&mut stage).len();
        }

        // About twice the input, less the resampler's startup delay
        assert!(count > 32 * BLOCK_SIZE * 3 / 2, "{} frames", count);
    }

    #[test]
    fn test_clear_empties_queue() {
        let mut stage = OutputStage::new().unwrap();
        stage.push_block(&[StereoFrame::mono(1.0); BLOCK_SIZE], 44100, 44100.0);
        stage.push_block(&[StereoFrame::mono(1.0); BLOCK_SIZE], 44100, 44100.0);
        stage.clear();
        assert!(stage.needs_block());
    }
}
