use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

use super::impulse::leading_silence;

pub const SHORT_BLOCK: usize = 256;
pub const LONG_BLOCK: usize = 1024;

/// Partition size for a response of `ir_frames`: short blocks up to two
/// seconds, long blocks beyond.
pub fn block_size_for(ir_frames: usize, sample_rate: u32) -> usize {
    if ir_frames <= 2 * sample_rate as usize {
        SHORT_BLOCK
    } else {
        LONG_BLOCK
    }
}

struct ChannelState {
    response: usize,
    /// `[previous block | current block]`
    window: Vec<f32>,
    /// Spectra of the most recent input windows, newest at `head`.
    history: Vec<Vec<Complex<f32>>>,
    head: usize,
    ready: Vec<f32>,
}

/// Uniformly partitioned overlap-save convolution.
///
/// Each input frame is buffered until a block of `block` frames is complete,
/// so output lags by one block. Leading silence in the response (the reverb
/// pre-delay) is trimmed by up to one block to cancel that lag.
pub struct Convolver {
    block: usize,
    trimmed: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    /// Per response channel, one spectrum per partition.
    responses: Vec<Vec<Vec<Complex<f32>>>>,
    channels: Vec<ChannelState>,
    position: usize,
    work: Vec<Complex<f32>>,
    accum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl Convolver {
    /// `response` holds one or more equal-length channels; output channel `c`
    /// uses response channel `c`, or the last one if there are fewer.
    pub fn new(response: &[Vec<f32>], channels: usize, block: usize) -> Self {
        let size = block * 2;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let ifft = planner.plan_fft_inverse(size);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());
        let mut scratch = vec![Complex::new(0.0, 0.0); scratch_len];

        let trimmed = leading_silence(response).min(block);
        let len = response.first().map_or(0, Vec::len).saturating_sub(trimmed);
        let partitions = len.div_ceil(block).max(1);

        let responses: Vec<Vec<Vec<Complex<f32>>>> = response
            .iter()
            .map(|channel| {
                let taps = channel.get(trimmed..).unwrap_or(&[]);
                (0..partitions)
                    .map(|p| {
                        let mut spectrum = vec![Complex::new(0.0, 0.0); size];
                        let start = (p * block).min(taps.len());
                        let end = ((p + 1) * block).min(taps.len());
                        for (bin, &tap) in spectrum.iter_mut().zip(&taps[start..end]) {
                            bin.re = tap;
                        }
                        fft.process_with_scratch(&mut spectrum, &mut scratch);
                        spectrum
                    })
                    .collect()
            })
            .collect();

        let response_count = responses.len().max(1);
        let states = (0..channels)
            .map(|c| ChannelState {
                response: c.min(response_count - 1),
                window: vec![0.0; size],
                history: vec![vec![Complex::new(0.0, 0.0); size]; partitions],
                head: 0,
                ready: vec![0.0; block],
            })
            .collect();

        Self {
            block,
            trimmed,
            fft,
            ifft,
            responses,
            channels: states,
            position: 0,
            work: vec![Complex::new(0.0, 0.0); size],
            accum: vec![Complex::new(0.0, 0.0); size],
            scratch,
        }
    }

    /// Feed one frame and receive the frame one block later.
    #[inline]
    pub fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
        let block = self.block;
        let pos = self.position;
        for (c, state) in self.channels.iter_mut().enumerate() {
            state.window[block + pos] = input[c];
            output[c] = state.ready[pos];
        }
        self.position += 1;
        if self.position == block {
            self.position = 0;
            self.process_block();
        }
    }

    fn process_block(&mut self) {
        let Self {
            block,
            fft,
            ifft,
            responses,
            channels,
            work,
            accum,
            scratch,
            ..
        } = self;
        let block = *block;
        let size = block * 2;
        let norm = 1.0 / size as f32;

        for state in channels.iter_mut() {
            for (bin, &sample) in work.iter_mut().zip(&state.window) {
                *bin = Complex::new(sample, 0.0);
            }
            fft.process_with_scratch(work, scratch);

            let partitions = state.history.len();
            state.head = (state.head + partitions - 1) % partitions;
            state.history[state.head].copy_from_slice(work);

            accum.fill(Complex::new(0.0, 0.0));
            if let Some(response) = responses.get(state.response) {
                for (p, spectrum) in response.iter().enumerate() {
                    let input = &state.history[(state.head + p) % partitions];
                    for ((acc, x), h) in accum.iter_mut().zip(input).zip(spectrum) {
                        *acc += x * h;
                    }
                }
            }
            ifft.process_with_scratch(accum, scratch);

            for (out, bin) in state.ready.iter_mut().zip(&accum[block..]) {
                *out = bin.re * norm;
            }
            state.window.copy_within(block.., 0);
        }
    }

    /// Frames of delay added on top of the trimmed response.
    pub fn latency(&self) -> usize {
        self.block - self.trimmed
    }

    pub fn block_size(&self) -> usize {
        self.block
    }
}
