use basedrop::Shared;
use echo_transport::SampleBuffer;

/// Plays a shared buffer at a variable rate with linear interpolation,
/// mapping its channels onto the graph's channel count.
pub struct SourceVoice {
    buffer: Shared<SampleBuffer>,
    /// Read position in source frames.
    position: f64,
    /// Source frames per graph frame at rate 1.0.
    base_step: f64,
    rate: f64,
    playing: bool,
    looping: bool,
}

impl SourceVoice {
    pub fn new(buffer: Shared<SampleBuffer>, graph_sample_rate: u32, looping: bool) -> Self {
        let base_step = buffer.sample_rate() as f64 / graph_sample_rate as f64;
        Self {
            buffer,
            position: 0.0,
            base_step,
            rate: 1.0,
            playing: false,
            looping,
        }
    }

    pub fn start_at(&mut self, offset_secs: f64) {
        let frames = self.buffer.frames() as f64;
        self.position = (offset_secs.max(0.0) * self.buffer.sample_rate() as f64).min(frames);
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn position_secs(&self) -> f64 {
        self.position / self.buffer.sample_rate() as f64
    }

    fn read(&self, channel: usize) -> f32 {
        let frames = self.buffer.frames();
        let index = self.position.floor();
        let frac = (self.position - index) as f32;
        let i0 = index as usize;
        let i1 = if self.looping && i0 + 1 >= frames {
            0
        } else {
            i0 + 1
        };
        let a = self.buffer.sample(channel, i0);
        let b = self.buffer.sample(channel, i1);
        a + (b - a) * frac
    }

    /// Write the next frame into `out` (one sample per graph channel).
    /// Returns false once a non-looping voice has run off the end.
    #[inline]
    pub fn next_frame(&mut self, out: &mut [f32]) -> bool {
        let frames = self.buffer.frames();
        if !self.playing || frames == 0 {
            out.fill(0.0);
            return self.playing;
        }
        if self.position >= frames as f64 {
            if self.looping {
                self.position %= frames as f64;
            } else {
                self.playing = false;
                out.fill(0.0);
                return false;
            }
        }

        match (self.buffer.num_channels(), out.len()) {
            (1, _) => {
                let s = self.read(0);
                out.fill(s);
            }
            (_, 1) => out[0] = 0.5 * (self.read(0) + self.read(1)),
            _ => {
                for (ch, sample) in out.iter_mut().enumerate() {
                    *sample = self.read(ch.min(1));
                }
            }
        }

        self.position += self.base_step * self.rate;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Collector;

    fn voice(collector: &Collector, channels: Vec<Vec<f32>>, sr: u32, looping: bool) -> SourceVoice {
        let buffer = SampleBuffer::new(channels, sr);
        SourceVoice::new(Shared::new(&collector.handle(), buffer), sr, looping)
    }

    #[test]
    fn silent_until_started() {
        let collector = Collector::new();
        let mut v = voice(&collector, vec![vec![1.0; 8]], 8000, false);
        let mut out = [9.0; 2];
        v.next_frame(&mut out);
        assert_eq!(out, [0.0, 0.0]);
    }

    #[test]
    fn mono_is_duplicated_to_stereo() {
        let collector = Collector::new();
        let mut v = voice(&collector, vec![vec![0.25, 0.5]], 8000, false);
        v.start_at(0.0);
        let mut out = [0.0; 2];
        v.next_frame(&mut out);
        assert_eq!(out, [0.25, 0.25]);
    }

    #[test]
    fn stereo_downmixes_to_mono() {
        let collector = Collector::new();
        let mut v = voice(&collector, vec![vec![1.0; 4], vec![0.0; 4]], 8000, false);
        v.start_at(0.0);
        let mut out = [0.0; 1];
        v.next_frame(&mut out);
        assert_eq!(out, [0.5]);
    }

    #[test]
    fn rate_interpolates_between_frames() {
        let collector = Collector::new();
        let mut v = voice(&collector, vec![vec![0.0, 1.0, 2.0, 3.0]], 8000, false);
        v.set_rate(0.5);
        v.start_at(0.0);

        let mut out = [0.0; 1];
        let samples: Vec<f32> = (0..4)
            .map(|_| {
                v.next_frame(&mut out);
                out[0]
            })
            .collect();
        assert_eq!(samples, vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn non_looping_voice_ends() {
        let collector = Collector::new();
        let mut v = voice(&collector, vec![vec![1.0; 3]], 8000, false);
        v.start_at(0.0);
        let mut out = [0.0; 1];
        for _ in 0..3 {
            assert!(v.next_frame(&mut out));
        }
        assert!(!v.next_frame(&mut out));
        assert!(!v.is_playing());
        assert_eq!(out, [0.0]);
    }

    #[test]
    fn looping_voice_wraps() {
        let collector = Collector::new();
        let mut v = voice(&collector, vec![vec![0.1, 0.2, 0.3]], 8000, true);
        v.start_at(0.0);
        let mut out = [0.0; 1];
        let samples: Vec<f32> = (0..5)
            .map(|_| {
                v.next_frame(&mut out);
                out[0]
            })
            .collect();
        assert_eq!(samples, vec![0.1, 0.2, 0.3, 0.1, 0.2]);
    }

    #[test]
    fn start_offset_in_seconds() {
        let collector = Collector::new();
        let mut v = voice(&collector, vec![(0..100).map(|i| i as f32).collect()], 10, false);
        v.start_at(2.5);
        assert!((v.position_secs() - 2.5).abs() < 1e-9);
        let mut out = [0.0; 1];
        v.next_frame(&mut out);
        assert_eq!(out, [25.0]);
    }
}
