use tracing::debug;

use crate::clock::Clock;

/// The playable source a [`Transport`] drives.
///
/// Implemented by the live effect graph. Calls made with no source attached
/// are expected to be no-ops.
pub trait SourceControl {
    /// (Re)start the source at `offset` seconds into the track.
    fn start_at(&mut self, offset: f64);
    fn stop(&mut self);
    fn set_rate(&mut self, rate: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Wall-clock reference paired with the position reached at that instant.
///
/// Always replaced as a whole so the two fields can never disagree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockAnchor {
    pub wall: f64,
    pub accumulated: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Not playing; nothing advanced.
    Idle,
    Position(f64),
    /// The position reached the track duration.
    EndOfTrack,
}

/// Variable-rate playback position reconciled against a wall clock.
///
/// While playing, `position = accumulated + (now - wall) * rate`, clamped to
/// `[0, duration]`. Every rate change, seek, play or pause re-anchors the
/// clock at the position reached so far.
pub struct Transport<C: Clock> {
    clock: C,
    state: PlaybackState,
    anchor: ClockAnchor,
    rate: f64,
    duration: f64,
    loaded: bool,
}

impl<C: Clock> Transport<C> {
    pub fn new(clock: C, playback_rate: f64) -> Self {
        let wall = clock.now();
        Self {
            clock,
            state: PlaybackState::Stopped,
            anchor: ClockAnchor {
                wall,
                accumulated: 0.0,
            },
            rate: playback_rate,
            duration: 0.0,
            loaded: false,
        }
    }

    fn reanchor(&mut self, accumulated: f64) {
        self.anchor = ClockAnchor {
            wall: self.clock.now(),
            accumulated,
        };
    }

    /// A new track was attached (and auto-started) at position 0.
    pub fn load(&mut self, duration: f64) {
        self.duration = duration.max(0.0);
        self.loaded = true;
        self.state = PlaybackState::Playing;
        self.reanchor(0.0);
        debug!(duration = self.duration, "transport loaded");
    }

    /// Forget the loaded track, e.g. after a failed start.
    pub fn unload(&mut self) {
        self.loaded = false;
        self.duration = 0.0;
        self.state = PlaybackState::Stopped;
        self.reanchor(0.0);
    }

    pub fn play(&mut self, source: &mut impl SourceControl) {
        if !self.loaded || self.state == PlaybackState::Playing {
            return;
        }
        let position = self.position();
        source.start_at(position);
        self.state = PlaybackState::Playing;
        self.reanchor(position);
    }

    pub fn pause(&mut self, source: &mut impl SourceControl) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let position = self.position();
        source.stop();
        self.state = PlaybackState::Paused;
        self.reanchor(position);
    }

    /// Stop the source and rewind to 0.
    pub fn stop(&mut self, source: &mut impl SourceControl) {
        if self.state == PlaybackState::Playing {
            source.stop();
        }
        self.state = PlaybackState::Stopped;
        self.reanchor(0.0);
    }

    pub fn seek(&mut self, seconds: f64, source: &mut impl SourceControl) {
        if !self.loaded {
            return;
        }
        let target = if seconds.is_finite() {
            seconds.clamp(0.0, self.duration)
        } else {
            0.0
        };
        if self.state == PlaybackState::Playing {
            source.start_at(target);
        } else if self.state == PlaybackState::Stopped {
            self.state = PlaybackState::Paused;
        }
        self.reanchor(target);
    }

    pub fn set_playback_rate(&mut self, rate: f64, source: &mut impl SourceControl) {
        let position = self.position();
        self.rate = rate;
        source.set_rate(rate);
        self.reanchor(position);
    }

    /// Start the current track over from 0.
    pub fn restart(&mut self, source: &mut impl SourceControl) {
        if !self.loaded {
            return;
        }
        source.start_at(0.0);
        self.state = PlaybackState::Playing;
        self.reanchor(0.0);
    }

    /// Periodic update: re-anchor at the current position and report whether
    /// the end of the track was reached.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state != PlaybackState::Playing {
            return TickOutcome::Idle;
        }
        let position = self.position();
        self.reanchor(position);
        if position >= self.duration {
            TickOutcome::EndOfTrack
        } else {
            TickOutcome::Position(position)
        }
    }

    pub fn position(&self) -> f64 {
        match self.state {
            PlaybackState::Playing => {
                let elapsed = (self.clock.now() - self.anchor.wall).max(0.0);
                (self.anchor.accumulated + elapsed * self.rate).clamp(0.0, self.duration)
            }
            _ => self.anchor.accumulated,
        }
    }

    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    #[inline]
    pub fn playback_rate(&self) -> f64 {
        self.rate
    }

    #[inline]
    pub fn anchor(&self) -> ClockAnchor {
        self.anchor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[derive(Debug, PartialEq)]
    enum Call {
        Start(f64),
        Stop,
        Rate(f64),
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
    }

    impl SourceControl for Recorder {
        fn start_at(&mut self, offset: f64) {
            self.calls.push(Call::Start(offset));
        }

        fn stop(&mut self) {
            self.calls.push(Call::Stop);
        }

        fn set_rate(&mut self, rate: f64) {
            self.calls.push(Call::Rate(rate));
        }
    }

    fn loaded(duration: f64, rate: f64) -> (Transport<ManualClock>, ManualClock, Recorder) {
        let clock = ManualClock::new();
        let mut transport = Transport::new(clock.clone(), rate);
        transport.load(duration);
        (transport, clock, Recorder::default())
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn load_auto_plays_from_zero() {
        let (transport, _, _) = loaded(10.0, 1.0);
        assert_eq!(transport.state(), PlaybackState::Playing);
        assert_eq!(transport.position(), 0.0);
    }

    #[test]
    fn position_scales_with_rate() {
        let (transport, clock, _) = loaded(10.0, 1.25);
        clock.advance(2.0);
        assert!(approx(transport.position(), 2.5));
    }

    #[test]
    fn pause_freezes_position() {
        let (mut transport, clock, mut source) = loaded(10.0, 1.0);
        clock.advance(3.0);
        transport.pause(&mut source);
        clock.advance(5.0);

        assert_eq!(transport.state(), PlaybackState::Paused);
        assert!(approx(transport.position(), 3.0));
        assert_eq!(source.calls, vec![Call::Stop]);
    }

    #[test]
    fn play_resumes_at_paused_position() {
        let (mut transport, clock, mut source) = loaded(10.0, 1.0);
        clock.advance(3.0);
        transport.pause(&mut source);
        clock.advance(1.0);
        transport.play(&mut source);
        clock.advance(1.0);

        assert!(approx(transport.position(), 4.0));
        assert!(matches!(source.calls[1], Call::Start(p) if approx(p, 3.0)));
    }

    #[test]
    fn play_before_load_is_noop() {
        let mut transport = Transport::new(ManualClock::new(), 1.0);
        let mut source = Recorder::default();
        transport.play(&mut source);

        assert_eq!(transport.state(), PlaybackState::Stopped);
        assert!(source.calls.is_empty());
    }

    #[test]
    fn seek_clamps_and_restarts_when_playing() {
        let (mut transport, _, mut source) = loaded(10.0, 1.0);
        transport.seek(42.0, &mut source);
        assert!(approx(transport.position(), 10.0));

        transport.seek(-1.0, &mut source);
        assert_eq!(transport.position(), 0.0);
        assert_eq!(source.calls, vec![Call::Start(10.0), Call::Start(0.0)]);
    }

    #[test]
    fn seek_while_paused_moves_without_starting() {
        let (mut transport, clock, mut source) = loaded(10.0, 1.0);
        transport.pause(&mut source);
        transport.seek(6.0, &mut source);
        clock.advance(2.0);

        assert_eq!(transport.state(), PlaybackState::Paused);
        assert!(approx(transport.position(), 6.0));
        assert_eq!(source.calls, vec![Call::Stop]);
    }

    #[test]
    fn rate_change_does_not_jump() {
        let (mut transport, clock, mut source) = loaded(100.0, 1.0);
        clock.advance(4.0);
        let before = transport.position();
        transport.set_playback_rate(0.5, &mut source);

        assert!(approx(transport.position(), before));
        clock.advance(2.0);
        assert!(approx(transport.position(), 5.0));
        assert_eq!(source.calls, vec![Call::Rate(0.5)]);
    }

    #[test]
    fn position_never_exceeds_duration() {
        let (transport, clock, _) = loaded(2.0, 1.5);
        clock.advance(60.0);
        assert!(approx(transport.position(), 2.0));
    }

    #[test]
    fn position_is_monotonic_across_events() {
        let (mut transport, clock, mut source) = loaded(30.0, 1.0);
        let rates = [1.25, 0.5, 1.5, 1.0];
        let mut last = transport.position();

        for step in 0..40 {
            clock.advance(0.1 + (step % 3) as f64 * 0.07);
            match step % 5 {
                0 => transport.set_playback_rate(rates[step % rates.len()], &mut source),
                1 => transport.pause(&mut source),
                2 => transport.play(&mut source),
                _ => {
                    transport.tick();
                }
            }
            let now = transport.position();
            assert!(now >= last, "position went backwards: {last} -> {now}");
            assert!(now <= transport.duration());
            last = now;
        }
    }

    #[test]
    fn tick_reports_end_of_track() {
        let (mut transport, clock, _) = loaded(1.0, 1.0);
        clock.advance(0.5);
        assert!(matches!(transport.tick(), TickOutcome::Position(p) if approx(p, 0.5)));

        clock.advance(0.6);
        assert_eq!(transport.tick(), TickOutcome::EndOfTrack);
    }

    #[test]
    fn tick_is_idle_when_paused() {
        let (mut transport, _, mut source) = loaded(1.0, 1.0);
        transport.pause(&mut source);
        assert_eq!(transport.tick(), TickOutcome::Idle);
    }

    #[test]
    fn tick_replaces_anchor_as_a_whole() {
        let (mut transport, clock, _) = loaded(10.0, 2.0);
        clock.advance(1.5);
        transport.tick();

        let anchor = transport.anchor();
        assert!(approx(anchor.wall, 1.5));
        assert!(approx(anchor.accumulated, 3.0));
    }

    #[test]
    fn stop_rewinds() {
        let (mut transport, clock, mut source) = loaded(10.0, 1.0);
        clock.advance(4.0);
        transport.stop(&mut source);

        assert_eq!(transport.state(), PlaybackState::Stopped);
        assert_eq!(transport.position(), 0.0);
        assert_eq!(source.calls, vec![Call::Stop]);
    }

    #[test]
    fn restart_plays_from_zero() {
        let (mut transport, clock, mut source) = loaded(1.0, 1.0);
        clock.advance(2.0);
        transport.restart(&mut source);
        clock.advance(0.25);

        assert!(approx(transport.position(), 0.25));
        assert_eq!(source.calls, vec![Call::Start(0.0)]);
    }
}
