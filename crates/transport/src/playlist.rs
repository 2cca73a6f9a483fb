use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    None,
    RepeatAll,
    RepeatOne,
}

impl LoopMode {
    /// None -> RepeatAll -> RepeatOne -> None.
    pub fn cycled(self) -> Self {
        match self {
            LoopMode::None => LoopMode::RepeatAll,
            LoopMode::RepeatAll => LoopMode::RepeatOne,
            LoopMode::RepeatOne => LoopMode::None,
        }
    }
}

/// Ask the session to fetch and attach the track at `index`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest<T> {
    pub index: usize,
    pub track: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackEndAction<T> {
    /// Stop and rewind to 0.
    Stop,
    /// Play the same track again from 0.
    RestartCurrent,
    Load(LoadRequest<T>),
}

/// Chooses the next track on natural end of playback and on explicit
/// next/previous requests.
///
/// Every emitted [`LoadRequest`] marks a change as in flight; the session
/// must call [`Sequencer::finish_change`] whether the load succeeded or not.
pub struct Sequencer<T> {
    tracks: Vec<T>,
    current: Option<usize>,
    shuffle_order: Option<Vec<usize>>,
    loop_mode: LoopMode,
    in_flight: bool,
    /// Index selected before the in-flight change.
    previous: Option<usize>,
    rng: StdRng,
}

impl<T: Clone> Sequencer<T> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic shuffles for tests and reproducible sessions.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            tracks: Vec::new(),
            current: None,
            shuffle_order: None,
            loop_mode: LoopMode::None,
            in_flight: false,
            previous: None,
            rng,
        }
    }

    /// Replace the playlist. No track is selected afterwards.
    pub fn set_playlist(&mut self, tracks: Vec<T>) {
        self.tracks = tracks;
        self.current = None;
        self.in_flight = false;
        if self.shuffle_order.is_some() {
            self.shuffle_order = if self.tracks.is_empty() {
                None
            } else {
                Some(self.permutation())
            };
        }
    }

    fn permutation(&mut self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.tracks.len()).collect();
        order.shuffle(&mut self.rng);
        order
    }

    fn request(&mut self, index: usize) -> LoadRequest<T> {
        self.previous = self.current;
        self.current = Some(index);
        self.in_flight = true;
        LoadRequest {
            index,
            track: self.tracks[index].clone(),
        }
    }

    /// Play the track at `index`.
    pub fn select(&mut self, index: usize) -> Option<LoadRequest<T>> {
        if self.in_flight || index >= self.tracks.len() {
            return None;
        }
        Some(self.request(index))
    }

    fn adjacent(&self, current: usize, forward: bool) -> usize {
        let len = self.tracks.len();
        let step = |pos: usize| {
            if forward {
                (pos + 1) % len
            } else {
                (pos + len - 1) % len
            }
        };
        match &self.shuffle_order {
            Some(order) => {
                let pos = order.iter().position(|&i| i == current).unwrap_or(0);
                order[step(pos)]
            }
            None => step(current),
        }
    }

    fn step(&mut self, forward: bool) -> Option<LoadRequest<T>> {
        if self.in_flight || self.tracks.is_empty() {
            return None;
        }
        let current = self.current?;
        let index = self.adjacent(current, forward);
        Some(self.request(index))
    }

    pub fn next(&mut self) -> Option<LoadRequest<T>> {
        self.step(true)
    }

    pub fn previous(&mut self) -> Option<LoadRequest<T>> {
        self.step(false)
    }

    /// Turning shuffle on draws a fresh permutation and forces
    /// [`LoopMode::None`]. Returns whether shuffle is now on.
    pub fn toggle_shuffle(&mut self) -> bool {
        if self.tracks.is_empty() {
            return self.is_shuffle();
        }
        if self.shuffle_order.take().is_none() {
            let order = self.permutation();
            debug!(?order, "shuffle order generated");
            self.shuffle_order = Some(order);
            self.loop_mode = LoopMode::None;
        }
        self.is_shuffle()
    }

    /// Shuffle only applies with [`LoopMode::None`], so leaving it turns
    /// shuffle off.
    pub fn toggle_loop(&mut self) -> LoopMode {
        self.loop_mode = self.loop_mode.cycled();
        if self.loop_mode != LoopMode::None {
            self.shuffle_order = None;
        }
        self.loop_mode
    }

    /// Decide what happens when the current track plays to its end.
    pub fn on_track_end(&mut self) -> TrackEndAction<T> {
        if self.in_flight {
            return TrackEndAction::Stop;
        }
        let action = match (self.loop_mode, self.current) {
            (LoopMode::RepeatOne, _) => TrackEndAction::RestartCurrent,
            (LoopMode::RepeatAll, Some(current)) if !self.tracks.is_empty() => {
                let index = (current + 1) % self.tracks.len();
                TrackEndAction::Load(self.request(index))
            }
            (LoopMode::RepeatAll, _) => TrackEndAction::RestartCurrent,
            (LoopMode::None, Some(current)) if self.shuffle_order.is_some() => {
                let index = self.adjacent(current, true);
                TrackEndAction::Load(self.request(index))
            }
            (LoopMode::None, _) => TrackEndAction::Stop,
        };
        match &action {
            TrackEndAction::Load(request) => info!(index = request.index, "advancing playlist"),
            TrackEndAction::RestartCurrent => info!("restarting track"),
            TrackEndAction::Stop => info!("end of track, stopping"),
        }
        action
    }

    /// The requested change completed, successfully or not.
    pub fn finish_change(&mut self) {
        self.in_flight = false;
    }

    /// The requested change failed; select the previous track again.
    pub fn abandon_change(&mut self) {
        if self.in_flight {
            self.current = self.previous;
            self.in_flight = false;
        }
    }

    #[inline]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    #[inline]
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_track(&self) -> Option<&T> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    #[inline]
    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    #[inline]
    pub fn is_shuffle(&self) -> bool {
        self.shuffle_order.is_some()
    }

    pub fn shuffle_order(&self) -> Option<&[usize]> {
        self.shuffle_order.as_deref()
    }

    pub fn tracks(&self) -> &[T] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl<T: Clone> Default for Sequencer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist(n: usize) -> Sequencer<String> {
        let mut sequencer = Sequencer::with_seed(7);
        sequencer.set_playlist((0..n).map(|i| format!("track-{i}")).collect());
        sequencer
    }

    fn selected(n: usize, index: usize) -> Sequencer<String> {
        let mut sequencer = playlist(n);
        sequencer.select(index).unwrap();
        sequencer.finish_change();
        sequencer
    }

    #[test]
    fn loop_mode_cycles() {
        let mut sequencer = playlist(3);
        assert_eq!(sequencer.toggle_loop(), LoopMode::RepeatAll);
        assert_eq!(sequencer.toggle_loop(), LoopMode::RepeatOne);
        assert_eq!(sequencer.toggle_loop(), LoopMode::None);
    }

    #[test]
    fn shuffle_is_a_bijection() {
        for n in [1, 2, 5, 17, 64] {
            let mut sequencer = playlist(n);
            sequencer.toggle_shuffle();

            let mut order = sequencer.shuffle_order().unwrap().to_vec();
            order.sort_unstable();
            assert_eq!(order, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn shuffle_forces_loop_none() {
        let mut sequencer = playlist(4);
        sequencer.toggle_loop();
        assert!(sequencer.toggle_shuffle());
        assert_eq!(sequencer.loop_mode(), LoopMode::None);

        assert!(!sequencer.toggle_shuffle());
        assert!(sequencer.shuffle_order().is_none());
    }

    #[test]
    fn shuffle_on_empty_playlist_is_noop() {
        let mut sequencer = playlist(0);
        assert!(!sequencer.toggle_shuffle());
    }

    #[test]
    fn repeat_all_wraps_to_first_track() {
        let mut sequencer = selected(3, 2);
        sequencer.toggle_loop();

        let action = sequencer.on_track_end();
        assert_eq!(
            action,
            TrackEndAction::Load(LoadRequest {
                index: 0,
                track: "track-0".to_string()
            })
        );
        assert_eq!(sequencer.current_index(), Some(0));
        assert!(sequencer.is_in_flight());
    }

    #[test]
    fn repeat_one_restarts_without_moving() {
        let mut sequencer = selected(3, 1);
        sequencer.toggle_loop();
        sequencer.toggle_loop();

        assert_eq!(sequencer.on_track_end(), TrackEndAction::RestartCurrent);
        assert_eq!(sequencer.current_index(), Some(1));
    }

    #[test]
    fn loop_none_stops() {
        let mut sequencer = selected(3, 1);
        assert_eq!(sequencer.on_track_end(), TrackEndAction::Stop);
    }

    #[test]
    fn loop_none_with_shuffle_follows_order() {
        let mut sequencer = selected(5, 0);
        sequencer.toggle_shuffle();
        let order = sequencer.shuffle_order().unwrap().to_vec();
        let pos = order.iter().position(|&i| i == 0).unwrap();

        match sequencer.on_track_end() {
            TrackEndAction::Load(request) => assert_eq!(request.index, order[(pos + 1) % 5]),
            other => panic!("expected a load request, got {other:?}"),
        }
    }

    #[test]
    fn in_flight_change_only_stops() {
        let mut sequencer = playlist(3);
        sequencer.toggle_loop();
        sequencer.select(0).unwrap();

        assert_eq!(sequencer.on_track_end(), TrackEndAction::Stop);
        assert!(sequencer.next().is_none());
        assert_eq!(sequencer.current_index(), Some(0));
    }

    #[test]
    fn next_and_previous_wrap() {
        let mut sequencer = selected(3, 2);
        assert_eq!(sequencer.next().unwrap().index, 0);
        sequencer.finish_change();
        assert_eq!(sequencer.previous().unwrap().index, 2);
    }

    #[test]
    fn next_follows_shuffle_order_both_ways() {
        let mut sequencer = selected(6, 3);
        sequencer.toggle_shuffle();
        let order = sequencer.shuffle_order().unwrap().to_vec();
        let pos = order.iter().position(|&i| i == 3).unwrap();

        assert_eq!(sequencer.next().unwrap().index, order[(pos + 1) % 6]);
        sequencer.finish_change();
        assert_eq!(sequencer.previous().unwrap().index, 3);
    }

    #[test]
    fn next_without_current_is_noop() {
        let mut sequencer = playlist(3);
        assert!(sequencer.next().is_none());
        assert!(sequencer.previous().is_none());
    }

    #[test]
    fn select_out_of_range_is_rejected() {
        let mut sequencer = playlist(2);
        assert!(sequencer.select(2).is_none());
        assert!(!sequencer.is_in_flight());
    }

    #[test]
    fn repeat_all_without_playlist_restarts() {
        let mut sequencer: Sequencer<String> = Sequencer::with_seed(1);
        sequencer.toggle_loop();
        assert_eq!(sequencer.on_track_end(), TrackEndAction::RestartCurrent);
    }

    #[test]
    fn leaving_loop_none_disables_shuffle() {
        let mut sequencer = playlist(3);
        sequencer.toggle_shuffle();
        sequencer.toggle_loop();
        assert!(!sequencer.is_shuffle());
    }

    #[test]
    fn abandoned_change_restores_previous_track() {
        let mut sequencer = selected(4, 1);
        assert_eq!(sequencer.next().unwrap().index, 2);
        sequencer.abandon_change();

        assert_eq!(sequencer.current_index(), Some(1));
        assert!(!sequencer.is_in_flight());
    }
}
