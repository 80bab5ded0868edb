use log::{info, warn};
use serde::Serialize;
use tokio::time::Instant;

use crate::{
    AudioOutput, Config, Crossfade, EventSender, GestureKind, GestureUnlock, Introspect,
    OutputEvent, OutputEventKind, SessionEvent, SlotIndex, Slots, Track, TrackQueue,
    UnlockOutcome,
};

const GESTURE_MESSAGE: &str = "Click or tap anywhere to enable audio";
const SKIP_MESSAGE: &str = "Playback error, skipping to next";

/// The playback engine owns the queue and the two outputs,
/// and moves tracks from the queue to the outputs, crossfading between them.
///
/// It never waits by itself. Time only moves forward when [PlaybackEngine::tick] is called,
/// which should happen no later than [PlaybackEngine::next_deadline].
pub struct PlaybackEngine<O> {
    config: Config,
    events: EventSender,
    slots: Slots<O>,
    queue: TrackQueue,
    current: Option<Track>,
    stage: Stage,
    unlock: GestureUnlock,
    /// When to skip a track that failed to play
    pending_skip: Option<Instant>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    /// Nothing is playing and the queue is empty.
    #[default]
    Idle,
    /// The current track occupies the active output.
    Playing,
    /// The next track is loading, or being crossfaded in.
    Transitioning,
}

#[derive(Debug)]
enum Stage {
    Idle,
    Playing,
    /// The current track is loading in the idle output.
    Loading {
        deadline: Instant,
    },
    /// The current track is fading in on the idle output.
    Crossfading {
        fade: Crossfade,
        next_step_at: Instant,
    },
}

impl Stage {
    fn state(&self) -> PlaybackState {
        match self {
            Stage::Idle => PlaybackState::Idle,
            Stage::Playing => PlaybackState::Playing,
            Stage::Loading { .. } | Stage::Crossfading { .. } => PlaybackState::Transitioning,
        }
    }
}

impl<O> PlaybackEngine<O>
where
    O: AudioOutput,
{
    pub fn new(config: &Config, outputs: [O; 2], events: EventSender) -> Self {
        Self {
            config: config.clone(),
            events,
            slots: Slots::new(outputs),
            queue: TrackQueue::new(),
            current: None,
            stage: Stage::Idle,
            unlock: GestureUnlock::new(&config.fallback_source),
            pending_skip: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.stage.state()
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn queue(&self) -> &TrackQueue {
        &self.queue
    }

    pub fn active_slot(&self) -> SlotIndex {
        self.slots.active_index()
    }

    pub fn output(&self, slot: SlotIndex) -> &O {
        self.slots.get(slot)
    }

    pub fn output_mut(&mut self, slot: SlotIndex) -> &mut O {
        self.slots.get_mut(slot)
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlock.is_unlocked()
    }

    /// Adds tracks to the queue, starting playback if nothing is playing.
    /// Returns how many tracks were actually added.
    pub fn enqueue(&mut self, tracks: Vec<Track>, now: Instant) -> usize {
        let added = self.queue.enqueue(tracks, self.current.as_ref());

        if added == 0 {
            return 0;
        }

        self.emit_queue();

        match self.stage {
            Stage::Idle if self.current.is_none() => self.advance(now),
            Stage::Playing => self.preload_next(),
            _ => {}
        }

        added
    }

    /// Moves on to the next track in the queue, or stops if there is none.
    pub fn advance(&mut self, now: Instant) {
        // A new transition supersedes one in progress.
        if let Stage::Crossfading { .. } = self.stage {
            self.finish_crossfade();
        }

        self.pending_skip = None;

        let Some(next) = self.queue.dequeue() else {
            self.stop();
            return;
        };

        info!("Loading {} into output {}", next, self.slots.idle_index());

        let idle = self.slots.idle_mut();
        let is_preloaded = idle.source() == Some(next.file.as_str()) && idle.is_ready();

        if !is_preloaded {
            idle.load(&next.file);
        }

        self.current = Some(next);
        self.emit_queue();
        self.set_stage(Stage::Loading {
            deadline: now + self.config.ready_timeout,
        });

        if self.slots.idle().is_ready() {
            self.begin(now);
        }
    }

    /// Skips the current track.
    pub fn skip(&mut self, now: Instant) {
        self.slots.active_mut().pause();
        self.advance(now);
    }

    /// Advances crossfades, load timeouts, and pending skips.
    pub fn tick(&mut self, now: Instant) {
        if self.pending_skip.map(|at| now >= at).unwrap_or_default() {
            self.pending_skip = None;
            self.advance(now);
        }

        let mut timed_out = false;
        let mut fade_finished = false;

        match &mut self.stage {
            Stage::Loading { deadline } => timed_out = now >= *deadline,
            Stage::Crossfading { fade, next_step_at } => {
                while now >= *next_step_at {
                    let Some(step) = fade.next() else {
                        break;
                    };

                    self.slots.active_mut().set_volume(step.outgoing);
                    self.slots.idle_mut().set_volume(step.incoming);
                    *next_step_at += fade.interval();
                }

                fade_finished = fade.is_finished();
            }
            _ => {}
        }

        if timed_out {
            warn!("Track did not become playable in time, playing it anyway");
            self.begin(now);
        }

        if fade_finished {
            self.finish_crossfade();
        }
    }

    /// Returns when [PlaybackEngine::tick] needs to be called next, if at all.
    pub fn next_deadline(&self) -> Option<Instant> {
        let stage_deadline = match &self.stage {
            Stage::Loading { deadline } => Some(*deadline),
            Stage::Crossfading { next_step_at, .. } => Some(*next_step_at),
            _ => None,
        };

        [stage_deadline, self.pending_skip].into_iter().flatten().min()
    }

    /// Checks the active output's progress.
    ///
    /// Starts fading out the current track when it is about to end and something is queued.
    /// The fade starts `crossfade_in_seconds` before the end, so it finishes as the track does.
    /// Returns true if it is time to fetch more tracks.
    pub fn monitor(&mut self, now: Instant) -> bool {
        let Some(remaining) = self.remaining() else {
            return false;
        };

        let is_fading_out = remaining <= self.config.crossfade_in_seconds
            && matches!(self.stage, Stage::Playing)
            && !self.slots.active().is_paused()
            && !self.queue.is_empty();

        if is_fading_out {
            self.advance(now);
        }

        self.needs_prefetch()
    }

    /// Returns true if the current track is about to end and the queue is running dry.
    pub fn needs_prefetch(&self) -> bool {
        let Some(remaining) = self.remaining() else {
            return false;
        };

        remaining <= self.config.prefetch_threshold_in_seconds
            && self.queue.len() < self.config.prefetch_queue_depth
    }

    /// Handles an event reported by one of the outputs.
    pub fn handle_event(&mut self, event: OutputEvent, now: Instant) {
        let OutputEvent { slot, kind } = event;
        let is_active = slot == self.slots.active_index();

        match kind {
            OutputEventKind::CanPlay => {
                let is_loading = matches!(self.stage, Stage::Loading { .. });

                if is_loading && !is_active && self.slots.idle().is_ready() {
                    self.begin(now);
                }
            }
            OutputEventKind::Ended if is_active => match self.stage {
                Stage::Playing => self.advance(now),
                Stage::Crossfading { .. } => self.finish_crossfade(),
                // Loading will start the next track right away, since the active output stopped.
                _ => {}
            },
            OutputEventKind::Error(error) => {
                warn!("Output {} failed: {}", slot, error);

                self.emit(SessionEvent::OutputFailed {
                    slot,
                    error: error.clone(),
                });

                self.handle_output_error(slot, is_active, now);
            }
            _ => {}
        }
    }

    /// Handles a user gesture, unlocking audio if it was not already.
    pub fn unlock(&mut self, gesture: GestureKind) -> UnlockOutcome {
        let was_prompted = self.unlock.is_prompted();
        let keep_sources = self.current.is_some() || !self.queue.is_empty();
        let outcome = self.unlock.unlock(&mut self.slots, keep_sources);

        if outcome != UnlockOutcome::Unlocked {
            return outcome;
        }

        self.emit(SessionEvent::AudioUnlocked { gesture });

        // Resume the track that was refused playback before the gesture.
        let is_waiting = matches!(self.stage, Stage::Playing) && self.current.is_some();

        if was_prompted && is_waiting {
            let active = self.slots.active_mut();

            if active.is_paused() {
                if let Err(e) = active.play() {
                    warn!("Could not resume after unlocking: {}", e);
                }
            }
        }

        outcome
    }

    fn handle_output_error(&mut self, slot: SlotIndex, is_active: bool, now: Instant) {
        let holds_current = match self.stage {
            Stage::Idle => false,
            Stage::Playing => is_active,
            Stage::Loading { .. } => !is_active,
            Stage::Crossfading { .. } if is_active => {
                // The outgoing track failed, so the incoming one can take over right away.
                self.finish_crossfade();
                return;
            }
            Stage::Crossfading { .. } => true,
        };

        if holds_current {
            self.emit(SessionEvent::Status {
                message: SKIP_MESSAGE.to_string(),
            });

            self.pending_skip = Some(now + self.config.error_skip_delay);
        } else {
            info!("Dropping the source of output {}", slot);
            self.slots.get_mut(slot).unload();
        }
    }

    /// Starts the loaded track, either right away or by crossfading.
    fn begin(&mut self, now: Instant) {
        let Some(track) = self.current.clone() else {
            self.set_stage(Stage::Idle);
            return;
        };

        let active = self.slots.active();
        let is_silent = active.is_paused() || active.position() == 0.;

        if is_silent {
            let idle = self.slots.idle_mut();
            idle.set_volume(1.);

            if let Err(e) = idle.play() {
                warn!("Could not start {}: {}", track, e);
                self.request_gesture();
            }

            // Swap even if playback was refused, so the track is ready once audio is unlocked.
            self.slots.swap();
            self.slots.idle_mut().pause();
            self.settle();
        } else {
            let idle = self.slots.idle_mut();
            idle.set_volume(0.);

            if let Err(e) = idle.play() {
                warn!("Could not crossfade into {}: {}", track, e);

                if e.is_blocked() {
                    self.request_gesture();
                }
            }

            let fade = Crossfade::new(&self.config);
            let next_step_at = now + fade.interval();

            self.set_stage(Stage::Crossfading { fade, next_step_at });
        }

        info!("Now playing {}", track);

        self.emit(SessionEvent::TrackStarted {
            next: self.queue.peek().cloned(),
            track,
        });
    }

    fn finish_crossfade(&mut self) {
        let outgoing = self.slots.active_mut();
        outgoing.pause();
        outgoing.rewind();

        self.slots.swap();
        self.slots.active_mut().set_volume(1.);
        self.slots.idle_mut().set_volume(1.);

        self.settle();
    }

    fn settle(&mut self) {
        self.set_stage(Stage::Playing);
        self.preload_next();
    }

    fn stop(&mut self) {
        self.current = None;
        self.slots.active_mut().pause();

        self.set_stage(Stage::Idle);
        self.emit_queue();
        self.emit(SessionEvent::PlaybackStopped);
    }

    /// Loads the next queued track into the idle output ahead of time.
    fn preload_next(&mut self) {
        let Some(next) = self.queue.peek() else {
            return;
        };

        let idle = self.slots.idle_mut();

        if idle.source() != Some(next.file.as_str()) {
            idle.load(&next.file);
        }
    }

    /// Returns how many seconds are left of the current track, if known.
    fn remaining(&self) -> Option<f32> {
        self.current.as_ref()?;

        let active = self.slots.active();
        let duration = active.duration().filter(|d| d.is_finite() && *d > 0.)?;

        Some(duration - active.position())
    }

    fn request_gesture(&mut self) {
        if self.unlock.prompt() {
            self.emit(SessionEvent::GestureRequired {
                message: GESTURE_MESSAGE.to_string(),
            });
        }
    }

    fn set_stage(&mut self, stage: Stage) {
        let previous = self.stage.state();
        self.stage = stage;

        let new_state = self.stage.state();

        if previous != new_state {
            self.emit(SessionEvent::StateUpdate { new_state });
        }
    }

    fn emit_queue(&self) {
        self.emit(SessionEvent::QueueUpdated {
            items: self.queue.to_vec(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is not an error.
        let _ = self.events.send(event);
    }
}

#[derive(Debug)]
pub struct PlaybackIntrospection {
    pub state: PlaybackState,
    pub current: Option<String>,
    pub queue: Vec<String>,
    pub active_slot: SlotIndex,
    pub active_volume: f32,
    pub idle_volume: f32,
    pub unlocked: bool,
}

impl<O> Introspect<PlaybackIntrospection> for PlaybackEngine<O>
where
    O: AudioOutput,
{
    fn introspect(&self) -> PlaybackIntrospection {
        PlaybackIntrospection {
            state: self.state(),
            current: self.current.as_ref().map(|t| t.id.clone()),
            queue: self.queue.iter().map(|t| t.id.clone()).collect(),
            active_slot: self.slots.active_index(),
            active_volume: self.slots.active().volume(),
            idle_volume: self.slots.idle().volume(),
            unlocked: self.unlock.is_unlocked(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use crossbeam::channel::{unbounded, Receiver};

    use super::*;
    use crate::MemoryOutput;

    type Engine = PlaybackEngine<MemoryOutput>;

    fn track(id: &str) -> Track {
        Track::new(id, format!("Track {id}"), format!("/static/samples/{id}.mp3"))
    }

    fn engine_with(outputs: [MemoryOutput; 2]) -> (Engine, Receiver<SessionEvent>) {
        let (sender, receiver) = unbounded();
        let engine = PlaybackEngine::new(&Config::default(), outputs, sender);

        (engine, receiver)
    }

    fn engine() -> (Engine, Receiver<SessionEvent>) {
        engine_with([MemoryOutput::new(), MemoryOutput::new()])
    }

    fn current_id(engine: &Engine) -> Option<&str> {
        engine.current().map(|t| t.id.as_str())
    }

    fn active(engine: &mut Engine) -> &mut MemoryOutput {
        let slot = engine.active_slot();
        engine.output_mut(slot)
    }

    #[test]
    fn test_enqueue_starts_playback() {
        let (mut engine, events) = engine();
        let now = Instant::now();

        assert_eq!(engine.enqueue(vec![track("1"), track("2")], now), 2);

        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(current_id(&engine), Some("1"));
        assert_eq!(engine.active_slot(), SlotIndex::B, "track was loaded into the idle slot");
        assert!(!engine.output(SlotIndex::B).is_paused());

        assert_eq!(
            engine.output(SlotIndex::A).source(),
            Some("/static/samples/2.mp3"),
            "next track is preloaded"
        );

        let started = events.try_iter().find_map(|e| match e {
            SessionEvent::TrackStarted { track, next } => Some((track.id, next.map(|n| n.id))),
            _ => None,
        });
        assert_eq!(started, Some(("1".to_string(), Some("2".to_string()))));
    }

    #[test]
    fn test_enqueue_rejects_current_track() {
        let (mut engine, _events) = engine();
        let now = Instant::now();

        engine.enqueue(vec![track("1")], now);

        assert_eq!(engine.enqueue(vec![track("1")], now), 0);
        assert!(engine.queue().is_empty());
    }

    #[test]
    fn test_tracks_play_in_order() {
        let (mut engine, _events) = engine();
        let now = Instant::now();
        let mut played = vec![];

        engine.enqueue(vec![track("a"), track("b"), track("c")], now);

        while let Some(id) = current_id(&engine).map(str::to_string) {
            played.push(id);

            let slot = engine.active_slot();
            engine.output_mut(slot).finish();
            engine.handle_event(OutputEvent::new(slot, OutputEventKind::Ended), now);
        }

        assert_eq!(played, vec!["a", "b", "c"]);
        assert_eq!(engine.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_preloaded_track_is_not_reloaded() {
        let (mut engine, _events) = engine();
        let now = Instant::now();

        engine.enqueue(vec![track("1"), track("2")], now);
        assert_eq!(engine.output(SlotIndex::A).loads(), 1);

        engine.skip(now);

        assert_eq!(current_id(&engine), Some("2"));
        assert_eq!(engine.output(SlotIndex::A).loads(), 1, "preload was reused");
        assert_eq!(engine.active_slot(), SlotIndex::A);
    }

    #[test]
    fn test_crossfade_before_end() {
        let (mut engine, _events) = engine();
        let start = Instant::now();

        engine.enqueue(vec![track("1"), track("2")], start);

        let outgoing = engine.active_slot();
        engine.output_mut(outgoing).set_duration(Some(180.));
        engine.output_mut(outgoing).set_position(178.5);

        engine.monitor(start);

        assert_eq!(engine.state(), PlaybackState::Transitioning);
        assert_eq!(current_id(&engine), Some("2"));

        let incoming = outgoing.other();
        assert_eq!(engine.output(incoming).volume(), 0., "incoming starts silent");

        let mut now = start;
        let mut steps = 0;

        while engine.state() == PlaybackState::Transitioning {
            now = engine.next_deadline().expect("crossfade has a deadline");
            engine.tick(now);
            steps += 1;

            let sum = engine.output(outgoing).volume() + engine.output(incoming).volume();
            assert!((sum - 1.).abs() < 1e-5 || engine.state() == PlaybackState::Playing);
        }

        assert_eq!(steps, 120);
        assert!(now - start >= Duration::from_millis(1990));
        assert_eq!(engine.active_slot(), incoming, "slots were swapped");
        assert!(engine.output(outgoing).is_paused());
        assert_eq!(engine.output(outgoing).position(), 0., "outgoing was rewound");
        assert_eq!(engine.output(outgoing).volume(), 1.);
        assert_eq!(engine.output(incoming).volume(), 1.);
    }

    /// Starts a crossfade from track 1 into track 2 by nearing the end of track 1.
    /// Returns the outgoing slot.
    fn start_crossfade(engine: &mut Engine, now: Instant) -> SlotIndex {
        engine.enqueue(vec![track("1"), track("2")], now);

        let outgoing = engine.active_slot();
        engine.output_mut(outgoing).set_duration(Some(180.));
        engine.output_mut(outgoing).set_position(178.5);

        engine.monitor(now);
        assert_eq!(engine.state(), PlaybackState::Transitioning);

        outgoing
    }

    fn assert_crossfade_finished(engine: &Engine, outgoing: SlotIndex) {
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(engine.active_slot(), outgoing.other(), "slots were swapped");
        assert_eq!(current_id(engine), Some("2"));
        assert_eq!(engine.output(outgoing).volume(), 1.);
        assert_eq!(engine.output(outgoing.other()).volume(), 1.);
        assert_eq!(engine.next_deadline(), None, "no fade steps are left");
    }

    #[test]
    fn test_outgoing_end_finishes_crossfade() {
        let (mut engine, _events) = engine();
        let now = Instant::now();

        let outgoing = start_crossfade(&mut engine, now);
        let later = now + Duration::from_millis(500);

        engine.tick(later);
        assert_eq!(engine.state(), PlaybackState::Transitioning, "fade is under way");

        engine.handle_event(OutputEvent::new(outgoing, OutputEventKind::Ended), later);

        assert_crossfade_finished(&engine, outgoing);
        assert!(engine.output(outgoing).is_paused());
    }

    #[test]
    fn test_outgoing_error_finishes_crossfade() {
        let (mut engine, events) = engine();
        let now = Instant::now();

        let outgoing = start_crossfade(&mut engine, now);
        events.try_iter().for_each(drop);

        engine.handle_event(
            OutputEvent::new(outgoing, OutputEventKind::Error("decode".to_string())),
            now,
        );

        assert_crossfade_finished(&engine, outgoing);

        let events: Vec<_> = events.try_iter().collect();
        assert!(
            !events.iter().any(|e| matches!(e, SessionEvent::Status { .. })),
            "the incoming track is not skipped"
        );
    }

    #[test]
    fn test_new_transition_supersedes_crossfade() {
        let (mut engine, _events) = engine();
        let now = Instant::now();

        engine.enqueue(vec![track("1"), track("2"), track("3")], now);
        active(&mut engine).set_position(30.);

        engine.advance(now);
        assert_eq!(engine.state(), PlaybackState::Transitioning);

        engine.skip(now);

        assert_eq!(current_id(&engine), Some("3"));
        assert_eq!(engine.state(), PlaybackState::Playing, "incoming track had not advanced, so no fade");
    }

    #[test]
    fn test_loading_timeout() {
        let outputs = [MemoryOutput::new().deferred(), MemoryOutput::new().deferred()];
        let (mut engine, _events) = engine_with(outputs);
        let now = Instant::now();

        engine.enqueue(vec![track("1")], now);
        assert_eq!(engine.state(), PlaybackState::Transitioning);

        engine.tick(now + Duration::from_millis(2499));
        assert_eq!(engine.state(), PlaybackState::Transitioning);

        engine.tick(now + Duration::from_millis(2500));
        assert_eq!(engine.state(), PlaybackState::Playing, "plays anyway after the timeout");
    }

    #[test]
    fn test_can_play_event() {
        let outputs = [MemoryOutput::new().deferred(), MemoryOutput::new().deferred()];
        let (mut engine, _events) = engine_with(outputs);
        let now = Instant::now();

        engine.enqueue(vec![track("1")], now);

        engine.output_mut(SlotIndex::B).mark_ready();
        engine.handle_event(OutputEvent::new(SlotIndex::B, OutputEventKind::CanPlay), now);

        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(engine.active_slot(), SlotIndex::B);
    }

    #[test]
    fn test_error_skips_after_delay() {
        let (mut engine, events) = engine();
        let now = Instant::now();

        engine.enqueue(vec![track("1"), track("2")], now);

        let slot = engine.active_slot();
        engine.handle_event(
            OutputEvent::new(slot, OutputEventKind::Error("decode".to_string())),
            now,
        );

        assert!(events
            .try_iter()
            .any(|e| matches!(e, SessionEvent::Status { .. })));

        assert_eq!(engine.next_deadline(), Some(now + Duration::from_millis(700)));

        engine.tick(now + Duration::from_millis(699));
        assert_eq!(current_id(&engine), Some("1"));

        engine.tick(now + Duration::from_millis(700));
        assert_eq!(current_id(&engine), Some("2"));
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn test_preload_error_drops_preload() {
        let (mut engine, _events) = engine();
        let now = Instant::now();

        engine.enqueue(vec![track("1"), track("2")], now);

        let idle = engine.active_slot().other();
        engine.handle_event(
            OutputEvent::new(idle, OutputEventKind::Error("404".to_string())),
            now,
        );

        assert_eq!(engine.output(idle).source(), None);
        assert_eq!(engine.next_deadline(), None, "current track keeps playing");
    }

    #[test]
    fn test_queue_exhausted() {
        let (mut engine, events) = engine();
        let now = Instant::now();

        engine.enqueue(vec![track("1")], now);
        engine.skip(now);

        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.current(), None);
        assert!(events
            .try_iter()
            .any(|e| e == SessionEvent::PlaybackStopped));
    }

    #[test]
    fn test_prefetch_check() {
        let (mut engine, _events) = engine();
        let now = Instant::now();

        assert!(!engine.needs_prefetch(), "nothing is playing");

        engine.enqueue(vec![track("1"), track("2")], now);
        active(&mut engine).set_duration(Some(200.));

        active(&mut engine).set_position(189.);
        assert!(!engine.needs_prefetch(), "11 seconds left");

        active(&mut engine).set_position(192.);
        assert!(engine.monitor(now), "8 seconds left with a queue of 1");

        engine.enqueue(vec![track("3")], now);
        assert!(!engine.needs_prefetch(), "queue holds enough");

        active(&mut engine).set_duration(None);
        assert!(!engine.needs_prefetch(), "unknown duration");
    }

    #[test]
    fn test_blocked_playback_waits_for_gesture() {
        let outputs = [MemoryOutput::new().blocked(), MemoryOutput::new().blocked()];
        let (mut engine, events) = engine_with(outputs);
        let now = Instant::now();

        engine.enqueue(vec![track("1")], now);

        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(engine.active_slot(), SlotIndex::B, "swapped even though play failed");
        assert!(engine.output(SlotIndex::B).is_paused());

        let prompts = events
            .try_iter()
            .filter(|e| matches!(e, SessionEvent::GestureRequired { .. }))
            .count();
        assert_eq!(prompts, 1);

        assert_eq!(engine.unlock(GestureKind::Click), UnlockOutcome::Blocked);
        assert!(!engine.is_unlocked(), "next gesture tries again");

        engine.output_mut(SlotIndex::A).allow();
        engine.output_mut(SlotIndex::B).allow();

        assert_eq!(engine.unlock(GestureKind::KeyDown), UnlockOutcome::Unlocked);
        assert!(!engine.output(SlotIndex::B).is_paused(), "waiting track resumed");

        assert_eq!(
            engine.unlock(GestureKind::PointerDown),
            UnlockOutcome::AlreadyUnlocked
        );
    }

    #[test]
    fn test_unlock_borrows_fallback_source() {
        let (mut engine, _events) = engine();

        assert_eq!(engine.unlock(GestureKind::TouchStart), UnlockOutcome::Unlocked);

        assert_eq!(engine.output(SlotIndex::A).source(), None, "fallback was removed");
        assert_eq!(engine.output(SlotIndex::B).source(), None);
        assert!(engine.output(SlotIndex::A).is_paused());
        assert_eq!(engine.output(SlotIndex::A).loads(), 1, "fallback was loaded");
    }

    #[test]
    fn test_introspection() {
        let (mut engine, _events) = engine();
        let now = Instant::now();

        engine.enqueue(vec![track("1"), track("2")], now);

        let introspection = engine.introspect();

        assert_eq!(introspection.state, PlaybackState::Playing);
        assert_eq!(introspection.current.as_deref(), Some("1"));
        assert_eq!(introspection.queue, vec!["2".to_string()]);
        assert_eq!(introspection.active_slot, SlotIndex::B);
    }
}
