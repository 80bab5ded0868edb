use std::{sync::Arc, time::Duration};

use crossbeam::atomic::AtomicCell;
use log::{debug, warn};
use moodify_core::{AudioOutput, OutputError, OutputEvent, OutputEventKind, SlotIndex};
use parking_lot::Mutex;
use tokio::{
    runtime::Handle,
    sync::mpsc::UnboundedSender,
    time::{sleep, Instant},
};

use crate::SourceLocator;

/// An output that keeps time like a real player would, without producing any sound.
///
/// Loading a source fetches and probes it in the background to learn its length.
/// Once playing, the output reports the end of the source when its length has elapsed.
pub struct ClockedOutput {
    slot: SlotIndex,
    rt: Handle,
    locator: Arc<SourceLocator>,
    events: UnboundedSender<OutputEvent>,
    source: Option<String>,
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    clock: Mutex<Clock>,
    duration: AtomicCell<Option<f32>>,
    ready: AtomicCell<bool>,
    volume: AtomicCell<f32>,
    /// Increases every time the source changes
    generation: AtomicCell<u64>,
    /// Increases every time the clock is started, stopped, or moved
    epoch: AtomicCell<u64>,
}

impl Shared {
    /// Changes the clock and invalidates every end watcher started before.
    /// Returns the epoch for watchers started after.
    fn update<F>(&self, change: F) -> u64
    where
        F: FnOnce(&mut Clock),
    {
        let mut clock = self.clock.lock();
        change(&mut clock);

        self.epoch.fetch_add(1) + 1
    }
}

#[derive(Debug, Default)]
struct Clock {
    offset: f32,
    started_at: Option<Instant>,
}

impl Clock {
    fn position(&self) -> f32 {
        let elapsed = self
            .started_at
            .map(|s| s.elapsed().as_secs_f32())
            .unwrap_or_default();

        self.offset + elapsed
    }

    fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        self.offset = self.position();
        self.started_at = None;
    }

    fn stop_at(&mut self, position: f32) {
        self.offset = position;
        self.started_at = None;
    }

    fn rewind(&mut self) {
        self.offset = 0.;

        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }
}

impl ClockedOutput {
    /// Creates an output that reports its events as `slot`.
    /// Must be called within a tokio runtime.
    pub fn new(
        slot: SlotIndex,
        locator: Arc<SourceLocator>,
        events: UnboundedSender<OutputEvent>,
    ) -> Self {
        let shared = Shared {
            volume: AtomicCell::new(1.),
            ..Default::default()
        };

        Self {
            slot,
            rt: Handle::current(),
            locator,
            events,
            source: None,
            shared: Arc::new(shared),
        }
    }

    /// Creates the two outputs a session needs.
    pub fn pair(locator: Arc<SourceLocator>, events: UnboundedSender<OutputEvent>) -> [Self; 2] {
        [
            Self::new(SlotIndex::A, locator.clone(), events.clone()),
            Self::new(SlotIndex::B, locator, events),
        ]
    }

    fn watch_end(&self, epoch: u64) {
        self.rt.spawn(watch_end(
            self.slot,
            self.shared.clone(),
            self.events.clone(),
            epoch,
        ));
    }
}

impl AudioOutput for ClockedOutput {
    fn load(&mut self, source: &str) {
        let generation = self.shared.generation.fetch_add(1) + 1;

        self.shared.ready.store(false);
        self.shared.duration.store(None);
        self.shared.update(|clock| *clock = Clock::default());
        self.source = Some(source.to_string());

        debug!("Output {} is loading {}", self.slot, source);

        let slot = self.slot;
        let source = source.to_string();
        let locator = self.locator.clone();
        let shared = self.shared.clone();
        let events = self.events.clone();

        self.rt.spawn(async move {
            let result = locator.probe(&source).await;

            // Another source was loaded in the meantime.
            if shared.generation.load() != generation {
                return;
            }

            let duration = match result {
                Ok(duration) => duration,
                Err(e) => {
                    warn!("Output {} could not load {}: {}", slot, source, e);
                    let _ = events.send(OutputEvent::new(slot, OutputEventKind::Error(e.to_string())));
                    return;
                }
            };

            debug!("Output {} loaded {} ({:.1}s)", slot, source, duration);

            shared.duration.store(Some(duration));
            shared.ready.store(true);

            let _ = events.send(OutputEvent::new(slot, OutputEventKind::CanPlay));

            // Playback may have been started before the length was known.
            let epoch = shared.epoch.load();
            watch_end(slot, shared, events, epoch).await;
        });
    }

    fn unload(&mut self) {
        self.shared.generation.fetch_add(1);

        self.shared.ready.store(false);
        self.shared.duration.store(None);
        self.shared.update(|clock| *clock = Clock::default());
        self.source = None;
    }

    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn is_ready(&self) -> bool {
        self.shared.ready.load()
    }

    fn play(&mut self) -> Result<(), OutputError> {
        if self.source.is_none() {
            return Err(OutputError::NoSource);
        }

        let epoch = self.shared.update(Clock::start);
        self.watch_end(epoch);

        Ok(())
    }

    fn pause(&mut self) {
        self.shared.update(Clock::stop);
    }

    fn rewind(&mut self) {
        let epoch = self.shared.update(Clock::rewind);
        self.watch_end(epoch);
    }

    fn is_paused(&self) -> bool {
        !self.shared.clock.lock().is_running()
    }

    fn position(&self) -> f32 {
        let position = self.shared.clock.lock().position();

        match self.shared.duration.load() {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn duration(&self) -> Option<f32> {
        self.shared.duration.load()
    }

    fn volume(&self) -> f32 {
        self.shared.volume.load()
    }

    fn set_volume(&mut self, volume: f32) {
        self.shared.volume.store(volume.clamp(0., 1.));
    }
}

/// Waits until the source has played to its end, then stops the clock and reports it.
/// Does nothing if the clock was changed after `epoch` was handed out.
async fn watch_end(
    slot: SlotIndex,
    shared: Arc<Shared>,
    events: UnboundedSender<OutputEvent>,
    epoch: u64,
) {
    let (duration, remaining) = {
        let clock = shared.clock.lock();

        if shared.epoch.load() != epoch || !clock.is_running() {
            return;
        }

        let Some(duration) = shared.duration.load() else {
            return;
        };

        (duration, (duration - clock.position()).max(0.))
    };

    sleep(Duration::from_secs_f32(remaining)).await;

    {
        let mut clock = shared.clock.lock();

        if shared.epoch.load() != epoch {
            return;
        }

        clock.stop_at(duration);
        shared.epoch.fetch_add(1);
    }

    let _ = events.send(OutputEvent::new(slot, OutputEventKind::Ended));
}
