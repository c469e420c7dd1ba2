//! Playback transport: a cooperative loop that advances the playhead one
//! fixed step per scheduled tick.
//!
//! The loop never holds more than one pending tick. Ticks that arrive
//! after a cancel are recognised by id and ignored.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;
use viarte_core::{Result, ViarteError};

use crate::editor::EditorState;

/// Handle for one scheduled tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickId(pub u64);

/// Source of animation ticks.
pub trait TickScheduler {
    /// Request one future tick.
    fn schedule(&mut self) -> TickId;
    /// Withdraw a tick that has not fired yet.
    fn cancel(&mut self, id: TickId);
}

/// Scheduler whose ticks are fired by hand, in request order.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    queue: VecDeque<TickId>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticks requested and not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Fire the oldest pending tick.
    pub fn fire(&mut self) -> Option<TickId> {
        self.queue.pop_front()
    }
}

impl TickScheduler for ManualScheduler {
    fn schedule(&mut self) -> TickId {
        let id = TickId(self.next_id);
        self.next_id += 1;
        self.queue.push_back(id);
        id
    }

    fn cancel(&mut self, id: TickId) {
        self.queue.retain(|queued| *queued != id);
    }
}

/// What a tick did to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Playhead moved and another tick is pending.
    Advanced,
    /// Playhead reached the end; playback was stopped.
    Finished,
    /// Playback was already stopped; nothing moved.
    Idle,
    /// The tick was cancelled or superseded.
    Stale,
}

/// How [`PlaybackLoop::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    Stopped,
    Shutdown,
}

/// Playback state machine over a [`TickScheduler`].
#[derive(Debug)]
pub struct PlaybackLoop<S: TickScheduler> {
    scheduler: S,
    pending: Option<TickId>,
    step: f64,
    period: Duration,
}

impl PlaybackLoop<ManualScheduler> {
    /// Loop driven by a [`ManualScheduler`].
    pub fn manual(step: f64) -> Result<Self> {
        Self::new(ManualScheduler::new(), step)
    }
}

impl<S: TickScheduler> PlaybackLoop<S> {
    /// `step` is the playhead advance per tick, in seconds. It must be
    /// finite and positive.
    pub fn new(scheduler: S, step: f64) -> Result<Self> {
        let period = Duration::try_from_secs_f64(step)
            .ok()
            .filter(|p| !p.is_zero())
            .ok_or_else(|| {
                ViarteError::InvalidParameter(format!("tick step must be positive, got {}", step))
            })?;
        Ok(Self {
            scheduler,
            pending: None,
            step,
            period,
        })
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn pending_tick(&self) -> Option<TickId> {
        self.pending
    }

    /// Reconcile with the editor's play flag: schedule a tick when playing
    /// with none pending, cancel the pending tick when stopped.
    pub fn sync(&mut self, editor: &EditorState) {
        match (editor.is_playing(), self.pending) {
            (true, None) => {
                debug!(time = editor.current_time(), "Playback started");
                self.pending = Some(self.scheduler.schedule());
            }
            (false, Some(_)) => self.cancel(),
            _ => {}
        }
    }

    /// Cancel the pending tick, if any.
    pub fn cancel(&mut self) {
        if let Some(id) = self.pending.take() {
            self.scheduler.cancel(id);
            debug!(tick = id.0, "Playback tick cancelled");
        }
    }

    /// Handle a fired tick.
    pub fn on_tick(&mut self, id: TickId, editor: &mut EditorState) -> TickOutcome {
        if self.pending != Some(id) {
            return TickOutcome::Stale;
        }
        self.pending = None;
        self.scheduler.cancel(id);

        if !editor.is_playing() {
            return TickOutcome::Idle;
        }

        let total = editor.total_duration();
        let next = (editor.current_time() + self.step).min(total);
        editor.set_playhead(next);

        if next >= total {
            editor.set_playing(false);
            debug!(time = next, "Playback reached end");
            TickOutcome::Finished
        } else {
            self.pending = Some(self.scheduler.schedule());
            TickOutcome::Advanced
        }
    }

    /// Drive playback on a timer, one tick every `step` seconds, until it
    /// finishes, is stopped, or `shutdown` fires (or its sender is dropped).
    pub async fn run(
        &mut self,
        editor: &mut EditorState,
        mut shutdown: watch::Receiver<bool>,
    ) -> RunOutcome {
        let period = self.period;
        self.sync(editor);

        loop {
            if *shutdown.borrow() {
                self.cancel();
                return RunOutcome::Shutdown;
            }
            let Some(id) = self.pending else {
                return RunOutcome::Stopped;
            };

            tokio::select! {
                _ = tokio::time::sleep(period) => {
                    match self.on_tick(id, editor) {
                        TickOutcome::Finished => return RunOutcome::Finished,
                        TickOutcome::Idle => return RunOutcome::Stopped,
                        TickOutcome::Advanced | TickOutcome::Stale => {}
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.cancel();
                        return RunOutcome::Shutdown;
                    }
                }
            }
        }
    }
}

impl<S: TickScheduler> Drop for PlaybackLoop<S> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viarte_core::EditorConfig;

    fn editor_with(total: f64, start: f64) -> EditorState {
        let mut editor = EditorState::new(EditorConfig {
            total_duration: total,
            ..EditorConfig::default()
        });
        editor.set_playhead(start);
        editor
    }

    #[test]
    fn test_no_tick_while_paused() {
        let editor = editor_with(1.0, 0.0);
        let mut playback = PlaybackLoop::manual(1.0 / 60.0).unwrap();
        playback.sync(&editor);
        assert_eq!(playback.scheduler().pending(), 0);
    }

    #[test]
    fn test_single_pending_tick() {
        let mut editor = editor_with(10.0, 0.0);
        editor.set_playing(true);
        let mut playback = PlaybackLoop::manual(0.5).unwrap();
        playback.sync(&editor);
        playback.sync(&editor);
        assert_eq!(playback.scheduler().pending(), 1);

        let id = playback.scheduler_mut().fire().unwrap();
        assert_eq!(playback.on_tick(id, &mut editor), TickOutcome::Advanced);
        assert_eq!(editor.current_time(), 0.5);
        assert_eq!(playback.scheduler().pending(), 1);
    }

    #[test]
    fn test_stop_cancels_and_ignores_stale_tick() {
        let mut editor = editor_with(10.0, 0.0);
        editor.set_playing(true);
        let mut playback = PlaybackLoop::manual(0.5).unwrap();
        playback.sync(&editor);
        let stale = playback.pending_tick().unwrap();

        editor.set_playing(false);
        playback.sync(&editor);
        assert_eq!(playback.scheduler().pending(), 0);
        assert_eq!(playback.on_tick(stale, &mut editor), TickOutcome::Stale);
        assert_eq!(editor.current_time(), 0.0);
    }

    #[test]
    fn test_terminates_near_end() {
        let mut editor = editor_with(1.0, 0.99);
        editor.set_playing(true);
        let step = 1.0 / 60.0;
        let mut playback = PlaybackLoop::manual(step).unwrap();
        playback.sync(&editor);

        while let Some(id) = playback.scheduler_mut().fire() {
            playback.on_tick(id, &mut editor);
        }
        assert!(!editor.is_playing());
        assert!(editor.current_time() <= 1.0 + step);
    }

    #[test]
    fn test_fired_tick_leaves_scheduler_queue() {
        let mut editor = editor_with(10.0, 0.0);
        editor.set_playing(true);
        let mut playback = PlaybackLoop::manual(0.5).unwrap();
        playback.sync(&editor);

        // A timer-driven tick is handled without being popped first.
        for _ in 0..5 {
            let id = playback.pending_tick().unwrap();
            assert_eq!(playback.on_tick(id, &mut editor), TickOutcome::Advanced);
            assert_eq!(playback.scheduler().pending(), 1);
        }
        editor.set_playing(false);
        playback.sync(&editor);
        assert_eq!(playback.scheduler().pending(), 0);
    }

    #[test]
    fn test_rejects_unusable_step() {
        for step in [0.0, -0.1, f64::NAN, f64::INFINITY] {
            assert!(PlaybackLoop::manual(step).is_err(), "step {}", step);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_plays_to_end() {
        let mut editor = editor_with(1.0, 0.0);
        editor.set_playing(true);
        let (_tx, rx) = watch::channel(false);
        let mut playback = PlaybackLoop::manual(1.0 / 60.0).unwrap();

        let outcome = playback.run(&mut editor, rx).await;
        assert_eq!(outcome, RunOutcome::Finished);
        assert!(!editor.is_playing());
        assert_eq!(editor.current_time(), 1.0);
        assert!(playback.pending_tick().is_none());
        assert_eq!(playback.scheduler().pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_honours_shutdown() {
        let mut editor = editor_with(30.0, 0.0);
        editor.set_playing(true);
        let (tx, rx) = watch::channel(false);
        let mut playback = PlaybackLoop::manual(1.0 / 60.0).unwrap();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let _ = tx.send(true);
        });

        let outcome = playback.run(&mut editor, rx).await;
        assert_eq!(outcome, RunOutcome::Shutdown);
        assert!(editor.current_time() < 1.0);
        assert_eq!(playback.scheduler().pending(), 0);
    }
}
