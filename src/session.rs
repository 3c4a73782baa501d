//! Session lifecycle and pipeline wiring.
//!
//! A session is one listening episode. All mutable pipeline state (the
//! segment store, the id counter, the segmentation policy, the playback
//! scheduler) is owned by a single loop task; recognition results, synthesis
//! outcomes, playback outcomes, timer ticks, and host commands all arrive as
//! messages, so no locks guard the store.

use crate::bus::{EventBus, SessionEvent};
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::defaults;
use crate::enhance::{NoopEnhancer, TranslationEnhancer, improve_or_fallback};
use crate::error::{ParloError, Result};
use crate::output::AudioOutput;
use crate::platform::{RecognitionEvent, RecognitionHandle, SpeechPlatform};
use crate::scheduler::{PlaybackOutcome, PlaybackScheduler};
use crate::segment::{Segment, SegmentStatus, SegmentStore};
use crate::segmenter::{PeriodicSegmenter, SegmentationPolicy};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Commands accepted by the session loop.
enum SessionCommand {
    SetCaptureWhileSpeaking(bool),
    Stop,
}

/// Result of one enhancement+synthesis task.
struct SynthesisOutcome {
    id: u64,
    text: String,
    result: Result<Vec<u8>>,
}

struct ActiveSession {
    commands: mpsc::Sender<SessionCommand>,
    recognition: RecognitionHandle,
    loop_handle: JoinHandle<()>,
}

struct ControllerState {
    config: SessionConfig,
    disposed: bool,
    active: Option<ActiveSession>,
}

/// Owns session lifecycle and wires the speech platform, audio output, and
/// enhancer into the segment pipeline.
///
/// Constructed per host with injected collaborators; there is no process-wide
/// shared instance.
pub struct SessionController {
    bus: Arc<EventBus>,
    platform: Arc<dyn SpeechPlatform>,
    audio: Arc<dyn AudioOutput>,
    enhancer: Arc<dyn TranslationEnhancer>,
    clock: Arc<dyn Clock>,
    state: Mutex<ControllerState>,
}

impl SessionController {
    /// Creates a controller with the given configuration and collaborators.
    pub fn new(
        config: SessionConfig,
        platform: Arc<dyn SpeechPlatform>,
        audio: Arc<dyn AudioOutput>,
    ) -> Self {
        Self {
            bus: Arc::new(EventBus::new()),
            platform,
            audio,
            enhancer: Arc::new(NoopEnhancer),
            clock: Arc::new(SystemClock),
            state: Mutex::new(ControllerState {
                config,
                disposed: false,
                active: None,
            }),
        }
    }

    /// Sets the translation enhancer used between translation and synthesis.
    pub fn with_enhancer(mut self, enhancer: Arc<dyn TranslationEnhancer>) -> Self {
        self.enhancer = enhancer;
        self
    }

    /// Sets a custom clock (for deterministic testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The event bus hosts subscribe to for pipeline progress.
    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    /// True while a session is running.
    pub async fn is_active(&self) -> bool {
        self.state.lock().await.active.is_some()
    }

    /// Replaces the configuration for the next session.
    ///
    /// Rejected while a session is active: languages and timing must not
    /// change under a live pipeline.
    pub async fn configure(&self, config: SessionConfig) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.active.is_some() {
            return Err(ParloError::Session {
                message: "cannot reconfigure while a session is active".to_string(),
            });
        }
        state.config = config;
        Ok(())
    }

    /// Starts a listening session.
    ///
    /// Fails when platform credentials are missing from the configuration.
    /// Calling start while a session is already active logs a warning and
    /// returns Ok, tolerating duplicate host triggers: no second session is
    /// created and the id counter is untouched.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.disposed {
            return Err(ParloError::Session {
                message: "controller is disposed".to_string(),
            });
        }
        if state.active.is_some() {
            warn!("start() called while a session is already active; ignoring");
            return Ok(());
        }
        state.config.validate()?;

        let config = state.config.clone();
        let capture_while_speaking = config.segmentation.capture_while_speaking;

        let (recognition_tx, recognition_rx) = mpsc::channel(defaults::RECOGNITION_BUFFER);
        let recognition = self
            .platform
            .start_recognition(
                &config.languages.source,
                &config.languages.target,
                recognition_tx,
            )
            .await?;

        let (command_tx, command_rx) = mpsc::channel(defaults::COMMAND_BUFFER);
        let (synth_tx, synth_rx) = mpsc::channel(defaults::PIPELINE_BUFFER);
        let (playback_tx, playback_rx) = mpsc::channel(defaults::PIPELINE_BUFFER);
        let (tick_tx, tick_rx) = mpsc::channel(defaults::TICK_BUFFER);

        let mut runtime = SessionRuntime {
            source_language: config.languages.source.clone(),
            target_language: config.languages.target.clone(),
            bus: self.bus.clone(),
            platform: self.platform.clone(),
            enhancer: self.enhancer.clone(),
            clock: self.clock.clone(),
            epoch: self.clock.now(),
            store: SegmentStore::new(),
            next_id: 0,
            scheduler: PlaybackScheduler::new(self.audio.clone(), playback_tx),
            policy: SegmentationPolicy::new(capture_while_speaking),
            segmenter: PeriodicSegmenter::new(config.segment_interval()),
            synth_tx,
            tick_tx: tick_tx.clone(),
        };
        if capture_while_speaking {
            runtime.segmenter.start(tick_tx);
        }

        self.bus.publish(SessionEvent::SessionStarted {
            source_language: config.languages.source.clone(),
            target_language: config.languages.target.clone(),
        });

        let loop_handle =
            tokio::spawn(runtime.run(command_rx, recognition_rx, synth_rx, playback_rx, tick_rx));

        state.active = Some(ActiveSession {
            commands: command_tx,
            recognition,
            loop_handle,
        });
        Ok(())
    }

    /// Ends the active session. Idempotent: a no-op when nothing is running.
    ///
    /// In-flight synthesis and playback for unplayed segments is abandoned,
    /// never awaited or retried. When this returns, the forced-segmentation
    /// timer is inert and exactly one `SessionEnded` has been published.
    pub async fn stop(&self) -> Result<()> {
        let active = self.state.lock().await.active.take();
        let Some(active) = active else {
            return Ok(());
        };
        self.teardown(active).await;
        Ok(())
    }

    /// Toggles capture-while-speaking.
    ///
    /// With an active session this starts or stops the forced-segmentation
    /// timer; the setting also persists into the next session. The change is
    /// announced with `SimultaneousCaptureChanged`.
    pub async fn enable_capturing_while_speaking(&self, enabled: bool) {
        let mut state = self.state.lock().await;
        let changed = state.config.segmentation.capture_while_speaking != enabled;
        state.config.segmentation.capture_while_speaking = enabled;
        match &state.active {
            Some(active) => {
                let _ = active
                    .commands
                    .send(SessionCommand::SetCaptureWhileSpeaking(enabled))
                    .await;
            }
            None => {
                if changed {
                    self.bus
                        .publish(SessionEvent::SimultaneousCaptureChanged { enabled });
                }
            }
        }
    }

    /// Releases held resources exactly once; safe to call multiple times.
    ///
    /// Any active session is stopped and the recognizer handle dropped.
    /// A disposed controller refuses further `start()` calls.
    pub async fn dispose(&self) {
        let active = {
            let mut state = self.state.lock().await;
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.active.take()
        };
        if let Some(active) = active {
            self.teardown(active).await;
        }
    }

    async fn teardown(&self, active: ActiveSession) {
        if let Err(e) = self.platform.stop_recognition(active.recognition).await {
            warn!("failed to stop continuous recognition: {e}");
        }
        let _ = active.commands.send(SessionCommand::Stop).await;
        if let Err(e) = active.loop_handle.await {
            warn!("session loop task failed: {e}");
        }
    }
}

/// Mutable pipeline state owned by the session loop.
struct SessionRuntime {
    source_language: String,
    target_language: String,
    bus: Arc<EventBus>,
    platform: Arc<dyn SpeechPlatform>,
    enhancer: Arc<dyn TranslationEnhancer>,
    clock: Arc<dyn Clock>,
    epoch: Instant,
    store: SegmentStore,
    next_id: u64,
    scheduler: PlaybackScheduler,
    policy: SegmentationPolicy,
    segmenter: PeriodicSegmenter,
    synth_tx: mpsc::Sender<SynthesisOutcome>,
    tick_tx: mpsc::Sender<()>,
}

impl SessionRuntime {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut recognition: mpsc::Receiver<RecognitionEvent>,
        mut synthesis: mpsc::Receiver<SynthesisOutcome>,
        mut playback: mpsc::Receiver<PlaybackOutcome>,
        mut ticks: mpsc::Receiver<()>,
    ) {
        // The synthesis, playback, and tick senders are owned by this
        // runtime, so those arms can never observe a closed channel.
        let mut recognition_open = true;
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::SetCaptureWhileSpeaking(enabled)) => {
                        self.set_capture_while_speaking(enabled).await;
                    }
                    Some(SessionCommand::Stop) | None => break,
                },
                event = recognition.recv(), if recognition_open => match event {
                    Some(event) => self.handle_recognition(event),
                    None => recognition_open = false,
                },
                Some(outcome) = synthesis.recv() => self.handle_synthesis(outcome),
                Some(outcome) = playback.recv() => self.handle_playback(outcome),
                Some(()) = ticks.recv() => self.handle_tick(),
            }
        }
        self.shutdown().await;
    }

    fn handle_recognition(&mut self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Recognizing { text } => {
                debug!("interim hypothesis: {text}");
            }
            RecognitionEvent::Recognized {
                original,
                translated,
            } => self.create_segment(original, translated),
            RecognitionEvent::Canceled { reason } => {
                // The platform dropped this recognition; the session keeps
                // processing already-created segments.
                warn!("recognition canceled by platform: {reason}");
            }
            RecognitionEvent::SessionStarted => debug!("platform recognition session opened"),
            RecognitionEvent::SessionStopped => debug!("platform recognition session closed"),
        }
    }

    /// One finalized recognition+translation result becomes one segment.
    fn create_segment(&mut self, original: String, translated: String) {
        let forced = self.policy.take_boundary();
        let id = self.next_id;
        self.next_id += 1;
        let timestamp = self.clock.now().saturating_duration_since(self.epoch);
        debug!(id, forced, ?timestamp, "segment created");

        let mut segment = Segment::new(id, timestamp);
        segment.original_text = Some(original.clone());

        if translated.trim().is_empty() {
            // Nothing to synthesize: the segment dies before any request.
            self.bus.publish(SessionEvent::SegmentCreated {
                segment: segment.clone(),
            });
            segment.transition(SegmentStatus::Error);
            self.bus.publish(SessionEvent::SegmentError {
                segment,
                error: "platform returned an empty translation".to_string(),
            });
            return;
        }

        segment.translated_text = Some(translated.clone());
        self.bus.publish(SessionEvent::SegmentCreated {
            segment: segment.clone(),
        });
        segment.transition(SegmentStatus::Synthesizing);
        self.bus.publish(SessionEvent::SegmentUpdated {
            segment: segment.clone(),
        });
        self.store.insert(segment);

        let enhancer = self.enhancer.clone();
        let platform = self.platform.clone();
        let synth_tx = self.synth_tx.clone();
        let source = self.source_language.clone();
        let target = self.target_language.clone();
        tokio::spawn(async move {
            let text =
                improve_or_fallback(enhancer.as_ref(), &original, &translated, &source, &target)
                    .await;
            let result = platform.synthesize(&text, &target).await;
            let _ = synth_tx.send(SynthesisOutcome { id, text, result }).await;
        });
    }

    fn handle_synthesis(&mut self, outcome: SynthesisOutcome) {
        let Some(segment) = self.store.get_mut(outcome.id) else {
            debug!(id = outcome.id, "synthesis outcome for abandoned segment");
            return;
        };
        match outcome.result {
            Ok(audio) => {
                segment.translated_text = Some(outcome.text);
                segment.audio = Some(audio);
                segment.transition(SegmentStatus::Playing);
                let snapshot = segment.clone();
                self.bus
                    .publish(SessionEvent::SegmentUpdated { segment: snapshot });
            }
            Err(error) => {
                segment.transition(SegmentStatus::Error);
                let snapshot = segment.clone();
                self.store.remove(outcome.id);
                self.bus.publish(SessionEvent::SegmentError {
                    segment: snapshot,
                    error: error.to_string(),
                });
            }
        }
        // Either a segment became ready or a failed head left the queue;
        // both can unblock playback.
        self.scheduler.try_dispatch(&self.store);
    }

    fn handle_playback(&mut self, outcome: PlaybackOutcome) {
        self.scheduler.finish(outcome.id);
        if let Some(mut segment) = self.store.remove(outcome.id) {
            match outcome.result {
                Ok(()) => {
                    segment.transition(SegmentStatus::Completed);
                    self.bus.publish(SessionEvent::SegmentCompleted { segment });
                }
                Err(error) => {
                    segment.transition(SegmentStatus::Error);
                    self.bus.publish(SessionEvent::SegmentError {
                        segment,
                        error: error.to_string(),
                    });
                }
            }
        }
        self.scheduler.try_dispatch(&self.store);
    }

    fn handle_tick(&mut self) {
        if self.policy.on_tick(self.scheduler.is_playing()) {
            debug!("forced segment boundary armed");
        }
    }

    async fn set_capture_while_speaking(&mut self, enabled: bool) {
        if enabled == self.policy.capture_while_speaking() {
            return;
        }
        self.policy.set_capture_while_speaking(enabled);
        if enabled {
            self.segmenter.start(self.tick_tx.clone());
        } else {
            self.segmenter.stop().await;
        }
        self.bus
            .publish(SessionEvent::SimultaneousCaptureChanged { enabled });
    }

    async fn shutdown(&mut self) {
        // The timer must be inert before the end of session is announced.
        self.segmenter.stop().await;
        debug!(
            in_flight = self.store.len(),
            forced_boundaries = self.policy.forced_boundaries(),
            "session loop shutting down"
        );
        self.bus.publish(SessionEvent::SessionEnded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventKind;
    use crate::enhance::MockEnhancer;
    use crate::output::MockAudioOutput;
    use crate::platform::MockSpeechPlatform;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn test_config() -> SessionConfig {
        let mut config = SessionConfig::default();
        config.platform.api_key = Some("test-key".to_string());
        config.segmentation.interval_ms = 50;
        config
    }

    struct Harness {
        controller: SessionController,
        platform: Arc<MockSpeechPlatform>,
        output: Arc<MockAudioOutput>,
        events: Arc<StdMutex<Vec<SessionEvent>>>,
    }

    fn harness(platform: MockSpeechPlatform, output: MockAudioOutput) -> Harness {
        harness_with(test_config(), platform, output, None)
    }

    fn harness_with(
        config: SessionConfig,
        platform: MockSpeechPlatform,
        output: MockAudioOutput,
        enhancer: Option<Arc<dyn TranslationEnhancer>>,
    ) -> Harness {
        let platform = Arc::new(platform);
        let output = Arc::new(output);
        let mut controller = SessionController::new(config, platform.clone(), output.clone());
        if let Some(enhancer) = enhancer {
            controller = controller.with_enhancer(enhancer);
        }

        let events = Arc::new(StdMutex::new(Vec::new()));
        for kind in EventKind::ALL {
            let sink = events.clone();
            controller.bus().subscribe(kind, move |event| {
                sink.lock().unwrap().push(event.clone());
            });
        }

        Harness {
            controller,
            platform,
            output,
            events,
        }
    }

    impl Harness {
        fn count(&self, kind: EventKind) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|event| event.kind() == kind)
                .count()
        }

        fn completed_ids(&self) -> Vec<u64> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|event| match event {
                    SessionEvent::SegmentCompleted { segment } => Some(segment.id),
                    _ => None,
                })
                .collect()
        }

        fn created_ids(&self) -> Vec<u64> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|event| match event {
                    SessionEvent::SegmentCreated { segment } => Some(segment.id),
                    _ => None,
                })
                .collect()
        }

        fn error_ids(&self) -> Vec<u64> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|event| match event {
                    SessionEvent::SegmentError { segment, .. } => Some(segment.id),
                    _ => None,
                })
                .collect()
        }

        async fn wait_until<F>(&self, deadline_ms: u64, predicate: F) -> bool
        where
            F: Fn(&Harness) -> bool,
        {
            let deadline =
                tokio::time::Instant::now() + Duration::from_millis(deadline_ms);
            loop {
                if predicate(self) {
                    return true;
                }
                if tokio::time::Instant::now() >= deadline {
                    return false;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        async fn wait_for_completions(&self, n: usize) -> bool {
            self.wait_until(2000, |h| h.count(EventKind::SegmentCompleted) >= n)
                .await
        }
    }

    #[tokio::test]
    async fn test_single_segment_full_lifecycle() {
        let h = harness(
            MockSpeechPlatform::new(),
            MockAudioOutput::new().with_play_duration(Duration::ZERO),
        );

        h.controller.start().await.unwrap();
        assert!(h.controller.is_active().await);
        assert!(h.platform.emit_recognized("good morning", "buenos dias").await);

        assert!(h.wait_for_completions(1).await);
        h.controller.stop().await.unwrap();

        // Per-segment causal order: created, synthesizing, playing, completed.
        let statuses: Vec<SegmentStatus> = h
            .events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                SessionEvent::SegmentCreated { segment }
                | SessionEvent::SegmentUpdated { segment }
                | SessionEvent::SegmentCompleted { segment } => Some(segment.status),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                SegmentStatus::Recognizing,
                SegmentStatus::Synthesizing,
                SegmentStatus::Playing,
                SegmentStatus::Completed,
            ]
        );
        assert_eq!(h.output.played_texts(), vec!["pcm:buenos dias"]);
    }

    #[tokio::test]
    async fn test_playback_order_follows_capture_order() {
        // Synthesis completes out of order (third, first, second); playback
        // must still follow capture order.
        let platform = MockSpeechPlatform::new()
            .with_synthesis_delay_for("uno", Duration::from_millis(90))
            .with_synthesis_delay_for("dos", Duration::from_millis(120))
            .with_synthesis_delay_for("tres", Duration::from_millis(30));
        let h = harness(
            platform,
            MockAudioOutput::new().with_play_duration(Duration::from_millis(5)),
        );

        h.controller.start().await.unwrap();
        h.platform.emit_recognized("one", "uno").await;
        h.platform.emit_recognized("two", "dos").await;
        h.platform.emit_recognized("three", "tres").await;

        assert!(h.wait_for_completions(3).await);
        h.controller.stop().await.unwrap();

        assert_eq!(h.completed_ids(), vec![0, 1, 2]);
        assert_eq!(
            h.output.played_texts(),
            vec!["pcm:uno", "pcm:dos", "pcm:tres"]
        );
    }

    #[tokio::test]
    async fn test_duplicate_start_is_noop() {
        let h = harness(
            MockSpeechPlatform::new(),
            MockAudioOutput::new().with_play_duration(Duration::ZERO),
        );

        h.controller.start().await.unwrap();
        h.platform.emit_recognized("one", "uno").await;
        assert!(h.wait_for_completions(1).await);

        // Second start: no error, no second session, counter untouched.
        h.controller.start().await.unwrap();
        h.platform.emit_recognized("two", "dos").await;
        assert!(h.wait_for_completions(2).await);
        h.controller.stop().await.unwrap();

        assert_eq!(h.count(EventKind::SessionStarted), 1);
        assert_eq!(h.created_ids(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_with_single_session_ended() {
        let h = harness(MockSpeechPlatform::new(), MockAudioOutput::new());

        h.controller.start().await.unwrap();
        h.controller.stop().await.unwrap();
        h.controller.stop().await.unwrap();

        // Give any stray timer or task a moment to misbehave.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.count(EventKind::SessionEnded), 1);
        assert!(!h.controller.is_active().await);
        assert!(!h.platform.is_recognizing());
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let h = harness(MockSpeechPlatform::new(), MockAudioOutput::new());
        h.controller.stop().await.unwrap();
        assert_eq!(h.count(EventKind::SessionEnded), 0);
    }

    #[tokio::test]
    async fn test_restart_resets_segment_ids() {
        let h = harness(
            MockSpeechPlatform::new(),
            MockAudioOutput::new().with_play_duration(Duration::ZERO),
        );

        h.controller.start().await.unwrap();
        h.platform.emit_recognized("one", "uno").await;
        h.platform.emit_recognized("two", "dos").await;
        assert!(h.wait_for_completions(2).await);
        h.controller.stop().await.unwrap();

        h.controller.start().await.unwrap();
        h.platform.emit_recognized("three", "tres").await;
        assert!(h.wait_for_completions(3).await);
        h.controller.stop().await.unwrap();

        assert_eq!(h.created_ids(), vec![0, 1, 0]);
        assert_eq!(h.count(EventKind::SessionStarted), 2);
        assert_eq!(h.count(EventKind::SessionEnded), 2);
    }

    #[tokio::test]
    async fn test_synthesis_failure_does_not_block_successor() {
        // Segment 0 fails synthesis late; segment 1 is ready long before.
        let platform = MockSpeechPlatform::new()
            .with_synthesis_delay_for("mal", Duration::from_millis(60))
            .with_synthesis_failure_for("mal");
        let h = harness(
            platform,
            MockAudioOutput::new().with_play_duration(Duration::ZERO),
        );

        h.controller.start().await.unwrap();
        h.platform.emit_recognized("bad", "mal").await;
        h.platform.emit_recognized("good", "bueno").await;

        assert!(h.wait_for_completions(1).await);
        h.controller.stop().await.unwrap();

        assert_eq!(h.error_ids(), vec![0]);
        assert_eq!(h.completed_ids(), vec![1]);
        assert_eq!(h.output.played_texts(), vec!["pcm:bueno"]);
    }

    #[tokio::test]
    async fn test_playback_failure_marks_error_and_continues() {
        let h = harness(
            MockSpeechPlatform::new(),
            MockAudioOutput::new()
                .with_play_duration(Duration::ZERO)
                .with_play_failure_for("uno"),
        );

        h.controller.start().await.unwrap();
        h.platform.emit_recognized("one", "uno").await;
        h.platform.emit_recognized("two", "dos").await;

        assert!(h.wait_for_completions(1).await);
        h.controller.stop().await.unwrap();

        assert_eq!(h.error_ids(), vec![0]);
        assert_eq!(h.completed_ids(), vec![1]);
        // Both segments reached the device; the first failed mid-output.
        assert_eq!(h.output.play_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_translation_errors_without_synthesis() {
        let h = harness(
            MockSpeechPlatform::new(),
            MockAudioOutput::new().with_play_duration(Duration::ZERO),
        );

        h.controller.start().await.unwrap();
        h.platform.emit_recognized("mumble", "").await;

        assert!(h.wait_until(1000, |h| h.count(EventKind::SegmentError) >= 1).await);
        h.controller.stop().await.unwrap();

        assert_eq!(h.error_ids(), vec![0]);
        assert_eq!(h.count(EventKind::SegmentCreated), 1);
        assert_eq!(h.count(EventKind::SegmentCompleted), 0);
        assert_eq!(h.output.play_count(), 0);
    }

    #[tokio::test]
    async fn test_enhancer_improves_translation_before_synthesis() {
        let h = harness_with(
            test_config(),
            MockSpeechPlatform::new(),
            MockAudioOutput::new().with_play_duration(Duration::ZERO),
            Some(Arc::new(MockEnhancer::new().with_suffix("!"))),
        );

        h.controller.start().await.unwrap();
        h.platform.emit_recognized("hello", "hola").await;
        assert!(h.wait_for_completions(1).await);
        h.controller.stop().await.unwrap();

        let completed = h.events.lock().unwrap().iter().find_map(|e| match e {
            SessionEvent::SegmentCompleted { segment } => Some(segment.clone()),
            _ => None,
        });
        let completed = completed.unwrap();
        assert_eq!(completed.translated_text.as_deref(), Some("hola !"));
        assert_eq!(h.output.played_texts(), vec!["pcm:hola !"]);
    }

    #[tokio::test]
    async fn test_enhancer_failure_falls_back_to_machine_translation() {
        let h = harness_with(
            test_config(),
            MockSpeechPlatform::new(),
            MockAudioOutput::new().with_play_duration(Duration::ZERO),
            Some(Arc::new(MockEnhancer::new().with_failure())),
        );

        h.controller.start().await.unwrap();
        h.platform.emit_recognized("hello", "hola").await;
        assert!(h.wait_for_completions(1).await);
        h.controller.stop().await.unwrap();

        // The enhancement failure never surfaces as a segment error.
        assert_eq!(h.count(EventKind::SegmentError), 0);
        assert_eq!(h.output.played_texts(), vec!["pcm:hola"]);
    }

    #[tokio::test]
    async fn test_interim_and_lifecycle_events_are_ignored() {
        let h = harness(
            MockSpeechPlatform::new(),
            MockAudioOutput::new().with_play_duration(Duration::ZERO),
        );

        h.controller.start().await.unwrap();
        h.platform
            .emit(RecognitionEvent::Recognizing {
                text: "good mor...".to_string(),
            })
            .await;
        h.platform.emit(RecognitionEvent::SessionStarted).await;
        h.platform
            .emit(RecognitionEvent::Canceled {
                reason: "transient network blip".to_string(),
            })
            .await;
        h.platform.emit_recognized("good morning", "buenos dias").await;

        assert!(h.wait_for_completions(1).await);
        h.controller.stop().await.unwrap();

        // Only the finalized result created a segment.
        assert_eq!(h.created_ids(), vec![0]);
    }

    #[tokio::test]
    async fn test_capture_toggle_publishes_changes_only() {
        let h = harness(MockSpeechPlatform::new(), MockAudioOutput::new());

        h.controller.start().await.unwrap();
        h.controller.enable_capturing_while_speaking(false).await;
        h.controller.enable_capturing_while_speaking(false).await;
        h.controller.enable_capturing_while_speaking(true).await;

        assert!(
            h.wait_until(1000, |h| {
                h.count(EventKind::SimultaneousCaptureChanged) >= 2
            })
            .await
        );
        h.controller.stop().await.unwrap();
        assert_eq!(h.count(EventKind::SimultaneousCaptureChanged), 2);
    }

    #[tokio::test]
    async fn test_capture_toggle_without_session() {
        let h = harness(MockSpeechPlatform::new(), MockAudioOutput::new());

        h.controller.enable_capturing_while_speaking(false).await;
        assert_eq!(h.count(EventKind::SimultaneousCaptureChanged), 1);

        // The setting persists into the next session.
        h.controller.enable_capturing_while_speaking(false).await;
        assert_eq!(h.count(EventKind::SimultaneousCaptureChanged), 1);
    }

    #[tokio::test]
    async fn test_configure_rejected_while_active() {
        let h = harness(MockSpeechPlatform::new(), MockAudioOutput::new());

        h.controller.start().await.unwrap();
        let result = h.controller.configure(test_config()).await;
        assert!(matches!(result, Err(ParloError::Session { .. })));

        h.controller.stop().await.unwrap();
        assert!(h.controller.configure(test_config()).await.is_ok());
    }

    #[tokio::test]
    async fn test_start_requires_platform_credentials() {
        let mut config = test_config();
        config.platform.api_key = None;
        let h = harness_with(
            config,
            MockSpeechPlatform::new(),
            MockAudioOutput::new(),
            None,
        );

        let result = h.controller.start().await;
        assert!(matches!(result, Err(ParloError::ConfigMissing { .. })));
        assert_eq!(h.count(EventKind::SessionStarted), 0);
        assert!(!h.controller.is_active().await);
    }

    #[tokio::test]
    async fn test_platform_start_failure_creates_no_session() {
        let h = harness(
            MockSpeechPlatform::new().with_start_failure(),
            MockAudioOutput::new(),
        );

        let result = h.controller.start().await;
        assert!(matches!(result, Err(ParloError::Recognition { .. })));
        assert_eq!(h.count(EventKind::SessionStarted), 0);
        assert!(!h.controller.is_active().await);
    }

    #[tokio::test]
    async fn test_dispose_releases_once_and_blocks_restart() {
        let h = harness(MockSpeechPlatform::new(), MockAudioOutput::new());

        h.controller.start().await.unwrap();
        h.controller.dispose().await;
        assert_eq!(h.count(EventKind::SessionEnded), 1);
        assert!(!h.platform.is_recognizing());

        // Safe to call again.
        h.controller.dispose().await;
        assert_eq!(h.count(EventKind::SessionEnded), 1);

        let result = h.controller.start().await;
        assert!(matches!(result, Err(ParloError::Session { .. })));
    }

    #[tokio::test]
    async fn test_completed_timestamps_are_non_decreasing() {
        let platform = MockSpeechPlatform::new()
            .with_synthesis_delay_for("uno", Duration::from_millis(50))
            .with_synthesis_delay_for("dos", Duration::ZERO);
        let h = harness(
            platform,
            MockAudioOutput::new().with_play_duration(Duration::ZERO),
        );

        h.controller.start().await.unwrap();
        h.platform.emit_recognized("one", "uno").await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.platform.emit_recognized("two", "dos").await;

        assert!(h.wait_for_completions(2).await);
        h.controller.stop().await.unwrap();

        let timestamps: Vec<Duration> = h
            .events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                SessionEvent::SegmentCompleted { segment } => Some(segment.timestamp),
                _ => None,
            })
            .collect();
        assert_eq!(timestamps.len(), 2);
        assert!(timestamps[0] <= timestamps[1]);
    }
}
