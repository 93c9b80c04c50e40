//! ASR session machine: wake-word listening, voice-command sessions, and
//! the self-wake-up confirmation guard.
//!
//! The concrete recognition engines are external collaborators behind the
//! [`WakeWordEngine`] / [`CommandEngine`] traits; the session machine owns
//! the state, the language/demo selection, and the command-session timeout.

use device_abi::{
    AsrDetectStatus, AsrResult, AudioStream, DeliveryScope, DeviceError, NotifyEvent,
    VoiceAlgoDevice, VoiceHook,
};
use log::{debug, error};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// English language bit.
pub const LANG_ENGLISH: u8 = 1 << 0;
/// Chinese language bit.
pub const LANG_CHINESE: u8 = 1 << 1;
/// German language bit.
pub const LANG_GERMAN: u8 = 1 << 2;
/// French language bit.
pub const LANG_FRENCH: u8 = 1 << 3;
/// "Keep the current languages" marker.
pub const LANG_UNDEFINED: u8 = 0;

/// Wake-word-only demo bit.
pub const DEMO_WAKE_WORD: u8 = 1 << 0;
/// Coffee-machine command set.
pub const DEMO_COFFEE_MACHINE: u8 = 1 << 1;
/// User-registration command set.
pub const DEMO_USER_REGISTER: u8 = 1 << 2;

/// Default voice-command session timeout.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_millis(60_000);
/// Smallest accepted session timeout.
pub const MIN_SESSION_TIMEOUT: Duration = Duration::from_millis(4_000);

/// Frames in the self-wake confirmation window.
pub const CONFIRM_WINDOW_FRAMES: u32 = 20;
/// Duration of one confirmation frame in milliseconds.
pub const CONFIRM_FRAME_MS: u32 = 30;

/// A wake-word detection reported by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WakeWordHit {
    /// Estimated utterance length, fed back to the acoustic front-end.
    pub utterance_len: u32,
}

/// Wake-word recognition engine contract.
pub trait WakeWordEngine: Send {
    /// Scans one audio block against the model of `language`.
    fn scan(&mut self, language: u8, block: &[u8]) -> Option<WakeWordHit>;

    /// Drops model state after a language-set change.
    fn reset(&mut self) {}
}

/// Voice-command recognition engine contract.
pub trait CommandEngine: Send {
    /// Scans one audio block against the command model of `language` for
    /// the active `demo`. Returns the detected keyword id.
    fn scan(&mut self, language: u8, demo: u8, block: &[u8]) -> Option<i32>;

    /// Drops model state after a language-set change.
    fn reset(&mut self) {}
}

/// Recognition phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Audio is discarded; only front-end self-calibration runs.
    Stopped,
    /// Scanning each active language's wake-word model.
    WakeWord,
    /// Active listening window for a command in the detected language.
    VoiceCommand {
        /// Language that woke the session.
        language: u8,
        /// When the session expires.
        deadline: Instant,
    },
}

/// Outcome of processing one audio block or a timer expiry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The wake word fired; the session is now in the command window.
    WakeWord {
        /// Detected language bit.
        language: u8,
        /// Estimated utterance length for the front-end.
        utterance_len: u32,
    },
    /// A command fired inside the session window.
    Command {
        /// Session language bit.
        language: u8,
        /// Detected keyword id.
        keyword_id: i32,
    },
    /// The session expired without a detection.
    TimedOut {
        /// Session language bit.
        language: u8,
    },
}

/// Verdict of the self-wake confirmation window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    /// Nothing pending.
    Idle,
    /// A detection is waiting out the confirmation window.
    Pending,
    /// The detection survived the window.
    Confirmed,
    /// The parallel pass also fired: the detection was the speaker's own
    /// audio.
    Invalidated,
}

/// Confirmation window guarding against the speaker waking the device.
///
/// While the speaker streams, a microphone detection only counts once it
/// survives [`CONFIRM_WINDOW_FRAMES`] frames without the parallel detector
/// firing on the speaker signal.
#[derive(Debug, Default)]
pub struct SelfWakeGuard {
    window: u32,
}

impl SelfWakeGuard {
    /// Feeds one frame's detections through the guard.
    pub fn frame(&mut self, real: bool, fake: bool, speaker_active: bool) -> Confirmation {
        if !speaker_active {
            if real || self.window > 0 {
                self.window = 0;
                return Confirmation::Confirmed;
            }
            return Confirmation::Idle;
        }

        if fake {
            self.window = 0;
            return Confirmation::Invalidated;
        }
        if real && self.window == 0 {
            self.window = 1;
        } else if self.window > 0 {
            self.window += 1;
        }
        if self.window > CONFIRM_WINDOW_FRAMES {
            self.window = 0;
            return Confirmation::Confirmed;
        }
        if self.window > 0 {
            Confirmation::Pending
        } else {
            Confirmation::Idle
        }
    }
}

/// The ASR session machine, time-injected for determinism.
pub struct AsrSession {
    state: SessionState,
    languages: u8,
    demo: u8,
    timeout: Duration,
    speaker_streaming: bool,
    guard: Option<SelfWakeGuard>,
    pending_hit: Option<(u8, u32)>,
    timer_gen: u64,
    ww: Box<dyn WakeWordEngine>,
    cmd: Box<dyn CommandEngine>,
    self_ww: Option<Box<dyn WakeWordEngine>>,
}

impl AsrSession {
    /// A session listening for the wake word in every default language.
    pub fn new(ww: Box<dyn WakeWordEngine>, cmd: Box<dyn CommandEngine>) -> Self {
        Self {
            state: SessionState::WakeWord,
            languages: LANG_ENGLISH | LANG_CHINESE | LANG_GERMAN | LANG_FRENCH,
            demo: DEMO_COFFEE_MACHINE,
            timeout: DEFAULT_SESSION_TIMEOUT,
            speaker_streaming: false,
            guard: None,
            pending_hit: None,
            timer_gen: 0,
            ww,
            cmd,
            self_ww: None,
        }
    }

    /// Enables self-wake-up protection with a parallel detector fed the
    /// speaker's own signal.
    pub fn with_self_wake_protection(mut self, detector: Box<dyn WakeWordEngine>) -> Self {
        self.guard = Some(SelfWakeGuard::default());
        self.self_ww = Some(detector);
        self
    }

    /// Current phase.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Active language bitmask.
    pub fn languages(&self) -> u8 {
        self.languages
    }

    /// Configured session timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Timer generation; bumps whenever the command window re-arms.
    pub fn timer_generation(&self) -> u64 {
        self.timer_gen
    }

    /// Stops recognition; audio is discarded until the model is selected
    /// again.
    pub fn set_stopped(&mut self) {
        self.state = SessionState::Stopped;
        self.timer_gen += 1;
        self.pending_hit = None;
    }

    fn enter_command(&mut self, language: u8, now: Instant) {
        self.state = SessionState::VoiceCommand {
            language,
            deadline: now + self.timeout,
        };
        self.timer_gen += 1;
        self.pending_hit = None;
    }

    /// Expires the session if `gen` still names the active window and the
    /// deadline has passed. Used by the watchdog timer; fires at most once
    /// per window.
    pub fn expire_if(&mut self, gen: u64, now: Instant) -> Option<SessionEvent> {
        if gen != self.timer_gen {
            return None;
        }
        self.poll_timeout(now)
    }

    /// Emits the timeout when the command window deadline has passed.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<SessionEvent> {
        let SessionState::VoiceCommand { language, deadline } = self.state else {
            return None;
        };
        if now < deadline {
            return None;
        }
        self.state = SessionState::Stopped;
        self.timer_gen += 1;
        Some(SessionEvent::TimedOut { language })
    }

    /// Runs one cleaned audio block through the active phase.
    pub fn process_block(&mut self, block: &[u8], now: Instant) -> SmallVec<[SessionEvent; 2]> {
        let mut events = SmallVec::new();
        if let Some(timeout) = self.poll_timeout(now) {
            events.push(timeout);
            return events;
        }

        match self.state {
            SessionState::Stopped => {}
            SessionState::WakeWord => self.wake_word_pass(block, now, &mut events),
            SessionState::VoiceCommand { language, .. } => {
                if let Some(keyword_id) = self.cmd.scan(language, self.demo, block) {
                    events.push(SessionEvent::Command {
                        language,
                        keyword_id,
                    });
                    // Session complete; listen for the next wake word.
                    self.state = SessionState::WakeWord;
                    self.timer_gen += 1;
                }
            }
        }
        events
    }

    fn wake_word_pass(
        &mut self,
        block: &[u8],
        now: Instant,
        events: &mut SmallVec<[SessionEvent; 2]>,
    ) {
        let mut hit: Option<(u8, u32)> = None;
        for lang in [LANG_ENGLISH, LANG_CHINESE, LANG_GERMAN, LANG_FRENCH] {
            if self.languages & lang == 0 {
                continue;
            }
            if let Some(detection) = self.ww.scan(lang, block) {
                hit = Some((lang, detection.utterance_len));
                break;
            }
        }

        let Some(guard) = self.guard.as_mut() else {
            if let Some((language, utterance_len)) = hit {
                self.enter_command(language, now);
                events.push(SessionEvent::WakeWord {
                    language,
                    utterance_len,
                });
            }
            return;
        };

        let fake = match (&mut self.self_ww, self.speaker_streaming) {
            (Some(detector), true) => {
                let mut fired = false;
                for lang in [LANG_ENGLISH, LANG_CHINESE, LANG_GERMAN, LANG_FRENCH] {
                    if self.languages & lang != 0 && detector.scan(lang, block).is_some() {
                        fired = true;
                        break;
                    }
                }
                fired
            }
            _ => false,
        };

        if hit.is_some() && self.pending_hit.is_none() {
            self.pending_hit = hit;
        }

        match guard.frame(hit.is_some(), fake, self.speaker_streaming) {
            Confirmation::Confirmed => {
                if let Some((language, utterance_len)) = self.pending_hit.take().or(hit) {
                    self.enter_command(language, now);
                    events.push(SessionEvent::WakeWord {
                        language,
                        utterance_len,
                    });
                }
            }
            Confirmation::Invalidated => {
                debug!("wake word invalidated by self-wake protection");
                self.pending_hit = None;
            }
            Confirmation::Pending | Confirmation::Idle => {}
        }
    }

    /// Applies a configuration or feedback event.
    pub fn handle_notify(&mut self, event: &NotifyEvent, now: Instant) {
        match event {
            NotifyEvent::SpeakerToAfeFeedback { streaming } => {
                self.speaker_streaming = *streaming;
            }
            NotifyEvent::SetVoiceModel {
                demo,
                language,
                push_to_talk,
            } => {
                if *language != LANG_UNDEFINED && *language != self.languages {
                    self.languages = *language;
                    self.ww.reset();
                    self.cmd.reset();
                    if let Some(detector) = self.self_ww.as_mut() {
                        detector.reset();
                    }
                }
                if *demo != 0 {
                    self.demo = *demo;
                }
                if *push_to_talk {
                    let language = first_language(self.languages);
                    self.enter_command(language, now);
                } else if self.state == SessionState::Stopped {
                    self.state = SessionState::WakeWord;
                }
            }
            NotifyEvent::SetTimeoutDuration { timeout_ms } => {
                let requested = Duration::from_millis(*timeout_ms as u64);
                self.timeout = requested.max(MIN_SESSION_TIMEOUT);
            }
            NotifyEvent::StopVoiceCommand => {
                self.state = SessionState::WakeWord;
                self.timer_gen += 1;
                self.pending_hit = None;
            }
            _ => {}
        }
    }
}

fn first_language(mask: u8) -> u8 {
    for lang in [LANG_ENGLISH, LANG_CHINESE, LANG_GERMAN, LANG_FRENCH] {
        if mask & lang != 0 {
            return lang;
        }
    }
    LANG_ENGLISH
}

/// The session machine packaged as a voice-algorithm device.
pub struct AsrVoiceDevice {
    session: Arc<Mutex<AsrSession>>,
    hook: Option<VoiceHook>,
}

impl AsrVoiceDevice {
    /// Wraps a session.
    pub fn new(session: AsrSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            hook: None,
        }
    }

    /// Shared handle to the session, for inspection.
    pub fn session(&self) -> Arc<Mutex<AsrSession>> {
        Arc::clone(&self.session)
    }

    fn emit(hook: &VoiceHook, event: SessionEvent) {
        let result = match event {
            SessionEvent::WakeWord {
                language,
                utterance_len,
            } => {
                if let Err(err) = hook.afe_feedback(utterance_len) {
                    error!("afe feedback post failed: {}", err);
                }
                AsrResult {
                    status: AsrDetectStatus::WakeWordDetected,
                    language,
                    keyword_id: -1,
                }
            }
            SessionEvent::Command {
                language,
                keyword_id,
            } => AsrResult {
                status: AsrDetectStatus::CommandDetected,
                language,
                keyword_id,
            },
            SessionEvent::TimedOut { language } => AsrResult {
                status: AsrDetectStatus::Timeout,
                language,
                keyword_id: -1,
            },
        };
        if let Err(err) = hook.result(result, DeliveryScope::Local) {
            error!("asr result post failed: {}", err);
        }
    }

    /// Arms a watchdog that expires the current command window even when no
    /// further audio arrives.
    fn arm_watchdog(&self) {
        let Some(hook) = self.hook.clone() else {
            return;
        };
        let (deadline, gen) = {
            let session = self.session.lock();
            match session.state() {
                SessionState::VoiceCommand { deadline, .. } => {
                    (deadline, session.timer_generation())
                }
                _ => return,
            }
        };

        let session = Arc::clone(&self.session);
        thread::spawn(move || {
            loop {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                thread::sleep(deadline - now);
            }
            let expired = session.lock().expire_if(gen, Instant::now());
            if let Some(event) = expired {
                AsrVoiceDevice::emit(&hook, event);
            }
        });
    }
}

impl VoiceAlgoDevice for AsrVoiceDevice {
    fn name(&self) -> &str {
        "asr_session"
    }

    fn init(&mut self, hook: VoiceHook) -> Result<(), DeviceError> {
        self.hook = Some(hook);
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), DeviceError> {
        self.session.lock().set_stopped();
        Ok(())
    }

    fn run(&mut self, audio: &AudioStream) -> Result<(), DeviceError> {
        let hook = self.hook.as_ref().ok_or(DeviceError::op("not initialized"))?;
        let events = self
            .session
            .lock()
            .process_block(&audio.data, Instant::now());

        let mut rearmed = false;
        for event in events {
            if matches!(event, SessionEvent::WakeWord { .. }) {
                rearmed = true;
            }
            Self::emit(hook, event);
        }
        if rearmed {
            self.arm_watchdog();
        }
        Ok(())
    }

    fn input_notify(&mut self, event: &NotifyEvent) -> Result<(), DeviceError> {
        let now = Instant::now();
        let rearm = {
            let mut session = self.session.lock();
            let before = session.timer_generation();
            session.handle_notify(event, now);
            matches!(session.state(), SessionState::VoiceCommand { .. })
                && session.timer_generation() != before
        };
        if rearm {
            self.arm_watchdog();
        }
        Ok(())
    }
}
