use std::sync::Arc;

use chrono::Utc;

use crate::audio::AudioSink;
use crate::cues::{
    scheduler::{pre_reminder_allowed, transition_allowed},
    Cue, CueScheduler, TickAlternator, DEFAULT_DEDUP_BOUND, PRE_REMINDER_SECS,
};
use crate::observation::Observation;
use crate::settings::Settings;
use crate::sync::{Publication, SessionSync};
use crate::timer::{
    parse_time_to_seconds,
    phase::{classify_duration, current_phase},
    BreakRule, LockOutcome, PageMarkers, Phase, Session, SessionTally, TimerLock,
    DEFAULT_BREAK_RULE, DEFAULT_GRACE_POLLS,
};

const ENABLE_LOGS: bool = true;
use crate::log_info;

/// Upward movement (seconds) that counts as a new countdown rather than jitter.
pub const DEFAULT_JUMP_TOLERANCE_SECS: u32 = 10;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub grace_polls: u32,
    pub jump_tolerance_secs: u32,
    pub dedup_bound: usize,
    pub break_rule: BreakRule,
    pub markers: PageMarkers,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            grace_polls: DEFAULT_GRACE_POLLS,
            jump_tolerance_secs: DEFAULT_JUMP_TOLERANCE_SECS,
            dedup_bound: DEFAULT_DEDUP_BOUND,
            break_rule: DEFAULT_BREAK_RULE,
            markers: PageMarkers::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Waiting room is showing; nothing plays.
    Lounge,
    /// No usable reading this poll.
    Idle,
    /// Same remaining value as last poll.
    Unchanged,
    Updated { remaining: u32, phase: Phase },
    /// Timer gone past the grace period; session state dropped.
    Reset,
}

/// All state behind the 1 Hz poll and tick drivers.
///
/// Lives from page-ready to page teardown; nothing here is global.
pub struct Poller {
    config: PollerConfig,
    settings: Settings,
    lock: TimerLock,
    scheduler: CueScheduler,
    ticks: TickAlternator,
    phase: Phase,
    session: Option<Session>,
    tally: SessionTally,
    last_seen: Option<u32>,
    pre_reminder_fired: bool,
    poll_count: u64,
    audio: Arc<dyn AudioSink>,
    pending: Option<Publication>,
}

impl Poller {
    pub fn new(config: PollerConfig, settings: Settings, audio: Arc<dyn AudioSink>) -> Self {
        Self {
            lock: TimerLock::new(config.grace_polls),
            scheduler: CueScheduler::new(config.dedup_bound),
            config,
            settings,
            ticks: TickAlternator::default(),
            phase: Phase::Unknown,
            session: None,
            tally: SessionTally::default(),
            last_seen: None,
            pre_reminder_fired: false,
            poll_count: 0,
            audio,
            pending: None,
        }
    }

    pub fn apply_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn last_seen(&self) -> Option<u32> {
        self.last_seen
    }

    /// Store update staged by the latest poll, if any.
    ///
    /// The poll driver writes it after releasing the poller, so disk I/O
    /// never holds up the tick driver.
    pub fn take_publication(&mut self) -> Option<Publication> {
        self.pending.take()
    }

    pub fn poll(&mut self, obs: &Observation) -> PollOutcome {
        self.poll_count += 1;

        if self.config.markers.in_lounge(obs) {
            if self.phase != Phase::Lounge {
                log_info!("lounge detected; clearing session state");
                self.clear_session();
                self.tally = SessionTally::default();
                self.phase = Phase::Lounge;
                self.pending = Some(Publication::ClearLive);
            }
            return PollOutcome::Lounge;
        }

        if self.phase == Phase::Lounge {
            log_info!("left lounge; assuming focus");
            self.phase = Phase::Focus;
        }

        let text = match self.lock.observe(obs) {
            LockOutcome::Reading(text) => text,
            LockOutcome::Missing => return PollOutcome::Idle,
            LockOutcome::Expired => {
                log_info!("timer missing past grace period; session reset");
                self.clear_session();
                self.pending = Some(Publication::ClearLive);
                return PollOutcome::Reset;
            }
        };

        let Some(remaining) = parse_time_to_seconds(&text) else {
            return PollOutcome::Idle;
        };

        if self.last_seen == Some(remaining) {
            return PollOutcome::Unchanged;
        }

        let jumped = matches!(
            self.last_seen,
            Some(prev) if remaining > prev.saturating_add(self.config.jump_tolerance_secs)
        );
        if self.session.is_none() || jumped {
            self.start_session(remaining, obs, jumped);
        }

        let kind = self.session.as_ref().map(|s| s.kind);
        self.phase = current_phase(&self.config.markers, obs, kind);

        self.evaluate_cues(remaining);
        self.last_seen = Some(remaining);

        self.pending = self.session_sync(remaining, obs).map(Publication::Session);

        PollOutcome::Updated {
            remaining,
            phase: self.phase,
        }
    }

    /// One beat of the tick driver.
    pub fn tick(&mut self) -> Option<Cue> {
        if !matches!(self.last_seen, Some(remaining) if remaining > 0) || self.session.is_none() {
            return None;
        }
        let cue = self.ticks.next(self.phase, &self.settings)?;
        self.play(&cue);
        Some(cue)
    }

    fn start_session(&mut self, remaining: u32, obs: &Observation, jumped: bool) {
        if let Some(previous) = self.session.take() {
            self.tally.close(&previous);
            log_info!(
                "session {} replaced after {}s",
                previous.id,
                (Utc::now() - previous.started_at).num_seconds()
            );
        }

        let kind = classify_duration(
            remaining,
            self.config.markers.before_work(obs),
            self.config.break_rule,
        );
        let index = self.tally.open(kind);
        let session = Session::begin(remaining, kind, self.poll_count, index);
        log_info!(
            "session {} started: {} min, {:?} (jump: {})",
            session.id,
            session.duration_minutes(),
            kind,
            jumped
        );
        self.session = Some(session);
        self.scheduler.reset();
        self.pre_reminder_fired = false;

        if jumped && transition_allowed(&self.settings) {
            self.play(&Cue::Transition(self.settings.transition_sound));
        }
    }

    fn evaluate_cues(&mut self, remaining: u32) {
        if remaining == PRE_REMINDER_SECS
            && !self.pre_reminder_fired
            && pre_reminder_allowed(self.phase, &self.settings)
        {
            self.pre_reminder_fired = true;
            // The reminder stands in for the regular cue at this value.
            self.scheduler.consume(remaining);
            self.play(&Cue::PreReminder);
            return;
        }

        if let Some(cue) = self.scheduler.evaluate(remaining, self.phase, &self.settings) {
            self.play(&cue);
        }
    }

    fn play(&self, cue: &Cue) {
        self.audio.submit(cue.request(&self.settings));
    }

    fn clear_session(&mut self) {
        self.lock.reset();
        self.scheduler.reset();
        self.session = None;
        self.last_seen = None;
        self.pre_reminder_fired = false;
    }

    fn session_sync(&self, remaining: u32, obs: &Observation) -> Option<SessionSync> {
        let session = self.session.as_ref()?;
        Some(SessionSync {
            timer_seconds: remaining,
            updated_at_ms: Utc::now().timestamp_millis(),
            duration_minutes: session.duration_minutes(),
            title: obs.title.clone(),
            session_index: session.index,
            session_type: if session.is_break() { "break" } else { "focus" }.into(),
            completed_count: self.tally.completed_focus,
            phase_label: self.phase.label().into(),
            session_style: obs.style.clone(),
            current_block: self.tally.focus_blocks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::RecordingSink;
    use crate::cues::assets;
    use crate::host::HostContext;
    use crate::observation::ElementSnapshot;
    use crate::settings::TransitionSound;
    use crate::storage::KeyValueStore;
    use crate::sync::{self, SYNC_KEYS};
    use tempfile::TempDir;

    const TIMER_ID: u64 = 42;

    fn clock(text: &str) -> Observation {
        Observation {
            elements: vec![ElementSnapshot {
                id: TIMER_ID,
                text: text.to_string(),
                font_size_px: 48.0,
                width: 120.0,
                height: 60.0,
            }],
            buttons: vec!["Leave".into()],
            ..Default::default()
        }
    }

    fn at(remaining: u32) -> Observation {
        clock(&format!("{}:{:02}", remaining / 60, remaining % 60))
    }

    fn lounge() -> Observation {
        Observation {
            buttons: vec!["Enter Session".into()],
            ..Default::default()
        }
    }

    fn poller(settings: Settings) -> (Poller, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let poller = Poller::new(PollerConfig::default(), settings, sink.clone());
        (poller, sink)
    }

    fn loud() -> Settings {
        Settings {
            mute_during_breaks: false,
            ..Settings::default()
        }
    }

    #[test]
    fn first_reading_starts_a_session() {
        let (mut poller, _sink) = poller(Settings::default());
        let outcome = poller.poll(&at(1500));
        assert_eq!(
            outcome,
            PollOutcome::Updated {
                remaining: 1500,
                phase: Phase::Focus
            }
        );
        let session = poller.session().expect("session");
        assert_eq!(session.duration_minutes(), 25);
        assert_eq!(session.index, 1);
    }

    #[test]
    fn unchanged_reading_does_nothing() {
        let (mut poller, sink) = poller(loud());
        poller.poll(&at(60));
        assert_eq!(poller.poll(&at(60)), PollOutcome::Unchanged);
        assert_eq!(sink.paths(), vec![assets::minute_voice(1)]);
    }

    #[test]
    fn countdown_announces_minutes_and_final_seconds() {
        // A two-minute countdown classifies as a break, so keep breaks audible.
        let (mut poller, sink) = poller(loud());
        for remaining in (0..=125).rev() {
            poller.poll(&at(remaining));
        }
        let mut expected = vec![assets::minute_voice(2), assets::minute_voice(1)];
        expected.extend([50, 40, 30, 20, 10].map(assets::second_voice));
        expected.extend((1..=9).rev().map(assets::second_voice));
        assert_eq!(sink.paths(), expected);
    }

    #[test]
    fn jump_from_focus_to_short_countdown_is_a_break() {
        let settings = Settings {
            transition_chime_enabled: true,
            transition_sound: TransitionSound::Bell,
            ..Settings::default()
        };
        let (mut poller, sink) = poller(settings);
        poller.poll(&at(1500));
        for remaining in (5..=12).rev() {
            poller.poll(&at(remaining));
        }
        assert_eq!(poller.phase(), Phase::Focus);
        sink.clear();

        let outcome = poller.poll(&at(300));
        assert_eq!(
            outcome,
            PollOutcome::Updated {
                remaining: 300,
                phase: Phase::Break
            }
        );
        assert_eq!(sink.paths(), vec![assets::BELL.to_string()]);

        // Dedup set was cleared: a value heard in the old session fires again.
        let (mut poller, sink) = self::poller(loud());
        poller.poll(&at(70));
        poller.poll(&at(60));
        poller.poll(&at(400));
        poller.poll(&at(60));
        assert_eq!(
            sink.paths(),
            vec![assets::minute_voice(1), assets::minute_voice(1)]
        );
    }

    #[test]
    fn small_upward_jitter_is_not_a_new_session() {
        let (mut poller, _sink) = poller(Settings::default());
        poller.poll(&at(600));
        let first = poller.session().map(|s| s.id.clone());
        poller.poll(&at(605));
        assert_eq!(poller.session().map(|s| s.id.clone()), first);
    }

    #[test]
    fn lounge_clears_once_and_leaving_it_means_focus() {
        let (mut poller, sink) = poller(loud());
        poller.poll(&at(90));
        poller.poll(&at(60));
        assert_eq!(poller.poll(&lounge()), PollOutcome::Lounge);
        assert!(poller.session().is_none());
        assert_eq!(poller.poll(&lounge()), PollOutcome::Lounge);
        assert_eq!(poller.phase(), Phase::Lounge);

        // Back in a session: 60 can fire again because the dedup set was reset.
        poller.poll(&at(60));
        assert_eq!(
            sink.paths(),
            vec![assets::minute_voice(1), assets::minute_voice(1)]
        );
        assert_eq!(poller.session().map(|s| s.index), Some(1));
    }

    #[test]
    fn timer_missing_past_grace_resets() {
        let (mut poller, _sink) = poller(Settings::default());
        poller.poll(&at(600));
        poller.poll(&at(599));
        let empty = Observation::default();
        for _ in 1..DEFAULT_GRACE_POLLS {
            assert_eq!(poller.poll(&empty), PollOutcome::Idle);
            assert!(poller.session().is_some());
        }
        assert_eq!(poller.poll(&empty), PollOutcome::Reset);
        assert!(poller.session().is_none());
        assert_eq!(poller.last_seen(), None);
    }

    #[test]
    fn check_in_text_mutes_voice() {
        let (mut poller, sink) = poller(Settings::default());
        let mut obs = at(120);
        obs.page_text = "Share your goal for this session".into();
        assert_eq!(
            poller.poll(&obs),
            PollOutcome::Updated {
                remaining: 120,
                phase: Phase::CheckIn
            }
        );
        assert!(sink.paths().is_empty());
    }

    #[test]
    fn pre_reminder_replaces_thirty_second_voice() {
        let settings = Settings {
            pre_reminder_enabled: true,
            voice_enabled: false,
            mute_during_breaks: false,
            ..Settings::default()
        };
        let (mut poller, sink) = poller(settings);
        for remaining in (25..=35).rev() {
            poller.poll(&at(remaining));
        }
        assert_eq!(sink.paths(), vec![assets::second_voice(30)]);
    }

    #[test]
    fn tick_driver_needs_an_active_countdown() {
        let settings = Settings {
            tick_enabled: true,
            ..Settings::default()
        };
        let (mut poller, sink) = poller(settings);
        assert_eq!(poller.tick(), None);

        // 9:59 carries no voice cue, so the sink only sees ticks.
        poller.poll(&at(599));
        assert_eq!(poller.tick(), Some(Cue::Tick(assets::TICK)));
        assert_eq!(poller.tick(), Some(Cue::Tick(assets::TOCK)));

        poller.poll(&at(0));
        assert_eq!(poller.tick(), None);
        assert_eq!(sink.paths().len(), 2);
    }

    #[test]
    fn stages_sync_keys_for_the_driver() {
        let dir = TempDir::new().expect("tempdir");
        let store = KeyValueStore::open(dir.path().join("store.json"), HostContext::new(dir.path()))
            .expect("open");
        let (mut poller, _sink) = poller(Settings::default());

        let mut obs = at(1499);
        obs.title = Some("Morning Flow".into());
        poller.poll(&obs);
        poller
            .take_publication()
            .expect("staged sync")
            .apply(&store)
            .expect("apply");
        assert_eq!(poller.take_publication(), None);

        let published = store.get(&SYNC_KEYS);
        assert_eq!(published[sync::TIMER_SECONDS], 1499);
        assert_eq!(published[sync::SESSION_DURATION_MINUTES], 25);
        assert_eq!(published[sync::SESSION_TITLE], "Morning Flow");
        assert_eq!(published[sync::CURRENT_SESSION_TYPE], "focus");
        assert_eq!(published[sync::CURRENT_BLOCK], 1);

        poller.poll(&lounge());
        assert_eq!(poller.take_publication(), Some(Publication::ClearLive));
    }

    #[test]
    fn unchanged_reading_stages_nothing() {
        let (mut poller, _sink) = poller(Settings::default());
        poller.poll(&at(300));
        poller.take_publication();
        poller.poll(&at(300));
        assert_eq!(poller.take_publication(), None);
    }
}
