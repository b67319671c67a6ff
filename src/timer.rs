use crate::storage::{KeyedStore, StoreError, StoreKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    Focus,
    ShortBreak,
    LongBreak,
    DeepWork,
}

impl TimerMode {
    pub const ALL: [TimerMode; 4] = [
        TimerMode::Focus,
        TimerMode::ShortBreak,
        TimerMode::LongBreak,
        TimerMode::DeepWork,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TimerMode::Focus => "Focus",
            TimerMode::ShortBreak => "Short Break",
            TimerMode::LongBreak => "Long Break",
            TimerMode::DeepWork => "Deep Work",
        }
    }

    pub fn default_minutes(&self) -> u32 {
        match self {
            TimerMode::Focus => 25,
            TimerMode::ShortBreak => 5,
            TimerMode::LongBreak => 15,
            TimerMode::DeepWork => 50,
        }
    }
}

/// Longest accepted mode duration in minutes.
pub const MAX_MINUTES: u32 = 24 * 60;

/// Zero or anything past [`MAX_MINUTES`] falls back to the mode default.
fn bounded_minutes(value: u32, mode: TimerMode) -> u32 {
    if value == 0 || value > MAX_MINUTES {
        mode.default_minutes()
    } else {
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PomodoroSettings {
    pub focus: u32,
    pub short_break: u32,
    pub long_break: u32,
    pub deep_work: u32,
    pub rounds_until_long_break: u32,
    pub auto_next: bool,
    pub sound_enabled: bool,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        PomodoroSettings {
            focus: 25,
            short_break: 5,
            long_break: 15,
            deep_work: 50,
            rounds_until_long_break: 4,
            auto_next: false,
            sound_enabled: true,
        }
    }
}

impl PomodoroSettings {
    pub fn minutes(&self, mode: TimerMode) -> u32 {
        let minutes = match mode {
            TimerMode::Focus => self.focus,
            TimerMode::ShortBreak => self.short_break,
            TimerMode::LongBreak => self.long_break,
            TimerMode::DeepWork => self.deep_work,
        };
        bounded_minutes(minutes, mode)
    }

    pub fn seconds(&self, mode: TimerMode) -> u32 {
        self.minutes(mode).saturating_mul(60)
    }
}

/// Partial settings update; `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub focus: Option<u32>,
    pub short_break: Option<u32>,
    pub long_break: Option<u32>,
    pub deep_work: Option<u32>,
    pub rounds_until_long_break: Option<u32>,
    pub auto_next: Option<bool>,
    pub sound_enabled: Option<bool>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.focus.is_none()
            && self.short_break.is_none()
            && self.long_break.is_none()
            && self.deep_work.is_none()
            && self.rounds_until_long_break.is_none()
            && self.auto_next.is_none()
            && self.sound_enabled.is_none()
    }

    fn apply(&self, settings: &mut PomodoroSettings) {
        if let Some(v) = self.focus {
            settings.focus = bounded_minutes(v, TimerMode::Focus);
        }
        if let Some(v) = self.short_break {
            settings.short_break = bounded_minutes(v, TimerMode::ShortBreak);
        }
        if let Some(v) = self.long_break {
            settings.long_break = bounded_minutes(v, TimerMode::LongBreak);
        }
        if let Some(v) = self.deep_work {
            settings.deep_work = bounded_minutes(v, TimerMode::DeepWork);
        }
        if let Some(v) = self.rounds_until_long_break {
            settings.rounds_until_long_break = v.max(1);
        }
        if let Some(v) = self.auto_next {
            settings.auto_next = v;
        }
        if let Some(v) = self.sound_enabled {
            settings.sound_enabled = v;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running; nothing changed.
    Stopped,
    Ticked,
    /// The countdown reached zero on this tick.
    Completed { round_recorded: bool },
}

/// Pomodoro countdown state machine. It does not keep time itself: a driver
/// calls [`TimerEngine::tick`] once per second while it is running.
#[derive(Debug, Clone)]
pub struct TimerEngine {
    mode: TimerMode,
    remaining: u32,
    state: TimerState,
    rounds: u32,
    settings: PomodoroSettings,
}

impl TimerEngine {
    pub fn new(settings: PomodoroSettings, rounds: u32) -> Self {
        let mode = TimerMode::Focus;
        TimerEngine {
            mode,
            remaining: settings.seconds(mode),
            state: TimerState::Idle,
            rounds,
            settings,
        }
    }

    pub fn load(store: &KeyedStore) -> Self {
        let settings = store.load(StoreKey::PomodoroSettings, PomodoroSettings::default);
        let rounds = store.load(StoreKey::PomodoroRounds, || 0u32);
        TimerEngine::new(settings, rounds)
    }

    pub fn save_settings(&self, store: &KeyedStore) -> Result<(), StoreError> {
        store.save(StoreKey::PomodoroSettings, &self.settings)?;
        Ok(())
    }

    pub fn save_rounds(&self, store: &KeyedStore) -> Result<(), StoreError> {
        store.save(StoreKey::PomodoroRounds, &self.rounds)?;
        Ok(())
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn settings(&self) -> &PomodoroSettings {
        &self.settings
    }

    pub fn duration(&self) -> u32 {
        self.settings.seconds(self.mode)
    }

    /// Resumes a paused countdown. A completed one starts over at full length.
    pub fn start(&mut self) {
        match self.state {
            TimerState::Running => {}
            TimerState::Completed => {
                self.remaining = self.duration();
                self.state = TimerState::Running;
            }
            TimerState::Idle => {
                if self.remaining == 0 {
                    self.remaining = self.duration();
                }
                self.state = TimerState::Running;
            }
        }
    }

    pub fn pause(&mut self) {
        if self.state == TimerState::Running {
            self.state = TimerState::Idle;
        }
    }

    pub fn toggle(&mut self) {
        if self.is_running() {
            self.pause();
        } else {
            self.start();
        }
    }

    pub fn reset(&mut self) {
        self.state = TimerState::Idle;
        self.remaining = self.duration();
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.state != TimerState::Running {
            return TickOutcome::Stopped;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return TickOutcome::Ticked;
        }
        self.state = TimerState::Completed;
        let round_recorded = self.mode == TimerMode::Focus;
        if round_recorded {
            self.rounds += 1;
        }
        tracing::info!(mode = self.mode.label(), rounds = self.rounds, "countdown complete");
        TickOutcome::Completed { round_recorded }
    }

    pub fn switch_mode(&mut self, mode: TimerMode) {
        self.mode = mode;
        self.state = TimerState::Idle;
        self.remaining = self.duration();
    }

    /// The mode that naturally follows the current one: a break after focus
    /// (long every `roundsUntilLongBreak` rounds), focus after anything else.
    pub fn next_mode(&self) -> TimerMode {
        match self.mode {
            TimerMode::Focus => {
                let every = self.settings.rounds_until_long_break.max(1);
                if self.rounds > 0 && self.rounds % every == 0 {
                    TimerMode::LongBreak
                } else {
                    TimerMode::ShortBreak
                }
            }
            _ => TimerMode::Focus,
        }
    }

    /// Moves on to [`next_mode`](Self::next_mode) and starts it.
    pub fn advance(&mut self) {
        self.switch_mode(self.next_mode());
        self.start();
    }

    /// Applies new settings. The visible countdown is only refreshed when it
    /// has not been touched yet; otherwise new durations apply on the next
    /// reset or mode switch.
    pub fn update_settings(&mut self, patch: &SettingsPatch) {
        let untouched = self.state == TimerState::Idle && self.remaining == self.duration();
        patch.apply(&mut self.settings);
        if untouched {
            self.remaining = self.duration();
        }
    }

    pub fn reset_rounds(&mut self) {
        self.rounds = 0;
    }

    /// Elapsed share of the current countdown, 0 to 100.
    pub fn progress(&self) -> f64 {
        let total = self.duration();
        if total == 0 {
            return 0.0;
        }
        f64::from(total.saturating_sub(self.remaining)) / f64::from(total) * 100.0
    }

    pub fn display(&self) -> String {
        format_clock(self.remaining)
    }
}

pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    impl TimerEngine {
        fn with_remaining(mut self, seconds: u32) -> Self {
            self.remaining = seconds;
            self
        }
    }

    fn engine(mode: TimerMode, remaining: u32) -> TimerEngine {
        let mut engine = TimerEngine::new(PomodoroSettings::default(), 0);
        engine.switch_mode(mode);
        let mut engine = engine.with_remaining(remaining);
        engine.start();
        engine
    }

    #[test]
    fn focus_completion_records_one_round() {
        let mut engine = engine(TimerMode::Focus, 5);
        for _ in 0..4 {
            assert_eq!(engine.tick(), TickOutcome::Ticked);
        }
        assert_eq!(
            engine.tick(),
            TickOutcome::Completed {
                round_recorded: true
            }
        );
        assert_eq!(engine.remaining(), 0);
        assert_eq!(engine.state(), TimerState::Completed);
        assert!(!engine.is_running());
        assert_eq!(engine.rounds(), 1);
        assert_eq!(engine.tick(), TickOutcome::Stopped);
        assert_eq!(engine.rounds(), 1);
    }

    #[test]
    fn break_completion_leaves_rounds() {
        let mut engine = engine(TimerMode::ShortBreak, 5);
        for _ in 0..5 {
            engine.tick();
        }
        assert_eq!(engine.state(), TimerState::Completed);
        assert_eq!(engine.rounds(), 0);
    }

    #[test]
    fn pause_keeps_remaining_and_reset_restores_duration() {
        let mut engine = engine(TimerMode::Focus, 100);
        engine.tick();
        engine.pause();
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.tick(), TickOutcome::Stopped);
        assert_eq!(engine.remaining(), 99);
        engine.start();
        engine.start();
        assert!(engine.is_running());
        engine.reset();
        assert!(!engine.is_running());
        assert_eq!(engine.remaining(), 25 * 60);
    }

    #[test]
    fn switch_mode_stops_and_keeps_rounds() {
        let mut engine = engine(TimerMode::Focus, 1);
        engine.tick();
        engine.switch_mode(TimerMode::DeepWork);
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.remaining(), 50 * 60);
        assert_eq!(engine.rounds(), 1);
    }

    #[test]
    fn restart_after_completion_runs_full_length() {
        let mut engine = engine(TimerMode::Focus, 1);
        engine.tick();
        engine.start();
        assert_eq!(engine.remaining(), 25 * 60);
        assert_eq!(engine.tick(), TickOutcome::Ticked);
        assert_eq!(engine.rounds(), 1);
    }

    #[test]
    fn settings_update_refreshes_only_untouched_countdown() {
        let mut engine = TimerEngine::new(PomodoroSettings::default(), 0);
        engine.update_settings(&SettingsPatch {
            focus: Some(30),
            ..SettingsPatch::default()
        });
        assert_eq!(engine.remaining(), 30 * 60);

        engine.start();
        engine.tick();
        engine.update_settings(&SettingsPatch {
            focus: Some(10),
            short_break: Some(0),
            ..SettingsPatch::default()
        });
        assert_eq!(engine.remaining(), 30 * 60 - 1);
        assert_eq!(engine.settings().short_break, 5);
        engine.reset();
        assert_eq!(engine.remaining(), 10 * 60);
    }

    #[test]
    fn next_mode_schedules_long_breaks() {
        let mut engine = TimerEngine::new(PomodoroSettings::default(), 3);
        assert_eq!(engine.next_mode(), TimerMode::ShortBreak);
        let mut engine_at_four = TimerEngine::new(PomodoroSettings::default(), 4);
        assert_eq!(engine_at_four.next_mode(), TimerMode::LongBreak);
        engine_at_four.advance();
        assert_eq!(engine_at_four.mode(), TimerMode::LongBreak);
        assert!(engine_at_four.is_running());
        assert_eq!(engine_at_four.next_mode(), TimerMode::Focus);
        engine.switch_mode(TimerMode::DeepWork);
        assert_eq!(engine.next_mode(), TimerMode::Focus);
    }

    #[test]
    fn settings_and_rounds_survive_reload() {
        let store = KeyedStore::in_memory();
        let mut engine = TimerEngine::load(&store);
        assert_eq!(engine.rounds(), 0);
        engine.update_settings(&SettingsPatch {
            long_break: Some(20),
            auto_next: Some(true),
            ..SettingsPatch::default()
        });
        engine.save_settings(&store).unwrap();
        let mut engine = engine.with_remaining(1);
        engine.start();
        engine.tick();
        engine.save_rounds(&store).unwrap();

        let reloaded = TimerEngine::load(&store);
        assert_eq!(reloaded.rounds(), 1);
        assert_eq!(reloaded.settings().long_break, 20);
        assert!(reloaded.settings().auto_next);
        assert_eq!(reloaded.state(), TimerState::Idle);
        assert_eq!(reloaded.remaining(), 25 * 60);
    }

    #[test]
    fn oversized_durations_fall_back_to_defaults() {
        let mut engine = TimerEngine::new(PomodoroSettings::default(), 0);
        engine.update_settings(&SettingsPatch {
            focus: Some(80_000_000),
            deep_work: Some(MAX_MINUTES),
            ..SettingsPatch::default()
        });
        assert_eq!(engine.settings().focus, 25);
        assert_eq!(engine.settings().deep_work, MAX_MINUTES);
        assert_eq!(engine.remaining(), 25 * 60);
        engine.switch_mode(TimerMode::DeepWork);
        assert_eq!(engine.remaining(), MAX_MINUTES * 60);

        let store = KeyedStore::in_memory();
        store
            .save(
                StoreKey::PomodoroSettings,
                &serde_json::json!({ "focus": 4_000_000_000u32, "longBreak": 0 }),
            )
            .unwrap();
        let loaded = TimerEngine::load(&store);
        assert_eq!(loaded.remaining(), 25 * 60);
        assert_eq!(loaded.settings().seconds(TimerMode::LongBreak), 15 * 60);
        assert_eq!(loaded.duration(), 25 * 60);
    }

    #[test]
    fn settings_use_original_field_names() {
        let value = serde_json::to_value(PomodoroSettings::default()).unwrap();
        assert_eq!(value["shortBreak"], 5);
        assert_eq!(value["roundsUntilLongBreak"], 4);
        let partial: PomodoroSettings = serde_json::from_str(r#"{"focus": 40}"#).unwrap();
        assert_eq!(partial.focus, 40);
        assert!(partial.sound_enabled);
    }

    #[test]
    fn progress_and_display() {
        let engine = engine(TimerMode::ShortBreak, 150);
        assert_eq!(engine.display(), "02:30");
        assert!((engine.progress() - 50.0).abs() < 1e-9);
    }
}
