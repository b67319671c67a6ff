use crate::collection::{CollectionError, EntityCollection};
use crate::commands::Workspace;
use crate::config::AppConfig;
use crate::dates::{self, days_in_month, month_label, shift_day, shift_month, today};
use crate::ledger::CompletionLedger;
use crate::model::{DayEvent, EntityId, EventCategory, EventDraft, Habit, Task, TaskStatus};
use crate::schedule::{self, position, reschedule_to_hour};
use crate::storage::{DataLocation, KeyedStore, StoreKey};
use crate::timer::{SettingsPatch, TickOutcome, TimerEngine, TimerMode, TimerState};
use crate::views;
use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::style::Print;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_secs(1);

pub fn run(ws: &Workspace) -> Result<()> {
    let app = App::new(ws.store.clone(), ws.config.clone(), ws.location.clone());
    run_app(app)
}

/// Opens the TUI on the timer view with a countdown already running.
pub fn run_timer(ws: &Workspace, mode: TimerMode) -> Result<()> {
    let mut app = App::new(ws.store.clone(), ws.config.clone(), ws.location.clone());
    app.view = ViewMode::Timer;
    app.engine.switch_mode(mode);
    app.engine.start();
    app.status = format!("{} started", mode.label());
    run_app(app)
}

fn run_app(mut app: App) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    store: KeyedStore,
    config: AppConfig,
    location: DataLocation,
    engine: TimerEngine,
    last_tick: Instant,
    habits: EntityCollection<Habit>,
    ledger: CompletionLedger,
    tasks: EntityCollection<Task>,
    events: EntityCollection<DayEvent>,
    /// Active task shown beside the countdown.
    working_on: Option<EntityId>,
    selected_habit: usize,
    selected_event: usize,
    cursor: NaiveDate,
    last_save: Instant,
    status: String,
    mode: Mode,
    view: ViewMode,
}

enum Mode {
    Normal,
    Input { target: InputTarget, buffer: String },
    ConfirmDelete { target: DeleteTarget, title: String },
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum InputTarget {
    Habit,
    Event,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum DeleteTarget {
    Habit(EntityId),
    Event(EntityId),
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum ViewMode {
    Timer,
    Habits,
    Calendar,
    Day,
}

impl ViewMode {
    fn label(&self) -> &'static str {
        match self {
            ViewMode::Timer => "Timer",
            ViewMode::Habits => "Habits",
            ViewMode::Calendar => "Calendar",
            ViewMode::Day => "Day",
        }
    }
}

impl App {
    fn new(store: KeyedStore, config: AppConfig, location: DataLocation) -> Self {
        let mut habits = EntityCollection::load(&store, StoreKey::Habits);
        habits.sort_by_order();
        let status = format!("Loaded data from {}", location.dir.display());
        App {
            engine: TimerEngine::load(&store),
            last_tick: Instant::now(),
            habits,
            ledger: CompletionLedger::load(&store),
            tasks: EntityCollection::load(&store, StoreKey::Tasks),
            events: EntityCollection::load(&store, StoreKey::DayPlannerEvents),
            store,
            config,
            location,
            working_on: None,
            selected_habit: 0,
            selected_event: 0,
            cursor: today(),
            last_save: Instant::now(),
            status,
            mode: Mode::Normal,
            view: ViewMode::Timer,
        }
    }

    fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            self.drive_timer(Instant::now())?;
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Feeds the engine one tick per whole second elapsed while it runs.
    fn drive_timer(&mut self, now: Instant) -> Result<()> {
        if !self.engine.is_running() {
            self.last_tick = now;
            return Ok(());
        }
        while now.duration_since(self.last_tick) >= TICK {
            self.last_tick += TICK;
            match self.engine.tick() {
                TickOutcome::Ticked => {}
                TickOutcome::Stopped => break,
                TickOutcome::Completed { round_recorded } => {
                    self.finish_countdown(round_recorded)?;
                    break;
                }
            }
        }
        Ok(())
    }

    fn finish_countdown(&mut self, round_recorded: bool) -> Result<()> {
        let finished = self.engine.mode();
        if round_recorded {
            self.engine.save_rounds(&self.store)?;
            self.last_save = Instant::now();
        }
        if self.engine.settings().sound_enabled {
            // a failed bell is not worth interrupting the session for
            if let Err(err) = execute!(stdout(), Print("\x07")) {
                tracing::debug!(%err, "terminal bell failed");
            }
        }
        self.status = format!("{} complete", finished.label());
        if self.engine.settings().auto_next {
            self.engine.advance();
            self.last_tick = Instant::now();
            self.status = format!(
                "{} complete, starting {}",
                finished.label(),
                self.engine.mode().label()
            );
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Input { .. } => self.handle_input_key(key),
            Mode::ConfirmDelete { .. } => self.handle_confirm_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(true),
            KeyCode::Char('1') => {
                self.set_view(ViewMode::Timer);
                return Ok(false);
            }
            KeyCode::Char('2') => {
                self.set_view(ViewMode::Habits);
                return Ok(false);
            }
            KeyCode::Char('3') => {
                self.set_view(ViewMode::Calendar);
                return Ok(false);
            }
            KeyCode::Char('4') => {
                self.set_view(ViewMode::Day);
                return Ok(false);
            }
            _ => {}
        }

        match self.view {
            ViewMode::Timer => self.handle_timer_key(key)?,
            ViewMode::Habits => self.handle_habits_key(key)?,
            ViewMode::Calendar => self.handle_calendar_key(key),
            ViewMode::Day => self.handle_day_key(key)?,
        }
        Ok(false)
    }

    fn handle_timer_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char(' ') | KeyCode::Enter => {
                self.engine.toggle();
                self.last_tick = Instant::now();
                self.status = if self.engine.is_running() {
                    format!("{} running", self.engine.mode().label())
                } else {
                    "Paused".into()
                };
            }
            KeyCode::Char('r') => {
                self.engine.reset();
                self.status = "Timer reset".into();
            }
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => self.cycle_mode(1),
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => self.cycle_mode(-1),
            KeyCode::Char('n') => {
                self.engine.advance();
                self.last_tick = Instant::now();
                self.status = format!("Skipped to {}", self.engine.mode().label());
            }
            KeyCode::Char('w') => self.cycle_working_on(),
            KeyCode::Char('R') => {
                self.engine.reset_rounds();
                self.engine.save_rounds(&self.store)?;
                self.saved("Round counter reset");
            }
            KeyCode::Char('s') => {
                let sound = !self.engine.settings().sound_enabled;
                self.patch_settings(SettingsPatch {
                    sound_enabled: Some(sound),
                    ..SettingsPatch::default()
                })?;
            }
            KeyCode::Char('a') => {
                let auto_next = !self.engine.settings().auto_next;
                self.patch_settings(SettingsPatch {
                    auto_next: Some(auto_next),
                    ..SettingsPatch::default()
                })?;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_habits_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_habit = self.selected_habit.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_habit + 1 < self.habits.len() {
                    self.selected_habit += 1;
                }
            }
            KeyCode::Left | KeyCode::Char('h') => self.move_cursor(-1),
            KeyCode::Right | KeyCode::Char('l') => self.move_cursor(1),
            KeyCode::Char('[') => self.cursor = shift_month(self.cursor, -1),
            KeyCode::Char(']') => self.cursor = shift_month(self.cursor, 1),
            KeyCode::Char('t') => self.cursor = today(),
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_selected_habit()?,
            KeyCode::Char('K') => self.shift_selected_habit(-1)?,
            KeyCode::Char('J') => self.shift_selected_habit(1)?,
            KeyCode::Char('n') => {
                self.mode = Mode::Input {
                    target: InputTarget::Habit,
                    buffer: String::new(),
                };
                self.status = "New habit (Enter save, Esc cancel)".into();
            }
            KeyCode::Char('d') => {
                if let Some(habit) = self.current_habit() {
                    let (id, title) = (habit.id, habit.name.clone());
                    self.status = format!("Delete {}? (y to confirm, n/Esc to cancel)", title);
                    self.mode = Mode::ConfirmDelete {
                        target: DeleteTarget::Habit(id),
                        title,
                    };
                } else {
                    self.status = "No habit selected to delete".into();
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_calendar_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.move_cursor(-1),
            KeyCode::Right | KeyCode::Char('l') => self.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-7),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(7),
            KeyCode::Char('[') => self.cursor = shift_month(self.cursor, -1),
            KeyCode::Char(']') => self.cursor = shift_month(self.cursor, 1),
            KeyCode::Char('t') => self.cursor = today(),
            KeyCode::Enter => self.set_view(ViewMode::Day),
            _ => {}
        }
    }

    fn handle_day_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_event = self.selected_event.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_event + 1 < self.day_events().len() {
                    self.selected_event += 1;
                }
            }
            KeyCode::Left | KeyCode::Char('h') => self.move_cursor(-1),
            KeyCode::Right | KeyCode::Char('l') => self.move_cursor(1),
            KeyCode::Char('t') => self.cursor = today(),
            KeyCode::Char('+') | KeyCode::Char('=') => self.shift_selected_event(1)?,
            KeyCode::Char('-') => self.shift_selected_event(-1)?,
            KeyCode::Char('n') => {
                self.mode = Mode::Input {
                    target: InputTarget::Event,
                    buffer: String::new(),
                };
                self.status = "New event at 09:00 (Enter save, Esc cancel)".into();
            }
            KeyCode::Char('d') => {
                if let Some(event) = self.current_event() {
                    let (id, title) = (event.id, event.title.clone());
                    self.status = format!("Delete {}? (y to confirm, n/Esc to cancel)", title);
                    self.mode = Mode::ConfirmDelete {
                        target: DeleteTarget::Event(id),
                        title,
                    };
                } else {
                    self.status = "No event selected to delete".into();
                }
            }
            _ => {}
        }
        self.ensure_event_bounds();
        Ok(())
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> Result<bool> {
        let Mode::Input { target, buffer } = &mut self.mode else {
            return Ok(false);
        };
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.status = "Canceled".into();
            }
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(ch) => buffer.push(ch),
            KeyCode::Enter => {
                let (target, text) = (*target, std::mem::take(buffer));
                self.mode = Mode::Normal;
                match target {
                    InputTarget::Habit => self.create_habit(text)?,
                    InputTarget::Event => self.create_event(text)?,
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> Result<bool> {
        let target = match &self.mode {
            Mode::ConfirmDelete { target, .. } => *target,
            _ => return Ok(false),
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                self.mode = Mode::Normal;
                match target {
                    DeleteTarget::Habit(id) => self.delete_habit(id)?,
                    DeleteTarget::Event(id) => self.delete_event(id)?,
                }
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
                self.mode = Mode::Normal;
            }
            _ => {}
        }
        Ok(false)
    }

    fn set_view(&mut self, view: ViewMode) {
        if self.view != view {
            self.view = view;
            self.status = format!("Switched to {} view", view.label());
        }
        self.ensure_event_bounds();
    }

    fn cycle_mode(&mut self, delta: isize) {
        let modes = TimerMode::ALL;
        let idx = modes.iter().position(|m| *m == self.engine.mode()).unwrap_or(0) as isize;
        let next = modes[(idx + delta).rem_euclid(modes.len() as isize) as usize];
        self.engine.switch_mode(next);
        self.status = format!("{} mode", next.label());
    }

    /// Steps through the active tasks, then back to none.
    fn cycle_working_on(&mut self) {
        let active: Vec<EntityId> = self
            .tasks
            .filter(|t| t.status == TaskStatus::Active)
            .map(|t| t.id)
            .collect();
        if active.is_empty() {
            self.working_on = None;
            self.status = "No active tasks".into();
            return;
        }
        let next = match self
            .working_on
            .and_then(|id| active.iter().position(|a| *a == id))
        {
            None => Some(0),
            Some(idx) if idx + 1 < active.len() => Some(idx + 1),
            Some(_) => None,
        };
        self.working_on = next.map(|idx| active[idx]);
        self.status = match self.working_on_task() {
            Some(task) => format!("Working on {}", task.title),
            None => "Not tracking a task".into(),
        };
    }

    fn working_on_task(&self) -> Option<&Task> {
        self.working_on
            .and_then(|id| self.tasks.get(id))
            .filter(|t| t.status == TaskStatus::Active)
    }

    fn patch_settings(&mut self, patch: SettingsPatch) -> Result<()> {
        self.engine.update_settings(&patch);
        self.engine.save_settings(&self.store)?;
        let settings = self.engine.settings();
        let message = format!(
            "Sound {}, auto next {}",
            on_off(settings.sound_enabled),
            on_off(settings.auto_next)
        );
        self.saved(message);
        Ok(())
    }

    fn move_cursor(&mut self, days: i64) {
        self.cursor = shift_day(self.cursor, days);
        self.selected_event = 0;
    }

    fn current_habit(&self) -> Option<&Habit> {
        self.habits.items().get(self.selected_habit)
    }

    fn toggle_selected_habit(&mut self) -> Result<()> {
        let Some(habit) = self.current_habit() else {
            self.status = "No habit selected".into();
            return Ok(());
        };
        let (id, name) = (habit.id, habit.name.clone());
        let done = self.ledger.toggle(id, self.cursor)?;
        self.saved(format!(
            "{} {} on {}",
            if done { "Checked" } else { "Unchecked" },
            name,
            self.cursor.format("%b %-d")
        ));
        Ok(())
    }

    fn shift_selected_habit(&mut self, delta: isize) -> Result<()> {
        let target_idx = self.selected_habit as isize + delta;
        if target_idx < 0 || target_idx as usize >= self.habits.len() {
            return Ok(());
        }
        let items = self.habits.items();
        let (id, target) = (items[self.selected_habit].id, items[target_idx as usize].id);
        match self.habits.reorder(id, target) {
            Ok(true) => {
                self.selected_habit = target_idx as usize;
                self.saved("Reordered habits");
            }
            Ok(false) => {}
            Err(err) => self.report(err)?,
        }
        Ok(())
    }

    fn create_habit(&mut self, name: String) -> Result<()> {
        let order = self.habits.len();
        match self.habits.add(|id| Habit::new(id, name, order)) {
            Ok(habit) => {
                self.selected_habit = self.habits.len().saturating_sub(1);
                self.saved(format!("Added {}", habit.name));
            }
            Err(err) => self.report(err)?,
        }
        Ok(())
    }

    fn delete_habit(&mut self, id: EntityId) -> Result<()> {
        match self.habits.remove(id) {
            Ok(_) => {
                let removed = self.ledger.cascade_delete(id)?;
                self.selected_habit = self.selected_habit.min(self.habits.len().saturating_sub(1));
                self.saved(format!("Deleted habit and {} completions", removed));
            }
            Err(err) => self.report(err)?,
        }
        Ok(())
    }

    fn day_events(&self) -> Vec<DayEvent> {
        schedule::events_on(self.events.items(), self.cursor)
    }

    fn current_event(&self) -> Option<DayEvent> {
        self.day_events().into_iter().nth(self.selected_event)
    }

    fn ensure_event_bounds(&mut self) {
        let len = self.day_events().len();
        if self.selected_event >= len {
            self.selected_event = len.saturating_sub(1);
        }
    }

    fn create_event(&mut self, title: String) -> Result<()> {
        let draft = EventDraft {
            title,
            ..EventDraft::default()
        };
        let date = self.cursor;
        match self.events.add(|id| draft.build(id, date)) {
            Ok(event) => self.saved(format!("Added {} at {}", event.title, event.start_time)),
            Err(err) => self.report(err)?,
        }
        self.ensure_event_bounds();
        Ok(())
    }

    fn shift_selected_event(&mut self, delta: i32) -> Result<()> {
        let Some(event) = self.current_event() else {
            self.status = "No event selected".into();
            return Ok(());
        };
        let hour = event.start_time.hour() as i32 + delta;
        if !(0..=23).contains(&hour) {
            return Ok(());
        }
        let moved = reschedule_to_hour(&event, hour as u32)?;
        let (start, end) = (moved.start_time, moved.end_time);
        match self.events.update(event.id, |e| *e = moved) {
            Ok(_) => {
                // keep the moved event selected after re-sorting
                self.selected_event = self
                    .day_events()
                    .iter()
                    .position(|e| e.id == event.id)
                    .unwrap_or(0);
                self.saved(format!("Moved {} to {}-{}", event.title, start, end));
            }
            Err(err) => self.report(err)?,
        }
        Ok(())
    }

    fn delete_event(&mut self, id: EntityId) -> Result<()> {
        match self.events.remove(id) {
            Ok(_) => self.saved("Deleted event"),
            Err(err) => self.report(err)?,
        }
        self.ensure_event_bounds();
        Ok(())
    }

    /// Puts rejected input on the status line; storage failures propagate.
    fn report(&mut self, err: CollectionError) -> Result<()> {
        if err.is_benign() {
            self.status = format!("Nothing changed: {}", err);
            Ok(())
        } else {
            Err(err.into())
        }
    }

    fn saved(&mut self, message: impl Into<String>) {
        self.last_save = Instant::now();
        self.status = message.into();
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        match self.view {
            ViewMode::Timer => self.draw_timer(f, layout[1]),
            ViewMode::Habits => self.draw_habits(f, layout[1]),
            ViewMode::Calendar => self.draw_calendar(f, layout[1]),
            ViewMode::Day => self.draw_day(f, layout[1]),
        }
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::Input { target, buffer } => {
                let title = match target {
                    InputTarget::Habit => "New Habit",
                    InputTarget::Event => "New Event",
                };
                draw_input(f, title, buffer);
            }
            Mode::ConfirmDelete { title, .. } => draw_confirm(f, title),
            Mode::Normal => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let title = Line::from(vec![
            Span::styled(
                "focusflow ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                self.location.scope.label(),
                Style::default().fg(Color::Green),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", self.location.dir.display()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("saved {}", format_elapsed(self.last_save)),
                Style::default().fg(Color::Gray),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("view {}", self.view.label().to_lowercase()),
                Style::default().fg(Color::Magenta),
            ),
        ]);

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_timer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(area);

        let tabs: Vec<Span<'static>> = TimerMode::ALL
            .iter()
            .flat_map(|mode| {
                let style = if *mode == self.engine.mode() {
                    Style::default()
                        .fg(Color::Black)
                        .bg(mode_color(*mode))
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                };
                [
                    Span::styled(format!(" {} ", mode.label()), style),
                    Span::raw("  "),
                ]
            })
            .collect();
        f.render_widget(
            Paragraph::new(Line::from(tabs))
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::BOTTOM)),
            rows[0],
        );

        let state = match self.engine.state() {
            TimerState::Idle => "paused",
            TimerState::Running => "running",
            TimerState::Completed => "done",
        };
        let mut clock = vec![
            Line::from(""),
            Line::from(Span::styled(
                self.engine.display(),
                Style::default()
                    .fg(mode_color(self.engine.mode()))
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(state, Style::default().fg(Color::Gray))),
        ];
        if let Some(task) = self.working_on_task() {
            clock.push(Line::from(vec![
                Span::styled("Working on: ", Style::default().fg(Color::Gray)),
                Span::styled(task.title.clone(), Style::default().add_modifier(Modifier::BOLD)),
            ]));
        }
        f.render_widget(
            Paragraph::new(clock).alignment(Alignment::Center),
            rows[1],
        );

        let gauge = Gauge::default()
            .block(Block::default().title("Progress").borders(Borders::ALL))
            .gauge_style(Style::default().fg(mode_color(self.engine.mode())))
            .percent(self.engine.progress().round().clamp(0.0, 100.0) as u16)
            .label(format!("{:.0}%", self.engine.progress()));
        f.render_widget(gauge, rows[2]);

        let settings = self.engine.settings();
        let every = settings.rounds_until_long_break.max(1);
        let info = Line::from(vec![
            Span::styled(
                format!("Rounds {}", self.engine.rounds()),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(
                "  •  long break in {}  •  next {}  •  sound {}  •  auto next {}",
                every - self.engine.rounds() % every,
                self.engine.next_mode().label(),
                on_off(settings.sound_enabled),
                on_off(settings.auto_next)
            )),
        ]);
        f.render_widget(
            Paragraph::new(info)
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::TOP)),
            rows[3],
        );
    }

    fn draw_habits(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let days = days_in_month(self.cursor);
        let ids: Vec<EntityId> = self.habits.items().iter().map(|h| h.id).collect();
        let name_width = self
            .habits
            .items()
            .iter()
            .map(|h| h.name.chars().count())
            .max()
            .unwrap_or(0)
            .clamp(6, 20);

        let mut lines = Vec::new();
        let mut header = vec![Span::raw(format!("{:<w$} ", "", w = name_width))];
        header.extend(days.iter().map(|d| {
            let style = if *d == self.cursor {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            Span::styled(format!("{:>2} ", d.day()), style)
        }));
        lines.push(Line::from(header));

        for (idx, habit) in self.habits.items().iter().enumerate() {
            let name_style = if idx == self.selected_habit {
                Style::default().fg(Color::Black).bg(Color::LightCyan)
            } else {
                Style::default()
            };
            let mut spans = vec![
                Span::styled(
                    format!("{:<w$}", truncate_text(&habit.name, name_width), w = name_width),
                    name_style,
                ),
                Span::raw(" "),
            ];
            for day in &days {
                let done = self.ledger.is_complete(habit.id, *day);
                let mut style = Style::default().fg(if done { Color::Green } else { Color::DarkGray });
                if dates::is_today(*day) {
                    style = style.add_modifier(Modifier::BOLD);
                }
                if idx == self.selected_habit && *day == self.cursor {
                    style = style.bg(Color::Cyan).fg(Color::Black);
                }
                spans.push(Span::styled(if done { " ■ " } else { " · " }, style));
            }
            let rate = self.ledger.completion_rate(habit.id, &days);
            spans.push(Span::styled(
                format!(" {:>3.0}%", rate.rate),
                Style::default().fg(Color::Yellow),
            ));
            lines.push(Line::from(spans));
        }
        if self.habits.is_empty() {
            lines.push(Line::from(Span::styled(
                "No habits yet. Press n to add one.",
                Style::default().fg(Color::DarkGray),
            )));
        }

        let stats = self.ledger.monthly_stats(&ids, self.cursor);
        let progress = self
            .ledger
            .daily_progress(&ids, &[self.cursor])
            .into_iter()
            .next();
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled(
                format!(
                    "{} of {} completions ({:.1}%)",
                    stats.actual_completions, stats.total_possible, stats.percentage
                ),
                Style::default().fg(Color::LightYellow),
            ),
            Span::raw(match progress {
                Some(day) => format!(
                    "  •  {}: {}/{} ({:.0}%)",
                    day.date.format("%b %-d"),
                    day.completed_count,
                    day.total,
                    day.percentage
                ),
                None => String::new(),
            }),
        ]));

        let block = Block::default()
            .title(Span::styled(
                month_label(self.cursor),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        f.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn draw_calendar(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);

        let mut lines = Vec::new();
        lines.push(Line::from(Span::styled(
            month_label(self.cursor),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
        let headings = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];
        let header_spans: Vec<Span<'static>> = headings
            .iter()
            .map(|h| Span::styled(format!("{:^7}", h), Style::default().fg(Color::Gray)))
            .collect();
        lines.push(Line::from(header_spans));

        for week in views::calendar_month(self.tasks.items(), self.cursor) {
            let spans: Vec<Span<'static>> = week
                .iter()
                .map(|cell| {
                    let date = cell.day.date;
                    let text = if cell.total > 0 {
                        format!("{:>2}({}/{})", date.day(), cell.done, cell.total)
                    } else {
                        format!("{:>2}", date.day())
                    };
                    let mut style = Style::default().fg(if !cell.day.in_current_month {
                        Color::DarkGray
                    } else if cell.total > 0 {
                        Color::LightYellow
                    } else {
                        Color::Gray
                    });
                    if dates::is_today(date) {
                        style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
                    }
                    if dates::is_same_day(date, self.cursor) {
                        style = style
                            .bg(Color::Cyan)
                            .fg(Color::Black)
                            .add_modifier(Modifier::BOLD);
                    }
                    Span::styled(format!("{:^7}", text), style)
                })
                .collect();
            lines.push(Line::from(spans));
        }

        let block = Block::default()
            .title("Calendar")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        f.render_widget(
            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .block(block),
            panes[0],
        );

        let tasks = views::tasks_on(self.tasks.items(), self.cursor, None);
        let stats = views::TaskStats::of(tasks.iter().copied());
        let mut items: Vec<ListItem<'static>> = tasks
            .iter()
            .map(|task| {
                let (mark, color) = match task.status {
                    TaskStatus::Active => ("[ ]", Color::White),
                    TaskStatus::Done => ("[x]", Color::Green),
                    TaskStatus::Cancelled => ("[-]", Color::DarkGray),
                };
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{} ", mark), Style::default().fg(color)),
                    Span::raw(task.title.clone()),
                ]))
            })
            .collect();
        if items.is_empty() {
            items.push(ListItem::new(Span::styled(
                "No tasks",
                Style::default().fg(Color::DarkGray),
            )));
        }
        let title = format!(
            "{}  {}/{} done",
            self.cursor.format("%a %b %-d"),
            stats.done,
            stats.total
        );
        f.render_widget(
            List::new(items).block(Block::default().title(title).borders(Borders::ALL)),
            panes[1],
        );
    }

    fn draw_day(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(area);
        let events = self.day_events();

        let items: Vec<ListItem<'static>> = events
            .iter()
            .map(|event| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{}-{} ", event.start_time, event.end_time),
                        Style::default().fg(Color::Gray),
                    ),
                    Span::styled(
                        event.title.clone(),
                        Style::default().fg(category_color(event.category)),
                    ),
                ]))
            })
            .collect();
        let mut state = ListState::default();
        if !events.is_empty() {
            state.select(Some(self.selected_event));
        }
        let title = self.cursor.format("%A, %B %-d").to_string();
        let list = List::new(items)
            .block(Block::default().title(title).borders(Borders::ALL))
            .highlight_style(
                Style::default()
                    .bg(Color::LightCyan)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_stateful_widget(list, panes[0], &mut state);

        // one row per hour; bar length follows the laid-out box height
        let layout = self.config.layout();
        let mut lines = Vec::new();
        for hour in schedule::timeline_hours(&layout) {
            let mut spans = vec![Span::styled(
                format!("{:02}:00 │ ", hour),
                Style::default().fg(Color::DarkGray),
            )];
            for event in events.iter().filter(|e| e.start_time.hour() == hour) {
                let slot = position(event.start_time, event.end_time, &layout);
                let quarters = (slot.height / layout.pixels_per_hour * 4.0).round().max(1.0) as usize;
                let selected = self.current_event().map(|e| e.id) == Some(event.id);
                let mut style = Style::default().fg(category_color(event.category));
                if selected {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                spans.push(Span::styled(
                    format!("{} {} ", "█".repeat(quarters), truncate_text(&event.title, 18)),
                    style,
                ));
            }
            lines.push(Line::from(spans));
        }
        let counts: Vec<String> = schedule::category_counts(&events)
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .map(|(cat, n)| format!("{} {}", cat.label(), n))
            .collect();
        f.render_widget(
            Paragraph::new(lines).block(
                Block::default()
                    .title(format!("Timeline  {}", counts.join("  ")))
                    .borders(Borders::ALL),
            ),
            panes[1],
        );
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, rows[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::LightCyan));
        let mut spans = vec![
            key("1"),
            Span::raw(" timer  "),
            key("2"),
            Span::raw(" habits  "),
            key("3"),
            Span::raw(" calendar  "),
            key("4"),
            Span::raw(" day  "),
        ];
        match self.view {
            ViewMode::Timer => spans.extend([
                key("space"),
                Span::raw(" start/pause  "),
                key("r"),
                Span::raw(" reset  "),
                key("tab"),
                Span::raw(" mode  "),
                key("n"),
                Span::raw(" next  "),
                key("w"),
                Span::raw(" task  "),
                key("s/a"),
                Span::raw(" sound/auto  "),
            ]),
            ViewMode::Habits => spans.extend([
                key("↑↓←→"),
                Span::raw(" move  "),
                key("space"),
                Span::raw(" check  "),
                key("[ ]"),
                Span::raw(" month  "),
                key("J/K"),
                Span::raw(" reorder  "),
                key("n/d"),
                Span::raw(" add/delete  "),
            ]),
            ViewMode::Calendar => spans.extend([
                key("↑↓←→"),
                Span::raw(" move  "),
                key("[ ]"),
                Span::raw(" month  "),
                key("enter"),
                Span::raw(" open day  "),
            ]),
            ViewMode::Day => spans.extend([
                key("↑↓"),
                Span::raw(" select  "),
                key("←→"),
                Span::raw(" day  "),
                key("+/-"),
                Span::raw(" hour  "),
                key("n/d"),
                Span::raw(" add/delete  "),
            ]),
        }
        spans.extend([key("q"), Span::raw(" quit")]);
        Line::from(spans)
    }
}

fn draw_input(f: &mut ratatui::Frame<'_>, title: &str, buffer: &str) {
    let area = centered_rect(50, 20, f.size());
    let body = vec![
        Line::from(format!("{}_", buffer)),
        Line::from(""),
        Line::from(Span::styled(
            "Enter to save, Esc to cancel",
            Style::default().fg(Color::Gray),
        )),
    ];
    let dialog = Paragraph::new(body).block(
        Block::default()
            .title(Span::styled(
                title.to_string(),
                Style::default()
                    .fg(Color::LightCyan)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::LightCyan)),
    );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn draw_confirm(f: &mut ratatui::Frame<'_>, title: &str) {
    let area = centered_rect(50, 30, f.size());
    let body = vec![
        Line::from(Span::styled(
            format!("Are you sure you want to delete \"{}\"?", title),
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Press y to confirm, n or Esc to cancel"),
    ];
    let dialog = Paragraph::new(body)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(Span::styled(
                    "Confirm Delete",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn mode_color(mode: TimerMode) -> Color {
    match mode {
        TimerMode::Focus => Color::LightRed,
        TimerMode::ShortBreak => Color::LightGreen,
        TimerMode::LongBreak => Color::LightBlue,
        TimerMode::DeepWork => Color::Magenta,
    }
}

fn category_color(category: EventCategory) -> Color {
    match category {
        EventCategory::Work => Color::LightBlue,
        EventCategory::Personal => Color::LightMagenta,
        EventCategory::Fitness => Color::LightGreen,
        EventCategory::Meeting => Color::Yellow,
        EventCategory::Other => Color::Gray,
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}
