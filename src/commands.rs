use crate::cli::{
    DataCommand, EventCommand, EventFields, HabitCommand, MatrixCommand, PomodoroCommand,
    QuickCommand, TaskCommand,
};
use crate::collection::{CollectionError, EntityCollection};
use crate::config::{load_config, AppConfig};
use crate::dates::{self, date_key, days_in_month, month_label, today};
use crate::diagnostics;
use crate::ledger::CompletionLedger;
use crate::model::{
    DayEvent, EntityId, EventDraft, Habit, MatrixTask, Quadrant, QuickTask, Task, TaskStatus,
};
use crate::schedule::{self, position, reschedule_to_hour};
use crate::storage::{init_project_dir, locate_data_dir, DataLocation, KeyedStore, StoreKey};
use crate::timer::{format_clock, SettingsPatch, TimerEngine, TimerMode};
use crate::ui;
use crate::views::{self, TaskStats};
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Everything a command needs: where the data lives, its config and the store.
pub struct Workspace {
    pub location: DataLocation,
    pub config: AppConfig,
    pub store: KeyedStore,
}

impl Workspace {
    pub fn open(data_dir: Option<PathBuf>) -> Result<Self> {
        let cwd = env::current_dir()?;
        let location = locate_data_dir(data_dir, &cwd)?;
        let config = load_config(&location.dir)?;
        let store = location.open(&config.key_prefix);
        tracing::debug!(dir = %location.dir.display(), scope = location.scope.label(), "opened workspace");
        Ok(Workspace {
            location,
            config,
            store,
        })
    }
}

pub fn init() -> Result<()> {
    let location = init_project_dir()?;
    println!("Initialized data directory at {}", location.dir.display());
    Ok(())
}

pub fn task(ws: &Workspace, command: TaskCommand) -> Result<()> {
    let mut tasks: EntityCollection<Task> = EntityCollection::load(&ws.store, StoreKey::Tasks);
    match command {
        TaskCommand::Add {
            title,
            description,
            category,
            date,
        } => {
            let day = date.unwrap_or_else(today);
            report(
                tasks.add(|id| {
                    Task::new(id, title, description.unwrap_or_default(), category, day)
                }),
                |task| println!("Added task {} on {}", task.id, date_key(day)),
            )
        }
        TaskCommand::List { date, status } => {
            let day = date.unwrap_or_else(today);
            let listed = views::tasks_on(tasks.items(), day, status);
            println!("Tasks for {}", day.format("%a, %b %-d, %Y"));
            if listed.is_empty() {
                println!("  (none)");
            }
            for task in &listed {
                print_task(task);
            }
            let stats = TaskStats::of(views::tasks_on(tasks.items(), day, None));
            println!(
                "total {}  active {}  done {}  cancelled {}",
                stats.total, stats.active, stats.done, stats.cancelled
            );
            Ok(())
        }
        TaskCommand::Status { id, status } => report(
            tasks.update(id, |t| t.status = status),
            |task| println!("Task {} is now {}", task.id, task.status.label()),
        ),
        TaskCommand::Edit {
            id,
            title,
            description,
            category,
        } => report(
            tasks.update(id, |t| {
                if let Some(title) = title {
                    t.title = title;
                }
                if let Some(description) = description {
                    t.description = description;
                }
                if let Some(category) = category {
                    t.category = category;
                }
            }),
            |task| println!("Updated task {}", task.id),
        ),
        TaskCommand::Delete { id } => report_removed(tasks.remove(id), "task", id),
    }
}

pub fn quick(ws: &Workspace, command: QuickCommand) -> Result<()> {
    let mut quick: EntityCollection<QuickTask> =
        EntityCollection::load(&ws.store, StoreKey::QuickTasks);
    match command {
        QuickCommand::Add { title } => report(
            quick.add(|id| QuickTask::new(id, title)),
            |task| println!("Added quick task {}", task.id),
        ),
        QuickCommand::List => {
            for task in quick.items() {
                println!("  [{}] {}: {}", if task.done { "x" } else { " " }, task.id, task.title);
            }
            let open = quick.filter(|t| !t.done).count();
            let progress = views::quick_progress(quick.items());
            println!(
                "{}/{} done ({:.0}%), {} open",
                progress.completed, progress.total, progress.percentage, open
            );
            Ok(())
        }
        QuickCommand::Toggle { id } => report(
            quick.update(id, |t| t.done = !t.done),
            |task| println!("{} {}", if task.done { "Completed" } else { "Reopened" }, task.id),
        ),
        QuickCommand::Delete { id } => report_removed(quick.remove(id), "quick task", id),
    }
}

pub fn matrix(ws: &Workspace, command: MatrixCommand) -> Result<()> {
    let mut matrix: EntityCollection<MatrixTask> =
        EntityCollection::load(&ws.store, StoreKey::MatrixTasks);
    match command {
        MatrixCommand::Add {
            title,
            notes,
            quadrant,
        } => report(
            matrix.add(|id| MatrixTask::new(id, title, notes.unwrap_or_default(), quadrant)),
            |task| println!("Added {} to {}", task.id, task.quadrant.label()),
        ),
        MatrixCommand::List => {
            for quadrant in Quadrant::ALL {
                let tasks = views::quadrant_tasks(matrix.items(), quadrant);
                println!("{} ({}) [{}]", quadrant.label(), quadrant.description(), tasks.len());
                for task in tasks {
                    println!(
                        "  [{}] {}: {}",
                        if task.done { "x" } else { " " },
                        task.id,
                        task.title
                    );
                    if !task.notes.is_empty() {
                        println!("      {}", task.notes);
                    }
                }
            }
            let stats = views::matrix_stats(matrix.items());
            println!("{} tasks, {} done", stats.total, stats.done);
            Ok(())
        }
        MatrixCommand::Edit { id, title, notes } => report(
            matrix.update(id, |t| {
                if let Some(title) = title {
                    t.title = title;
                }
                if let Some(notes) = notes {
                    t.notes = notes;
                }
            }),
            |task| println!("Updated {}", task.id),
        ),
        MatrixCommand::Move { id, quadrant } => report(
            matrix.update(id, |t| t.quadrant = quadrant),
            |task| println!("Moved {} to {}", task.id, task.quadrant.label()),
        ),
        MatrixCommand::Toggle { id } => report(
            matrix.update(id, |t| t.done = !t.done),
            |task| println!("{} {}", if task.done { "Completed" } else { "Reopened" }, task.id),
        ),
        MatrixCommand::Delete { id } => report_removed(matrix.remove(id), "matrix task", id),
    }
}

pub fn habit(ws: &Workspace, command: HabitCommand) -> Result<()> {
    let mut habits: EntityCollection<Habit> = EntityCollection::load(&ws.store, StoreKey::Habits);
    habits.sort_by_order();
    let mut ledger = CompletionLedger::load(&ws.store);
    match command {
        HabitCommand::Add { name } => {
            let order = habits.len();
            report(habits.add(|id| Habit::new(id, name, order)), |habit| {
                println!("Added habit {}", habit.id)
            })
        }
        HabitCommand::List { month } => {
            let anchor = month.unwrap_or_else(today);
            print_habit_grid(&habits, &ledger, anchor);
            Ok(())
        }
        HabitCommand::Toggle { id, date } => {
            let day = date.unwrap_or_else(today);
            if habits.get(id).is_none() {
                println!("Nothing changed: no habit with id {}", id);
                return Ok(());
            }
            let done = ledger.toggle(id, day)?;
            println!(
                "{} {} on {}",
                if done { "Checked" } else { "Unchecked" },
                id,
                date_key(day)
            );
            Ok(())
        }
        HabitCommand::Reorder { id, target } => {
            if habits.reorder(id, target)? {
                let names: Vec<&str> = habits.items().iter().map(|h| h.name.as_str()).collect();
                println!("Order: {}", names.join(", "));
            } else {
                println!("Nothing changed");
            }
            Ok(())
        }
        HabitCommand::Rename { id, name } => report(
            habits.update(id, |h| h.name = name),
            |habit| println!("Renamed {} to {}", habit.id, habit.name),
        ),
        HabitCommand::Delete { id, yes } => {
            let Some(habit) = habits.get(id).cloned() else {
                println!("Nothing changed: no habit with id {}", id);
                return Ok(());
            };
            let prompt = format!("Are you sure you want to delete \"{}\"?", habit.name);
            if !yes && !stdin_confirm(&prompt) {
                println!("Delete canceled");
                return Ok(());
            }
            habits.remove(id)?;
            let removed = ledger.cascade_delete(id)?;
            println!("Deleted habit {} and {} completions", id, removed);
            Ok(())
        }
        HabitCommand::Stats { month } => {
            let anchor = month.unwrap_or_else(today);
            print_habit_stats(&habits, &ledger, anchor);
            Ok(())
        }
    }
}

pub fn event(ws: &Workspace, command: EventCommand) -> Result<()> {
    let mut events: EntityCollection<DayEvent> =
        EntityCollection::load(&ws.store, StoreKey::DayPlannerEvents);
    match command {
        EventCommand::Add {
            title,
            fields,
            date,
        } => {
            let day = date.unwrap_or_else(today);
            let draft = EventDraft {
                title,
                start_time: fields.start,
                end_time: fields.end,
                category: fields.category,
                notes: fields.notes,
            };
            report(events.add(|id| draft.build(id, day)), |event| {
                println!(
                    "Added event {} {}-{} on {}",
                    event.id,
                    event.start_time,
                    event.end_time,
                    date_key(day)
                )
            })
        }
        EventCommand::List { date } => {
            let day = date.unwrap_or_else(today);
            print_day(&ws.config, events.items(), day);
            Ok(())
        }
        EventCommand::Edit { id, title, fields } => report(
            events.update(id, |e| apply_event_fields(e, title, fields)),
            |event| println!("Updated event {}", event.id),
        ),
        EventCommand::Move { id, hour } => {
            let Some(current) = events.get(id).cloned() else {
                println!("Nothing changed: no event with id {}", id);
                return Ok(());
            };
            let moved = reschedule_to_hour(&current, hour)?;
            report(events.update(id, |e| *e = moved), |event| {
                println!("Moved {} to {}-{}", event.id, event.start_time, event.end_time)
            })
        }
        EventCommand::Delete { id } => report_removed(events.remove(id), "event", id),
    }
}

pub fn calendar(ws: &Workspace, month: Option<NaiveDate>) -> Result<()> {
    let tasks: EntityCollection<Task> = EntityCollection::load(&ws.store, StoreKey::Tasks);
    let anchor = month.unwrap_or_else(today);
    println!("{} ({})", month_label(anchor), dates::month_key(anchor));
    println!(
        "{}",
        ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"]
            .iter()
            .map(|h| format!("{:^8}", h))
            .collect::<String>()
    );
    for week in views::calendar_month(tasks.items(), anchor) {
        let row: String = week
            .iter()
            .map(|cell| {
                let day = cell.day.date.format("%-d").to_string();
                let label = if cell.day.in_current_month {
                    day
                } else {
                    format!("({})", day)
                };
                let mark = if dates::is_today(cell.day.date) { "*" } else { "" };
                let text = if cell.total > 0 {
                    format!("{}{} {}/{}", label, mark, cell.done, cell.total)
                } else {
                    format!("{}{}", label, mark)
                };
                format!("{:^8}", text)
            })
            .collect();
        println!("{}", row);
    }
    Ok(())
}

pub fn pomodoro(ws: &Workspace, command: PomodoroCommand) -> Result<()> {
    let mut engine = TimerEngine::load(&ws.store);
    match command {
        PomodoroCommand::Status => {
            let settings = engine.settings();
            for mode in TimerMode::ALL {
                println!("{:<12} {:>3} min", mode.label(), settings.minutes(mode));
            }
            println!("long break every {} rounds", settings.rounds_until_long_break);
            println!("auto next: {}  sound: {}", settings.auto_next, settings.sound_enabled);
            println!("rounds: {}", engine.rounds());
            Ok(())
        }
        PomodoroCommand::Settings {
            focus,
            short_break,
            long_break,
            deep_work,
            rounds_until_long_break,
            auto_next,
            sound,
        } => {
            let patch = SettingsPatch {
                focus,
                short_break,
                long_break,
                deep_work,
                rounds_until_long_break,
                auto_next,
                sound_enabled: sound,
            };
            if patch.is_empty() {
                println!("Nothing changed");
                return Ok(());
            }
            engine.update_settings(&patch);
            engine.save_settings(&ws.store)?;
            println!(
                "Focus {} / short {} / long {} / deep {} ({} remaining on the next focus)",
                engine.settings().focus,
                engine.settings().short_break,
                engine.settings().long_break,
                engine.settings().deep_work,
                format_clock(engine.remaining())
            );
            Ok(())
        }
        PomodoroCommand::ResetRounds => {
            engine.reset_rounds();
            engine.save_rounds(&ws.store)?;
            println!("Round counter reset");
            Ok(())
        }
        PomodoroCommand::Run { mode } => ui::run_timer(ws, mode),
    }
}

pub fn data(ws: &Workspace, command: DataCommand) -> Result<()> {
    match command {
        DataCommand::Dump { summary } => {
            println!(
                "Data directory: {} ({})",
                ws.location.dir.display(),
                ws.location.scope.label()
            );
            if summary {
                for key in StoreKey::ALL {
                    println!(
                        "  {:<20} {}",
                        key.suffix(),
                        diagnostics::summarize(&ws.store, key)
                    );
                }
            } else {
                print!("{}", diagnostics::dump(&ws.store).context("rendering dump")?);
            }
            Ok(())
        }
        DataCommand::Clear { store, yes } => {
            let mut confirm = |prompt: &str| yes || stdin_confirm(prompt);
            if diagnostics::clear_store(&ws.store, store, &mut confirm)? {
                println!("Cleared {}", store.suffix());
            } else {
                println!("Clear canceled");
            }
            Ok(())
        }
        DataCommand::Reset { yes } => {
            let mut confirm = |prompt: &str| yes || stdin_confirm(prompt);
            if diagnostics::clear_all(&ws.store, &mut confirm)? {
                println!("All data cleared");
            } else {
                println!("Reset canceled");
            }
            Ok(())
        }
    }
}

pub fn tui(ws: &Workspace) -> Result<()> {
    ui::run(ws)
}

fn apply_event_fields(event: &mut DayEvent, title: Option<String>, fields: EventFields) {
    if let Some(title) = title {
        event.title = title;
    }
    if let Some(start) = fields.start {
        event.start_time = start;
    }
    if let Some(end) = fields.end {
        event.end_time = end;
    }
    if let Some(category) = fields.category {
        event.category = category;
    }
    if let Some(notes) = fields.notes {
        event.notes = notes;
    }
}

/// Prints the outcome of a mutation; rejected input and unknown ids are
/// reported but do not fail the command.
fn report<T>(result: Result<T, CollectionError>, on_ok: impl FnOnce(T)) -> Result<()> {
    match result {
        Ok(value) => {
            on_ok(value);
            Ok(())
        }
        Err(err) if err.is_benign() => {
            println!("Nothing changed: {}", err);
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn report_removed(result: Result<bool, CollectionError>, what: &str, id: EntityId) -> Result<()> {
    if result? {
        println!("Deleted {} {}", what, id);
    } else {
        println!("Nothing changed: no {} with id {}", what, id);
    }
    Ok(())
}

fn stdin_confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn print_task(task: &Task) {
    let mark = match task.status {
        TaskStatus::Active => " ",
        TaskStatus::Done => "x",
        TaskStatus::Cancelled => "-",
    };
    println!(
        "  [{}] {}: {} ({})",
        mark,
        task.id,
        task.title,
        task.category.label()
    );
    if !task.description.is_empty() {
        println!("      {}", task.description);
    }
}

fn print_habit_grid(habits: &EntityCollection<Habit>, ledger: &CompletionLedger, anchor: NaiveDate) {
    let days = days_in_month(anchor);
    println!("{}", month_label(anchor));
    if habits.is_empty() {
        println!("  (no habits)");
        return;
    }
    let width = habits
        .items()
        .iter()
        .map(|h| h.name.chars().count())
        .max()
        .unwrap_or(0);
    // last digit of each day number
    let header: String = days
        .iter()
        .map(|d| char::from(b'0' + (d.day() % 10) as u8))
        .collect();
    println!("{:<15} {:<width$} {}", "", "", header, width = width);
    for habit in habits.items() {
        let cells: String = days
            .iter()
            .map(|d| {
                if ledger.is_complete(habit.id, *d) {
                    'x'
                } else if dates::is_today(*d) {
                    '_'
                } else {
                    '.'
                }
            })
            .collect();
        println!("{:<15} {:<width$} {}", habit.id, habit.name, cells, width = width);
    }
}

fn print_habit_stats(habits: &EntityCollection<Habit>, ledger: &CompletionLedger, anchor: NaiveDate) {
    let ids: Vec<EntityId> = habits.items().iter().map(|h| h.id).collect();
    let days = days_in_month(anchor);
    let stats = ledger.monthly_stats(&ids, anchor);
    println!("{}", month_label(anchor));
    println!(
        "{} of {} possible completions ({:.1}%)",
        stats.actual_completions, stats.total_possible, stats.percentage
    );
    for habit in habits.items() {
        let rate = ledger.completion_rate(habit.id, &days);
        println!(
            "  {:<20} {:>2}/{} days ({:.0}%)",
            habit.name,
            rate.completed_days,
            days.len(),
            rate.rate
        );
    }
    let best = ledger
        .daily_progress(&ids, &days)
        .into_iter()
        .filter(|p| p.completed_count > 0)
        .max_by_key(|p| p.completed_count);
    if let Some(best) = best {
        println!(
            "best day: {} ({}/{})",
            date_key(best.date),
            best.completed_count,
            best.total
        );
    }
    for (n, week) in dates::month_weeks(anchor).iter().enumerate() {
        let done: usize = ledger
            .daily_progress(&ids, week)
            .iter()
            .map(|p| p.completed_count)
            .sum();
        println!("  week {}: {}/{}", n + 1, done, week.len() * ids.len());
    }
    let this_week: usize = ledger
        .daily_progress(&ids, &dates::week_of(today()))
        .iter()
        .map(|p| p.completed_count)
        .sum();
    let all_time = ledger
        .completed()
        .filter(|(id, _)| ids.contains(id))
        .count();
    println!(
        "this week: {}  all time: {} ({} entries on record)",
        this_week,
        all_time,
        ledger.len()
    );
}

fn print_day(config: &AppConfig, events: &[DayEvent], day: NaiveDate) {
    let layout = config.layout();
    let day_events = schedule::events_on(events, day);
    println!("{}", day.format("%A, %B %-d, %Y"));
    if day_events.is_empty() {
        println!("  (no events)");
    }
    for event in &day_events {
        let slot = position(event.start_time, event.end_time, &layout);
        println!(
            "  {}-{}  {:<24} {:<8} {}  [top {:.0} height {:.0}]",
            event.start_time,
            event.end_time,
            event.title,
            event.category.label(),
            event.id,
            slot.top,
            slot.height
        );
        if !event.notes.is_empty() {
            println!("               {}", event.notes);
        }
    }
    let counts: Vec<String> = schedule::category_counts(&day_events)
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .map(|(cat, n)| format!("{} {}", cat.label(), n))
        .collect();
    if !counts.is_empty() {
        println!("{}", counts.join("  "));
    }
}
