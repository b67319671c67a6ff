//! Read-only projections recomputed from the collections after each change.

use crate::dates::{month_grid, GridDay};
use crate::model::{MatrixTask, Quadrant, QuickTask, Task, TaskStatus};
use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskStats {
    pub total: usize,
    pub active: usize,
    pub done: usize,
    pub cancelled: usize,
}

impl TaskStats {
    pub fn of<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut stats = TaskStats::default();
        for task in tasks {
            stats.total += 1;
            match task.status {
                TaskStatus::Active => stats.active += 1,
                TaskStatus::Done => stats.done += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }
}

/// Tasks planned for `date`, optionally narrowed to one status, in insertion
/// order.
pub fn tasks_on<'a>(tasks: &'a [Task], date: NaiveDate, status: Option<TaskStatus>) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| t.effective_date() == date)
        .filter(|t| status.map_or(true, |s| t.status == s))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
}

pub fn quick_progress(tasks: &[QuickTask]) -> Progress {
    let completed = tasks.iter().filter(|t| t.done).count();
    let total = tasks.len();
    Progress {
        completed,
        total,
        percentage: if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            0.0
        },
    }
}

pub fn quadrant_tasks(tasks: &[MatrixTask], quadrant: Quadrant) -> Vec<&MatrixTask> {
    tasks.iter().filter(|t| t.quadrant == quadrant).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixStats {
    pub total: usize,
    pub done: usize,
    pub by_quadrant: Vec<(Quadrant, usize)>,
}

pub fn matrix_stats(tasks: &[MatrixTask]) -> MatrixStats {
    MatrixStats {
        total: tasks.len(),
        done: tasks.iter().filter(|t| t.done).count(),
        by_quadrant: Quadrant::ALL
            .iter()
            .map(|q| (*q, tasks.iter().filter(|t| t.quadrant == *q).count()))
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarCell {
    pub day: GridDay,
    pub total: usize,
    pub done: usize,
}

/// The month grid annotated with how many tasks fall on each day.
pub fn calendar_month(tasks: &[Task], anchor: NaiveDate) -> Vec<Vec<CalendarCell>> {
    let mut counts: HashMap<NaiveDate, (usize, usize)> = HashMap::new();
    for task in tasks {
        let entry = counts.entry(task.effective_date()).or_default();
        entry.0 += 1;
        if task.status == TaskStatus::Done {
            entry.1 += 1;
        }
    }
    month_grid(anchor)
        .into_iter()
        .map(|week| {
            week.into_iter()
                .map(|day| {
                    let (total, done) = counts.get(&day.date).copied().unwrap_or_default();
                    CalendarCell { day, total, done }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskCategory;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(id: i64, date: NaiveDate, status: TaskStatus) -> Task {
        let mut task = Task::new(id, format!("task {id}"), String::new(), TaskCategory::Today, date);
        task.status = status;
        task
    }

    #[test]
    fn tasks_on_filters_date_and_status() {
        let day = ymd(2024, 3, 5);
        let tasks = vec![
            task(1, day, TaskStatus::Active),
            task(2, day, TaskStatus::Done),
            task(3, ymd(2024, 3, 6), TaskStatus::Done),
        ];
        assert_eq!(tasks_on(&tasks, day, None).len(), 2);
        let done: Vec<_> = tasks_on(&tasks, day, Some(TaskStatus::Done))
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(done, vec![2]);
        let stats = TaskStats::of(tasks_on(&tasks, day, None));
        assert_eq!(
            stats,
            TaskStats {
                total: 2,
                active: 1,
                done: 1,
                cancelled: 0
            }
        );
    }

    #[test]
    fn quick_progress_handles_empty_list() {
        assert_eq!(quick_progress(&[]).percentage, 0.0);
        let mut a = QuickTask::new(1, "a".into());
        a.done = true;
        let b = QuickTask::new(2, "b".into());
        let progress = quick_progress(&[a, b]);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.percentage, 50.0);
    }

    #[test]
    fn matrix_stats_count_each_quadrant() {
        let mut done = MatrixTask::new(1, "a".into(), String::new(), Quadrant::UrgentImportant);
        done.done = true;
        let tasks = vec![
            done,
            MatrixTask::new(2, "b".into(), String::new(), Quadrant::NotUrgentNotImportant),
        ];
        let stats = matrix_stats(&tasks);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.done, 1);
        assert_eq!(stats.by_quadrant[0], (Quadrant::UrgentImportant, 1));
        assert_eq!(stats.by_quadrant[3], (Quadrant::NotUrgentNotImportant, 1));
        assert_eq!(quadrant_tasks(&tasks, Quadrant::UrgentNotImportant).len(), 0);
    }

    #[test]
    fn calendar_cells_carry_task_counts() {
        let tasks = vec![
            task(1, ymd(2024, 3, 5), TaskStatus::Done),
            task(2, ymd(2024, 3, 5), TaskStatus::Active),
            task(3, ymd(2024, 2, 26), TaskStatus::Active),
        ];
        let cells: Vec<CalendarCell> = calendar_month(&tasks, ymd(2024, 3, 1))
            .into_iter()
            .flatten()
            .collect();
        let march_fifth = cells.iter().find(|c| c.day.date == ymd(2024, 3, 5)).unwrap();
        assert_eq!((march_fifth.total, march_fifth.done), (2, 1));
        let spill = cells.iter().find(|c| c.day.date == ymd(2024, 2, 26)).unwrap();
        assert!(!spill.day.in_current_month);
        assert_eq!(spill.total, 1);
    }
}
