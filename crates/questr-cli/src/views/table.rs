use chrono::{DateTime, NaiveDate, Utc};
use chrono_humanize::Humanize;
use chrono_tz::Tz;
use comfy_table::{Attribute, Cell, Color, Row, Table};
use owo_colors::OwoColorize;
use questr_core::level::LevelCurve;
use questr_core::models::{
    weekday_name, DailyStats, Difficulty, LevelUp, Task, TaskHistoryEntry, TaskKind, TaskRecord, User,
};

use crate::util::short_id;

const PROGRESS_WIDTH: usize = 24;

fn difficulty_cell(difficulty: Difficulty) -> Cell {
    let cell = Cell::new(difficulty.to_string());
    match difficulty {
        Difficulty::Hard => cell.fg(Color::Red).add_attribute(Attribute::Bold),
        Difficulty::Medium => cell.fg(Color::Yellow),
        Difficulty::Easy => cell.fg(Color::Green),
    }
}

fn status_cell(task: &Task) -> Cell {
    match (&task.kind, &task.record) {
        (_, TaskRecord::Failed { penalty, .. }) => Cell::new(format!("missed (-{} XP)", penalty)).fg(Color::Red),
        (_, TaskRecord::Completed { .. }) => Cell::new("done").fg(Color::Green),
        (TaskKind::Template { recurring_days }, _) => {
            let days: Vec<&str> = recurring_days.iter().map(|d| &weekday_name(d)[..3]).collect();
            Cell::new(format!("every {}", days.join(","))).fg(Color::Cyan)
        }
        _ if task.is_hidden() => Cell::new("hidden").fg(Color::DarkGrey),
        _ => Cell::new("active"),
    }
}

fn when_text(task: &Task, today: NaiveDate) -> String {
    match (&task.kind, &task.record) {
        (_, TaskRecord::Failed { missed_date, .. }) => format!("missed {}", missed_date),
        (_, TaskRecord::Completed { completed_at }) => completed_at.humanize(),
        (TaskKind::Instance { occurrence_date, .. }, _) if *occurrence_date == today => "today".to_string(),
        (TaskKind::Instance { occurrence_date, .. }, _) => occurrence_date.to_string(),
        _ => format!("added {}", task.created_at.humanize()),
    }
}

pub fn display_tasks(tasks: &[Task], today: NaiveDate) {
    if tasks.is_empty() {
        println!("No quests found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Quest", "Difficulty", "XP", "Type", "Status", "When"]);

    for task in tasks {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(&task.id)));

        let mut title = task.display_title();
        if task.is_instance() {
            title = format!("↻ {}", title);
        }
        let mut title_cell = Cell::new(title);
        title_cell = match task.record {
            TaskRecord::Completed { .. } => title_cell.add_attribute(Attribute::CrossedOut).fg(Color::DarkGrey),
            TaskRecord::Failed { .. } => title_cell.fg(Color::Red),
            TaskRecord::Active => title_cell,
        };
        row.add_cell(title_cell);

        row.add_cell(difficulty_cell(task.difficulty));
        row.add_cell(Cell::new(task.xp_reward));
        row.add_cell(Cell::new(task.quest_type.as_deref().unwrap_or("")));
        row.add_cell(status_cell(task));
        row.add_cell(Cell::new(when_text(task, today)));

        table.add_row(row);
    }

    println!("{table}");
}

fn progress_bar(done: u64, span: u64) -> String {
    let filled = if span == 0 {
        PROGRESS_WIDTH
    } else {
        ((done.min(span) as f64 / span as f64) * PROGRESS_WIDTH as f64).round() as usize
    };
    format!("[{}{}]", "#".repeat(filled), "-".repeat(PROGRESS_WIDTH - filled))
}

pub fn display_status(user: &User, curve: &LevelCurve, level_up: Option<LevelUp>) {
    if user.level == 0 {
        println!(
            "{} {}",
            "Level 0".red().bold(),
            format!("(in debt: earn {} XP to return to level 1)", user.xp_to_next_level).red()
        );
    } else {
        let span = curve.xp_span_of_level(user.total_xp);
        println!("{} {}", format!("Level {}", user.level).bold(), progress_bar(user.xp, span));
        if span == 0 {
            println!("  Max level reached");
        } else {
            println!("  {} / {} XP ({} to next level)", user.xp, span, user.xp_to_next_level);
        }
    }

    println!("  Total XP:        {}", user.total_xp);
    println!("  Streak:          {} day(s)", user.streak_days);
    println!("  Quests done:     {}", user.tasks_completed);
    println!("  Quests missed:   {} (-{} XP)", user.tasks_failed, user.failed_xp);
    if user.bonus_xp > 0 {
        println!("  Milestone bonus: {} XP", user.bonus_xp);
    }

    if let Some(level_up) = level_up {
        println!();
        display_level_up(level_up);
    }
}

pub fn display_level_up(level_up: LevelUp) {
    println!(
        "{} Level {} → {} (run `questr dismiss` to clear)",
        "LEVEL UP!".yellow().bold(),
        level_up.old_level,
        level_up.new_level
    );
}

pub fn display_history(history: &[TaskHistoryEntry], stats: &[DailyStats], days: usize, tz: &Tz) {
    let mut dates: Vec<NaiveDate> = history
        .iter()
        .map(|e| e.date)
        .chain(stats.iter().map(|s| s.date))
        .collect();
    dates.sort_unstable();
    dates.dedup();
    let recent: Vec<NaiveDate> = dates.into_iter().rev().take(days).collect();

    if recent.is_empty() {
        println!("No history yet.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Done", "Net XP", "Quests"]);

    for date in recent {
        let day_stats = stats.iter().find(|s| s.date == date);
        let titles: Vec<String> = history
            .iter()
            .find(|e| e.date == date)
            .map(|e| {
                e.tasks
                    .iter()
                    .map(|t| format!("{} ({})", t.title, local_time(t.completed_at, tz)))
                    .collect()
            })
            .unwrap_or_default();

        let xp = day_stats.map_or(0, |s| s.xp_gained);
        let xp_cell = match xp {
            x if x < 0 => Cell::new(x).fg(Color::Red),
            x if x > 0 => Cell::new(format!("+{}", x)).fg(Color::Green),
            x => Cell::new(x),
        };

        table.add_row(vec![
            Cell::new(date),
            Cell::new(day_stats.map_or(0, |s| s.tasks_completed)),
            xp_cell,
            Cell::new(titles.join("\n")),
        ]);
    }

    println!("{table}");
}

fn local_time(at: DateTime<Utc>, tz: &Tz) -> String {
    at.with_timezone(tz).format("%H:%M").to_string()
}

pub fn display_types<'a>(labels: impl Iterator<Item = &'a str>) {
    let labels: Vec<&str> = labels.collect();
    if labels.is_empty() {
        println!("No quest types yet.");
        return;
    }
    for label in labels {
        println!("  {}", label);
    }
}
