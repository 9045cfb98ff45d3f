use anyhow::Result;
use owo_colors::OwoColorize;
use questr_core::engine::{QuestEngine, SyncReport};
use questr_core::storage::KeyValueStore;

pub async fn sync<S: KeyValueStore>(engine: &QuestEngine<S>) -> Result<()> {
    let report = engine.sync().await;
    print_report(&report, true);
    Ok(())
}

/// Prints what a sync changed. With `verbose` an empty report says so.
pub fn print_report(report: &SyncReport, verbose: bool) {
    let mut printed = false;

    if let Some(update) = &report.streak {
        printed = true;
        if update.streak_days > update.previous_streak {
            println!("{} Streak: {} day(s)", "🔥".yellow(), update.streak_days);
        } else if update.previous_streak > 0 {
            println!(
                "{} Streak of {} day(s) lost, starting over",
                "!".red().bold(),
                update.previous_streak
            );
        }
        for milestone in &update.milestones {
            println!(
                "{} Milestone reached: {} ({} days, +{} XP)",
                "★".yellow().bold(),
                milestone.name,
                milestone.days,
                milestone.xp_reward
            );
        }
    }

    for failure in &report.failures {
        printed = true;
        println!(
            "{} Missed '{}' yesterday: {}",
            "✗".red(),
            failure.title,
            format!("-{} XP", failure.penalty()).red().bold()
        );
    }

    if !report.generated.is_empty() {
        printed = true;
        println!("{} {} recurring quest(s) for today:", "↻".cyan(), report.generated.len());
        for task in &report.generated {
            println!("  - {}", task.title);
        }
    }

    if verbose && !printed {
        println!("Everything is up to date.");
    }
}
