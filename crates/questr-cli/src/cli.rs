use chrono::Weekday;
use clap::{Parser, Subcommand, ValueEnum};
use questr_core::models::Difficulty;

/// Questr: a quest log that pays XP for getting things done
#[derive(Parser, Debug)]
#[command(name = "questr", author, version, about, long_about = None)]
pub struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add a new quest
    Add(AddCommand),
    /// List quests
    #[command(alias = "ls")]
    List(ListCommand),
    /// Show today's quests
    Today,
    /// Complete a quest
    Do(IdCommand),
    /// Undo a completion or a missed-quest penalty
    Undo(IdCommand),
    /// Delete a quest
    #[command(alias = "rm")]
    Delete(DeleteCommand),
    /// Edit a quest
    Edit(EditCommand),
    /// Duplicate a quest
    Copy(IdCommand),
    /// Hide a quest from the default list
    Hide(IdCommand),
    /// Show a hidden quest again
    Unhide(IdCommand),
    /// Show level, XP and streak
    Status,
    /// Manage quest types
    Types(TypesCommand),
    /// Apply day rollover, missed quests and today's recurring quests
    Sync,
    /// Show completions per day
    History(HistoryCommand),
    /// Dismiss the level-up notification
    Dismiss,
    /// Erase all data
    Reset(ResetCommand),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifficultyArg {
    Easy,
    Medium,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Medium => Difficulty::Medium,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

pub fn parse_weekday(input: &str) -> Result<Weekday, String> {
    input
        .trim()
        .parse::<Weekday>()
        .map_err(|_| format!("Invalid weekday: '{}'. Use mon, tue, wed, thu, fri, sat or sun", input))
}

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// The title of the quest
    pub title: String,
    /// The description of the quest
    #[clap(short, long)]
    pub description: Option<String>,
    /// How hard the quest is; sets its XP reward
    #[clap(short = 'x', long, value_enum, default_value = "easy")]
    pub difficulty: DifficultyArg,
    /// Quest type label, e.g. "fitness"
    #[clap(short = 't', long = "type")]
    pub quest_type: Option<String>,
    /// Repeat on these weekdays (mon,tue,...)
    #[clap(long, value_delimiter = ',', value_parser = parse_weekday, conflicts_with = "daily")]
    pub on: Vec<Weekday>,
    /// Repeat every day
    #[clap(long)]
    pub daily: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// Include hidden quests and recurring templates
    #[clap(short, long)]
    pub all: bool,
    /// Only quests of this type
    #[clap(short = 't', long = "type")]
    pub quest_type: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct IdCommand {
    /// The ID (or unique prefix) of the quest
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// The ID (or unique prefix) of the quest
    pub id: String,
    /// Skip confirmation
    #[clap(short, long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct EditCommand {
    /// The ID of the quest to edit
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, conflicts_with = "description")]
    pub description_clear: bool,

    #[arg(short = 'x', long, value_enum)]
    pub difficulty: Option<DifficultyArg>,

    #[arg(short = 't', long = "type")]
    pub quest_type: Option<String>,
    #[arg(long = "type-clear", conflicts_with = "quest_type")]
    pub quest_type_clear: bool,

    /// Make the quest recurring on these weekdays
    #[arg(long, value_delimiter = ',', value_parser = parse_weekday)]
    pub on: Option<Vec<Weekday>>,
    /// Turn a recurring quest into a one-off quest
    #[arg(long, conflicts_with = "on")]
    pub once: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct TypesCommand {
    #[command(subcommand)]
    pub action: TypesAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TypesAction {
    /// List known quest types
    List,
    /// Register a quest type
    Add { label: String },
}

#[derive(Parser, Debug, Clone)]
pub struct HistoryCommand {
    /// Number of most recent days to show
    #[clap(short, long, default_value_t = 7)]
    pub days: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct ResetCommand {
    /// Skip confirmation
    #[clap(short, long)]
    pub force: bool,
}
