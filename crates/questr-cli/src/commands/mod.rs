pub mod add;
pub mod copy;
pub mod delete;
pub mod r#do;
pub mod edit;
pub mod hide;
pub mod history;
pub mod list;
pub mod reset;
pub mod status;
pub mod sync;
pub mod types;
pub mod undo;
