//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use filehub_entity::FileAction;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// One file action as a table row.
#[derive(Debug, Serialize, Tabled)]
pub struct ActionRow {
    /// Time
    pub time: String,
    /// Action type
    pub action: String,
    /// Lifetime ID
    pub lifetime: String,
    /// Origin path
    pub from: String,
    /// Destination path
    pub to: String,
    /// Size
    pub size: i64,
    /// Event ID
    pub event: String,
}

impl From<&FileAction> for ActionRow {
    fn from(a: &FileAction) -> Self {
        Self {
            time: a.timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            action: a.action_type.to_string(),
            lifetime: a.lifetime_id.to_string(),
            from: a.origin_path.as_ref().map(ToString::to_string).unwrap_or_default(),
            to: a
                .destination_path
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            size: a.size,
            event: a.event_id.to_string(),
        }
    }
}

/// Print file actions in the selected format
pub fn print_actions(actions: &[FileAction], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let rows: Vec<ActionRow> = actions.iter().map(ActionRow::from).collect();
            print_list(&rows, format);
        }
        OutputFormat::Json => print_item(&actions, format),
    }
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                let table = Table::new(items).to_string();
                println!("{}", table);
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
            println!("{}", json);
        }
    }
}

/// Print a single item in the selected format
pub fn print_item<T: Serialize + std::fmt::Debug>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            println!("{:#?}", item);
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(item).unwrap_or_else(|_| "{}".to_string());
            println!("{}", json);
        }
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {}", msg);
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{}:", key), value);
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {}", msg);
}
