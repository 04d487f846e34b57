//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use karpx_lib::{StatusBadge, SupportLevel};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print rows as a rounded table
pub fn print_table<T: Tabled>(rows: Vec<T>) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a `label: value` line aligned with its siblings
pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<20} {}", format!("{label}:").dimmed(), value);
}

/// Format MiB as a human-readable string
pub fn format_mib(mib: u64) -> String {
    if mib >= 1024 {
        format!("{:.1}Gi", mib as f64 / 1024.0)
    } else {
        format!("{}Mi", mib)
    }
}

/// Format millicores as a human-readable string
pub fn format_cpu(millicores: u64) -> String {
    if millicores >= 1000 {
        format!("{:.1}", millicores as f64 / 1000.0)
    } else {
        format!("{}m", millicores)
    }
}

/// Placeholder for absent values in tables
pub fn or_dash(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "-".to_string(),
    }
}

/// Color a status badge. Errors get their own color, distinct from incompatibility.
pub fn color_badge(badge: StatusBadge, latest: Option<&str>) -> String {
    match badge {
        StatusBadge::Error => "✗ error".red().bold().to_string(),
        StatusBadge::NotInstalled => "○ not installed".dimmed().to_string(),
        StatusBadge::Incompatible => "▲ incompatible".magenta().bold().to_string(),
        StatusBadge::UpgradeAvailable => match latest {
            Some(version) => format!("↑ upgrade to {version}").yellow().to_string(),
            None => "↑ upgrade available".yellow().to_string(),
        },
        StatusBadge::Installed => "✓ up to date".green().to_string(),
        StatusBadge::Unchecked => "● installed".blue().to_string(),
    }
}

/// Color a provider support level
pub fn color_support(level: SupportLevel) -> String {
    let text = level.to_string();
    match level {
        SupportLevel::Full => text.green().to_string(),
        SupportLevel::Preview => text.yellow().to_string(),
        SupportLevel::Experimental => text.magenta().to_string(),
        SupportLevel::Unsupported => text.red().to_string(),
    }
}

/// Color a compatibility verdict
pub fn color_verdict(compatible: bool) -> String {
    if compatible {
        "compatible".green().bold().to_string()
    } else {
        "not compatible".red().bold().to_string()
    }
}
