//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of a run,
//! including statistics per category and the emails it stored.

use crate::output::{OutputResult, RunSummary};
use crate::storage::RunStats;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Maximum number of email rows listed in a summary
const MAX_LISTED_EMAILS: usize = 200;

/// Generates a markdown summary of a run
///
/// # Arguments
///
/// * `summary` - The run summary data
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str("# Sumi-Sieve Run Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", summary.run.id));
    md.push_str(&format!("- **Started**: {}\n", summary.run.started_at));
    if let Some(finished) = &summary.run.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished));
    }
    md.push_str(&format!("- **Status**: {}\n", summary.run.state));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.run.config_hash));

    if let Some(overall) = &summary.overall {
        md.push_str("## Overall Statistics\n\n");
        md.push_str(&format!("- **URLs Processed**: {}\n", overall.total_urls));
        md.push_str(&format!(
            "- **Successful Extractions**: {}\n",
            overall.successful_extractions
        ));
        md.push_str(&format!(
            "- **Emails Found**: {}\n",
            overall.total_emails_found
        ));
        md.push_str(&format!(
            "- **Success Rate**: {:.2}%\n",
            overall.success_rate()
        ));
        md.push_str(&format!(
            "- **Duration**: {:.1} seconds ({:.2} minutes)\n",
            overall.duration_seconds,
            overall.duration_seconds / 60.0
        ));
    }
    md.push_str(&format!(
        "- **Emails in Database**: {}\n\n",
        summary.total_emails_stored
    ));

    if !summary.categories.is_empty() {
        md.push_str("## Categories\n\n");
        md.push_str("| Category | URLs | Successful | Emails | Success Rate |\n");
        md.push_str("|----------|------|------------|--------|--------------|\n");
        for stats in &summary.categories {
            md.push_str(&category_row(stats));
        }
        md.push('\n');
    }

    if !summary.emails.is_empty() {
        md.push_str("## Emails Stored\n\n");
        md.push_str("| Email | Company | Category | Source |\n");
        md.push_str("|-------|---------|----------|--------|\n");
        for record in summary.emails.iter().take(MAX_LISTED_EMAILS) {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                table_cell(&record.email),
                table_cell(record.company_name.as_deref().unwrap_or("-")),
                table_cell(record.category.as_deref().unwrap_or("-")),
                table_cell(&record.source_url)
            ));
        }
        if summary.emails.len() > MAX_LISTED_EMAILS {
            md.push_str(&format!(
                "\n... and {} more\n",
                summary.emails.len() - MAX_LISTED_EMAILS
            ));
        }
        md.push('\n');
    }

    md
}

fn category_row(stats: &RunStats) -> String {
    format!(
        "| {} | {} | {} | {} | {:.1}% |\n",
        table_cell(&stats.category),
        stats.total_urls,
        stats.successful_extractions,
        stats.total_emails_found,
        stats.success_rate()
    )
}

/// Escapes text for a table cell; `|` would end the cell and a newline the row
fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}
