//! Markdown summary generation
//!
//! This module writes a human-readable markdown report of a finished run:
//! run metadata, page counts, link decisions and the per-depth breakdown.

use crate::output::summary::CrawlSummary;
use crate::output::traits::SinkResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary to `output_path`, replacing any existing file
pub fn generate_markdown_summary(summary: &CrawlSummary, output_path: &Path) -> SinkResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl summary as markdown
pub fn format_markdown_summary(summary: &CrawlSummary) -> String {
    let mut md = String::new();

    md.push_str("# Meta-Trawl Crawl Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", summary.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", summary.finished_at.to_rfc3339()));
    let duration = summary.duration().num_seconds().max(0);
    md.push_str(&format!(
        "- **Duration**: {} seconds ({:.2} minutes)\n",
        duration,
        duration as f64 / 60.0
    ));
    md.push_str(&format!("- **Status**: {}\n", summary.status));
    if let Some(reason) = &summary.abort_reason {
        md.push_str(&format!("- **Abort Reason**: {}\n", reason));
    }
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    // Page outcomes
    md.push_str("## Pages\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Visited | {} |\n", summary.visited));
    md.push_str(&format!("| Succeeded | {} |\n", summary.succeeded));
    md.push_str(&format!("| Fetch Errors | {} |\n", summary.fetch_failures));
    md.push_str(&format!("| Parse Errors | {} |\n\n", summary.parse_failures));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        summary.success_rate()
    ));

    // Link decisions
    md.push_str("## Links\n\n");
    md.push_str("| Decision | Count |\n");
    md.push_str("|----------|-------|\n");
    md.push_str(&format!("| Already Scheduled | {} |\n", summary.duplicates));
    md.push_str(&format!("| Beyond Depth Limit | {} |\n", summary.depth_rejected));
    md.push_str(&format!("| Skipped At Stop | {} |\n\n", summary.skipped));

    if !summary.depth_breakdown.is_empty() {
        md.push_str("## Depth Breakdown\n\n");
        md.push_str("| Depth | Pages |\n");
        md.push_str("|-------|-------|\n");

        for (depth, count) in &summary.depth_breakdown {
            md.push_str(&format!("| {} | {} |\n", depth, count));
        }
        md.push('\n');
    }

    if summary.sink_failures > 0 || summary.worker_restarts > 0 {
        md.push_str("## Faults\n\n");
        md.push_str(&format!(
            "- **Records Dropped By Sink**: {}\n",
            summary.sink_failures
        ));
        md.push_str(&format!(
            "- **Worker Restarts**: {}\n\n",
            summary.worker_restarts
        ));
    }

    md
}
