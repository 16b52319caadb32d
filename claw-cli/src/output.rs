//! Output Formatting

use serde::Serialize;

use crate::commands::OutputFormat;
use crate::handler::{ConfigSummary, HashReport};

fn print_json<T: Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error formatting JSON: {}", e),
    }
}

pub fn print_row(label: &str, value: &str) {
    println!("  {:<22} {}", label, value);
}

pub fn print_hash(report: &HashReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Plain => {
            println!("{}", report.hash);
            if let Some(epoch_id) = report.epoch_id {
                print_row("epoch:", &epoch_id.to_string());
            }
            if let Some(count) = report.claim_count {
                print_row("claims:", &count.to_string());
            }
            if let Some(allowlist) = report.route_allowlist_hash {
                print_row("route allowlist hash:", &allowlist.to_string());
            }
        }
    }
}

pub fn print_config(summary: &ConfigSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Plain => {
            println!("Relayer configuration OK");
            println!("========================");
            print_row("Chain id:", &summary.chain_id.to_string());
            print_row("Claim book:", &summary.claim_book_address);
            print_row("Intent book:", &summary.intent_book_address);
            print_row(
                "Validators:",
                &format!("{} (total weight {})", summary.validator_count, summary.total_weight),
            );
            print_row(
                "Thresholds:",
                &format!("claim {}, intent {}", summary.claim_threshold, summary.intent_threshold),
            );
            if !summary.overridden_funds.is_empty() {
                print_row("Fund overrides:", &summary.overridden_funds.join(", "));
            }
            let allowlist = if summary.allowlist_size == 0 {
                "weight snapshot".to_string()
            } else {
                summary.allowlist_size.to_string()
            };
            print_row("Allowlist:", &allowlist);
            print_row("Max attempts:", &summary.execution_max_attempts.to_string());
            let tick = if summary.execution_tick_secs == 0 {
                "off".to_string()
            } else {
                format!("{}s", summary.execution_tick_secs)
            };
            print_row("Tick loop:", &tick);
            print_row("Cron endpoint:", if summary.cron_enabled { "on" } else { "off" });
        }
    }
}
