use cascade_core::{CallGraphEvidence, CrimeReport};
use colored::Colorize;
use comfy_table::Table;

use crate::report::RunReport;

/// One summary row per crime, coloring crime/confidence/weight the way
/// a terminal report would: crime name in green, confidence in yellow,
/// weight in red.
pub fn render_summary_table(report: &RunReport) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Crime", "Confidence", "Score", "Weight"]);
    for crime in &report.crimes {
        table.add_row(vec![
            crime.crime.green().to_string(),
            crime.confidence.yellow().to_string(),
            format!("{:.2}", crime.score),
            crime.weight.to_string().red().to_string(),
        ]);
    }
    table.to_string()
}

/// Full walkthrough of every stage a crime cleared, in order, with the
/// evidence gathered at each one.
pub fn render_detail_report(crime: &CrimeReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("\nConfidence: {}\n\n", crime.confidence));

    if !crime.permissions.is_empty() || crime_passed_stage(crime, 0) {
        out.push_str(&format!("{}\n", "1. Permission Request".green().bold()));
        for permission in &crime.permissions {
            out.push_str(&format!("\t\t {permission}\n"));
        }
    }
    if crime_passed_stage(crime, 1) {
        out.push_str(&format!("{}\n", "2. Native API Usage".green().bold()));
        for api in &crime.native_api {
            out.push_str(&format!("\t\t ({}, {})\n", api.class, api.method));
        }
    }
    if crime_passed_stage(crime, 2) {
        out.push_str(&format!("{}\n", "3. Native API Combination".green().bold()));
        for api in &crime.combination {
            out.push_str(&format!("\t\t ({}, {})\n", api.class, api.method));
        }
    }
    if crime_passed_stage(crime, 3) {
        out.push_str(&format!("{}\n", "4. Native API Sequence".green().bold()));
        out.push_str("\t\t Sequence shows up in:\n");
        for method in &crime.sequence {
            out.push_str(&format!("\t\t {}->{}\n", method.class, method.method));
        }
    }
    if crime_passed_stage(crime, 4) {
        out.push_str(&format!(
            "{}\n",
            "5. Native API Uses Same Parameter".green().bold()
        ));
        for method in &crime.register {
            out.push_str(&format!("\t\t {}->{}\n", method.class, method.method));
        }
    }

    out
}

/// Derives whether `stage` (0-indexed) was cleared from the confidence
/// percentage, since the cascade invariant guarantees stage `k` implies
/// every stage `j < k`.
fn crime_passed_stage(crime: &CrimeReport, stage: u8) -> bool {
    let n_passed = crime
        .confidence
        .trim_end_matches('%')
        .parse::<u8>()
        .unwrap_or(0)
        / 20;
    stage < n_passed
}

/// Tabulates every parent method found to route a shared value into two
/// colluding APIs, one row per confirmed stage-5 match.
pub fn render_parent_function_table(evidence: &[CallGraphEvidence]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Crime", "Parent Method", "First Call", "Second Call"]);
    for item in evidence {
        table.add_row(vec![
            item.crime.clone(),
            item.parent.full_name(),
            item.first_call.full_name(),
            item.second_call.full_name(),
        ]);
    }
    table.to_string()
}
