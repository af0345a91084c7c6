use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use cascade_config::{load_rules_dir, CascadeConfig};
use cascade_core::evaluate_rules;
use cascade_model::FixtureApkInfo;
use cascade_report::{render_detail_report, render_parent_function_table, render_summary_table, RunReport};

mod tracing_init;

#[derive(Parser)]
#[command(name = "cascade", about = "Static malicious-behavior detection over digested APK bundles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a digested application bundle against a rule set.
    Scan {
        /// Path to a cascade.toml config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the fixture path from the config.
        #[arg(long)]
        apk: Option<PathBuf>,
        /// Override the rules directory from the config.
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Emit the JSON report instead of the colorized text report.
        #[arg(long)]
        json: bool,
        /// Also render the table of parent methods confirmed to route a
        /// shared value into two colluding APIs.
        #[arg(long)]
        show_call_graph: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            config,
            apk,
            rules,
            json,
            show_call_graph,
        } => run_scan(config, apk, rules, json, show_call_graph),
    }
}

fn run_scan(
    config: Option<PathBuf>,
    apk: Option<PathBuf>,
    rules: Option<PathBuf>,
    json: bool,
    show_call_graph: bool,
) -> Result<()> {
    let mut cascade_config = match &config {
        Some(path) => CascadeConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CascadeConfig::default(),
    };
    if let Some(apk) = apk {
        cascade_config.apk_fixture = apk;
    }
    if let Some(rules) = rules {
        cascade_config.rules_dir = rules;
    }

    let base_dir = config
        .as_ref()
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let _guard = tracing_init::init_tracing(&cascade_config.logging, &base_dir)?;

    let apkinfo = FixtureApkInfo::from_file(&cascade_config.apk_fixture).with_context(|| {
        format!(
            "loading apk fixture {}",
            cascade_config.apk_fixture.display()
        )
    })?;
    let rule_set = load_rules_dir(&cascade_config.rules_dir).with_context(|| {
        format!(
            "loading rules from {}",
            cascade_config.rules_dir.display()
        )
    })?;

    tracing::info!(domain = "stage", rule_count = rule_set.len(), "evaluating rules");

    let analysis = evaluate_rules(&apkinfo, &rule_set);
    let report = RunReport::build(
        &apkinfo,
        analysis.score_sum,
        analysis.weight_sum,
        analysis.json_report.clone(),
    );

    if json {
        println!("{}", report.to_json_string_pretty()?);
    } else {
        println!("{}", render_summary_table(&report));
        for crime in &report.crimes {
            print!("{}", render_detail_report(crime));
        }
        println!("\nThreat level: {}", report.threat_level.to_string().bold());
    }

    if show_call_graph {
        println!(
            "\n{}",
            render_parent_function_table(&analysis.call_graph_analysis_list)
        );
    }

    Ok(())
}
