//! dash-runner: headless runner for the lending dashboard.
//!
//! Usage:
//!   dash-runner --data-dir ./data --period qtd --product business_loan
//!   dash-runner --data-dir ./data --json
//!   dash-runner --data-dir ./data --ipc-mode

use anyhow::Result;
use chrono::NaiveDate;
use lendlens_core::{
    config::DashConfig,
    engine::{DashEngine, DashboardView},
    filter::{RowFilter, TimePeriod},
    loader::{load_bundle, LoadOptions},
    view_state::{ViewCommand, ViewState},
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetView,
    Apply { command: ViewCommand },
    /// Re-read the snapshot files from the data directory.
    Reload,
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let data_dir = parse_str(&args, "--data-dir").unwrap_or("./data");
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let json = args.iter().any(|a| a == "--json");
    let options = LoadOptions {
        strict: args.iter().any(|a| a == "--strict"),
    };

    let period = match parse_str(&args, "--period") {
        Some(p) => TimePeriod::parse(p)
            .ok_or_else(|| anyhow::anyhow!("Unknown period '{p}' (mtd, last_7_days, qtd, ytd)"))?,
        None => TimePeriod::Mtd,
    };

    let mut config = DashConfig::load(data_dir)?;
    if let Some(raw) = parse_str(&args, "--as-of") {
        let as_of = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("Invalid --as-of '{raw}': {e}"))?;
        config.pacing.as_of = Some(as_of);
    }

    let state = ViewState {
        filter: RowFilter {
            product_type: parse_str(&args, "--product").map(str::to_string),
            flow:         parse_str(&args, "--flow").map(str::to_string),
            lender:       parse_str(&args, "--lender").map(str::to_string),
        },
        period,
        ..ViewState::default()
    };

    if !ipc_mode && !json {
        println!("Lending dashboard: dash-runner");
        println!("  data_dir:  {data_dir}");
        println!("  selection: {}", state.filter_key().label());
        println!();
    }

    let bundle = load_bundle(data_dir, options)?;
    let mut engine = DashEngine::new(config, bundle);

    if ipc_mode {
        run_ipc_loop(&mut engine, state, data_dir, options)?;
    } else {
        let view = engine.view(&state);
        if json {
            println!("{}", serde_json::to_string_pretty(&view)?);
        } else {
            print_summary(&view);
        }
    }

    Ok(())
}

fn run_ipc_loop(
    engine: &mut DashEngine,
    mut state: ViewState,
    data_dir: &str,
    options: LoadOptions,
) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                write_error(&mut stdout, &e.to_string())?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetView => {}
            IpcCommand::Apply { command } => {
                log::debug!("ipc: apply {command:?}");
                state = state.apply(&command);
            }
            IpcCommand::Reload => match load_bundle(data_dir, options) {
                Ok(bundle) => {
                    engine.replace_bundle(bundle);
                }
                Err(e) => {
                    log::warn!("ipc: reload failed: {e}");
                    write_error(&mut stdout, &e.to_string())?;
                    continue;
                }
            },
        }

        let view = engine.view(&state);
        writeln!(stdout, "{}", serde_json::to_string(&view)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn write_error(stdout: &mut io::Stdout, message: &str) -> Result<()> {
    let err_json = serde_json::json!({ "error": message });
    writeln!(stdout, "{err_json}")?;
    stdout.flush()?;
    Ok(())
}

fn print_summary(view: &DashboardView) {
    let m = &view.metrics;
    let t = &m.totals;

    println!("=== PORTFOLIO ({}) ===", m.period.as_str());
    println!("  lenders:        {}", t.lender_count);
    println!("  disbursed:      {} ({:.2} Cr)", t.disbursed, t.amount_cr);
    println!("  lmtd disbursed: {} ({:.2} Cr)", t.lmtd_disbursed, t.lmtd_amount_cr);
    println!("  growth:         {:+.1}%", t.growth_pct);
    println!("  conversion:     {:.1}%", t.conv_pct);

    println!();
    println!("=== CONCENTRATION ===");
    println!("  hhi:            {:.0} ({})", m.concentration.hhi, m.concentration.level.label());
    println!("  top-3 share:    {:.1}%", m.concentration.top3_share);
    println!(
        "  growing:        {} / declining: {}",
        m.concentration.growing_count, m.concentration.declining_count
    );

    println!();
    println!("=== AOP PACING ===");
    let p = &m.pacing;
    println!(
        "  day {} of {} | projected {:.2} Cr of {:.2} Cr | {:.0}% {:?}",
        p.calendar.days_elapsed,
        p.calendar.days_in_month,
        p.projected_cr,
        p.monthly_target_cr,
        p.pacing_pct,
        p.status
    );

    println!();
    println!("=== LENDERS ===");
    for a in &view.lender_table {
        println!(
            "  {:<14} {:>6} | {:>7.2} Cr | {:>5.1}% share | {:+6.1}% | conv {:>5.1}%",
            a.lender, a.disbursed, a.amount_cr, a.share_pct, a.growth_pct, a.conv_pct
        );
    }

    println!();
    println!("=== INSIGHTS ===");
    if view.visible_insights.is_empty() {
        println!("  (none)");
    }
    for i in &view.visible_insights {
        println!("  [{:?}] {:?} {}", i.effective_bucket(), i.severity, i.title);
    }

    println!();
    println!("=== FUNNEL ===");
    for s in &m.funnel {
        let conv = s
            .mtd_conv_pct
            .map(|c| format!("{c:.1}%"))
            .unwrap_or_else(|| "-".to_string());
        let hero = s
            .hero
            .as_ref()
            .map(|h| format!(" | hero {} {:.1}%", h.lender, h.conv_pct))
            .unwrap_or_default();
        println!(
            "  {:>2} {:<24} {:>7} | conv {:>6} | {:?}{hero}",
            s.major_index, s.stage_name, s.mtd_leads, conv, s.source
        );
    }
}

fn parse_str<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
