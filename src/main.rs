// Entry point and high-level CLI flow.
//
// - Option [1] loads the complaint file (or reloads it if it changed) and
//   geocodes its locations, printing diagnostics.
// - Option [2] sets the viewer filters.
// - Option [3] prints the dashboard and writes the JSON/CSV summaries.
// - Option [4] exports the filtered records as CSV.
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use land_dispute_report::filter::{options_for, ALL_ENTITIES, ALL_HANDLERS, ALL_STATUSES};
use land_dispute_report::geocode::Progress;
use land_dispute_report::output;
use land_dispute_report::reports::{
    assess, generate_category_distribution, generate_map_points, generate_status_breakdown,
    generate_top_entities,
};
use land_dispute_report::types::{Field, KpiRow, Record};
use land_dispute_report::util::{format_int, format_number, parse_date_safe};
use land_dispute_report::{Filters, LocationResolver, ReportConfig, Session};

#[derive(Parser, Debug)]
#[command(name = "land_dispute_report", about = "Land-dispute complaint dashboard")]
struct Cli {
    /// Complaint records exported from the spreadsheet as CSV.
    #[arg(long, env = "REPORT_DATA", default_value = "data_tanah.csv")]
    data: PathBuf,

    /// Optional TOML config.
    #[arg(long, env = "REPORT_CONFIG", default_value = "dashboard.toml")]
    config: PathBuf,

    /// Skip geocoding; every location gets the fallback coordinate.
    #[arg(long)]
    offline: bool,

    /// Reference date for overdue detection (defaults to today).
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Directory for exported files.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    #[arg(short, long)]
    verbose: bool,
}

/// One trimmed line from `reader`, or `None` once input is closed or unreadable.
fn read_input<R: BufRead>(reader: &mut R) -> Option<String> {
    let mut buf = String::new();
    match reader.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Read a single line of input after printing `label`.
fn prompt(label: &str) -> Option<String> {
    print!("{}", label);
    let _ = io::stdout().flush();
    read_input(&mut io::stdin().lock())
}

fn read_choice() -> Option<String> {
    prompt("Enter choice: ")
}

/// Ask whether to go back to the menu after generating the dashboard.
/// Closed input answers N.
fn prompt_back_to_menu() -> bool {
    loop {
        let Some(answer) = prompt("Back to Menu (Y/N): ") else {
            println!();
            return false;
        };
        match answer.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} locations")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Handle option [1]: load the file, or reload it if it changed on disk.
fn handle_load(cli: &Cli, config: &ReportConfig, session: &mut Option<Session>) {
    let pb = progress_bar();
    let on_progress = |p: Progress| {
        pb.set_length(p.total as u64);
        pb.set_position(p.done as u64);
    };

    if let Some(s) = session.as_mut() {
        match s.refresh(on_progress) {
            Ok(true) => println!("File changed on disk; reloaded."),
            Ok(false) => println!("File unchanged; using the loaded data."),
            Err(e) => {
                pb.finish_and_clear();
                eprintln!("Failed to reload file: {}\n", e);
                *session = None;
                return;
            }
        }
    } else {
        let resolver = LocationResolver::from_config(&config.geocoder, cli.offline);
        match Session::open(cli.data.clone(), config.clone(), resolver, on_progress) {
            Ok(s) => *session = Some(s),
            Err(e) => {
                pb.finish_and_clear();
                eprintln!("Failed to load file: {}\n", e);
                return;
            }
        }
    }
    pb.finish_and_clear();

    let Some(s) = session.as_ref() else {
        return;
    };
    let report = &s.dataset().report;
    println!(
        "Processing dataset... ({} rows read, {} records loaded)",
        format_int(report.total_rows),
        format_int(report.loaded_rows)
    );
    if report.parse_errors > 0 {
        println!(
            "Note: {} rows skipped due to parse errors.",
            format_int(report.parse_errors)
        );
    }
    if report.unparsed_dates > 0 {
        println!(
            "Note: {} report dates could not be parsed.",
            format_int(report.unparsed_dates)
        );
    }
    for field in s.schema().missing() {
        println!(
            "Warning: column '{}' not found; dependent features disabled.",
            field.label()
        );
    }
    let locations = s.locations();
    if !locations.is_empty() {
        println!(
            "Info: {} locations resolved ({} using the fallback coordinate).",
            format_int(locations.len()),
            format_int(locations.fallback_count())
        );
    }
    println!();
}

/// Print numbered options and return the chosen one; blank keeps "all".
fn pick_one(title: &str, all: &str, options: &[String]) -> Option<String> {
    println!("{}:", title);
    println!("  [0] {}", all);
    for (i, o) in options.iter().enumerate() {
        println!("  [{}] {}", i + 1, o);
    }
    let input = prompt("Select (blank = all): ").unwrap_or_default();
    match input.parse::<usize>() {
        Ok(n) if n >= 1 && n <= options.len() => Some(options[n - 1].clone()),
        _ => None,
    }
}

fn pick_many(title: &str, all: &str, options: &[String]) -> Vec<String> {
    println!("{}:", title);
    println!("  [0] {}", all);
    for (i, o) in options.iter().enumerate() {
        println!("  [{}] {}", i + 1, o);
    }
    let input = prompt("Select, comma-separated (blank = all): ").unwrap_or_default();
    input
        .split(',')
        .filter_map(|p| p.trim().parse::<usize>().ok())
        .filter(|n| *n >= 1 && *n <= options.len())
        .map(|n| options[n - 1].clone())
        .collect()
}

fn prompt_date(label: &str) -> Option<NaiveDate> {
    loop {
        let input = prompt(label)?;
        if input.is_empty() {
            return None;
        }
        match parse_date_safe(Some(&input)) {
            Some(d) => return Some(d),
            None => println!("Invalid date. Use YYYY-MM-DD or DD/MM/YYYY."),
        }
    }
}

/// Handle option [2]: choose filters. Filters on missing columns are skipped.
fn handle_filters(session: &mut Session) {
    let schema = session.schema().clone();
    let records = session.records();
    let mut filters = Filters::default();

    if schema.has_entity() {
        if let Some(e) = pick_one(
            "Reported institution",
            ALL_ENTITIES,
            &options_for(records, Field::Entity),
        ) {
            filters = filters.with_entity(e);
        }
    } else {
        println!("Column 'Terlapor' not found; institution filter disabled.");
    }

    if schema.has_status() {
        let picked = pick_many("Status", ALL_STATUSES, &options_for(records, Field::Status));
        filters = filters.with_statuses(picked);
    } else {
        println!("Column 'Status' not found; status filter disabled.");
    }

    if schema.has(Field::Handler) {
        if let Some(h) = pick_one("Handler", ALL_HANDLERS, &options_for(records, Field::Handler)) {
            filters = filters.with_handler(h);
        }
    }

    if schema.has_dates() {
        let from = prompt_date("Report date from (blank = no limit): ");
        let to = prompt_date("Report date to (blank = no limit): ");
        filters = filters.with_date_range(from, to);
    }

    filters = filters.with_search(prompt("Search text (blank = none): ").unwrap_or_default());

    session.set_filters(filters);
    println!(
        "Filters applied: {} of {} records match.\n",
        format_int(session.view().len()),
        format_int(session.records().len())
    );
}

fn write_or_warn(result: Result<(), land_dispute_report::ExportError>, path: &Path) {
    if let Err(e) = result {
        eprintln!("Write error ({}): {}", path.display(), e);
    }
}

/// Handle option [3]: print the dashboard and write the summaries.
fn handle_dashboard(session: &Session, today: NaiveDate, out_dir: &Path) {
    let view: Vec<&Record> = session.view();
    if view.is_empty() {
        println!("No data matches the applied filters.\n");
        return;
    }
    let schema = session.schema();
    let rules = session.rules();
    let top_n = session.config().export.top_n;
    let summary = session.summary(today);
    let m = &summary.metrics;

    println!("Land-Dispute Complaint Dashboard (as of {})", today);
    if session.filters().is_empty() {
        println!("(All records)\n");
    } else {
        println!(
            "(Filtered: {} of {} records)\n",
            format_int(view.len()),
            format_int(session.records().len())
        );
    }
    let unavailable = || "unavailable".to_string();
    let kpis = vec![
        KpiRow {
            metric: "Total reports".to_string(),
            value: format!("{} cases", format_int(m.total)),
        },
        KpiRow {
            metric: "Closed".to_string(),
            value: if schema.has_status() {
                format!("{} ({}%)", format_int(m.closed), format_number(m.completion_rate, 1))
            } else {
                unavailable()
            },
        },
        KpiRow {
            metric: "In process".to_string(),
            value: format_int(m.open),
        },
        KpiRow {
            metric: "Distinct maladministration categories".to_string(),
            value: if schema.has_category() {
                format_int(m.distinct_categories)
            } else {
                unavailable()
            },
        },
        KpiRow {
            metric: format!("Overdue (> {} days)", rules.overdue_threshold_days()),
            value: if schema.has_status() && schema.has_dates() {
                format_int(m.overdue)
            } else {
                unavailable()
            },
        },
        KpiRow {
            metric: "Most reported".to_string(),
            value: m.top_reported_entity.clone(),
        },
        KpiRow {
            metric: "Assessment".to_string(),
            value: assess(m.completion_rate).label().to_string(),
        },
    ];
    output::preview_table_rows(&kpis, kpis.len());
    println!("{}\n", summary.narrative);

    if schema.has_entity() {
        let top = generate_top_entities(&view, top_n);
        output::preview_table(
            "Top Reported Institutions",
            Some(&format!("Top {} by number of reports", top_n)),
            &top,
            top_n,
        );
        let path = out_dir.join("report_top_entities.csv");
        write_or_warn(output::write_csv(&path, &top), &path);
    } else {
        output::print_unavailable("Top Reported Institutions", "Terlapor");
    }

    if schema.has_category() {
        let dist = generate_category_distribution(&view);
        output::preview_table("Maladministration Categories", None, &dist, dist.len());
    } else {
        output::print_unavailable("Maladministration Categories", "Maladministrasi");
    }

    if schema.has_dates() {
        output::preview_table("Monthly Trend", None, &m.trend, m.trend.len());
        let path = out_dir.join("report_monthly_trend.csv");
        write_or_warn(output::write_csv(&path, &m.trend), &path);
    } else {
        output::print_unavailable("Monthly Trend", "Tanggal");
    }

    if schema.has_status() {
        let statuses = generate_status_breakdown(&view, rules);
        output::preview_table("Status Breakdown", None, &statuses, statuses.len());
    }

    if schema.has_location() {
        let points = generate_map_points(&view, session.locations(), rules);
        output::preview_table("Case Map", Some("Top locations"), &points, 10);
        let path = out_dir.join("map_points.json");
        write_or_warn(output::write_json(&path, &points), &path);
    } else {
        output::print_unavailable("Case Map", "Lokasi");
    }

    println!("### Report Details (filtered)\n");
    output::preview_records(schema, &view, 5);

    let path = out_dir.join("summary.json");
    write_or_warn(output::write_json(&path, &summary), &path);
    println!("(Summary written to {})\n", path.display());
}

/// Handle option [4]: export the filtered records.
fn handle_export(session: &Session, out_dir: &Path) {
    let path = out_dir.join(&session.config().export.file_name);
    match session.export_view(&path) {
        Ok(n) => println!("Exported {} records to {}\n", format_int(n), path.display()),
        Err(e) => eprintln!("Export failed: {}\n", e),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "land_dispute_report=info"
    } else {
        "land_dispute_report=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = ReportConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    let today = cli
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;

    let mut session: Option<Session> = None;
    loop {
        println!("Land-Dispute Complaint Report");
        println!("[1] Load the file");
        println!("[2] Set filters");
        println!("[3] Generate dashboard");
        println!("[4] Export filtered CSV");
        println!("[5] Exit\n");
        let Some(choice) = read_choice() else {
            println!("\nExiting the program.");
            break;
        };
        if choice == "1" {
            handle_load(&cli, &config, &mut session);
            continue;
        }
        if choice == "5" {
            println!("Exiting the program.");
            break;
        }
        if !matches!(choice.as_str(), "2" | "3" | "4") {
            println!("Invalid choice. Please enter 1 to 5.\n");
            continue;
        }
        let Some(s) = session.as_mut() else {
            println!("Error: No data loaded. Please load the file first (option 1).\n");
            continue;
        };
        match choice.as_str() {
            "2" => handle_filters(s),
            "3" => {
                println!();
                handle_dashboard(s, today, &cli.out_dir);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => handle_export(s, &cli.out_dir),
        }
    }
    Ok(())
}
