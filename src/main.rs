use std::path::PathBuf;

use clap::Parser;
use opticut::extract::{extract_pieces, fallback_pieces};
use opticut::render;
use opticut::types::{PackingResult, PieceSpec, Rect, Report};
use opticut::{PackConfig, Result, Solver};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "opticut",
    about = "Pack rectangular pieces onto stock sheets with as little waste as possible"
)]
struct Cli {
    /// Stock sheet dimensions (WxH, default 6000x3210)
    #[arg(long)]
    sheet: Option<Rect>,

    /// Kerf kept clear after each piece (default 5)
    #[arg(long)]
    gap: Option<u32>,

    /// Free areas with a side shorter than this are dropped (default 100)
    #[arg(long)]
    min_free: Option<u32>,

    /// Disable piece rotation
    #[arg(long)]
    no_rotate: bool,

    /// JSON file with packing parameters; flags above override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pieces as WxH:qty (e.g. 950x735:4 800x600:6)
    #[arg(long, num_args = 1.., conflicts_with = "from_text")]
    pieces: Vec<String>,

    /// Text export of an order document to extract pieces from
    #[arg(long)]
    from_text: Option<PathBuf>,

    /// Show ASCII layout of each sheet
    #[arg(long)]
    layout: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Log packing progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let pieces = load_pieces(cli)?;
    let result = Solver::new(config, pieces).solve();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&Report::from(result))?);
    } else {
        print_report(&result, cli.layout);
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<PackConfig> {
    let mut config = match &cli.config {
        Some(path) => PackConfig::from_json_file(path)?,
        None => PackConfig::default(),
    };
    if let Some(sheet) = cli.sheet {
        config.sheet = sheet;
    }
    if let Some(gap) = cli.gap {
        config.gap = gap;
    }
    if let Some(min_free) = cli.min_free {
        config.min_free_size = min_free;
    }
    if cli.no_rotate {
        config.allow_rotate = false;
    }
    config.validate()?;
    Ok(config)
}

fn load_pieces(cli: &Cli) -> Result<Vec<PieceSpec>> {
    if let Some(path) = &cli.from_text {
        let text = std::fs::read_to_string(path)?;
        return Ok(extract_pieces(&text));
    }
    if cli.pieces.is_empty() {
        tracing::info!("no pieces given, using the sample piece list");
        return Ok(fallback_pieces());
    }
    cli.pieces
        .iter()
        .enumerate()
        .map(|(i, s)| PieceSpec::parse(i as u32 + 1, s))
        .collect()
}

fn print_report(result: &PackingResult, layout: bool) {
    for sheet in &result.sheets {
        println!("Sheet {} ({:.1}% used):", sheet.id, sheet.efficiency);
        for p in &sheet.placements {
            let rot = if p.rotated { " [rotated]" } else { "" };
            println!("  {} {} @ ({}, {}){}", p.unit_id, p.rect, p.x, p.y, rot);
        }
        if layout {
            print!("{}", render::render_sheet(sheet));
        }
        println!();
    }

    if !result.unplaceable.is_empty() {
        println!("Does not fit on a {} sheet:", result.stock);
        for unit in &result.unplaceable {
            println!("  {} {}", unit.unit_id, unit.rect);
        }
        println!();
    }

    let summary = result.summary();
    println!(
        "Summary: {} sheet{} used, {} piece{} placed, {:.1}% waste",
        summary.total_sheets,
        if summary.total_sheets == 1 { "" } else { "s" },
        summary.total_pieces,
        if summary.total_pieces == 1 { "" } else { "s" },
        result.total_waste_percent(),
    );
}
