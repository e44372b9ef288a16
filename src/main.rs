use clap::Parser;
use panel_optimizer::render;
use panel_optimizer::solver::{Solver, SolverConfig};
use panel_optimizer::types::{Part, SheetSpec};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "panel_optimizer",
    about = "2D cutting-stock optimizer for panel saws"
)]
struct Cli {
    /// Stock sheet dimensions (WxH, e.g. 1210x2420)
    #[arg(long)]
    stock: String,

    /// Panels as WxH:qty; append ! to the size to lock grain direction
    /// (e.g. 400x400:8 600x600!:10)
    #[arg(long = "cuts", num_args = 1..)]
    cuts: Vec<String>,

    /// Blade kerf width in mm (default: 0)
    #[arg(long, default_value_t = 0)]
    kerf: u32,

    /// Disable rotation for all panels
    #[arg(long)]
    no_rotate: bool,

    /// Optimization time budget in milliseconds
    #[arg(long, default_value_t = 2000)]
    budget_ms: u64,

    /// Seed for reproducible runs (default: random)
    #[arg(long)]
    seed: Option<u64>,

    /// Show ASCII layout of each sheet
    #[arg(long)]
    layout: bool,

    /// Emit the full result as JSON
    #[arg(long)]
    json: bool,
}

fn parse_dimensions(s: &str) -> Result<(u32, u32), String> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 2 {
        return Err(format!("invalid dimensions '{}', expected WxH", s));
    }
    let width = parts[0]
        .parse::<u32>()
        .map_err(|_| format!("invalid width in '{}'", s))?;
    let height = parts[1]
        .parse::<u32>()
        .map_err(|_| format!("invalid height in '{}'", s))?;
    if width == 0 || height == 0 {
        return Err(format!("dimensions must be non-zero in '{}'", s));
    }
    Ok((width, height))
}

fn parse_cut(s: &str, index: usize, allow_rotate: bool) -> Result<Part, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err(format!("invalid cut '{}', expected WxH:qty", s));
    }
    let (size, grain_locked) = match parts[0].strip_suffix('!') {
        Some(stripped) => (stripped, true),
        None => (parts[0], false),
    };
    let (width, height) = parse_dimensions(size)?;
    let quantity = parts[1]
        .parse::<u32>()
        .map_err(|_| format!("invalid quantity in '{}'", s))?;
    if quantity == 0 {
        return Err(format!("quantity must be non-zero in '{}'", s));
    }
    Ok(Part {
        id: format!("cut{}", index + 1),
        width,
        height,
        quantity,
        rotation_allowed: allow_rotate && !grain_locked,
        gaddi_mark: false,
        laminate_code: None,
        nominal_width: None,
        nominal_height: None,
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    let (width, height) = parse_dimensions(&cli.stock).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    let sheet = SheetSpec {
        width,
        height,
        kerf: cli.kerf,
    };

    let parts: Vec<Part> = cli
        .cuts
        .iter()
        .enumerate()
        .map(|(i, c)| parse_cut(c, i, !cli.no_rotate))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });

    let solver = Solver::new(sheet, parts)
        .with_config(SolverConfig::default().with_time_budget_ms(cli.budget_ms));
    let result = match cli.seed {
        Some(seed) => solver.solve_seeded(seed),
        None => solver.solve(),
    };
    let result = result.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).expect("result serializes")
        );
        return;
    }

    for (i, sheet) in result.sheets.iter().enumerate() {
        println!("Sheet {}:", i + 1);
        for p in &sheet.placed_pieces {
            let rot = if p.rotated { " [rotated]" } else { "" };
            println!("  {}x{} @ ({}, {}){}", p.width, p.height, p.x, p.y, rot);
        }
        if cli.layout {
            print!("{}", render::render_sheet(sheet));
        }
        println!();
    }

    if !result.unplaced.is_empty() {
        println!("Unplaced:");
        for u in &result.unplaced {
            println!("  {} ({}x{}) - too large for stock", u.id, u.width, u.height);
        }
        println!();
    }

    println!(
        "Summary: {} sheet{} used, {:.1}% efficiency, {:.1}% waste ({})",
        result.totals.sheet_count,
        if result.totals.sheet_count == 1 { "" } else { "s" },
        result.totals.efficiency_percent,
        result.totals.waste_percent,
        result.strategy,
    );
}
