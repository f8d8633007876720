use std::path::PathBuf;

use clap::Parser;
use log::info;

use labelplot::{run_labelplot, LaunchOptions};

#[derive(Parser, Debug)]
#[command(name = "labelplot")]
#[command(about = "Interactive labeling of multivariate time-series tables", long_about = None)]
struct Cli {
    /// Data file to open at startup
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Start in dark mode
    #[arg(short, long)]
    dark_mode: bool,

    /// Monitor to size the window for
    #[arg(short = 'm', long, value_name = "INDEX")]
    use_monitor: Option<usize>,
}

/// 90% of the chosen monitor (the primary one by default), and its top-left corner.
#[cfg(feature = "window_control_display_info")]
fn monitor_geometry(index: Option<usize>) -> Option<([f32; 2], [f32; 2])> {
    let displays = display_info::DisplayInfo::all().ok()?;
    let display = match index {
        Some(i) => displays.into_iter().nth(i)?,
        None => displays.into_iter().find(|d| d.is_primary)?,
    };
    let size = [display.width as f32 * 0.9, display.height as f32 * 0.9];
    let pos = [
        display.x as f32 + display.width as f32 * 0.05,
        display.y as f32 + display.height as f32 * 0.05,
    ];
    Some((size, pos))
}

#[cfg(not(feature = "window_control_display_info"))]
fn monitor_geometry(index: Option<usize>) -> Option<([f32; 2], [f32; 2])> {
    if index.is_some() {
        log::warn!("--use-monitor needs the window_control_display_info feature");
    }
    None
}

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    info!("starting labelplot {}", env!("CARGO_PKG_VERSION"));

    let geometry = monitor_geometry(cli.use_monitor);
    let options = LaunchOptions {
        file: cli.file,
        dark_mode: cli.dark_mode.then_some(true),
        window_size: geometry.map(|(size, _)| size),
        window_pos: geometry.map(|(_, pos)| pos),
        ..LaunchOptions::default()
    };
    run_labelplot(options)
}
