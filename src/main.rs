#![cfg_attr(all(target_os = "windows", not(debug_assertions)), windows_subsystem = "windows")]

use clap::Parser;
use eframe::egui;

use teefe::app::TeeFEApp;
use teefe::cli::{self, CliArgs};
use teefe::config::AppSettings;
use teefe::logger;

fn main() -> Result<(), eframe::Error> {
    let args = CliArgs::parse();

    // -- CLI / headless mode ---------------------------------------------
    if args.is_headless() {
        logger::init_cli(args.verbose);
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();
    if let Some(path) = logger::log_path() {
        tracing::info!("session log at {}", path.display());
    }
    let settings = AppSettings::load();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([760.0, 560.0])
            .with_min_inner_size([600.0, 500.0])
            .with_title("TeeFE"),
        ..Default::default()
    };

    let garment = args.garment;
    eframe::run_native(
        "TeeFE",
        options,
        Box::new(move |cc| Box::new(TeeFEApp::new(cc, settings, garment))),
    )
}
