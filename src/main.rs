// GUI-subsystem binary on Windows: no console window is allocated for the
// editor. CLI mode (any argument present) attaches to the launching terminal
// so println!/eprintln! reach it.
#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

mod app;
mod cli;

use app::PastelPixApp;
use eframe::egui;
use pastelpix::logger;

fn main() -> Result<(), eframe::Error> {
    #[cfg(target_os = "windows")]
    if cli::CliArgs::is_cli_mode() {
        unsafe extern "system" {
            fn AttachConsole(dwProcessId: u32) -> i32;
        }
        const ATTACH_PARENT_PROCESS: u32 = 0xFFFF_FFFF;
        unsafe {
            AttachConsole(ATTACH_PARENT_PROCESS);
        }
    }

    // Initialize session log (overwrites previous session log)
    logger::init();

    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 780.0])
            .with_min_inner_size([480.0, 360.0])
            .with_title("PastelPix"),
        ..Default::default()
    };

    eframe::run_native(
        "PastelPix",
        options,
        Box::new(|cc| Box::new(PastelPixApp::new(cc))),
    )
}
