// ============================================================================
// PastelPix CLI: replay edit scripts without opening a window
// ============================================================================
//
// Usage examples:
//   pastelpix --script heart.txt --export heart.png --scale 16
//   pastelpix --session saved.json --script touchup.txt --save-session saved.json
//   pastelpix -s stripes.txt -W 64 -H 16 -e stripes.png
//
// Scripts are the line format parsed by `ops::script`. Autosave goes to an
// in-memory store; only the files named on the command line are written.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use pastelpix::canvas::clamp_dimension;
use pastelpix::error::{EditorError, Result};
use pastelpix::io::{MemoryStore, SESSION_KEY};
use pastelpix::ops::script::{self, ScriptStep};
use pastelpix::project::Editor;
use pastelpix::settings::EditorSettings;
use pastelpix::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PastelPix headless pixel-art runner.
#[derive(Parser, Debug)]
#[command(
    name = "pastelpix",
    about = "PastelPix headless edit-script runner",
    long_about = "Replay a PastelPix edit script against a fresh or saved canvas,\n\
                  then export a scaled PNG and/or write the session record.\n\n\
                  Example:\n  \
                  pastelpix --script heart.txt --export heart.png --scale 16"
)]
pub struct CliArgs {
    /// Edit script to replay (one command per line).
    #[arg(short, long, value_name = "SCRIPT")]
    pub script: Option<PathBuf>,

    /// Session record (JSON) to start from instead of a blank canvas.
    #[arg(long, value_name = "FILE.json")]
    pub session: Option<PathBuf>,

    /// Write a PNG of the result, upscaled by --scale.
    #[arg(short, long, value_name = "FILE.png")]
    pub export: Option<PathBuf>,

    /// Export upscale factor (1–64). Defaults to the configured export_scale.
    #[arg(long, value_name = "1-64")]
    pub scale: Option<u32>,

    /// Write the resulting session record (JSON).
    #[arg(long, value_name = "FILE.json")]
    pub save_session: Option<PathBuf>,

    /// Width of a blank starting canvas (clamped to 4–256).
    #[arg(short = 'W', long)]
    pub width: Option<i64>,

    /// Height of a blank starting canvas (clamped to 4–256).
    #[arg(short = 'H', long)]
    pub height: Option<i64>,

    /// Print each step and a timing summary.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when the process was started with any argument.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        Self::wants_cli(std::env::args())
    }

    fn wants_cli<I: IntoIterator<Item = String>>(argv: I) -> bool {
        argv.into_iter().nth(1).is_some()
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the script and write the requested outputs.
/// `0` = success, `1` = unreadable input, script error or failed write.
pub fn run(args: CliArgs) -> ExitCode {
    let start = Instant::now();
    match run_inner(&args) {
        Ok(summary) => {
            if args.verbose {
                println!(
                    "{} ({:.0}ms)",
                    summary,
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            log_err!("CLI: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_inner(args: &CliArgs) -> Result<String> {
    let mut settings = EditorSettings::load();
    if let Some(w) = args.width {
        settings.default_width = clamp_dimension(w);
    }
    if let Some(h) = args.height {
        settings.default_height = clamp_dimension(h);
    }

    // -- Step 1: starting canvas ------------------------------------------
    let mut store = MemoryStore::new();
    if let Some(path) = &args.session {
        store.insert(SESSION_KEY, std::fs::read_to_string(path)?);
    }
    let mut editor = Editor::new(Box::new(store), &settings);
    if args.session.is_some() {
        editor.try_restore()?;
    }

    // -- Step 2: script ---------------------------------------------------
    let steps: Vec<ScriptStep> = match &args.script {
        Some(path) => script::parse_script(&std::fs::read_to_string(path)?)?,
        None => Vec::new(),
    };
    if args.verbose {
        for (i, step) in steps.iter().enumerate() {
            println!("[{}/{}] {:?}", i + 1, steps.len(), step);
        }
    }
    script::run_steps(&mut editor, &steps);

    // -- Step 3: outputs --------------------------------------------------
    if let Some(path) = &args.export {
        let scale = args.scale.unwrap_or(settings.export_scale);
        editor.export_png(path, scale)?;
        if args.verbose {
            println!("  → {}", path.display());
        }
    }
    if let Some(path) = &args.save_session {
        let json = editor.session_record()?.to_json()?;
        write_session_file(path, &json)?;
        if args.verbose {
            println!("  → {}", path.display());
        }
    }

    let canvas = editor.canvas();
    let summary = format!(
        "{} step(s), {}×{} canvas, {} history entr{}",
        steps.len(),
        canvas.width(),
        canvas.height(),
        editor.history().len(),
        if editor.history().len() == 1 { "y" } else { "ies" }
    );
    log_info!("CLI: {}", summary);
    Ok(summary)
}

fn write_session_file(path: &std::path::Path, json: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json).map_err(|e| EditorError::PersistenceWriteFailed(e.to_string()))
}
