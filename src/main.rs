// What you SEE:
// • A window showing whatever the selected compute module paints (game of life by default).
// • Left mouse: click / drag go to the module. Keys go to the module as browser-style names.
// • Shift + arrows: a swipe. F5 reloads the module. Resize the window to resize the canvas.
// • ESC quits.
//
// Headless (`--headless`): no window; optional script of JSON commands, then the latest
// frame can be dumped to a PNG.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use canvas_relay::codec::read_script;
use canvas_relay::surface::{ChannelPresenter, SnapshotPresenter};
use canvas_relay::window::WindowHost;
use canvas_relay::{DrawingSurface, Orchestrator, RelayConfig, Result, Size, SurfaceSlot};

/// How long headless mode waits for the requested number of frames.
const HEADLESS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "canvas-relay", version)]
#[command(about = "Run a compute module on its own thread and paint its frames")]
struct Args {
    /// JSON config file (module registry, canvas default, mailbox capacity)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Module name; unknown names fall back to the configured default
    #[arg(short, long)]
    module: Option<String>,
    /// Canvas width when the host cannot measure one
    #[arg(long)]
    width: Option<u32>,
    /// Canvas height when the host cannot measure one
    #[arg(long)]
    height: Option<u32>,
    /// Run without a window
    #[arg(long)]
    headless: bool,
    /// JSON-lines command script replayed after start (headless only)
    #[arg(long)]
    script: Option<PathBuf>,
    /// Frames to wait for before finishing (headless only)
    #[arg(long, default_value_t = 1)]
    frames: u64,
    /// Write the last presented frame as PNG (headless only)
    #[arg(long)]
    dump: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let outcome = load_config(&args).and_then(|config| {
        if args.headless { run_headless(&args, &config) } else { run_windowed(&args, &config) }
    });
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<RelayConfig> {
    let mut config = match &args.config {
        Some(path) => RelayConfig::load(path)?,
        None => RelayConfig::default(),
    };
    if let Some(w) = args.width {
        config.canvas.width = w;
    }
    if let Some(h) = args.height {
        config.canvas.height = h;
    }
    config.validate()?;
    Ok(config)
}

fn run_windowed(args: &Args, config: &RelayConfig) -> Result<()> {
    /* --- Window setup ---
       Visual: a black window at the configured canvas size. */
    let mut host = WindowHost::new("canvas relay", config.canvas)?;
    let params = config.resolve(args.module.as_deref(), Some(host.size()));

    // one slot: the window only ever wants the newest snapshot
    let (snap_tx, snap_rx) = flume::bounded(1);
    let surface = DrawingSurface::new(params.size(), Box::new(ChannelPresenter::new(snap_tx)));
    let mut slot = SurfaceSlot::new(surface);

    let mut orch = Orchestrator::from_config(config);
    orch.start(params, &mut slot)?;

    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;

    /* ------------------------------ Main loop ------------------------------ */
    while host.is_open() && !host.esc_pressed() {
        /* 1) Inputs */
        let polled = host.poll();
        if polled.reload {
            orch.reload()?;
        }
        if let Some(size) = polled.resized {
            orch.resize(size.width, size.height)?;
        }
        for raw in polled.inputs {
            if let Err(e) = orch.input(raw) {
                warn!("input dropped: {e}");
            }
        }

        /* 2) Newest snapshot, if the render unit presented one.
           Visual: the window changes only when a frame was painted. */
        if let Some(snapshot) = snap_rx.try_iter().last() {
            host.show(&snapshot);
            frames_this_second += 1;
        }

        /* 3) Present (also pumps window events). */
        host.present()?;

        /* 4) Frames shown per second, once a second */
        let now = Instant::now();
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let fps = frames_this_second as f32 / now.duration_since(last_fps_time).as_secs_f32();
            debug!(fps = %format!("{fps:.1}"), state = ?orch.compute_state(), "frames shown");
            frames_this_second = 0;
            last_fps_time = now;
        }
    }

    orch.stop()
}

fn run_headless(args: &Args, config: &RelayConfig) -> Result<()> {
    let params = config.resolve(args.module.as_deref(), None);
    let (presenter, latest) = SnapshotPresenter::new();
    let mut slot = SurfaceSlot::new(DrawingSurface::new(params.size(), Box::new(presenter)));

    let mut orch = Orchestrator::from_config(config);
    let logs = orch.logs();
    orch.start(params, &mut slot)?;

    if let Some(path) = &args.script {
        let commands = read_script(BufReader::new(File::open(path)?))?;
        info!(count = commands.len(), script = %path.display(), "replaying script");
        for cmd in commands {
            let kind = cmd.kind();
            if let Err(e) = orch.apply(cmd) {
                warn!(%kind, "script command failed: {e}");
            }
        }
    }

    let deadline = Instant::now() + HEADLESS_TIMEOUT;
    while latest.presented() < args.frames && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    if latest.presented() < args.frames {
        warn!(presented = latest.presented(), wanted = args.frames, "timed out waiting for frames");
    }

    if let Some(path) = &args.dump {
        match latest.latest() {
            Some(image) => {
                image.save(path)?;
                let size = Size::new(image.width(), image.height());
                info!(path = %path.display(), ?size, "frame written");
            }
            None => warn!("nothing was presented; no dump written"),
        }
    }

    let state = orch.compute_state();
    orch.stop()?;
    for line in logs.try_iter() {
        println!("log: {line}");
    }
    info!(?state, presented = latest.presented(), "done");
    Ok(())
}
