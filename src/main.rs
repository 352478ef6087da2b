use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgAction, Command, value_parser};
use framepacer::assets::DEFAULT_STREAM_FPS;
use framepacer::config::{app_name, version};
use framepacer::utils::SignalOfStop;
use framepacer::{
    DisplayTarget, Frame, FrameStore, Pacer, PacerConfig, Renderer, RendererAttributes, VideoStats,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

const DEMO_WIDTH: u32 = 320;
const DEMO_HEIGHT: u32 = 180;

/// Pretends to present frames; logs what it would show
struct LoggingRenderer {
    attributes: RendererAttributes,
    presented: AtomicU64,
}

impl Renderer for LoggingRenderer {
    fn render_frame(&self, frame: &Frame) -> Result<()> {
        let count = self.presented.fetch_add(1, Ordering::Relaxed) + 1;
        log::trace!(
            "present #{}: frame {} pts {:?} after {:?} in pacer",
            count,
            frame.sequence,
            frame.pts,
            frame.time_in_pacer()
        );
        Ok(())
    }

    fn attributes(&self) -> RendererAttributes {
        self.attributes
    }
}

/// Decoder stand-in: delivers frames at `fps`, every fifth one late by
/// `jitter` and the following one right behind it.
fn decode_loop(pacer: Arc<Pacer>, store: FrameStore, fps: u32, jitter: Duration, sos: SignalOfStop) {
    let interval = Duration::from_secs(1) / fps.max(1);
    let len = (DEMO_WIDTH * DEMO_HEIGHT * 4) as usize;
    let mut sequence = 0u64;

    loop {
        let delay = match sequence % 5 {
            4 => interval + jitter,
            0 if sequence > 0 => interval.saturating_sub(jitter),
            _ => interval,
        };
        if sos.sleep(delay) {
            break;
        }

        sequence += 1;
        let mut frame = store.acquire(sequence, interval * sequence as u32, DEMO_WIDTH, DEMO_HEIGHT, len);
        frame.data[0] = (sequence % 256) as u8;
        pacer.submit_frame(frame);
    }
    log::debug!("decoder stopped after {} frames", sequence);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let default_fps: &'static str = Box::leak(DEFAULT_STREAM_FPS.to_string().into_boxed_str());

    let matches = Command::new(app_name())
        .version(version())
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("fps")
                .short('f')
                .long("fps")
                .value_name("FPS")
                .help("Frame rate of the simulated stream.")
                .value_parser(value_parser!(u32).range(1..=1000))
                .default_value(default_fps),
        )
        .arg(
            Arg::new("display-hz")
                .short('d')
                .long("display-hz")
                .value_name("HZ")
                .help("Refresh rate of a virtual display, queries the primary monitor when omitted.")
                .value_parser(value_parser!(u32))
                .required(false),
        )
        .arg(
            Arg::new("pacing")
                .short('p')
                .long("pacing")
                .value_name("PACING")
                .help("Release frames on vsync (yes/no).")
                .required(false)
                .default_missing_value("yes")
                .ignore_case(true)
                .num_args(0..=1)
                .default_value("yes"),
        )
        .arg(
            Arg::new("vrr")
                .long("vrr")
                .help("Treat the display as VRR capable and the renderer as VRR aware.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("jitter")
                .short('j')
                .long("jitter-ms")
                .value_name("MS")
                .help("How late every fifth decoded frame arrives.")
                .value_parser(value_parser!(u64))
                .default_value("6"),
        )
        .arg(
            Arg::new("seconds")
                .short('s')
                .long("seconds")
                .value_name("SECONDS")
                .help("How long to run, Ctrl-C stops earlier.")
                .value_parser(value_parser!(u64))
                .default_value("5"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON file with pacer settings.")
                .value_parser(value_parser!(PathBuf))
                .required(false),
        )
        .get_matches();

    let fps = *matches.get_one::<u32>("fps").ok_or(anyhow!("missing fps"))?;
    let jitter = Duration::from_millis(*matches.get_one::<u64>("jitter").unwrap_or(&6));
    let seconds = *matches.get_one::<u64>("seconds").unwrap_or(&5);
    let vrr = matches.get_flag("vrr");
    let enable_pacing = match matches.get_one::<String>("pacing") {
        Some(val) => &val.to_lowercase() == "yes",
        None => true,
    };

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => PacerConfig::load(path)?,
        None => PacerConfig::default(),
    };

    let display = match matches.get_one::<u32>("display-hz") {
        Some(hz) => DisplayTarget::new("virtual display", *hz),
        None => DisplayTarget::primary().unwrap_or_else(|e| {
            log::warn!("{:#}, using a virtual 60 Hz display", e);
            DisplayTarget::new("virtual display", 60)
        }),
    }
    .with_vrr(vrr);

    let mut attributes = RendererAttributes::NONE;
    if vrr {
        attributes |= RendererAttributes::VRR_TIMING;
    }
    let renderer = Arc::new(LoggingRenderer {
        attributes,
        presented: AtomicU64::new(0),
    });

    let stats = Arc::new(VideoStats::new());
    let pacer = Arc::new(Pacer::new(renderer.clone(), stats.clone(), config));
    let mode = pacer.initialize(&display, fps, enable_pacing)?;
    log::info!("{} {}: {} fps stream, {} pacing", app_name(), version(), fps, mode);

    let sos = SignalOfStop::new();

    // gracefully stop when receiving SIGINT, SIGTERM, or SIGHUP
    {
        let sos = sos.clone();
        ctrlc::set_handler(move || sos.cancel()).context("Error setting Ctrl-C handler")?;
    }

    let store = FrameStore::new();
    let decoder = {
        let pacer = Arc::clone(&pacer);
        let store = store.clone();
        let sos = sos.clone();
        thread::Builder::new()
            .name("decoder".into())
            .spawn(move || decode_loop(pacer, store, fps, jitter, sos))
            .context("Unable to spawn decoder thread")?
    };

    sos.sleep(Duration::from_secs(seconds));
    sos.cancel();
    if decoder.join().is_err() {
        log::error!("decoder thread panicked");
    }
    pacer.stop();

    println!("{}", stats.summary());
    println!(
        "presented {} frames, {} buffers allocated, {} reused",
        renderer.presented.load(Ordering::Relaxed),
        store.allocations(),
        store.reuses()
    );
    Ok(())
}
