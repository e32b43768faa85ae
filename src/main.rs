use clap::{Arg, ArgAction, Command};
use lockstep::config::{ClockPolicy, EngineConfig, OutputMode, TimestampSource, app_name, app_version};
use std::path::PathBuf;
use std::{panic, process};
use tokio_util::sync::CancellationToken;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new(app_name())
        .version(app_version())
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .help("Media file to play.")
                .required(true),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("CONFIG")
                .help("JSON engine configuration file."),
        )
        .arg(
            Arg::new("volume")
                .long("volume")
                .value_name("VOLUME")
                .help("Initial volume slider position (0..1).")
                .value_parser(clap::value_parser!(f32)),
        )
        .arg(
            Arg::new("mute")
                .long("mute")
                .help("Start muted.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-device")
                .long("no-device")
                .help("Do not open an audio device, drive the clock with the fallback ticker.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("policy")
                .long("policy")
                .value_name("POLICY")
                .help("Clock advance policy (per-slot/per-period).")
                .value_parser(["per-slot", "per-period"]),
        )
        .arg(
            Arg::new("timestamps")
                .long("timestamps")
                .value_name("SOURCE")
                .help("Timestamp selection (decode-first/observed).")
                .value_parser(["decode-first", "observed"]),
        )
        .arg(
            Arg::new("play")
                .short('p')
                .long("play")
                .help("Start playing immediately instead of waiting for \"play\".")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(volume) = matches.get_one::<f32>("volume") {
        config.volume = *volume;
    }
    if matches.get_flag("mute") {
        config.mute = true;
    }
    if matches.get_flag("no-device") {
        config.output = OutputMode::Fallback;
    }
    match matches.get_one::<String>("policy").map(String::as_str) {
        Some("per-period") => config.clock_policy = ClockPolicy::PerPeriod,
        Some("per-slot") => config.clock_policy = ClockPolicy::PerSlot,
        _ => {}
    }
    match matches.get_one::<String>("timestamps").map(String::as_str) {
        Some("observed") => config.timestamp_source = TimestampSource::Observed,
        Some("decode-first") => config.timestamp_source = TimestampSource::DecodeFirst,
        _ => {}
    }
    config.validate()?;

    let path = matches
        .get_one::<String>("file")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("No media file given"))?;
    let autoplay = matches.get_flag("play");

    // kill the main thread as soon as a secondary thread panics
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // invoke the default handler and exit the process
        orig_hook(panic_info);
        process::exit(105);
    }));

    // stop playback gracefully on SIGINT, SIGTERM, or SIGHUP
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    ctrlc::set_handler(move || on_signal.cancel())?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(lockstep::player::run(path, config, autoplay, cancel))?;

    // stdin reader may still be blocked on a read
    runtime.shutdown_timeout(std::time::Duration::from_millis(100));
    Ok(())
}
