use anyhow::{bail, Context};
use chrono::NaiveDateTime;
use clap::Parser;
use std::path::PathBuf;
use thermal_dataset::{
    display_range, render::normalize_to_gray, TdEngineClient, TdEngineConfig, Timezone,
    DEFAULT_TOLERANCE_MS,
};

#[derive(Parser, Debug)]
#[command(
    name = "fetch_frame",
    about = "Fetch one thermal frame from the TDengine store and report its stats"
)]
struct Args {
    /// Sensor MAC address, e.g. a4:cf:12:77:01:ab.
    #[arg(long)]
    mac: String,
    /// Target epoch milliseconds, UTC.
    #[arg(long, conflicts_with = "local_time")]
    timestamp_ms: Option<i64>,
    /// Target local wall-clock time, `YYYY-MM-DD HH:MM:SS`.
    #[arg(long)]
    local_time: Option<String>,
    #[arg(long, value_enum, default_value = "utc")]
    timezone: Timezone,
    #[arg(long, default_value_t = DEFAULT_TOLERANCE_MS)]
    tolerance_ms: i64,
    /// Save the frame as a grayscale PNG.
    #[arg(long)]
    save: Option<PathBuf>,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, default_value_t = 6041)]
    port: u16,
    #[arg(long, default_value = "root")]
    user: String,
    #[arg(long, default_value = "taosdata")]
    password: String,
    #[arg(long, default_value = "thermal_sensors")]
    database: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let timestamp_ms = match (&args.timestamp_ms, &args.local_time) {
        (Some(ms), _) => *ms,
        (None, Some(text)) => {
            let local = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .with_context(|| format!("parsing local time {text:?}"))?;
            args.timezone.to_utc(local).timestamp_millis()
        }
        (None, None) => bail!("either --timestamp-ms or --local-time is required"),
    };

    let config = TdEngineConfig {
        host: args.host,
        port: args.port,
        user: args.user,
        password: args.password,
        database: args.database,
        ..TdEngineConfig::default()
    };
    let client = TdEngineClient::new(config)?;

    let frame = client
        .fetch_frame(&args.mac, timestamp_ms, args.tolerance_ms)
        .with_context(|| format!("fetching frame for {}", args.mac))?;

    let Some(frame) = frame else {
        log::warn!("no frame within {}ms of {timestamp_ms}", args.tolerance_ms);
        return Ok(());
    };

    println!("frame: {}x{}", frame.width(), frame.height());
    println!("timestamp: {:.3}s ({})", frame.timestamp, frame.timestamp_ms());
    if let Some((lo, hi)) = frame.min_max() {
        println!("temperature: {lo:.2} to {hi:.2} C");
    }

    if let Some(path) = args.save {
        let range = display_range(std::slice::from_ref(&frame));
        let gray = normalize_to_gray(&frame, &range);
        gray.save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("saved frame to {}", path.display());
    }
    Ok(())
}
