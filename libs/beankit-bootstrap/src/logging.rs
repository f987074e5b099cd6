use crate::config::{LoggingConfig, Section};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use parking_lot::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;

// Keeps the non-blocking console worker alive for the whole process.
static CONSOLE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Level names as written in config; unknown names fall back to `info`.
pub fn parse_level(s: &str) -> LevelFilter {
    match s.trim().to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" | "none" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

#[derive(Clone, Copy)]
enum Sink {
    Console,
    File,
}

/// Per-target filter for one sink. Sections other than "default" name a
/// target prefix such as `beankit::types`.
fn targets_for(cfg: &LoggingConfig, sink: Sink) -> Targets {
    let level_of = |section: &Section| match sink {
        Sink::Console => Some(parse_level(&section.console_level)),
        Sink::File if section.file_level.trim().is_empty() => None,
        Sink::File => Some(parse_level(&section.file_level)),
    };

    let default_level = cfg
        .get(DEFAULT_SECTION)
        .and_then(level_of)
        .unwrap_or(LevelFilter::INFO);

    cfg.iter()
        .filter(|(target, _)| target.as_str() != DEFAULT_SECTION)
        .filter_map(|(target, section)| level_of(section).map(|level| (target.clone(), level)))
        .fold(Targets::new().with_default(default_level), |targets, (target, level)| {
            targets.with_target(target, level)
        })
}

// ================= rotating file writer =================

#[derive(Clone)]
struct RotatingFile(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().flush()
    }
}

impl<'a> fmt::MakeWriter<'a> for RotatingFile {
    type Writer = RotatingFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn open_rotating_file(section: &Section, base_dir: &Path) -> std::io::Result<RotatingFile> {
    let path = resolve_log_path(section.file.trim(), base_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // A backup count wins over age-based retention.
    let limit = match section.max_backups {
        Some(n) => FileLimit::MaxFiles(n),
        None => FileLimit::Age(chrono::Duration::days(
            i64::from(section.max_age_days.unwrap_or(1)),
        )),
    };
    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) * 1024 * 1024;

    let rotate = FileRotate::new(
        &path,
        AppendTimestamp::default(limit),
        ContentLimit::BytesSurpassed(usize::try_from(max_bytes).unwrap_or(usize::MAX)),
        Compression::None,
        None,
    );
    Ok(RotatingFile(Arc::new(Mutex::new(rotate))))
}

// ================= public init =================

/// Install the global subscriber described by `cfg`.
///
/// `RUST_LOG`, when set, caps every sink. Relative log file paths resolve
/// against `base_dir`. An empty config installs [`init_minimal`].
pub fn init_logging(cfg: &LoggingConfig, base_dir: &Path) {
    // Bridge `log` → `tracing` before installing the subscriber
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("LogTracer init skipped: {e}");
    }

    if cfg.is_empty() {
        init_minimal();
        return;
    }

    let env = EnvFilter::try_from_default_env().ok();

    let (nb_stderr, guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = CONSOLE_GUARD.set(guard);
    let console_layer = fmt::layer()
        .with_writer(nb_stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(targets_for(cfg, Sink::Console));

    let file_layer = cfg
        .get(DEFAULT_SECTION)
        .filter(|section| !section.file.trim().is_empty())
        .and_then(|section| match open_rotating_file(section, base_dir) {
            Ok(writer) => Some(writer),
            Err(e) => {
                eprintln!("Failed to open log file '{}': {e}", section.file);
                None
            }
        })
        .map(|writer| {
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_writer(writer)
                .with_filter(targets_for(cfg, Sink::File))
        });

    let _ = tracing_subscriber::registry()
        .with(env)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

/// Console logging at `info`, capped by `RUST_LOG` when set.
pub fn init_minimal() {
    let env = EnvFilter::try_from_default_env().ok();
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(LevelFilter::INFO);

    let _ = tracing_subscriber::registry()
        .with(env)
        .with(fmt_layer)
        .try_init();
}
