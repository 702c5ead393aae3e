use crate::config::{LoggingConfig, Section};
use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{level_filters::LevelFilter, Level, Metadata};
use tracing_subscriber::{
    filter::{FilterFn, Targets},
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    Layer, Registry,
};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;
const DEFAULT_MAX_BACKUPS: usize = 3;

fn parse_tracing_level(s: &str) -> Option<Level> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" => None,
        _ => Some(Level::INFO),
    }
}

/// Returns true if target == prefix or target starts with "prefix::"
fn matches_target_prefix(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

// -------- rotating file writers --------

type Rotating = Arc<Mutex<FileRotate<AppendTimestamp>>>;

fn lock(file: &Rotating) -> MutexGuard<'_, FileRotate<AppendTimestamp>> {
    // A panic mid-write leaves the file usable; keep logging.
    file.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Writer handle that drops records when no file is routed for the target.
struct FileHandle(Option<Rotating>);

impl Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &self.0 {
            Some(f) => lock(f).write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &self.0 {
            Some(f) => lock(f).flush(),
            None => Ok(()),
        }
    }
}

/// Routes records to per-subsystem files by target prefix, falling back to the default file.
#[derive(Clone, Default)]
struct FileRouter {
    default: Option<Rotating>,
    by_prefix: Vec<(String, Rotating)>,
}

impl FileRouter {
    fn resolve(&self, target: &str) -> Option<Rotating> {
        self.by_prefix
            .iter()
            .find(|(prefix, _)| matches_target_prefix(target, prefix))
            .map(|(_, f)| f.clone())
            .or_else(|| self.default.clone())
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = FileHandle;

    fn make_writer(&'a self) -> Self::Writer {
        FileHandle(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        FileHandle(self.resolve(meta.target()))
    }
}

/// Resolve a log file path against `base_dir`.
/// Absolute paths are kept as-is; relative paths are joined with `base_dir`.
fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn open_rotating(log_path: &Path, section: &Section) -> std::io::Result<Rotating> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) * 1024 * 1024;
    let backups = section.max_backups.unwrap_or(DEFAULT_MAX_BACKUPS);

    let rot = FileRotate::new(
        log_path,
        AppendTimestamp::default(FileLimit::MaxFiles(backups)),
        ContentLimit::BytesSurpassed(max_bytes as usize),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    Ok(Arc::new(Mutex::new(rot)))
}

fn file_for(name: &str, section: &Section, base_dir: &Path) -> Option<Rotating> {
    if section.file.trim().is_empty() {
        return None;
    }
    let path = resolve_log_path(&section.file, base_dir);
    match open_rotating(&path, section) {
        Ok(f) => Some(f),
        Err(e) => {
            // The subscriber isn't installed yet.
            eprintln!(
                "failed to open log file for '{name}': {} ({e})",
                path.display()
            );
            None
        }
    }
}

// -------- filters --------

/// Explicit subsystem sections, sorted so longer prefixes win when routing.
fn subsystem_sections(cfg: &LoggingConfig) -> Vec<(&str, &Section)> {
    let mut v: Vec<_> = cfg
        .iter()
        .filter(|(k, _)| k.as_str() != DEFAULT_SECTION)
        .map(|(k, s)| (k.as_str(), s))
        .collect();
    v.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
    v
}

fn explicit_targets(
    sections: &[(&str, &Section)],
    level_of: impl Fn(&Section) -> Option<&str>,
) -> Targets {
    sections
        .iter()
        .filter_map(|(name, s)| {
            let level = parse_tracing_level(level_of(s)?)?;
            Some((name.to_string(), LevelFilter::from_level(level)))
        })
        .fold(Targets::new().with_default(LevelFilter::OFF), |t, (n, l)| {
            t.with_target(n, l)
        })
}

type DefaultFilter = FilterFn<Box<dyn Fn(&Metadata<'_>) -> bool + Send + Sync + 'static>>;

/// Everything outside the explicit subsystems, up to `max_level`.
fn default_filter(subsystems: Vec<String>, max_level: Level) -> DefaultFilter {
    FilterFn::new(Box::new(move |meta: &Metadata<'_>| {
        let t = meta.target();
        !subsystems.iter().any(|s| matches_target_prefix(t, s)) && *meta.level() <= max_level
    }))
}

// -------- public init --------

/// Initialize the global subscriber from a configuration.
///
/// - `cfg`: subsystem sections keyed by target prefix, plus the `default` catch-all
/// - `base_dir`: directory relative log file paths are resolved against
///
/// Console output is plain text; files receive JSON lines. Calling this twice is a no-op.
pub fn init_logging_from_config(cfg: &LoggingConfig, base_dir: &Path) {
    // Bridge `log` → `tracing` before installing the subscriber.
    let _ = tracing_log::LogTracer::init();

    if cfg.is_empty() {
        init_default_logging();
        return;
    }

    let sections = subsystem_sections(cfg);
    let default = cfg.get(DEFAULT_SECTION);
    let names: Vec<String> = sections.iter().map(|(n, _)| n.to_string()).collect();

    let mut router = FileRouter {
        default: default.and_then(|s| file_for(DEFAULT_SECTION, s, base_dir)),
        ..Default::default()
    };
    for (name, section) in &sections {
        if let Some(f) = file_for(name, section, base_dir) {
            router.by_prefix.push((name.to_string(), f));
        }
    }

    let ansi = atty::is(atty::Stream::Stdout);
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    layers.push(
        console_layer(ansi)
            .with_filter(explicit_targets(&sections, |s| {
                Some(s.console_level.as_str())
            }))
            .boxed(),
    );

    if let Some(level) = default.and_then(|s| parse_tracing_level(&s.console_level)) {
        layers.push(
            console_layer(ansi)
                .with_filter(default_filter(names.clone(), level))
                .boxed(),
        );
    }

    if !router.by_prefix.is_empty() {
        let targets = explicit_targets(&sections, |s| {
            (!s.file.trim().is_empty()).then_some(s.file_level.as_str())
        });
        layers.push(file_layer(router.clone()).with_filter(targets).boxed());
    }

    if router.default.is_some() {
        if let Some(level) = default.and_then(|s| parse_tracing_level(&s.file_level)) {
            layers.push(
                file_layer(router)
                    .with_filter(default_filter(names, level))
                    .boxed(),
            );
        }
    }

    let _ = Registry::default().with(layers).try_init();
}

fn console_layer(ansi: bool) -> impl Layer<Registry> + Send + Sync + 'static {
    fmt::layer()
        .with_ansi(ansi)
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
}

fn file_layer(router: FileRouter) -> impl Layer<Registry> + Send + Sync + 'static {
    fmt::layer()
        .json()
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(router)
}

fn init_default_logging() {
    let _ = fmt()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_logging_config, AppConfig};
    use std::fs;
    use tempfile::tempdir;

    fn section(file: &str, file_level: &str) -> Section {
        Section {
            console_level: "info".into(),
            file: file.into(),
            file_level: file_level.into(),
            max_backups: Some(2),
            max_size_mb: Some(1),
        }
    }

    #[test]
    fn test_logging_level_parsing() {
        assert_eq!(parse_tracing_level("trace"), Some(Level::TRACE));
        assert_eq!(parse_tracing_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_tracing_level("Info"), Some(Level::INFO));
        assert_eq!(parse_tracing_level("warn"), Some(Level::WARN));
        assert_eq!(parse_tracing_level("ERROR"), Some(Level::ERROR));
        assert_eq!(parse_tracing_level("off"), None);
        assert_eq!(parse_tracing_level("none"), None);
        assert_eq!(parse_tracing_level("invalid"), Some(Level::INFO)); // defaults to INFO
    }

    #[test]
    fn test_target_prefix_matching() {
        assert!(matches_target_prefix("customers", "customers"));
        assert!(matches_target_prefix("customers::api::rest", "customers"));
        assert!(!matches_target_prefix("customers_extra", "customers"));
        assert!(!matches_target_prefix("odata_core", "customers"));
    }

    #[test]
    fn test_subsystem_sections_skip_default_and_prefer_longer_prefixes() {
        let mut cfg = default_logging_config();
        cfg.insert("odata_core".into(), section("", ""));
        cfg.insert("odata_core::pipeline".into(), section("", ""));

        let names: Vec<&str> = subsystem_sections(&cfg).iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["odata_core::pipeline", "odata_core"]);
    }

    #[test]
    fn test_router_resolves_subsystem_then_default() {
        let tmp = tempdir().unwrap();
        let s = section("x.log", "debug");
        let default = open_rotating(&tmp.path().join("default.log"), &s).unwrap();
        let api = open_rotating(&tmp.path().join("api.log"), &s).unwrap();
        let router = FileRouter {
            default: Some(default.clone()),
            by_prefix: vec![("api_ingress".into(), api.clone())],
        };

        let hit = router.resolve("api_ingress::web").unwrap();
        assert!(Arc::ptr_eq(&hit, &api));
        let fallback = router.resolve("customers").unwrap();
        assert!(Arc::ptr_eq(&fallback, &default));
        assert!(FileRouter::default().resolve("customers").is_none());
    }

    #[test]
    fn test_file_paths_resolved_against_base_dir() {
        let tmp = tempdir().unwrap();
        let base_dir = tmp.path();

        let resolved = resolve_log_path("logs/test.log", base_dir);
        assert!(resolved.starts_with(base_dir));
        assert!(resolved.ends_with("logs/test.log"));

        let abs = base_dir.join("abs.log");
        assert_eq!(resolve_log_path(abs.to_str().unwrap(), Path::new("/elsewhere")), abs);
    }

    #[test]
    fn test_open_rotating_creates_parent_and_writes() {
        let tmp = tempdir().unwrap();
        let p = tmp.path().join("nested/dir/app.log");

        let f = open_rotating(&p, &section("nested/dir/app.log", "debug")).unwrap();
        assert!(p.parent().unwrap().exists(), "parent dir must be created");

        let mut handle = FileHandle(Some(f));
        handle.write_all(b"hello\n").unwrap();
        handle.flush().unwrap();
        assert_eq!(fs::read_to_string(&p).unwrap(), "hello\n");
    }

    #[test]
    fn test_unrouted_handle_drops_writes() {
        let mut handle = FileHandle(None);
        assert_eq!(handle.write(b"dropped").unwrap(), 7);
        handle.flush().unwrap();
    }

    #[test]
    fn test_empty_file_means_no_writer() {
        let tmp = tempdir().unwrap();
        assert!(file_for("default", &section("  ", "debug"), tmp.path()).is_none());
        assert!(file_for("default", &section("a.log", "debug"), tmp.path()).is_some());
    }

    #[test]
    fn test_config_logging_sections_from_yaml() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("test_config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8088

logging:
  default:
    console_level: info
    file: ""
    file_level: debug
  api_ingress:
    console_level: debug
    file: "logs/api_test.log"
    file_level: warn
    max_size_mb: 5
    max_backups: 2
"#;
        fs::write(&config_path, yaml_content).unwrap();

        let config = AppConfig::load_layered(&config_path).unwrap();
        let logging = config.logging.unwrap();
        let sections = subsystem_sections(&logging);
        assert_eq!(sections.len(), 1);
        let (name, api) = sections[0];
        assert_eq!(name, "api_ingress");
        assert_eq!(api.max_size_mb, Some(5));

        let abs = resolve_log_path(&api.file, temp_dir.path());
        assert!(abs.ends_with("logs/api_test.log"));
        // not calling init to avoid installing a global subscriber in tests
    }
}
