use std::ffi::OsString;
use std::fmt::{self as stdfmt, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Result;
use cascade_config::{LogFormat, LoggingConfig};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::format::DefaultFields;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormattedFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// A type-erased layer, so the stderr layer and the optional file layer —
/// built from two different concrete formatters depending on
/// `config.format` — can be collected into one `Vec` and registered with a
/// single `.with(layers)` call instead of one call per combination.
type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Keeps the file layer's span-field cache separate from the stderr
/// layer's, so formatting cached for one writer never leaks into the
/// other.
#[derive(Default)]
struct FileFields(DefaultFields);

impl<'writer> fmt::FormatFields<'writer> for FileFields {
    fn format_fields<R: tracing_subscriber::field::RecordFields>(
        &self,
        writer: fmt::format::Writer<'writer>,
        fields: R,
    ) -> stdfmt::Result {
        self.0.format_fields(writer, fields)
    }
}

/// Plain-text event formatter that pulls the `domain` field set by
/// `cascade_core`'s logging macros (`stage`, `graph`, `sym`) out of the
/// field list and prints it as a `[domain]` prefix ahead of the message,
/// rather than letting it fall in with the other key=value pairs.
struct DomainFormat {
    timer: SystemTime,
}

impl DomainFormat {
    fn new() -> Self {
        Self { timer: SystemTime }
    }
}

impl<S, N> FormatEvent<S, N> for DomainFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> fmt::FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: fmt::format::Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        let ansi = writer.has_ansi_escapes();

        write_timestamp(&self.timer, &mut writer, ansi)?;
        write_level(*event.metadata().level(), &mut writer, ansi)?;

        let mut visitor = DomainExtractor::default();
        event.record(&mut visitor);

        if let Some(ref domain) = visitor.domain {
            if ansi {
                write!(writer, "\x1b[1;36m[{domain}]\x1b[0m ")?;
            } else {
                write!(writer, "[{domain}] ")?;
            }
        }

        write_span_scope(ctx, &mut writer, ansi)?;
        write!(writer, "{}", visitor.message)?;

        if !visitor.other_fields.is_empty() {
            if ansi {
                write!(writer, " \x1b[3m{}\x1b[0m", visitor.other_fields)?;
            } else {
                write!(writer, " {}", visitor.other_fields)?;
            }
        }

        writeln!(writer)
    }
}

fn write_timestamp(timer: &SystemTime, writer: &mut fmt::format::Writer<'_>, ansi: bool) -> stdfmt::Result {
    if ansi {
        write!(writer, "\x1b[2m")?;
    }
    if timer.format_time(writer).is_err() {
        write!(writer, "<unknown time>")?;
    }
    if ansi {
        write!(writer, "\x1b[0m")?;
    }
    Ok(())
}

fn write_level(level: Level, writer: &mut fmt::format::Writer<'_>, ansi: bool) -> stdfmt::Result {
    if ansi {
        let color = match level {
            Level::ERROR => "31",
            Level::WARN => "33",
            Level::INFO => "32",
            Level::DEBUG => "34",
            Level::TRACE => "35",
        };
        write!(writer, " \x1b[{color}m{level:>5}\x1b[0m ")
    } else {
        write!(writer, " {level:>5} ")
    }
}

fn write_span_scope<S, N>(
    ctx: &FmtContext<'_, S, N>,
    writer: &mut fmt::format::Writer<'_>,
    ansi: bool,
) -> stdfmt::Result
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> fmt::FormatFields<'writer> + 'static,
{
    let Some(scope) = ctx.event_scope() else {
        return Ok(());
    };
    for span in scope.from_root() {
        let name = span.name();
        if ansi {
            write!(writer, "\x1b[1m{name}\x1b[0m")?;
        } else {
            write!(writer, "{name}")?;
        }
        write!(writer, "{{")?;
        let ext = span.extensions();
        if let Some(fields) = ext.get::<FormattedFields<N>>() {
            if !fields.is_empty() {
                write!(writer, "{fields}")?;
            }
        }
        write!(writer, "}}: ")?;
    }
    Ok(())
}

/// Splits one event's fields into `domain`, `message`, and everything
/// else, so [`DomainFormat`] can place each where it wants instead of
/// printing them in field-declaration order.
#[derive(Default)]
struct DomainExtractor {
    domain: Option<String>,
    message: String,
    other_fields: String,
}

impl DomainExtractor {
    fn push_separator(&mut self) {
        if !self.other_fields.is_empty() {
            self.other_fields.push(' ');
        }
    }
}

impl Visit for DomainExtractor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "domain" => self.domain = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            name => {
                self.push_separator();
                write!(&mut self.other_fields, "{name}={value:?}").ok();
            }
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        match field.name() {
            "domain" => {
                let s = format!("{value:?}");
                self.domain = Some(s.trim_matches('"').to_string());
            }
            "message" => {
                write!(&mut self.message, "{value:?}").ok();
            }
            name => {
                self.push_separator();
                write!(&mut self.other_fields, "{name}={value:?}").ok();
            }
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push_separator();
        write!(&mut self.other_fields, "{}={value}", field.name()).ok();
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push_separator();
        write!(&mut self.other_fields, "{}={value}", field.name()).ok();
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push_separator();
        write!(&mut self.other_fields, "{}={value}", field.name()).ok();
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push_separator();
        write!(&mut self.other_fields, "{}={value}", field.name()).ok();
    }
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if std::env::var("RUST_LOG").is_ok() {
        return Ok(EnvFilter::from_default_env());
    }
    let mut directives = config.level.clone();
    for (module, level) in &config.modules {
        directives.push(',');
        directives.push_str(module);
        directives.push('=');
        directives.push_str(level);
    }
    EnvFilter::try_new(&directives).map_err(|e| anyhow::anyhow!("invalid log filter '{directives}': {e}"))
}

/// Resolves `file_path` against `base_dir` when relative, ensures its
/// parent directory exists, and splits it into the directory/filename
/// pair `tracing_appender::rolling::never` takes.
fn resolve_log_target(base_dir: &Path, file_path: &Path) -> Result<(PathBuf, OsString)> {
    let resolved = if file_path.is_relative() {
        base_dir.join(file_path)
    } else {
        file_path.to_path_buf()
    };
    if let Some(parent) = resolved.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file_name = resolved
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log file path has no file name"))?
        .to_os_string();
    let dir = resolved
        .parent()
        .ok_or_else(|| anyhow::anyhow!("log file path has no parent directory"))?
        .to_path_buf();
    Ok((dir, file_name))
}

fn open_file_writer(base_dir: &Path, file_path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let (dir, file_name) = resolve_log_target(base_dir, file_path)?;
    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

fn stderr_layer(is_json: bool, filter: EnvFilter) -> BoxedLayer {
    if is_json {
        fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .event_format(DomainFormat::new())
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    }
}

fn file_layer(is_json: bool, writer: NonBlocking) -> BoxedLayer {
    if is_json {
        fmt::layer()
            .json()
            .fmt_fields(FileFields::default())
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer)
            .boxed()
    } else {
        fmt::layer()
            .event_format(DomainFormat::new())
            .fmt_fields(FileFields::default())
            .with_ansi(false)
            .with_writer(writer)
            .boxed()
    }
}

/// Brings up the global `tracing` subscriber from a loaded
/// [`LoggingConfig`].
///
/// `RUST_LOG`, when set, overrides every directive in `config`. When
/// `config.file` names a path, events are also written there (relative
/// paths resolve against `base_dir`, normally the directory holding the
/// config file that was loaded). The returned [`WorkerGuard`] owns the
/// background thread that flushes the file writer — hold onto it for the
/// life of the process, or buffered lines can be lost on exit.
pub fn init_tracing(config: &LoggingConfig, base_dir: &Path) -> Result<Option<WorkerGuard>> {
    let filter = build_env_filter(config)?;
    let is_json = config.format == LogFormat::Json;

    let mut layers: Vec<BoxedLayer> = vec![stderr_layer(is_json, filter)];
    let mut guard = None;

    if let Some(file_path) = config.file.as_deref() {
        let (writer, file_guard) = open_file_writer(base_dir, file_path)?;
        layers.push(file_layer(is_json, writer));
        guard = Some(file_guard);
    }

    tracing_subscriber::registry().with(layers).init();
    Ok(guard)
}
