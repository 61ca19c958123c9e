//! CLI binary for cloud-ocr-task.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `TaskRequest` plus `RunOptions` and prints the resulting record.

use anyhow::{Context, Result};
use clap::Parser;
use cloud_ocr_task::{
    process_text_field_with, ExportFormat, LocationId, MarkingType, PollPolicy, ProxySettings,
    Region, RunOptions, TaskObserver, TaskRequest, TaskStatus, TextType, WritingStyle,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner whose message tracks the task status.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Submitting");
        bar.set_message("uploading source…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl TaskObserver for CliObserver {
    fn on_submitted(&self, task_id: &str) {
        self.bar.set_prefix("Polling");
        self.bar.set_message(format!("task {}", dim(task_id)));
    }

    fn on_status(&self, task_id: &str, status: TaskStatus) {
        self.bar.set_message(format!("task {}  {status}", dim(task_id)));
    }

    fn on_poll_error(&self, _task_id: &str, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!("  {} {}", red("✗"), red(&msg)));
    }

    fn on_result_validated(&self, _task_id: &str, content_len: usize) {
        self.bar.set_prefix("Validated");
        self.bar.set_message(format!("{content_len} bytes"));
    }

    fn on_complete(&self, task_id: Option<&str>, succeeded: bool) {
        self.bar.finish_and_clear();
        let id = task_id.unwrap_or("-");
        if succeeded {
            eprintln!("{} task {} completed", green("✔"), bold(id));
        } else {
            eprintln!("{} task {} did not succeed", red("✘"), bold(id));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Recognise a hand-printed field, print the XML
  cloud-ocr --text-type handprinted zip.png

  # Digits only, comb field with 5 cells, save to file
  cloud-ocr --letter-set 0123456789 --marking-type simpleComb \
            --placeholders-count 5 zip.png -o zip.xml

  # Plain text result from a remote image, US data centre
  cloud-ocr --export-format txt --location cloud-westus https://host/field.png

  # Full record as JSON (exit code 1 when the task did not succeed)
  cloud-ocr --json field.png

ENVIRONMENT VARIABLES:
  CLOUD_OCR_APPLICATION_ID  Application id (Basic auth user)
  CLOUD_OCR_PASSWORD        Application password
  CLOUD_OCR_LOCATION        cloud-eu (default) or cloud-westus
  CLOUD_OCR_BASE_URL        Override the service root URL
  RUST_LOG                  tracing filter, e.g. cloud_ocr_task=debug
"#;

/// Recognise a single text field with a cloud OCR service.
#[derive(Parser, Debug)]
#[command(
    name = "cloud-ocr",
    version,
    about = "Submit a text-field OCR task, wait for it and fetch the validated result",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image/PDF path or HTTP/HTTPS URL.
    source: String,

    /// Write the validated result to this file.
    #[arg(short, long, env = "CLOUD_OCR_OUTPUT")]
    output: Option<PathBuf>,

    /// Application id.
    #[arg(long, env = "CLOUD_OCR_APPLICATION_ID", hide_env_values = true)]
    application_id: String,

    /// Application password.
    #[arg(long, env = "CLOUD_OCR_PASSWORD", hide_env_values = true, default_value = "")]
    password: String,

    /// Service location: cloud-eu or cloud-westus.
    #[arg(long, env = "CLOUD_OCR_LOCATION", default_value = "cloud-eu")]
    location: LocationId,

    /// Service root URL (overrides --location).
    #[arg(long, env = "CLOUD_OCR_BASE_URL")]
    base_url: Option<String>,

    /// Result format: xml or txt.
    #[arg(long, env = "CLOUD_OCR_EXPORT_FORMAT", default_value = "xml")]
    export_format: ExportFormat,

    /// Character set of the written file (utf-8, utf-16le, windows-1252, …).
    #[arg(long, env = "CLOUD_OCR_CHARSET", default_value = "utf-8")]
    charset: String,

    // ── Field parameters ─────────────────────────────────────────────────
    /// Field rectangle as left,top,right,bottom.
    #[arg(long)]
    region: Option<Region>,

    /// Recognition languages, comma separated.
    #[arg(long, value_delimiter = ',', default_value = "English")]
    language: Vec<String>,

    /// Characters the field may contain.
    #[arg(long)]
    letter_set: Option<String>,

    /// Regular expression the field value matches.
    #[arg(long)]
    reg_exp: Option<String>,

    /// normal, typewriter, matrix, index, handprinted, ocrA, ocrB, e13b, cmc7, gothic.
    #[arg(long)]
    text_type: Option<TextType>,

    /// The field holds a single line of text.
    #[arg(long)]
    one_text_line: bool,

    /// Each line holds a single word.
    #[arg(long)]
    one_word_per_text_line: bool,

    /// simpleText, underlinedText, textInFrame, greyBoxes, charBoxSeries, simpleComb, …
    #[arg(long)]
    marking_type: Option<MarkingType>,

    /// Number of character cells (cell-based marking types only).
    #[arg(long, default_value_t = 1)]
    placeholders_count: u32,

    /// Handwriting convention, e.g. american, german.
    #[arg(long)]
    writing_style: Option<WritingStyle>,

    /// Free-form task description stored by the service.
    #[arg(long)]
    description: Option<String>,

    /// Password for an encrypted PDF source.
    #[arg(long, env = "CLOUD_OCR_PDF_PASSWORD", hide_env_values = true)]
    pdf_password: Option<String>,

    // ── Polling & validation ─────────────────────────────────────────────
    /// Seconds between status queries.
    #[arg(long, env = "CLOUD_OCR_POLL_INTERVAL", default_value_t = 2)]
    poll_interval: u64,

    /// Give up waiting after this many seconds.
    #[arg(long, env = "CLOUD_OCR_TIMEOUT", default_value_t = 600)]
    timeout: u64,

    /// JSON schema file replacing the built-in result schema.
    #[arg(long)]
    schema: Option<PathBuf>,

    // ── Transport ────────────────────────────────────────────────────────
    /// TCP connect timeout in seconds (0 = none).
    #[arg(long, env = "CLOUD_OCR_CONNECT_TIMEOUT", default_value_t = 10)]
    connect_timeout: u64,

    /// Per-request timeout in seconds (0 = none).
    #[arg(long, env = "CLOUD_OCR_SOCKET_TIMEOUT", default_value_t = 60)]
    socket_timeout: u64,

    /// Disable TCP keep-alive.
    #[arg(long)]
    no_keep_alive: bool,

    /// Idle pooled connections per host.
    #[arg(long, default_value_t = 2)]
    connections_max_per_route: usize,

    /// Proxy host.
    #[arg(long, env = "CLOUD_OCR_PROXY_HOST")]
    proxy_host: Option<String>,

    /// Proxy port.
    #[arg(long, env = "CLOUD_OCR_PROXY_PORT", default_value_t = 8080)]
    proxy_port: u16,

    /// Proxy user name.
    #[arg(long, env = "CLOUD_OCR_PROXY_USERNAME")]
    proxy_username: Option<String>,

    /// Proxy password.
    #[arg(long, env = "CLOUD_OCR_PROXY_PASSWORD", hide_env_values = true)]
    proxy_password: Option<String>,

    /// Accept any server certificate (testing only).
    #[arg(long)]
    trust_all_roots: bool,

    /// PEM bundle of additional trusted root certificates.
    #[arg(long, env = "CLOUD_OCR_TRUST_BUNDLE")]
    trust_bundle: Option<PathBuf>,

    // ── Output ───────────────────────────────────────────────────────────
    /// Print the full record as JSON instead of the content.
    #[arg(long)]
    json: bool,

    /// Disable the spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build request ────────────────────────────────────────────────────
    let request = build_request(&cli)?;
    let options = RunOptions {
        poll: PollPolicy {
            interval: Duration::from_secs(cli.poll_interval.max(1)),
            timeout: Duration::from_secs(cli.timeout),
        },
        schema_path: cli.schema.clone(),
        observer: show_progress.then(|| CliObserver::new() as Arc<dyn TaskObserver>),
        ..RunOptions::default()
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let record = process_text_field_with(&request, &options)
        .await
        .context("Task could not be started")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&record.to_output_map())
            .context("Failed to serialise record")?;
        println!("{json}");
    } else if record.succeeded() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(record.content().as_bytes())
            .context("Failed to write to stdout")?;
        if !record.content().ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !record.succeeded() && !cli.json && !cli.quiet {
        match record.error() {
            Some(e) => eprintln!("{} {}", red("error:"), e),
            None if record.is_timed_out() => eprintln!(
                "{} task {} still running after {}s",
                red("timeout:"),
                record.task_id().unwrap_or("-"),
                cli.timeout
            ),
            None => {}
        }
    }
    if let (Some(path), false) = (record.destination_path(), cli.quiet) {
        eprintln!("   → {}", bold(&path.display().to_string()));
    }

    Ok(if record.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Map CLI args to `TaskRequest`.
fn build_request(cli: &Cli) -> Result<TaskRequest> {
    let mut builder = TaskRequest::builder()
        .source(&cli.source)
        .application_id(&cli.application_id)
        .password(&cli.password)
        .location(cli.location)
        .export_format(cli.export_format)
        .response_charset(&cli.charset)
        .languages(cli.language.iter().cloned())
        .one_text_line(cli.one_text_line)
        .one_word_per_text_line(cli.one_word_per_text_line)
        .placeholders_count(cli.placeholders_count)
        .connect_timeout_secs(cli.connect_timeout)
        .socket_timeout_secs(cli.socket_timeout)
        .keep_alive(!cli.no_keep_alive)
        .connections_max_per_route(cli.connections_max_per_route)
        .trust_all_roots(cli.trust_all_roots);

    if let Some(ref out) = cli.output {
        builder = builder.destination(out);
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url);
    }
    if let Some(region) = cli.region {
        builder = builder.region(region);
    }
    if let Some(ref s) = cli.letter_set {
        builder = builder.letter_set(s);
    }
    if let Some(ref s) = cli.reg_exp {
        builder = builder.reg_exp(s);
    }
    if let Some(t) = cli.text_type {
        builder = builder.text_type(t);
    }
    if let Some(m) = cli.marking_type {
        builder = builder.marking_type(m);
    }
    if let Some(w) = cli.writing_style {
        builder = builder.writing_style(w);
    }
    if let Some(ref d) = cli.description {
        builder = builder.description(d);
    }
    if let Some(ref p) = cli.pdf_password {
        builder = builder.pdf_password(p);
    }
    if let Some(ref bundle) = cli.trust_bundle {
        builder = builder.trust_bundle(bundle);
    }
    if let Some(ref host) = cli.proxy_host {
        builder = builder.proxy(ProxySettings {
            host: host.clone(),
            port: cli.proxy_port,
            username: cli.proxy_username.clone(),
            password: cli.proxy_password.clone(),
        });
    }

    builder.build().context("Invalid request")
}
