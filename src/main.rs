use std::io::IsTerminal;
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Parser};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use alu_uart::console::{
    run_interactive, run_monitor, run_self_test, write_json, write_line, OutputFormat, SELF_TEST_GAP,
};
use alu_uart::transport::{self, BoxedStream, SerialSettings, DEFAULT_BAUD_RATE};
use alu_uart::{EmulatedAlu, FrameVariant, Monitor, Result, Session, SessionBuilder, SessionMode};

/// Send commands to the FPGA ALU over its UART and print the results.
#[derive(Parser, Debug)]
#[command(name = "alu-uart", version, about)]
struct Cli {
    /// Serial device. Defaults to the first enumerated port.
    #[arg(short, long, env = "ALU_UART_PORT")]
    port: Option<String>,

    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Frame layout: `a` = [op, a, b], `b` = [0xFF, a, b, op].
    #[arg(long, default_value = "a")]
    variant: FrameVariant,

    /// Delay between bytes of a frame, in milliseconds.
    #[arg(long)]
    pacing_ms: Option<u64>,

    /// Reply deadline in milliseconds.
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Wait after opening the port, in milliseconds.
    #[arg(long)]
    settle_ms: Option<u64>,

    /// `sync` waits for each reply; `monitor` prints raw inbound bytes.
    #[arg(short, long, default_value = "sync")]
    mode: SessionMode,

    /// Keep bytes that arrive between commands instead of dropping them.
    #[arg(long)]
    no_discard_stale: bool,

    /// Print the available serial ports and exit.
    #[arg(long)]
    list_ports: bool,

    /// Talk to an in-process emulated ALU instead of a serial port.
    #[arg(long)]
    emulate: bool,

    /// Run the fixed self-test battery and exit.
    #[arg(long)]
    self_test: bool,

    /// Print one JSON object per result.
    #[arg(long)]
    json: bool,

    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }

    fn session_builder(&self) -> SessionBuilder {
        let mut builder = SessionBuilder::new()
            .variant(self.variant)
            .response_timeout(Duration::from_millis(self.timeout_ms))
            .discard_stale(!self.no_discard_stale);
        if let Some(ms) = self.pacing_ms.filter(|&ms| ms > 0) {
            builder = builder.pacing(Duration::from_millis(ms));
        }
        builder
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn list_ports(format: OutputFormat) -> Result<()> {
    let ports = transport::list_ports()?;
    let mut out = tokio::io::stdout();

    if format == OutputFormat::Json {
        return write_json(&mut out, &ports).await;
    }
    if ports.is_empty() {
        write_line(&mut out, "no serial ports found").await?;
    }
    for port in &ports {
        write_line(&mut out, &format!("{:<20} {}", port.name, port.description)).await?;
    }
    Ok(())
}

async fn open_stream(cli: &Cli) -> Result<(BoxedStream, String)> {
    if cli.emulate {
        let (host, _device) = EmulatedAlu::new(cli.variant).spawn();
        return Ok((Box::new(host), "emulated ALU".to_string()));
    }

    let path = match &cli.port {
        Some(path) => path.clone(),
        None => transport::first_port()?,
    };

    let mut settings = SerialSettings::for_variant(path.clone(), cli.variant).baud_rate(cli.baud);
    if let Some(ms) = cli.settle_ms {
        settings = settings.settle(Duration::from_millis(ms));
    }

    let port = transport::open(&settings).await?;
    Ok((Box::new(port), path))
}

async fn run_sync(cli: &Cli, mut session: Session<BoxedStream>, name: &str) -> Result<ExitCode> {
    let format = cli.format();
    let mut out = tokio::io::stdout();
    let mut code = ExitCode::SUCCESS;

    let outcome = if cli.self_test {
        tokio::select! {
            res = run_self_test(&mut session, &mut out, format, SELF_TEST_GAP) => res.map(|summary| {
                if !summary.all_passed() {
                    code = ExitCode::FAILURE;
                }
            }),
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    } else {
        let interactive = format == OutputFormat::Text && std::io::stdin().is_terminal();
        if interactive {
            write_line(&mut out, &format!("Connected to {}. Type 'help' for operations.", name))
                .await?;
        }

        let input = BufReader::new(tokio::io::stdin());
        tokio::select! {
            res = run_interactive(input, &mut session, &mut out, format, interactive) => res.map(|exit| {
                tracing::debug!("Console ended: {:?}", exit);
            }),
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    };

    // Ctrl-C may have dropped a request mid-frame; close completes it
    // before releasing the stream.
    if let Err(e) = session.close().await {
        tracing::warn!("Error while closing {}: {}", name, e);
    }
    outcome.map(|()| code)
}

async fn run_monitor_mode(cli: &Cli, stream: BoxedStream) -> Result<ExitCode> {
    let config = cli.session_builder().into_config();
    let mut monitor = Monitor::start(stream, &config);
    let mut out = tokio::io::stdout();
    let input = BufReader::new(tokio::io::stdin());

    let outcome = tokio::select! {
        res = run_monitor(input, &mut monitor, &mut out, cli.format()) => res.map(|exit| {
            tracing::debug!("Monitor ended: {:?}", exit);
        }),
        _ = tokio::signal::ctrl_c() => Ok(()),
    };

    if let Err(e) = monitor.shutdown().await {
        tracing::warn!("Monitor writer failed: {}", e);
    }
    outcome.map(|()| ExitCode::SUCCESS)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if cli.list_ports {
        list_ports(cli.format()).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let (stream, name) = open_stream(&cli).await?;
    tracing::info!("Opened {} ({} mode, variant {})", name, cli.mode, cli.variant);

    match cli.mode {
        SessionMode::RequestResponse => {
            let session = cli.session_builder().open(stream);
            run_sync(&cli, session, &name).await
        }
        SessionMode::Monitor => run_monitor_mode(&cli, stream).await,
    }
}

/// How long shutdown waits on a pending stdin read before abandoning it.
const STDIN_RELEASE: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("alu-uart: cannot start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(async {
        match run(cli).await {
            Ok(code) => code,
            Err(e) => {
                tracing::error!("{}", e);
                eprintln!("alu-uart: {}", e);
                ExitCode::FAILURE
            }
        }
    });

    // Stdin is read on the blocking pool and cannot be cancelled.
    runtime.shutdown_timeout(STDIN_RELEASE);
    code
}
