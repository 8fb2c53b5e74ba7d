use anyhow::{Context, Result};
use chartforge::server::{self, AppState};
use chartforge::{runtime, OutputFormat, RenderOptions, VERSION};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "chartforge")]
#[command(about = "Resolve chart requests against tabular data and render them", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP chart service
    Serve(ServeArgs),
    /// Render a single request file and write the image to stdout
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct ImageArgs {
    /// Image width in pixels
    #[arg(long, env = "CHARTFORGE_WIDTH", default_value_t = 1000)]
    width: u32,

    /// Image height in pixels
    #[arg(long, env = "CHARTFORGE_HEIGHT", default_value_t = 600)]
    height: u32,

    /// Output image format
    #[arg(long, env = "CHARTFORGE_FORMAT", value_enum, default_value_t = OutputFormat::Png)]
    format: OutputFormat,
}

impl ImageArgs {
    fn options(&self) -> RenderOptions {
        RenderOptions {
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Host address to bind to
    #[arg(long, env = "CHARTFORGE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind to
    #[arg(long, env = "CHARTFORGE_PORT", default_value_t = 8000)]
    port: u16,

    /// CORS allowed origins (comma-separated)
    #[arg(long, env = "CHARTFORGE_CORS_ORIGIN", default_value = "*")]
    cors_origin: String,

    #[command(flatten)]
    image: ImageArgs,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// JSON chart request (same body as POST /generate-chart/)
    request: PathBuf,

    /// CSV file whose rows replace the request's tableData
    #[arg(long)]
    csv: Option<PathBuf>,

    #[command(flatten)]
    image: ImageArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chartforge=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Render(args) => render(args),
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let state = AppState {
        options: args.image.options(),
    };
    let app = server::router(state).layer(server::cors_layer(&args.cors_origin));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid host or port: {}:{}", args.host, args.port))?;

    info!("Starting chartforge server on {}", addr);
    info!("  POST /generate-chart/ - Render a chart");
    info!("  GET  /api/v1/health   - Health check");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn render(args: RenderArgs) -> Result<()> {
    let body = std::fs::read(&args.request)
        .with_context(|| format!("Failed to read request file {}", args.request.display()))?;
    let mut request = runtime::parse_request(&body)?;

    if let Some(csv_path) = &args.csv {
        request.table_data = Some(read_csv_rows(csv_path)?);
    }

    let bytes = runtime::render_chart(&request, &args.image.options())
        .context("Failed to render chart")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(&bytes)
        .context("Failed to write image to stdout")?;
    handle.flush().context("Failed to flush stdout")?;

    Ok(())
}

/// Read a CSV file into `tableData` rows, every cell as a string.
fn read_csv_rows(path: &Path) -> Result<serde_json::Value> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to parse CSV row {}", idx + 1))?;
        rows.push(record.iter().map(|v| v.to_string()).collect());
    }

    Ok(runtime::rows_to_table_data(&headers, &rows))
}
