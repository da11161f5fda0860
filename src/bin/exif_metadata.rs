// exif_metadata - metadata organ daemon
// Normalization service accessible via Unix Domain Socket, or one-shot with --probe

use anyhow::{Context, Result};
use chrono::FixedOffset;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use exif_metadata::organ::{MetadataOrgan, Organ, Response, Stimulus};
use exif_metadata::pipeline::{process_files, DEFAULT_SNIFF_BYTES};
use exif_metadata::{AssemblerConfig, FallbackExtractor, MetadataAssembler, UnknownContentPolicy};

/// Largest request frame a client may send
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "exif_metadata", version, about = "Photo/video metadata normalization organ")]
struct Args {
    /// Unix socket path for UDS server
    #[arg(long, default_value = "/tmp/exif_metadata.sock")]
    socket_path: String,

    /// Treat content that is neither image nor video as video instead of rejecting it
    #[arg(long)]
    unknown_as_video: bool,

    /// Offset in minutes east of UTC assumed for wall-clock times with no known zone
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    naive_offset_minutes: i32,

    /// Leading bytes read for MIME sniffing
    #[arg(long, default_value_t = DEFAULT_SNIFF_BYTES)]
    sniff_bytes: u64,

    /// Print records for these files as JSON lines and exit instead of serving
    #[arg(long, num_args = 1..)]
    probe: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let naive_offset = naive_offset(args.naive_offset_minutes)?;
    let config = AssemblerConfig {
        unknown_content: if args.unknown_as_video {
            UnknownContentPolicy::TreatAsVideo
        } else {
            UnknownContentPolicy::Reject
        },
        naive_offset,
    };
    let assembler = MetadataAssembler::new(config);
    let extractor = Arc::new(FallbackExtractor::new());

    if !extractor.uses_exiftool() {
        info!("ExifTool not found, falling back to kamadak-exif (EXIF containers only)");
    }

    if !args.probe.is_empty() {
        return probe(&args.probe, extractor.as_ref(), &assembler, args.sniff_bytes);
    }

    info!("Starting exif_metadata daemon");
    info!("   Socket: {}", args.socket_path);

    // Track startup time for health checks
    let start_time = std::time::Instant::now();

    let organ = Arc::new(
        MetadataOrgan::new()
            .with_extractor(extractor)
            .with_assembler(assembler)
            .with_sniff_limit(Some(args.sniff_bytes)),
    );

    // Remove old socket if exists
    let socket_path = PathBuf::from(&args.socket_path);
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)
            .context("Failed to remove old socket")?;
    }

    let listener = UnixListener::bind(&socket_path)
        .context("Failed to bind Unix socket")?;

    info!("   ✓ Listening on {}", args.socket_path);

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let organ = Arc::clone(&organ);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, organ, start_time).await {
                        error!("Connection error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Accept error: {}", e);
            }
        }
    }
}

fn naive_offset(minutes: i32) -> Result<FixedOffset> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .context("--naive-offset-minutes must be within ±24h")
}

/// One-shot mode: one JSON line per file on stdout
fn probe(
    paths: &[PathBuf],
    extractor: &FallbackExtractor,
    assembler: &MetadataAssembler,
    sniff_bytes: u64,
) -> Result<()> {
    let results = process_files(paths, extractor, assembler, Some(sniff_bytes));
    let mut failures = 0;

    for (path, result) in results {
        let line = match result {
            Ok(meta) => serde_json::json!({
                "path": path.to_string_lossy(),
                "ok": true,
                "record": meta.to_record(),
            }),
            Err(e) => {
                failures += 1;
                serde_json::json!({
                    "path": path.to_string_lossy(),
                    "ok": false,
                    "error": e.to_string(),
                })
            }
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    if failures > 0 {
        anyhow::bail!("{} of {} file(s) failed", failures, paths.len());
    }
    Ok(())
}

/// Outcome of reading one length-prefixed frame
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    /// Client closed the connection between frames
    Closed,
    /// Request body of this many bytes now sits at the start of the buffer
    Request(usize),
    /// Announced length exceeds `MAX_FRAME_BYTES`; the body was not read
    TooLarge(usize),
}

async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R, buffer: &mut Vec<u8>) -> std::io::Result<Frame> {
    // Read request length (4 bytes)
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(Frame::Closed),
        Err(e) => return Err(e),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Ok(Frame::TooLarge(len));
    }
    if len > buffer.len() {
        buffer.resize(len, 0);
    }

    reader.read_exact(&mut buffer[..len]).await?;
    Ok(Frame::Request(len))
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, response: &Response) -> Result<()> {
    let response_bytes = serde_json::to_vec(response)
        .context("Failed to serialize response")?;

    // Write response length + body
    let len_bytes = (response_bytes.len() as u32).to_be_bytes();
    writer.write_all(&len_bytes).await?;
    writer.write_all(&response_bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Handle a single UDS connection
async fn handle_connection(
    mut stream: UnixStream,
    organ: Arc<MetadataOrgan>,
    start_time: std::time::Instant,
) -> Result<()> {
    let mut buffer = vec![0u8; 65536]; // 64KB buffer

    loop {
        let len = match read_frame(&mut stream, &mut buffer).await? {
            Frame::Request(len) => len,
            Frame::Closed => {
                debug!("Client disconnected");
                return Ok(());
            }
            Frame::TooLarge(len) => {
                // the body is still in flight, so the connection can't be reused
                warn!("Rejecting {} byte frame (limit {})", len, MAX_FRAME_BYTES);
                write_frame(&mut stream, &too_large(len)).await?;
                return Ok(());
            }
        };

        let stimulus: Stimulus = serde_json::from_slice(&buffer[..len])
            .context("Failed to parse stimulus")?;

        debug!("Received: op={}", stimulus.op);

        // Health checks never reach the organ
        let response = if stimulus.op == "health" || stimulus.op == "health.check" {
            Response {
                ok: true,
                output: serde_json::json!({
                    "status": "healthy",
                    "organ": "exif_metadata",
                    "version": env!("CARGO_PKG_VERSION"),
                    "uptime_ms": start_time.elapsed().as_millis() as u64,
                }),
                latency_ms: 0,
                cost: None,
            }
        } else {
            match organ.stimulate(stimulus).await {
                Ok(resp) => resp,
                Err(e) => {
                    error!("Stimulate error: {}", e);
                    Response {
                        ok: false,
                        output: serde_json::json!({
                            "error": e.to_string()
                        }),
                        latency_ms: 0,
                        cost: None,
                    }
                }
            }
        };

        write_frame(&mut stream, &response).await?;

        debug!("Sent: ok={}, latency={}ms", response.ok, response.latency_ms);
    }
}

fn too_large(len: usize) -> Response {
    Response {
        ok: false,
        output: serde_json::json!({
            "error": "FrameTooLarge",
            "frame_bytes": len,
            "max_frame_bytes": MAX_FRAME_BYTES,
        }),
        latency_ms: 0,
        cost: None,
    }
}
