//! `s3mp`: resumable multipart uploads from the command line.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use futures::StreamExt;
use s3_multipart::{
    PutObjectInput, S3Client, S3ClientBuilder, S3Config, TransferProgress, UploadMode,
};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Upload large objects to S3-compatible storage, resuming interrupted
/// uploads, and clean up abandoned multipart sessions.
#[derive(Parser, Debug)]
#[command(name = "s3mp", author, version, about, long_about = None)]
struct Cli {
    /// Custom endpoint URL (MinIO, LocalStack, R2, ...)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// AWS region
    #[arg(long, global = true)]
    region: Option<String>,

    /// Use path-style addressing
    #[arg(long, global = true)]
    path_style: bool,

    /// Print results and logs as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file, or stdin with `-`, resuming a previous attempt if one exists
    Put {
        /// Source file, or `-` for stdin
        source: String,

        /// Destination as BUCKET/KEY
        target: String,

        /// Content type (guessed from the file extension when absent)
        #[arg(long)]
        content_type: Option<String>,

        /// Exact number of bytes to upload (required for stdin)
        #[arg(long)]
        size: Option<u64>,
    },

    /// Abort every in-progress upload under BUCKET[/PREFIX]
    Abort {
        /// BUCKET or BUCKET/PREFIX
        target: String,
    },

    /// List in-progress uploads under BUCKET[/PREFIX] with their uploaded sizes
    LsIncomplete {
        /// BUCKET or BUCKET/PREFIX
        target: String,

        /// Descend into "directories" instead of rolling them up
        #[arg(short, long)]
        recursive: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json);

    let client = build_client(&cli)?;

    match cli.command {
        Command::Put {
            ref source,
            ref target,
            ref content_type,
            size,
        } => put(&client, source, target, content_type.clone(), size, cli.json).await,
        Command::Abort { ref target } => abort(&client, target, cli.json).await,
        Command::LsIncomplete {
            ref target,
            recursive,
        } => ls_incomplete(&client, target, recursive, cli.json).await,
    }
}

fn init_logging(verbose: u8, json: bool) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn build_client(cli: &Cli) -> Result<impl S3Client> {
    let mut builder = S3Config::builder().from_env();
    if let Some(region) = &cli.region {
        builder = builder.region(region.clone());
    }
    if let Some(endpoint) = &cli.endpoint {
        builder = builder.endpoint(endpoint.clone())?;
    }
    if cli.path_style {
        builder = builder.path_style(true);
    }

    let config = builder.build().context("invalid configuration")?;
    Ok(S3ClientBuilder::new().config(config).build()?)
}

/// Split `bucket/rest` into the bucket and an optional non-empty remainder.
fn split_target(target: &str) -> Result<(&str, Option<&str>)> {
    let (bucket, rest) = match target.split_once('/') {
        Some((bucket, rest)) => (bucket, Some(rest).filter(|r| !r.is_empty())),
        None => (target, None),
    };
    if bucket.is_empty() {
        bail!("missing bucket in '{}'", target);
    }
    Ok((bucket, rest))
}

async fn put(
    client: &impl S3Client,
    source: &str,
    target: &str,
    content_type: Option<String>,
    size: Option<u64>,
    json: bool,
) -> Result<()> {
    let (bucket, key) = split_target(target)?;
    let key = key.context("destination must be BUCKET/KEY")?;

    let (reader, total_size, guessed): (Box<dyn AsyncRead + Unpin + Send>, u64, String) =
        if source == "-" {
            let size = size.context("--size is required when reading from stdin")?;
            (
                Box::new(tokio::io::stdin()),
                size,
                "application/octet-stream".to_string(),
            )
        } else {
            let file = tokio::fs::File::open(source)
                .await
                .with_context(|| format!("cannot open '{}'", source))?;
            let size = match size {
                Some(size) => size,
                None => file.metadata().await?.len(),
            };
            let guessed = mime_guess::from_path(Path::new(source))
                .first_or_octet_stream()
                .to_string();
            (Box::new(file), size, guessed)
        };

    let input = PutObjectInput::new(bucket, key, total_size)
        .with_content_type(content_type.unwrap_or(guessed));

    let uploader = client.uploader().with_progress(Arc::new(|p: TransferProgress| {
        debug!(
            part = p.current_part,
            total_parts = p.total_parts,
            transferred = p.transferred_bytes,
            total = p.total_bytes,
            percent = p.percentage(),
            "Progress"
        );
    }));

    let outcome = uploader
        .put_object(input, reader)
        .await
        .with_context(|| format!("upload to {}/{} failed", bucket, key))?;

    if json {
        println!("{}", serde_json::to_string(&outcome)?);
    } else {
        let mode = match outcome.mode {
            UploadMode::SinglePut => "single put",
            UploadMode::Multipart => "multipart",
            UploadMode::Resumed => "resumed multipart",
        };
        println!(
            "uploaded {}/{} ({} bytes, {}, {} parts sent, {} reused) etag={}",
            outcome.bucket,
            outcome.key,
            outcome.size,
            mode,
            outcome.parts_uploaded,
            outcome.parts_skipped,
            outcome.e_tag.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn abort(client: &impl S3Client, target: &str, json: bool) -> Result<()> {
    let (bucket, prefix) = split_target(target)?;
    let report = client.cleanup().abort_all(bucket, prefix).await;

    for outcome in &report.outcomes {
        let error = outcome.error.as_ref().map(ToString::to_string);
        if json {
            let line = serde_json::json!({
                "key": outcome.session.key,
                "upload_id": outcome.session.upload_id,
                "aborted": outcome.is_success(),
                "error": error,
            });
            println!("{}", line);
        } else {
            match error {
                None => println!("aborted {} {}", outcome.session.key, outcome.session.upload_id),
                Some(e) => println!("FAILED  {} {}: {}", outcome.session.key, outcome.session.upload_id, e),
            }
        }
    }

    if let Some(e) = &report.listing_error {
        if json {
            println!("{}", serde_json::json!({ "listing_error": e.to_string() }));
        } else {
            println!("listing stopped after {} upload(s): {}", report.attempted(), e);
        }
    }

    let aborted = report.into_result()?;
    if !json {
        println!("{} upload(s) aborted", aborted);
    }
    Ok(())
}

async fn ls_incomplete(client: &impl S3Client, target: &str, recursive: bool, json: bool) -> Result<()> {
    let (bucket, prefix) = split_target(target)?;
    let mut uploads = client
        .cleanup()
        .list_incomplete_uploads(bucket, prefix, recursive);

    while let Some(upload) = uploads.next().await {
        let upload = upload?;
        if json {
            println!("{}", serde_json::to_string(&upload)?);
        } else if upload.is_prefix() {
            println!("{:>12}  PRE {}", "", upload.key);
        } else {
            println!(
                "{:>12}  {} {} {}",
                upload.size,
                upload.initiated.as_deref().unwrap_or("-"),
                upload.key,
                upload.upload_id.as_deref().unwrap_or("")
            );
        }
    }
    Ok(())
}
