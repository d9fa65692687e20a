use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upload_progress::utils::validation::guess_content_type;
use upload_progress::{
    FilePayload, MainLoop, ProgressError, ProgressListener, ProgressMode, Reporter, UploadConfig,
    Uploader,
};

#[derive(Parser)]
#[command(name = "upload-progress", about = "Upload a file and watch its progress")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a file to the configured endpoint
    Upload {
        file: PathBuf,
        /// Content type of the file; guessed from the extension when omitted
        #[arg(long)]
        content_type: Option<String>,
        /// Base URL of the upload API (overrides UPLOAD_BASE_URL)
        #[arg(long)]
        url: Option<String>,
        /// Report progress one chunk behind, never reaching 100%
        #[arg(long)]
        legacy: bool,
        /// Bytes per read
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Upload the file in place instead of a staged snapshot
        #[arg(long)]
        no_stage: bool,
    },
    /// Print the content length a payload for FILE would declare
    Size { file: PathBuf },
}

/// Renders progress on stderr.
struct TerminalListener;

impl ProgressListener for TerminalListener {
    fn on_progress_update(&self, percentage: u8) {
        eprint!("\r⬆️  Uploading... {:>3}%", percentage);
    }

    fn on_error(&self, error: &ProgressError) {
        eprintln!();
        error!("❌ Upload interrupted: {}", error);
    }
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "upload_progress=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new()?;

    match cli.command {
        Command::Size { file } => {
            let payload = FilePayload::new(file.clone(), guess_content_type(&file))?;
            let length = runtime.block_on(payload.content_length())?;
            println!("{}\t{}\t{}", file.display(), length, payload.content_type());
        }
        Command::Upload {
            file,
            content_type,
            url,
            legacy,
            chunk_size,
            no_stage,
        } => {
            let mut config = UploadConfig::from_env();
            if let Some(url) = url {
                config.base_url = url;
            }
            if legacy {
                config.progress_mode = ProgressMode::Legacy;
                config.progress_interval = Duration::ZERO;
            }
            if let Some(chunk_size) = chunk_size.filter(|&size| size > 0) {
                config.chunk_size = chunk_size;
            }
            let content_type =
                content_type.unwrap_or_else(|| guess_content_type(&file).to_string());

            info!(
                "🚀 Uploading {} as {} (chunk={}B, progress={})",
                file.display(),
                content_type,
                config.chunk_size,
                config.progress_mode
            );

            let uploader = Uploader::new(config)?;
            let (handle, main_loop) = MainLoop::new();
            let reporter = Reporter::new(Arc::new(TerminalListener), Arc::new(handle));

            let upload = runtime.spawn(async move {
                if no_stage {
                    uploader
                        .upload_file(&file, &content_type, Some(reporter))
                        .await
                } else {
                    uploader
                        .upload_staged(&file, &content_type, Some(reporter))
                        .await
                }
            });

            // This thread plays the UI thread until the upload drops its handle.
            let delivered = main_loop.run_blocking();
            eprintln!();

            let reply = runtime.block_on(upload)??;
            info!(
                "✅ {} ({} notifications delivered)",
                reply.message, delivered
            );
            for item in &reply.data {
                println!("{}", item.url);
            }
        }
    }

    Ok(())
}
