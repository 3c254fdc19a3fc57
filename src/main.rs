use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use imgpipe::domain::entities::{DEFAULT_LARGE_IMAGE_MB, ImageId, LoadOutcome, RawImage};
use imgpipe::domain::ports::{Clock, KeyValueStore, RequestKind, SystemClock};
use imgpipe::infrastructure::config::{CompressionArgs, ReferenceArgs};
use imgpipe::infrastructure::image::Displayed;
use imgpipe::infrastructure::{
    CliArgs, Command, CompressionEngine, Endpoints, FailureMemory, HttpImageSurface, JsonFileStore,
    MemoryStore, MultipartUploader, PipelineConfig, ProgressiveLoader, ReqwestFetcher,
    RetryingTransport, StorageManager, UploadQueue, UrlResolver, probe_redirect,
};

fn init_logging(config: &PipelineConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = match &config.log_path {
        Some(log_path) => {
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?;

            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(log_path) = &config.log_path {
        info!(path = %log_path.display(), "Logging initialized");
    }

    Ok(())
}

/// Loads configuration with a scoped stderr subscriber, since the global one
/// depends on the configuration being loaded.
fn load_config<W>(args: &CliArgs, make_writer: W) -> Result<PipelineConfig>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(make_writer)
        .with_ansi(false)
        .with_target(false)
        .finish();

    tracing::subscriber::with_default(bootstrap, || -> Result<PipelineConfig> {
        let manager = match &args.config {
            Some(path) => StorageManager::with_dir(
                path.parent().map(Path::to_path_buf).unwrap_or_default(),
            ),
            None => StorageManager::new()?,
        };

        let mut config = manager.load_config(args.config.as_deref())?;
        config.apply_env();
        config.merge_with_args(args);
        config.validate()?;
        Ok(config)
    })
}

/// Wired pipeline components.
struct Pipeline {
    config: PipelineConfig,
    fetcher: ReqwestFetcher,
    failures: Arc<FailureMemory>,
    resolver: Arc<UrlResolver>,
    transport: Arc<RetryingTransport>,
    loader: ProgressiveLoader,
}

impl Pipeline {
    fn build(config: PipelineConfig) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = match config.effective_store_path() {
            Some(path) => Arc::new(JsonFileStore::new(path)),
            None => {
                warn!("No data directory available, failures are kept in memory only");
                Arc::new(MemoryStore::new())
            }
        };
        let failures = Arc::new(FailureMemory::with_capacity(store, config.failures.capacity));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let endpoints = Endpoints::new(
            config.api.base_url.clone(),
            config.api.fallback_url.clone(),
            config.api.cloud_name.clone(),
        );
        let resolver = Arc::new(
            UrlResolver::new(endpoints, failures.clone(), clock.clone())
                .with_delays(config.loader.tier_delays()),
        );

        let fetcher = ReqwestFetcher::new(config.timeouts)?;
        let transport = Arc::new(RetryingTransport::new(
            Arc::new(fetcher.clone()),
            failures.clone(),
            clock,
            config.retry,
        ));
        let loader = ProgressiveLoader::new(resolver.clone());

        Ok(Self {
            config,
            fetcher,
            failures,
            resolver,
            transport,
            loader,
        })
    }

    fn compression_engine(&self, overrides: &CompressionArgs) -> CompressionEngine {
        let mut settings = self.config.compression;
        overrides.apply(&mut settings);
        CompressionEngine::new(settings)
    }

    fn resolve(&self, reference: &ReferenceArgs, chain: bool) {
        let reference = reference.to_reference();
        println!("{}", self.resolver.resolve(&reference));

        if chain {
            match self.resolver.chain(&reference) {
                Ok(chain) => {
                    for tier in chain.tiers() {
                        println!("  {:<4} +{:>4}ms  {}", tier.kind.to_string(), tier.delay.as_millis(), tier.url);
                    }
                }
                Err(reason) => println!("  no chain: {reason}"),
            }
        }
    }

    async fn compress(&self, files: &[std::path::PathBuf], out_dir: &Path, overrides: &CompressionArgs) -> Result<()> {
        let engine = self.compression_engine(overrides);
        let originals = read_images(files).await?;
        let compressed = engine.compress_all(originals.clone()).await;

        tokio::fs::create_dir_all(out_dir)
            .await
            .wrap_err_with(|| format!("failed to create {}", out_dir.display()))?;

        for (original, output) in originals.iter().zip(&compressed) {
            let target = out_dir.join(&output.name);
            tokio::fs::write(&target, &output.bytes)
                .await
                .wrap_err_with(|| format!("failed to write {}", target.display()))?;
            println!(
                "{}: {:.2} MB -> {:.2} MB",
                output.name,
                original.size_mb(),
                output.size_mb()
            );
        }
        Ok(())
    }

    async fn load(&self, reference: &ReferenceArgs, save: Option<&Path>) -> Result<()> {
        let token = install_ctrl_c_handler();
        let surface = HttpImageSurface::new(self.transport.clone());

        let outcome = self
            .loader
            .load(&reference.to_reference(), &surface, Some(&token))
            .await;

        match &outcome {
            LoadOutcome::Loaded { url, attempted } => {
                let tiers: Vec<String> = attempted.iter().map(ToString::to_string).collect();
                println!("loaded {url} via [{}]", tiers.join(", "));
            }
            LoadOutcome::Placeholder { url, reason } => println!("placeholder {url}: {reason}"),
            LoadOutcome::Cancelled => println!("cancelled"),
        }

        if let Some(path) = save {
            match surface.displayed() {
                Displayed::Image { image, .. } => {
                    image
                        .save(path)
                        .wrap_err_with(|| format!("failed to save {}", path.display()))?;
                    info!(path = %path.display(), "Saved image");
                }
                Displayed::Empty | Displayed::Placeholder(_) => {
                    return Err(eyre!("no image was loaded, nothing to save"));
                }
            }
        }
        Ok(())
    }

    async fn upload(&self, files: &[std::path::PathBuf], no_compress: bool, overrides: &CompressionArgs) -> Result<()> {
        let mut images = read_images(files).await?;
        if !no_compress {
            images = self.compression_engine(overrides).compress_all(images).await;
        }
        for image in images.iter().filter(|i| i.exceeds_mb(DEFAULT_LARGE_IMAGE_MB)) {
            warn!(name = %image.name, size_mb = image.size_mb(), "Large image, upload may be slow");
        }

        let uploader = MultipartUploader::new(
            self.fetcher.client().clone(),
            self.resolver.endpoints().upload(),
            self.fetcher.timeouts().for_kind(RequestKind::Upload),
        );
        let queue = UploadQueue::new(Arc::new(uploader), self.config.upload);
        let token = install_ctrl_c_handler();

        let reports = queue.upload_all(&images, Some(&token)).await;
        for report in &reports {
            match &report.result {
                Ok(ids) => {
                    let ids: Vec<&str> = ids.iter().map(ImageId::as_str).collect();
                    println!("{}: stored as {}", report.name, ids.join(", "));
                }
                Err(e) => println!("{}: failed after {} attempt(s): {e}", report.name, report.attempts),
            }
        }

        let failed = reports.iter().filter(|r| !r.is_success()).count();
        if failed > 0 {
            return Err(eyre!("{failed} of {} uploads failed", reports.len()));
        }
        Ok(())
    }

    async fn probe(&self, id: &str) {
        let url = probe_redirect(self.transport.as_ref(), self.resolver.endpoints(), &ImageId::new(id)).await;
        println!("{url}");
    }

    async fn preload(&self, url: &str) -> Result<()> {
        let response = self.transport.preload(url).await?;
        println!("{} ({} bytes)", response.final_url, response.bytes.len());
        Ok(())
    }

    fn list_failures(&self) {
        for url in self.failures.snapshot() {
            println!("{url}");
        }
    }
}

async fn read_images(paths: &[std::path::PathBuf]) -> Result<Vec<RawImage>> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        images.push(read_image(path).await?);
    }
    Ok(images)
}

async fn read_image(path: &Path) -> Result<RawImage> {
    let bytes = tokio::fs::read(path)
        .await
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;

    let modified = tokio::fs::metadata(path)
        .await
        .and_then(|meta| meta.modified())
        .map_or_else(|_| Utc::now(), DateTime::<Utc>::from);

    let name = path
        .file_name()
        .map_or_else(|| "image".to_string(), |n| n.to_string_lossy().into_owned());

    let content_type = image::ImageFormat::from_path(path).map_or_else(
        |_| "application/octet-stream".to_string(),
        |format| format.to_mime_type().to_string(),
    );

    Ok(RawImage::new(name, content_type, modified, bytes))
}

fn install_ctrl_c_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let handler_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, stopping");
            handler_token.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let config = load_config(&args, std::io::stderr)?;

    init_logging(&config)?;

    info!(version = imgpipe::VERSION, "Starting {}", imgpipe::NAME);

    let pipeline = Pipeline::build(config)?;

    match &args.command {
        Command::Resolve { reference, chain } => pipeline.resolve(reference, *chain),
        Command::Compress {
            files,
            out_dir,
            settings,
        } => pipeline.compress(files, out_dir, settings).await?,
        Command::Load { reference, save } => pipeline.load(reference, save.as_deref()).await?,
        Command::Upload {
            files,
            no_compress,
            settings,
        } => pipeline.upload(files, *no_compress, settings).await?,
        Command::Probe { id } => pipeline.probe(id).await,
        Command::Preload { url } => pipeline.preload(url).await?,
        Command::Failures => pipeline.list_failures(),
    }

    Ok(())
}
