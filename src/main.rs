use chrono::Utc;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use pixgate::application::conversation::ConversationEngine;
use pixgate::application::dispatcher::{JobDispatcher, JobExecutor};
use pixgate::application::entitlements::EntitlementStore;
use pixgate::application::payments::PaymentCorrelator;
use pixgate::config::{ConversationSettings, DispatcherConfig, PaymentSettings, TransformSettings};
use pixgate::domain::ports::{
    EntitlementRepositoryBox, JobStoreRef, SignatureVerifier, TransformerRef, TransportRef,
};
use pixgate::infrastructure::http::{HttpPaymentGateway, HttpTransformer};
use pixgate::infrastructure::in_memory::{InMemoryEntitlementRepository, InMemoryJobStore};
use pixgate::infrastructure::loopback::LoopbackTransformer;
#[cfg(feature = "storage-rocksdb")]
use pixgate::infrastructure::rocksdb::RocksDBStore;
use pixgate::infrastructure::signature::HmacSignatureVerifier;
use pixgate::infrastructure::watermark::{BandWatermarker, DEFAULT_BAND_HEIGHT, DEFAULT_LABEL};
use pixgate::interfaces::console::ConsoleTransport;
use pixgate::interfaces::csv::event_reader::{ScriptEvent, ScriptReader};
use pixgate::interfaces::csv::record_writer::EntitlementWriter;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Replays a script of chat messages and payment webhooks through the gate and
/// prints the outbound messages followed by an entitlement snapshot.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Replay script CSV (`kind,user,text,image,signature`)
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "PIXGATE_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "PIXGATE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Directory delivered images are written to
    #[arg(long, env = "PIXGATE_IMAGE_DIR")]
    image_dir: Option<PathBuf>,

    /// Any message containing this word restarts the conversation
    #[arg(long, env = "PIXGATE_RESET_KEYWORD", default_value = "bosku")]
    reset_keyword: String,

    /// User allowed to send `APPROVE <phone>`
    #[arg(long, env = "PIXGATE_ADMIN")]
    admin: Option<String>,

    /// Contact shown in manual payment instructions
    #[arg(long, env = "PIXGATE_ADMIN_CONTACT", default_value = "6281241000250")]
    admin_contact: String,

    /// Number of job workers
    #[arg(long, env = "PIXGATE_WORKERS", default_value_t = 2)]
    workers: usize,

    /// Delay before the first retry of a failed job, in milliseconds
    #[arg(long, env = "PIXGATE_RETRY_BASE_MS", default_value_t = 2000)]
    retry_base_ms: u64,

    /// Text printed on the band of watermarked trial results
    #[arg(long, env = "PIXGATE_WATERMARK_TEXT", default_value = DEFAULT_LABEL)]
    watermark_text: String,

    /// Transformation provider endpoint; results echo the input when unset
    #[arg(long, env = "PIXGATE_TRANSFORM_URL")]
    transform_url: Option<String>,

    #[arg(long, env = "PIXGATE_TRANSFORM_TOKEN", hide_env_values = true)]
    transform_token: Option<String>,

    #[arg(long, env = "DOKU_API_URL")]
    doku_api_url: Option<String>,

    #[arg(long, env = "DOKU_CLIENT_ID")]
    doku_client_id: Option<String>,

    #[arg(long, env = "DOKU_SECRET_KEY", hide_env_values = true)]
    doku_secret_key: Option<String>,

    #[arg(long, env = "DOKU_CALLBACK_URL")]
    doku_callback_url: Option<String>,

    /// Webhook signing secret; defaults to the DOKU secret key
    #[arg(long, env = "DOKU_WEBHOOK_SECRET", hide_env_values = true)]
    webhook_secret: Option<String>,
}

impl Cli {
    fn payment_settings(&self) -> Option<PaymentSettings> {
        Some(PaymentSettings {
            api_url: self.doku_api_url.clone()?,
            client_id: self.doku_client_id.clone()?,
            secret_key: self.doku_secret_key.clone()?,
            callback_url: self.doku_callback_url.clone(),
            timeout: Duration::from_secs(30),
        })
    }

    fn transform_settings(&self) -> Option<TransformSettings> {
        Some(TransformSettings {
            endpoint: self.transform_url.clone()?,
            token: self.transform_token.clone(),
            timeout: Duration::from_secs(120),
        })
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

fn open_stores(db_path: Option<PathBuf>) -> Result<(EntitlementRepositoryBox, JobStoreRef)> {
    #[cfg(feature = "storage-rocksdb")]
    {
        if let Some(path) = db_path {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            return Ok((Box::new(store.clone()), Arc::new(store)));
        }
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    {
        if db_path.is_some() {
            warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
            );
        }
    }

    Ok((
        Box::new(InMemoryEntitlementRepository::new()),
        Arc::new(InMemoryJobStore::new()),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let (users, jobs) = open_stores(cli.db_path.clone())?;
    let entitlements = Arc::new(EntitlementStore::new(users));
    let transport: TransportRef = Arc::new(ConsoleTransport::stdout(cli.image_dir.clone()));

    let transformer: TransformerRef = match cli.transform_settings() {
        Some(settings) => Arc::new(HttpTransformer::new(settings).into_diagnostic()?),
        None => Arc::new(LoopbackTransformer::new()),
    };

    let settings = ConversationSettings {
        reset_keyword: cli.reset_keyword.clone(),
        admin: cli.admin.clone(),
        admin_contact: cli.admin_contact.clone(),
        ..Default::default()
    };

    let dispatcher = Arc::new(JobDispatcher::start(
        DispatcherConfig {
            workers: cli.workers,
            base_delay: Duration::from_millis(cli.retry_base_ms),
            ..Default::default()
        },
        jobs,
        JobExecutor::new(
            transformer,
            Arc::new(BandWatermarker::new(
                DEFAULT_BAND_HEIGHT,
                cli.watermark_text.clone(),
            )),
            transport.clone(),
            settings.reset_keyword.clone(),
        ),
    ));
    let recovered = dispatcher.recover().await.into_diagnostic()?;
    if recovered > 0 {
        info!(recovered, "resuming unfinished jobs");
    }

    let verifier = cli
        .webhook_secret
        .clone()
        .or_else(|| cli.doku_secret_key.clone())
        .map(|secret| Arc::new(HmacSignatureVerifier::new(secret)) as Arc<dyn SignatureVerifier>);
    let (notice_sender, mut notices) = mpsc::unbounded_channel();
    let correlator = Arc::new(PaymentCorrelator::new(
        entitlements.clone(),
        verifier,
        notice_sender,
    ));

    let mut engine = ConversationEngine::new(
        entitlements.clone(),
        transport,
        dispatcher.clone(),
        settings,
    )
    .with_admin_approvals(correlator.clone());
    if let Some(payment) = cli.payment_settings() {
        engine = engine.with_payment_gateway(Arc::new(
            HttpPaymentGateway::new(payment).into_diagnostic()?,
        ));
    }

    let base_dir = cli
        .input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let file = File::open(&cli.input).into_diagnostic()?;

    for (row, record) in ScriptReader::new(file).records().enumerate() {
        let event = match record.and_then(|record| record.into_event(&base_dir)) {
            Ok(event) => event,
            Err(e) => {
                warn!(row = row + 1, error = %e, "skipping script row");
                continue;
            }
        };

        match event {
            ScriptEvent::Message(event) => {
                if let Err(e) = engine.handle(event).await {
                    warn!(row = row + 1, error = %e, "message failed");
                }
            }
            ScriptEvent::Webhook { body, signature } => {
                match correlator.handle_webhook(&body, &signature).await {
                    Ok(outcome) => info!(row = row + 1, %outcome, "webhook processed"),
                    Err(e) => warn!(row = row + 1, error = %e, "webhook rejected"),
                }
            }
        }

        while let Ok(notice) = notices.try_recv() {
            if let Err(e) = engine.deliver_payment_notice(notice).await {
                warn!(error = %e, "payment notice not delivered");
            }
        }
    }

    dispatcher.shutdown().await;

    let records = entitlements.all().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = EntitlementWriter::new(stdout.lock());
    writer
        .write_records(&records, Utc::now())
        .into_diagnostic()?;

    Ok(())
}
