#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use pixgate::application::conversation::ConversationEngine;
use pixgate::application::entitlements::EntitlementStore;
use pixgate::config::ConversationSettings;
use pixgate::domain::job::Job;
use pixgate::domain::package::Package;
use pixgate::domain::payment::{Amount, Customer, OrderId, PendingPayment};
use pixgate::domain::entitlement::UserRecord;
use pixgate::domain::ports::{
    EntitlementRepository, EntitlementRepositoryBox, JobQueue, PaymentGateway, Transformer,
    Transport,
};
use pixgate::domain::service::Service;
use pixgate::domain::user::UserId;
use pixgate::error::{GateError, Result};
use pixgate::infrastructure::in_memory::InMemoryEntitlementRepository;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const USER: &str = "628111@c.us";

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        user: UserId,
        text: String,
    },
    Image {
        user: UserId,
        image: Vec<u8>,
        caption: String,
    },
}

/// Keeps every outbound message in order.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_for(&self, user: &UserId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text { user: to, text } if &to == user => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn images_for(&self, user: &UserId) -> Vec<(Vec<u8>, String)> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Image {
                    user: to,
                    image,
                    caption,
                } if &to == user => Some((image, caption)),
                _ => None,
            })
            .collect()
    }

    pub fn last_text(&self, user: &UserId) -> Option<String> {
        self.texts_for(user).pop()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, user: &UserId, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Text {
            user: user.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_image(&self, user: &UserId, image: &[u8], caption: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Image {
            user: user.clone(),
            image: image.to_vec(),
            caption: caption.to_string(),
        });
        Ok(())
    }
}

/// Collects submitted jobs instead of running them.
#[derive(Default)]
pub struct RecordingQueue {
    jobs: Mutex<Vec<Job>>,
    refuse: bool,
}

impl RecordingQueue {
    pub fn refusing() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            refuse: true,
        }
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn submit(&self, job: Job) -> Result<()> {
        if self.refuse {
            return Err(GateError::QueueClosed);
        }
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

/// Echoes the primary image after failing a configured number of calls.
#[derive(Default)]
pub struct ScriptedTransformer {
    failures: usize,
    calls: AtomicUsize,
}

impl ScriptedTransformer {
    pub fn failing(times: usize) -> Self {
        Self {
            failures: times,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transformer for ScriptedTransformer {
    async fn transform(
        &self,
        _service: Service,
        primary: &[u8],
        _secondary: Option<&[u8]>,
        _description: Option<&str>,
    ) -> Result<Vec<u8>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(GateError::Transform(format!("simulated outage {}", call + 1)));
        }
        Ok(primary.to_vec())
    }
}

/// Payment gateway answering with a fixed link, or failing.
pub struct StaticGateway {
    link: Option<String>,
    requests: Mutex<Vec<(OrderId, Amount, Customer)>>,
}

impl StaticGateway {
    pub fn with_link(link: &str) -> Self {
        Self {
            link: Some(link.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            link: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(OrderId, Amount, Customer)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for StaticGateway {
    async fn create_payment_link(
        &self,
        order_id: &OrderId,
        amount: &Amount,
        customer: &Customer,
    ) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((order_id.clone(), *amount, customer.clone()));
        self.link
            .clone()
            .ok_or_else(|| GateError::PaymentProvider("connection refused".to_string()))
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([180, 140, 90])))
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

pub fn entitlement_store() -> Arc<EntitlementStore> {
    Arc::new(EntitlementStore::new(Box::new(
        InMemoryEntitlementRepository::new(),
    )))
}

/// In-memory entitlements whose writes fail while the switch is on.
pub struct FailingWrites {
    inner: InMemoryEntitlementRepository,
    failing: Arc<AtomicBool>,
}

impl FailingWrites {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let failing = Arc::new(AtomicBool::new(false));
        let repository = Self {
            inner: InMemoryEntitlementRepository::new(),
            failing: failing.clone(),
        };
        (repository, failing)
    }
}

#[async_trait]
impl EntitlementRepository for FailingWrites {
    async fn store(&self, record: UserRecord) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GateError::Persistence("disk full".to_string()));
        }
        self.inner.store(record).await
    }

    async fn get(&self, user: &UserId) -> Result<Option<UserRecord>> {
        self.inner.get(user).await
    }

    async fn get_all(&self) -> Result<Vec<UserRecord>> {
        self.inner.get_all().await
    }
}

/// Gives `user` an active package through the regular settlement path.
pub async fn grant(store: &EntitlementStore, user: &UserId, package: Package) {
    let order = OrderId::generate(user, chrono::Utc::now()).unwrap();
    store
        .set_pending_payment(
            user,
            PendingPayment::new(
                order.clone(),
                package,
                Amount::new(package.price()).unwrap(),
                chrono::Utc::now(),
            ),
        )
        .await
        .unwrap();
    store.settle_payment_success(user, &order).await.unwrap();
}

pub async fn use_up_trials(store: &EntitlementStore, user: &UserId) {
    while store.has_trial_available(user).await.unwrap() {
        store.consume_trial(user).await.unwrap();
    }
}

/// A conversation engine wired to recording fakes.
pub struct Harness {
    pub engine: ConversationEngine,
    pub entitlements: Arc<EntitlementStore>,
    pub transport: Arc<RecordingTransport>,
    pub queue: Arc<RecordingQueue>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_queue(RecordingQueue::default())
    }

    pub fn with_queue(queue: RecordingQueue) -> Self {
        Self::with_parts(queue, Box::new(InMemoryEntitlementRepository::new()))
    }

    pub fn with_repository(repository: EntitlementRepositoryBox) -> Self {
        Self::with_parts(RecordingQueue::default(), repository)
    }

    fn with_parts(queue: RecordingQueue, repository: EntitlementRepositoryBox) -> Self {
        let entitlements = Arc::new(EntitlementStore::new(repository));
        let transport = Arc::new(RecordingTransport::default());
        let queue = Arc::new(queue);
        let engine = ConversationEngine::new(
            entitlements.clone(),
            transport.clone(),
            queue.clone(),
            ConversationSettings::default(),
        );
        Self {
            engine,
            entitlements,
            transport,
            queue,
        }
    }

    pub fn with_gateway(gateway: Arc<StaticGateway>) -> Self {
        let mut harness = Self::new();
        harness.engine = harness.engine.with_payment_gateway(gateway);
        harness
    }

    pub async fn say(&self, user: &UserId, text: &str) {
        self.engine
            .handle(pixgate::domain::conversation::InboundEvent::text(
                user.clone(),
                text,
            ))
            .await
            .unwrap();
    }

    pub async fn upload(&self, user: &UserId, image: Vec<u8>) {
        self.engine
            .handle(pixgate::domain::conversation::InboundEvent::image(
                user.clone(),
                image,
            ))
            .await
            .unwrap();
    }
}
