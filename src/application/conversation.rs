use super::entitlements::EntitlementStore;
use super::messages;
use super::payments::{PaymentCorrelator, PaymentNotice};
use crate::config::ConversationSettings;
use crate::domain::conversation::{InboundEvent, Phase};
use crate::domain::entitlement::Consumption;
use crate::domain::job::{ImageBytes, Job};
use crate::domain::package::Package;
use crate::domain::payment::{Amount, Customer, OrderId, PendingPayment};
use crate::domain::ports::{JobQueueRef, PaymentGatewayRef, TransportRef};
use crate::domain::service::Service;
use crate::domain::user::UserId;
use crate::error::{GateError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Per-user conversation state machine.
///
/// Interprets inbound text and image events, checks entitlements, accepts
/// transformation jobs and turns payment notices into user messages. The phase
/// map lives only in memory; after a restart users simply repeat their last step.
pub struct ConversationEngine {
    entitlements: Arc<EntitlementStore>,
    transport: TransportRef,
    jobs: JobQueueRef,
    payments: Option<PaymentGatewayRef>,
    correlator: Option<Arc<PaymentCorrelator>>,
    settings: ConversationSettings,
    phases: Mutex<HashMap<UserId, Phase>>,
}

impl ConversationEngine {
    pub fn new(
        entitlements: Arc<EntitlementStore>,
        transport: TransportRef,
        jobs: JobQueueRef,
        settings: ConversationSettings,
    ) -> Self {
        Self {
            entitlements,
            transport,
            jobs,
            payments: None,
            correlator: None,
            settings,
            phases: Mutex::new(HashMap::new()),
        }
    }

    /// Enables payment links. Without a gateway every package request gets
    /// manual payment instructions.
    pub fn with_payment_gateway(mut self, gateway: PaymentGatewayRef) -> Self {
        self.payments = Some(gateway);
        self
    }

    /// Enables the admin `APPROVE <phone>` command.
    pub fn with_admin_approvals(mut self, correlator: Arc<PaymentCorrelator>) -> Self {
        self.correlator = Some(correlator);
        self
    }

    /// Current phase of a user, `None` while idle.
    pub async fn phase(&self, user: &UserId) -> Option<Phase> {
        self.phases.lock().await.get(user).cloned()
    }

    /// Handles one inbound event.
    ///
    /// Failures other than transport failures are answered with a "try again"
    /// message before being returned to the caller.
    pub async fn handle(&self, event: InboundEvent) -> Result<()> {
        let user = event.user.clone();
        let outcome = self.route(event).await;
        if let Err(e) = &outcome {
            error!(%user, error = %e, "message handling failed");
            if !matches!(e, GateError::Transport(_))
                && let Err(send_error) = self.send(&user, messages::TRY_AGAIN).await
            {
                warn!(%user, error = %send_error, "could not report failure to user");
            }
        }
        outcome
    }

    async fn route(&self, event: InboundEvent) -> Result<()> {
        let InboundEvent { user, text, image } = event;
        let text = text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty());

        if let Some(text) = text {
            if let Some(target) = self.approval_target(&user, text) {
                return self.approve(&user, &target).await;
            }
            if text
                .to_lowercase()
                .contains(&self.settings.reset_keyword.to_lowercase())
            {
                return self.reset(&user).await;
            }
            if text.eq_ignore_ascii_case(&self.settings.menu_keyword) {
                return self.send_menu(&user).await;
            }
        }

        let Some(phase) = self.phase(&user).await else {
            debug!(%user, "message from idle user ignored");
            return Ok(());
        };

        match (phase, text, image) {
            (Phase::Main, Some(text), _) => self.main_menu(&user, text).await,
            (Phase::AwaitingDescription { service }, Some(text), None) => {
                self.set_phase(
                    &user,
                    Phase::AwaitingImage {
                        service,
                        description: Some(text.to_string()),
                    },
                )
                .await;
                self.send(&user, messages::image_prompt_after_description(service))
                    .await
            }
            (Phase::AwaitingImage { service, description }, _, Some(image)) => {
                if service.is_multi_image() {
                    self.set_phase(
                        &user,
                        Phase::AwaitingSecondImage {
                            service,
                            description,
                            first_image: image,
                        },
                    )
                    .await;
                    self.send(&user, messages::FIRST_IMAGE_RECEIVED).await
                } else {
                    self.submit(&user, service, image, None, description).await
                }
            }
            (
                Phase::AwaitingSecondImage {
                    service,
                    description,
                    first_image,
                },
                _,
                Some(image),
            ) => {
                self.submit(&user, service, first_image, Some(image), description)
                    .await
            }
            (phase, ..) => {
                debug!(%user, phase = phase.name(), "message does not fit the current phase");
                Ok(())
            }
        }
    }

    fn approval_target(&self, user: &UserId, text: &str) -> Option<UserId> {
        self.correlator.as_ref()?;
        let admin = self.settings.admin.as_deref()?;
        if admin != user.as_str() && admin != user.phone() {
            return None;
        }
        let mut words = text.split_whitespace();
        if !words.next()?.eq_ignore_ascii_case("APPROVE") {
            return None;
        }
        let target = words.next()?;
        Some(if target.contains('@') {
            UserId::new(target)
        } else {
            UserId::from_phone(target)
        })
    }

    async fn approve(&self, admin: &UserId, target: &UserId) -> Result<()> {
        let Some(correlator) = &self.correlator else {
            return Ok(());
        };
        let outcome = correlator.approve_pending(target).await?;
        info!(%admin, user = %target, %outcome, "admin approval");
        self.send(
            admin,
            &messages::approval_result(target.as_str(), &outcome.to_string()),
        )
        .await
    }

    async fn reset(&self, user: &UserId) -> Result<()> {
        self.set_phase(user, Phase::Main).await;
        self.send(user, messages::WELCOME).await?;
        self.send_menu(user).await
    }

    async fn send_menu(&self, user: &UserId) -> Result<()> {
        let record = self.entitlements.record(user).await?;
        if record.has_trial_available() || record.has_quota(Utc::now()) {
            self.send(user, &messages::menu(record.remaining_trials()))
                .await
        } else {
            self.send(user, &messages::subscription_offer()).await
        }
    }

    async fn main_menu(&self, user: &UserId, text: &str) -> Result<()> {
        if let Some(service) = Service::from_menu_choice(text) {
            return self.select_service(user, service).await;
        }
        if let Some(package) = Package::from_keyword(text) {
            return self.request_package(user, package).await;
        }
        debug!(%user, "invalid selection");
        self.send(user, messages::INVALID_SELECTION).await
    }

    async fn select_service(&self, user: &UserId, service: Service) -> Result<()> {
        let record = self.entitlements.record(user).await?;
        match record.allowance_for(service, Utc::now()) {
            Ok(_) => {
                let prompt = if service.requires_description() {
                    messages::description_prompt(service)
                } else {
                    messages::upload_prompt(service)
                };
                self.set_phase(user, Phase::after_selection(service)).await;
                self.send(user, &prompt).await
            }
            Err(e) if e.is_entitlement_denial() => {
                info!(%user, %service, reason = %e, "selection denied");
                self.deny(user, &e).await
            }
            Err(e) => Err(e),
        }
    }

    async fn request_package(&self, user: &UserId, package: Package) -> Result<()> {
        let now = Utc::now();
        if let Some(pending) = self.entitlements.pending_payment(user).await? {
            return self
                .send(user, &messages::payment_already_pending(&pending.order_id))
                .await;
        }

        let order_id = match OrderId::generate(user, now) {
            Ok(order_id) => order_id,
            Err(e) => {
                warn!(%user, error = %e, "cannot create an order id");
                return self
                    .send(user, &messages::order_unavailable(&self.settings.admin_contact))
                    .await;
            }
        };
        let amount = Amount::new(package.price())?;

        let link = match &self.payments {
            Some(gateway) => match gateway
                .create_payment_link(&order_id, &amount, &Customer::for_user(user))
                .await
            {
                Ok(link) => Some(link),
                Err(e) => {
                    warn!(%user, %order_id, error = %e, "payment link unavailable, falling back to manual payment");
                    None
                }
            },
            None => None,
        };

        let pending = PendingPayment::new(order_id.clone(), package, amount, now);
        match self.entitlements.set_pending_payment(user, pending).await {
            Ok(()) => {}
            Err(GateError::PaymentAlreadyPending(existing)) => {
                return self
                    .send(user, &messages::payment_already_pending(&existing))
                    .await;
            }
            Err(e) => return Err(e),
        }

        let reply = match link {
            Some(link) => messages::payment_prompt(package, &amount, &link),
            None => messages::manual_payment(
                package,
                &amount,
                &order_id,
                &self.settings.admin_contact,
            ),
        };
        self.send(user, &reply).await
    }

    async fn submit(
        &self,
        user: &UserId,
        service: Service,
        primary: ImageBytes,
        secondary: Option<ImageBytes>,
        description: Option<String>,
    ) -> Result<()> {
        let consumption = match self.entitlements.consume_for(user, service).await {
            Ok(consumption) => consumption,
            Err(e) if e.is_entitlement_denial() => {
                info!(%user, %service, reason = %e, "job refused");
                self.clear_phase(user).await;
                return self.deny(user, &e).await;
            }
            Err(e) => return Err(e),
        };

        let job = Job::new(
            user.clone(),
            service,
            primary,
            secondary,
            description,
            consumption == Consumption::Trial,
        );
        let correlation_id = job.correlation_id;
        let job_id = job.job_id;
        self.clear_phase(user).await;

        if let Err(e) = self.jobs.submit(job).await {
            error!(%user, %job_id, %correlation_id, error = %e, "job not accepted by the queue");
            self.entitlements
                .restore_allowance(user, consumption)
                .await?;
            return self
                .send(user, &messages::queue_unavailable(correlation_id))
                .await;
        }

        info!(%user, %service, %job_id, %correlation_id, ?consumption, "job accepted");
        self.send(user, messages::JOB_ACCEPTED).await
    }

    async fn deny(&self, user: &UserId, reason: &GateError) -> Result<()> {
        match reason {
            GateError::FeatureNotInPackage(service) => {
                self.send(user, &messages::feature_not_in_package(*service))
                    .await?;
            }
            GateError::QuotaExceeded => {
                if self.entitlements.record(user).await?.package.is_some() {
                    self.send(user, messages::QUOTA_EXHAUSTED).await?;
                }
            }
            _ => {}
        }
        self.send(user, &messages::subscription_offer()).await
    }

    /// Tells the user how a payment ended.
    pub async fn deliver_payment_notice(&self, notice: PaymentNotice) -> Result<()> {
        match notice {
            PaymentNotice::Succeeded {
                user,
                package,
                order_id,
            } => {
                info!(%user, %order_id, %package, "notifying payment success");
                self.send(&user, &messages::payment_succeeded(package)).await
            }
            PaymentNotice::Failed { user, order_id } => {
                info!(%user, %order_id, "notifying payment failure");
                self.send(&user, messages::PAYMENT_FAILED).await
            }
        }
    }

    /// Delivers notices from `notices` in the background until the channel
    /// closes or the task is aborted.
    pub fn spawn_payment_notice_listener(
        self: Arc<Self>,
        mut notices: UnboundedReceiver<PaymentNotice>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(notice) = notices.recv().await {
                let user = notice.user().clone();
                if let Err(e) = self.deliver_payment_notice(notice).await {
                    warn!(%user, error = %e, "payment notice not delivered");
                }
            }
        })
    }

    async fn set_phase(&self, user: &UserId, phase: Phase) {
        debug!(%user, phase = phase.name(), "phase changed");
        self.phases.lock().await.insert(user.clone(), phase);
    }

    async fn clear_phase(&self, user: &UserId) {
        self.phases.lock().await.remove(user);
    }

    async fn send(&self, user: &UserId, text: &str) -> Result<()> {
        self.transport.send_text(user, text).await
    }
}
