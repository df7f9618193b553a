mod common;

use common::{FailingWrites, Harness, RecordingQueue, StaticGateway, USER, grant, png, use_up_trials};
use pixgate::application::messages;
use pixgate::domain::conversation::{InboundEvent, Phase};
use pixgate::domain::package::Package;
use pixgate::domain::service::Service;
use pixgate::domain::user::UserId;
use pixgate::error::GateError;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn user() -> UserId {
    UserId::new(USER)
}

#[tokio::test]
async fn test_new_user_first_trial() {
    let harness = Harness::new();
    let user = user();

    harness.say(&user, "bosku").await;
    let texts = harness.transport.texts_for(&user);
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[0], messages::WELCOME);
    assert!(texts[1].contains("Free edits left: 2"));
    assert_eq!(harness.engine.phase(&user).await, Some(Phase::Main));

    harness.say(&user, "1").await;
    assert_eq!(
        harness.transport.last_text(&user).unwrap(),
        messages::upload_prompt(Service::Restore)
    );

    harness.upload(&user, png(8, 8)).await;
    assert_eq!(
        harness.transport.last_text(&user).unwrap(),
        messages::JOB_ACCEPTED
    );

    let record = harness.entitlements.record(&user).await.unwrap();
    assert_eq!(record.trial_count, 1);
    assert_eq!(harness.engine.phase(&user).await, None);

    let jobs = harness.queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].service, Service::Restore);
    assert!(jobs[0].is_trial);
}

#[tokio::test]
async fn test_idle_user_is_ignored() {
    let harness = Harness::new();
    let user = user();

    harness.say(&user, "hello there").await;
    harness.upload(&user, png(4, 4)).await;

    assert!(harness.transport.sent().is_empty());
    assert!(harness.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_reset_keyword_matches_anywhere_in_message() {
    let harness = Harness::new();
    let user = user();

    harness.say(&user, "Halo BOSKU, apa kabar?").await;
    assert_eq!(harness.transport.texts_for(&user)[0], messages::WELCOME);

    // Reset drops a half-finished selection.
    harness.say(&user, "2").await;
    harness.say(&user, "bosku").await;
    assert_eq!(harness.engine.phase(&user).await, Some(Phase::Main));
}

#[tokio::test]
async fn test_menu_keyword_keeps_phase() {
    let harness = Harness::new();
    let user = user();

    harness.say(&user, "bosku").await;
    harness.say(&user, "1").await;
    harness.transport.clear();

    harness.say(&user, "MENU").await;
    assert!(
        harness
            .transport
            .last_text(&user)
            .unwrap()
            .contains("Free edits left: 2")
    );
    assert_eq!(
        harness.engine.phase(&user).await,
        Some(Phase::after_selection(Service::Restore))
    );
}

#[tokio::test]
async fn test_invalid_selection() {
    let harness = Harness::new();
    let user = user();

    harness.say(&user, "bosku").await;
    harness.say(&user, "42").await;

    assert_eq!(
        harness.transport.last_text(&user).unwrap(),
        messages::INVALID_SELECTION
    );
    assert_eq!(harness.engine.phase(&user).await, Some(Phase::Main));
}

#[tokio::test]
async fn test_exhausted_trial_gets_offer() {
    let harness = Harness::new();
    let user = user();
    use_up_trials(&harness.entitlements, &user).await;

    harness.say(&user, "bosku").await;
    assert_eq!(
        harness.transport.last_text(&user).unwrap(),
        messages::subscription_offer()
    );

    harness.say(&user, "1").await;
    assert_eq!(
        harness.transport.last_text(&user).unwrap(),
        messages::subscription_offer()
    );
    assert!(harness.queue.jobs().is_empty());
    assert_eq!(harness.engine.phase(&user).await, Some(Phase::Main));
    assert_eq!(
        harness.entitlements.record(&user).await.unwrap().trial_count,
        2
    );
}

#[tokio::test]
async fn test_multi_image_needs_two_uploads() {
    let harness = Harness::new();
    let user = user();

    harness.say(&user, "bosku").await;
    harness.say(&user, "7").await;
    assert_eq!(
        harness.transport.last_text(&user).unwrap(),
        messages::description_prompt(Service::MultiImage)
    );

    harness.say(&user, "put us on a beach").await;
    assert_eq!(
        harness.transport.last_text(&user).unwrap(),
        "Now upload the first photo."
    );

    harness.upload(&user, png(4, 4)).await;
    assert_eq!(
        harness.transport.last_text(&user).unwrap(),
        messages::FIRST_IMAGE_RECEIVED
    );
    assert!(harness.queue.jobs().is_empty());

    harness.say(&user, "where do I send it?").await;
    assert!(harness.queue.jobs().is_empty());
    assert!(matches!(
        harness.engine.phase(&user).await,
        Some(Phase::AwaitingSecondImage { .. })
    ));

    harness.upload(&user, png(6, 6)).await;
    let jobs = harness.queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].primary_image, png(4, 4));
    assert_eq!(jobs[0].secondary_image, Some(png(6, 6)));
    assert_eq!(jobs[0].description.as_deref(), Some("put us on a beach"));
    assert_eq!(
        harness.entitlements.record(&user).await.unwrap().trial_count,
        1
    );
}

#[tokio::test]
async fn test_image_before_description_is_ignored() {
    let harness = Harness::new();
    let user = user();

    harness.say(&user, "bosku").await;
    harness.say(&user, "8").await;
    harness.transport.clear();

    harness.upload(&user, png(4, 4)).await;
    assert!(harness.transport.sent().is_empty());
    assert_eq!(
        harness.engine.phase(&user).await,
        Some(Phase::AwaitingDescription {
            service: Service::EditImage
        })
    );
}

#[tokio::test]
async fn test_allowance_rechecked_at_upload() {
    let harness = Harness::new();
    let user = user();

    harness.say(&user, "bosku").await;
    harness.say(&user, "1").await;
    use_up_trials(&harness.entitlements, &user).await;

    harness.upload(&user, png(4, 4)).await;
    assert_eq!(
        harness.transport.last_text(&user).unwrap(),
        messages::subscription_offer()
    );
    assert!(harness.queue.jobs().is_empty());
    assert_eq!(harness.engine.phase(&user).await, None);
}

#[tokio::test]
async fn test_feature_outside_package_is_denied() {
    let harness = Harness::new();
    let user = user();
    use_up_trials(&harness.entitlements, &user).await;
    grant(&harness.entitlements, &user, Package::Basic).await;

    harness.say(&user, "bosku").await;
    assert!(
        harness
            .transport
            .last_text(&user)
            .unwrap()
            .contains("Free edits left: 0")
    );
    harness.transport.clear();

    harness.say(&user, "7").await;
    let texts = harness.transport.texts_for(&user);
    assert_eq!(
        texts,
        vec![
            messages::feature_not_in_package(Service::MultiImage),
            messages::subscription_offer()
        ]
    );
    assert_eq!(harness.engine.phase(&user).await, Some(Phase::Main));
}

#[tokio::test]
async fn test_paid_user_spends_quota() {
    let harness = Harness::new();
    let user = user();
    use_up_trials(&harness.entitlements, &user).await;
    grant(&harness.entitlements, &user, Package::Basic).await;

    harness.say(&user, "bosku").await;
    harness.say(&user, "9").await;
    harness.upload(&user, png(4, 4)).await;

    let record = harness.entitlements.record(&user).await.unwrap();
    assert_eq!(record.quota, 99);
    assert_eq!(record.trial_count, 2);
    let jobs = harness.queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert!(!jobs[0].is_trial);
}

#[tokio::test]
async fn test_exhausted_quota_is_reported() {
    let harness = Harness::new();
    let user = user();
    use_up_trials(&harness.entitlements, &user).await;
    grant(&harness.entitlements, &user, Package::Basic).await;
    while harness.entitlements.has_quota(&user).await.unwrap() {
        harness.entitlements.consume_quota(&user).await.unwrap();
    }

    harness.say(&user, "bosku").await;
    harness.transport.clear();
    harness.say(&user, "1").await;

    assert_eq!(
        harness.transport.texts_for(&user),
        vec![
            messages::QUOTA_EXHAUSTED.to_string(),
            messages::subscription_offer()
        ]
    );
}

#[tokio::test]
async fn test_refused_job_gives_allowance_back() {
    let harness = Harness::with_queue(RecordingQueue::refusing());
    let user = user();

    harness.say(&user, "bosku").await;
    harness.say(&user, "1").await;
    harness.upload(&user, png(4, 4)).await;

    let reply = harness.transport.last_text(&user).unwrap();
    assert!(reply.contains("Error ID: "));
    assert!(reply.contains("has not been used"));
    assert_eq!(
        harness.entitlements.record(&user).await.unwrap().trial_count,
        0
    );
}

#[tokio::test]
async fn test_package_request_with_payment_link() {
    let gateway = Arc::new(StaticGateway::with_link("https://pay.example/abc"));
    let harness = Harness::with_gateway(gateway.clone());
    let user = user();

    harness.say(&user, "bosku").await;
    harness.say(&user, "Pro").await;

    let reply = harness.transport.last_text(&user).unwrap();
    assert!(reply.contains("https://pay.example/abc"));
    assert!(reply.contains("Rp 199000"));

    let pending = harness
        .entitlements
        .pending_payment(&user)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pending.package, Package::Pro);
    assert!(pending.order_id.as_str().ends_with("_628111"));

    let requests = gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, pending.order_id);
    assert_eq!(requests[0].2.phone, "628111");

    // A second request while the first one is outstanding changes nothing.
    harness.say(&user, "basic").await;
    assert_eq!(
        harness.transport.last_text(&user).unwrap(),
        messages::payment_already_pending(&pending.order_id)
    );
    assert_eq!(gateway.requests().len(), 1);
    assert_eq!(
        harness
            .entitlements
            .pending_payment(&user)
            .await
            .unwrap()
            .unwrap(),
        pending
    );
}

#[tokio::test]
async fn test_gateway_failure_falls_back_to_manual_payment() {
    let harness = Harness::with_gateway(Arc::new(StaticGateway::failing()));
    let user = user();

    harness.say(&user, "bosku").await;
    harness.say(&user, "premium").await;

    let pending = harness
        .entitlements
        .pending_payment(&user)
        .await
        .unwrap()
        .unwrap();
    let reply = harness.transport.last_text(&user).unwrap();
    assert!(reply.contains("Online payment is not available"));
    assert!(reply.contains(pending.order_id.as_str()));
    assert!(reply.contains("6281241000250"));
}

#[tokio::test]
async fn test_package_request_without_gateway() {
    let harness = Harness::new();
    let user = user();

    harness.say(&user, "bosku").await;
    harness.say(&user, "basic").await;

    let pending = harness
        .entitlements
        .pending_payment(&user)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pending.package, Package::Basic);
    assert_eq!(
        harness.transport.last_text(&user).unwrap(),
        messages::manual_payment(
            Package::Basic,
            &pending.amount,
            &pending.order_id,
            "6281241000250"
        )
    );
}

#[tokio::test]
async fn test_order_needs_phone_user() {
    let harness = Harness::new();
    let user = UserId::new("support-team@g.us");

    harness.say(&user, "bosku").await;
    harness.say(&user, "pro").await;

    assert_eq!(
        harness.transport.last_text(&user).unwrap(),
        messages::order_unavailable("6281241000250")
    );
    assert!(
        harness
            .entitlements
            .pending_payment(&user)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_users_do_not_share_phase() {
    let harness = Harness::new();
    let alice = UserId::new("628111@c.us");
    let bob = UserId::new("628222@c.us");

    harness.say(&alice, "bosku").await;
    harness.say(&alice, "1").await;
    harness.upload(&bob, png(4, 4)).await;

    assert!(harness.queue.jobs().is_empty());
    assert!(harness.transport.texts_for(&bob).is_empty());
    assert_eq!(harness.engine.phase(&bob).await, None);
}

#[tokio::test]
async fn test_storage_failure_at_upload_asks_to_try_again() {
    let (repository, failing) = FailingWrites::new();
    let harness = Harness::with_repository(Box::new(repository));
    let user = user();
    harness.say(&user, "bosku").await;
    harness.say(&user, "1").await;

    failing.store(true, Ordering::SeqCst);
    let outcome = harness
        .engine
        .handle(InboundEvent::image(user.clone(), png(16, 16)))
        .await;

    assert!(matches!(outcome, Err(GateError::Persistence(_))));
    assert_eq!(
        harness.transport.last_text(&user).unwrap(),
        messages::TRY_AGAIN
    );
    assert!(harness.queue.jobs().is_empty());
    assert_eq!(harness.entitlements.remaining_trials(&user).await.unwrap(), 2);

    // Once storage recovers the same upload goes through.
    failing.store(false, Ordering::SeqCst);
    harness.upload(&user, png(16, 16)).await;
    assert_eq!(harness.queue.jobs().len(), 1);
    assert_eq!(harness.entitlements.remaining_trials(&user).await.unwrap(), 1);
}

#[tokio::test]
async fn test_storage_failure_on_package_request_asks_to_try_again() {
    let gateway = Arc::new(StaticGateway::with_link("https://pay.example/abc"));
    let (repository, failing) = FailingWrites::new();
    let mut harness = Harness::with_repository(Box::new(repository));
    harness.engine = harness.engine.with_payment_gateway(gateway);
    let user = user();
    harness.say(&user, "bosku").await;

    failing.store(true, Ordering::SeqCst);
    let outcome = harness
        .engine
        .handle(InboundEvent::text(user.clone(), "pro"))
        .await;

    assert!(matches!(outcome, Err(GateError::Persistence(_))));
    assert_eq!(
        harness.transport.last_text(&user).unwrap(),
        messages::TRY_AGAIN
    );
    assert!(
        harness
            .entitlements
            .pending_payment(&user)
            .await
            .unwrap()
            .is_none()
    );
}
