//! User-facing message texts.

use crate::domain::package::Package;
use crate::domain::payment::{Amount, OrderId};
use crate::domain::service::Service;
use uuid::Uuid;

pub const WELCOME: &str = "Welcome to the *Photo Restoration Bot*!\n\n\
We edit photos with AI: restoring old pictures, professional profile photos, \
creative edits and more.\n\n\
*SPECIAL OFFER*: your first 2 edits are FREE.\n\n\
Type *menu* to see the available services.";

pub const INVALID_SELECTION: &str = "Please pick one of the numbers from the menu.";

pub const FIRST_IMAGE_RECEIVED: &str = "First photo received! Now upload the second photo.";

pub const JOB_ACCEPTED: &str =
    "Your photo has been queued for processing. Please wait a moment...";

pub const QUOTA_EXHAUSTED: &str = "Your quota is used up. Please buy a new package to continue.";

pub const PAYMENT_FAILED: &str =
    "Your payment did not go through. Please try again or contact the admin for help.";

pub const TRY_AGAIN: &str = "Sorry, something went wrong on our side. Please try again in a moment.";

pub fn menu(remaining_trials: u32) -> String {
    let mut text = String::from("These are the available photo services:\n\n");
    for service in Service::ALL {
        text.push_str(&format!("{}. *{}*\n", service.menu_number(), service.title()));
    }
    text.push_str(&format!(
        "\nFree edits left: {remaining_trials}\nReply with the number of your choice (1-9)"
    ));
    text
}

pub fn subscription_offer() -> String {
    let mut text = String::from(
        "Your free trial is used up. Pick a subscription package to continue:\n",
    );
    for package in Package::ALL {
        let features: Vec<&str> = package.features().iter().map(|s| s.title()).collect();
        text.push_str(&format!(
            "\n*{}*: {} images / month, Rp {} / month\n- {}\n",
            package.name().to_uppercase(),
            package.quota(),
            package.price().normalize(),
            features.join("\n- ")
        ));
    }
    text.push_str("\nType *basic*, *pro* or *premium* to choose a package.");
    text
}

pub fn upload_prompt(service: Service) -> String {
    format!("Ready! Upload the photo for \"{service}\".")
}

pub fn description_prompt(service: Service) -> String {
    format!("Ready! First describe what you want for \"{service}\".")
}

pub fn image_prompt_after_description(service: Service) -> &'static str {
    if service.is_multi_image() {
        "Now upload the first photo."
    } else {
        "Now upload the photo."
    }
}

pub fn feature_not_in_package(service: Service) -> String {
    format!(
        "The \"{service}\" feature is not part of your package. Please upgrade your package to use it."
    )
}

pub fn payment_prompt(package: Package, amount: &Amount, link: &str) -> String {
    format!(
        "To activate the {} package, please pay Rp {amount} using this link:\n\n{link}\n\n\
         The payment is verified automatically once you complete it.",
        package.name().to_uppercase()
    )
}

pub fn manual_payment(package: Package, amount: &Amount, order_id: &OrderId, admin_contact: &str) -> String {
    format!(
        "Package {} - Rp {amount}\n\n\
         Online payment is not available right now.\n\n\
         Please contact the admin to pay manually:\nWhatsApp: {admin_contact}\n\n\
         Mention your order code: {order_id}",
        package.name().to_uppercase()
    )
}

pub fn payment_already_pending(order_id: &OrderId) -> String {
    format!(
        "You already have a payment in progress (order {order_id}). \
         Please complete it or wait until it expires before choosing another package."
    )
}

pub fn order_unavailable(admin_contact: &str) -> String {
    format!("We could not create an order for this chat. Please contact the admin: {admin_contact}")
}

pub fn payment_succeeded(package: Package) -> String {
    format!(
        "Your payment was successful! The {} package is active with {} images this month. \
         Type *menu* to see the services.",
        package.name().to_uppercase(),
        package.quota()
    )
}

pub fn result_caption(service: Service, reset_keyword: &str) -> String {
    format!(
        "{}\n\nType \"{reset_keyword}\" for another edit",
        service.caption()
    )
}

pub fn job_failed(correlation_id: Uuid) -> String {
    format!(
        "Sorry, something went wrong while processing your photo (Error ID: {correlation_id}). \
         Please try again later or contact the admin."
    )
}

pub fn queue_unavailable(correlation_id: Uuid) -> String {
    format!(
        "Sorry, your photo could not be queued (Error ID: {correlation_id}). \
         Your free edit or quota has not been used."
    )
}

pub fn approval_result(user: &str, outcome: &str) -> String {
    format!("Approval for {user}: {outcome}")
}
