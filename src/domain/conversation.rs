use super::job::ImageBytes;
use super::service::Service;
use super::user::UserId;

/// One inbound message from the transport. Status broadcasts are filtered
/// out before they get here.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub user: UserId,
    pub text: Option<String>,
    pub image: Option<ImageBytes>,
}

impl InboundEvent {
    pub fn text(user: UserId, text: impl Into<String>) -> Self {
        Self {
            user,
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn image(user: UserId, image: ImageBytes) -> Self {
        Self {
            user,
            text: None,
            image: Some(image),
        }
    }
}

/// Where a user is in the conversation. Users without a phase are idle.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Phase {
    #[default]
    Main,
    AwaitingDescription {
        service: Service,
    },
    AwaitingImage {
        service: Service,
        description: Option<String>,
    },
    AwaitingSecondImage {
        service: Service,
        description: Option<String>,
        first_image: ImageBytes,
    },
}

impl Phase {
    /// The phase a fresh menu selection leads to.
    pub fn after_selection(service: Service) -> Self {
        if service.requires_description() {
            Phase::AwaitingDescription { service }
        } else {
            Phase::AwaitingImage {
                service,
                description: None,
            }
        }
    }

    pub fn service(&self) -> Option<Service> {
        match self {
            Phase::Main => None,
            Phase::AwaitingDescription { service }
            | Phase::AwaitingImage { service, .. }
            | Phase::AwaitingSecondImage { service, .. } => Some(*service),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Main => "main",
            Phase::AwaitingDescription { .. } => "awaiting_description",
            Phase::AwaitingImage { .. } => "awaiting_image",
            Phase::AwaitingSecondImage { .. } => "awaiting_second_image",
        }
    }
}
