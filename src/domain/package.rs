use super::service::Service;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

const BASIC_FEATURES: &[Service] = &[
    Service::Restore,
    Service::RemoveBackground,
    Service::ColorizeImage,
];

const PRO_FEATURES: &[Service] = &[
    Service::Restore,
    Service::RemoveBackground,
    Service::ColorizeImage,
    Service::Professional,
    Service::TransformImage,
    Service::EditImage,
];

const PREMIUM_FEATURES: &[Service] = &Service::ALL;

/// A monthly subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Package {
    Basic,
    Pro,
    Premium,
}

impl Package {
    pub const ALL: [Package; 3] = [Package::Basic, Package::Pro, Package::Premium];

    /// Parses the keyword a user types to pick a package.
    pub fn from_keyword(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "basic" => Some(Package::Basic),
            "pro" => Some(Package::Pro),
            "premium" => Some(Package::Premium),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Package::Basic => "basic",
            Package::Pro => "pro",
            Package::Premium => "premium",
        }
    }

    /// Monthly price in rupiah.
    pub fn price(self) -> Decimal {
        match self {
            Package::Basic => dec!(75000),
            Package::Pro => dec!(199000),
            Package::Premium => dec!(399000),
        }
    }

    /// Images per month.
    pub fn quota(self) -> u32 {
        match self {
            Package::Basic => 100,
            Package::Pro => 300,
            Package::Premium => 500,
        }
    }

    pub fn features(self) -> &'static [Service] {
        match self {
            Package::Basic => BASIC_FEATURES,
            Package::Pro => PRO_FEATURES,
            Package::Premium => PREMIUM_FEATURES,
        }
    }

    pub fn includes(self, service: Service) -> bool {
        self.features().contains(&service)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
