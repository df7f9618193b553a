use serde::{Deserialize, Serialize};
use std::fmt;

/// The nine transformation kinds offered in the menu, in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Restore,
    Character,
    Professional,
    Realistic,
    RemoveBackground,
    TransformImage,
    MultiImage,
    EditImage,
    ColorizeImage,
}

impl Service {
    pub const ALL: [Service; 9] = [
        Service::Restore,
        Service::Character,
        Service::Professional,
        Service::Realistic,
        Service::RemoveBackground,
        Service::TransformImage,
        Service::MultiImage,
        Service::EditImage,
        Service::ColorizeImage,
    ];

    /// Maps a menu answer (`"1"` to `"9"`) to its service.
    pub fn from_menu_choice(input: &str) -> Option<Self> {
        let index = match input.trim() {
            "1" => 0,
            "2" => 1,
            "3" => 2,
            "4" => 3,
            "5" => 4,
            "6" => 5,
            "7" => 6,
            "8" => 7,
            "9" => 8,
            _ => return None,
        };
        Some(Self::ALL[index])
    }

    pub fn menu_number(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).map_or(0, |i| i + 1)
    }

    /// Simple services go straight to the image upload without a text prompt.
    pub fn is_simple(self) -> bool {
        matches!(
            self,
            Service::Restore | Service::RemoveBackground | Service::ColorizeImage
        )
    }

    pub fn requires_description(self) -> bool {
        !self.is_simple()
    }

    pub fn is_multi_image(self) -> bool {
        self == Service::MultiImage
    }

    pub fn key(self) -> &'static str {
        match self {
            Service::Restore => "restore",
            Service::Character => "character",
            Service::Professional => "professional",
            Service::Realistic => "realistic",
            Service::RemoveBackground => "remove_background",
            Service::TransformImage => "transform_image",
            Service::MultiImage => "multi_image",
            Service::EditImage => "edit_image",
            Service::ColorizeImage => "colorize_image",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Service::Restore => "Restore an old or damaged photo",
            Service::Character => "Put your own face into a picture",
            Service::Professional => "Professional profile photo",
            Service::Realistic => "Create a realistic image",
            Service::RemoveBackground => "Remove the photo background",
            Service::TransformImage => "Restyle a photo",
            Service::MultiImage => "Combine two photos",
            Service::EditImage => "Edit a photo with instructions",
            Service::ColorizeImage => "Colorize a black and white photo",
        }
    }

    /// Caption sent along with a delivered result.
    pub fn caption(self) -> &'static str {
        match self {
            Service::Restore => "Here you go! Your photo has been restored.",
            Service::Character => "Here you go! Your character image is ready.",
            Service::Professional => "Here you go! Your professional headshot is ready.",
            Service::Realistic => "Here you go! Your realistic image is ready.",
            Service::RemoveBackground => "Here you go! The background has been removed.",
            Service::TransformImage => "Here you go! Your photo has been restyled.",
            Service::MultiImage => "Here you go! Your photos have been combined.",
            Service::EditImage => "Here you go! Your edit is done.",
            Service::ColorizeImage => "Here you go! Your photo has been colorized.",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
