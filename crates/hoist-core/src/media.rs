use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Jpeg,
    Png,
    Gif,
    Webp,
    Heic,
    Pdf,
    Other,
}

impl MediaKind {
    /// Sniff the leading magic bytes. Never reads past the first 12 bytes.
    pub fn sniff(data: &[u8]) -> Self {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Self::Jpeg
        } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Self::Png
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Self::Gif
        } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Self::Webp
        } else if data.len() >= 12
            && &data[4..8] == b"ftyp"
            && matches!(&data[8..12], b"heic" | b"heix" | b"mif1" | b"msf1")
        {
            Self::Heic
        } else if data.starts_with(b"%PDF-") {
            Self::Pdf
        } else {
            Self::Other
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Heic => "image/heic",
            Self::Pdf => "application/pdf",
            Self::Other => "application/octet-stream",
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, Self::Pdf | Self::Other)
    }
}
