//! Shipments and shipping labels.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ShipmentId, UserId};
use serde::{Deserialize, Serialize};

/// Image/document format of a stored shipping label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelFormat {
    Png,
    Gif,
    Pdf,
    Zpl,
    Jpeg,
}

impl LabelFormat {
    /// HTTP content type the label should be served with.
    pub fn content_type(&self) -> &'static str {
        match self {
            LabelFormat::Png => "image/png",
            LabelFormat::Gif => "image/gif",
            LabelFormat::Pdf => "application/pdf",
            LabelFormat::Jpeg => "image/jpeg",
            // Raw printer bytes, no registered media type.
            LabelFormat::Zpl => "application/octet-stream",
        }
    }

    /// File extension used when serving as an attachment.
    pub fn extension(&self) -> &'static str {
        match self {
            LabelFormat::Png => "png",
            LabelFormat::Gif => "gif",
            LabelFormat::Pdf => "pdf",
            LabelFormat::Zpl => "zpl",
            LabelFormat::Jpeg => "jpg",
        }
    }

    /// Returns the format name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelFormat::Png => "PNG",
            LabelFormat::Gif => "GIF",
            LabelFormat::Pdf => "PDF",
            LabelFormat::Zpl => "ZPL",
            LabelFormat::Jpeg => "JPEG",
        }
    }

    /// Parses a format name, case-insensitively.
    pub fn parse(s: &str) -> Option<LabelFormat> {
        match s.to_ascii_uppercase().as_str() {
            "PNG" => Some(LabelFormat::Png),
            "GIF" => Some(LabelFormat::Gif),
            "PDF" => Some(LabelFormat::Pdf),
            "ZPL" => Some(LabelFormat::Zpl),
            "JPEG" | "JPG" => Some(LabelFormat::Jpeg),
            _ => None,
        }
    }
}

impl std::fmt::Display for LabelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded shipment.
///
/// Created exactly once per successful fulfillment; never updated
/// afterwards except for the one-time `label_url` backfill (the URL
/// embeds the shipment's own generated id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub order_id: OrderId,
    pub carrier: String,
    pub service: String,
    pub tracking_number: String,
    pub label_url: Option<String>,
    pub label_data: Option<Vec<u8>>,
    pub label_format: LabelFormat,
    pub cost: Money,
    pub currency: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// A shipment about to be recorded by the fulfillment transaction.
#[derive(Debug, Clone)]
pub struct NewShipment {
    pub order_id: OrderId,
    pub carrier: String,
    pub service: String,
    pub tracking_number: String,
    pub label_data: Vec<u8>,
    pub label_format: LabelFormat,
    pub cost: Money,
    pub currency: String,
    pub created_by: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_table() {
        assert_eq!(LabelFormat::Png.content_type(), "image/png");
        assert_eq!(LabelFormat::Gif.content_type(), "image/gif");
        assert_eq!(LabelFormat::Pdf.content_type(), "application/pdf");
        assert_eq!(LabelFormat::Jpeg.content_type(), "image/jpeg");
        assert_eq!(LabelFormat::Zpl.content_type(), "application/octet-stream");
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(LabelFormat::parse("png"), Some(LabelFormat::Png));
        assert_eq!(LabelFormat::parse("PDF"), Some(LabelFormat::Pdf));
        assert_eq!(LabelFormat::parse("jpg"), Some(LabelFormat::Jpeg));
        assert_eq!(LabelFormat::parse("tiff"), None);
    }

    #[test]
    fn format_roundtrip() {
        for format in [
            LabelFormat::Png,
            LabelFormat::Gif,
            LabelFormat::Pdf,
            LabelFormat::Zpl,
            LabelFormat::Jpeg,
        ] {
            assert_eq!(LabelFormat::parse(format.as_str()), Some(format));
        }
    }
}
