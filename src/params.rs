//! Field-level recognition parameters and their wire spellings.
//!
//! Every enum here maps one-to-one onto a query-string value understood by
//! the text-field endpoint. `Display` renders the wire form, `FromStr`
//! accepts it back (used by the CLI and by [`crate::config`] validation).

use crate::error::OcrTaskError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a closed enum whose variants have a fixed wire spelling.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $wire)] $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The wire spelling of this value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = OcrTaskError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| OcrTaskError::InvalidParameter {
                        field: $field,
                        value: s.to_string(),
                    })
            }
        }
    };
}

wire_enum! {
    /// Data-centre location of the OCR service.
    LocationId, "locationId" {
        /// European data centre. (default)
        CloudEu => "cloud-eu",
        /// US west-coast data centre.
        CloudWestUs => "cloud-westus",
    }
}

impl Default for LocationId {
    fn default() -> Self {
        LocationId::CloudEu
    }
}

impl LocationId {
    /// Base URL of the service for this location.
    pub fn base_url(&self) -> String {
        format!("https://{}.ocrsdk.com", self.as_str())
    }
}

wire_enum! {
    /// Format of the produced result artifact.
    ExportFormat, "exportFormat" {
        /// Structured markup; validated against the result schema. (default)
        Xml => "xml",
        /// Plain text; no structural validation.
        Txt => "txt",
    }
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat::Xml
    }
}

impl ExportFormat {
    /// Whether results in this format are checked against a schema.
    pub fn is_structured(&self) -> bool {
        matches!(self, ExportFormat::Xml)
    }
}

wire_enum! {
    /// Kind of text printed in the field.
    TextType, "textType" {
        Normal => "normal",
        Typewriter => "typewriter",
        Matrix => "matrix",
        Index => "index",
        Handprinted => "handprinted",
        OcrA => "ocrA",
        OcrB => "ocrB",
        E13b => "e13b",
        Cmc7 => "cmc7",
        Gothic => "gothic",
    }
}

wire_enum! {
    /// How the field is visually marked on the form.
    MarkingType, "markingType" {
        SimpleText => "simpleText",
        UnderlinedText => "underlinedText",
        TextInFrame => "textInFrame",
        GreyBoxes => "greyBoxes",
        CharBoxSeries => "charBoxSeries",
        SimpleComb => "simpleComb",
        CombInFrame => "combInFrame",
        PartitionedFrame => "partitionedFrame",
    }
}

impl MarkingType {
    /// Marking types that split the field into per-character cells.
    pub fn has_cells(&self) -> bool {
        matches!(
            self,
            MarkingType::CharBoxSeries
                | MarkingType::SimpleComb
                | MarkingType::CombInFrame
                | MarkingType::PartitionedFrame
        )
    }
}

wire_enum! {
    /// Handwriting convention used for hand-printed text.
    WritingStyle, "writingStyle" {
        Default => "default",
        American => "american",
        Arabic => "arabic",
        Baltic => "baltic",
        British => "british",
        Bulgarian => "bulgarian",
        Canadian => "canadian",
        Chinese => "chinese",
        Czech => "czech",
        French => "french",
        German => "german",
        Greek => "greek",
        Hungarian => "hungarian",
        Italian => "italian",
        Japanese => "japanese",
        Polish => "polish",
        Portuguese => "portuguese",
        Romanian => "romanian",
        Russian => "russian",
        Spanish => "spanish",
        Swedish => "swedish",
        Thai => "thai",
        Turkish => "turkish",
        Ukrainian => "ukrainian",
    }
}

/// Rectangle of the image to recognise, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Region {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Result<Self, OcrTaskError> {
        if left >= right || top >= bottom {
            return Err(OcrTaskError::InvalidRequest(format!(
                "region must have left < right and top < bottom, got {left},{top},{right},{bottom}"
            )));
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.left, self.top, self.right, self.bottom)
    }
}

impl FromStr for Region {
    type Err = OcrTaskError;

    /// Parse `left,top,right,bottom`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || OcrTaskError::InvalidParameter {
            field: "region",
            value: s.to_string(),
        };
        let coords: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| invalid())?;
        match coords.as_slice() {
            [l, t, r, b] => Region::new(*l, *t, *r, *b),
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip_is_case_insensitive() {
        assert_eq!("OCRA".parse::<TextType>().unwrap(), TextType::OcrA);
        assert_eq!(TextType::OcrA.to_string(), "ocrA");
        assert_eq!(
            " simpleComb ".parse::<MarkingType>().unwrap(),
            MarkingType::SimpleComb
        );
    }

    #[test]
    fn unknown_value_names_the_field() {
        let err = "sideways".parse::<TextType>().unwrap_err();
        assert!(err.to_string().contains("textType"), "got: {err}");
    }

    #[test]
    fn location_base_url() {
        assert_eq!(LocationId::CloudWestUs.base_url(), "https://cloud-westus.ocrsdk.com");
        assert_eq!(LocationId::default(), LocationId::CloudEu);
    }

    #[test]
    fn region_parse() {
        let r: Region = "10, 20, 300, 80".parse().unwrap();
        assert_eq!(r, Region::new(10, 20, 300, 80).unwrap());
        assert_eq!(r.to_string(), "10,20,300,80");
    }

    #[test]
    fn region_rejects_inverted_or_short() {
        assert!("300,20,10,80".parse::<Region>().is_err());
        assert!("1,2,3".parse::<Region>().is_err());
        assert!("a,b,c,d".parse::<Region>().is_err());
    }

    #[test]
    fn cell_marking_types() {
        assert!(MarkingType::SimpleComb.has_cells());
        assert!(!MarkingType::SimpleText.has_cells());
    }
}
