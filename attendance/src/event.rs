use rollcall_roster::Student;
use serde::{Deserialize, Serialize};

use crate::face::BoundingBox;
use crate::matcher::confidence_percent;

/// Label drawn on unmatched faces.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Box color: green for known students, red for unknown faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxColor {
    Green,
    Red,
}

/// One annotated face box of a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxDescriptor {
    pub label: String,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub color: BoxColor,
}

impl BoxDescriptor {
    /// Green box labelled `"<name> (<confidence>%)"`.
    pub fn known(name: &str, score: f32, bbox: BoundingBox) -> Self {
        Self {
            label: format!("{name} ({}%)", confidence_percent(score)),
            bbox,
            color: BoxColor::Green,
        }
    }

    /// Red box labelled `"Unknown"`.
    pub fn unknown(bbox: BoundingBox) -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            bbox,
            color: BoxColor::Red,
        }
    }
}

/// Session output event, serialized with a `type` tag.
///
/// ```json
/// {"type": "status", "message": "ready"}
/// {"type": "match", "student": {"id": "1", "name": "Asha", "roll_number": "R1"}}
/// {"type": "unknown_update", "count": 2}
/// {"type": "frame_data", "boxes": [{"label": "Unknown", "box": [0, 0, 9, 9], "color": "red"}]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Status { message: String },
    Error { message: String },
    Match { student: Student },
    UnknownUpdate { count: usize },
    FrameData { boxes: Vec<BoxDescriptor> },
}

impl Event {
    pub fn ready() -> Self {
        Self::Status {
            message: "ready".to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rollcall_roster::StudentId;
    use serde_json::json;

    use super::*;

    #[test]
    fn wire_format() {
        let events = vec![
            Event::ready(),
            Event::error("boom"),
            Event::Match {
                student: Student {
                    id: StudentId::new("7"),
                    name: "Asha".into(),
                    roll_number: Some("R7".into()),
                },
            },
            Event::UnknownUpdate { count: 3 },
            Event::FrameData {
                boxes: vec![
                    BoxDescriptor::known("Asha", 0.874, BoundingBox::new(1, 2, 3, 4)),
                    BoxDescriptor::unknown(BoundingBox::new(5, 6, 7, 8)),
                ],
            },
        ];
        let v = serde_json::to_value(&events).unwrap();
        assert_eq!(
            v,
            json!([
                {"type": "status", "message": "ready"},
                {"type": "error", "message": "boom"},
                {"type": "match", "student": {"id": "7", "name": "Asha", "roll_number": "R7"}},
                {"type": "unknown_update", "count": 3},
                {"type": "frame_data", "boxes": [
                    {"label": "Asha (87%)", "box": [1, 2, 3, 4], "color": "green"},
                    {"label": "Unknown", "box": [5, 6, 7, 8], "color": "red"}
                ]}
            ])
        );
    }

    #[test]
    fn parse_back() {
        let e: Event = serde_json::from_str(r#"{"type":"unknown_update","count":1}"#).unwrap();
        assert_eq!(e, Event::UnknownUpdate { count: 1 });
    }
}
