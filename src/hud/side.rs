//! Left/right classification for the side-bubble views.

use serde::Serialize;

use crate::detect::{BoundingBox, ObjectClass};

/// Normalized centers below this are on the left.
pub const LEFT_BAND_MAX: f32 = 0.46;
/// Normalized centers above this are on the right.
pub const RIGHT_BAND_MIN: f32 = 0.54;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    /// Center band: relevant to both sides at once.
    Both,
}

impl Side {
    pub fn is_left(&self) -> bool {
        matches!(self, Side::Left | Side::Both)
    }

    pub fn is_right(&self) -> bool {
        matches!(self, Side::Right | Side::Both)
    }
}

/// Side for a normalized horizontal center `nx` in [0, 1].
pub fn side_for_normalized(nx: f32) -> Side {
    if nx < LEFT_BAND_MAX {
        Side::Left
    } else if nx > RIGHT_BAND_MIN {
        Side::Right
    } else {
        Side::Both
    }
}

pub fn classify_side(bbox: &BoundingBox, frame_width: u32) -> Side {
    let (center_x, _) = bbox.center();
    side_for_normalized(center_x / frame_width as f32)
}

/// Per-frame side occupancy, in detector output order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SideSummary {
    pub left: Vec<ObjectClass>,
    pub right: Vec<ObjectClass>,
}

impl SideSummary {
    pub fn collect<I>(items: I) -> Self
    where
        I: IntoIterator<Item = (ObjectClass, Side)>,
    {
        let mut summary = SideSummary::default();
        for (class, side) in items {
            if side.is_left() {
                summary.left.push(class);
            }
            if side.is_right() {
                summary.right.push(class);
            }
        }
        summary
    }

    pub fn left_present(&self) -> bool {
        !self.left.is_empty()
    }

    pub fn right_present(&self) -> bool {
        !self.right.is_empty()
    }

    /// Class that drives the left bubble's color and label.
    pub fn left_lead(&self) -> Option<ObjectClass> {
        self.left.first().copied()
    }

    pub fn right_lead(&self) -> Option<ObjectClass> {
        self.right.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_split_three_ways() {
        assert_eq!(side_for_normalized(0.3), Side::Left);
        assert_eq!(side_for_normalized(0.7), Side::Right);
        assert_eq!(side_for_normalized(0.5), Side::Both);
        assert_eq!(side_for_normalized(0.46), Side::Both);
        assert_eq!(side_for_normalized(0.54), Side::Both);
        assert_eq!(side_for_normalized(0.4599), Side::Left);
        assert_eq!(side_for_normalized(0.5401), Side::Right);
    }

    #[test]
    fn classify_uses_box_center() {
        // center at 300 / 1000 = 0.3
        let bbox = BoundingBox::new(250.0, 0.0, 100.0, 50.0);
        assert_eq!(classify_side(&bbox, 1000), Side::Left);
    }

    #[test]
    fn center_band_counts_on_both_sides_in_order() {
        let summary = SideSummary::collect(vec![
            (ObjectClass::Truck, Side::Both),
            (ObjectClass::Person, Side::Left),
            (ObjectClass::Car, Side::Right),
        ]);
        assert_eq!(summary.left, vec![ObjectClass::Truck, ObjectClass::Person]);
        assert_eq!(summary.right, vec![ObjectClass::Truck, ObjectClass::Car]);
        assert_eq!(summary.left_lead(), Some(ObjectClass::Truck));
        assert!(summary.left_present() && summary.right_present());
    }
}
