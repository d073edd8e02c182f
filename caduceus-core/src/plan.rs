//! Segmented genome plans
//!
//! A plan describes the segment structure the isolates of an OTU are expected
//! to conform to: how many segments, their names, and the length window each
//! segment's sequences must fall within.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Whether a plan segment must be present in every isolate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentRule {
    Required,
    Optional,
}

/// One expected segment of an OTU's genome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// The segment id.
    pub id: Uuid,

    /// The segment name (eg. `RNA B`). `None` for monopartite plans.
    pub name: Option<String>,

    /// Whether isolates must include this segment.
    pub required: SegmentRule,

    /// The expected sequence length.
    pub length: u32,

    /// The fraction a sequence's length may deviate from `length`.
    pub length_tolerance: f64,
}

impl Segment {
    /// Create a new required segment with a fresh id.
    pub fn new(length: u32, length_tolerance: f64, name: Option<String>) -> CoreResult<Self> {
        if length == 0 {
            return Err(CoreError::InvalidSegment(
                "length must be positive".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&length_tolerance) {
            return Err(CoreError::InvalidSegment(format!(
                "length tolerance {length_tolerance} is not in [0, 1]"
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            required: SegmentRule::Required,
            length,
            length_tolerance,
        })
    }

    /// Set whether the segment is required or optional.
    pub fn with_rule(mut self, rule: SegmentRule) -> Self {
        self.required = rule;
        self
    }

    /// The inclusive window of conforming sequence lengths.
    ///
    /// Both bounds are truncated toward zero, so a segment of length 150 with
    /// tolerance 0.03 accepts lengths in `[145, 154]`.
    pub fn length_window(&self) -> (u32, u32) {
        let length = f64::from(self.length);

        let min = (length * (1.0 - self.length_tolerance)).floor() as u32;
        let max = (length * (1.0 + self.length_tolerance)).floor() as u32;

        (min, max)
    }

    /// Check a sequence length against the segment's window.
    pub fn conforms(&self, sequence_length: usize) -> bool {
        let (min, max) = self.length_window();

        sequence_length >= min as usize && sequence_length <= max as usize
    }
}

/// The expected segment structure of an OTU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// The plan id.
    pub id: Uuid,

    /// The expected segments, in order.
    pub segments: Vec<Segment>,
}

impl Plan {
    /// Create a plan with a fresh id.
    ///
    /// Fails if no segments are given or segment ids collide.
    pub fn new(segments: Vec<Segment>) -> CoreResult<Self> {
        if segments.is_empty() {
            return Err(CoreError::InvalidPlan(
                "a plan must have at least one segment".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();

        for segment in &segments {
            if !seen.insert(segment.id) {
                return Err(CoreError::InvalidPlan(format!(
                    "duplicate segment id {}",
                    segment.id
                )));
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            segments,
        })
    }

    /// Whether the plan has exactly one segment.
    pub fn monopartite(&self) -> bool {
        self.segments.len() == 1
    }

    /// Get a segment by id.
    pub fn get_segment(&self, segment_id: &Uuid) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == *segment_id)
    }

    /// Get a segment by name.
    pub fn get_segment_by_name(&self, name: &str) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|s| s.name.as_deref() == Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_window() {
        let segment = Segment::new(150, 0.03, None).unwrap();
        assert_eq!(segment.length_window(), (145, 154));
    }

    #[test]
    fn test_conforms() {
        let segment = Segment::new(150, 0.03, None).unwrap();

        assert!(!segment.conforms(100));
        assert!(!segment.conforms(144));
        assert!(segment.conforms(145));
        assert!(segment.conforms(148));
        assert!(segment.conforms(154));
        assert!(!segment.conforms(155));
    }

    #[test]
    fn test_zero_tolerance() {
        let segment = Segment::new(150, 0.0, None).unwrap();

        assert_eq!(segment.length_window(), (150, 150));
        assert!(segment.conforms(150));
        assert!(!segment.conforms(149));
    }

    #[test]
    fn test_segment_rejects_bad_tolerance() {
        assert!(Segment::new(150, -0.1, None).is_err());
        assert!(Segment::new(150, 1.5, None).is_err());
        assert!(Segment::new(0, 0.03, None).is_err());
    }

    #[test]
    fn test_monopartite() {
        let plan = Plan::new(vec![Segment::new(150, 0.03, None).unwrap()]).unwrap();
        assert!(plan.monopartite());
    }

    #[test]
    fn test_plan_rejects_duplicate_segment_ids() {
        let segment = Segment::new(150, 0.03, Some("RNA A".to_string())).unwrap();

        assert!(Plan::new(vec![segment.clone(), segment]).is_err());
    }

    #[test]
    fn test_plan_rejects_empty() {
        assert!(Plan::new(vec![]).is_err());
    }

    #[test]
    fn test_get_segment_by_name() {
        let a = Segment::new(3000, 0.05, Some("RNA A".to_string())).unwrap();
        let b = Segment::new(1500, 0.05, Some("RNA B".to_string())).unwrap();

        let plan = Plan::new(vec![a.clone(), b]).unwrap();

        assert_eq!(plan.get_segment_by_name("RNA A").unwrap().id, a.id);
        assert!(plan.get_segment_by_name("RNA C").is_none());
    }
}
