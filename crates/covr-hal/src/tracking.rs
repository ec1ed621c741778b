//! Tracking source interface for the viewer, the viewer's hands and the
//! physical props.

use covr_types::{Hand, Pose, VoiCategory};

/// A body the tracking system can report a pose for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedBody {
    /// The viewer's head.
    Viewer,
    Hand(Hand),
    /// The physical prop standing in for VOIs of this category.
    Prop(VoiCategory),
}

/// Source of live tracked poses.
///
/// `None` means the body is not reporting this tick; callers treat that as a
/// transient condition and skip the dependent work.
pub trait TrackingSource: Send {
    fn sample(&self, body: TrackedBody) -> Option<Pose>;
}
