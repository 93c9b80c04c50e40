//! Manager addressing and routing metadata.

/// Identity of a manager task, used to address its mailbox.
///
/// The set is fixed at build time. `App0`/`App1` are reserved slots for
/// application-defined tasks that want to participate in the message
/// substrate; everything below [`ManagerId::APP_BOUNDARY`] is a framework
/// manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ManagerId {
    /// Camera manager: owns capture devices and the frame pipeline.
    Camera,
    /// Display manager: owns display devices.
    Display,
    /// Vision-algorithm manager: owns inference devices fed by camera frames.
    VisionAlgo,
    /// Audio-processing manager: owns acoustic front-end devices.
    Audio,
    /// Voice-algorithm manager: owns wake-word / command recognition.
    VoiceAlgo,
    /// Output manager: owns LEDs, speakers, UI and other sinks.
    Output,
    /// Input manager: owns buttons, shells, microphones and query inputs.
    Input,
    /// Multicore bridge: serializes flagged messages to the peer core.
    Multicore,
    /// First application-defined task slot.
    App0,
    /// Second application-defined task slot.
    App1,
}

impl ManagerId {
    /// Total number of addressable mailbox slots.
    pub const COUNT: usize = 10;

    /// Index of the first application task slot; managers below this index
    /// belong to the framework.
    pub const APP_BOUNDARY: usize = 8;

    /// Returns the mailbox slot index for this manager.
    pub const fn index(self) -> usize {
        match self {
            ManagerId::Camera => 0,
            ManagerId::Display => 1,
            ManagerId::VisionAlgo => 2,
            ManagerId::Audio => 3,
            ManagerId::VoiceAlgo => 4,
            ManagerId::Output => 5,
            ManagerId::Input => 6,
            ManagerId::Multicore => 7,
            ManagerId::App0 => 8,
            ManagerId::App1 => 9,
        }
    }

    /// Inverse of [`ManagerId::index`]; `None` for out-of-range indices.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ManagerId::Camera),
            1 => Some(ManagerId::Display),
            2 => Some(ManagerId::VisionAlgo),
            3 => Some(ManagerId::Audio),
            4 => Some(ManagerId::VoiceAlgo),
            5 => Some(ManagerId::Output),
            6 => Some(ManagerId::Input),
            7 => Some(ManagerId::Multicore),
            8 => Some(ManagerId::App0),
            9 => Some(ManagerId::App1),
            _ => None,
        }
    }

    /// All manager ids in slot order.
    pub const fn all() -> [ManagerId; ManagerId::COUNT] {
        [
            ManagerId::Camera,
            ManagerId::Display,
            ManagerId::VisionAlgo,
            ManagerId::Audio,
            ManagerId::VoiceAlgo,
            ManagerId::Output,
            ManagerId::Input,
            ManagerId::Multicore,
            ManagerId::App0,
            ManagerId::App1,
        ]
    }
}

/// Where a message should be delivered in a multicore build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeliveryScope {
    /// Deliver to the local receiver only.
    #[default]
    Local,
    /// Deliver to the peer core only; the local receiver is skipped and the
    /// bridge takes ownership of the message.
    Remote,
    /// Deliver both locally and to the peer core.
    DualCore,
}

/// Multicore flags carried by every message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MulticoreInfo {
    /// The message should additionally be routed to the bridge's mailbox.
    pub is_multicore: bool,
    /// The message arrived from the peer core; set by the bridge on
    /// re-injection so receivers can tell forwarded traffic apart.
    pub was_multicore: bool,
    /// The manager the message addresses on the peer core.
    pub remote_target: Option<ManagerId>,
}

/// Routing metadata the substrate needs from a message.
///
/// Implemented by the concrete `Message` type upstream. The router clones
/// messages when fanning out to the bridge, hence the `Clone` bound.
pub trait Envelope: Clone + Send + 'static {
    /// Delivery scope for this message.
    fn scope(&self) -> DeliveryScope;

    /// Multicore flags for this message.
    fn multicore(&self) -> MulticoreInfo;

    /// Short human-readable name of the message kind, for logging.
    fn kind_name(&self) -> &'static str;

    /// Whether this message asks the receiving task to stop its receive
    /// loop after handling it. Used for explicit manager shutdown; ordinary
    /// messages keep the default.
    fn is_shutdown(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips_for_every_manager() {
        for id in ManagerId::all() {
            assert_eq!(ManagerId::from_index(id.index()), Some(id));
        }
        assert_eq!(ManagerId::from_index(ManagerId::COUNT), None);
    }

    #[test]
    fn app_boundary_splits_framework_and_app_slots() {
        assert!(ManagerId::Multicore.index() < ManagerId::APP_BOUNDARY);
        assert!(ManagerId::App0.index() >= ManagerId::APP_BOUNDARY);
    }
}
