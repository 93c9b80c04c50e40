//! Reference and mock HAL devices.
//!
//! Everything a test bench or demo needs to exercise the framework without
//! hardware: a scripted camera, a framebuffer panel, a push-button input, a
//! pass-through acoustic front-end, scripted recognition engines, a speaker
//! with the production gain curve, and the reference face database.

mod afe;
mod asr;
mod camera;
mod display;
mod facedb;
mod input;
mod output;
mod speaker;

pub use afe::PassThroughAfe;
pub use asr::{ScriptedCommand, ScriptedWakeWord};
pub use camera::{CameraTrigger, ScriptedCamera};
pub use display::PanelDisplay;
pub use facedb::{FaceDb, FaceDbError, FaceRecord, MemoryFaceDb, FACE_NAME_MAX_LEN, INVALID_FACE_ID, MAX_FACE_DB_SIZE};
pub use input::{InputInjector, PushInput};
pub use output::NullOutput;
pub use speaker::{volume_gain, MqsSpeaker};
