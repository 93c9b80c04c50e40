//! Companion low-power-control MCU wire protocol.
//!
//! Line-oriented ASCII over UART. The host requests low power with
//! `AT+PWOFFREQ=`; the companion answers with `AT+…` response lines. A line
//! is complete when its last two bytes are CR+LF in either orientation —
//! the peer firmware emits both in the field, so both are accepted.
//! Responses are matched case-folded by substring, with FAIL variants tried
//! before their payload-bearing fallbacks.

use log::debug;

/// Receive buffer size; the assembler wraps on overflow.
pub const RX_BUFFER_SIZE: usize = 256;

/// The host's low-power request line.
pub const POWER_OFF_REQUEST: &str = "AT+PWOFFREQ=\r\n";

/// Byte-at-a-time line assembler with a wrapping buffer.
pub struct LineAssembler {
    buf: [u8; RX_BUFFER_SIZE],
    index: usize,
}

impl LineAssembler {
    /// An empty assembler.
    pub fn new() -> Self {
        Self {
            buf: [0; RX_BUFFER_SIZE],
            index: 0,
        }
    }

    /// Feeds one received byte; returns the completed line (terminator
    /// included) when the last two bytes form a CR/LF pair.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        self.buf[self.index] = byte;
        self.index += 1;
        if self.index == RX_BUFFER_SIZE {
            self.index = 0;
        }

        if self.index >= 2 {
            let last = self.buf[self.index - 1];
            let prev = self.buf[self.index - 2];
            if (prev == b'\r' && last == b'\n') || (prev == b'\n' && last == b'\r') {
                let line = self.buf[..self.index].to_vec();
                self.reset();
                return Some(line);
            }
        }
        None
    }

    /// Discards any partial line.
    pub fn reset(&mut self) {
        self.index = 0;
        self.buf.fill(0);
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a face registration exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegStatus {
    /// Registration succeeded.
    Ok,
    /// The face already exists.
    Duplicate,
    /// Registration failed.
    Fail,
    /// Payload-bearing registration data.
    Payload(String),
}

/// A recognized companion response line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FaceIdResponse {
    /// The companion acknowledges the power-off request.
    PowerOffAck,
    /// The companion refuses the power-off request.
    PowerOffNack,
    /// Face recognition failed.
    FaceInvalid,
    /// Face recognition succeeded; payload identifies the user.
    FaceValid(String),
    /// Registration result; recognized but not dispatched.
    Registration(RegStatus),
    /// Deregistration completed; recognized but not dispatched.
    Deregistration,
    /// Deletion result; recognized but not dispatched.
    Deletion {
        /// Whether the deletion succeeded.
        success: bool,
    },
    /// Remote registration result; recognized but not dispatched.
    RemoteRegistration(RegStatus),
}

/// Events the parser surfaces to the application's control loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FaceIdEvent {
    /// Power-off acknowledged; safe to cut the rail.
    PowerOffAck,
    /// Power-off refused.
    PowerOffNack,
    /// An unknown face was seen.
    FaceInvalid,
    /// A known face was seen.
    FaceValid(String),
}

/// Uppercases the command part of a line, stopping at `=` so payload case
/// is preserved.
fn fold_command(line: &[u8]) -> Vec<u8> {
    let mut folded = line.to_vec();
    for byte in folded.iter_mut() {
        if *byte == b'=' {
            break;
        }
        byte.make_ascii_uppercase();
    }
    folded
}

fn find(line: &[u8], needle: &[u8]) -> Option<usize> {
    line.windows(needle.len()).position(|w| w == needle)
}

fn payload_after(line: &[u8], needle: &[u8]) -> String {
    let start = find(line, needle).map(|at| at + needle.len()).unwrap_or(0);
    let tail = &line[start..];
    let end = tail
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(tail.len());
    String::from_utf8_lossy(&tail[..end]).into_owned()
}

/// Parses one completed line into a response, matching in the companion
/// firmware's order: power-off, recognition (FAIL before payload),
/// registration, deletion, remote registration.
pub fn parse_response(line: &[u8]) -> Option<FaceIdResponse> {
    let line = fold_command(line);

    if find(&line, b"AT+PWOFFRSP=ACK").is_some() {
        return Some(FaceIdResponse::PowerOffAck);
    }
    if find(&line, b"AT+PWOFFRSP=NACK").is_some() {
        return Some(FaceIdResponse::PowerOffNack);
    }

    if find(&line, b"AT+FACERES=FAIL").is_some() {
        return Some(FaceIdResponse::FaceInvalid);
    }
    if find(&line, b"AT+FACERES=").is_some() {
        return Some(FaceIdResponse::FaceValid(payload_after(
            &line,
            b"AT+FACERES=",
        )));
    }

    if find(&line, b"AT+FACEREG=OK").is_some() {
        return Some(FaceIdResponse::Registration(RegStatus::Ok));
    }
    if find(&line, b"AT+FACEREG=DUPLICATE").is_some() {
        return Some(FaceIdResponse::Registration(RegStatus::Duplicate));
    }
    if find(&line, b"AT+FACEREG=FAIL").is_some() {
        return Some(FaceIdResponse::Registration(RegStatus::Fail));
    }
    if find(&line, b"AT+FACEREG=").is_some() {
        return Some(FaceIdResponse::Registration(RegStatus::Payload(
            payload_after(&line, b"AT+FACEREG="),
        )));
    }

    if find(&line, b"AT+FACEDREG=OK").is_some() {
        return Some(FaceIdResponse::Deregistration);
    }
    if find(&line, b"AT+FACEDEL=SUCCESS").is_some() {
        return Some(FaceIdResponse::Deletion { success: true });
    }
    if find(&line, b"AT+FACEDEL=FAIL").is_some() {
        return Some(FaceIdResponse::Deletion { success: false });
    }

    if find(&line, b"AT+FACERREG=DUPLICATE").is_some() {
        return Some(FaceIdResponse::RemoteRegistration(RegStatus::Duplicate));
    }
    if find(&line, b"AT+FACERREG=OK").is_some() {
        return Some(FaceIdResponse::RemoteRegistration(RegStatus::Ok));
    }
    if find(&line, b"AT+FACERREG=FAIL").is_some() {
        return Some(FaceIdResponse::RemoteRegistration(RegStatus::Fail));
    }
    if find(&line, b"AT+FACERREG=").is_some() {
        return Some(FaceIdResponse::RemoteRegistration(RegStatus::Payload(
            payload_after(&line, b"AT+FACERREG="),
        )));
    }

    debug!("unrecognized companion line ({} bytes)", line.len());
    None
}

/// Maps a response to a control-loop event; registration and deletion
/// results are consumed silently.
pub fn dispatch_event(response: &FaceIdResponse) -> Option<FaceIdEvent> {
    match response {
        FaceIdResponse::PowerOffAck => Some(FaceIdEvent::PowerOffAck),
        FaceIdResponse::PowerOffNack => Some(FaceIdEvent::PowerOffNack),
        FaceIdResponse::FaceInvalid => Some(FaceIdEvent::FaceInvalid),
        FaceIdResponse::FaceValid(payload) => Some(FaceIdEvent::FaceValid(payload.clone())),
        _ => None,
    }
}
