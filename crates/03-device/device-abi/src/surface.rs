//! Pixel-buffer vocabulary: formats, rotation, flips, frame descriptors.

use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;

/// Pixel formats understood by the frame pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed YUV 4:2:2, U0 Y0 V0 Y1 byte order, 2 bytes per pixel.
    Uyvy422,
    /// 16-bit RGB, 5-6-5 little endian.
    Rgb565,
    /// 24-bit RGB, R first.
    Rgb888,
    /// 32-bit BGRA.
    Bgra8888,
    /// 8-bit luminance.
    Gray8,
}

impl PixelFormat {
    /// Storage size of one pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Uyvy422 | PixelFormat::Rgb565 => 2,
            PixelFormat::Rgb888 => 3,
            PixelFormat::Bgra8888 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Clockwise rotation applied to a surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    /// No rotation.
    #[default]
    Deg0,
    /// 90° clockwise.
    Deg90,
    /// 180°.
    Deg180,
    /// 270° clockwise.
    Deg270,
}

impl Rotation {
    /// Whether this rotation swaps a surface's width and height.
    pub const fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// Mirroring applied during a blit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlipMode {
    /// No mirroring.
    #[default]
    None,
    /// Mirror around the vertical axis.
    Horizontal,
    /// Mirror around the horizontal axis.
    Vertical,
    /// Mirror around both axes.
    Both,
}

/// Active rectangle of a surface, inclusive edge coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActiveRect {
    /// Leftmost active column.
    pub left: u16,
    /// Topmost active row.
    pub top: u16,
    /// Rightmost active column (inclusive).
    pub right: u16,
    /// Bottom active row (inclusive).
    pub bottom: u16,
}

impl ActiveRect {
    /// Rectangle covering a full `width` × `height` surface.
    pub const fn full(width: u16, height: u16) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width.saturating_sub(1),
            bottom: height.saturating_sub(1),
        }
    }

    /// Active width in pixels.
    pub const fn width(&self) -> u16 {
        self.right - self.left + 1
    }

    /// Active height in pixels.
    pub const fn height(&self) -> u16 {
        self.bottom - self.top + 1
    }

    /// The same rectangle with its axes exchanged, as needed when a 90°/270°
    /// rotation swaps a surface's width and height.
    pub const fn transposed(&self) -> Self {
        Self {
            left: self.top,
            top: self.left,
            right: self.bottom,
            bottom: self.right,
        }
    }
}

/// Geometry and format of one frame.
///
/// Invariants: `left <= right < width`, `top <= bottom < height`, and
/// `pitch >= width * bytes_per_pixel(format)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameDescriptor {
    /// Surface width in pixels.
    pub width: u16,
    /// Surface height in pixels.
    pub height: u16,
    /// Row stride in bytes.
    pub pitch: u32,
    /// Active rectangle within the surface.
    pub rect: ActiveRect,
    /// Rotation carried by (capture) or wanted on (request) this frame.
    pub rotate: Rotation,
    /// Mirroring to apply.
    pub flip: FlipMode,
    /// Swap the two bytes of every 16-bit pixel during conversion.
    pub swap_bytes: bool,
    /// Pixel format of this surface.
    pub format: PixelFormat,
    /// Source pixel format this request matches against; for captures, the
    /// format the sensor actually produced.
    pub src_format: PixelFormat,
}

impl FrameDescriptor {
    /// Descriptor for a tightly packed full-frame surface.
    pub fn packed(width: u16, height: u16, format: PixelFormat, src_format: PixelFormat) -> Self {
        Self {
            width,
            height,
            pitch: width as u32 * format.bytes_per_pixel() as u32,
            rect: ActiveRect::full(width, height),
            rotate: Rotation::Deg0,
            flip: FlipMode::None,
            swap_bytes: false,
            format,
            src_format,
        }
    }

    /// Total byte size of the surface.
    pub fn byte_len(&self) -> usize {
        self.pitch as usize * self.height as usize
    }

    /// Checks the descriptor invariants.
    pub fn is_valid(&self) -> bool {
        self.rect.left <= self.rect.right
            && self.rect.right < self.width
            && self.rect.top <= self.rect.bottom
            && self.rect.bottom < self.height
            && self.pitch as usize >= self.width as usize * self.format.bytes_per_pixel()
    }
}

/// Shared mutable pixel buffer.
///
/// A requester hands one of these to the camera manager inside a frame
/// request; the camera manager writes the converted frame into it and posts
/// it back. Cloning shares the underlying storage.
#[derive(Clone)]
pub struct FrameBuffer {
    data: Arc<Mutex<Vec<u8>>>,
}

impl FrameBuffer {
    /// Allocates a zero-filled buffer of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Self {
            data: Arc::new(Mutex::new(vec![0; len])),
        }
    }

    /// Wraps existing pixel data.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
        }
    }

    /// Locks the pixels for reading or writing.
    pub fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.data.lock()
    }

    /// Byte length of the buffer.
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether two handles share the same storage.
    pub fn ptr_eq(&self, other: &FrameBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("len", &self.len())
            .finish()
    }
}
