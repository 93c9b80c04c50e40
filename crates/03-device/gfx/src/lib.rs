//! CPU surface operations for the frame pipeline.
//!
//! The camera manager drives everything here: converting a captured frame
//! into a requester's buffer with pixel-format conversion, nearest-neighbor
//! scaling between active rectangles, a single clockwise rotation tagged to
//! one side, mirroring, and optional overlay composition.
//!
//! The hardware 2D-accel path of the reference design is out of scope; this
//! is a straight scalar implementation with the same call surface.

mod convert;

pub use convert::{read_pixel, write_pixel};

use device_abi::{FlipMode, FrameDescriptor, PixelFormat, Rotation};
use thiserror::Error;

/// Errors surfaced by surface operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GfxError {
    /// A descriptor violates its own invariants.
    #[error("invalid surface descriptor")]
    BadDescriptor,

    /// The pixel data is smaller than the descriptor promises.
    #[error("surface buffer too small: have {have}, need {need}")]
    BufferTooSmall {
        /// Bytes available.
        have: usize,
        /// Bytes the descriptor requires.
        need: usize,
    },

    /// The destination format cannot be written by the scalar path.
    #[error("unsupported destination format {0:?}")]
    UnsupportedDest(PixelFormat),
}

/// Which surface a rotation is tagged to.
///
/// The tagged side's descriptor has its axes swapped by the caller; the
/// pixel transform itself only depends on the degree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotateTarget {
    /// The capture is stored rotated.
    Source,
    /// The requester wants rotated output.
    Dest,
}

/// A single rotation applied during a blit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RotateConfig {
    /// Side whose axes were swapped.
    pub target: RotateTarget,
    /// Clockwise degree.
    pub degree: Rotation,
}

/// Read-only pixel surface.
#[derive(Clone, Copy)]
pub struct Surface<'a> {
    /// Geometry and format.
    pub desc: FrameDescriptor,
    /// Pixel bytes, `pitch × height` long.
    pub data: &'a [u8],
}

/// Writable pixel surface.
pub struct SurfaceMut<'a> {
    /// Geometry and format.
    pub desc: FrameDescriptor,
    /// Pixel bytes, `pitch × height` long.
    pub data: &'a mut [u8],
}

fn check(desc: &FrameDescriptor, len: usize) -> Result<(), GfxError> {
    if !desc.is_valid() {
        return Err(GfxError::BadDescriptor);
    }
    let need = desc.byte_len();
    if len < need {
        return Err(GfxError::BufferTooSmall { have: len, need });
    }
    Ok(())
}

/// Maps a normalized destination coordinate back into the source, undoing
/// the clockwise rotation of the source content.
fn unrotate(degree: Rotation, u: f32, v: f32) -> (f32, f32) {
    match degree {
        Rotation::Deg0 => (u, v),
        Rotation::Deg90 => (v, 1.0 - u),
        Rotation::Deg180 => (1.0 - u, 1.0 - v),
        Rotation::Deg270 => (1.0 - v, u),
    }
}

/// Copies the source's active rectangle into the destination's active
/// rectangle with format conversion, nearest-neighbor scaling, one rotation
/// and mirroring.
pub fn blit(
    src: &Surface<'_>,
    dst: &mut SurfaceMut<'_>,
    rotate: Option<RotateConfig>,
    flip: FlipMode,
) -> Result<(), GfxError> {
    check(&src.desc, src.data.len())?;
    check(&dst.desc, dst.data.len())?;
    if matches!(dst.desc.format, PixelFormat::Uyvy422) {
        return Err(GfxError::UnsupportedDest(dst.desc.format));
    }

    let degree = rotate.map(|r| r.degree).unwrap_or(Rotation::Deg0);
    let (flip_h, flip_v) = match flip {
        FlipMode::None => (false, false),
        FlipMode::Horizontal => (true, false),
        FlipMode::Vertical => (false, true),
        FlipMode::Both => (true, true),
    };

    let dw = dst.desc.rect.width() as usize;
    let dh = dst.desc.rect.height() as usize;
    let sw = src.desc.rect.width() as f32;
    let sh = src.desc.rect.height() as f32;

    for dy in 0..dh {
        for dx in 0..dw {
            let mut u = (dx as f32 + 0.5) / dw as f32;
            let mut v = (dy as f32 + 0.5) / dh as f32;
            if flip_h {
                u = 1.0 - u;
            }
            if flip_v {
                v = 1.0 - v;
            }
            let (su, sv) = unrotate(degree, u, v);

            let sx = src.desc.rect.left as usize + ((su * sw) as usize).min(sw as usize - 1);
            let sy = src.desc.rect.top as usize + ((sv * sh) as usize).min(sh as usize - 1);
            let rgb = read_pixel(&src.desc, src.data, sx, sy);

            let tx = dst.desc.rect.left as usize + dx;
            let ty = dst.desc.rect.top as usize + dy;
            write_pixel(&dst.desc, dst.data, tx, ty, rgb);
        }
    }

    Ok(())
}

/// [`blit`] followed by overlay composition.
///
/// The overlay is drawn 1:1 at its active rectangle position. BGRA overlays
/// alpha-blend; for other formats a zero pixel is the transparency key.
pub fn compose(
    src: &Surface<'_>,
    overlay: &Surface<'_>,
    dst: &mut SurfaceMut<'_>,
    rotate: Option<RotateConfig>,
    flip: FlipMode,
) -> Result<(), GfxError> {
    blit(src, dst, rotate, flip)?;
    check(&overlay.desc, overlay.data.len())?;

    let rect = overlay.desc.rect;
    for oy in rect.top..=rect.bottom {
        for ox in rect.left..=rect.right {
            let (ox, oy) = (ox as usize, oy as usize);
            if ox >= dst.desc.width as usize || oy >= dst.desc.height as usize {
                continue;
            }
            match overlay.desc.format {
                PixelFormat::Bgra8888 => {
                    let off = oy * overlay.desc.pitch as usize + ox * 4;
                    let (b, g, r, a) = (
                        overlay.data[off],
                        overlay.data[off + 1],
                        overlay.data[off + 2],
                        overlay.data[off + 3],
                    );
                    if a == 0 {
                        continue;
                    }
                    if a == 0xFF {
                        write_pixel(&dst.desc, dst.data, ox, oy, (r, g, b));
                    } else {
                        let (dr, dg, db) = read_pixel(&dst.desc, dst.data, ox, oy);
                        let mix = |o: u8, d: u8| {
                            ((o as u16 * a as u16 + d as u16 * (255 - a as u16)) / 255) as u8
                        };
                        write_pixel(
                            &dst.desc,
                            dst.data,
                            ox,
                            oy,
                            (mix(r, dr), mix(g, dg), mix(b, db)),
                        );
                    }
                }
                _ => {
                    let rgb = read_pixel(&overlay.desc, overlay.data, ox, oy);
                    if rgb == (0, 0, 0) {
                        continue;
                    }
                    write_pixel(&dst.desc, dst.data, ox, oy, rgb);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_abi::FrameDescriptor;

    fn gray_surface(width: u16, height: u16, data: &[u8]) -> (FrameDescriptor, &[u8]) {
        (
            FrameDescriptor::packed(width, height, PixelFormat::Gray8, PixelFormat::Gray8),
            data,
        )
    }

    #[test]
    fn identity_blit_copies_pixels() {
        let src_data = [1u8, 2, 3, 4];
        let (src_desc, _) = gray_surface(2, 2, &src_data);
        let mut dst_data = [0u8; 4];
        let dst_desc = src_desc;

        blit(
            &Surface {
                desc: src_desc,
                data: &src_data,
            },
            &mut SurfaceMut {
                desc: dst_desc,
                data: &mut dst_data,
            },
            None,
            FlipMode::None,
        )
        .unwrap();

        assert_eq!(dst_data, src_data);
    }

    #[test]
    fn rotate_90_moves_corners() {
        // 2x2 source:
        //   1 2        3 1
        //   3 4  --->  4 2   (90° clockwise)
        let src_data = [1u8, 2, 3, 4];
        let (src_desc, _) = gray_surface(2, 2, &src_data);
        let mut dst_data = [0u8; 4];

        blit(
            &Surface {
                desc: src_desc,
                data: &src_data,
            },
            &mut SurfaceMut {
                desc: src_desc,
                data: &mut dst_data,
            },
            Some(RotateConfig {
                target: RotateTarget::Source,
                degree: Rotation::Deg90,
            }),
            FlipMode::None,
        )
        .unwrap();

        assert_eq!(dst_data, [3, 1, 4, 2]);
    }

    #[test]
    fn horizontal_flip_mirrors_rows() {
        let src_data = [1u8, 2, 3, 4];
        let (src_desc, _) = gray_surface(2, 2, &src_data);
        let mut dst_data = [0u8; 4];

        blit(
            &Surface {
                desc: src_desc,
                data: &src_data,
            },
            &mut SurfaceMut {
                desc: src_desc,
                data: &mut dst_data,
            },
            None,
            FlipMode::Horizontal,
        )
        .unwrap();

        assert_eq!(dst_data, [2, 1, 4, 3]);
    }

    #[test]
    fn uyvy_converts_to_rgb565() {
        // One UYVY pair encoding two mid-gray pixels (Y=128, U=V=128).
        let src_data = [128u8, 128, 128, 128];
        let src_desc = FrameDescriptor::packed(2, 1, PixelFormat::Uyvy422, PixelFormat::Uyvy422);
        let dst_desc = FrameDescriptor::packed(2, 1, PixelFormat::Rgb565, PixelFormat::Uyvy422);
        let mut dst_data = [0u8; 4];

        blit(
            &Surface {
                desc: src_desc,
                data: &src_data,
            },
            &mut SurfaceMut {
                desc: dst_desc,
                data: &mut dst_data,
            },
            None,
            FlipMode::None,
        )
        .unwrap();

        let px = u16::from_le_bytes([dst_data[0], dst_data[1]]);
        let r = ((px >> 11) & 0x1F) << 3;
        let g = ((px >> 5) & 0x3F) << 2;
        let b = (px & 0x1F) << 3;
        assert!((r as i32 - 128).abs() <= 8);
        assert!((g as i32 - 128).abs() <= 4);
        assert!((b as i32 - 128).abs() <= 8);
    }

    #[test]
    fn scaling_downsamples_nearest() {
        // 4x4 gradient down to 2x2.
        let src_data: Vec<u8> = (0..16).collect();
        let src_desc = FrameDescriptor::packed(4, 4, PixelFormat::Gray8, PixelFormat::Gray8);
        let dst_desc = FrameDescriptor::packed(2, 2, PixelFormat::Gray8, PixelFormat::Gray8);
        let mut dst_data = [0u8; 4];

        blit(
            &Surface {
                desc: src_desc,
                data: &src_data,
            },
            &mut SurfaceMut {
                desc: dst_desc,
                data: &mut dst_data,
            },
            None,
            FlipMode::None,
        )
        .unwrap();

        // Nearest-neighbor at pixel centers samples columns 1,3 / rows 1,3.
        assert_eq!(dst_data, [5, 7, 13, 15]);
    }

    #[test]
    fn compose_skips_transparent_overlay_pixels() {
        let src_data = [10u8, 10, 10, 10];
        let (desc, _) = gray_surface(2, 2, &src_data);
        // Overlay: one opaque white pixel at (0,0), rest keyed out.
        let overlay_data = [255u8, 0, 0, 0];
        let mut dst_data = [0u8; 4];

        compose(
            &Surface {
                desc,
                data: &src_data,
            },
            &Surface {
                desc,
                data: &overlay_data,
            },
            &mut SurfaceMut {
                desc,
                data: &mut dst_data,
            },
            None,
            FlipMode::None,
        )
        .unwrap();

        assert_eq!(dst_data, [255, 10, 10, 10]);
    }

    #[test]
    fn undersized_buffer_is_rejected() {
        let src_data = [0u8; 2];
        let desc = FrameDescriptor::packed(2, 2, PixelFormat::Gray8, PixelFormat::Gray8);
        let mut dst_data = [0u8; 4];

        let err = blit(
            &Surface {
                desc,
                data: &src_data,
            },
            &mut SurfaceMut {
                desc,
                data: &mut dst_data,
            },
            None,
            FlipMode::None,
        )
        .unwrap_err();

        assert_eq!(err, GfxError::BufferTooSmall { have: 2, need: 4 });
    }
}
