//! Panel color model and source-buffer pixel layouts.
//!
//! The panel itself consumes little-endian RGB565. The transfer API accepts
//! [`Color`] (24-bit RGB) and packs it with [`rgb565`]; buffers handed to the
//! rectangle blit describe their own packing via [`PixelLayout`].

use embedded_graphics_core::pixelcolor::{Rgb888, RgbColor};

/// Color type accepted by the transfer API.
pub type Color = Rgb888;

/// Pack a color into the panel's native RGB565 representation.
///
/// Red occupies the top 5 bits, green the middle 6, blue the low 5.
pub fn rgb565(color: Color) -> u16 {
    (u16::from(color.r() & 0xF8) << 8) | (u16::from(color.g() & 0xFC) << 3) | u16::from(color.b() >> 3)
}

/// [`rgb565`] as the two little-endian bytes the panel consumes.
pub fn rgb565_bytes(color: Color) -> [u8; 2] {
    rgb565(color).to_le_bytes()
}

// ---------------------------------------------------------------------------
// Source-buffer layout
// ---------------------------------------------------------------------------

/// Channel order of pixels in a source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorOrder {
    Rgb,
    Bgr,
}

/// Bit depth of pixels in a source buffer.
///
/// Names the bit allocation only; [`ColorOrder`] says which channel sits in
/// the high bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorBitness {
    /// 8-bit, 3-3-2 allocation.
    B332,
    /// 16-bit, 5-6-5 allocation.
    B565,
    /// 24-bit, one byte per channel.
    B888,
}

impl ColorBitness {
    pub const fn bytes_per_pixel(&self) -> usize {
        match self {
            ColorBitness::B332 => 1,
            ColorBitness::B565 => 2,
            ColorBitness::B888 => 3,
        }
    }
}

/// How pixel data is packed in a buffer passed to the rectangle blit.
///
/// Rows may carry `x_offset` undrawn pixels on the left and `x_pad` on the
/// right, so the row stride is `x_offset + width + x_pad` pixels; `y_offset`
/// whole rows at the start of the buffer are skipped. The `big_endian` flag
/// applies to the multi-byte [`B565`](ColorBitness::B565) packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelLayout {
    pub order: ColorOrder,
    pub bitness: ColorBitness,
    pub big_endian: bool,
    pub x_offset: usize,
    pub y_offset: usize,
    pub x_pad: usize,
}

impl Default for PixelLayout {
    /// The panel's native layout: tightly packed little-endian RGB565.
    fn default() -> Self {
        Self {
            order: ColorOrder::Rgb,
            bitness: ColorBitness::B565,
            big_endian: false,
            x_offset: 0,
            y_offset: 0,
            x_pad: 0,
        }
    }
}

impl PixelLayout {
    /// Whether a buffer in this layout can be handed to the panel verbatim:
    /// native RGB565 byte order with no gaps or skipped rows.
    pub fn is_native_tight(&self) -> bool {
        self.order == ColorOrder::Rgb
            && self.bitness == ColorBitness::B565
            && !self.big_endian
            && self.x_offset == 0
            && self.y_offset == 0
            && self.x_pad == 0
    }

    /// Decode the pixel at `(x, y)` of a `width`-pixel-wide rectangle from
    /// `data`. Returns `None` when the pixel lies outside `data`.
    ///
    /// Sub-byte channels are widened by plain shifts, so decoding RGB565
    /// data and re-packing it with [`rgb565`] is lossless.
    pub fn decode(&self, data: &[u8], width: usize, x: usize, y: usize) -> Option<Color> {
        let bpp = self.bitness.bytes_per_pixel();
        let stride = self.x_offset + width + self.x_pad;
        let index = (self.y_offset + y) * stride + self.x_offset + x;
        let bytes = data.get(index * bpp..index * bpp + bpp)?;

        let (r, g, b) = match self.bitness {
            ColorBitness::B332 => {
                let raw = bytes[0];
                ((raw >> 5) << 5, ((raw >> 2) & 0x07) << 5, (raw & 0x03) << 6)
            }
            ColorBitness::B565 => {
                let raw = if self.big_endian {
                    u16::from_be_bytes([bytes[0], bytes[1]])
                } else {
                    u16::from_le_bytes([bytes[0], bytes[1]])
                };
                (
                    ((raw >> 11) as u8) << 3,
                    (((raw >> 5) & 0x3F) as u8) << 2,
                    ((raw & 0x1F) as u8) << 3,
                )
            }
            ColorBitness::B888 => (bytes[0], bytes[1], bytes[2]),
        };

        Some(match self.order {
            ColorOrder::Rgb => Color::new(r, g, b),
            ColorOrder::Bgr => Color::new(b, g, r),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_primaries_into_565() {
        assert_eq!(rgb565(Color::new(255, 0, 0)), 0xF800);
        assert_eq!(rgb565(Color::new(0, 255, 0)), 0x07E0);
        assert_eq!(rgb565(Color::new(0, 0, 255)), 0x001F);
        assert_eq!(rgb565(Color::new(255, 255, 255)), 0xFFFF);
        assert_eq!(rgb565(Color::new(0, 0, 0)), 0x0000);
    }

    #[test]
    fn masked_channels_round_trip_through_565() {
        // Any (0xF8, 0xFC, 0xF8)-masked color survives pack + decode.
        let layout = PixelLayout::default();
        for (r, g, b) in [(0xF8, 0x04, 0x10), (0x08, 0xFC, 0x00), (0x00, 0x00, 0xF8)] {
            let color = Color::new(r, g, b);
            let bytes = rgb565_bytes(color);
            let decoded = layout.decode(&bytes, 1, 0, 0).unwrap();
            assert_eq!(decoded, color);
        }
    }

    #[test]
    fn packed_bytes_are_little_endian() {
        // Low byte first, regardless of host endianness.
        assert_eq!(rgb565_bytes(Color::new(255, 0, 0)), [0x00, 0xF8]);
        assert_eq!(rgb565_bytes(Color::new(0, 255, 0)), [0xE0, 0x07]);
        assert_eq!(rgb565_bytes(Color::new(0, 0, 255)), [0x1F, 0x00]);
    }

    #[test]
    fn native_tight_is_the_default_layout() {
        assert!(PixelLayout::default().is_native_tight());
    }

    #[test]
    fn offsets_padding_and_format_changes_break_tightness() {
        let tight = PixelLayout::default();
        assert!(!PixelLayout { x_offset: 1, ..tight }.is_native_tight());
        assert!(!PixelLayout { y_offset: 1, ..tight }.is_native_tight());
        assert!(!PixelLayout { x_pad: 3, ..tight }.is_native_tight());
        assert!(!PixelLayout { big_endian: true, ..tight }.is_native_tight());
        assert!(!PixelLayout { bitness: ColorBitness::B888, ..tight }.is_native_tight());
        assert!(!PixelLayout { order: ColorOrder::Bgr, ..tight }.is_native_tight());
    }

    #[test]
    fn decodes_padded_565_rows() {
        // 2x2 rectangle, stride 1 (offset) + 2 (drawn) + 1 (pad) = 4 pixels.
        let layout = PixelLayout {
            x_offset: 1,
            x_pad: 1,
            ..PixelLayout::default()
        };
        let red = 0xF800u16.to_le_bytes();
        let blue = 0x001Fu16.to_le_bytes();
        let junk = 0xAAAAu16.to_le_bytes();
        let mut data = alloc_row(&[junk, red, blue, junk]);
        data.extend_from_slice(&alloc_row(&[junk, blue, red, junk]));

        assert_eq!(layout.decode(&data, 2, 0, 0), Some(Color::new(248, 0, 0)));
        assert_eq!(layout.decode(&data, 2, 1, 0), Some(Color::new(0, 0, 248)));
        assert_eq!(layout.decode(&data, 2, 0, 1), Some(Color::new(0, 0, 248)));
        assert_eq!(layout.decode(&data, 2, 1, 1), Some(Color::new(248, 0, 0)));
        assert_eq!(layout.decode(&data, 2, 0, 2), None);
    }

    #[test]
    fn decodes_big_endian_565() {
        let layout = PixelLayout {
            big_endian: true,
            ..PixelLayout::default()
        };
        let data = 0xF800u16.to_be_bytes();
        assert_eq!(layout.decode(&data, 1, 0, 0), Some(Color::new(248, 0, 0)));
    }

    #[test]
    fn decodes_bgr888_with_skipped_rows() {
        let layout = PixelLayout {
            order: ColorOrder::Bgr,
            bitness: ColorBitness::B888,
            y_offset: 1,
            ..PixelLayout::default()
        };
        // One skipped row, then a single pixel stored as B, G, R.
        let data = [0u8, 0, 0, 10, 20, 30];
        assert_eq!(layout.decode(&data, 1, 0, 0), Some(Color::new(30, 20, 10)));
    }

    #[test]
    fn decodes_332() {
        let layout = PixelLayout {
            bitness: ColorBitness::B332,
            ..PixelLayout::default()
        };
        // 0b111_000_00: full red, no green, no blue.
        assert_eq!(layout.decode(&[0b1110_0000], 1, 0, 0), Some(Color::new(224, 0, 0)));
        // 0b000_111_11: no red, full green, full blue.
        assert_eq!(layout.decode(&[0b0001_1111], 1, 0, 0), Some(Color::new(0, 224, 192)));
    }

    fn alloc_row(pixels: &[[u8; 2]]) -> Vec<u8> {
        pixels.iter().flatten().copied().collect()
    }
}
