//! `embedded-graphics` [`DrawTarget`] wrapper for [`PanelDriver`].
//!
//! Bulk operations are routed through the driver's accelerated paths: a
//! full-panel solid fill becomes [`PanelDriver::fill`], any other fully
//! visible rectangle becomes a single [`PanelDriver::draw_pixels_at`]
//! blit, and everything else falls back to per-pixel writes.
//!
//! Coordinates address the physical 480x1920 grid. [`size()`] reports the
//! rotation-adjusted logical extents for layout; the adapter does not
//! transform coordinates itself, so a renderer targeting a rotated surface
//! must rotate its output before drawing.
//!
//! [`size()`]: OriginDimensions::size

use core::convert::Infallible;

use embedded_graphics_core::draw_target::DrawTarget;
use embedded_graphics_core::geometry::{OriginDimensions, Size};
use embedded_graphics_core::primitives::{PointsIter, Rectangle};
use embedded_graphics_core::Pixel;

use crate::color::{self, Color, PixelLayout};
use crate::config::BYTES_PER_PIXEL;
use crate::driver::PanelDriver;
use crate::link::PanelLink;

/// `embedded-graphics` draw target created by [`PanelDriver::display`].
pub struct PanelDisplay<'a, L: PanelLink> {
    driver: &'a mut PanelDriver<L>,
}

impl<'a, L: PanelLink> PanelDisplay<'a, L> {
    pub(crate) fn new(driver: &'a mut PanelDriver<L>) -> Self {
        Self { driver }
    }

    /// Present the drawn frame.
    ///
    /// The DPI engine scans the frame buffer out continuously and every
    /// draw call transfers eagerly, so there is nothing to do here. The
    /// method exists so frame-loop code can stay target-agnostic.
    pub fn flush(&mut self) {}

    fn bounds(&self) -> Rectangle {
        let dims = self.driver.physical_dimensions();
        Rectangle::new(
            embedded_graphics_core::geometry::Point::zero(),
            Size::new(dims.width, dims.height),
        )
    }

    /// Solid-fill an in-bounds rectangle with one blit.
    fn fill_rect(&mut self, area: &Rectangle, color: Color) {
        let width = area.size.width as usize;
        let height = area.size.height as usize;
        let pixel = color::rgb565_bytes(color);

        let mut data = alloc::vec![0u8; width * height * BYTES_PER_PIXEL];
        for chunk in data.chunks_exact_mut(BYTES_PER_PIXEL) {
            chunk.copy_from_slice(&pixel);
        }

        self.driver.draw_pixels_at(
            area.top_left.x,
            area.top_left.y,
            area.size.width,
            area.size.height,
            &data,
            &PixelLayout::default(),
        );
    }
}

impl<L: PanelLink> OriginDimensions for PanelDisplay<'_, L> {
    fn size(&self) -> Size {
        let dims = self.driver.logical_dimensions();
        Size::new(dims.width, dims.height)
    }
}

impl<L: PanelLink> DrawTarget for PanelDisplay<'_, L> {
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.driver.draw_pixel_at(point.x, point.y, color);
        }
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        let bounds = self.bounds();
        let fully_visible = match area.bottom_right() {
            Some(bottom_right) => {
                bounds.contains(area.top_left) && bounds.contains(bottom_right)
            }
            None => false,
        };
        if !fully_visible {
            // Partially clipped (or empty) areas go through the pixel
            // path, which drops out-of-bounds writes itself.
            return self.draw_iter(
                area.points()
                    .zip(colors)
                    .map(|(point, color)| Pixel(point, color)),
            );
        }

        let width = area.size.width as usize;
        let height = area.size.height as usize;
        let mut data = alloc::vec::Vec::with_capacity(width * height * BYTES_PER_PIXEL);
        for color in colors.into_iter().take(width * height) {
            data.extend_from_slice(&color::rgb565_bytes(color));
        }

        if data.len() == width * height * BYTES_PER_PIXEL {
            self.driver.draw_pixels_at(
                area.top_left.x,
                area.top_left.y,
                area.size.width,
                area.size.height,
                &data,
                &PixelLayout::default(),
            );
        } else {
            // The iterator ran short: draw the produced prefix only.
            let layout = PixelLayout::default();
            for i in 0..data.len() / BYTES_PER_PIXEL {
                if let Some(color) = layout.decode(&data, width, i % width, i / width) {
                    self.driver.draw_pixel_at(
                        area.top_left.x + (i % width) as i32,
                        area.top_left.y + (i / width) as i32,
                        color,
                    );
                }
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let bounds = self.bounds();
        let area = area.intersection(&bounds);
        if area.size.width == 0 || area.size.height == 0 {
            return Ok(());
        }
        if area == bounds {
            self.driver.fill(color);
            return Ok(());
        }
        self.fill_rect(&area, color);
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.driver.fill(color);
        Ok(())
    }
}
