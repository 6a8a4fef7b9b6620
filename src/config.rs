//! Panel configuration.
//!
//! The `Default` values are the bit-exact contract with the Waveshare 8.8"
//! panel and its OTA7290B bridge, taken from the vendor BSP. Builder methods
//! cover the handful of values that can differ between board revisions;
//! everything else is fixed by the hardware.

use crate::rotation::{Dimensions, Rotation};

/// Native horizontal resolution in pixels.
pub const PANEL_WIDTH: u32 = 480;
/// Native vertical resolution in pixels.
pub const PANEL_HEIGHT: u32 = 1920;
/// Bytes per pixel of the native RGB565 format.
pub const BYTES_PER_PIXEL: usize = 2;

/// The panel's physical extents.
pub const fn physical_dimensions() -> Dimensions {
    Dimensions::new(PANEL_WIDTH, PANEL_HEIGHT)
}

/// MIPI-DSI bus parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    pub num_data_lanes: u8,
    pub lane_bit_rate_mbps: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            num_data_lanes: 2,
            lane_bit_rate_mbps: 1300,
        }
    }
}

/// DBI command-channel parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandConfig {
    pub virtual_channel: u8,
    pub cmd_bits: u8,
    pub param_bits: u8,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            virtual_channel: 0,
            cmd_bits: 8,
            param_bits: 8,
        }
    }
}

/// DPI video-engine parameters.
///
/// The sync/porch constants come straight from the vendor BSP; the engine
/// scans 480x1920 RGB565 out of a single frame buffer at a 75 MHz pixel
/// clock with DMA2D composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConfig {
    pub virtual_channel: u8,
    pub pixel_clock_mhz: u32,
    pub h_size: u32,
    pub v_size: u32,
    pub hsync_pulse_width: u32,
    pub hsync_back_porch: u32,
    pub hsync_front_porch: u32,
    pub vsync_pulse_width: u32,
    pub vsync_back_porch: u32,
    pub vsync_front_porch: u32,
    pub num_frame_buffers: u8,
    pub use_dma2d: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            virtual_channel: 0,
            pixel_clock_mhz: 75,
            h_size: PANEL_WIDTH,
            v_size: PANEL_HEIGHT,
            hsync_pulse_width: 50,
            hsync_back_porch: 50,
            hsync_front_porch: 50,
            vsync_pulse_width: 20,
            vsync_back_porch: 20,
            vsync_front_porch: 20,
            num_frame_buffers: 1,
            use_dma2d: true,
        }
    }
}

/// Complete panel configuration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PanelConfig {
    pub bus: BusConfig,
    pub command: CommandConfig,
    pub video: VideoConfig,
    pub rotation: Rotation,
}

impl PanelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display rotation (default: [`Rotation::Deg0`]).
    #[must_use]
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the number of DSI data lanes (default: 2).
    #[must_use]
    pub fn num_data_lanes(mut self, num_data_lanes: u8) -> Self {
        self.bus.num_data_lanes = num_data_lanes;
        self
    }

    /// Set the DSI lane bit rate in Mbps (default: 1300).
    #[must_use]
    pub fn lane_bit_rate_mbps(mut self, lane_bit_rate_mbps: u32) -> Self {
        self.bus.lane_bit_rate_mbps = lane_bit_rate_mbps;
        self
    }

    /// Set the DPI pixel clock in MHz (default: 75).
    #[must_use]
    pub fn pixel_clock_mhz(mut self, pixel_clock_mhz: u32) -> Self {
        self.video.pixel_clock_mhz = pixel_clock_mhz;
        self
    }

    /// Set the virtual channel ID (default: 0).
    ///
    /// This sets the virtual channel for both the command channel and the
    /// video engine.
    #[must_use]
    pub fn virtual_channel(mut self, virtual_channel: u8) -> Self {
        self.command.virtual_channel = virtual_channel;
        self.video.virtual_channel = virtual_channel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_the_panel_contract() {
        let config = PanelConfig::default();

        assert_eq!(config.bus.num_data_lanes, 2);
        assert_eq!(config.bus.lane_bit_rate_mbps, 1300);

        assert_eq!(config.command.virtual_channel, 0);
        assert_eq!(config.command.cmd_bits, 8);
        assert_eq!(config.command.param_bits, 8);

        assert_eq!(config.video.pixel_clock_mhz, 75);
        assert_eq!((config.video.h_size, config.video.v_size), (480, 1920));
        assert_eq!(
            (
                config.video.hsync_pulse_width,
                config.video.hsync_back_porch,
                config.video.hsync_front_porch,
            ),
            (50, 50, 50)
        );
        assert_eq!(
            (
                config.video.vsync_pulse_width,
                config.video.vsync_back_porch,
                config.video.vsync_front_porch,
            ),
            (20, 20, 20)
        );
        assert_eq!(config.video.num_frame_buffers, 1);
        assert!(config.video.use_dma2d);

        assert_eq!(config.rotation, Rotation::Deg0);
    }

    #[test]
    fn builders_reach_the_nested_fields() {
        let config = PanelConfig::new()
            .rotation(Rotation::Deg90)
            .virtual_channel(1)
            .pixel_clock_mhz(60);

        assert_eq!(config.rotation, Rotation::Deg90);
        assert_eq!(config.command.virtual_channel, 1);
        assert_eq!(config.video.virtual_channel, 1);
        assert_eq!(config.video.pixel_clock_mhz, 60);
    }
}
