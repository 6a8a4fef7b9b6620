//! Panel driver: bring-up sequencer, transfer synchronization and the
//! pixel-transfer entry points.
//!
//! Bring-up is order-critical. The DBI wake commands must go out after the
//! video engine exists but before it starts streaming, each followed by its
//! mandatory settle delay, and no reset opcode may ever be sent (the
//! upstream bridge chip would lose its I2C-programmed state). Once the
//! stream is running, every transfer is a DMA2D copy into the scanned-out
//! frame buffer, serialized against the previous one through the
//! transfer-completion signal.
//!
//! The transfer methods take `&mut self`, so exclusive access is a
//! compile-time property for a single driver value. Callers that share a
//! driver across tasks must wrap it in their own mutex; the completion
//! signal alone does not make concurrent transfers safe.

use core::fmt;

use embedded_graphics_core::pixelcolor::RgbColor;
use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::color::{self, Color, PixelLayout};
use crate::config::{self, PanelConfig, BYTES_PER_PIXEL, PANEL_HEIGHT, PANEL_WIDTH};
use crate::link::{
    dcs, LinkError, PanelLink, WaitOutcome, FILL_XFER_TIMEOUT, PIXEL_XFER_TIMEOUT,
    RECT_XFER_TIMEOUT,
};
use crate::rotation::{Dimensions, Rotation};

/// Color capability classes a panel can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    Binary,
    Grayscale,
    FullColor,
}

/// Bring-up step at which a fatal failure can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringUpStage {
    Bus,
    CommandChannel,
    VideoEngine,
    StreamStart,
}

impl fmt::Display for BringUpStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BringUpStage::Bus => "DSI bus creation",
            BringUpStage::CommandChannel => "command channel creation",
            BringUpStage::VideoEngine => "video engine creation",
            BringUpStage::StreamStart => "video stream start",
        };
        f.write_str(name)
    }
}

/// Error returned by [`PanelDriver::initialize`]. The same stage is latched
/// into [`DriverState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BringUpError {
    pub stage: BringUpStage,
    pub source: LinkError,
}

impl fmt::Display for BringUpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.source)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BringUpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Bring-up progress.
///
/// Transfers are live from [`StreamingStarted`](DriverState::StreamingStarted)
/// onward; [`Failed`](DriverState::Failed) is terminal and turns every
/// transfer into a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    BusReady,
    CommandChannelReady,
    EngineConfigured,
    PanelAwake,
    StreamingStarted,
    SyncReady,
    Cleared,
    Ready,
    Failed(BringUpStage),
}

/// Driver for the Waveshare 8.8" 480x1920 MIPI-DSI panel.
///
/// Generic over the [`PanelLink`] seam so the sequencing and transfer logic
/// runs in host tests; on device, instantiate it with
/// [`EspDsiLink`](crate::esp::EspDsiLink).
pub struct PanelDriver<L: PanelLink> {
    link: L,
    config: PanelConfig,
    state: DriverState,
}

impl<L: PanelLink> PanelDriver<L> {
    /// Wrap `link` with the given configuration. No hardware is touched
    /// until [`initialize`](Self::initialize).
    pub fn new(link: L, config: PanelConfig) -> Self {
        Self {
            link,
            config,
            state: DriverState::Uninitialized,
        }
    }

    /// Bring the panel up.
    ///
    /// Runs the ordered sequence: DSI bus, DBI command channel, DPI video
    /// engine, SLPOUT/DISPON wake commands with their settle delays, video
    /// stream start, completion-signal arming, and an initial clear to
    /// black. Bus, channel, engine and stream-start failures are fatal and
    /// latch [`DriverState::Failed`]; wake-command and signal-arming
    /// failures are logged warnings.
    ///
    /// Must be called once. Later calls log a warning and leave the driver
    /// unchanged.
    pub fn initialize(&mut self, delay: &mut impl DelayNs) -> Result<(), BringUpError> {
        if self.state != DriverState::Uninitialized {
            warn!("initialize() called again (state {:?}), ignoring", self.state);
            return Ok(());
        }

        let bus = self.config.bus;
        info!(
            "step 1: creating DSI bus ({} lanes, {} Mbps)",
            bus.num_data_lanes, bus.lane_bit_rate_mbps
        );
        if let Err(e) = self.link.create_bus(&bus) {
            return Err(self.fatal(BringUpStage::Bus, e));
        }
        self.state = DriverState::BusReady;

        let command = self.config.command;
        info!(
            "step 2: creating DBI command channel (virtual channel {})",
            command.virtual_channel
        );
        if let Err(e) = self.link.create_command_channel(&command) {
            return Err(self.fatal(BringUpStage::CommandChannel, e));
        }
        self.state = DriverState::CommandChannelReady;

        let video = self.config.video;
        info!(
            "step 3: creating DPI video engine ({}x{} RGB565, {} MHz pixel clock)",
            video.h_size, video.v_size, video.pixel_clock_mhz
        );
        if let Err(e) = self.link.create_video_engine(&video) {
            return Err(self.fatal(BringUpStage::VideoEngine, e));
        }
        self.state = DriverState::EngineConfigured;

        // No reset opcode here: the OTA7290B bridge past the DSI link was
        // configured over I2C during boot, and dcs::SOFT_RESET would wipe
        // that state. The settle delays are mandatory even when a send
        // fails, since the panel may be acting on the command regardless.
        info!("step 4: waking panel over the command channel");
        if let Err(e) = self.link.send_command(dcs::SLEEP_OUT, &[0x00]) {
            warn!("SLPOUT failed: {e}");
        }
        delay.delay_ms(dcs::SLEEP_OUT_SETTLE.as_millis() as u32);
        if let Err(e) = self.link.send_command(dcs::DISPLAY_ON, &[0x00]) {
            warn!("DISPON failed: {e}");
        }
        delay.delay_ms(dcs::DISPLAY_ON_SETTLE.as_millis() as u32);
        self.state = DriverState::PanelAwake;

        info!("step 5: starting DPI video stream");
        if let Err(e) = self.link.start_video() {
            return Err(self.fatal(BringUpStage::StreamStart, e));
        }
        self.state = DriverState::StreamingStarted;

        info!("step 6: arming transfer-completion signal");
        if let Err(e) = self.link.arm_transfer_signal() {
            // Without the signal, completion waits degrade to no-ops.
            warn!("failed to arm transfer-completion signal: {e}");
        }
        self.state = DriverState::SyncReady;

        info!("step 7: clearing panel to black");
        self.fill(Color::BLACK);
        self.state = DriverState::Cleared;

        info!("panel bring-up complete");
        self.state = DriverState::Ready;
        Ok(())
    }

    fn fatal(&mut self, stage: BringUpStage, source: LinkError) -> BringUpError {
        error!("{stage} failed: {source}");
        self.state = DriverState::Failed(stage);
        BringUpError { stage, source }
    }

    /// Transfers are legal once video is streaming and bring-up has not
    /// failed.
    fn can_transfer(&self) -> bool {
        matches!(
            self.state,
            DriverState::StreamingStarted
                | DriverState::SyncReady
                | DriverState::Cleared
                | DriverState::Ready
        )
    }

    // -----------------------------------------------------------------------
    // Pixel transfer API
    // -----------------------------------------------------------------------

    /// Blit a rectangle of pixels.
    ///
    /// `data` holds the source pixels as described by `layout`. Tightly
    /// packed native RGB565 input goes to the DMA engine as a single
    /// transfer; anything else is decoded and written pixel by pixel
    /// through [`draw_pixel_at`](Self::draw_pixel_at). A tight buffer
    /// shorter than the rectangle, a rectangle larger than the panel, or a
    /// tight rectangle not fully on the panel is dropped with a warning.
    ///
    /// Coordinates address the physical 480x1920 grid. No-op until
    /// [`initialize`](Self::initialize) has succeeded.
    pub fn draw_pixels_at(
        &mut self,
        x_start: i32,
        y_start: i32,
        width: u32,
        height: u32,
        data: &[u8],
        layout: &PixelLayout,
    ) {
        if !self.can_transfer() || width == 0 || height == 0 {
            return;
        }
        if width > PANEL_WIDTH || height > PANEL_HEIGHT {
            warn!("rectangle blit: {width}x{height} exceeds the {PANEL_WIDTH}x{PANEL_HEIGHT} panel");
            return;
        }

        if !layout.is_native_tight() {
            return self.draw_pixels_fallback(x_start, y_start, width, height, data, layout);
        }

        // width/height are panel-bounded above, so neither sum can overflow.
        if x_start < 0
            || y_start < 0
            || x_start as u32 + width > PANEL_WIDTH
            || y_start as u32 + height > PANEL_HEIGHT
        {
            warn!("rectangle blit: {width}x{height} at ({x_start}, {y_start}) lies outside the panel");
            return;
        }

        let len = width as usize * height as usize * BYTES_PER_PIXEL;
        let Some(data) = data.get(..len) else {
            warn!(
                "rectangle blit: {width}x{height} needs {len} bytes, got {}",
                data.len()
            );
            return;
        };
        if let Err(e) = self.link.write_pixels(
            x_start,
            y_start,
            x_start + width as i32,
            y_start + height as i32,
            data,
        ) {
            warn!("rectangle transfer failed: {e}");
            return;
        }
        if self.link.wait_transfer_done(RECT_XFER_TIMEOUT) == WaitOutcome::TimedOut {
            debug!("rectangle transfer still in flight after {RECT_XFER_TIMEOUT:?}");
        }
    }

    /// Pixel-by-pixel path for source data the DMA engine cannot consume
    /// directly.
    fn draw_pixels_fallback(
        &mut self,
        x_start: i32,
        y_start: i32,
        width: u32,
        height: u32,
        data: &[u8],
        layout: &PixelLayout,
    ) {
        for y in 0..height {
            for x in 0..width {
                match layout.decode(data, width as usize, x as usize, y as usize) {
                    Some(color) => self.draw_pixel_at(x_start + x as i32, y_start + y as i32, color),
                    None => return,
                }
            }
        }
    }

    /// Write one pixel.
    ///
    /// Coordinates outside the physical 480x1920 extents are ignored.
    /// Correct but slow; bulk updates belong on
    /// [`draw_pixels_at`](Self::draw_pixels_at).
    pub fn draw_pixel_at(&mut self, x: i32, y: i32, color: Color) {
        if !self.can_transfer() {
            return;
        }
        if x < 0 || x >= PANEL_WIDTH as i32 || y < 0 || y >= PANEL_HEIGHT as i32 {
            return;
        }

        let pixel = color::rgb565_bytes(color);
        if let Err(e) = self.link.write_pixels(x, y, x + 1, y + 1, &pixel) {
            warn!("pixel transfer failed: {e}");
            return;
        }
        if self.link.wait_transfer_done(PIXEL_XFER_TIMEOUT) == WaitOutcome::TimedOut {
            debug!("pixel transfer still in flight after {PIXEL_XFER_TIMEOUT:?}");
        }
    }

    /// Fill the whole panel with `color`.
    ///
    /// Stages a full 480x1920 RGB565 frame in DMA-reachable scratch memory
    /// for the transfer; the scratch is released on every path, completion
    /// wait timeout included.
    pub fn fill(&mut self, color: Color) {
        if !self.can_transfer() {
            warn!("fill() called but panel not initialized");
            return;
        }

        let w = PANEL_WIDTH as usize;
        let h = PANEL_HEIGHT as usize;
        let frame_bytes = w * h * BYTES_PER_PIXEL;

        let Some(mut frame) = self.link.try_alloc_frame(frame_bytes) else {
            warn!("fill: failed to allocate {frame_bytes} byte frame buffer");
            return;
        };

        let pixel = color::rgb565_bytes(color);
        for chunk in frame.as_mut().chunks_exact_mut(BYTES_PER_PIXEL) {
            chunk.copy_from_slice(&pixel);
        }

        if let Err(e) = self
            .link
            .write_pixels(0, 0, w as i32, h as i32, frame.as_ref())
        {
            warn!("fill transfer failed: {e}");
            return;
        }
        if self.link.wait_transfer_done(FILL_XFER_TIMEOUT) == WaitOutcome::TimedOut {
            debug!("fill transfer still in flight after {FILL_XFER_TIMEOUT:?}");
        }
        info!(
            "fill complete (R={} G={} B={})",
            color.r(),
            color.g(),
            color.b()
        );
    }

    // -----------------------------------------------------------------------
    // State and dimensions
    // -----------------------------------------------------------------------

    /// Current bring-up state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Whether bring-up completed successfully.
    pub fn is_ready(&self) -> bool {
        self.state == DriverState::Ready
    }

    /// Configured rotation.
    pub fn rotation(&self) -> Rotation {
        self.config.rotation
    }

    /// The panel is a full-color RGB565 surface.
    pub fn kind(&self) -> DisplayKind {
        DisplayKind::FullColor
    }

    /// The panel's fixed native extents.
    pub fn physical_dimensions(&self) -> Dimensions {
        config::physical_dimensions()
    }

    /// The extents a rendering layer should use: physical extents, swapped
    /// under 90 and 270 degree rotation.
    pub fn logical_dimensions(&self) -> Dimensions {
        config::physical_dimensions().rotated(self.config.rotation)
    }

    pub fn logical_width(&self) -> u32 {
        self.logical_dimensions().width
    }

    pub fn logical_height(&self) -> u32 {
        self.logical_dimensions().height
    }

    /// An `embedded-graphics` draw target over this driver.
    ///
    /// See [`PanelDisplay`](crate::eg::PanelDisplay) for the coordinate
    /// conventions.
    #[cfg(feature = "alloc")]
    pub fn display(&mut self) -> crate::eg::PanelDisplay<'_, L> {
        crate::eg::PanelDisplay::new(self)
    }

    /// The stored configuration.
    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// The underlying link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Log the driver configuration and state, one line per item.
    pub fn dump_config(&self) {
        let dims = self.logical_dimensions();
        info!("Waveshare 8.8\" DSI display:");
        match self.state {
            DriverState::Ready => info!("  init: OK"),
            DriverState::Failed(stage) => info!("  init: FAILED ({stage})"),
            _ => info!("  init: not run"),
        }
        info!("  resolution: {}x{}", dims.width, dims.height);
        info!("  color depth: RGB565 (16-bit)");
        info!(
            "  DSI lanes: {} @ {} Mbps",
            self.config.bus.num_data_lanes, self.config.bus.lane_bit_rate_mbps
        );
        info!("  pixel clock: {} MHz", self.config.video.pixel_clock_mhz);
    }
}
