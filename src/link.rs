//! The seam between the driver logic and the platform LCD stack.
//!
//! [`PanelLink`] has one method per hardware call the driver makes, in
//! bring-up order, which keeps the sequencing and transfer logic testable
//! off-device. The ESP-IDF implementation lives in [`crate::esp`].

use core::fmt;
use core::time::Duration;

use crate::config::{BusConfig, CommandConfig, VideoConfig};

/// DCS opcodes used (and deliberately not used) by the bring-up sequence.
pub mod dcs {
    use core::time::Duration;

    /// Sleep Out. Sent with a single zero parameter byte.
    pub const SLEEP_OUT: u8 = 0x11;
    /// Display On. Sent with a single zero parameter byte.
    pub const DISPLAY_ON: u8 = 0x29;
    /// Software Reset. The driver never sends it: the OTA7290B bridge
    /// between the DSI link and the panel is configured over I2C during an
    /// earlier boot stage, and a reset here would wipe that configuration.
    pub const SOFT_RESET: u8 = 0x01;

    /// Mandatory settle time after [`SLEEP_OUT`], per the MIPI DCS standard.
    pub const SLEEP_OUT_SETTLE: Duration = Duration::from_millis(120);
    /// Mandatory settle time after [`DISPLAY_ON`].
    pub const DISPLAY_ON_SETTLE: Duration = Duration::from_millis(20);
}

// Completion waits are best-effort: an expired bound is treated as
// "probably done", not as an error. See the transfer methods on
// `PanelDriver` for the policy.

/// Upper bound on the completion wait after a single-pixel transfer.
pub const PIXEL_XFER_TIMEOUT: Duration = Duration::from_millis(100);
/// Upper bound on the completion wait after a rectangle transfer.
pub const RECT_XFER_TIMEOUT: Duration = Duration::from_secs(1);
/// Upper bound on the completion wait after a full-frame transfer.
pub const FILL_XFER_TIMEOUT: Duration = Duration::from_secs(5);

/// Error surfaced by a [`PanelLink`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The platform driver rejected the call with the given error code.
    Platform(i32),
    /// The operation needs a handle that has not been created yet.
    InvalidState,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Platform(code) => write!(f, "platform error {code}"),
            LinkError::InvalidState => write!(f, "link handle not ready"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LinkError {}

/// Result of waiting on the transfer-completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The completion event fired within the bound.
    Complete,
    /// The bound expired first. Callers treat this as advisory: the
    /// transfer may still finish after the wait returns.
    TimedOut,
}

/// Hardware operations the driver needs from the platform.
///
/// An implementation owns the underlying handles; the driver only tracks
/// which of them exist via its bring-up state.
pub trait PanelLink {
    /// DMA-reachable scratch memory handed out by
    /// [`try_alloc_frame`](Self::try_alloc_frame).
    type FrameBuf: AsRef<[u8]> + AsMut<[u8]>;

    /// Create the DSI bus. First bring-up step; everything else depends on
    /// it.
    fn create_bus(&mut self, config: &BusConfig) -> Result<(), LinkError>;

    /// Create the DBI command channel over the bus.
    fn create_command_channel(&mut self, config: &CommandConfig) -> Result<(), LinkError>;

    /// Create the DPI video engine over the bus. Prepares timing state
    /// only; it must not start video output.
    fn create_video_engine(&mut self, config: &VideoConfig) -> Result<(), LinkError>;

    /// Send a DCS command with parameter bytes over the command channel.
    fn send_command(&mut self, cmd: u8, params: &[u8]) -> Result<(), LinkError>;

    /// Start video streaming. From here the engine drives the link in
    /// high-speed mode and scans the frame buffer out continuously.
    fn start_video(&mut self) -> Result<(), LinkError>;

    /// Create the transfer-completion signal and bind it to the engine's
    /// transfer-done event.
    fn arm_transfer_signal(&mut self) -> Result<(), LinkError>;

    /// Copy `data` into the frame-buffer rectangle `[x1, x2) x [y1, y2)`.
    ///
    /// `data` holds `(x2 - x1) * (y2 - y1)` native RGB565 pixels in
    /// row-major order with no padding. The copy is DMA-assisted and
    /// asynchronous: the buffer must stay untouched until a following
    /// [`wait_transfer_done`](Self::wait_transfer_done) returns.
    fn write_pixels(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, data: &[u8])
        -> Result<(), LinkError>;

    /// Wait for the in-flight transfer to complete, up to `timeout`.
    ///
    /// Returns [`WaitOutcome::Complete`] immediately when no signal was
    /// armed.
    fn wait_transfer_done(&mut self, timeout: Duration) -> WaitOutcome;

    /// Allocate `len` bytes of zeroed, DMA-reachable scratch memory, if
    /// available.
    fn try_alloc_frame(&mut self, len: usize) -> Option<Self::FrameBuf>;
}
