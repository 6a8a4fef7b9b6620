//! In-memory [`PanelLink`] for host tests. Records every call as an
//! [`Event`], with switches for failing a single call site, timing out
//! completion waits and refusing frame allocations.

use core::cell::{Cell, RefCell};
use core::time::Duration;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;

use crate::config::{BusConfig, CommandConfig, VideoConfig};
use crate::link::{LinkError, PanelLink, WaitOutcome};

/// One recorded link or delay call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    CreateBus { lanes: u8, mbps: u32 },
    CreateCommandChannel { virtual_channel: u8 },
    CreateVideoEngine { h: u32, v: u32, pclk_mhz: u32 },
    SendCommand { cmd: u8, params: Vec<u8> },
    StartVideo,
    ArmSignal,
    WritePixels { x1: i32, y1: i32, x2: i32, y2: i32, data: Vec<u8> },
    Wait { timeout: Duration },
    DelayMs(u32),
    Alloc { len: usize },
}

/// Call site that [`MockLink::failing_at`] makes fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Bus,
    CommandChannel,
    VideoEngine,
    Command,
    StartVideo,
    ArmSignal,
    WritePixels,
}

pub struct MockLink {
    log: Rc<RefCell<Vec<Event>>>,
    fail_at: Option<FailPoint>,
    alloc_fails: Cell<bool>,
    wait_outcome: WaitOutcome,
    outstanding: Rc<Cell<usize>>,
}

impl MockLink {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
            fail_at: None,
            alloc_fails: Cell::new(false),
            wait_outcome: WaitOutcome::Complete,
            outstanding: Rc::new(Cell::new(0)),
        }
    }

    /// A link whose call at `point` fails with a platform error.
    pub fn failing_at(point: FailPoint) -> Self {
        Self {
            fail_at: Some(point),
            ..Self::new()
        }
    }

    /// Make every completion wait report a timeout.
    pub fn timing_out(mut self) -> Self {
        self.wait_outcome = WaitOutcome::TimedOut;
        self
    }

    /// Toggle frame allocation failure.
    pub fn refuse_allocs(&self, refuse: bool) {
        self.alloc_fails.set(refuse);
    }

    /// A delay provider that records into the same event log.
    pub fn delay(&self) -> RecordingDelay {
        RecordingDelay {
            log: Rc::clone(&self.log),
        }
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<Event> {
        self.log.borrow().clone()
    }

    /// Drain the recorded events.
    pub fn take_events(&self) -> Vec<Event> {
        core::mem::take(&mut *self.log.borrow_mut())
    }

    /// Frame buffers handed out and not yet dropped.
    pub fn outstanding_allocs(&self) -> usize {
        self.outstanding.get()
    }

    fn record(&self, event: Event) {
        self.log.borrow_mut().push(event);
    }

    fn check(&self, point: FailPoint) -> Result<(), LinkError> {
        if self.fail_at == Some(point) {
            Err(LinkError::Platform(-1))
        } else {
            Ok(())
        }
    }
}

impl PanelLink for MockLink {
    type FrameBuf = TrackedBuf;

    fn create_bus(&mut self, config: &BusConfig) -> Result<(), LinkError> {
        self.record(Event::CreateBus {
            lanes: config.num_data_lanes,
            mbps: config.lane_bit_rate_mbps,
        });
        self.check(FailPoint::Bus)
    }

    fn create_command_channel(&mut self, config: &CommandConfig) -> Result<(), LinkError> {
        self.record(Event::CreateCommandChannel {
            virtual_channel: config.virtual_channel,
        });
        self.check(FailPoint::CommandChannel)
    }

    fn create_video_engine(&mut self, config: &VideoConfig) -> Result<(), LinkError> {
        self.record(Event::CreateVideoEngine {
            h: config.h_size,
            v: config.v_size,
            pclk_mhz: config.pixel_clock_mhz,
        });
        self.check(FailPoint::VideoEngine)
    }

    fn send_command(&mut self, cmd: u8, params: &[u8]) -> Result<(), LinkError> {
        self.record(Event::SendCommand {
            cmd,
            params: params.to_vec(),
        });
        self.check(FailPoint::Command)
    }

    fn start_video(&mut self) -> Result<(), LinkError> {
        self.record(Event::StartVideo);
        self.check(FailPoint::StartVideo)
    }

    fn arm_transfer_signal(&mut self) -> Result<(), LinkError> {
        self.record(Event::ArmSignal);
        self.check(FailPoint::ArmSignal)
    }

    fn write_pixels(
        &mut self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        data: &[u8],
    ) -> Result<(), LinkError> {
        self.record(Event::WritePixels {
            x1,
            y1,
            x2,
            y2,
            data: data.to_vec(),
        });
        self.check(FailPoint::WritePixels)
    }

    fn wait_transfer_done(&mut self, timeout: Duration) -> WaitOutcome {
        self.record(Event::Wait { timeout });
        self.wait_outcome
    }

    fn try_alloc_frame(&mut self, len: usize) -> Option<Self::FrameBuf> {
        self.record(Event::Alloc { len });
        if self.alloc_fails.get() {
            return None;
        }
        self.outstanding.set(self.outstanding.get() + 1);
        Some(TrackedBuf {
            bytes: vec![0; len],
            outstanding: Rc::clone(&self.outstanding),
        })
    }
}

/// Frame buffer that decrements the owner's outstanding count on drop.
pub struct TrackedBuf {
    bytes: Vec<u8>,
    outstanding: Rc<Cell<usize>>,
}

impl AsRef<[u8]> for TrackedBuf {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl AsMut<[u8]> for TrackedBuf {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Drop for TrackedBuf {
    fn drop(&mut self) {
        self.outstanding.set(self.outstanding.get() - 1);
    }
}

/// [`DelayNs`] that logs requested delays instead of sleeping.
pub struct RecordingDelay {
    log: Rc<RefCell<Vec<Event>>>,
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.log.borrow_mut().push(Event::DelayMs(ns / 1_000_000));
    }

    fn delay_us(&mut self, us: u32) {
        self.log.borrow_mut().push(Event::DelayMs(us / 1_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.log.borrow_mut().push(Event::DelayMs(ms));
    }
}
