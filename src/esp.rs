//! ESP-IDF [`PanelLink`] implementation for the ESP32-P4 MIPI-DSI host.
//!
//! Wraps the [LCD](https://docs.espressif.com/projects/esp-idf/en/latest/esp32p4/api-reference/peripherals/lcd.html)
//! peripheral's `esp_lcd` DSI family: the DSI bus, the DBI panel IO used for
//! DCS commands and the DPI panel that streams the frame buffer.
//!
//! Power sequencing happens outside this crate. Board code must enable the
//! MIPI D-PHY supply (LDO channel 3, 2.5 V on the Waveshare board) and
//! release the bridge reset GPIO before bring-up; the OTA7290B bridge is
//! configured over I2C during boot, which is also why the driver never
//! issues a DCS reset.
//!
//! Transfer completion is signaled through a FreeRTOS binary semaphore,
//! given from the DPI panel's `on_color_trans_done` ISR callback and taken
//! with a bounded wait in [`wait_transfer_done`](PanelLink::wait_transfer_done).

#![cfg(all(esp32p4, feature = "alloc"))]

use core::ffi::c_void;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;

use alloc::boxed::Box;

use esp_idf_sys::*;

use crate::config::{BusConfig, CommandConfig, VideoConfig};
use crate::link::{LinkError, PanelLink, WaitOutcome};

impl From<EspError> for LinkError {
    fn from(e: EspError) -> Self {
        LinkError::Platform(e.code())
    }
}

// ---------------------------------------------------------------------------
// Tick conversion
// ---------------------------------------------------------------------------

const MS_PER_S: u64 = 1_000;
const NS_PER_MS: u64 = 1_000_000;
const US_PER_MS: u32 = 1_000;
const NS_PER_US: u32 = 1_000;

const fn min_u64(a: u64, b: u64) -> u64 {
    if a < b {
        a
    } else {
        b
    }
}

/// Convert milliseconds to OS ticks, rounding up and saturating.
const fn ms_to_ticks(ms: u64) -> TickType_t {
    let ticks = ms
        .saturating_mul(configTICK_RATE_HZ as u64)
        .saturating_add(MS_PER_S - 1)
        / MS_PER_S;
    min_u64(ticks, TickType_t::MAX as u64) as TickType_t
}

fn duration_to_ticks(duration: Duration) -> TickType_t {
    let sec_ms = duration.as_secs().saturating_mul(MS_PER_S);
    let subsec_ms = (duration.subsec_nanos() as u64 + (NS_PER_MS - 1)) / NS_PER_MS;
    ms_to_ticks(sec_ms.saturating_add(subsec_ms))
}

// ---------------------------------------------------------------------------
// Completion semaphore
// ---------------------------------------------------------------------------

/// FreeRTOS `queueQUEUE_TYPE_BINARY_SEMAPHORE` (C macro, not exported by bindgen).
const QUEUE_TYPE_BINARY_SEMAPHORE: u8 = 3;

/// Create a FreeRTOS binary semaphore in the "empty" state, so the first
/// `take` blocks until someone `give`s it.
fn create_binary_semaphore() -> Result<SemaphoreHandle_t, EspError> {
    let sem = unsafe { xQueueGenericCreate(1, 0, QUEUE_TYPE_BINARY_SEMAPHORE) };
    if sem.is_null() {
        Err(EspError::from_infallible::<ESP_ERR_NO_MEM>())
    } else {
        Ok(sem)
    }
}

/// Register the `on_color_trans_done` callback on the DPI panel.
///
/// The callback gives `sem` from ISR context when the DMA2D transfer that
/// copies the caller's buffer into the internal frame buffer completes.
fn register_draw_done_cb(
    panel_handle: esp_lcd_panel_handle_t,
    sem: SemaphoreHandle_t,
) -> Result<(), EspError> {
    unsafe {
        let cbs = esp_lcd_dpi_panel_event_callbacks_t {
            on_color_trans_done: Some(on_color_trans_done_isr),
            ..core::mem::zeroed()
        };
        esp!(esp_lcd_dpi_panel_register_event_callbacks(
            panel_handle,
            &cbs,
            sem as *mut c_void,
        ))
    }
}

/// ISR callback: signals the binary semaphore when DMA2D finishes.
unsafe extern "C" fn on_color_trans_done_isr(
    _panel: esp_lcd_panel_handle_t,
    _edata: *mut esp_lcd_dpi_panel_event_data_t,
    user_ctx: *mut c_void,
) -> bool {
    let sem = user_ctx as SemaphoreHandle_t;
    let mut higher_prio_woken: BaseType_t = 0;
    xQueueGiveFromISR(sem, &mut higher_prio_woken);
    higher_prio_woken != 0
}

// ---------------------------------------------------------------------------
// EspDsiLink
// ---------------------------------------------------------------------------

static TAKEN: AtomicBool = AtomicBool::new(false);

/// [`PanelLink`] over the ESP32-P4 `esp_lcd` MIPI-DSI host.
///
/// Obtained once via [`take()`](Self::take); the chip has a single DSI host
/// block. Handles are torn down in reverse creation order on drop, but the
/// singleton is never released: the panel's lifetime is the device's.
pub struct EspDsiLink {
    bus: Option<NonNull<c_void>>,
    dbi_io: Option<NonNull<c_void>>,
    panel: Option<NonNull<c_void>>,
    draw_done_sem: SemaphoreHandle_t,
    /// The DPI panel may reference its config after creation, so it lives
    /// on the heap at a stable address until the panel is deleted.
    dpi_config_box: Option<*mut esp_lcd_dpi_panel_config_t>,
}

impl EspDsiLink {
    /// Take the DSI host. Returns `None` on every call after the first.
    pub fn take() -> Option<Self> {
        if TAKEN
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }

        Some(Self {
            bus: None,
            dbi_io: None,
            panel: None,
            draw_done_sem: core::ptr::null_mut(),
            dpi_config_box: None,
        })
    }

    fn bus_handle(&self) -> Result<esp_lcd_dsi_bus_handle_t, LinkError> {
        Ok(self.bus.ok_or(LinkError::InvalidState)?.as_ptr().cast())
    }

    fn dbi_handle(&self) -> Result<esp_lcd_panel_io_handle_t, LinkError> {
        Ok(self.dbi_io.ok_or(LinkError::InvalidState)?.as_ptr().cast())
    }

    fn panel_handle(&self) -> Result<esp_lcd_panel_handle_t, LinkError> {
        Ok(self.panel.ok_or(LinkError::InvalidState)?.as_ptr().cast())
    }
}

impl PanelLink for EspDsiLink {
    type FrameBuf = DmaFrame;

    fn create_bus(&mut self, config: &BusConfig) -> Result<(), LinkError> {
        let bus_config = esp_lcd_dsi_bus_config_t {
            bus_id: 0,
            num_data_lanes: config.num_data_lanes,
            phy_clk_src: soc_periph_mipi_dsi_phy_clk_src_t_MIPI_DSI_PHY_CLK_SRC_DEFAULT,
            lane_bit_rate_mbps: config.lane_bit_rate_mbps,
        };

        let mut handle: esp_lcd_dsi_bus_handle_t = core::ptr::null_mut();
        unsafe { esp!(esp_lcd_new_dsi_bus(&bus_config, &mut handle))? };
        self.bus = Some(NonNull::new(handle as *mut c_void).ok_or(LinkError::InvalidState)?);
        Ok(())
    }

    fn create_command_channel(&mut self, config: &CommandConfig) -> Result<(), LinkError> {
        let dbi_config = esp_lcd_dbi_io_config_t {
            virtual_channel: config.virtual_channel,
            lcd_cmd_bits: config.cmd_bits as i32,
            lcd_param_bits: config.param_bits as i32,
        };

        let bus = self.bus_handle()?;
        let mut handle: esp_lcd_panel_io_handle_t = core::ptr::null_mut();
        unsafe { esp!(esp_lcd_new_panel_io_dbi(bus, &dbi_config, &mut handle))? };
        self.dbi_io = Some(NonNull::new(handle as *mut c_void).ok_or(LinkError::InvalidState)?);
        Ok(())
    }

    fn create_video_engine(&mut self, config: &VideoConfig) -> Result<(), LinkError> {
        let video_timing = esp_lcd_video_timing_t {
            h_size: config.h_size,
            v_size: config.v_size,
            hsync_back_porch: config.hsync_back_porch,
            hsync_pulse_width: config.hsync_pulse_width,
            hsync_front_porch: config.hsync_front_porch,
            vsync_back_porch: config.vsync_back_porch,
            vsync_pulse_width: config.vsync_pulse_width,
            vsync_front_porch: config.vsync_front_porch,
        };

        let mut dpi_config = esp_lcd_dpi_panel_config_t {
            virtual_channel: config.virtual_channel,
            dpi_clk_src: soc_periph_mipi_dsi_dpi_clk_src_t_MIPI_DSI_DPI_CLK_SRC_DEFAULT,
            dpi_clock_freq_mhz: config.pixel_clock_mhz,
            pixel_format: lcd_color_rgb_pixel_format_t_LCD_COLOR_PIXEL_FORMAT_RGB565,
            in_color_format: lcd_color_format_t_LCD_COLOR_FMT_RGB565,
            out_color_format: lcd_color_format_t_LCD_COLOR_FMT_RGB565,
            num_fbs: config.num_frame_buffers,
            video_timing,
            ..unsafe { core::mem::zeroed() }
        };
        dpi_config.flags.set_use_dma2d(config.use_dma2d as u32);

        let bus = self.bus_handle()?;
        let dpi_config_ptr = Box::into_raw(Box::new(dpi_config));

        // Creates the engine and allocates its frame buffer; scan-out does
        // not start until start_video().
        let mut handle: esp_lcd_panel_handle_t = core::ptr::null_mut();
        let result = unsafe { esp!(esp_lcd_new_panel_dpi(bus, dpi_config_ptr, &mut handle)) };
        let panel = result
            .map_err(LinkError::from)
            .and_then(|()| NonNull::new(handle as *mut c_void).ok_or(LinkError::InvalidState));
        match panel {
            Ok(panel) => {
                self.panel = Some(panel);
                self.dpi_config_box = Some(dpi_config_ptr);
                Ok(())
            }
            Err(e) => {
                drop(unsafe { Box::from_raw(dpi_config_ptr) });
                Err(e)
            }
        }
    }

    fn send_command(&mut self, cmd: u8, params: &[u8]) -> Result<(), LinkError> {
        let io = self.dbi_handle()?;
        let param_ptr = if params.is_empty() {
            core::ptr::null()
        } else {
            params.as_ptr() as *const c_void
        };
        unsafe {
            esp!(esp_lcd_panel_io_tx_param(
                io,
                cmd as i32,
                param_ptr,
                params.len(),
            ))?;
        }
        Ok(())
    }

    fn start_video(&mut self) -> Result<(), LinkError> {
        // For a DPI panel, esp_lcd_panel_init starts driving the link in
        // high-speed video mode.
        let panel = self.panel_handle()?;
        unsafe { esp!(esp_lcd_panel_init(panel))? };
        Ok(())
    }

    fn arm_transfer_signal(&mut self) -> Result<(), LinkError> {
        if !self.draw_done_sem.is_null() {
            return Ok(());
        }

        let panel = self.panel_handle()?;
        let sem = create_binary_semaphore()?;
        if let Err(e) = register_draw_done_cb(panel, sem) {
            unsafe { vQueueDelete(sem) };
            return Err(e.into());
        }
        self.draw_done_sem = sem;
        Ok(())
    }

    fn write_pixels(
        &mut self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        data: &[u8],
    ) -> Result<(), LinkError> {
        let panel = self.panel_handle()?;
        unsafe {
            esp!(esp_lcd_panel_draw_bitmap(
                panel,
                x1,
                y1,
                x2,
                y2,
                data.as_ptr() as *const c_void,
            ))?;
        }
        Ok(())
    }

    fn wait_transfer_done(&mut self, timeout: Duration) -> WaitOutcome {
        if self.draw_done_sem.is_null() {
            return WaitOutcome::Complete;
        }

        let taken =
            unsafe { xQueueSemaphoreTake(self.draw_done_sem, duration_to_ticks(timeout)) };
        if taken != 0 {
            WaitOutcome::Complete
        } else {
            WaitOutcome::TimedOut
        }
    }

    fn try_alloc_frame(&mut self, len: usize) -> Option<Self::FrameBuf> {
        DmaFrame::alloc(len)
    }
}

impl Drop for EspDsiLink {
    fn drop(&mut self) {
        unsafe {
            if let Some(panel) = self.panel {
                let _ = esp_lcd_panel_del(panel.as_ptr().cast());
            }
            // The panel is gone, so its config can be freed.
            if let Some(config_ptr) = self.dpi_config_box {
                drop(Box::from_raw(config_ptr));
            }
            if !self.draw_done_sem.is_null() {
                vQueueDelete(self.draw_done_sem);
            }
            if let Some(io) = self.dbi_io {
                let _ = esp_lcd_panel_io_del(io.as_ptr().cast());
            }
            if let Some(bus) = self.bus {
                let _ = esp_lcd_del_dsi_bus(bus.as_ptr().cast());
            }
        }
    }
}

unsafe impl Send for EspDsiLink {}

// ---------------------------------------------------------------------------
// DMA-reachable scratch
// ---------------------------------------------------------------------------

/// Frame-sized scratch buffer in DMA-reachable PSRAM, freed on drop.
pub struct DmaFrame {
    ptr: NonNull<u8>,
    len: usize,
}

impl DmaFrame {
    fn alloc(len: usize) -> Option<Self> {
        let ptr = unsafe { heap_caps_malloc(len, MALLOC_CAP_SPIRAM) } as *mut u8;
        let ptr = NonNull::new(ptr)?;
        // as_ref() hands out the whole buffer, so every byte must be
        // initialized.
        unsafe { core::ptr::write_bytes(ptr.as_ptr(), 0, len) };
        Some(Self { ptr, len })
    }
}

impl AsRef<[u8]> for DmaFrame {
    fn as_ref(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl AsMut<[u8]> for DmaFrame {
    fn as_mut(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for DmaFrame {
    fn drop(&mut self) {
        unsafe { heap_caps_free(self.ptr.as_ptr() as *mut c_void) };
    }
}

unsafe impl Send for DmaFrame {}

// ---------------------------------------------------------------------------
// Delay provider
// ---------------------------------------------------------------------------

/// FreeRTOS-backed delay provider for the bring-up settle delays.
///
/// Yields to the OS via `vTaskDelay`, so the IDLE task keeps running during
/// the 120 ms sleep-out settle.
pub struct FreeRtosDelay;

impl FreeRtosDelay {
    /// Pauses execution for at minimum `ms` milliseconds.
    pub fn delay_ms(ms: u32) {
        unsafe { vTaskDelay(ms_to_ticks(ms as u64)) };
    }

    fn delay_us(us: u32) {
        Self::delay_ms(us.saturating_add(US_PER_MS - 1) / US_PER_MS);
    }
}

impl embedded_hal::delay::DelayNs for FreeRtosDelay {
    fn delay_ns(&mut self, ns: u32) {
        FreeRtosDelay::delay_us(ns.saturating_add(NS_PER_US - 1) / NS_PER_US);
    }

    fn delay_us(&mut self, us: u32) {
        FreeRtosDelay::delay_us(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        FreeRtosDelay::delay_ms(ms);
    }
}
