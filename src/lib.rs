//! Driver for the Waveshare 8.8" 480x1920 MIPI-DSI panel on the ESP32-P4.
//!
//! The panel sits behind an OTA7290B DSI-to-LVDS bridge that the board
//! firmware configures over I2C at boot, so bring-up is a fixed, order-
//! critical sequence with no reset opcode: DSI bus, DBI command channel,
//! DPI video engine, SLPOUT/DISPON wake commands with mandatory settle
//! delays, video stream start, completion-signal arming and an initial
//! clear to black. [`PanelDriver`] owns that sequence and the transfer
//! paths; the platform side is abstracted behind [`PanelLink`] so the
//! driver logic is testable on the host, with [`esp::EspDsiLink`] as the
//! on-device implementation.
//!
//! # Example
//!
//! ```ignore
//! use waveshare_dsi::esp::{EspDsiLink, FreeRtosDelay};
//! use waveshare_dsi::{Color, PanelConfig, PanelDriver};
//!
//! let link = EspDsiLink::take().expect("DSI host already taken");
//! let mut driver = PanelDriver::new(link, PanelConfig::default());
//! driver.initialize(&mut FreeRtosDelay)?;
//!
//! driver.fill(Color::new(0, 32, 64));
//! driver.dump_config();
//!
//! // Or draw through embedded-graphics:
//! use embedded_graphics::prelude::*;
//! use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
//!
//! Rectangle::new(Point::new(40, 100), Size::new(400, 200))
//!     .into_styled(PrimitiveStyle::with_fill(Color::new(255, 0, 0)))
//!     .draw(&mut driver.display())?;
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod color;
pub mod config;
pub mod driver;
#[cfg(feature = "alloc")]
pub mod eg;
pub mod esp;
pub mod link;
pub mod rotation;

#[cfg(test)]
pub(crate) mod mock;

pub use color::{Color, ColorBitness, ColorOrder, PixelLayout};
pub use config::{BusConfig, CommandConfig, PanelConfig, VideoConfig};
pub use driver::{BringUpError, BringUpStage, DisplayKind, DriverState, PanelDriver};
#[cfg(feature = "alloc")]
pub use eg::PanelDisplay;
pub use link::{LinkError, PanelLink, WaitOutcome};
pub use rotation::{Dimensions, Rotation};

#[cfg(all(esp32p4, feature = "alloc"))]
pub use esp::{EspDsiLink, FreeRtosDelay};
