//! Raspberry Pi hardware bindings.
//!
//! Concrete [`UpsBus`], [`PulseLine`] and [`ShutdownAction`]
//! implementations over the Pi's I2C peripheral and GPIO header, plus the
//! clock-edge interrupt registration.

use crate::constants::{BOUNCE_TIME_MS, CLOCK_PIN, PULSE_PIN, UPS_I2C_ADDR};
use crate::error::Result;
use crate::pulse::{PulseLine, PulseProtocol, ShutdownAction};
use crate::ups::UpsBus;
use log::error;
use rppal::gpio::{Bias, Gpio, InputPin, IoPin, Level, Mode, Trigger};
use rppal::i2c::I2c;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

/// I2C bus pinned to the UPS controller address.
pub struct I2cBus {
    i2c: I2c,
}

impl I2cBus {
    /// Open the default I2C bus (`/dev/i2c-1` on a Pi) and select the
    /// controller address.
    pub fn open() -> Result<Self> {
        let mut i2c = I2c::new()?;
        i2c.set_slave_address(UPS_I2C_ADDR)?;
        Ok(I2cBus { i2c })
    }
}

impl UpsBus for I2cBus {
    fn send_byte(&mut self, value: u8) -> Result<()> {
        self.i2c.smbus_send_byte(value)?;
        Ok(())
    }

    fn receive_byte(&mut self) -> Result<u8> {
        Ok(self.i2c.smbus_receive_byte()?)
    }
}

/// The bidirectional pulse pin on the GPIO header.
pub struct GpioPulseLine {
    pin: IoPin,
}

impl GpioPulseLine {
    pub fn open(gpio: &Gpio) -> Result<Self> {
        let pin = gpio.get(PULSE_PIN)?.into_io(Mode::Output);
        Ok(GpioPulseLine { pin })
    }
}

impl PulseLine for GpioPulseLine {
    fn output_level(&self) -> bool {
        self.pin.read() == Level::High
    }

    fn drive(&mut self, level: bool) {
        self.pin
            .write(if level { Level::High } else { Level::Low });
    }

    fn to_input_pullup(&mut self) {
        self.pin.set_mode(Mode::Input);
        self.pin.set_bias(Bias::PullUp);
    }

    fn sample(&self) -> bool {
        self.pin.read() == Level::High
    }

    fn to_output(&mut self, initial: bool) {
        self.pin.set_mode(Mode::Output);
        self.drive(initial);
    }
}

/// Power the host off through the system shutdown command.
pub struct HostShutdown;

impl ShutdownAction for HostShutdown {
    fn power_off(&self) {
        if let Err(e) = Command::new("/sbin/shutdown").args(["-h", "now"]).status() {
            error!("Failed to invoke system shutdown: {}", e);
        }
    }
}

/// Configure the clock pin and register the falling-edge interrupt that
/// drives the pulse protocol. Debounce suppresses contact bounce; the
/// per-pin registration means no edge from any other pin reaches the
/// handler.
///
/// The returned pin must be kept alive for as long as interrupts should
/// be delivered; dropping it releases the pin and clears the handler.
pub fn arm_clock_interrupt(gpio: &Gpio, pulse: Arc<PulseProtocol>) -> Result<InputPin> {
    let mut clock = gpio.get(CLOCK_PIN)?.into_input_pullup();
    clock.set_async_interrupt(
        Trigger::FallingEdge,
        Some(Duration::from_millis(BOUNCE_TIME_MS)),
        move |_| pulse.on_clock_edge(),
    )?;
    Ok(clock)
}
