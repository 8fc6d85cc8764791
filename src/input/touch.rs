use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use log::info;

use crate::traits::{TouchSample, TouchSource};

const EV_SYN: u16 = 0x00;
const EV_KEY: u16 = 0x01;
const EV_ABS: u16 = 0x03;

const SYN_REPORT: u16 = 0x00;
const BTN_TOUCH: u16 = 0x14a;
const ABS_X: u16 = 0x00;
const ABS_Y: u16 = 0x01;
const ABS_PRESSURE: u16 = 0x18;
const ABS_MT_POSITION_X: u16 = 0x35;
const ABS_MT_POSITION_Y: u16 = 0x36;

/// `struct input_event` as read from an evdev node
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct RawInputEvent {
    pub tv_sec: libc::c_long,
    pub tv_usec: libc::c_long,
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

impl RawInputEvent {
    pub fn new(kind: u16, code: u16, value: i32) -> Self {
        Self {
            kind,
            code,
            value,
            ..Default::default()
        }
    }
}

/// Folds evdev events into one sample per synchronisation report
///
/// Coordinates are raw device units; no calibration is applied.
#[derive(Debug, Clone, Default)]
pub struct TouchDecoder {
    x: i32,
    y: i32,
    pressure: Option<i32>,
    button: Option<bool>,
    dirty: bool,
}

impl TouchDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event; returns a sample when a report is complete
    pub fn feed(&mut self, event: &RawInputEvent) -> Option<TouchSample> {
        match (event.kind, event.code) {
            (EV_ABS, ABS_X | ABS_MT_POSITION_X) => self.x = event.value,
            (EV_ABS, ABS_Y | ABS_MT_POSITION_Y) => self.y = event.value,
            (EV_ABS, ABS_PRESSURE) => self.pressure = Some(event.value),
            (EV_KEY, BTN_TOUCH) => self.button = Some(event.value != 0),
            (EV_SYN, SYN_REPORT) => {
                if !std::mem::take(&mut self.dirty) {
                    return None;
                }
                return Some(self.sample());
            }
            _ => return None,
        }
        self.dirty = true;
        None
    }

    fn sample(&self) -> TouchSample {
        let pressed = match self.button {
            Some(down) => down,
            None => self.pressure.unwrap_or(0) > 0,
        };
        let pressure = if pressed {
            self.pressure.unwrap_or(1).max(1)
        } else {
            0
        };
        TouchSample {
            x: self.x,
            y: self.y,
            pressure,
        }
    }
}

/// Non-blocking evdev touch screen
pub struct EvdevTouch {
    file: File,
    decoder: TouchDecoder,
}

impl EvdevTouch {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(path)?;
        info!("touch input from {}", path.display());
        Ok(Self {
            file,
            decoder: TouchDecoder::new(),
        })
    }
}

impl TouchSource for EvdevTouch {
    fn poll(&mut self) -> io::Result<Vec<TouchSample>> {
        const BATCH: usize = 64;
        let event_size = std::mem::size_of::<RawInputEvent>();
        let mut buf = [RawInputEvent::default(); BATCH];
        let mut samples = Vec::new();

        loop {
            let n = match self.file.read(bytemuck::cast_slice_mut(&mut buf)) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            // evdev only hands out whole events
            samples.extend(buf[..n / event_size].iter().filter_map(|ev| self.decoder.feed(ev)));
            if n < event_size * BATCH {
                break;
            }
        }
        Ok(samples)
    }
}
