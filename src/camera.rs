//! Camera capability used by the audit session.
//!
//! The session only needs "start continuous decode, stop, pause, resume";
//! anything that can do that (a browser stream driven over HTTP, a
//! keyboard-wedge reader on stdin, a test fake) implements [`Scanner`].

use log::warn;
use serde::Serialize;

use crate::error::CameraError;

pub trait Scanner {
    fn start(&mut self) -> Result<(), CameraError>;
    fn stop(&mut self) -> Result<(), CameraError>;
    fn pause(&mut self) -> Result<(), CameraError>;
    fn resume(&mut self) -> Result<(), CameraError>;
    fn is_scanning(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum CameraStatus {
    Loading,
    Ready,
    Error(String),
}

/// Owns a scanner and guarantees it is stopped on every exit path.
///
/// A failed `open` releases whatever the scanner managed to acquire before
/// returning the error; dropping the guard stops a running scanner.
pub struct ScannerGuard<S: Scanner> {
    scanner: S,
    active: bool,
}

impl<S: Scanner> ScannerGuard<S> {
    pub fn new(scanner: S) -> Self {
        ScannerGuard { scanner, active: false }
    }

    /// (Re)acquire the camera; an already running scanner is stopped first.
    pub fn open(&mut self) -> Result<(), CameraError> {
        if self.active {
            self.close();
        }
        match self.scanner.start() {
            Ok(()) => {
                self.active = true;
                Ok(())
            }
            Err(e) => {
                if let Err(stop_err) = self.scanner.stop() {
                    warn!("camera release after failed start: {}", stop_err);
                }
                self.active = false;
                Err(e)
            }
        }
    }

    pub fn close(&mut self) {
        if !self.active {
            return;
        }
        if let Err(e) = self.scanner.stop() {
            warn!("camera stop failed: {}", e);
        }
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Pause decoding; failures are logged and otherwise ignored.
    pub fn pause(&mut self) {
        if self.active && self.scanner.is_scanning() {
            if let Err(e) = self.scanner.pause() {
                warn!("camera pause failed: {}", e);
            }
        }
    }

    pub fn resume(&mut self) {
        if self.active {
            if let Err(e) = self.scanner.resume() {
                warn!("camera resume failed: {}", e);
            }
        }
    }

    pub fn scanner(&self) -> &S {
        &self.scanner
    }

    pub fn scanner_mut(&mut self) -> &mut S {
        &mut self.scanner
    }
}

impl<S: Scanner> Drop for ScannerGuard<S> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Scanner whose camera runs in the browser.
///
/// The page polls the desired state and posts decoded text back; device
/// failures are reported by the page rather than raised by `start`.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BrowserScanner {
    pub scanning: bool,
    pub paused: bool,
}

impl Scanner for BrowserScanner {
    fn start(&mut self) -> Result<(), CameraError> {
        self.scanning = true;
        self.paused = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CameraError> {
        self.scanning = false;
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), CameraError> {
        self.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), CameraError> {
        self.paused = false;
        Ok(())
    }

    fn is_scanning(&self) -> bool {
        self.scanning
    }
}
