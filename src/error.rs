// One error type for the whole crate.
// Every variant states *where* things went wrong.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Out-of-range zoom, pan or size handed to the geometry engine.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// An element with this name is already registered.
    #[error("element {0:?} already exists")]
    DuplicateName(String),
    /// No element with this name is registered.
    #[error("no element named {0:?}")]
    UnknownElement(String),
    /// The overlay buffer could not be created; fatal for the session.
    #[error("cannot allocate {width}x{height} overlay buffer")]
    AllocationError { width: u32, height: u32 },
    #[error("settings error: {0}")]
    Config(String),
    #[error("window init error: {0}")]
    WindowInit(String),
    #[error("window update error: {0}")]
    WindowUpdate(String),
    #[error("camera init error: {0}")]
    CameraInit(String),
    #[error("camera frame error: {0}")]
    CameraFrame(String),
}

pub type Result<T> = core::result::Result<T, Error>;
