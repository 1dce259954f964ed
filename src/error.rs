// Error taxonomy. Each component has its own narrow error type so
// a caller matching on `DecodeError` never has to consider a JTAG timeout;
// `Error` is the crate-wide union for code that really does need to bubble
// any of them out (the programmer, the demo binary).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated instruction stream at offset {offset:#06x}")]
    Truncated { offset: u32 },
    #[error("invalid opcode bit pattern {word:#06x} at offset {offset:#06x}")]
    Invalid { word: u16, offset: u32 },
}

#[derive(Debug, Error)]
pub enum BinfileError {
    #[error("{file}:{line}: {message}")]
    Parse { file: String, line: usize, message: String },
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("unexpected JTAG identification byte {0:#04x}")]
    BadJtagId(u8),
    #[error("JTAG access fuse is blown; device is unrecoverable")]
    FuseBlown,
    #[error("device did not respond within the expected time budget")]
    Timeout,
    #[error("flash controller never signalled ready")]
    FlashNotReady,
    #[error("PSA verification mismatch: expected {expected:#06x}, got {actual:#06x}")]
    VerifyMismatch { expected: u16, actual: u16 },
    #[error("readback verification mismatch at {addr:#06x}")]
    ReadbackMismatch { addr: u32 },
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Usage(#[from] UsageError),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("underlying transport link failed: {0}")]
    LinkFailure(String),
    #[error("MehFET probe returned error status {status:#04x}: {message}")]
    MehfetStatus { status: u8, message: String },
    #[error("receive deadline exceeded")]
    Deadline,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("odd trailing byte in a flash write is not representable")]
    OddFlashWrite,
    #[error("invalid register index {0}")]
    BadRegisterIndex(usize),
    #[error("invalid breakpoint slot {slot} (device supports {max} slots)")]
    BadBreakpointSlot { slot: usize, max: usize },
    #[error("operation requires the device to be halted")]
    NotHalted,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Binfile(#[from] BinfileError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error("operation cancelled")]
    Cancelled,
}
