// The `Transport` contract: an opaque, full-duplex, best-effort
// byte stream. USB enumeration and serial transport drivers that implement
// it are explicitly out of scope — this module only defines the
// trait the MehFET JTAG back-end (`jtag::mehfet`) is built against, plus a
// loopback implementation used by its tests.

use crate::error::TransportError;

/// RS-232-style modem control lines some transports expose (e.g. DTR/RTS
/// toggling used to hold a FET programmer in reset). Transports that don't
/// have real modem lines (a USB bulk pipe) are free to no-op `set_modem`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ModemState {
    pub dtr: bool,
    pub rts: bool,
}

pub trait Transport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Read up to `buf.len()` bytes, returning the number actually read.
    /// A best-effort transport may return fewer bytes than requested even
    /// when more will eventually arrive.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    fn flush(&mut self) -> Result<(), TransportError>;

    fn set_modem(&mut self, state: ModemState) -> Result<(), TransportError>;
}

/// Read exactly `buf.len()` bytes, looping over short `recv`s. Transports
/// are best-effort, so a single `recv` is not guaranteed to fill
/// the buffer even when the peer has already sent everything.
pub fn recv_exact<T: Transport + ?Sized>(t: &mut T, buf: &mut [u8]) -> Result<(), TransportError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = t.recv(&mut buf[filled..])?;
        if n == 0 {
            return Err(TransportError::Deadline);
        }
        filled += n;
    }
    Ok(())
}

/// An in-memory loopback transport, useful for exercising framing code
/// (`jtag::mehfet`) without a real probe attached.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    pub sent: std::collections::VecDeque<u8>,
    pub to_recv: std::collections::VecDeque<u8>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the next `recv` calls to hand back, as if a peer had
    /// already replied.
    pub fn queue_reply(&mut self, bytes: &[u8]) {
        self.to_recv.extend(bytes.iter().copied());
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.sent.extend(data.iter().copied());
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut n = 0;
        while n < buf.len() {
            match self.to_recv.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn set_modem(&mut self, _state: ModemState) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recv_exact_accumulates_across_short_reads() {
        let mut t = LoopbackTransport::new();
        t.queue_reply(&[1, 2, 3, 4]);
        let mut buf = [0u8; 4];
        recv_exact(&mut t, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn recv_exact_errors_on_starvation() {
        let mut t = LoopbackTransport::new();
        t.queue_reply(&[1]);
        let mut buf = [0u8; 4];
        assert!(recv_exact(&mut t, &mut buf).is_err());
    }
}
