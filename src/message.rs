//! The message unit carried through the extension pipeline.

use bytes::Bytes;

/// An assembled protocol message as seen by extensions.
///
/// The manager treats the payload as opaque bytes; only sessions read or
/// rewrite it. The three reserved flags mirror the RSV bits of the frame
/// header that carried the message, so a compressing session can mark a
/// payload as transformed for its peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// RSV1 flag.
    pub rsv1: bool,
    /// RSV2 flag.
    pub rsv2: bool,
    /// RSV3 flag.
    pub rsv3: bool,
    /// The message payload.
    pub payload: Bytes,
}

impl Message {
    /// Create a message with all reserved flags clear.
    #[must_use]
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            rsv1: false,
            rsv2: false,
            rsv3: false,
            payload: payload.into(),
        }
    }

    /// Replace the payload, keeping the reserved flags.
    pub fn set_payload(&mut self, payload: impl Into<Bytes>) {
        self.payload = payload.into();
    }
}
