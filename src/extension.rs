//! Extension and session contracts.
//!
//! An [`Extension`] is an immutable descriptor of a negotiable message
//! transformer; a [`Session`] is its per-connection instance. The manager
//! composes sessions into a pipeline but never looks at payloads itself,
//! so concrete transforms (compression and the like) live entirely behind
//! these traits.

use crate::error::Result;
use crate::header::Params;
use crate::message::Message;

/// RSV bit usage declaration for extensions.
///
/// Also serves as the manager's view of a frame: the three reserved bits
/// are all it ever observes. At most one active extension may claim any
/// given bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RsvBits {
    /// RSV1 bit (claimed by e.g. permessage-deflate).
    pub rsv1: bool,
    /// RSV2 bit.
    pub rsv2: bool,
    /// RSV3 bit.
    pub rsv3: bool,
}

impl RsvBits {
    /// No RSV bits used.
    pub const NONE: Self = Self {
        rsv1: false,
        rsv2: false,
        rsv3: false,
    };

    /// RSV1 only.
    pub const RSV1: Self = Self {
        rsv1: true,
        rsv2: false,
        rsv3: false,
    };

    /// RSV2 only.
    pub const RSV2: Self = Self {
        rsv1: false,
        rsv2: true,
        rsv3: false,
    };

    /// RSV3 only.
    pub const RSV3: Self = Self {
        rsv1: false,
        rsv2: false,
        rsv3: true,
    };

    /// Check if any bits overlap with another declaration.
    pub fn conflicts_with(&self, other: &RsvBits) -> bool {
        (self.rsv1 && other.rsv1) || (self.rsv2 && other.rsv2) || (self.rsv3 && other.rsv3)
    }

    /// Bitwise union of two declarations.
    #[must_use]
    pub fn union(&self, other: &RsvBits) -> RsvBits {
        RsvBits {
            rsv1: self.rsv1 || other.rsv1,
            rsv2: self.rsv2 || other.rsv2,
            rsv3: self.rsv3 || other.rsv3,
        }
    }

    /// Check that every bit set in `self` is also set in `allowed`.
    pub fn subset_of(&self, allowed: &RsvBits) -> bool {
        (allowed.rsv1 || !self.rsv1) && (allowed.rsv2 || !self.rsv2) && (allowed.rsv3 || !self.rsv3)
    }
}

/// The only extension category the manager recognizes.
///
/// Extensions report their category through [`Extension::kind`];
/// registration rejects anything that is not this discriminator.
pub const PERMESSAGE: &str = "permessage";

/// A negotiable message-transforming extension.
///
/// Implementations are registered with
/// [`ExtensionManager::add`](crate::ExtensionManager::add) before any
/// offer or response is produced, and act purely as session factories
/// afterwards. Returning `None` from a factory is a meaningful decline:
/// the extension sits out this connection.
pub trait Extension: Send + Sync {
    /// The extension name as it appears in the negotiation header.
    ///
    /// Must be a valid HTTP token; registration rejects anything else.
    fn name(&self) -> &str;

    /// The extension category discriminator. Only [`PERMESSAGE`] is
    /// accepted at registration time.
    fn kind(&self) -> &str {
        PERMESSAGE
    }

    /// Which reserved frame bits this extension may set.
    fn rsv_bits(&self) -> RsvBits {
        RsvBits::NONE
    }

    /// Create the client-side session for a new connection, or decline.
    fn create_client_session(&self) -> Option<Box<dyn Session>>;

    /// Create the server-side session from the client's offers, or
    /// decline.
    ///
    /// `offers` holds every parameter set the client advertised under this
    /// extension's name, in header order.
    fn create_server_session(&self, offers: &[Params]) -> Option<Box<dyn Session>>;
}

/// A per-connection instance of an extension.
///
/// Sessions hold whatever state the transform needs (compression
/// contexts, dictionaries) and live from negotiation until
/// [`Session::close`]. They are never reinstated after close.
pub trait Session: Send {
    /// Parameters to advertise in the client's offer header.
    ///
    /// `None` emits no header fragment while keeping the session eligible
    /// for activation; multiple entries each serialize as their own offer.
    fn generate_offer(&mut self) -> Option<Vec<Params>>;

    /// Final parameters for the server's response header.
    fn generate_response(&mut self) -> Params;

    /// Accept or reject the server's response parameters (client role).
    ///
    /// Only a `true` return activates the session.
    fn activate(&mut self, params: &Params) -> bool;

    /// Transform an outgoing message.
    ///
    /// # Errors
    ///
    /// Any error halts the pipeline and surfaces to the caller wrapped as
    /// an extension error.
    fn process_outgoing_message(&mut self, message: Message) -> Result<Message>;

    /// Transform an incoming message.
    ///
    /// # Errors
    ///
    /// Any error halts the pipeline and surfaces to the caller wrapped as
    /// an extension error.
    fn process_incoming_message(&mut self, message: Message) -> Result<Message>;

    /// Which reserved bits this session permits on the given frame.
    fn valid_frame_rsv(&self, frame: &RsvBits) -> RsvBits;

    /// Tear the session down. Idempotent; the manager ignores failures.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
