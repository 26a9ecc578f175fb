//! Extension manager: registration, negotiation, and the message pipeline.
//!
//! One [`ExtensionManager`] is owned by one connection. Before the
//! handshake, extensions are registered in the order they should win
//! conflicts. During the handshake the manager either produces a client
//! offer and later activates the server's selection, or consumes a client
//! offer and produces the server response. Afterwards it pipelines every
//! message through the active sessions.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::extension::{Extension, RsvBits, Session, PERMESSAGE};
use crate::header::{is_token, parse_header, serialize_params, Params};
use crate::message::Message;

/// A client session awaiting the server's response.
struct PendingSession {
    extension: usize,
    /// Taken when the session moves to the active list.
    session: Option<Box<dyn Session>>,
}

struct ActiveSession {
    name: String,
    session: Box<dyn Session>,
}

/// Negotiates extensions for one connection and pipelines messages
/// through the resulting sessions.
///
/// # Example
///
/// ```rust,ignore
/// let mut manager = ExtensionManager::new();
/// manager.add(Box::new(PerMessageDeflate::default()));
///
/// // Client role:
/// let offer = manager.generate_offer();
/// // ... send offer, receive the response header ...
/// manager.activate(&response_header)?;
///
/// let sent = manager.process_outgoing_message(message)?;
/// ```
#[derive(Default)]
pub struct ExtensionManager {
    extensions: Vec<Box<dyn Extension>>,
    by_name: HashMap<String, usize>,
    index: HashMap<String, PendingSession>,
    sessions: Vec<ActiveSession>,
    rsv1: Option<String>,
    rsv2: Option<String>,
    rsv3: Option<String>,
}

impl ExtensionManager {
    /// Create a manager with no registered extensions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension. Registration order decides both offer order
    /// and which extension wins an RSV conflict on the server side.
    ///
    /// # Panics
    ///
    /// Panics if the name is not a valid token, the kind is not
    /// [`PERMESSAGE`], or the name is already registered. Each is a
    /// programming mistake in the caller rather than peer behavior, so
    /// none is a recoverable error. State is untouched when a check
    /// fires.
    pub fn add(&mut self, extension: Box<dyn Extension>) {
        let name = extension.name();
        assert!(
            is_token(name),
            "extension name {name:?} is not a valid token"
        );
        assert_eq!(
            extension.kind(),
            PERMESSAGE,
            "extension '{name}' has an unsupported kind"
        );
        assert!(
            !self.by_name.contains_key(name),
            "extension '{name}' is already registered"
        );
        self.by_name.insert(name.to_string(), self.extensions.len());
        self.extensions.push(extension);
    }

    /// Number of registered extensions.
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Check if no extensions are registered.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Number of currently active sessions.
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Build the client's offer header (client role).
    ///
    /// Every extension whose factory produces a session is remembered for
    /// [`ExtensionManager::activate`], even when it emits no offer
    /// fragment. RSV conflicts are not enforced here: the client may offer
    /// conflicting extensions and let the server pick.
    ///
    /// Returns `None` when no extension produced a fragment.
    pub fn generate_offer(&mut self) -> Option<String> {
        self.sessions.clear();
        self.index.clear();

        let mut fragments = Vec::new();
        for (i, extension) in self.extensions.iter().enumerate() {
            let Some(mut session) = extension.create_client_session() else {
                continue;
            };
            if let Some(offers) = session.generate_offer() {
                for params in &offers {
                    fragments.push(serialize_params(extension.name(), params));
                }
            }
            self.index.insert(
                extension.name().to_string(),
                PendingSession {
                    extension: i,
                    session: Some(session),
                },
            );
        }

        if fragments.is_empty() {
            None
        } else {
            Some(fragments.join(", "))
        }
    }

    /// Activate sessions from the server's response header (client role).
    ///
    /// Response entries are processed in header order: the server decides
    /// the pipeline order. Each accepted extension reserves its RSV bits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] on a malformed header, and
    /// [`Error::Extension`] for a response naming an unoffered extension,
    /// an RSV bit already owned by another extension, a duplicate
    /// response, or parameters the session rejects. On failure the active
    /// list may be partially populated and must not be used without
    /// re-negotiation.
    pub fn activate(&mut self, header: &str) -> Result<()> {
        let responses = parse_header(header)?;

        for (name, params) in responses.iter() {
            let extension = match self.index.get(name) {
                Some(pending) => pending.extension,
                None => {
                    return Err(Error::Extension(format!(
                        "server sent an extension response for unknown extension '{name}'"
                    )));
                }
            };
            let rsv = self.extensions[extension].rsv_bits();

            if let Some((slot, owner)) = self.reserved_conflict(name, rsv) {
                return Err(Error::Extension(format!(
                    "server sent two extension responses that use the RSV{slot} bit: \
                     '{owner}' and '{name}'"
                )));
            }

            let mut session = match self.index.get_mut(name).and_then(|p| p.session.take()) {
                Some(session) => session,
                None => {
                    return Err(Error::Extension(format!(
                        "server sent a duplicate extension response for '{name}'"
                    )));
                }
            };

            if !session.activate(params) {
                return Err(Error::Extension(format!(
                    "server sent unacceptable extension parameters: {}",
                    serialize_params(name, params)
                )));
            }

            self.reserve(name, rsv);
            self.sessions.push(ActiveSession {
                name: name.to_string(),
                session,
            });
        }

        Ok(())
    }

    /// Build the response header from the client's offers (server role).
    ///
    /// Registered extensions are visited in registry order, not offer
    /// order, so the response (and the pipeline) reflect the server's
    /// preferences. All offers for one name are aggregated and handed to
    /// the server-session factory together. Extensions that would collide
    /// on a reserved bit, or whose factory declines, are skipped silently;
    /// a later extension may still claim a bit an earlier one declined.
    ///
    /// Returns `Ok(None)` when no extension was accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] on a malformed offer header.
    pub fn generate_response(&mut self, header: &str) -> Result<Option<String>> {
        let offers = parse_header(header)?;
        self.sessions.clear();

        let mut fragments = Vec::new();
        for i in 0..self.extensions.len() {
            let name = self.extensions[i].name().to_string();
            let offered: Vec<Params> = offers.by_name(&name).into_iter().cloned().collect();
            if offered.is_empty() {
                continue;
            }

            let rsv = self.extensions[i].rsv_bits();
            if self.reserved_conflict(&name, rsv).is_some() {
                continue;
            }

            let Some(mut session) = self.extensions[i].create_server_session(&offered) else {
                continue;
            };

            self.reserve(&name, rsv);
            fragments.push(serialize_params(&name, &session.generate_response()));
            self.sessions.push(ActiveSession { name, session });
        }

        Ok(if fragments.is_empty() {
            None
        } else {
            Some(fragments.join(", "))
        })
    }

    /// Run an outgoing message through the active sessions, first to last.
    ///
    /// # Errors
    ///
    /// The first session failure halts the pipeline; remaining sessions
    /// are not invoked and the failure surfaces as [`Error::Extension`],
    /// wrapped at most once.
    pub fn process_outgoing_message(&mut self, mut message: Message) -> Result<Message> {
        for active in self.sessions.iter_mut() {
            message = active
                .session
                .process_outgoing_message(message)
                .map_err(wrap_session_error)?;
        }
        Ok(message)
    }

    /// Run an incoming message through the active sessions, last to first.
    ///
    /// # Errors
    ///
    /// Same containment as
    /// [`ExtensionManager::process_outgoing_message`].
    pub fn process_incoming_message(&mut self, mut message: Message) -> Result<Message> {
        for active in self.sessions.iter_mut().rev() {
            message = active
                .session
                .process_incoming_message(message)
                .map_err(wrap_session_error)?;
        }
        Ok(message)
    }

    /// Check a frame's reserved bits against the active sessions.
    ///
    /// A bit is allowed when any active session permits it; the frame is
    /// valid iff every bit it sets is allowed. With no active sessions
    /// only an all-clear frame is valid.
    pub fn valid_frame_rsv(&self, frame: &RsvBits) -> bool {
        let mut allowed = RsvBits::NONE;
        for active in &self.sessions {
            allowed = allowed.union(&active.session.valid_frame_rsv(frame));
        }
        frame.subset_of(&allowed)
    }

    /// Tear down every active session, ignoring individual failures.
    ///
    /// Sessions are closed in pipeline order and dropped; subsequent
    /// pipeline calls are no-ops.
    pub fn close(&mut self) {
        for active in self.sessions.iter_mut() {
            let _ = active.session.close();
        }
        self.sessions.clear();
    }

    /// Report the slot and current owner when `rsv` collides with a bit
    /// reserved by a different extension.
    fn reserved_conflict(&self, name: &str, rsv: RsvBits) -> Option<(u8, String)> {
        let slots = [
            (rsv.rsv1, &self.rsv1, 1u8),
            (rsv.rsv2, &self.rsv2, 2u8),
            (rsv.rsv3, &self.rsv3, 3u8),
        ];
        for (wants, owner, slot) in slots {
            if let (true, Some(owner)) = (wants, owner) {
                if owner != name {
                    return Some((slot, owner.clone()));
                }
            }
        }
        None
    }

    /// Reserve each claimed bit for `name`. Slots already owned stay with
    /// their owner.
    fn reserve(&mut self, name: &str, rsv: RsvBits) {
        if rsv.rsv1 && self.rsv1.is_none() {
            self.rsv1 = Some(name.to_string());
        }
        if rsv.rsv2 && self.rsv2.is_none() {
            self.rsv2 = Some(name.to_string());
        }
        if rsv.rsv3 && self.rsv3.is_none() {
            self.rsv3 = Some(name.to_string());
        }
    }
}

fn wrap_session_error(err: Error) -> Error {
    match err {
        err @ Error::Extension(_) => err,
        other => Error::Extension(other.to_string()),
    }
}

impl fmt::Debug for ExtensionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionManager")
            .field(
                "extensions",
                &self.extensions.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .field(
                "active",
                &self.sessions.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .field("rsv1", &self.rsv1)
            .field("rsv2", &self.rsv2)
            .field("rsv3", &self.rsv3)
            .finish()
    }
}
