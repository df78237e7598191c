//! Error kinds surfaced by the bridge and by its collaborators.

use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};

/// Failure reported by a driver's probe callback.
#[derive(Clone, PartialEq, Eq)]
pub struct ProbeError {
    reason: String,
}

impl ProbeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Debug for ProbeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ProbeError({:?})", self.reason)
    }
}

impl Display for ProbeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "probe failed: {}", self.reason)
    }
}

impl Error for ProbeError {}

/// Failure reported by the link while transmitting a frame.
#[derive(Clone, PartialEq, Eq)]
pub struct LinkError {
    reason: String,
}

impl LinkError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Debug for LinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "LinkError({:?})", self.reason)
    }
}

impl Display for LinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "link transmit failed: {}", self.reason)
    }
}

impl Error for LinkError {}

/// Failure reported by the router when ingesting or registering.
#[derive(Clone, PartialEq, Eq)]
pub enum RouterError {
    /// The upper-layer header of an ingested frame could not be parsed.
    MalformedHeader,
    /// The router is temporarily unable to accept the frame.
    Busy,
    /// Any other router-side failure.
    Other(String),
}

impl Debug for RouterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::MalformedHeader => write!(f, "MalformedHeader"),
            RouterError::Busy => write!(f, "Busy"),
            RouterError::Other(reason) => write!(f, "Other({:?})", reason),
        }
    }
}

impl Display for RouterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::MalformedHeader => write!(f, "malformed router header"),
            RouterError::Busy => write!(f, "router busy"),
            RouterError::Other(reason) => write!(f, "router failure: {}", reason),
        }
    }
}

impl Error for RouterError {}

#[derive(Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// A handle for this port is already live on the bridge.
    AlreadyExists { port: u32 },
    /// No such port or driver.
    NotFound(String),
    /// Queue or worker resources could not be obtained.
    ResourceExhausted(String),
    /// An inbound frame carried a malformed upper-layer header.
    MalformedPayload,
    /// The link refused or failed to transmit an outbound frame.
    TransmitFailure(LinkError),
    /// A driver probe failed; the handle stays unbound.
    ProbeFailure {
        driver: String,
        handle: String,
        error: ProbeError,
    },
    /// The bridge is not attached to its link (yet, or any more).
    NotReady,
    /// The bridge has been torn down.
    ShutDown,
    /// Router-side failure other than a malformed header.
    Router(RouterError),
}

impl Debug for BridgeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::AlreadyExists { port } => write!(f, "AlreadyExists({})", port),
            BridgeError::NotFound(what) => write!(f, "NotFound({:?})", what),
            BridgeError::ResourceExhausted(what) => write!(f, "ResourceExhausted({:?})", what),
            BridgeError::MalformedPayload => write!(f, "MalformedPayload"),
            BridgeError::TransmitFailure(err) => write!(f, "TransmitFailure({:?})", err),
            BridgeError::ProbeFailure {
                driver,
                handle,
                error,
            } => write!(f, "ProbeFailure({}, {}, {:?})", driver, handle, error),
            BridgeError::NotReady => write!(f, "NotReady"),
            BridgeError::ShutDown => write!(f, "ShutDown"),
            BridgeError::Router(err) => write!(f, "Router({:?})", err),
        }
    }
}

impl Display for BridgeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::AlreadyExists { port } => {
                write!(f, "a service handle for port {} already exists", port)
            }
            BridgeError::NotFound(what) => write!(f, "not found: {}", what),
            BridgeError::ResourceExhausted(what) => write!(f, "resource exhausted: {}", what),
            BridgeError::MalformedPayload => write!(f, "malformed ipc router payload"),
            BridgeError::TransmitFailure(err) => write!(f, "transmit failure: {}", err),
            BridgeError::ProbeFailure {
                driver,
                handle,
                error,
            } => write!(
                f,
                "driver {} failed to probe handle {}: {}",
                driver, handle, error
            ),
            BridgeError::NotReady => write!(f, "bridge is not attached to its link"),
            BridgeError::ShutDown => write!(f, "bridge has been torn down"),
            BridgeError::Router(err) => write!(f, "{}", err),
        }
    }
}

impl Error for BridgeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BridgeError::TransmitFailure(err) => Some(err),
            BridgeError::ProbeFailure { error, .. } => Some(error),
            BridgeError::Router(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RouterError> for BridgeError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::MalformedHeader => BridgeError::MalformedPayload,
            other => BridgeError::Router(other),
        }
    }
}

impl From<LinkError> for BridgeError {
    fn from(err: LinkError) -> Self {
        BridgeError::TransmitFailure(err)
    }
}
