//! Outbound frame representation handed from the router to the bridge.

use bytes::{Bytes, BytesMut};

/// A frame the router wants transmitted over the link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundFrame {
    Contiguous(Bytes),
    /// Scatter list of fragments that together form one frame.
    Fragmented(Vec<Bytes>),
}

impl OutboundFrame {
    pub fn len(&self) -> usize {
        match self {
            OutboundFrame::Contiguous(bytes) => bytes.len(),
            OutboundFrame::Fragmented(fragments) => fragments.iter().map(Bytes::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_contiguous(&self) -> bool {
        match self {
            OutboundFrame::Contiguous(_) => true,
            OutboundFrame::Fragmented(fragments) => fragments.len() <= 1,
        }
    }

    /// Flattens the frame into one buffer, copying only when fragmented.
    pub fn linearize(self) -> Bytes {
        match self {
            OutboundFrame::Contiguous(bytes) => bytes,
            OutboundFrame::Fragmented(mut fragments) if fragments.len() <= 1 => {
                fragments.pop().unwrap_or_default()
            }
            OutboundFrame::Fragmented(fragments) => {
                let mut flat =
                    BytesMut::with_capacity(fragments.iter().map(Bytes::len).sum());
                for fragment in &fragments {
                    flat.extend_from_slice(fragment);
                }
                flat.freeze()
            }
        }
    }
}

impl From<Bytes> for OutboundFrame {
    fn from(bytes: Bytes) -> Self {
        OutboundFrame::Contiguous(bytes)
    }
}

impl From<Vec<u8>> for OutboundFrame {
    fn from(bytes: Vec<u8>) -> Self {
        OutboundFrame::Contiguous(Bytes::from(bytes))
    }
}

impl From<Vec<Bytes>> for OutboundFrame {
    fn from(fragments: Vec<Bytes>) -> Self {
        OutboundFrame::Fragmented(fragments)
    }
}
