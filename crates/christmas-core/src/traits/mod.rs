//! Core trait definitions

mod transport;

pub use transport::{
    endpoint_url, OutboundFrame, Transport, TransportEndpoint, TransportEvent, TransportLink,
    CLOSE_ABNORMAL, CLOSE_GOING_AWAY, CLOSE_NORMAL, CLOSE_NO_STATUS,
};
