//! BMP message parsing.
//!
//! <https://datatracker.ietf.org/doc/html/rfc7854>

pub use headers::*;
pub use initiation_message::*;
pub use peer_down_notification::*;
pub use peer_up_notification::*;
pub use route_monitoring::*;
pub use termination_message::*;

pub(crate) mod headers;
pub(crate) mod initiation_message;
pub(crate) mod peer_down_notification;
pub(crate) mod peer_up_notification;
pub(crate) mod route_monitoring;
pub(crate) mod termination_message;

#[derive(Debug)]
pub enum MessageBody {
    PeerUpNotification(PeerUpNotification),
    PeerDownNotification(PeerDownNotification),
    InitiationMessage(InitiationMessage),
    TerminationMessage(TerminationMessage),
    RouteMonitoring(RouteMonitoring),
    /// Statistics reports, route mirroring and unknown types are counted but not decoded.
    Ignored,
}
