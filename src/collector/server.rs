//! TCP listener and BMP sessions.
use super::{Collector, PeerKey};
use crate::error::CollectorError;
use crate::models::{AddPathOptions, BgpMessage};
use crate::parser::bmp::messages::{parse_per_peer_header, BmpMsgType, MessageBody};
use crate::parser::bmp::{parse_bmp_body, BmpCodec, BmpFrame};
use crate::parser::ParserBmpError;
use futures::StreamExt;
use log::{debug, error, info, warn};
use socket2::{SockRef, TcpKeepalive};
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::FramedRead;
use tokio_util::task::TaskTracker;

impl Collector {
    /// Bind the configured listen address.
    pub async fn listen(&self) -> Result<TcpListener, CollectorError> {
        let addr = self.config.listen;
        TcpListener::bind(addr)
            .await
            .map_err(|source| CollectorError::Listen { addr, source })
    }

    /// Bind and serve until the collector stops.
    pub async fn run(self: Arc<Self>) -> Result<(), CollectorError> {
        let listener = self.listen().await?;
        self.serve(listener).await
    }

    /// Accept exporter connections on `listener` until the collector stops, then wait for the
    /// sessions to close.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), CollectorError> {
        info!("listening for BMP connections on {}", listener.local_addr()?);
        let tracker = TaskTracker::new();
        tracker.spawn(self.clone().run_stale_timer());

        loop {
            let accepted = tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            let (stream, exporter) = match accepted {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!("failed to accept BMP connection: {}", err);
                    continue;
                }
            };
            self.set_active();
            self.setup_socket(&stream, exporter);

            let session = tokio::spawn(self.clone().serve_connection(stream, exporter));
            let collector = self.clone();
            tracker.spawn(async move {
                let exporter_ip = exporter.ip().to_canonical();
                let metrics = collector.metrics.exporter(exporter_ip);
                if let Err(err) = session.await {
                    if err.is_panic() {
                        error!("fatal error while processing BMP messages from {}", exporter_ip);
                        metrics.panics.fetch_add(1, Ordering::Relaxed);
                    }
                }
                if !collector.cancel.is_cancelled() {
                    info!("connection down for {}", exporter_ip);
                    collector.handle_connection_down(exporter);
                }
                metrics.closed_connections.fetch_add(1, Ordering::Relaxed);
            });
        }

        info!("BMP listener shutdown requested");
        tracker.close();
        tracker.wait().await;
        Ok(())
    }

    fn setup_socket(&self, stream: &TcpStream, exporter: SocketAddr) {
        let socket = SockRef::from(stream);
        let exporter_ip = exporter.ip().to_canonical();
        if let Err(err) = socket.set_linger(Some(Duration::ZERO)) {
            warn!("unable to set linger for {}: {}", exporter_ip, err);
        }
        let keepalive = TcpKeepalive::new().with_time(self.config.keepalive_duration());
        if let Err(err) = socket.set_tcp_keepalive(&keepalive) {
            error!("unable to enable keepalive for {}: {}", exporter_ip, err);
        }

        let requested = self.config.receive_buffer;
        if requested > 0 {
            if let Err(err) = socket.set_recv_buffer_size(requested) {
                warn!(
                    "failed to set BMP receive buffer for exporter {} (requested {} bytes): {}",
                    exporter_ip, requested, err
                );
            }
        }
        match socket.recv_buffer_size() {
            Ok(actual) => {
                if actual < requested {
                    warn!(
                        "BMP receive buffer for exporter {} is below requested size: requested={} actual={}",
                        exporter_ip, requested, actual
                    );
                }
                self.metrics
                    .exporter(exporter_ip)
                    .receive_buffer_size
                    .store(actual as u64, Ordering::Relaxed);
            }
            Err(err) => warn!(
                "failed to read BMP receive buffer size for exporter {}: {}",
                exporter_ip, err
            ),
        }
    }

    /// Read BMP messages from one exporter until it disconnects, misbehaves or the collector
    /// stops.
    async fn serve_connection(self: Arc<Self>, stream: TcpStream, exporter: SocketAddr) {
        let exporter_ip = exporter.ip().to_canonical();
        let metrics = self.metrics.exporter(exporter_ip);
        metrics.opened_connections.fetch_add(1, Ordering::Relaxed);
        self.handle_connection_up(exporter);
        debug!("accepted connection from {}", exporter);

        let mut frames = FramedRead::new(stream, BmpCodec);
        let mut initialized = false;
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => return,
                next = frames.next() => next,
            };
            let frame = match next {
                Some(Ok(frame)) => frame,
                Some(Err(err)) => {
                    let label = match err {
                        ParserBmpError::IoError(_) => "cannot read BMP header",
                        _ => "cannot decode BMP header",
                    };
                    if !self.cancel.is_cancelled() {
                        warn!("{} from {}: {}", label, exporter_ip, err);
                        metrics.error(label);
                    }
                    return;
                }
                None => return,
            };
            if self.handle_frame(exporter, &mut initialized, frame).is_break() {
                return;
            }
        }
    }

    /// Process one BMP message of an exporter session.
    pub(crate) fn handle_frame(
        &self,
        exporter: SocketAddr,
        initialized: &mut bool,
        frame: BmpFrame,
    ) -> ControlFlow<()> {
        let exporter_ip = exporter.ip().to_canonical();
        let metrics = self.metrics.exporter(exporter_ip);
        let msg_type = frame.header.msg_type;
        metrics.message_received(msg_type);
        match msg_type {
            BmpMsgType::InitiationMessage => *initialized = true,
            BmpMsgType::Unknown(t) => info!("unknown BMP message type {} from {}", t, exporter_ip),
            _ => {}
        }
        if !*initialized {
            error!("first message from {} is not initiation", exporter_ip);
            metrics.error("first message not initiation");
            return ControlFlow::Break(());
        }
        if matches!(
            msg_type,
            BmpMsgType::StatisticsReport | BmpMsgType::RouteMirroringMessage | BmpMsgType::Unknown(_)
        ) {
            return ControlFlow::Continue(());
        }

        let mut data = frame.body;
        let mut peer = None;
        let mut add_path = AddPathOptions::default();
        if msg_type.has_per_peer_header() {
            let header = match parse_per_peer_header(&mut data) {
                Ok(header) => header,
                Err(err) => {
                    error!("cannot parse BMP peer header from {}: {}", exporter_ip, err);
                    metrics.error("cannot parse BMP peer header");
                    return ControlFlow::Break(());
                }
            };
            let key = PeerKey::new(exporter, &header);
            if let Some(options) =
                self.read_state(|state| state.peers.get(&key).map(|info| info.add_path.clone()))
            {
                add_path = options;
            }
            peer = Some((header, key));
        }

        let body = match parse_bmp_body(
            msg_type,
            peer.as_ref().map(|(header, _)| header),
            &mut data,
            &add_path,
        ) {
            Ok(body) => body,
            Err(err) => {
                error!("cannot parse BMP body from {}: {}", exporter_ip, err);
                metrics.error("cannot parse BMP body");
                return ControlFlow::Break(());
            }
        };

        match (body, peer) {
            (MessageBody::InitiationMessage(msg), _) => match msg.sys_name() {
                Some(sys_name) => info!("new connection from {} (sysname: {})", exporter_ip, sys_name),
                None => info!("new connection from {}", exporter_ip),
            },
            (MessageBody::TerminationMessage(msg), _) => {
                match msg.reason() {
                    Some(reason) => info!(
                        "termination message received from {} (reason: {})",
                        exporter_ip, reason
                    ),
                    None => info!("termination message received from {}", exporter_ip),
                }
                return ControlFlow::Break(());
            }
            (MessageBody::PeerUpNotification(msg), Some((_, key))) => {
                self.handle_peer_up(&key, &msg)
            }
            (MessageBody::PeerDownNotification(_), Some((_, key))) => self.handle_peer_down(&key),
            (MessageBody::RouteMonitoring(msg), Some((_, key))) => match msg.bgp_message {
                BgpMessage::Update(update) => self.handle_route_monitoring(&key, &update),
                other => debug!(
                    "ignoring route monitoring from {} without UPDATE: {:?}",
                    exporter_ip, other
                ),
            },
            _ => {}
        }
        ControlFlow::Continue(())
    }
}
