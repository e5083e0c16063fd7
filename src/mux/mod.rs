use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{trace, warn};
use tokio::sync::Mutex;
use util::{Buffer, Conn};

use crate::error::{Error, Result};
use crate::mux::endpoint::Endpoint;
use crate::mux::mux_func::MatchFunc;

pub mod endpoint;
pub mod mux_func;


pub(crate) type EndpointMap = Arc<Mutex<HashMap<usize, Arc<Endpoint>>>>;

/// Config collects the arguments to mux.Mux construction.
pub struct Config {
    pub conn: Arc<dyn Conn + Send + Sync>,
    pub buffer_size: usize,
}

/// Mux demultiplexes multiple Endpoints over a single net.Conn, dispatching
/// reads to the first registered Endpoint whose MatchFunc accepts them.
pub struct Mux {
    id: Arc<AtomicUsize>,
    next_conn: Arc<dyn Conn + Send + Sync>,
    pub(crate) endpoints: EndpointMap,
    buffer_size: usize,
    closed_ch_tx: Option<tokio::sync::broadcast::Sender<()>>,
}

impl Mux {
    pub fn new(config: Config) -> Self {
        let (closed_ch_tx, _) = tokio::sync::broadcast::channel(1);
        let m = Mux {
            id: Arc::new(AtomicUsize::new(0)),
            next_conn: config.conn,
            endpoints: Arc::new(Mutex::new(HashMap::new())),
            buffer_size: config.buffer_size,
            closed_ch_tx: Some(closed_ch_tx.clone()),
        };

        let next_conn = Arc::clone(&m.next_conn);
        let endpoints = Arc::clone(&m.endpoints);
        let buffer_size = m.buffer_size;
        let mut closed_ch_rx = closed_ch_tx.subscribe();

        tokio::spawn(async move {
            let mut buf = vec![0u8; buffer_size];
            loop {
                tokio::select! {
                    _ = closed_ch_rx.recv() => return,
                    result = next_conn.recv(&mut buf) => {
                        match result {
                            Ok(n) => {
                                if let Err(err) = Mux::dispatch(&buf[..n], &endpoints).await {
                                    warn!("mux: ending readLoop dispatch error: {err}");
                                    return;
                                }
                            }
                            Err(err) => {
                                trace!("mux: ending readLoop conn.recv error: {err}");
                                return;
                            }
                        }
                    }
                }
            }
        });

        m
    }

    /// new_endpoint registers a new Endpoint whose MatchFunc is f. Packets
    /// read off the underlying conn are dispatched to the first Endpoint
    /// whose MatchFunc returns true, in registration order.
    pub async fn new_endpoint(&self, f: MatchFunc) -> Arc<Endpoint> {
        let id = self.id.fetch_add(1, Ordering::SeqCst);

        let e = Arc::new(Endpoint {
            id,
            buffer: Buffer::new(0, 0),
            match_fn: f,
            next_conn: Arc::clone(&self.next_conn),
            endpoints: Arc::clone(&self.endpoints),
        });

        let mut endpoints = self.endpoints.lock().await;
        endpoints.insert(id, Arc::clone(&e));

        e
    }

    /// remove_endpoint unregisters an Endpoint without closing its buffer.
    pub async fn remove_endpoint(&self, e: &Arc<Endpoint>) {
        let mut endpoints = self.endpoints.lock().await;
        endpoints.remove(&e.id);
    }

    /// close unregisters all Endpoints and stops the read loop.
    pub async fn close(&mut self) {
        {
            let mut endpoints = self.endpoints.lock().await;
            for (_, e) in endpoints.drain() {
                let _ = e.close().await;
            }
        }

        if let Some(closed_ch_tx) = self.closed_ch_tx.take() {
            let _ = closed_ch_tx.send(());
        }
    }

    pub(crate) async fn dispatch(buf: &[u8], endpoints: &EndpointMap) -> Result<()> {
        let endpoints = endpoints.lock().await;

        if buf.is_empty() {
            return Ok(());
        }

        for e in endpoints.values() {
            if (e.match_fn)(buf) {
                return e
                    .buffer
                    .write(buf)
                    .await
                    .map(|_| ())
                    .map_err(|err| Error::ErrOthers(err.to_string()));
            }
        }

        trace!(
            "mux: no endpoint for packet starting with {:?}",
            buf.first()
        );

        Ok(())
    }
}
