//! An in-process stand-in for the SICK radar's TCP endpoint.
//!
//! Accepts connections and frames inbound commands the same way the real
//! sensor does (`STX payload ETX`), then answers each command with the
//! next scripted step: a canned reply, a hard disconnect (to exercise the
//! Acquisition Loop's reconnect path), or silence (to exercise the read
//! timeout). Steps are consumed in order; once the queue is empty, every
//! further command gets `default_reply`.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const STX: u8 = 0x02;
const ETX: u8 = 0x03;

#[derive(Debug, Clone)]
pub enum ScriptStep {
    Reply(Vec<u8>),
    Disconnect,
    Silent,
}

struct Shared {
    steps: Mutex<VecDeque<ScriptStep>>,
    default_reply: Mutex<Vec<u8>>,
}

pub struct MockRadarServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    accept_task: JoinHandle<()>,
}

impl MockRadarServer {
    /// Binds on an OS-assigned loopback port and starts accepting
    /// connections in the background. The default reply (used once the
    /// scripted queue is drained) is an empty `P3DX1`/`V3DX1`-free reply,
    /// matching "missing blocks leave channels zeroed".
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("mock radar bind should succeed");
        let addr = listener.local_addr().expect("local_addr");
        let shared = Arc::new(Shared {
            steps: Mutex::new(VecDeque::new()),
            default_reply: Mutex::new(b"sRA LMDradardata".to_vec()),
        });
        let accept_shared = shared.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((stream, _peer)) = listener.accept().await else {
                    return;
                };
                let conn_shared = accept_shared.clone();
                tokio::spawn(async move {
                    serve_connection(stream, conn_shared).await;
                });
            }
        });
        Self {
            addr,
            shared,
            accept_task,
        }
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn push_reply(&self, reply: impl Into<Vec<u8>>) {
        self.shared
            .steps
            .lock()
            .expect("steps lock")
            .push_back(ScriptStep::Reply(reply.into()));
    }

    pub fn push_disconnect(&self) {
        self.shared
            .steps
            .lock()
            .expect("steps lock")
            .push_back(ScriptStep::Disconnect);
    }

    pub fn push_silent(&self) {
        self.shared
            .steps
            .lock()
            .expect("steps lock")
            .push_back(ScriptStep::Silent);
    }

    pub fn set_default_reply(&self, reply: impl Into<Vec<u8>>) {
        *self.shared.default_reply.lock().expect("default lock") = reply.into();
    }
}

impl Drop for MockRadarServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve_connection(mut stream: tokio::net::TcpStream, shared: Arc<Shared>) {
    loop {
        if read_framed_command(&mut stream).await.is_none() {
            return;
        }
        let step = shared.steps.lock().expect("steps lock").pop_front();
        match step {
            Some(ScriptStep::Reply(bytes)) => {
                if stream.write_all(&bytes).await.is_err() {
                    return;
                }
            }
            Some(ScriptStep::Disconnect) => return,
            Some(ScriptStep::Silent) => {
                // Caller's read timeout will trip; just wait for the next
                // command or the peer to give up.
            }
            None => {
                let reply = shared.default_reply.lock().expect("default lock").clone();
                if stream.write_all(&reply).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Reads one `STX ... ETX` framed command. Returns `None` on EOF/error.
async fn read_framed_command(stream: &mut tokio::net::TcpStream) -> Option<Vec<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match stream.read_exact(&mut byte).await {
            Ok(()) if byte[0] == STX => break,
            Ok(()) => continue,
            Err(_) => return None,
        }
    }
    let mut payload = Vec::new();
    loop {
        match stream.read_exact(&mut byte).await {
            Ok(()) if byte[0] == ETX => return Some(payload),
            Ok(()) => payload.push(byte[0]),
            Err(_) => return None,
        }
    }
}
