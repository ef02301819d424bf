//! Socket plumbing shared by viewer and backend connections.
//!
//! Each connection has one reader (owned by its connection task) and one
//! writer task fed through an unbounded channel, so any task can send without
//! awaiting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use mc_relay_crypto::SHARED_SECRET_LEN;
use mc_relay_proto::{encode_packet, FrameDecoder, FrameEncoder, Packet};

use crate::error::ProxyError;

const READ_CHUNK: usize = 8192;

/// Work items for a connection's writer task. Applied strictly in order.
#[derive(Debug)]
pub enum Outbound {
    /// A packet body to frame and send.
    Packet(Bytes),
    /// Bytes written without framing (legacy ping reply).
    Raw(Bytes),
    EnableEncryption([u8; SHARED_SECRET_LEN]),
    SetCompression(i32),
    Close,
}

/// Cloneable sending side of a connection.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Outbound>,
    closed: Arc<AtomicBool>,
    label: Arc<str>,
}

impl ConnectionHandle {
    pub fn new(label: impl Into<Arc<str>>) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
            label: label.into(),
        };
        (handle, rx)
    }

    /// Peer description used in log lines.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Encode and queue a packet. Returns false once the connection is closed.
    pub fn send(&self, packet: impl Into<Packet>) -> bool {
        self.send_raw(encode_packet(&packet.into()))
    }

    /// Queue an already encoded packet body.
    pub fn send_raw(&self, body: Bytes) -> bool {
        self.push(Outbound::Packet(body))
    }

    pub fn send_unframed(&self, data: Bytes) -> bool {
        self.push(Outbound::Raw(data))
    }

    pub fn enable_encryption(&self, secret: [u8; SHARED_SECRET_LEN]) -> bool {
        self.push(Outbound::EnableEncryption(secret))
    }

    pub fn set_compression(&self, threshold: i32) -> bool {
        self.push(Outbound::SetCompression(threshold))
    }

    /// Flush what is queued, then close. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(Outbound::Close);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.tx.is_closed()
    }

    pub(crate) fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    fn push(&self, item: Outbound) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.tx.send(item).is_ok()
    }
}

/// Drain `rx` into `writer` until closed or the socket fails.
pub async fn run_writer<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    closed: Arc<AtomicBool>,
) -> Result<(), ProxyError>
where
    W: AsyncWrite + Unpin,
{
    let mut encoder = FrameEncoder::new();
    let result = async {
        while let Some(item) = rx.recv().await {
            match item {
                Outbound::Packet(body) => {
                    let frame = encoder.encode(&body)?;
                    trace!("writing frame of {} bytes", frame.len());
                    writer.write_all(&frame).await?;
                }
                Outbound::Raw(data) => writer.write_all(&data).await?,
                Outbound::EnableEncryption(secret) => encoder.enable_encryption(&secret)?,
                Outbound::SetCompression(threshold) => encoder.set_compression(threshold),
                Outbound::Close => break,
            }
        }
        writer.flush().await?;
        Ok::<(), ProxyError>(())
    }
    .await;

    closed.store(true, Ordering::SeqCst);
    rx.close();
    if let Err(e) = writer.shutdown().await {
        debug!("socket shutdown failed: {e}");
    }
    result
}

/// Spawn the writer task for a connection.
pub fn spawn_writer<W>(writer: W, rx: mpsc::UnboundedReceiver<Outbound>, handle: &ConnectionHandle)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let closed = handle.closed_flag();
    let label = handle.label.clone();
    tokio::spawn(async move {
        if let Err(e) = run_writer(writer, rx, closed).await {
            debug!("writer for {label} stopped: {e}");
        }
    });
}

/// Reading side of a connection: socket bytes into decoded frames.
pub struct FrameReader<R> {
    inner: R,
    decoder: FrameDecoder,
    scratch: Box<[u8]>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::new(),
            scratch: vec![0u8; READ_CHUNK].into_boxed_slice(),
        }
    }

    pub fn decoder_mut(&mut self) -> &mut FrameDecoder {
        &mut self.decoder
    }

    /// Bytes read but not yet consumed as frames.
    pub fn buffered(&self) -> &[u8] {
        self.decoder.buffered()
    }

    /// Read once from the socket. Returns 0 on EOF.
    pub async fn fill(&mut self) -> Result<usize, ProxyError> {
        let n = self.inner.read(&mut self.scratch).await?;
        if n > 0 {
            self.decoder.queue_bytes(&self.scratch[..n]);
        }
        Ok(n)
    }

    /// Next packet body, or `None` once the peer has closed the stream.
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>, ProxyError> {
        loop {
            if let Some(frame) = self.decoder.try_next_frame()? {
                return Ok(Some(frame));
            }
            if self.fill().await? == 0 {
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_relay_proto::packets::KeepAlive;

    #[tokio::test]
    async fn writer_and_reader_agree() {
        let (client, server) = tokio::io::duplex(4096);
        let (handle, rx) = ConnectionHandle::new("test");
        spawn_writer(client, rx, &handle);

        assert!(handle.send(KeepAlive { id: 1 }));
        assert!(handle.set_compression(0));
        assert!(handle.enable_encryption([3u8; 16]));
        assert!(handle.send(KeepAlive { id: 2 }));
        handle.close();
        assert!(!handle.send(KeepAlive { id: 3 }));

        let mut reader = FrameReader::new(server);
        assert_eq!(&reader.next_frame().await.unwrap().unwrap()[..], &[0x00, 0x01]);
        reader.decoder_mut().set_compression(0);
        reader.decoder_mut().enable_encryption(&[3u8; 16]).unwrap();
        assert_eq!(&reader.next_frame().await.unwrap().unwrap()[..], &[0x00, 0x02]);
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn closed_flag_set_when_writer_exits() {
        let (client, _server) = tokio::io::duplex(64);
        let (handle, rx) = ConnectionHandle::new("test");
        let closed = handle.closed_flag();
        let writer = tokio::spawn(run_writer(client, rx, closed));
        handle.close();
        writer.await.unwrap().unwrap();
        assert!(handle.is_closed());
    }
}
