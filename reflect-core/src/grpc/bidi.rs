//! # Bidirectional Calls With a Drain Task
//!
//! [`Invoker::open_bidirectional`] opens a bidirectional call whose sends are issued one at a time
//! by the caller while a spawned task does nothing but drain the inbound side.
//!
//! ```text
//!  caller ── send() ──► outbound channel ──► tonic ──► server
//!  caller ◄── next() ── inbound channel ◄── drain task ◄── server
//! ```
//!
//! The drain task surfaces every inbound message through an unbounded channel and ends when the
//! server closes the stream. Half-closing the outbound side does not mean every response was
//! observed; [`BidiCall::join`] waits for the drain task to finish.
use super::client::{CallShape, InvokeError, Invoker, check_shape, dispatch_path};
use super::codec::DynamicCodec;
use crate::{BoxError, reflection::resolver::ResolvedMethod};
use http_body::Body as HttpBody;
use prost_reflect::DynamicMessage;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::ReceiverStream;
use tonic::client::GrpcService;

/// Capacity of the outbound channel. A full channel makes [`BidiCall::send`] wait.
const OUTBOUND_CAPACITY: usize = 32;

impl<S> Invoker<S>
where
    S: GrpcService<tonic::body::Body> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<BoxError> + Send,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Opens a bidirectional call and spawns the task draining its responses.
    ///
    /// The call itself is opened by the spawned task: an open failure is reported by
    /// [`BidiCall::join`], and [`BidiCall::next`] returns `None`.
    pub fn open_bidirectional(&self, method: &ResolvedMethod) -> Result<BidiCall, InvokeError> {
        check_shape(method, CallShape::Bidirectional)?;
        let path = dispatch_path(method)?;
        let codec = DynamicCodec::new(method.input(), method.output());

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let mut client = self.client.clone();

        let drain = tokio::spawn(async move {
            client
                .ready()
                .await
                .map_err(|e| InvokeError::ClientNotReady(e.into()))?;

            tracing::debug!(path = %path, "opening bidirectional call");
            let request = tonic::Request::new(ReceiverStream::new(outbound_rx));
            let mut inbound = client.streaming(request, path, codec).await?.into_inner();

            let mut received: usize = 0;
            while let Some(message) = inbound.message().await? {
                received += 1;
                // The caller may have stopped observing; keep draining regardless.
                let _ = inbound_tx.send(message);
            }

            tracing::debug!(received, "bidirectional call drained");
            Ok::<_, InvokeError>(received)
        });

        Ok(BidiCall {
            outbound: Some(outbound_tx),
            inbound: inbound_rx,
            drain,
        })
    }
}

/// Handle on an open bidirectional call.
///
/// Dropping the handle half-closes the call; the drain task keeps running until the server ends
/// the stream.
#[derive(Debug)]
pub struct BidiCall {
    outbound: Option<mpsc::Sender<DynamicMessage>>,
    inbound: mpsc::UnboundedReceiver<DynamicMessage>,
    drain: JoinHandle<Result<usize, InvokeError>>,
}

impl BidiCall {
    /// Queues `message` for sending. Messages are sent in the order they are queued.
    pub async fn send(&self, message: DynamicMessage) -> Result<(), InvokeError> {
        let outbound = self.outbound.as_ref().ok_or(InvokeError::HalfClosed)?;

        outbound
            .send(message)
            .await
            .map_err(|_| InvokeError::SendFailed)
    }

    /// Signals that no more messages will be sent. Idempotent.
    pub fn half_close(&mut self) {
        if self.outbound.take().is_some() {
            tracing::debug!("bidirectional call half-closed");
        }
    }

    pub fn is_half_closed(&self) -> bool {
        self.outbound.is_none()
    }

    /// Next response surfaced by the drain task, or `None` once the call has ended.
    pub async fn next(&mut self) -> Option<DynamicMessage> {
        self.inbound.recv().await
    }

    /// Half-closes the call and waits for the drain task.
    ///
    /// Returns the number of responses the call produced, or the error that ended it.
    /// Responses not yet observed through [`BidiCall::next`] are discarded.
    pub async fn join(mut self) -> Result<usize, InvokeError> {
        self.half_close();
        self.drain.await?
    }

    /// Stops the drain task without waiting for the server. [`BidiCall::next`] then returns the
    /// responses already drained, and [`BidiCall::join`] reports the cancellation.
    pub fn abort(&self) {
        self.drain.abort();
    }
}
