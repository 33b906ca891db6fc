use crate::pb::{SyncMessageRequest, SyncMessageResponse, sync_service_server::SyncService};
use std::{pin::Pin, time::Duration};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};
use tonic::{Request, Response, Status, Streaming};

/// Echo-style service. `SyncServerStream` waits `interval` between messages to simulate work.
#[derive(Debug, Default, Clone)]
pub struct SyncServiceImpl {
    interval: Duration,
}

impl SyncServiceImpl {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[tonic::async_trait]
impl SyncService for SyncServiceImpl {
    type SyncServerStreamStream = ReceiverStream<Result<SyncMessageResponse, Status>>;
    type SyncBidiStreamStream =
        Pin<Box<dyn Stream<Item = Result<SyncMessageResponse, Status>> + Send>>;

    async fn sync(
        &self,
        request: Request<SyncMessageRequest>,
    ) -> Result<Response<SyncMessageResponse>, Status> {
        Ok(Response::new(SyncMessageResponse {
            message: format!("Received: {}", request.into_inner().message),
        }))
    }

    async fn sync_server_stream(
        &self,
        request: Request<SyncMessageRequest>,
    ) -> Result<Response<Self::SyncServerStreamStream>, Status> {
        let msg = request.into_inner().message;
        let interval = self.interval;
        let (tx, rx) = mpsc::channel(4);

        tokio::spawn(async move {
            for i in 0..5 {
                let response = SyncMessageResponse {
                    message: format!("Stream response {i} for: {msg}"),
                };
                if tx.send(Ok(response)).await.is_err() {
                    break;
                }
                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn sync_client_stream(
        &self,
        request: Request<Streaming<SyncMessageRequest>>,
    ) -> Result<Response<SyncMessageResponse>, Status> {
        let mut stream = request.into_inner();
        let mut messages = Vec::new();

        while let Some(req) = stream.next().await {
            messages.push(req?.message);
        }

        Ok(Response::new(SyncMessageResponse {
            message: format!("Received messages: {}", messages.join(", ")),
        }))
    }

    async fn sync_bidi_stream(
        &self,
        request: Request<Streaming<SyncMessageRequest>>,
    ) -> Result<Response<Self::SyncBidiStreamStream>, Status> {
        let in_stream = request.into_inner();

        let out_stream = in_stream.map(|req| {
            req.map(|req| SyncMessageResponse {
                message: format!("Echoing: {}", req.message),
            })
        });

        Ok(Response::new(Box::pin(out_stream)))
    }
}
