use crate::pb::{
    RunMessageRequest, RunMessageResponse, TestMessageRequest, TestMessageResponse,
    test_service_server::TestService,
};
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};
use tonic::{Request, Response, Status, Streaming};

/// Number of messages produced by `TestServerStream`.
pub const SERVER_STREAM_LEN: usize = 5;

#[derive(Debug, Default, Clone)]
pub struct TestServiceImpl;

#[tonic::async_trait]
impl TestService for TestServiceImpl {
    type TestServerStreamStream = ReceiverStream<Result<TestMessageResponse, Status>>;
    type TestBidiStreamStream =
        Pin<Box<dyn Stream<Item = Result<TestMessageResponse, Status>> + Send>>;

    async fn test(
        &self,
        request: Request<TestMessageRequest>,
    ) -> Result<Response<TestMessageResponse>, Status> {
        tracing::debug!(message = %request.get_ref().message, "Test");

        Ok(Response::new(TestMessageResponse {
            message: "Response from Test method".to_string(),
        }))
    }

    async fn test_server_stream(
        &self,
        _request: Request<TestMessageRequest>,
    ) -> Result<Response<Self::TestServerStreamStream>, Status> {
        let (tx, rx) = mpsc::channel(SERVER_STREAM_LEN);

        tokio::spawn(async move {
            for i in 0..SERVER_STREAM_LEN {
                let response = TestMessageResponse {
                    message: format!("Server streaming response {i}"),
                };
                if tx.send(Ok(response)).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn test_client_stream(
        &self,
        request: Request<Streaming<TestMessageRequest>>,
    ) -> Result<Response<TestMessageResponse>, Status> {
        let mut stream = request.into_inner();
        let mut messages = Vec::new();

        while let Some(req) = stream.next().await {
            messages.push(req?.message);
        }

        Ok(Response::new(TestMessageResponse {
            message: format!("Received messages: {}", messages.join(", ")),
        }))
    }

    async fn test_bidi_stream(
        &self,
        request: Request<Streaming<TestMessageRequest>>,
    ) -> Result<Response<Self::TestBidiStreamStream>, Status> {
        let mut in_stream = request.into_inner();
        let (tx, rx) = mpsc::channel(128);

        tokio::spawn(async move {
            while let Some(result) = in_stream.next().await {
                match result {
                    Ok(req) => {
                        let resp = TestMessageResponse {
                            message: format!("Received: {}", req.message),
                        };
                        if tx.send(Ok(resp)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    async fn run(
        &self,
        request: Request<RunMessageRequest>,
    ) -> Result<Response<RunMessageResponse>, Status> {
        let req = request.into_inner();
        tracing::debug!(id = req.id, message = %req.message, "Run");

        Ok(Response::new(RunMessageResponse {
            message: "Response from Run method".to_string(),
        }))
    }
}
