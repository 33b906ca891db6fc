
use failing_sync_impl::{FAILURE, FailingSyncService, RESPONSES_BEFORE_FAILURE};
use futures_util::{StreamExt, stream};
use prost_reflect::{DynamicMessage, ReflectMessage};
use reflect_core::{
    ErrorKind,
    grpc::client::{CallShape, InvokeError, Invoker},
    message,
    reflection::resolver::{DescriptorResolver, ResolvedMethod},
    symbol::ServiceSymbol,
};
use reflect_service::{
    FILE_DESCRIPTOR_SET, SERVER_STREAM_LEN, SyncServiceImpl, SyncServiceServer, TestServiceImpl,
    TestServiceServer,
};
use serde_json::json;
use tonic::service::Routes;

fn setup_routes() -> Routes {
    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()
        .unwrap();

    Routes::new(reflection_service)
        .add_service(TestServiceServer::new(TestServiceImpl))
        .add_service(SyncServiceServer::new(SyncServiceImpl::default()))
}

async fn setup(service: &str, method: &str) -> (Invoker<Routes>, ResolvedMethod) {
    let routes = setup_routes();
    let mut resolver = DescriptorResolver::new(routes.clone(), "reflect");

    let method = resolver
        .resolve(&ServiceSymbol::new("reflect", service, method))
        .await
        .unwrap();

    (Invoker::new(routes), method)
}

async fn setup_failing(method: &str) -> (Invoker<Routes>, ResolvedMethod) {
    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()
        .unwrap();
    let routes = Routes::new(reflection_service)
        .add_service(SyncServiceServer::new(FailingSyncService));

    let mut resolver = DescriptorResolver::new(routes.clone(), "reflect");
    let method = resolver
        .resolve(&ServiceSymbol::new("reflect", "SyncService", method))
        .await
        .unwrap();

    (Invoker::new(routes), method)
}

fn request(method: &ResolvedMethod, text: &str) -> DynamicMessage {
    message::from_value(&method.input(), json!({ "message": text })).unwrap()
}

fn text_of(response: &DynamicMessage) -> String {
    response
        .get_field_by_name("message")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap()
}

#[tokio::test]
async fn test_unary() {
    let (mut invoker, method) = setup("TestService", "Test").await;

    let response = invoker
        .unary(&method, request(&method, "Hello"))
        .await
        .unwrap();

    assert_eq!(
        response.descriptor().full_name(),
        "reflect.TestMessageResponse"
    );
    assert_eq!(text_of(&response), "Response from Test method");
}

#[tokio::test]
async fn test_unary_with_nested_input() {
    let (mut invoker, method) = setup("TestService", "Run").await;

    let body = json!({
        "message": "Run command test",
        "id": 12345,
        "options": { "verbose": true, "retryCount": 3, "tags": ["tag1", "tag2"] }
    });
    let request = message::from_value(&method.input(), body).unwrap();

    let response = invoker.unary(&method, request).await.unwrap();

    assert_eq!(text_of(&response), "Response from Run method");
}

#[tokio::test]
async fn test_server_streaming() {
    let (mut invoker, method) = setup("TestService", "TestServerStream").await;

    let stream = invoker
        .server_streaming(&method, request(&method, "Stream"))
        .await
        .unwrap();

    let texts: Vec<String> = stream.map(|item| text_of(&item.unwrap())).collect().await;

    let expected: Vec<String> = (0..SERVER_STREAM_LEN)
        .map(|i| format!("Server streaming response {i}"))
        .collect();
    assert_eq!(texts, expected);
}

#[tokio::test]
async fn test_server_streaming_echoes_request() {
    let (mut invoker, method) = setup("SyncService", "SyncServerStream").await;

    let mut stream = invoker
        .server_streaming(&method, request(&method, "ping"))
        .await
        .unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(text_of(&first), "Stream response 0 for: ping");

    // The rest of the stream is still there, in order.
    let rest: Vec<_> = stream.collect().await;
    assert_eq!(rest.len(), SERVER_STREAM_LEN - 1);
}

#[tokio::test]
async fn test_client_streaming() {
    let (mut invoker, method) = setup("TestService", "TestClientStream").await;

    let requests = vec![
        request(&method, "m1"),
        request(&method, "m2"),
        request(&method, "m3"),
    ];

    let response = invoker
        .client_streaming(&method, stream::iter(requests))
        .await
        .unwrap();

    assert_eq!(text_of(&response), "Received messages: m1, m2, m3");
}

#[tokio::test]
async fn test_client_streaming_without_messages() {
    let (mut invoker, method) = setup("SyncService", "SyncClientStream").await;

    let response = invoker
        .client_streaming(&method, stream::empty())
        .await
        .unwrap();

    assert_eq!(text_of(&response), "Received messages: ");
}

#[tokio::test]
async fn test_bidirectional_streaming() {
    let (mut invoker, method) = setup("SyncService", "SyncBidiStream").await;

    let requests = vec![request(&method, "a"), request(&method, "b")];

    let stream = invoker
        .bidirectional_streaming(&method, stream::iter(requests))
        .await
        .unwrap();

    let texts: Vec<String> = stream.map(|item| text_of(&item.unwrap())).collect().await;
    assert_eq!(texts, vec!["Echoing: a", "Echoing: b"]);
}

#[tokio::test]
async fn test_bidirectional_responses_follow_each_send() {
    let (invoker, method) = setup("TestService", "TestBidiStream").await;

    let mut call = invoker.open_bidirectional(&method).unwrap();

    for text in ["a", "b", "c"] {
        call.send(request(&method, text)).await.unwrap();

        let response = call.next().await.unwrap();
        assert_eq!(text_of(&response), format!("Received: {text}"));
    }

    call.half_close();
    assert!(call.is_half_closed());
    assert!(call.next().await.is_none());
    assert_eq!(call.join().await.unwrap(), 3);
}

#[tokio::test]
async fn test_bidirectional_send_after_half_close() {
    let (invoker, method) = setup("TestService", "TestBidiStream").await;

    let mut call = invoker.open_bidirectional(&method).unwrap();
    call.half_close();

    let err = call.send(request(&method, "late")).await.unwrap_err();
    assert!(matches!(err, InvokeError::HalfClosed));

    assert_eq!(call.join().await.unwrap(), 0);
}

#[tokio::test]
async fn test_bidirectional_join_counts_unobserved_responses() {
    let (invoker, method) = setup("SyncService", "SyncBidiStream").await;

    let call = invoker.open_bidirectional(&method).unwrap();
    call.send(request(&method, "x")).await.unwrap();
    call.send(request(&method, "y")).await.unwrap();

    assert_eq!(call.join().await.unwrap(), 2);
}

#[tokio::test]
async fn test_shape_mismatch_is_rejected_before_sending() {
    let (mut invoker, method) = setup("TestService", "TestServerStream").await;

    let err = invoker
        .unary(&method, request(&method, "Hello"))
        .await
        .unwrap_err();

    match err {
        InvokeError::ShapeMismatch {
            ref method,
            declared,
            requested,
        } => {
            assert_eq!(method, "reflect.TestService/TestServerStream");
            assert_eq!(declared, CallShape::ServerStreaming);
            assert_eq!(requested, CallShape::Unary);
        }
        ref other => panic!("Expected ShapeMismatch, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Parse);

    let (invoker, method) = setup("TestService", "Test").await;
    assert!(matches!(
        invoker.open_bidirectional(&method),
        Err(InvokeError::ShapeMismatch { .. })
    ));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (_, method) = setup("TestService", "Test").await;
    let routes = Routes::new(SyncServiceServer::new(SyncServiceImpl::default()));
    let mut invoker = Invoker::new(routes);

    let err = invoker
        .unary(&method, request(&method, "Hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, InvokeError::Status(ref s) if s.code() == tonic::Code::Unimplemented));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_server_stream_failure_follows_delivered_responses() {
    let (mut invoker, method) = setup_failing("SyncServerStream").await;

    let mut stream = invoker
        .server_streaming(&method, request(&method, "ping"))
        .await
        .unwrap();

    for i in 0..RESPONSES_BEFORE_FAILURE {
        let response = stream.next().await.unwrap().unwrap();
        let expected = format!("Partial response {i} for: ping");
        assert_eq!(text_of(&response), expected);
    }

    let err = stream.next().await.unwrap().unwrap_err();
    match err {
        InvokeError::Status(ref status) => {
            assert_eq!(status.code(), tonic::Code::Aborted);
            assert_eq!(status.message(), FAILURE);
        }
        ref other => panic!("Expected Status, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Transport);

    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_bidirectional_failure_is_reported_by_join() {
    let (invoker, method) = setup_failing("SyncBidiStream").await;

    let mut call = invoker.open_bidirectional(&method).unwrap();
    call.send(request(&method, "a")).await.unwrap();
    assert_eq!(text_of(&call.next().await.unwrap()), "Echoing: a");

    call.half_close();
    assert!(call.next().await.is_none());

    let err = call.join().await.unwrap_err();
    assert!(matches!(err, InvokeError::Status(ref s) if s.code() == tonic::Code::Aborted));
}

#[tokio::test]
async fn test_bidirectional_abort_stops_the_drain_task() {
    let (invoker, method) = setup("SyncService", "SyncBidiStream").await;

    let mut call = invoker.open_bidirectional(&method).unwrap();
    call.send(request(&method, "x")).await.unwrap();

    // The outbound side is still open, so the server has not ended the call.
    call.abort();
    while call.next().await.is_some() {}

    let err = call.join().await.unwrap_err();
    assert!(matches!(err, InvokeError::DrainTask(ref e) if e.is_cancelled()));
}
