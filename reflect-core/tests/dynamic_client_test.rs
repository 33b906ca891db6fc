
use failing_sync_impl::{FailingSyncService, RESPONSES_BEFORE_FAILURE};
use futures_util::StreamExt;
use reflect_core::{
    ErrorKind,
    client::{CallError, DynamicClient, DynamicRequest, DynamicResponse},
    config::{ClientConfig, ImportPolicy},
    grpc::client::InvokeError,
};
use reflect_service::{
    AnnotatedServiceImpl, AnnotatedServiceServer, FILE_DESCRIPTOR_SET, SyncServiceImpl,
    SyncServiceServer, TestServiceImpl, TestServiceServer,
};
use serde_json::{Value, json};
use std::time::Duration;
use tonic::service::Routes;

fn setup_client(config: ClientConfig) -> DynamicClient<Routes> {
    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()
        .unwrap();

    let service = Routes::new(reflection_service)
        .add_service(TestServiceServer::new(TestServiceImpl))
        .add_service(SyncServiceServer::new(SyncServiceImpl::default()))
        .add_service(AnnotatedServiceServer::new(AnnotatedServiceImpl));

    DynamicClient::from_service(service, config)
}

fn setup_failing_client() -> DynamicClient<Routes> {
    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()
        .unwrap();

    let service = Routes::new(reflection_service)
        .add_service(SyncServiceServer::new(FailingSyncService));

    DynamicClient::from_service(service, ClientConfig::default())
}

async fn collect(response: DynamicResponse) -> Vec<Value> {
    match response {
        DynamicResponse::Streaming(stream) => {
            stream.map(|item| item.unwrap()).collect::<Vec<_>>().await
        }
        other => panic!("Expected Streaming, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unary_call() {
    let mut client = setup_client(ClientConfig::default());

    let request = DynamicRequest::new("SyncService", "Sync", json!({ "message": "hello" }));
    let response = client.call(request).await.unwrap();

    match response {
        DynamicResponse::Unary(value) => assert_eq!(value, json!({ "message": "Received: hello" })),
        other => panic!("Expected Unary, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unary_call_with_nested_body() {
    let mut client = setup_client(ClientConfig::default());

    let body = json!({
        "message": "Run command test",
        "id": 12345,
        "options": { "verbose": true, "retry_count": 3, "tags": ["tag1", "tag2"] },
        "ignored": true
    });
    let response = client
        .call(DynamicRequest::new("TestService", "Run", body))
        .await
        .unwrap();

    assert!(
        matches!(response, DynamicResponse::Unary(ref v) if v["message"] == "Response from Run method")
    );
}

#[tokio::test]
async fn test_server_streaming_call() {
    let mut client = setup_client(ClientConfig::default());

    let request = DynamicRequest::new(
        "SyncService",
        "SyncServerStream",
        json!({ "message": "ping" }),
    );
    let response = client.call(request).await.unwrap();
    assert!(response.is_streaming());

    let values = collect(response).await;

    let expected: Vec<Value> = (0..5)
        .map(|i| json!({ "message": format!("Stream response {i} for: ping") }))
        .collect();
    assert_eq!(values, expected);
}

#[tokio::test]
async fn test_client_streaming_call() {
    let mut client = setup_client(ClientConfig::default());

    let body = json!([{ "message": "m1" }, { "message": "m2" }, { "message": "m3" }]);
    let response = client
        .call(DynamicRequest::new("TestService", "TestClientStream", body))
        .await
        .unwrap();

    match response {
        DynamicResponse::Unary(value) => {
            assert_eq!(value, json!({ "message": "Received messages: m1, m2, m3" }))
        }
        other => panic!("Expected Unary, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bidirectional_call() {
    let config = ClientConfig::default().with_bidi_interval(Duration::from_millis(5));
    let mut client = setup_client(config);

    let body = json!([{ "message": "a" }, { "message": "b" }, { "message": "c" }]);
    let response = client
        .call(DynamicRequest::new("TestService", "TestBidiStream", body))
        .await
        .unwrap();

    let values = collect(response).await;

    assert_eq!(
        values,
        vec![
            json!({ "message": "Received: a" }),
            json!({ "message": "Received: b" }),
            json!({ "message": "Received: c" }),
        ]
    );
}

#[tokio::test]
async fn test_streaming_body_must_be_an_array() {
    let mut client = setup_client(ClientConfig::default());

    let request = DynamicRequest::new(
        "TestService",
        "TestClientStream",
        json!({ "message": "m1" }),
    );
    let err = client.call(request).await.unwrap_err();

    assert!(matches!(err, CallError::InvalidBody { .. }));
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[tokio::test]
async fn test_invalid_body() {
    let mut client = setup_client(ClientConfig::default());

    let request = DynamicRequest::new("TestService", "Run", json!({ "id": "not a number" }));
    let err = client.call(request).await.unwrap_err();

    assert!(matches!(err, CallError::Bridge(_)));
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[tokio::test]
async fn test_unknown_method() {
    let mut client = setup_client(ClientConfig::default());

    let request = DynamicRequest::new("TestService", "Ghost", json!({}));
    let err = client.call(request).await.unwrap_err();

    assert!(matches!(err, CallError::Resolve(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_cross_file_call_with_transitive_policy() {
    let body = json!({
        "message": "hi",
        "labels": { "entries": { "env": "test" }, "tags": ["x"], "revision": "41" }
    });

    let mut client = setup_client(ClientConfig::default());
    let err = client
        .call(DynamicRequest::new("AnnotatedService", "Annotate", body.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);

    let config = ClientConfig::default().with_import_policy(ImportPolicy::Transitive);
    let mut client = setup_client(config);
    let response = client
        .call(DynamicRequest::new("AnnotatedService", "Annotate", body))
        .await
        .unwrap();

    match response {
        DynamicResponse::Unary(value) => assert_eq!(
            value,
            json!({
                "message": "annotated: hi",
                "labels": { "entries": { "env": "test" }, "tags": ["x"], "revision": "42" }
            })
        ),
        other => panic!("Expected Unary, got {other:?}"),
    }
}

#[tokio::test]
async fn test_list_services_and_symbols() {
    let mut client = setup_client(ClientConfig::default().with_namespace("reflect"));

    let services = client.list_services().await.unwrap();
    assert!(services.contains(&"reflect.AnnotatedService".to_string()));

    let symbol = client.symbol("TestService", "Test");
    assert_eq!(symbol.dispatch_path(), "/reflect.TestService/Test");
    assert_eq!(symbol.reflection_query(), "reflect.TestService.Test");
}

fn assert_aborted(err: &CallError) {
    match err {
        CallError::Invoke(InvokeError::Status(status)) => {
            assert_eq!(status.code(), tonic::Code::Aborted)
        }
        other => panic!("Expected an aborted status, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_server_stream_failure_after_partial_responses() {
    let mut client = setup_failing_client();

    let request = DynamicRequest::new(
        "SyncService",
        "SyncServerStream",
        json!({ "message": "ping" }),
    );
    let DynamicResponse::Streaming(stream) = client.call(request).await.unwrap() else {
        panic!("Expected Streaming");
    };
    let items: Vec<_> = stream.collect().await;

    assert_eq!(items.len(), RESPONSES_BEFORE_FAILURE + 1);
    for (i, item) in items[..RESPONSES_BEFORE_FAILURE].iter().enumerate() {
        let value = item.as_ref().unwrap();
        assert_eq!(value["message"], format!("Partial response {i} for: ping"));
    }
    assert_aborted(items[RESPONSES_BEFORE_FAILURE].as_ref().unwrap_err());
}

#[tokio::test]
async fn test_bidirectional_failure_after_drained_responses() {
    let mut client = setup_failing_client();

    let body = json!([{ "message": "a" }, { "message": "b" }]);
    let DynamicResponse::Streaming(stream) = client
        .call(DynamicRequest::new("SyncService", "SyncBidiStream", body))
        .await
        .unwrap()
    else {
        panic!("Expected Streaming");
    };
    let items: Vec<_> = stream.collect().await;

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_ref().unwrap(), &json!({ "message": "Echoing: a" }));
    assert_eq!(items[1].as_ref().unwrap(), &json!({ "message": "Echoing: b" }));
    assert_aborted(items[2].as_ref().unwrap_err());
}
