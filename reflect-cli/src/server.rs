use anyhow::Context;
use reflect_service::{
    AnnotatedServiceImpl, AnnotatedServiceServer, FILE_DESCRIPTOR_SET, SyncServiceImpl,
    SyncServiceServer, TestServiceImpl, TestServiceServer,
};
use std::{net::SocketAddr, time::Duration};
use tonic::transport::Server;

/// Hosts the demo services and the reflection service until Ctrl-C is received.
pub async fn serve(addr: SocketAddr, stream_interval: Duration) -> anyhow::Result<()> {
    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()
        .context("failed to build the reflection service")?;

    let sync_service = SyncServiceImpl::new(stream_interval);
    tracing::info!(%addr, ?stream_interval, "serving the demo services");

    Server::builder()
        .add_service(reflection_service)
        .add_service(TestServiceServer::new(TestServiceImpl))
        .add_service(SyncServiceServer::new(sync_service))
        .add_service(AnnotatedServiceServer::new(AnnotatedServiceImpl))
        .serve_with_shutdown(addr, shutdown_signal())
        .await
        .with_context(|| format!("server on {addr} failed"))?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(err) => {
            // Without a signal handler the server runs until killed.
            tracing::error!(%err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
