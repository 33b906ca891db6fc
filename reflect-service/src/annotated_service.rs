use crate::pb::{AnnotateRequest, AnnotateResponse, annotated_service_server::AnnotatedService};
use tonic::{Request, Response, Status};

#[derive(Debug, Default, Clone)]
pub struct AnnotatedServiceImpl;

#[tonic::async_trait]
impl AnnotatedService for AnnotatedServiceImpl {
    async fn annotate(
        &self,
        request: Request<AnnotateRequest>,
    ) -> Result<Response<AnnotateResponse>, Status> {
        let req = request.into_inner();

        let mut labels = req.labels.unwrap_or_default();
        labels.revision += 1;

        Ok(Response::new(AnnotateResponse {
            message: format!("annotated: {}", req.message),
            labels: Some(labels),
        }))
    }
}
