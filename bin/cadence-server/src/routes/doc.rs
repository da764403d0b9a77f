use utoipa::OpenApi;

use crate::routes::{health, v1};

#[derive(OpenApi)]
#[openapi(info(
    title = "cadence-server",
    description = "Asynchronous text-to-audio generation jobs",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(v1::api_docs());
    root
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let json = get_docs().to_json().expect("serialize openapi");
        for path in [
            "/health",
            "/health/ready",
            "/health/live",
            "/api/v1/generate",
            "/api/v1/status/{job_id}",
            "/api/v1/download/{job_id}",
            "/api/v1/jobs",
            "/api/v1/jobs/{job_id}",
        ] {
            assert!(json.contains(&format!("\"{path}\"")), "missing {path}");
        }
    }
}
