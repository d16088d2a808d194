use utoipa::OpenApi;

use crate::routes::conversion::ConversionApi;
use crate::routes::health::HealthApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "relay-server",
    description = "File conversion relay for CloudConvert and Convertio"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(HealthApi::openapi());
    root.merge(ConversionApi::openapi());
    root
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = get_docs();
        for path in [
            "/api/health",
            "/health",
            "/api/start-conversion",
            "/api/conversion-status/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
