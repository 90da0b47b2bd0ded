use utoipa::{
    Modify,
    openapi::{
        InfoBuilder, OpenApi,
        security::{ApiKey, ApiKeyValue, SecurityScheme},
    },
};
use utoipa_swagger_ui::SwaggerUi;

use super::middleware::USER_ID_HEADER;

pub const SECURITY_SCHEME: &str = "user_id";

struct UserIdHeader;

impl Modify for UserIdHeader {
    fn modify(&self, openapi: &mut OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            SECURITY_SCHEME,
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(USER_ID_HEADER))),
        );
    }
}

/// Stamps service info and the caller header scheme onto the collected document.
pub fn describe(mut openapi: OpenApi, title: &str) -> OpenApi {
    openapi.info = InfoBuilder::new()
        .title(title)
        .version(env!("CARGO_PKG_VERSION"))
        .build();
    UserIdHeader.modify(&mut openapi);
    openapi
}

pub fn create_swagger_ui(openapi: OpenApi) -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi)
}
