use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::modules::auth::controller::ErrorResponse;
use crate::modules::auth::model::{AuthSession, LoginRequest};
use crate::modules::users::model::User;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::auth::controller::hello,
        crate::modules::auth::controller::login,
        crate::modules::auth::controller::me,
        crate::modules::auth::controller::logout,
    ),
    components(schemas(User, LoginRequest, AuthSession, ErrorResponse)),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Authentication and token lifecycle endpoints")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
