use super::{
    handlers::{auth, email, health, keys, roles, users},
    types,
};
use crate::{
    access::Session,
    error::ErrorBody,
    store::UserProfile,
    token::{PaserkKey, PaserkKeySet},
};
use utoipa::{
    openapi::{
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
        Contact, License,
    },
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        keys::public_key,
        auth::register,
        auth::login,
        auth::refresh,
        email::request_confirmation,
        email::confirm,
        users::promote_moderator,
        users::promote_admin,
        users::promote_core_admin,
        users::get_user,
        users::search_users,
        users::change_password,
        roles::is_admin,
        roles::is_moderator,
    ),
    components(schemas(
        health::Health,
        ErrorBody,
        Session,
        UserProfile,
        PaserkKey,
        PaserkKeySet,
        types::RegisterRequest,
        types::LoginRequest,
        types::RefreshRequest,
        types::AccessTokenResponse,
        types::UserIdRequest,
        types::ConfirmEmailRequest,
        types::SearchUsersRequest,
        types::UsersResponse,
        types::ChangePasswordRequest,
        types::RoleCheckResponse,
    )),
    modifiers(&CargoInfo, &BearerAuth),
    tags(
        (name = "health", description = "Liveness and build information"),
        (name = "keys", description = "Verification key distribution"),
        (name = "auth", description = "Registration, login and token refresh"),
        (name = "email", description = "Email ownership confirmation"),
        (name = "users", description = "Account lookup and role escalation"),
        (name = "roles", description = "Role membership checks"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("PASETO v4.public")
                    .build(),
            ),
        );
    }
}

// Use Cargo.toml metadata instead of the derive defaults.
struct CargoInfo;

impl Modify for CargoInfo {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = env!("CARGO_PKG_NAME").to_string();
        openapi.info.version = env!("CARGO_PKG_VERSION").to_string();
        openapi.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
        openapi.info.contact = cargo_contact();
        openapi.info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
            let mut license = License::new(identifier);
            license.identifier = Some(identifier.to_string());
            license
        });
    }
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `:` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(':').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, rest)) => (
            optional_str(name.trim()),
            rest.strip_suffix('>').and_then(|email| optional_str(email.trim())),
        ),
        None => (optional_str(author), None),
    }
}

fn optional_str(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}
