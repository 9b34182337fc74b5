/// HTTP middleware for the discussion service
///
/// Provides HTTP Basic credential verification for mutating endpoints.
/// Read endpoints (index/show) are registered outside this middleware and
/// stay open.
use crate::config::AuthConfig;
use crate::error::AppError;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

/// Actix middleware that validates HTTP Basic credentials against the
/// configured API username/password.
pub struct BasicAuthMiddleware {
    auth: AuthConfig,
}

impl BasicAuthMiddleware {
    pub fn new(auth: AuthConfig) -> Self {
        Self { auth }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BasicAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = BasicAuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BasicAuthMiddlewareService {
            service: Rc::new(service),
            auth: self.auth.clone(),
        }))
    }
}

pub struct BasicAuthMiddlewareService<S> {
    service: Rc<S>,
    auth: AuthConfig,
}

impl<S, B> Service<ServiceRequest> for BasicAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let auth = self.auth.clone();

        Box::pin(async move {
            let header = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .ok_or_else(|| unauthorized("Missing Authorization header"))?;

            let encoded = header
                .strip_prefix("Basic ")
                .ok_or_else(|| unauthorized("Invalid Authorization scheme"))?;

            let (username, password) =
                decode_credentials(encoded).ok_or_else(|| unauthorized("Invalid credentials"))?;

            if !credentials_match(&auth, &username, &password) {
                return Err(unauthorized("Invalid credentials"));
            }

            service.call(req).await
        })
    }
}

fn unauthorized(message: &str) -> Error {
    AppError::Unauthorized(message.to_string()).into()
}

fn decode_credentials(encoded: &str) -> Option<(String, String)> {
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;

    Some((username.to_string(), password.to_string()))
}

fn credentials_match(auth: &AuthConfig, username: &str, password: &str) -> bool {
    match (&auth.username, &auth.password) {
        (Some(expected_user), Some(expected_pass)) => {
            username == expected_user && password == expected_pass
        }
        // Without configured credentials every mutating request is refused.
        _ => false,
    }
}
