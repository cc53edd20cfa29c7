// Owner identification middleware for RecoBattle
//
// Every API request acts on behalf of an owner. Two sources are supported:
//
// - a trusted gateway header (`OWNER_HEADER`) carrying a stable user id. The
//   gateway authenticates the caller; this service only reads the header.
// - otherwise the Bearer credential itself, treated as an opaque string and not
//   verified here. The owner then changes whenever the credential is rotated, and
//   files uploaded under the old credential are no longer listed.
//
// When authorization is disabled every request acts as `ANONYMOUS_OWNER`.
// OPTIONS requests are always allowed to support CORS pre-flight requests.

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures::future::{ok, ready, LocalBoxFuture, Ready};
use log::{debug, info, warn};

use crate::error::HandlerError;

/// Owner used for every request when authorization is disabled
pub const ANONYMOUS_OWNER: &str = "anonymous";

/// Identifier of the caller, available to handlers as an extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequest for OwnerId {
    type Error = HandlerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<OwnerId>()
                .cloned()
                .ok_or(HandlerError::Unauthorized),
        )
    }
}

/// Middleware factory for owner identification
#[derive(Clone)]
pub struct Authentication {
    enabled: bool,
    owner_header: Option<String>,
}

impl Authentication {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            owner_header: None,
        }
    }

    /// Read the owner from `header` instead of the Bearer credential
    pub fn with_owner_header(mut self, header: Option<String>) -> Self {
        self.owner_header = header;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticationMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        if !self.enabled {
            info!("Authentication requirement is disabled via configuration");
        } else if let Some(header) = &self.owner_header {
            info!("Owner id read from trusted header {}", header);
        }
        ok(AuthenticationMiddleware {
            service,
            enabled: self.enabled,
            owner_header: self.owner_header.clone(),
        })
    }
}

/// Authentication middleware implementation
pub struct AuthenticationMiddleware<S> {
    service: S,
    enabled: bool,
    owner_header: Option<String>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if req.method() == actix_web::http::Method::OPTIONS {
            debug!("OPTIONS request - bypassing authentication check");
            return Box::pin(self.service.call(req));
        }

        match identify(&req, self.enabled, self.owner_header.as_deref()) {
            Ok(owner) => {
                req.extensions_mut().insert(owner);
                Box::pin(self.service.call(req))
            }
            Err(e) => Box::pin(async move { Err(e.into()) }),
        }
    }
}

/// Resolve the owner of a request from the gateway header or the Authorization header
fn identify(
    req: &ServiceRequest,
    enabled: bool,
    owner_header: Option<&str>,
) -> Result<OwnerId, HandlerError> {
    if !enabled {
        return Ok(OwnerId(ANONYMOUS_OWNER.to_string()));
    }

    if let Some(name) = owner_header {
        return match req.headers().get(name).and_then(|v| v.to_str().ok()).map(str::trim) {
            Some(owner) if !owner.is_empty() => Ok(OwnerId(owner.to_string())),
            _ => {
                warn!("Missing or invalid owner header {}", name);
                Err(HandlerError::Unauthorized)
            }
        };
    }

    let auth_header = req.headers().get(header::AUTHORIZATION).ok_or_else(|| {
        warn!("Missing Authorization header");
        HandlerError::Unauthorized
    })?;

    let auth_str = auth_header.to_str().map_err(|_| {
        warn!("Authorization header contains invalid characters");
        HandlerError::Unauthorized
    })?;

    match auth_str.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Ok(OwnerId(token.to_string())),
        _ => {
            warn!("Invalid Authorization header format, expected 'Bearer <owner>'");
            Err(HandlerError::Unauthorized)
        }
    }
}
