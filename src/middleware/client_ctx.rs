use crate::error::{AppError, AppResult};
use crate::orm::users;
use crate::session::TokenKeys;
use crate::user::Role;
use actix::fut::ready;
use actix_web::dev::{self, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header;
use actix_web::{web::Data, Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::{LocalBoxFuture, Ready};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Deserialize;
use std::rc::Rc;

/// Client data stored for a single request cycle.
#[derive(Clone, Debug, Default)]
pub struct ClientCtxInner {
    /// Authenticated user. None is a guest.
    pub client: Option<users::Model>,
    /// Why a supplied token was not accepted.
    pub auth_error: Option<String>,
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// The only route that reads `?token=`, since browsers cannot set headers on
/// a websocket upgrade.
pub const QUERY_TOKEN_PATH: &str = "/api/realtime.ws";

/// Bearer token from the Authorization header, or `?token=` on the realtime
/// upgrade route.
pub fn extract_token(req: &HttpRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty());

    if bearer.is_some() || req.path() != QUERY_TOKEN_PATH {
        return bearer;
    }

    actix_web::web::Query::<TokenQuery>::from_query(req.query_string())
        .ok()
        .and_then(|q| q.into_inner().token)
        .filter(|t| !t.is_empty())
}

impl ClientCtxInner {
    /// Resolves the request's token to an active user.
    /// The user is re-read on every request so suspensions apply immediately.
    pub async fn from_token(
        token: Option<String>,
        keys: &TokenKeys,
        db: &DatabaseConnection,
    ) -> Self {
        let token = match token {
            Some(token) => token,
            None => return Self::default(),
        };

        let failed = |reason: &str| Self {
            auth_error: Some(reason.to_owned()),
            ..Default::default()
        };

        let user_id = match keys.verify(&token).map(|c| c.user_id()) {
            Ok(Some(user_id)) => user_id,
            Ok(None) => return failed("Malformed token subject"),
            Err(e) => {
                log::debug!("Rejected bearer token: {}", e);
                return failed("Invalid or expired token");
            }
        };

        match users::Entity::find_by_id(user_id).one(db).await {
            Ok(Some(user)) if user.is_active => Self {
                client: Some(user),
                ..Default::default()
            },
            Ok(Some(_)) => failed("Account is suspended"),
            Ok(None) => failed("User no longer exists"),
            Err(e) => {
                log::error!("Failed to load user {} for request: {}", user_id, e);
                failed("Unable to authenticate")
            }
        }
    }
}

/// Client context passed to routes.
/// Wraps ClientCtxInner, which is set at the beginning of the request.
#[derive(Clone, Debug)]
pub struct ClientCtx(Data<ClientCtxInner>);

impl Default for ClientCtx {
    fn default() -> Self {
        Self(Data::new(ClientCtxInner::default()))
    }
}

impl ClientCtx {
    pub fn get_or_default_from_extensions(req: &HttpRequest) -> Self {
        let mut extensions = req.extensions_mut();
        match extensions.get::<Data<ClientCtxInner>>() {
            Some(cbox) => Self(cbox.clone()),
            None => {
                let cbox = Data::new(ClientCtxInner::default());
                extensions.insert(cbox.clone());
                Self(cbox)
            }
        }
    }

    pub fn get_user(&self) -> Option<&users::Model> {
        self.0.client.as_ref()
    }

    /// Require user to be logged in.
    pub fn require_login(&self) -> AppResult<&users::Model> {
        self.0.client.as_ref().ok_or_else(|| {
            AppError::Authentication(
                self.0
                    .auth_error
                    .clone()
                    .unwrap_or_else(|| "Login required".to_owned()),
            )
        })
    }

    /// Require a logged in user with `role`.
    pub fn require_role(&self, role: Role) -> AppResult<&users::Model> {
        let user = self.require_login()?;
        if Role::of(user) != role {
            return Err(AppError::forbidden(format!(
                "This action requires the {} role",
                role.as_str()
            )));
        }
        Ok(user)
    }
}

/// This implementation is what actually provides the `client: ClientCtx` in the parameters of route functions.
impl FromRequest for ClientCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(ClientCtx::get_or_default_from_extensions(req)))
    }
}

impl<S: 'static, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ClientCtxMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ClientCtxMiddleware {
            service: Rc::new(service),
        }))
    }
}

/// Client context middleware
pub struct ClientCtxMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ClientCtxMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let token = extract_token(req.request());

        Box::pin(async move {
            // Without keys and a pool there is nobody to authenticate; every
            // request proceeds as a guest.
            let keys = req.app_data::<Data<TokenKeys>>().cloned();
            let db = req.app_data::<Data<DatabaseConnection>>().cloned();

            match (keys, db) {
                (Some(keys), Some(db)) => {
                    let inner = ClientCtxInner::from_token(token, &keys, &db).await;
                    req.extensions_mut().insert(Data::new(inner));
                }
                _ => log::error!("Token keys or database pool missing from app data"),
            }

            svc.call(req).await
        })
    }
}
