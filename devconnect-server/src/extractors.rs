use std::sync::Arc;

use axum::{
    async_trait,
    body::{Body, Bytes},
    extract::{FromRef, FromRequest, FromRequestParts},
    http::{self, request, Request},
};
use devconnect_api::{Claims, PostStore, ProfileStore, TokenKeys};

use crate::Error;

pub type Store = Arc<dyn PostStore>;
pub type Profiles = Arc<dyn ProfileStore>;

#[derive(Clone, axum::extract::FromRef)]
pub struct AppState {
    pub store: Store,
    pub profiles: Profiles,
    pub keys: TokenKeys,
}

/// Raw bearer token, not yet verified
pub struct PreAuth(pub String);

#[async_trait]
impl<S: Sync> FromRequestParts<S> for PreAuth {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, _state: &S) -> Result<PreAuth, Error> {
        match req.headers.get(http::header::AUTHORIZATION) {
            None => Err(Error::unauthorized()),
            Some(auth) => {
                let auth = auth.to_str().map_err(|_| Error::unauthorized())?;
                let mut auth = auth.split(' ');
                if !auth
                    .next()
                    .ok_or(Error::unauthorized())?
                    .eq_ignore_ascii_case("bearer")
                {
                    return Err(Error::unauthorized());
                }
                let token = auth.next().ok_or(Error::unauthorized())?;
                if !auth.next().is_none() || token.is_empty() {
                    return Err(Error::unauthorized());
                }
                Ok(PreAuth(String::from(token)))
            }
        }
    }
}

/// Identity of the caller, verified for this request only
pub struct Auth(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for Auth {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, state: &AppState) -> Result<Auth, Error> {
        let token = PreAuth::from_request_parts(req, state).await?.0;
        let claims = TokenKeys::from_ref(state).verify(&token)?;
        tracing::debug!(user = %claims.id, "authenticated request");
        Ok(Auth(claims))
    }
}

/// JSON request body, where an empty body stands for the default value
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S, Body> for Payload<T>
where
    S: Send + Sync,
    T: serde::de::DeserializeOwned + Default,
{
    type Rejection = Error;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Payload<T>, Error> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| Error::malformed_body(e.to_string()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Payload(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(Payload)
            .map_err(|e| Error::malformed_body(e.to_string()))
    }
}
