use anyhow::{anyhow, Context};
use serde_json::json;

use crate::ValidationErrors;

const ALREADY_LIKED: &str = "User already like this post";
const NOT_YET_LIKED: &str = "You have not yet like this post";
const NO_PROFILE: &str = "There is no profile for this user";
const NO_PROFILES: &str = "There are no profiles";

/// Which family of routes failed to find a post
///
/// Each family reports the missing post under its own key, and clients rely
/// on those keys.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lookup {
    /// `GET /:id`
    Read,
    /// delete, like and dislike
    Write,
    /// comment creation and removal
    Comment,
}

impl Lookup {
    fn key(self) -> &'static str {
        match self {
            Lookup::Read => "nopost",
            Lookup::Write => "postnotfound",
            Lookup::Comment => "nopostfound",
        }
    }

    fn message(self) -> &'static str {
        match self {
            Lookup::Read => "No Post Found By This Id",
            Lookup::Write => "No Post Found",
            Lookup::Comment => "No post found",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Invalid input {0:?}")]
    Validation(ValidationErrors),

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("User not authorized")]
    NotAuthorized,

    #[error("Post not found ({0:?})")]
    PostNotFound(Lookup),

    #[error("Comment does not exist")]
    CommentNotFound,

    #[error("{}", ALREADY_LIKED)]
    AlreadyLiked,

    #[error("{}", NOT_YET_LIKED)]
    NotYetLiked,

    #[error("{}", NO_PROFILE)]
    NoProfile,

    #[error("{}", NO_PROFILES)]
    NoProfiles,
}

impl Error {
    /// Another user's profile already uses this handle
    pub fn handle_taken() -> Error {
        let mut errors = ValidationErrors::default();
        errors.insert("handle", "That handle already exists");
        Error::Validation(errors)
    }

    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::NotAuthorized => StatusCode::FORBIDDEN,
            Error::PostNotFound(_) => StatusCode::NOT_FOUND,
            Error::CommentNotFound => StatusCode::NOT_FOUND,
            Error::AlreadyLiked => StatusCode::BAD_REQUEST,
            Error::NotYetLiked => StatusCode::BAD_REQUEST,
            Error::NoProfile => StatusCode::NOT_FOUND,
            Error::NoProfiles => StatusCode::NOT_FOUND,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({ "unknown": msg }),
            Error::Validation(errors) => json!(errors),
            Error::MalformedBody(msg) => json!({ "malformed": msg }),
            Error::Unauthorized => json!({ "unauthorized": "Unauthorized" }),
            Error::NotAuthorized => json!({ "noauthorized": "User not authorized" }),
            Error::PostNotFound(lookup) => json!({ (lookup.key()): lookup.message() }),
            Error::CommentNotFound => json!({ "commentnotexist": "Comment does not exist" }),
            Error::AlreadyLiked => json!({ "alreadyLike": ALREADY_LIKED }),
            Error::NotYetLiked => json!({ "alreadyLike": NOT_YET_LIKED }),
            Error::NoProfile => json!({ "noprofile": NO_PROFILE }),
            Error::NoProfiles => json!({ "noprofile": NO_PROFILES }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(body).context("parsing error contents")?;
        let message = |key: &str| -> anyhow::Result<String> {
            data.get(key)
                .and_then(|m| m.as_str())
                .map(String::from)
                .ok_or_else(|| anyhow!("error message for {key:?} is not a string"))
        };
        let single_key = match data.len() {
            1 => data.keys().next().map(|k| k as &str),
            _ => None,
        };
        Ok(match single_key {
            Some("unknown") => Error::Unknown(message("unknown")?),
            Some("malformed") => Error::MalformedBody(message("malformed")?),
            Some("unauthorized") => Error::Unauthorized,
            Some("noauthorized") => Error::NotAuthorized,
            Some("nopost") => Error::PostNotFound(Lookup::Read),
            Some("postnotfound") => Error::PostNotFound(Lookup::Write),
            Some("nopostfound") => Error::PostNotFound(Lookup::Comment),
            Some("commentnotexist") => Error::CommentNotFound,
            Some("alreadyLike") => match &message("alreadyLike")? as &str {
                NOT_YET_LIKED => Error::NotYetLiked,
                _ => Error::AlreadyLiked,
            },
            Some("noprofile") => match &message("noprofile")? as &str {
                NO_PROFILES => Error::NoProfiles,
                _ => Error::NoProfile,
            },
            _ if !data.is_empty() && data.values().all(|v| v.is_string()) => Error::Validation(
                ValidationErrors(
                    data.iter()
                        .filter_map(|(k, v)| Some((k.clone(), String::from(v.as_str()?))))
                        .collect(),
                ),
            ),
            _ => return Err(anyhow!("error contents has unknown shape")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_keys_match_routes() {
        let body = |e: Error| serde_json::from_slice::<serde_json::Value>(&e.contents()).unwrap();
        assert_eq!(
            body(Error::PostNotFound(Lookup::Read)),
            json!({ "nopost": "No Post Found By This Id" })
        );
        assert_eq!(
            body(Error::PostNotFound(Lookup::Write)),
            json!({ "postnotfound": "No Post Found" })
        );
        assert_eq!(
            body(Error::PostNotFound(Lookup::Comment)),
            json!({ "nopostfound": "No post found" })
        );
        assert_eq!(
            body(Error::NotYetLiked),
            json!({ "alreadyLike": "You have not yet like this post" })
        );
        assert_eq!(
            body(Error::NoProfiles),
            json!({ "noprofile": "There are no profiles" })
        );
        assert_eq!(
            body(Error::handle_taken()),
            json!({ "handle": "That handle already exists" })
        );
    }

    #[test]
    fn parse_recovers_every_variant() {
        let mut errors = ValidationErrors::default();
        errors
            .0
            .insert(String::from("text"), String::from("Text field is required"));
        for e in [
            Error::Unknown(String::from("oops")),
            Error::Validation(errors),
            Error::MalformedBody(String::from("expected value")),
            Error::Unauthorized,
            Error::NotAuthorized,
            Error::PostNotFound(Lookup::Read),
            Error::PostNotFound(Lookup::Write),
            Error::PostNotFound(Lookup::Comment),
            Error::CommentNotFound,
            Error::AlreadyLiked,
            Error::NotYetLiked,
            Error::NoProfile,
            Error::NoProfiles,
            Error::handle_taken(),
        ] {
            assert_eq!(Error::parse(&e.contents()).unwrap(), e);
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Error::parse(b"not json").is_err());
        assert!(Error::parse(b"{}").is_err());
        assert!(Error::parse(br#"{"text": 3}"#).is_err());
    }

    #[test]
    fn status_codes() {
        use http::StatusCode;
        assert_eq!(Error::NotAuthorized.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(Error::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::AlreadyLiked.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::CommentNotFound.status_code(), StatusCode::NOT_FOUND);
    }
}
