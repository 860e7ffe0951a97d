use chrono::{SubsecRound, Utc};

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

mod auth;
mod db;
mod error;
mod post;
mod profile;
mod validation;

pub use auth::{Claims, TokenKeys, DEFAULT_TOKEN_TTL};
pub use db::{
    Check, Mutation, NewPost, Outcome, PostStore, ProfileEdit, ProfileMutation, ProfileStore,
};
pub use error::{Error, Lookup};
pub use post::{Comment, Like, Post, Success};
pub use profile::{Education, Experience, Profile, Social};
pub use validation::{
    is_url, parse_date, validate_post_input, validate_profile_input, EducationInput,
    ExperienceInput, PostInput, ProfileInput, ValidationErrors,
};

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

/// Current time, at the microsecond precision the database keeps
pub fn now() -> Time {
    Utc::now().trunc_subsecs(6)
}

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(
            Clone,
            Copy,
            Debug,
            Eq,
            Hash,
            Ord,
            PartialEq,
            PartialOrd,
            serde::Deserialize,
            serde::Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn stub() -> $name {
                $name(STUB_UUID)
            }

            pub fn random() -> $name {
                $name(Uuid::new_v4())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<$name, uuid::Error> {
                Uuid::try_parse(s).map($name)
            }
        }
    };
}

uuid_id!(UserId);
uuid_id!(PostId);
uuid_id!(CommentId);
uuid_id!(ProfileId);
uuid_id!(ExperienceId);
uuid_id!(EducationId);
