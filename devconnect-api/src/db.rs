use async_trait::async_trait;

use crate::{Error, Post, PostId, Profile, Time, UserId};

/// Post contents before the store assigns it an id
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewPost {
    pub user: UserId,
    pub text: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub date: Time,
}

impl NewPost {
    pub fn into_post(self, id: PostId) -> Post {
        Post {
            id,
            user: self.user,
            text: self.text,
            name: self.name,
            avatar: self.avatar,
            likes: Vec::new(),
            comments: Vec::new(),
            date: self.date,
        }
    }
}

/// Result of a conditional write
#[derive(Debug, Eq, PartialEq)]
pub enum Outcome<T> {
    /// No post has this id
    Missing,

    /// The post exists but the domain rule refused the change; nothing was written
    Declined(Error),

    Done(T),
}

/// Domain rule applied to a post while the store holds it exclusively
///
/// Only `likes` and `comments` are written back, every other field is fixed at
/// creation.
pub type Mutation<'a> = Box<dyn 'a + Send + FnOnce(&mut Post) -> Result<(), Error>>;

/// Precondition checked while the store holds a post exclusively
pub type Check<'a> = Box<dyn 'a + Send + FnOnce(&Post) -> Result<(), Error>>;

/// Document persistence for posts
///
/// `update_post` and `delete_post` must run the closure and the write as one
/// atomic step: no other write to the same post may happen in between.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert_post(&self, post: NewPost) -> anyhow::Result<Post>;

    /// All posts, oldest first
    async fn list_posts(&self) -> anyhow::Result<Vec<Post>>;

    async fn fetch_post(&self, id: PostId) -> anyhow::Result<Option<Post>>;

    async fn update_post(&self, id: PostId, f: Mutation<'_>) -> anyhow::Result<Outcome<Post>>;

    async fn delete_post(&self, id: PostId, check: Check<'_>) -> anyhow::Result<Outcome<()>>;
}

/// Builds the profile to store from the current one, if any
pub type ProfileEdit<'a> = Box<dyn 'a + Send + FnOnce(Option<Profile>) -> Profile>;

/// Change to an existing profile's experience or education entries
pub type ProfileMutation<'a> = Box<dyn 'a + Send + FnOnce(&mut Profile) -> Result<(), Error>>;

/// Document persistence for profiles, keyed by their owner
///
/// Writes are atomic in the same way as for `PostStore`.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// All profiles, oldest first
    async fn list_profiles(&self) -> anyhow::Result<Vec<Profile>>;

    async fn fetch_profile(&self, user: UserId) -> anyhow::Result<Option<Profile>>;

    async fn fetch_profile_by_handle(&self, handle: &str) -> anyhow::Result<Option<Profile>>;

    /// Creates or replaces the user's profile
    ///
    /// Declines with `Error::handle_taken()` when another user's profile has
    /// the resulting handle.
    async fn save_profile(&self, user: UserId, f: ProfileEdit<'_>)
        -> anyhow::Result<Outcome<Profile>>;

    async fn update_profile(
        &self,
        user: UserId,
        f: ProfileMutation<'_>,
    ) -> anyhow::Result<Outcome<Profile>>;

    /// Returns whether there was a profile to delete
    async fn delete_profile(&self, user: UserId) -> anyhow::Result<bool>;
}
