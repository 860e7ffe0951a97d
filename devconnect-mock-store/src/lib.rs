use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use devconnect_api::{
    Check, Error, Mutation, NewPost, Outcome, Post, PostId, PostStore, Profile, ProfileEdit,
    ProfileMutation, ProfileStore, UserId,
};
use tokio::sync::Mutex;

/// In-memory post and profile store
///
/// Documents are kept in insertion order. The lock is held across every
/// check-then-write, so concurrent callers observe the same atomicity as the
/// postgres store.
pub struct MockStore {
    posts: Mutex<Vec<Post>>,
    profiles: Mutex<Vec<Profile>>,
    unavailable: AtomicBool,
}

impl MockStore {
    pub fn new() -> MockStore {
        MockStore {
            posts: Mutex::new(Vec::new()),
            profiles: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every following call fail, as if the database went away
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Return the current number of posts
    pub async fn test_num_posts(&self) -> usize {
        self.posts.lock().await.len()
    }

    pub async fn test_num_profiles(&self) -> usize {
        self.profiles.lock().await.len()
    }

    fn check_available(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.unavailable.load(Ordering::SeqCst),
            "mock store is unavailable"
        );
        Ok(())
    }
}

impl Default for MockStore {
    fn default() -> MockStore {
        MockStore::new()
    }
}

#[async_trait]
impl PostStore for MockStore {
    async fn insert_post(&self, post: NewPost) -> anyhow::Result<Post> {
        self.check_available()?;
        let post = post.into_post(PostId::random());
        self.posts.lock().await.push(post.clone());
        Ok(post)
    }

    async fn list_posts(&self) -> anyhow::Result<Vec<Post>> {
        self.check_available()?;
        Ok(self.posts.lock().await.clone())
    }

    async fn fetch_post(&self, id: PostId) -> anyhow::Result<Option<Post>> {
        self.check_available()?;
        Ok(self.posts.lock().await.iter().find(|p| p.id == id).cloned())
    }

    async fn update_post(&self, id: PostId, f: Mutation<'_>) -> anyhow::Result<Outcome<Post>> {
        self.check_available()?;
        let mut posts = self.posts.lock().await;
        let Some(stored) = posts.iter_mut().find(|p| p.id == id) else {
            return Ok(Outcome::Missing);
        };
        // work on a copy so that a declined change leaves no trace
        let mut post = stored.clone();
        if let Err(e) = f(&mut post) {
            return Ok(Outcome::Declined(e));
        }
        stored.likes = post.likes;
        stored.comments = post.comments;
        Ok(Outcome::Done(stored.clone()))
    }

    async fn delete_post(&self, id: PostId, check: Check<'_>) -> anyhow::Result<Outcome<()>> {
        self.check_available()?;
        let mut posts = self.posts.lock().await;
        let Some(idx) = posts.iter().position(|p| p.id == id) else {
            return Ok(Outcome::Missing);
        };
        if let Err(e) = check(&posts[idx]) {
            return Ok(Outcome::Declined(e));
        }
        posts.remove(idx);
        Ok(Outcome::Done(()))
    }
}

#[async_trait]
impl ProfileStore for MockStore {
    async fn list_profiles(&self) -> anyhow::Result<Vec<Profile>> {
        self.check_available()?;
        Ok(self.profiles.lock().await.clone())
    }

    async fn fetch_profile(&self, user: UserId) -> anyhow::Result<Option<Profile>> {
        self.check_available()?;
        Ok(self
            .profiles
            .lock()
            .await
            .iter()
            .find(|p| p.user == user)
            .cloned())
    }

    async fn fetch_profile_by_handle(&self, handle: &str) -> anyhow::Result<Option<Profile>> {
        self.check_available()?;
        Ok(self
            .profiles
            .lock()
            .await
            .iter()
            .find(|p| p.handle == handle)
            .cloned())
    }

    async fn save_profile(
        &self,
        user: UserId,
        f: ProfileEdit<'_>,
    ) -> anyhow::Result<Outcome<Profile>> {
        self.check_available()?;
        let mut profiles = self.profiles.lock().await;
        let idx = profiles.iter().position(|p| p.user == user);
        let profile = f(idx.map(|i| profiles[i].clone()));
        anyhow::ensure!(
            profile.user == user,
            "profile edit for {user} produced a profile for {}",
            profile.user
        );
        if profiles
            .iter()
            .any(|p| p.user != user && p.handle == profile.handle)
        {
            return Ok(Outcome::Declined(Error::handle_taken()));
        }
        match idx {
            Some(i) => profiles[i] = profile.clone(),
            None => profiles.push(profile.clone()),
        }
        Ok(Outcome::Done(profile))
    }

    async fn update_profile(
        &self,
        user: UserId,
        f: ProfileMutation<'_>,
    ) -> anyhow::Result<Outcome<Profile>> {
        self.check_available()?;
        let mut profiles = self.profiles.lock().await;
        let Some(stored) = profiles.iter_mut().find(|p| p.user == user) else {
            return Ok(Outcome::Missing);
        };
        let mut profile = stored.clone();
        if let Err(e) = f(&mut profile) {
            return Ok(Outcome::Declined(e));
        }
        stored.experience = profile.experience;
        stored.education = profile.education;
        Ok(Outcome::Done(stored.clone()))
    }

    async fn delete_profile(&self, user: UserId) -> anyhow::Result<bool> {
        self.check_available()?;
        let mut profiles = self.profiles.lock().await;
        let len = profiles.len();
        profiles.retain(|p| p.user != user);
        Ok(profiles.len() != len)
    }
}
