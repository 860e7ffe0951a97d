use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devconnect_api::{
    Check, Comment, Error as ApiError, Like, Mutation, NewPost, Outcome, Post, PostId, PostStore,
    Profile, ProfileEdit, ProfileMutation, ProfileStore, UserId, Uuid,
};
use futures::TryStreamExt;
use sqlx::types::Json;

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    user_id: Uuid,
    text: String,
    name: Option<String>,
    avatar: Option<String>,
    likes: Json<Vec<Like>>,
    comments: Json<Vec<Comment>>,
    date: DateTime<Utc>,
}

impl From<PostRow> for Post {
    fn from(r: PostRow) -> Post {
        Post {
            id: PostId(r.id),
            user: UserId(r.user_id),
            text: r.text,
            name: r.name,
            avatar: r.avatar,
            likes: r.likes.0,
            comments: r.comments.0,
            date: r.date,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    body: Json<Profile>,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(e) => e.code().as_deref() == Some("23505"),
        _ => false,
    }
}

/// Posts stored one per row, with likes and comments embedded as JSONB
///
/// Profiles are stored whole as JSONB, next to the columns that must stay
/// unique.
#[derive(Clone)]
pub struct PgStore(sqlx::PgPool);

impl PgStore {
    pub fn new(pool: sqlx::PgPool) -> PgStore {
        PgStore(pool)
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn insert_post(&self, post: NewPost) -> anyhow::Result<Post> {
        let post = post.into_post(PostId::random());
        let res = sqlx::query(
            "
                INSERT INTO posts (id, user_id, text, name, avatar, likes, comments, date)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(post.id.0)
        .bind(post.user.0)
        .bind(&post.text)
        .bind(&post.name)
        .bind(&post.avatar)
        .bind(Json(&post.likes))
        .bind(Json(&post.comments))
        .bind(post.date)
        .execute(&self.0)
        .await
        .with_context(|| format!("inserting post {}", post.id))?;
        anyhow::ensure!(
            res.rows_affected() == 1,
            "insertion of post {} affected {} rows",
            post.id,
            res.rows_affected()
        );
        Ok(post)
    }

    async fn list_posts(&self) -> anyhow::Result<Vec<Post>> {
        sqlx::query_as::<_, PostRow>(
            "
                SELECT id, user_id, text, name, avatar, likes, comments, date
                    FROM posts
                ORDER BY seq
            ",
        )
        .fetch(&self.0)
        .map_ok(Post::from)
        .try_collect::<Vec<Post>>()
        .await
        .context("querying posts table")
    }

    async fn fetch_post(&self, id: PostId) -> anyhow::Result<Option<Post>> {
        Ok(sqlx::query_as::<_, PostRow>(
            "
                SELECT id, user_id, text, name, avatar, likes, comments, date
                    FROM posts
                WHERE id = $1
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.0)
        .await
        .with_context(|| format!("fetching post {id}"))?
        .map(Post::from))
    }

    async fn update_post(&self, id: PostId, f: Mutation<'_>) -> anyhow::Result<Outcome<Post>> {
        let mut tx = self.0.begin().await.context("starting transaction")?;
        let row = sqlx::query_as::<_, PostRow>(
            "
                SELECT id, user_id, text, name, avatar, likes, comments, date
                    FROM posts
                WHERE id = $1
                FOR UPDATE
            ",
        )
        .bind(id.0)
        .fetch_optional(&mut tx)
        .await
        .with_context(|| format!("locking post {id}"))?;
        // dropping the transaction rolls it back and releases the lock
        let Some(row) = row else {
            return Ok(Outcome::Missing);
        };
        let mut post = Post::from(row);
        if let Err(e) = f(&mut post) {
            return Ok(Outcome::Declined(e));
        }
        let res = sqlx::query("UPDATE posts SET likes = $2, comments = $3 WHERE id = $1")
            .bind(id.0)
            .bind(Json(&post.likes))
            .bind(Json(&post.comments))
            .execute(&mut tx)
            .await
            .with_context(|| format!("updating post {id}"))?;
        anyhow::ensure!(
            res.rows_affected() == 1,
            "update of post {id} affected {} rows",
            res.rows_affected()
        );
        tx.commit()
            .await
            .with_context(|| format!("committing update of post {id}"))?;
        Ok(Outcome::Done(post))
    }

    async fn delete_post(&self, id: PostId, check: Check<'_>) -> anyhow::Result<Outcome<()>> {
        let mut tx = self.0.begin().await.context("starting transaction")?;
        let row = sqlx::query_as::<_, PostRow>(
            "
                SELECT id, user_id, text, name, avatar, likes, comments, date
                    FROM posts
                WHERE id = $1
                FOR UPDATE
            ",
        )
        .bind(id.0)
        .fetch_optional(&mut tx)
        .await
        .with_context(|| format!("locking post {id}"))?;
        let Some(row) = row else {
            return Ok(Outcome::Missing);
        };
        if let Err(e) = check(&Post::from(row)) {
            return Ok(Outcome::Declined(e));
        }
        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id.0)
            .execute(&mut tx)
            .await
            .with_context(|| format!("deleting post {id}"))?;
        tx.commit()
            .await
            .with_context(|| format!("committing deletion of post {id}"))?;
        Ok(Outcome::Done(()))
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn list_profiles(&self) -> anyhow::Result<Vec<Profile>> {
        sqlx::query_as::<_, ProfileRow>("SELECT body FROM profiles ORDER BY seq")
            .fetch(&self.0)
            .map_ok(|r| r.body.0)
            .try_collect::<Vec<Profile>>()
            .await
            .context("querying profiles table")
    }

    async fn fetch_profile(&self, user: UserId) -> anyhow::Result<Option<Profile>> {
        Ok(
            sqlx::query_as::<_, ProfileRow>("SELECT body FROM profiles WHERE user_id = $1")
                .bind(user.0)
                .fetch_optional(&self.0)
                .await
                .with_context(|| format!("fetching profile of user {user}"))?
                .map(|r| r.body.0),
        )
    }

    async fn fetch_profile_by_handle(&self, handle: &str) -> anyhow::Result<Option<Profile>> {
        Ok(
            sqlx::query_as::<_, ProfileRow>("SELECT body FROM profiles WHERE handle = $1")
                .bind(handle)
                .fetch_optional(&self.0)
                .await
                .with_context(|| format!("fetching profile with handle {handle:?}"))?
                .map(|r| r.body.0),
        )
    }

    async fn save_profile(
        &self,
        user: UserId,
        f: ProfileEdit<'_>,
    ) -> anyhow::Result<Outcome<Profile>> {
        let mut tx = self.0.begin().await.context("starting transaction")?;
        let existing = sqlx::query_as::<_, ProfileRow>(
            "SELECT body FROM profiles WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user.0)
        .fetch_optional(&mut tx)
        .await
        .with_context(|| format!("locking profile of user {user}"))?;
        let exists = existing.is_some();
        let profile = f(existing.map(|r| r.body.0));
        anyhow::ensure!(
            profile.user == user,
            "profile edit for {user} produced a profile for {}",
            profile.user
        );
        let taken = sqlx::query("SELECT 1 FROM profiles WHERE handle = $1 AND user_id <> $2")
            .bind(&profile.handle)
            .bind(user.0)
            .fetch_optional(&mut tx)
            .await
            .with_context(|| format!("checking availability of handle {:?}", profile.handle))?
            .is_some();
        if taken {
            return Ok(Outcome::Declined(ApiError::handle_taken()));
        }
        let res = if exists {
            sqlx::query("UPDATE profiles SET handle = $2, body = $3 WHERE user_id = $1")
                .bind(user.0)
                .bind(&profile.handle)
                .bind(Json(&profile))
                .execute(&mut tx)
                .await
        } else {
            sqlx::query(
                "
                    INSERT INTO profiles (id, user_id, handle, body)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (user_id) DO NOTHING
                ",
            )
            .bind(profile.id.0)
            .bind(user.0)
            .bind(&profile.handle)
            .bind(Json(&profile))
            .execute(&mut tx)
            .await
        };
        let res = match res {
            // another user grabbed the handle since the check
            Err(e) if is_unique_violation(&e) => {
                return Ok(Outcome::Declined(ApiError::handle_taken()))
            }
            res => res.with_context(|| format!("saving profile of user {user}"))?,
        };
        anyhow::ensure!(
            res.rows_affected() == 1,
            "saving profile of user {user} affected {} rows",
            res.rows_affected()
        );
        tx.commit()
            .await
            .with_context(|| format!("committing profile of user {user}"))?;
        Ok(Outcome::Done(profile))
    }

    async fn update_profile(
        &self,
        user: UserId,
        f: ProfileMutation<'_>,
    ) -> anyhow::Result<Outcome<Profile>> {
        let mut tx = self.0.begin().await.context("starting transaction")?;
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT body FROM profiles WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user.0)
        .fetch_optional(&mut tx)
        .await
        .with_context(|| format!("locking profile of user {user}"))?;
        let Some(row) = row else {
            return Ok(Outcome::Missing);
        };
        let mut profile = row.body.0;
        if let Err(e) = f(&mut profile) {
            return Ok(Outcome::Declined(e));
        }
        sqlx::query("UPDATE profiles SET body = $2 WHERE user_id = $1")
            .bind(user.0)
            .bind(Json(&profile))
            .execute(&mut tx)
            .await
            .with_context(|| format!("updating profile of user {user}"))?;
        tx.commit()
            .await
            .with_context(|| format!("committing profile of user {user}"))?;
        Ok(Outcome::Done(profile))
    }

    async fn delete_profile(&self, user: UserId) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM profiles WHERE user_id = $1")
            .bind(user.0)
            .execute(&self.0)
            .await
            .with_context(|| format!("deleting profile of user {user}"))?;
        Ok(res.rows_affected() > 0)
    }
}
