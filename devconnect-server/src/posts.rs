//! Post lifecycle: creation, lookup, deletion, likes and comments
//!
//! Every read-modify-write is handed to the store as a single conditional
//! update, so the domain rules on `Post` always see the latest state.

use anyhow::Context;
use devconnect_api::{
    now, Claims, Comment, CommentId, Error as ApiError, Lookup, NewPost, Outcome, Post, PostId,
    PostInput, PostStore,
};

use crate::Error;

fn settle<T>(outcome: Outcome<T>, lookup: Lookup) -> Result<T, Error> {
    match outcome {
        Outcome::Done(t) => Ok(t),
        Outcome::Missing => Err(Error::post_not_found(lookup)),
        Outcome::Declined(e) => Err(Error::Api(e)),
    }
}

/// Display fields from the payload, falling back to the ones in the token
fn display_fields(author: &Claims, input: &mut PostInput) -> (Option<String>, Option<String>) {
    (
        input.name.take().or_else(|| author.name.clone()),
        input.avatar.take().or_else(|| author.avatar.clone()),
    )
}

pub async fn create(
    store: &dyn PostStore,
    author: &Claims,
    mut input: PostInput,
) -> Result<Post, Error> {
    input.validate()?;
    let (name, avatar) = display_fields(author, &mut input);
    let post = store
        .insert_post(NewPost {
            user: author.id,
            text: input.text.unwrap_or_default(),
            name,
            avatar,
            date: now(),
        })
        .await
        .with_context(|| format!("inserting post for user {}", author.id))?;
    tracing::info!(post = %post.id, user = %author.id, "created post");
    Ok(post)
}

pub async fn list(store: &dyn PostStore) -> Result<Vec<Post>, Error> {
    Ok(store.list_posts().await.context("listing posts")?)
}

pub async fn get(store: &dyn PostStore, id: Option<PostId>) -> Result<Post, Error> {
    let id = id.ok_or(Error::post_not_found(Lookup::Read))?;
    store
        .fetch_post(id)
        .await
        .with_context(|| format!("fetching post {id}"))?
        .ok_or(Error::post_not_found(Lookup::Read))
}

pub async fn delete(
    store: &dyn PostStore,
    author: &Claims,
    id: Option<PostId>,
) -> Result<(), Error> {
    let id = id.ok_or(Error::post_not_found(Lookup::Write))?;
    let user = author.id;
    let outcome = store
        .delete_post(id, Box::new(move |p: &Post| p.check_owner(user)))
        .await
        .with_context(|| format!("deleting post {id}"))?;
    settle(outcome, Lookup::Write)?;
    tracing::info!(post = %id, %user, "deleted post");
    Ok(())
}

pub async fn like(store: &dyn PostStore, user: &Claims, id: Option<PostId>) -> Result<Post, Error> {
    let id = id.ok_or(Error::post_not_found(Lookup::Write))?;
    let user = user.id;
    let outcome = store
        .update_post(id, Box::new(move |p: &mut Post| p.like(user)))
        .await
        .with_context(|| format!("liking post {id} as {user}"))?;
    settle(outcome, Lookup::Write)
}

pub async fn unlike(
    store: &dyn PostStore,
    user: &Claims,
    id: Option<PostId>,
) -> Result<Post, Error> {
    let id = id.ok_or(Error::post_not_found(Lookup::Write))?;
    let user = user.id;
    let outcome = store
        .update_post(id, Box::new(move |p: &mut Post| p.unlike(user)))
        .await
        .with_context(|| format!("unliking post {id} as {user}"))?;
    settle(outcome, Lookup::Write)
}

pub async fn add_comment(
    store: &dyn PostStore,
    author: &Claims,
    id: Option<PostId>,
    mut input: PostInput,
) -> Result<Post, Error> {
    input.validate()?;
    let id = id.ok_or(Error::post_not_found(Lookup::Comment))?;
    let (name, avatar) = display_fields(author, &mut input);
    let comment = Comment {
        id: CommentId::random(),
        user: author.id,
        text: input.text.unwrap_or_default(),
        name,
        avatar,
        date: now(),
    };
    let comment_id = comment.id;
    let outcome = store
        .update_post(
            id,
            Box::new(move |p: &mut Post| {
                p.add_comment(comment);
                Ok(())
            }),
        )
        .await
        .with_context(|| format!("commenting on post {id}"))?;
    let post = settle(outcome, Lookup::Comment)?;
    tracing::info!(post = %id, comment = %comment_id, user = %author.id, "added comment");
    Ok(post)
}

/// Any authenticated user may remove any comment
pub async fn remove_comment(
    store: &dyn PostStore,
    id: Option<PostId>,
    comment: Option<CommentId>,
) -> Result<Post, Error> {
    let id = id.ok_or(Error::post_not_found(Lookup::Comment))?;
    let outcome = store
        .update_post(
            id,
            Box::new(move |p: &mut Post| {
                let comment = comment.ok_or(ApiError::CommentNotFound)?;
                p.remove_comment(comment).map(|_| ())
            }),
        )
        .await
        .with_context(|| format!("removing comment from post {id}"))?;
    settle(outcome, Lookup::Comment)
}
