use crate::{CommentId, Error, PostId, Time, UserId};

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Like {
    pub user: UserId,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: CommentId,
    pub user: UserId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub date: Time,
}

/// Acknowledgement of a deletion
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Success {
    pub success: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: PostId,

    /// Author, never changes after creation
    pub user: UserId,
    pub text: String,

    // Copied from the author at creation time, not kept in sync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    /// Newest first, at most one entry per user
    pub likes: Vec<Like>,

    /// Newest first
    pub comments: Vec<Comment>,

    pub date: Time,
}

impl Post {
    pub fn is_liked_by(&self, user: UserId) -> bool {
        self.likes.iter().any(|l| l.user == user)
    }

    pub fn check_owner(&self, user: UserId) -> Result<(), Error> {
        if self.user == user {
            Ok(())
        } else {
            Err(Error::NotAuthorized)
        }
    }

    pub fn like(&mut self, user: UserId) -> Result<(), Error> {
        if self.is_liked_by(user) {
            return Err(Error::AlreadyLiked);
        }
        self.likes.insert(0, Like { user });
        Ok(())
    }

    pub fn unlike(&mut self, user: UserId) -> Result<(), Error> {
        let idx = self
            .likes
            .iter()
            .position(|l| l.user == user)
            .ok_or(Error::NotYetLiked)?;
        self.likes.remove(idx);
        Ok(())
    }

    pub fn add_comment(&mut self, comment: Comment) {
        self.comments.insert(0, comment);
    }

    /// Removes the first comment with this id, returning it
    pub fn remove_comment(&mut self, id: CommentId) -> Result<Comment, Error> {
        let idx = self
            .comments
            .iter()
            .position(|c| c.id == id)
            .ok_or(Error::CommentNotFound)?;
        Ok(self.comments.remove(idx))
    }
}
