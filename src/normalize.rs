//! The one place incoming payloads are turned into canonical types.
//!
//! Upstream schemas are not uniform: authors arrive as full records, as a
//! bare username or as a bare id; fields go by several names depending on
//! which service produced them. Everything past this module sees only
//! [`Post`], [`Comment`] and [`Author`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::UserProfile;
use crate::comments::Comment;
use crate::error::ApiError;
use crate::posts::{Author, Post, Visibility};
use crate::reactions::{deserialize_optional_kind, ReactionKind, ReactionState, ReactionTally};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireAuthor {
    Record(Author),
    Bare(String),
}

impl WireAuthor {
    fn is_bare(&self) -> bool {
        matches!(self, WireAuthor::Bare(_))
    }

    fn into_author(self) -> Author {
        match self {
            WireAuthor::Record(author) => author,
            WireAuthor::Bare(raw) => match Uuid::parse_str(raw.trim()) {
                Ok(id) => Author {
                    id: Some(id),
                    username: String::new(),
                    bio: None,
                    image: None,
                },
                Err(_) => Author {
                    id: None,
                    username: raw,
                    bio: None,
                    image: None,
                },
            },
        }
    }
}

impl From<&UserProfile> for Author {
    fn from(user: &UserProfile) -> Self {
        Author {
            id: Some(user.id),
            username: user.username.clone(),
            bio: user.bio.clone(),
            image: user.image.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WirePost {
    id: Uuid,
    author: WireAuthor,
    #[serde(default, alias = "caption", alias = "text")]
    content: String,
    #[serde(default, alias = "image_url")]
    image: Option<String>,
    #[serde(default, alias = "reactions")]
    reaction_counts: ReactionTally,
    #[serde(default, alias = "reactions_count")]
    total_reactions: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_kind")]
    user_reaction: Option<ReactionKind>,
    #[serde(default, alias = "comment_count")]
    comments_count: u64,
    created_at: DateTime<Utc>,
    #[serde(default, alias = "edited_at")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    visibility: Visibility,
}

impl From<WirePost> for Post {
    fn from(p: WirePost) -> Self {
        Post {
            id: p.id,
            author: p.author.into_author(),
            content: p.content,
            image: p.image.filter(|url| !url.is_empty()),
            reactions: ReactionState::new(p.reaction_counts, p.total_reactions, p.user_reaction),
            comments_count: p.comments_count,
            created_at: p.created_at,
            updated_at: p.updated_at,
            visibility: p.visibility,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireComment {
    id: Uuid,
    #[serde(default, alias = "post", alias = "story_id")]
    post_id: Option<Uuid>,
    #[serde(default, alias = "parent")]
    parent_id: Option<Uuid>,
    author: WireAuthor,
    #[serde(alias = "text")]
    content: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "reply_count")]
    replies_count: u64,
    #[serde(default)]
    replies: Vec<WireComment>,
}

impl From<WireComment> for Comment {
    fn from(c: WireComment) -> Self {
        let replies: Vec<Comment> = c.replies.into_iter().map(Comment::from).collect();
        Comment {
            id: c.id,
            post_id: c.post_id,
            parent_id: c.parent_id,
            author: c.author.into_author(),
            content: c.content,
            created_at: c.created_at,
            updated_at: c.updated_at,
            replies_count: c.replies_count.max(replies.len() as u64),
            replies,
        }
    }
}

pub fn parse_post(value: Value) -> Result<Post, ApiError> {
    Ok(serde_json::from_value::<WirePost>(value)?.into())
}

/// Parses a comment the signed-in user just wrote. When the server only
/// echoes the author's name, the author record is rebuilt from `viewer`.
pub fn parse_comment(value: Value, viewer: Option<&UserProfile>) -> Result<Comment, ApiError> {
    let wire: WireComment = serde_json::from_value(value)?;
    let synthesize = wire.author.is_bare();
    let mut comment = Comment::from(wire);

    if synthesize {
        if let Some(viewer) = viewer {
            comment.author = Author::from(viewer);
        }
    }
    Ok(comment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn comment_json(author: Value) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "post": Uuid::new_v4(),
            "author": author,
            "text": "Nice shot!",
            "created_at": "2024-05-01T10:00:00Z"
        })
    }

    #[test]
    fn test_record_author_is_kept() {
        let id = Uuid::new_v4();
        let comment = parse_comment(
            comment_json(json!({ "id": id, "username": "bob", "avatar": "b.png" })),
            Some(&UserProfile::named("alice")),
        )
        .unwrap();
        assert_eq!(comment.author.id, Some(id));
        assert_eq!(comment.author.username, "bob");
        assert_eq!(comment.author.image.as_deref(), Some("b.png"));
    }

    #[test]
    fn test_bare_author_is_synthesized_from_viewer() {
        let mut viewer = UserProfile::named("alice");
        viewer.image = Some("alice.png".into());

        let comment = parse_comment(comment_json(json!("alice")), Some(&viewer)).unwrap();
        assert_eq!(comment.author.id, Some(viewer.id));
        assert_eq!(comment.author.username, "alice");
        assert_eq!(comment.author.image.as_deref(), Some("alice.png"));
    }

    #[test]
    fn test_bare_author_without_viewer_keeps_name() {
        let comment = parse_comment(comment_json(json!("carol")), None).unwrap();
        assert_eq!(comment.author.id, None);
        assert_eq!(comment.author.username, "carol");
    }

    #[test]
    fn test_bare_author_id() {
        let id = Uuid::new_v4();
        let comment: Comment = serde_json::from_value(comment_json(json!(id.to_string()))).unwrap();
        assert_eq!(comment.author.id, Some(id));
    }

    #[test]
    fn test_post_aliases_and_empty_reaction() {
        let post = parse_post(json!({
            "id": Uuid::new_v4(),
            "author": { "username": "dave" },
            "caption": "sunset",
            "image_url": "",
            "reactions": { "like": 3, "love": 1 },
            "user_reaction": "",
            "comment_count": 2,
            "created_at": "2024-05-01T10:00:00Z",
            "visibility": "followers"
        }))
        .unwrap();

        assert_eq!(post.content, "sunset");
        assert_eq!(post.image, None);
        assert_eq!(post.reactions.counts.get(ReactionKind::Like), 3);
        assert_eq!(post.reactions.total, 4);
        assert_eq!(post.reactions.mine, None);
        assert_eq!(post.comments_count, 2);
        assert_eq!(post.visibility, Visibility::Followers);
    }

    #[test]
    fn test_reply_count_never_below_embedded_replies() {
        let parent_id = Uuid::new_v4();
        let mut value = comment_json(json!("erin"));
        value["id"] = json!(parent_id);
        value["replies"] = json!([comment_json(json!("frank")), comment_json(json!("gina"))]);

        let comment: Comment = serde_json::from_value(value).unwrap();
        assert_eq!(comment.replies.len(), 2);
        assert_eq!(comment.replies_count, 2);
    }
}
