use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(BookmarkId);
id_newtype!(UserId);

impl BookmarkId {
    pub fn random() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

/// A saved content reference owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub user_id: UserId,
    pub name: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub owner_visit_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_video_id: Option<String>,
}

impl Bookmark {
    pub fn new(
        id: BookmarkId,
        user_id: UserId,
        name: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            id,
            user_id,
            name: name.into(),
            location: location.into(),
            description: None,
            tags: Vec::new(),
            public: false,
            like_count: 0,
            owner_visit_count: 0,
            youtube_video_id: None,
        }
    }

    pub fn with_youtube_video_id(mut self, video_id: impl Into<String>) -> Self {
        self.youtube_video_id = Some(video_id.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn published(mut self) -> Self {
        self.public = true;
        self
    }

    pub fn has_playable_media(&self) -> bool {
        self.youtube_video_id.is_some()
    }
}
