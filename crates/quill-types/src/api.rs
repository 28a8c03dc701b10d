use serde::{Deserialize, Serialize};

use crate::models::{Comment, Post, PostSummary, UserRef};

// -- Forms --

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Create/edit form for a blog post. `author_id` is only honoured on edit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostForm {
    pub title: String,
    pub subtitle: String,
    pub img_url: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<i64>,
}

impl From<&Post> for PostForm {
    fn from(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            img_url: post.img_url.clone(),
            body: post.body.clone(),
            author_id: Some(post.author_id),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentForm {
    pub body: String,
}

// -- Page payloads handed to the presentation layer --

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexPage {
    pub current_user: Option<UserRef>,
    pub flash: Option<String>,
    pub posts: Vec<PostSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostPage {
    pub current_user: Option<UserRef>,
    pub flash: Option<String>,
    pub post: Post,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FormPage {
    pub current_user: Option<UserRef>,
    pub flash: Option<String>,
    /// Prefilled values, present when editing an existing post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<PostForm>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StaticPage {
    pub current_user: Option<UserRef>,
    pub page: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_form_omits_missing_author() {
        let form = PostForm {
            title: "T1".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&form).unwrap();
        assert!(json.get("author_id").is_none());
        assert_eq!(json["title"], "T1");
    }

    #[test]
    fn edit_values_carry_post_author() {
        let post = Post {
            id: 3,
            title: "Hello".into(),
            subtitle: "World".into(),
            date: "April 03, 2024".into(),
            body: "<p>hi</p>".into(),
            img_url: "https://example.com/a.jpg".into(),
            author_id: 1,
            author_name: "Admin".into(),
        };
        let form = PostForm::from(&post);
        assert_eq!(form.author_id, Some(1));
        assert_eq!(form.body, "<p>hi</p>");
    }
}
