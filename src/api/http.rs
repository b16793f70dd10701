//! `reqwest`-backed implementation of the collaborator traits.

use chrono::NaiveDate;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ApiResponse, ArtistApi, ChatApi, CommentApi, FeedApi, FollowApi, Page};
use crate::config::Config;
use crate::errors::{ClientError, ClientResult, ErrorEnvelope};
use crate::models::{
    Artist, Comment, CommentDraft, Conversation, FollowCounts, Message, Post, PostDraft, UserId,
};
use crate::search::ArtistFilter;
use crate::session::Session;

/// REST client. Every request carries the bearer token when one is set.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Build a client from configuration and the stored session.
    pub fn from_session(config: &Config, session: &Session) -> Self {
        Self::new(config.api_base_url.clone(), session.token().map(str::to_string))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and decode the envelope, returning its payload.
    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let body = Self::send(builder).await?;
        let envelope: ApiResponse<T> = serde_json::from_str(&body)?;
        envelope.into_data()
    }

    /// Send and only check the envelope's success flag.
    async fn execute(&self, builder: RequestBuilder) -> ClientResult<()> {
        let body = Self::send(builder).await?;
        if body.trim().is_empty() {
            return Ok(());
        }
        let envelope: ApiResponse<serde_json::Value> = serde_json::from_str(&body)?;
        envelope.into_unit()
    }

    async fn send(builder: RequestBuilder) -> ClientResult<String> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        tracing::debug!("Request failed with status {}", status);
        match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => Err(envelope.into_error(status.as_u16())),
            Err(_) => Err(ClientError::from_status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Request failed"),
            )),
        }
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.fetch(self.request(Method::POST, path).json(body)).await
    }
}

impl FeedApi for HttpApi {
    async fn list_posts(&self, page: u32, limit: u32) -> ClientResult<Page<Post>> {
        let builder = self
            .request(Method::GET, "/posts")
            .query(&[("page", page), ("limit", limit)]);
        self.fetch(builder).await
    }

    async fn create_post(&self, draft: &PostDraft) -> ClientResult<Post> {
        self.post_json("/posts", draft).await
    }

    async fn like_post(&self, post_id: &str) -> ClientResult<()> {
        self.execute(self.request(Method::POST, &format!("/posts/{}/like", post_id)))
            .await
    }

    async fn unlike_post(&self, post_id: &str) -> ClientResult<()> {
        self.execute(self.request(Method::DELETE, &format!("/posts/{}/like", post_id)))
            .await
    }

    async fn delete_post(&self, post_id: &str) -> ClientResult<()> {
        self.execute(self.request(Method::DELETE, &format!("/posts/{}", post_id)))
            .await
    }
}

impl CommentApi for HttpApi {
    async fn list_comments(&self, post_id: &str) -> ClientResult<Vec<Comment>> {
        self.fetch(self.request(Method::GET, &format!("/posts/{}/comments", post_id)))
            .await
    }

    async fn list_replies(&self, comment_id: &str) -> ClientResult<Vec<Comment>> {
        self.fetch(self.request(Method::GET, &format!("/comments/{}/replies", comment_id)))
            .await
    }

    async fn create_comment(&self, post_id: &str, draft: &CommentDraft) -> ClientResult<Comment> {
        self.post_json(&format!("/posts/{}/comments", post_id), draft)
            .await
    }

    async fn like_comment(&self, comment_id: &str) -> ClientResult<()> {
        self.execute(self.request(Method::POST, &format!("/comments/{}/like", comment_id)))
            .await
    }

    async fn unlike_comment(&self, comment_id: &str) -> ClientResult<()> {
        self.execute(self.request(Method::DELETE, &format!("/comments/{}/like", comment_id)))
            .await
    }

    async fn delete_comment(&self, comment_id: &str) -> ClientResult<()> {
        self.execute(self.request(Method::DELETE, &format!("/comments/{}", comment_id)))
            .await
    }
}

impl ChatApi for HttpApi {
    async fn list_conversations(&self) -> ClientResult<Vec<Conversation>> {
        self.fetch(self.request(Method::GET, "/conversations")).await
    }

    async fn list_messages(&self, conversation_id: &str, page: u32) -> ClientResult<Page<Message>> {
        let builder = self
            .request(
                Method::GET,
                &format!("/conversations/{}/messages", conversation_id),
            )
            .query(&[("page", page)]);
        self.fetch(builder).await
    }

    async fn send_message(&self, conversation_id: &str, content: &str) -> ClientResult<Message> {
        self.post_json(
            &format!("/conversations/{}/messages", conversation_id),
            &serde_json::json!({ "content": content }),
        )
        .await
    }

    async fn react_to_message(&self, message_id: &str, emoji: &str) -> ClientResult<Message> {
        self.post_json(
            &format!("/messages/{}/reactions", message_id),
            &serde_json::json!({ "emoji": emoji }),
        )
        .await
    }

    async fn set_pinned(&self, conversation_id: &str, pinned: bool) -> ClientResult<()> {
        let builder = self
            .request(
                Method::PATCH,
                &format!("/conversations/{}/pin", conversation_id),
            )
            .json(&serde_json::json!({ "isPinned": pinned }));
        self.execute(builder).await
    }
}

impl FollowApi for HttpApi {
    async fn following_ids(&self) -> ClientResult<Vec<UserId>> {
        self.fetch(self.request(Method::GET, "/follows/following")).await
    }

    async fn follow(&self, user_id: &str) -> ClientResult<()> {
        self.execute(self.request(Method::POST, &format!("/follows/{}", user_id)))
            .await
    }

    async fn unfollow(&self, user_id: &str) -> ClientResult<()> {
        self.execute(self.request(Method::DELETE, &format!("/follows/{}", user_id)))
            .await
    }

    async fn follow_counts(&self, user_id: &str) -> ClientResult<FollowCounts> {
        self.fetch(self.request(Method::GET, &format!("/follows/{}/counts", user_id)))
            .await
    }
}

impl ArtistApi for HttpApi {
    async fn search_artists(
        &self,
        filter: &ArtistFilter,
        page: u32,
        limit: u32,
    ) -> ClientResult<Page<Artist>> {
        let mut params = filter.to_query_pairs();
        params.push(("page", page.to_string()));
        params.push(("limit", limit.to_string()));
        self.fetch(self.request(Method::GET, "/artists").query(&params))
            .await
    }

    async fn available_artists(&self, date: NaiveDate) -> ClientResult<Vec<Artist>> {
        let builder = self
            .request(Method::GET, "/artists/available")
            .query(&[("date", date.format("%Y-%m-%d").to_string())]);
        self.fetch(builder).await
    }
}
