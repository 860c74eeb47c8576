use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::api::PostsApi;
use crate::config::FeedConfig;
use crate::credentials::CredentialProvider;
use crate::error::{FeedClientError, FeedClientResult};
use crate::filters::ListPostsQuery;
use crate::media;
use crate::models::{
    AuthResponse, Category, Pagination, PopularTag, Post, PostAuthor, PostPage, User, Visibility,
};

#[derive(Debug, Serialize)]
struct LoginRequestDto<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct SignupRequestDto<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct CreatePostRequestDto<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatePostResponseDto {
    post: PostDto,
}

#[derive(Debug, Default, Deserialize)]
struct MessageResponseDto {
    msg: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponseDto {
    error: Option<String>,
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthResponseDto {
    access_token: String,
    user: UserDto,
}

#[derive(Debug, Deserialize)]
struct UserDto {
    id: i64,
    username: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostAuthorDto {
    id: i64,
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostDto {
    id: i64,
    user_id: Option<i64>,
    user: Option<PostAuthorDto>,
    content: String,
    media_url: Option<String>,
    created_at: String,
    likes_count: Option<u64>,
    views_count: Option<u64>,
    comments_count: Option<u64>,
    visibility: Option<Visibility>,
    category: Option<String>,
    tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct PaginationDto {
    page: Option<u32>,
    per_page: Option<u32>,
    total: Option<i64>,
    pages: Option<u32>,
    has_next: Option<bool>,
    has_prev: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ListPostsResponseDto {
    #[serde(default)]
    posts: Vec<PostDto>,
    pagination: Option<PaginationDto>,
}

#[derive(Debug, Deserialize)]
struct CategoryDto {
    id: Option<i64>,
    name: String,
    #[serde(default)]
    count: u64,
}

#[derive(Debug, Deserialize)]
struct CategoriesResponseDto {
    #[serde(default)]
    categories: Vec<CategoryDto>,
}

#[derive(Debug, Deserialize)]
struct PopularTagDto {
    name: String,
    #[serde(default)]
    count: u64,
}

#[derive(Debug, Deserialize)]
struct PopularTagsResponseDto {
    #[serde(default)]
    tags: Vec<PopularTagDto>,
}

#[derive(Debug, Default, Deserialize)]
struct LikeCountDto {
    likes_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LikeResponseDto {
    likes_count: Option<u64>,
    post: Option<LikeCountDto>,
}

impl From<AuthResponseDto> for AuthResponse {
    fn from(value: AuthResponseDto) -> Self {
        Self {
            access_token: value.access_token,
            user: User {
                id: value.user.id,
                username: value.user.username,
                email: value.user.email,
            },
        }
    }
}

impl From<PostAuthorDto> for PostAuthor {
    fn from(value: PostAuthorDto) -> Self {
        Self {
            id: value.id,
            username: value.username,
            first_name: value.first_name,
            last_name: value.last_name,
            image_url: value.image_url,
        }
    }
}

impl TryFrom<PostDto> for Post {
    type Error = FeedClientError;

    fn try_from(value: PostDto) -> Result<Self, Self::Error> {
        let user_id = value
            .user_id
            .or_else(|| value.user.as_ref().map(|user| user.id))
            .ok_or_else(|| {
                FeedClientError::Decode(format!("post {} has no author", value.id))
            })?;
        let created_at = parse_timestamp(&value.created_at).ok_or_else(|| {
            FeedClientError::Decode(format!(
                "post {} has invalid created_at '{}'",
                value.id, value.created_at
            ))
        })?;

        Ok(Self {
            id: value.id,
            user_id,
            user: value.user.map(PostAuthor::from),
            content: value.content,
            media_url: value.media_url.filter(|url| !url.is_empty()),
            created_at,
            likes_count: value.likes_count.unwrap_or(0),
            views_count: value.views_count.unwrap_or(0),
            comments_count: value.comments_count.unwrap_or(0),
            visibility: value.visibility,
            category: value.category.filter(|category| !category.is_empty()),
            tags: value.tags.unwrap_or_default(),
        })
    }
}

impl ListPostsResponseDto {
    /// Недостающие поля пагинации заполняются из запроса: без
    /// `has_next` следующей страницы нет.
    fn into_page(self, query: &ListPostsQuery) -> FeedClientResult<PostPage> {
        let posts = self
            .posts
            .into_iter()
            .map(Post::try_from)
            .collect::<FeedClientResult<Vec<_>>>()?;
        let pagination = self.pagination.unwrap_or_default();

        Ok(PostPage {
            pagination: Pagination {
                page: pagination.page.unwrap_or(query.page),
                per_page: pagination.per_page.unwrap_or(query.per_page),
                total: pagination.total.unwrap_or(0).max(0) as u64,
                pages: pagination.pages.unwrap_or(0),
                has_next: pagination.has_next.unwrap_or(false),
                has_prev: pagination.has_prev.unwrap_or(false),
            },
            posts,
        })
    }
}

/// Backend отдаёт `created_at` то в RFC 3339, то без часового пояса (UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_like_body(body: &str) -> Option<u64> {
    if body.trim().is_empty() {
        return None;
    }
    let dto = serde_json::from_str::<LikeResponseDto>(body).unwrap_or_default();
    dto.likes_count
        .or_else(|| dto.post.and_then(|post| post.likes_count))
}

#[derive(Clone)]
/// HTTP-клиент REST API ленты.
pub struct HttpPostsApi {
    base_url: String,
    client: Client,
    credentials: Arc<dyn CredentialProvider>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl std::fmt::Debug for HttpPostsApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPostsApi")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .finish_non_exhaustive()
    }
}

impl HttpPostsApi {
    /// Создаёт клиент по настройкам; токен берётся из `credentials` перед
    /// каждым запросом.
    pub fn new(
        config: &FeedConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> FeedClientResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            base_url: config.base_url.clone(),
            client,
            credentials,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn decode_error(response: Response) -> FeedClientError {
        let status = response.status();

        let message = match response.json::<ErrorResponseDto>().await {
            Ok(body) => body
                .error
                .or(body.msg)
                .unwrap_or_else(|| format!("http status {status}")),
            Err(_) => format!("http status {status}"),
        };
        FeedClientError::from_http_status(status, Some(message))
    }

    fn authorized(&self, method: Method, path: &str) -> FeedClientResult<RequestBuilder> {
        let token = self
            .credentials
            .access_token()
            .ok_or(FeedClientError::Unauthorized)?;
        Ok(self
            .client
            .request(method, self.endpoint(path))
            .bearer_auth(token))
    }

    async fn send(request: RequestBuilder) -> FeedClientResult<Response> {
        let response = request
            .send()
            .await
            .map_err(FeedClientError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }
        Ok(response)
    }

    /// GET с повтором при сетевых ошибках и 5xx.
    async fn get_json<Q, T>(&self, path: &str, query: Option<&Q>) -> FeedClientResult<T>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut attempt = 0;
        loop {
            let mut request = self.authorized(Method::GET, path)?;
            if let Some(query) = query {
                request = request.query(query);
            }
            debug!(path, attempt, "GET");

            let result = match Self::send(request).await {
                Ok(response) => response
                    .json::<T>()
                    .await
                    .map_err(FeedClientError::from_reqwest),
                Err(err) => Err(err),
            };

            match result {
                Err(err) if attempt < self.max_retries && err.is_retryable() => {
                    attempt += 1;
                    warn!(path, attempt, error = %err, "request failed, retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                other => return other,
            }
        }
    }

    /// Выполняет вход и возвращает JWT + данные пользователя.
    ///
    /// В `username` можно передать email.
    pub async fn login(&self, username: &str, password: &str) -> FeedClientResult<AuthResponse> {
        let payload = LoginRequestDto { username, password };
        let request = self
            .client
            .request(Method::POST, self.endpoint("/api/auth/login"))
            .json(&payload);

        let dto = Self::send(request)
            .await?
            .json::<AuthResponseDto>()
            .await
            .map_err(FeedClientError::from_reqwest)?;
        Ok(dto.into())
    }

    /// Регистрирует пользователя. Токен сервер не выдаёт: после регистрации
    /// нужен `login`. Возвращает сообщение сервера.
    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> FeedClientResult<String> {
        let payload = SignupRequestDto {
            username,
            email,
            password,
        };
        let request = self
            .client
            .request(Method::POST, self.endpoint("/api/auth/signup"))
            .json(&payload);

        let body = Self::send(request)
            .await?
            .text()
            .await
            .map_err(FeedClientError::from_reqwest)?;
        let dto = serde_json::from_str::<MessageResponseDto>(&body).unwrap_or_default();
        Ok(dto
            .msg
            .or(dto.message)
            .unwrap_or_else(|| "User created".to_string()))
    }

    /// Публикует пост. Без вложения тело уходит JSON, с вложением
    /// `multipart/form-data` с полями `content` и `media`.
    ///
    /// Пустой текст и неподходящий файл отклоняются до запроса.
    pub async fn create_post(&self, content: &str, media: Option<&Path>) -> FeedClientResult<Post> {
        if content.trim().is_empty() {
            return Err(FeedClientError::InvalidRequest(
                "content is required".to_string(),
            ));
        }

        let request = self.authorized(Method::POST, "/api/posts")?;
        let request = match media {
            Some(path) => {
                let file = media::read_media(path).await?;
                debug!(file = %file.file_name, size = file.bytes.len(), "POST post with media");
                let part = Part::bytes(file.bytes).file_name(file.file_name);
                request.multipart(
                    Form::new()
                        .text("content", content.to_string())
                        .part("media", part),
                )
            }
            None => {
                debug!("POST post");
                request.json(&CreatePostRequestDto { content })
            }
        };

        let dto = Self::send(request)
            .await?
            .json::<CreatePostResponseDto>()
            .await
            .map_err(FeedClientError::from_reqwest)?;
        Post::try_from(dto.post)
    }
}

#[async_trait]
impl PostsApi for HttpPostsApi {
    async fn list_posts(&self, query: &ListPostsQuery) -> FeedClientResult<PostPage> {
        let dto: ListPostsResponseDto = self.get_json("/api/posts", Some(query)).await?;
        dto.into_page(query)
    }

    async fn categories(&self) -> FeedClientResult<Vec<Category>> {
        let dto: CategoriesResponseDto = self
            .get_json("/api/posts/categories", None::<&()>)
            .await?;
        Ok(dto
            .categories
            .into_iter()
            .map(|category| Category {
                id: category.id,
                name: category.name,
                count: category.count,
            })
            .collect())
    }

    async fn popular_tags(&self) -> FeedClientResult<Vec<PopularTag>> {
        let dto: PopularTagsResponseDto = self
            .get_json("/api/posts/popular-tags", None::<&()>)
            .await?;
        Ok(dto
            .tags
            .into_iter()
            .map(|tag| PopularTag {
                name: tag.name,
                count: tag.count,
            })
            .collect())
    }

    async fn like_post(&self, id: i64) -> FeedClientResult<Option<u64>> {
        let request = self.authorized(Method::POST, &format!("/api/posts/{id}/like"))?;
        debug!(id, "POST like");

        let body = Self::send(request)
            .await?
            .text()
            .await
            .map_err(FeedClientError::from_reqwest)?;
        Ok(parse_like_body(&body))
    }

    async fn delete_post(&self, id: i64) -> FeedClientResult<()> {
        let request = self.authorized(Method::DELETE, &format!("/api/posts/{id}"))?;
        debug!(id, "DELETE post");

        Self::send(request).await?;
        Ok(())
    }
}
