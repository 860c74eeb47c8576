use async_trait::async_trait;

use crate::error::FeedClientResult;
use crate::filters::ListPostsQuery;
use crate::models::{Category, PopularTag, PostPage};

/// Операции backend, которые нужны ленте.
///
/// Реализация для продакшена: [`crate::HttpPostsApi`]. В тестах
/// подставляется фейк.
#[async_trait]
pub trait PostsApi: Send + Sync {
    /// Страница постов по фильтрам.
    async fn list_posts(&self, query: &ListPostsQuery) -> FeedClientResult<PostPage>;

    /// Категории с количеством постов.
    async fn categories(&self) -> FeedClientResult<Vec<Category>>;

    /// Популярные теги.
    async fn popular_tags(&self) -> FeedClientResult<Vec<PopularTag>>;

    /// Ставит лайк. Возвращает новое число лайков, если сервер его сообщил.
    async fn like_post(&self, id: i64) -> FeedClientResult<Option<u64>>;

    /// Удаляет пост.
    async fn delete_post(&self, id: i64) -> FeedClientResult<()>;
}
