use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Пользователь, полученный при входе.
pub struct User {
    /// Идентификатор пользователя.
    pub id: i64,
    /// Логин.
    pub username: String,
    /// Email.
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Ответ после успешного входа.
pub struct AuthResponse {
    /// JWT access token.
    pub access_token: String,
    /// Данные пользователя.
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Автор поста в том виде, в каком его отдаёт лента.
pub struct PostAuthor {
    /// Идентификатор пользователя.
    pub id: i64,
    /// Логин.
    pub username: String,
    /// Имя.
    pub first_name: Option<String>,
    /// Фамилия.
    pub last_name: Option<String>,
    /// Ссылка на аватар.
    pub image_url: Option<String>,
}

impl PostAuthor {
    /// Имя для отображения: «имя фамилия», если заполнены оба поля, иначе логин.
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                format!("{first} {last}")
            }
            _ => self.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Видимость поста.
pub enum Visibility {
    /// Виден всем.
    Public,
    /// Виден только автору.
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Поле, по которому сервер сортирует ленту.
pub enum SortKey {
    /// Дата создания.
    #[default]
    CreatedAt,
    /// Количество лайков.
    LikesCount,
    /// Количество просмотров.
    ViewsCount,
    /// Количество комментариев.
    CommentsCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Направление сортировки.
pub enum SortOrder {
    /// По возрастанию.
    Asc,
    /// По убыванию.
    #[default]
    Desc,
}

impl Visibility {
    /// Значение параметра запроса.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl SortKey {
    /// Значение параметра `sort_by`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::LikesCount => "likes_count",
            Self::ViewsCount => "views_count",
            Self::CommentsCount => "comments_count",
        }
    }
}

impl SortOrder {
    /// Значение параметра `sort_order`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            other => Err(format!("unknown visibility '{other}', expected public|private")),
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created_at" | "date" => Ok(Self::CreatedAt),
            "likes_count" | "likes" => Ok(Self::LikesCount),
            "views_count" | "views" => Ok(Self::ViewsCount),
            "comments_count" | "comments" => Ok(Self::CommentsCount),
            other => Err(format!(
                "unknown sort key '{other}', expected created_at|likes_count|views_count|comments_count"
            )),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort order '{other}', expected asc|desc")),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Тип вложения поста.
pub enum MediaKind {
    /// Картинка (по расширению файла).
    Image,
    /// Всё остальное отображается как видео.
    Video,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Публичная модель поста ленты.
pub struct Post {
    /// Идентификатор поста.
    pub id: i64,
    /// Идентификатор автора.
    pub user_id: i64,
    /// Автор, если сервер его вернул.
    pub user: Option<PostAuthor>,
    /// Содержимое поста (может содержать разметку).
    pub content: String,
    /// Ссылка на вложение.
    pub media_url: Option<String>,
    /// Дата и время создания поста (UTC).
    pub created_at: DateTime<Utc>,
    /// Количество лайков.
    pub likes_count: u64,
    /// Количество просмотров.
    pub views_count: u64,
    /// Количество комментариев.
    pub comments_count: u64,
    /// Видимость.
    pub visibility: Option<Visibility>,
    /// Категория.
    pub category: Option<String>,
    /// Теги.
    pub tags: Vec<String>,
}

impl Post {
    /// Имя автора для карточки поста.
    pub fn author_name(&self) -> String {
        self.user
            .as_ref()
            .map(PostAuthor::display_name)
            .unwrap_or_else(|| format!("user #{}", self.user_id))
    }

    /// Тип вложения, если оно есть.
    pub fn media_kind(&self) -> Option<MediaKind> {
        let url = self.media_url.as_deref()?;
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let is_image = path
            .rsplit_once('.')
            .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        Some(if is_image {
            MediaKind::Image
        } else {
            MediaKind::Video
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Курсор пагинации, полностью взятый из ответа сервера.
pub struct Pagination {
    /// Номер страницы (с 1).
    pub page: u32,
    /// Размер страницы.
    pub per_page: u32,
    /// Общее количество постов.
    pub total: u64,
    /// Общее количество страниц.
    pub pages: u32,
    /// Есть ли следующая страница.
    pub has_next: bool,
    /// Есть ли предыдущая страница.
    pub has_prev: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// Одна страница ленты.
pub struct PostPage {
    /// Посты в серверном порядке.
    pub posts: Vec<Post>,
    /// Параметры пагинации.
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Категория постов с числом использований.
pub struct Category {
    /// Идентификатор категории, если сервер его передаёт.
    pub id: Option<i64>,
    /// Название.
    pub name: String,
    /// Количество постов.
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Популярный тег с числом использований.
pub struct PopularTag {
    /// Название.
    pub name: String,
    /// Количество постов.
    pub count: u64,
}
