//! Клиентская библиотека ленты постов.
//!
//! Состоит из:
//! - HTTP-транспорт (`HttpPostsApi`, `reqwest`) к REST API backend;
//! - контроллер ленты (`FeedController`): фильтры, debounce поиска,
//!   постраничная загрузка с отбрасыванием устаревших ответов, лайки,
//!   удаление и ссылки на посты;
//! - публикация постов (JSON или multipart с вложением) и регистрация.
//!
//! Токен не берётся из глобального хранилища: его передаёт
//! `CredentialProvider`, указанный при создании транспорта.
#![warn(missing_docs)]

mod api;
mod config;
mod controller;
mod credentials;
mod debounce;
mod error;
mod filters;
mod http_client;
mod interaction;
mod media;
mod models;

pub use api::PostsApi;
pub use config::{DEFAULT_API_URL, DEFAULT_ORIGIN, DEFAULT_PER_PAGE, FeedConfig};
pub use controller::{
    AuxState, FeedController, FeedError, FeedErrorKind, FeedPhase, FeedSnapshot, LoadOutcome,
    SkipReason,
};
pub use credentials::{CredentialProvider, StaticToken};
pub use error::{FeedClientError, FeedClientResult};
pub use filters::{FilterState, ListPostsQuery};
pub use http_client::HttpPostsApi;
pub use interaction::{Clipboard, Confirm};
pub use models::{
    AuthResponse, Category, MediaKind, Pagination, PopularTag, Post, PostAuthor, PostPage,
    SortKey, SortOrder, User, Visibility,
};
