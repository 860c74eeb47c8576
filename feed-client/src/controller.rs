use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};
use url::Url;

use crate::api::PostsApi;
use crate::config::FeedConfig;
use crate::debounce::Debouncer;
use crate::error::{FeedClientError, FeedClientResult};
use crate::filters::{FilterState, normalize_choice};
use crate::interaction::{Clipboard, Confirm};
use crate::models::{Category, PopularTag, Post, PostPage, SortKey, SortOrder, Visibility};

const DELETE_PROMPT: &str = "Are you sure you want to delete this post?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Фаза загрузки ленты для текущего набора фильтров.
pub enum FeedPhase {
    /// Начальное состояние до `mount` (и после `unmount`).
    Idle,
    /// Идёт запрос: `reset = true` означает первую страницу, иначе догрузка.
    Loading {
        /// Запрос заменяет список, а не дополняет его.
        reset: bool,
    },
    /// Последний запрос успешно применён.
    Loaded,
    /// Последний запрос завершился ошибкой.
    Errored {
        /// Ошибка первой страницы (список очищен) или догрузки (список цел).
        reset: bool,
    },
}

impl FeedPhase {
    /// Идёт ли сейчас загрузка.
    pub fn is_loading(self) -> bool {
        matches!(self, Self::Loading { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Какая загрузка не удалась.
pub enum FeedErrorKind {
    /// Не загрузилась первая страница: показывается баннер с повтором.
    Load,
    /// Не догрузилась следующая страница: уже загруженное остаётся.
    LoadMore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Ошибка загрузки для отображения.
pub struct FeedError {
    /// Вид ошибки.
    pub kind: FeedErrorKind,
    /// Текст ошибки.
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Состояние вспомогательной загрузки (категории, теги).
pub struct AuxState<T> {
    /// Идёт загрузка.
    pub loading: bool,
    /// Ошибка последней загрузки.
    pub error: Option<String>,
    /// Загруженные элементы.
    pub items: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Почему запрос не был отправлен.
pub enum SkipReason {
    /// Уже идёт загрузка.
    Loading,
    /// Сервер сообщил, что страниц больше нет.
    NoMorePages,
    /// Последняя страница пришла пустой при `has_next = true`.
    Stalled,
    /// Фильтр не изменился.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Итог одной загрузки страницы.
pub enum LoadOutcome {
    /// Страница применена к списку.
    Applied {
        /// Сколько постов пришло.
        received: usize,
    },
    /// Запрос не отправлялся.
    Skipped(SkipReason),
    /// Ответ пришёл для устаревших фильтров и отброшен.
    Discarded,
    /// Запрос не удался; текст ошибки в `FeedSnapshot::error`.
    Failed,
}

#[derive(Debug, Clone)]
/// Снимок состояния ленты для слоя отображения.
pub struct FeedSnapshot {
    /// Загруженные посты в серверном порядке.
    pub posts: Vec<Post>,
    /// Фаза загрузки.
    pub phase: FeedPhase,
    /// Идёт загрузка.
    pub loading: bool,
    /// Ошибка последней загрузки.
    pub error: Option<FeedError>,
    /// Есть ли следующая страница по данным сервера.
    pub has_more: bool,
    /// Догрузка остановлена из-за пустой страницы.
    pub stalled: bool,
    /// Номер последней загруженной страницы.
    pub current_page: u32,
    /// Активные фильтры.
    pub filters: FilterState,
    /// Текст в поле поиска (может ещё не примениться).
    pub search_input: String,
    /// Поиск ждёт окончания паузы ввода.
    pub search_pending: bool,
    /// Категории.
    pub categories: AuxState<Vec<Category>>,
    /// Популярные теги.
    pub popular_tags: AuxState<Vec<PopularTag>>,
}

#[derive(Debug)]
struct FeedState {
    filters: FilterState,
    search_input: String,
    posts: Vec<Post>,
    phase: FeedPhase,
    error: Option<FeedError>,
    has_more: bool,
    stalled: bool,
    current_page: u32,
    generation: u64,
    session: u64,
    categories: AuxState<Vec<Category>>,
    popular_tags: AuxState<Vec<PopularTag>>,
    /// Сколько раз счётчик лайков поста выставлялся по ответу сервера.
    like_syncs: HashMap<i64, u64>,
}

impl FeedState {
    fn new() -> Self {
        Self {
            filters: FilterState::default(),
            search_input: String::new(),
            posts: Vec::new(),
            phase: FeedPhase::Idle,
            error: None,
            has_more: false,
            stalled: false,
            current_page: 1,
            generation: 0,
            session: 0,
            categories: AuxState::default(),
            popular_tags: AuxState::default(),
            like_syncs: HashMap::new(),
        }
    }
}

struct Inner {
    api: Arc<dyn PostsApi>,
    per_page: u32,
    origin: String,
    state: Mutex<FeedState>,
    search_timer: Mutex<Debouncer>,
    revision: watch::Sender<u64>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn search_timer(&self) -> MutexGuard<'_, Debouncer> {
        self.search_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
/// Контроллер ленты постов: фильтры, debounce поиска, постраничная
/// загрузка и локальные изменения списка.
///
/// Клон разделяет состояние с оригиналом. Список постов меняет только
/// контроллер. Каждая загрузка первой страницы получает новый номер
/// поколения; ответ применяется, только если его поколение всё ещё текущее.
pub struct FeedController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for FeedController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedController")
            .field("per_page", &self.inner.per_page)
            .field("origin", &self.inner.origin)
            .finish_non_exhaustive()
    }
}

impl FeedController {
    /// Создаёт контроллер в состоянии `Idle` с фильтрами по умолчанию.
    pub fn new(api: Arc<dyn PostsApi>, config: &FeedConfig) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                api,
                per_page: config.per_page.max(1),
                origin: config.origin.clone(),
                state: Mutex::new(FeedState::new()),
                search_timer: Mutex::new(Debouncer::new(config.search_debounce)),
                revision,
            }),
        }
    }

    /// Создаёт контроллер с заданными начальными фильтрами; первая загрузка
    /// (`mount`/`refresh`) пойдёт уже с ними.
    pub fn with_filters(api: Arc<dyn PostsApi>, config: &FeedConfig, filters: FilterState) -> Self {
        let controller = Self::new(api, config);
        controller.update(|state| {
            state.search_input = filters.search.clone();
            state.filters = filters;
        });
        controller
    }

    /// Подписка на изменения: значение увеличивается после каждого
    /// изменения состояния, актуальные данные берутся из `snapshot()`.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Текущее состояние ленты.
    pub fn snapshot(&self) -> FeedSnapshot {
        let search_pending = self.inner.search_timer().is_pending();
        let state = self.inner.state();
        FeedSnapshot {
            posts: state.posts.clone(),
            phase: state.phase,
            loading: state.phase.is_loading(),
            error: state.error.clone(),
            has_more: state.has_more,
            stalled: state.stalled,
            current_page: state.current_page,
            filters: state.filters.clone(),
            search_input: state.search_input.clone(),
            search_pending,
            categories: state.categories.clone(),
            popular_tags: state.popular_tags.clone(),
        }
    }

    fn update<R>(&self, mutate: impl FnOnce(&mut FeedState) -> R) -> R {
        let result = {
            let mut state = self.inner.state();
            mutate(&mut state)
        };
        self.inner.revision.send_modify(|revision| *revision += 1);
        result
    }

    /// Загружает первую страницу, категории и популярные теги одновременно.
    pub async fn mount(&self) -> LoadOutcome {
        let (outcome, (), ()) = tokio::join!(
            self.refresh(),
            self.load_categories(),
            self.load_popular_tags()
        );
        outcome
    }

    /// Отменяет отложенный поиск, отбрасывает ответы, которые ещё в пути,
    /// и возвращает контроллер в `Idle`.
    pub fn unmount(&self) {
        self.inner.search_timer().cancel();
        self.update(|state| {
            let generation = state.generation + 1;
            let session = state.session + 1;
            *state = FeedState::new();
            state.generation = generation;
            state.session = session;
        });
        debug!("feed unmounted");
    }

    /// Перезагружает ленту с текущими фильтрами.
    pub async fn refresh(&self) -> LoadOutcome {
        self.reset_with(|_| true).await
    }

    /// Запоминает ввод в поле поиска. Фильтр применяется после паузы ввода
    /// (`FeedConfig::search_debounce`); каждый вызов перезапускает таймер.
    ///
    /// Требует контекста tokio runtime.
    pub fn set_search_term(&self, text: impl Into<String>) {
        let text = text.into();
        self.update(|state| state.search_input = text.clone());

        let weak = Arc::downgrade(&self.inner);
        self.inner.search_timer().schedule(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let controller = FeedController { inner };
            tokio::spawn(async move {
                controller.apply_search(text).await;
            });
        });
    }

    /// Применяет введённый поиск сразу, не дожидаясь паузы (например, по Enter).
    pub async fn flush_search(&self) -> LoadOutcome {
        self.inner.search_timer().cancel();
        let text = self.inner.state().search_input.clone();
        self.apply_search(text).await
    }

    async fn apply_search(&self, text: String) -> LoadOutcome {
        debug!(search = %text, "search settled");
        self.reset_with(move |state| {
            if state.filters.search == text {
                return false;
            }
            state.filters.search = text;
            true
        })
        .await
    }

    /// Фильтр по категории; пустая строка или `None` снимает фильтр.
    pub async fn set_category(&self, category: Option<String>) -> LoadOutcome {
        let category = normalize_choice(category);
        self.reset_with(move |state| {
            if state.filters.category == category {
                return false;
            }
            state.filters.category = category;
            true
        })
        .await
    }

    /// Фильтр по видимости.
    pub async fn set_visibility(&self, visibility: Option<Visibility>) -> LoadOutcome {
        self.reset_with(move |state| {
            if state.filters.visibility == visibility {
                return false;
            }
            state.filters.visibility = visibility;
            true
        })
        .await
    }

    /// Выбирает тег или снимает выбор.
    pub async fn toggle_tag(&self, tag: &str) -> LoadOutcome {
        let tag = tag.trim().to_string();
        if tag.is_empty() {
            return LoadOutcome::Skipped(SkipReason::Unchanged);
        }
        self.reset_with(move |state| {
            state.filters.toggle_tag(&tag);
            true
        })
        .await
    }

    /// Порядок сортировки (выполняется на сервере).
    pub async fn set_sort(&self, sort_by: SortKey, sort_order: SortOrder) -> LoadOutcome {
        self.reset_with(move |state| {
            if state.filters.sort_by == sort_by && state.filters.sort_order == sort_order {
                return false;
            }
            state.filters.sort_by = sort_by;
            state.filters.sort_order = sort_order;
            true
        })
        .await
    }

    /// Сбрасывает все фильтры и поле поиска и перезагружает ленту.
    pub async fn clear_filters(&self) -> LoadOutcome {
        self.inner.search_timer().cancel();
        self.reset_with(|state| {
            state.filters = FilterState::default();
            state.search_input.clear();
            true
        })
        .await
    }

    /// Загружает первую страницу заново. `mutate` меняет фильтры под той же
    /// блокировкой, что и сброс списка; `false` означает «ничего не изменилось».
    async fn reset_with(&self, mutate: impl FnOnce(&mut FeedState) -> bool) -> LoadOutcome {
        let per_page = self.inner.per_page;
        let started = self.update(|state| {
            if !mutate(state) {
                return None;
            }
            state.generation += 1;
            state.posts.clear();
            state.like_syncs.clear();
            state.current_page = 1;
            state.has_more = true;
            state.stalled = false;
            state.error = None;
            state.phase = FeedPhase::Loading { reset: true };
            Some((state.generation, state.filters.to_query(1, per_page)))
        });
        let Some((generation, query)) = started else {
            return LoadOutcome::Skipped(SkipReason::Unchanged);
        };

        debug!(generation, ?query, "loading first page");
        let result = self.inner.api.list_posts(&query).await;
        self.finish_load(generation, true, result)
    }

    /// Догружает следующую страницу с теми же фильтрами.
    ///
    /// Ничего не запрашивает, если идёт загрузка, страниц больше нет или
    /// догрузка остановлена пустой страницей.
    pub async fn load_more(&self) -> LoadOutcome {
        let per_page = self.inner.per_page;
        let started = self.update(|state| {
            if state.phase.is_loading() {
                return Err(SkipReason::Loading);
            }
            if !state.has_more {
                return Err(SkipReason::NoMorePages);
            }
            if state.stalled {
                return Err(SkipReason::Stalled);
            }
            state.error = None;
            state.phase = FeedPhase::Loading { reset: false };
            let page = state.current_page + 1;
            Ok((state.generation, state.filters.to_query(page, per_page)))
        });
        let (generation, query) = match started {
            Ok(started) => started,
            Err(reason) => return LoadOutcome::Skipped(reason),
        };

        debug!(generation, page = query.page, "loading next page");
        let result = self.inner.api.list_posts(&query).await;
        self.finish_load(generation, false, result)
    }

    fn finish_load(
        &self,
        generation: u64,
        reset: bool,
        result: FeedClientResult<PostPage>,
    ) -> LoadOutcome {
        self.update(|state| {
            if state.generation != generation {
                debug!(
                    generation,
                    current = state.generation,
                    "discarding stale page"
                );
                return LoadOutcome::Discarded;
            }

            match result {
                Ok(page) => {
                    let received = page.posts.len();
                    if reset {
                        state.posts = page.posts;
                    } else {
                        state.posts.extend(page.posts);
                    }
                    state.has_more = page.pagination.has_next;
                    state.current_page = page.pagination.page;
                    state.stalled = received == 0 && state.has_more;
                    if state.stalled {
                        warn!(page = state.current_page, "empty page with has_next, stopping");
                    }
                    state.error = None;
                    state.phase = FeedPhase::Loaded;
                    LoadOutcome::Applied { received }
                }
                Err(err) => {
                    warn!(reset, error = %err, "failed to load posts");
                    let kind = if reset {
                        state.posts.clear();
                        state.has_more = false;
                        FeedErrorKind::Load
                    } else {
                        FeedErrorKind::LoadMore
                    };
                    state.error = Some(FeedError {
                        kind,
                        message: err.to_string(),
                    });
                    state.phase = FeedPhase::Errored { reset };
                    LoadOutcome::Failed
                }
            }
        })
    }

    /// Загружает категории; ошибка не затрагивает ленту.
    pub async fn load_categories(&self) {
        let session = self.update(|state| {
            state.categories.loading = true;
            state.categories.error = None;
            state.session
        });

        let result = self.inner.api.categories().await;
        self.update(|state| {
            if state.session != session {
                return;
            }
            state.categories.loading = false;
            match result {
                Ok(items) => state.categories.items = items,
                Err(err) => {
                    warn!(error = %err, "failed to load categories");
                    state.categories.items.clear();
                    state.categories.error = Some(err.to_string());
                }
            }
        });
    }

    /// Загружает популярные теги; ошибка не затрагивает ленту.
    pub async fn load_popular_tags(&self) {
        let session = self.update(|state| {
            state.popular_tags.loading = true;
            state.popular_tags.error = None;
            state.session
        });

        let result = self.inner.api.popular_tags().await;
        self.update(|state| {
            if state.session != session {
                return;
            }
            state.popular_tags.loading = false;
            match result {
                Ok(items) => state.popular_tags.items = items,
                Err(err) => {
                    warn!(error = %err, "failed to load popular tags");
                    state.popular_tags.items.clear();
                    state.popular_tags.error = Some(err.to_string());
                }
            }
        });
    }

    /// Ставит лайк: счётчик увеличивается сразу, при ошибке сервера
    /// увеличение откатывается.
    ///
    /// Откат не делается, если список успел перезагрузиться или счётчик
    /// поста уже выставлен по ответу сервера на другой лайк.
    pub async fn like(&self, post_id: i64) -> FeedClientResult<()> {
        let started = self.update(|state| {
            let post = state.posts.iter_mut().find(|post| post.id == post_id)?;
            post.likes_count += 1;
            let syncs = state.like_syncs.get(&post_id).copied().unwrap_or(0);
            Some((state.generation, syncs))
        });

        match self.inner.api.like_post(post_id).await {
            Ok(Some(likes_count)) => {
                self.update(|state| {
                    if let Some(post) = state.posts.iter_mut().find(|post| post.id == post_id) {
                        post.likes_count = likes_count;
                        *state.like_syncs.entry(post_id).or_insert(0) += 1;
                    }
                });
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                warn!(post_id, error = %err, "like failed");
                if let Some((generation, syncs)) = started {
                    self.update(|state| {
                        let synced = state.like_syncs.get(&post_id).copied().unwrap_or(0);
                        if state.generation != generation || synced != syncs {
                            return;
                        }
                        if let Some(post) = state.posts.iter_mut().find(|post| post.id == post_id)
                        {
                            post.likes_count = post.likes_count.saturating_sub(1);
                        }
                    });
                }
                Err(err)
            }
        }
    }

    /// Удаляет пост после подтверждения. Из списка пост убирается только
    /// после успешного ответа сервера.
    pub async fn delete_post(&self, post_id: i64, confirm: &dyn Confirm) -> FeedClientResult<()> {
        if !confirm.confirm(DELETE_PROMPT) {
            return Err(FeedClientError::ConfirmationDeclined);
        }

        if let Err(err) = self.inner.api.delete_post(post_id).await {
            warn!(post_id, error = %err, "delete failed");
            return Err(err);
        }

        self.update(|state| state.posts.retain(|post| post.id != post_id));
        Ok(())
    }

    /// Ссылка на пост от origin веб-клиента.
    pub fn share_url(&self, post_id: i64) -> FeedClientResult<Url> {
        let mut url = Url::parse(&self.inner.origin).map_err(|err| {
            FeedClientError::InvalidRequest(format!("invalid origin '{}': {err}", self.inner.origin))
        })?;
        url.set_path(&format!("/posts/{post_id}"));
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    /// Кладёт ссылку на пост в буфер обмена. Сетевых запросов нет.
    pub fn share(&self, post_id: i64, clipboard: &dyn Clipboard) -> FeedClientResult<Url> {
        let url = self.share_url(post_id)?;
        clipboard
            .write_text(url.as_str())
            .map_err(FeedClientError::Clipboard)?;
        Ok(url)
    }
}
