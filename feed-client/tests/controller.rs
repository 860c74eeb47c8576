use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use feed_client::{
    Category, Clipboard, FeedClientError, FeedClientResult, FeedConfig, FeedController,
    FeedErrorKind, FeedPhase, FilterState, ListPostsQuery, LoadOutcome, Pagination, PopularTag,
    Post, PostPage, PostsApi, SkipReason, SortKey, SortOrder, Visibility,
};

struct ScriptedPage {
    delay: Duration,
    result: Result<PostPage, u16>,
}

#[derive(Clone)]
struct FakePostsApi {
    pages: Arc<Mutex<VecDeque<ScriptedPage>>>,
    queries: Arc<Mutex<Vec<ListPostsQuery>>>,
    categories_failure: Arc<Mutex<Option<u16>>>,
    like_result: Arc<Mutex<Result<Option<u64>, u16>>>,
    scripted_likes: Arc<Mutex<VecDeque<(Duration, Result<Option<u64>, u16>)>>>,
    like_calls: Arc<Mutex<Vec<i64>>>,
    delete_failure: Arc<Mutex<Option<u16>>>,
    delete_calls: Arc<Mutex<Vec<i64>>>,
}

impl FakePostsApi {
    fn new() -> Self {
        Self {
            pages: Arc::new(Mutex::new(VecDeque::new())),
            queries: Arc::new(Mutex::new(Vec::new())),
            categories_failure: Arc::new(Mutex::new(None)),
            like_result: Arc::new(Mutex::new(Ok(None))),
            scripted_likes: Arc::new(Mutex::new(VecDeque::new())),
            like_calls: Arc::new(Mutex::new(Vec::new())),
            delete_failure: Arc::new(Mutex::new(None)),
            delete_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn push_page(&self, ids: impl IntoIterator<Item = i64>, page: u32, has_next: bool) {
        self.push_delayed_page(Duration::ZERO, ids, page, has_next);
    }

    fn push_delayed_page(
        &self,
        delay: Duration,
        ids: impl IntoIterator<Item = i64>,
        page: u32,
        has_next: bool,
    ) {
        self.pages
            .lock()
            .expect("pages mutex poisoned")
            .push_back(ScriptedPage {
                delay,
                result: Ok(post_page(ids, page, has_next)),
            });
    }

    fn push_failure(&self, status: u16) {
        self.pages
            .lock()
            .expect("pages mutex poisoned")
            .push_back(ScriptedPage {
                delay: Duration::ZERO,
                result: Err(status),
            });
    }

    fn push_like(&self, delay: Duration, result: Result<Option<u64>, u16>) {
        self.scripted_likes
            .lock()
            .expect("scripted_likes mutex poisoned")
            .push_back((delay, result));
    }

    fn queries(&self) -> Vec<ListPostsQuery> {
        self.queries.lock().expect("queries mutex poisoned").clone()
    }

    fn requested_pages(&self) -> Vec<u32> {
        self.queries().iter().map(|query| query.page).collect()
    }
}

fn status_error(status: u16) -> FeedClientError {
    FeedClientError::Status {
        status,
        message: format!("scripted failure {status}"),
    }
}

#[async_trait]
impl PostsApi for FakePostsApi {
    async fn list_posts(&self, query: &ListPostsQuery) -> FeedClientResult<PostPage> {
        self.queries
            .lock()
            .expect("queries mutex poisoned")
            .push(query.clone());
        let scripted = self
            .pages
            .lock()
            .expect("pages mutex poisoned")
            .pop_front()
            .unwrap_or(ScriptedPage {
                delay: Duration::ZERO,
                result: Ok(post_page([], query.page, false)),
            });

        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        scripted.result.map_err(status_error)
    }

    async fn categories(&self) -> FeedClientResult<Vec<Category>> {
        if let Some(status) = *self
            .categories_failure
            .lock()
            .expect("categories mutex poisoned")
        {
            return Err(status_error(status));
        }
        Ok(vec![Category {
            id: Some(1),
            name: "Engineering".to_string(),
            count: 12,
        }])
    }

    async fn popular_tags(&self) -> FeedClientResult<Vec<PopularTag>> {
        Ok(vec![PopularTag {
            name: "rust".to_string(),
            count: 5,
        }])
    }

    async fn like_post(&self, id: i64) -> FeedClientResult<Option<u64>> {
        self.like_calls
            .lock()
            .expect("like_calls mutex poisoned")
            .push(id);
        let scripted = self
            .scripted_likes
            .lock()
            .expect("scripted_likes mutex poisoned")
            .pop_front();
        if let Some((delay, result)) = scripted {
            tokio::time::sleep(delay).await;
            return result.map_err(status_error);
        }
        self.like_result
            .lock()
            .expect("like_result mutex poisoned")
            .clone()
            .map_err(status_error)
    }

    async fn delete_post(&self, id: i64) -> FeedClientResult<()> {
        self.delete_calls
            .lock()
            .expect("delete_calls mutex poisoned")
            .push(id);
        match *self
            .delete_failure
            .lock()
            .expect("delete_failure mutex poisoned")
        {
            Some(status) => Err(status_error(status)),
            None => Ok(()),
        }
    }
}

fn sample_post(id: i64) -> Post {
    Post {
        id,
        user_id: 1,
        user: None,
        content: format!("post {id}"),
        media_url: None,
        created_at: Utc
            .timestamp_opt(1_700_000_000 + id, 0)
            .single()
            .expect("valid ts"),
        likes_count: id as u64,
        views_count: 0,
        comments_count: 0,
        visibility: Some(Visibility::Public),
        category: None,
        tags: Vec::new(),
    }
}

fn post_page(ids: impl IntoIterator<Item = i64>, page: u32, has_next: bool) -> PostPage {
    let posts: Vec<Post> = ids.into_iter().map(sample_post).collect();
    PostPage {
        pagination: Pagination {
            page,
            per_page: 10,
            total: 0,
            pages: 0,
            has_next,
            has_prev: page > 1,
        },
        posts,
    }
}

fn controller(api: &FakePostsApi) -> FeedController {
    FeedController::new(Arc::new(api.clone()), &FeedConfig::default())
}

fn ids(controller: &FeedController) -> Vec<i64> {
    controller.snapshot().posts.iter().map(|post| post.id).collect()
}

/// Даёт запущенным задачам дойти до ближайшей точки ожидания.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn mount_loads_first_page_and_auxiliary_lists() {
    let api = FakePostsApi::new();
    api.push_page(1..=10, 1, true);
    let feed = controller(&api);

    assert_eq!(feed.snapshot().phase, FeedPhase::Idle);
    let outcome = feed.mount().await;

    assert_eq!(outcome, LoadOutcome::Applied { received: 10 });
    let snapshot = feed.snapshot();
    assert_eq!(snapshot.phase, FeedPhase::Loaded);
    assert_eq!(snapshot.current_page, 1);
    assert!(snapshot.has_more);
    assert_eq!(snapshot.categories.items.len(), 1);
    assert_eq!(snapshot.popular_tags.items[0].name, "rust");
    assert!(!snapshot.categories.loading);

    let query = &api.queries()[0];
    assert_eq!(query.sort_by, SortKey::CreatedAt);
    assert_eq!(query.sort_order, SortOrder::Desc);
    assert_eq!(query.per_page, 10);
}

#[tokio::test]
async fn initial_filters_are_used_by_first_load() {
    let api = FakePostsApi::new();
    api.push_page(1..=3, 1, false);
    let filters = FilterState {
        search: "tokio".to_string(),
        category: Some("Engineering".to_string()),
        ..FilterState::default()
    };
    let feed =
        FeedController::with_filters(Arc::new(api.clone()), &FeedConfig::default(), filters);

    assert_eq!(feed.snapshot().search_input, "tokio");
    feed.mount().await;

    let queries = api.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].search.as_deref(), Some("tokio"));
    assert_eq!(queries[0].category.as_deref(), Some("Engineering"));
}

#[tokio::test]
async fn three_pages_accumulate_in_server_order() {
    let api = FakePostsApi::new();
    api.push_page(1..=10, 1, true);
    api.push_page(11..=20, 2, true);
    api.push_page(21..=30, 3, false);
    let feed = controller(&api);

    feed.mount().await;
    assert_eq!(feed.load_more().await, LoadOutcome::Applied { received: 10 });
    assert_eq!(feed.load_more().await, LoadOutcome::Applied { received: 10 });

    assert_eq!(ids(&feed), (1..=30).collect::<Vec<_>>());
    let snapshot = feed.snapshot();
    assert!(!snapshot.has_more);
    assert_eq!(snapshot.current_page, 3);

    assert_eq!(
        feed.load_more().await,
        LoadOutcome::Skipped(SkipReason::NoMorePages)
    );
    assert_eq!(api.requested_pages(), vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn load_more_is_a_no_op_while_loading() {
    let api = FakePostsApi::new();
    api.push_delayed_page(Duration::from_millis(200), 1..=10, 1, true);
    let feed = controller(&api);

    let background = feed.clone();
    let first = tokio::spawn(async move { background.refresh().await });
    settle().await;

    assert!(feed.snapshot().loading);
    assert_eq!(
        feed.load_more().await,
        LoadOutcome::Skipped(SkipReason::Loading)
    );
    assert_eq!(api.queries().len(), 1);

    first.await.expect("refresh task");
    assert_eq!(ids(&feed).len(), 10);
}

#[tokio::test]
async fn load_more_is_a_no_op_without_next_page_or_before_mount() {
    let api = FakePostsApi::new();
    api.push_page(1..=4, 1, false);
    let feed = controller(&api);

    assert_eq!(
        feed.load_more().await,
        LoadOutcome::Skipped(SkipReason::NoMorePages)
    );

    feed.mount().await;
    assert_eq!(
        feed.load_more().await,
        LoadOutcome::Skipped(SkipReason::NoMorePages)
    );
    assert_eq!(api.queries().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn filter_change_clears_list_and_page_before_request() {
    let api = FakePostsApi::new();
    api.push_page(1..=10, 1, true);
    api.push_page(11..=20, 2, true);
    let feed = controller(&api);
    feed.mount().await;
    feed.load_more().await;
    assert_eq!(feed.snapshot().current_page, 2);

    api.push_delayed_page(Duration::from_millis(100), 31..=35, 1, false);
    let background = feed.clone();
    let change = tokio::spawn(async move {
        background
            .set_category(Some("Engineering".to_string()))
            .await
    });
    settle().await;

    let snapshot = feed.snapshot();
    assert!(snapshot.posts.is_empty());
    assert_eq!(snapshot.current_page, 1);
    assert_eq!(snapshot.phase, FeedPhase::Loading { reset: true });

    let query = api.queries().last().cloned().expect("query recorded");
    assert_eq!(query.page, 1);
    assert_eq!(query.category.as_deref(), Some("Engineering"));

    assert_eq!(
        change.await.expect("filter task"),
        LoadOutcome::Applied { received: 5 }
    );
    assert_eq!(ids(&feed), (31..=35).collect::<Vec<_>>());
}

#[tokio::test]
async fn every_filter_operation_reloads_from_first_page() {
    let api = FakePostsApi::new();
    let feed = controller(&api);

    api.push_page(1..=10, 1, true);
    feed.mount().await;

    let mut expected_pages = vec![1];
    for step in 0..5 {
        api.push_page(100..=101, 2, true);
        feed.load_more().await;
        expected_pages.push(2);

        api.push_page([step], 1, true);
        let outcome = match step {
            0 => feed.set_visibility(Some(Visibility::Private)).await,
            1 => feed.toggle_tag("rust").await,
            2 => feed.set_sort(SortKey::LikesCount, SortOrder::Asc).await,
            3 => feed.set_category(Some("Design".to_string())).await,
            _ => feed.clear_filters().await,
        };
        expected_pages.push(1);

        assert_eq!(outcome, LoadOutcome::Applied { received: 1 });
        assert_eq!(ids(&feed), vec![step]);
        assert_eq!(feed.snapshot().current_page, 1);
    }

    assert_eq!(api.requested_pages(), expected_pages);
    let last = api.queries().last().cloned().expect("query recorded");
    assert!(last.visibility.is_none());
    assert!(last.tags.is_none());
    assert!(last.category.is_none());
    assert_eq!(last.sort_by, SortKey::CreatedAt);
}

#[tokio::test]
async fn unchanged_filter_does_not_reload() {
    let api = FakePostsApi::new();
    let feed = controller(&api);
    feed.mount().await;

    assert_eq!(
        feed.set_category(Some("   ".to_string())).await,
        LoadOutcome::Skipped(SkipReason::Unchanged)
    );
    assert_eq!(
        feed.set_sort(SortKey::CreatedAt, SortOrder::Desc).await,
        LoadOutcome::Skipped(SkipReason::Unchanged)
    );
    assert_eq!(api.queries().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn rapid_search_input_collapses_into_one_request() {
    let api = FakePostsApi::new();
    let feed = controller(&api);
    feed.mount().await;

    for text in ["r", "re", "rea", "react"] {
        feed.set_search_term(text);
        tokio::time::sleep(Duration::from_millis(120)).await;
    }

    let snapshot = feed.snapshot();
    assert_eq!(snapshot.search_input, "react");
    assert_eq!(snapshot.filters.search, "");
    assert!(snapshot.search_pending);
    assert_eq!(api.queries().len(), 1);

    tokio::time::sleep(Duration::from_millis(600)).await;
    settle().await;

    let queries = api.queries();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[1].search.as_deref(), Some("react"));
    assert_eq!(queries[1].page, 1);
    assert_eq!(feed.snapshot().filters.search, "react");
}

#[tokio::test(start_paused = true)]
async fn settled_search_equal_to_active_does_not_reload() {
    let api = FakePostsApi::new();
    let feed = controller(&api);
    feed.mount().await;

    feed.set_search_term("react");
    tokio::time::sleep(Duration::from_millis(600)).await;
    settle().await;

    feed.set_search_term("reac");
    feed.set_search_term("react");
    tokio::time::sleep(Duration::from_millis(600)).await;
    settle().await;

    assert_eq!(api.queries().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn flush_search_applies_immediately() {
    let api = FakePostsApi::new();
    let feed = controller(&api);

    feed.set_search_term("kotlin");
    let outcome = feed.flush_search().await;
    assert_eq!(outcome, LoadOutcome::Applied { received: 0 });

    tokio::time::sleep(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(api.queries().len(), 1);
    assert_eq!(api.queries()[0].search.as_deref(), Some("kotlin"));
}

#[tokio::test(start_paused = true)]
async fn unmount_cancels_pending_search() {
    let api = FakePostsApi::new();
    let feed = controller(&api);
    feed.mount().await;

    feed.set_search_term("late");
    feed.unmount();
    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;

    assert_eq!(api.queries().len(), 1);
    let snapshot = feed.snapshot();
    assert_eq!(snapshot.phase, FeedPhase::Idle);
    assert!(!snapshot.search_pending);
    assert!(snapshot.search_input.is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropping_controller_cancels_pending_search() {
    let api = FakePostsApi::new();
    let feed = controller(&api);

    feed.set_search_term("orphan");
    drop(feed);
    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;

    assert!(api.queries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stale_slow_response_is_discarded() {
    let api = FakePostsApi::new();
    api.push_delayed_page(Duration::from_millis(300), [100], 1, false);
    api.push_delayed_page(Duration::from_millis(10), [200], 1, false);
    let feed = controller(&api);

    let background = feed.clone();
    let slow = tokio::spawn(async move { background.set_category(Some("slow".to_string())).await });
    settle().await;

    let fast = feed.set_category(Some("fast".to_string())).await;
    assert_eq!(fast, LoadOutcome::Applied { received: 1 });

    let slow = slow.await.expect("slow task");
    assert_eq!(slow, LoadOutcome::Discarded);

    let snapshot = feed.snapshot();
    assert_eq!(ids(&feed), vec![200]);
    assert_eq!(snapshot.filters.category.as_deref(), Some("fast"));
    assert_eq!(snapshot.phase, FeedPhase::Loaded);
    assert_eq!(api.queries()[0].category.as_deref(), Some("slow"));
}

#[tokio::test(start_paused = true)]
async fn load_more_in_flight_is_discarded_after_reset() {
    let api = FakePostsApi::new();
    api.push_page(1..=10, 1, true);
    let feed = controller(&api);
    feed.mount().await;

    api.push_delayed_page(Duration::from_millis(300), 11..=20, 2, true);
    api.push_page(50..=52, 1, false);

    let background = feed.clone();
    let more = tokio::spawn(async move { background.load_more().await });
    settle().await;

    feed.refresh().await;
    assert_eq!(more.await.expect("load more task"), LoadOutcome::Discarded);
    assert_eq!(ids(&feed), vec![50, 51, 52]);
    assert!(!feed.snapshot().has_more);
}

#[tokio::test]
async fn reset_failure_clears_list_and_stops_paging() {
    let api = FakePostsApi::new();
    api.push_page(1..=10, 1, true);
    api.push_failure(500);
    let feed = controller(&api);
    feed.mount().await;

    assert_eq!(feed.refresh().await, LoadOutcome::Failed);

    let snapshot = feed.snapshot();
    assert!(snapshot.posts.is_empty());
    assert!(!snapshot.has_more);
    assert_eq!(snapshot.phase, FeedPhase::Errored { reset: true });
    assert_eq!(
        snapshot.error.map(|error| error.kind),
        Some(FeedErrorKind::Load)
    );
    assert_eq!(
        feed.load_more().await,
        LoadOutcome::Skipped(SkipReason::NoMorePages)
    );
}

#[tokio::test]
async fn load_more_failure_keeps_loaded_posts_and_allows_retry() {
    let api = FakePostsApi::new();
    api.push_page(1..=10, 1, true);
    api.push_failure(503);
    api.push_page(11..=20, 2, false);
    let feed = controller(&api);
    feed.mount().await;

    assert_eq!(feed.load_more().await, LoadOutcome::Failed);
    let snapshot = feed.snapshot();
    assert_eq!(snapshot.posts.len(), 10);
    assert!(snapshot.has_more);
    assert_eq!(snapshot.phase, FeedPhase::Errored { reset: false });
    assert_eq!(
        snapshot.error.map(|error| error.kind),
        Some(FeedErrorKind::LoadMore)
    );

    assert_eq!(feed.load_more().await, LoadOutcome::Applied { received: 10 });
    assert!(feed.snapshot().error.is_none());
    assert_eq!(api.requested_pages(), vec![1, 2, 2]);
}

#[tokio::test]
async fn auxiliary_failure_does_not_touch_posts() {
    let api = FakePostsApi::new();
    *api
        .categories_failure
        .lock()
        .expect("categories mutex poisoned") = Some(500);
    api.push_page(1..=3, 1, false);
    let feed = controller(&api);

    feed.mount().await;

    let snapshot = feed.snapshot();
    assert_eq!(snapshot.posts.len(), 3);
    assert!(snapshot.error.is_none());
    assert!(snapshot.categories.error.is_some());
    assert!(snapshot.categories.items.is_empty());
    assert_eq!(snapshot.popular_tags.items.len(), 1);
}

#[tokio::test]
async fn empty_page_with_next_flag_stalls_paging() {
    let api = FakePostsApi::new();
    api.push_page(1..=10, 1, true);
    api.push_page([], 2, true);
    let feed = controller(&api);
    feed.mount().await;

    assert_eq!(feed.load_more().await, LoadOutcome::Applied { received: 0 });
    let snapshot = feed.snapshot();
    assert!(snapshot.stalled);
    assert!(snapshot.has_more);
    assert_eq!(snapshot.posts.len(), 10);

    assert_eq!(
        feed.load_more().await,
        LoadOutcome::Skipped(SkipReason::Stalled)
    );
    assert_eq!(api.queries().len(), 2);

    api.push_page(1..=10, 1, true);
    feed.refresh().await;
    assert!(!feed.snapshot().stalled);
}

#[tokio::test]
async fn like_increments_only_the_target_post() {
    let api = FakePostsApi::new();
    api.push_page(1..=5, 1, false);
    let feed = controller(&api);
    feed.mount().await;

    feed.like(3).await.expect("like succeeds");
    feed.like(5).await.expect("like succeeds");

    let likes: Vec<u64> = feed
        .snapshot()
        .posts
        .iter()
        .map(|post| post.likes_count)
        .collect();
    assert_eq!(likes, vec![1, 2, 4, 4, 6]);
    assert_eq!(
        *api.like_calls.lock().expect("like_calls mutex poisoned"),
        vec![3, 5]
    );
}

#[tokio::test]
async fn failed_like_is_rolled_back() {
    let api = FakePostsApi::new();
    api.push_page(1..=3, 1, false);
    *api.like_result.lock().expect("like_result mutex poisoned") = Err(500);
    let feed = controller(&api);
    feed.mount().await;

    let result = feed.like(2).await;
    assert!(matches!(result, Err(FeedClientError::Status { status: 500, .. })));
    assert_eq!(feed.snapshot().posts[1].likes_count, 2);
}

#[tokio::test(start_paused = true)]
async fn late_like_failure_keeps_count_reported_by_server() {
    let api = FakePostsApi::new();
    api.push_page(1..=3, 1, false);
    api.push_like(Duration::from_millis(100), Err(503));
    api.push_like(Duration::ZERO, Ok(Some(3)));
    let feed = controller(&api);
    feed.mount().await;

    let background = feed.clone();
    let slow = tokio::spawn(async move { background.like(2).await });
    settle().await;
    assert_eq!(feed.snapshot().posts[1].likes_count, 3);

    feed.like(2).await.expect("second like succeeds");
    assert_eq!(feed.snapshot().posts[1].likes_count, 3);

    tokio::time::sleep(Duration::from_millis(150)).await;
    let failed = slow.await.expect("like task");
    assert!(failed.is_err());
    assert_eq!(feed.snapshot().posts[1].likes_count, 3);
}

#[tokio::test(start_paused = true)]
async fn concurrent_failed_likes_each_roll_back() {
    let api = FakePostsApi::new();
    api.push_page(1..=3, 1, false);
    api.push_like(Duration::from_millis(100), Err(500));
    api.push_like(Duration::from_millis(50), Err(500));
    let feed = controller(&api);
    feed.mount().await;

    let background = feed.clone();
    let first = tokio::spawn(async move { background.like(2).await });
    settle().await;
    let second = feed.like(2).await;

    assert!(second.is_err());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(first.await.expect("like task").is_err());
    assert_eq!(feed.snapshot().posts[1].likes_count, 2);
}

#[tokio::test]
async fn like_takes_server_count_when_reported() {
    let api = FakePostsApi::new();
    api.push_page(1..=3, 1, false);
    *api.like_result.lock().expect("like_result mutex poisoned") = Ok(Some(40));
    let feed = controller(&api);
    feed.mount().await;

    feed.like(1).await.expect("like succeeds");
    assert_eq!(feed.snapshot().posts[0].likes_count, 40);
}

#[tokio::test]
async fn delete_removes_exactly_one_post_and_keeps_order() {
    let api = FakePostsApi::new();
    api.push_page(1..=5, 1, false);
    let feed = controller(&api);
    feed.mount().await;

    feed.delete_post(3, &|_: &str| true)
        .await
        .expect("delete succeeds");
    assert_eq!(ids(&feed), vec![1, 2, 4, 5]);

    feed.delete_post(99, &|_: &str| true)
        .await
        .expect("delete of unknown id succeeds on server");
    assert_eq!(ids(&feed), vec![1, 2, 4, 5]);
    assert_eq!(
        *api.delete_calls.lock().expect("delete_calls mutex poisoned"),
        vec![3, 99]
    );
}

#[tokio::test]
async fn declined_delete_sends_nothing() {
    let api = FakePostsApi::new();
    api.push_page(1..=2, 1, false);
    let feed = controller(&api);
    feed.mount().await;

    let result = feed.delete_post(1, &|_: &str| false).await;
    assert!(matches!(result, Err(FeedClientError::ConfirmationDeclined)));
    assert!(
        api.delete_calls
            .lock()
            .expect("delete_calls mutex poisoned")
            .is_empty()
    );
    assert_eq!(ids(&feed), vec![1, 2]);
}

#[tokio::test]
async fn failed_delete_keeps_post() {
    let api = FakePostsApi::new();
    api.push_page(1..=2, 1, false);
    *api
        .delete_failure
        .lock()
        .expect("delete_failure mutex poisoned") = Some(403);
    let feed = controller(&api);
    feed.mount().await;

    let result = feed.delete_post(1, &|_: &str| true).await;
    assert!(result.is_err());
    assert_eq!(ids(&feed), vec![1, 2]);
}

struct RecordingClipboard {
    written: RefCell<Vec<String>>,
}

impl Clipboard for RecordingClipboard {
    fn write_text(&self, text: &str) -> Result<(), String> {
        self.written.borrow_mut().push(text.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn share_copies_canonical_url_without_requests() {
    let api = FakePostsApi::new();
    let config = FeedConfig {
        origin: "https://prok.example.com/".to_string(),
        ..FeedConfig::default()
    };
    let feed = FeedController::new(Arc::new(api.clone()), &config);
    let clipboard = RecordingClipboard {
        written: RefCell::new(Vec::new()),
    };

    let url = feed.share(42, &clipboard).expect("share succeeds");

    assert_eq!(url.as_str(), "https://prok.example.com/posts/42");
    assert_eq!(
        clipboard.written.borrow().as_slice(),
        ["https://prok.example.com/posts/42"]
    );
    assert!(api.queries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unmount_discards_page_in_flight() {
    let api = FakePostsApi::new();
    api.push_delayed_page(Duration::from_millis(100), 1..=10, 1, true);
    let feed = controller(&api);

    let background = feed.clone();
    let mount = tokio::spawn(async move { background.refresh().await });
    settle().await;
    feed.unmount();

    assert_eq!(mount.await.expect("mount task"), LoadOutcome::Discarded);
    let snapshot = feed.snapshot();
    assert_eq!(snapshot.phase, FeedPhase::Idle);
    assert!(snapshot.posts.is_empty());
}

#[tokio::test]
async fn subscribers_see_revisions_on_change() {
    let api = FakePostsApi::new();
    api.push_page(1..=2, 1, false);
    let feed = controller(&api);
    let mut revisions = feed.subscribe();
    let before = *revisions.borrow_and_update();

    feed.mount().await;

    assert!(revisions.has_changed().expect("sender alive"));
    assert!(*revisions.borrow_and_update() > before);
}
