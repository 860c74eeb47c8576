use std::collections::HashSet;

use feed_client::{AuthResponse, Category, FeedSnapshot, MediaKind, PopularTag, Post};

const EXCERPT_LEN: usize = 80;

pub fn print_auth(title: &str, auth: &AuthResponse) {
    println!("{title}");
    println!("user:");
    println!("  id: {}", auth.user.id);
    println!("  username: {}", auth.user.username);
    if let Some(email) = &auth.user.email {
        println!("  email: {email}");
    }
}

pub fn print_post(post: &Post) {
    let mut line = format!(
        "- [{}] {} · {} · ♥ {} · 👁 {} · 💬 {}",
        post.id,
        post.author_name(),
        post.created_at.format("%Y-%m-%d %H:%M"),
        post.likes_count,
        post.views_count,
        post.comments_count
    );
    if let Some(category) = &post.category {
        line.push_str(&format!(" · {category}"));
    }
    println!("{line}");

    let text = excerpt(&post.content, EXCERPT_LEN);
    if !text.is_empty() {
        println!("    {text}");
    }
    if let (Some(kind), Some(url)) = (post.media_kind(), post.media_url.as_deref()) {
        let label = match kind {
            MediaKind::Image => "изображение",
            MediaKind::Video => "видео",
        };
        println!("    [{label}] {url}");
    }
    if !post.tags.is_empty() {
        let tags: Vec<String> = post.tags.iter().map(|tag| format!("#{tag}")).collect();
        println!("    {}", tags.join(" "));
    }
}

pub fn print_feed(snapshot: &FeedSnapshot) {
    for post in &snapshot.posts {
        print_post(post);
    }
    println!("{}", feed_status(snapshot));
}

/// Однострочная сводка: сколько постов, фильтры и есть ли продолжение.
pub fn feed_status(snapshot: &FeedSnapshot) -> String {
    let mut parts = vec![format!(
        "Постов: {} (страница {})",
        snapshot.posts.len(),
        snapshot.current_page
    )];

    let filters = &snapshot.filters;
    if !filters.search.is_empty() {
        parts.push(format!("поиск «{}»", filters.search));
    }
    if let Some(category) = &filters.category {
        parts.push(format!("категория {category}"));
    }
    if let Some(visibility) = filters.visibility {
        parts.push(format!("видимость {visibility}"));
    }
    if !filters.tags.is_empty() {
        parts.push(format!("теги {}", filters.tags.join(",")));
    }
    parts.push(format!("сортировка {} {}", filters.sort_by, filters.sort_order));

    if let Some(error) = &snapshot.error {
        parts.push(format!("ошибка: {}", error.message));
    } else if snapshot.stalled {
        parts.push("сервер вернул пустую страницу, догрузка остановлена".to_string());
    } else if snapshot.has_more {
        parts.push("есть ещё".to_string());
    } else if snapshot.posts.is_empty() {
        parts.push("ничего не найдено".to_string());
    } else {
        parts.push("конец ленты".to_string());
    }

    parts.join(" · ")
}

pub fn print_categories(categories: &[Category]) {
    println!("Категорий: {}", categories.len());
    for category in categories {
        println!("- {} ({})", category.name, category.count);
    }
}

pub fn print_tags(tags: &[PopularTag]) {
    println!("Популярных тегов: {}", tags.len());
    for tag in tags {
        println!("- #{} ({})", tag.name, tag.count);
    }
}

/// Текст поста без разметки, обрезанный до `max_chars` символов.
///
/// Разметку разбирает ammonia без разрешённых тегов: остаётся только текст,
/// содержимое `script`/`style` выбрасывается.
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let cleaned = ammonia::Builder::empty()
        .clean_content_tags(HashSet::from(["script", "style"]))
        .clean(content)
        .to_string();
    let plain = unescape_text(&cleaned);

    let collapsed = plain.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

/// Обратное к экранированию текстовых узлов при сериализации HTML:
/// сериализатор экранирует только `&`, `<`, `>` и неразрывный пробел.
fn unescape_text(escaped: &str) -> String {
    escaped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}
