use serde::Serialize;

use crate::models::{SortKey, SortOrder, Visibility};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Активные фильтры ленты.
///
/// Любое изменение полей означает новый «набор фильтров»: контроллер
/// сбрасывает список и запрашивает первую страницу заново.
pub struct FilterState {
    /// Поисковая строка (уже после debounce).
    pub search: String,
    /// Категория.
    pub category: Option<String>,
    /// Видимость.
    pub visibility: Option<Visibility>,
    /// Выбранные теги в порядке выбора, без повторов.
    pub tags: Vec<String>,
    /// Поле сортировки.
    pub sort_by: SortKey,
    /// Направление сортировки.
    pub sort_order: SortOrder,
}

/// Параметры запроса `GET /api/posts`.
///
/// Пустые фильтры в запрос не попадают.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListPostsQuery {
    /// Поисковая строка.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Категория.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Видимость.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    /// Теги через запятую.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    /// Поле сортировки.
    pub sort_by: SortKey,
    /// Направление сортировки.
    pub sort_order: SortOrder,
    /// Номер страницы (с 1).
    pub page: u32,
    /// Размер страницы.
    pub per_page: u32,
}

impl FilterState {
    /// Добавляет тег, если его нет, иначе убирает. Возвращает `true`,
    /// если тег после вызова выбран.
    pub fn toggle_tag(&mut self, tag: &str) -> bool {
        if let Some(index) = self.tags.iter().position(|t| t == tag) {
            self.tags.remove(index);
            false
        } else {
            self.tags.push(tag.to_string());
            true
        }
    }

    /// Совпадает ли состояние с фильтрами по умолчанию.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Собирает параметры запроса для страницы `page`.
    pub fn to_query(&self, page: u32, per_page: u32) -> ListPostsQuery {
        let search = self.search.trim();
        ListPostsQuery {
            search: (!search.is_empty()).then(|| search.to_string()),
            category: self.category.clone(),
            visibility: self.visibility,
            tags: (!self.tags.is_empty()).then(|| self.tags.join(",")),
            sort_by: self.sort_by,
            sort_order: self.sort_order,
            page,
            per_page,
        }
    }
}

/// Пустая строка из поля ввода означает «без фильтра».
pub(crate) fn normalize_choice(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}
