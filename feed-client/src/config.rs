use std::time::Duration;

/// Базовый URL backend по умолчанию.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
/// Origin веб-клиента, от которого строятся ссылки на посты.
pub const DEFAULT_ORIGIN: &str = "http://localhost:5173";
/// Размер страницы ленты.
pub const DEFAULT_PER_PAGE: u32 = 10;

#[derive(Debug, Clone)]
/// Настройки клиента ленты.
pub struct FeedConfig {
    /// Базовый URL REST API, например `http://127.0.0.1:5000`.
    pub base_url: String,
    /// Origin для ссылок «поделиться».
    pub origin: String,
    /// Размер страницы.
    pub per_page: u32,
    /// Пауза ввода, после которой поисковая строка применяется.
    pub search_debounce: Duration,
    /// Таймаут установки соединения.
    pub connect_timeout: Duration,
    /// Таймаут всего запроса.
    pub request_timeout: Duration,
    /// Сколько раз повторять GET-запросы при сетевой ошибке или 5xx.
    pub max_retries: u32,
    /// Базовая задержка перед повтором; растёт линейно с номером попытки.
    pub retry_backoff: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            per_page: DEFAULT_PER_PAGE,
            search_debounce: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(15),
            max_retries: 1,
            retry_backoff: Duration::from_millis(300),
        }
    }
}
