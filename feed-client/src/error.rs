use thiserror::Error;

#[derive(Debug, Error)]
/// Ошибки клиентской библиотеки `feed-client`.
pub enum FeedClientError {
    /// Ошибка HTTP-транспорта или декодирования ответа (`reqwest`).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Требуется авторизация (отсутствует/некорректен токен).
    #[error("unauthorized")]
    Unauthorized,

    /// Запрошенный ресурс не найден.
    #[error("not found")]
    NotFound,

    /// Сервер ответил кодом, отличным от 2xx.
    #[error("http status {status}: {message}")]
    Status {
        /// HTTP-код ответа.
        status: u16,
        /// Сообщение из тела ответа или описание кода.
        message: String,
    },

    /// Тело ответа не соответствует ожидаемому формату.
    #[error("decode error: {0}")]
    Decode(String),

    /// Некорректный запрос, сформированный на стороне клиента.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Пользователь отказался подтверждать разрушающее действие.
    #[error("confirmation declined")]
    ConfirmationDeclined,

    /// Не удалось записать ссылку в буфер обмена.
    #[error("clipboard error: {0}")]
    Clipboard(String),
}

/// Результат операций `feed-client`.
pub type FeedClientResult<T> = Result<T, FeedClientError>;

impl FeedClientError {
    pub(crate) fn from_http_status(status: reqwest::StatusCode, message: Option<String>) -> Self {
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Self::Unauthorized
            }
            reqwest::StatusCode::NOT_FOUND => Self::NotFound,
            _ => Self::Status {
                status: status.as_u16(),
                message: message.unwrap_or_else(|| format!("http status {status}")),
            },
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_http_status(status, None);
        }
        Self::Http(err)
    }

    /// Сетевая ошибка: запрос не выполнен или сервер ответил не 2xx.
    ///
    /// Локальные отказы (`ConfirmationDeclined`, `InvalidRequest`,
    /// `Clipboard`) сетевыми не считаются.
    pub fn is_network_failure(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Unauthorized | Self::NotFound | Self::Status { .. }
        )
    }

    /// Ошибку имеет смысл повторить для идемпотентного запроса.
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            Self::Http(err) => !err.is_decode() && !err.is_builder(),
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses_map_to_unauthorized() {
        let err = FeedClientError::from_http_status(reqwest::StatusCode::FORBIDDEN, None);
        assert!(matches!(err, FeedClientError::Unauthorized));
    }

    #[test]
    fn other_statuses_keep_code_and_message() {
        let err = FeedClientError::from_http_status(
            reqwest::StatusCode::BAD_GATEWAY,
            Some("upstream down".to_string()),
        );
        match err {
            FeedClientError::Status { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        let server = FeedClientError::Status {
            status: 503,
            message: String::new(),
        };
        let client = FeedClientError::Status {
            status: 422,
            message: String::new(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(!FeedClientError::NotFound.is_retryable());
    }

    #[test]
    fn local_failures_are_not_network_failures() {
        assert!(!FeedClientError::ConfirmationDeclined.is_network_failure());
        assert!(!FeedClientError::InvalidRequest("x".to_string()).is_network_failure());
        assert!(FeedClientError::NotFound.is_network_failure());
    }
}
