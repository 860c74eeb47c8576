use std::fmt;

/// Источник JWT-токена для запросов к API ленты.
///
/// Токен запрашивается при каждом вызове, поэтому провайдер может отдавать
/// обновлённое значение без пересоздания клиента.
pub trait CredentialProvider: Send + Sync {
    /// Текущий токен или `None`, если пользователь не авторизован.
    fn access_token(&self) -> Option<String>;
}

/// Фиксированный токен, например прочитанный из файла при старте.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Создаёт провайдер; пробелы по краям отбрасываются.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

impl CredentialProvider for StaticToken {
    fn access_token(&self) -> Option<String> {
        (!self.0.is_empty()).then(|| self.0.clone())
    }
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn access_token(&self) -> Option<String> {
        self()
    }
}
