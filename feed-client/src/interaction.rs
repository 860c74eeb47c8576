/// Подтверждение разрушающего действия (аналог диалога «да/нет»).
pub trait Confirm {
    /// Возвращает `true`, если пользователь согласился.
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Буфер обмена, куда кладётся ссылка на пост.
pub trait Clipboard {
    /// Записывает текст; ошибка возвращается строкой для показа пользователю.
    fn write_text(&self, text: &str) -> Result<(), String>;
}
