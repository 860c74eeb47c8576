mod browse;
mod logging;
mod render;
mod settings;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use feed_client::{
    Clipboard, CredentialProvider, FeedClientError, FeedConfig, FeedController, FeedErrorKind,
    FeedSnapshot, FilterState, HttpPostsApi, LoadOutcome, PostsApi, SortKey, SortOrder,
    StaticToken, Visibility,
};
use tracing::debug;

use crate::settings::Settings;

const TOKEN_FILE: &str = ".feed_token";

#[derive(Debug, Parser)]
#[command(name = "feed-cli", version, about = "CLI клиент ленты постов")]
struct Cli {
    /// Адрес backend (по умолчанию FEED_API_URL или http://127.0.0.1:5000).
    #[arg(long, global = true)]
    server: Option<String>,

    /// Origin веб-клиента для ссылок на посты (по умолчанию FEED_ORIGIN).
    #[arg(long, global = true)]
    origin: Option<String>,

    /// Печатать результат в JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Вход пользователя; токен сохраняется в .feed_token.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Регистрация пользователя (после неё нужен `login`).
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Удаление сохранённого токена.
    Logout,
    /// Публикация поста (требует токен).
    Create {
        #[arg(long)]
        content: String,
        /// Картинка или видео: png, jpg, jpeg, gif, mp4, mov, avi, webm.
        #[arg(long)]
        media: Option<PathBuf>,
    },
    /// Лента постов с фильтрами.
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// public или private; без флага показываются все посты.
        #[arg(long)]
        visibility: Option<Visibility>,
        /// Тег; флаг можно повторять.
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, default_value_t = SortKey::CreatedAt)]
        sort_by: SortKey,
        #[arg(long, default_value_t = SortOrder::Desc)]
        sort_order: SortOrder,
        /// Сколько страниц загрузить подряд.
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Категории с количеством постов.
    Categories,
    /// Популярные теги.
    Tags,
    /// Лайк поста (требует токен).
    Like {
        #[arg(long)]
        id: i64,
    },
    /// Удаление поста (требует токен).
    Delete {
        #[arg(long)]
        id: i64,
        /// Не спрашивать подтверждение.
        #[arg(long)]
        yes: bool,
    },
    /// Ссылка на пост.
    Share {
        #[arg(long)]
        id: i64,
    },
    /// Интерактивный просмотр ленты.
    Browse,
}

/// «Буфер обмена» терминала: ссылка печатается в stdout.
pub(crate) struct StdoutClipboard;

impl Clipboard for StdoutClipboard {
    fn write_text(&self, text: &str) -> Result<(), String> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{text}").map_err(|err| err.to_string())
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Ошибка: {err}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::from_env()?;
    logging::init_logging(&settings.log_level)?;
    let config = resolve_config(&settings, cli.server, cli.origin);
    debug!(base_url = %config.base_url, "feed-cli started");

    let token = load_token().context("не удалось прочитать .feed_token")?;
    let credentials: Arc<dyn CredentialProvider> = match token {
        Some(token) => Arc::new(StaticToken::new(token)),
        None => Arc::new(|| -> Option<String> { None }),
    };
    let api = HttpPostsApi::new(&config, credentials).map_err(map_client_error)?;

    match cli.command {
        Command::Login { username, password } => {
            let auth = api
                .login(&username, &password)
                .await
                .map_err(map_client_error)?;
            persist_token(&auth.access_token).context("не удалось сохранить токен")?;
            if cli.json {
                print_json(&auth.user)?;
            } else {
                render::print_auth("Вход выполнен", &auth);
            }
        }
        Command::Signup {
            username,
            email,
            password,
        } => {
            let message = api
                .signup(&username, &email, &password)
                .await
                .map_err(map_client_error)?;
            if cli.json {
                print_json(&serde_json::json!({ "message": message }))?;
            } else {
                println!("Регистрация успешна: {message}");
                println!("Теперь выполните `feed-cli login --username {username} --password ...`");
            }
        }
        Command::Create { content, media } => {
            let post = api
                .create_post(&content, media.as_deref())
                .await
                .map_err(map_client_error)?;
            if cli.json {
                print_json(&post)?;
            } else {
                println!("Пост создан");
                render::print_post(&post);
            }
        }
        Command::Logout => {
            if Path::new(TOKEN_FILE).exists() {
                fs::remove_file(TOKEN_FILE).context("не удалось удалить .feed_token")?;
            }
            println!("Токен удалён");
        }
        Command::List {
            search,
            category,
            visibility,
            tags,
            sort_by,
            sort_order,
            pages,
        } => {
            let mut filters = FilterState {
                search: search.unwrap_or_default(),
                category,
                visibility,
                sort_by,
                sort_order,
                ..FilterState::default()
            };
            for tag in &tags {
                if !filters.tags.iter().any(|selected| selected == tag) {
                    filters.toggle_tag(tag);
                }
            }

            let controller = FeedController::with_filters(Arc::new(api), &config, filters);
            let snapshot = load_pages(&controller, pages).await?;
            if let Some(error) = &snapshot.error {
                eprintln!("Предупреждение: не удалось догрузить ленту: {}", error.message);
            }
            if cli.json {
                print_json(&snapshot.posts)?;
            } else {
                render::print_feed(&snapshot);
            }
        }
        Command::Categories => {
            let categories = api.categories().await.map_err(map_client_error)?;
            if cli.json {
                print_json(&categories)?;
            } else {
                render::print_categories(&categories);
            }
        }
        Command::Tags => {
            let tags = api.popular_tags().await.map_err(map_client_error)?;
            if cli.json {
                print_json(&tags)?;
            } else {
                render::print_tags(&tags);
            }
        }
        Command::Like { id } => {
            let likes_count = api.like_post(id).await.map_err(map_client_error)?;
            if cli.json {
                print_json(&serde_json::json!({ "id": id, "likes_count": likes_count }))?;
            } else {
                match likes_count {
                    Some(count) => println!("Лайк поставлен: id={id}, лайков: {count}"),
                    None => println!("Лайк поставлен: id={id}"),
                }
            }
        }
        Command::Delete { id, yes } => {
            let controller = FeedController::new(Arc::new(api), &config);
            let result = if yes {
                controller.delete_post(id, &assume_yes).await
            } else {
                controller.delete_post(id, &ask_stdin).await
            };
            match result {
                Ok(()) => println!("Пост удалён: id={id}"),
                Err(FeedClientError::ConfirmationDeclined) => println!("Удаление отменено"),
                Err(err) => return Err(map_client_error(err)),
            }
        }
        Command::Share { id } => {
            let controller = FeedController::new(Arc::new(api), &config);
            if cli.json {
                let url = controller.share_url(id).map_err(map_client_error)?;
                print_json(&serde_json::json!({ "id": id, "url": url.as_str() }))?;
            } else {
                controller
                    .share(id, &StdoutClipboard)
                    .map_err(map_client_error)?;
            }
        }
        Command::Browse => {
            let controller = FeedController::new(Arc::new(api), &config);
            browse::run(controller).await?;
        }
    }

    Ok(())
}

/// Загружает первую страницу и догружает ещё `pages - 1`. Ошибка первой
/// страницы возвращается как ошибка; ошибка догрузки остаётся в снимке
/// вместе с уже загруженными постами.
async fn load_pages(controller: &FeedController, pages: u32) -> Result<FeedSnapshot> {
    let mut outcome = controller.refresh().await;
    for _ in 1..pages {
        if !matches!(outcome, LoadOutcome::Applied { .. }) {
            break;
        }
        outcome = controller.load_more().await;
    }

    let snapshot = controller.snapshot();
    let first_page_failed = snapshot
        .error
        .as_ref()
        .filter(|error| error.kind == FeedErrorKind::Load);
    if let Some(error) = first_page_failed {
        return Err(anyhow!("{}", error.message));
    }
    Ok(snapshot)
}

fn resolve_config(
    settings: &Settings,
    server: Option<String>,
    origin: Option<String>,
) -> FeedConfig {
    let mut config = settings.feed_config();
    config.base_url = normalize_server(server.unwrap_or(config.base_url));
    config.origin = normalize_server(origin.unwrap_or(config.origin));
    config
}

fn normalize_server(server: String) -> String {
    if server.starts_with("http://") || server.starts_with("https://") {
        return server;
    }

    format!("http://{server}")
}

fn parse_token_content(raw: &str) -> Option<String> {
    let token = raw.trim().to_string();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn load_token() -> io::Result<Option<String>> {
    if !Path::new(TOKEN_FILE).exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(TOKEN_FILE)?;
    Ok(parse_token_content(&raw))
}

fn persist_token(token: &str) -> io::Result<()> {
    fs::write(TOKEN_FILE, token)
}

pub(crate) fn is_yes(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes" | "д" | "да"
    )
}

fn assume_yes(_prompt: &str) -> bool {
    true
}

fn ask_stdin(prompt: &str) -> bool {
    print!("{prompt} [y/N]: ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(_) => false,
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("не удалось сериализовать ответ")?;
    println!("{text}");
    Ok(())
}

pub(crate) fn map_client_error(err: FeedClientError) -> anyhow::Error {
    let message = match err {
        FeedClientError::Unauthorized => {
            "требуется авторизация: выполните `feed-cli login ...`".to_string()
        }
        FeedClientError::NotFound => "пост не найден".to_string(),
        FeedClientError::Status { status, message } => {
            format!("сервер ответил {status}: {message}")
        }
        FeedClientError::Decode(message) => format!("некорректный ответ сервера: {message}"),
        FeedClientError::InvalidRequest(message) => format!("некорректный запрос: {message}"),
        FeedClientError::ConfirmationDeclined => "действие отменено".to_string(),
        FeedClientError::Clipboard(message) => format!("не удалось скопировать ссылку: {message}"),
        FeedClientError::Http(err) => format!("ошибка HTTP: {err}"),
    };
    anyhow!(message)
}
