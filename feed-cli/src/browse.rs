use anyhow::{Context, Result};
use feed_client::{
    FeedClientError, FeedController, FeedSnapshot, FilterState, LoadOutcome, SkipReason, SortKey,
    SortOrder, Visibility,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::render;
use crate::{StdoutClipboard, is_yes, map_client_error};

const HELP: &str = "\
Введите текст, чтобы искать по ленте (поиск применяется после паузы ввода).
Команды:
  :more                 следующая страница
  :refresh              перезагрузить ленту
  :cat [NAME]           фильтр по категории (без аргумента: все)
  :vis all|public|private
  :tag NAME             добавить или убрать тег
  :sort KEY [asc|desc]  created_at, likes_count, views_count, comments_count
  :clear                сбросить фильтры
  :like ID | :delete ID | :share ID
  :cats | :tags         категории и популярные теги
  :help | :quit";

#[derive(Debug, Clone, PartialEq)]
enum BrowseCommand {
    Search(String),
    More,
    Refresh,
    Category(Option<String>),
    Visibility(Option<Visibility>),
    Tag(String),
    Sort(SortKey, SortOrder),
    Clear,
    Like(i64),
    Delete(i64),
    Share(i64),
    Categories,
    Tags,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<BrowseCommand, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(command) = line.strip_prefix(':') else {
        return Ok(BrowseCommand::Search(line.to_string()));
    };

    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default();
    let rest: Vec<&str> = words.collect();

    let command = match (name, rest.as_slice()) {
        ("more" | "m", []) => BrowseCommand::More,
        ("refresh" | "r", []) => BrowseCommand::Refresh,
        ("clear", []) => BrowseCommand::Clear,
        ("cats", []) => BrowseCommand::Categories,
        ("tags", []) => BrowseCommand::Tags,
        ("help" | "h", []) => BrowseCommand::Help,
        ("quit" | "q", []) => BrowseCommand::Quit,
        ("cat", []) => BrowseCommand::Category(None),
        ("cat", words) => BrowseCommand::Category(Some(words.join(" "))),
        ("vis", ["all"]) => BrowseCommand::Visibility(None),
        ("vis", [value]) => BrowseCommand::Visibility(Some(value.parse()?)),
        ("tag", [tag]) => BrowseCommand::Tag((*tag).to_string()),
        ("sort", [key]) => BrowseCommand::Sort(key.parse()?, SortOrder::Desc),
        ("sort", [key, order]) => BrowseCommand::Sort(key.parse()?, order.parse()?),
        ("like", [id]) => BrowseCommand::Like(parse_id(id)?),
        ("delete", [id]) => BrowseCommand::Delete(parse_id(id)?),
        ("share", [id]) => BrowseCommand::Share(parse_id(id)?),
        _ => return Err(format!("неизвестная команда ':{command}', см. :help")),
    };
    Ok(command)
}

fn parse_id(raw: &str) -> Result<i64, String> {
    raw.parse()
        .map_err(|_| format!("ожидался id поста, получено '{raw}'"))
}

/// Что уже показано пользователю; перерисовка нужна, только если это изменилось.
#[derive(Debug, Default, PartialEq)]
struct Rendered {
    ids: Vec<i64>,
    likes: Vec<u64>,
    filters: FilterState,
    error: Option<String>,
    has_more: bool,
    stalled: bool,
}

impl Rendered {
    fn of(snapshot: &FeedSnapshot) -> Self {
        Self {
            ids: snapshot.posts.iter().map(|post| post.id).collect(),
            likes: snapshot.posts.iter().map(|post| post.likes_count).collect(),
            filters: snapshot.filters.clone(),
            error: snapshot.error.as_ref().map(|error| error.message.clone()),
            has_more: snapshot.has_more,
            stalled: snapshot.stalled,
        }
    }
}

fn redraw(snapshot: &FeedSnapshot, shown: &mut Rendered) {
    if snapshot.loading {
        return;
    }
    let next = Rendered::of(snapshot);
    if next == *shown {
        return;
    }

    let appended = next.filters == shown.filters
        && next.ids.len() > shown.ids.len()
        && next.ids.starts_with(&shown.ids);
    if appended {
        for post in &snapshot.posts[shown.ids.len()..] {
            render::print_post(post);
        }
        println!("{}", render::feed_status(snapshot));
    } else {
        render::print_feed(snapshot);
    }
    *shown = next;
}

pub async fn run(controller: FeedController) -> Result<()> {
    let mut revisions = controller.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown = Rendered::default();

    println!("{HELP}");
    controller.mount().await;
    redraw(&controller.snapshot(), &mut shown);

    loop {
        tokio::select! {
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                redraw(&controller.snapshot(), &mut shown);
            }
            line = lines.next_line() => {
                let Some(line) = line.context("не удалось прочитать stdin")? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(BrowseCommand::Quit) => break,
                    Ok(command) => {
                        if let Err(err) = execute(&controller, command, &mut lines).await {
                            eprintln!("Ошибка: {err}");
                        }
                    }
                    Err(message) => eprintln!("{message}"),
                }
            }
        }
    }

    controller.unmount();
    Ok(())
}

async fn execute(
    controller: &FeedController,
    command: BrowseCommand,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<()> {
    let outcome = match command {
        BrowseCommand::Search(text) => {
            controller.set_search_term(text);
            return Ok(());
        }
        BrowseCommand::More => controller.load_more().await,
        BrowseCommand::Refresh => controller.refresh().await,
        BrowseCommand::Category(category) => controller.set_category(category).await,
        BrowseCommand::Visibility(visibility) => controller.set_visibility(visibility).await,
        BrowseCommand::Tag(tag) => controller.toggle_tag(&tag).await,
        BrowseCommand::Sort(sort_by, sort_order) => controller.set_sort(sort_by, sort_order).await,
        BrowseCommand::Clear => controller.clear_filters().await,
        BrowseCommand::Like(id) => {
            controller.like(id).await.map_err(map_client_error)?;
            println!("Лайк поставлен: id={id}");
            return Ok(());
        }
        BrowseCommand::Delete(id) => {
            println!("Удалить пост {id}? [y/N]");
            let answer = lines
                .next_line()
                .await
                .context("не удалось прочитать stdin")?
                .unwrap_or_default();
            let accepted = is_yes(&answer);
            match controller.delete_post(id, &|_: &str| accepted).await {
                Ok(()) => println!("Пост удалён: id={id}"),
                Err(FeedClientError::ConfirmationDeclined) => println!("Удаление отменено"),
                Err(err) => return Err(map_client_error(err)),
            }
            return Ok(());
        }
        BrowseCommand::Share(id) => {
            controller
                .share(id, &StdoutClipboard)
                .map_err(map_client_error)?;
            return Ok(());
        }
        BrowseCommand::Categories => {
            let categories = controller.snapshot().categories;
            match categories.error {
                Some(error) => println!("Категории недоступны: {error}"),
                None => render::print_categories(&categories.items),
            }
            return Ok(());
        }
        BrowseCommand::Tags => {
            let tags = controller.snapshot().popular_tags;
            match tags.error {
                Some(error) => println!("Теги недоступны: {error}"),
                None => render::print_tags(&tags.items),
            }
            return Ok(());
        }
        BrowseCommand::Help => {
            println!("{HELP}");
            return Ok(());
        }
        BrowseCommand::Quit => return Ok(()),
    };

    match outcome {
        LoadOutcome::Skipped(SkipReason::Loading) => println!("Загрузка уже идёт"),
        LoadOutcome::Skipped(SkipReason::NoMorePages) => println!("Больше постов нет"),
        LoadOutcome::Skipped(SkipReason::Stalled) => {
            println!("Сервер вернул пустую страницу, догрузка остановлена; попробуйте :refresh")
        }
        LoadOutcome::Skipped(SkipReason::Unchanged) => println!("Фильтр не изменился"),
        LoadOutcome::Applied { .. } | LoadOutcome::Discarded | LoadOutcome::Failed => {}
    }
    Ok(())
}
