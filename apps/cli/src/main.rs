use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    views::{EventCommentsView, EventDialog, EventDraft, EventListView},
    ClientSettings, EventBoard, EventsClient, Navigator, RecordingNavigator,
};
use shared::domain::{CommentId, EventId};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "events", about = "Browse and edit events and their comments")]
struct Cli {
    /// Overrides the API base url from events.toml and the environment.
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    cache_ttl_ms: Option<u64>,
    /// Skip loading the first comment page of every event on refresh.
    #[arg(long)]
    no_prefetch: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        img_link: String,
    },
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        img_link: Option<String>,
    },
    Like {
        event: String,
    },
    Comments {
        event: String,
        /// Number of pages to load.
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    Comment {
        event: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        text: String,
    },
    LikeComment {
        event: String,
        comment: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let cli = Cli::parse();

    let settings = settings_with_flags(client_core::load_settings(), &cli);
    let navigator = Arc::new(RecordingNavigator::new());
    let client = EventsClient::with_navigator(&settings, Arc::clone(&navigator) as Arc<dyn Navigator>)
        .with_context(|| format!("invalid api url '{}'", settings.api_url))?;
    let board = EventBoard::new(Arc::new(client)).with_comment_prefetch(settings.prefetch_comments);

    let outcome = run(&board, cli.command).await;
    if let Some(target) = navigator.last() {
        println!("server redirected to {target}");
    }
    outcome
}

fn settings_with_flags(mut settings: ClientSettings, cli: &Cli) -> ClientSettings {
    if let Some(api_url) = &cli.api_url {
        settings.api_url = api_url.clone();
    }
    if let Some(ttl) = cli.cache_ttl_ms {
        settings.cache_ttl_ms = ttl;
    }
    if cli.no_prefetch {
        settings.prefetch_comments = false;
    }
    settings
}

async fn run(board: &EventBoard, command: Command) -> Result<()> {
    board
        .refresh_events()
        .await
        .context("failed to load events")?;

    match command {
        Command::List => print_lines(EventListView::render(board).await),
        Command::Create {
            name,
            description,
            img_link,
        } => {
            let mut dialog = EventDialog::new();
            dialog.open_for_create();
            dialog.set_name(name);
            dialog.set_description(description);
            dialog.set_img_link(img_link);
            print_lines(dialog.render());
            if let Some(event) = dialog.save(board).await.context("failed to create event")? {
                println!("created event {}", event.uqid);
            }
        }
        Command::Update {
            id,
            name,
            description,
            img_link,
        } => {
            let event_id = EventId::new(id);
            let Some(event) = board.event(&event_id).await else {
                bail!("no event with id {event_id}");
            };
            let mut dialog = EventDialog::new();
            dialog.open_for_edit(EventDraft::from(&event));
            if let Some(name) = name {
                dialog.set_name(name);
            }
            if let Some(description) = description {
                dialog.set_description(description);
            }
            if let Some(img_link) = img_link {
                dialog.set_img_link(img_link);
            }
            print_lines(dialog.render());
            if dialog.save(board).await.context("failed to update event")?.is_some() {
                println!("updated event {event_id}");
            }
        }
        Command::Like { event } => {
            let event_id = EventId::new(event);
            board
                .like_event(&event_id)
                .await
                .context("failed to like event")?;
            if let Some(event) = board.event(&event_id).await {
                println!("{} now has {} likes", event.name, event.number_of_likes);
            }
        }
        Command::Comments { event, pages } => {
            let event_id = EventId::new(event);
            board
                .open_comments(&event_id)
                .await
                .context("failed to load comments")?;
            for _ in 1..pages {
                if !board
                    .load_more_comments()
                    .await
                    .context("failed to load more comments")?
                {
                    break;
                }
            }
            print_thread(board, &EventCommentsView::new(), &event_id).await?;
        }
        Command::Comment { event, user, text } => {
            let event_id = EventId::new(event);
            board
                .open_comments(&event_id)
                .await
                .context("failed to load comments")?;
            let mut view = EventCommentsView::new();
            view.set_author(user);
            view.set_text(text);
            view.submit(board).await.context("failed to add comment")?;
            print_thread(board, &view, &event_id).await?;
        }
        Command::LikeComment { event, comment } => {
            let event_id = EventId::new(event);
            board
                .open_comments(&event_id)
                .await
                .context("failed to load comments")?;
            let mut view = EventCommentsView::new();
            view.like(board, &CommentId::new(comment))
                .await
                .context("failed to like comment")?;
            print_thread(board, &view, &event_id).await?;
        }
    }
    Ok(())
}

async fn print_thread(board: &EventBoard, view: &EventCommentsView, event_id: &EventId) -> Result<()> {
    let Some(event) = board.event(event_id).await else {
        bail!("no event with id {event_id}");
    };
    print_lines(view.render(&event, &board.thread(event_id).await));
    Ok(())
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}
