use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod apply;
mod cache;
mod chat;
mod cli;
mod config;
mod console;
mod deploy;
mod errors;
mod log;
mod patch;
mod prompt;
mod provider;
mod safety;
mod server;
mod store;
mod template;
mod tier;
mod tree;
mod usage;
mod ux;
mod wire;

use apply::{apply_steps, DirSandbox};
use cache::ResponseCache;
use chat::{ChatService, Turn};
use cli::{Command, ProviderKind};
use config::Config;
use console::{Console, Input};
use store::Store;
use tree::FileTree;
use usage::UsageTracker;
use wire::{ChatMessage, ChatMode, ChatReply, Conversation};

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

struct ChatOpts {
    root: PathBuf,
    provider: Option<ProviderKind>,
    language: String,
    image: Option<String>,
    summary: Option<String>,
    edit: bool,
    dry_run: bool,
    save_transcripts: bool,
    debug: bool,
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn run_chat(cfg: Config, opts: ChatOpts) -> anyhow::Result<()> {
    let provider = provider::make_provider(opts.provider.unwrap_or(cfg.provider), &cfg)?;
    let cache = ResponseCache::new(cfg.cache_capacity);
    let mut tree = FileTree::load_dir(&opts.root)?;
    let sandbox = DirSandbox::new(&opts.root, opts.dry_run);
    let mut convo = Conversation::default();
    let session = Uuid::new_v4();
    let mut image = opts.image.clone();
    let mode = if opts.edit { ChatMode::Edit } else { ChatMode::Generate };

    println!(
        "{} {} files loaded from {}{}",
        "vibe".bold(),
        tree.to_map().len(),
        opts.root.display(),
        if opts.dry_run { "  (dry run)" } else { "" }
    );
    println!("Type a request, or 'exit' to quit. Ctrl-C cancels an in-flight turn.");

    let mut console = Console::attach();
    let mut turn_no = 0usize;
    loop {
        let text = match console.ask(&"vibe>".cyan().bold().to_string()).await {
            Input::Line(text) => text,
            Input::Interrupted | Input::Closed => break,
        };
        if text.is_empty() {
            continue;
        }
        if text == "exit" || text == "quit" {
            break;
        }
        turn_no += 1;

        let turn = Turn {
            user_text: text.clone(),
            image_url: image.take(),
            project_summary: opts.summary.clone(),
            history: convo.messages().to_vec(),
            mode,
            language: opts.language.clone(),
            files: if opts.edit { tree.to_map() } else { Default::default() },
        };
        let service = ChatService::new(provider.as_ref(), &cache, &cfg);

        let pb = spinner(if convo.is_first_turn() { "generating" } else { "thinking" });
        let result = console.interruptible(service.respond(&turn)).await;
        pb.finish_and_clear();

        let outcome = match result {
            Err(_aborted) => {
                println!("{}", "cancelled; files left untouched".yellow());
                continue;
            }
            Ok(Err(e)) => {
                println!("{} {}", "error:".red().bold(), e);
                continue;
            }
            Ok(Ok(outcome)) => outcome,
        };

        if opts.debug {
            log::print_json_debug(&outcome)?;
        }
        if opts.save_transcripts {
            let saved = log::save_turn(&opts.root, session, turn_no, &outcome)?;
            if opts.debug {
                log::print_saved_paths(turn_no, &saved);
            }
        }

        match &outcome.reply {
            ChatReply::Text { response, .. } if !response.is_empty() => println!("\n{response}"),
            ChatReply::Patch { patch } => println!("\npatch with {} op(s)", patch.ops.len()),
            _ => {}
        }
        println!(
            "{} {} ({} tokens{})",
            "model:".dimmed(),
            outcome.route.model,
            outcome.tokens.total(),
            if outcome.cached { ", cached" } else { "" }
        );

        let mut user = ChatMessage::user(text);
        user.images.extend(turn.image_url.clone());
        convo.push(user);
        convo.push(ChatMessage::assistant(outcome.raw.clone(), Some(outcome.tokens)));

        if outcome.steps.is_empty() {
            continue;
        }
        ux::print_preview_dashboard(&ux::preview(&tree, &outcome.steps));
        if !opts.dry_run {
            let approved = match console.ask("Apply these changes? [y/N]:").await {
                Input::Line(answer) => ux::is_yes(&answer),
                Input::Interrupted | Input::Closed => false,
            };
            if !approved {
                println!("Skipped.");
                continue;
            }
        }
        let sum = apply_steps(&mut tree, &outcome.steps, &sandbox);
        ux::print_apply_dashboard(&sum);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_tracing(args.debug);

    let mut cfg = Config::load(args.config.as_deref().map(Path::new))?;

    match args.command {
        Command::Serve { bind, database } => {
            if let Some(bind) = bind {
                cfg.bind = bind;
            }
            if let Some(database) = database {
                cfg.database = database;
            }
            server::serve(cfg).await
        }
        Command::Chat { root, provider, language, image, summary, edit, dry_run, save_transcripts } => {
            let opts = ChatOpts {
                root: PathBuf::from(root),
                provider,
                language,
                image,
                summary,
                edit,
                dry_run,
                save_transcripts,
                debug: args.debug,
            };
            run_chat(cfg, opts).await
        }
        Command::Subscription { user, tier, database } => {
            if let Some(database) = database {
                cfg.database = database;
            }
            let store = Store::open(Path::new(&cfg.database))?;
            let summary = UsageTracker::new(Arc::new(store), &cfg).set_tier(&user, tier)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}
