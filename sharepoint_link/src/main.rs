//! sharepoint_link CLI - Queue every file behind a SharePoint share link in aria2.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{Input, Password};
use tokio_util::sync::CancellationToken;

use sharepoint_link::logging::init_logging;
use sharepoint_link::rpc::DEFAULT_RPC_URL;
use sharepoint_link::selection::{parse_selection, Selection};
use sharepoint_link::{
    Aria2Client, FileDescriptor, PasswordPrompt, ResolverConfig, SessionResolver, TreeCrawler,
};

/// Resolve a SharePoint share link and send its files to aria2.
#[derive(Parser)]
#[command(name = "sharepoint_link")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Share link, e.g. https://<tenant>.sharepoint.com/:f:/g/personal/...
    share_link: String,

    /// Share link password (prompted for when needed and not given).
    #[arg(env = "SHAREPOINT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// aria2 RPC URL.
    #[arg(long, env = "ARIA2_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,

    /// aria2 RPC secret.
    #[arg(long, env = "ARIA2_RPC_SECRET", default_value = "", hide_env_values = true)]
    rpc_secret: String,

    /// Interactively prompt for files to download.
    #[arg(long)]
    select_files: bool,

    /// Download directory passed to aria2 (aria2's own default otherwise).
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Recreate the remote folder structure below --dir.
    #[arg(long, requires = "dir")]
    keep_tree: bool,

    /// Only list the files; do not contact aria2.
    #[arg(long)]
    list_only: bool,

    /// Debug logging for this tool (RUST_LOG overrides).
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// Asks for the share link password on the terminal.
struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
    fn prompt_password(&self, share_link: &str) -> Option<String> {
        Password::new()
            .with_prompt(format!("Password for {}", share_link))
            .allow_empty_password(true)
            .interact()
            .ok()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let aria2 = if cli.list_only {
        None
    } else {
        let aria2 = Aria2Client::new(&cli.rpc_url, &cli.rpc_secret)?;
        aria2
            .ping()
            .await
            .with_context(|| format!("aria2 RPC not reachable at {}", aria2.endpoint()))?;
        Some(aria2)
    };

    let resolver = SessionResolver::with_prompt(ResolverConfig::default(), Box::new(TerminalPrompt))?;
    let session = resolver
        .resolve(&cli.share_link, cli.password.as_deref())
        .await
        .with_context(|| format!("Failed to resolve share link: {}", cli.share_link))?;

    println!("Api:      {}", session.api_base());
    println!("Cookie:   FedAuth={}", session.fedauth());
    println!("UniqueId: {}", session.root_id());
    println!("Type:     {}", session.root_type());

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let mut files = TreeCrawler::new(&session)?
        .crawl_until_cancelled(&cancel)
        .await
        .context("Failed to list files")?;
    files.sort_by_key(FileDescriptor::remote_path);

    if files.is_empty() {
        println!("No files found.");
        return Ok(());
    }

    println!("\nFound {} files:", files.len());
    for (idx, file) in files.iter().enumerate() {
        println!("[{:>3}] {}", idx, file);
    }

    let Some(aria2) = aria2 else {
        return Ok(());
    };

    let selected = if cli.select_files {
        match prompt_selection(files.len())? {
            Some(selected) => selected,
            None => return Ok(()),
        }
    } else {
        BTreeSet::new()
    };
    let selected: Vec<usize> = if selected.is_empty() {
        println!("Selecting all files for download ...");
        (0..files.len()).collect()
    } else {
        selected.into_iter().collect()
    };

    println!("Adding tasks:");
    let cookies = session.cookies();
    for idx in selected {
        let file = &files[idx];
        let safe_path = file
            .safe_path()
            .with_context(|| format!("Cannot derive a local name for {}", file.remote_path()))?;
        let dir = cli.dir.as_ref().map(|base| {
            let mut dir = base.clone();
            if cli.keep_tree {
                dir.extend(&safe_path[..safe_path.len() - 1]);
            }
            dir.to_string_lossy().into_owned()
        });

        let gid = aria2
            .add_uri(
                file.download_url(),
                safe_path.last().map(String::as_str),
                dir.as_deref(),
                &cookies,
            )
            .await
            .with_context(|| format!("Failed to queue {}", file.remote_path()))?;

        match gid {
            Some(_) => println!("OK   [{:>3}] {}", idx, file.remote_path()),
            None => println!("FAIL [{:>3}] {}", idx, file.remote_path()),
        }
    }

    Ok(())
}

/// Ask until the input parses. `None` means the user chose to exit; an empty
/// set means everything.
fn prompt_selection(count: usize) -> Result<Option<BTreeSet<usize>>> {
    loop {
        let input: String = Input::new()
            .with_prompt("Select files for download (e.g. 1,3,5-7 or all or exit)")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read selection")?;

        match parse_selection(&input, count) {
            Ok(Selection::Exit) => return Ok(None),
            Ok(Selection::Empty) => continue,
            Ok(Selection::All) => return Ok(Some(BTreeSet::new())),
            Ok(Selection::Indices(selected)) => return Ok(Some(selected)),
            Err(e) => eprintln!("{}", e),
        }
    }
}
