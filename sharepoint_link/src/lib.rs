//! sharepoint_link - Resolve SharePoint share links and list what is behind them.
//!
//! This library provides functionality to:
//! - Authenticate against an anonymous or password-protected share link
//! - Walk the folder tree behind the link and collect every file
//! - Derive filesystem-safe local names for the files found
//! - Queue the downloads in aria2 over JSON-RPC
//!
//! # Example
//!
//! ```no_run
//! use sharepoint_link::{ResolverConfig, SessionResolver, TreeCrawler};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let resolver = SessionResolver::new(ResolverConfig::default())?;
//!     let session = resolver
//!         .resolve("https://contoso-my.sharepoint.com/:f:/g/personal/jdoe/EaBcD", None)
//!         .await?;
//!
//!     let files = TreeCrawler::new(&session)?.crawl().await?;
//!     for file in files {
//!         println!("{} -> {}", file, file.download_url());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod crawler;
pub mod error;
pub mod guest_form;
pub mod logging;
pub mod models;
pub mod rpc;
pub mod sanitize;
pub mod selection;
pub mod share_link;

// Re-exports for convenience
pub use auth::{NoPrompt, PasswordPrompt, ResolverConfig, SessionResolver};
pub use client::SharePointClient;
pub use crawler::TreeCrawler;
pub use error::{Result, ShareError};
pub use models::{FileDescriptor, ObjectType, Session};
pub use rpc::Aria2Client;
pub use sanitize::sanitize_path;
pub use share_link::ShareLink;
