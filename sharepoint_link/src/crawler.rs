//! Breadth-first listing of every file below a share link.

use std::collections::VecDeque;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::SharePointClient;
use crate::error::{Result, ShareError};
use crate::models::{FileDescriptor, RemoteNode, Session};

/// Walks the tree behind a [`Session`].
pub struct TreeCrawler {
    client: SharePointClient,
    root_id: String,
    root_is_file: bool,
}

impl TreeCrawler {
    pub fn new(session: &Session) -> Result<Self> {
        Ok(Self {
            client: SharePointClient::from_session(session)?,
            root_id: session.root_id().to_string(),
            root_is_file: session.root_is_file(),
        })
    }

    /// List every file reachable from the root, in discovery order.
    pub async fn crawl(&self) -> Result<Vec<FileDescriptor>> {
        self.crawl_until_cancelled(&CancellationToken::new()).await
    }

    /// Like [`crawl`](Self::crawl), checking `cancel` before each folder.
    pub async fn crawl_until_cancelled(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileDescriptor>> {
        if self.root_is_file {
            // A file root has no folder to walk.
            let entry = self.client.get_file(&self.root_id).await?;
            info!(
                "File UID={} Name={} Rel={}",
                entry.unique_id, entry.name, entry.server_relative_url
            );
            return Ok(vec![FileDescriptor::from_entry(
                &entry,
                self.client.api_base(),
            )?]);
        }

        let mut queue: VecDeque<String> = VecDeque::from([self.root_id.clone()]);
        let mut files = Vec::new();

        while let Some(folder_id) = queue.pop_front() {
            if cancel.is_cancelled() {
                return Err(ShareError::Cancelled);
            }

            let folder = self.client.get_folder(&folder_id).await?;
            info!("Scanning {}", folder.server_relative_url);

            for node in self.client.list_children(&folder_id).await? {
                match node {
                    RemoteNode::Folder(sub) => queue.push_back(sub.unique_id),
                    RemoteNode::File(entry) => {
                        debug!(
                            "  Found file {} UID={}",
                            entry.server_relative_url, entry.unique_id
                        );
                        files.push(FileDescriptor::from_entry(&entry, self.client.api_base())?);
                    }
                }
            }
        }

        info!("Found {} files", files.len());
        Ok(files)
    }
}
