use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use tracing::{info, instrument};

use crate::corpus::{write_summary, JsonlWriter};
use crate::steam::{ReviewQuery, SteamClient};

/// Cursor sentinel that requests the first page
pub const INITIAL_CURSOR: &str = "*";

/// Parameters for one fetch session
#[derive(Debug, Clone)]
pub struct FetchParams {
    pub appid: u32,
    pub max_items: usize,
    pub language: String,
    /// 1 suppresses review-bomb periods, 0 includes them
    pub filter_offtopic: u8,
    pub overwrite: bool,
}

/// What a completed fetch session produced
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub corpus_path: PathBuf,
    /// Present only when the first page carried a query summary
    pub summary_path: Option<PathBuf>,
    pub total: usize,
    pub pages: usize,
}

/// Page through all reviews for an app, appending each one to the raw corpus.
///
/// The session ends cleanly on any pagination anomaly: a cursor value seen
/// before, an empty page, an empty returned cursor, a page shorter than the
/// requested size, or the item quota being reached. Each fetched record is
/// flushed to disk before the next page is requested.
#[instrument(skip(client, params, out_dir), fields(appid = params.appid))]
pub async fn fetch_all(
    client: &SteamClient,
    params: &FetchParams,
    out_dir: &Path,
) -> Result<FetchOutcome> {
    if params.max_items == 0 {
        anyhow::bail!("max_items must be greater than zero");
    }

    let corpus_path = out_dir.join(format!("reviews_{}.jsonl", params.appid));
    let summary_path = out_dir.join(format!("meta_{}.json", params.appid));

    if corpus_path.exists() && !params.overwrite {
        anyhow::bail!(
            "{} already exists — pass --overwrite to refetch",
            corpus_path.display()
        );
    }

    let query = ReviewQuery {
        language: params.language.clone(),
        filter_offtopic_activity: params.filter_offtopic,
        ..ReviewQuery::default()
    };

    let page_size = client.config().page_size as usize;
    let page_delay = Duration::from_millis(client.config().page_delay_ms);

    let mut writer = JsonlWriter::create(&corpus_path)?;
    let mut seen_cursors: HashSet<String> = HashSet::new();
    let mut cursor = INITIAL_CURSOR.to_string();
    let mut total = 0usize;
    let mut pages = 0usize;
    let mut summary_written = false;

    loop {
        if total >= params.max_items {
            info!(total, "Review quota reached");
            break;
        }
        if !seen_cursors.insert(cursor.clone()) {
            info!(%cursor, "Cursor repeated — stopping to avoid a pagination loop");
            break;
        }

        let page = client.fetch_page(params.appid, &cursor, &query).await?;
        pages += 1;

        if page.reviews.is_empty() {
            info!("No more reviews returned");
            break;
        }

        for record in &page.reviews {
            writer.append_record(record)?;
        }
        let fetched = page.reviews.len();
        total += fetched;
        info!(fetched, total, "Appended page to corpus");

        // The summary snapshot comes from the first page only
        if pages == 1 {
            if let Some(summary) = &page.query_summary {
                write_summary(&summary_path, summary)?;
                summary_written = true;
            }
        }

        cursor = page.cursor.clone();
        if cursor.is_empty() || fetched < page_size {
            info!(total, "Last page reached under current filters");
            break;
        }

        tokio::time::sleep(page_delay).await;
    }

    info!(
        total,
        pages,
        corpus = %corpus_path.display(),
        "Fetch session complete"
    );

    Ok(FetchOutcome {
        corpus_path,
        summary_path: summary_written.then_some(summary_path),
        total,
        pages,
    })
}
