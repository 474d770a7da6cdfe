pub mod render;

use std::{future, sync::Arc};

use anyhow::Result;
use chrono::NaiveDate;
use futures::{stream, Stream, StreamExt};

use crate::daemon::storage::{entities::SessionRecordEntity, stats_storage::StatsStorage};

pub struct ExtractConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Extracts stored [SessionRecordEntity]s between 2 dates (both inclusive).
/// Days without a session are skipped. To do it in an efficient manner
/// streams are used.
pub fn extract_sessions_between(
    storage: impl StatsStorage + Sync + Send + 'static,
    config: ExtractConfig,
) -> impl Stream<Item = Result<SessionRecordEntity>> {
    let storage = Arc::new(storage);

    let date_iteration = date_range(config.start, config.end);

    date_iteration
        .map(move |day| {
            let storage = storage.clone();
            async move { storage.load_session(day).await }
        })
        .buffered(4)
        .filter_map(|v| future::ready(v.transpose()))
}

/// Returns a stream of dates between start (inclusive) and end (inclusive).
fn date_range(start: NaiveDate, end: NaiveDate) -> impl Stream<Item = NaiveDate> {
    stream::unfold((start, end), |(mut current, end)| {
        future::ready({
            if current <= end {
                let last_current = current;
                current = current.succ_opt().expect("End of time should never happen");
                Some((last_current, (current, end)))
            } else {
                None
            }
        })
    })
}
