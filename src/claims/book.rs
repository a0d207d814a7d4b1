// "My Claims": one list fed by two independent live subscriptions
use futures::{future, Stream, StreamExt};

use crate::claims::domain::ClaimRole;
use crate::db::models::Claim;
use crate::error::AppResult;
use crate::store::LiveQuery;

/// Merges claim snapshots arriving from the claimer side and the finder
/// side in any interleaving. One entry per id; the latest copy wins and the
/// source that fired last lists its entries last.
#[derive(Debug, Default, Clone)]
pub struct ClaimBook {
    entries: Vec<(ClaimRole, Claim)>,
}

impl ClaimBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything `source` said before with `snapshot`.
    pub fn apply(&mut self, source: ClaimRole, snapshot: Vec<Claim>) {
        self.entries.retain(|(from, claim)| {
            *from != source && !snapshot.iter().any(|fresh| fresh.id == claim.id)
        });
        self.entries
            .extend(snapshot.into_iter().map(|claim| (source, claim)));
    }

    pub fn claims(&self) -> Vec<Claim> {
        self.entries.iter().map(|(_, claim)| claim.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fold both subscriptions into a single stream of merged lists. Ends when
/// both inputs end; dropping it unsubscribes both.
pub fn merged(
    as_claimer: LiveQuery<Claim>,
    as_finder: LiveQuery<Claim>,
) -> impl Stream<Item = AppResult<Vec<Claim>>> + Send {
    let claimer = as_claimer
        .into_stream()
        .map(|snapshot| (ClaimRole::Claimer, snapshot));
    let finder = as_finder
        .into_stream()
        .map(|snapshot| (ClaimRole::Finder, snapshot));

    futures::stream::select(claimer, finder).scan(
        ClaimBook::new(),
        |book, (source, snapshot)| {
            let merged = snapshot.map(|claims| {
                book.apply(source, claims);
                book.claims()
            });
            future::ready(Some(merged))
        },
    )
}
