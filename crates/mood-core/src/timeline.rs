//! Mood timelines: bounded and unbounded per-uploader views, the global feed,
//! and the create/delete mutations.

use mood_types::documents::{Direction, Query};
use mood_types::models::{Mood, MoodDraft, UserProfile, Username};
use mood_types::remote::DocumentStore;
use tracing::{info, warn};

use crate::error::{Result, SyncError};
use crate::session::{MOODS, Session};
use crate::state::View;

fn by_uploader(uploader: &Username) -> Query {
    Query::collection(MOODS)
        .where_eq("uploader", uploader.as_str())
        .order_by("timestamp", Direction::Descending)
}

impl<S: DocumentStore, O, M> Session<S, O, M> {
    /// The `limit` most recent moods of `uploader`, newest first. Malformed
    /// documents do not count towards `limit`.
    pub async fn fetch_latest(&self, uploader: &Username, limit: usize) -> Result<Vec<Mood>> {
        if limit == 0 {
            return Ok(vec![]);
        }
        let mut want = limit;
        loop {
            let (mut moods, fetched) = self.query_moods(by_uploader(uploader).limit(want)).await?;
            if moods.len() >= limit || fetched < want {
                moods.truncate(limit);
                return Ok(moods);
            }
            // ask again past the skipped documents
            want += fetched - moods.len();
        }
    }

    /// Every mood of `uploader`, newest first.
    pub async fn fetch_all(&self, uploader: &Username) -> Result<Vec<Mood>> {
        Ok(self.query_moods(by_uploader(uploader)).await?.0)
    }

    /// Every mood of every uploader, newest first.
    pub async fn fetch_global(&self) -> Result<Vec<Mood>> {
        let query = Query::collection(MOODS).order_by("timestamp", Direction::Descending);
        Ok(self.query_moods(query).await?.0)
    }

    /// Decoded moods plus the number of documents the store returned.
    async fn query_moods(&self, query: Query) -> Result<(Vec<Mood>, usize)> {
        let docs = self
            .timed("fetch moods", self.store.query(&query))
            .await
            .map_err(SyncError::transport)?;

        let fetched = docs.len();
        let moods = docs
            .into_iter()
            .filter_map(|doc| {
                let id = doc.id.clone();
                Mood::from_document(doc)
                    .map_err(|e| warn!("Skipping malformed mood {}: {}", id, e))
                    .ok()
            })
            .collect();
        Ok((moods, fetched))
    }

    /// Refresh the bounded views of the caller and their partner. The partner
    /// is whoever `resolve_partner` pairs the caller with; without one the
    /// partner view is empty. Both views land independently.
    pub async fn refresh_overview(&self) -> Result<()> {
        let profile = self.load_profile().await?;
        let limit = self.config.latest_limit;

        let own_ticket = self.state.issue();
        let partner_ticket = self.state.issue();

        let (own, partner) = tokio::join!(self.fetch_latest(&profile.username, limit), async {
            match self.partner_profile(&profile).await? {
                Some(partner) => self.fetch_latest(&partner.username, limit).await,
                None => Ok(vec![]),
            }
        });

        // Land whichever succeeded before reporting a failure.
        let own = own.map(|moods| self.state.apply_moods(View::OwnLatest, own_ticket, moods));
        let partner =
            partner.map(|moods| self.state.apply_moods(View::PartnerLatest, partner_ticket, moods));
        own?;
        partner?;
        Ok(())
    }

    /// Load the full timeline of `uploader` into the expanded view.
    pub async fn expand(&self, uploader: &Username) -> Result<()> {
        let ticket = self.state.issue();
        let moods = self.fetch_all(uploader).await?;
        self.state.apply_expanded(ticket, uploader.clone(), moods);
        Ok(())
    }

    /// Load the global feed.
    pub async fn refresh_feed(&self) -> Result<()> {
        let ticket = self.state.issue();
        let moods = self.fetch_global().await?;
        self.state.apply_moods(View::Feed, ticket, moods);
        Ok(())
    }

    async fn refresh_own_latest(&self, username: &Username) -> Result<()> {
        let ticket = self.state.issue();
        let moods = self.fetch_latest(username, self.config.latest_limit).await?;
        self.state.apply_moods(View::OwnLatest, ticket, moods);
        Ok(())
    }

    /// Post a mood as the caller, exactly as drafted.
    pub async fn create_mood(&self, draft: MoodDraft) -> Result<Mood> {
        self.validate_draft(&draft)?;
        let profile = self.load_profile().await?;
        self.create_as(&profile, draft).await
    }

    pub(crate) fn validate_draft(&self, draft: &MoodDraft) -> Result<()> {
        if draft.caption.trim().is_empty() {
            return Err(SyncError::InvalidInput("Caption must not be empty".into()));
        }
        if !self.config.in_palette(&draft.emoji) {
            return Err(SyncError::InvalidInput(format!(
                "{} is not one of the mood emojis",
                draft.emoji
            )));
        }
        Ok(())
    }

    /// Write the mood, then refresh the caller's bounded view. Nothing is
    /// inserted locally before the store confirms the write.
    pub(crate) async fn create_as(&self, profile: &UserProfile, draft: MoodDraft) -> Result<Mood> {
        let fields = draft.into_fields(&profile.username);
        let doc = self
            .timed("create mood", self.store.add(MOODS, fields))
            .await
            .map_err(SyncError::write)?;

        let id = doc.id.clone();
        let mood = Mood::from_document(doc)
            .map_err(|e| SyncError::Data(format!("Stored mood {}: {}", id, e)))?;
        info!("{} posted mood {} ({})", profile.username, mood.id, mood.emoji);

        if let Err(e) = self.refresh_own_latest(&profile.username).await {
            warn!("Mood {} saved but refreshing the timeline failed: {}", mood.id, e);
        }
        Ok(mood)
    }

    /// Delete a mood. Once the store confirms, it disappears from every view.
    pub async fn delete_mood(&self, id: &str) -> Result<()> {
        self.timed("delete mood", self.store.delete(MOODS, id))
            .await
            .map_err(SyncError::write)?;

        self.state.remove_mood(id);
        info!("Deleted mood {}", id);
        Ok(())
    }
}
