//! Pairing-aware mood posting. Each new mood carries a reaction picked at
//! random from the partner's media for the same emoji.

use mood_types::models::{Mood, MoodDraft, UserProfile};
use mood_types::remote::DocumentStore;
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, warn};

use crate::config::DEFAULT_REACTION_URL;
use crate::error::Result;
use crate::session::Session;

/// Pick one of `urls` uniformly, or the placeholder when there are none.
pub fn pick_reaction<R: Rng + ?Sized>(urls: &[String], rng: &mut R) -> String {
    urls.choose(rng)
        .cloned()
        .unwrap_or_else(|| DEFAULT_REACTION_URL.to_string())
}

impl<S: DocumentStore, O, M> Session<S, O, M> {
    /// Post a mood with a reaction from the partner's collection.
    pub async fn post_mood(&self, emoji: &str, caption: &str) -> Result<Mood> {
        let draft = MoodDraft::new(emoji, caption);
        self.validate_draft(&draft)?;

        let profile = self.load_profile().await?;
        let candidates = self.partner_media(&profile, emoji).await;
        let url = pick_reaction(&candidates, &mut rand::rng());
        debug!("Picked reaction {} from {} candidates", url, candidates.len());

        self.create_as(&profile, draft.with_reaction(url)).await
    }

    /// The partner's media for `emoji`. An unresolvable partner or a failed
    /// lookup leaves the mood with the placeholder instead of failing it.
    async fn partner_media(&self, profile: &UserProfile, emoji: &str) -> Vec<String> {
        let partner = match self.resolve_partner(profile).await {
            Ok(Some(partner)) => partner,
            Ok(None) => return vec![],
            Err(e) => {
                warn!("Could not resolve partner of {}: {}", profile.id, e);
                return vec![];
            }
        };
        match self.fetch_for(&partner).await {
            Ok(mut reactions) => reactions
                .remove(emoji)
                .map(|r| r.media_urls)
                .unwrap_or_default(),
            Err(e) => {
                warn!("Could not load reactions of {}: {}", partner, e);
                vec![]
            }
        }
    }
}
