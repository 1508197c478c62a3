//! Identity and pairing resolution.

use mood_types::documents::Query;
use mood_types::models::{UserId, UserProfile, Username};
use mood_types::remote::DocumentStore;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::session::{Session, USERS};

impl<S: DocumentStore, O, M> Session<S, O, M> {
    /// Look up the profile document of `identity`.
    pub async fn resolve_profile(&self, identity: &UserId) -> Result<UserProfile> {
        let doc = self
            .timed("resolve profile", self.store.get(USERS, identity.as_str()))
            .await
            .map_err(SyncError::transport)?
            .ok_or_else(|| SyncError::NotFound(format!("No profile for {}", identity)))?;

        UserProfile::from_document(doc)
            .map_err(|e| SyncError::Data(format!("Profile {}: {}", identity, e)))
    }

    /// Resolve the caller's own profile and publish it to the state.
    pub async fn load_profile(&self) -> Result<UserProfile> {
        let profile = self.resolve_profile(&self.identity).await?;
        self.state.set_profile(profile.clone());
        Ok(profile)
    }

    /// Find the identity of `profile`'s partner.
    ///
    /// The id link is used when present and accepted only if the partner does
    /// not point at someone else. Profiles without it fall back to a lookup by
    /// `partner_username`.
    pub async fn resolve_partner(&self, profile: &UserProfile) -> Result<Option<UserId>> {
        Ok(self.partner_profile(profile).await?.map(|partner| partner.id))
    }

    /// The partner's full profile, resolved the same way as
    /// [`resolve_partner`](Self::resolve_partner).
    pub async fn partner_profile(&self, profile: &UserProfile) -> Result<Option<UserProfile>> {
        if let Some(partner_id) = &profile.partner_id {
            let partner = match self.resolve_profile(partner_id).await {
                Ok(partner) => partner,
                Err(SyncError::NotFound(_)) => {
                    warn!("{} links to missing partner {}", profile.id, partner_id);
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };
            return match &partner.partner_id {
                Some(back) if *back != profile.id => {
                    warn!(
                        "Partner link {} -> {} is not mutual ({} links to {})",
                        profile.id, partner.id, partner.id, back
                    );
                    Ok(None)
                }
                _ => Ok(Some(partner)),
            };
        }

        if profile.partner_username.is_empty() {
            debug!("{} has no partner", profile.id);
            return Ok(None);
        }
        self.find_by_username(&profile.partner_username).await
    }

    /// Username lookup for profiles that predate id links. When several
    /// profiles share the username the first one in store order is used.
    async fn find_by_username(&self, username: &Username) -> Result<Option<UserProfile>> {
        let query = Query::collection(USERS).where_eq("username", username.as_str());
        let matches = self
            .timed("find partner by username", self.store.query(&query))
            .await
            .map_err(SyncError::transport)?;

        if matches.len() > 1 {
            warn!(
                "{} profiles share username {}, using {}",
                matches.len(),
                username,
                matches[0].id
            );
        }
        let Some(first) = matches.into_iter().next() else {
            warn!("No user found with username {}", username);
            return Ok(None);
        };
        let id = first.id.clone();
        UserProfile::from_document(first)
            .map(Some)
            .map_err(|e| SyncError::Data(format!("Profile {}: {}", id, e)))
    }
}
