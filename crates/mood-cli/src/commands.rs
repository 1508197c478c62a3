use anyhow::Result;
use serde_json::{Value, json};
use tracing::info;

use mood_core::Session;
use mood_core::session::USERS;
use mood_db::SqliteStore;
use mood_storage::TempStaging;
use mood_types::models::{PendingUpload, UserId, UserProfile, Username};
use mood_types::remote::{DocumentStore, ObjectStorage};

use crate::Command;

type CliSession<O> = Session<SqliteStore, O, TempStaging>;

pub(crate) async fn execute<O: ObjectStorage>(session: &CliSession<O>, command: Command) -> Result<Value> {
    let output = match command {
        Command::Profile => json!(session.load_profile().await?),
        Command::Overview => {
            session.refresh_overview().await?;
            let snap = session.snapshot();
            json!({
                "profile": snap.profile,
                "ownLatest": snap.own_latest,
                "partnerLatest": snap.partner_latest,
            })
        }
        Command::All { uploader } => {
            session.expand(&Username::new(uploader)).await?;
            json!(session.snapshot().expanded)
        }
        Command::Feed => {
            session.refresh_feed().await?;
            json!(session.snapshot().feed)
        }
        Command::Post { emoji, caption } => json!(session.post_mood(&emoji, &caption).await?),
        Command::Delete { id } => {
            session.delete_mood(&id).await?;
            json!({ "deleted": id })
        }
        Command::Reactions => {
            session.refresh_reactions().await?;
            gallery(session)
        }
        Command::Upload { emoji, file } => {
            let url = session.upload_reaction(PendingUpload::file(emoji, file)).await?;
            json!({ "url": url })
        }
        Command::RemoveMedia { emoji, url } => {
            session.delete_media(&emoji, &url).await?;
            gallery(session)
        }
        Command::SeedProfile {
            username,
            email,
            partner,
            partner_id,
        } => {
            let profile = UserProfile {
                id: session.identity().clone(),
                username: Username::new(username),
                email,
                partner_username: Username::new(partner),
                partner_id: partner_id.map(UserId::new),
            };
            session
                .store()
                .update(USERS, profile.id.as_str(), profile.to_fields())
                .await?;
            info!("Wrote profile {}", profile.id);
            json!(session.load_profile().await?)
        }
    };
    Ok(output)
}

fn gallery<O>(session: &CliSession<O>) -> Value {
    let snap = session.snapshot();
    let entries: Vec<Value> = snap
        .gallery(&session.config().palette)
        .into_iter()
        .map(|(emoji, urls)| json!({ "emoji": emoji, "mediaUrls": urls }))
        .collect();
    Value::Array(entries)
}
