use async_trait::async_trait;
use futures_util::StreamExt;
use log::error;
use mongodb::bson::{doc, Document};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Cursor};
use serde::de::DeserializeOwned;

use super::{newest_first, LeadRepository};
use crate::db::MongoDB;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{Activity, ActivityRecord, Lead, User, UserTeam};

/// MongoDB backend. Collections: `leads`, `activities`, `users`, `user_teams`.
pub struct MongoRepository {
    mongodb: MongoDB,
}

impl MongoRepository {
    pub fn new(mongodb: MongoDB) -> Self {
        Self { mongodb }
    }

    fn leads(&self) -> Collection<Lead> {
        self.mongodb.db.collection::<Lead>("leads")
    }

    fn activities(&self) -> Collection<Activity> {
        self.mongodb.db.collection::<Activity>("activities")
    }

    fn users(&self) -> Collection<User> {
        self.mongodb.db.collection::<User>("users")
    }

    fn user_teams(&self) -> Collection<UserTeam> {
        self.mongodb.db.collection::<UserTeam>("user_teams")
    }

    /// Global activity counter kept in the `counters` collection.
    async fn next_activity_seq(&self) -> PipelineResult<u64> {
        let counter = self
            .mongodb
            .db
            .collection::<Document>("counters")
            .find_one_and_update(doc! { "_id": "activity_seq" }, doc! { "$inc": { "value": 1_i64 } })
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| PipelineError::Storage("activity counter missing after upsert".into()))?;
        counter
            .get_i64("value")
            .map(|value| value as u64)
            .map_err(|e| PipelineError::Storage(format!("bad activity counter: {}", e)))
    }
}

async fn collect<T>(mut cursor: Cursor<T>, what: &str) -> PipelineResult<Vec<T>>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let mut items = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(item) => items.push(item),
            Err(e) => {
                error!("Error reading {}: {}", what, e);
                return Err(e.into());
            }
        }
    }
    Ok(items)
}

#[async_trait]
impl LeadRepository for MongoRepository {
    async fn insert_lead(&self, lead: &Lead) -> PipelineResult<()> {
        self.leads().insert_one(lead).await?;
        Ok(())
    }

    async fn get_lead(&self, lead_id: &str) -> PipelineResult<Option<Lead>> {
        Ok(self.leads().find_one(doc! { "lead_id": lead_id }).await?)
    }

    async fn save_lead(&self, lead: &Lead) -> PipelineResult<()> {
        let res = self
            .leads()
            .replace_one(doc! { "lead_id": &lead.lead_id }, lead)
            .await?;
        if res.matched_count == 0 {
            return Err(PipelineError::not_found("Lead", lead.lead_id.clone()));
        }
        Ok(())
    }

    async fn delete_lead(&self, lead_id: &str) -> PipelineResult<bool> {
        let res = self.leads().delete_one(doc! { "lead_id": lead_id }).await?;
        if res.deleted_count == 0 {
            return Ok(false);
        }
        self.activities()
            .delete_many(doc! { "lead_id": lead_id })
            .await?;
        Ok(true)
    }

    async fn list_leads(&self, team_id: &str) -> PipelineResult<Vec<Lead>> {
        let cursor = self.leads().find(doc! { "team_id": team_id }).await?;
        let mut leads = collect(cursor, "leads").await?;
        // Stored as RFC 3339 strings, which don't sort lexically.
        newest_first(&mut leads);
        Ok(leads)
    }

    async fn append_activity(&self, record: ActivityRecord) -> PipelineResult<Activity> {
        let seq = self.next_activity_seq().await?;
        let activity = record.into_activity(seq);
        self.activities().insert_one(&activity).await?;
        Ok(activity)
    }

    async fn list_activities(&self, lead_ids: &[String]) -> PipelineResult<Vec<Activity>> {
        let cursor = self
            .activities()
            .find(doc! { "lead_id": { "$in": lead_ids.to_vec() } })
            .await?;
        collect(cursor, "activities").await
    }

    async fn upsert_user(&self, user: &User) -> PipelineResult<()> {
        self.users()
            .replace_one(doc! { "user_id": &user.user_id }, user)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> PipelineResult<Option<User>> {
        Ok(self.users().find_one(doc! { "user_id": user_id }).await?)
    }

    async fn add_membership(&self, membership: &UserTeam) -> PipelineResult<bool> {
        let filter = doc! { "team_id": &membership.team_id, "user_id": &membership.user_id };
        if self.user_teams().find_one(filter).await?.is_some() {
            return Ok(false);
        }
        self.user_teams().insert_one(membership).await?;
        Ok(true)
    }

    async fn memberships_for_user(&self, user_id: &str) -> PipelineResult<Vec<UserTeam>> {
        let cursor = self.user_teams().find(doc! { "user_id": user_id }).await?;
        collect(cursor, "user_teams").await
    }

    async fn team_members(&self, team_id: &str) -> PipelineResult<Vec<UserTeam>> {
        let cursor = self.user_teams().find(doc! { "team_id": team_id }).await?;
        collect(cursor, "user_teams").await
    }
}
