//! # Organization search
//!
//! Organizations are searchable by name and address. Services never talk to
//! the index inside a database transaction: they record [`IndexEvent`]s in an
//! [`Outbox`] and flush it once the transaction has committed, so the index
//! only ever sees committed state.
//!
//! A failed flush is logged and dropped. The index is rebuilt from the
//! database at startup with [`reindex_all`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entities::organization;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizationDocument {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
}

impl From<&organization::Model> for OrganizationDocument {
    fn from(org: &organization::Model) -> Self {
        Self {
            id: org.id,
            name: org.name.clone(),
            address: org.address.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexEvent {
    Upsert(OrganizationDocument),
    Remove(Uuid),
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn upsert(&self, document: OrganizationDocument) -> AppResult<()>;

    async fn remove(&self, id: Uuid) -> AppResult<()>;

    /// Ids of matching organizations, best match first.
    async fn query(&self, text: &str, limit: usize) -> AppResult<Vec<Uuid>>;
}

/// Events collected during a unit of work, delivered after commit.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<IndexEvent>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: IndexEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub async fn flush(self, index: &dyn SearchIndex) {
        for event in self.events {
            let result = match &event {
                IndexEvent::Upsert(doc) => index.upsert(doc.clone()).await,
                IndexEvent::Remove(id) => index.remove(*id).await,
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, event = ?event, "Failed to deliver search index event");
            }
        }
    }
}

/// Rebuild the index from every stored organization.
pub async fn reindex_all(db: &DatabaseConnection, index: &Arc<dyn SearchIndex>) -> AppResult<usize> {
    let organizations = organization::Entity::find().all(db).await?;
    let total = organizations.len();

    for org in &organizations {
        index.upsert(OrganizationDocument::from(org)).await?;
    }

    Ok(total)
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Score one field: every query token that prefixes a field token counts once.
fn field_score(query: &[String], field: &[String]) -> usize {
    query
        .iter()
        .filter(|q| field.iter().any(|t| t.starts_with(q.as_str())))
        .count()
}

const NAME_WEIGHT: usize = 2;
const ADDRESS_WEIGHT: usize = 1;

/// Process-local index. Good for a single instance and for tests.
#[derive(Default)]
pub struct InMemorySearchIndex {
    documents: RwLock<HashMap<Uuid, OrganizationDocument>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn upsert(&self, document: OrganizationDocument) -> AppResult<()> {
        self.documents.write().await.insert(document.id, document);
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> AppResult<()> {
        self.documents.write().await.remove(&id);
        Ok(())
    }

    async fn query(&self, text: &str, limit: usize) -> AppResult<Vec<Uuid>> {
        let query = tokenize(text);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let documents = self.documents.read().await;
        let mut hits: Vec<(usize, &OrganizationDocument)> = documents
            .values()
            .filter_map(|doc| {
                let name = tokenize(&doc.name);
                let address = doc.address.as_deref().map(tokenize).unwrap_or_default();
                let score = NAME_WEIGHT * field_score(&query, &name)
                    + ADDRESS_WEIGHT * field_score(&query, &address);
                (score > 0).then_some((score, doc))
            })
            .collect();

        hits.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));

        Ok(hits.into_iter().take(limit).map(|(_, doc)| doc.id).collect())
    }
}
