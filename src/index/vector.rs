//! Vector index client (C5): an adapter over a Qdrant collection.
//!
//! Points are keyed by `lower64(md5(chunk_id)) mod 10^9` and carry the
//! full chunk record as payload, plus an explicit `slug` field used for
//! exact-match document scoping. The collection uses cosine distance over
//! unit-normalized embeddings; the dimension is fixed by the embedder at
//! collection-creation time.

use crate::chunk::{Chunk, ChunkMetadata};
use crate::embedding::Embedder;
use crate::error::{DownstreamError, Result};
use crate::index::ScoredChunk;
use crate::token::point_id;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, GetPointsBuilder,
    PointId, PointStruct, QueryPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
    point_id::PointIdOptions, value::Kind,
};
use qdrant_client::{Payload, Qdrant};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Default collection name.
pub const DEFAULT_COLLECTION: &str = "doc_chunks";

/// Sentinel text returned when hydration misses a chunk.
pub const TEXT_NOT_FOUND: &str = "[Text not found]";

/// Payload stored with every point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPayload {
    /// Chunk id string.
    pub id: String,
    /// The exact text that was embedded.
    pub text: String,
    /// Token count.
    pub num_tokens: usize,
    /// Character count.
    pub num_chars: usize,
    /// Document slug, stored explicitly for exact-match filtering.
    pub slug: String,
    /// Unit-kind-specific metadata.
    pub metadata: ChunkMetadata,
}

impl From<&Chunk> for VectorPayload {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.clone(),
            text: chunk.text.clone(),
            num_tokens: chunk.num_tokens,
            num_chars: chunk.num_chars,
            slug: chunk.slug().to_string(),
            metadata: chunk.metadata.clone(),
        }
    }
}

/// A hydrated chunk as returned by [`VectorIndex::get_by_ids`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Chunk id.
    pub id: String,
    /// Stored text, or [`TEXT_NOT_FOUND`] for misses.
    pub text: String,
    /// Stored metadata.
    pub metadata: ChunkMetadata,
}

/// Adapter over the external vector database.
pub struct VectorIndex {
    client: Qdrant,
    embedder: Box<dyn Embedder>,
    collection: String,
}

impl VectorIndex {
    /// Connects to the vector backend.
    ///
    /// # Errors
    ///
    /// Returns a [`DownstreamError::VectorTransport`] if the client cannot
    /// be constructed.
    pub fn connect(url: &str, embedder: Box<dyn Embedder>) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| DownstreamError::VectorTransport(e.to_string()))?;
        Ok(Self {
            client,
            embedder,
            collection: DEFAULT_COLLECTION.to_string(),
        })
    }

    /// Overrides the collection name.
    #[must_use]
    pub fn with_collection(mut self, name: &str) -> Self {
        self.collection = name.to_string();
        self
    }

    /// The embedder's output dimension.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    /// Creates the collection if absent (cosine distance, embedder
    /// dimension).
    async fn ensure_collection(&self) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| DownstreamError::VectorTransport(e.to_string()))?;
        if exists {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.embedder.dimensions() as u64, Distance::Cosine),
                ),
            )
            .await
            .map_err(|e| DownstreamError::VectorTransport(e.to_string()))?;
        info!(collection = %self.collection, dims = self.embedder.dimensions(), "created vector collection");
        Ok(())
    }

    /// Embeds a chunk batch and upserts it, keyed by the derived integer
    /// point ids.
    ///
    /// Point-id collisions inside the batch are logged and tolerated; the
    /// lexical index disambiguates at query time.
    ///
    /// # Errors
    ///
    /// Returns an error on embedding or transport failure.
    pub async fn build(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        self.ensure_collection().await?;

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;

        let mut seen: HashSet<u64> = HashSet::new();
        let mut points = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let pid = point_id(&chunk.id);
            if !seen.insert(pid) {
                warn!(chunk_id = %chunk.id, point_id = pid, "point id collision within batch");
            }
            let payload = payload_for(chunk)?;
            points.push(PointStruct::new(pid, vector, payload));
        }

        let count = points.len();
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points))
            .await
            .map_err(|e| DownstreamError::VectorTransport(e.to_string()))?;
        info!(collection = %self.collection, count, "upserted chunks into vector index");
        Ok(count)
    }

    /// Queries by embedded vector, optionally scoped to one document.
    ///
    /// A missing collection yields an empty result rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error on embedding or transport failure.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        slug_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| DownstreamError::VectorTransport(e.to_string()))?;
        if !exists {
            warn!(collection = %self.collection, "vector collection does not exist");
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query)?;

        let mut request = QueryPointsBuilder::new(&self.collection)
            .query(vector)
            .limit(top_k as u64)
            .with_payload(true);
        if let Some(slug) = slug_filter {
            request = request.filter(Filter::must([Condition::matches(
                "slug",
                slug.to_string(),
            )]));
        }

        let response = self
            .client
            .query(request)
            .await
            .map_err(|e| DownstreamError::VectorTransport(e.to_string()))?;

        let mut hits = Vec::with_capacity(response.result.len());
        for point in response.result {
            let Some(payload) = payload_from(point.payload) else {
                continue;
            };
            hits.push(ScoredChunk {
                id: payload.id,
                text: payload.text,
                score: f64::from(point.score),
            });
        }
        Ok(hits)
    }

    /// Retrieves stored payloads for the given chunk ids.
    ///
    /// Missing ids come back with the [`TEXT_NOT_FOUND`] sentinel so the
    /// caller keeps positional correspondence with its id list.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    pub async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<StoredChunk>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| DownstreamError::VectorTransport(e.to_string()))?;
        if !exists {
            return Ok(ids.iter().map(|id| missing_chunk(id)).collect());
        }

        let point_ids: Vec<PointId> = ids.iter().map(|id| PointId::from(point_id(id))).collect();
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, point_ids).with_payload(true),
            )
            .await
            .map_err(|e| DownstreamError::VectorTransport(e.to_string()))?;

        let mut found: HashMap<u64, VectorPayload> = HashMap::new();
        for point in response.result {
            let Some(pid) = point.id.as_ref().and_then(numeric_point_id) else {
                continue;
            };
            if let Some(payload) = payload_from(point.payload) {
                found.insert(pid, payload);
            }
        }

        Ok(ids
            .iter()
            .map(|id| {
                found.get(&point_id(id)).map_or_else(
                    || {
                        warn!(chunk_id = %id, "chunk not found in vector index");
                        missing_chunk(id)
                    },
                    |p| StoredChunk {
                        id: p.id.clone(),
                        text: p.text.clone(),
                        metadata: p.metadata.clone(),
                    },
                )
            })
            .collect())
    }

    /// Deletes every point belonging to `slug`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    pub async fn delete_document(&self, slug: &str) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| DownstreamError::VectorTransport(e.to_string()))?;
        if !exists {
            return Ok(());
        }

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(Filter::must([Condition::matches("slug", slug.to_string())])),
            )
            .await
            .map_err(|e| DownstreamError::VectorTransport(e.to_string()))?;
        info!(collection = %self.collection, slug, "deleted document from vector index");
        Ok(())
    }
}

fn missing_chunk(id: &str) -> StoredChunk {
    StoredChunk {
        id: id.to_string(),
        text: TEXT_NOT_FOUND.to_string(),
        metadata: ChunkMetadata::default(),
    }
}

fn payload_for(chunk: &Chunk) -> Result<Payload> {
    let json = serde_json::to_value(VectorPayload::from(chunk))
        .map_err(|e| DownstreamError::VectorTransport(e.to_string()))?;
    Payload::try_from(json).map_err(|e| DownstreamError::VectorTransport(e.to_string()).into())
}

fn payload_from(payload: HashMap<String, qdrant_client::qdrant::Value>) -> Option<VectorPayload> {
    let json = serde_json::Value::Object(
        payload
            .into_iter()
            .map(|(k, v)| (k, qdrant_value_to_json(v)))
            .collect(),
    );
    serde_json::from_value(json).ok()
}

/// Converts a Qdrant payload value into its JSON equivalent.
#[allow(clippy::cast_precision_loss)]
fn qdrant_value_to_json(value: qdrant_client::qdrant::Value) -> serde_json::Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Value::from(d),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::ListValue(list)) => serde_json::Value::Array(
            list.values.into_iter().map(qdrant_value_to_json).collect(),
        ),
        Some(Kind::StructValue(map)) => serde_json::Value::Object(
            map.fields
                .into_iter()
                .map(|(k, v)| (k, qdrant_value_to_json(v)))
                .collect(),
        ),
    }
}

fn numeric_point_id(id: &PointId) -> Option<u64> {
    match &id.point_id_options {
        Some(PointIdOptions::Num(n)) => Some(*n),
        _ => None,
    }
}
