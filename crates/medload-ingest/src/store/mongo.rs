//! MongoDB-backed admission store

use super::{AdmissionStore, BulkWriteSummary, WriteFailure};
use crate::error::{IngestError, Result};
use crate::indexes::IndexSpec;
use crate::record::{IdentifiedRecord, RECORD_ID_FIELD};
use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::{debug, info};

/// Admission store backed by one MongoDB collection
pub struct MongoStore {
    client: Client,
    database: Database,
    collection: Collection<Document>,
}

impl MongoStore {
    /// Connect and verify the server answers a `ping`.
    ///
    /// The driver connects lazily, so without the ping an unreachable server
    /// would only surface at the first write.
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let database = client.database(database);
        database.run_command(doc! { "ping": 1 }).await?;

        info!(
            database = database.name(),
            collection = collection,
            "Connected to MongoDB"
        );

        let collection = database.collection::<Document>(collection);
        Ok(Self {
            client,
            database,
            collection,
        })
    }

    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database.name(), self.collection.name())
    }

    /// Close the client's connection pools
    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }
}

fn index_model(spec: &IndexSpec) -> IndexModel {
    let mut keys = Document::new();
    for (field, order) in spec.keys {
        keys.insert(*field, order.as_i32());
    }

    let options = IndexOptions::builder()
        .name(spec.name.to_string())
        .unique(spec.unique.then_some(true))
        .build();

    IndexModel::builder().keys(keys).options(options).build()
}

/// Largest document the server accepts (`maxBsonObjectSize`)
const MAX_BSON_OBJECT_SIZE: usize = 16 * 1024 * 1024;

/// Room left in each command for the fields around `updates`
const COMMAND_ENVELOPE_BYTES: usize = 16 * 1024;

/// Type byte, decimal array key and its terminator for one `updates` element
const ARRAY_ELEMENT_OVERHEAD: usize = 8;

/// One `update` command whose statements start at `batch[offset]`
#[derive(Debug)]
struct UpdateChunk {
    offset: usize,
    command: Document,
}

fn update_statement(record: &IdentifiedRecord) -> Document {
    doc! {
        "q": { RECORD_ID_FIELD: record.record_id.as_str() },
        "u": { "$set": record.to_document() },
        "upsert": true,
        "multi": false,
    }
}

fn update_command(collection: &str, updates: Vec<Bson>) -> Document {
    doc! {
        "update": collection,
        "updates": updates,
        "ordered": false,
    }
}

/// Split a batch into `update` commands that each fit in one BSON document.
///
/// Statements are measured as they are encoded. A single statement larger than
/// the budget is sent on its own and left for the server to reject.
fn update_commands(collection: &str, batch: &[IdentifiedRecord]) -> Result<Vec<UpdateChunk>> {
    let budget = MAX_BSON_OBJECT_SIZE - COMMAND_ENVELOPE_BYTES;
    let mut chunks = Vec::new();
    let mut updates: Vec<Bson> = Vec::new();
    let mut offset = 0;
    let mut bytes = 0;

    for (index, record) in batch.iter().enumerate() {
        let statement = update_statement(record);
        let size = mongodb::bson::to_vec(&statement)?.len() + ARRAY_ELEMENT_OVERHEAD;

        if !updates.is_empty() && bytes + size > budget {
            chunks.push(UpdateChunk {
                offset,
                command: update_command(collection, std::mem::take(&mut updates)),
            });
            offset = index;
            bytes = 0;
        }

        bytes += size;
        updates.push(Bson::Document(statement));
    }

    if !updates.is_empty() {
        chunks.push(UpdateChunk {
            offset,
            command: update_command(collection, updates),
        });
    }

    Ok(chunks)
}

fn read_count(reply: &Document, key: &str) -> u64 {
    match reply.get(key) {
        Some(Bson::Int32(n)) => u64::try_from(*n).unwrap_or(0),
        Some(Bson::Int64(n)) => u64::try_from(*n).unwrap_or(0),
        Some(Bson::Double(n)) if *n >= 0.0 => *n as u64,
        _ => 0,
    }
}

fn read_i64(doc: &Document, key: &str) -> Option<i64> {
    match doc.get(key) {
        Some(Bson::Int32(n)) => Some(i64::from(*n)),
        Some(Bson::Int64(n)) => Some(*n),
        Some(Bson::Double(n)) => Some(*n as i64),
        _ => None,
    }
}

/// Interpret the reply of an `update` command.
///
/// `n` counts matched plus upserted operations; `upserted` lists one entry per
/// inserted document. `writeErrors[].index` is shifted by `offset` so it points into the whole batch.
fn parse_update_reply(reply: &Document, offset: usize) -> Result<BulkWriteSummary> {
    if let Ok(concern) = reply.get_document("writeConcernError") {
        let message = concern.get_str("errmsg").unwrap_or("unknown write concern error");
        return Err(IngestError::connectivity(format!(
            "write concern not satisfied: {}",
            message
        )));
    }

    let upserted = reply
        .get_array("upserted")
        .map(|entries| entries.len() as u64)
        .unwrap_or(0);
    let n = read_count(reply, "n");

    let failures = reply
        .get_array("writeErrors")
        .map(|errors| {
            errors
                .iter()
                .filter_map(Bson::as_document)
                .map(|error| WriteFailure {
                    index: offset
                        + read_i64(error, "index")
                            .and_then(|i| usize::try_from(i).ok())
                            .unwrap_or(0),
                    code: read_i64(error, "code")
                        .and_then(|c| i32::try_from(c).ok())
                        .unwrap_or(0),
                    message: error.get_str("errmsg").unwrap_or_default().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(BulkWriteSummary {
        upserted,
        matched: n.saturating_sub(upserted),
        modified: read_count(reply, "nModified"),
        failures,
    })
}

#[async_trait]
impl AdmissionStore for MongoStore {
    async fn ensure_indexes(&self, indexes: &[IndexSpec]) -> Result<()> {
        let models: Vec<IndexModel> = indexes.iter().map(index_model).collect();
        let created = self.collection.create_indexes(models).await?;
        debug!(
            namespace = %self.namespace(),
            indexes = ?created.index_names,
            "Indexes ensured"
        );
        Ok(())
    }

    async fn count_documents(&self) -> Result<u64> {
        Ok(self.collection.count_documents(doc! {}).await?)
    }

    async fn bulk_upsert(&self, batch: &[IdentifiedRecord]) -> Result<BulkWriteSummary> {
        if batch.is_empty() {
            return Ok(BulkWriteSummary::default());
        }

        let chunks = update_commands(self.collection.name(), batch)?;
        if chunks.len() > 1 {
            debug!(
                records = batch.len(),
                commands = chunks.len(),
                "Splitting batch to stay under the document size limit"
            );
        }

        let mut summary = BulkWriteSummary::default();
        for chunk in chunks {
            let reply = self.database.run_command(chunk.command).await?;
            summary.absorb(parse_update_reply(&reply, chunk.offset)?);
        }
        Ok(summary)
    }
}
