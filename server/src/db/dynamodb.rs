use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType, Projection,
    ProjectionType, ReturnValue, ScalarAttributeType, TableStatus,
};
use std::time::Duration;
use tracing::{debug, info};

use super::models::*;
use super::queries::{Item, av_n, av_s, parse_score_item, score_item};
use super::{RecordStore, StorageResult, merge_write_results};

const BY_TIME_INDEX: &str = "ByTime";
const PLAYERS_BOARD: &str = "players";
const RESULTS_BOARD: &str = "results";

pub struct DynamoStore {
    client: Client,
    table_prefix: String,
    /// Upper bound on items per `Query` page; `None` leaves it to DynamoDB
    page_size: Option<usize>,
}

impl DynamoStore {
    pub async fn new(table_prefix: &str) -> Result<Self> {
        let config = aws_config::load_from_env().await;
        let client = Client::new(&config);

        info!(
            "Initialized DynamoDB client with table prefix: {}",
            table_prefix
        );

        let store = Self::with_client(client, table_prefix);
        store.ensure_tables_exist().await?;

        Ok(store)
    }

    /// Use an already configured client (e.g. pointed at DynamoDB Local).
    /// Tables are not created.
    pub fn with_client(client: Client, table_prefix: &str) -> Self {
        Self {
            client,
            table_prefix: table_prefix.to_string(),
            page_size: None,
        }
    }

    /// Cap the number of items fetched per query page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    fn players_table(&self) -> String {
        format!("{}-players", self.table_prefix)
    }

    fn results_table(&self) -> String {
        format!("{}-results", self.table_prefix)
    }

    pub async fn ensure_tables_exist(&self) -> Result<()> {
        self.create_table_if_not_exists(&self.players_table()).await?;
        self.create_table_if_not_exists(&self.results_table()).await?;
        Ok(())
    }

    /// Both tables share one layout:
    /// - PK: `pk` (identity key for players, random id for results)
    /// - GSI `ByTime`: `board` (constant per table) + `bestTime` (number),
    ///   so a forward query on the index yields ascending times.
    async fn create_table_if_not_exists(&self, table_name: &str) -> Result<()> {
        match self.client.describe_table().table_name(table_name).send().await {
            Ok(_) => {
                debug!("Table {} already exists", table_name);
                return Ok(());
            }
            Err(e) => {
                debug!(
                    "Table {} does not exist (error: {}), creating it",
                    table_name, e
                );
            }
        }

        info!("Creating DynamoDB table: {}", table_name);

        let pk_attr = AttributeDefinition::builder()
            .attribute_name("pk")
            .attribute_type(ScalarAttributeType::S)
            .build()
            .context("Failed to build pk attribute")?;
        let board_attr = AttributeDefinition::builder()
            .attribute_name("board")
            .attribute_type(ScalarAttributeType::S)
            .build()
            .context("Failed to build board attribute")?;
        let time_attr = AttributeDefinition::builder()
            .attribute_name("bestTime")
            .attribute_type(ScalarAttributeType::N)
            .build()
            .context("Failed to build bestTime attribute")?;

        let pk_key = KeySchemaElement::builder()
            .attribute_name("pk")
            .key_type(KeyType::Hash)
            .build()
            .context("Failed to build pk key")?;

        let gsi_pk_key = KeySchemaElement::builder()
            .attribute_name("board")
            .key_type(KeyType::Hash)
            .build()
            .context("Failed to build GSI pk key")?;
        let gsi_sk_key = KeySchemaElement::builder()
            .attribute_name("bestTime")
            .key_type(KeyType::Range)
            .build()
            .context("Failed to build GSI sk key")?;

        let gsi = GlobalSecondaryIndex::builder()
            .index_name(BY_TIME_INDEX)
            .key_schema(gsi_pk_key)
            .key_schema(gsi_sk_key)
            .projection(
                Projection::builder()
                    .projection_type(ProjectionType::All)
                    .build(),
            )
            .build()
            .context("Failed to build GSI")?;

        self.client
            .create_table()
            .table_name(table_name)
            .attribute_definitions(pk_attr)
            .attribute_definitions(board_attr)
            .attribute_definitions(time_attr)
            .key_schema(pk_key)
            .global_secondary_indexes(gsi)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .with_context(|| format!("Failed to create table {}", table_name))?;

        self.wait_until_active(table_name).await?;

        info!("Successfully created table: {}", table_name);
        Ok(())
    }

    async fn wait_until_active(&self, table_name: &str) -> Result<()> {
        for _ in 0..60 {
            let response = self
                .client
                .describe_table()
                .table_name(table_name)
                .send()
                .await
                .with_context(|| format!("Failed to describe table {}", table_name))?;

            if response.table().and_then(|t| t.table_status()) == Some(&TableStatus::Active) {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        Err(anyhow!("Table {} did not become active", table_name))
    }

    /// Conditional put: succeeds when the key is new or the stored time is
    /// strictly higher. A failed condition means the stored record is kept.
    async fn write_player(&self, identity_key: &str, record: &ScoreRecord) -> Result<UpsertOutcome> {
        let result = self
            .client
            .put_item()
            .table_name(self.players_table())
            .set_item(Some(score_item(identity_key, PLAYERS_BOARD, record)))
            .condition_expression("attribute_not_exists(pk) OR bestTime > :time")
            .expression_attribute_values(":time", av_n(record.best_time))
            .return_values(ReturnValue::AllOld)
            .send()
            .await;

        match result {
            Ok(output) => {
                let replaced = output.attributes().is_some_and(|old| !old.is_empty());
                Ok(if replaced {
                    UpsertOutcome::Improved
                } else {
                    UpsertOutcome::Created
                })
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Ok(UpsertOutcome::Kept)
            }
            Err(e) => Err(e).with_context(|| format!("Failed to upsert player {}", identity_key)),
        }
    }

    async fn append_result(&self, record: &ScoreRecord) -> Result<()> {
        let id = uuid::Uuid::new_v4().to_string();

        self.client
            .put_item()
            .table_name(self.results_table())
            .set_item(Some(score_item(&id, RESULTS_BOARD, record)))
            .send()
            .await
            .context("Failed to append result")?;

        Ok(())
    }

    async fn query_by_time(&self, table: String, board: &str, limit: usize) -> Result<Vec<ScoreRecord>> {
        let mut items: Vec<Item> = Vec::new();
        let mut start_key = None;

        while items.len() < limit {
            let remaining = limit - items.len();
            let page = self.page_size.map_or(remaining, |size| size.min(remaining));

            let response = self
                .client
                .query()
                .table_name(&table)
                .index_name(BY_TIME_INDEX)
                .key_condition_expression("board = :board")
                .expression_attribute_values(":board", av_s(board))
                .scan_index_forward(true)
                .limit(page.min(i32::MAX as usize) as i32)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .with_context(|| format!("Failed to query {}", table))?;

            start_key = response.last_evaluated_key.clone();
            items.extend(response.items.unwrap_or_default());

            if start_key.is_none() {
                break;
            }
        }

        let mut records: Vec<ScoreRecord> = items.iter().filter_map(parse_score_item).collect();
        records.truncate(limit);

        Ok(records)
    }
}

#[async_trait]
impl RecordStore for DynamoStore {
    async fn upsert_best(
        &self,
        identity_key: &str,
        record: &ScoreRecord,
    ) -> StorageResult<UpsertOutcome> {
        let player = self.write_player(identity_key, record).await;
        let history = self.append_result(record).await;
        merge_write_results(identity_key, player, history)
    }

    async fn list_top_players(&self, limit: usize) -> StorageResult<Vec<PlayerRecord>> {
        Ok(self.query_by_time(self.players_table(), PLAYERS_BOARD, limit).await?)
    }

    async fn list_all_submissions(&self, limit: usize) -> StorageResult<Vec<SubmissionRecord>> {
        Ok(self.query_by_time(self.results_table(), RESULTS_BOARD, limit).await?)
    }
}
