/// Data source connectors
///
/// One service handles connections to the supported analytics backends:
/// Supabase and PostHog over their REST APIs, PostgreSQL over the wire
/// protocol. The engine only sees the DataSource trait, so tests substitute
/// doubles without touching the network.

use crate::workflow::types::{
    ConnectionProfile, DataSchema, DetectedEntity, SchemaColumn, SchemaTable, SourceKind,
};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Outcome of probing a data source connection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTest {
    pub success: bool,
    pub message: String,
    /// Round-trip time in milliseconds, when measured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_time: Option<u64>,
}

/// Boundary to the external data sources consumed by the engine
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Probe the connection; an unreachable or rejected source is reported
    /// in the result rather than as an error
    async fn test_connection(&self, profile: &ConnectionProfile) -> Result<ConnectionTest>;

    /// Introspect the source's structure
    async fn fetch_schema(&self, profile: &ConnectionProfile) -> Result<DataSchema>;

    /// Run a query and return its rows as JSON records
    async fn execute_query(&self, profile: &ConnectionProfile, query: &str) -> Result<Vec<Value>>;
}

/// REST/wire-protocol implementation of DataSource
#[derive(Debug, Clone)]
pub struct DataConnectorService {
    http: reqwest::Client,
}

impl DataConnectorService {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    async fn test_supabase(&self, profile: &ConnectionProfile) -> Result<ConnectionTest> {
        let start = std::time::Instant::now();

        let response = self
            .http
            .get(format!("{}/rest/v1/", profile.endpoint))
            .header("apikey", &profile.api_key)
            .header("Authorization", format!("Bearer {}", profile.api_key))
            .send()
            .await
            .map_err(|e| anyhow!("Supabase connection error: {}", e))?;

        if response.status().is_success() {
            Ok(ConnectionTest {
                success: true,
                message: "Successfully connected to Supabase".to_string(),
                connection_time: Some(start.elapsed().as_millis() as u64),
            })
        } else {
            Ok(ConnectionTest {
                success: false,
                message: format!("Supabase connection failed: {}", response.status()),
                connection_time: Some(start.elapsed().as_millis() as u64),
            })
        }
    }

    async fn test_posthog(&self, profile: &ConnectionProfile) -> Result<ConnectionTest> {
        let start = std::time::Instant::now();

        let response = self
            .http
            .get(format!("{}/api/projects", profile.endpoint))
            .header("Authorization", format!("Bearer {}", profile.api_key))
            .send()
            .await
            .map_err(|e| anyhow!("PostHog connection error: {}", e))?;

        if response.status().is_success() {
            Ok(ConnectionTest {
                success: true,
                message: "Successfully connected to PostHog".to_string(),
                connection_time: Some(start.elapsed().as_millis() as u64),
            })
        } else {
            Ok(ConnectionTest {
                success: false,
                message: format!("PostHog connection failed: {}", response.status()),
                connection_time: Some(start.elapsed().as_millis() as u64),
            })
        }
    }

    async fn test_postgres(&self, profile: &ConnectionProfile) -> Result<ConnectionTest> {
        let start = std::time::Instant::now();

        let client = self.pg_connect(profile).await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| anyhow!("PostgreSQL connection error: {}", e))?;

        Ok(ConnectionTest {
            success: true,
            message: "Successfully connected to PostgreSQL".to_string(),
            connection_time: Some(start.elapsed().as_millis() as u64),
        })
    }

    /// Open a PostgreSQL client; the endpoint is a full connection string
    /// (URL or key-value form), so credentials stay inside the profile
    async fn pg_connect(&self, profile: &ConnectionProfile) -> Result<tokio_postgres::Client> {
        let (client, connection) = tokio_postgres::connect(&profile.endpoint, tokio_postgres::NoTls)
            .await
            .map_err(|e| anyhow!("PostgreSQL connection error: {}", e))?;

        // The connection task drives the socket until the client is dropped
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!("⚠️ PostgreSQL connection task ended with error: {}", e);
            }
        });

        Ok(client)
    }

    /// PostgREST's root endpoint serves an OpenAPI document describing every
    /// exposed table; the definitions section is the schema
    async fn fetch_supabase_schema(&self, profile: &ConnectionProfile) -> Result<DataSchema> {
        let response = self
            .http
            .get(format!("{}/rest/v1/", profile.endpoint))
            .header("apikey", &profile.api_key)
            .header("Authorization", format!("Bearer {}", profile.api_key))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| anyhow!("Failed to fetch Supabase schema: {}", e))?;

        if !response.status().is_success() {
            bail!("Failed to fetch schema: {}", response.status());
        }

        let document: Value = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to fetch Supabase schema: {}", e))?;

        let mut tables = Vec::new();
        if let Some(definitions) = document.get("definitions").and_then(|d| d.as_object()) {
            for (table_name, definition) in definitions {
                let required: Vec<&str> = definition
                    .get("required")
                    .and_then(|r| r.as_array())
                    .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
                    .unwrap_or_default();

                let mut columns = Vec::new();
                if let Some(properties) = definition.get("properties").and_then(|p| p.as_object()) {
                    for (column_name, property) in properties {
                        let data_type = property
                            .get("format")
                            .or_else(|| property.get("type"))
                            .and_then(|t| t.as_str())
                            .unwrap_or("text")
                            .to_string();
                        // PostgREST marks primary keys with a <pk/> tag in the description
                        let primary_key = property
                            .get("description")
                            .and_then(|d| d.as_str())
                            .map(|d| d.contains("<pk/>"))
                            .unwrap_or(false);

                        columns.push(SchemaColumn {
                            name: column_name.clone(),
                            data_type,
                            nullable: !required.contains(&column_name.as_str()),
                            primary_key: primary_key.then_some(true),
                            foreign_key: None,
                        });
                    }
                }

                tables.push(SchemaTable {
                    name: table_name.clone(),
                    columns,
                    row_count: None,
                });
            }
        }

        tracing::debug!("📊 Supabase schema fetched: {} tables", tables.len());

        Ok(DataSchema {
            tables,
            relationships: Vec::new(),
            entities: Vec::new(),
        })
    }

    /// PostHog exposes event definitions rather than tables; the canonical
    /// events/persons model is derived from them
    async fn fetch_posthog_schema(&self, profile: &ConnectionProfile) -> Result<DataSchema> {
        let response = self
            .http
            .get(format!("{}/api/projects/@current/event_definitions", profile.endpoint))
            .header("Authorization", format!("Bearer {}", profile.api_key))
            .send()
            .await
            .map_err(|e| anyhow!("Failed to fetch PostHog schema: {}", e))?;

        if !response.status().is_success() {
            bail!("Failed to fetch PostHog schema: {}", response.status());
        }

        let definitions: Value = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to fetch PostHog schema: {}", e))?;
        let event_count = definitions
            .get("results")
            .and_then(|r| r.as_array())
            .map(|r| r.len())
            .unwrap_or(0);
        tracing::debug!("📊 PostHog schema fetched: {} event definitions", event_count);

        let tables = vec![
            SchemaTable {
                name: "events".to_string(),
                columns: vec![
                    text_column("event", "string", false),
                    text_column("timestamp", "timestamp", false),
                    text_column("distinct_id", "string", false),
                    text_column("properties", "jsonb", true),
                ],
                row_count: None,
            },
            SchemaTable {
                name: "persons".to_string(),
                columns: vec![
                    SchemaColumn {
                        name: "distinct_id".to_string(),
                        data_type: "string".to_string(),
                        nullable: false,
                        primary_key: Some(true),
                        foreign_key: None,
                    },
                    text_column("properties", "jsonb", true),
                    text_column("created_at", "timestamp", false),
                ],
                row_count: None,
            },
        ];

        let entities = vec![
            DetectedEntity {
                name: "User".to_string(),
                table: "persons".to_string(),
                description: "User entity tracked in PostHog".to_string(),
                key_fields: vec!["distinct_id".to_string()],
                event_fields: None,
            },
            DetectedEntity {
                name: "Event".to_string(),
                table: "events".to_string(),
                description: "User events and interactions".to_string(),
                key_fields: vec!["event".to_string(), "distinct_id".to_string()],
                event_fields: Some(vec!["event".to_string(), "timestamp".to_string()]),
            },
        ];

        Ok(DataSchema {
            tables,
            relationships: Vec::new(),
            entities,
        })
    }

    async fn fetch_postgres_schema(&self, profile: &ConnectionProfile) -> Result<DataSchema> {
        let client = self.pg_connect(profile).await?;

        let messages = client
            .simple_query(
                "SELECT table_name, column_name, data_type, is_nullable \
                 FROM information_schema.columns \
                 WHERE table_schema = 'public' \
                 ORDER BY table_name, ordinal_position",
            )
            .await
            .map_err(|e| anyhow!("Failed to fetch PostgreSQL schema: {}", e))?;

        let mut grouped: BTreeMap<String, Vec<SchemaColumn>> = BTreeMap::new();
        for message in messages {
            if let tokio_postgres::SimpleQueryMessage::Row(row) = message {
                let table = row.get(0).unwrap_or("").to_string();
                if table.is_empty() {
                    continue;
                }
                grouped.entry(table).or_default().push(SchemaColumn {
                    name: row.get(1).unwrap_or("").to_string(),
                    data_type: row.get(2).unwrap_or("text").to_string(),
                    nullable: row.get(3).map(|v| v == "YES").unwrap_or(true),
                    primary_key: None,
                    foreign_key: None,
                });
            }
        }

        let tables: Vec<SchemaTable> = grouped
            .into_iter()
            .map(|(name, columns)| SchemaTable {
                name,
                columns,
                row_count: None,
            })
            .collect();

        tracing::debug!("📊 PostgreSQL schema fetched: {} tables", tables.len());

        Ok(DataSchema {
            tables,
            relationships: Vec::new(),
            entities: Vec::new(),
        })
    }

    async fn execute_supabase_query(&self, profile: &ConnectionProfile, query: &str) -> Result<Vec<Value>> {
        let response = self
            .http
            .post(format!("{}/rest/v1/rpc/execute_sql", profile.endpoint))
            .header("apikey", &profile.api_key)
            .header("Authorization", format!("Bearer {}", profile.api_key))
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| anyhow!("Supabase query execution failed: {}", e))?;

        if !response.status().is_success() {
            bail!("Query failed: {}", response.status());
        }

        let rows: Value = response
            .json()
            .await
            .map_err(|e| anyhow!("Supabase query execution failed: {}", e))?;
        Ok(rows.as_array().cloned().unwrap_or_default())
    }

    /// PostHog queries use HogQL through the query endpoint
    async fn execute_posthog_query(&self, profile: &ConnectionProfile, query: &str) -> Result<Vec<Value>> {
        let response = self
            .http
            .post(format!("{}/api/projects/@current/query", profile.endpoint))
            .header("Authorization", format!("Bearer {}", profile.api_key))
            .json(&json!({ "query": { "kind": "HogQLQuery", "query": query } }))
            .send()
            .await
            .map_err(|e| anyhow!("PostHog query execution failed: {}", e))?;

        if !response.status().is_success() {
            bail!("Query failed: {}", response.status());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| anyhow!("PostHog query execution failed: {}", e))?;
        Ok(body
            .get("results")
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default())
    }

    async fn execute_postgres_query(&self, profile: &ConnectionProfile, query: &str) -> Result<Vec<Value>> {
        let client = self.pg_connect(profile).await?;

        let messages = client
            .simple_query(query)
            .await
            .map_err(|e| anyhow!("PostgreSQL query execution failed: {}", e))?;

        let mut results = Vec::new();
        for message in messages {
            if let tokio_postgres::SimpleQueryMessage::Row(row) = message {
                let mut record = serde_json::Map::new();
                for (i, column) in row.columns().iter().enumerate() {
                    record.insert(column.name().to_string(), parse_sql_value(row.get(i)));
                }
                results.push(Value::Object(record));
            }
        }

        tracing::debug!("📊 PostgreSQL query returned {} rows", results.len());
        Ok(results)
    }
}

impl Default for DataConnectorService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for DataConnectorService {
    async fn test_connection(&self, profile: &ConnectionProfile) -> Result<ConnectionTest> {
        let start = std::time::Instant::now();

        let result = match profile.kind {
            SourceKind::Supabase => self.test_supabase(profile).await,
            SourceKind::Posthog => self.test_posthog(profile).await,
            SourceKind::Postgresql => self.test_postgres(profile).await,
            SourceKind::Mysql | SourceKind::Bigquery => Ok(ConnectionTest {
                success: false,
                message: format!("Unsupported connection type: {}", profile.kind),
                connection_time: None,
            }),
        };

        // Network and protocol failures become a failed probe, not an error
        Ok(match result {
            Ok(test) => test,
            Err(e) => ConnectionTest {
                success: false,
                message: format!("Connection failed: {}", e),
                connection_time: Some(start.elapsed().as_millis() as u64),
            },
        })
    }

    async fn fetch_schema(&self, profile: &ConnectionProfile) -> Result<DataSchema> {
        match profile.kind {
            SourceKind::Supabase => self.fetch_supabase_schema(profile).await,
            SourceKind::Posthog => self.fetch_posthog_schema(profile).await,
            SourceKind::Postgresql => self.fetch_postgres_schema(profile).await,
            SourceKind::Mysql | SourceKind::Bigquery => {
                bail!("Unsupported connection type: {}", profile.kind)
            }
        }
    }

    async fn execute_query(&self, profile: &ConnectionProfile, query: &str) -> Result<Vec<Value>> {
        match profile.kind {
            SourceKind::Supabase => self.execute_supabase_query(profile, query).await,
            SourceKind::Posthog => self.execute_posthog_query(profile, query).await,
            SourceKind::Postgresql => self.execute_postgres_query(profile, query).await,
            SourceKind::Mysql | SourceKind::Bigquery => {
                bail!("Query execution not supported for {}", profile.kind)
            }
        }
    }
}

fn text_column(name: &str, data_type: &str, nullable: bool) -> SchemaColumn {
    SchemaColumn {
        name: name.to_string(),
        data_type: data_type.to_string(),
        nullable,
        primary_key: None,
        foreign_key: None,
    }
}

/// Convert a textual SQL value into the closest JSON type
fn parse_sql_value(raw: Option<&str>) -> Value {
    match raw {
        Some(v) => {
            if let Ok(n) = v.parse::<i64>() {
                json!(n)
            } else if let Ok(n) = v.parse::<f64>() {
                json!(n)
            } else if v == "true" || v == "false" {
                json!(v == "true")
            } else {
                json!(v)
            }
        }
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_values_parse_into_typed_json() {
        assert_eq!(parse_sql_value(Some("42")), json!(42));
        assert_eq!(parse_sql_value(Some("3.5")), json!(3.5));
        assert_eq!(parse_sql_value(Some("true")), json!(true));
        assert_eq!(parse_sql_value(Some("hello")), json!("hello"));
        assert_eq!(parse_sql_value(None), Value::Null);
    }
}
