/// OpenRouter language model client
///
/// Everything the engine asks a language model for goes through the
/// LanguageModel trait: schema interpretation, monitor query generation,
/// alert message rendering, and the chat-to-SQL agent. OpenRouterService is
/// the production implementation over the chat-completions API.

use crate::config::OpenRouterConfig;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default model for schema interpretation and monitor generation
pub const DEFAULT_MODEL: &str = "anthropic/claude-3-sonnet";

/// Default model for the chat-to-SQL agent
pub const DEFAULT_SQL_MODEL: &str = "openai/gpt-4";

/// A monitoring query produced by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub query: String,
    pub explanation: String,
}

/// Answer from the chat-to-SQL agent
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlAnswer {
    pub sql: String,
    pub explanation: String,
    /// line, bar, pie, or table
    pub chart_type: String,
}

/// Boundary to the language model collaborator
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Turn a serialized schema into a natural-language analysis
    async fn interpret_schema(&self, schema_json: &str, model: &str, temperature: f64) -> Result<String>;

    /// Produce a monitoring query plus explanation for a condition
    async fn generate_monitor_query(
        &self,
        entity_description: &str,
        condition: &str,
        model: &str,
    ) -> Result<GeneratedQuery>;

    /// Render an alert message from a template and run data
    async fn generate_alert_message(&self, template: &str, data: &Value, model: &str) -> Result<String>;

    /// Answer a natural-language question with SQL over the given schema
    async fn answer_question(&self, question: &str, context: &str, schema_context: &str) -> Result<SqlAnswer>;

    /// Suggest up to three follow-up questions for a previous answer
    async fn suggest_follow_ups(&self, question: &str, summary: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Chat-completions client for openrouter.ai
#[derive(Debug, Clone)]
pub struct OpenRouterService {
    api_key: String,
    base_url: String,
    referer: String,
    title: String,
    http: reqwest::Client,
}

impl OpenRouterService {
    /// The API key is mandatory; a keyless deployment fails at startup
    /// rather than on the first workflow run
    pub fn new(config: &OpenRouterConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            bail!("OpenRouter API key is required");
        }
        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            referer: config.app_url.clone(),
            title: config.app_name.clone(),
            http: reqwest::Client::new(),
        })
    }

    async fn chat(&self, request: ChatRequest) -> Result<String> {
        tracing::debug!("🧠 OpenRouter request: model={}", request.model);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("OpenRouter request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let detail = body
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
                .unwrap_or_else(|| status.to_string());
            bail!("OpenRouter API error: {}", detail);
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("OpenRouter returned an unreadable response: {}", e))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("OpenRouter response contained no choices"))
    }
}

#[async_trait]
impl LanguageModel for OpenRouterService {
    async fn interpret_schema(&self, schema_json: &str, model: &str, temperature: f64) -> Result<String> {
        let system_prompt = "You are a database schema analyst. Analyze the provided database schema and identify:\n\
            1. Key entities (e.g., users, events, sessions, products)\n\
            2. Important relationships between tables\n\
            3. Event tracking patterns\n\
            4. User behavior indicators\n\
            5. Business metrics that can be derived\n\n\
            Provide a clear, structured analysis that will help set up automated monitoring and alerts.";

        let user_prompt = format!(
            "Analyze this database schema and identify key entities, relationships, and monitoring opportunities:\n\n{}",
            schema_json
        );

        self.chat(ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage { role: "system", content: system_prompt.to_string() },
                ChatMessage { role: "user", content: user_prompt },
            ],
            temperature: Some(temperature),
            max_tokens: Some(2000),
        })
        .await
    }

    async fn generate_monitor_query(
        &self,
        entity_description: &str,
        condition: &str,
        model: &str,
    ) -> Result<GeneratedQuery> {
        let system_prompt = "You are an SQL expert. Generate SQL queries for monitoring specific conditions in a database.\n\
            Return your response as JSON with two fields: \"query\" (the SQL query) and \"explanation\" (brief description).";

        let user_prompt = format!(
            "Generate a SQL query to monitor: {}\n\nContext: {}\n\nReturn JSON with \"query\" and \"explanation\" fields.",
            condition, entity_description
        );

        let content = self
            .chat(ChatRequest {
                model: model.to_string(),
                messages: vec![
                    ChatMessage { role: "system", content: system_prompt.to_string() },
                    ChatMessage { role: "user", content: user_prompt },
                ],
                temperature: Some(0.3),
                max_tokens: Some(1000),
            })
            .await?;

        Ok(parse_generated_query(&content))
    }

    async fn generate_alert_message(&self, template: &str, data: &Value, model: &str) -> Result<String> {
        let system_prompt = "You are a helpful assistant that generates alert messages based on templates and data.\n\
            Replace template variables like {{variable}} with actual values from the provided data.\n\
            Keep the message clear, concise, and actionable.";

        let user_prompt = format!(
            "Template: {}\n\nData: {}\n\nGenerate the final alert message with all variables replaced.",
            template,
            serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string())
        );

        self.chat(ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage { role: "system", content: system_prompt.to_string() },
                ChatMessage { role: "user", content: user_prompt },
            ],
            temperature: Some(0.5),
            max_tokens: Some(500),
        })
        .await
    }

    async fn answer_question(&self, question: &str, context: &str, schema_context: &str) -> Result<SqlAnswer> {
        let prompt = format!(
            "You are a SQL expert helping product managers analyze their data.\n\n\
            Database Schema:\n{schema}\n\n\
            User Question: {question}\n\n\
            Previous Context: {context}\n\n\
            Generate a SQL query that answers the user's question. Follow these guidelines:\n\
            1. Use proper PostgreSQL syntax\n\
            2. Include appropriate WHERE clauses for time ranges when relevant\n\
            3. Use meaningful column aliases\n\
            4. Optimize for readability and performance\n\
            5. If the question asks for trends, include time grouping (daily, weekly, monthly)\n\n\
            Also suggest the best chart type for visualizing this data:\n\
            - 'line' for trends over time\n\
            - 'bar' for comparisons between categories\n\
            - 'pie' for proportions/percentages\n\
            - 'table' for detailed data listings\n\n\
            Response format:\n\
            SQL: [your sql query]\n\
            CHART_TYPE: [suggested chart type]\n\
            EXPLANATION: [brief explanation of what the query does and insights it provides]",
            schema = schema_context,
            question = question,
            context = context
        );

        let content = self
            .chat(ChatRequest {
                model: DEFAULT_SQL_MODEL.to_string(),
                messages: vec![ChatMessage { role: "user", content: prompt }],
                temperature: Some(0.0),
                max_tokens: Some(1500),
            })
            .await?;

        Ok(parse_sql_answer(&content))
    }

    async fn suggest_follow_ups(&self, question: &str, summary: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "Based on this SQL query and its results, suggest 3 relevant follow-up questions a PM might ask:\n\n\
            Previous Query: {}\n\
            Results Summary: {}\n\n\
            Suggest practical follow-up questions that would provide additional insights.",
            question, summary
        );

        let content = self
            .chat(ChatRequest {
                model: DEFAULT_SQL_MODEL.to_string(),
                messages: vec![ChatMessage { role: "user", content: prompt }],
                temperature: Some(0.5),
                max_tokens: Some(300),
            })
            .await?;

        Ok(content
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .take(3)
            .map(|line| line.to_string())
            .collect())
    }
}

/// Parse the model's monitor-query JSON, falling back to treating the whole
/// completion as the query when it is not valid JSON
fn parse_generated_query(content: &str) -> GeneratedQuery {
    serde_json::from_str(content).unwrap_or_else(|_| GeneratedQuery {
        query: content.to_string(),
        explanation: "Generated monitoring query".to_string(),
    })
}

/// Parse the SQL:/CHART_TYPE:/EXPLANATION: sections of a chat-to-SQL answer
fn parse_sql_answer(content: &str) -> SqlAnswer {
    let sql = section(content, "SQL:", &["CHART_TYPE:", "EXPLANATION:"]);
    let chart = section(content, "CHART_TYPE:", &["SQL:", "EXPLANATION:"]);
    let explanation = section(content, "EXPLANATION:", &["SQL:", "CHART_TYPE:"]);

    let chart_type = match chart.trim() {
        t @ ("line" | "bar" | "pie" | "table") => t,
        _ => "table",
    };

    SqlAnswer {
        sql: sql.trim().to_string(),
        explanation: explanation.trim().to_string(),
        chart_type: chart_type.to_string(),
    }
}

/// The text after a marker, up to the nearest of the stop markers
fn section(text: &str, marker: &str, stops: &[&str]) -> String {
    let Some(start) = text.find(marker) else {
        return String::new();
    };
    let rest = &text[start + marker.len()..];
    let end = stops.iter().filter_map(|stop| rest.find(stop)).min().unwrap_or(rest.len());
    rest[..end].to_string()
}

/// Render a schema as the compact table/column listing the prompts expect
pub fn schema_context(schema: &crate::workflow::types::DataSchema) -> String {
    schema
        .tables
        .iter()
        .map(|table| {
            let columns = table
                .columns
                .iter()
                .map(|column| {
                    format!(
                        "  {} ({}{})",
                        column.name,
                        column.data_type,
                        if column.nullable { ", nullable" } else { "" }
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            format!("Table: {}\n{}", table.name, columns)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{DataSchema, SchemaColumn, SchemaTable};

    #[test]
    fn generated_query_parses_json_payload() {
        let parsed = parse_generated_query(
            r#"{"query": "SELECT count(*) FROM events", "explanation": "Counts all events"}"#,
        );
        assert_eq!(parsed.query, "SELECT count(*) FROM events");
        assert_eq!(parsed.explanation, "Counts all events");
    }

    #[test]
    fn generated_query_falls_back_to_raw_content() {
        let parsed = parse_generated_query("SELECT 1");
        assert_eq!(parsed.query, "SELECT 1");
        assert_eq!(parsed.explanation, "Generated monitoring query");
    }

    #[test]
    fn sql_answer_sections_are_extracted() {
        let answer = parse_sql_answer(
            "SQL: SELECT day, count(*) AS signups FROM users GROUP BY day\n\
             CHART_TYPE: line\n\
             EXPLANATION: Daily signup counts over time",
        );
        assert_eq!(answer.sql, "SELECT day, count(*) AS signups FROM users GROUP BY day");
        assert_eq!(answer.chart_type, "line");
        assert_eq!(answer.explanation, "Daily signup counts over time");
    }

    #[test]
    fn sql_answer_defaults_chart_type_to_table() {
        let answer = parse_sql_answer("SQL: SELECT 1\nEXPLANATION: trivial");
        assert_eq!(answer.chart_type, "table");
        assert_eq!(answer.sql, "SELECT 1");
    }

    #[test]
    fn schema_context_lists_tables_and_columns() {
        let schema = DataSchema {
            tables: vec![SchemaTable {
                name: "users".to_string(),
                columns: vec![SchemaColumn {
                    name: "id".to_string(),
                    data_type: "uuid".to_string(),
                    nullable: false,
                    primary_key: Some(true),
                    foreign_key: None,
                }],
                row_count: None,
            }],
            relationships: Vec::new(),
            entities: Vec::new(),
        };

        let context = schema_context(&schema);
        assert!(context.contains("Table: users"));
        assert!(context.contains("id (uuid)"));
    }
}
