//! Search and suggest tools
//!
//! Implements the `search(query, ...)` and `suggest(query)` MCP tools

use super::format::{format_search_response, format_suggestions};
use super::{ToolContext, TOOL_TIMEOUT_SECS};
use crate::cli::{SearchArgs, SuggestArgs};
use crate::error::{validate_query, AppError};
use crate::mcp::{McpResponse, ToolResult};
use crate::search::suggest;
use chrono::Utc;
use serde_json::Value;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// Handle search tool call (MCP)
pub async fn handle_search(id: Option<Value>, args: Value, ctx: &ToolContext) -> McpResponse {
    match timeout(
        Duration::from_secs(TOOL_TIMEOUT_SECS),
        handle_search_impl(args, ctx),
    )
    .await
    {
        Ok(result) => match result {
            Ok(content) => McpResponse::tool_result(id, content),
            Err(e) => McpResponse::error(id, e.error_code(), &e.message()),
        },
        Err(_) => McpResponse::error(id, "timeout", "Search request exceeded 120 second timeout"),
    }
}

async fn handle_search_impl(args: Value, ctx: &ToolContext) -> Result<ToolResult, AppError> {
    let query = args
        .get("query")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let search_args: SearchArgs = match serde_json::from_value(args) {
        Ok(search_args) => search_args,
        Err(e) => {
            let err = AppError::InvalidInput(format!("Invalid arguments: {}", e));
            ctx.record_failure(&query, &err).await;
            return Err(err);
        }
    };

    execute_search(search_args, ctx).await
}

/// Shared implementation for search (used by MCP and CLI)
pub async fn execute_search(args: SearchArgs, ctx: &ToolContext) -> Result<ToolResult, AppError> {
    let as_json = args.json;
    let query = args.query.clone();
    let request = match args.into_request() {
        Ok(request) => request,
        Err(e) => {
            ctx.record_failure(&query, &e).await;
            return Err(e);
        }
    };

    debug!("Search request: '{}'", request.query);
    let response = ctx.search(&request).await?;

    let metadata = serde_json::to_value(&response)?;
    if as_json {
        let text = serde_json::to_string_pretty(&response)?;
        return Ok(ToolResult::with_metadata(text, metadata));
    }
    let markdown = format_search_response(&response, &request.query);
    Ok(ToolResult::with_metadata(markdown, metadata))
}

/// Handle suggest tool call (MCP)
pub async fn handle_suggest(id: Option<Value>, args: Value, ctx: &ToolContext) -> McpResponse {
    let result = async {
        let args: SuggestArgs = serde_json::from_value(args)
            .map_err(|e| AppError::InvalidInput(format!("Invalid arguments: {}", e)))?;
        execute_suggest(args, ctx).await
    };

    match timeout(Duration::from_secs(TOOL_TIMEOUT_SECS), result).await {
        Ok(Ok(content)) => McpResponse::tool_result(id, content),
        Ok(Err(e)) => McpResponse::error(id, e.error_code(), &e.message()),
        Err(_) => McpResponse::error(id, "timeout", "Suggest request exceeded 120 second timeout"),
    }
}

pub async fn execute_suggest(args: SuggestArgs, ctx: &ToolContext) -> Result<ToolResult, AppError> {
    validate_query(&args.query)?;
    let identity = ctx.identity().await;

    let suggestions = suggest(
        ctx.engine(),
        ctx.analytics(),
        &identity,
        &args.query,
        Utc::now(),
    )
    .await?;

    let metadata = serde_json::to_value(&suggestions)?;
    let text = if args.json {
        serde_json::to_string_pretty(&suggestions)?
    } else {
        format_suggestions(&suggestions)
    };
    Ok(ToolResult::with_metadata(text, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Collection, MetricKind};
    use crate::tools::test_context::context;
    use serde_json::json;

    #[tokio::test]
    async fn test_search_args_parsing() {
        let args = json!({
            "query": "coffee",
            "limit": 2
        });

        let parsed: SearchArgs = serde_json::from_value(args).unwrap();
        assert_eq!(parsed.query, "coffee");
        assert_eq!(parsed.page_size, Some(2));
    }

    #[tokio::test]
    async fn test_handle_search_returns_markdown_and_metadata() {
        let (ctx, _) = context(None);
        let resp = handle_search(Some(json!(1)), json!({ "query": "jazz" }), &ctx).await;
        assert!(resp.error.is_none());

        let result = resp.result.unwrap();
        let item = &result["content"][0];
        assert!(item["text"].as_str().unwrap().contains("Rainy day **jazz**"));
        assert_eq!(item["metadata"]["vibes"][0]["id"], "v3");
        assert_eq!(item["metadata"]["totalCounts"]["vibes"], 1);
    }

    #[tokio::test]
    async fn test_search_json_output() {
        let (ctx, _) = context(None);
        let args = SearchArgs {
            query: "#chill".into(),
            json: true,
            ..Default::default()
        };
        let result = execute_search(args, &ctx).await.unwrap();
        let parsed: Value = serde_json::from_str(&result.content[0].text).unwrap();
        assert_eq!(parsed["totalCount"], 3);
        assert_eq!(parsed["hasNextPage"], false);
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let (ctx, store) = context(None);
        let resp = handle_search(Some(json!(2)), json!({ "query": 42 }), &ctx).await;
        assert_eq!(resp.error.unwrap().code, "invalid_input");

        ctx.flush().await.unwrap();
        let metrics = store.snapshot().await.search_metrics;
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].kind, MetricKind::Error);
    }

    #[tokio::test]
    async fn test_bad_date_argument_records_error_metric() {
        let (ctx, store) = context(Some("u1"));
        let args = SearchArgs {
            query: "jazz".into(),
            after: Some("yesterday".into()),
            ..Default::default()
        };
        let err = execute_search(args, &ctx).await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_input");

        ctx.flush().await.unwrap();
        let metrics = store.snapshot().await.search_metrics;
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].kind, MetricKind::Error);
        assert_eq!(metrics[0].query, "jazz");
        assert_eq!(metrics[0].user_id.as_deref(), Some("u1"));
        assert!(metrics[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("yesterday"));
        assert_eq!(store.len(Collection::SearchHistory).await, 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_an_error_response() {
        let (ctx, store) = context(None);
        store.set_unavailable(Collection::Users, true).await;

        let resp = handle_search(Some(json!(3)), json!({ "query": "alice" }), &ctx).await;
        assert_eq!(resp.error.unwrap().code, "candidate_fetch_failed");

        ctx.flush().await.unwrap();
        let metrics = store.snapshot().await.search_metrics;
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].kind, MetricKind::Error);
    }

    #[tokio::test]
    async fn test_handle_suggest() {
        let (ctx, _) = context(Some("u1"));
        let resp = handle_suggest(Some(json!(4)), json!({}), &ctx).await;
        assert!(resp.error.is_none());

        let result = resp.result.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("## Popular tags"));
        assert!(text.contains("#programming · used 75 times"));
    }

    #[tokio::test]
    async fn test_suggest_for_query() {
        let (ctx, _) = context(None);
        let args = SuggestArgs {
            query: "coffee".into(),
            json: false,
        };
        let result = execute_suggest(args, &ctx).await.unwrap();
        let text = &result.content[0].text;
        assert!(text.starts_with("# Suggestions for 'coffee'"));
        assert!(text.contains("Morning **coffee** ritual"));
    }
}
