//! Analytics tools
//!
//! `trending`, `track_search`, `track_click` and `track_error`. Clicks and
//! errors are queued in the background; `track_search` waits so that an
//! anonymous caller gets an explicit error.

use super::format::format_trending;
use super::{ToolContext, TOOL_TIMEOUT_SECS};
use crate::analytics::AnalyticsEvent;
use crate::cli::{TrackClickArgs, TrackErrorArgs, TrackSearchArgs, TrendingArgs};
use crate::error::{validate_tracked_query, AppError};
use crate::mcp::{McpResponse, ToolResult};
use crate::store::EntityKind;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use tokio::time::{timeout, Duration};

const DEFAULT_TRENDING_LIMIT: usize = 10;
const MAX_TRENDING_LIMIT: usize = 100;

/// Parse `args` and run `tool` under the tool timeout
async fn run_tool<A, F, Fut>(id: Option<Value>, args: Value, name: &str, tool: F) -> McpResponse
where
    A: DeserializeOwned,
    F: FnOnce(A) -> Fut,
    Fut: Future<Output = Result<ToolResult, AppError>>,
{
    let result = async {
        let args: A = serde_json::from_value(args)
            .map_err(|e| AppError::InvalidInput(format!("Invalid arguments: {}", e)))?;
        tool(args).await
    };

    match timeout(Duration::from_secs(TOOL_TIMEOUT_SECS), result).await {
        Ok(Ok(content)) => McpResponse::tool_result(id, content),
        Ok(Err(e)) => McpResponse::error(id, e.error_code(), &e.message()),
        Err(_) => McpResponse::error(
            id,
            "timeout",
            &format!("{} request exceeded 120 second timeout", name),
        ),
    }
}

pub async fn handle_trending(id: Option<Value>, args: Value, ctx: &ToolContext) -> McpResponse {
    run_tool(id, args, "Trending", |args| execute_trending(args, ctx)).await
}

pub async fn handle_track_search(id: Option<Value>, args: Value, ctx: &ToolContext) -> McpResponse {
    run_tool(id, args, "Track search", |args| execute_track_search(args, ctx)).await
}

pub async fn handle_track_click(id: Option<Value>, args: Value, ctx: &ToolContext) -> McpResponse {
    run_tool(id, args, "Track click", |args| execute_track_click(args, ctx)).await
}

pub async fn handle_track_error(id: Option<Value>, args: Value, ctx: &ToolContext) -> McpResponse {
    run_tool(id, args, "Track error", |args| execute_track_error(args, ctx)).await
}

/// Explicit user id if given and non-blank, else the signed-in user
async fn attributed_user(explicit: Option<String>, ctx: &ToolContext) -> Option<String> {
    match explicit.filter(|id| !id.trim().is_empty()) {
        Some(id) => Some(id),
        None => ctx.identity().await.user_id().map(str::to_string),
    }
}

pub async fn execute_trending(args: TrendingArgs, ctx: &ToolContext) -> Result<ToolResult, AppError> {
    let limit = args
        .limit
        .unwrap_or(DEFAULT_TRENDING_LIMIT)
        .clamp(1, MAX_TRENDING_LIMIT);
    let terms = ctx.analytics().trending(limit).await?;

    let metadata = serde_json::to_value(&terms)?;
    let text = if args.json {
        serde_json::to_string_pretty(&terms)?
    } else {
        format_trending(&terms)
    };
    Ok(ToolResult::with_metadata(text, metadata))
}

pub async fn execute_track_search(
    args: TrackSearchArgs,
    ctx: &ToolContext,
) -> Result<ToolResult, AppError> {
    let identity = ctx.identity().await;
    ctx.mark_dirty();
    let outcome = ctx
        .analytics()
        .track_search(
            &identity,
            &args.query,
            args.result_count,
            args.clicked,
            args.category,
            Utc::now(),
        )
        .await?;

    let verb = if outcome.coalesced { "Updated" } else { "Recorded" };
    let text = format!(
        "✓ {} search '{}' · searched {} times overall",
        verb, outcome.term, outcome.trending_count
    );
    Ok(ToolResult::with_metadata(text, serde_json::to_value(&outcome)?))
}

pub async fn execute_track_click(
    args: TrackClickArgs,
    ctx: &ToolContext,
) -> Result<ToolResult, AppError> {
    validate_tracked_query(&args.query)?;
    if args.result_id.trim().is_empty() {
        return Err(AppError::InvalidInput("Result id cannot be empty".to_string()));
    }
    let kind: EntityKind = args.result_type.parse().map_err(AppError::InvalidInput)?;
    let user_id = attributed_user(args.user_id, ctx).await;

    ctx.dispatch(AnalyticsEvent::Click {
        query: args.query,
        result_id: args.result_id.clone(),
        result_kind: kind.singular().to_string(),
        position: args.position,
        user_id,
    })
    .await;

    Ok(ToolResult::text(format!(
        "✓ Click on {} recorded",
        args.result_id
    )))
}

pub async fn execute_track_error(
    args: TrackErrorArgs,
    ctx: &ToolContext,
) -> Result<ToolResult, AppError> {
    if args.message.trim().is_empty() {
        return Err(AppError::InvalidInput("Error message cannot be empty".to_string()));
    }
    let user_id = attributed_user(args.user_id, ctx).await;

    ctx.dispatch(AnalyticsEvent::Error {
        query: args.query,
        message: args.message,
        user_id,
    })
    .await;

    Ok(ToolResult::text("✓ Error recorded"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MetricKind;
    use crate::tools::test_context::context;
    use serde_json::json;

    #[tokio::test]
    async fn test_track_search_requires_user() {
        let (ctx, _) = context(None);
        let resp = handle_track_search(Some(json!(1)), json!({ "query": "jazz" }), &ctx).await;
        assert_eq!(resp.error.unwrap().code, "unauthenticated");
    }

    #[tokio::test]
    async fn test_track_search_then_trending() {
        let (ctx, _) = context(Some("u2"));
        for _ in 0..2 {
            let resp = handle_track_search(
                Some(json!(1)),
                json!({ "query": "Jazz ", "resultCount": 1 }),
                &ctx,
            )
            .await;
            assert!(resp.error.is_none());
        }

        let result = execute_trending(TrendingArgs::default(), &ctx).await.unwrap();
        assert!(result.content[0].text.contains("1. jazz · 2 searches"));
    }

    #[tokio::test]
    async fn test_track_click_is_queued() {
        let (ctx, store) = context(Some("u1"));
        let args = TrackClickArgs {
            query: "jazz".into(),
            result_id: "v3".into(),
            result_type: "vibes".into(),
            position: 0,
            user_id: None,
        };
        execute_track_click(args, &ctx).await.unwrap();
        ctx.flush().await.unwrap();

        let metrics = store.snapshot().await.search_metrics;
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].kind, MetricKind::Click);
        assert_eq!(metrics[0].clicked_result_id.as_deref(), Some("v3"));
        assert_eq!(metrics[0].clicked_result_kind.as_deref(), Some("vibe"));
        assert_eq!(metrics[0].click_position, Some(0));
        assert_eq!(metrics[0].user_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_track_click_rejects_unknown_kind() {
        let (ctx, _) = context(None);
        let resp = handle_track_click(
            Some(json!(1)),
            json!({ "query": "jazz", "resultId": "v3", "resultType": "planet", "position": 1 }),
            &ctx,
        )
        .await;
        assert_eq!(resp.error.unwrap().code, "invalid_input");
    }

    #[tokio::test]
    async fn test_track_error_is_queued() {
        let (ctx, store) = context(None);
        let resp = handle_track_error(
            Some(json!(1)),
            json!({ "query": "jazz", "error": "backend timeout" }),
            &ctx,
        )
        .await;
        assert!(resp.error.is_none());

        ctx.flush().await.unwrap();
        let metrics = store.snapshot().await.search_metrics;
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].error_message.as_deref(), Some("backend timeout"));
        assert_eq!(metrics[0].user_id, None);
    }

    #[tokio::test]
    async fn test_explicit_user_id_overrides_identity() {
        let (ctx, store) = context(Some("u1"));
        let resp = handle_track_click(
            Some(json!(1)),
            json!({ "query": "jazz", "resultId": "u2", "resultType": "user", "position": 2, "userId": "u3" }),
            &ctx,
        )
        .await;
        assert!(resp.error.is_none());

        let args = TrackErrorArgs {
            query: "jazz".into(),
            message: "boom".into(),
            user_id: Some("  ".into()),
        };
        execute_track_error(args, &ctx).await.unwrap();
        ctx.flush().await.unwrap();

        let mut users: Vec<_> = store
            .snapshot()
            .await
            .search_metrics
            .into_iter()
            .map(|m| (m.kind, m.user_id))
            .collect();
        users.sort_by_key(|(kind, _)| *kind == MetricKind::Error);
        assert_eq!(
            users,
            vec![
                (MetricKind::Click, Some("u3".to_string())),
                (MetricKind::Error, Some("u1".to_string())),
            ]
        );
    }
}
