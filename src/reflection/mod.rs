//! Tool-usage analytics and self-reflection.
//!
//! Turns the recent tool-call log into aggregate statistics and a short
//! written assessment with insights and recommendations.

use crate::types::{ToolCallRecord, ToolCallStatus};
use serde::Serialize;
use std::collections::BTreeMap;

/// Reflection type stored for tool-usage analyses.
pub const TOOL_USAGE_REFLECTION: &str = "tool_usage_analysis";

/// Confidence recorded with every tool-usage reflection.
pub const REFLECTION_CONFIDENCE: f64 = 0.8;

const EXCELLENT_SUCCESS_RATE: f64 = 95.0;
const GOOD_SUCCESS_RATE: f64 = 80.0;
const INSIGHT_SUCCESS_RATE: f64 = 90.0;
const FLAGGED_ERROR_RATE: f64 = 10.0;
const HIGH_ERROR_RATE: f64 = 15.0;
const PROBLEMATIC_ERROR_RATE: f64 = 20.0;
const SLOW_EXECUTION_MS: f64 = 1000.0;
const OPTIMIZE_EXECUTION_MS: f64 = 500.0;
const OVER_RELIANCE_SHARE: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPattern {
    pub tool: String,
    pub error_count: u64,
    /// Percentage of this tool's calls that failed
    pub error_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientActivity {
    pub total: u64,
    pub successful: u64,
}

/// Aggregates over a window of tool calls.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageStats {
    pub period_days: i64,
    pub total_calls: u64,
    /// Percentage, 0 when there were no calls
    pub success_rate: f64,
    /// Mean over successful calls that recorded a duration
    pub avg_execution_time: f64,
    pub tool_frequency: BTreeMap<String, u64>,
    pub error_patterns: Vec<ErrorPattern>,
    pub client_activity: BTreeMap<String, ClientActivity>,
}

impl UsageStats {
    pub fn from_calls(calls: &[ToolCallRecord], period_days: i64) -> Self {
        let mut stats = UsageStats {
            period_days,
            total_calls: calls.len() as u64,
            ..Default::default()
        };
        if calls.is_empty() {
            return stats;
        }

        let mut successes = 0u64;
        let mut durations = Vec::new();
        let mut errors: BTreeMap<String, u64> = BTreeMap::new();

        for call in calls {
            *stats.tool_frequency.entry(call.tool_name.clone()).or_default() += 1;
            let client = stats.client_activity.entry(call.client_id.clone()).or_default();
            client.total += 1;

            match call.status {
                ToolCallStatus::Success => {
                    successes += 1;
                    client.successful += 1;
                    if let Some(ms) = call.execution_time_ms {
                        durations.push(ms);
                    }
                }
                ToolCallStatus::Error => {
                    *errors.entry(call.tool_name.clone()).or_default() += 1;
                }
            }
        }

        stats.success_rate = successes as f64 / stats.total_calls as f64 * 100.0;
        if !durations.is_empty() {
            stats.avg_execution_time = durations.iter().sum::<f64>() / durations.len() as f64;
        }
        stats.error_patterns = errors
            .into_iter()
            .map(|(tool, error_count)| {
                let uses = stats.tool_frequency.get(&tool).copied().unwrap_or(1).max(1);
                ErrorPattern {
                    error_rate: error_count as f64 / uses as f64 * 100.0,
                    tool,
                    error_count,
                }
            })
            .collect();
        stats
    }

    /// Tools by descending call count, ties by name.
    pub fn ranked_tools(&self) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .tool_frequency
            .iter()
            .map(|(tool, count)| (tool.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked
    }

    pub fn most_used_tool(&self) -> Option<(&str, u64)> {
        self.ranked_tools().into_iter().next()
    }

    fn least_used_tool(&self) -> Option<(&str, u64)> {
        self.ranked_tools().into_iter().last()
    }

    fn share_of(&self, count: u64) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            count as f64 / self.total_calls as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PeakTool {
    pub tool: String,
    pub count: u64,
    pub percentage: f64,
    pub insight: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProblematicTool {
    pub tool: String,
    pub error_rate: f64,
    pub insight: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EfficiencyMetrics {
    pub overall_success_rate: f64,
    pub avg_execution_time: f64,
    pub tools_count: usize,
    pub insight: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsagePatterns {
    pub peak_usage_tools: Vec<PeakTool>,
    pub problematic_tools: Vec<ProblematicTool>,
    pub efficiency_metrics: EfficiencyMetrics,
}

/// Written assessment of a usage window.
#[derive(Debug, Clone, Serialize)]
pub struct Reflection {
    pub content: String,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub patterns: UsagePatterns,
    pub confidence: f64,
}

pub fn reflect(stats: &UsageStats) -> Reflection {
    let (content, insights, recommendations) = if stats.total_calls == 0 {
        (
            format!(
                "No tool usage recorded in the past {} days. Activity was low or tool calls are not being logged.",
                stats.period_days
            ),
            vec!["Check that tool call logging is configured and reachable".to_string()],
            vec![
                "Verify the MCP server integration".to_string(),
                "Exercise a basic tool to confirm logging works".to_string(),
            ],
        )
    } else {
        (reflection_content(stats), usage_insights(stats), recommendations(stats))
    };

    Reflection {
        content,
        insights,
        recommendations,
        patterns: usage_patterns(stats),
        confidence: REFLECTION_CONFIDENCE,
    }
}

/// One-line verdict on the success rate.
pub fn performance_tone(success_rate: f64) -> &'static str {
    if success_rate >= EXCELLENT_SUCCESS_RATE {
        "excellent"
    } else if success_rate >= GOOD_SUCCESS_RATE {
        "good"
    } else {
        "needs improvement"
    }
}

fn reflection_content(stats: &UsageStats) -> String {
    let (top_tool, top_count) = stats.most_used_tool().unwrap_or(("unknown", 0));
    let mut content = format!(
        "Tool usage over the past {} days: {} calls with a {:.1}% success rate. \
         The most used tool was '{}' ({} calls).\n\nPerformance: {}.",
        stats.period_days,
        stats.total_calls,
        stats.success_rate,
        top_tool,
        top_count,
        performance_tone(stats.success_rate)
    );

    match performance_tone(stats.success_rate) {
        "excellent" => content.push_str(" Tool execution is highly reliable."),
        "good" => content.push_str(" Tool execution is mostly reliable with some failures."),
        _ => content.push_str(" Tool execution fails often enough to need attention."),
    }

    if !stats.error_patterns.is_empty() {
        content.push_str(&format!(
            "\n\nErrors: {} tool(s) failed at least once.",
            stats.error_patterns.len()
        ));
        let flagged: Vec<&str> = stats
            .error_patterns
            .iter()
            .filter(|p| p.error_rate > FLAGGED_ERROR_RATE)
            .map(|p| p.tool.as_str())
            .collect();
        if !flagged.is_empty() {
            content.push_str(&format!(" High error rates: {}.", flagged.join(", ")));
        }
    }
    content
}

fn usage_insights(stats: &UsageStats) -> Vec<String> {
    let mut insights = Vec::new();

    if let Some((tool, count)) = stats.most_used_tool() {
        insights.push(format!("Most relied-on tool is '{}' ({} uses)", tool, count));
        if stats.tool_frequency.len() > 1 {
            if let Some((tool, count)) = stats.least_used_tool() {
                insights.push(format!("'{}' is rarely used ({} uses)", tool, count));
            }
        }
    }
    if stats.success_rate < INSIGHT_SUCCESS_RATE {
        insights.push(format!(
            "Success rate of {:.1}% points to reliability problems",
            stats.success_rate
        ));
    }
    if stats.avg_execution_time > SLOW_EXECUTION_MS {
        insights.push(format!(
            "Average execution time of {:.0}ms is slow",
            stats.avg_execution_time
        ));
    }
    for pattern in &stats.error_patterns {
        if pattern.error_rate > HIGH_ERROR_RATE {
            insights.push(format!(
                "'{}' fails {:.1}% of the time",
                pattern.tool, pattern.error_rate
            ));
        }
    }
    insights
}

fn recommendations(stats: &UsageStats) -> Vec<String> {
    let mut recommendations = Vec::new();

    if stats.success_rate < GOOD_SUCCESS_RATE {
        recommendations.push("Investigate the tools with the most failures".to_string());
        recommendations.push("Add error handling and retries around failing tools".to_string());
    }
    if stats.avg_execution_time > OPTIMIZE_EXECUTION_MS {
        recommendations.push("Speed up slow tools, for example by caching repeated lookups".to_string());
    }
    if stats.tool_frequency.len() > 1 {
        if let Some((_, top)) = stats.most_used_tool() {
            if top as f64 > stats.total_calls as f64 * OVER_RELIANCE_SHARE {
                recommendations.push("Usage leans heavily on one tool; consider whether others fit better".to_string());
            }
        }
    }
    for pattern in &stats.error_patterns {
        if pattern.error_rate > PROBLEMATIC_ERROR_RATE {
            recommendations.push(format!("Prioritize fixing '{}'", pattern.tool));
        }
    }
    if recommendations.is_empty() {
        recommendations.push("Tool usage looks healthy; no changes needed".to_string());
    }
    recommendations
}

fn usage_patterns(stats: &UsageStats) -> UsagePatterns {
    let peak_usage_tools = stats
        .ranked_tools()
        .into_iter()
        .take(3)
        .map(|(tool, count)| {
            let percentage = stats.share_of(count);
            PeakTool {
                tool: tool.to_string(),
                count,
                percentage,
                insight: format!("'{}' accounts for {:.1}% of tool usage", tool, percentage),
            }
        })
        .collect();

    let problematic_tools = stats
        .error_patterns
        .iter()
        .filter(|p| p.error_rate > FLAGGED_ERROR_RATE)
        .map(|p| ProblematicTool {
            tool: p.tool.clone(),
            error_rate: p.error_rate,
            insight: format!("'{}' fails {:.1}% of the time", p.tool, p.error_rate),
        })
        .collect();

    UsagePatterns {
        peak_usage_tools,
        problematic_tools,
        efficiency_metrics: EfficiencyMetrics {
            overall_success_rate: stats.success_rate,
            avg_execution_time: stats.avg_execution_time,
            tools_count: stats.tool_frequency.len(),
            insight: format!(
                "{} distinct tools used with {:.1}% reliability",
                stats.tool_frequency.len(),
                stats.success_rate
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(tool: &str, status: ToolCallStatus, ms: Option<f64>) -> ToolCallRecord {
        ToolCallRecord {
            call_id: uuid::Uuid::new_v4().to_string(),
            timestamp: "2026-01-01T00:00:00.000000Z".into(),
            client_id: "desktop".into(),
            tool_name: tool.into(),
            parameters: serde_json::json!({}),
            result: None,
            status,
            execution_time_ms: ms,
            error_message: None,
        }
    }

    #[test]
    fn test_stats_from_calls() {
        let calls = vec![
            call("search_memories", ToolCallStatus::Success, Some(100.0)),
            call("search_memories", ToolCallStatus::Success, Some(300.0)),
            call("search_memories", ToolCallStatus::Error, Some(9000.0)),
            call("create_memory", ToolCallStatus::Success, None),
        ];
        let stats = UsageStats::from_calls(&calls, 7);

        assert_eq!(stats.total_calls, 4);
        assert!((stats.success_rate - 75.0).abs() < 1e-9);
        assert!((stats.avg_execution_time - 200.0).abs() < 1e-9);
        assert_eq!(stats.tool_frequency["search_memories"], 3);
        assert_eq!(stats.error_patterns.len(), 1);
        assert!((stats.error_patterns[0].error_rate - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.client_activity["desktop"], ClientActivity { total: 4, successful: 3 });
    }

    #[test]
    fn test_reflect_without_calls() {
        let reflection = reflect(&UsageStats::from_calls(&[], 7));
        assert!(reflection.content.contains("No tool usage"));
        assert_eq!(reflection.insights.len(), 1);
        assert_eq!(reflection.recommendations.len(), 2);
        assert!(reflection.patterns.peak_usage_tools.is_empty());
    }

    #[test]
    fn test_reflect_flags_problems() {
        let mut calls = vec![call("flaky", ToolCallStatus::Error, None); 3];
        calls.extend(vec![call("flaky", ToolCallStatus::Success, Some(1500.0)); 7]);
        calls.push(call("other", ToolCallStatus::Success, Some(1500.0)));
        let stats = UsageStats::from_calls(&calls, 7);
        let reflection = reflect(&stats);

        assert_eq!(performance_tone(stats.success_rate), "needs improvement");
        assert!(reflection.content.contains("High error rates: flaky"));
        assert!(reflection.insights.iter().any(|i| i.contains("slow")));
        assert!(reflection.recommendations.iter().any(|r| r.contains("caching")));
        assert!(reflection.recommendations.iter().any(|r| r.contains("heavily on one tool")));
        assert!(reflection.recommendations.iter().any(|r| r.contains("Prioritize fixing 'flaky'")));
        assert_eq!(reflection.patterns.problematic_tools.len(), 1);
        assert_eq!(reflection.patterns.peak_usage_tools[0].tool, "flaky");
    }

    #[test]
    fn test_healthy_usage() {
        let calls: Vec<_> = ["a", "b", "c", "a"]
            .iter()
            .map(|t| call(t, ToolCallStatus::Success, Some(20.0)))
            .collect();
        let reflection = reflect(&UsageStats::from_calls(&calls, 1));
        assert!(reflection.content.contains("excellent"));
        assert_eq!(reflection.recommendations, vec!["Tool usage looks healthy; no changes needed"]);
    }
}
