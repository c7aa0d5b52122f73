//! MCP Prompts for guided KQL analysis.
//!
//! Each prompt is a short scripted conversation that hands the model ready
//! to run queries for one kind of analysis. Arguments are substituted
//! verbatim into the KQL text.

use crate::error::KustoError;
use crate::security::quote_string_literal;
use rmcp::model::{
    GetPromptResult, Prompt, PromptArgument, PromptMessage, PromptMessageContent,
    PromptMessageRole,
};
use std::collections::HashMap;

fn prompt_arg(name: &str, description: &str, required: bool) -> PromptArgument {
    PromptArgument {
        name: name.to_string(),
        title: None,
        description: Some(description.to_string()),
        required: Some(required),
    }
}

fn prompt(name: &str, description: &str, arguments: Vec<PromptArgument>) -> Prompt {
    Prompt {
        name: name.to_string(),
        title: None,
        description: Some(description.to_string()),
        arguments: Some(arguments),
        icons: None,
        meta: None,
    }
}

/// Build the list of available prompts.
pub fn build_prompt_list() -> Vec<Prompt> {
    vec![
        prompt(
            "time_series_analysis",
            "Create a time series analysis for a specified table, time column, and measure",
            vec![
                prompt_arg("table_name", "The name of the Kusto table", true),
                prompt_arg("time_column", "The column containing timestamps", true),
                prompt_arg("measure_column", "The column to measure/aggregate", true),
                prompt_arg(
                    "filter_condition",
                    "Optional filter condition (without 'where')",
                    false,
                ),
            ],
        ),
        prompt(
            "cohort_analysis",
            "Create a cohort analysis for retention/churn studies",
            vec![
                prompt_arg("table_name", "The name of the Kusto table", true),
                prompt_arg(
                    "cohort_column",
                    "The column that identifies the cohort (e.g., user_id)",
                    true,
                ),
                prompt_arg("date_column", "The column containing event dates", true),
                prompt_arg(
                    "event_column",
                    "Optional column for filtering specific events",
                    false,
                ),
            ],
        ),
        prompt(
            "funnel_analysis",
            "Create a funnel analysis to track user journey through a sequence of events",
            vec![
                prompt_arg("table_name", "The name of the Kusto table", true),
                prompt_arg("user_id_column", "Column that identifies the user", true),
                prompt_arg("event_column", "Column that contains the event name/type", true),
                prompt_arg("timestamp_column", "Column containing the event timestamp", true),
                prompt_arg(
                    "funnel_steps",
                    "Event names in funnel order, comma-separated or as a JSON array",
                    true,
                ),
            ],
        ),
        prompt(
            "data_quality_check",
            "Create a data quality assessment for a Kusto table",
            vec![prompt_arg("table_name", "The name of the table to analyze", true)],
        ),
    ]
}

/// Get a specific prompt with arguments filled in.
pub fn get_prompt(
    name: &str,
    arguments: Option<&HashMap<String, String>>,
) -> Result<GetPromptResult, KustoError> {
    let args = arguments.cloned().unwrap_or_default();

    let (description, turns) = match name {
        "time_series_analysis" => time_series_analysis(&args),
        "cohort_analysis" => cohort_analysis(&args),
        "funnel_analysis" => funnel_analysis(&args),
        "data_quality_check" => data_quality_check(&args),
        _ => Err(format!("Unknown prompt: {}", name)),
    }
    .map_err(KustoError::invalid_input)?;

    Ok(GetPromptResult {
        description: Some(description.to_string()),
        messages: turns.into_iter().map(Turn::into_message).collect(),
    })
}

// =========================================================================
// Conversation building blocks
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
struct Turn {
    speaker: Speaker,
    text: String,
}

impl Turn {
    fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }

    fn into_message(self) -> PromptMessage {
        let role = match self.speaker {
            Speaker::User => PromptMessageRole::User,
            Speaker::Assistant => PromptMessageRole::Assistant,
        };
        PromptMessage {
            role,
            content: PromptMessageContent::text(self.text),
        }
    }
}

type Conversation = (&'static str, Vec<Turn>);

fn required<'a>(args: &'a HashMap<String, String>, name: &str) -> Result<&'a str, String> {
    args.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("Missing required argument: {}", name))
}

fn optional<'a>(args: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    args.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Accepts `["a", "b"]` or `a, b`. Blank entries are dropped.
fn parse_funnel_steps(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(steps) = serde_json::from_str::<Vec<String>>(trimmed) {
            return steps
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }
    trimmed
        .split(',')
        .map(|s| s.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// =========================================================================
// Prompt Implementations
// =========================================================================

fn time_series_analysis(args: &HashMap<String, String>) -> Result<Conversation, String> {
    let table = required(args, "table_name")?;
    let time = required(args, "time_column")?;
    let measure = required(args, "measure_column")?;
    let filter = optional(args, "filter_condition")
        .map(|f| format!("| where {}\n", f))
        .unwrap_or_default();

    let series = format!(
        "// Time series analysis for {measure} in {table}\n\
         {table}\n\
         {filter}\
         | where isnotnull({time}) and isnotnull({measure})\n\
         | summarize avg_{measure} = avg({measure}),\n\
         \x20          min_{measure} = min({measure}),\n\
         \x20          max_{measure} = max({measure}),\n\
         \x20          count_{measure} = count() by bin({time}, 1h)\n\
         | sort by {time} asc"
    );

    let anomalies = format!(
        "// Detect anomalies in time series\n\
         {table}\n\
         {filter}\
         | where isnotnull({time}) and isnotnull({measure})\n\
         | make-series value = avg({measure}) on {time} from ago(7d) to now() step 1h\n\
         | extend anomalies = series_decompose_anomalies(value)\n\
         | mv-expand {time} to typeof(datetime), value to typeof(double), anomalies to typeof(double)\n\
         | where anomalies != 0\n\
         | project {time}, value, anomalies"
    );

    Ok((
        "Time series analysis",
        vec![
            Turn::user(format!(
                "I need to analyze the time series data for '{}' in the '{}' table.",
                measure, table
            )),
            Turn::assistant(
                "I'll help you analyze this time series data. Here are some queries you can use:",
            ),
            Turn::user("Query 1: Basic time series analysis"),
            Turn::assistant(series),
            Turn::user("Can you also help me detect anomalies in this data?"),
            Turn::assistant("Certainly! Here's a query to detect anomalies:"),
            Turn::assistant(anomalies),
            Turn::user("What insights should I look for in these results?"),
            Turn::assistant(TIME_SERIES_INSIGHTS),
        ],
    ))
}

fn cohort_analysis(args: &HashMap<String, String>) -> Result<Conversation, String> {
    let table = required(args, "table_name")?;
    let cohort = required(args, "cohort_column")?;
    let date = required(args, "date_column")?;
    let event_filter = optional(args, "event_column")
        .map(|e| format!("| where {} == 'desired_event'\n", e))
        .unwrap_or_default();

    let query = format!(
        "// Cohort retention analysis\n\
         let cohorts = {table}\n\
         {event_filter}\
         | summarize min_date = min({date}) by {cohort}\n\
         | summarize count() by cohort_date = startofweek(min_date);\n\
         let cohort_activities = {table}\n\
         {event_filter}\
         | join kind=inner (\n\
         \x20   {table}\n\
         \x20   | summarize min_date = min({date}) by {cohort}\n\
         ) on {cohort}\n\
         | extend weeks = datetime_diff('week', {date}, min_date)\n\
         | where weeks >= 0\n\
         | summarize users = count_distinct({cohort}) by cohort_date = startofweek(min_date), weeks;\n\
         cohort_activities\n\
         | join kind=inner cohorts on cohort_date\n\
         | project cohort_date, weeks, users, percentage = (users * 100) / count_\n\
         | sort by cohort_date asc, weeks asc"
    );

    Ok((
        "Cohort retention analysis",
        vec![
            Turn::user(format!(
                "I want to perform cohort analysis on the '{}' table using '{}' to identify cohorts.",
                table, cohort
            )),
            Turn::assistant(
                "I'll help you set up a cohort analysis. This will show how groups of users/entities behave over time.",
            ),
            Turn::user("What query should I use for cohort retention analysis?"),
            Turn::assistant("Here's a query for cohort retention analysis:"),
            Turn::assistant(query),
            Turn::user("How do I interpret these results?"),
            Turn::assistant(COHORT_INSIGHTS),
        ],
    ))
}

fn funnel_analysis(args: &HashMap<String, String>) -> Result<Conversation, String> {
    let table = required(args, "table_name")?;
    let user_id = required(args, "user_id_column")?;
    let event = required(args, "event_column")?;
    let timestamp = required(args, "timestamp_column")?;
    let steps = parse_funnel_steps(required(args, "funnel_steps")?);
    if steps.is_empty() {
        return Err("funnel_steps must name at least one event".to_string());
    }

    let step_literals = steps
        .iter()
        .map(|s| quote_string_literal(s))
        .collect::<Vec<_>>()
        .join(", ");

    let query = format!(
        "// Funnel analysis\n\
         let funnel_events = dynamic([{step_literals}]);\n\
         let total_users = {table}\n\
         | where {event} == funnel_events[0]\n\
         | summarize count_distinct({user_id});\n\
         {table}\n\
         | where {event} in (funnel_events)\n\
         | summarize timestamp = min({timestamp}) by {user_id}, {event}\n\
         | extend step = array_index_of(funnel_events, {event})\n\
         | where step >= 0\n\
         | summarize reached_step = max(step) by {user_id}\n\
         | summarize users = count() by reached_step\n\
         | extend step_name = funnel_events[reached_step]\n\
         | extend total_users = toscalar(total_users)\n\
         | extend conversion_rate = (users * 100.0) / total_users\n\
         | sort by reached_step asc\n\
         | project step = reached_step + 1,\n\
         \x20        step_name,\n\
         \x20        users,\n\
         \x20        percentage_of_total = conversion_rate,\n\
         \x20        drop_off = iff(reached_step > 0, lag(users) - users, 0),\n\
         \x20        drop_off_rate = iff(reached_step > 0, (lag(users) - users) * 100.0 / lag(users), 0)"
    );

    Ok((
        "Funnel analysis",
        vec![
            Turn::user(format!(
                "I need to analyze the conversion funnel through these steps: {}",
                steps.join(", ")
            )),
            Turn::assistant(
                "I'll help you create a funnel analysis to track how users progress through those steps.",
            ),
            Turn::user("What KQL query should I use for the funnel analysis?"),
            Turn::assistant("Here's a query for funnel analysis:"),
            Turn::assistant(query),
            Turn::user("What insights should I look for in the funnel analysis?"),
            Turn::assistant(FUNNEL_INSIGHTS),
        ],
    ))
}

fn data_quality_check(args: &HashMap<String, String>) -> Result<Conversation, String> {
    let table = required(args, "table_name")?;

    let completeness = format!(
        "// Check for completeness (missing values)\n\
         {table}\n\
         | summarize column_stats = bag_pack(\n\
         \x20   \"total_rows\", count(),\n\
         \x20   \"columns\", pack_all()\n\
         )\n\
         | mv-expand col_name = bag_keys(column_stats.columns)\n\
         | extend nulls = column_stats.columns[tostring(col_name)].nulls\n\
         | extend null_percentage = round((nulls * 100.0) / column_stats.total_rows, 2)\n\
         | project column = tostring(col_name),\n\
         \x20        total_rows = column_stats.total_rows,\n\
         \x20        null_count = nulls,\n\
         \x20        null_percentage\n\
         | sort by null_percentage desc"
    );

    let duplicates = format!(
        "// Check for duplicates\n\
         {table}\n\
         | summarize row_count = count() by *\n\
         | where row_count > 1\n\
         | count"
    );

    let distributions = format!(
        "// Check value distributions\n\
         {table}\n\
         | sample 1000\n\
         | evaluate pivot(column_ifexists, values_builder(count()))"
    );

    Ok((
        "Data quality assessment",
        vec![
            Turn::user(format!(
                "I need to check the data quality of the '{}' table.",
                table
            )),
            Turn::assistant(
                "I'll help you assess the data quality. Here are some queries for different quality dimensions:",
            ),
            Turn::user("Can you give me a query to check for missing values?"),
            Turn::assistant("Here's a query to check for completeness (missing values):"),
            Turn::assistant(completeness),
            Turn::user("How about checking for duplicates?"),
            Turn::assistant("Here's a query to check for duplicates:"),
            Turn::assistant(duplicates),
            Turn::user("And how can I check the distribution of values?"),
            Turn::assistant("Here's a query to examine value distributions:"),
            Turn::assistant(distributions),
            Turn::user("What should I do with these results?"),
            Turn::assistant(DATA_QUALITY_INSIGHTS),
        ],
    ))
}

const TIME_SERIES_INSIGHTS: &str = r#"When analyzing the time series results, look for:

1. **Patterns and trends**: Are there daily, weekly, or seasonal patterns?
2. **Anomalies and outliers**: Points that deviate significantly from the pattern
3. **Sudden changes**: Sharp increases or decreases that might indicate events
4. **Missing data**: Gaps in the time series that might affect your analysis
5. **Correlations**: How this measure relates to other business metrics

For anomaly detection results, focus on:
1. The timestamp when anomalies occurred
2. The magnitude of the anomaly (how far from normal)
3. Potential external factors that coincide with the anomalies

Use the `analyze_data` tool with these queries to get statistical summaries.
"#;

const COHORT_INSIGHTS: &str = r#"When interpreting cohort analysis results:

1. **Diagonal reading**: Each row represents a cohort, and columns show their behavior over time
2. **Retention rate**: The percentage of users who return in subsequent periods
3. **Patterns across cohorts**: Compare how different cohorts behave over time
4. **Churn analysis**: Look at where the significant drops occur
5. **Lifecycle insights**: Identify critical periods where you might lose users

Key metrics to focus on:
- Initial retention (Week 1) - immediate drop-off
- Long-term retention plateaus - your loyal base
- Cohort differences - whether newer cohorts perform better or worse than older ones

You might want to visualize this data as a heatmap for easier interpretation.
"#;

const FUNNEL_INSIGHTS: &str = r#"When analyzing funnel results, focus on:

1. **Overall conversion rate**: Percentage of users who complete the entire funnel
2. **Step-by-step drop-off**: Where you lose the most users
3. **Critical blockage points**: Steps with unusually high drop-off rates
4. **Time between steps**: How long it takes users to move from one step to another
5. **Segment comparisons**: How different user groups perform in the funnel

Key questions to answer:
- Which step has the highest drop-off rate?
- What percentage of users complete the entire funnel?
- Are there any unexpected patterns in how users move through the funnel?
- How does this funnel performance compare to previous periods?

Consider enhancing this analysis by:
- Adding time segmentation (day/week/month)
- Filtering by user attributes
- Comparing different user segments
"#;

const DATA_QUALITY_INSIGHTS: &str = r#"When assessing data quality, consider these aspects:

1. **Completeness**: Look for columns with high null percentages
   - Are these expected missing values?
   - Does this affect your analysis?
   - Consider strategies for handling missing data (imputation, filtering, etc.)

2. **Uniqueness**: Examine duplicate records
   - Are duplicates expected in your data model?
   - Could duplicates skew your analysis results?
   - Consider deduplication strategies if needed

3. **Consistency**: Review value distributions
   - Look for unexpected values or patterns
   - Check for outliers or impossible values
   - Verify that values match your business rules

4. **Timeliness**: If your data has timestamps
   - Check for gaps in time series data
   - Verify that data is current
   - Look for unusual patterns in data freshness

Based on these findings, you might need to:
- Clean the data before analysis
- Add data quality monitoring
- Address upstream issues causing quality problems
- Document limitations in your analysis
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn texts(result: &GetPromptResult) -> Vec<String> {
        result
            .messages
            .iter()
            .map(|m| match &m.content {
                PromptMessageContent::Text { text } => text.clone(),
                other => panic!("unexpected content {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_prompt_list() {
        let names: Vec<String> = build_prompt_list().into_iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            [
                "time_series_analysis",
                "cohort_analysis",
                "funnel_analysis",
                "data_quality_check"
            ]
        );
    }

    #[test]
    fn test_unknown_prompt() {
        let err = get_prompt("nope", None).unwrap_err();
        assert!(matches!(err, KustoError::InvalidInput(ref m) if m == "Unknown prompt: nope"));
    }

    #[test]
    fn test_missing_required_argument() {
        let a = args(&[("table_name", "T"), ("time_column", "Timestamp")]);
        let err = get_prompt("time_series_analysis", Some(&a)).unwrap_err();
        assert!(matches!(
            err,
            KustoError::InvalidInput(ref m) if m == "Missing required argument: measure_column"
        ));
    }

    #[test]
    fn test_time_series_with_and_without_filter() {
        let mut a = args(&[
            ("table_name", "Metrics"),
            ("time_column", "Timestamp"),
            ("measure_column", "Latency"),
        ]);
        let plain = texts(&get_prompt("time_series_analysis", Some(&a)).unwrap());
        assert_eq!(plain.len(), 9);
        assert!(plain[3].contains("avg_Latency = avg(Latency)"));
        assert!(plain[3].contains("bin(Timestamp, 1h)"));
        assert!(!plain[3].contains("| where Region"));

        a.insert("filter_condition".to_string(), "Region == 'eu'".to_string());
        let filtered = texts(&get_prompt("time_series_analysis", Some(&a)).unwrap());
        assert!(filtered[3].contains("Metrics\n| where Region == 'eu'\n| where isnotnull"));
        assert!(filtered[6].contains("series_decompose_anomalies"));
    }

    #[test]
    fn test_roles_alternate_as_scripted() {
        let a = args(&[("table_name", "T")]);
        let result = get_prompt("data_quality_check", Some(&a)).unwrap();
        assert_eq!(result.messages.len(), 13);
        assert_eq!(result.messages[0].role, PromptMessageRole::User);
        assert_eq!(result.messages[1].role, PromptMessageRole::Assistant);
        assert!(texts(&result)[7].contains("summarize row_count = count() by *"));
    }

    #[test]
    fn test_cohort_event_filter() {
        let a = args(&[
            ("table_name", "Events"),
            ("cohort_column", "UserId"),
            ("date_column", "Day"),
            ("event_column", "Name"),
        ]);
        let msgs = texts(&get_prompt("cohort_analysis", Some(&a)).unwrap());
        assert!(msgs[4].contains("let cohorts = Events\n| where Name == 'desired_event'\n"));
        assert!(msgs[4].contains("datetime_diff('week', Day, min_date)"));
    }

    #[test]
    fn test_funnel_steps_forms() {
        assert_eq!(parse_funnel_steps("view, cart ,buy"), ["view", "cart", "buy"]);
        assert_eq!(parse_funnel_steps(r#"["view", "buy"]"#), ["view", "buy"]);
        assert_eq!(parse_funnel_steps(" , "), Vec::<String>::new());

        let a = args(&[
            ("table_name", "Clicks"),
            ("user_id_column", "User"),
            ("event_column", "Event"),
            ("timestamp_column", "Ts"),
            ("funnel_steps", r#"["view", "it's"]"#),
        ]);
        let msgs = texts(&get_prompt("funnel_analysis", Some(&a)).unwrap());
        assert_eq!(
            msgs[0],
            "I need to analyze the conversion funnel through these steps: view, it's"
        );
        assert!(msgs[4].contains(r"dynamic(['view', 'it\'s'])"));
    }

    #[test]
    fn test_funnel_requires_steps() {
        let a = args(&[
            ("table_name", "Clicks"),
            ("user_id_column", "User"),
            ("event_column", "Event"),
            ("timestamp_column", "Ts"),
            ("funnel_steps", ","),
        ]);
        assert!(get_prompt("funnel_analysis", Some(&a)).is_err());
    }
}
