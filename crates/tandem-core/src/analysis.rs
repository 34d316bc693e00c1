//! Spending analysis: aggregation, prompt assembly, and response parsing
//!
//! The AI side of analysis is deliberately thin. All the numbers are computed
//! here from the expense list; the model only turns them into prose. If the
//! model is unreachable or returns garbage, `fallback_report` produces a
//! purely numeric report from the same aggregates.

use std::collections::HashMap;

use chrono::{Datelike, Duration};

use crate::models::{
    AnalysisReport, Comparison, ComparisonSide, CombinedSide, Expense, Timeframe, WeekBucket,
    CATEGORY_LABELS,
};

/// Sum expenses per category name. Uncategorized expenses count as "Other".
pub fn spending_by_category(expenses: &[Expense]) -> HashMap<String, f64> {
    let mut totals: HashMap<String, f64> = HashMap::new();
    for expense in expenses {
        let name = expense.category.clone().unwrap_or_else(|| "Other".into());
        *totals.entry(name).or_insert(0.0) += expense.amount;
    }
    totals
}

/// Bucket expenses into calendar weeks keyed by the Monday that starts each
/// week, returning the most recent 12 weeks that have spending, in
/// chronological order. Weeks with no expenses produce no bucket.
pub fn weekly_trend(expenses: &[Expense]) -> Vec<WeekBucket> {
    let mut by_week: HashMap<String, f64> = HashMap::new();
    for expense in expenses {
        let date = expense.date.date_naive();
        let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
        *by_week.entry(monday.format("%Y-%m-%d").to_string()).or_insert(0.0) += expense.amount;
    }

    let mut buckets: Vec<WeekBucket> = by_week
        .into_iter()
        .map(|(week, amount)| WeekBucket { week, amount })
        .collect();
    // ISO date keys sort chronologically as strings
    buckets.sort_by(|a, b| a.week.cmp(&b.week));
    if buckets.len() > 12 {
        buckets.drain(..buckets.len() - 12);
    }
    buckets
}

/// Assemble the analysis prompt from precomputed aggregates.
///
/// Week-over-week change is only mentioned when the previous week actually
/// had spending; a percentage against zero is meaningless.
pub fn build_analysis_prompt(
    timeframe: Timeframe,
    total: f64,
    by_category: &HashMap<String, f64>,
    trends: &[WeekBucket],
    include_partner: bool,
) -> String {
    let mut categories: Vec<(&String, &f64)> = by_category.iter().collect();
    categories.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut breakdown = String::new();
    for (name, amount) in &categories {
        breakdown.push_str(&format!("- {}: ${:.2}\n", name, amount));
    }

    let scope = if include_partner {
        "combined household spending (you and your partner)"
    } else {
        "your personal spending"
    };

    let mut prompt = format!(
        "You are a personal finance assistant. Analyze {} over the past {}.\n\n\
         Total spent: ${:.2}\n\n\
         Spending by category:\n{}\n",
        scope, timeframe, total, breakdown
    );

    if trends.len() >= 2 {
        let current = trends[trends.len() - 1].amount;
        let previous = trends[trends.len() - 2].amount;
        if previous > 0.0 {
            let change = (current - previous) / previous * 100.0;
            prompt.push_str(&format!(
                "This week's spending is {:+.1}% compared to last week.\n\n",
                change
            ));
        }
    }

    prompt.push_str(
        "Respond in exactly this format:\n\
         SUMMARY: <one or two sentences summarizing the spending>\n\
         INSIGHTS:\n\
         - <insight>\n\
         - <insight>\n\
         - <insight>\n\
         RECOMMENDATIONS:\n\
         - <recommendation>\n\
         - <recommendation>\n\
         - <recommendation>\n",
    );

    prompt
}

/// Which block of the response the line parser is currently filling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Summary,
    Insights,
    Recommendations,
}

/// Parse a SUMMARY/INSIGHTS/RECOMMENDATIONS response into its parts.
///
/// Section headers switch the active section; bullet lines append to it.
/// Models sometimes put the summary on its own line without the header, so
/// a non-bullet line before any header is adopted as the summary if one
/// hasn't been seen yet.
pub fn parse_ai_response(text: &str) -> (String, Vec<String>, Vec<String>) {
    let mut summary = String::new();
    let mut insights = Vec::new();
    let mut recommendations = Vec::new();
    let mut section = Section::Summary;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("SUMMARY:") {
            summary = rest.trim().to_string();
            section = Section::Summary;
        } else if line.starts_with("INSIGHTS:") {
            section = Section::Insights;
        } else if line.starts_with("RECOMMENDATIONS:") {
            section = Section::Recommendations;
        } else if let Some(rest) = line.strip_prefix('-').or_else(|| line.strip_prefix('*')) {
            let item = rest.trim().to_string();
            if item.is_empty() {
                continue;
            }
            match section {
                Section::Insights => insights.push(item),
                Section::Recommendations => recommendations.push(item),
                Section::Summary => {}
            }
        } else if section == Section::Summary && summary.is_empty() {
            summary = line.to_string();
        }
    }

    (summary, insights, recommendations)
}

/// Numeric report used when the model call fails
pub fn fallback_report(
    timeframe: Timeframe,
    total: f64,
    by_category: HashMap<String, f64>,
    trends: Vec<WeekBucket>,
) -> AnalysisReport {
    let top = by_category
        .iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut insights = vec![format!(
        "You spent ${:.2} over the past {}.",
        total, timeframe
    )];
    if let Some((name, amount)) = top {
        insights.push(format!(
            "Your largest category was {} at ${:.2}.",
            name, amount
        ));
    }

    AnalysisReport {
        summary: format!("Spending summary for the past {}.", timeframe),
        insights,
        recommendations: vec![
            "Review your largest spending category for savings opportunities.".to_string(),
        ],
        spending_by_category: by_category,
        trends,
    }
}

/// Prompt asking the model to pick one category label for a single expense
pub fn build_categorize_prompt(description: &str, merchant: Option<&str>) -> String {
    let merchant_line = match merchant {
        Some(m) => format!("Merchant: {}\n", m),
        None => String::new(),
    };
    format!(
        "Categorize this expense into exactly one of these categories:\n{}\n\n\
         Description: {}\n{}\n\
         Respond with only the category name, nothing else.",
        CATEGORY_LABELS.join(", "),
        description,
        merchant_line
    )
}

/// Validate a model-suggested category against the fixed label set.
/// Anything unrecognized becomes "Other". Matching is case sensitive since
/// the labels are quoted verbatim in the prompt.
pub fn validate_category(suggestion: &str) -> &'static str {
    let trimmed = suggestion.trim();
    CATEGORY_LABELS
        .iter()
        .find(|label| **label == trimmed)
        .copied()
        .unwrap_or("Other")
}

/// Compare two users' expense lists, with per-side shares of the combined
/// total. Shares are zero when nothing was spent at all.
pub fn compare(user_expenses: &[Expense], partner_expenses: &[Expense]) -> Comparison {
    let user_total: f64 = user_expenses.iter().map(|e| e.amount).sum();
    let partner_total: f64 = partner_expenses.iter().map(|e| e.amount).sum();
    let combined_total = user_total + partner_total;

    let (user_pct, partner_pct) = if combined_total > 0.0 {
        (
            user_total / combined_total * 100.0,
            partner_total / combined_total * 100.0,
        )
    } else {
        (0.0, 0.0)
    };

    let user_by_category = spending_by_category(user_expenses);
    let partner_by_category = spending_by_category(partner_expenses);

    let mut combined_by_category = user_by_category.clone();
    for (name, amount) in &partner_by_category {
        *combined_by_category.entry(name.clone()).or_insert(0.0) += amount;
    }

    Comparison {
        user: ComparisonSide {
            total: user_total,
            percentage: user_pct,
            by_category: user_by_category,
        },
        partner: ComparisonSide {
            total: partner_total,
            percentage: partner_pct,
            by_category: partner_by_category,
        },
        combined: CombinedSide {
            total: combined_total,
            by_category: combined_by_category,
        },
    }
}
