//! Plan Validator: checks a plan's references against the database context
//! before any SQL is generated from it.

use strsim::{jaro_winkler, levenshtein};

use crate::context::DatabaseContext;
use crate::planner::Plan;

/// A referenced identifier counts as a near match above this similarity.
const NEAR_MATCH_THRESHOLD: f64 = 0.85;

/// A near match must also be within this edit distance. Jaro-Winkler alone
/// rates a word as close to any known identifier sharing its prefix (e.g.
/// "products" scores high against the column "product_id"), which isn't a
/// typo — it's a different, nonexistent relation. Capping edit distance
/// keeps the substitution to actual typos.
const NEAR_MATCH_MAX_EDIT_DISTANCE: usize = 2;

/// Outcome of validating a plan against context.
#[derive(Debug, Clone)]
pub enum Verdict {
    /// Every reference in the plan resolves cleanly.
    Feasible(Plan),
    /// Some references were near-matches; substituted and noted.
    Revised { plan: Plan, rationale: String },
    /// A reference has no match, even a fuzzy one.
    Infeasible { rationale: String },
}

/// Validates a plan's prose against the table and column names known to
/// the context, substituting near-matches and rejecting the rest.
pub fn validate(utterance: &str, plan: Plan, context: &DatabaseContext) -> Verdict {
    let known_tables: Vec<&str> = context
        .schema
        .tables
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    let known_columns: Vec<&str> = context
        .schema
        .tables
        .iter()
        .flat_map(|t| t.columns.iter().map(|c| c.name.as_str()))
        .collect();

    let mut substitutions = Vec::new();
    let mut unresolved = Vec::new();
    let mut revised_items = Vec::with_capacity(plan.items.len());

    for item in &plan.items {
        let mut revised_item = item.clone();
        for word in candidate_identifiers(item) {
            if known_tables.contains(&word.as_str()) || known_columns.contains(&word.as_str()) {
                continue;
            }

            match best_match(&word, &known_tables, &known_columns) {
                Some((candidate, score)) if score >= NEAR_MATCH_THRESHOLD => {
                    revised_item = replace_word(&revised_item, &word, &candidate);
                    substitutions.push(format!("'{}' -> '{}'", word, candidate));
                }
                _ => unresolved.push(word),
            }
        }
        revised_items.push(revised_item);
    }

    if !unresolved.is_empty() {
        unresolved.sort();
        unresolved.dedup();
        return Verdict::Infeasible {
            rationale: format!(
                "plan for \"{}\" references unknown identifiers with no close match: {}",
                utterance,
                unresolved.join(", ")
            ),
        };
    }

    let plan = if substitutions.is_empty() {
        plan
    } else {
        Plan {
            mode: plan.mode,
            items: revised_items,
        }
    };

    if !plan.within_bounds() {
        return Verdict::Infeasible {
            rationale: format!(
                "plan for \"{}\" has {} items, outside the bounds for {:?} mode",
                utterance,
                plan.items.len(),
                plan.mode
            ),
        };
    }

    if substitutions.is_empty() {
        return Verdict::Feasible(plan);
    }

    let rationale = format!("substituted near-matching identifiers: {}", substitutions.join(", "));
    Verdict::Revised { plan, rationale }
}

/// Extracts words that look like they could be table or column references:
/// bare identifiers and the parts of a qualified `table.column` reference.
fn candidate_identifiers(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .filter(|w| w.chars().next().is_some_and(|c| c.is_alphabetic()))
        .filter(|w| !is_common_word(w))
        .map(|w| w.to_lowercase())
        .collect()
}

fn is_common_word(word: &str) -> bool {
    const STOPWORDS: &[&str] = &[
        "the", "a", "an", "and", "or", "for", "each", "of", "in", "on", "to", "by", "across",
        "identify", "aggregate", "summarize", "result", "records", "plain", "language", "requested",
        "period", "those", "this", "that", "with", "over", "all", "total", "count", "sum",
        "compare", "against", "report",
    ];
    STOPWORDS.contains(&word.to_lowercase().as_str())
}

/// Finds the best-matching known table or column name for `word`, among
/// candidates close enough in edit distance to plausibly be a typo.
fn best_match(word: &str, tables: &[&str], columns: &[&str]) -> Option<(String, f64)> {
    tables
        .iter()
        .chain(columns.iter())
        .filter(|candidate| levenshtein(word, candidate) <= NEAR_MATCH_MAX_EDIT_DISTANCE)
        .map(|candidate| (candidate.to_string(), jaro_winkler(word, candidate)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

fn replace_word(text: &str, from: &str, to: &str) -> String {
    text.split_whitespace()
        .map(|token| {
            let stripped = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
            if stripped.eq_ignore_ascii_case(from) {
                token.replacen(stripped, to, 1)
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockDatabaseClient;
    use crate::planner::PlanMode;

    async fn sample_context() -> DatabaseContext {
        let db = MockDatabaseClient::with_sales_fixture();
        DatabaseContext::build(&db).await.unwrap()
    }

    fn plan_with(items: Vec<&str>) -> Plan {
        Plan {
            mode: PlanMode::Plan,
            items: items.into_iter().map(String::from).collect(),
        }
    }

    #[tokio::test]
    async fn test_feasible_plan_passes_through() {
        let context = sample_context().await;
        let plan = plan_with(vec![
            "Count rows in sales where sale_date matches the period",
            "Group the matching rows by product_id",
            "Sum the amount for each group",
        ]);
        let verdict = validate("How many sales per product in the period?", plan, &context);
        assert!(matches!(verdict, Verdict::Feasible(_)));
    }

    #[tokio::test]
    async fn test_infeasible_plan_with_unknown_table() {
        let context = sample_context().await;
        let plan = plan_with(vec!["Join products to sales to find the category breakdown"]);
        let verdict = validate(
            "What are the different product categories and how many products in each?",
            plan,
            &context,
        );
        match verdict {
            Verdict::Infeasible { rationale } => {
                assert!(rationale.contains("products") || rationale.contains("category"));
            }
            other => panic!("expected infeasible, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_revised_plan_on_near_match() {
        let context = sample_context().await;
        // "sale" is a near-miss for "sales" (edit distance 1).
        let plan = plan_with(vec![
            "Count rows in sale for the period",
            "Group the matching rows by product_id",
            "Sum the amount for each group",
        ]);
        let verdict = validate("How many sales per product in the period?", plan, &context);
        match verdict {
            Verdict::Revised { plan, rationale } => {
                assert!(plan.items[0].contains("sales"));
                assert!(rationale.contains("sale"));
            }
            other => panic!("expected revised, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_out_of_bounds_plan_is_infeasible() {
        let context = sample_context().await;
        let plan = plan_with(vec!["Count rows in sales where sale_date matches the period"]);
        let verdict = validate("How many sales happened in the period?", plan, &context);
        match verdict {
            Verdict::Infeasible { rationale } => {
                assert!(rationale.contains("outside the bounds"));
            }
            other => panic!("expected infeasible, got {:?}", other),
        }
    }

    #[test]
    fn test_candidate_identifiers_skips_stopwords() {
        let words = candidate_identifiers("Aggregate the amount column across those records");
        assert!(!words.contains(&"the".to_string()));
        assert!(words.contains(&"amount".to_string()));
    }

    #[test]
    fn test_best_match_finds_close_column() {
        let tables = vec!["sales"];
        let columns = vec!["amount", "sale_date", "product_id"];
        let (candidate, score) = best_match("amout", &tables, &columns).unwrap();
        assert_eq!(candidate, "amount");
        assert!(score > 0.85);
    }
}
