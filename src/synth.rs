//! SQL Synthesizer: turns a validated plan into a single read-only SQL
//! statement, lexically checked against the schema before it's handed to a
//! human for approval.

use sqlparser::ast::{Expr, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::context::DatabaseContext;
use crate::error::{OrchestratorError, Result};
use crate::llm::gateway::LlmGateway;
use crate::llm::parser::parse_llm_response;
use crate::planner::Plan;

const SYNTH_PROMPT_TEMPLATE: &str = r#"You are writing a SQL query to implement an approved plan.

DATABASE CONTEXT:
{context}

USER QUESTION:
{utterance}

PLAN:
{plan}

Write a single SQL statement matching the dialect to implement this plan. It must be read-only: SELECT only, no data modification or schema changes. Use only the tables and columns listed in the context above. Return it as a single ```sql``` code block with no other statements."#;

const REFINE_PROMPT_TEMPLATE: &str = r#"The statement you proposed has problems:

{warnings}

Here is the statement you proposed:
{sql}

Write a single SQL statement matching the dialect to implement this plan, fixing the problems above. Use only the tables and columns listed in the context below. Return it as a single ```sql``` code block with no other statements.

DATABASE CONTEXT:
{context}"#;

const DENYLIST: &[&str] = &["INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "ATTACH", "PRAGMA"];

/// Result of synthesis: the final SQL text plus any warnings that survived
/// the refinement pass.
#[derive(Debug, Clone)]
pub struct SynthResult {
    pub sql: String,
    pub warnings: Vec<String>,
}

/// Synthesizes SQL for a plan, performing one bounded self-correction pass
/// if the first attempt carries a hard warning (unknown table or column).
pub async fn synthesize(
    gateway: &LlmGateway,
    utterance: &str,
    plan: &Plan,
    context: &DatabaseContext,
) -> Result<SynthResult> {
    let plan_text = plan.items.join("\n");
    let system = SYNTH_PROMPT_TEMPLATE
        .replace("{context}", &context.render())
        .replace("{utterance}", utterance)
        .replace("{plan}", &plan_text);

    let sql = request_single_statement(gateway, &system, utterance).await?;
    let warnings = validate_lexically(&sql, context);

    if !has_hard_warning(&warnings) {
        return Ok(SynthResult { sql, warnings });
    }

    let refine_system = REFINE_PROMPT_TEMPLATE
        .replace("{warnings}", &warnings.join("\n"))
        .replace("{sql}", &sql)
        .replace("{context}", &context.render());

    let refined_sql = request_single_statement(gateway, &refine_system, utterance).await?;
    let refined_warnings = validate_lexically(&refined_sql, context);

    Ok(SynthResult {
        sql: refined_sql,
        warnings: refined_warnings,
    })
}

/// Sends a synthesis request and extracts a single SQL statement from the
/// reply, rejecting multi-statement output.
async fn request_single_statement(gateway: &LlmGateway, system: &str, user: &str) -> Result<String> {
    let reply = gateway.complete(system, user).await?;
    let parsed = parse_llm_response(&reply);
    let sql = parsed
        .sql
        .ok_or_else(|| OrchestratorError::sql_synth("no SQL statement found in LLM reply"))?;

    require_single_statement(&sql)?;
    Ok(sql)
}

/// Rejects SQL containing more than one statement. A trailing semicolon on
/// an otherwise single statement is fine; a `;` anywhere else is not.
fn require_single_statement(sql: &str) -> Result<()> {
    let trimmed = sql.trim();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    if body.contains(';') {
        return Err(OrchestratorError::sql_synth(
            "LLM reply contained more than one SQL statement",
        ));
    }
    Ok(())
}

/// Lexically validates SQL against the context's schema: denylisted
/// statement kinds, unknown table/column references, unbalanced
/// parentheses, and a missing `FROM` in a non-aggregate `SELECT`.
///
/// Returns a list of human-readable warnings; an empty list means the
/// statement passed every check.
pub fn validate_lexically(sql: &str, context: &DatabaseContext) -> Vec<String> {
    let mut warnings = Vec::new();

    let upper = sql.to_uppercase();
    for keyword in DENYLIST {
        if upper.split(|c: char| !c.is_alphanumeric() && c != '_').any(|tok| tok == *keyword) {
            warnings.push(format!("statement contains disallowed keyword: {}", keyword));
        }
    }

    if count_char(sql, '(') != count_char(sql, ')') {
        warnings.push("unbalanced parentheses in statement".to_string());
    }

    let dialect = PostgreSqlDialect {};
    let statements = match Parser::parse_sql(&dialect, sql) {
        Ok(statements) => statements,
        Err(error) => {
            warnings.push(format!("statement failed to parse: {}", error));
            return warnings;
        }
    };

    let Some(Statement::Query(query)) = statements.first() else {
        warnings.push("statement is not a SELECT query".to_string());
        return warnings;
    };

    let SetExpr::Select(select) = query.body.as_ref() else {
        return warnings;
    };

    if select.from.is_empty() && !is_aggregate_only(select) {
        warnings.push("SELECT has no FROM clause".to_string());
    }

    let table_aliases = collect_table_aliases(select, context);
    for unknown in table_aliases.unknown_tables {
        warnings.push(format!("unknown table referenced: {}", unknown));
    }

    for (qualifier, column) in qualified_columns(select) {
        match table_aliases.resolve(&qualifier) {
            Some(table_name) => {
                if !context.schema_has_column(table_name, &column) {
                    warnings.push(format!(
                        "unknown column '{}' on table '{}'",
                        column, table_name
                    ));
                }
            }
            None => warnings.push(format!(
                "qualified column '{}.{}' references an unknown table alias",
                qualifier, column
            )),
        }
    }

    warnings
}

/// A hard warning (unknown identifier) requires refinement; formatting
/// nits like unbalanced parens do not.
fn has_hard_warning(warnings: &[String]) -> bool {
    warnings
        .iter()
        .any(|w| w.starts_with("unknown table") || w.starts_with("unknown column") || w.contains("unknown table alias"))
}

fn count_char(text: &str, target: char) -> usize {
    text.chars().filter(|&c| c == target).count()
}

fn is_aggregate_only(select: &Select) -> bool {
    select.from.is_empty() && !select.projection.is_empty()
}

struct TableAliases {
    /// Maps alias (or bare table name) to the real table name.
    by_alias: Vec<(String, String)>,
    unknown_tables: Vec<String>,
}

impl TableAliases {
    fn resolve(&self, alias: &str) -> Option<&str> {
        self.by_alias
            .iter()
            .find(|(a, _)| a.eq_ignore_ascii_case(alias))
            .map(|(_, table)| table.as_str())
    }
}

fn collect_table_aliases(select: &Select, context: &DatabaseContext) -> TableAliases {
    let mut by_alias = Vec::new();
    let mut unknown_tables = Vec::new();

    for twj in &select.from {
        register_table_with_joins(twj, context, &mut by_alias, &mut unknown_tables);
    }

    TableAliases {
        by_alias,
        unknown_tables,
    }
}

fn register_table_with_joins(
    twj: &TableWithJoins,
    context: &DatabaseContext,
    by_alias: &mut Vec<(String, String)>,
    unknown_tables: &mut Vec<String>,
) {
    register_table_factor(&twj.relation, context, by_alias, unknown_tables);
    for join in &twj.joins {
        register_table_factor(&join.relation, context, by_alias, unknown_tables);
    }
}

fn register_table_factor(
    factor: &TableFactor,
    context: &DatabaseContext,
    by_alias: &mut Vec<(String, String)>,
    unknown_tables: &mut Vec<String>,
) {
    if let TableFactor::Table { name, alias, .. } = factor {
        let table_name = name.to_string();
        if !context.schema_has_table(&table_name) {
            unknown_tables.push(table_name.clone());
        }
        let key = alias
            .as_ref()
            .map(|a| a.name.value.clone())
            .unwrap_or_else(|| table_name.clone());
        by_alias.push((key, table_name));
    }
}

/// Walks the projection and WHERE clause for `qualifier.column` references.
fn qualified_columns(select: &Select) -> Vec<(String, String)> {
    let mut found = Vec::new();

    for item in &select.projection {
        if let sqlparser::ast::SelectItem::UnnamedExpr(expr)
        | sqlparser::ast::SelectItem::ExprWithAlias { expr, .. } = item
        {
            collect_compound_idents(expr, &mut found);
        }
    }

    if let Some(selection) = &select.selection {
        collect_compound_idents(selection, &mut found);
    }

    found
}

fn collect_compound_idents(expr: &Expr, out: &mut Vec<(String, String)>) {
    match expr {
        Expr::CompoundIdentifier(parts) if parts.len() == 2 => {
            out.push((parts[0].value.clone(), parts[1].value.clone()));
        }
        Expr::BinaryOp { left, right, .. } => {
            collect_compound_idents(left, out);
            collect_compound_idents(right, out);
        }
        Expr::UnaryOp { expr, .. } | Expr::Nested(expr) | Expr::Cast { expr, .. } => {
            collect_compound_idents(expr, out);
        }
        Expr::Function(function) => {
            if let sqlparser::ast::FunctionArguments::List(list) = &function.args {
                for arg in &list.args {
                    if let sqlparser::ast::FunctionArg::Unnamed(sqlparser::ast::FunctionArgExpr::Expr(e))
                    | sqlparser::ast::FunctionArg::Named {
                        arg: sqlparser::ast::FunctionArgExpr::Expr(e),
                        ..
                    } = arg
                    {
                        collect_compound_idents(e, out);
                    }
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockDatabaseClient;
    use crate::llm::mock::MockLlmClient;
    use crate::planner::PlanMode;

    async fn sample_context() -> DatabaseContext {
        let db = MockDatabaseClient::with_sales_fixture();
        DatabaseContext::build(&db).await.unwrap()
    }

    fn sample_plan() -> Plan {
        Plan {
            mode: PlanMode::Plan,
            items: vec!["Count rows in sales on the requested date".to_string()],
        }
    }

    #[tokio::test]
    async fn test_synthesize_produces_sql_for_date() {
        let gateway = LlmGateway::new(Box::new(MockLlmClient::new()));
        let context = sample_context().await;
        let result = synthesize(
            &gateway,
            "How many sales happened on 2025-04-11?",
            &sample_plan(),
            &context,
        )
        .await
        .unwrap();
        assert!(result.sql.contains("2025-04-11"));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_require_single_statement_rejects_multiple() {
        assert!(require_single_statement("SELECT 1; SELECT 2").is_err());
    }

    #[test]
    fn test_require_single_statement_allows_trailing_semicolon() {
        assert!(require_single_statement("SELECT 1;").is_ok());
    }

    #[tokio::test]
    async fn test_validate_lexically_flags_unknown_table() {
        let context = sample_context().await;
        let warnings = validate_lexically("SELECT * FROM products", &context);
        assert!(warnings.iter().any(|w| w.contains("unknown table")));
    }

    #[tokio::test]
    async fn test_validate_lexically_flags_unknown_column() {
        let context = sample_context().await;
        let warnings = validate_lexically("SELECT s.category FROM sales s", &context);
        assert!(warnings.iter().any(|w| w.contains("unknown column")));
    }

    #[tokio::test]
    async fn test_validate_lexically_passes_known_query() {
        let context = sample_context().await;
        let warnings = validate_lexically("SELECT s.amount FROM sales s WHERE s.sale_date = '2025-04-11'", &context);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_validate_lexically_flags_denylisted_keyword() {
        let warnings = validate_lexically("DELETE FROM sales", &DatabaseContext::empty());
        assert!(warnings.iter().any(|w| w.contains("DELETE")));
    }

    #[test]
    fn test_validate_lexically_flags_unbalanced_parens() {
        let warnings = validate_lexically("SELECT COUNT(* FROM sales", &DatabaseContext::empty());
        assert!(!warnings.is_empty());
    }
}
