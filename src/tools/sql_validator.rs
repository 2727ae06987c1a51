//! SQL statement validation for read-only enforcement.
//!
//! Every raw statement a tool receives is checked against the caller's intent
//! and the configured dialect before any session is acquired. The check looks at
//! the leading keyword, plus an `INTO` clause anywhere in the statement since
//! `SELECT ... INTO` writes query results into new series or tables. IoTDB's SQL
//! (paths like `root.ln.**`, `ALIGN BY DEVICE`) is not something a generic SQL
//! parser can build an AST for.
//!
//! Uses the [sqlparser](https://docs.rs/sqlparser/) tokenizer so that leading
//! whitespace, `--` and `/* */` comments and quoted text are handled correctly, and
//! so that a second statement smuggled in after `;` is caught.

use crate::config::SqlDialect;
use crate::error::{DbError, DbResult};
use crate::models::{QueryIntent, ValidatedQuery};
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

/// Keywords a statement may start with for an intent in a dialect.
pub fn allowed_keywords(intent: QueryIntent, dialect: SqlDialect) -> &'static [&'static str] {
    match (intent, dialect) {
        (QueryIntent::Metadata, SqlDialect::Tree) => &["SHOW", "COUNT"],
        (QueryIntent::Metadata, SqlDialect::Table) => &["SHOW", "DESC", "DESCRIBE"],
        (QueryIntent::Read, _) => &["SELECT"],
        (QueryIntent::Schema, _) => &[],
        (QueryIntent::Export, SqlDialect::Tree) => &["SELECT", "SHOW"],
        (QueryIntent::Export, SqlDialect::Table) => &["SELECT", "SHOW", "DESC", "DESCRIBE"],
    }
}

/// Validate a raw statement for an intent.
///
/// # Examples
///
/// ```
/// use iotdb_mcp_server::config::SqlDialect;
/// use iotdb_mcp_server::models::QueryIntent;
/// use iotdb_mcp_server::tools::sql_validator::validate;
///
/// // SELECT is allowed for reads
/// assert!(validate("SELECT * FROM root.ln.**", QueryIntent::Read, SqlDialect::Tree).is_ok());
///
/// // DELETE is blocked
/// assert!(validate("DELETE FROM root.ln.**", QueryIntent::Read, SqlDialect::Tree).is_err());
/// ```
pub fn validate(sql: &str, intent: QueryIntent, dialect: SqlDialect) -> DbResult<ValidatedQuery> {
    if sql.trim().is_empty() {
        return Err(DbError::invalid_statement("Empty SQL statement"));
    }

    if intent == QueryIntent::Schema {
        return Err(DbError::invalid_statement(
            "Schema operations do not accept raw SQL. Use list_tables or describe_table.",
        ));
    }

    let tokens = statement_tokens(sql)?;
    let keyword = first_keyword(&tokens)?;
    let allowed = allowed_keywords(intent, dialect);
    if !allowed.contains(&keyword.as_str()) {
        return Err(DbError::invalid_statement(format!(
            "{} statements are not allowed for {} queries in the {} dialect. Allowed: {}",
            keyword,
            intent,
            dialect,
            allowed.join(", ")
        )));
    }

    if tokens.iter().any(is_into) {
        return Err(DbError::invalid_statement(format!(
            "{} ... INTO writes query results back into the database and is not allowed. \
             Remove the INTO clause to read the data.",
            keyword
        )));
    }

    Ok(ValidatedQuery::new(sql.trim(), intent, dialect))
}

/// Return the upper-cased first keyword of a single statement.
///
/// Fails when the text cannot be tokenized (unterminated quote or comment), has no
/// leading keyword, or contains more than one statement.
pub fn leading_keyword(sql: &str) -> DbResult<String> {
    first_keyword(&statement_tokens(sql)?)
}

/// Tokens of a single statement, without whitespace and comments.
fn statement_tokens(sql: &str) -> DbResult<Vec<Token>> {
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .tokenize()
        .map_err(|e| DbError::invalid_statement(format!("Failed to read SQL statement: {}", e)))?;

    let significant: Vec<Token> = tokens
        .into_iter()
        .filter(|t| !matches!(t, Token::Whitespace(_) | Token::EOF))
        .collect();

    // Everything after the first `;` must be empty
    let mut after_terminator = significant
        .iter()
        .skip_while(|t| !matches!(t, Token::SemiColon));
    if after_terminator.next().is_some() && after_terminator.any(|t| !matches!(t, Token::SemiColon))
    {
        return Err(DbError::invalid_statement(
            "Multiple statements are not allowed. Send one statement per call.",
        ));
    }

    Ok(significant)
}

fn first_keyword(tokens: &[Token]) -> DbResult<String> {
    match tokens.first() {
        Some(Token::Word(word)) if word.quote_style.is_none() => Ok(word.value.to_uppercase()),
        Some(other) => Err(DbError::invalid_statement(format!(
            "SQL statement must start with a keyword, found '{}'",
            other
        ))),
        None => Err(DbError::invalid_statement("Empty SQL statement")),
    }
}

/// Unquoted `INTO`; a quoted identifier or a string literal named "into" is data.
fn is_into(token: &Token) -> bool {
    matches!(
        token,
        Token::Word(word) if word.quote_style.is_none() && word.value.eq_ignore_ascii_case("INTO")
    )
}
