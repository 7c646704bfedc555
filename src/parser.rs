//! Turns tokens into statements.
//!
//! The grammar is deliberately flat: a line is a `;`-separated list of simple
//! commands, each made of leading `NAME=value` assignments and an argv.
//! Pipelines and redirections are rejected.

use crate::lexer::{Token, WordPart};

/// A word as produced by the lexer, before parameter expansion.
pub type Word = Vec<WordPart>;

/// `NAME=value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: Word,
}

/// A simple command.
///
/// With an empty `argv` the assignments apply to the session; otherwise they
/// apply only while the command runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statement {
    pub assignments: Vec<Assignment>,
    pub argv: Vec<Word>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    /// `|`, `&`, `<` or `>`; the shell only runs simple commands.
    UnsupportedOperator(char),
}

/// Build the statements of one line. Empty statements (`;;`, blank lines,
/// comments) are dropped.
pub fn construct_statements(tokens: Vec<Token>) -> Result<Vec<Statement>, ParsingError> {
    let mut statements = Vec::new();
    let mut current = Statement::default();

    for token in tokens {
        match token {
            Token::Operator(';') => {
                push_statement(&mut statements, std::mem::take(&mut current));
            }
            Token::Operator(op) => return Err(ParsingError::UnsupportedOperator(op)),
            Token::Word(parts) => {
                if current.argv.is_empty() {
                    match split_assignment(&parts) {
                        Some(assignment) => current.assignments.push(assignment),
                        None => current.argv.push(parts),
                    }
                } else {
                    current.argv.push(parts);
                }
            }
        }
    }
    push_statement(&mut statements, current);

    Ok(statements)
}

fn push_statement(statements: &mut Vec<Statement>, statement: Statement) {
    if !statement.assignments.is_empty() || !statement.argv.is_empty() {
        statements.push(statement);
    }
}

/// Recognise `NAME=value`. The name must be unquoted and a valid identifier.
fn split_assignment(parts: &[WordPart]) -> Option<Assignment> {
    let WordPart::Literal(first) = parts.first()? else {
        return None;
    };
    let (name, rest) = first.split_once('=')?;
    if !is_valid_name(name) {
        return None;
    }

    let mut value = Vec::new();
    if !rest.is_empty() {
        value.push(WordPart::Literal(rest.to_string()));
    }
    value.extend(parts[1..].iter().cloned());

    Some(Assignment {
        name: name.to_string(),
        value,
    })
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
