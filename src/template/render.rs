//! Variable substitution engine for template sources.
//!
//! Performs `{variable}` substitution in text. The engine is fail-safe:
//! an undefined variable is an error rather than a silent empty substitution,
//! so a typo in a template cannot produce a quietly broken project.
//!
//! # Syntax
//!
//! - `{name}` - substitutes the value of variable `name`
//! - `{{` - renders as literal `{`
//! - `}}` - renders as literal `}`

use crate::error::LatheError;
use std::collections::HashMap;
use std::fmt;

/// Error type for render failures, carrying the byte position in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A variable was referenced but not provided.
    UndefinedVariable { name: String, position: usize },
    /// A `{` was found without a matching `}`.
    UnmatchedBrace { position: usize },
    /// An empty variable name was found (`{}`).
    EmptyVariableName { position: usize },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::UndefinedVariable { name, position } => {
                write!(f, "undefined variable '{}' at position {}", name, position)
            }
            RenderError::UnmatchedBrace { position } => {
                write!(f, "unmatched '{{' at position {}", position)
            }
            RenderError::EmptyVariableName { position } => {
                write!(f, "empty variable name '{{}}' at position {}", position)
            }
        }
    }
}

impl std::error::Error for RenderError {}

impl From<RenderError> for LatheError {
    fn from(err: RenderError) -> Self {
        LatheError::TemplateSyntax(err.to_string())
    }
}

/// Render a template string by substituting variables.
///
/// # Errors
///
/// * `UndefinedVariable` - the template references a variable not in `variables`
/// * `UnmatchedBrace` - a `{` has no closing `}`
/// * `EmptyVariableName` - the template contains `{}`
pub fn render(
    template: &str,
    variables: &HashMap<String, String>,
) -> Result<String, RenderError> {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' => {
                if let Some((_, '{')) = chars.peek() {
                    chars.next();
                    result.push('{');
                } else {
                    let start_pos = pos;
                    let mut var_name = String::new();

                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, c)) => var_name.push(c),
                            None => {
                                return Err(RenderError::UnmatchedBrace {
                                    position: start_pos,
                                });
                            }
                        }
                    }

                    if var_name.is_empty() {
                        return Err(RenderError::EmptyVariableName {
                            position: start_pos,
                        });
                    }

                    let var_name = var_name.trim();
                    match variables.get(var_name) {
                        Some(value) => result.push_str(value),
                        None => {
                            return Err(RenderError::UndefinedVariable {
                                name: var_name.to_string(),
                                position: start_pos,
                            });
                        }
                    }
                }
            }
            '}' => {
                if let Some((_, '}')) = chars.peek() {
                    chars.next();
                }
                // A lone } is an ordinary character.
                result.push('}');
            }
            _ => result.push(ch),
        }
    }

    Ok(result)
}
