// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tag templates.
//!
//! Templates use the Go `text/template` action syntax that logspout users
//! already write their tags in, restricted to what makes sense for a tag:
//!
//! - `{{ .Container.Name }}`, `{{ .Container.ID }}`, `{{ .Container.Pid }}`
//! - `{{ .Container.Config.Image }}`, `{{ .Container.Config.Hostname }}`
//! - `{{ .Source }}`, `{{ .Data }}`
//! - `{{ index .Container.Config.Labels "com.example.team" }}`
//! - `{{ .Container.Config.Labels.team }}` for keys that are plain identifiers
//! - `{{- ... -}}` trims the whitespace around the action
//! - `{{/* comment */}}`
//!
//! Anything else fails to parse or to evaluate.

use crate::errors::TemplateError;
use crate::message::RawRecord;

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Field(Vec<String>),
    Index { path: Vec<String>, key: String },
}

/// A compiled tag template. Immutable after [`Template::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

/// Value a field path resolves to.
enum Value<'a> {
    Text(String),
    Labels(&'a std::collections::BTreeMap<String, String>),
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut nodes = Vec::new();
        let mut rest = source;
        let mut offset = 0;
        let mut trim_next_text = false;

        while let Some(start) = rest.find(LEFT_DELIM) {
            let mut text = &rest[..start];
            if trim_next_text {
                text = text.trim_start();
            }
            let after_open = &rest[start + LEFT_DELIM.len()..];
            let Some(end) = after_open.find(RIGHT_DELIM) else {
                return Err(TemplateError::Unclosed(offset + start));
            };
            let mut inner = &after_open[..end];

            // "{{- " and " -}}" trim the surrounding text
            if let Some(stripped) = inner.strip_prefix('-') {
                if stripped.starts_with(char::is_whitespace) {
                    text = text.trim_end();
                    inner = stripped;
                }
            }
            trim_next_text = false;
            if let Some(stripped) = inner.strip_suffix('-') {
                if stripped.ends_with(char::is_whitespace) {
                    trim_next_text = true;
                    inner = stripped;
                }
            }

            if !text.is_empty() {
                nodes.push(Node::Text(text.to_string()));
            }
            if let Some(node) = parse_action(inner, offset + start)? {
                nodes.push(node);
            }

            let consumed = start + LEFT_DELIM.len() + end + RIGHT_DELIM.len();
            offset += consumed;
            rest = &rest[consumed..];
        }

        let tail = if trim_next_text { rest.trim_start() } else { rest };
        if !tail.is_empty() {
            nodes.push(Node::Text(tail.to_string()));
        }

        Ok(Template { nodes })
    }

    pub fn execute(&self, record: &RawRecord) -> Result<String, TemplateError> {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Field(path) => match lookup(record, path)? {
                    Value::Text(text) => out.push_str(&text),
                    Value::Labels(_) => {
                        return Err(TemplateError::MapNotPrintable(display_path(path)))
                    }
                },
                Node::Index { path, key } => match lookup(record, path)? {
                    Value::Labels(labels) => {
                        // missing keys render as the zero value, like Go does
                        if let Some(value) = labels.get(key) {
                            out.push_str(value);
                        }
                    }
                    Value::Text(_) => return Err(TemplateError::NotIndexable(display_path(path))),
                },
            }
        }
        Ok(out)
    }
}

fn parse_action(inner: &str, position: usize) -> Result<Option<Node>, TemplateError> {
    let trimmed = inner.trim();
    if trimmed.starts_with("/*") && trimmed.ends_with("*/") {
        return Ok(None);
    }

    let tokens = tokenize(trimmed, position)?;
    let Some((first, args)) = tokens.split_first() else {
        return Err(TemplateError::EmptyAction(position));
    };

    match first {
        Token::Field(path) => {
            if let Some(extra) = args.first() {
                return Err(TemplateError::UnexpectedToken(extra.to_string()));
            }
            Ok(Some(Node::Field(path.clone())))
        }
        Token::Ident(name) if name == "index" => match args {
            [Token::Field(path), Token::Str(key)] => Ok(Some(Node::Index {
                path: path.clone(),
                key: key.clone(),
            })),
            [] | [_] => Err(TemplateError::UnexpectedToken("index".to_string())),
            [_, other, ..] if !matches!(other, Token::Str(_)) => {
                Err(TemplateError::UnexpectedToken(other.to_string()))
            }
            [first_arg, _, ..] if !matches!(first_arg, Token::Field(_)) => {
                Err(TemplateError::UnexpectedToken(first_arg.to_string()))
            }
            [_, _, extra, ..] => Err(TemplateError::UnexpectedToken(extra.to_string())),
            _ => Err(TemplateError::UnexpectedToken("index".to_string())),
        },
        Token::Ident(name) => Err(TemplateError::UnknownFunction(name.clone())),
        other => Err(TemplateError::UnexpectedToken(other.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Field(Vec<String>),
    Ident(String),
    Str(String),
    Other(String),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Field(path) => write!(f, "{}", display_path(path)),
            Token::Ident(s) | Token::Other(s) => write!(f, "{s}"),
            Token::Str(s) => write!(f, "{s:?}"),
        }
    }
}

fn tokenize(input: &str, position: usize) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' || c == '`' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some((_, ch)) = chars.next() {
                if ch == c {
                    closed = true;
                    break;
                }
                if ch == '\\' && c == '"' {
                    if let Some((_, escaped)) = chars.next() {
                        value.push(escaped);
                    }
                    continue;
                }
                value.push(ch);
            }
            if !closed {
                return Err(TemplateError::Unclosed(position + i));
            }
            tokens.push(Token::Str(value));
            continue;
        }

        let mut word = String::new();
        while let Some(&(_, ch)) = chars.peek() {
            if ch.is_whitespace() {
                break;
            }
            word.push(ch);
            chars.next();
        }
        tokens.push(classify(word));
    }

    Ok(tokens)
}

fn classify(word: String) -> Token {
    if let Some(path) = word.strip_prefix('.') {
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        let valid = segments
            .iter()
            .all(|s| !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_'));
        if valid {
            return Token::Field(segments);
        }
        return Token::Other(word);
    }
    if word.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Token::Ident(word);
    }
    Token::Other(word)
}

fn display_path(path: &[String]) -> String {
    format!(".{}", path.join("."))
}

fn lookup<'a>(record: &'a RawRecord, path: &[String]) -> Result<Value<'a>, TemplateError> {
    let segments: Vec<&str> = path.iter().map(String::as_str).collect();
    let container = &record.container;
    let value = match segments.as_slice() {
        ["Source"] => Value::Text(record.source.clone()),
        ["Data"] => Value::Text(record.data.clone()),
        ["Container", "Name"] => Value::Text(container.name.clone()),
        ["Container", "ID"] => Value::Text(container.id.clone()),
        ["Container", "Pid"] => {
            Value::Text(container.pid.map(|p| p.to_string()).unwrap_or_default())
        }
        ["Container", "Config", "Image"] => Value::Text(container.config.image.clone()),
        ["Container", "Config", "Hostname"] => Value::Text(container.config.hostname.clone()),
        ["Container", "Config", "Labels"] => Value::Labels(&container.config.labels),
        // map key by field chain, missing keys render empty like `index`
        ["Container", "Config", "Labels", key] => {
            Value::Text(container.config.labels.get(*key).cloned().unwrap_or_default())
        }
        _ => return Err(TemplateError::UnknownField(display_path(path))),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ContainerConfig, ContainerInfo};

    fn record() -> RawRecord {
        RawRecord {
            data: "hello".to_string(),
            source: "stdout".to_string(),
            priority: None,
            container: ContainerInfo {
                name: "/web".to_string(),
                id: "abc123".to_string(),
                pid: Some(42),
                config: ContainerConfig {
                    image: "nginx:1.25".to_string(),
                    hostname: "web-1".to_string(),
                    labels: [("team".to_string(), "core".to_string())]
                        .into_iter()
                        .collect(),
                },
            },
        }
    }

    fn render(source: &str) -> Result<String, TemplateError> {
        Template::parse(source)?.execute(&record())
    }

    #[test]
    fn test_field_paths() {
        assert_eq!(render("{{.Container.Name}}").unwrap(), "/web");
        assert_eq!(render("{{ .Container.ID }}").unwrap(), "abc123");
        assert_eq!(render("{{.Container.Pid}}").unwrap(), "42");
        assert_eq!(render("{{.Container.Config.Image}}").unwrap(), "nginx:1.25");
        assert_eq!(render("{{.Container.Config.Hostname}}").unwrap(), "web-1");
        assert_eq!(render("{{.Source}}").unwrap(), "stdout");
    }

    #[test]
    fn test_text_around_actions() {
        assert_eq!(
            render("img-{{.Container.Config.Image}}-{{.Source}}").unwrap(),
            "img-nginx:1.25-stdout"
        );
        assert_eq!(render("no actions").unwrap(), "no actions");
    }

    #[test]
    fn test_index_labels() {
        assert_eq!(
            render(r#"{{ index .Container.Config.Labels "team" }}"#).unwrap(),
            "core"
        );
        assert_eq!(
            render(r#"x{{ index .Container.Config.Labels "missing" }}y"#).unwrap(),
            "xy"
        );
        assert_eq!(
            render("{{ index .Container.Config.Labels `team` }}").unwrap(),
            "core"
        );
    }

    #[test]
    fn test_labels_by_field_chain() {
        assert_eq!(render("{{.Container.Config.Labels.team}}").unwrap(), "core");
        assert_eq!(render("a{{ .Container.Config.Labels.missing }}b").unwrap(), "ab");
        assert_eq!(
            render("{{.Container.Config.Labels.team.more}}").unwrap_err(),
            TemplateError::UnknownField(".Container.Config.Labels.team.more".to_string())
        );
    }

    #[test]
    fn test_trim_markers() {
        assert_eq!(render("a  {{- .Source -}}  b").unwrap(), "astdoutb");
        assert_eq!(render("a {{.Source}} b").unwrap(), "a stdout b");
    }

    #[test]
    fn test_comment_renders_nothing() {
        assert_eq!(render("a{{/* note */}}b").unwrap(), "ab");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Template::parse("{{.Container.Name").unwrap_err(),
            TemplateError::Unclosed(0)
        );
        assert_eq!(
            Template::parse("ab{{  }}").unwrap_err(),
            TemplateError::EmptyAction(2)
        );
        assert_eq!(
            Template::parse("{{ upper .Source }}").unwrap_err(),
            TemplateError::UnknownFunction("upper".to_string())
        );
        assert!(Template::parse("{{ .Source | printf }}").is_err());
        assert!(Template::parse(r#"{{ index .Container.Config.Labels }}"#).is_err());
        assert!(Template::parse(r#"{{ index .Container.Config.Labels "a }}"#).is_err());
    }

    #[test]
    fn test_execution_errors() {
        assert_eq!(
            render("{{.Container.Nope}}").unwrap_err(),
            TemplateError::UnknownField(".Container.Nope".to_string())
        );
        assert_eq!(
            render("{{.Container.Config.Labels}}").unwrap_err(),
            TemplateError::MapNotPrintable(".Container.Config.Labels".to_string())
        );
        assert_eq!(
            render(r#"{{ index .Source "x" }}"#).unwrap_err(),
            TemplateError::NotIndexable(".Source".to_string())
        );
    }
}
