//! Dockerfile syntax parser.
//!
//! Splits Dockerfile text into raw stage declarations, each holding the raw
//! commands that follow its `FROM`. Handles parser directives, line
//! continuations, comments, leading `--flag` tokens and the argument shape
//! each keyword expects. Commands are not interpreted here; the classifier
//! turns them into typed instructions.

use stagefile_core::error::{Result, StagefileError};

/// Escape character used when no `# escape=` directive is present.
const DEFAULT_ESCAPE: char = '\\';

/// Parser directives declared at the top of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directives {
    pub escape: char,
    pub syntax: Option<String>,
}

impl Default for Directives {
    fn default() -> Self {
        Self {
            escape: DEFAULT_ESCAPE,
            syntax: None,
        }
    }
}

/// A `--name` or `--name=value` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flag {
    pub name: String,
    pub value: Option<String>,
}

/// One logical Dockerfile line, split into keyword, flags and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommand {
    /// 1-based line on which the command starts
    pub line: usize,
    /// Upper-cased keyword
    pub keyword: String,
    pub flags: Vec<Flag>,
    /// Arguments, shaped per keyword (see [`parse`])
    pub args: Vec<String>,
    /// Whether the arguments came from a JSON array (exec form)
    pub json: bool,
    /// Text after the keyword and flags, verbatim
    pub original: String,
}

impl RawCommand {
    /// Value of the last occurrence of a flag. A bare `--name` yields `""`.
    pub fn flag(&self, name: &str) -> Option<&str> {
        self.flags
            .iter()
            .rev()
            .find(|flag| flag.name == name)
            .map(|flag| flag.value.as_deref().unwrap_or(""))
    }

    /// Values of every occurrence of a repeatable flag, in order.
    pub fn flag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.flags
            .iter()
            .filter(move |flag| flag.name == name)
            .map(|flag| flag.value.as_deref().unwrap_or(""))
    }
}

/// A `FROM` declaration and the commands up to the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStage {
    pub line: usize,
    pub base_name: String,
    pub name: Option<String>,
    pub platform: Option<String>,
    pub commands: Vec<RawCommand>,
}

/// Output of the syntax parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxTree {
    pub directives: Directives,
    /// `ARG` commands declared before the first `FROM`
    pub meta_args: Vec<RawCommand>,
    pub stages: Vec<RawStage>,
}

/// Parse Dockerfile bytes into raw stages.
///
/// Argument shapes:
/// - `ENV`, `LABEL`: flattened key/value pairs `[k1, v1, k2, v2, ...]`
/// - `RUN`, `CMD`, `ENTRYPOINT`: the JSON array, or the whole text as one argument
/// - `SHELL`: the JSON array (required)
/// - `COPY`, `ADD`, `VOLUME`: the JSON array, or whitespace-separated words;
///   `COPY`/`ADD` always carry at least two
/// - `HEALTHCHECK`: `["NONE"]` or `["CMD", ...]`
/// - `ONBUILD`: the trigger text as one argument
/// - `FROM`, `ARG`, `EXPOSE`, `USER`, `STOPSIGNAL`, `WORKDIR`: whitespace-separated words
/// - anything else: the remaining text as one argument
///
/// Leading `--name[=value]` tokens are split off as flags for every keyword.
pub fn parse(content: &[u8]) -> Result<SyntaxTree> {
    let text = std::str::from_utf8(content)
        .map_err(|e| StagefileError::syntax(1, format!("invalid UTF-8: {e}")))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let directives = parse_directives(text)?;
    let logical_lines = join_continuation_lines(text, directives.escape);

    let mut meta_args = Vec::new();
    let mut stages: Vec<RawStage> = Vec::new();
    let mut seen_instruction = false;

    for (line_num, line) in logical_lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        seen_instruction = true;

        let command = parse_command(trimmed, line_num, directives.escape)?;
        if command.keyword == "FROM" {
            stages.push(parse_from(command)?);
            continue;
        }

        match stages.last_mut() {
            Some(stage) => stage.commands.push(command),
            None if command.keyword == "ARG" => meta_args.push(command),
            None => {
                return Err(StagefileError::syntax(
                    line_num,
                    "no build stage in current context",
                ))
            }
        }
    }

    let last_line = text.lines().count().max(1);
    if !seen_instruction {
        return Err(StagefileError::syntax(last_line, "file with no instructions"));
    }
    if stages.is_empty() {
        return Err(StagefileError::syntax(last_line, "no stages to build"));
    }

    Ok(SyntaxTree {
        directives,
        meta_args,
        stages,
    })
}

/// Read `# key=value` parser directives from the top of the file.
///
/// Directive processing stops at the first line that is not a recognized
/// directive.
fn parse_directives(text: &str) -> Result<Directives> {
    let mut directives = Directives::default();
    let mut escape_seen = false;

    for (idx, line) in text.lines().enumerate() {
        let line_num = idx + 1;
        let Some(comment) = line.trim().strip_prefix('#') else {
            break;
        };
        let Some((key, value)) = comment.split_once('=') else {
            break;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "escape" => {
                if escape_seen {
                    return Err(StagefileError::syntax(
                        line_num,
                        "only one escape parser directive can be used",
                    ));
                }
                escape_seen = true;
                directives.escape = match value {
                    "\\" => '\\',
                    "`" => '`',
                    other => {
                        return Err(StagefileError::syntax(
                            line_num,
                            format!("invalid escape token '{other}' does not match ` or \\"),
                        ))
                    }
                };
            }
            "syntax" => {
                if directives.syntax.is_some() {
                    return Err(StagefileError::syntax(
                        line_num,
                        "only one syntax parser directive can be used",
                    ));
                }
                directives.syntax = Some(value.to_string());
            }
            _ => break,
        }
    }

    Ok(directives)
}

/// Join lines ending with the escape character into single logical lines.
///
/// Each logical line is paired with the 1-based number of the line it starts
/// on. Comment lines are dropped, as are blank lines inside a continuation.
fn join_continuation_lines(content: &str, escape: char) -> Vec<(usize, String)> {
    let mut logical_lines = Vec::new();
    let mut current = String::new();
    let mut start: Option<usize> = None;

    for (idx, line) in content.lines().enumerate() {
        let line_num = idx + 1;
        let trimmed = line.trim_start();

        if trimmed.starts_with('#') || (start.is_some() && trimmed.is_empty()) {
            continue;
        }

        match line.trim_end().strip_suffix(escape) {
            Some(head) => {
                start.get_or_insert(line_num);
                current.push_str(head.trim_end());
                current.push(' ');
            }
            None => {
                current.push_str(line);
                logical_lines.push((start.take().unwrap_or(line_num), std::mem::take(&mut current)));
            }
        }
    }

    // Handle trailing continuation without final line
    if let Some(line_num) = start {
        logical_lines.push((line_num, current));
    }

    logical_lines
}

/// Parse a single logical line into a raw command.
fn parse_command(line: &str, line_num: usize, escape: char) -> Result<RawCommand> {
    let (keyword, rest) = split_first_word(line);
    let keyword = keyword.to_uppercase();

    let (flags, rest) = extract_flags(rest);

    if rest.is_empty() {
        return Err(StagefileError::syntax(
            line_num,
            format!("{keyword} requires at least one argument"),
        ));
    }

    let mut command = RawCommand {
        line: line_num,
        keyword,
        flags,
        args: Vec::new(),
        json: false,
        original: rest.to_string(),
    };

    match command.keyword.as_str() {
        "ENV" | "LABEL" => {
            command.args = parse_key_value_pairs(rest, &command.keyword, line_num, escape)?
                .into_iter()
                .flat_map(|(key, value)| [key, value])
                .collect();
        }
        "RUN" | "CMD" | "ENTRYPOINT" => match parse_json_array(rest) {
            Some(parts) => {
                command.args = parts;
                command.json = true;
            }
            None => command.args = vec![rest.to_string()],
        },
        "SHELL" => {
            command.args = parse_json_array(rest).ok_or_else(|| {
                StagefileError::syntax(line_num, "SHELL requires the arguments to be in JSON form")
            })?;
            command.json = true;
        }
        "COPY" | "ADD" | "VOLUME" => {
            match parse_json_array(rest) {
                Some(parts) => {
                    command.args = parts;
                    command.json = true;
                }
                None => command.args = split_words(rest, escape).map_err(|m| StagefileError::syntax(line_num, m))?,
            }
            if command.keyword != "VOLUME" && command.args.len() < 2 {
                return Err(StagefileError::syntax(
                    line_num,
                    format!(
                        "{} requires at least two arguments, but only {} provided. Destination could not be determined",
                        command.keyword,
                        command.args.len()
                    ),
                ));
            }
        }
        "HEALTHCHECK" => parse_healthcheck_args(&mut command, rest)?,
        "ONBUILD" => {
            let (trigger, _) = split_first_word(rest);
            let trigger = trigger.to_uppercase();
            if matches!(trigger.as_str(), "ONBUILD" | "FROM" | "MAINTAINER") {
                return Err(StagefileError::syntax(
                    line_num,
                    format!("{trigger} isn't allowed as an ONBUILD trigger"),
                ));
            }
            command.args = vec![rest.to_string()];
        }
        "FROM" | "ARG" | "EXPOSE" | "USER" | "STOPSIGNAL" | "WORKDIR" => {
            command.args =
                split_words(rest, escape).map_err(|m| StagefileError::syntax(line_num, m))?;
        }
        _ => command.args = vec![rest.to_string()],
    }

    Ok(command)
}

/// Split a string into the first word and the rest.
fn split_first_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim_start()),
        None => (s, ""),
    }
}

/// Strip leading `--name[=value]` tokens.
fn extract_flags(rest: &str) -> (Vec<Flag>, &str) {
    let mut flags = Vec::new();
    let mut remaining = rest.trim_start();

    while let Some(after_dashes) = remaining.strip_prefix("--") {
        if after_dashes.is_empty() || after_dashes.starts_with(char::is_whitespace) {
            break;
        }
        let (token, after) = split_first_word(after_dashes);
        flags.push(match token.split_once('=') {
            Some((name, value)) => Flag {
                name: name.to_string(),
                value: Some(value.to_string()),
            },
            None => Flag {
                name: token.to_string(),
                value: None,
            },
        });
        remaining = after;
    }

    (flags, remaining)
}

fn parse_from(command: RawCommand) -> Result<RawStage> {
    let mut platform = None;
    for flag in &command.flags {
        match flag.name.as_str() {
            "platform" => {
                let value = flag.value.as_deref().unwrap_or("");
                if value.is_empty() {
                    return Err(StagefileError::instruction(
                        command.line,
                        "--platform requires a value",
                    ));
                }
                platform = Some(value.to_string());
            }
            other => {
                return Err(StagefileError::instruction(
                    command.line,
                    format!("unknown flag: --{other}"),
                ))
            }
        }
    }

    let (base_name, name) = match command.args.as_slice() {
        [image] => (image.clone(), None),
        [image, keyword, name] if keyword.eq_ignore_ascii_case("AS") => {
            (image.clone(), Some(name.clone()))
        }
        _ => {
            return Err(StagefileError::syntax(
                command.line,
                "FROM requires either one or three arguments",
            ))
        }
    };

    Ok(RawStage {
        line: command.line,
        base_name,
        name,
        platform,
        commands: Vec::new(),
    })
}

/// `HEALTHCHECK NONE` or `HEALTHCHECK [flags] CMD <command>`.
fn parse_healthcheck_args(command: &mut RawCommand, rest: &str) -> Result<()> {
    let (kind, cmd) = split_first_word(rest);
    match kind.to_uppercase().as_str() {
        "NONE" => {
            if !cmd.is_empty() || !command.flags.is_empty() {
                return Err(StagefileError::syntax(
                    command.line,
                    "HEALTHCHECK NONE takes no arguments",
                ));
            }
            command.args = vec!["NONE".to_string()];
        }
        "CMD" => {
            if cmd.is_empty() {
                return Err(StagefileError::syntax(
                    command.line,
                    "Missing command after HEALTHCHECK CMD",
                ));
            }
            command.args = vec!["CMD".to_string()];
            match parse_json_array(cmd) {
                Some(parts) => {
                    command.args.extend(parts);
                    command.json = true;
                }
                None => command.args.push(cmd.to_string()),
            }
        }
        other => {
            return Err(StagefileError::syntax(
                command.line,
                format!("Unknown type \"{other}\" in HEALTHCHECK (try CMD)"),
            ))
        }
    }
    Ok(())
}

/// Parse `ENV`/`LABEL` arguments into ordered key/value pairs.
///
/// Two forms:
/// - `KEY=VALUE ...` (values may be quoted)
/// - `KEY VALUE` (legacy, a single pair)
fn parse_key_value_pairs(
    rest: &str,
    keyword: &str,
    line_num: usize,
    escape: char,
) -> Result<Vec<(String, String)>> {
    let (first, remainder) = split_first_word(rest);

    if !first.contains('=') {
        if remainder.is_empty() {
            return Err(StagefileError::syntax(
                line_num,
                format!("{keyword} must have two arguments"),
            ));
        }
        return Ok(vec![(first.to_string(), unquote(remainder))]);
    }

    split_words(rest, escape)
        .map_err(|m| StagefileError::syntax(line_num, m))?
        .into_iter()
        .map(|word| match word.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            Some(_) => Err(StagefileError::syntax(
                line_num,
                format!("{keyword} names can not be blank"),
            )),
            None => Err(StagefileError::syntax(
                line_num,
                format!("Syntax error - can't find = in \"{word}\". Must be of the form: name=value"),
            )),
        })
        .collect()
}

// --- Helpers ---

/// Parse a JSON array string like `["a", "b", "c"]`.
///
/// Returns `None` when the text is not a JSON array of strings, in which
/// case callers fall back to the shell form.
fn parse_json_array(s: &str) -> Option<Vec<String>> {
    if !s.starts_with('[') {
        return None;
    }
    serde_json::from_str(s).ok()
}

/// Remove surrounding quotes from a string.
fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

/// Whitespace-based split that respects quoted strings.
///
/// Quotes are removed. Outside single quotes the escape character makes the
/// next character literal; inside double quotes it only escapes `"` and
/// itself.
fn split_words(s: &str, escape: char) -> std::result::Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some('\'') => current.push(c),
            Some(_) => {
                if c == escape && matches!(chars.peek(), Some(&next) if next == '"' || next == escape) {
                    current.extend(chars.next());
                } else {
                    current.push(c);
                }
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                in_word = true;
                if c == '"' || c == '\'' {
                    quote = Some(c);
                } else if c == escape {
                    current.push(chars.next().unwrap_or(c));
                } else {
                    current.push(c);
                }
            }
        }
    }

    if let Some(q) = quote {
        return Err(format!(
            "unexpected end of statement while looking for matching {q}"
        ));
    }
    if in_word {
        words.push(current);
    }

    Ok(words)
}
