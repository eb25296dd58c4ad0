//! Script parsing.
//!
//! One command per line; `#` starts a comment.
//!
//! ```text
//! alloc <family> [name]          allocate an instance and hold it as `name`
//! release <name>
//! commit <name> <phrase...>      learn a phrase (rest of the line) through a held session
//! layout <family> <index>        change the configured keyboard layout
//! fuzzy <family> <rule>          add a fuzzy rule such as "z=zh"
//! modify                         mark user data modified
//! advance <seconds>              move simulated time forward
//! save                           save user data now
//! teardown                       finalize the backend
//! expect pending <true|false>
//! expect scheme <family> <none|Scheme>
//! expect freq <name> <phrase> <count>
//! ```

use anyhow::{anyhow, bail, Context, Result};
use libchinese_backend::SchemeFamily;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Alloc { family: SchemeFamily, name: String },
    Release { name: String },
    Commit { name: String, phrase: String },
    Layout { family: SchemeFamily, index: i32 },
    Fuzzy { family: SchemeFamily, rule: String },
    Modify,
    Advance { seconds: u64 },
    Save,
    Teardown,
    ExpectPending(bool),
    ExpectScheme { family: SchemeFamily, scheme: Option<String> },
    ExpectFreq { name: String, phrase: String, count: u64 },
}

/// A parsed command with its 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub number: usize,
    pub command: Command,
}

pub fn parse(source: &str) -> Result<Vec<Line>> {
    let mut out = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let number = idx + 1;
        let text = raw.split('#').next().unwrap_or("").trim();
        if text.is_empty() {
            continue;
        }
        let command = parse_command(text).with_context(|| format!("line {}", number))?;
        out.push(Line { number, command });
    }
    Ok(out)
}

fn parse_command(text: &str) -> Result<Command> {
    // The phrase runs to the end of the line and may contain spaces.
    if let Some(("commit", rest)) = text.split_once(char::is_whitespace) {
        let Some((name, phrase)) = rest.trim_start().split_once(char::is_whitespace) else {
            bail!("commit needs an instance name and a phrase: {}", text);
        };
        return Ok(Command::Commit {
            name: name.to_string(),
            phrase: phrase.trim().to_string(),
        });
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let command = match words.as_slice() {
        ["alloc", family] => Command::Alloc {
            family: family_arg(family)?,
            name: family.to_string(),
        },
        ["alloc", family, name] => Command::Alloc {
            family: family_arg(family)?,
            name: name.to_string(),
        },
        ["release", name] => Command::Release {
            name: name.to_string(),
        },
        ["layout", family, index] => Command::Layout {
            family: family_arg(family)?,
            index: index
                .parse()
                .map_err(|_| anyhow!("layout index must be an integer: {}", index))?,
        },
        ["fuzzy", family, rule] => Command::Fuzzy {
            family: family_arg(family)?,
            rule: rule.to_string(),
        },
        ["modify"] => Command::Modify,
        ["advance", seconds] => Command::Advance {
            seconds: seconds
                .parse()
                .map_err(|_| anyhow!("seconds must be a non-negative integer: {}", seconds))?,
        },
        ["save"] => Command::Save,
        ["teardown"] => Command::Teardown,
        ["expect", "pending", value] => Command::ExpectPending(
            value
                .parse()
                .map_err(|_| anyhow!("expected true or false, got {}", value))?,
        ),
        ["expect", "scheme", family, scheme] => Command::ExpectScheme {
            family: family_arg(family)?,
            scheme: (*scheme != "none").then(|| scheme.to_string()),
        },
        ["expect", "freq", name, phrase, count] => Command::ExpectFreq {
            name: name.to_string(),
            phrase: phrase.to_string(),
            count: count
                .parse()
                .map_err(|_| anyhow!("count must be a non-negative integer: {}", count))?,
        },
        _ => bail!("unrecognized command: {}", text),
    };
    Ok(command)
}

fn family_arg(word: &str) -> Result<SchemeFamily> {
    word.parse::<SchemeFamily>().map_err(|e| anyhow!(e))
}
