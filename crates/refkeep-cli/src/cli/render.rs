//! # Rendering Module
//!
//! Turns command outcomes into terminal text. Every `render_*` function returns
//! a `String` so output can be tested without capturing stdout; the `print_*`
//! wrappers write it.
//!
//! Styling comes from `console`, which drops colors automatically when stdout
//! is not a terminal.

use super::styles::{AUTHOR, ERROR, HEADING, INFO, PATH, SUCCESS, TIME, WARNING};
use chrono::{DateTime, Utc};
use refkeep::commands::scan::OrphanReport;
use refkeep::commands::{CmdMessage, MessageLevel};
use refkeep::model::DocRef;
use refkeep::thread::ThreadNode;
use serde::Serialize;

pub const INDENT: &str = "  ";

pub fn render_messages(messages: &[CmdMessage]) -> String {
    let mut out = String::new();
    for message in messages {
        let style = match message.level {
            MessageLevel::Info => &*INFO,
            MessageLevel::Success => &*SUCCESS,
            MessageLevel::Warning => &*WARNING,
            MessageLevel::Error => &*ERROR,
        };
        out.push_str(&format!("{}\n", style.apply_to(&message.content)));
    }
    out
}

pub fn print_messages(messages: &[CmdMessage]) {
    let output = render_messages(messages);
    if !output.is_empty() {
        print!("{}", output);
    }
}

pub fn render_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value).map(|s| s + "\n")
}

/// JSON shape of a thread node; the comment id lives in the document path,
/// so it is added back here.
#[derive(Serialize)]
pub struct ThreadJson<'a> {
    pub id: &'a str,
    #[serde(flatten)]
    pub comment: &'a refkeep::model::Comment,
    pub replies: Vec<ThreadJson<'a>>,
}

impl<'a> ThreadJson<'a> {
    pub fn forest(threads: &'a [ThreadNode]) -> Vec<ThreadJson<'a>> {
        threads.iter().map(ThreadJson::from).collect()
    }
}

impl<'a> From<&'a ThreadNode> for ThreadJson<'a> {
    fn from(node: &'a ThreadNode) -> Self {
        ThreadJson {
            id: &node.comment.id,
            comment: &node.comment,
            replies: ThreadJson::forest(&node.replies),
        }
    }
}

pub fn render_report(report: &OrphanReport) -> String {
    let mut out = render_messages(&report.messages());
    let sections: [(&str, &[DocRef]); 6] = [
        ("Orphan resolutions", report.orphan_resolutions.as_slice()),
        ("Orphan topics", report.orphan_topics.as_slice()),
        ("Orphan journal entries", report.orphan_journal_entries.as_slice()),
        ("Orphan comments", report.orphan_comments.as_slice()),
        ("Orphan edge halves", report.orphan_edges.as_slice()),
        ("Orphan notifications", report.orphan_notifications.as_slice()),
    ];
    for (title, refs) in sections {
        if refs.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{}\n", HEADING.apply_to(title)));
        for r in refs {
            out.push_str(&format!("{}{}\n", INDENT, PATH.apply_to(r)));
        }
    }
    out
}

pub fn render_thread(threads: &[ThreadNode], now: DateTime<Utc>) -> String {
    if threads.is_empty() {
        return format!("{}\n", INFO.apply_to("No comments."));
    }
    let mut out = String::new();
    for root in threads {
        root.walk(&mut |node, depth| {
            let pad = INDENT.repeat(depth);
            let c = &node.comment;
            let name = if c.author.display_name.is_empty() {
                c.author.id.as_str()
            } else {
                c.author.display_name.as_str()
            };
            out.push_str(&format!(
                "{}{} {} {}\n",
                pad,
                AUTHOR.apply_to(name),
                INFO.apply_to(format!("[{}]", c.id)),
                TIME.apply_to(format_time_ago(c.created_at, now))
            ));
            for line in c.content.lines() {
                out.push_str(&format!("{}{}{}\n", pad, INDENT, line));
            }
        });
    }
    out
}

pub fn format_time_ago(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(timestamp);
    timeago::Formatter::new().convert(elapsed.to_std().unwrap_or_default())
}
