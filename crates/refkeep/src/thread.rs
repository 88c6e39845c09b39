//! # Comment Threads: Flat Storage, Nested Display
//!
//! Comments are stored flat, one document per comment, each carrying an
//! optional `parentCommentId`. Nested structures are awkward in a schemaless
//! store, so the tree is rebuilt in memory on every read.
//!
//! ## Ordering
//!
//! Siblings are ordered by `createdAt` ascending, ties broken by comment id.
//! The sort is stable, so equal keys keep their input order.
//!
//! ## Missing Parents
//!
//! A comment whose parent is not in the input (already deleted, or never
//! fetched) is **not dropped**: it degrades to a top-level reply. The same
//! applies to a comment that names itself as parent, and to members of a
//! parent cycle (the earliest unvisited member is lifted to top level).
//!
//! Every input comment therefore appears exactly once in the output.
//!
//! ## Implementation
//!
//! - [`build_threads`]: the builder. O(n) after the sort.
//! - [`ThreadNode`]: a comment with its ordered replies.
//! - [`descendant_ids`]: every transitive reply of one comment.

use crate::model::Comment;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadNode {
    pub comment: Comment,
    pub replies: Vec<ThreadNode>,
}

impl ThreadNode {
    /// Number of comments in this subtree, including this one.
    pub fn size(&self) -> usize {
        1 + self.replies.iter().map(ThreadNode::size).sum::<usize>()
    }

    /// Depth-first, pre-order walk.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a ThreadNode, usize)) {
        self.walk_at(0, visit);
    }

    fn walk_at<'a>(&'a self, depth: usize, visit: &mut impl FnMut(&'a ThreadNode, usize)) {
        visit(self, depth);
        for reply in &self.replies {
            reply.walk_at(depth + 1, visit);
        }
    }
}

/// Total comments across a forest.
pub fn thread_size(threads: &[ThreadNode]) -> usize {
    threads.iter().map(ThreadNode::size).sum()
}

/// Builds the reply forest for one root's comments.
pub fn build_threads(mut comments: Vec<Comment>) -> Vec<ThreadNode> {
    comments.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    // First occurrence wins if an id repeats
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(comments.len());
    for (pos, comment) in comments.iter().enumerate() {
        index.entry(comment.id.as_str()).or_insert(pos);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
    let mut top_level = Vec::new();
    for (pos, comment) in comments.iter().enumerate() {
        let parent = comment
            .parent_comment_id
            .as_deref()
            .and_then(|id| index.get(id).copied())
            .filter(|&parent| parent != pos);
        match parent {
            Some(parent) => children[parent].push(pos),
            None => top_level.push(pos),
        }
    }

    // Positions are visited in sorted order, so every children list is already sorted
    let mut visited = vec![false; comments.len()];
    let mut slots: Vec<Option<Comment>> = comments.into_iter().map(Some).collect();
    let mut forest: Vec<ThreadNode> = top_level
        .into_iter()
        .filter_map(|pos| assemble(pos, &children, &mut slots, &mut visited))
        .collect();

    // Anything left is caught in a parent cycle
    for pos in 0..slots.len() {
        if !visited[pos] {
            if let Some(node) = assemble(pos, &children, &mut slots, &mut visited) {
                forest.push(node);
            }
        }
    }

    forest
}

fn assemble(
    pos: usize,
    children: &[Vec<usize>],
    slots: &mut [Option<Comment>],
    visited: &mut [bool],
) -> Option<ThreadNode> {
    if visited[pos] {
        return None;
    }
    visited[pos] = true;
    let comment = slots[pos].take()?;
    let replies = children[pos]
        .iter()
        .filter_map(|&child| assemble(child, children, slots, visited))
        .collect();
    Some(ThreadNode { comment, replies })
}

/// Ids of every transitive reply to `comment_id`, excluding the comment itself.
///
/// Deepest replies come first: every id precedes its parent's, so deleting
/// in this order never strands a reply whose parent is already gone.
///
/// Takes `(id, parentCommentId)` pairs so raw documents can be walked without
/// decoding them.
pub fn descendant_ids<'a, I>(links: I, comment_id: &str) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let mut by_parent: HashMap<&'a str, Vec<&'a str>> = HashMap::new();
    for (id, parent) in links {
        if let Some(parent) = parent {
            by_parent.entry(parent).or_default().push(id);
        }
    }

    let mut found = Vec::new();
    let mut seen: HashSet<String> = HashSet::from([comment_id.to_string()]);
    let mut stack = vec![comment_id.to_string()];
    while let Some(current) = stack.pop() {
        for &child in by_parent.get(current.as_str()).into_iter().flatten() {
            if seen.insert(child.to_string()) {
                found.push(child.to_string());
                stack.push(child.to_string());
            }
        }
    }
    // Discovery order puts parents first
    found.reverse();
    found
}
