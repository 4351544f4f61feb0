/* This file is part of DarkFi (https://dark.fi)
 *
 * Copyright (C) 2020-2023 Dyne.org foundation
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Terminal rendering of the display tree.
//!
//! Deliberately dumb: keeps labels and parent/child order exactly as
//! handed over by the projector and redraws the whole tree on every
//! change. Closed entries are dimmed, like a treeview would grey them.
use std::{
    collections::{HashMap, HashSet},
    io::{stdout, Write},
};

use termion::{clear, color, cursor};

use crate::view::DisplaySink;

pub struct TermTree {
    roots: Vec<String>,
    children: HashMap<String, Vec<String>>,
    labels: HashMap<String, String>,
    closed: HashSet<String>,
}

impl TermTree {
    pub fn new() -> Self {
        Self {
            roots: Vec::new(),
            children: HashMap::new(),
            labels: HashMap::new(),
            closed: HashSet::new(),
        }
    }

    fn redraw(&self) {
        let mut out = stdout();
        let mut buf = format!("{}{}", clear::All, cursor::Goto(1, 1));

        for root in &self.roots {
            self.draw_node(&mut buf, root, 0);
            if let Some(children) = self.children.get(root) {
                for child in children {
                    self.draw_node(&mut buf, child, 1);
                }
            }
        }

        let _ = out.write_all(buf.as_bytes());
        let _ = out.flush();
    }

    fn draw_node(&self, buf: &mut String, key: &str, depth: usize) {
        let Some(label) = self.labels.get(key) else { return };
        let indent = "    ".repeat(depth);

        if self.closed.contains(key) {
            buf.push_str(&format!(
                "{}{}{}{}\r\n",
                indent,
                color::Fg(color::LightBlack),
                label,
                color::Fg(color::Reset)
            ));
        } else {
            buf.push_str(&format!("{}{}\r\n", indent, label));
        }
    }
}

impl Default for TermTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for TermTree {
    fn upsert(&mut self, parent: Option<&str>, key: &str, label: &str, _expanded: bool) {
        let is_new = !self.labels.contains_key(key);
        self.labels.insert(key.to_string(), label.to_string());

        if is_new {
            match parent {
                None => self.roots.push(key.to_string()),
                Some(parent) => {
                    self.children.entry(parent.to_string()).or_default().push(key.to_string())
                }
            }
        }

        self.redraw();
    }

    fn mark_closed(&mut self, key: &str) {
        self.closed.insert(key.to_string());
        self.redraw();
    }

    fn scroll_to_reveal(&mut self, _key: &str) {
        // The full redraw already shows everything that fits; nothing to
        // scroll in this renderer.
    }
}
