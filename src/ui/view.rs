use std::collections::HashMap;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaneId {
    Conversations,
    Chat,
    CampaignForm,
    Campaigns,
    CampaignItems,
}

/// A rendered block of text. Panes are plain values so they can be compared
/// and tested without a terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pane {
    pub title: String,
    pub lines: Vec<String>,
}

impl Pane {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), lines: Vec::new() }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "── {} ──", self.title)?;
        for line in &self.lines {
            writeln!(out, "{}", line)?;
        }
        Ok(())
    }
}

/// Remembers what was last drawn per pane and only redraws panes whose
/// content changed.
#[derive(Debug, Default)]
pub struct Screen {
    drawn: HashMap<PaneId, Pane>,
}

impl Screen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the pane was written.
    pub fn draw<W: Write>(&mut self, id: PaneId, pane: Pane, out: &mut W) -> io::Result<bool> {
        if self.drawn.get(&id) == Some(&pane) {
            return Ok(false);
        }
        pane.write_to(out)?;
        self.drawn.insert(id, pane);
        Ok(true)
    }

    /// Forces every pane to be drawn again (tab switch, /refresh).
    pub fn invalidate(&mut self) {
        self.drawn.clear();
    }
}
