//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Paged output state
//!
//! The pager tracks which wrapped line prints next, how many rows have been
//! printed since the last prompt, and a stack of page starts used to page back
//! up. All I/O lives in the terminal; this module only decides what to show.

use super::wrap::WrappedLine;

/// Rows kept free for the prompt and scrollback overlap
pub const RESERVED_ROWS: usize = 3;

/// Line appended when a pause is requested at the end of the output
pub const END_OF_OUTPUT: &str = "-- End --";

/// Answer to the "more" prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptResponse {
    /// Show the next page
    Yes,
    /// Stop output
    No,
    /// Show everything that remains without pausing
    Continuous,
    /// Show the previous page again
    PageUp,
    /// Search forward for a keyword
    Search,
}

impl PromptResponse {
    /// Map a key to a response; unrecognized keys continue
    pub fn from_key(key: char) -> Self {
        match key.to_ascii_lowercase() {
            'n' | 'q' | '\u{3}' | '\u{1b}' => PromptResponse::No,
            'c' => PromptResponse::Continuous,
            'u' | 'b' | '-' => PromptResponse::PageUp,
            '/' | 's' => PromptResponse::Search,
            _ => PromptResponse::Yes,
        }
    }
}

/// How paged output ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerOutcome {
    /// Every line was shown
    Completed,
    /// The user declined to continue
    Aborted,
    /// The connection or session ended
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchMode {
    Fresh,
    ContinueAfter(usize),
}

/// Cursor over a list of wrapped lines
#[derive(Debug, Clone)]
pub struct Pager {
    total: usize,
    page_rows: usize,
    next: usize,
    rows: usize,
    continuous: bool,
    pause_at_end: bool,
    markers: Vec<usize>,
    keyword: Option<String>,
    search: SearchMode,
}

impl Pager {
    /// Create a pager over `total` lines on a screen `rows` high, starting at `start`
    pub fn new(total: usize, rows: u16, start: usize, pause_at_end: bool) -> Self {
        let start = start.min(total);
        Self {
            total,
            page_rows: page_rows(rows),
            next: start,
            rows: 0,
            continuous: false,
            pause_at_end,
            markers: vec![start],
            keyword: None,
            search: SearchMode::Fresh,
        }
    }

    /// Create a pager that never prompts
    pub fn unpaused(total: usize, start: usize) -> Self {
        let mut pager = Self::new(total, u16::MAX, start, false);
        pager.continuous = true;
        pager
    }

    /// Index of the next line to print, advancing past it
    pub fn next_line(&mut self) -> Option<usize> {
        if self.next >= self.total {
            return None;
        }
        let index = self.next;
        self.next += 1;
        self.rows += 1;
        Some(index)
    }

    /// Whether to prompt before printing another line
    pub fn should_pause(&self) -> bool {
        if self.continuous {
            return false;
        }
        let at_end = self.next >= self.total;
        if at_end {
            self.pause_at_end
        } else {
            self.rows >= self.page_rows
        }
    }

    /// Share of the output shown so far
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            100
        } else {
            self.next * 100 / self.total
        }
    }

    pub fn page_rows(&self) -> usize {
        self.page_rows
    }

    pub fn next_index(&self) -> usize {
        self.next
    }

    pub fn markers(&self) -> &[usize] {
        &self.markers
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    /// Continue with the next page
    pub fn resume(&mut self) {
        self.markers.push(self.next);
        self.rows = 0;
    }

    /// Stop prompting for the rest of the output
    pub fn set_continuous(&mut self) {
        self.continuous = true;
    }

    /// Go back to the previous page, overlapping it by one line
    pub fn page_up(&mut self) {
        self.markers.pop();
        self.next = match self.markers.pop() {
            Some(previous) => previous.saturating_sub(1),
            None => 0,
        };
        self.markers.push(self.next);
        self.rows = 0;
        self.search = SearchMode::Fresh;
    }

    /// Search lines not yet shown for `keyword`, ignoring case and markup
    ///
    /// On a hit the pager resumes two lines above the match and the index of the
    /// matching line is returned. A blank keyword repeats the previous search.
    pub fn search(&mut self, lines: &[WrappedLine], keyword: &str) -> Option<usize> {
        let keyword = match keyword.trim() {
            "" => self.keyword.clone()?,
            term => term.to_string(),
        };
        let needle = keyword.to_lowercase();
        self.keyword = Some(keyword);

        let from = match self.search {
            SearchMode::Fresh => self.next,
            SearchMode::ContinueAfter(found) => self.next.max(found + 1),
        };
        let limit = self.total.min(lines.len());
        let hit = (from..limit).find(|&index| lines[index].plain().to_lowercase().contains(&needle));

        match hit {
            Some(index) => {
                self.search = SearchMode::ContinueAfter(index);
                self.next = index.saturating_sub(2);
                self.rows = 0;
                self.markers.push(self.next);
                Some(index)
            }
            None => {
                self.search = SearchMode::Fresh;
                None
            }
        }
    }
}

/// Rows of content per page on a screen `rows` high
pub fn page_rows(rows: u16) -> usize {
    usize::from(rows).saturating_sub(RESERVED_ROWS).max(1)
}

/// First line shown when starting `percent` of the way into `total` lines
pub fn start_line(total: usize, percent: u8) -> usize {
    let percent = usize::from(percent.min(100));
    (total * percent / 100).min(total.saturating_sub(1))
}
