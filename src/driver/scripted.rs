//! In-memory page driver for tests.
//!
//! Each URL maps to a [`ScriptedPage`]: a tree of elements, each answering to
//! a fixed set of CSS selectors and carrying its own text. Visibility can be
//! gated on how many times the page was scrolled or how many clicks landed,
//! which is enough to model infinite scroll, modals and "load more" buttons.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Locator, PageDriver};
use crate::error::{ScrapeError, ScrapeResult};

#[derive(Debug, Clone, Copy, Default)]
enum Counter {
    #[default]
    Scrolls,
    Clicks,
}

#[derive(Debug, Clone, Copy, Default)]
struct Gate {
    counter: Counter,
    from: u32,
    until: Option<u32>,
}

impl Gate {
    fn open(&self, scrolls: u32, clicks: u32) -> bool {
        let n = match self.counter {
            Counter::Scrolls => scrolls,
            Counter::Clicks => clicks,
        };
        n >= self.from && self.until.map_or(true, |u| n < u)
    }
}

/// Builder for one scripted element.
#[derive(Debug, Clone, Default)]
pub struct El {
    name: Option<&'static str>,
    selectors: Vec<&'static str>,
    text: String,
    attrs: Vec<(&'static str, String)>,
    gate: Gate,
    fail_click: bool,
}

impl El {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label recorded in the click log.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn css(mut self, selector: &'static str) -> Self {
        self.selectors.push(selector);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, value.into()));
        self
    }

    pub fn after_scrolls(mut self, n: u32) -> Self {
        self.gate = Gate { counter: Counter::Scrolls, from: n, until: None };
        self
    }

    pub fn after_clicks(mut self, n: u32) -> Self {
        self.gate = Gate { counter: Counter::Clicks, from: n, ..self.gate };
        self
    }

    pub fn until_clicks(mut self, n: u32) -> Self {
        self.gate = Gate { counter: Counter::Clicks, until: Some(n), ..self.gate };
        self
    }

    pub fn failing_click(mut self) -> Self {
        self.fail_click = true;
        self
    }
}

#[derive(Debug, Clone)]
struct Node {
    el: El,
    parent: Option<usize>,
    children: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct ScriptedPage {
    nodes: Vec<Node>,
    title: String,
    html: String,
    scrolls: u32,
    clicks: u32,
}

pub const ROOT: usize = 0;

impl Default for ScriptedPage {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node { el: El::new().css("body"), parent: None, children: Vec::new() }],
            title: String::new(),
            html: String::new(),
            scrolls: 0,
            clicks: 0,
        }
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }

    /// Append `el` under `parent`, returning its index.
    pub fn add(&mut self, parent: usize, el: El) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node { el, parent: Some(parent), children: Vec::new() });
        self.nodes[parent].children.push(id);
        id
    }

    fn visible(&self, mut id: usize) -> bool {
        loop {
            if !self.nodes[id].el.gate.open(self.scrolls, self.clicks) {
                return false;
            }
            match self.nodes[id].parent {
                Some(p) => id = p,
                None => return true,
            }
        }
    }

    fn matches(&self, id: usize, locator: Locator) -> bool {
        let el = &self.nodes[id].el;
        match locator {
            Locator::Css(css) => el.selectors.contains(&css),
            Locator::Text(phrase) => el.text.contains(phrase),
        }
    }

    /// Visible descendants of `scope` in document order.
    fn descendants(&self, scope: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.nodes[scope].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if !self.visible(id) {
                continue;
            }
            out.push(id);
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }
        out
    }

    fn inner_text(&self, id: usize) -> String {
        let mut parts = Vec::new();
        if !self.nodes[id].el.text.is_empty() {
            parts.push(self.nodes[id].el.text.clone());
        }
        for child in self.descendants(id) {
            if !self.nodes[child].el.text.is_empty() {
                parts.push(self.nodes[child].el.text.clone());
            }
        }
        parts.join("\n")
    }
}

#[derive(Debug, Default)]
struct State {
    pages: HashMap<String, ScriptedPage>,
    current: Option<String>,
    visits: Vec<String>,
    clicked: Vec<String>,
    scrolls: u32,
}

/// A [`PageDriver`] over scripted pages. Unknown URLs load a blank page.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    state: Mutex<State>,
    failing_urls: HashSet<String>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, page: ScriptedPage) -> Self {
        self.state.lock().unwrap().pages.insert(url.to_string(), page);
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing_urls.insert(url.to_string());
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().unwrap().visits.clone()
    }

    /// Names of clicked elements, in order. Unnamed elements are skipped.
    pub fn clicked(&self) -> Vec<String> {
        self.state.lock().unwrap().clicked.clone()
    }

    pub fn scroll_count(&self) -> u32 {
        self.state.lock().unwrap().scrolls
    }

    fn with_page<T>(&self, f: impl FnOnce(&mut ScriptedPage) -> T) -> ScrapeResult<T> {
        let mut state = self.state.lock().unwrap();
        let url = state
            .current
            .clone()
            .ok_or_else(|| ScrapeError::Driver("no page loaded".into()))?;
        let page = state.pages.entry(url).or_default();
        Ok(f(page))
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    type Handle = usize;

    async fn navigate(&self, url: &str) -> ScrapeResult<()> {
        let mut state = self.state.lock().unwrap();
        state.visits.push(url.to_string());
        if self.failing_urls.contains(url) {
            return Err(ScrapeError::Navigation {
                url: url.to_string(),
                reason: "scripted failure".into(),
            });
        }
        state.current = Some(url.to_string());
        Ok(())
    }

    async fn find(
        &self,
        scope: Option<&usize>,
        locator: Locator,
        _timeout: Duration,
    ) -> ScrapeResult<Option<usize>> {
        let all = self.find_all(scope, locator).await?;
        Ok(all.into_iter().next())
    }

    async fn find_all(&self, scope: Option<&usize>, locator: Locator) -> ScrapeResult<Vec<usize>> {
        self.with_page(|page| {
            let root = scope.copied().unwrap_or(ROOT);
            if !page.visible(root) {
                return Vec::new();
            }
            // A document-wide query also sees the body node itself.
            let own = scope.is_none().then_some(ROOT);
            own.into_iter()
                .chain(page.descendants(root))
                .filter(|&id| page.matches(id, locator))
                .collect()
        })
    }

    async fn ancestor(&self, handle: &usize, levels: usize) -> ScrapeResult<Option<usize>> {
        self.with_page(|page| {
            let mut id = *handle;
            for _ in 0..levels {
                match page.nodes.get(id).and_then(|n| n.parent) {
                    Some(p) => id = p,
                    None => return None,
                }
            }
            Some(id)
        })
    }

    async fn click(&self, handle: &usize) -> ScrapeResult<()> {
        let (name, failed) = self.with_page(|page| {
            let el = &page.nodes[*handle].el;
            let failed = el.fail_click;
            let name = el.name;
            if !failed {
                page.clicks += 1;
            }
            (name, failed)
        })?;
        if failed {
            return Err(ScrapeError::Driver("element not interactable".into()));
        }
        if let Some(name) = name {
            self.state.lock().unwrap().clicked.push(name.to_string());
        }
        Ok(())
    }

    async fn scroll(&self, _dx: i64, _dy: i64) -> ScrapeResult<()> {
        self.with_page(|page| page.scrolls += 1)?;
        self.state.lock().unwrap().scrolls += 1;
        Ok(())
    }

    async fn read_text(&self, handle: &usize) -> ScrapeResult<String> {
        self.with_page(|page| page.inner_text(*handle))
    }

    async fn read_attribute(&self, handle: &usize, name: &str) -> ScrapeResult<Option<String>> {
        self.with_page(|page| {
            page.nodes[*handle]
                .el
                .attrs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.clone())
        })
    }

    async fn current_title(&self) -> ScrapeResult<String> {
        self.with_page(|page| page.title.clone())
    }

    async fn current_html(&self) -> ScrapeResult<String> {
        self.with_page(|page| page.html.clone())
    }
}
