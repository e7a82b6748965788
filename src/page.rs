use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::media::ElementHandle;

/// A fetched page: where it came from and its HTML source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    url: Url,
    html: String,
}

impl Page {
    pub fn new(url: Url, html: impl Into<String>) -> Self {
        Self { url, html: html.into() }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// `host[:port]`, the value adapters match their domains against.
    pub fn host(&self) -> String {
        host_of(&self.url).unwrap_or_default()
    }

    /// Parse the page. The document is not `Send`; keep it out of `.await`s.
    pub fn document(&self) -> Document {
        Document::parse(&self.html, self.url.clone())
    }
}

/// Host with the port appended when it is not the scheme default.
pub fn host_of(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector `{css}`: {e:?}"))
}

/// Parsed HTML plus the URL relative links are resolved against.
pub struct Document {
    html: Html,
    base: Url,
}

impl Document {
    pub fn parse(html: &str, base: Url) -> Self {
        Self { html: Html::parse_document(html), base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// All elements matching `css`, in document order.
    pub fn select(&self, css: &str) -> Result<Vec<Element<'_>>> {
        let sel = selector(css)?;
        Ok(matching(self.html.root_element(), 0, &sel).map(|(node, index)| self.wrap(node, index)).collect())
    }

    pub fn select_first(&self, css: &str) -> Result<Option<Element<'_>>> {
        let sel = selector(css)?;
        let first = matching(self.html.root_element(), 0, &sel).next().map(|(node, index)| self.wrap(node, index));
        Ok(first)
    }

    /// `attr` of the first element matching `css`, resolved to an absolute URL.
    pub fn link(&self, css: &str, attr: &str) -> Option<Url> {
        self.select_first(css).ok()??.url_attr(attr)
    }

    fn wrap<'a>(&'a self, node: ElementRef<'a>, index: usize) -> Element<'a> {
        Element { node, doc: self, index }
    }
}

/// Elements under `root` (inclusive) matching `sel`, each paired with its
/// document-order position counted from `<html>`. `offset` is the position of
/// `root` itself; pre-order descendants are contiguous, so positions stay
/// global.
fn matching<'a, 's>(
    root: ElementRef<'a>,
    offset: usize,
    sel: &'s Selector,
) -> impl Iterator<Item = (ElementRef<'a>, usize)> + 's
where
    'a: 's,
{
    root.descendants()
        .enumerate()
        .filter_map(move |(i, node)| ElementRef::wrap(node).map(|el| (el, offset + i)))
        .filter(move |(el, _)| sel.matches(el))
}

#[derive(Clone, Copy)]
pub struct Element<'a> {
    node: ElementRef<'a>,
    doc: &'a Document,
    index: usize,
}

impl<'a> Element<'a> {
    pub fn handle(&self) -> ElementHandle {
        ElementHandle(self.index)
    }

    /// Lowercase tag name.
    pub fn name(&self) -> &'a str {
        self.node.value().name()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.node.value().attr(name)
    }

    /// Attribute value joined onto the document URL.
    pub fn url_attr(&self, name: &str) -> Option<Url> {
        let raw = self.attr(name)?.trim();
        if raw.is_empty() {
            return None;
        }
        self.doc.base.join(raw).ok()
    }

    pub fn text(&self) -> String {
        self.node.text().collect::<String>().trim().to_string()
    }

    /// First descendant matching `css`, not counting this element.
    pub fn select_first(&self, css: &str) -> Result<Option<Element<'a>>> {
        let sel = selector(css)?;
        let doc = self.doc;
        let first = matching(self.node, self.index, &sel)
            .find(|(node, _)| node.id() != self.node.id())
            .map(|(node, index)| Element { node, doc, index });
        Ok(first)
    }
}

impl std::fmt::Debug for Element<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.name())
            .field("handle", &self.handle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, html: &str) -> Page {
        Page::new(Url::parse(url).unwrap(), html)
    }

    #[test]
    fn host_keeps_non_default_port() {
        assert_eq!(page("http://localhost:8474/files/", "").host(), "localhost:8474");
        assert_eq!(page("https://E621.net/posts", "").host(), "e621.net");
        assert_eq!(page("https://e621.net:443/posts", "").host(), "e621.net");
    }

    #[test]
    fn select_is_in_document_order_with_distinct_handles() {
        let p = page(
            "https://example.org/list",
            r#"<ul><li><a href="/p/1">1</a></li><li><a href="/p/2">2</a></li><li><a href="https://cdn.example.org/3">3</a></li></ul>"#,
        );
        let doc = p.document();
        let links = doc.select("li > a").unwrap();
        let urls: Vec<_> = links.iter().map(|e| e.url_attr("href").unwrap().to_string()).collect();
        assert_eq!(
            urls,
            ["https://example.org/p/1", "https://example.org/p/2", "https://cdn.example.org/3"]
        );
        let handles: Vec<_> = links.iter().map(|e| e.handle()).collect();
        assert!(handles.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn link_returns_none_for_missing_nodes() {
        let p = page("https://example.org/", r#"<a id="next" href="?page=2">next</a>"#);
        let doc = p.document();
        assert_eq!(doc.link("#next", "href").unwrap().as_str(), "https://example.org/?page=2");
        assert!(doc.link("#prev", "href").is_none());
        assert!(doc.select("::not-a-selector").is_err());
    }

    #[test]
    fn nested_lookups_share_document_positions() {
        let p = page(
            "https://example.org/",
            r#"<ul><li class="post"><div><a class="thumb" href="/1">1</a></div></li>
                   <li class="post"><div><a class="thumb" href="/2">2</a></div></li></ul>"#,
        );
        let doc = p.document();
        let thumbs: Vec<_> = doc.select("a.thumb").unwrap().iter().map(|e| e.handle()).collect();
        let nested: Vec<_> = doc
            .select("li.post")
            .unwrap()
            .iter()
            .map(|post| post.select_first(".thumb").unwrap().unwrap().handle())
            .collect();
        assert_eq!(thumbs, nested);
        assert_eq!(
            doc.select_first("li.post").unwrap().unwrap().handle(),
            doc.select("li").unwrap()[0].handle()
        );
        assert!(thumbs[0] < thumbs[1]);
    }
}
