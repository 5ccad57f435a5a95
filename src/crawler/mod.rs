//! 爬取模块：抓取种子页面，并按预算追加同源链接页面
use std::collections::HashSet;
use tracing::debug;
use url::Url;

use crate::error::RswResult;
use crate::fetcher::{PageEvidence, PageFetcher};
use crate::utils::CancelSignal;

/// 单个主机的爬取状态
#[derive(Debug)]
struct CrawlState {
    visited: HashSet<Url>,
    remaining: usize,
    pages: Vec<PageEvidence>,
}

impl CrawlState {
    fn new(budget: usize) -> Self {
        Self {
            visited: HashSet::new(),
            remaining: budget,
            pages: Vec::with_capacity(budget + 1),
        }
    }

    /// 记录已访问URL（去掉片段），返回是否首次出现
    fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(strip_fragment(url))
    }
}

/// 爬取器
pub struct Crawler;

impl Crawler {
    /// 爬取主机：种子页失败则整体失败，链接页失败仅记录日志
    pub async fn crawl(
        fetcher: &dyn PageFetcher,
        seed: &Url,
        budget: usize,
        cancel: &CancelSignal,
    ) -> RswResult<Vec<PageEvidence>> {
        let mut state = CrawlState::new(budget);

        let seed_page = fetcher.fetch_page(seed, cancel).await?;
        debug!(
            "种子页抓取成功：{} -> {}，状态码={}",
            seed_page.url(),
            seed_page.final_url(),
            seed_page.status()
        );
        state.mark_visited(seed);
        state.mark_visited(seed_page.final_url());

        let links = if budget == 0 {
            Vec::new()
        } else {
            Self::select_links(&seed_page, &mut state)
        };
        state.pages.push(seed_page);

        for link in links {
            match fetcher.fetch_page(&link, cancel).await {
                Ok(page) => {
                    debug!("链接页抓取成功：{}，状态码={}", page.url(), page.status());
                    state.pages.push(page);
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => debug!("链接页抓取失败，已跳过：{}，原因：{}", link, e),
            }
        }

        Ok(state.pages)
    }

    /// 按出现顺序挑选同源链接，直到预算耗尽
    fn select_links(seed_page: &PageEvidence, state: &mut CrawlState) -> Vec<Url> {
        let base = seed_page.final_url();
        let mut selected = Vec::new();

        for raw in seed_page.links() {
            if state.remaining == 0 {
                break;
            }
            let Some(link) = resolve_link(base, raw) else {
                continue;
            };
            if !state.mark_visited(&link) {
                continue;
            }
            state.remaining -= 1;
            selected.push(link);
        }

        selected
    }
}

/// 解析相对链接，仅保留同源的 http(s) 链接
fn resolve_link(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }
    let link = base.join(raw).ok()?;
    if !matches!(link.scheme(), "http" | "https") {
        return None;
    }
    if link.origin() != base.origin() {
        return None;
    }
    Some(strip_fragment(&link))
}

fn strip_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RswebanalyzeError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// 内存抓取器：按URL返回预置页面，并记录调用顺序
    struct MockFetcher {
        pages: HashMap<String, String>,
        redirect_seed_to: Option<Url>,
        calls: Mutex<Vec<String>>,
        cancel_on: Option<String>,
    }

    impl MockFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(u, b)| (u.to_string(), b.to_string()))
                    .collect(),
                redirect_seed_to: None,
                calls: Mutex::new(Vec::new()),
                cancel_on: None,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for MockFetcher {
        async fn fetch_page(&self, url: &Url, cancel: &CancelSignal) -> RswResult<PageEvidence> {
            let call_count = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(url.to_string());
                calls.len()
            };
            if cancel.is_cancelled() || self.cancel_on.as_deref() == Some(url.as_str()) {
                return Err(RswebanalyzeError::Cancelled(url.to_string()));
            }
            let final_url = match (&self.redirect_seed_to, call_count) {
                (Some(target), 1) => target.clone(),
                _ => url.clone(),
            };
            match self.pages.get(final_url.as_str()) {
                Some(body) => Ok(PageEvidence::new(
                    url.clone(),
                    final_url,
                    200,
                    HashMap::new(),
                    body.clone(),
                )),
                None => Err(RswebanalyzeError::FetchError {
                    url: url.to_string(),
                    cause: "not found".to_string(),
                }),
            }
        }
    }

    fn seed() -> Url {
        Url::parse("http://site.test/").unwrap()
    }

    const SEED_BODY: &str = r##"
        <a href="/a">a</a>
        <a href="/a#top">dup</a>
        <a href="http://other.test/x">external</a>
        <a href="mailto:me@site.test">mail</a>
        <a href="/">self</a>
        <a href="b">b</a>
        <a href="/c">c</a>
    "##;

    #[tokio::test]
    async fn test_budget_zero_fetches_seed_only() {
        let fetcher = MockFetcher::new(&[("http://site.test/", SEED_BODY)]);
        let pages = Crawler::crawl(&fetcher, &seed(), 0, &CancelSignal::never()).await.unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(fetcher.calls(), vec!["http://site.test/".to_string()]);
    }

    #[tokio::test]
    async fn test_budget_limits_same_origin_links_in_order() {
        let fetcher = MockFetcher::new(&[
            ("http://site.test/", SEED_BODY),
            ("http://site.test/a", "A"),
            ("http://site.test/b", "B"),
            ("http://site.test/c", "C"),
        ]);
        let pages = Crawler::crawl(&fetcher, &seed(), 2, &CancelSignal::never()).await.unwrap();

        assert_eq!(pages.len(), 3);
        assert_eq!(
            fetcher.calls(),
            vec![
                "http://site.test/".to_string(),
                "http://site.test/a".to_string(),
                "http://site.test/b".to_string(),
            ]
        );
        assert_eq!(pages[1].body(), "A");
    }

    #[tokio::test]
    async fn test_failed_link_is_skipped() {
        let fetcher = MockFetcher::new(&[
            ("http://site.test/", SEED_BODY),
            ("http://site.test/b", "B"),
        ]);
        let pages = Crawler::crawl(&fetcher, &seed(), 5, &CancelSignal::never()).await.unwrap();

        // a 与 c 不存在，仅 seed 与 b 成功
        assert_eq!(pages.len(), 2);
        assert_eq!(fetcher.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_seed_failure_fails_crawl() {
        let fetcher = MockFetcher::new(&[]);
        let err = Crawler::crawl(&fetcher, &seed(), 3, &CancelSignal::never()).await.unwrap_err();
        assert!(matches!(err, RswebanalyzeError::FetchError { .. }));
    }

    #[tokio::test]
    async fn test_cancel_during_links_aborts_host() {
        let mut fetcher = MockFetcher::new(&[
            ("http://site.test/", SEED_BODY),
            ("http://site.test/b", "B"),
        ]);
        fetcher.cancel_on = Some("http://site.test/a".to_string());

        let err = Crawler::crawl(&fetcher, &seed(), 3, &CancelSignal::never()).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_signal_is_passed_to_fetcher() {
        let fetcher = MockFetcher::new(&[("http://site.test/", SEED_BODY)]);
        let (handle, signal) = crate::utils::cancel_pair();
        handle.cancel();

        let err = Crawler::crawl(&fetcher, &seed(), 3, &signal).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(fetcher.calls(), vec!["http://site.test/".to_string()]);
    }

    #[tokio::test]
    async fn test_links_resolve_against_final_url_and_skip_it() {
        let mut fetcher = MockFetcher::new(&[
            ("http://site.test/home/", r#"<a href="/home/">self</a><a href="news">n</a>"#),
            ("http://site.test/home/news", "N"),
        ]);
        fetcher.redirect_seed_to = Some(Url::parse("http://site.test/home/").unwrap());

        let pages = Crawler::crawl(&fetcher, &seed(), 3, &CancelSignal::never()).await.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(
            fetcher.calls(),
            vec!["http://site.test/".to_string(), "http://site.test/home/news".to_string()]
        );
    }
}
