use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::text::html_to_text;
use super::{Tool, ToolError, ToolInput};

pub const SEARCH: &str = "search";

const DUCKDUCKGO_HTML: &str = "https://html.duckduckgo.com/html/";

/// Web search through DuckDuckGo's HTML endpoint
pub struct SearchTool {
    client: reqwest::Client,
    endpoint: String,
    max_results: usize,
}

impl SearchTool {
    pub fn new(timeout: Duration, user_agent: &str, max_results: usize) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            endpoint: DUCKDUCKGO_HTML.to_string(),
            max_results,
        })
    }

    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }
}

/// Pull result titles and snippets out of a DuckDuckGo HTML results page
fn extract_results(page: &str, max_results: usize) -> Vec<String> {
    let mut results = Vec::new();
    let mut rest = page;

    while results.len() < max_results {
        let Some(pos) = rest.find("class=\"result__a\"") else {
            break;
        };
        rest = &rest[pos..];
        let title = element_text(rest, "</a>");

        let snippet = match (rest.find("class=\"result__snippet\""), rest[1..].find("class=\"result__a\"")) {
            (Some(s), Some(next)) if s > next + 1 => String::new(),
            (Some(s), _) => element_text(&rest[s..], "</a>"),
            (None, _) => String::new(),
        };

        if !title.is_empty() {
            if snippet.is_empty() {
                results.push(title);
            } else {
                results.push(format!("{}: {}", title, snippet));
            }
        }
        rest = &rest[1..];
    }

    results
}

/// Text of the element whose opening tag attributes start `fragment`
fn element_text(fragment: &str, closing: &str) -> String {
    let Some(open_end) = fragment.find('>') else {
        return String::new();
    };
    let body = &fragment[open_end + 1..];
    let body = match body.find(closing) {
        Some(end) => &body[..end],
        None => body,
    };
    html_to_text(body, 500).replace('\n', " ")
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        SEARCH
    }

    fn description(&self) -> &str {
        "Search the web. Input: a search query. Returns a short digest of the top results."
    }

    async fn invoke(&self, input: ToolInput) -> Result<String, ToolError> {
        let query = input
            .arg("query")
            .ok_or_else(|| ToolError::InvalidInput("expected a search query".to_string()))?;
        debug!(query = %query, "searching");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query.as_str())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Unavailable(format!("search returned HTTP {}", status)));
        }

        let page = response.text().await?;
        let results = extract_results(&page, self.max_results);
        if results.is_empty() {
            return Ok(format!("No results found for '{}'.", query));
        }
        Ok(results.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="result">
          <a rel="nofollow" class="result__a" href="https://a.example">Anytown <b>housing</b> market</a>
          <a class="result__snippet" href="https://a.example">Prices up 4% &amp; inventory down.</a>
        </div>
        <div class="result">
          <a rel="nofollow" class="result__a" href="https://b.example">Rentals in Anytown</a>
        </div>
        <div class="result">
          <a rel="nofollow" class="result__a" href="https://c.example">Third</a>
          <a class="result__snippet" href="https://c.example">Ignored by the limit.</a>
        </div>"#;

    #[test]
    fn extracts_titles_and_snippets() {
        let results = extract_results(PAGE, 2);
        assert_eq!(
            results,
            vec![
                "Anytown housing market: Prices up 4% & inventory down.".to_string(),
                "Rentals in Anytown".to_string(),
            ]
        );
    }

    #[test]
    fn empty_page_has_no_results() {
        assert!(extract_results("<html></html>", 5).is_empty());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        let tool = SearchTool::new(Duration::from_secs(2), "property-crew-test", 5)
            .unwrap()
            .with_endpoint("http://127.0.0.1:9/html/".to_string());
        let result = tool.invoke(ToolInput::from("anytown homes")).await;
        assert!(matches!(result, Err(ToolError::Unavailable(_))));
    }
}
