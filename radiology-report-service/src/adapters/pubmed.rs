use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use report_fusion::{LiteratureSearch, Study};
use serde_json::Value;
use tracing::{info, warn};

const MAX_AUTHORS: usize = 3;

/// PubMed E-utilities search: esearch for ids, then efetch for article details.
pub struct PubMedSearch {
    client: Client,
    base_url: String,
}

impl PubMedSearch {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn search_ids(&self, term: &str, max_results: usize) -> anyhow::Result<Vec<String>> {
        let search_url = format!(
            "{}/esearch.fcgi?db=pubmed&term={}&retmax={}&retmode=json",
            self.base_url,
            urlencoding::encode(term),
            max_results
        );

        let search_data: Value = self
            .client
            .get(&search_url)
            .send()
            .await
            .map_err(|e| anyhow!("PubMed search request failed: {}", e))?
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse search response: {}", e))?;

        let ids = search_data["esearchresult"]["idlist"]
            .as_array()
            .ok_or_else(|| anyhow!("No id list in search results"))?
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        Ok(ids)
    }

    async fn fetch_articles(&self, ids: &[String]) -> anyhow::Result<Vec<Study>> {
        let fetch_url = format!(
            "{}/efetch.fcgi?db=pubmed&id={}&retmode=xml",
            self.base_url,
            ids.join(",")
        );

        let xml_content = self
            .client
            .get(&fetch_url)
            .send()
            .await
            .map_err(|e| anyhow!("PubMed fetch request failed: {}", e))?
            .text()
            .await
            .map_err(|e| anyhow!("Failed to get fetch response text: {}", e))?;

        Ok(parse_pubmed_xml(&xml_content))
    }

    async fn try_query(&self, text: &str, max_results: usize) -> anyhow::Result<Vec<Study>> {
        let ids = self.search_ids(text, max_results).await?;
        if ids.is_empty() {
            info!("PubMed search found no articles");
            return Ok(Vec::new());
        }

        info!("PubMed search found {} articles, fetching details", ids.len());
        self.fetch_articles(&ids).await
    }
}

#[async_trait]
impl LiteratureSearch for PubMedSearch {
    async fn query(&self, text: &str, max_results: usize) -> Vec<Study> {
        if text.trim().is_empty() || max_results == 0 {
            return Vec::new();
        }

        match self.try_query(text, max_results).await {
            Ok(studies) => studies,
            Err(e) => {
                warn!("Continuing without medical studies due to search failure: {:#}", e);
                Vec::new()
            }
        }
    }
}

/// Pulls title, first three authors, abstract and link out of an efetch XML payload.
pub fn parse_pubmed_xml(xml: &str) -> Vec<Study> {
    xml.split("<PubmedArticle>")
        .skip(1)
        .filter_map(parse_article)
        .collect()
}

fn parse_article(section: &str) -> Option<Study> {
    let pmid = element_text(section, "PMID")?;

    let title = element_text(section, "ArticleTitle")
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "No title".to_string());
    let abstract_text = element_text(section, "AbstractText")
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "No abstract available".to_string());

    let authors = elements(section, "Author")
        .into_iter()
        .filter_map(|author| {
            let fore = element_text(author, "ForeName")?;
            let last = element_text(author, "LastName")?;
            Some(format!("{} {}", fore, last))
        })
        .take(MAX_AUTHORS)
        .collect();

    Some(Study {
        title,
        authors,
        abstract_text,
        link: format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid),
    })
}

/// Inner XML of every `<name ...>...</name>` element, in document order.
fn elements<'a>(xml: &'a str, name: &str) -> Vec<&'a str> {
    let open = format!("<{}", name);
    let close = format!("</{}>", name);
    let mut found = Vec::new();
    let mut rest = xml;

    while let Some(start) = rest.find(&open) {
        let after_name = &rest[start + open.len()..];
        // Skip longer names sharing the prefix, e.g. <AuthorList> when looking for <Author>
        if !after_name.starts_with(['>', ' ', '\t', '\n', '\r', '/']) {
            rest = after_name;
            continue;
        }
        let Some(tag_end) = after_name.find('>') else {
            break;
        };
        if after_name[..tag_end].ends_with('/') {
            rest = &after_name[tag_end + 1..];
            continue;
        }
        let body = &after_name[tag_end + 1..];
        let Some(body_end) = body.find(&close) else {
            break;
        };
        found.push(&body[..body_end]);
        rest = &body[body_end + close.len()..];
    }

    found
}

fn element_text(xml: &str, name: &str) -> Option<String> {
    elements(xml, name)
        .first()
        .map(|inner| decode_entities(&strip_tags(inner)).trim().to_string())
}

fn strip_tags(xml: &str) -> String {
    let mut text = String::with_capacity(xml.len());
    let mut in_tag = false;
    for c in xml.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
