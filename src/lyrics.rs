use crate::error::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Node, Selector};
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::debug;

pub const GENIUS_API_BASE: &str = "https://api.genius.com";

/// `[Chorus]`, `[Verse 2: Someone]` and friends
static SECTION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]\n]*\]").expect("valid section header regex"));

/// Genius pages that show up as "songs" but hold no lyrics
static NON_LYRICS_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)track\s?list|album art(work)?|liner notes|booklet|credits|interview|skit|setlist|instrumental")
        .expect("valid non-lyrics regex")
});

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: SearchResponse,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "type")]
    hit_type: String,
    result: SongResult,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SongResult {
    pub title: String,
    pub url: String,
}

/// Finds the raw lyric text for a title/artist pair.
#[async_trait]
pub trait LyricsSource: Send + Sync {
    /// `Ok(None)` when the provider has nothing for this song.
    async fn search_lyrics(&self, title: &str, artist: &str) -> Result<Option<String>>;
}

pub struct GeniusFetcher {
    client: Client,
    api_base: String,
    token: String,
}

impl GeniusFetcher {
    pub fn new(client: Client, token: impl Into<String>) -> Self {
        Self {
            client,
            api_base: GENIUS_API_BASE.to_string(),
            token: token.into(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn clean_title(title: &str) -> String {
        // Remove junk that makes "Song - Remastered 2011" differ from "Song"
        let t = title.to_lowercase();
        // Cut off at common delimiters
        let t = t.split(" - ").next().unwrap_or(&t);
        let t = t.split("feat.").next().unwrap_or(t);
        let t = t.split("(with").next().unwrap_or(t);

        // Drop bracketed metadata
        let mut clean = String::new();
        let mut in_bracket = false;
        for c in t.chars() {
            if c == '(' || c == '[' {
                in_bracket = true;
            } else if c == ')' || c == ']' {
                in_bracket = false;
            } else if !in_bracket && (c.is_alphanumeric() || c.is_whitespace()) {
                clean.push(c);
            }
        }

        clean.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn is_lyrics_page(result: &SongResult) -> bool {
        !NON_LYRICS_TITLE.is_match(&result.title)
    }

    /// Pick the best song hit: an exact (cleaned) title match first, then
    /// whatever song ranked highest.
    fn pick_hit(hits: Vec<SearchHit>, title: &str) -> Option<SongResult> {
        let wanted = Self::clean_title(title);
        let songs: Vec<SongResult> = hits
            .into_iter()
            .filter(|h| h.hit_type == "song")
            .map(|h| h.result)
            .filter(Self::is_lyrics_page)
            .collect();

        let exact = songs
            .iter()
            .position(|s| Self::clean_title(&s.title) == wanted)
            .unwrap_or(0);
        songs.into_iter().nth(exact)
    }

    pub async fn search_song(&self, title: &str, artist: &str) -> Result<Option<SongResult>> {
        let query = format!("{} {}", title, artist);
        let resp = self
            .client
            .get(format!("{}/search", self.api_base))
            .bearer_auth(&self.token)
            .query(&[("q", query.as_str())])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::from_response("Genius", resp).await);
        }

        let envelope: SearchEnvelope = resp.json().await?;
        Ok(Self::pick_hit(envelope.response.hits, title))
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::from_response("Genius", resp).await);
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl LyricsSource for GeniusFetcher {
    async fn search_lyrics(&self, title: &str, artist: &str) -> Result<Option<String>> {
        // 1. Search 🔍
        let Some(song) = self.search_song(title, artist).await? else {
            debug!(title, artist, "No Genius hit");
            return Ok(None);
        };

        // 2. Scrape the song page 📄
        debug!(url = %song.url, "Fetching Genius lyrics page");
        let html = self.fetch_page(&song.url).await?;
        Ok(extract_lyrics(&html))
    }
}

/// Pull the lyric text out of a Genius song page.
///
/// The first container opens with the page's contributors/title header, so
/// the first line of the result is not lyrics.
pub fn extract_lyrics(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"div[data-lyrics-container="true"]"#).ok()?;

    let mut raw = String::new();
    for container in document.select(&selector) {
        if !raw.is_empty() {
            raw.push('\n');
        }
        for node in container.descendants() {
            match node.value() {
                Node::Text(text) => raw.push_str(text),
                Node::Element(el) if el.name() == "br" => raw.push('\n'),
                _ => {}
            }
        }
    }

    let stripped = SECTION_HEADER.replace_all(&raw, "");
    let lyrics = stripped.replace("\n\n", "\n");
    let lyrics = lyrics.trim();

    if lyrics.is_empty() {
        None
    } else {
        Some(lyrics.to_string())
    }
}
