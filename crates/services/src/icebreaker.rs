use rand::seq::{IndexedRandom, SliceRandom};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use kindred_config::AiSettings;

pub const MAX_SUGGESTIONS: usize = 10;

const SHORT_BIO_WORDS: usize = 20;
const LONG_BIO_WORDS: usize = 150;

/// Interest keywords recognised in free-text bios.
const KNOWN_INTERESTS: &[&str] = &[
    "hiking", "travel", "traveling", "cooking", "baking", "music", "concerts", "coffee", "yoga",
    "reading", "books", "movies", "films", "photography", "dogs", "cats", "art", "painting",
    "gaming", "running", "dancing", "wine", "climbing", "surfing", "cycling", "camping", "tennis",
    "football", "soccer", "basketball", "swimming", "skiing", "gardening", "writing", "theater",
    "podcasts", "food", "fitness", "meditation", "guitar", "piano", "singing", "chess", "board",
];

const SHARED_TEMPLATES: &[&str] = &[
    "I see we both love {}! What got you into it?",
    "Fellow {} fan here. What's your favourite thing about it?",
    "We have {} in common. Best experience you've had with it?",
];

const BIO_TEMPLATES: &[&str] = &[
    "Your bio mentions {}. I'd love to hear more about that!",
    "So, {}? Tell me the story behind that.",
    "I noticed {} in your profile. How long have you been into it?",
];

const STARTER_TEMPLATES: &[&str] = &[
    "What's the best {} moment you've ever had?",
    "If you could spend a whole weekend on {}, what would it look like?",
    "Who got you into {}?",
];

const GENERIC_OPENERS: &[&str] = &[
    "What's the best thing that happened to you this week?",
    "If you could travel anywhere tomorrow, where would you go?",
    "What's your idea of a perfect Sunday?",
    "Coffee or tea, and how do you take it?",
    "What's a skill you've always wanted to learn?",
    "What's the last song you had on repeat?",
    "Beach holiday or mountain cabin?",
    "What's a small thing that always makes your day better?",
    "What's the most spontaneous thing you've ever done?",
    "If you could have dinner with anyone, who would it be?",
    "What are you looking forward to this month?",
    "What's your go-to comfort food?",
];

#[derive(Debug, Clone, Default)]
pub struct IcebreakerContext {
    pub my_interests: Vec<String>,
    pub their_interests: Vec<String>,
    pub their_name: String,
    pub their_bio: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IcebreakerSource {
    Ai,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct IcebreakerResult {
    pub suggestions: Vec<String>,
    pub source: IcebreakerSource,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BioAnalysis {
    pub word_count: usize,
    pub detected_interests: Vec<String>,
    pub has_question: bool,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: String,
    content: Vec<ClaudeContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ClaudeContent {
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IcebreakerService {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl IcebreakerService {
    pub fn new(settings: &AiSettings) -> Self {
        Self {
            client: Client::new(),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
        }
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// Opening lines for a match. Uses the model when configured and falls
    /// back to templates on any failure.
    pub async fn generate(&self, context: &IcebreakerContext, count: usize) -> IcebreakerResult {
        let count = count.clamp(1, MAX_SUGGESTIONS);

        if self.is_available() {
            match self.request_ai(context, count).await {
                Ok(lines) => {
                    let suggestions = unique(lines, count);
                    if !suggestions.is_empty() {
                        return IcebreakerResult {
                            suggestions,
                            source: IcebreakerSource::Ai,
                        };
                    }
                    debug!("AI returned no usable icebreakers, using templates");
                }
                Err(e) => warn!(error = %e, "Icebreaker generation failed, using templates"),
            }
        }

        IcebreakerResult {
            suggestions: fallback_icebreakers(context, count),
            source: IcebreakerSource::Fallback,
        }
    }

    async fn request_ai(&self, context: &IcebreakerContext, count: usize) -> Result<Vec<String>, String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| "Claude API key not configured".to_string())?;

        let request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: vec![ClaudeContent::Text {
                    text: build_prompt(context, count),
                }],
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Claude API request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Claude API error {}: {}", status, body));
        }

        let claude_resp: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse Claude response: {}", e))?;

        let text = claude_resp
            .content
            .iter()
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(parse_lines(&text))
    }
}

fn build_prompt(context: &IcebreakerContext, count: usize) -> String {
    let mut prompt = format!(
        "Write {count} short, friendly opening messages for a dating app chat with {}.\n",
        if context.their_name.is_empty() { "a new match" } else { context.their_name.as_str() }
    );
    if !context.their_interests.is_empty() {
        prompt.push_str(&format!("Their interests: {}.\n", context.their_interests.join(", ")));
    }
    if !context.my_interests.is_empty() {
        prompt.push_str(&format!("My interests: {}.\n", context.my_interests.join(", ")));
    }
    if let Some(bio) = context.their_bio.as_deref().filter(|b| !b.trim().is_empty()) {
        prompt.push_str(&format!("Their bio: \"{}\"\n", bio.trim()));
    }
    prompt.push_str("Return one message per line with no numbering and no extra commentary.");
    prompt
}

/// Splits model output into candidate lines, dropping list markers and quotes.
pub fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            let line = line.trim();
            let line = line.trim_start_matches(['-', '*', '•']).trim_start();
            let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
            let line = if digits > 0 {
                let rest = &line[digits..];
                match rest.strip_prefix(['.', ')', ':']) {
                    Some(rest) => rest.trim_start(),
                    None => line,
                }
            } else {
                line
            };
            line.trim_matches(['"', '\'', '“', '”']).trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Keeps the first `limit` suggestions, ignoring case-insensitive repeats.
fn unique(candidates: impl IntoIterator<Item = String>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|s| seen.insert(s.to_lowercase()))
        .take(limit)
        .collect()
}

fn fill(templates: &[&str], topic: &str) -> String {
    let mut rng = rand::rng();
    templates
        .choose(&mut rng)
        .copied()
        .unwrap_or("{}?")
        .replace("{}", topic)
}

pub fn shared_interests(mine: &[String], theirs: &[String]) -> Vec<String> {
    let mine: HashSet<String> = mine.iter().map(|i| i.trim().to_lowercase()).collect();
    let mut seen = HashSet::new();
    theirs
        .iter()
        .map(|i| i.trim().to_lowercase())
        .filter(|i| !i.is_empty() && mine.contains(i) && seen.insert(i.clone()))
        .collect()
}

/// Known interest keywords appearing in `text`, in order of first appearance.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| KNOWN_INTERESTS.contains(&w.as_str()) && seen.insert(w.clone()))
        .collect()
}

fn generic_openers() -> Vec<String> {
    let mut openers: Vec<String> = GENERIC_OPENERS.iter().map(|s| s.to_string()).collect();
    openers.shuffle(&mut rand::rng());
    openers
}

pub fn fallback_icebreakers(context: &IcebreakerContext, count: usize) -> Vec<String> {
    let count = count.clamp(1, MAX_SUGGESTIONS);
    let shared = shared_interests(&context.my_interests, &context.their_interests);
    let bio_keywords = context
        .their_bio
        .as_deref()
        .map(extract_keywords)
        .unwrap_or_default();

    let candidates = shared
        .iter()
        .map(|topic| fill(SHARED_TEMPLATES, topic))
        .chain(
            bio_keywords
                .iter()
                .filter(|k| !shared.contains(k))
                .map(|topic| fill(BIO_TEMPLATES, topic)),
        )
        .chain(generic_openers());

    unique(candidates, count)
}

pub fn conversation_starters(interests: &[String], count: usize) -> Vec<String> {
    let count = count.clamp(1, MAX_SUGGESTIONS);
    let candidates = interests
        .iter()
        .map(|i| i.trim().to_lowercase())
        .filter(|i| !i.is_empty())
        .map(|topic| fill(STARTER_TEMPLATES, &topic))
        .chain(generic_openers());
    unique(candidates, count)
}

pub fn analyze_bio(bio: &str) -> BioAnalysis {
    let word_count = bio.split_whitespace().count();
    let detected_interests = extract_keywords(bio);
    let has_question = bio.contains('?');

    let mut suggestions = Vec::new();
    if word_count < SHORT_BIO_WORDS {
        suggestions.push(
            "Your bio is quite short. Add a few details so matches have something to talk about."
                .to_string(),
        );
    } else if word_count > LONG_BIO_WORDS {
        suggestions.push("Your bio is long. Try trimming it to the highlights.".to_string());
    }
    if !has_question {
        suggestions.push("Ending with a question gives people an easy way to start a chat.".to_string());
    }
    if detected_interests.is_empty() {
        suggestions.push("Mention a hobby or two so people can find common ground.".to_string());
    }

    BioAnalysis {
        word_count,
        detected_interests,
        has_question,
        suggestions,
    }
}
