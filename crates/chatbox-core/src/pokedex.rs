//! Offline PokéBot: answers chat messages from a Pokédex JSON file.
//!
//! The file is the array written by the data-prep scripts (name, types,
//! abilities, base stats, meta and per-type damage multipliers). Extra keys
//! such as descriptions or sprite URLs are ignored. [`LocalBackend`] puts the
//! bot behind [`ChatBackend`], so both reply protocols work without a server.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;

use crate::backend::{ByteStream, ChatBackend};
use crate::error::ChatError;

/// Score a whole query needs to resolve to a name
const LOOKUP_THRESHOLD: f64 = 75.0;
/// Score a single word needs to count as a mention
const MENTION_THRESHOLD: f64 = 85.0;
/// Streamed replies are cut at fixed byte offsets, not char boundaries
const STREAM_CHUNK_BYTES: usize = 16;

const RANDOM_WORDS: &[&str] = &["random", "surprise"];
const COMPARE_WORDS: &[&str] = &["compare", "vs", "versus", "better", "stronger"];
const MATCHUP_WORDS: &[&str] = &["weak", "resist", "resistance"];

pub const NOT_FOUND_REPLY: &str = "I couldn't find that Pokémon.";
pub const UNKNOWN_QUERY_REPLY: &str =
    "Hmm... I didn't catch that. Try asking about a Pokémon or type 'random'!";

#[derive(Debug, Clone, Deserialize)]
pub struct BaseStats {
    pub hp: u32,
    pub attack: u32,
    pub defense: u32,
    pub sp_atk: u32,
    pub sp_def: u32,
    pub speed: u32,
}

impl BaseStats {
    fn labelled(&self) -> [(&'static str, u32); 6] {
        [
            ("HP", self.hp),
            ("ATTACK", self.attack),
            ("DEFENSE", self.defense),
            ("SP_ATK", self.sp_atk),
            ("SP_DEF", self.sp_def),
            ("SPEED", self.speed),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub generation: u32,
    pub is_legendary: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pokemon {
    pub name: String,
    pub types: Vec<String>,
    #[serde(default)]
    pub abilities: Vec<String>,
    pub base_stats: BaseStats,
    pub meta: Meta,
    /// Damage multiplier taken from each attacking type
    #[serde(default)]
    pub type_effectiveness: BTreeMap<String, f64>,
}

impl Pokemon {
    pub fn weaknesses(&self) -> Vec<&str> {
        self.type_effectiveness
            .iter()
            .filter(|(_, m)| **m > 1.0)
            .map(|(t, _)| t.as_str())
            .collect()
    }

    pub fn resistances(&self) -> Vec<&str> {
        self.type_effectiveness
            .iter()
            .filter(|(_, m)| **m < 1.0)
            .map(|(t, _)| t.as_str())
            .collect()
    }

    pub fn describe(&self) -> String {
        let types: Vec<String> = self.types.iter().map(|t| type_label(t)).collect();
        let stats = &self.base_stats;
        format!(
            "✨ {} · {}\n\
             HP: {}, Atk: {}, Def: {}\n\
             Sp. Atk: {}, Sp. Def: {}, Speed: {}\n\
             Abilities: {}\n\
             Legendary: {}, Gen: {}",
            self.name,
            types.join(" "),
            stats.hp,
            stats.attack,
            stats.defense,
            stats.sp_atk,
            stats.sp_def,
            stats.speed,
            self.abilities.join(", "),
            if self.meta.is_legendary { "Yes" } else { "No" },
            self.meta.generation,
        )
    }

    pub fn matchups(&self) -> String {
        format!(
            "{} is weak to: {}\nAnd resistant to: {}",
            self.name,
            list_or_none(&self.weaknesses()),
            list_or_none(&self.resistances()),
        )
    }

    /// Stat-by-stat comparison, naming the winner of each row
    pub fn compare(&self, other: &Pokemon) -> String {
        let mut lines = vec![format!("📊 Comparing {} vs {}", self.name, other.name)];
        let rows = self.base_stats.labelled().into_iter().zip(other.base_stats.labelled());
        for ((label, a), (_, b)) in rows {
            let winner = if a == b {
                "Tie"
            } else if a > b {
                self.name.as_str()
            } else {
                other.name.as_str()
            };
            lines.push(format!("{label}: {a} vs {b} → {winner}"));
        }
        lines.join("\n")
    }
}

fn list_or_none(items: &[&str]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.join(", ")
    }
}

fn type_emoji(kind: &str) -> &'static str {
    match kind.to_lowercase().as_str() {
        "fire" => "🔥",
        "water" => "💧",
        "grass" => "🌿",
        "electric" => "⚡",
        "psychic" => "🧠",
        "flying" => "🕊️",
        "bug" => "🐛",
        "poison" => "☠️",
        "normal" => "✨",
        "ghost" => "👻",
        "dragon" => "🐉",
        "ice" => "❄️",
        "rock" => "🪨",
        "steel" => "🛡️",
        "dark" => "🌑",
        "fairy" => "🧚",
        "ground" => "🌍",
        "fighting" => "🥊",
        _ => "",
    }
}

fn type_label(kind: &str) -> String {
    let mut chars = kind.chars();
    let name = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    };
    match type_emoji(kind) {
        "" => name,
        emoji => format!("{name} {emoji}"),
    }
}

/// Indel similarity on a 0-100 scale: twice the longest common
/// subsequence over the combined length.
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }

    let mut row = vec![0usize; b.len() + 1];
    for &ca in &a {
        let mut diagonal = 0;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb { diagonal + 1 } else { above.max(row[j]) };
            diagonal = above;
        }
    }

    200.0 * row[b.len()] as f64 / (a.len() + b.len()) as f64
}

pub struct Pokedex {
    entries: Vec<Pokemon>,
    /// Lowercased name to entry index; the first entry wins on duplicates
    by_name: HashMap<String, usize>,
    names: Vec<(String, usize)>,
}

impl Pokedex {
    pub fn new(entries: Vec<Pokemon>) -> Self {
        let mut by_name = HashMap::new();
        let mut names = Vec::new();
        for (idx, entry) in entries.iter().enumerate() {
            let key = entry.name.to_lowercase();
            if !by_name.contains_key(&key) {
                by_name.insert(key.clone(), idx);
                names.push((key, idx));
            }
        }
        Self {
            entries,
            by_name,
            names,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<Pokemon> = serde_json::from_str(json)?;
        if entries.is_empty() {
            return Err(anyhow!("Pokédex has no entries"));
        }
        Ok(Self::new(entries))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read Pokédex {}", path.display()))?;
        let pokedex = Self::from_json(&content)
            .with_context(|| format!("Invalid Pokédex {}", path.display()))?;
        tracing::info!(entries = pokedex.len(), path = %path.display(), "Pokédex loaded");
        Ok(pokedex)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn best_match(&self, word: &str) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (name, idx) in &self.names {
            let score = similarity(word, name);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((*idx, score));
            }
        }
        best
    }

    /// Exact name, else the closest name scoring above the lookup threshold
    pub fn find(&self, name: &str) -> Option<&Pokemon> {
        let name = name.trim().to_lowercase();
        if let Some(&idx) = self.by_name.get(&name) {
            return Some(&self.entries[idx]);
        }
        match self.best_match(&name) {
            Some((idx, score)) if score > LOOKUP_THRESHOLD => Some(&self.entries[idx]),
            _ => None,
        }
    }

    /// Pokémon named in `text`, one per word, in order of first mention
    pub fn mentioned(&self, text: &str) -> Vec<&Pokemon> {
        let mut found: Vec<usize> = Vec::new();
        for word in text
            .split(|c: char| !c.is_alphabetic())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            if let Some((idx, score)) = self.best_match(&word) {
                if score > MENTION_THRESHOLD && !found.contains(&idx) {
                    found.push(idx);
                }
            }
        }
        found.into_iter().map(|idx| &self.entries[idx]).collect()
    }

    pub fn answer(&self, query: &str) -> String {
        self.answer_with(query, &mut rand::thread_rng())
    }

    /// Pick an intent from keywords and answer it. Checked in order: random
    /// pick, comparison of two mentions, weaknesses and resistances, plain
    /// description.
    pub fn answer_with<R: Rng + ?Sized>(&self, query: &str, rng: &mut R) -> String {
        let query = query.to_lowercase();
        let asks = |words: &[&str]| words.iter().any(|w| query.contains(w));

        if asks(RANDOM_WORDS) {
            if let Some(pick) = self.entries.choose(rng) {
                return pick.describe();
            }
        }

        let names = self.mentioned(&query);

        if asks(COMPARE_WORDS) && names.len() >= 2 {
            return names[0].compare(names[1]);
        }

        if asks(MATCHUP_WORDS) {
            return match names.first() {
                Some(pokemon) => pokemon.matchups(),
                None => NOT_FOUND_REPLY.to_string(),
            };
        }

        if let Some(pokemon) = names.first() {
            return pokemon.describe();
        }

        // Multi-word names like "mr. mime" only match as a whole
        match self.find(&query) {
            Some(pokemon) => pokemon.describe(),
            None => UNKNOWN_QUERY_REPLY.to_string(),
        }
    }
}

/// Answers in-process from a [`Pokedex`] instead of calling an endpoint
pub struct LocalBackend {
    pokedex: Pokedex,
}

impl LocalBackend {
    pub fn new(pokedex: Pokedex) -> Self {
        Self { pokedex }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(Pokedex::load(path)?))
    }
}

#[async_trait]
impl ChatBackend for LocalBackend {
    async fn ask(&self, text: &str) -> Result<String, ChatError> {
        tracing::debug!("answering from local Pokédex");
        Ok(self.pokedex.answer(text))
    }

    async fn open_stream(&self, text: &str) -> Result<ByteStream, ChatError> {
        tracing::debug!("streaming answer from local Pokédex");
        let reply = self.pokedex.answer(text);
        let chunks: Vec<Result<Vec<u8>, ChatError>> = reply
            .as_bytes()
            .chunks(STREAM_CHUNK_BYTES)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Utf8StreamDecoder;
    use crate::protocol::Protocol;
    use crate::session::{ChatSession, SendOutcome};
    use crate::view::Transcript;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    const FIXTURE: &str = r#"[
      {
        "name": "Bulbasaur",
        "types": ["grass", "poison"],
        "abilities": ["Overgrow", "Chlorophyll"],
        "base_stats": {"hp": 45, "attack": 49, "defense": 49, "sp_atk": 65, "sp_def": 65, "speed": 45},
        "meta": {"generation": 1, "is_legendary": false},
        "type_effectiveness": {
          "bug": 1.0, "electric": 0.5, "fairy": 0.5, "fight": 0.5, "fire": 2.0,
          "flying": 2.0, "grass": 0.25, "ice": 2.0, "psychic": 2.0, "water": 0.5
        },
        "description": "A strange seed was planted on its back at birth.",
        "image": "https://example.invalid/1.png"
      },
      {
        "name": "Charizard",
        "types": ["fire", "flying"],
        "abilities": ["Blaze", "Solar Power"],
        "base_stats": {"hp": 78, "attack": 84, "defense": 78, "sp_atk": 109, "sp_def": 85, "speed": 100},
        "meta": {"generation": 1, "is_legendary": false},
        "type_effectiveness": {"rock": 4.0, "water": 2.0, "electric": 2.0, "grass": 0.25, "ground": 0.0}
      },
      {
        "name": "Pikachu",
        "types": ["electric"],
        "abilities": ["Static", "Lightningrod"],
        "base_stats": {"hp": 35, "attack": 55, "defense": 40, "sp_atk": 50, "sp_def": 50, "speed": 90},
        "meta": {"generation": 1, "is_legendary": false},
        "type_effectiveness": {"ground": 2.0, "electric": 0.5, "flying": 0.5, "steel": 0.5}
      },
      {
        "name": "Mr. Mime",
        "types": ["psychic", "fairy"],
        "abilities": ["Soundproof"],
        "base_stats": {"hp": 40, "attack": 45, "defense": 65, "sp_atk": 100, "sp_def": 120, "speed": 90},
        "meta": {"generation": 1, "is_legendary": false}
      }
    ]"#;

    fn pokedex() -> Pokedex {
        Pokedex::from_json(FIXTURE).unwrap()
    }

    #[test]
    fn describe_lists_types_stats_and_meta() {
        let dex = pokedex();
        let text = dex.answer("tell me about bulbasaur");

        assert_eq!(
            text,
            "✨ Bulbasaur · Grass 🌿 Poison ☠️\n\
             HP: 45, Atk: 49, Def: 49\n\
             Sp. Atk: 65, Sp. Def: 65, Speed: 45\n\
             Abilities: Overgrow, Chlorophyll\n\
             Legendary: No, Gen: 1"
        );
    }

    #[test]
    fn misspelled_names_still_match() {
        let dex = pokedex();
        assert_eq!(dex.find("charzard").map(|p| p.name.as_str()), Some("Charizard"));
        assert_eq!(dex.find("PIKACHU").map(|p| p.name.as_str()), Some("Pikachu"));
        assert!(dex.find("snorlax").is_none());

        let named: Vec<&str> = dex
            .mentioned("is pikachu cuter than charizrd?")
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(named, ["Pikachu", "Charizard"]);
    }

    #[test]
    fn compare_names_the_winner_of_each_stat() {
        let dex = pokedex();
        let text = dex.answer("Is Pikachu stronger than Charizard?");

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "📊 Comparing Pikachu vs Charizard");
        assert_eq!(lines[1], "HP: 35 vs 78 → Charizard");
        assert_eq!(lines[6], "SPEED: 90 vs 100 → Charizard");
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn compare_reports_ties() {
        let dex = pokedex();
        let text = dex.answer("pikachu vs mime");
        // "mime" alone is too far from "mr. mime" to count as a mention
        assert!(text.starts_with("✨ Pikachu"));

        let pikachu = dex.find("pikachu").unwrap();
        let mime = dex.find("mr. mime").unwrap();
        assert!(pikachu.compare(mime).contains("SPEED: 90 vs 90 → Tie"));
    }

    #[test]
    fn matchups_split_weaknesses_and_resistances() {
        let dex = pokedex();
        assert_eq!(
            dex.answer("what is bulbasaur weak to?"),
            "Bulbasaur is weak to: fire, flying, ice, psychic\n\
             And resistant to: electric, fairy, fight, grass, water"
        );
        assert_eq!(dex.answer("mr mime resistances"), NOT_FOUND_REPLY);
        assert_eq!(dex.answer("who resists water?"), NOT_FOUND_REPLY);
    }

    #[test]
    fn missing_effectiveness_reports_none() {
        let dex = pokedex();
        let mime = dex.find("mr. mime").unwrap();
        assert_eq!(mime.matchups(), "Mr. Mime is weak to: None\nAnd resistant to: None");
    }

    #[test]
    fn multi_word_name_matches_whole_query() {
        let dex = pokedex();
        assert!(dex.answer("mr mime").starts_with("✨ Mr. Mime · Psychic 🧠 Fairy 🧚"));
    }

    #[test]
    fn random_pick_describes_some_entry() {
        let dex = pokedex();
        let mut rng = StdRng::seed_from_u64(7);
        let descriptions: Vec<String> = ["bulbasaur", "charizard", "pikachu", "mr. mime"]
            .iter()
            .map(|name| dex.find(name).unwrap().describe())
            .collect();

        for query in ["random", "Surprise me!"] {
            let text = dex.answer_with(query, &mut rng);
            assert!(descriptions.contains(&text), "unexpected reply: {text}");
        }
    }

    #[test]
    fn unrelated_text_gets_the_hint() {
        let dex = pokedex();
        assert_eq!(dex.answer("what's the weather like?"), UNKNOWN_QUERY_REPLY);
    }

    #[test]
    fn empty_or_malformed_files_are_rejected() {
        assert!(Pokedex::from_json("[]").is_err());
        assert!(Pokedex::from_json(r#"[{"name": "Missingno"}]"#).is_err());

        let dir = tempfile::tempdir().unwrap();
        assert!(Pokedex::load(&dir.path().join("absent.json")).is_err());

        let path = dir.path().join("pokemon_formatted.json");
        fs::write(&path, FIXTURE).unwrap();
        assert_eq!(Pokedex::load(&path).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn streamed_answer_decodes_to_the_whole_reply() {
        let backend = LocalBackend::new(pokedex());
        let whole = backend.ask("charizard").await.unwrap();

        let mut stream = backend.open_stream("charizard").await.unwrap();
        let mut decoder = Utf8StreamDecoder::new();
        let mut text = String::new();
        let mut chunks = 0;
        while let Some(chunk) = stream.next().await {
            text.push_str(&decoder.decode(&chunk.unwrap()));
            chunks += 1;
        }
        text.push_str(&decoder.finish());

        assert!(chunks > 1);
        assert_eq!(text, whole);
    }

    #[tokio::test]
    async fn local_backend_serves_a_chat_session() {
        for protocol in Protocol::all() {
            let mut session = ChatSession::new(Arc::new(LocalBackend::new(pokedex())), protocol);
            let mut view = Transcript::new();
            let mut input = "pikachu weaknesses".to_string();

            let outcome = session.send(&mut input, &mut view, &CancellationToken::new()).await;

            assert_eq!(outcome, SendOutcome::Replied);
            assert_eq!(
                view.last().unwrap().text,
                "Pikachu is weak to: ground\nAnd resistant to: electric, flying, steel"
            );
        }
    }
}
