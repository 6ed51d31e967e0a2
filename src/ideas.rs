use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::LlmConfig;
use crate::db::IdeaRow;

const SYSTEM_PROMPT: &str = "\
Ты подбираешь товарные идеи для продажи на российских маркетплейсах.
Отвечай только JSON-объектом, без markdown и комментариев.

Пользователь присылает исходный материал или заготовку и, возможно, её себестоимость.
Предложи товары из этого материала, которые реально покупают на Ozon.

Для каждой идеи укажи:
- title: короткое название товара;
- query: поисковый запрос для Ozon на русском, как его ввёл бы покупатель;
- description: одно-два предложения о товаре;
- material_cost_rub: себестоимость в рублях числом. Если себестоимость дана, используй её,
  иначе оцени по материалу и комплектации.

Формат ответа:
{\"items\": [{\"title\": \"...\", \"query\": \"...\", \"description\": \"...\", \"material_cost_rub\": 0}]}";

/// Starting material for idea generation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Seed {
    pub seed: String,
    #[serde(default)]
    pub material_cost_rub: Option<f64>,
}

/// Read a JSON array of seeds.
pub fn load_seeds(path: &Path) -> Result<Vec<Seed>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading seeds file {}", path.display()))?;
    let seeds: Vec<Seed> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing seeds file {}", path.display()))?;
    Ok(seeds)
}

/// One item as the model returned it; fields are validated in [`build_rows`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIdea {
    #[serde(default)]
    pub title: Value,
    #[serde(default)]
    pub query: Value,
    #[serde(default)]
    pub description: Value,
    #[serde(default)]
    pub material_cost_rub: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct IdeaBatch {
    items: Vec<RawIdea>,
}

/// Slice from the first `{` to the last `}`, or the trimmed text if there
/// is no such span.
pub fn extract_json_object(text: &str) -> &str {
    let t = text.trim();
    match (t.find('{'), t.rfind('}')) {
        (Some(start), Some(end)) if end > start => &t[start..=end],
        _ => t,
    }
}

/// Parse a `{"items": [...]}` reply, tolerating prose or code fences around it.
pub fn parse_reply(text: &str) -> Result<Vec<RawIdea>> {
    let batch: IdeaBatch =
        serde_json::from_str(extract_json_object(text)).context("idea reply is not an items object")?;
    Ok(batch.items)
}

fn text_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

/// Item cost as a number. Absent or null falls back to the seed's cost;
/// anything that does not read as a number is `None`.
fn coerce_cost(value: Option<&Value>, seed_cost: Option<f64>) -> Option<f64> {
    match value {
        None | Some(Value::Null) => seed_cost,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().replace(',', ".").parse().ok(),
        Some(_) => None,
    }
}

/// Validate items into idea rows, numbering them from `*next_id`. Items
/// without a title or query are dropped.
pub fn build_rows(seed: &Seed, items: &[RawIdea], next_id: &mut i64) -> Vec<IdeaRow> {
    let mut rows = Vec::new();
    for item in items {
        let title = text_field(&item.title);
        let query = text_field(&item.query);
        if title.is_empty() || query.is_empty() {
            continue;
        }
        rows.push(IdeaRow {
            idea_id: *next_id,
            seed: seed.seed.clone(),
            title,
            query,
            description: text_field(&item.description),
            material_cost_rub: coerce_cost(item.material_cost_rub.as_ref(), seed.material_cost_rub),
        });
        *next_id += 1;
    }
    rows
}

/// Ideas from a file holding an already generated reply.
pub fn import_file(path: &Path, seed: &Seed, next_id: i64) -> Result<Vec<IdeaRow>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading ideas file {}", path.display()))?;
    let items = parse_reply(&raw)?;
    let mut id = next_id;
    Ok(build_rows(seed, &items, &mut id))
}

/// Anything that answers a seed with an idea reply.
#[async_trait]
pub trait IdeaSource: Send + Sync {
    async fn reply(&self, seed: &Seed, count: usize) -> Result<String>;
}

/// OpenAI-compatible chat-completions endpoint.
pub struct ChatCompletions {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletions {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(120))
            .build()
            .context("build reqwest client")?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'))
    }
}

fn user_prompt(seed: &Seed, count: usize) -> String {
    let cost = match seed.material_cost_rub {
        Some(c) => c.to_string(),
        None => "не задана".to_string(),
    };
    format!(
        "Материал: {}\nСебестоимость, руб: {}\n\nПредложи {} идей. Верни только JSON-объект в указанном формате.",
        seed.seed, cost, count
    )
}

#[async_trait]
impl IdeaSource for ChatCompletions {
    async fn reply(&self, seed: &Seed, count: usize) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT.to_string() },
                ChatMessage { role: "user", content: user_prompt(seed, count) },
            ],
        };

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .context("idea request failed")?
            .error_for_status()
            .context("idea endpoint returned an error")?;

        let body: ChatResponse = resp.json().await.context("decoding chat completion")?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("chat completion has no content"))
    }
}

/// Generate ideas for every seed, numbering from `first_id`.
///
/// A seed whose request or reply fails is logged and skipped; the others
/// still produce ideas.
pub async fn generate_ideas<S: IdeaSource>(
    source: &S,
    seeds: &[Seed],
    per_seed: usize,
    first_id: i64,
) -> Vec<IdeaRow> {
    let mut next_id = first_id;
    let mut rows = Vec::new();

    for seed in seeds {
        let items = match source.reply(seed, per_seed).await {
            Ok(text) => parse_reply(&text),
            Err(e) => Err(e),
        };
        match items {
            Ok(items) => {
                let accepted = build_rows(seed, &items, &mut next_id);
                info!(
                    "Seed '{}': {} ideas ({} dropped)",
                    seed.seed,
                    accepted.len(),
                    items.len() - accepted.len()
                );
                rows.extend(accepted);
            }
            Err(e) => warn!("Skipping seed '{}': {:#}", seed.seed, e),
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seed(cost: Option<f64>) -> Seed {
        Seed { seed: "коробка из прозрачного пластика".into(), material_cost_rub: cost }
    }

    fn item(v: Value) -> RawIdea {
        serde_json::from_value(v).unwrap()
    }

    struct Canned(Vec<Result<&'static str, &'static str>>);

    #[async_trait]
    impl IdeaSource for Canned {
        async fn reply(&self, seed: &Seed, _count: usize) -> Result<String> {
            let i: usize = seed.seed.parse().unwrap();
            match self.0[i] {
                Ok(text) => Ok(text.to_string()),
                Err(e) => Err(anyhow!(e)),
            }
        }
    }

    #[test]
    fn json_object_is_cut_from_prose() {
        let reply = "Вот идеи:\n```json\n{\"items\": [{\"a\": {\"b\": 1}}]}\n```\nУдачи!";
        assert_eq!(extract_json_object(reply), "{\"items\": [{\"a\": {\"b\": 1}}]}");
        assert_eq!(extract_json_object("  нет json  "), "нет json");
    }

    #[test]
    fn untitled_or_queryless_items_are_dropped() {
        let items = vec![
            item(json!({"title": "Органайзер", "query": "органайзер для мелочей"})),
            item(json!({"title": "  ", "query": "пустой заголовок"})),
            item(json!({"title": "Без запроса"})),
            item(json!({"title": "Шкатулка", "query": "шкатулка пластиковая", "description": " для бижутерии "})),
        ];
        let mut next = 10;
        let rows = build_rows(&seed(Some(40.0)), &items, &mut next);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].idea_id, 10);
        assert_eq!(rows[1].idea_id, 11);
        assert_eq!(rows[1].description, "для бижутерии");
        assert_eq!(next, 12);
    }

    #[test]
    fn cost_coercion() {
        let s = seed(Some(40.0));
        assert_eq!(coerce_cost(None, s.material_cost_rub), Some(40.0));
        assert_eq!(coerce_cost(Some(&Value::Null), s.material_cost_rub), Some(40.0));
        assert_eq!(coerce_cost(Some(&json!(55)), s.material_cost_rub), Some(55.0));
        assert_eq!(coerce_cost(Some(&json!(" 12,5 ")), s.material_cost_rub), Some(12.5));
        assert_eq!(coerce_cost(Some(&json!("дёшево")), s.material_cost_rub), None);
        assert_eq!(coerce_cost(None, None), None);
    }

    #[test]
    fn numeric_titles_are_stringified() {
        let rows = build_rows(&seed(None), &[item(json!({"title": 3000, "query": "крючок"}))], &mut 1);
        assert_eq!(rows[0].title, "3000");
        assert_eq!(rows[0].material_cost_rub, None);
    }

    #[test]
    fn reply_without_items_is_an_error() {
        assert!(parse_reply("{\"ideas\": []}").is_err());
        assert!(parse_reply("не могу помочь").is_err());
    }

    #[tokio::test]
    async fn failing_seed_is_skipped() {
        let source = Canned(vec![
            Ok("{\"items\": [{\"title\": \"A\", \"query\": \"a\"}]}"),
            Ok("извините, {сломанный json}"),
            Err("HTTP 502"),
            Ok("{\"items\": [{\"title\": \"B\", \"query\": \"b\"}, {\"title\": \"C\", \"query\": \"c\"}]}"),
        ]);
        let seeds: Vec<Seed> = (0..4)
            .map(|i| Seed { seed: i.to_string(), material_cost_rub: None })
            .collect();

        let rows = generate_ideas(&source, &seeds, 20, 7).await;
        let ids: Vec<(i64, &str)> = rows.iter().map(|r| (r.idea_id, r.query.as_str())).collect();
        assert_eq!(ids, vec![(7, "a"), (8, "b"), (9, "c")]);
        assert_eq!(rows[1].seed, "3");
    }

    #[test]
    fn seeds_file_allows_missing_cost() {
        let dir = std::env::temp_dir().join(format!("margin_seeds_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("seeds.json");
        std::fs::write(
            &path,
            r#"[{"seed": "крючок", "material_cost_rub": 25}, {"seed": "полка"}]"#,
        )
        .unwrap();

        let seeds = load_seeds(&path).unwrap();
        assert_eq!(seeds[0].material_cost_rub, Some(25.0));
        assert_eq!(seeds[1], Seed { seed: "полка".into(), material_cost_rub: None });
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
