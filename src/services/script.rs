use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::time::Duration;

use crate::core::config::ManuscriptConfig;
use crate::core::manuscript::{Content, Manuscript};
use crate::services::llm::{LlmClient, LlmConfig};

#[async_trait]
pub trait ManuscriptGenerator: Send + Sync {
    async fn generate(&self) -> Result<Manuscript>;
}

pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json").trim_end_matches("```").trim().to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```").trim_end_matches("```").trim().to_string()
    } else {
        s.to_string()
    }
}

pub fn parse_manuscript(response: &str) -> Result<Manuscript> {
    let clean_json = strip_code_blocks(response);
    let manuscript: Manuscript = serde_json::from_str(&clean_json)
        .with_context(|| format!("Failed to parse manuscript JSON: {}", clean_json))?;
    manuscript.validate()?;
    Ok(manuscript)
}

/// The one-shot example shown to the model.
pub fn example_manuscript() -> Manuscript {
    let line = |speaker: &str, text: &str| Content {
        speaker_id: speaker.to_string(),
        text: text.to_string(),
        links: vec![],
    };
    Manuscript {
        title: "【爆笑】ウブすぎるイッチの美容院初体験".to_string(),
        overview: "今日の動画では、ウブすぎるイッチがみんなに騙されて恥をかいてしまった話を紹介します。"
            .to_string(),
        keywords: ["イッチ", "2ch", "5ch", "まとめ", "創作", "初体験"]
            .iter()
            .map(|k| k.to_string())
            .collect(),
        contents: vec![
            line("id1", "マイシャンプーいるっていったやつでてこいやwwwww"),
            line("id2", "髪にこだわりがあるやつみたいでいいやん"),
            line("id1", "俺「すいません、マイシャンプー忘れたんですが...」"),
            line("id1", "店員「マイ...シャンプー...?」"),
            line("id3", "ウブすぎてわろた"),
            line("id4", "マイシャンプーってなんやねん"),
            line("id5", "てかお前髪ないやろ"),
            line("id6", "マイリンスも忘れんなよ"),
        ],
        meta: None,
    }
}

/// Writes a pseudo bulletin-board thread about the configured themes.
pub struct BulletinBoardGenerator {
    llm: Box<dyn LlmClient>,
    themes: Vec<String>,
    min_contents: usize,
    retry_count: usize,
    retry_delay: Duration,
}

impl BulletinBoardGenerator {
    pub fn new(llm: Box<dyn LlmClient>, manuscript: &ManuscriptConfig, llm_config: &LlmConfig) -> Self {
        Self {
            llm,
            themes: manuscript.themes.clone(),
            min_contents: manuscript.min_contents,
            retry_count: llm_config.retry_count,
            retry_delay: Duration::from_secs(llm_config.retry_delay_seconds),
        }
    }

    pub fn system_prompts(&self) -> Vec<String> {
        vec![
            format!(
                "与えられるJSONは一般的な2chの会話風景です。このような形式で{}に関する会話を生成してください。",
                self.themes.join(",")
            ),
            format!(
                "なお、会話は必ず{}件以上生成してください。{}件未満の場合は、会話を続けてください。",
                self.min_contents, self.min_contents
            ),
        ]
    }

    fn stamp(&self, manuscript: &mut Manuscript) {
        let mut meta = HashMap::new();
        meta.insert(
            "type".to_string(),
            serde_json::Value::String("pseudo_bulletin_board".to_string()),
        );
        meta.insert("themes".to_string(), serde_json::json!(self.themes));
        manuscript.meta = Some(meta);
    }

    async fn attempt(&self, system: &[String], user: &str) -> Result<Manuscript> {
        let response = self.llm.chat(system, user).await?;
        parse_manuscript(&response)
    }
}

#[async_trait]
impl ManuscriptGenerator for BulletinBoardGenerator {
    async fn generate(&self) -> Result<Manuscript> {
        let system = self.system_prompts();
        let user = serde_json::to_string(&example_manuscript())?;

        let mut last_error = None;
        for attempt in 0..=self.retry_count {
            if attempt > 0 {
                tokio::time::sleep(self.retry_delay).await;
            }
            match self.attempt(&system, &user).await {
                Ok(mut manuscript) => {
                    if manuscript.contents.len() < self.min_contents {
                        warn!(
                            "Manuscript has {} contents, fewer than the {} asked for",
                            manuscript.contents.len(),
                            self.min_contents
                        );
                    }
                    self.stamp(&mut manuscript);
                    debug!("{:?}", manuscript);
                    info!("Generated bulletin-board manuscript: {}", manuscript.title);
                    return Ok(manuscript);
                }
                Err(e) => {
                    warn!(
                        "Manuscript generation failed (attempt {}/{}): {:#}",
                        attempt + 1,
                        self.retry_count + 1,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("Manuscript generation failed")))
    }
}
