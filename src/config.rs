//! Configuration loading and validation.
//!
//! One TOML file, loaded once at startup, immutable afterwards. Every field
//! has a default so a missing file degrades to a usable demo configuration
//! (the same fallback the service has always shipped with). Validation runs
//! once at load time; nothing is re-checked per request.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Default prompt texts
// ---------------------------------------------------------------------------

/// Default mentor system prompt. Placeholders are filled per request.
const DEFAULT_MENTOR_PROMPT: &str = "\
Tu es le mentor pédagogique personnel de l'étudiant {{email}} à {{school_name}}.
Ton ton : {{tone}}.

Règles obligatoires :
{{rules}}

Contexte étudiant (résumé) :
{{summary}}
{{program_context}}
Ta mission :
- Comprendre ses difficultés.
- Poser des questions si nécessaire.
- Proposer des actions concrètes, réalistes et bienveillantes.
- Rester strictement dans le cadre de l'école et de son programme.
- Ne jamais encourager l'abandon de l'école ou le contournement des règles.
";

/// Default system instruction for the summary refresh call.
const DEFAULT_SUMMARY_SYSTEM: &str = "\
Tu es un assistant qui met à jour un résumé concis (5 puces max) décrivant \
la situation d'un étudiant pour aider un mentor pédagogique. Tu gardes \
seulement les infos utiles.";

/// Default summary-update prompt. Rendered with the previous summary and the
/// last exchange, then sent as the user message of the refresh call.
const DEFAULT_SUMMARY_UPDATE_PROMPT: &str = "\
Résumé actuel : {{previous_summary}}
Dernier message étudiant : {{last_user_message}}
Dernière réponse mentor : {{last_assistant_reply}}
Produis un nouveau résumé mis à jour, en français, sous forme de puces, sans doublons.
";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// School identity and mentoring rules.
    #[serde(default)]
    pub mentor: MentorConfig,

    /// Program id → context paragraph injected into the mentor prompt.
    /// Absent ids render as empty context, never as an error.
    #[serde(default)]
    pub programs: HashMap<String, String>,

    /// Prompt templates and rendering policy.
    #[serde(default)]
    pub prompts: PromptsConfig,

    /// Completion service settings.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// School identity used to populate the mentor prompt.
#[derive(Debug, Deserialize)]
pub struct MentorConfig {
    /// School display name.
    #[serde(default = "default_school_name")]
    pub school_name: String,

    /// Tone descriptor inserted into the prompt.
    #[serde(default = "default_tone")]
    pub tone: String,

    /// Ordered rule list, rendered as a bulleted block.
    #[serde(default = "default_rules")]
    pub rules: Vec<String>,
}

impl Default for MentorConfig {
    fn default() -> Self {
        Self {
            school_name: default_school_name(),
            tone: default_tone(),
            rules: default_rules(),
        }
    }
}

impl MentorConfig {
    /// Render the rule list as a `- ` bulleted block for the prompt.
    pub fn rules_block(&self) -> String {
        self.rules
            .iter()
            .map(|r| format!("- {r}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Prompt template texts and rendering policy.
#[derive(Debug, Deserialize)]
pub struct PromptsConfig {
    /// Mentor system prompt template (`{{email}}`, `{{school_name}}`,
    /// `{{tone}}`, `{{rules}}`, `{{summary}}`, `{{program_context}}`).
    #[serde(default = "default_mentor_prompt")]
    pub mentor: String,

    /// System instruction for the summary refresh call (not templated).
    #[serde(default = "default_summary_system")]
    pub summary_system: String,

    /// Summary-update template (`{{previous_summary}}`,
    /// `{{last_user_message}}`, `{{last_assistant_reply}}`).
    #[serde(default = "default_summary_update_prompt")]
    pub summary_update: String,

    /// Fail rendering on unresolved placeholders instead of substituting
    /// the empty string. Off by default: lenient rendering is the
    /// long-standing behaviour and a typo then costs a blank, not an outage.
    #[serde(default)]
    pub strict: bool,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            mentor: default_mentor_prompt(),
            summary_system: default_summary_system(),
            summary_update: default_summary_update_prompt(),
            strict: false,
        }
    }
}

/// Completion service settings.
#[derive(Debug, Deserialize)]
pub struct CompletionConfig {
    /// Model used for mentor replies.
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for summary refreshes.
    #[serde(default = "default_model")]
    pub summary_model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Maximum tokens for a mentor reply.
    #[serde(default = "default_max_reply_tokens")]
    pub max_reply_tokens: u32,

    /// Maximum tokens for a refreshed summary.
    #[serde(default = "default_max_summary_tokens")]
    pub max_summary_tokens: u32,

    /// Deadline for a single completion call, in seconds. A timeout is
    /// reported as an upstream failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Serve canned replies instead of calling the completion service.
    /// The rest of the pipeline (logging, summary refresh) runs unchanged.
    #[serde(default)]
    pub mock_mode: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            summary_model: default_model(),
            api_key_env: default_api_key_env(),
            max_reply_tokens: default_max_reply_tokens(),
            max_summary_tokens: default_max_summary_tokens(),
            timeout_secs: default_timeout_secs(),
            mock_mode: false,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. `127.0.0.1:3000`.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Directory served for `/` and static assets.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: default_static_dir(),
        }
    }
}

/// Storage settings.
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Append every user message and mentor reply to the message log table.
    #[serde(default)]
    pub log_messages: bool,

    /// Directory for rotated JSON log files. Console-only when unset.
    #[serde(default)]
    pub logs_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_messages: false,
            logs_dir: None,
        }
    }
}

// Default value functions for serde

fn default_school_name() -> String {
    "École Démo".to_owned()
}
fn default_tone() -> String {
    "bienveillant, concret, structuré".to_owned()
}
fn default_rules() -> Vec<String> {
    vec![
        "Ne jamais conseiller à l'étudiant de quitter l'école.".to_owned(),
        "Ne pas remettre en cause le programme officiel.".to_owned(),
        "Toujours encourager des stratégies de travail réalistes.".to_owned(),
        "Rediriger vers un humain en cas de détresse ou problème grave.".to_owned(),
    ]
}
fn default_mentor_prompt() -> String {
    DEFAULT_MENTOR_PROMPT.to_owned()
}
fn default_summary_system() -> String {
    DEFAULT_SUMMARY_SYSTEM.to_owned()
}
fn default_summary_update_prompt() -> String {
    DEFAULT_SUMMARY_UPDATE_PROMPT.to_owned()
}
fn default_model() -> String {
    "gpt-4.1-mini".to_owned()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_owned()
}
fn default_max_reply_tokens() -> u32 {
    400
}
fn default_max_summary_tokens() -> u32 {
    200
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_bind() -> String {
    "127.0.0.1:3000".to_owned()
}
fn default_static_dir() -> String {
    "public".to_owned()
}
fn default_database_path() -> String {
    "mentord.db".to_owned()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load the config from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if validation
/// fails.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Check load-time invariants.
    ///
    /// # Errors
    ///
    /// Returns an error on a blank prompt template, a blank school name, or
    /// a zero completion timeout.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mentor.school_name.trim().is_empty() {
            anyhow::bail!("mentor.school_name must not be blank");
        }
        if self.prompts.mentor.trim().is_empty() {
            anyhow::bail!("prompts.mentor template must not be blank");
        }
        if self.prompts.summary_update.trim().is_empty() {
            anyhow::bail!("prompts.summary_update template must not be blank");
        }
        if self.completion.timeout_secs == 0 {
            anyhow::bail!("completion.timeout_secs must be positive");
        }
        Ok(())
    }
}
